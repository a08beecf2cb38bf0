// 🖱️ Interactive UI adapter - the narrow surface the driver depends on
//
// Concrete automation lives behind `UiSession` (see `webdriver`). Locating
// goes through ordered locator chains: first locator that finds anything wins.

use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum UiError {
    #[error("no element matches {0}")]
    NoSuchElement(String),

    #[error("timed out after {ms}ms waiting for {what}", ms = .after.as_millis())]
    Timeout { what: String, after: Duration },

    /// The automation backend answered with an error
    #[error("automation error: {0}")]
    Protocol(String),

    /// The automation backend could not be reached
    #[error("automation backend unreachable: {0}")]
    Transport(String),
}

pub type UiResult<T> = std::result::Result<T, UiError>;

// ============================================================================
// ELEMENTS + LOCATORS
// ============================================================================

/// Opaque handle to an element of the current page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Element(pub String);

impl Element {
    pub fn id(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocatorKind {
    Css,
    XPath,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub kind: LocatorKind,
    pub value: String,
}

impl Locator {
    pub fn css(value: impl Into<String>) -> Self {
        Locator {
            kind: LocatorKind::Css,
            value: value.into(),
        }
    }

    pub fn xpath(value: impl Into<String>) -> Self {
        Locator {
            kind: LocatorKind::XPath,
            value: value.into(),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            LocatorKind::Css => write!(f, "css `{}`", self.value),
            LocatorKind::XPath => write!(f, "xpath `{}`", self.value),
        }
    }
}

/// Ordered fallback list of locators for one logical control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatorChain {
    pub label: String,
    pub locators: Vec<Locator>,
}

impl LocatorChain {
    pub fn new(label: impl Into<String>, locators: Vec<Locator>) -> Self {
        LocatorChain {
            label: label.into(),
            locators,
        }
    }

    /// Chain of CSS selectors, tried in order
    pub fn css(label: impl Into<String>, selectors: &[&str]) -> Self {
        Self::new(label, selectors.iter().map(|s| Locator::css(*s)).collect())
    }

    /// Every element of the first locator that finds at least one.
    ///
    /// A locator that errors is skipped like one that finds nothing.
    pub fn first_match(&self, session: &mut dyn UiSession) -> Option<(&Locator, Vec<Element>)> {
        for locator in &self.locators {
            match session.find_all(locator) {
                Ok(found) if !found.is_empty() => return Some((locator, found)),
                Ok(_) => debug!(control = %self.label, %locator, "Locator found nothing"),
                Err(e) => debug!(control = %self.label, %locator, error = %e, "Locator failed"),
            }
        }
        None
    }
}

impl fmt::Display for LocatorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

// ============================================================================
// SESSION TRAIT
// ============================================================================

/// One interactive browsing session. Each method is a single round-trip;
/// bounded waits are built on top of them below.
pub trait UiSession {
    fn navigate(&mut self, url: &str) -> UiResult<()>;

    fn current_url(&mut self) -> UiResult<String>;

    fn title(&mut self) -> UiResult<String>;

    fn find_all(&mut self, locator: &Locator) -> UiResult<Vec<Element>>;

    fn find_within(&mut self, parent: &Element, locator: &Locator) -> UiResult<Vec<Element>>;

    fn is_displayed(&mut self, element: &Element) -> UiResult<bool>;

    fn is_enabled(&mut self, element: &Element) -> UiResult<bool>;

    fn is_selected(&mut self, element: &Element) -> UiResult<bool>;

    fn click(&mut self, element: &Element) -> UiResult<()>;

    /// Replace the element's text content with `text`.
    fn set_text(&mut self, element: &Element, text: &str) -> UiResult<()>;

    /// Rendered, visible text of the element and its subtree.
    fn visible_text(&mut self, element: &Element) -> UiResult<String>;

    /// Block the session for `duration`. Fakes may return immediately.
    fn pause(&mut self, duration: Duration);

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(250)
    }

    fn close(&mut self) -> UiResult<()>;
}

// ============================================================================
// BOUNDED WAITS
// ============================================================================

/// Number of checks a wait gets: timeout / interval, at least one.
pub fn poll_rounds(timeout: Duration, interval: Duration) -> u32 {
    let interval_ms = interval.as_millis();
    if interval_ms == 0 {
        return 1;
    }
    (timeout.as_millis() / interval_ms).clamp(1, u32::MAX as u128) as u32
}

/// Poll `condition` until it holds or the round budget runs out.
/// Errors from the condition count as "not yet".
pub fn wait_until(
    session: &mut dyn UiSession,
    what: &str,
    timeout: Duration,
    condition: &mut dyn FnMut(&mut dyn UiSession) -> UiResult<bool>,
) -> UiResult<()> {
    let interval = session.poll_interval();
    let rounds = poll_rounds(timeout, interval);
    for round in 0..rounds {
        match condition(session) {
            Ok(true) => return Ok(()),
            Ok(false) => {}
            Err(e) => debug!(what, error = %e, "Condition check failed"),
        }
        if round + 1 < rounds {
            session.pause(interval);
        }
    }
    Err(UiError::Timeout {
        what: what.to_string(),
        after: timeout,
    })
}

pub fn wait_visible(
    session: &mut dyn UiSession,
    element: &Element,
    timeout: Duration,
) -> UiResult<()> {
    let what = format!("element {} to be visible", element.id());
    wait_until(session, &what, timeout, &mut |s: &mut dyn UiSession| s.is_displayed(element))
}

pub fn wait_enabled(
    session: &mut dyn UiSession,
    element: &Element,
    timeout: Duration,
) -> UiResult<()> {
    let what = format!("element {} to be enabled", element.id());
    wait_until(session, &what, timeout, &mut |s: &mut dyn UiSession| s.is_enabled(element))
}

/// Wait until some locator of the chain finds elements and return them.
pub fn wait_for(
    session: &mut dyn UiSession,
    chain: &LocatorChain,
    timeout: Duration,
) -> UiResult<Vec<Element>> {
    let interval = session.poll_interval();
    let rounds = poll_rounds(timeout, interval);
    for round in 0..rounds {
        if let Some((_, found)) = chain.first_match(session) {
            return Ok(found);
        }
        if round + 1 < rounds {
            session.pause(interval);
        }
    }
    Err(UiError::Timeout {
        what: chain.label.clone(),
        after: timeout,
    })
}

// ============================================================================
// SESSION GUARD
// ============================================================================

/// Owns the session for the whole run and closes it exactly once, either
/// explicitly or on drop, unless it was asked to stay open.
pub struct SessionGuard {
    session: Box<dyn UiSession>,
    keep_open: bool,
    closed: bool,
}

impl SessionGuard {
    pub fn new(session: Box<dyn UiSession>, keep_open: bool) -> Self {
        SessionGuard {
            session,
            keep_open,
            closed: false,
        }
    }

    pub fn session(&mut self) -> &mut dyn UiSession {
        self.session.as_mut()
    }

    pub fn keep_open(&self) -> bool {
        self.keep_open
    }

    /// Release the session now. Later calls and the drop are no-ops.
    pub fn release(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if self.keep_open {
            warn!("Browser left open due to show-browser flag");
            return;
        }
        if let Err(e) = self.session.close() {
            warn!(error = %e, "Failed to close browser session");
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_rounds() {
        assert_eq!(poll_rounds(Duration::from_secs(5), Duration::from_millis(250)), 20);
        assert_eq!(poll_rounds(Duration::from_millis(100), Duration::from_millis(250)), 1);
        assert_eq!(poll_rounds(Duration::from_secs(1), Duration::ZERO), 1);
    }

    #[test]
    fn test_locator_display() {
        assert_eq!(Locator::css("input#username").to_string(), "css `input#username`");
        assert_eq!(
            Locator::xpath("//button[@type='submit']").to_string(),
            "xpath `//button[@type='submit']`"
        );
    }

    #[test]
    fn test_css_chain_keeps_order() {
        let chain = LocatorChain::css("username field", &["input#inputUsername", "input#username"]);
        assert_eq!(chain.locators[0], Locator::css("input#inputUsername"));
        assert_eq!(chain.locators[1], Locator::css("input#username"));
        assert_eq!(chain.to_string(), "username field");
    }
}
