// 🚦 Convergence Driver - walks one work item to Verified, Skip or Failed
//
// Start → (VariantSearch) → {Skip, ApplyBase, ApplyVariant} → Verified | Failed
//
// Steps are either load-bearing (navigation, opening the form, the modal,
// submit and the save acknowledgement) or best-effort (checkboxes, priority,
// text areas, reading the versions listing). A best-effort failure is logged
// and noted on the report; a load-bearing one fails the item.

use crate::config::SyncConfig;
use crate::entry::{StatusFlag, WorkItem};
use crate::error::{SyncError, SyncResult};
use crate::resolver::{MatchResult, VariantListing, VersionResolver};
use crate::ui::{
    wait_enabled, wait_for, wait_visible, Element, Locator, LocatorChain, UiError, UiResult,
    UiSession,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

// ============================================================================
// SELECTORS
// ============================================================================

const LISTING_ITEM: &str = "li.summary-item";
const LISTING_TITLE: &str = "h3.summary-item-title";
const LISTING_STATUS: &str = "collection-button-status-list span.ng-binding";
const VARIANT_BUTTON: &str = "li.summary-item button[add-to-collection-button]";
const TOOLBAR_BUTTON_CSS: &str = "button[ng-disabled='colltoolbarctrl.loading']";
const TOOLBAR_BUTTON_XPATH: &str = "//button[@ng-disabled='colltoolbarctrl.loading']";
const MODAL: &str = ".modal-dialog";
const SAVE_BUTTON: &str = "button[type='submit'].btn-primary:not([disabled])";
const SAVE_ACK: &str = "div.cg-notify-message-template span.ng-scope";
const PRIORITY_SELECT: &str = "select[ng-model='item.wishlistpriority']";

const CONSENT_BUTTON: &str = "button.fc-cta-consent, button.fc-button.fc-cta-consent.fc-primary-button";
const USERNAME_FIELDS: [&str; 2] = ["input#inputUsername", "input#username"];
const PASSWORD_FIELDS: [&str; 2] = ["input#inputPassword", "input#password"];
const LOGIN_SUBMIT: [&str; 3] = [
    "button[type='submit']",
    "button.login-submit",
    "button.btn-primary",
];

/// Booleans written from the work item, in form order. Wishlist is handled
/// separately; preordered and want-to-play are only ever reset.
const FORM_FLAGS: [StatusFlag; 5] = [
    StatusFlag::Own,
    StatusFlag::ForTrade,
    StatusFlag::Want,
    StatusFlag::WantToBuy,
    StatusFlag::PrevOwned,
];

fn checkbox_selector(flag: StatusFlag) -> String {
    format!("[ng-model='item.status.{}']", flag.key())
}

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvergenceState {
    Start,
    VariantSearch,
    Skip,
    ApplyBase,
    ApplyVariant,
    Verified,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemOutcome {
    /// Form saved and acknowledged
    Verified,
    /// A listed version already carries a collection status
    Skipped { label: String },
    Failed { reason: String },
}

/// What happened to one work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemReport {
    pub entity_id: u64,
    pub label: String,
    /// States entered, in order
    pub states: Vec<ConvergenceState>,
    /// Form fields written successfully, in order
    pub applied: Vec<StatusFlag>,
    /// Best-effort steps that failed, and other non-fatal findings
    pub notes: Vec<String>,
    pub outcome: ItemOutcome,
}

impl ItemReport {
    fn new(item: &WorkItem) -> Self {
        ItemReport {
            entity_id: item.entity_id(),
            label: item.display_label().to_string(),
            states: Vec::new(),
            applied: Vec::new(),
            notes: Vec::new(),
            outcome: ItemOutcome::Failed {
                reason: "not started".to_string(),
            },
        }
    }

    fn enter(&mut self, state: ConvergenceState) {
        debug!(entity_id = self.entity_id, ?state, "Convergence state");
        self.states.push(state);
    }

    fn note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    pub fn final_state(&self) -> Option<ConvergenceState> {
        self.states.last().copied()
    }

    pub fn is_verified(&self) -> bool {
        self.outcome == ItemOutcome::Verified
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, ItemOutcome::Skipped { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, ItemOutcome::Failed { .. })
    }
}

/// Which form gets opened once the version question is settled.
enum ApplyTarget {
    Base { reload: bool },
    Variant { label: String, position: usize },
}

// ============================================================================
// CONVERGENCE DRIVER
// ============================================================================

pub struct ConvergenceDriver {
    config: SyncConfig,
    resolver: VersionResolver,
}

impl ConvergenceDriver {
    pub fn new(config: SyncConfig) -> Self {
        ConvergenceDriver {
            config,
            resolver: VersionResolver::new(),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Converge one work item. Never returns an error: failures end up in
    /// the report and the next item starts fresh.
    pub fn converge(&self, session: &mut dyn UiSession, item: &WorkItem) -> ItemReport {
        let mut report = ItemReport::new(item);

        match self.drive(session, item, &mut report) {
            Ok(outcome) => report.outcome = outcome,
            Err(e) => {
                warn!(entity_id = item.entity_id(), error = %e, "Item failed");
                report.enter(ConvergenceState::Failed);
                report.outcome = ItemOutcome::Failed { reason: e.to_string() };
            }
        }

        report
    }

    fn drive(
        &self,
        session: &mut dyn UiSession,
        item: &WorkItem,
        report: &mut ItemReport,
    ) -> SyncResult<ItemOutcome> {
        report.enter(ConvergenceState::Start);
        let entity_url = self.config.entity_url(item.entity_id());
        info!(entity_id = item.entity_id(), "Opening entity page");
        step("open entity page", session.navigate(&entity_url))?;
        session.pause(self.config.navigation_settle());

        let target = match self.resolver.listing_language(item) {
            None => ApplyTarget::Base { reload: false },
            Some(language) => {
                report.enter(ConvergenceState::VariantSearch);
                match self.search_variant(session, item, language, report) {
                    MatchResult::AlreadyConverged { label, position } => {
                        report.enter(ConvergenceState::Skip);
                        info!(
                            entity_id = item.entity_id(),
                            %label,
                            position,
                            "Version already in collection/wishlist"
                        );
                        return Ok(ItemOutcome::Skipped { label });
                    }
                    MatchResult::FoundVariant { label, position } => {
                        ApplyTarget::Variant { label, position }
                    }
                    MatchResult::NotFound => {
                        let miss = SyncError::VariantNotFound {
                            entity_id: item.entity_id(),
                            targets: self.resolver.targets(item),
                        };
                        warn!(
                            entity_id = item.entity_id(),
                            error = %miss,
                            "Falling back to base entity"
                        );
                        report.note(miss.to_string());
                        ApplyTarget::Base { reload: true }
                    }
                    MatchResult::NoVariantNeeded => ApplyTarget::Base { reload: true },
                }
            }
        };

        match &target {
            ApplyTarget::Base { reload } => {
                report.enter(ConvergenceState::ApplyBase);
                if *reload {
                    step("reload entity page", session.navigate(&entity_url))?;
                    session.pause(self.config.navigation_settle());
                }
                self.open_base_form(session)?;
            }
            ApplyTarget::Variant { position, .. } => {
                report.enter(ConvergenceState::ApplyVariant);
                self.open_variant_form(session, *position)?;
            }
        }

        self.wait_for_modal(session)?;
        self.set_fields(session, item, report);
        self.save(session)?;

        report.enter(ConvergenceState::Verified);
        match &target {
            ApplyTarget::Variant { label, .. } => {
                info!(entity_id = item.entity_id(), %label, "Added version")
            }
            ApplyTarget::Base { .. } => {
                let title = session.title().unwrap_or_default();
                info!(entity_id = item.entity_id(), saved = page_name(&title), "Saved");
            }
        }
        Ok(ItemOutcome::Verified)
    }

    // ------------------------------------------------------------------------
    // Version search
    // ------------------------------------------------------------------------

    fn search_variant(
        &self,
        session: &mut dyn UiSession,
        item: &WorkItem,
        language: &str,
        report: &mut ItemReport,
    ) -> MatchResult {
        let listing = session
            .current_url()
            .and_then(|current| {
                let url = versions_url(&current, language);
                debug!(%url, "Opening versions listing");
                session.navigate(&url)
            })
            .and_then(|_| {
                session.pause(self.config.navigation_settle());
                read_variant_listing(session)
            });

        match listing {
            Ok(listing) => {
                debug!(
                    entity_id = item.entity_id(),
                    entries = listing.len(),
                    "Versions listing read"
                );
                self.resolver.resolve(item, &listing)
            }
            Err(e) => {
                warn!(entity_id = item.entity_id(), error = %e, "Could not read versions listing");
                report.note(format!("versions listing unreadable: {}", e));
                MatchResult::NotFound
            }
        }
    }

    // ------------------------------------------------------------------------
    // Opening the form (load-bearing)
    // ------------------------------------------------------------------------

    fn open_base_form(&self, session: &mut dyn UiSession) -> SyncResult<()> {
        let chain = LocatorChain::new(
            "add to collection button",
            vec![Locator::css(TOOLBAR_BUTTON_CSS), Locator::xpath(TOOLBAR_BUTTON_XPATH)],
        );
        let buttons = step(
            "locate add to collection button",
            wait_for(session, &chain, self.config.long_timeout()),
        )?;
        let button = first(buttons, &chain.label)?;
        step(
            "click add to collection button",
            self.click_when_ready(session, &button, &chain.label, self.config.long_timeout()),
        )
    }

    fn open_variant_form(&self, session: &mut dyn UiSession, position: usize) -> SyncResult<()> {
        let chain = LocatorChain::css("add to collection (version)", &[VARIANT_BUTTON]);
        let buttons = step(
            "locate version buttons",
            wait_for(session, &chain, self.config.step_timeout()),
        )?;
        let count = buttons.len();
        let button = buttons.into_iter().nth(position).ok_or_else(|| {
            SyncError::Ui(UiError::NoSuchElement(format!(
                "version button #{} (only {} listed)",
                position, count
            )))
        })?;

        step(
            "click version button",
            self.click_when_ready(session, &button, &chain.label, self.config.step_timeout()),
        )?;
        session.pause(self.config.navigation_settle());
        Ok(())
    }

    fn wait_for_modal(&self, session: &mut dyn UiSession) -> SyncResult<()> {
        let chain = LocatorChain::css("collection form", &[MODAL]);
        let found = step(
            "open collection form",
            wait_for(session, &chain, self.config.step_timeout()),
        )?;
        let modal = first(found, &chain.label)?;
        step(
            "collection form visible",
            wait_visible(session, &modal, self.config.step_timeout()),
        )
    }

    // ------------------------------------------------------------------------
    // Form fields (best-effort)
    // ------------------------------------------------------------------------

    fn set_fields(&self, session: &mut dyn UiSession, item: &WorkItem, report: &mut ItemReport) {
        let status = &item.entry.status;

        self.reset_checkboxes(session, report);

        for flag in FORM_FLAGS {
            self.set_checkbox(session, flag, status.is_set(flag), report);
        }

        if status.is_set(StatusFlag::Wishlist) {
            self.set_checkbox(session, StatusFlag::Wishlist, true, report);
            if let Some(priority) = status.priority() {
                self.set_priority(session, priority, report);
            }
            if let Some(text) = status.text(StatusFlag::WishlistComment) {
                self.set_textarea(session, StatusFlag::WishlistComment, text, report);
            }
        }

        if let Some(text) = status.text(StatusFlag::Comment) {
            self.set_textarea(session, StatusFlag::Comment, text, report);
        }
    }

    /// Uncheck every boolean the form may still carry from a previous item.
    fn reset_checkboxes(&self, session: &mut dyn UiSession, report: &mut ItemReport) {
        for flag in StatusFlag::BOOLEANS {
            if let Err(e) = uncheck(session, &Locator::css(checkbox_selector(flag))) {
                warn!(flag = flag.label(), error = %e, "Could not reset checkbox");
                report.note(format!("reset {}: {}", flag.label(), e));
            }
        }
        if self.config.log.trace_steps {
            debug!("Reset all checkboxes");
        }
    }

    fn set_checkbox(
        &self,
        session: &mut dyn UiSession,
        flag: StatusFlag,
        checked: bool,
        report: &mut ItemReport,
    ) {
        let chain = LocatorChain::new(flag.label(), vec![Locator::css(checkbox_selector(flag))]);
        let timeout = self.config.step_timeout();

        let result = wait_for(session, &chain, timeout)
            .and_then(|found| first_ui(found, &chain.label))
            .and_then(|checkbox| {
                wait_visible(session, &checkbox, timeout)?;
                if session.is_selected(&checkbox)? != checked {
                    session.click(&checkbox)?;
                    if self.config.log.trace_steps {
                        debug!(flag = flag.label(), checked, "Checkbox set");
                    }
                } else if self.config.log.trace_steps {
                    debug!(flag = flag.label(), checked, "Checkbox already in place");
                }
                Ok(())
            });

        match result {
            Ok(()) => report.applied.push(flag),
            Err(e) => {
                warn!(flag = flag.label(), error = %e, "Could not set checkbox");
                report.note(format!("set {}: {}", flag.label(), e));
            }
        }
    }

    fn set_priority(&self, session: &mut dyn UiSession, priority: u8, report: &mut ItemReport) {
        let typed = format!("{} option[value='number:{}']", PRIORITY_SELECT, priority);
        let plain = format!("{} option[value='{}']", PRIORITY_SELECT, priority);
        let chain = LocatorChain::css("wishlist priority", &[typed.as_str(), plain.as_str()]);

        let result = wait_for(session, &chain, self.config.step_timeout())
            .and_then(|found| first_ui(found, &chain.label))
            .and_then(|option| session.click(&option));

        match result {
            Ok(()) => report.applied.push(StatusFlag::WishlistPriority),
            Err(e) => {
                warn!(priority, error = %e, "Could not set wishlist priority");
                report.note(format!("set {}: {}", StatusFlag::WishlistPriority.label(), e));
            }
        }
    }

    fn set_textarea(
        &self,
        session: &mut dyn UiSession,
        flag: StatusFlag,
        text: &str,
        report: &mut ItemReport,
    ) {
        let by_tag = format!("textarea#{}", flag.key());
        let by_id = format!("#{}", flag.key());
        let chain = LocatorChain::css(flag.label(), &[by_tag.as_str(), by_id.as_str()]);

        let result = wait_for(session, &chain, self.config.long_timeout())
            .and_then(|found| first_ui(found, &chain.label))
            .and_then(|area| {
                wait_visible(session, &area, self.config.step_timeout())?;
                session.set_text(&area, text)
            });

        match result {
            Ok(()) => {
                if self.config.log.trace_steps {
                    debug!(field = flag.label(), "Text set");
                }
                report.applied.push(flag);
            }
            Err(e) => {
                warn!(field = flag.label(), error = %e, "Could not set text");
                report.note(format!("set {}: {}", flag.label(), e));
            }
        }
    }

    // ------------------------------------------------------------------------
    // Save (load-bearing)
    // ------------------------------------------------------------------------

    fn save(&self, session: &mut dyn UiSession) -> SyncResult<()> {
        let chain = LocatorChain::css("save button", &[SAVE_BUTTON]);
        let found = step(
            "locate save button",
            wait_for(session, &chain, self.config.step_timeout()),
        )?;
        let button = first(found, &chain.label)?;
        step(
            "click save button",
            self.click_when_ready(session, &button, &chain.label, self.config.step_timeout()),
        )?;

        let ack = LocatorChain::css("save acknowledgement", &[SAVE_ACK]);
        step("save acknowledgement", wait_for(session, &ack, self.config.long_timeout()))?;
        Ok(())
    }

    /// Wait visible, wait enabled, settle, click.
    fn click_when_ready(
        &self,
        session: &mut dyn UiSession,
        element: &Element,
        label: &str,
        enabled_timeout: Duration,
    ) -> UiResult<()> {
        if self.config.log.trace_steps {
            debug!(control = label, "Waiting for control to be clickable");
        }
        wait_visible(session, element, self.config.step_timeout())?;
        wait_enabled(session, element, enabled_timeout)?;
        session.pause(self.config.click_settle());
        session.click(element)?;
        if self.config.log.trace_steps {
            debug!(control = label, "Clicked");
        }
        Ok(())
    }
}

// ============================================================================
// LISTING + HELPERS
// ============================================================================

/// Versions page of the entity page at `current_url`, filtered to one language.
pub fn versions_url(current_url: &str, language: &str) -> String {
    format!(
        "{}/versions?pageid=1&language={}",
        current_url.trim_end_matches('/'),
        language
    )
}

/// Read the rendered versions listing in display order.
///
/// Entries without a title are not counted, so positions line up with the
/// per-entry "add to collection" buttons.
pub fn read_variant_listing(session: &mut dyn UiSession) -> UiResult<Vec<VariantListing>> {
    let title = Locator::css(LISTING_TITLE);
    let status = Locator::css(LISTING_STATUS);
    let mut listing = Vec::new();

    for container in session.find_all(&Locator::css(LISTING_ITEM))? {
        let Some(heading) = session.find_within(&container, &title)?.into_iter().next() else {
            continue;
        };
        let label = session.visible_text(&heading)?;
        let has_existing_status = !session.find_within(&container, &status)?.is_empty();
        listing.push(VariantListing::new(label, has_existing_status));
    }

    Ok(listing)
}

fn uncheck(session: &mut dyn UiSession, locator: &Locator) -> UiResult<()> {
    let checkbox = first_ui(session.find_all(locator)?, &locator.to_string())?;
    if session.is_selected(&checkbox)? {
        session.click(&checkbox)?;
    }
    Ok(())
}

/// Page title without the site suffix ("Catan | Board Game | ..." → "Catan").
fn page_name(title: &str) -> &str {
    title.split('|').next().map(str::trim).unwrap_or(title)
}

fn first_ui(found: Vec<Element>, label: &str) -> UiResult<Element> {
    found
        .into_iter()
        .next()
        .ok_or_else(|| UiError::NoSuchElement(label.to_string()))
}

fn first(found: Vec<Element>, label: &str) -> SyncResult<Element> {
    Ok(first_ui(found, label)?)
}

/// Attach the step name to timeouts of a load-bearing step.
fn step<T>(name: &str, result: UiResult<T>) -> SyncResult<T> {
    result.map_err(|e| match e {
        UiError::Timeout { after, .. } => SyncError::StepTimeout {
            step: name.to_string(),
            timeout: after,
        },
        other => SyncError::Ui(other),
    })
}

// ============================================================================
// LOGIN
// ============================================================================

fn auth_missing(what: &str) -> SyncError {
    SyncError::AuthenticationFailed(what.to_string())
}

/// Log in through the site's login form. Any failure here is fatal.
pub fn login(
    session: &mut dyn UiSession,
    config: &SyncConfig,
    username: &str,
    password: &str,
) -> SyncResult<()> {
    info!("Logging in");
    let auth = |e: UiError| SyncError::AuthenticationFailed(e.to_string());

    session.navigate(&config.login_url()).map_err(auth)?;

    let consent = LocatorChain::css("cookie consent", &[CONSENT_BUTTON]);
    let banner = wait_for(session, &consent, config.step_timeout())
        .and_then(|found| first_ui(found, &consent.label));
    match banner {
        Ok(button) => match session.click(&button) {
            Ok(()) => info!("Cookie consent accepted"),
            Err(e) => warn!(error = %e, "Could not accept cookie consent"),
        },
        Err(_) => info!("Cookie consent not found, continuing"),
    }

    let user_chain = LocatorChain::css("username field", &USERNAME_FIELDS);
    let user_field = wait_for(session, &user_chain, config.step_timeout())
        .and_then(|found| first_ui(found, &user_chain.label))
        .map_err(|_| auth_missing("username field not found on login page"))?;

    let pass_chain = LocatorChain::css("password field", &PASSWORD_FIELDS);
    let pass_field = pass_chain
        .first_match(session)
        .and_then(|(_, found)| found.into_iter().next())
        .ok_or_else(|| auth_missing("password field not found on login page"))?;

    session.set_text(&user_field, username).map_err(auth)?;
    session.set_text(&pass_field, password).map_err(auth)?;

    let submit_chain = LocatorChain::css("login button", &LOGIN_SUBMIT);
    let submit = submit_chain
        .first_match(session)
        .and_then(|(_, found)| found.into_iter().next())
        .ok_or_else(|| auth_missing("login submit button not found"))?;
    session.click(&submit).map_err(auth)?;

    session.pause(config.login_settle());
    let title = session.title().map_err(auth)?;
    if title != config.login_title {
        return Err(SyncError::AuthenticationFailed(format!(
            "landed on \"{}\"; check username and password",
            title
        )));
    }

    info!("Login succeeded");
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
