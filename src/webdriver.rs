// 🌐 WebDriver session - `UiSession` over the W3C WebDriver wire protocol
//
// Talks JSON over HTTP to a running chromedriver / geckodriver. One
// `WebDriverSession` is one browser session; it is closed with DELETE.

use crate::config::SyncConfig;
use crate::ui::{Element, Locator, LocatorKind, UiError, UiResult, UiSession};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

/// W3C element reference key
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52f-4a7e6f8c4a4c";

// ============================================================================
// CAPABILITIES
// ============================================================================

/// New-session capabilities for the chosen browser.
pub fn capabilities(firefox: bool, headless: bool) -> Value {
    let always_match = if firefox {
        let args: Vec<&str> = if headless { vec!["-headless"] } else { vec![] };
        json!({
            "browserName": "firefox",
            "moz:firefoxOptions": { "args": args }
        })
    } else {
        let args: Vec<&str> = if headless { vec!["--headless=new"] } else { vec![] };
        json!({
            "browserName": "chrome",
            "goog:chromeOptions": { "args": args }
        })
    };

    json!({ "capabilities": { "alwaysMatch": always_match } })
}

fn locator_body(locator: &Locator) -> Value {
    let using = match locator.kind {
        LocatorKind::Css => "css selector",
        LocatorKind::XPath => "xpath",
    };
    json!({ "using": using, "value": locator.value })
}

/// Element references out of a find-elements answer.
pub fn parse_elements(value: &Value) -> UiResult<Vec<Element>> {
    let items = value
        .as_array()
        .ok_or_else(|| UiError::Protocol(format!("expected element list, got {}", value)))?;

    items
        .iter()
        .map(|item| {
            item.get(ELEMENT_KEY)
                .and_then(Value::as_str)
                .map(|id| Element(id.to_string()))
                .ok_or_else(|| UiError::Protocol(format!("malformed element reference {}", item)))
        })
        .collect()
}

/// Map an error answer (`{"value": {"error": ..., "message": ...}}`) to a `UiError`.
pub fn error_from_body(status: u16, body: &Value) -> UiError {
    let error = body["value"]["error"].as_str().unwrap_or("unknown error");
    let message = body["value"]["message"].as_str().unwrap_or("");

    match error {
        "no such element" => UiError::NoSuchElement(message.to_string()),
        "timeout" | "script timeout" => UiError::Timeout {
            what: message.to_string(),
            after: Duration::ZERO,
        },
        _ => UiError::Protocol(format!("HTTP {} {}: {}", status, error, message)),
    }
}

// ============================================================================
// SESSION
// ============================================================================

pub struct WebDriverSession {
    agent: ureq::Agent,
    endpoint: String,
    session_id: String,
    poll_interval: Duration,
}

impl WebDriverSession {
    /// Start a browser through the WebDriver endpoint in `config`.
    pub fn start(config: &SyncConfig) -> UiResult<Self> {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(120))
            .build();
        let endpoint = config.webdriver_url.trim_end_matches('/').to_string();
        let headless = !config.show_browser;

        let value = send(
            &agent,
            "POST",
            &format!("{}/session", endpoint),
            Some(capabilities(config.firefox, headless)),
        )?;
        let session_id = value["sessionId"]
            .as_str()
            .ok_or_else(|| UiError::Protocol(format!("new session answer without id: {}", value)))?
            .to_string();

        let browser = if config.firefox { "firefox" } else { "chrome" };
        info!(
            browser,
            headless,
            session = %session_id,
            "Browser session started"
        );

        let session = WebDriverSession {
            agent,
            endpoint,
            session_id,
            poll_interval: config.poll_interval(),
        };

        if !headless {
            session.command("POST", "/window/maximize", Some(json!({})))?;
        }
        Ok(session)
    }

    fn command(&self, method: &str, path: &str, body: Option<Value>) -> UiResult<Value> {
        let url = format!("{}/session/{}{}", self.endpoint, self.session_id, path);
        send(&self.agent, method, &url, body)
    }

    fn element_command(
        &self,
        method: &str,
        element: &Element,
        path: &str,
        body: Option<Value>,
    ) -> UiResult<Value> {
        self.command(method, &format!("/element/{}{}", element.id(), path), body)
    }

    fn element_flag(&self, element: &Element, path: &str) -> UiResult<bool> {
        let value = self.element_command("GET", element, path, None)?;
        value.as_bool().ok_or_else(|| {
            UiError::Protocol(format!("expected boolean from {}, got {}", path, value))
        })
    }

    fn string_value(value: Value, what: &str) -> UiResult<String> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| UiError::Protocol(format!("expected string {}, got {}", what, value)))
    }
}

/// One protocol round-trip. Returns the `value` member of the answer.
fn send(agent: &ureq::Agent, method: &str, url: &str, body: Option<Value>) -> UiResult<Value> {
    debug!(method, url, "WebDriver command");

    let request = agent.request(method, url);
    let result = match body {
        Some(body) => request.send_json(body),
        None => request.call(),
    };

    match result {
        Ok(response) => {
            let answer: Value = response
                .into_json()
                .map_err(|e| UiError::Protocol(format!("unreadable answer from {}: {}", url, e)))?;
            Ok(answer.get("value").cloned().unwrap_or(Value::Null))
        }
        Err(ureq::Error::Status(status, response)) => {
            let body: Value = response.into_json().unwrap_or(Value::Null);
            Err(error_from_body(status, &body))
        }
        Err(e) => Err(UiError::Transport(e.to_string())),
    }
}

impl UiSession for WebDriverSession {
    fn navigate(&mut self, url: &str) -> UiResult<()> {
        self.command("POST", "/url", Some(json!({ "url": url })))?;
        Ok(())
    }

    fn current_url(&mut self) -> UiResult<String> {
        let value = self.command("GET", "/url", None)?;
        Self::string_value(value, "url")
    }

    fn title(&mut self) -> UiResult<String> {
        let value = self.command("GET", "/title", None)?;
        Self::string_value(value, "title")
    }

    fn find_all(&mut self, locator: &Locator) -> UiResult<Vec<Element>> {
        let value = self.command("POST", "/elements", Some(locator_body(locator)))?;
        parse_elements(&value)
    }

    fn find_within(&mut self, parent: &Element, locator: &Locator) -> UiResult<Vec<Element>> {
        let value = self.element_command("POST", parent, "/elements", Some(locator_body(locator)))?;
        parse_elements(&value)
    }

    fn is_displayed(&mut self, element: &Element) -> UiResult<bool> {
        self.element_flag(element, "/displayed")
    }

    fn is_enabled(&mut self, element: &Element) -> UiResult<bool> {
        self.element_flag(element, "/enabled")
    }

    fn is_selected(&mut self, element: &Element) -> UiResult<bool> {
        self.element_flag(element, "/selected")
    }

    fn click(&mut self, element: &Element) -> UiResult<()> {
        self.element_command("POST", element, "/click", Some(json!({})))?;
        Ok(())
    }

    fn set_text(&mut self, element: &Element, text: &str) -> UiResult<()> {
        self.element_command("POST", element, "/clear", Some(json!({})))?;
        self.element_command("POST", element, "/value", Some(json!({ "text": text })))?;
        Ok(())
    }

    fn visible_text(&mut self, element: &Element) -> UiResult<String> {
        let value = self.element_command("GET", element, "/text", None)?;
        Self::string_value(value, "element text")
    }

    fn pause(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    fn close(&mut self) -> UiResult<()> {
        let url = format!("{}/session/{}", self.endpoint, self.session_id);
        send(&self.agent, "DELETE", &url, None)?;
        info!(session = %self.session_id, "Browser session closed");
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
