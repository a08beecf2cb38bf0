// Shared fakes for the integration tests: a scripted browser session and a
// scripted collection API.
#![allow(dead_code)]

use collection_sync::{
    ApiResponse, CollectionApi, Element, Locator, SyncConfig, SyncResult, UiError, UiResult,
    UiSession,
};
use std::cell::Cell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;
use std::time::Duration;

pub const BASE: &str = "https://bgg.test";

pub const TOOLBAR: &str = "button[ng-disabled='colltoolbarctrl.loading']";
pub const MODAL: &str = ".modal-dialog";
pub const SAVE: &str = "button[type='submit'].btn-primary:not([disabled])";
pub const ACK: &str = "div.cg-notify-message-template span.ng-scope";
pub const LISTING_ITEM: &str = "li.summary-item";
pub const LISTING_TITLE: &str = "h3.summary-item-title";
pub const LISTING_STATUS: &str = "collection-button-status-list span.ng-binding";
pub const VARIANT_BUTTON: &str = "li.summary-item button[add-to-collection-button]";

pub const LOGIN_TITLE: &str = "BoardGameGeek | Gaming Unplugged Since 2000";

const CHECKBOXES: [&str; 8] = [
    "own",
    "fortrade",
    "want",
    "wanttobuy",
    "prevowned",
    "wishlist",
    "preordered",
    "wanttoplay",
];

/// Fast timeouts; the fake session never really sleeps anyway.
pub fn test_config() -> SyncConfig {
    SyncConfig {
        base_url: BASE.to_string(),
        step_timeout_ms: 20,
        long_timeout_ms: 40,
        poll_interval_ms: 10,
        navigation_settle_ms: 1,
        click_settle_ms: 1,
        login_settle_ms: 1,
        item_delay_ms: 1,
        ..SyncConfig::default()
    }
}

pub fn entity_url(id: u64) -> String {
    format!("{}/boardgame/{}", BASE, id)
}

pub fn versions_url(id: u64, language: &str) -> String {
    format!("{}/versions?pageid=1&language={}", entity_url(id), language)
}

pub fn checkbox_id(key: &str) -> String {
    format!("cb-{}", key)
}

// ============================================================================
// DOM
// ============================================================================

/// Locator value → element ids, plus (parent, locator value) → child ids.
#[derive(Debug, Clone, Default)]
pub struct Dom {
    pub found: HashMap<String, Vec<String>>,
    pub within: HashMap<(String, String), Vec<String>>,
}

impl Dom {
    pub fn add(&mut self, selector: &str, id: &str) -> &mut Self {
        let ids = self.found.entry(selector.to_string()).or_default();
        if !ids.iter().any(|existing| existing == id) {
            ids.push(id.to_string());
        }
        self
    }

    pub fn add_within(&mut self, parent: &str, selector: &str, id: &str) -> &mut Self {
        self.within
            .entry((parent.to_string(), selector.to_string()))
            .or_default()
            .push(id.to_string());
        self
    }

    /// The collection form's controls: checkboxes, priority options, text areas, save.
    pub fn with_form(mut self) -> Self {
        for key in CHECKBOXES {
            self.add(&format!("[ng-model='item.status.{}']", key), &checkbox_id(key));
        }
        for priority in 1..=5 {
            self.add(
                &format!(
                    "select[ng-model='item.wishlistpriority'] option[value='number:{}']",
                    priority
                ),
                &format!("priority-{}", priority),
            );
        }
        self.add("textarea#comment", "comment");
        self.add("textarea#wishlistcomment", "wishlistcomment");
        self.add(SAVE, "save");
        self
    }

    /// Entity page: toolbar button plus the (initially closed) form.
    pub fn entity_page() -> Self {
        let mut dom = Dom::default().with_form();
        dom.add(TOOLBAR, "toolbar");
        dom
    }

    /// Versions page listing `(title, has status)` entries in order.
    pub fn versions_page(entries: &[(&str, bool)]) -> Self {
        let mut dom = Dom::default().with_form();
        for (index, (_, has_status)) in entries.iter().enumerate() {
            let item = format!("li-{}", index);
            dom.add(LISTING_ITEM, &item);
            dom.add_within(&item, LISTING_TITLE, &format!("title-{}", index));
            if *has_status {
                dom.add_within(&item, LISTING_STATUS, &format!("status-{}", index));
            }
            dom.add(VARIANT_BUTTON, &format!("vb-{}", index));
        }
        dom
    }

    /// Login page with optional cookie consent button.
    pub fn login_page(with_consent: bool) -> Self {
        let mut dom = Dom::default();
        if with_consent {
            dom.add(
                "button.fc-cta-consent, button.fc-button.fc-cta-consent.fc-primary-button",
                "consent",
            );
        }
        dom.add("input#inputUsername", "username");
        dom.add("input#inputPassword", "password");
        dom.add("button[type='submit']", "login");
        dom
    }
}

// ============================================================================
// FAKE SESSION
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct FakeElement {
    pub hidden: bool,
    pub disabled: bool,
    pub selected: bool,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Navigate(String),
    Click(String),
    SetText(String, String),
}

#[derive(Default)]
pub struct FakeSession {
    pages: HashMap<String, Dom>,
    page_titles: HashMap<String, String>,
    dom: Dom,
    url: String,
    title: String,
    pub elements: HashMap<String, FakeElement>,
    reveals: HashMap<String, Vec<(String, String)>>,
    click_titles: HashMap<String, String>,
    failing_clicks: HashSet<String>,
    pub actions: Vec<Action>,
    pub pauses: Vec<Duration>,
    pub closes: Rc<Cell<usize>>,
}

impl FakeSession {
    /// Session wired like the real site: the toolbar and every version button
    /// open the form, saving shows the acknowledgement.
    pub fn new() -> Self {
        let mut session = FakeSession::default();
        session.reveal_on_click("toolbar", MODAL, "modal");
        session.reveal_on_click("save", ACK, "ack");
        for index in 0..10 {
            session.reveal_on_click(&format!("vb-{}", index), MODAL, "modal");
        }
        session
    }

    pub fn page(&mut self, url: &str, dom: Dom) -> &mut Self {
        self.pages.insert(url.to_string(), dom);
        self
    }

    pub fn page_title(&mut self, url: &str, title: &str) -> &mut Self {
        self.page_titles.insert(url.to_string(), title.to_string());
        self
    }

    pub fn reveal_on_click(&mut self, id: &str, selector: &str, revealed: &str) -> &mut Self {
        self.reveals
            .entry(id.to_string())
            .or_default()
            .push((selector.to_string(), revealed.to_string()));
        self
    }

    pub fn without_reveal(&mut self, id: &str) -> &mut Self {
        self.reveals.remove(id);
        self
    }

    pub fn title_on_click(&mut self, id: &str, title: &str) -> &mut Self {
        self.click_titles.insert(id.to_string(), title.to_string());
        self
    }

    pub fn fail_click(&mut self, id: &str) -> &mut Self {
        self.failing_clicks.insert(id.to_string());
        self
    }

    pub fn element(&mut self, id: &str) -> &mut FakeElement {
        self.elements.entry(id.to_string()).or_default()
    }

    pub fn is_checked(&self, key: &str) -> bool {
        self.elements
            .get(&checkbox_id(key))
            .map(|e| e.selected)
            .unwrap_or(false)
    }

    pub fn clicks(&self) -> Vec<String> {
        self.actions
            .iter()
            .filter_map(|a| match a {
                Action::Click(id) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.actions
            .iter()
            .filter_map(|a| match a {
                Action::Navigate(url) => Some(url.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn position_of(&self, action: &Action) -> Option<usize> {
        self.actions.iter().position(|a| a == action)
    }

    fn props(&self, element: &Element) -> FakeElement {
        self.elements.get(element.id()).cloned().unwrap_or_default()
    }
}

impl UiSession for FakeSession {
    fn navigate(&mut self, url: &str) -> UiResult<()> {
        self.actions.push(Action::Navigate(url.to_string()));
        self.url = url.to_string();
        self.dom = self.pages.get(url).cloned().unwrap_or_default();
        if let Some(title) = self.page_titles.get(url) {
            self.title = title.clone();
        }
        Ok(())
    }

    fn current_url(&mut self) -> UiResult<String> {
        Ok(self.url.clone())
    }

    fn title(&mut self) -> UiResult<String> {
        Ok(self.title.clone())
    }

    fn find_all(&mut self, locator: &Locator) -> UiResult<Vec<Element>> {
        Ok(self
            .dom
            .found
            .get(&locator.value)
            .map(|ids| ids.iter().cloned().map(Element).collect())
            .unwrap_or_default())
    }

    fn find_within(&mut self, parent: &Element, locator: &Locator) -> UiResult<Vec<Element>> {
        Ok(self
            .dom
            .within
            .get(&(parent.id().to_string(), locator.value.clone()))
            .map(|ids| ids.iter().cloned().map(Element).collect())
            .unwrap_or_default())
    }

    fn is_displayed(&mut self, element: &Element) -> UiResult<bool> {
        Ok(!self.props(element).hidden)
    }

    fn is_enabled(&mut self, element: &Element) -> UiResult<bool> {
        Ok(!self.props(element).disabled)
    }

    fn is_selected(&mut self, element: &Element) -> UiResult<bool> {
        Ok(self.props(element).selected)
    }

    fn click(&mut self, element: &Element) -> UiResult<()> {
        let id = element.id().to_string();
        if self.failing_clicks.contains(&id) {
            return Err(UiError::Protocol(format!("element click intercepted: {}", id)));
        }
        self.actions.push(Action::Click(id.clone()));

        let props = self.element(&id);
        props.selected = !props.selected;

        if let Some(reveals) = self.reveals.get(&id).cloned() {
            for (selector, revealed) in reveals {
                self.dom.add(&selector, &revealed);
            }
        }
        if let Some(title) = self.click_titles.get(&id) {
            self.title = title.clone();
        }
        Ok(())
    }

    fn set_text(&mut self, element: &Element, text: &str) -> UiResult<()> {
        self.actions
            .push(Action::SetText(element.id().to_string(), text.to_string()));
        self.element(element.id()).text = text.to_string();
        Ok(())
    }

    fn visible_text(&mut self, element: &Element) -> UiResult<String> {
        Ok(self.props(element).text)
    }

    fn pause(&mut self, duration: Duration) {
        self.pauses.push(duration);
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(10)
    }

    fn close(&mut self) -> UiResult<()> {
        self.closes.set(self.closes.get() + 1);
        Ok(())
    }
}

/// Versions page entries get their titles through `visible_text`.
pub fn set_listing_titles(session: &mut FakeSession, titles: &[&str]) {
    for (index, title) in titles.iter().enumerate() {
        session.element(&format!("title-{}", index)).text = title.to_string();
    }
}

// ============================================================================
// FAKE COLLECTION API
// ============================================================================

pub struct ScriptedApi {
    responses: VecDeque<SyncResult<ApiResponse>>,
    pub calls: usize,
    pub usernames: Vec<String>,
}

impl ScriptedApi {
    pub fn new(responses: Vec<SyncResult<ApiResponse>>) -> Self {
        ScriptedApi {
            responses: responses.into(),
            calls: 0,
            usernames: Vec::new(),
        }
    }
}

impl CollectionApi for ScriptedApi {
    fn request_collection(&mut self, username: &str) -> SyncResult<ApiResponse> {
        self.calls += 1;
        self.usernames.push(username.to_string());
        self.responses.pop_front().unwrap_or(Ok(ApiResponse::Pending))
    }
}

/// Collection export XML for `(id, name, own)` items.
pub fn collection_xml(items: &[(u64, &str, bool)]) -> String {
    let mut xml = format!(r#"<items totalitems="{}" termsofuse="x" pubdate="y">"#, items.len());
    for (id, name, own) in items {
        xml.push_str(&format!(
            r#"<item objecttype="thing" objectid="{}" subtype="boardgame"><name sortindex="1">{}</name><status own="{}" prevowned="0" fortrade="0" want="0" wanttoplay="0" wanttobuy="0" wishlist="0" preordered="0"/></item>"#,
            id,
            name,
            if *own { 1 } else { 0 }
        ));
    }
    xml.push_str("</items>");
    xml
}
