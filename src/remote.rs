// 🌍 Remote collection - fetch the user's existing collection over HTTP
//
// The collection endpoint answers 202 while it prepares the export. Those
// answers are retried with a fixed backoff up to a cap; anything else that
// goes wrong here is a transport failure and ends the run.

use crate::error::{SyncError, SyncResult};
use crate::retry::RetryPolicy;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

// ============================================================================
// RAW RECORD
// ============================================================================

/// One `<item>` of the collection export, undecoded beyond strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawExistingRecord {
    pub object_id: String,
    pub name: String,
    pub year_published: Option<String>,
    /// Attributes of the `<status>` element, e.g. own="1"
    pub status: BTreeMap<String, String>,
    pub comment: Option<String>,
    pub wishlist_comment: Option<String>,
}

// ============================================================================
// API TRAIT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiResponse {
    /// Export not ready yet; ask again later
    Pending,
    /// XML body of the export
    Ready(String),
}

/// Single request against the collection endpoint.
pub trait CollectionApi {
    fn request_collection(&mut self, username: &str) -> SyncResult<ApiResponse>;
}

/// `GET {base}/xmlapi2/collection?username=...` over ureq.
pub struct HttpCollectionApi {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpCollectionApi {
    pub fn new(base_url: &str) -> Self {
        HttpCollectionApi {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent: ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(60))
                .build(),
        }
    }

    pub fn collection_url(&self, username: &str) -> String {
        format!(
            "{}/xmlapi2/collection?username={}",
            self.base_url,
            urlencoding::encode(username)
        )
    }
}

impl CollectionApi for HttpCollectionApi {
    fn request_collection(&mut self, username: &str) -> SyncResult<ApiResponse> {
        let url = self.collection_url(username);
        debug!(%url, "Requesting collection");

        match self
            .agent
            .get(&url)
            .set("User-Agent", "collection-sync")
            .call()
        {
            Ok(response) if response.status() == 202 => Ok(ApiResponse::Pending),
            Ok(response) => response
                .into_string()
                .map(ApiResponse::Ready)
                .map_err(|e| {
                    SyncError::TransportFailure(format!("unreadable response body: {}", e))
                }),
            Err(ureq::Error::Status(502, _)) => Err(SyncError::TransportFailure(
                "server seems to be down (502)".to_string(),
            )),
            Err(ureq::Error::Status(code, _)) => Err(SyncError::TransportFailure(format!(
                "collection request for {} returned HTTP {}",
                url, code
            ))),
            Err(e) => Err(SyncError::TransportFailure(format!(
                "collection request for {} failed: {}",
                url, e
            ))),
        }
    }
}

// ============================================================================
// FETCHER (bounded pending loop)
// ============================================================================

pub struct CollectionFetcher<A: CollectionApi> {
    api: A,
    policy: RetryPolicy,
    sleeper: Box<dyn FnMut(Duration)>,
}

impl<A: CollectionApi> CollectionFetcher<A> {
    pub fn new(api: A, policy: RetryPolicy) -> Self {
        CollectionFetcher {
            api,
            policy,
            sleeper: Box::new(std::thread::sleep),
        }
    }

    /// Builder: replace how the backoff is waited out
    pub fn with_sleeper(mut self, sleeper: impl FnMut(Duration) + 'static) -> Self {
        self.sleeper = Box::new(sleeper);
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Fetch and decode the existing collection, waiting out "pending" answers.
    pub fn fetch_existing(&mut self, username: &str) -> SyncResult<Vec<RawExistingRecord>> {
        let mut retries = 0;
        loop {
            info!(user = username, attempt = retries + 1, "Fetching existing collection");

            match self.api.request_collection(username)? {
                ApiResponse::Ready(body) => {
                    let records = decode_collection(&body)?;
                    info!(found = records.len(), "Access to collection successful");
                    return Ok(records);
                }
                ApiResponse::Pending => {
                    if !self.policy.should_retry(retries) {
                        return Err(SyncError::TransportFailure(format!(
                            "collection still pending after {} retries ({:?})",
                            retries,
                            self.policy.total_budget()
                        )));
                    }
                    let delay = self.policy.delay(retries);
                    warn!(
                        retry_in_ms = delay.as_millis() as u64,
                        "Collection export not ready yet, retrying"
                    );
                    (self.sleeper)(delay);
                    retries += 1;
                }
            }
        }
    }
}

// ============================================================================
// XML DECODING
// ============================================================================

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().into_inner()).to_string()
}

fn attributes(e: &BytesStart<'_>) -> BTreeMap<String, String> {
    e.attributes()
        .flatten()
        .map(|attr| {
            let key = String::from_utf8_lossy(attr.key.local_name().into_inner()).to_string();
            let value = attr
                .unescape_value()
                .map(|v| v.to_string())
                .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).to_string());
            (key, value)
        })
        .collect()
}

/// Decode a collection export into raw records.
///
/// An `<errors>` document (e.g. unknown user) is a transport failure.
pub fn decode_collection(xml: &str) -> SyncResult<Vec<RawExistingRecord>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut records = Vec::new();
    let mut current: Option<RawExistingRecord> = None;
    let mut current_element = String::new();
    let mut in_errors = false;
    let mut error_messages: Vec<String> = Vec::new();

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = local_name(e);
                match name.as_str() {
                    "errors" => in_errors = true,
                    "item" => {
                        current = Some(RawExistingRecord {
                            object_id: attributes(e).remove("objectid").unwrap_or_default(),
                            ..RawExistingRecord::default()
                        });
                    }
                    "status" => {
                        if let Some(record) = current.as_mut() {
                            record.status = attributes(e);
                        }
                    }
                    _ => {}
                }
                current_element = name;
            }
            Ok(Event::Empty(ref e)) => match local_name(e).as_str() {
                "status" => {
                    if let Some(record) = current.as_mut() {
                        record.status = attributes(e);
                    }
                }
                "item" => records.push(RawExistingRecord {
                    object_id: attributes(e).remove("objectid").unwrap_or_default(),
                    ..RawExistingRecord::default()
                }),
                _ => {}
            },
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().map(|t| t.to_string()).unwrap_or_default();
                if in_errors && current_element == "message" {
                    error_messages.push(text);
                } else if let Some(record) = current.as_mut() {
                    match current_element.as_str() {
                        "name" => record.name.push_str(&text),
                        "yearpublished" => record.year_published = Some(text),
                        "comment" => record.comment = Some(text),
                        "wishlistcomment" => record.wishlist_comment = Some(text),
                        _ => {}
                    }
                }
            }
            Ok(Event::End(ref e)) => {
                if e.local_name().into_inner() == b"item" {
                    if let Some(record) = current.take() {
                        records.push(record);
                    }
                }
                current_element.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(SyncError::TransportFailure(format!(
                    "XML parse error at byte {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    if in_errors {
        let message = if error_messages.is_empty() {
            "access to the existing collection failed".to_string()
        } else {
            error_messages.join("; ")
        };
        return Err(SyncError::TransportFailure(message));
    }

    Ok(records)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8" standalone="yes"?>
<items totalitems="2" termsofuse="https://boardgamegeek.com/xmlapi/termsofuse" pubdate="Sat, 01 Mar 2025 10:00:00 +0000">
  <item objecttype="thing" objectid="13" subtype="boardgame" collid="1001">
    <name sortindex="1">CATAN</name>
    <yearpublished>1995</yearpublished>
    <status own="1" prevowned="0" fortrade="0" want="0" wanttoplay="0" wanttobuy="0" wishlist="0" preordered="0" lastmodified="2024-01-01 10:00:00" />
    <numplays>3</numplays>
    <comment>Traded &amp; kept</comment>
  </item>
  <item objecttype="thing" objectid="822" subtype="boardgame" collid="1002">
    <name sortindex="1">Carcassonne</name>
    <status own="0" prevowned="0" fortrade="0" want="0" wanttoplay="0" wanttobuy="0" wishlist="1" wishlistpriority="2" preordered="0" lastmodified="2024-01-01 10:00:00" />
    <numplays>0</numplays>
    <wishlistcomment>Big box</wishlistcomment>
  </item>
</items>"#;

    struct ScriptedApi {
        responses: VecDeque<SyncResult<ApiResponse>>,
        calls: usize,
    }

    impl CollectionApi for ScriptedApi {
        fn request_collection(&mut self, _username: &str) -> SyncResult<ApiResponse> {
            self.calls += 1;
            self.responses
                .pop_front()
                .unwrap_or(Ok(ApiResponse::Pending))
        }
    }

    fn scripted(responses: Vec<SyncResult<ApiResponse>>) -> ScriptedApi {
        ScriptedApi {
            responses: responses.into(),
            calls: 0,
        }
    }

    #[test]
    fn test_decode_collection() {
        let records = decode_collection(SAMPLE).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].object_id, "13");
        assert_eq!(records[0].name, "CATAN");
        assert_eq!(records[0].year_published.as_deref(), Some("1995"));
        assert_eq!(records[0].status.get("own").map(String::as_str), Some("1"));
        assert_eq!(records[0].comment.as_deref(), Some("Traded & kept"));
        assert_eq!(records[1].status.get("wishlistpriority").map(String::as_str), Some("2"));
        assert_eq!(records[1].wishlist_comment.as_deref(), Some("Big box"));
        assert_eq!(records[1].year_published, None);
    }

    #[test]
    fn test_decode_empty_collection() {
        let xml = r#"<items totalitems="0" termsofuse="x" pubdate="y"></items>"#;
        assert!(decode_collection(xml).unwrap().is_empty());
    }

    #[test]
    fn test_decode_errors_document() {
        let xml = r#"<errors><error><message>Invalid username specified</message></error></errors>"#;
        let err = decode_collection(xml).unwrap_err();

        assert!(matches!(
            err,
            SyncError::TransportFailure(ref m) if m == "Invalid username specified"
        ));
    }

    #[test]
    fn test_pending_then_ready() {
        let slept = Rc::new(RefCell::new(Vec::new()));
        let recorder = Rc::clone(&slept);
        let api = scripted(vec![
            Ok(ApiResponse::Pending),
            Ok(ApiResponse::Pending),
            Ok(ApiResponse::Ready(SAMPLE.to_string())),
        ]);
        let mut fetcher = CollectionFetcher::new(api, RetryPolicy::fixed(5, Duration::from_secs(5)))
            .with_sleeper(move |d| recorder.borrow_mut().push(d));

        let records = fetcher.fetch_existing("alice").unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(fetcher.api().calls, 3);
        assert_eq!(*slept.borrow(), vec![Duration::from_secs(5), Duration::from_secs(5)]);
    }

    #[test]
    fn test_pending_cap_is_transport_failure() {
        let api = scripted(vec![]);
        let policy = RetryPolicy::fixed(2, Duration::from_millis(1));
        let mut fetcher = CollectionFetcher::new(api, policy).with_sleeper(|_| {});

        let err = fetcher.fetch_existing("alice").unwrap_err();

        match &err {
            SyncError::TransportFailure(message) => {
                assert!(message.contains("after 2 retries (2ms)"))
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(err.is_fatal());
        assert_eq!(fetcher.api().calls, 3);
    }

    #[test]
    fn test_transport_error_not_retried() {
        let api = scripted(vec![Err(SyncError::TransportFailure("502".to_string()))]);
        let mut fetcher = CollectionFetcher::new(api, RetryPolicy::default()).with_sleeper(|_| {});

        assert!(fetcher.fetch_existing("alice").is_err());
        assert_eq!(fetcher.api().calls, 1);
    }

    #[test]
    fn test_collection_url() {
        let api = HttpCollectionApi::new("https://boardgamegeek.com/");
        assert_eq!(
            api.collection_url("john doe"),
            "https://boardgamegeek.com/xmlapi2/collection?username=john%20doe"
        );
    }
}
