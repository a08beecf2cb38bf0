// 📦 Collection Entry - Canonical shape shared by desired and existing state
// Both the CSV rows and the remote API records end up as one of these.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// STATUS FLAGS
// ============================================================================

/// The closed set of status attributes a collection entry can carry.
///
/// Declaration order is the comparison order used by the matcher and the
/// iteration order of [`Status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatusFlag {
    Own,
    ForTrade,
    Want,
    WantToBuy,
    PrevOwned,
    Wishlist,
    WishlistPriority,
    Preordered,
    WantToPlay,
    Comment,
    WishlistComment,
}

/// What kind of value a flag holds. Decides how "absent" compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagKind {
    Boolean,
    Number,
    Text,
}

impl StatusFlag {
    pub const ALL: [StatusFlag; 11] = [
        StatusFlag::Own,
        StatusFlag::ForTrade,
        StatusFlag::Want,
        StatusFlag::WantToBuy,
        StatusFlag::PrevOwned,
        StatusFlag::Wishlist,
        StatusFlag::WishlistPriority,
        StatusFlag::Preordered,
        StatusFlag::WantToPlay,
        StatusFlag::Comment,
        StatusFlag::WishlistComment,
    ];

    /// Boolean flags, in the order the collection form exposes them.
    pub const BOOLEANS: [StatusFlag; 8] = [
        StatusFlag::Own,
        StatusFlag::ForTrade,
        StatusFlag::Want,
        StatusFlag::WantToBuy,
        StatusFlag::PrevOwned,
        StatusFlag::Wishlist,
        StatusFlag::Preordered,
        StatusFlag::WantToPlay,
    ];

    pub fn kind(&self) -> FlagKind {
        match self {
            StatusFlag::WishlistPriority => FlagKind::Number,
            StatusFlag::Comment | StatusFlag::WishlistComment => FlagKind::Text,
            _ => FlagKind::Boolean,
        }
    }

    /// Attribute name as used by the remote API and the form's `ng-model`.
    pub fn key(&self) -> &'static str {
        match self {
            StatusFlag::Own => "own",
            StatusFlag::ForTrade => "fortrade",
            StatusFlag::Want => "want",
            StatusFlag::WantToBuy => "wanttobuy",
            StatusFlag::PrevOwned => "prevowned",
            StatusFlag::Wishlist => "wishlist",
            StatusFlag::WishlistPriority => "wishlistpriority",
            StatusFlag::Preordered => "preordered",
            StatusFlag::WantToPlay => "wanttoplay",
            StatusFlag::Comment => "comment",
            StatusFlag::WishlistComment => "wishlistcomment",
        }
    }

    /// Human-readable label for log lines
    pub fn label(&self) -> &'static str {
        match self {
            StatusFlag::Own => "OWN",
            StatusFlag::ForTrade => "FOR TRADE",
            StatusFlag::Want => "WANT",
            StatusFlag::WantToBuy => "WANT TO BUY",
            StatusFlag::PrevOwned => "PREVIOUSLY OWNED",
            StatusFlag::Wishlist => "WISHLIST",
            StatusFlag::WishlistPriority => "WISHLIST PRIORITY",
            StatusFlag::Preordered => "PREORDERED",
            StatusFlag::WantToPlay => "WANT TO PLAY",
            StatusFlag::Comment => "COMMENT",
            StatusFlag::WishlistComment => "WISHLIST COMMENT",
        }
    }
}

impl fmt::Display for StatusFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A single flag value. Booleans, the wishlist priority and free text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatusValue {
    Bool(bool),
    Number(u8),
    Text(String),
}

impl fmt::Display for StatusValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusValue::Bool(b) => write!(f, "{}", b),
            StatusValue::Number(n) => write!(f, "{}", n),
            StatusValue::Text(s) => write!(f, "{:?}", s),
        }
    }
}

// ============================================================================
// STATUS MAP
// ============================================================================

/// Status flags of one entry. Unset flags are simply missing from the map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status(BTreeMap<StatusFlag, StatusValue>);

impl Status {
    pub fn new() -> Self {
        Status(BTreeMap::new())
    }

    pub fn set(&mut self, flag: StatusFlag, value: StatusValue) {
        self.0.insert(flag, value);
    }

    /// Builder: set a boolean flag
    pub fn with_bool(mut self, flag: StatusFlag, value: bool) -> Self {
        self.set(flag, StatusValue::Bool(value));
        self
    }

    /// Builder: set the wishlist priority
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.set(StatusFlag::WishlistPriority, StatusValue::Number(priority));
        self
    }

    /// Builder: set a text flag
    pub fn with_text(mut self, flag: StatusFlag, value: impl Into<String>) -> Self {
        self.set(flag, StatusValue::Text(value.into()));
        self
    }

    pub fn get(&self, flag: StatusFlag) -> Option<&StatusValue> {
        self.0.get(&flag)
    }

    pub fn remove(&mut self, flag: StatusFlag) -> Option<StatusValue> {
        self.0.remove(&flag)
    }

    /// Boolean view of a flag; absent and non-boolean values read as false.
    pub fn is_set(&self, flag: StatusFlag) -> bool {
        matches!(self.0.get(&flag), Some(StatusValue::Bool(true)))
    }

    pub fn priority(&self) -> Option<u8> {
        match self.0.get(&StatusFlag::WishlistPriority) {
            Some(StatusValue::Number(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn text(&self, flag: StatusFlag) -> Option<&str> {
        match self.0.get(&flag) {
            Some(StatusValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StatusFlag, &StatusValue)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ============================================================================
// COLLECTION ENTRY
// ============================================================================

/// Canonical desired-or-existing collection entry.
///
/// Built once by the normalizer and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionEntry {
    pub entity_id: u64,
    pub entity_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_year: Option<String>,
    /// Semicolon-separated language preference list; only the first counts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_languages: Option<String>,
    #[serde(default)]
    pub status: Status,
}

impl CollectionEntry {
    pub fn new(entity_id: u64, entity_name: impl Into<String>) -> Self {
        CollectionEntry {
            entity_id,
            entity_name: entity_name.into(),
            variant_name: None,
            variant_year: None,
            variant_languages: None,
            status: Status::new(),
        }
    }

    /// Builder: add variant name
    pub fn with_variant(mut self, name: impl Into<String>) -> Self {
        self.variant_name = Some(name.into());
        self
    }

    /// Builder: add variant year
    pub fn with_year(mut self, year: impl Into<String>) -> Self {
        self.variant_year = Some(year.into());
        self
    }

    /// Builder: add language preference list
    pub fn with_languages(mut self, languages: impl Into<String>) -> Self {
        self.variant_languages = Some(languages.into());
        self
    }

    /// Builder: replace status
    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    /// First entry of the language preference list, trimmed.
    ///
    /// A present but empty first entry reads as "English", the remote
    /// site's default listing language.
    pub fn first_language(&self) -> Option<String> {
        let languages = self.variant_languages.as_deref()?;
        let first = languages.split(';').next().map(str::trim).unwrap_or("");
        if first.is_empty() {
            Some("English".to_string())
        } else {
            Some(first.to_string())
        }
    }
}

// ============================================================================
// WORK ITEM
// ============================================================================

/// A desired entry confirmed missing remotely and queued for convergence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItem {
    pub entry: CollectionEntry,
    pub first_preferred_language: Option<String>,
    /// "<entity name> - <variant name>", present only when a variant is named.
    pub variant_full_label: Option<String>,
    /// Same label with " (<year>)" appended, when a year is known.
    pub variant_label_with_year: Option<String>,
}

impl WorkItem {
    pub fn from_entry(entry: CollectionEntry) -> Self {
        let variant_full_label = entry
            .variant_name
            .as_deref()
            .map(|variant| variant_label(&entry.entity_name, variant));
        let variant_label_with_year = match (&variant_full_label, &entry.variant_year) {
            (Some(label), Some(year)) => Some(format!("{} ({})", label, year)),
            _ => None,
        };

        WorkItem {
            first_preferred_language: entry.first_language(),
            variant_full_label,
            variant_label_with_year,
            entry,
        }
    }

    pub fn entity_id(&self) -> u64 {
        self.entry.entity_id
    }

    /// Label used in progress lines: the variant label when there is one.
    pub fn display_label(&self) -> &str {
        self.variant_full_label
            .as_deref()
            .unwrap_or(&self.entry.entity_name)
    }
}

/// Join entity and variant names with a hyphen delimiter and single spaces.
pub fn variant_label(entity_name: &str, variant_name: &str) -> String {
    format!("{} - {}", entity_name.trim(), variant_name.trim())
}

// ============================================================================
// TESTS
// ============================================================================
