// 🧹 Entity Normalizer - raw rows and fetched records → CollectionEntry
// Both sides must land in the same shape or the matcher compares apples
// to oranges.

use crate::entry::{CollectionEntry, FlagKind, Status, StatusFlag, StatusValue};
use crate::error::{SyncError, SyncResult};
use crate::parser::RawRow;
use crate::remote::RawExistingRecord;
use tracing::{info, warn};

// ============================================================================
// FIELD ALIASES (lookup order matters)
// ============================================================================

const ENTITY_ID: &[&str] = &["objectid", "object id", "id"];
const ENTITY_NAME: &[&str] = &["objectname", "name"];
const VARIANT_NAME: &[&str] = &["version_nickname", "version nickname", "version"];
const VARIANT_YEAR: &[&str] = &["version_yearpublished", "version year published", "year"];
const VARIANT_LANGUAGES: &[&str] = &["version_languages", "version languages"];

/// Aliases for each status flag, in lookup order.
fn flag_aliases(flag: StatusFlag) -> &'static [&'static str] {
    match flag {
        StatusFlag::Own => &["own"],
        StatusFlag::ForTrade => &["fortrade", "for_trade", "for trade"],
        StatusFlag::Want => &["want"],
        StatusFlag::WantToBuy => &["wanttobuy", "want_to_buy", "want to buy"],
        StatusFlag::PrevOwned => &["prevowned", "prev_owned", "previouslyowned"],
        StatusFlag::Wishlist => &["wishlist"],
        StatusFlag::WishlistPriority => {
            &["wishlistpriority", "wishlist_priority", "wishlist priority"]
        }
        StatusFlag::Preordered => &["preordered", "pre_ordered"],
        StatusFlag::WantToPlay => &["wanttoplay", "want_to_play"],
        StatusFlag::Comment => &["comment", "textfield.comment"],
        StatusFlag::WishlistComment => &[
            "wishlistcomment",
            "wishlist comment",
            "textfield.wishlistcomment",
        ],
    }
}

// ============================================================================
// COERCION
// ============================================================================

/// True iff the value is "1" or case-insensitive "true".
pub fn coerce_bool(value: Option<&str>) -> bool {
    match value.map(str::trim) {
        Some(v) => v == "1" || v.eq_ignore_ascii_case("true"),
        None => false,
    }
}

/// Wishlist priority 1..=5; anything else is absent.
pub fn coerce_priority(value: Option<&str>) -> Option<u8> {
    let parsed = value?.trim().parse::<f64>().ok()?;
    if parsed.fract() != 0.0 || !(1.0..=5.0).contains(&parsed) {
        return None;
    }
    Some(parsed as u8)
}

/// Positive integer id. "13", " 13 " and "13.0" are fine; "0", "-4", "abc" are not.
pub fn coerce_entity_id(value: Option<&str>) -> Option<u64> {
    let raw = value?.trim();
    if let Ok(id) = raw.parse::<u64>() {
        return (id > 0).then_some(id);
    }
    let parsed = raw.parse::<f64>().ok()?;
    if parsed.is_finite() && parsed >= 1.0 && parsed.fract() == 0.0 && parsed <= u64::MAX as f64 {
        Some(parsed as u64)
    } else {
        None
    }
}

/// Empty or whitespace-only text is treated as absent.
fn coerce_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Enforce the status invariants shared by both sources.
fn finish_status(mut status: Status) -> Status {
    if !status.is_set(StatusFlag::Wishlist) {
        status.remove(StatusFlag::WishlistPriority);
    }
    status
}

// ============================================================================
// NORMALIZER
// ============================================================================

/// Maps raw ingested rows and raw fetched records into `CollectionEntry`.
pub struct EntityNormalizer;

impl EntityNormalizer {
    pub fn new() -> Self {
        EntityNormalizer
    }

    /// Normalize one ingested row. Rows without a positive integer id are rejected.
    pub fn normalize_row(&self, row: &RawRow) -> SyncResult<CollectionEntry> {
        let entity_id =
            coerce_entity_id(row.get(ENTITY_ID)).ok_or_else(|| SyncError::InputRejected {
                line: row.line,
                reason: match row.get(ENTITY_ID) {
                    Some(raw) => format!("objectid '{}' is not a positive integer", raw),
                    None => "missing objectid".to_string(),
                },
            })?;

        let mut status = Status::new();
        for flag in StatusFlag::ALL {
            let raw = row.get(flag_aliases(flag));
            match flag.kind() {
                FlagKind::Boolean => {
                    status.set(flag, StatusValue::Bool(coerce_bool(raw)));
                }
                FlagKind::Number => {
                    if let Some(priority) = coerce_priority(raw) {
                        status.set(flag, StatusValue::Number(priority));
                    }
                }
                FlagKind::Text => {
                    if let Some(text) = coerce_text(raw) {
                        status.set(flag, StatusValue::Text(text));
                    }
                }
            }
        }

        Ok(CollectionEntry {
            entity_id,
            entity_name: row.get(ENTITY_NAME).unwrap_or("").to_string(),
            variant_name: coerce_text(row.get(VARIANT_NAME)),
            variant_year: coerce_text(row.get(VARIANT_YEAR)),
            variant_languages: coerce_text(row.get(VARIANT_LANGUAGES)),
            status: finish_status(status),
        })
    }

    /// Normalize one record decoded from the remote collection API.
    ///
    /// Only attributes the API actually sent are set; the matcher treats
    /// missing booleans as false anyway.
    pub fn normalize_existing(&self, record: &RawExistingRecord) -> SyncResult<CollectionEntry> {
        let entity_id = coerce_entity_id(Some(record.object_id.as_str())).ok_or_else(|| {
            SyncError::InputRejected {
                line: 0,
                reason: format!("remote objectid '{}' is not a positive integer", record.object_id),
            }
        })?;

        let mut status = Status::new();
        for flag in StatusFlag::ALL {
            match flag.kind() {
                FlagKind::Boolean => {
                    if let Some(raw) = record.status.get(flag.key()) {
                        status.set(flag, StatusValue::Bool(coerce_bool(Some(raw.as_str()))));
                    }
                }
                FlagKind::Number => {
                    if let Some(priority) =
                        coerce_priority(record.status.get(flag.key()).map(String::as_str))
                    {
                        status.set(flag, StatusValue::Number(priority));
                    }
                }
                FlagKind::Text => {}
            }
        }
        if let Some(comment) = coerce_text(record.comment.as_deref()) {
            status.set(StatusFlag::Comment, StatusValue::Text(comment));
        }
        if let Some(comment) = coerce_text(record.wishlist_comment.as_deref()) {
            status.set(StatusFlag::WishlistComment, StatusValue::Text(comment));
        }

        Ok(CollectionEntry {
            entity_id,
            entity_name: record.name.clone(),
            variant_name: None,
            variant_year: coerce_text(record.year_published.as_deref()),
            variant_languages: None,
            status: finish_status(status),
        })
    }

    /// Normalize every row, logging and dropping the rejected ones.
    pub fn normalize_rows(&self, rows: &[RawRow]) -> Vec<CollectionEntry> {
        let entries: Vec<CollectionEntry> = rows
            .iter()
            .filter_map(|row| match self.normalize_row(row) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(line = row.line, error = %e, "Dropping input row");
                    None
                }
            })
            .collect();

        info!(
            parsed = entries.len(),
            rejected = rows.len() - entries.len(),
            "Normalized desired entries"
        );
        entries
    }

    /// Normalize every fetched record, logging and dropping the rejected ones.
    pub fn normalize_existing_all(&self, records: &[RawExistingRecord]) -> Vec<CollectionEntry> {
        records
            .iter()
            .filter_map(|record| match self.normalize_existing(record) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "Dropping remote record");
                    None
                }
            })
            .collect()
    }
}

impl Default for EntityNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
