// 🔍 Identity Matcher - same entity, same configuration?
// Strict comparison: id, name and every recognized status flag.

use crate::config::LogConfig;
use crate::entry::{CollectionEntry, FlagKind, StatusFlag, StatusValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ============================================================================
// MISMATCH
// ============================================================================

/// First difference found between two entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mismatch {
    EntityId { left: u64, right: u64 },
    EntityName { left: String, right: String },
    Flag {
        flag: StatusFlag,
        left: Option<StatusValue>,
        right: Option<StatusValue>,
    },
}

impl Mismatch {
    /// Human-readable reason
    pub fn reason(&self) -> String {
        match self {
            Mismatch::EntityId { left, right } => {
                format!("Object IDs do not match: {} vs {}", left, right)
            }
            Mismatch::EntityName { left, right } => {
                format!("Object names do not match: {} vs {}", left, right)
            }
            Mismatch::Flag { flag, left, right } => format!(
                "Status mismatch for key \"{}\": {} vs {}",
                flag,
                display_value(left),
                display_value(right)
            ),
        }
    }
}

fn display_value(value: &Option<StatusValue>) -> String {
    value
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "absent".to_string())
}

// ============================================================================
// IDENTITY MATCHER
// ============================================================================

pub struct IdentityMatcher {
    log: LogConfig,
}

impl IdentityMatcher {
    pub fn new(log: LogConfig) -> Self {
        IdentityMatcher { log }
    }

    /// Whether two entries denote the same item in the same configuration.
    ///
    /// Total and symmetric; never fails.
    pub fn same_version(&self, a: &CollectionEntry, b: &CollectionEntry) -> bool {
        match Self::first_mismatch(a, b) {
            None => true,
            Some(mismatch) => {
                if self.log.trace_matching {
                    debug!(
                        left = a.entity_id,
                        right = b.entity_id,
                        reason = %mismatch.reason(),
                        "Entries differ"
                    );
                }
                false
            }
        }
    }

    /// The first difference between `a` and `b`, checking id, name, then
    /// each flag in declaration order.
    pub fn first_mismatch(a: &CollectionEntry, b: &CollectionEntry) -> Option<Mismatch> {
        if a.entity_id != b.entity_id {
            return Some(Mismatch::EntityId {
                left: a.entity_id,
                right: b.entity_id,
            });
        }

        if a.entity_name != b.entity_name {
            return Some(Mismatch::EntityName {
                left: a.entity_name.clone(),
                right: b.entity_name.clone(),
            });
        }

        StatusFlag::ALL
            .into_iter()
            .find(|flag| !Self::flag_equal(*flag, a, b))
            .map(|flag| Mismatch::Flag {
                flag,
                left: a.status.get(flag).cloned(),
                right: b.status.get(flag).cloned(),
            })
    }

    /// Booleans compare with absent read as false; numbers and text only
    /// match another value of the same kind, or absent only matches absent.
    fn flag_equal(flag: StatusFlag, a: &CollectionEntry, b: &CollectionEntry) -> bool {
        match flag.kind() {
            FlagKind::Boolean => a.status.is_set(flag) == b.status.is_set(flag),
            FlagKind::Number | FlagKind::Text => a.status.get(flag) == b.status.get(flag),
        }
    }
}

impl Default for IdentityMatcher {
    fn default() -> Self {
        Self::new(LogConfig::default())
    }
}

// ============================================================================
// TESTS
// ============================================================================
