// ⚠️ Error taxonomy
// Item-local failures are caught at the item boundary; fatal ones end the run.

use crate::ui::UiError;
use std::time::Duration;

/// Errors raised by the sync pipeline.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A raw record could not be normalized. Dropped, never fatal.
    #[error("record rejected (line {line}): {reason}")]
    InputRejected { line: usize, reason: String },

    /// Remote collection state could not be retrieved.
    #[error("could not fetch remote collection: {0}")]
    TransportFailure(String),

    /// The version listing had no entry matching the wanted variant.
    #[error("version matching {targets:?} not found for {entity_id}")]
    VariantNotFound {
        entity_id: u64,
        targets: Vec<String>,
    },

    /// A bounded wait ran out on a step that the item cannot do without.
    #[error("step '{step}' timed out after {ms}ms", ms = .timeout.as_millis())]
    StepTimeout { step: String, timeout: Duration },

    /// Login did not land on the expected page.
    #[error("login failed: {0}")]
    AuthenticationFailed(String),

    #[error("ui session error: {0}")]
    Ui(#[from] UiError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SyncError {
    /// Fatal errors abort the whole run with a non-zero exit status.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::TransportFailure(_)
                | SyncError::AuthenticationFailed(_)
                | SyncError::Config(_)
        )
    }
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(SyncError::TransportFailure("502".to_string()).is_fatal());
        assert!(SyncError::AuthenticationFailed("title".to_string()).is_fatal());
        assert!(SyncError::Config("poll_interval_ms".to_string()).is_fatal());
        assert!(!SyncError::InputRejected {
            line: 2,
            reason: "missing objectid".to_string()
        }
        .is_fatal());
        assert!(!SyncError::StepTimeout {
            step: "save".to_string(),
            timeout: Duration::from_secs(5)
        }
        .is_fatal());
        assert!(!SyncError::VariantNotFound {
            entity_id: 13,
            targets: vec![]
        }
        .is_fatal());
    }

    #[test]
    fn test_step_timeout_message() {
        let err = SyncError::StepTimeout {
            step: "acknowledgement".to_string(),
            timeout: Duration::from_millis(10_000),
        };
        assert_eq!(err.to_string(), "step 'acknowledgement' timed out after 10000ms");
    }
}
