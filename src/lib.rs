// Collection Sync - Core Library
// Exposes all modules for use in the CLI binaries and tests

pub mod entry;          // Canonical collection entry + status flags
pub mod error;          // Error taxonomy
pub mod config;         // Timeouts, endpoints, log switches
pub mod parser;         // CSV ingestion → raw rows
pub mod normalizer;     // Entity Normalizer
pub mod matcher;        // Identity Matcher
pub mod reconciliation; // Reconciliation Planner
pub mod languages;      // Versions-page language ids
pub mod resolver;       // Version Resolver
pub mod retry;          // Bounded retry for "not ready yet"
pub mod remote;         // Remote collection fetch (XML API)
pub mod ui;             // Interactive UI adapter (trait + waits)
pub mod webdriver;      // W3C WebDriver implementation of the UI adapter
pub mod driver;         // Convergence Driver + login
pub mod runner;         // Sequential run loop

// Re-export commonly used types
pub use entry::{
    CollectionEntry, FlagKind, Status, StatusFlag, StatusValue, WorkItem,
    variant_label,
};
pub use error::{SyncError, SyncResult};
pub use config::{LogConfig, LogFormat, SyncConfig};
pub use parser::{CsvSource, RawRow, RowSource, normalize_key};
pub use normalizer::EntityNormalizer;
pub use matcher::{IdentityMatcher, Mismatch};
pub use reconciliation::{
    ReconciliationPlanner, ReconciliationReport, SkipReason, SkippedEntry,
};
pub use languages::language_code;
pub use resolver::{MatchResult, VariantListing, VersionResolver, normalize_label};
pub use retry::RetryPolicy;
pub use remote::{
    ApiResponse, CollectionApi, CollectionFetcher, HttpCollectionApi, RawExistingRecord,
    decode_collection,
};
pub use ui::{
    Element, Locator, LocatorChain, LocatorKind, SessionGuard, UiError, UiResult, UiSession,
};
pub use webdriver::WebDriverSession;
pub use driver::{ConvergenceDriver, ConvergenceState, ItemOutcome, ItemReport, login};
pub use runner::{RunSummary, SyncRunner, plan_from_raw};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
