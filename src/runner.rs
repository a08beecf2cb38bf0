// 🏃 Sync Runner - plan, then converge work items one at a time
//
// Items share one browser session and one form, so they are processed
// strictly in order. A failed item never stops the batch.

use crate::config::{LogConfig, SyncConfig};
use crate::driver::{ConvergenceDriver, ItemReport};
use crate::entry::WorkItem;
use crate::matcher::IdentityMatcher;
use crate::normalizer::EntityNormalizer;
use crate::parser::RawRow;
use crate::reconciliation::{ReconciliationPlanner, ReconciliationReport};
use crate::remote::RawExistingRecord;
use crate::ui::UiSession;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ============================================================================
// PLANNING
// ============================================================================

/// Raw desired rows + raw fetched records → ordered work list.
pub fn plan_from_raw(
    rows: &[RawRow],
    records: &[RawExistingRecord],
    log: &LogConfig,
) -> ReconciliationReport {
    let normalizer = EntityNormalizer::new();
    let desired = normalizer.normalize_rows(rows);
    let existing = normalizer.normalize_existing_all(records);

    let planner = ReconciliationPlanner::new(IdentityMatcher::new(log.clone()));
    let report = planner.reconcile(&desired, &existing);
    info!("{}", report.summary());
    report
}

// ============================================================================
// RUN SUMMARY
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub processed: usize,
    pub verified: usize,
    pub skipped: usize,
    pub failed: usize,
    pub reports: Vec<ItemReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunSummary {
    pub fn new() -> Self {
        RunSummary {
            processed: 0,
            verified: 0,
            skipped: 0,
            failed: 0,
            reports: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn record(&mut self, report: ItemReport) {
        self.processed += 1;
        if report.is_verified() {
            self.verified += 1;
        } else if report.is_skipped() {
            self.skipped += 1;
        } else {
            self.failed += 1;
        }
        self.reports.push(report);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// IDs of the items that ended in Failed
    pub fn failed_ids(&self) -> Vec<u64> {
        self.reports
            .iter()
            .filter(|r| r.is_failed())
            .map(|r| r.entity_id)
            .collect()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} processed: {} verified, {} skipped, {} failed",
            self.processed, self.verified, self.skipped, self.failed
        )
    }
}

impl Default for RunSummary {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SYNC RUNNER
// ============================================================================

pub struct SyncRunner {
    driver: ConvergenceDriver,
}

impl SyncRunner {
    pub fn new(config: SyncConfig) -> Self {
        SyncRunner {
            driver: ConvergenceDriver::new(config),
        }
    }

    /// Converge every work item in order, with a polite pause after each.
    pub fn run(&self, session: &mut dyn UiSession, items: &[WorkItem]) -> RunSummary {
        let mut summary = RunSummary::new();
        let total = items.len();
        info!(items = total, "Adding new items to collection");

        for (index, item) in items.iter().enumerate() {
            info!(
                "[{}/{}] Processing {} - {}",
                index + 1,
                total,
                item.entity_id(),
                item.display_label()
            );

            let report = self.driver.converge(session, item);
            if report.is_failed() {
                warn!(entity_id = item.entity_id(), "Failed to add item");
            }
            summary.record(report);

            session.pause(self.driver.config().item_delay());
        }

        summary.finish();
        info!("Finished run: {}", summary.summary());
        summary
    }
}

// ============================================================================
// TESTS
// ============================================================================
