// ⚖️ Reconciliation Planner - desired minus existing, de-duplicated
//
// For each desired entry, in input order:
//   1. skip if the remote already holds exactly this configuration
//   2. skip if an earlier surviving entry of this run already matches
//   3. skip if a survivor already claims the same (entity id, variant)
//   4. otherwise queue it
//
// O(n·m) against existing state and O(k²) against survivors. Collections
// are hundreds of items, not millions.

use crate::entry::{CollectionEntry, WorkItem};
use crate::matcher::IdentityMatcher;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

// ============================================================================
// PLAN REPORT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// The remote collection already has this exact version
    AlreadyInCollection,
    /// An earlier row of the same input already covers it
    DuplicateInInput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEntry {
    pub entity_id: u64,
    pub entity_name: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub work_items: Vec<WorkItem>,
    pub skipped: Vec<SkippedEntry>,
    pub desired_count: usize,
    pub existing_count: usize,
    pub planned_at: DateTime<Utc>,
}

impl ReconciliationReport {
    pub fn is_empty(&self) -> bool {
        self.work_items.is_empty()
    }

    pub fn summary(&self) -> String {
        let already = self
            .skipped
            .iter()
            .filter(|s| s.reason == SkipReason::AlreadyInCollection)
            .count();
        format!(
            "{} desired, {} existing: {} to add, {} already in collection, {} duplicates in input",
            self.desired_count,
            self.existing_count,
            self.work_items.len(),
            already,
            self.skipped.len() - already
        )
    }
}

// ============================================================================
// RECONCILIATION PLANNER
// ============================================================================

pub struct ReconciliationPlanner {
    matcher: IdentityMatcher,
}

impl ReconciliationPlanner {
    pub fn new(matcher: IdentityMatcher) -> Self {
        ReconciliationPlanner { matcher }
    }

    /// Ordered work list. Pure function of its inputs.
    pub fn plan(&self, desired: &[CollectionEntry], existing: &[CollectionEntry]) -> Vec<WorkItem> {
        self.reconcile(desired, existing).work_items
    }

    /// Work list plus the reasons every other entry was left out.
    pub fn reconcile(
        &self,
        desired: &[CollectionEntry],
        existing: &[CollectionEntry],
    ) -> ReconciliationReport {
        let mut survivors: Vec<&CollectionEntry> = Vec::new();
        let mut skipped = Vec::new();

        for entry in desired {
            if existing.iter().any(|e| self.matcher.same_version(e, entry)) {
                info!(
                    entity_id = entry.entity_id,
                    name = %entry.entity_name,
                    "Skipping: this exact version is already in the collection"
                );
                skipped.push(SkippedEntry {
                    entity_id: entry.entity_id,
                    entity_name: entry.entity_name.clone(),
                    reason: SkipReason::AlreadyInCollection,
                });
                continue;
            }

            let duplicate = survivors.iter().any(|s| {
                self.matcher.same_version(entry, s)
                    || (s.entity_id == entry.entity_id && s.variant_name == entry.variant_name)
            });
            if duplicate {
                info!(entity_id = entry.entity_id, "Skipping duplicate in input");
                skipped.push(SkippedEntry {
                    entity_id: entry.entity_id,
                    entity_name: entry.entity_name.clone(),
                    reason: SkipReason::DuplicateInInput,
                });
                continue;
            }

            survivors.push(entry);
        }

        ReconciliationReport {
            work_items: survivors
                .into_iter()
                .cloned()
                .map(WorkItem::from_entry)
                .collect(),
            skipped,
            desired_count: desired.len(),
            existing_count: existing.len(),
            planned_at: Utc::now(),
        }
    }
}

impl Default for ReconciliationPlanner {
    fn default() -> Self {
        Self::new(IdentityMatcher::default())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{Status, StatusFlag};
    use proptest::prelude::*;

    fn create_test_entry(id: u64, own: bool, want: bool) -> CollectionEntry {
        CollectionEntry::new(id, format!("Game {}", id)).with_status(
            Status::new()
                .with_bool(StatusFlag::Own, own)
                .with_bool(StatusFlag::Want, want),
        )
    }

    #[test]
    fn test_skip_when_already_in_collection() {
        let planner = ReconciliationPlanner::default();
        let desired = vec![create_test_entry(13, true, false)];
        let existing = vec![create_test_entry(13, true, false)];

        let report = planner.reconcile(&desired, &existing);

        assert!(report.is_empty());
        assert_eq!(report.skipped[0].reason, SkipReason::AlreadyInCollection);
    }

    #[test]
    fn test_changed_status_is_planned() {
        let planner = ReconciliationPlanner::default();
        let desired = vec![create_test_entry(13, true, true)];
        let existing = vec![create_test_entry(13, true, false)];

        let items = planner.plan(&desired, &existing);

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].entity_id(), 13);
    }

    // The matcher compares no variant, so equal flags collapse across variants
    #[test]
    fn test_duplicates_first_occurrence_wins() {
        let planner = ReconciliationPlanner::default();
        let first = create_test_entry(13, true, false).with_variant("First");
        let second = create_test_entry(13, true, false).with_variant("Second");

        let report = planner.reconcile(&[first, second], &[]);

        assert_eq!(report.work_items.len(), 1);
        assert_eq!(report.work_items[0].entry.variant_name.as_deref(), Some("First"));
        assert_eq!(report.skipped[0].reason, SkipReason::DuplicateInInput);
    }

    #[test]
    fn test_same_variant_with_other_flags_is_duplicate() {
        let planner = ReconciliationPlanner::default();
        let owned = create_test_entry(13, true, false).with_variant("Deluxe");
        let wanted = create_test_entry(13, false, true).with_variant("Deluxe");

        let report = planner.reconcile(&[owned, wanted], &[]);

        assert_eq!(report.work_items.len(), 1);
        assert!(report.work_items[0].entry.status.is_set(StatusFlag::Own));
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].reason, SkipReason::DuplicateInInput);
    }

    #[test]
    fn test_base_and_variant_with_other_flags_both_planned() {
        let planner = ReconciliationPlanner::default();
        let base = create_test_entry(13, true, false);
        let deluxe = create_test_entry(13, false, true).with_variant("Deluxe");

        let items = planner.plan(&[base, deluxe], &[]);

        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_preserves_input_order() {
        let planner = ReconciliationPlanner::default();
        let desired = vec![
            create_test_entry(30, true, false),
            create_test_entry(10, true, false),
            create_test_entry(20, true, false),
        ];
        let existing = vec![create_test_entry(10, true, false)];

        let ids: Vec<u64> = planner
            .plan(&desired, &existing)
            .iter()
            .map(WorkItem::entity_id)
            .collect();

        assert_eq!(ids, vec![30, 20]);
    }

    #[test]
    fn test_summary() {
        let planner = ReconciliationPlanner::default();
        let desired = vec![
            create_test_entry(1, true, false),
            create_test_entry(1, true, false),
            create_test_entry(2, true, false),
        ];
        let existing = vec![create_test_entry(2, true, false)];

        let report = planner.reconcile(&desired, &existing);

        assert_eq!(
            report.summary(),
            "3 desired, 1 existing: 1 to add, 1 already in collection, 1 duplicates in input"
        );
    }

    proptest! {
        #[test]
        fn prop_plan_is_deterministic(
            desired in prop::collection::vec((1u64..5, any::<bool>(), any::<bool>()), 0..12),
            existing in prop::collection::vec((1u64..5, any::<bool>(), any::<bool>()), 0..6),
        ) {
            let desired: Vec<CollectionEntry> =
                desired.into_iter().map(|(id, o, w)| create_test_entry(id, o, w)).collect();
            let existing: Vec<CollectionEntry> =
                existing.into_iter().map(|(id, o, w)| create_test_entry(id, o, w)).collect();
            let planner = ReconciliationPlanner::default();

            let first = planner.plan(&desired, &existing);
            let second = planner.plan(&desired, &existing);
            prop_assert_eq!(first.clone(), second);

            // No two work items match or share a key, none matches existing state
            let matcher = IdentityMatcher::default();
            for (i, a) in first.iter().enumerate() {
                prop_assert!(!existing.iter().any(|e| matcher.same_version(e, &a.entry)));
                for b in &first[i + 1..] {
                    prop_assert!(!matcher.same_version(&a.entry, &b.entry));
                    prop_assert!(
                        a.entry.entity_id != b.entry.entity_id
                            || a.entry.variant_name != b.entry.variant_name
                    );
                }
            }
        }
    }
}
