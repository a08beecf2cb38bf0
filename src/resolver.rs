// 🎯 Version Resolver - which listed version is the one we want?
//
// The versions page lists near-identical entries. Walk them in display order:
//   - an entry already carrying a collection status wins immediately
//     (that slot is taken and must not be added twice)
//   - otherwise the first entry whose normalized title equals one of the
//     two acceptable labels is the match
// Matching is exact after normalization. No fuzzy or partial matches.

use crate::entry::WorkItem;
use crate::languages::language_code;
use serde::{Deserialize, Serialize};

// ============================================================================
// LISTING + RESULT
// ============================================================================

/// One rendered entry of the versions listing, in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantListing {
    pub label: String,
    pub has_existing_status: bool,
}

impl VariantListing {
    pub fn new(label: impl Into<String>, has_existing_status: bool) -> Self {
        VariantListing {
            label: label.into(),
            has_existing_status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchResult {
    /// The entry at `position` is already in the collection
    AlreadyConverged { label: String, position: usize },
    /// The entry at `position` is the wanted version
    FoundVariant { label: String, position: usize },
    /// No specific version requested, or its language is unknown
    NoVariantNeeded,
    /// Listing exhausted without a match
    NotFound,
}

// ============================================================================
// NORMALIZATION
// ============================================================================

/// Collapse whitespace runs to one space, trim, and turn every hyphen-like
/// dash (U+2010..=U+2015, U+2212, U+FE58, U+FE63, U+FF0D) into a plain '-'.
pub fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .map(|c| match c {
            '\u{2010}'..='\u{2015}' | '\u{2212}' | '\u{FE58}' | '\u{FE63}' | '\u{FF0D}' => '-',
            other => other,
        })
        .collect()
}

// ============================================================================
// VERSION RESOLVER
// ============================================================================

pub struct VersionResolver;

impl VersionResolver {
    pub fn new() -> Self {
        VersionResolver
    }

    /// Language id for the listing filter, when this item needs a version lookup at all.
    pub fn listing_language(&self, item: &WorkItem) -> Option<&'static str> {
        item.variant_full_label.as_ref()?;
        language_code(item.first_preferred_language.as_deref()?)
    }

    /// Normalized labels that count as a match, de-duplicated, in priority order.
    pub fn targets(&self, item: &WorkItem) -> Vec<String> {
        let mut targets: Vec<String> = Vec::new();
        for label in [&item.variant_full_label, &item.variant_label_with_year]
            .into_iter()
            .flatten()
        {
            let normalized = normalize_label(label);
            if !targets.contains(&normalized) {
                targets.push(normalized);
            }
        }
        targets
    }

    /// Resolve the wanted version against a listing already filtered to
    /// the item's first preferred language.
    pub fn resolve(&self, item: &WorkItem, listing: &[VariantListing]) -> MatchResult {
        if self.listing_language(item).is_none() {
            return MatchResult::NoVariantNeeded;
        }

        let targets = self.targets(item);
        for (position, candidate) in listing.iter().enumerate() {
            let label = normalize_label(&candidate.label);

            if candidate.has_existing_status {
                return MatchResult::AlreadyConverged { label, position };
            }

            if targets.iter().any(|t| *t == label) {
                return MatchResult::FoundVariant { label, position };
            }
        }

        MatchResult::NotFound
    }
}

impl Default for VersionResolver {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::CollectionEntry;

    fn deluxe_item() -> WorkItem {
        WorkItem::from_entry(
            CollectionEntry::new(13, "Catan")
                .with_variant("Deluxe Edition")
                .with_year("2015")
                .with_languages("English"),
        )
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("  Catan  -   Deluxe\tEdition "), "Catan - Deluxe Edition");
        assert_eq!(normalize_label("Catan \u{2010} Deluxe"), "Catan - Deluxe");
        assert_eq!(normalize_label("Catan \u{2014} Deluxe"), "Catan - Deluxe");
        for dash in ['\u{2015}', '\u{FE58}', '\u{FE63}', '\u{FF0D}'] {
            assert_eq!(normalize_label(&format!("Catan {} Deluxe", dash)), "Catan - Deluxe");
        }
    }

    #[test]
    fn test_found_variant_exact() {
        let listing = vec![
            VariantListing::new("Catan - Travel Edition", false),
            VariantListing::new("Catan - Deluxe Edition", false),
        ];

        assert_eq!(
            VersionResolver::new().resolve(&deluxe_item(), &listing),
            MatchResult::FoundVariant {
                label: "Catan - Deluxe Edition".to_string(),
                position: 1
            }
        );
    }

    #[test]
    fn test_extra_interior_space_still_matches() {
        let listing = vec![VariantListing::new("Catan -  Deluxe Edition", false)];

        assert!(matches!(
            VersionResolver::new().resolve(&deluxe_item(), &listing),
            MatchResult::FoundVariant { position: 0, .. }
        ));
    }

    #[test]
    fn test_missing_hyphen_does_not_match() {
        let listing = vec![VariantListing::new("Catan Deluxe Edition", false)];

        assert_eq!(
            VersionResolver::new().resolve(&deluxe_item(), &listing),
            MatchResult::NotFound
        );
    }

    #[test]
    fn test_year_suffix_matches() {
        let listing = vec![VariantListing::new("Catan \u{2010} Deluxe Edition (2015)", false)];

        assert!(matches!(
            VersionResolver::new().resolve(&deluxe_item(), &listing),
            MatchResult::FoundVariant { position: 0, .. }
        ));
    }

    #[test]
    fn test_existing_status_takes_precedence() {
        let listing = vec![
            VariantListing::new("Catan - Something Else", true),
            VariantListing::new("Catan - Deluxe Edition", false),
        ];

        assert_eq!(
            VersionResolver::new().resolve(&deluxe_item(), &listing),
            MatchResult::AlreadyConverged {
                label: "Catan - Something Else".to_string(),
                position: 0
            }
        );
    }

    #[test]
    fn test_no_variant_needed_without_name() {
        let entry = CollectionEntry::new(13, "Catan").with_languages("English");
        let item = WorkItem::from_entry(entry);
        let listing = vec![VariantListing::new("Catan", true)];

        assert_eq!(
            VersionResolver::new().resolve(&item, &listing),
            MatchResult::NoVariantNeeded
        );
    }

    #[test]
    fn test_unknown_language_falls_back() {
        let item = WorkItem::from_entry(
            CollectionEntry::new(13, "Catan")
                .with_variant("Deluxe Edition")
                .with_languages("Klingon;English"),
        );

        assert_eq!(VersionResolver::new().listing_language(&item), None);
        assert_eq!(
            VersionResolver::new().resolve(&item, &[]),
            MatchResult::NoVariantNeeded
        );
    }

    #[test]
    fn test_targets_without_year() {
        let item = WorkItem::from_entry(
            CollectionEntry::new(13, "Catan")
                .with_variant("Deluxe Edition")
                .with_languages("German"),
        );

        assert_eq!(
            VersionResolver::new().targets(&item),
            vec!["Catan - Deluxe Edition".to_string()]
        );
        assert_eq!(VersionResolver::new().listing_language(&item), Some("2188"));
    }

    #[test]
    fn test_empty_listing_not_found() {
        assert_eq!(
            VersionResolver::new().resolve(&deluxe_item(), &[]),
            MatchResult::NotFound
        );
    }
}
