// 📥 Ingestion - tabular source → raw rows with normalized headers
// Column names vary between exports, so rows keep every header and the
// normalizer picks fields by alias.

use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

// ============================================================================
// RAW ROW
// ============================================================================

/// One data row of the input file, keyed by normalized header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRow {
    /// 1-indexed line in the source file (header is line 1)
    pub line: usize,
    pub fields: BTreeMap<String, String>,
}

impl RawRow {
    pub fn new(line: usize) -> Self {
        RawRow {
            line,
            fields: BTreeMap::new(),
        }
    }

    /// Builder: add a field under its normalized header
    pub fn with_field(mut self, header: &str, value: impl Into<String>) -> Self {
        self.fields.insert(normalize_key(header), value.into());
        self
    }

    /// First non-empty value among the given aliases, in order.
    pub fn get(&self, aliases: &[&str]) -> Option<&str> {
        aliases.iter().find_map(|alias| {
            self.fields
                .get(&normalize_key(alias))
                .map(String::as_str)
                .filter(|v| !v.is_empty())
        })
    }
}

/// Lowercase and drop all whitespace: "Want To Buy" → "wanttobuy".
pub fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

// ============================================================================
// SOURCE TRAIT
// ============================================================================

/// RowSource - anything that can yield raw rows.
pub trait RowSource {
    fn read_rows(&self, path: &Path) -> Result<Vec<RawRow>>;
}

/// CSV exports with a header row.
pub struct CsvSource;

impl CsvSource {
    pub fn new() -> Self {
        CsvSource
    }

    /// Parse rows from any reader. Malformed records are logged and skipped.
    pub fn parse_reader<R: Read>(&self, reader: R, source_name: &str) -> Result<Vec<RawRow>> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = reader
            .headers()
            .with_context(|| format!("Failed to read CSV header in {}", source_name))?
            .iter()
            .map(normalize_key)
            .collect();

        let mut rows = Vec::new();
        for (index, result) in reader.records().enumerate() {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    // +2 because: 1-indexed + header row
                    warn!(
                        line = index + 2,
                        source = source_name,
                        error = %e,
                        "Skipping malformed CSV record"
                    );
                    continue;
                }
            };
            let line = record
                .position()
                .map(|pos| pos.line() as usize)
                .unwrap_or(index + 2);

            if record.iter().all(str::is_empty) {
                continue;
            }

            let mut row = RawRow::new(line);
            for (header, value) in headers.iter().zip(record.iter()) {
                // First column with a given normalized name wins
                row.fields
                    .entry(header.clone())
                    .or_insert_with(|| value.to_string());
            }
            rows.push(row);
        }

        debug!(rows = rows.len(), source = source_name, "Parsed CSV rows");
        Ok(rows)
    }
}

impl Default for CsvSource {
    fn default() -> Self {
        Self::new()
    }
}

impl RowSource for CsvSource {
    fn read_rows(&self, path: &Path) -> Result<Vec<RawRow>> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open file: {}", path.display()))?;

        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown.csv")
            .to_string();

        self.parse_reader(file, &filename)
    }
}

// ============================================================================
// TESTS
// ============================================================================
