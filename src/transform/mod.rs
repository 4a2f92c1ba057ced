//! Field normalization.
//!
//! Rewrites the semantically constrained columns of a raw batch into
//! canonical forms: the timestamp column to `%Y-%m-%d %H:%M:%S`, the amount
//! column to a plain decimal rendering. A value that cannot be parsed is
//! coerced to the unparseable marker (an empty field, which the warehouse
//! loads as NULL) instead of aborting the run. Only a structurally missing
//! column is an error.

use chrono::NaiveDateTime;
use csv::StringRecord;
use regex::Regex;
use tracing::warn;

use crate::config::SourceConfig;
use crate::error::TransformError;
use crate::source::RawBatch;

/// Canonical output layout for normalized timestamps.
const CANONICAL_TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S";

/// Normalizes the timestamp and amount columns of a batch.
pub struct Normalizer {
    timestamp_column: String,
    amount_column: String,
    timestamp_format: String,
    /// Matches a trailing `HH.MM` time so the `.` separator can be
    /// rewritten to `:` before parsing.
    dot_minutes: Regex,
}

/// One normalized row: every source column preserved as text, with the
/// constrained columns rewritten in place. `None` is the unparseable
/// marker.
#[derive(Debug, Clone)]
pub struct NormalizedRecord {
    pub fields: Vec<String>,
    pub timestamp: Option<NaiveDateTime>,
    pub amount: Option<f64>,
}

/// A normalized batch, ready for staging.
#[derive(Debug, Clone)]
pub struct NormalizedBatch {
    pub header: StringRecord,
    pub records: Vec<NormalizedRecord>,
    pub unparseable_timestamps: usize,
    pub unparseable_amounts: usize,
}

impl NormalizedBatch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Normalizer {
    pub fn from_config(config: &SourceConfig) -> Self {
        Self {
            timestamp_column: config.timestamp_column.clone(),
            amount_column: config.amount_column.clone(),
            timestamp_format: config.timestamp_format.clone(),
            dot_minutes: Regex::new(r"(\d{1,2})\.(\d{2})$").expect("static regex must compile"),
        }
    }

    /// Normalize a batch.
    ///
    /// Fails only when a configured column is absent from the header;
    /// per-row malformation is coerced, counted, and logged.
    pub fn normalize(&self, batch: &RawBatch) -> Result<NormalizedBatch, TransformError> {
        let ts_idx = self.column_index(&batch.header, &self.timestamp_column)?;
        let amount_idx = self.column_index(&batch.header, &self.amount_column)?;

        let mut records = Vec::with_capacity(batch.len());
        let mut unparseable_timestamps = 0;
        let mut unparseable_amounts = 0;

        for row in &batch.rows {
            let mut fields: Vec<String> = row.iter().map(str::to_string).collect();
            // Ragged rows may be short; pad so the constrained columns exist.
            if fields.len() <= ts_idx.max(amount_idx) {
                fields.resize(ts_idx.max(amount_idx) + 1, String::new());
            }

            let timestamp = self.parse_timestamp(&fields[ts_idx]);
            fields[ts_idx] = match timestamp {
                Some(ts) => ts.format(CANONICAL_TIMESTAMP).to_string(),
                None => {
                    unparseable_timestamps += 1;
                    String::new()
                }
            };

            let amount = parse_amount(&fields[amount_idx]);
            fields[amount_idx] = match amount {
                Some(value) => format_amount(value),
                None => {
                    unparseable_amounts += 1;
                    String::new()
                }
            };

            records.push(NormalizedRecord {
                fields,
                timestamp,
                amount,
            });
        }

        if unparseable_timestamps > 0 {
            warn!(
                rows = unparseable_timestamps,
                column = %self.timestamp_column,
                "Some timestamps could not be parsed and were marked unparseable"
            );
        }

        Ok(NormalizedBatch {
            header: batch.header.clone(),
            records,
            unparseable_timestamps,
            unparseable_amounts,
        })
    }

    fn column_index(
        &self,
        header: &StringRecord,
        column: &str,
    ) -> Result<usize, TransformError> {
        header
            .iter()
            .position(|name| name == column)
            .ok_or_else(|| TransformError::MissingColumn {
                column: column.to_string(),
            })
    }

    /// Parse a raw timestamp, accepting `HH.MM` as equivalent to `HH:MM`.
    fn parse_timestamp(&self, raw: &str) -> Option<NaiveDateTime> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        let rewritten = self.dot_minutes.replace(trimmed, "$1:$2");
        NaiveDateTime::parse_from_str(&rewritten, &self.timestamp_format).ok()
    }
}

fn parse_amount(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn format_amount(value: f64) -> String {
    format!("{value}")
}
