//! CSV source reader.
//!
//! Reads the full current contents of the source file on every run; the
//! orchestrator slices off the rows beyond the checkpoint. There is no
//! streaming or partial read: the checkpoint is an absolute row count, so
//! the run needs a consistent snapshot of the whole file.

use std::path::{Path, PathBuf};

use csv::StringRecord;
use snafu::prelude::*;
use tracing::debug;

use crate::error::{ExtractError, OpenSourceSnafu, ReadSourceSnafu};

/// A CSV source file with a named-column header row.
pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the full current contents of the source.
    ///
    /// Ragged rows are tolerated here (short cells surface as unparseable
    /// markers during normalization); only an unreadable file or a
    /// structurally broken record is fatal.
    pub fn read_all(&self) -> Result<SourceTable, ExtractError> {
        let path = self.path.display().to_string();
        let file = std::fs::File::open(&self.path).context(OpenSourceSnafu { path: &path })?;

        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(file);

        let header = reader
            .headers()
            .context(ReadSourceSnafu { path: &path })?
            .clone();

        let mut rows = Vec::new();
        for record in reader.records() {
            rows.push(record.context(ReadSourceSnafu { path: &path })?);
        }

        debug!(path = %self.path.display(), rows = rows.len(), "Read source file");
        Ok(SourceTable { header, rows })
    }
}

/// Snapshot of the source file contents for one run.
#[derive(Debug, Clone)]
pub struct SourceTable {
    header: StringRecord,
    rows: Vec<StringRecord>,
}

impl SourceTable {
    /// Total row count of this snapshot (excluding the header).
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Slice the rows at index >= `from`, preserving source order.
    ///
    /// Clamps when `from` is past the end, yielding an empty batch; the
    /// caller decides whether that is worth a warning.
    pub fn slice_from(&self, from: usize) -> RawBatch {
        let rows = self.rows.get(from..).unwrap_or_default().to_vec();
        RawBatch {
            header: self.header.clone(),
            rows,
            offset: from,
        }
    }
}

/// The ordered slice of raw source rows beyond the checkpoint.
///
/// Immutable once sliced; discarded after the run.
#[derive(Debug, Clone)]
pub struct RawBatch {
    pub header: StringRecord,
    pub rows: Vec<StringRecord>,
    /// Source index of the first row in this batch.
    pub offset: usize,
}

impl RawBatch {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
