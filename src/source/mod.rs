//! Source file extraction.

mod reader;

pub use reader::{CsvSource, RawBatch, SourceTable};
