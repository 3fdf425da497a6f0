//! Persisted models

mod summary;

pub use summary::{ImportSummary, SUMMARY_FILE};
