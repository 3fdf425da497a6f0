//! Running, de-duplicated tally of imported rides

use std::collections::HashSet;

use log::debug;

use super::outcome::{ErrorRecord, ImportBatch};

/// Merges page results into a set of ride ids
///
/// Merging is idempotent: a page that is re-reported (after a retry, or
/// because upstream pages overlap) never inflates the total.
#[derive(Debug, Default, Clone)]
pub struct ProgressAccumulator {
    imported: HashSet<String>,
    error_records: Vec<ErrorRecord>,
    last_batch_count: usize,
}

impl ProgressAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one batch, returning how many ids were not seen before
    ///
    /// Error records are appended as-is, duplicates included.
    pub fn merge(&mut self, batch: &ImportBatch) -> usize {
        let mut newly_added = 0;
        for id in &batch.imported_ids {
            if self.imported.insert(id.clone()) {
                newly_added += 1;
            } else {
                debug!("Ride {} already imported, skipping", id);
            }
        }
        self.error_records.extend(batch.error_records.iter().cloned());
        self.last_batch_count = batch.imported_ids.len();
        newly_added
    }

    /// Number of distinct rides imported so far
    pub fn total_imported(&self) -> usize {
        self.imported.len()
    }

    /// Number of ids reported by the most recent batch
    pub fn last_batch_count(&self) -> usize {
        self.last_batch_count
    }

    pub fn contains(&self, id: &str) -> bool {
        self.imported.contains(id)
    }

    pub fn imported_ids(&self) -> &HashSet<String> {
        &self.imported
    }

    pub fn error_records(&self) -> &[ErrorRecord] {
        &self.error_records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn batch(ids: &[&str]) -> ImportBatch {
        ImportBatch {
            imported_ids: ids.iter().map(|s| s.to_string()).collect(),
            imported_count: ids.len(),
            ..ImportBatch::default()
        }
    }

    #[test]
    fn test_merge_same_batch_twice() {
        let mut acc = ProgressAccumulator::new();
        let b = batch(&["101", "102", "103"]);

        assert_eq!(acc.merge(&b), 3);
        assert_eq!(acc.total_imported(), 3);

        assert_eq!(acc.merge(&b), 0);
        assert_eq!(acc.total_imported(), 3);
        assert_eq!(acc.last_batch_count(), 3);
    }

    #[test]
    fn test_overlapping_batches() {
        let mut acc = ProgressAccumulator::new();
        assert_eq!(acc.merge(&batch(&["A", "B"])), 2);
        assert_eq!(acc.merge(&batch(&["B", "C"])), 1);
        assert_eq!(acc.total_imported(), 3);
        assert!(acc.contains("A") && acc.contains("B") && acc.contains("C"));
    }

    #[test]
    fn test_duplicates_within_one_batch() {
        let mut acc = ProgressAccumulator::new();
        assert_eq!(acc.merge(&batch(&["7", "7", "8"])), 2);
        assert_eq!(acc.total_imported(), 2);
        assert_eq!(acc.last_batch_count(), 3);
    }

    #[test]
    fn test_total_never_decreases() {
        let mut acc = ProgressAccumulator::new();
        let batches = [
            batch(&["1", "2"]),
            batch(&[]),
            batch(&["2"]),
            batch(&["3", "1", "4"]),
            batch(&[]),
        ];

        let mut previous = 0;
        for b in &batches {
            acc.merge(b);
            assert!(acc.total_imported() >= previous);
            previous = acc.total_imported();
        }
        assert_eq!(previous, 4);
    }

    #[test]
    fn test_error_records_are_not_deduplicated() {
        let mut acc = ProgressAccumulator::new();
        let mut b = batch(&["1"]);
        b.error_records = vec![ErrorRecord(json!({"rid": "9", "error": "no_streams"}))];

        acc.merge(&b);
        acc.merge(&b);
        assert_eq!(acc.error_records().len(), 2);
        assert_eq!(acc.total_imported(), 1);
    }
}
