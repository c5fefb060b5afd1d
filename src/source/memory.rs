//! In-memory record source.

use hashbrown::HashMap;

use crate::{
    record::SupplyRecord,
    types::{AssayCode, Classification},
};

use super::{RecordSource, SourceResult};

/// [`RecordSource`] answering from records pushed into it.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordSource {
    records: HashMap<(AssayCode, Classification), Vec<SupplyRecord>>,
}

impl MemoryRecordSource {
    /// Empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `record` under its own assay code; replaces a record with the
    /// same key.
    pub fn push(&mut self, classification: Classification, record: SupplyRecord) {
        let bucket = self
            .records
            .entry((record.assay_code(), classification))
            .or_default();
        let key = record.key();
        match bucket.iter_mut().find(|r| r.key() == key) {
            Some(slot) => *slot = record,
            None => bucket.push(record),
        }
    }

    /// Builder form of [`Self::push`].
    pub fn with(mut self, classification: Classification, record: SupplyRecord) -> Self {
        self.push(classification, record);
        self
    }
}

impl RecordSource for MemoryRecordSource {
    fn fetch_records(&self, code: AssayCode, classification: Classification) -> SourceResult<Vec<SupplyRecord>> {
        Ok(self
            .records
            .get(&(code, classification))
            .cloned()
            .unwrap_or_default())
    }
}
