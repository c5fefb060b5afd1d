/// In-memory record source.
pub mod memory;

use crate::{
    record::SupplyRecord,
    types::{AssayCode, Classification},
};

/// Failure reported by a [`RecordSource`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// Backend could not be reached.
    #[error("record source unavailable: {0}")]
    Unavailable(String),
    /// Backend answered with an error.
    #[error("record query failed: {0}")]
    Query(String),
}

/// Result alias for record source calls.
pub type SourceResult<T> = Result<T, SourceError>;

/// Query service returning every known supply record for an assay.
///
/// Only full rebuilds call it. Calls block the engine until they return;
/// retries and timeouts belong to the implementation.
pub trait RecordSource: Send {
    /// All records supporting `code` on devices of `classification`.
    fn fetch_records(&self, code: AssayCode, classification: Classification) -> SourceResult<Vec<SupplyRecord>>;
}
