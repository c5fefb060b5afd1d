//! Runtime event stream payloads.

use crate::types::AssayCode;

/// Events emitted from the single-writer runtime loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    /// Aggregate state of these assays changed; readers should re-read them.
    AssayCodesChanged {
        /// Changed codes, ascending.
        codes: Vec<AssayCode>,
    },
    /// The catalogue was reloaded and every status rebuilt.
    CatalogueLoaded {
        /// Number of statuses in the new store.
        count: usize,
    },
}
