//! In-memory status store and index helpers.

/// Helper index aliases.
pub mod indices;
/// Per-assay aggregates and the store that owns them.
pub mod store;
