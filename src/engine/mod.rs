//! Incremental aggregation of supply records into assay statuses.

/// Aggregation engine: full builds, incremental updates, unloads and device
/// events.
pub mod aggregator;
/// Change sets and work counters.
pub mod delta;
/// Device-driven masking decision.
pub mod masking;
