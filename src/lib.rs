//! In-memory assay status aggregation for chemistry, immunoassay and
//! electrolyte supply records.
//!
//! # Examples
//!
//! Direct use of [`engine::aggregator::AggregationEngine`]:
//! ```
//! use assaystat::{
//!     catalog::{AssayDefinition, CodeTable},
//!     engine::aggregator::AggregationEngine,
//!     record::{ChemistryReagentGroup, ReagentUsage, SupplyRecord},
//!     registry::{memory::DeviceTable, Device},
//!     source::memory::MemoryRecordSource,
//!     types::{CalibrationState, Classification},
//! };
//!
//! let registry = DeviceTable::with_devices([Device::new("C-001", Classification::Chemistry)]);
//! let mut engine = AggregationEngine::new(registry, Box::new(MemoryRecordSource::new()), CodeTable::default());
//! engine
//!     .load_catalogue(&[AssayDefinition::new(11, Classification::Chemistry, "ALT")])
//!     .expect("load");
//! assert!(engine.status(11).expect("status").abnormal_reagent());
//!
//! let delta = engine.update_assay_status(&SupplyRecord::Chemistry(ChemistryReagentGroup {
//!     id: 1,
//!     device_sn: "C-001".to_string(),
//!     assay_code: 11,
//!     placed: true,
//!     usage: ReagentUsage::InUse,
//!     remaining_tests: 120,
//!     reagent_expired: false,
//!     onboard_expired: false,
//!     calibration: CalibrationState::Valid,
//! }));
//! assert_eq!(delta.codes(), vec![11]);
//! assert!(!engine.status(11).expect("status").abnormal_reagent());
//! ```
//!
//! Runtime usage:
//! ```no_run
//! use assaystat::{
//!     catalog::{AssayDefinition, CodeTable},
//!     engine::aggregator::AggregationEngine,
//!     registry::memory::DeviceTable,
//!     runtime::handle::{spawn_status_engine, RuntimeConfig},
//!     source::memory::MemoryRecordSource,
//!     types::Classification,
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let engine = AggregationEngine::new(DeviceTable::new(), Box::new(MemoryRecordSource::new()), CodeTable::default());
//! let handle = spawn_status_engine(engine, RuntimeConfig::default());
//! let mut events = handle.subscribe();
//! handle
//!     .load_catalogue(vec![AssayDefinition::new(11, Classification::Chemistry, "ALT")])
//!     .await
//!     .expect("load");
//! let _event = events.recv().await.expect("event");
//! handle.shutdown().await.expect("shutdown");
//! # }
//! ```
#![deny(missing_docs)]

/// Assay definitions and the fixed code table.
pub mod catalog;
/// Status store and index helpers.
pub mod core;
/// Aggregation engine, masking and change tracking.
pub mod engine;
/// Supply record variants and their predicates.
pub mod record;
/// Device registry abstraction and in-memory table.
pub mod registry;
/// Single-writer runtime handle and events.
pub mod runtime;
/// Record query abstraction and in-memory source.
pub mod source;
/// Shared primitive types and enums.
pub mod types;
