use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::AssayCode;

/// Codes whose aggregate state changed during one engine call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusDelta {
    codes: BTreeSet<AssayCode>,
}

impl StatusDelta {
    /// Empty delta.
    pub fn new() -> Self {
        Self::default()
    }

    /// True when at least one code changed.
    pub fn is_changed(&self) -> bool {
        !self.codes.is_empty()
    }

    /// True when `code` changed.
    pub fn contains(&self, code: AssayCode) -> bool {
        self.codes.contains(&code)
    }

    /// Number of changed codes.
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Same as `!is_changed()`.
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Records `code` as changed.
    pub fn insert(&mut self, code: AssayCode) {
        self.codes.insert(code);
    }

    /// Adds every code of `other`.
    pub fn merge(&mut self, other: StatusDelta) {
        self.codes.extend(other.codes);
    }

    /// Changed codes, ascending.
    pub fn codes(&self) -> Vec<AssayCode> {
        self.codes.iter().copied().collect()
    }

    /// Consumes the delta into its codes, ascending.
    pub fn into_codes(self) -> Vec<AssayCode> {
        self.codes.into_iter().collect()
    }
}

/// Work counters kept by the aggregation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EngineStats {
    /// Records applied through the incremental path, per target code.
    pub updates: u64,
    /// Updates that adopted the record's flags into an empty map.
    pub fast_path_adoptions: u64,
    /// Flags cleared by a single normal witness, without a rescan.
    pub witness_flips: u64,
    /// Full walks over a reagent map for one or both flags.
    pub rescans: u64,
    /// Records removed by unload.
    pub unloads: u64,
    /// Unloads whose record was not tracked.
    pub unload_misses: u64,
    /// Target codes skipped because no status exists for them.
    pub skipped_codes: u64,
    /// Statuses built from a record source fetch.
    pub full_builds: u64,
}
