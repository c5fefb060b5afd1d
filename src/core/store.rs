use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::{
    record::{RecordKey, ReagentMap, SupplyRecord},
    types::{AssayCode, Classification},
};

use super::indices::CodeIndex;

/// Aggregate state of one assay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssayStatus {
    pub(crate) assay_code: AssayCode,
    pub(crate) classification: Classification,
    pub(crate) reagents: ReagentMap,
    pub(crate) abnormal_reagent: bool,
    pub(crate) abnormal_calibrate: bool,
    pub(crate) mask_assay: bool,
}

impl AssayStatus {
    /// Status with no reagent loaded: both abnormal flags set, unmasked.
    pub fn new(assay_code: AssayCode, classification: Classification) -> Self {
        Self {
            assay_code,
            classification,
            reagents: ReagentMap::new(),
            abnormal_reagent: true,
            abnormal_calibrate: true,
            mask_assay: false,
        }
    }

    /// Assay this status aggregates.
    pub fn assay_code(&self) -> AssayCode {
        self.assay_code
    }

    /// Analyzer family of the assay.
    pub fn classification(&self) -> Classification {
        self.classification
    }

    /// Tracked records keyed by [`RecordKey`].
    pub fn reagents(&self) -> &ReagentMap {
        &self.reagents
    }

    /// Tracked record with `key`, if any.
    pub fn record(&self, key: &RecordKey) -> Option<&SupplyRecord> {
        self.reagents.get(key)
    }

    /// No tracked record can currently supply the assay.
    pub fn abnormal_reagent(&self) -> bool {
        self.abnormal_reagent
    }

    /// No tracked record carries a valid calibration.
    pub fn abnormal_calibrate(&self) -> bool {
        self.abnormal_calibrate
    }

    /// Every capable device hides the assay.
    pub fn mask_assay(&self) -> bool {
        self.mask_assay
    }

    pub(crate) fn flags(&self) -> (bool, bool, bool) {
        (self.abnormal_reagent, self.abnormal_calibrate, self.mask_assay)
    }

    /// Owned copy for readers outside the engine.
    pub fn view(&self) -> AssayStatusView {
        let mut records: Vec<SupplyRecord> = self.reagents.values().cloned().collect();
        records.sort_by_key(|r| r.key());
        AssayStatusView {
            assay_code: self.assay_code,
            classification: self.classification,
            abnormal_reagent: self.abnormal_reagent,
            abnormal_calibrate: self.abnormal_calibrate,
            mask_assay: self.mask_assay,
            records,
        }
    }
}

/// Owned, serializable copy of an [`AssayStatus`] handed to readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssayStatusView {
    /// Assay code.
    pub assay_code: AssayCode,
    /// Analyzer family.
    pub classification: Classification,
    /// See [`AssayStatus::abnormal_reagent`].
    pub abnormal_reagent: bool,
    /// See [`AssayStatus::abnormal_calibrate`].
    pub abnormal_calibrate: bool,
    /// See [`AssayStatus::mask_assay`].
    pub mask_assay: bool,
    /// Tracked records ordered by key.
    pub records: Vec<SupplyRecord>,
}

/// Authoritative map from assay code to status, with a per-classification
/// code index.
#[derive(Debug, Default)]
pub struct StatusStore {
    statuses: HashMap<AssayCode, AssayStatus>,
    by_class: CodeIndex<Classification>,
}

impl StatusStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the status for its code, returning the previous one.
    pub fn insert(&mut self, status: AssayStatus) -> Option<AssayStatus> {
        let code = status.assay_code;
        let class = status.classification;
        let prev = self.statuses.insert(code, status);

        match prev.as_ref().map(AssayStatus::classification) {
            Some(old) if old == class => {}
            Some(old) => {
                Self::remove_from_code_index(self.by_class.entry(old).or_default(), code);
                self.by_class.entry(class).or_default().push(code);
            }
            None => self.by_class.entry(class).or_default().push(code),
        }
        prev
    }

    /// Status for `code`.
    pub fn get(&self, code: AssayCode) -> Option<&AssayStatus> {
        self.statuses.get(&code)
    }

    pub(crate) fn get_mut(&mut self, code: AssayCode) -> Option<&mut AssayStatus> {
        self.statuses.get_mut(&code)
    }

    /// True when a status exists for `code`.
    pub fn contains(&self, code: AssayCode) -> bool {
        self.statuses.contains_key(&code)
    }

    /// Number of statuses.
    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    /// True when no status is held.
    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    /// Drops every status and the index.
    pub fn clear(&mut self) {
        self.statuses.clear();
        self.by_class.clear();
    }

    /// Codes of every status with the given classification, in insertion order.
    pub fn codes_for_class(&self, class: Classification) -> &[AssayCode] {
        self.by_class.get(&class).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every code, ascending.
    pub fn codes(&self) -> Vec<AssayCode> {
        let mut codes: Vec<AssayCode> = self.statuses.keys().copied().collect();
        codes.sort_unstable();
        codes
    }

    /// Views of every status, ordered by code.
    pub fn snapshot(&self) -> Vec<AssayStatusView> {
        self.codes()
            .into_iter()
            .filter_map(|code| self.statuses.get(&code).map(AssayStatus::view))
            .collect()
    }

    fn remove_from_code_index(v: &mut Vec<AssayCode>, code: AssayCode) {
        if let Some(pos) = v.iter().position(|x| *x == code) {
            v.remove(pos);
        }
    }
}
