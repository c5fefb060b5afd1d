use tracing::{debug, error, info, warn};

use crate::{
    catalog::{AssayDefinition, CodeTable},
    core::store::{AssayStatus, StatusStore},
    record::{EvalContext, ReagentMap, SupplyRecord},
    registry::{Device, DeviceRegistry},
    source::{RecordSource, SourceError},
    types::{AssayCode, Classification},
};

use super::{
    delta::{EngineStats, StatusDelta},
    masking::is_assay_masked,
};

/// Failure of an engine operation that needs the record source or an
/// existing status.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No status exists for the code.
    #[error("unknown assay code {0}")]
    UnknownAssay(AssayCode),
    /// The record source failed; the status was left untouched.
    #[error("record fetch for assay {code} failed: {source}")]
    Source {
        /// Assay whose fetch failed.
        code: AssayCode,
        /// Source failure.
        #[source]
        source: SourceError,
    },
}

#[derive(Debug, Clone, Copy)]
enum Flag {
    Reagent,
    Calibration,
}

impl Flag {
    fn abnormal(self, record: &SupplyRecord, ctx: &EvalContext<'_>) -> bool {
        match self {
            Self::Reagent => record.is_reagent_abnormal(ctx),
            Self::Calibration => record.is_calibration_abnormal(ctx),
        }
    }
}

/// Owns the status store and keeps it in step with supply and device events.
///
/// All mutation goes through `&mut self`; wrap the engine in
/// [`crate::runtime::handle::spawn_status_engine`] to feed it from several
/// producers.
pub struct AggregationEngine<R: DeviceRegistry> {
    store: StatusStore,
    registry: R,
    source: Box<dyn RecordSource>,
    codes: CodeTable,
    stats: EngineStats,
}

impl<R: DeviceRegistry> AggregationEngine<R> {
    /// Engine with an empty store; call [`Self::load_catalogue`] to fill it.
    pub fn new(registry: R, source: Box<dyn RecordSource>, codes: CodeTable) -> Self {
        Self {
            store: StatusStore::new(),
            registry,
            source,
            codes,
            stats: EngineStats::default(),
        }
    }

    /// Read access to the status store.
    pub fn store(&self) -> &StatusStore {
        &self.store
    }

    /// Status for `code`.
    pub fn status(&self, code: AssayCode) -> Option<&AssayStatus> {
        self.store.get(code)
    }

    /// Device registry the engine evaluates against.
    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Code fan-out and canonicalisation table.
    pub fn code_table(&self) -> &CodeTable {
        &self.codes
    }

    /// Work counters since construction.
    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Replaces the whole store with statuses built from `definitions`.
    ///
    /// Every fetch happens before the store is touched; on the first failure
    /// the previous store is kept as-is.
    pub fn load_catalogue(&mut self, definitions: &[AssayDefinition]) -> Result<usize, EngineError> {
        let mut fetched = Vec::with_capacity(definitions.len());
        for def in definitions {
            let records = self.fetch(def.code, def.classification)?;
            fetched.push((def, records));
        }

        self.store.clear();
        for (def, records) in fetched {
            let status = self.build_status(def.code, def.classification, records);
            self.store.insert(status);
        }

        info!(assays = self.store.len(), "assay catalogue loaded");
        Ok(self.store.len())
    }

    /// Builds (or rebuilds) the status for one definition from a fresh fetch.
    pub fn init_status(&mut self, definition: &AssayDefinition) -> Result<StatusDelta, EngineError> {
        let records = self.fetch(definition.code, definition.classification)?;
        let status = self.build_status(definition.code, definition.classification, records);

        let mut delta = StatusDelta::new();
        let flags = status.flags();
        match self.store.insert(status) {
            Some(prev) if prev.flags() == flags => {}
            _ => delta.insert(definition.code),
        }
        Ok(delta)
    }

    /// Full rebuild of an existing status.
    pub fn rebuild_status(&mut self, code: AssayCode) -> Result<StatusDelta, EngineError> {
        let classification = self
            .store
            .get(code)
            .map(AssayStatus::classification)
            .ok_or(EngineError::UnknownAssay(code))?;
        let records = self.fetch(code, classification)?;
        let status = self.build_status(code, classification, records);

        let mut delta = StatusDelta::new();
        let flags = status.flags();
        if let Some(prev) = self.store.insert(status) {
            if prev.flags() != flags {
                delta.insert(code);
            }
        }
        Ok(delta)
    }

    /// Applies one added or changed record to every status it feeds.
    ///
    /// The returned delta only holds codes whose reagent, calibration or mask
    /// flag actually flipped.
    pub fn update_assay_status(&mut self, record: &SupplyRecord) -> StatusDelta {
        let mut delta = StatusDelta::new();

        for code in self.codes.expand(record.assay_code()) {
            let Some(status) = self.store.get_mut(code) else {
                debug!(assay_code = code, record_id = record.id(), "no status for assay code, record skipped");
                self.stats.skipped_codes += 1;
                continue;
            };

            self.stats.updates += 1;
            if apply_record(&self.registry, &self.codes, status, record, &mut self.stats) {
                delta.insert(code);
            }
        }

        if delta.is_changed() {
            debug!(codes = ?delta.codes(), record_id = record.id(), "assay status changed");
        }
        delta
    }

    /// Removes a record from every status it feeds.
    ///
    /// Every status the record was actually removed from is reported as
    /// changed. A record that is not tracked is logged and leaves the status
    /// untouched.
    pub fn unload_reagent(&mut self, record: &SupplyRecord) -> StatusDelta {
        let key = record.key();
        let mut delta = StatusDelta::new();

        for code in self.codes.expand(record.assay_code()) {
            let Some(status) = self.store.get_mut(code) else {
                debug!(assay_code = code, record_id = record.id(), "no status for assay code, unload skipped");
                self.stats.skipped_codes += 1;
                continue;
            };

            if status.reagents.remove(&key).is_none() {
                warn!(
                    assay_code = code,
                    record_id = key.id,
                    device_sn = %key.device_sn,
                    kind = ?key.kind,
                    "unload for a record that is not tracked"
                );
                self.stats.unload_misses += 1;
                continue;
            }

            self.stats.unloads += 1;
            if status.reagents.is_empty() {
                status.abnormal_reagent = true;
                status.abnormal_calibrate = false;
            } else {
                self.stats.rescans += 1;
                let (reagent, calib) = and_reduce(&self.registry, &status.reagents);
                status.abnormal_reagent = reagent;
                status.abnormal_calibrate = calib;
            }
            status.mask_assay = is_assay_masked(&self.registry, &self.codes, code, status.classification);
            delta.insert(code);
        }

        delta
    }

    /// Inserts or replaces a device and re-evaluates every status of its
    /// classification.
    pub fn apply_device(&mut self, device: Device) -> StatusDelta {
        let classification = device.classification;
        let prev_class = self.registry.device(&device.sn).map(|d| d.classification);
        info!(device_sn = %device.sn, ?classification, "device updated");
        self.registry.upsert_device(device);

        let mut delta = self.reevaluate_class(classification);
        if let Some(prev) = prev_class.filter(|c| *c != classification) {
            delta.merge(self.reevaluate_class(prev));
        }
        delta
    }

    /// Removes a device and re-evaluates every status of its classification.
    pub fn remove_device(&mut self, sn: &str) -> StatusDelta {
        match self.registry.remove_device(sn) {
            Some(device) => {
                info!(device_sn = %sn, "device removed");
                self.reevaluate_class(device.classification)
            }
            None => {
                warn!(device_sn = %sn, "remove for an unknown device");
                StatusDelta::new()
            }
        }
    }

    /// Recomputes the mask flag of every status.
    pub fn refresh_masks(&mut self) -> StatusDelta {
        let mut delta = StatusDelta::new();
        for code in self.store.codes() {
            let Some(status) = self.store.get_mut(code) else {
                continue;
            };
            let masked = is_assay_masked(&self.registry, &self.codes, code, status.classification);
            if masked != status.mask_assay {
                status.mask_assay = masked;
                delta.insert(code);
            }
        }
        delta
    }

    /// Masking decision for `code` against the current registry.
    pub fn is_assay_masked(&self, code: AssayCode, classification: Classification) -> bool {
        is_assay_masked(&self.registry, &self.codes, code, classification)
    }

    fn reevaluate_class(&mut self, classification: Classification) -> StatusDelta {
        let mut delta = StatusDelta::new();
        let codes = self.store.codes_for_class(classification).to_vec();

        for code in codes {
            let Some(status) = self.store.get_mut(code) else {
                continue;
            };
            let before = status.flags();

            // An empty map keeps the flags left by the build or the last unload.
            if !status.reagents.is_empty() {
                self.stats.rescans += 1;
                let (reagent, calib) = and_reduce(&self.registry, &status.reagents);
                status.abnormal_reagent = reagent;
                status.abnormal_calibrate = calib;
            }
            status.mask_assay = is_assay_masked(&self.registry, &self.codes, code, classification);

            if status.flags() != before {
                delta.insert(code);
            }
        }
        delta
    }

    fn fetch(&self, code: AssayCode, classification: Classification) -> Result<Vec<SupplyRecord>, EngineError> {
        self.source.fetch_records(code, classification).map_err(|source| {
            error!(assay_code = code, ?classification, error = %source, "record fetch failed, status left untouched");
            EngineError::Source { code, source }
        })
    }

    fn build_status(&mut self, code: AssayCode, classification: Classification, records: Vec<SupplyRecord>) -> AssayStatus {
        let mut status = AssayStatus::new(code, classification);
        for record in records {
            status.reagents.insert(record.key(), record);
        }

        let (reagent, calib) = and_reduce(&self.registry, &status.reagents);
        status.abnormal_reagent = reagent;
        status.abnormal_calibrate = calib;
        status.mask_assay = is_assay_masked(&self.registry, &self.codes, code, classification);

        self.stats.full_builds += 1;
        debug!(
            assay_code = code,
            records = status.reagents.len(),
            abnormal_reagent = reagent,
            abnormal_calibrate = calib,
            mask_assay = status.mask_assay,
            "assay status built"
        );
        status
    }
}

/// Both flags start abnormal and drop to normal on the first normal record.
/// A flag that reached normal is not evaluated again in the same pass.
fn and_reduce(registry: &dyn DeviceRegistry, reagents: &ReagentMap) -> (bool, bool) {
    let ctx = EvalContext::new(registry, reagents);
    let mut reagent = true;
    let mut calib = true;

    for record in reagents.values() {
        if reagent && !record.is_reagent_abnormal(&ctx) {
            reagent = false;
        }
        if calib && !record.is_calibration_abnormal(&ctx) {
            calib = false;
        }
        if !reagent && !calib {
            break;
        }
    }

    (reagent, calib)
}

fn apply_record(
    registry: &dyn DeviceRegistry,
    codes: &CodeTable,
    status: &mut AssayStatus,
    record: &SupplyRecord,
    stats: &mut EngineStats,
) -> bool {
    let before = status.flags();
    let adopted = status.reagents.is_empty();

    // Own flags are read against the map holding the new version only.
    status.reagents.insert(record.key(), record.clone());
    let (own_reagent, own_calib) = {
        let ctx = EvalContext::new(registry, &status.reagents);
        (record.is_reagent_abnormal(&ctx), record.is_calibration_abnormal(&ctx))
    };

    if adopted {
        stats.fast_path_adoptions += 1;
        status.abnormal_reagent = own_reagent;
        status.abnormal_calibrate = own_calib;
    } else {
        status.abnormal_reagent = fold_flag(registry, &status.reagents, Flag::Reagent, status.abnormal_reagent, own_reagent, stats);
        status.abnormal_calibrate = fold_flag(
            registry,
            &status.reagents,
            Flag::Calibration,
            status.abnormal_calibrate,
            own_calib,
            stats,
        );
    }

    status.mask_assay = is_assay_masked(registry, codes, status.assay_code, status.classification);
    status.flags() != before
}

/// Monotonic update of one aggregate flag for a record that was just
/// inserted into `reagents`.
///
/// A normal record clears an abnormal aggregate on its own. An abnormal
/// record can only set a normal aggregate after a walk confirms that no
/// other record is normal. Every other combination leaves the flag alone.
fn fold_flag(
    registry: &dyn DeviceRegistry,
    reagents: &ReagentMap,
    flag: Flag,
    aggregate: bool,
    own: bool,
    stats: &mut EngineStats,
) -> bool {
    match (aggregate, own) {
        (true, false) => {
            stats.witness_flips += 1;
            false
        }
        (false, true) => {
            stats.rescans += 1;
            let ctx = EvalContext::new(registry, reagents);
            reagents.values().all(|r| flag.abnormal(r, &ctx))
        }
        (unchanged, _) => unchanged,
    }
}
