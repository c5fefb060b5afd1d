use proptest::prelude::*;

use assaystat::{
    catalog::{
        AssayDefinition, CodeTable, HEMOLYSIS_INDEX_CODE, ICTERUS_INDEX_CODE, ISE_NA_CODE, LIPEMIA_INDEX_CODE,
        SERUM_INDEX_CODE,
    },
    core::store::AssayStatus,
    engine::aggregator::AggregationEngine,
    record::{
        BottlePosition, BottleState, ChemistryReagentGroup, ElectrolyteBottle, EvalContext, ReagentUsage,
        SupplyRecord,
    },
    registry::{memory::DeviceTable, Device, DeviceRegistry, IseModule},
    source::memory::MemoryRecordSource,
    types::{AssayCode, CalibrationState, Classification},
};

const CHEM: AssayCode = 11;

const INDEX_CODES: [AssayCode; 4] = [SERUM_INDEX_CODE, HEMOLYSIS_INDEX_CODE, ICTERUS_INDEX_CODE, LIPEMIA_INDEX_CODE];

const CHECKED: [AssayCode; 6] = [
    CHEM,
    ISE_NA_CODE,
    SERUM_INDEX_CODE,
    HEMOLYSIS_INDEX_CODE,
    ICTERUS_INDEX_CODE,
    LIPEMIA_INDEX_CODE,
];

#[derive(Debug, Clone)]
enum Action {
    Chem { slot: u8, usable: bool, calibrated: bool, unload: bool },
    Index { code: usize, slot: u8, usable: bool, calibrated: bool, unload: bool },
    Bottle { id: u8, module: u8, internal_standard: bool, state: u8, unload: bool },
    ModuleCalibration { failed: bool },
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        4 => (0u8..5, any::<bool>(), any::<bool>(), prop::bool::weighted(0.25))
            .prop_map(|(slot, usable, calibrated, unload)| Action::Chem { slot, usable, calibrated, unload }),
        3 => (0usize..4, 0u8..3, any::<bool>(), any::<bool>(), prop::bool::weighted(0.25))
            .prop_map(|(code, slot, usable, calibrated, unload)| Action::Index { code, slot, usable, calibrated, unload }),
        5 => (0u8..5, 0u8..3, any::<bool>(), 0u8..5, prop::bool::weighted(0.25))
            .prop_map(|(id, module, internal_standard, state, unload)| Action::Bottle {
                id,
                module,
                internal_standard,
                state,
                unload,
            }),
        1 => any::<bool>().prop_map(|failed| Action::ModuleCalibration { failed }),
    ]
}

fn chem(code: AssayCode, id: u64, usable: bool, calibrated: bool) -> SupplyRecord {
    SupplyRecord::Chemistry(ChemistryReagentGroup {
        id,
        device_sn: "C-1".to_string(),
        assay_code: code,
        placed: true,
        usage: ReagentUsage::InUse,
        remaining_tests: if usable { 10 } else { 0 },
        reagent_expired: false,
        onboard_expired: false,
        calibration: if calibrated {
            CalibrationState::Valid
        } else {
            CalibrationState::Expired
        },
    })
}

/// Module 2 is not fitted on the device. Ids are free of position, so a
/// bottle can move slots and several bottles can share one.
fn bottle(id: u8, module: u8, internal_standard: bool, state: u8) -> SupplyRecord {
    let state = match state {
        0 => BottleState::Normal,
        1 => BottleState::Low,
        2 => BottleState::Empty,
        3 => BottleState::Expired,
        _ => BottleState::Missing,
    };
    SupplyRecord::Electrolyte(ElectrolyteBottle {
        id: u64::from(id),
        device_sn: "C-1".to_string(),
        assay_code: ISE_NA_CODE,
        module_index: module,
        position: if internal_standard {
            BottlePosition::InternalStandard
        } else {
            BottlePosition::Buffer
        },
        state,
    })
}

fn device(module_calibration: CalibrationState) -> Device {
    let mut device = Device::new("C-1", Classification::Chemistry);
    for index in 0..2 {
        device.ise_modules.push(IseModule {
            index,
            calibration: module_calibration,
        });
    }
    device
}

/// Reference answer computed from scratch: `None` when the map is empty.
fn full_recompute(registry: &dyn DeviceRegistry, status: &AssayStatus) -> Option<(bool, bool)> {
    if status.reagents().is_empty() {
        return None;
    }
    let ctx = EvalContext::new(registry, status.reagents());
    let reagent = status.reagents().values().all(|r| r.is_reagent_abnormal(&ctx));
    let calib = status.reagents().values().all(|r| r.is_calibration_abnormal(&ctx));
    Some((reagent, calib))
}

proptest! {
    #[test]
    fn incremental_flags_match_full_recompute(actions in prop::collection::vec(action_strategy(), 1..120)) {
        let registry = DeviceTable::with_devices([device(CalibrationState::Valid)]);
        let mut engine = AggregationEngine::new(registry, Box::new(MemoryRecordSource::new()), CodeTable::default());
        engine
            .load_catalogue(
                &CHECKED
                    .iter()
                    .map(|code| AssayDefinition::new(*code, Classification::Chemistry, format!("assay-{code}")))
                    .collect::<Vec<_>>(),
            )
            .expect("load");

        for action in actions {
            let before: Vec<(bool, bool, bool)> = CHECKED
                .iter()
                .map(|code| {
                    let s = engine.status(*code).expect("status");
                    (s.abnormal_reagent(), s.abnormal_calibrate(), s.mask_assay())
                })
                .collect();

            let delta = match action {
                Action::Chem { slot, usable, calibrated, unload } => {
                    let record = chem(CHEM, u64::from(slot), usable, calibrated);
                    if unload { engine.unload_reagent(&record) } else { engine.update_assay_status(&record) }
                }
                Action::Index { code, slot, usable, calibrated, unload } => {
                    let code = INDEX_CODES[code];
                    let record = chem(code, u64::from(code) * 100 + u64::from(slot), usable, calibrated);
                    if unload { engine.unload_reagent(&record) } else { engine.update_assay_status(&record) }
                }
                Action::Bottle { id, module, internal_standard, state, unload } => {
                    let record = bottle(id, module, internal_standard, state);
                    if unload { engine.unload_reagent(&record) } else { engine.update_assay_status(&record) }
                }
                Action::ModuleCalibration { failed } => {
                    let state = if failed { CalibrationState::Failed } else { CalibrationState::Valid };
                    engine.apply_device(device(state))
                }
            };

            for (idx, code) in CHECKED.into_iter().enumerate() {
                let status = engine.status(code).expect("status");
                match full_recompute(engine.registry(), status) {
                    Some((reagent, calib)) => {
                        prop_assert_eq!(status.abnormal_reagent(), reagent);
                        prop_assert_eq!(status.abnormal_calibrate(), calib);
                    }
                    None => prop_assert!(status.abnormal_reagent()),
                }

                let after = (status.abnormal_reagent(), status.abnormal_calibrate(), status.mask_assay());
                if after != before[idx] {
                    prop_assert!(delta.contains(code), "flip on {} missing from delta", code);
                }
            }
        }
    }
}
