//! Supply records from the three backend subsystems and their abnormality
//! predicates.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::{
    registry::DeviceRegistry,
    types::{AssayCode, CalibrationState, DeviceSn, ModuleIndex, RecordId, RecordKind},
};

/// Identity of a record inside one assay's reagent map.
///
/// Record ids are only unique within a kind on a single device, so all three
/// parts are needed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    /// Backend shape.
    pub kind: RecordKind,
    /// Owning device.
    pub device_sn: DeviceSn,
    /// Backend record id.
    pub id: RecordId,
}

/// Reagent map of a single assay.
pub type ReagentMap = HashMap<RecordKey, SupplyRecord>;

/// Usage state reported for a chemistry reagent group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReagentUsage {
    /// Currently consumed by tests.
    InUse,
    /// Loaded and usable once the in-use group runs out.
    Standby,
    /// Disabled by the operator.
    Disabled,
    /// Reported empty by the liquid-level sensor.
    Empty,
}

/// Chemistry (colorimetric) reagent group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChemistryReagentGroup {
    /// Backend id.
    pub id: RecordId,
    /// Owning device.
    pub device_sn: DeviceSn,
    /// Supported assay.
    pub assay_code: AssayCode,
    /// True while the group sits in a reagent tray position.
    pub placed: bool,
    /// Usage state.
    pub usage: ReagentUsage,
    /// Tests left across every bottle in the group.
    pub remaining_tests: u32,
    /// Lot expiry passed.
    pub reagent_expired: bool,
    /// On-board stability window passed.
    pub onboard_expired: bool,
    /// Calibration state of the group's lot.
    pub calibration: CalibrationState,
}

impl ChemistryReagentGroup {
    fn reagent_abnormal(&self) -> bool {
        !self.placed
            || matches!(self.usage, ReagentUsage::Disabled | ReagentUsage::Empty)
            || self.remaining_tests == 0
            || self.reagent_expired
            || self.onboard_expired
    }
}

/// Immunoassay reagent pack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImmunoReagent {
    /// Backend id.
    pub id: RecordId,
    /// Owning device.
    pub device_sn: DeviceSn,
    /// Supported assay.
    pub assay_code: AssayCode,
    /// Reagent area slot, `None` once the pack was taken out.
    pub position: Option<u16>,
    /// Tests left in the pack.
    pub remaining_tests: u32,
    /// Lot expiry passed.
    pub lot_expired: bool,
    /// On-board stability window passed.
    pub onboard_expired: bool,
    /// Calibration state for the pack's lot.
    pub calibration: CalibrationState,
    /// Master curve for the lot is present and valid.
    pub master_curve_valid: bool,
}

impl ImmunoReagent {
    fn reagent_abnormal(&self) -> bool {
        self.position.is_none() || self.remaining_tests == 0 || self.lot_expired || self.onboard_expired
    }

    fn calibration_abnormal(&self) -> bool {
        self.calibration.is_abnormal() || !self.master_curve_valid
    }
}

/// Canonical slot of an electrolyte bottle within its module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BottlePosition {
    /// Buffer solution.
    Buffer,
    /// Internal standard solution.
    InternalStandard,
}

impl BottlePosition {
    /// The complementary position in the same module.
    pub fn paired(self) -> Self {
        match self {
            Self::Buffer => Self::InternalStandard,
            Self::InternalStandard => Self::Buffer,
        }
    }
}

/// Bottle state as reported by the electrolyte module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BottleState {
    /// Usable.
    Normal,
    /// Usable, below the low-volume warning threshold.
    Low,
    /// No volume left.
    Empty,
    /// Past expiry.
    Expired,
    /// Slot reports no bottle.
    Missing,
}

impl BottleState {
    /// True when the bottle alone cannot support measurements.
    pub fn is_abnormal(self) -> bool {
        matches!(self, Self::Empty | Self::Expired | Self::Missing)
    }
}

/// Electrolyte supply bottle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectrolyteBottle {
    /// Backend id.
    pub id: RecordId,
    /// Owning device.
    pub device_sn: DeviceSn,
    /// Supported assay.
    pub assay_code: AssayCode,
    /// Electrolyte module the bottle feeds.
    pub module_index: ModuleIndex,
    /// Slot within the module.
    pub position: BottlePosition,
    /// Reported state.
    pub state: BottleState,
}

impl ElectrolyteBottle {
    /// Abnormality from the bottle's own state, ignoring its pair.
    pub fn own_state_abnormal(&self) -> bool {
        self.state.is_abnormal()
    }

    /// Bottles in the paired position of the same module, other than this one.
    fn pair_candidates<'a>(&'a self, siblings: &'a ReagentMap) -> impl Iterator<Item = &'a ElectrolyteBottle> + 'a {
        let wanted = self.position.paired();
        siblings.values().filter_map(move |rec| match rec {
            SupplyRecord::Electrolyte(b)
                if b.id != self.id
                    && b.device_sn == self.device_sn
                    && b.module_index == self.module_index
                    && b.position == wanted =>
            {
                Some(b)
            }
            _ => None,
        })
    }

    /// Normal when at least one bottle in the paired position is usable on its
    /// own. Several candidates can exist while a bottle is being swapped.
    fn reagent_abnormal(&self, ctx: &EvalContext<'_>) -> bool {
        if ctx.registry.ise_module(&self.device_sn, self.module_index).is_none() {
            return true;
        }
        if self.own_state_abnormal() {
            return true;
        }
        self.pair_candidates(ctx.siblings).all(ElectrolyteBottle::own_state_abnormal)
    }

    fn calibration_abnormal(&self, ctx: &EvalContext<'_>) -> bool {
        match ctx.registry.ise_module(&self.device_sn, self.module_index) {
            Some(module) => module.calibration.is_abnormal(),
            None => true,
        }
    }
}

/// Lookups a predicate may consult besides the record's own payload.
#[derive(Clone, Copy)]
pub struct EvalContext<'a> {
    /// Device registry used to resolve electrolyte modules.
    pub registry: &'a dyn DeviceRegistry,
    /// Reagent map of the assay the record is evaluated for.
    pub siblings: &'a ReagentMap,
}

impl<'a> EvalContext<'a> {
    /// Builds a context.
    pub fn new(registry: &'a dyn DeviceRegistry, siblings: &'a ReagentMap) -> Self {
        Self { registry, siblings }
    }
}

/// Supply record from any of the three subsystems.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupplyRecord {
    /// Chemistry reagent group.
    Chemistry(ChemistryReagentGroup),
    /// Immunoassay reagent pack.
    Immunoassay(ImmunoReagent),
    /// Electrolyte bottle.
    Electrolyte(ElectrolyteBottle),
}

impl SupplyRecord {
    /// Backend shape.
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Chemistry(_) => RecordKind::Chemistry,
            Self::Immunoassay(_) => RecordKind::Immunoassay,
            Self::Electrolyte(_) => RecordKind::Electrolyte,
        }
    }

    /// Backend id.
    pub fn id(&self) -> RecordId {
        match self {
            Self::Chemistry(r) => r.id,
            Self::Immunoassay(r) => r.id,
            Self::Electrolyte(r) => r.id,
        }
    }

    /// Supported assay code.
    pub fn assay_code(&self) -> AssayCode {
        match self {
            Self::Chemistry(r) => r.assay_code,
            Self::Immunoassay(r) => r.assay_code,
            Self::Electrolyte(r) => r.assay_code,
        }
    }

    /// Owning device.
    pub fn device_sn(&self) -> &str {
        match self {
            Self::Chemistry(r) => &r.device_sn,
            Self::Immunoassay(r) => &r.device_sn,
            Self::Electrolyte(r) => &r.device_sn,
        }
    }

    /// Map key for this record.
    pub fn key(&self) -> RecordKey {
        RecordKey {
            kind: self.kind(),
            device_sn: self.device_sn().to_string(),
            id: self.id(),
        }
    }

    /// True when this record cannot currently supply the assay.
    ///
    /// Electrolyte bottles fail safe: an unresolved module or a missing pair
    /// makes the bottle abnormal.
    pub fn is_reagent_abnormal(&self, ctx: &EvalContext<'_>) -> bool {
        match self {
            Self::Chemistry(r) => r.reagent_abnormal(),
            Self::Immunoassay(r) => r.reagent_abnormal(),
            Self::Electrolyte(r) => r.reagent_abnormal(ctx),
        }
    }

    /// True when the calibration backing this record is not valid.
    pub fn is_calibration_abnormal(&self, ctx: &EvalContext<'_>) -> bool {
        match self {
            Self::Chemistry(r) => r.calibration.is_abnormal(),
            Self::Immunoassay(r) => r.calibration_abnormal(),
            Self::Electrolyte(r) => r.calibration_abnormal(ctx),
        }
    }
}
