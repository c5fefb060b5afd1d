//! Shared primitive IDs and classification enums.

use serde::{Deserialize, Serialize};

/// Integer laboratory test identifier.
pub type AssayCode = u32;
/// Record identifier, unique within one record kind on one device.
pub type RecordId = u64;
/// Owning device serial number.
pub type DeviceSn = String;
/// Electrolyte module index on a device.
pub type ModuleIndex = u8;

/// Analyzer family that runs an assay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    /// Colorimetric chemistry analyzers, including their electrolyte modules.
    Chemistry,
    /// Immunoassay analyzers.
    Immunoassay,
}

/// Backend record shape behind a [`crate::record::SupplyRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecordKind {
    /// Chemistry reagent group.
    Chemistry,
    /// Immunoassay reagent pack.
    Immunoassay,
    /// Electrolyte supply bottle.
    Electrolyte,
}

/// Calibration state shared by every record shape and electrolyte modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CalibrationState {
    /// Never calibrated.
    #[default]
    Uncalibrated,
    /// Calibrated and within validity.
    Valid,
    /// Calibration validity period elapsed.
    Expired,
    /// Last calibration run failed.
    Failed,
}

impl CalibrationState {
    /// True unless the calibration is currently valid.
    pub fn is_abnormal(self) -> bool {
        self != Self::Valid
    }
}
