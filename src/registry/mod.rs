/// In-memory registry.
pub mod memory;

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use crate::types::{AssayCode, CalibrationState, Classification, DeviceSn, ModuleIndex};

/// Serialized set of assay codes a device hides from the operator.
///
/// The device layer stores it as an opaque blob; this crate reads it as a
/// JSON array of codes. An empty blob is an empty set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MaskedCodeBlob {
    /// Raw blob bytes.
    pub bytes: Vec<u8>,
}

impl MaskedCodeBlob {
    /// Encodes `codes` into a blob.
    pub fn encode(codes: &[AssayCode]) -> Result<Self, serde_json::Error> {
        Ok(Self {
            bytes: serde_json::to_vec(codes)?,
        })
    }

    /// Decodes the blob into a code set.
    pub fn decode(&self) -> Result<HashSet<AssayCode>, serde_json::Error> {
        if self.bytes.is_empty() {
            return Ok(HashSet::new());
        }
        let codes: Vec<AssayCode> = serde_json::from_slice(&self.bytes)?;
        Ok(codes.into_iter().collect())
    }
}

/// Electrolyte module mounted on a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IseModule {
    /// Module index on the device.
    pub index: ModuleIndex,
    /// Module calibration state.
    pub calibration: CalibrationState,
}

/// Device entry as seen by the status engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Serial number.
    pub sn: DeviceSn,
    /// Analyzer family.
    pub classification: Classification,
    /// Whole device hidden from the operator.
    pub globally_masked: bool,
    /// Codes this device hides.
    pub masked_codes: MaskedCodeBlob,
    /// Electrolyte modules, empty for devices without any.
    pub ise_modules: Vec<IseModule>,
}

impl Device {
    /// Builds an unmasked device with no electrolyte modules.
    pub fn new(sn: impl Into<DeviceSn>, classification: Classification) -> Self {
        Self {
            sn: sn.into(),
            classification,
            globally_masked: false,
            masked_codes: MaskedCodeBlob::default(),
            ise_modules: Vec::new(),
        }
    }
}

/// Device directory consulted by the engine.
///
/// Owned by the engine; the device layer pushes changes through
/// [`crate::engine::aggregator::AggregationEngine::apply_device`].
pub trait DeviceRegistry: Send {
    /// Every known device.
    fn devices(&self) -> &[Device];

    /// Inserts or replaces the device with the same serial number.
    fn upsert_device(&mut self, device: Device);

    /// Removes a device, returning it when present.
    fn remove_device(&mut self, sn: &str) -> Option<Device>;

    /// Device by serial number.
    fn device(&self, sn: &str) -> Option<&Device> {
        self.devices().iter().find(|d| d.sn == sn)
    }

    /// Electrolyte module `index` on device `sn`.
    fn ise_module(&self, sn: &str, index: ModuleIndex) -> Option<&IseModule> {
        self.device(sn)?.ise_modules.iter().find(|m| m.index == index)
    }
}
