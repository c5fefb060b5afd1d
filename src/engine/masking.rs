use tracing::warn;

use crate::{
    catalog::CodeTable,
    registry::DeviceRegistry,
    types::{AssayCode, Classification},
};

/// Decides whether `code` is hidden from the operator.
///
/// Only devices of `classification` take part and globally masked devices
/// are skipped. The first remaining device whose mask set lacks the
/// canonical code makes the assay visible. With no such device, including
/// the case of no capable device at all, the assay is masked.
pub fn is_assay_masked(
    registry: &dyn DeviceRegistry,
    codes: &CodeTable,
    code: AssayCode,
    classification: Classification,
) -> bool {
    let canonical = codes.canonicalize(code);

    for device in registry.devices() {
        if device.classification != classification || device.globally_masked {
            continue;
        }

        let masked = match device.masked_codes.decode() {
            Ok(set) => set,
            Err(err) => {
                warn!(device_sn = %device.sn, error = %err, "masked-code blob not decodable, device ignored");
                continue;
            }
        };

        if !masked.contains(&canonical) {
            return false;
        }
    }

    true
}
