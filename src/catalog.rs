//! Assay definitions and the fixed code table used for fan-out and
//! canonicalisation.

use serde::{Deserialize, Serialize};

use crate::types::{AssayCode, Classification};

/// Representative code all electrolyte sub-codes canonicalise to.
pub const ISE_ASSAY_CODE: AssayCode = 800;
/// Sodium.
pub const ISE_NA_CODE: AssayCode = 801;
/// Potassium.
pub const ISE_K_CODE: AssayCode = 802;
/// Chloride.
pub const ISE_CL_CODE: AssayCode = 803;

/// Composite serum index assay.
pub const SERUM_INDEX_CODE: AssayCode = 900;
/// Hemolysis index.
pub const HEMOLYSIS_INDEX_CODE: AssayCode = 901;
/// Icterus index.
pub const ICTERUS_INDEX_CODE: AssayCode = 902;
/// Lipemia index.
pub const LIPEMIA_INDEX_CODE: AssayCode = 903;
/// Derived index result that shares the serum index mask entry.
pub const INDEX_DERIVATIVE_CODE: AssayCode = 910;

/// One entry of the assay catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssayDefinition {
    /// Assay code.
    pub code: AssayCode,
    /// Analyzer family that runs it.
    pub classification: Classification,
    /// Display name.
    pub name: String,
}

impl AssayDefinition {
    /// Builds a definition.
    pub fn new(code: AssayCode, classification: Classification, name: impl Into<String>) -> Self {
        Self {
            code,
            classification,
            name: name.into(),
        }
    }
}

/// Fixed mapping used to expand composite codes and canonicalise codes
/// before mask lookups.
///
/// Both mappings are listed entry by entry; nothing is inferred from numeric
/// ranges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeTable {
    /// Composite code whose records feed its constituents too.
    pub composite_code: AssayCode,
    /// Leaf codes fed by a composite record.
    pub composite_constituents: [AssayCode; 3],
    /// Representative electrolyte code used in device mask sets.
    pub ise_code: AssayCode,
    /// Electrolyte sub-codes that canonicalise to [`Self::ise_code`].
    pub ise_sub_codes: Vec<AssayCode>,
    /// Derived code that canonicalises to [`Self::composite_code`].
    pub index_derivative_code: AssayCode,
}

impl Default for CodeTable {
    fn default() -> Self {
        Self {
            composite_code: SERUM_INDEX_CODE,
            composite_constituents: [HEMOLYSIS_INDEX_CODE, ICTERUS_INDEX_CODE, LIPEMIA_INDEX_CODE],
            ise_code: ISE_ASSAY_CODE,
            ise_sub_codes: vec![ISE_NA_CODE, ISE_K_CODE, ISE_CL_CODE],
            index_derivative_code: INDEX_DERIVATIVE_CODE,
        }
    }
}

impl CodeTable {
    /// Status codes touched by a record carrying `code`.
    ///
    /// The composite code yields its constituents followed by itself; any
    /// other code yields only itself.
    pub fn expand(&self, code: AssayCode) -> Vec<AssayCode> {
        if code == self.composite_code {
            let mut out = self.composite_constituents.to_vec();
            out.push(code);
            out
        } else {
            vec![code]
        }
    }

    /// Code under which devices record a mask for `code`.
    pub fn canonicalize(&self, code: AssayCode) -> AssayCode {
        if self.ise_sub_codes.contains(&code) {
            self.ise_code
        } else if code == self.index_derivative_code {
            self.composite_code
        } else {
            code
        }
    }
}

