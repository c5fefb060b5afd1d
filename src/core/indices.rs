use hashbrown::HashMap;

use crate::types::AssayCode;

/// Secondary index from a grouping key to the codes filed under it.
pub type CodeIndex<K> = HashMap<K, Vec<AssayCode>>;
