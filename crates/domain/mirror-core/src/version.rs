//! The local version store's record shape (spec §3 Version record).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One JSON file per mirrored repo at `.version/<repo_id>.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VersionRecord {
    pub origin: String,
    /// patch_id -> sha256 hex digest of the upstream `files.js` bytes last
    /// observed for that patch.
    pub patches: BTreeMap<String, String>,
}

impl VersionRecord {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            patches: BTreeMap::new(),
        }
    }

    /// Invariant V2: the record is "empty" once it carries no patches, at
    /// which point the caller must delete the backing file.
    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }
}
