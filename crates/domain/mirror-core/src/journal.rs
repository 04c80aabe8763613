//! On-disk crash-recovery breadcrumbs (spec §3 ADD/UPDATE journal).

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

/// `<mirror_dir>/__add.json`. Accompanied by `__files.js`, which holds the
/// raw upstream `files.js` bytes for the in-flight (`downloading`) patch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddJournal {
    pub repo: String,
    pub origin: String,
    pub patches_task: VecDeque<String>,
    pub downloading: String,
}

/// Tag of a single UPDATE journal file entry: `"u"` must be fetched, `"r"`
/// must be deleted locally (spec §3 UPDATE journal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateEntryMode {
    #[serde(rename = "u")]
    Update,
    #[serde(rename = "r")]
    Remove,
}

/// `[<upstream_crc_or_null>, "u"|"r"]` — a tuple struct serializes to a
/// JSON array via serde, matching the wire shape exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateEntry(pub Option<u32>, pub UpdateEntryMode);

impl UpdateEntry {
    pub fn token(&self) -> Option<u32> {
        self.0
    }

    pub fn mode(&self) -> UpdateEntryMode {
        self.1
    }
}

/// `<mirror_dir>/__update.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateJournal {
    pub repo_id: String,
    pub patch: String,
    pub patch_dir: String,
    pub patch_url: String,
    pub new_hash: String,
    pub files: BTreeMap<String, UpdateEntry>,
}
