//! The UPDATE-phase per-patch diff (spec §4.5 Phase B, step 1).

use std::collections::BTreeMap;

use crate::journal::{UpdateEntry, UpdateEntryMode};
use crate::wire::RawFilesManifest;

/// Key dropped from both sides before comparison: it's generated locally
/// by the repo builder, not part of the upstream content set.
const IGNORED_KEY: &str = "patch.js";

/// Compare a patch's local `files.js` against the freshly-fetched upstream
/// `files.js` and produce the UPDATE/REMOVE work list.
///
/// A local entry whose token is non-null but missing or null upstream is a
/// REMOVE; an upstream entry whose token is non-null and differs from (or
/// is absent from) the local map is an UPDATE. Anything else has already
/// converged.
pub fn compute_update_diff(
    local: &RawFilesManifest,
    origin: &RawFilesManifest,
) -> BTreeMap<String, UpdateEntry> {
    let mut diff = BTreeMap::new();

    for (path, local_token) in local {
        if path == IGNORED_KEY {
            continue;
        }
        let Some(local_token) = local_token else {
            continue;
        };
        match origin.get(path).and_then(|t| *t) {
            None => {
                diff.insert(
                    path.clone(),
                    UpdateEntry(Some(*local_token), UpdateEntryMode::Remove),
                );
            }
            Some(origin_token) if origin_token != *local_token => {
                diff.insert(
                    path.clone(),
                    UpdateEntry(Some(origin_token), UpdateEntryMode::Update),
                );
            }
            Some(_) => {}
        }
    }

    for (path, origin_token) in origin {
        if path == IGNORED_KEY || local.contains_key(path) {
            continue;
        }
        if let Some(origin_token) = origin_token {
            diff.insert(
                path.clone(),
                UpdateEntry(Some(*origin_token), UpdateEntryMode::Update),
            );
        }
    }

    diff
}
