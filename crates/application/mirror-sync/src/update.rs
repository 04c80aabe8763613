//! The UPDATE state machine (spec §4.5): Phase A discovers what changed
//! across every mirrored repo, Phase B converges one patch at a time.

use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};
use mirror_core::{compute_update_diff, MirrorPath, RawFilesManifest, UpdateEntryMode, UpdateJournal};
use mirror_transport::sha256_hex;
use tracing::{info, warn};

use crate::engine::SyncEngine;
use crate::error::EngineError;

/// One patch whose upstream `files.js` hash no longer matches what's on
/// record (Phase A output, spec §4.5 step 1).
#[derive(Debug, Clone)]
pub struct UpdateWorkItem {
    pub repo_id: String,
    pub patch: String,
    pub patch_url: String,
    pub origin: String,
    pub new_hash: String,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateOutcome {
    pub converged: Vec<(String, String)>,
    pub unchanged: Vec<(String, String)>,
    /// (repo_id, patch, reason) for patches whose upstream manifest could
    /// not be refetched in Phase A (spec §9: non-fatal, skip and log).
    pub unreachable: Vec<(String, String, String)>,
}

impl SyncEngine {
    /// Phase A (spec §4.5 step 1): for every repo under `.version/`, refetch
    /// each recorded patch's `files.js` and hash it; a repo with no
    /// `.version/` directory at all is reported as `NoVersionStore`.
    pub async fn check_updates(&self) -> Result<Vec<UpdateWorkItem>, EngineError> {
        let version_dir = self.mirror_root.join(".version");
        let mut entries = match tokio::fs::read_dir(version_dir.as_std_path()).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(EngineError::NoVersionStore(version_dir))
            }
            Err(e) => {
                return Err(mirror_store::StoreError::Io {
                    path: version_dir.to_string(),
                    source: e,
                }
                .into())
            }
        };

        let mut work = Vec::new();
        loop {
            let entry = entries.next_entry().await.map_err(|e| mirror_store::StoreError::Io {
                path: version_dir.to_string(),
                source: e,
            })?;
            let Some(entry) = entry else { break };
            let file_name = entry.file_name();
            let name = file_name.to_string_lossy();
            let Some(repo_id) = name.strip_suffix(".json") else {
                continue;
            };

            let Some(record) = self.version_store.load(repo_id).await? else {
                continue;
            };
            info!(repo_id, "checking for updates");

            for (patch, stored_hash) in &record.patches {
                let patch_url = crate::urlutil::join(&record.origin, &format!("{patch}/"))?;
                let bytes = match self.manifest().fetch_files_js_bytes(&patch_url).await {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        warn!(repo_id, patch, error = %e, "could not refetch upstream manifest, skipping this round");
                        continue;
                    }
                };
                let new_hash = sha256_hex(&bytes);
                if &new_hash != stored_hash {
                    info!(repo_id, patch, "new version available");
                    work.push(UpdateWorkItem {
                        repo_id: repo_id.to_string(),
                        patch: patch.clone(),
                        patch_url,
                        origin: record.origin.clone(),
                        new_hash,
                    });
                }
            }
            info!(repo_id, "check finished");
        }
        Ok(work)
    }

    /// Run Phase A, then converge every out-of-date patch repo by repo
    /// (spec §4.5: repos and the patches within them are processed
    /// serially), invoking the Publisher's rebuild-only step once per repo
    /// and clearing the UPDATE journal only once the whole session is done.
    pub async fn run_update(&self) -> Result<UpdateOutcome, EngineError> {
        let work = self.check_updates().await?;
        let mut by_repo: BTreeMap<String, Vec<UpdateWorkItem>> = BTreeMap::new();
        for item in work {
            by_repo.entry(item.repo_id.clone()).or_default().push(item);
        }

        let mut outcome = UpdateOutcome::default();
        for (repo_id, items) in by_repo {
            for item in items {
                match self.converge_patch(&item).await {
                    Ok(true) => outcome.converged.push((item.repo_id.clone(), item.patch.clone())),
                    Ok(false) => outcome.unchanged.push((item.repo_id.clone(), item.patch.clone())),
                    Err(e) => {
                        warn!(repo_id = %item.repo_id, patch = %item.patch, error = %e, "UPDATE: failed to converge patch");
                        outcome.unreachable.push((item.repo_id.clone(), item.patch.clone(), e.to_string()));
                    }
                }
            }
            self.rebuild_after_update(&repo_id).await?;
        }

        self.journal_store.clear_update().await?;
        Ok(outcome)
    }

    /// Phase B for a single patch (spec §4.5 steps 1–6). Returns `true` if
    /// a diff was applied, `false` if the patch was already converged.
    pub async fn converge_patch(&self, item: &UpdateWorkItem) -> Result<bool, EngineError> {
        let patch_dir = self.mirror_root.join(&item.repo_id).join(&item.patch);
        let local_path = patch_dir.join("files.js");
        let local_manifest: RawFilesManifest =
            mirror_store::read_json(&local_path).await?.unwrap_or_default();

        let origin_bytes = self.manifest().fetch_files_js_bytes(&item.patch_url).await?;
        let origin_manifest: RawFilesManifest = serde_json::from_slice(&origin_bytes)?;

        let diff = compute_update_diff(&local_manifest, &origin_manifest);
        if diff.is_empty() {
            // Nothing to converge, but the hash still advances (step 6).
            self.version_store
                .upsert(&item.repo_id, &item.origin, &item.patch, &item.new_hash)
                .await?;
            return Ok(false);
        }

        // Step 3: write the UPDATE journal before touching any files.
        let journal = UpdateJournal {
            repo_id: item.repo_id.clone(),
            patch: item.patch.clone(),
            patch_dir: patch_dir.to_string(),
            patch_url: item.patch_url.clone(),
            new_hash: item.new_hash.clone(),
            files: diff.clone(),
        };
        self.journal_store.save_update(&journal).await?;

        self.execute_diff(&patch_dir, &item.patch_url, &diff).await;

        // Step 5: the stale manifest no longer describes the tree; the
        // next repo_build writes a fresh one.
        let _ = tokio::fs::remove_file(local_path.as_std_path()).await;

        // Step 6.
        self.version_store
            .upsert(&item.repo_id, &item.origin, &item.patch, &item.new_hash)
            .await?;

        Ok(true)
    }

    /// Step 4: fetch every `"u"` entry through the UPDATE pool (5
    /// concurrent), then delete every `"r"` entry and collapse directories
    /// left empty by the deletion.
    pub(crate) async fn execute_diff(
        &self,
        patch_dir: &Utf8Path,
        patch_url: &str,
        diff: &BTreeMap<String, mirror_core::UpdateEntry>,
    ) {
        let to_fetch = diff
            .iter()
            .filter(|(_, entry)| entry.mode() == UpdateEntryMode::Update)
            .map(|(path, _)| path.clone());
        self.download_files(patch_url, patch_dir, to_fetch, mirror_transport::TransferPool::update_pool())
            .await;

        for (path, entry) in diff {
            if entry.mode() == UpdateEntryMode::Remove {
                remove_and_collapse(patch_dir, path).await;
            }
        }
    }

    async fn rebuild_after_update(&self, repo_id: &str) -> Result<(), EngineError> {
        let repo_dir = self.mirror_root.join(repo_id);
        self.publisher_rebuild_only(repo_id, &repo_dir).await
    }
}

/// Delete `patch_dir/rel`, then walk upward removing now-empty ancestor
/// directories, stopping at the first non-empty one or at `patch_dir`
/// itself.
async fn remove_and_collapse(patch_dir: &Utf8Path, rel: &str) {
    let file_path = match MirrorPath::safe_join(patch_dir, rel) {
        Ok(p) => p,
        Err(e) => {
            warn!(path = rel, error = %e, "refusing to remove unsafe path from update diff");
            return;
        }
    };
    match tokio::fs::remove_file(file_path.as_std_path()).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            warn!(path = %file_path, error = %e, "failed to remove file marked for deletion");
            return;
        }
    }

    let mut dir: Option<Utf8PathBuf> = file_path.parent().map(|p| p.to_path_buf());
    while let Some(d) = dir {
        if d == *patch_dir || !d.starts_with(patch_dir) {
            break;
        }
        if let Err(e) = mirror_store::remove_if_empty_dir(&d).await {
            warn!(dir = %d, error = %e, "failed to collapse empty directory");
            break;
        }
        if d.as_std_path().exists() {
            break;
        }
        dir = d.parent().map(|p| p.to_path_buf());
    }
}
