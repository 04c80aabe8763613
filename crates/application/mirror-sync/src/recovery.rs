//! Crash recovery (spec §4.7): run once, before any new interactive input
//! is accepted, so a session that died mid-ADD or mid-UPDATE finishes the
//! state machine it was in rather than starting a fresh one on top of it.

use std::collections::BTreeMap;

use camino::Utf8PathBuf;
use mirror_core::{MirrorPath, ProbeMode, RawFilesManifest, UpdateEntryMode, UpdateJournal};
use mirror_transport::{sha256_hex, verify_crc32};
use tracing::info;

use crate::engine::SyncEngine;
use crate::error::EngineError;
use crate::ports::PublishRequest;

#[derive(Debug, Clone, Default)]
pub struct RecoveryOutcome {
    pub update_recovered: bool,
    pub add_recovered: bool,
}

impl SyncEngine {
    /// Resume whatever journal is on disk. `mirror_repo_url_for` mirrors
    /// `Config::mirror_repo_url`; the caller (the CLI, which owns the
    /// config) supplies it so this crate doesn't need to depend upward on
    /// `mirror-config`.
    pub async fn recover(
        &self,
        mirror_repo_url_for: &dyn Fn(&str) -> String,
    ) -> Result<RecoveryOutcome, EngineError> {
        let mut outcome = RecoveryOutcome::default();

        if let Some(journal) = self.journal_store.load_update().await? {
            self.recover_update(journal).await?;
            outcome.update_recovered = true;
        }

        if let Some(journal) = self.journal_store.load_add().await? {
            self.recover_add(journal, mirror_repo_url_for).await?;
            outcome.add_recovered = true;
        }

        Ok(outcome)
    }

    async fn recover_update(&self, journal: UpdateJournal) -> Result<(), EngineError> {
        info!(repo_id = %journal.repo_id, patch = %journal.patch, "resuming interrupted UPDATE");
        let patch_dir = Utf8PathBuf::from(journal.patch_dir.clone());

        let mut reduced = BTreeMap::new();
        for (path, entry) in &journal.files {
            let full = match MirrorPath::safe_join(&patch_dir, path) {
                Ok(p) => p,
                Err(_) => continue,
            };
            let already_done = match entry.mode() {
                UpdateEntryMode::Update => match entry.token() {
                    Some(expected) => verify_crc32(&full, expected).await,
                    None => full.as_std_path().exists(),
                },
                UpdateEntryMode::Remove => !full.as_std_path().exists(),
            };
            if !already_done {
                reduced.insert(path.clone(), *entry);
            }
        }

        self.execute_diff(&patch_dir, &journal.patch_url, &reduced).await;
        let _ = tokio::fs::remove_file(patch_dir.join("files.js").as_std_path()).await;

        let origin = match self.version_store.load(&journal.repo_id).await? {
            Some(record) => record.origin,
            None => crate::urlutil::parent(&journal.patch_url)?,
        };
        self.version_store
            .upsert(&journal.repo_id, &origin, &journal.patch, &journal.new_hash)
            .await?;

        self.publisher_rebuild_only(&journal.repo_id, &self.mirror_root.join(&journal.repo_id))
            .await?;
        self.journal_store.clear_update().await?;
        Ok(())
    }

    async fn recover_add(
        &self,
        journal: mirror_core::AddJournal,
        mirror_repo_url_for: &dyn Fn(&str) -> String,
    ) -> Result<(), EngineError> {
        info!(repo = %journal.repo, patch = %journal.downloading, "resuming interrupted ADD");

        // The in-flight patch: re-verify against the manifest bytes we
        // already persisted in `__files.js`, fetch whatever is still
        // missing, then finish S3.
        let raw_bytes = tokio::fs::read(self.mirror_root.join("__files.js").as_std_path())
            .await
            .map_err(|e| mirror_store::StoreError::Io {
                path: self.mirror_root.join("__files.js").to_string(),
                source: e,
            })?;
        let raw_manifest: RawFilesManifest = serde_json::from_slice(&raw_bytes)?;

        let patch_dir = self.mirror_root.join(&journal.repo).join(&journal.downloading);
        let mut pending = Vec::new();
        for (path, token) in &raw_manifest {
            let Some(token) = token else { continue };
            let full = match MirrorPath::safe_join(&patch_dir, path) {
                Ok(p) => p,
                Err(_) => continue,
            };
            if !verify_crc32(&full, *token).await {
                pending.push(path.clone());
            }
        }
        let patch_url = crate::urlutil::join(&journal.origin, &format!("{}/", journal.downloading))?;
        self.download_files(&patch_url, &patch_dir, pending.into_iter(), mirror_transport::TransferPool::add_pool())
            .await;

        let hash = sha256_hex(&raw_bytes);
        self.version_store
            .upsert(&journal.repo, &journal.origin, &journal.downloading, &hash)
            .await?;

        // Whatever else was still queued gets the ordinary ADD treatment;
        // per-patch failures are logged and skipped, same as a fresh
        // `add_patches` run (spec §4.4 S4).
        let mut remaining = journal.patches_task.clone();
        while let Some(patch) = remaining.pop_front() {
            let _ = self.add_one_patch(&journal.repo, &journal.origin, &patch, &remaining).await;
        }

        // The original interactive session's primary/neighbor choice is
        // gone once the process has crashed and restarted; treat the
        // recovered repo as its own primary so publishing is idempotent
        // (re-running it against an already cross-linked repo is a no-op,
        // spec §8 P8).
        let upstream_repo = self.manifest().fetch_repo(&journal.origin, ProbeMode::AddRepo).await?;
        let request = PublishRequest {
            local_repo_id: journal.repo.clone(),
            mirror_dir: self.mirror_root.clone(),
            upstream_repo,
            mirror_repo_url: mirror_repo_url_for(&journal.repo),
            primary_local_id: journal.repo.clone(),
        };
        self.publisher_publish_after_add(&request).await?;
        self.journal_store.clear_add().await?;
        Ok(())
    }
}
