//! The sync engine (spec §4.4, §4.5, §4.7): shared state and the pieces
//! common to both state machines (the rate-limited bounded-concurrency
//! download helper) plus the ADD state machine itself. UPDATE lives in
//! `update`, recovery in `recovery`.

use std::collections::VecDeque;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use futures::future::join_all;
use mirror_core::{resolve_file_map, with_cache_buster, AddJournal, MirrorPath, RawFilesManifest};
use mirror_store::{JournalStore, VersionStore};
use mirror_transport::{rate_limiter, sha256_hex, ByteRateLimiter, TransferPool};
use reqwest::Client;
use tracing::warn;

use crate::error::EngineError;
use crate::manifest::{HttpManifestClient, ManifestClient};
use crate::ports::{PublishPort, PublishRequest};
use crate::urlutil;

/// `rate_kib_per_s=1024` (spec §4.1 default).
pub const DEFAULT_RATE_KIB_PER_S: u32 = 1024;
/// `max_retries=5` (spec §4.1 default, §5 "per-file retry budget is 5").
pub const DEFAULT_MAX_RETRIES: u32 = 5;

pub struct SyncEngine {
    client: Client,
    manifest: Box<dyn ManifestClient>,
    pub(crate) version_store: VersionStore,
    pub(crate) journal_store: JournalStore,
    pub(crate) mirror_root: Utf8PathBuf,
    publisher: Box<dyn PublishPort>,
    limiter: Option<Arc<ByteRateLimiter>>,
    max_retries: u32,
}

#[derive(Debug, Clone, Default)]
pub struct AddOutcome {
    pub added: Vec<String>,
    /// Patches whose manifest could not be fetched (spec §4.4 tie-break:
    /// "unknown upstream patch ID -> S1 fails, skip to S4"), with a
    /// human-readable reason.
    pub skipped: Vec<(String, String)>,
}

impl SyncEngine {
    pub fn new(mirror_root: impl Into<Utf8PathBuf>, client: Client, publisher: Box<dyn PublishPort>) -> Self {
        let manifest = Box::new(HttpManifestClient::new(client.clone()));
        Self::with_components(mirror_root, client, manifest, publisher)
    }

    pub fn with_components(
        mirror_root: impl Into<Utf8PathBuf>,
        client: Client,
        manifest: Box<dyn ManifestClient>,
        publisher: Box<dyn PublishPort>,
    ) -> Self {
        let mirror_root = mirror_root.into();
        Self {
            client,
            manifest,
            version_store: VersionStore::new(mirror_root.clone()),
            journal_store: JournalStore::new(mirror_root.clone()),
            mirror_root,
            publisher,
            limiter: rate_limiter(Some(DEFAULT_RATE_KIB_PER_S)),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn manifest(&self) -> &dyn ManifestClient {
        self.manifest.as_ref()
    }

    pub fn mirror_root(&self) -> &Utf8Path {
        &self.mirror_root
    }

    pub fn version_store(&self) -> &VersionStore {
        &self.version_store
    }

    pub async fn probe(&self, url: &str) -> Result<mirror_core::ProbeMode, EngineError> {
        self.manifest.probe(url).await
    }

    /// Re-run `repo_build` for a single repo without touching `repo.js` or
    /// cross-links (spec §4.5's post-convergence Publisher call).
    pub(crate) async fn publisher_rebuild_only(
        &self,
        local_repo_id: &str,
        mirror_dir: &Utf8Path,
    ) -> Result<(), EngineError> {
        self.publisher.rebuild_only(local_repo_id, mirror_dir).await
    }

    pub(crate) async fn publisher_publish_after_add(
        &self,
        req: &PublishRequest,
    ) -> Result<(), EngineError> {
        self.publisher.publish_after_add(req).await
    }

    /// `add_patches(repo_id, repo_url, patch_ids)` (spec §4.4 S0–S5).
    /// `publish` carries what the Publisher needs once every patch has
    /// been attempted.
    pub async fn add_patches(
        &self,
        repo_id: &str,
        repo_url: &str,
        patch_ids: Vec<String>,
        publish: &PublishRequest,
    ) -> Result<AddOutcome, EngineError> {
        let mut remaining: VecDeque<String> = patch_ids.into();
        let mut outcome = AddOutcome::default();

        while let Some(current) = remaining.pop_front() {
            match self.add_one_patch(repo_id, repo_url, &current, &remaining).await {
                Ok(()) => outcome.added.push(current),
                Err(e) => {
                    warn!(patch = %current, error = %e, "ADD: manifest unreachable for patch, skipping");
                    outcome.skipped.push((current, e.to_string()));
                }
            }
        }

        // S5: publish, then clear the journal this session wrote.
        self.publisher.publish_after_add(publish).await?;
        self.journal_store.clear_add().await?;
        Ok(outcome)
    }

    /// S0 (journal) + S1 (fetch manifest) + S2 (download) + S3 (record),
    /// for one patch. Returning `Err` here is what sends the caller to S4
    /// ("skip to next patch") rather than aborting the whole session.
    pub(crate) async fn add_one_patch(
        &self,
        repo_id: &str,
        repo_url: &str,
        patch: &str,
        remaining: &VecDeque<String>,
    ) -> Result<(), EngineError> {
        let patch_url = urlutil::join(repo_url, &format!("{patch}/"))?;

        // S1: fetch the upstream files.js.
        let raw_bytes = self.manifest.fetch_files_js_bytes(&patch_url).await?;

        // S0+S1: the journal and the verbatim manifest land together,
        // before any download starts (spec §5 ordering guarantee).
        let journal = AddJournal {
            repo: repo_id.to_string(),
            origin: repo_url.to_string(),
            patches_task: remaining.clone(),
            downloading: patch.to_string(),
        };
        self.journal_store.save_add(&journal, &raw_bytes).await?;

        let raw_manifest: RawFilesManifest = serde_json::from_slice(&raw_bytes)?;
        let file_map = resolve_file_map(&raw_manifest);

        // S2: download every file through the ADD pool (10 concurrent).
        let patch_dir = self.mirror_root.join(repo_id).join(patch);
        self.download_files(&patch_url, &patch_dir, file_map.keys().cloned(), TransferPool::add_pool())
            .await;

        // S3: record the version hash now that downloads have returned.
        let hash = sha256_hex(&raw_bytes);
        self.version_store.upsert(repo_id, repo_url, patch, &hash).await?;

        Ok(())
    }

    /// Download every `rel_paths` entry from `<patch_url>/<rel>?=2233` into
    /// `<patch_dir>/<rel>`, bounded by `pool`'s permit count. Per-file
    /// failures are logged and otherwise swallowed (spec §4.1's guarantee
    /// that failures past the retry budget don't abort siblings).
    pub(crate) async fn download_files(
        &self,
        patch_url: &str,
        patch_dir: &Utf8Path,
        rel_paths: impl Iterator<Item = String>,
        pool: TransferPool,
    ) {
        let tasks = rel_paths.map(|rel| {
            let pool = pool.clone();
            let client = self.client.clone();
            let limiter = self.limiter.clone();
            let max_retries = self.max_retries;
            let patch_url = patch_url.to_string();
            let patch_dir = patch_dir.to_path_buf();
            async move {
                let _permit = pool.acquire().await;

                let dst = match MirrorPath::safe_join(&patch_dir, &rel) {
                    Ok(p) => p,
                    Err(e) => {
                        warn!(path = %rel, error = %e, "rejecting unsafe path from upstream manifest");
                        return;
                    }
                };
                let src = match urlutil::join(&patch_url, &with_cache_buster(&rel)) {
                    Ok(u) => u,
                    Err(e) => {
                        warn!(path = %rel, error = %e, "could not build download URL");
                        return;
                    }
                };
                if let Err(e) =
                    mirror_transport::download(&client, &src, &dst, limiter.as_ref(), max_retries).await
                {
                    warn!(path = %rel, error = %e, "download failed after retry budget; next UPDATE run will converge it");
                }
            }
        });
        join_all(tasks).await;
    }
}
