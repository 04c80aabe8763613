//! The seam between the sync engine and the Publisher (spec §4.6), kept as
//! a trait so `mirror-publish`'s implementation can sit on top of this
//! crate without the engine depending back on it — the same inversion the
//! teacher uses for `ProfilesRepo`/`SettingsRepo`/`LauncherPort` in
//! `fleet-app-core::ports`.

use async_trait::async_trait;
use camino::Utf8PathBuf;
use mirror_core::RepoDescriptor;

use crate::error::EngineError;

/// Everything the Publisher needs to run its full §4.6 procedure after an
/// ADD session converges: the as-fetched upstream descriptor (so it can
/// tell whether this is the `thpatch` primary), the already-remapped local
/// repo id, and where things live.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub local_repo_id: String,
    pub mirror_dir: Utf8PathBuf,
    pub upstream_repo: RepoDescriptor,
    pub mirror_repo_url: String,
    pub primary_local_id: String,
}

#[async_trait]
pub trait PublishPort: Send + Sync {
    /// Full publish after ADD (spec §4.6 steps 1–3): write `repo.js` (or
    /// call `repo_build` directly for the primary), then cross-link if
    /// this isn't the primary repo.
    async fn publish_after_add(&self, req: &PublishRequest) -> Result<(), EngineError>;

    /// Just re-run `repo_build` for a repo whose on-disk tree changed
    /// (spec §4.5's "after all patches of a repo finish, invoke Publisher"
    /// — the original `mirror_repo.py` never rewrites `repo.js` or
    /// cross-links on an UPDATE, only regenerates the served manifests).
    async fn rebuild_only(&self, local_repo_id: &str, mirror_dir: &camino::Utf8Path) -> Result<(), EngineError>;
}

/// A no-op publisher for tests that only exercise the engine's file-level
/// behavior and don't care about the external `repo_build` step.
pub struct NullPublisher;

#[async_trait]
impl PublishPort for NullPublisher {
    async fn publish_after_add(&self, _req: &PublishRequest) -> Result<(), EngineError> {
        Ok(())
    }

    async fn rebuild_only(&self, _local_repo_id: &str, _mirror_dir: &camino::Utf8Path) -> Result<(), EngineError> {
        Ok(())
    }
}
