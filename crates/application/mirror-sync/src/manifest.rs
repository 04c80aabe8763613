//! The upstream manifest client (spec §4.2) and the probe that gates entry
//! into the ADD state machine (spec §4.4, opening paragraph).
//!
//! Kept as a trait so the engine can be driven against a fake in tests,
//! the same seam the teacher's `RemoteStateProvider` gives `fleet-pipeline`.

use async_trait::async_trait;
use mirror_core::{with_cache_buster, ProbeMode, RepoDescriptor};
use reqwest::Client;

use crate::error::EngineError;
use crate::urlutil;

#[async_trait]
pub trait ManifestClient: Send + Sync {
    /// `fetch_repo(url, mode)` (spec §4.2). `mode` selects whether `url` is
    /// a repo root (`repo.js` is appended) or a patch URL (`../repo.js`).
    async fn fetch_repo(&self, url: &str, mode: ProbeMode) -> Result<RepoDescriptor, EngineError>;

    /// Raw bytes of `<patch_url>/files.js?=2233`, used both to parse the
    /// file map (`resolve_file_map`) and to hash for the version record
    /// (`fetch_patch_version`) without a second round trip.
    async fn fetch_files_js_bytes(&self, patch_url: &str) -> Result<Vec<u8>, EngineError>;

    /// The probe (spec §4.4): GET `<url>/`, then `<url>/repo.js`, then
    /// `<url>/files.js`; the first 200 selects the mode.
    async fn probe(&self, url: &str) -> Result<ProbeMode, EngineError>;
}

pub struct HttpManifestClient {
    client: Client,
}

impl HttpManifestClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn url_is_reachable(&self, url: &str) -> bool {
        matches!(self.client.get(url).send().await, Ok(resp) if resp.status().is_success())
    }
}

#[async_trait]
impl ManifestClient for HttpManifestClient {
    async fn fetch_repo(&self, url: &str, mode: ProbeMode) -> Result<RepoDescriptor, EngineError> {
        let repo_js_url = match mode {
            ProbeMode::AddRepo => urlutil::join(url, "repo.js")?,
            ProbeMode::AddPatch => urlutil::join(&urlutil::parent(url)?, "repo.js")?,
        };
        let bytes = mirror_transport::get_bytes(&self.client, &repo_js_url).await?;
        Ok(RepoDescriptor::parse(&bytes)?)
    }

    async fn fetch_files_js_bytes(&self, patch_url: &str) -> Result<Vec<u8>, EngineError> {
        let url = urlutil::join(patch_url, &with_cache_buster("files.js"))?;
        Ok(mirror_transport::get_bytes(&self.client, &url).await?.to_vec())
    }

    async fn probe(&self, url: &str) -> Result<ProbeMode, EngineError> {
        let base = urlutil::ensure_trailing_slash(url);
        if !self.url_is_reachable(&base).await {
            return Err(EngineError::InvalidProbeUrl(url.to_string()));
        }
        if self.url_is_reachable(&urlutil::join(&base, "repo.js")?).await {
            return Ok(ProbeMode::AddRepo);
        }
        if self.url_is_reachable(&urlutil::join(&base, "files.js")?).await {
            return Ok(ProbeMode::AddPatch);
        }
        Err(EngineError::InvalidProbeUrl(url.to_string()))
    }
}
