use thiserror::Error;

/// Errors raised by the sync engine itself (spec §7's per-patch/per-repo/
/// per-session fault classes, minus the purely local faults that already
/// have their own typed errors in `mirror-store`/`mirror-transport`).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Transport(#[from] mirror_transport::TransportError),
    #[error(transparent)]
    Core(#[from] mirror_core::CoreError),
    #[error(transparent)]
    Store(#[from] mirror_store::StoreError),
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid URL `{0}`: {1}")]
    InvalidUrl(String, String),
    #[error("probe of `{0}` found neither a repo nor a patch there (non-2xx on `/`, `repo.js`, and `files.js`)")]
    InvalidProbeUrl(String),
    #[error("publish failed: {0}")]
    Publish(String),
    #[error("no `.version/` directory under {0}; nothing is mirrored yet")]
    NoVersionStore(camino::Utf8PathBuf),
}
