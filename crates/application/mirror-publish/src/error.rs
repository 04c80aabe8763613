use thiserror::Error;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error(transparent)]
    Store(#[from] mirror_store::StoreError),
    #[error(transparent)]
    Core(#[from] mirror_core::CoreError),
    #[error(transparent)]
    Transport(#[from] mirror_transport::TransportError),
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("primary repo.js at {0} is missing required key `{1}`")]
    MissingPrimaryKey(camino::Utf8PathBuf, &'static str),
    #[error("no repo.js found for primary repo at {0}")]
    PrimaryNotFound(camino::Utf8PathBuf),
}
