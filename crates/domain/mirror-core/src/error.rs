use thiserror::Error;

/// Validation errors raised while parsing the upstream wire protocol or
/// enforcing local path safety. Kept separate from the transport and sync
/// crates' error types since these are pure data-shape failures.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("repo descriptor is missing required field `id`")]
    MissingRepoId,
    #[error("path `{0}` is unsafe (absolute or contains `..`)")]
    UnsafePath(String),
}
