//! The sync engine: the ADD and UPDATE state machines, the manifest
//! client seam, and crash recovery (spec §4.4, §4.5, §4.7).

mod engine;
mod error;
mod manifest;
mod ports;
mod recovery;
mod selection;
mod update;
pub mod urlutil;

pub use engine::{AddOutcome, SyncEngine, DEFAULT_MAX_RETRIES, DEFAULT_RATE_KIB_PER_S};
pub use error::EngineError;
pub use manifest::{HttpManifestClient, ManifestClient};
pub use ports::{NullPublisher, PublishPort, PublishRequest};
pub use recovery::RecoveryOutcome;
pub use selection::{parse_selection, resolve_indices, Selection};
pub use update::{UpdateOutcome, UpdateWorkItem};
