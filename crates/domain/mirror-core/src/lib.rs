//! Pure domain types and algorithms: the upstream wire protocol, on-disk
//! journal/version-record shapes, the UPDATE diff, and path safety.
//!
//! Nothing in this crate touches the network or filesystem directly; that's
//! left to `mirror-transport` and `mirror-store`.

pub mod diff;
pub mod error;
pub mod journal;
pub mod path_utils;
pub mod version;
pub mod wire;

pub use diff::compute_update_diff;
pub use error::CoreError;
pub use journal::{AddJournal, UpdateEntry, UpdateEntryMode, UpdateJournal};
pub use path_utils::MirrorPath;
pub use version::VersionRecord;
pub use wire::{resolve_file_map, with_cache_buster, ProbeMode, RawFilesManifest, RepoDescriptor};
