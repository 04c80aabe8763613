//! File-backed persistence for the version store and the crash-recovery
//! journals. Everything here goes through temp-then-rename (`atomic`); no
//! embedded database, just plain JSON files on disk (spec §3, §5).

mod atomic;
mod error;
mod journal_store;
mod version_store;

pub use atomic::{read_json, remove_if_empty_dir, write_atomic, write_json_atomic};
pub use error::StoreError;
pub use journal_store::JournalStore;
pub use version_store::VersionStore;
