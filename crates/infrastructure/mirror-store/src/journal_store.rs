//! ADD (`__add.json` + `__files.js`) and UPDATE (`__update.json`) journals
//! (spec §3 Data model, §4.7 recovery). Written before destructive or
//! network work begins, deleted only once the corresponding publish step
//! has succeeded.

use camino::Utf8PathBuf;
use mirror_core::{AddJournal, UpdateJournal};

use crate::atomic::{read_json, write_atomic, write_json_atomic};
use crate::error::StoreError;

pub struct JournalStore {
    root: Utf8PathBuf,
}

impl JournalStore {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn add_journal_path(&self) -> Utf8PathBuf {
        self.root.join("__add.json")
    }

    fn add_files_path(&self) -> Utf8PathBuf {
        self.root.join("__files.js")
    }

    fn update_journal_path(&self) -> Utf8PathBuf {
        self.root.join("__update.json")
    }

    pub async fn load_add(&self) -> Result<Option<AddJournal>, StoreError> {
        read_json(&self.add_journal_path()).await
    }

    /// Write the ADD journal and the raw upstream `files.js` bytes it
    /// refers to. Both must land before any download starts.
    pub async fn save_add(
        &self,
        journal: &AddJournal,
        raw_files_js: &[u8],
    ) -> Result<(), StoreError> {
        write_atomic(&self.add_files_path(), raw_files_js).await?;
        write_json_atomic(&self.add_journal_path(), journal).await
    }

    pub async fn clear_add(&self) -> Result<(), StoreError> {
        remove_if_present(&self.add_journal_path()).await?;
        remove_if_present(&self.add_files_path()).await
    }

    pub async fn load_update(&self) -> Result<Option<UpdateJournal>, StoreError> {
        read_json(&self.update_journal_path()).await
    }

    pub async fn save_update(&self, journal: &UpdateJournal) -> Result<(), StoreError> {
        write_json_atomic(&self.update_journal_path(), journal).await
    }

    pub async fn clear_update(&self) -> Result<(), StoreError> {
        remove_if_present(&self.update_journal_path()).await
    }
}

async fn remove_if_present(path: &camino::Utf8Path) -> Result<(), StoreError> {
    match tokio::fs::remove_file(path.as_std_path()).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StoreError::Io {
            path: path.to_string(),
            source: e,
        }),
    }
}
