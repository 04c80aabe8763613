//! `.version/<repo_id>.json` (spec §4.3, data model §3 Version record).

use camino::{Utf8Path, Utf8PathBuf};
use mirror_core::VersionRecord;

use crate::atomic::{read_json, remove_if_empty_dir, write_json_atomic};
use crate::error::StoreError;

pub struct VersionStore {
    root: Utf8PathBuf,
}

impl VersionStore {
    /// `root` is the mirror directory; version records live under
    /// `root/.version/`.
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn dir(&self) -> Utf8PathBuf {
        self.root.join(".version")
    }

    fn path_for(&self, repo_id: &str) -> Utf8PathBuf {
        self.dir().join(format!("{repo_id}.json"))
    }

    pub async fn load(&self, repo_id: &str) -> Result<Option<VersionRecord>, StoreError> {
        read_json(&self.path_for(repo_id)).await
    }

    /// Upsert a single patch's hash, preserving `origin` and every other
    /// patch entry already on record. Creates the record (with `origin`)
    /// when this is the repo's first recorded patch. A structurally
    /// invalid existing file is not fatal: the record is rewritten from
    /// scratch with the supplied `origin` (spec §4.3).
    pub async fn upsert(
        &self,
        repo_id: &str,
        origin: &str,
        patch_id: &str,
        files_hash: &str,
    ) -> Result<(), StoreError> {
        let mut record = match self.load(repo_id).await {
            Ok(record) => record.unwrap_or_else(|| VersionRecord::new(origin)),
            Err(StoreError::Corrupt { .. }) => VersionRecord::new(origin),
            Err(e) => return Err(e),
        };
        record
            .patches
            .insert(patch_id.to_string(), files_hash.to_string());
        write_json_atomic(&self.path_for(repo_id), &record).await
    }

    /// Invariant V2: drop a patch's entry; delete the file once the repo
    /// has no patches left, and collapse `.version/` once it's empty too.
    pub async fn remove(&self, repo_id: &str, patch_id: &str) -> Result<(), StoreError> {
        let Some(mut record) = self.load(repo_id).await? else {
            return Ok(());
        };
        record.patches.remove(patch_id);

        let path = self.path_for(repo_id);
        if record.is_empty() {
            match tokio::fs::remove_file(path.as_std_path()).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(StoreError::Io {
                        path: path.to_string(),
                        source: e,
                    })
                }
            }
            remove_if_empty_dir(&self.dir()).await?;
        } else {
            write_json_atomic(&path, &record).await?;
        }
        Ok(())
    }

    pub fn dir_path(&self) -> &Utf8Path {
        self.root.as_path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let store = VersionStore::new(root);

        store.upsert("repo1", "https://origin/repo1/", "patchA", "abc123").await.unwrap();
        let record = store.load("repo1").await.unwrap().unwrap();
        assert_eq!(record.origin, "https://origin/repo1/");
        assert_eq!(record.patches.get("patchA"), Some(&"abc123".to_string()));
    }

    #[tokio::test]
    async fn upsert_rewrites_structurally_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let store = VersionStore::new(root);

        tokio::fs::create_dir_all(store.dir().as_std_path()).await.unwrap();
        tokio::fs::write(store.path_for("repo1").as_std_path(), b"not json")
            .await
            .unwrap();

        store.upsert("repo1", "https://origin/repo1/", "a", "hash-a").await.unwrap();
        let record = store.load("repo1").await.unwrap().unwrap();
        assert_eq!(record.origin, "https://origin/repo1/");
        assert_eq!(record.patches.len(), 1);
    }

    #[tokio::test]
    async fn upsert_preserves_other_patches() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let store = VersionStore::new(root);

        store.upsert("repo1", "origin", "a", "hash-a").await.unwrap();
        store.upsert("repo1", "origin", "b", "hash-b").await.unwrap();
        let record = store.load("repo1").await.unwrap().unwrap();
        assert_eq!(record.patches.len(), 2);
    }

    #[tokio::test]
    async fn remove_last_patch_deletes_file_and_dir() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let store = VersionStore::new(root);

        store.upsert("repo1", "origin", "only", "hash").await.unwrap();
        store.remove("repo1", "only").await.unwrap();

        assert_eq!(store.load("repo1").await.unwrap(), None);
        assert!(!store.dir().as_std_path().exists());
    }

    #[tokio::test]
    async fn remove_keeps_file_when_patches_remain() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let store = VersionStore::new(root);

        store.upsert("repo1", "origin", "a", "hash-a").await.unwrap();
        store.upsert("repo1", "origin", "b", "hash-b").await.unwrap();
        store.remove("repo1", "a").await.unwrap();

        let record = store.load("repo1").await.unwrap().unwrap();
        assert_eq!(record.patches.len(), 1);
        assert!(record.patches.contains_key("b"));
    }
}
