//! The crate's single atomicity primitive (spec §5): every on-disk write
//! goes through a `.tmp` sibling and an atomic rename, so a crash never
//! leaves a half-written journal, version record, or manifest behind.

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::StoreError;

pub async fn write_atomic(path: &Utf8Path, bytes: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent.as_std_path())
            .await
            .map_err(|e| StoreError::Io {
                path: parent.to_string(),
                source: e,
            })?;
    }

    let tmp_path = Utf8PathBuf::from(format!("{path}.tmp"));
    tokio::fs::write(tmp_path.as_std_path(), bytes)
        .await
        .map_err(|e| StoreError::Io {
            path: tmp_path.to_string(),
            source: e,
        })?;
    tokio::fs::rename(tmp_path.as_std_path(), path.as_std_path())
        .await
        .map_err(|e| StoreError::Io {
            path: path.to_string(),
            source: e,
        })
}

pub async fn write_json_atomic<T: serde::Serialize>(
    path: &Utf8Path,
    value: &T,
) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(value).expect("in-memory types always serialize");
    write_atomic(path, &bytes).await
}

pub async fn read_json<T: serde::de::DeserializeOwned>(
    path: &Utf8Path,
) -> Result<Option<T>, StoreError> {
    match tokio::fs::read(path.as_std_path()).await {
        Ok(bytes) => {
            let value = serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
                path: path.to_string(),
                source: e,
            })?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::Io {
            path: path.to_string(),
            source: e,
        }),
    }
}

/// Removes `path`'s parent directory if it's now empty (invariant V2's
/// "empty `.version/` dir gets removed" and the UPDATE engine's "collapse
/// empty patch directories" rule).
pub async fn remove_if_empty_dir(dir: &Utf8Path) -> Result<(), StoreError> {
    let mut entries = match tokio::fs::read_dir(dir.as_std_path()).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            return Err(StoreError::Io {
                path: dir.to_string(),
                source: e,
            })
        }
    };
    if entries
        .next_entry()
        .await
        .map_err(|e| StoreError::Io {
            path: dir.to_string(),
            source: e,
        })?
        .is_some()
    {
        return Ok(());
    }
    tokio::fs::remove_dir(dir.as_std_path())
        .await
        .map_err(|e| StoreError::Io {
            path: dir.to_string(),
            source: e,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    #[tokio::test]
    async fn round_trips_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("x.json")).unwrap();
        write_json_atomic(&path, &vec!["a", "b"]).await.unwrap();
        let back: Option<Vec<String>> = read_json(&path).await.unwrap();
        assert_eq!(back, Some(vec!["a".to_string(), "b".to_string()]));
        assert!(!std::path::Path::new(&format!("{path}.tmp")).exists());
    }

    #[tokio::test]
    async fn read_json_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("absent.json")).unwrap();
        let value: Option<Vec<String>> = read_json(&path).await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn removes_directory_only_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        let sub = Utf8PathBuf::from_path_buf(dir.path().join("sub")).unwrap();
        tokio::fs::create_dir(sub.as_std_path()).await.unwrap();
        let file = sub.join("keep.txt");
        tokio::fs::write(file.as_std_path(), b"x").await.unwrap();

        remove_if_empty_dir(&sub).await.unwrap();
        assert!(sub.as_std_path().exists());

        tokio::fs::remove_file(file.as_std_path()).await.unwrap();
        remove_if_empty_dir(&sub).await.unwrap();
        assert!(!sub.as_std_path().exists());
    }
}
