//! Cross-linking (spec §4.6 step 3, property P8): after a non-primary repo
//! publishes, the primary repo's `repo.js` gets its `neighbors` field
//! updated to mention it, exactly once no matter how many times this runs.

use camino::Utf8Path;
use serde_json::{Map, Value};

use crate::error::PublishError;

const REQUIRED_KEYS: [&str; 5] = ["contact", "id", "patches", "servers", "title"];

/// Load `<mirror>/<primary_local_id>/repo.js`, validate it, ensure
/// `mirror_repo_url` is present in `neighbors` exactly once, and rewrite it.
///
/// Per spec §7 ("Missing required key in primary `repo.js`" -> "Publisher:
/// skip cross-linking, warn; do not fail"), a validation failure here is
/// reported to the caller as an error so it can warn and move on — it must
/// never abort the whole ADD session.
pub async fn crosslink(
    primary_repo_js: &Utf8Path,
    mirror_repo_url: &str,
) -> Result<(), PublishError> {
    let bytes = tokio::fs::read(primary_repo_js.as_std_path())
        .await
        .map_err(|_| PublishError::PrimaryNotFound(primary_repo_js.to_path_buf()))?;
    let mut doc: Value = serde_json::from_slice(&bytes)?;

    let Value::Object(map) = &mut doc else {
        return Err(PublishError::MissingPrimaryKey(primary_repo_js.to_path_buf(), "id"));
    };
    for key in REQUIRED_KEYS {
        if !map.contains_key(key) {
            return Err(PublishError::MissingPrimaryKey(primary_repo_js.to_path_buf(), key));
        }
    }

    insert_neighbor(map, mirror_repo_url);

    let rendered = serde_json::to_vec_pretty(&doc).expect("validated JSON always serializes");
    mirror_store::write_atomic(primary_repo_js, &rendered).await?;
    Ok(())
}

/// Insert `neighbors` right after `id` if absent (ordering is cosmetic,
/// append-at-end is also spec-legal); otherwise append `url` to the
/// existing array only if it isn't already there.
fn insert_neighbor(map: &mut Map<String, Value>, url: &str) {
    if let Some(Value::Array(neighbors)) = map.get_mut("neighbors") {
        if !neighbors.iter().any(|v| v.as_str() == Some(url)) {
            neighbors.push(Value::String(url.to_string()));
        }
        return;
    }

    let mut rebuilt = Map::new();
    for (key, value) in map.iter() {
        rebuilt.insert(key.clone(), value.clone());
        if key == "id" {
            rebuilt.insert("neighbors".to_string(), Value::Array(vec![Value::String(url.to_string())]));
        }
    }
    if !rebuilt.contains_key("neighbors") {
        rebuilt.insert("neighbors".to_string(), Value::Array(vec![Value::String(url.to_string())]));
    }
    *map = rebuilt;
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    async fn write(path: &Utf8Path, body: &str) {
        tokio::fs::create_dir_all(path.parent().unwrap().as_std_path()).await.unwrap();
        tokio::fs::write(path.as_std_path(), body).await.unwrap();
    }

    #[tokio::test]
    async fn inserts_neighbors_after_id_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("repo.js")).unwrap();
        write(
            &path,
            r#"{"id":"thpatch","title":"t","contact":"c","servers":["https://x/"],"patches":{}}"#,
        )
        .await;

        crosslink(&path, "https://mirror/r/").await.unwrap();

        let doc: Value = serde_json::from_slice(&tokio::fs::read(path.as_std_path()).await.unwrap()).unwrap();
        let keys: Vec<&String> = doc.as_object().unwrap().keys().collect();
        let id_pos = keys.iter().position(|k| *k == "id").unwrap();
        let neighbors_pos = keys.iter().position(|k| *k == "neighbors").unwrap();
        assert_eq!(neighbors_pos, id_pos + 1);
        assert_eq!(doc["neighbors"], serde_json::json!(["https://mirror/r/"]));
    }

    #[tokio::test]
    async fn repeated_crosslink_adds_url_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("repo.js")).unwrap();
        write(
            &path,
            r#"{"id":"thpatch","title":"t","contact":"c","servers":["https://x/"],"patches":{},"neighbors":["https://mirror/r/"]}"#,
        )
        .await;

        crosslink(&path, "https://mirror/r/").await.unwrap();

        let doc: Value = serde_json::from_slice(&tokio::fs::read(path.as_std_path()).await.unwrap()).unwrap();
        assert_eq!(doc["neighbors"], serde_json::json!(["https://mirror/r/"]));
    }

    #[tokio::test]
    async fn missing_required_key_is_reported_not_panicked() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("repo.js")).unwrap();
        write(&path, r#"{"id":"thpatch"}"#).await;

        let err = crosslink(&path, "https://mirror/r/").await.unwrap_err();
        assert!(matches!(err, PublishError::MissingPrimaryKey(_, _)));
    }
}
