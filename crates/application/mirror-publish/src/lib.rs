//! The Publisher (spec §4.6): invalidates the stale local manifest,
//! invokes `repo_build`, and cross-links mirrored repos.

mod crosslink;
mod error;
mod repo_build;

use async_trait::async_trait;
use camino::Utf8Path;
use mirror_store::write_json_atomic;
use mirror_sync::{EngineError, PublishPort, PublishRequest};
use tracing::warn;

pub use error::PublishError;
pub use repo_build::{HashingRepoBuilder, RepoBuilder};

/// The upstream id that gets remapped to a locally-configured folder name
/// and treated as the cross-link hub (spec §4.4, §4.6, GLOSSARY).
pub const PRIMARY_UPSTREAM_ID: &str = "thpatch";

pub struct Publisher {
    repo_builder: Box<dyn RepoBuilder>,
}

impl Publisher {
    pub fn new(repo_builder: Box<dyn RepoBuilder>) -> Self {
        Self { repo_builder }
    }

    pub fn with_default_builder() -> Self {
        Self::new(Box::new(HashingRepoBuilder))
    }

    async fn publish(&self, req: &PublishRequest) -> Result<(), PublishError> {
        let repo_dir = req.mirror_dir.join(&req.local_repo_id);

        if req.upstream_repo.id == PRIMARY_UPSTREAM_ID {
            // Step 1: the primary republishes its upstream descriptor
            // verbatim under the remapped local id, no field rewrite.
            self.repo_builder.repo_build(&repo_dir, &repo_dir).await?;
        } else {
            // Step 2: every other repo gets its `servers` field replaced
            // with the single mirror URL before publication.
            let mut repo_js = req.upstream_repo.clone();
            repo_js.servers = vec![req.mirror_repo_url.clone()];
            write_json_atomic(&repo_dir.join("repo.js"), &repo_js).await?;
            self.repo_builder.repo_build(&repo_dir, &repo_dir).await?;
        }

        if req.local_repo_id != req.primary_local_id {
            let primary_repo_js = req.mirror_dir.join(&req.primary_local_id).join("repo.js");
            if let Err(e) = crosslink::crosslink(&primary_repo_js, &req.mirror_repo_url).await {
                warn!(error = %e, "cross-linking failed, leaving neighbors untouched");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl PublishPort for Publisher {
    async fn publish_after_add(&self, req: &PublishRequest) -> Result<(), EngineError> {
        self.publish(req).await.map_err(|e| EngineError::Publish(e.to_string()))
    }

    async fn rebuild_only(&self, local_repo_id: &str, mirror_dir: &Utf8Path) -> Result<(), EngineError> {
        let repo_dir = mirror_dir.join(local_repo_id);
        self.repo_builder
            .repo_build(&repo_dir, &repo_dir)
            .await
            .map_err(|e| EngineError::Publish(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use mirror_core::RepoDescriptor;
    use std::collections::BTreeMap;

    fn descriptor(id: &str) -> RepoDescriptor {
        RepoDescriptor {
            id: id.to_string(),
            title: "t".into(),
            contact: "c".into(),
            servers: vec!["https://upstream/".into()],
            patches: BTreeMap::from([("p1".to_string(), "desc".to_string())]),
            neighbors: None,
        }
    }

    #[tokio::test]
    async fn primary_publish_skips_repo_js_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let mirror_dir = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        tokio::fs::create_dir_all(mirror_dir.join("thpatch").join("p1").as_std_path())
            .await
            .unwrap();

        let publisher = Publisher::with_default_builder();
        let req = PublishRequest {
            local_repo_id: "thpatch".into(),
            mirror_dir: mirror_dir.clone(),
            upstream_repo: descriptor("thpatch"),
            mirror_repo_url: "https://mirror/thpatch/".into(),
            primary_local_id: "thpatch".into(),
        };
        publisher.publish_after_add(&req).await.unwrap();

        assert!(!mirror_dir.join("thpatch").join("repo.js").as_std_path().exists());
    }

    #[tokio::test]
    async fn ordinary_publish_rewrites_servers_and_builds() {
        let dir = tempfile::tempdir().unwrap();
        let mirror_dir = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        tokio::fs::create_dir_all(mirror_dir.join("thpatch").as_std_path()).await.unwrap();
        tokio::fs::write(
            mirror_dir.join("thpatch").join("repo.js").as_std_path(),
            r#"{"id":"thpatch","title":"t","contact":"c","servers":["https://x/"],"patches":{}}"#,
        )
        .await
        .unwrap();
        tokio::fs::create_dir_all(mirror_dir.join("r1").join("p1").as_std_path()).await.unwrap();
        tokio::fs::write(mirror_dir.join("r1").join("p1").join("a.dat").as_std_path(), b"x")
            .await
            .unwrap();

        let publisher = Publisher::with_default_builder();
        let req = PublishRequest {
            local_repo_id: "r1".into(),
            mirror_dir: mirror_dir.clone(),
            upstream_repo: descriptor("r1"),
            mirror_repo_url: "https://mirror/r1/".into(),
            primary_local_id: "thpatch".into(),
        };
        publisher.publish_after_add(&req).await.unwrap();

        let repo_js: serde_json::Value = serde_json::from_slice(
            &tokio::fs::read(mirror_dir.join("r1").join("repo.js").as_std_path()).await.unwrap(),
        )
        .unwrap();
        assert_eq!(repo_js["servers"], serde_json::json!(["https://mirror/r1/"]));

        let primary_js: serde_json::Value = serde_json::from_slice(
            &tokio::fs::read(mirror_dir.join("thpatch").join("repo.js").as_std_path()).await.unwrap(),
        )
        .unwrap();
        assert_eq!(primary_js["neighbors"], serde_json::json!(["https://mirror/r1/"]));
    }
}
