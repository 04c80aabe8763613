//! The `repo_build` seam (spec §1: "the core invokes it as an opaque
//! step; its internals are a separate specification").
//!
//! The default implementation regenerates every patch's `files.js` by
//! hashing the on-disk tree with `crc32fast` and leaves `repo.js`'s
//! `patches` map untouched — enough to keep the crate runnable end to
//! end, not a reimplementation of the upstream `repo_update.py` tool.

use std::collections::BTreeMap;

use async_trait::async_trait;
use camino::Utf8Path;
use mirror_core::RawFilesManifest;
use mirror_store::write_json_atomic;
use mirror_transport::crc32_file;

use crate::error::PublishError;

#[async_trait]
pub trait RepoBuilder: Send + Sync {
    async fn repo_build(&self, src: &Utf8Path, dst: &Utf8Path) -> Result<(), PublishError>;
}

/// Regenerates `<dst>/<patch>/files.js` for every patch directory directly
/// under `src` by CRC32-hashing its files.
pub struct HashingRepoBuilder;

#[async_trait]
impl RepoBuilder for HashingRepoBuilder {
    async fn repo_build(&self, src: &Utf8Path, dst: &Utf8Path) -> Result<(), PublishError> {
        let mut entries = match tokio::fs::read_dir(src.as_std_path()).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(mirror_store::StoreError::Io {
                    path: src.to_string(),
                    source: e,
                }
                .into())
            }
        };

        while let Some(entry) = entries.next_entry().await.map_err(|e| mirror_store::StoreError::Io {
            path: src.to_string(),
            source: e,
        })? {
            let file_type = entry.file_type().await.map_err(|e| mirror_store::StoreError::Io {
                path: src.to_string(),
                source: e,
            })?;
            if !file_type.is_dir() {
                continue;
            }
            let patch_name = entry.file_name();
            let Some(patch_name) = patch_name.to_str() else { continue };
            if patch_name.starts_with('.') {
                continue;
            }
            let patch_src = src.join(patch_name);
            let patch_dst = dst.join(patch_name);
            let manifest = hash_patch_tree(&patch_src).await?;
            write_json_atomic(&patch_dst.join("files.js"), &manifest).await?;
        }
        Ok(())
    }
}

async fn hash_patch_tree(patch_dir: &Utf8Path) -> Result<RawFilesManifest, PublishError> {
    let mut manifest: RawFilesManifest = BTreeMap::new();
    let mut stack = vec![patch_dir.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let mut entries = match tokio::fs::read_dir(dir.as_std_path()).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => {
                return Err(mirror_store::StoreError::Io {
                    path: dir.to_string(),
                    source: e,
                }
                .into())
            }
        };
        while let Some(entry) = entries.next_entry().await.map_err(|e| mirror_store::StoreError::Io {
            path: dir.to_string(),
            source: e,
        })? {
            let file_type = entry.file_type().await.map_err(|e| mirror_store::StoreError::Io {
                path: dir.to_string(),
                source: e,
            })?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let full = dir.join(&name);
            if file_type.is_dir() {
                stack.push(full);
                continue;
            }
            if name == "files.js" {
                continue;
            }
            let rel = full
                .strip_prefix(patch_dir)
                .unwrap_or(full.as_path())
                .to_string();
            let crc = crc32_file(&full).await?;
            manifest.insert(rel, Some(crc));
        }
    }
    Ok(manifest)
}
