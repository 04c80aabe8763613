//! The upstream discovery protocol: `repo.js` and `files.js`.
//!
//! Both are read-only, bit-exact wire formats (spec §6). `repo.js`
//! describes a repo and its patches; `files.js` maps a patch's relative
//! file paths to an unsigned 32-bit CRC, or `null` when upstream has
//! deleted that file.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// `GET <repo>/repo.js`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepoDescriptor {
    pub id: String,
    pub title: String,
    pub contact: String,
    pub servers: Vec<String>,
    pub patches: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub neighbors: Option<Vec<String>>,
}

impl RepoDescriptor {
    /// Parse a `repo.js` payload, failing fatally (per spec §4.2) when the
    /// bytes aren't JSON or the required `id` field is absent.
    pub fn parse(bytes: &[u8]) -> Result<Self, CoreError> {
        let value: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|e| CoreError::InvalidJson(e.to_string()))?;
        if value.get("id").and_then(|v| v.as_str()).is_none() {
            return Err(CoreError::MissingRepoId);
        }
        serde_json::from_value(value).map_err(|e| CoreError::InvalidJson(e.to_string()))
    }
}

/// Which kind of URL the probe (spec §4.4) classified the input as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeMode {
    AddRepo,
    AddPatch,
}

/// Raw `files.js` payload: relative path -> CRC32 token, `null` meaning
/// "deleted upstream, ignore" (spec §3 Patch).
pub type RawFilesManifest = BTreeMap<String, Option<u32>>;

/// `fetch_patch_files` (spec §4.2): entries with a `null` token are excluded.
pub fn resolve_file_map(raw: &RawFilesManifest) -> BTreeMap<String, u32> {
    raw.iter()
        .filter_map(|(path, token)| token.map(|t| (path.clone(), t)))
        .collect()
}

pub const CACHE_BUSTER: &str = "?=2233";

/// Append the mandatory cache-buster query string (spec §4.1, §6) to a URL
/// whose result must be fresh.
pub fn with_cache_buster(url: &str) -> String {
    format!("{url}{CACHE_BUSTER}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_non_json() {
        let err = RepoDescriptor::parse(b"not json").unwrap_err();
        assert!(matches!(err, CoreError::InvalidJson(_)));
    }

    #[test]
    fn parse_rejects_missing_id() {
        let err = RepoDescriptor::parse(br#"{"title":"x"}"#).unwrap_err();
        assert!(matches!(err, CoreError::MissingRepoId));
    }

    #[test]
    fn parse_accepts_minimal_descriptor() {
        let json = br#"{
            "id": "r1",
            "title": "Repo One",
            "contact": "a@b.c",
            "servers": ["https://mirror/r1/"],
            "patches": {"p1": "desc"}
        }"#;
        let repo = RepoDescriptor::parse(json).unwrap();
        assert_eq!(repo.id, "r1");
        assert_eq!(repo.neighbors, None);
    }

    #[test]
    fn resolve_file_map_drops_null_tokens() {
        let mut raw = RawFilesManifest::new();
        raw.insert("a/b.dat".into(), Some(1));
        raw.insert("c.txt".into(), None);
        let resolved = resolve_file_map(&raw);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved.get("a/b.dat"), Some(&1));
    }

    #[test]
    fn cache_buster_is_appended_verbatim() {
        assert_eq!(with_cache_buster("https://x/files.js"), "https://x/files.js?=2233");
    }
}
