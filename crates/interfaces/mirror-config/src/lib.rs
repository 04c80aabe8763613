//! `config.json` loading and the `mirror.json` directory cache (spec §6).
//!
//! Both are plain JSON files read relative to a "script directory" (the
//! CLI binary's working directory in this port), matching the shape the
//! original `add_patch.py`/`mirror_repo.py` scripts used.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing configuration file at {0}")]
    Missing(Utf8PathBuf),
    #[error("config file at {path} is not valid JSON: {source}")]
    InvalidJson {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("config key `{0}` is empty")]
    EmptyKey(&'static str),
    #[error("io error at {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// `config.json`: required keys `site_url`, `mirror_dir`, `thpatch` (spec
/// §6). `site_url` must be slash-terminated; `thpatch` is the local folder
/// name the upstream `thpatch` repo is remapped to (spec §4.4).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub site_url: String,
    pub mirror_dir: String,
    pub thpatch: String,
}

impl Config {
    pub fn load(dir: &Utf8Path) -> Result<Self, ConfigError> {
        let path = dir.join("config.json");
        let bytes = std::fs::read(path.as_std_path()).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::Missing(path.clone())
            } else {
                ConfigError::Io {
                    path: path.clone(),
                    source: e,
                }
            }
        })?;
        let config: Config = serde_json::from_slice(&bytes).map_err(|e| ConfigError::InvalidJson {
            path: path.clone(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.site_url.is_empty() {
            return Err(ConfigError::EmptyKey("site_url"));
        }
        if self.mirror_dir.is_empty() {
            return Err(ConfigError::EmptyKey("mirror_dir"));
        }
        if self.thpatch.is_empty() {
            return Err(ConfigError::EmptyKey("thpatch"));
        }
        Ok(())
    }

    /// `<site_url>/<local_repo_id>/`, both slash-terminated (spec §4.6).
    pub fn mirror_repo_url(&self, local_repo_id: &str) -> String {
        format!("{}{local_repo_id}/", ensure_trailing_slash(&self.site_url))
    }
}

pub fn ensure_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}

/// `mirror.json`: caches `{mirror_dir}` so a scheduled `update` run doesn't
/// have to re-validate `config.json` every time (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct MirrorCache {
    pub mirror_dir: Option<String>,
}

impl MirrorCache {
    /// Resolve the mirror directory for a non-interactive `update` run,
    /// following the original `load_custom_dir` precedence: a cached
    /// `mirror.json` wins, then `config.json`'s `mirror_dir`, then the
    /// CLI-supplied `--mirror` path (cached for next time either way).
    pub fn resolve(script_dir: &Utf8Path, cli_arg: &str) -> Result<Utf8PathBuf, ConfigError> {
        let cache_path = script_dir.join("mirror.json");

        if let Ok(bytes) = std::fs::read(cache_path.as_std_path()) {
            let mut cache: MirrorCache =
                serde_json::from_slice(&bytes).map_err(|e| ConfigError::InvalidJson {
                    path: cache_path.clone(),
                    source: e,
                })?;
            if let Some(dir) = cache.mirror_dir.filter(|d| !d.is_empty()) {
                return Ok(Utf8PathBuf::from(dir));
            }
            cache.mirror_dir = Some(script_dir.to_string());
            write_cache(&cache_path, &cache)?;
            return Ok(script_dir.to_path_buf());
        }

        if let Ok(config) = Config::load(script_dir) {
            let cache = MirrorCache {
                mirror_dir: Some(config.mirror_dir.clone()),
            };
            write_cache(&cache_path, &cache)?;
            return Ok(Utf8PathBuf::from(config.mirror_dir));
        }

        let resolved = Utf8PathBuf::from(cli_arg);
        let cache = MirrorCache {
            mirror_dir: Some(resolved.to_string()),
        };
        write_cache(&cache_path, &cache)?;
        Ok(resolved)
    }
}

fn write_cache(path: &Utf8Path, cache: &MirrorCache) -> Result<(), ConfigError> {
    let bytes = serde_json::to_vec_pretty(cache).expect("MirrorCache always serializes");
    std::fs::write(path.as_std_path(), bytes).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Utf8Path, name: &str, contents: &str) {
        std::fs::write(dir.join(name).as_std_path(), contents).unwrap();
    }

    #[test]
    fn loads_valid_config() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        write(
            &root,
            "config.json",
            r#"{"site_url":"https://mirror/","mirror_dir":"/data/mirror","thpatch":"thpatch"}"#,
        );
        let config = Config::load(&root).unwrap();
        assert_eq!(config.site_url, "https://mirror/");
        assert_eq!(config.mirror_repo_url("R"), "https://mirror/R/");
    }

    #[test]
    fn missing_config_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        assert!(matches!(Config::load(&root), Err(ConfigError::Missing(_))));
    }

    #[test]
    fn rejects_empty_required_key() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        write(
            &root,
            "config.json",
            r#"{"site_url":"","mirror_dir":"/data","thpatch":"thpatch"}"#,
        );
        assert!(matches!(Config::load(&root), Err(ConfigError::EmptyKey("site_url"))));
    }

    #[test]
    fn mirror_cache_falls_back_to_config_then_caches() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        write(
            &root,
            "config.json",
            r#"{"site_url":"https://mirror/","mirror_dir":"/data/mirror","thpatch":"thpatch"}"#,
        );
        let resolved = MirrorCache::resolve(&root, ".").unwrap();
        assert_eq!(resolved, Utf8PathBuf::from("/data/mirror"));
        assert!(root.join("mirror.json").as_std_path().exists());
    }

    #[test]
    fn mirror_cache_uses_cli_arg_when_nothing_else_present() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let resolved = MirrorCache::resolve(&root, "/explicit/path").unwrap();
        assert_eq!(resolved, Utf8PathBuf::from("/explicit/path"));
    }
}
