//! `format_url`/`urljoin`/"last path segment" helpers (spec §4.1, §4.2,
//! §4.4), implemented on top of `reqwest::Url` rather than hand-rolled
//! string surgery.

use reqwest::Url;

use crate::error::EngineError;

/// `format_url`: ensure a URL ends with `/` so it can be used as a join
/// base.
pub fn ensure_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}

/// Join `rel` onto `base`, treating `base` as a directory even when it
/// doesn't already end in `/`.
pub fn join(base: &str, rel: &str) -> Result<String, EngineError> {
    let base_url = Url::parse(&ensure_trailing_slash(base))
        .map_err(|e| EngineError::InvalidUrl(base.to_string(), e.to_string()))?;
    let joined = base_url
        .join(rel)
        .map_err(|e| EngineError::InvalidUrl(rel.to_string(), e.to_string()))?;
    Ok(joined.to_string())
}

/// `get_last_path_segment`: the final non-empty path component of a URL,
/// used to recover a patch id from a patch URL.
pub fn last_path_segment(url: &str) -> Result<String, EngineError> {
    let parsed =
        Url::parse(url).map_err(|e| EngineError::InvalidUrl(url.to_string(), e.to_string()))?;
    Ok(parsed
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())
        .unwrap_or_default()
        .to_string())
}

/// One level up from a (slash-terminated) URL, e.g. `a/b/` -> `a/`.
pub fn parent(url: &str) -> Result<String, EngineError> {
    join(url, "..")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_treats_base_as_directory() {
        assert_eq!(
            join("https://origin/repo1", "p1/").unwrap(),
            "https://origin/repo1/p1/"
        );
    }

    #[test]
    fn last_segment_strips_trailing_slash() {
        assert_eq!(
            last_path_segment("https://origin/repo1/p1/").unwrap(),
            "p1"
        );
    }

    #[test]
    fn parent_goes_up_one_level() {
        assert_eq!(
            parent("https://origin/repo1/p1/").unwrap(),
            "https://origin/repo1/"
        );
    }
}
