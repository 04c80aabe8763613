//! CRC32 (upstream integrity token) and SHA-256 (version-record content
//! hash) helpers, kept alongside the transport so downloads can verify
//! in-place (spec §4.1, §4.2, §4.3).

use camino::Utf8Path;
use sha2::{Digest, Sha256};

use crate::error::TransportError;

/// Compute the CRC32 of a file already on disk, matching the `crc32fast`
/// incremental API the teacher's rate limiter module already depends on
/// transitively via `governor`.
pub async fn crc32_file(path: &Utf8Path) -> Result<u32, TransportError> {
    let bytes = tokio::fs::read(path.as_std_path())
        .await
        .map_err(|e| TransportError::Io {
            path: path.to_string(),
            source: e,
        })?;
    Ok(crc32fast::hash(&bytes))
}

/// `verify_crc32` (spec §4.7 recovery): true when the file at `path` exists
/// and its CRC32 matches `expected`.
pub async fn verify_crc32(path: &Utf8Path, expected: u32) -> bool {
    matches!(crc32_file(path).await, Ok(actual) if actual == expected)
}

/// `sha256_hex` (spec §3, §4.2 `fetch_patch_version`): hex digest of raw
/// bytes, used to detect whether a patch's upstream `files.js` has changed
/// without diffing its full contents.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_hex_is_stable() {
        let a = sha256_hex(b"hello world");
        let b = sha256_hex(b"hello world");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn sha256_hex_differs_on_change() {
        assert_ne!(sha256_hex(b"a"), sha256_hex(b"b"));
    }

    #[tokio::test]
    async fn verify_crc32_detects_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = camino::Utf8PathBuf::from_path_buf(dir.path().join("f.bin")).unwrap();
        tokio::fs::write(&path, b"payload").await.unwrap();
        let actual = crc32_file(&path).await.unwrap();
        assert!(verify_crc32(&path, actual).await);
        assert!(!verify_crc32(&path, actual.wrapping_add(1)).await);
    }
}
