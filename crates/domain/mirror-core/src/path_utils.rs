//! Path-safety helpers shared by the sync engine and publisher.
//!
//! Every relative path in this system originates from an upstream
//! `files.js`/`repo.js` payload, so every join against a local mirror root
//! must be checked before it touches the filesystem (spec §4.2, §7 "hostile
//! upstream" note).

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::CoreError;

pub struct MirrorPath;

impl MirrorPath {
    /// Standardize directory separators to forward slashes, matching the
    /// wire format used in `files.js` keys.
    pub fn normalize(path: &str) -> String {
        path.replace('\\', "/")
    }

    /// A relative path is safe when it isn't absolute and contains no
    /// `..` component; anything else could escape the mirror root.
    pub fn verify_safe(rel_path: &str) -> bool {
        let p = Utf8Path::new(rel_path);
        !p.is_absolute()
            && !p
                .components()
                .any(|c| matches!(c, camino::Utf8Component::ParentDir))
    }

    /// Join a relative path onto a root after verifying it's safe.
    pub fn safe_join(root: &Utf8Path, rel_path: &str) -> Result<Utf8PathBuf, CoreError> {
        let normalized = Self::normalize(rel_path);
        if !Self::verify_safe(&normalized) {
            return Err(CoreError::UnsafePath(rel_path.to_string()));
        }
        Ok(root.join(normalized))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_parent_dir_escape() {
        assert!(!MirrorPath::verify_safe("../../etc/passwd"));
    }

    #[test]
    fn rejects_absolute_path() {
        assert!(!MirrorPath::verify_safe("/etc/passwd"));
    }

    #[test]
    fn accepts_ordinary_relative_path() {
        assert!(MirrorPath::verify_safe("addons/core.pbo"));
    }

    #[test]
    fn normalizes_backslashes() {
        assert_eq!(MirrorPath::normalize("a\\b\\c.dat"), "a/b/c.dat");
    }

    #[test]
    fn safe_join_rejects_traversal() {
        let root = Utf8PathBuf::from("/mirror/repo1");
        let err = MirrorPath::safe_join(&root, "../escape.dat").unwrap_err();
        assert!(matches!(err, CoreError::UnsafePath(_)));
    }

    #[test]
    fn safe_join_builds_expected_path() {
        let root = Utf8PathBuf::from("/mirror/repo1");
        let joined = MirrorPath::safe_join(&root, "a/b.dat").unwrap();
        assert_eq!(joined, Utf8PathBuf::from("/mirror/repo1/a/b.dat"));
    }
}
