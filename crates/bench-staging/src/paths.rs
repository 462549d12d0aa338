//! Cache layout and path confinement.
//!
//! Destination paths are derived from the content fingerprint plus the
//! original file name, so same-named files with different content never
//! collide and the cache stays browsable by hand.
//!
//! Every destination is checked with [`confine`] before any transport call.
//! The check is purely lexical because the managed root may live on another
//! host.

use crate::fingerprint::Fingerprint;
use bench_core::{BenchError, BenchResult};
use std::path::{Component, Path, PathBuf};

/// How a fingerprint and file name map to a cache-relative path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheLayout {
    /// `<fingerprint>-<name>` directly under the root
    Flat,
    /// `<fingerprint>/<name>`, one directory per fingerprint
    Keyed,
}

impl CacheLayout {
    /// Cache-relative path for `name` with content `fingerprint`.
    pub fn relative_path(&self, fingerprint: &Fingerprint, name: &str) -> String {
        match self {
            Self::Flat => format!("{}-{}", fingerprint, name),
            Self::Keyed => format!("{}/{}", fingerprint, name),
        }
    }
}

/// A validated destination: relative to the provider root and absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePath {
    /// Path below the provider's internal root
    pub relative: String,
    /// `internal` joined with `relative`, normalised
    pub absolute: PathBuf,
}

/// File name of `local` as it will appear in the cache.
///
/// Fails with [`BenchError::PathViolation`] when the path has no usable final
/// component (`..`, `.`, `/`).
pub fn staged_name(local: &Path) -> BenchResult<String> {
    match local.components().next_back() {
        Some(Component::Normal(name)) => Ok(name.to_string_lossy().into_owned()),
        _ => Err(BenchError::PathViolation {
            root: PathBuf::new(),
            path: local.to_path_buf(),
        }),
    }
}

/// Lexically normalise `path`, resolving `.` and `..` without touching the
/// filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(p) => out.push(p.as_os_str()),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

/// Join `relative` onto `root` and require the result to lie strictly below
/// `root`.
pub fn confine(root: &Path, relative: &str) -> BenchResult<StagePath> {
    if root.as_os_str().is_empty() || !root.is_absolute() {
        return Err(BenchError::Configuration(format!(
            "provider root '{}' must be an absolute path",
            root.display()
        )));
    }

    let root = normalize(root);
    let absolute = normalize(&root.join(relative));
    if absolute == root || !absolute.starts_with(&root) {
        return Err(BenchError::PathViolation {
            root,
            path: PathBuf::from(relative),
        });
    }

    Ok(StagePath {
        relative: relative.to_string(),
        absolute,
    })
}

/// Compose a consumer-facing locator from an external prefix and a
/// cache-relative path.
pub fn compose_external(external: &str, relative: &str) -> String {
    if external.is_empty() {
        return relative.to_string();
    }
    format!("{}/{}", external.trim_end_matches('/'), relative)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::fingerprint_reader;

    #[test]
    fn test_layouts() {
        let fp = fingerprint_reader(&b"ABC"[..]).unwrap();
        assert_eq!(
            CacheLayout::Flat.relative_path(&fp, "image.bin"),
            format!("{}-image.bin", fp)
        );
        assert_eq!(
            CacheLayout::Keyed.relative_path(&fp, "image.bin"),
            format!("{}/image.bin", fp)
        );
    }

    #[test]
    fn test_staged_name_uses_final_component() {
        assert_eq!(staged_name(Path::new("/tmp/image.bin")).unwrap(), "image.bin");
        assert_eq!(
            staged_name(Path::new("../../images/zImage")).unwrap(),
            "zImage"
        );
        assert!(matches!(
            staged_name(Path::new("/tmp/images/..")),
            Err(BenchError::PathViolation { .. })
        ));
        assert!(staged_name(Path::new("/")).is_err());
    }

    #[test]
    fn test_confine_accepts_subpaths() {
        let dest = confine(Path::new("/srv/cache"), "abc-image.bin").unwrap();
        assert_eq!(dest.absolute, PathBuf::from("/srv/cache/abc-image.bin"));

        let dest = confine(Path::new("/srv/cache/"), "abc/./image.bin").unwrap();
        assert_eq!(dest.absolute, PathBuf::from("/srv/cache/abc/image.bin"));
    }

    #[test]
    fn test_confine_rejects_traversal() {
        for rel in ["../etc/passwd", "abc/../../etc", "..", "", ".", "/etc/passwd"] {
            let result = confine(Path::new("/srv/cache"), rel);
            assert!(
                matches!(result, Err(BenchError::PathViolation { .. })),
                "{rel:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_confine_rejects_sibling_prefix() {
        // "/srv/cache2" shares a string prefix with "/srv/cache" but is not below it
        assert!(confine(Path::new("/srv/cache"), "../cache2/x").is_err());
    }

    #[test]
    fn test_confine_requires_absolute_root() {
        assert!(matches!(
            confine(Path::new("srv/cache"), "x"),
            Err(BenchError::Configuration(_))
        ));
        assert!(confine(Path::new(""), "x").is_err());
    }

    #[test]
    fn test_compose_external() {
        assert_eq!(compose_external("http://host/cache", "a-b"), "http://host/cache/a-b");
        assert_eq!(compose_external("http://host/cache/", "a-b"), "http://host/cache/a-b");
        assert_eq!(compose_external("", "a-b"), "a-b");
    }
}
