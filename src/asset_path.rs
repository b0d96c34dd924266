//! Structured parsing of output-relative asset paths.
//!
//! Every path the manifest stores is relative to the output tree root, UTF-8,
//! and `/`-separated regardless of platform. [`AssetPath`] splits such a path
//! into directory, stem and extension so a revisioned name can be rebuilt
//! without pattern matching on the whole string.

use std::path::{Component, Path};

use crate::error::{Result, RevError};

/// Extensions that are kept together with the extension before them, so
/// `app.js.map` revisions to `app-<fp>.js.map` rather than `app.js-<fp>.map`.
pub const COMPOUND_EXTENSIONS: &[&str] = &["map", "gz", "br"];

/// A relative asset path split into its components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetPath<'a> {
    dir: &'a str,
    stem: &'a str,
    ext: &'a str,
}

impl<'a> AssetPath<'a> {
    /// Splits `rel` into directory, stem and extension.
    ///
    /// The extension keeps its leading dot and is empty when the file name has
    /// none. A leading dot (as in `.htaccess`) belongs to the stem.
    pub fn parse(rel: &'a str) -> Self {
        let (dir, name) = match rel.rfind('/') {
            Some(idx) => (&rel[..idx], &rel[idx + 1..]),
            None => ("", rel),
        };

        let offset = usize::from(name.starts_with('.'));
        let Some(dot) = name[offset..].rfind('.').map(|p| p + offset) else {
            return Self {
                dir,
                stem: name,
                ext: "",
            };
        };

        let mut split = dot;
        if COMPOUND_EXTENSIONS.contains(&&name[dot + 1..])
            && let Some(inner) = name[offset..dot].rfind('.').map(|p| p + offset)
        {
            split = inner;
        }

        Self {
            dir,
            stem: &name[..split],
            ext: &name[split..],
        }
    }

    /// Directory part without a trailing slash (empty at the tree root).
    pub fn dir(&self) -> &'a str {
        self.dir
    }

    pub fn stem(&self) -> &'a str {
        self.stem
    }

    /// Extension including its leading dot, possibly compound (`.js.map`).
    pub fn ext(&self) -> &'a str {
        self.ext
    }

    /// Builds `<dir>/<stem>-<fingerprint><ext>`.
    pub fn revisioned(&self, fingerprint: &str) -> String {
        let name = format!("{}-{}{}", self.stem, fingerprint, self.ext);
        if self.dir.is_empty() {
            name
        } else {
            format!("{}/{}", self.dir, name)
        }
    }
}

/// Returns the last `/`-separated segment of `rel`.
pub fn file_name(rel: &str) -> &str {
    rel.rsplit('/').next().unwrap_or(rel)
}

/// Returns the directory part of `rel` (empty at the tree root).
pub fn parent_dir(rel: &str) -> &str {
    rel.rfind('/').map(|idx| &rel[..idx]).unwrap_or("")
}

/// Converts an on-disk path below `root` into a `/`-separated relative path.
///
/// # Errors
///
/// Returns [`RevError::InvalidUtf8Path`] when a component is not UTF-8 and
/// [`RevError::InvalidFileType`] when `path` is not below `root`.
pub fn relative_to(root: &Path, path: &Path) -> Result<String> {
    let stripped = path
        .strip_prefix(root)
        .map_err(|_| RevError::InvalidFileType {
            path: path.to_path_buf(),
            message: format!("not inside the output tree '{}'", root.display()),
        })?;

    let mut parts = Vec::new();
    for component in stripped.components() {
        if let Component::Normal(part) = component {
            let part = part.to_str().ok_or_else(|| RevError::InvalidUtf8Path {
                path: path.to_path_buf(),
            })?;
            parts.push(part);
        }
    }
    Ok(parts.join("/"))
}

/// Resolves `reference` against `base_dir`, collapsing `.` and `..` segments.
///
/// Both arguments are `/`-separated and relative to the tree root. Returns
/// `None` if the result would escape the root or is empty.
pub fn resolve(base_dir: &str, reference: &str) -> Option<String> {
    let mut stack: Vec<&str> = Vec::new();
    let segments = base_dir
        .split('/')
        .chain(reference.split('/'))
        .filter(|s| !s.is_empty());

    for segment in segments {
        match segment {
            "." => {}
            ".." => {
                stack.pop()?;
            }
            other => stack.push(other),
        }
    }

    if stack.is_empty() {
        None
    } else {
        Some(stack.join("/"))
    }
}

/// Returns `true` if `rel` is a plain relative path that stays inside the tree.
///
/// Manifest entries that fail this check are never used to touch the disk.
pub fn is_contained(rel: &str) -> bool {
    !rel.is_empty()
        && !rel.starts_with('/')
        && !rel.contains('\\')
        && !Path::new(rel).has_root()
        && rel
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..")
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_parse_simple() {
        let path = AssetPath::parse("app/main.css");
        assert_eq!(path.dir(), "app");
        assert_eq!(path.stem(), "main");
        assert_eq!(path.ext(), ".css");
        assert_eq!(path.revisioned("9f8a1c"), "app/main-9f8a1c.css");
    }

    #[test]
    fn test_parse_root_and_no_extension() {
        let path = AssetPath::parse("LICENSE");
        assert_eq!(path.dir(), "");
        assert_eq!(path.stem(), "LICENSE");
        assert_eq!(path.ext(), "");
        assert_eq!(path.revisioned("abc123"), "LICENSE-abc123");
    }

    #[test]
    fn test_parse_dotfile() {
        let path = AssetPath::parse("conf/.htaccess");
        assert_eq!(path.stem(), ".htaccess");
        assert_eq!(path.ext(), "");

        let path = AssetPath::parse(".well-known.json");
        assert_eq!(path.stem(), ".well-known");
        assert_eq!(path.ext(), ".json");
    }

    #[test]
    fn test_parse_multiple_dots() {
        let path = AssetPath::parse("vendor/jquery.min.js");
        assert_eq!(path.stem(), "jquery.min");
        assert_eq!(path.ext(), ".js");
        assert_eq!(path.revisioned("00ff00ff"), "vendor/jquery.min-00ff00ff.js");
    }

    #[test]
    fn test_parse_compound_extensions() {
        let map = AssetPath::parse("assets/app.js.map");
        assert_eq!(map.stem(), "app");
        assert_eq!(map.ext(), ".js.map");
        assert_eq!(map.revisioned("b2e701"), "assets/app-b2e701.js.map");

        let gz = AssetPath::parse("data.json.gz");
        assert_eq!(gz.ext(), ".json.gz");

        // A bare compound extension has nothing to pair with.
        let lone = AssetPath::parse("trace.map");
        assert_eq!(lone.stem(), "trace");
        assert_eq!(lone.ext(), ".map");
    }

    #[test]
    fn test_file_name_and_parent() {
        assert_eq!(file_name("a/b/c.css"), "c.css");
        assert_eq!(file_name("c.css"), "c.css");
        assert_eq!(parent_dir("a/b/c.css"), "a/b");
        assert_eq!(parent_dir("c.css"), "");
    }

    #[test]
    fn test_relative_to() {
        let root = PathBuf::from("/site/dist");
        let rel = relative_to(&root, &root.join("app").join("main.css")).unwrap();
        assert_eq!(rel, "app/main.css");

        let outside = relative_to(&root, Path::new("/elsewhere/x.css"));
        assert!(matches!(outside, Err(RevError::InvalidFileType { .. })));
    }

    #[test]
    fn test_resolve() {
        assert_eq!(resolve("", "app/main.css").as_deref(), Some("app/main.css"));
        assert_eq!(resolve("css", "./font.woff2").as_deref(), Some("css/font.woff2"));
        assert_eq!(resolve("css/deep", "../../img/a.png").as_deref(), Some("img/a.png"));
        assert_eq!(resolve("", "../escape.css"), None);
        assert_eq!(resolve("", "."), None);
    }

    #[test]
    fn test_is_contained() {
        assert!(is_contained("app/main-9f8a1c.css"));
        assert!(!is_contained("/etc/passwd"));
        assert!(!is_contained("../outside.css"));
        assert!(!is_contained("a/./b.css"));
        assert!(!is_contained("a//b.css"));
        assert!(!is_contained(""));
    }

    proptest! {
        #[test]
        fn test_revisioned_name_keeps_dir_and_ext(
            dir in prop::option::of("[a-z]{1,8}(/[a-z]{1,8}){0,2}"),
            stem in "[a-z][a-z0-9_-]{0,12}",
            ext in prop::option::of("[a-z]{1,5}"),
            fingerprint in "[0-9a-f]{8,16}",
        ) {
            let name = match &ext {
                Some(ext) => format!("{stem}.{ext}"),
                None => stem.clone(),
            };
            let rel = match &dir {
                Some(dir) => format!("{dir}/{name}"),
                None => name,
            };

            let parsed = AssetPath::parse(&rel);
            let revisioned = parsed.revisioned(&fingerprint);
            let reparsed = AssetPath::parse(&revisioned);

            prop_assert_eq!(reparsed.dir(), parsed.dir());
            prop_assert_eq!(reparsed.ext(), parsed.ext());
            prop_assert_eq!(reparsed.stem(), format!("{}-{}", parsed.stem(), fingerprint));
        }
    }
}
