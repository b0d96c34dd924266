use std::collections::HashSet;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::asset_path::relative_to;
use crate::error::{Result, RevError};

/// Discovers every regular file in the output tree.
///
/// The walk does not follow symbolic links and skips them entirely; their
/// number is reported so callers can mention it. Paths in `skip` (typically
/// the manifest and its scratch file when they live inside the tree) are
/// left out. The returned paths are `/`-separated, relative to `root`, and
/// sorted.
///
/// # Returns
///
/// A tuple containing:
/// - The relative paths of all regular files
/// - A count of skipped symbolic links
///
/// # Errors
///
/// Returns an error if:
/// - `root` is not a directory
/// - A directory cannot be read
/// - A path contains invalid UTF-8
pub fn discover_output_files(root: &Path, skip: &[PathBuf]) -> Result<(Vec<String>, usize)> {
    if !root.is_dir() {
        return Err(RevError::ConfigError {
            message: format!("output directory '{}' does not exist", root.display()),
        });
    }

    let skip: HashSet<&Path> = skip.iter().map(PathBuf::as_path).collect();
    let mut files = Vec::new();
    let mut symlink_count = 0;

    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|err| {
            let path = err
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| root.to_path_buf());
            let source = err
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("directory walk failed"));
            RevError::io(path, source)
        })?;

        let file_type = entry.file_type();
        if file_type.is_symlink() {
            symlink_count += 1;
            continue;
        }
        if !file_type.is_file() || skip.contains(entry.path()) {
            continue;
        }

        files.push(relative_to(root, entry.path())?);
    }

    files.sort();
    Ok((files, symlink_count))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn setup_tree() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("app")).unwrap();
        fs::write(root.join("index.html"), "<html></html>").unwrap();
        fs::write(root.join("app/main.css"), "body {}").unwrap();
        fs::write(root.join("app/util.js"), "export {}").unwrap();
        fs::write(root.join("rev-manifest.json"), "{}").unwrap();
        temp_dir
    }

    #[test]
    fn test_discover_output_files() {
        let temp_dir = setup_tree();
        let (files, symlinks) = discover_output_files(temp_dir.path(), &[]).unwrap();
        assert_eq!(
            files,
            vec!["app/main.css", "app/util.js", "index.html", "rev-manifest.json"]
        );
        assert_eq!(symlinks, 0);
    }

    #[test]
    fn test_discover_skips_listed_paths() {
        let temp_dir = setup_tree();
        let skip = vec![temp_dir.path().join("rev-manifest.json")];
        let (files, _) = discover_output_files(temp_dir.path(), &skip).unwrap();
        assert!(!files.iter().any(|f| f == "rev-manifest.json"));
        assert_eq!(files.len(), 3);
    }

    #[test]
    #[cfg(unix)]
    fn test_discover_skips_symlinks() {
        use std::os::unix::fs::symlink;

        let temp_dir = setup_tree();
        symlink(
            temp_dir.path().join("app/main.css"),
            temp_dir.path().join("app/alias.css"),
        )
        .unwrap();

        let (files, symlinks) = discover_output_files(temp_dir.path(), &[]).unwrap();
        assert_eq!(symlinks, 1);
        assert!(!files.iter().any(|f| f == "app/alias.css"));
    }

    #[test]
    fn test_missing_output_dir() {
        let temp_dir = TempDir::new().unwrap();
        let result = discover_output_files(&temp_dir.path().join("dist"), &[]);
        assert!(matches!(result, Err(RevError::ConfigError { .. })));
    }
}
