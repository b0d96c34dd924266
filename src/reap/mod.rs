//! Deletion of superseded revisioned files.

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::asset_path::{is_contained, parent_dir};
use crate::error::{Result, RevError};
use crate::logging::{Logger, plural};

mod size;

pub(crate) use size::format_size;


/// Statistics from a reap operation
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReapStats {
    /// Stale files deleted (or that would be deleted in dry-run mode)
    pub files_removed: usize,
    /// Total size of those files
    pub bytes_freed: u64,
    /// Directories pruned because reaping left them empty
    pub dirs_removed: usize,
    /// Stale entries whose file was already gone
    pub already_missing: usize,
    /// Stale entries refused because they point outside the tree
    pub rejected: usize,
}

impl ReapStats {
    pub fn report(&self, dry_run: bool, log: &Logger) {
        if self.files_removed == 0 {
            log.verbose(1, "No stale files to remove");
            return;
        }

        let verb = if dry_run { "Would remove" } else { "Removed" };
        log.info(format!(
            "{verb} {}, freeing {}",
            plural(self.files_removed, "stale file"),
            format_size(self.bytes_freed)
        ));
        if self.dirs_removed > 0 {
            log.verbose(
                1,
                format!("Pruned {}", plural(self.dirs_removed, "empty folder")),
            );
        }
    }
}

/// Options for [`reap_stale`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ReapOptions {
    pub dry_run: bool,
    pub prune_empty_dirs: bool,
}

/// Deletes the stale revisioned files listed in `stale` from `root`.
///
/// `stale` holds manifest values (see [`crate::manifest::Manifest::stale_since`]).
/// A loaded manifest never holds paths outside the tree, but `stale` is not
/// required to come from one, so containment is checked again here.
/// Only regular files inside the tree are deleted: values that are not plain
/// relative paths are refused with a warning, and entries whose file is
/// already gone are counted and skipped. When `prune_empty_dirs` is set,
/// directories emptied by the deletions are removed too, up to but never
/// including `root`.
///
/// # Errors
///
/// Fails on the first file that exists but cannot be deleted.
pub fn reap_stale(
    root: &Path,
    stale: &[String],
    options: ReapOptions,
    log: &Logger,
) -> Result<ReapStats> {
    let mut stats = ReapStats::default();
    let mut touched_dirs = BTreeSet::new();

    for rel in stale {
        if !is_contained(rel) {
            log.warn(format!(
                "refusing to delete '{rel}': not a relative path inside the output tree"
            ));
            stats.rejected += 1;
            continue;
        }

        let path = root.join(rel);
        let metadata = match fs::symlink_metadata(&path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                log.verbose(2, format!("  {rel} already gone"));
                stats.already_missing += 1;
                continue;
            }
            Err(source) => return Err(RevError::io(&path, source)),
        };

        if !metadata.is_file() {
            log.warn(format!("refusing to delete '{rel}': not a regular file"));
            stats.rejected += 1;
            continue;
        }

        log.verbose(1, format!("  Removing {rel} ({})", format_size(metadata.len())));
        if !options.dry_run {
            fs::remove_file(&path).map_err(|source| RevError::io(&path, source))?;
        }

        stats.files_removed += 1;
        stats.bytes_freed += metadata.len();
        touched_dirs.insert(parent_dir(rel).to_string());
    }

    if options.prune_empty_dirs && !options.dry_run {
        stats.dirs_removed = prune_empty_dirs(root, touched_dirs, log);
    }

    Ok(stats)
}

/// Removes now-empty directories, walking from the deepest upwards.
fn prune_empty_dirs(root: &Path, dirs: BTreeSet<String>, log: &Logger) -> usize {
    let mut removed = 0;
    // Popping from a sorted stack visits children before their parents
    let mut pending: Vec<String> = dirs.into_iter().collect();

    while let Some(rel) = pending.pop() {
        if rel.is_empty() {
            continue;
        }

        let path = root.join(&rel);
        let is_empty = fs::read_dir(&path)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);
        if !is_empty {
            continue;
        }

        match fs::remove_dir(&path) {
            Ok(()) => {
                log.verbose(2, format!("  Pruned empty directory {rel}"));
                removed += 1;
                let parent = parent_dir(&rel).to_string();
                if !pending.contains(&parent) {
                    pending.push(parent);
                }
            }
            Err(err) => log.warn(format!("could not remove empty directory '{rel}': {err}")),
        }
    }

    removed
}
