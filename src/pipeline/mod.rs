//! The build state machine.
//!
//! A build runs `collect → hash & rename → diff → plan rewrite → remove
//! duplicates → reap → persist → write rewrite`, each stage consuming the
//! output of the previous one. Renames are the only change made before the
//! rewrite has been computed, and they are undone if it fails. Nothing is
//! deleted until then, and the rewrite reads the in-memory manifest rather
//! than the persisted file.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::config::RevConfig;
use crate::discovery::discover_output_files;
use crate::error::{Result, RevError};
use crate::logging::{Logger, plural};
use crate::manifest::Manifest;
use crate::reap::{ReapOptions, ReapStats, format_size, reap_stale};
use crate::revision::{
    RevisionAction, RevisionPlan, Selection, apply_renames, plan_revisions, remove_duplicates,
    undo_renames,
};
use crate::rewrite::{
    DanglingReference, RevisionIndex, RewritePlan, RewriteStats, ScanFile, find_dangling,
    plan_rewrites,
};
use crate::store::ManifestStore;

#[cfg(test)]
mod tests;

/// Which assets a run revisions.
#[derive(Debug, Clone, Default)]
pub enum BuildMode {
    /// Every eligible file of the tree; the manifest is rebuilt from scratch.
    #[default]
    Full,
    /// Only the listed originals; other manifest entries are retained.
    Append(BTreeSet<String>),
}

/// Output of the collect stage.
#[derive(Debug)]
pub struct Collected {
    pub files: Vec<String>,
    pub previous: Manifest,
    pub symlinks_skipped: usize,
}

/// Output of the hash & rename stage.
#[derive(Debug)]
pub struct Revisioned {
    pub plan: RevisionPlan,
    /// Renames performed (or planned, in dry-run mode)
    pub renamed: usize,
    /// The tree listing from before the renames
    pub files: Vec<String>,
    pub previous: Manifest,
}

/// Output of the diff stage.
#[derive(Debug)]
pub struct Diffed {
    pub current: Manifest,
    pub previous: Manifest,
    pub stale: Vec<String>,
    pub plan: RevisionPlan,
    pub renamed: usize,
    pub files: Vec<String>,
}

/// Summary of a run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BuildReport {
    /// Files moved to their revisioned name
    pub renamed: usize,
    /// Fresh originals dropped because their revision already existed
    pub deduplicated: usize,
    /// Assets already at their revisioned name
    pub unchanged: usize,
    /// Entries in the resulting manifest
    pub manifest_entries: usize,
    pub reap: ReapStats,
    /// `None` when the run stopped before rewriting
    pub rewrite: Option<RewriteStats>,
    pub manifest_path: PathBuf,
    pub dry_run: bool,
}

impl BuildReport {
    pub fn print(&self, log: &Logger) {
        if log.quiet() {
            return;
        }

        if self.dry_run {
            eprintln!("Dry run, no files were changed:");
        } else {
            eprintln!("Revisioning complete:");
        }
        eprintln!("  Files revisioned: {}", self.renamed);
        if self.deduplicated > 0 {
            eprintln!("  Already revisioned: {}", self.deduplicated);
        }
        eprintln!("  Unchanged: {}", self.unchanged);
        eprintln!(
            "  Stale files removed: {} ({})",
            self.reap.files_removed,
            format_size(self.reap.bytes_freed)
        );
        if let Some(rewrite) = &self.rewrite {
            eprintln!(
                "  Files rewritten: {} of {} ({} references)",
                rewrite.files_rewritten, rewrite.files_scanned, rewrite.references_rewritten
            );
        }
        eprintln!("  Manifest entries: {}", self.manifest_entries);
        eprintln!("  Manifest: {}", self.manifest_path.display());
    }
}

/// Drives the stages over one output tree.
pub struct Pipeline<'a> {
    config: &'a RevConfig,
    store: ManifestStore,
    log: Logger,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a RevConfig, log: Logger) -> Self {
        Self {
            config,
            store: ManifestStore::new(config.manifest_path()),
            log,
        }
    }

    pub fn store(&self) -> &ManifestStore {
        &self.store
    }

    fn root(&self) -> &Path {
        self.config.output_dir()
    }

    /// Paths inside the tree that belong to the tool itself.
    fn own_files(&self) -> Vec<PathBuf> {
        [self.store.path().to_path_buf(), self.store.temp_path()]
            .into_iter()
            .filter(|path| path.starts_with(self.root()))
            .collect()
    }

    fn discover(&self) -> Result<(Vec<String>, usize)> {
        discover_output_files(self.root(), &self.own_files())
    }

    /// Runs every stage.
    pub fn run(&self, mode: &BuildMode) -> Result<BuildReport> {
        self.run_stages(mode, true)
    }

    /// Runs every stage except the reference rewrite.
    pub fn stamp(&self, mode: &BuildMode) -> Result<BuildReport> {
        self.run_stages(mode, false)
    }

    fn run_stages(&self, mode: &BuildMode, rewrite: bool) -> Result<BuildReport> {
        let collected = self.collect()?;
        let revisioned = self.hash_and_rename(collected, mode)?;
        let diffed = self.diff(revisioned, mode)?;
        let rewrites = if rewrite {
            match self.plan_rewrite(&diffed) {
                Ok(plan) => Some(plan),
                Err(err) => {
                    self.undo(&diffed.plan);
                    return Err(err);
                }
            }
        } else {
            None
        };
        let deduplicated = self.remove_duplicates(&diffed.plan)?;
        let reap = self.reap(&diffed)?;
        self.persist(&diffed.current)?;
        let rewrite = rewrites
            .map(|plan| plan.write(self.root(), self.config.dry_run(), &self.log))
            .transpose()?;

        Ok(BuildReport {
            renamed: diffed.renamed,
            deduplicated,
            unchanged: diffed.plan.count(RevisionAction::Unchanged),
            manifest_entries: diffed.current.len(),
            reap,
            rewrite,
            manifest_path: self.store.path().to_path_buf(),
            dry_run: self.config.dry_run(),
        })
    }

    /// Lists the output tree and loads the previous manifest.
    pub fn collect(&self) -> Result<Collected> {
        let (files, symlinks_skipped) = self.discover()?;
        self.log
            .verbose(1, format!("Found {} files in {}", files.len(), self.root().display()));
        if symlinks_skipped > 0 {
            self.log.info(format!(
                "Note: Skipped {}",
                plural(symlinks_skipped, "symbolic link")
            ));
        }

        let previous = self.store.load(&self.log)?;
        self.log.verbose(
            1,
            format!("Previous manifest has {} entries", previous.len()),
        );

        Ok(Collected {
            files,
            previous,
            symlinks_skipped,
        })
    }

    /// Fingerprints eligible assets and moves them to their revisioned names.
    ///
    /// Deduplicated originals stay on disk until
    /// [`Pipeline::remove_duplicates`].
    pub fn hash_and_rename(&self, collected: Collected, mode: &BuildMode) -> Result<Revisioned> {
        let selection = match mode {
            BuildMode::Full => Selection::Tree,
            BuildMode::Append(originals) => {
                let on_disk: HashSet<&str> = collected.files.iter().map(String::as_str).collect();
                let missing = originals.iter().find(|rel| {
                    !on_disk.contains(rel.as_str()) && !collected.previous.contains_original(rel)
                });
                if let Some(missing) = missing {
                    return Err(RevError::ConfigError {
                        message: format!("'{missing}' is not a file in the output tree"),
                    });
                }
                Selection::Only(originals.clone())
            }
        };

        let plan = plan_revisions(
            self.root(),
            &collected.files,
            &collected.previous,
            &selection,
            self.config.exclusions(),
            self.config.encoding(),
            self.config.fingerprint_length(),
        )?;
        self.log.verbose(
            1,
            format!(
                "Fingerprinted {} file(s): {} to rename, {} already revisioned, {} unchanged",
                plan.fingerprinted(),
                plan.count(RevisionAction::Rename),
                plan.count(RevisionAction::Deduplicate),
                plan.count(RevisionAction::Unchanged),
            ),
        );

        let renamed = if self.config.dry_run() {
            plan.count(RevisionAction::Rename)
        } else {
            apply_renames(self.root(), &plan, &self.log)?
        };

        Ok(Revisioned {
            plan,
            renamed,
            files: collected.files,
            previous: collected.previous,
        })
    }

    /// Builds the current manifest and the stale set.
    pub fn diff(&self, revisioned: Revisioned, mode: &BuildMode) -> Result<Diffed> {
        let base = match mode {
            BuildMode::Full => Manifest::new(),
            BuildMode::Append(_) => revisioned.previous.clone(),
        };
        let current = revisioned.plan.manifest(base)?;
        let stale = current.stale_since(&revisioned.previous);
        self.log
            .verbose(1, plural(stale.len(), "stale revision"));

        Ok(Diffed {
            current,
            previous: revisioned.previous,
            stale,
            plan: revisioned.plan,
            renamed: revisioned.renamed,
            files: revisioned.files,
        })
    }

    /// Computes the reference rewrite over the tree as it will look once the
    /// build completes, without writing anything.
    pub fn plan_rewrite(&self, diffed: &Diffed) -> Result<RewritePlan> {
        let dry_run = self.config.dry_run();
        let stale: HashSet<&str> = diffed.stale.iter().map(String::as_str).collect();
        let mut moved: HashMap<&str, &str> = HashMap::new();
        let mut dropped: HashSet<&str> = HashSet::new();
        for revision in diffed.plan.revisions() {
            match revision.action {
                RevisionAction::Rename => {
                    moved.insert(&revision.source, &revision.revisioned);
                }
                RevisionAction::Deduplicate => {
                    dropped.insert(&revision.source);
                }
                RevisionAction::Unchanged => {}
            }
        }

        let files: Vec<ScanFile> = diffed
            .files
            .iter()
            .filter(|rel| !dropped.contains(rel.as_str()) && !stale.contains(rel.as_str()))
            .filter_map(|rel| {
                let file = match moved.get(rel.as_str()) {
                    Some(revisioned) if dry_run => ScanFile::moved(*revisioned, rel.as_str()),
                    Some(revisioned) => ScanFile::in_place(*revisioned),
                    None => ScanFile::in_place(rel.as_str()),
                };
                self.config.is_scannable(&file.rel).then_some(file)
            })
            .collect();

        let index = RevisionIndex::new(&diffed.current).with_previous(&diffed.previous);
        plan_rewrites(self.root(), &files, &index, self.config.ambiguity())
    }

    fn undo(&self, plan: &RevisionPlan) {
        if self.config.dry_run() {
            return;
        }
        self.log.verbose(1, "Restoring original names");
        undo_renames(self.root(), plan, &self.log);
    }

    /// Deletes fresh originals whose revision already existed.
    pub fn remove_duplicates(&self, plan: &RevisionPlan) -> Result<usize> {
        if self.config.dry_run() {
            return Ok(plan.count(RevisionAction::Deduplicate));
        }
        remove_duplicates(self.root(), plan, &self.log)
    }

    /// Deletes stale revisions. Must run before [`Pipeline::persist`].
    pub fn reap(&self, diffed: &Diffed) -> Result<ReapStats> {
        let options = ReapOptions {
            dry_run: self.config.dry_run(),
            prune_empty_dirs: self.config.prune_empty_dirs(),
        };
        let stats = reap_stale(self.root(), &diffed.stale, options, &self.log)?;
        stats.report(self.config.dry_run(), &self.log);
        Ok(stats)
    }

    pub fn persist(&self, manifest: &Manifest) -> Result<()> {
        if self.config.dry_run() {
            self.log.verbose(
                1,
                format!("Would save manifest to {}", self.store.path().display()),
            );
            return Ok(());
        }
        self.store.save(manifest)
    }

    /// Rewrites references in every scannable file of the tree as it is on
    /// disk.
    pub fn rewrite(&self, manifest: &Manifest) -> Result<RewriteStats> {
        let (files, _) = self.discover()?;
        let scannable: Vec<ScanFile> = files
            .into_iter()
            .filter(|rel| self.config.is_scannable(rel))
            .map(ScanFile::in_place)
            .collect();

        let index = RevisionIndex::new(manifest);
        plan_rewrites(self.root(), &scannable, &index, self.config.ambiguity())?.write(
            self.root(),
            self.config.dry_run(),
            &self.log,
        )
    }

    /// Rewrites references using the persisted manifest only.
    pub fn rewrite_from_store(&self) -> Result<RewriteStats> {
        let manifest = self.store.load(&self.log)?;
        if manifest.is_empty() {
            self.log.warn(format!(
                "manifest '{}' is empty or missing, nothing to rewrite",
                self.store.path().display()
            ));
        }
        self.rewrite(&manifest)
    }

    /// Lists references that point at originals or stale revisions.
    pub fn verify(&self) -> Result<Vec<DanglingReference>> {
        let (files, _) = self.discover()?;
        let manifest = self.store.load(&self.log)?;
        let on_disk: HashSet<String> = files.iter().cloned().collect();
        let scannable: Vec<String> = files
            .into_iter()
            .filter(|rel| self.config.is_scannable(rel))
            .collect();

        find_dangling(
            self.root(),
            &scannable,
            &on_disk,
            &manifest,
            self.config.fingerprint_length(),
        )
    }
}
