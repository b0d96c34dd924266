//! Hashing and renaming of eligible assets.
//!
//! Revisioning happens in two phases. [`plan_revisions`] only reads: it
//! classifies every file of the output tree, fingerprints the fresh originals
//! in parallel, and decides per original what has to happen.
//! [`apply_renames`] then performs the renames, rolling back the ones already
//! done if any rename fails, so a failed build never leaves a half-renamed
//! tree behind. Deleting deduplicated originals ([`remove_duplicates`]) is a
//! separate step that callers run once nothing else can fail; until then
//! [`undo_renames`] restores the tree.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::Path;

use rayon::prelude::*;

use crate::asset_path::AssetPath;
use crate::config::AssetFilter;
use crate::error::{Result, RevError};
use crate::hashing::{FingerprintEncoding, fingerprint_file};
use crate::logging::Logger;
use crate::manifest::Manifest;


/// Which originals a planning pass considers.
#[derive(Debug, Clone, Default)]
pub enum Selection {
    /// Every file of the tree that passes the exclusion filter.
    #[default]
    Tree,
    /// Only these originals, regardless of the exclusion filter.
    Only(BTreeSet<String>),
}

impl Selection {
    fn admits(&self, original: &str, filter: &dyn AssetFilter) -> bool {
        match self {
            Selection::Tree => !filter.is_excluded(original),
            Selection::Only(originals) => originals.contains(original),
        }
    }
}

/// What happens to one asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevisionAction {
    /// Move the fresh original to its revisioned name.
    Rename,
    /// The revisioned file already exists; delete the fresh original.
    Deduplicate,
    /// The asset already sits at its revisioned name.
    Unchanged,
}

/// One asset of the current build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedRevision {
    /// Stable identity of the asset (the manifest key)
    pub original: String,
    /// Current on-disk path, relative to the output tree
    pub source: String,
    /// Revisioned path (the manifest value)
    pub revisioned: String,
    pub action: RevisionAction,
}

/// The outcome of [`plan_revisions`], ordered by original path.
#[derive(Debug, Clone, Default)]
pub struct RevisionPlan {
    revisions: Vec<PlannedRevision>,
    fingerprinted: usize,
}

impl RevisionPlan {
    pub fn revisions(&self) -> &[PlannedRevision] {
        &self.revisions
    }

    /// Number of files that were hashed to build the plan.
    pub fn fingerprinted(&self) -> usize {
        self.fingerprinted
    }

    pub fn count(&self, action: RevisionAction) -> usize {
        self.revisions.iter().filter(|r| r.action == action).count()
    }

    /// Builds the manifest of this build on top of `base`.
    ///
    /// Pass an empty manifest for a full build, or the previous manifest to
    /// merge a partial plan into it.
    pub fn manifest(&self, mut base: Manifest) -> Result<Manifest> {
        for revision in &self.revisions {
            base.insert(revision.original.clone(), revision.revisioned.clone())?;
        }
        Ok(base)
    }
}

/// How a file of the tree relates to the current build.
enum Candidate {
    /// A fresh original, hashed to its revisioned name.
    Fresh { revisioned: String },
    /// A file whose name already embeds the fingerprint of its content.
    SelfAddressed { original: String },
    /// A revisioned file recorded in the previous manifest.
    Carried { original: String },
}

/// Decides, for every eligible asset, where it has to live after this build.
///
/// `files` is the current listing of the output tree (see
/// [`crate::discovery::discover_output_files`]). Classification:
///
/// - A file recorded as a value of `previous` is carried forward under its
///   original key. Its content is not re-checked: upstream changes arrive as
///   fresh originals, while the carried copy may legitimately differ from its
///   fingerprint after an earlier reference rewrite.
/// - Any other admitted file is a fresh original and is fingerprinted. If its
///   revisioned name already exists in the tree the existing file is kept and
///   the original is deduplicated away; otherwise it is renamed.
/// - A fresh file whose stem already ends in its own fingerprint is treated
///   as revisioned, which keeps reruns stable even without a manifest.
///
/// When an original has both a fresh copy and a carried one, the fresh copy
/// decides the revisioned name. A fresh file that sits at the revisioned name
/// of another fresh file is never renamed: it is the target its sibling
/// deduplicates onto.
///
/// # Errors
///
/// Fails on the first file that cannot be read; nothing is renamed by this
/// function.
pub fn plan_revisions(
    root: &Path,
    files: &[String],
    previous: &Manifest,
    selection: &Selection,
    filter: &dyn AssetFilter,
    encoding: FingerprintEncoding,
    length: usize,
) -> Result<RevisionPlan> {
    let on_disk: HashSet<&str> = files.iter().map(String::as_str).collect();

    let mut to_hash = Vec::new();
    let mut candidates: Vec<(String, Candidate)> = Vec::new();
    for file in files {
        if let Some(original) = previous.original_of(file) {
            if selection.admits(original, filter) {
                candidates.push((
                    file.clone(),
                    Candidate::Carried {
                        original: original.to_string(),
                    },
                ));
            }
        } else if selection.admits(file, filter) {
            to_hash.push(file.as_str());
        }
    }

    let hashed = to_hash
        .par_iter()
        .map(|rel| {
            let fingerprint = fingerprint_file(&root.join(rel), encoding, length)?;
            Ok((rel.to_string(), classify_fresh(rel, &fingerprint)))
        })
        .collect::<Result<Vec<_>>>()?;
    let fingerprinted = hashed.len();

    // A fresh file sitting at the revisioned name of another fresh file was
    // revisioned by a build whose manifest is gone; it stays where it is and
    // its original deduplicates onto it
    let claimed: HashSet<String> = hashed
        .iter()
        .filter_map(|(_, candidate)| match candidate {
            Candidate::Fresh { revisioned } => Some(revisioned.clone()),
            _ => None,
        })
        .collect();
    candidates.extend(
        hashed
            .into_iter()
            .filter(|(source, candidate)| {
                !matches!(candidate, Candidate::Fresh { .. }) || !claimed.contains(source)
            }),
    );

    // Group by original so a fresh copy can override a carried one
    let mut fresh: BTreeMap<String, (String, String)> = BTreeMap::new();
    let mut existing: BTreeMap<String, (String, bool)> = BTreeMap::new();
    for (source, candidate) in candidates {
        match candidate {
            Candidate::Fresh { revisioned } => {
                fresh.insert(source.clone(), (source, revisioned));
            }
            Candidate::Carried { original } => {
                existing.insert(original, (source, true));
            }
            Candidate::SelfAddressed { original } => {
                let slot = existing.entry(original).or_insert((source.clone(), false));
                if !slot.1 && source < slot.0 {
                    *slot = (source, false);
                }
            }
        }
    }

    let mut revisions = Vec::with_capacity(fresh.len() + existing.len());
    for (original, (source, revisioned)) in &fresh {
        let action = if on_disk.contains(revisioned.as_str()) {
            RevisionAction::Deduplicate
        } else {
            RevisionAction::Rename
        };
        revisions.push(PlannedRevision {
            original: original.clone(),
            source: source.clone(),
            revisioned: revisioned.clone(),
            action,
        });
    }
    for (original, (source, _)) in existing {
        if fresh.contains_key(&original) {
            continue;
        }
        revisions.push(PlannedRevision {
            original,
            revisioned: source.clone(),
            source,
            action: RevisionAction::Unchanged,
        });
    }
    revisions.sort_by(|a, b| a.original.cmp(&b.original));

    Ok(RevisionPlan {
        revisions,
        fingerprinted,
    })
}

fn classify_fresh(rel: &str, fingerprint: &str) -> Candidate {
    let path = AssetPath::parse(rel);
    if let Some(stem) = path.stem().strip_suffix(fingerprint)
        && let Some(stem) = stem.strip_suffix('-')
        && !stem.is_empty()
    {
        let name = format!("{stem}{}", path.ext());
        let original = if path.dir().is_empty() {
            name
        } else {
            format!("{}/{}", path.dir(), name)
        };
        return Candidate::SelfAddressed { original };
    }

    Candidate::Fresh {
        revisioned: path.revisioned(fingerprint),
    }
}

/// Counters from [`apply_plan`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ApplyStats {
    pub renamed: usize,
    pub deduplicated: usize,
    pub unchanged: usize,
}

/// Performs the renames and deletions of `plan` inside `root`.
///
/// Shorthand for [`apply_renames`] followed by [`remove_duplicates`].
pub fn apply_plan(root: &Path, plan: &RevisionPlan, log: &Logger) -> Result<ApplyStats> {
    let renamed = apply_renames(root, plan, log)?;
    let deduplicated = remove_duplicates(root, plan, log)?;
    Ok(ApplyStats {
        renamed,
        deduplicated,
        unchanged: plan.count(RevisionAction::Unchanged),
    })
}

/// Moves every fresh original of `plan` to its revisioned name.
///
/// If one rename fails, every rename already performed is undone in reverse
/// order and the error is returned. Nothing is deleted.
pub fn apply_renames(root: &Path, plan: &RevisionPlan, log: &Logger) -> Result<usize> {
    let mut done: Vec<&PlannedRevision> = Vec::new();

    for revision in renames(plan) {
        let from = root.join(&revision.source);
        let to = root.join(&revision.revisioned);
        if let Err(source) = fs::rename(&from, &to) {
            rollback(root, &done, log);
            return Err(RevError::io(from, source));
        }
        log.verbose(
            1,
            format!("  {} -> {}", revision.source, revision.revisioned),
        );
        done.push(revision);
    }

    Ok(done.len())
}

/// Moves every renamed asset of `plan` back to its original name.
///
/// Used when a later stage fails before anything was deleted.
pub fn undo_renames(root: &Path, plan: &RevisionPlan, log: &Logger) {
    let done: Vec<&PlannedRevision> = renames(plan).collect();
    rollback(root, &done, log);
}

/// Deletes the fresh originals whose revision already exists.
pub fn remove_duplicates(root: &Path, plan: &RevisionPlan, log: &Logger) -> Result<usize> {
    let mut removed = 0;
    for revision in plan.revisions() {
        if revision.action != RevisionAction::Deduplicate {
            continue;
        }
        let path = root.join(&revision.source);
        fs::remove_file(&path).map_err(|source| RevError::io(&path, source))?;
        log.verbose(
            1,
            format!(
                "  {} already revisioned as {}",
                revision.source, revision.revisioned
            ),
        );
        removed += 1;
    }
    Ok(removed)
}

fn renames(plan: &RevisionPlan) -> impl Iterator<Item = &PlannedRevision> {
    plan.revisions()
        .iter()
        .filter(|revision| revision.action == RevisionAction::Rename)
}

fn rollback(root: &Path, done: &[&PlannedRevision], log: &Logger) {
    for revision in done.iter().rev() {
        let from = root.join(&revision.revisioned);
        let to = root.join(&revision.source);
        if let Err(err) = fs::rename(&from, &to) {
            log.warn(format!(
                "could not restore '{}' after a failed rename: {err}",
                revision.source
            ));
        }
    }
}
