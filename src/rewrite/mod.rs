//! Rewriting of textual references to revisioned assets.
//!
//! Rewriting is a two-phase operation like renaming: [`plan_rewrites`]
//! computes the new contents of every scanned file in parallel without
//! touching the tree, and [`RewritePlan::write`] writes them. An ambiguous
//! reference therefore aborts the pass before anything on disk changes, and
//! callers can run other fallible steps between the two phases.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use rayon::prelude::*;
use regex::Regex;

use crate::asset_path::{AssetPath, file_name, parent_dir, resolve};
use crate::config::AmbiguityPolicy;
use crate::error::{Result, RevError};
use crate::logging::{Logger, plural};
use crate::manifest::Manifest;

mod reference;

pub use reference::{Reference, ReferenceKind, references};


/// Resolves path references to manifest entries.
///
/// Besides original names, the index recognises revisioned names of the
/// current manifest and, when a previous manifest is supplied, superseded
/// revisioned names, which map forward to the current revision of the same
/// original.
#[derive(Debug, Clone, Copy)]
pub struct RevisionIndex<'a> {
    current: &'a Manifest,
    previous: Option<&'a Manifest>,
}

/// A manifest entry a reference resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target<'a> {
    pub original: &'a str,
    pub revisioned: &'a str,
}

impl<'a> RevisionIndex<'a> {
    pub fn new(current: &'a Manifest) -> Self {
        Self {
            current,
            previous: None,
        }
    }

    /// Also map the revisioned names of `previous` forward.
    pub fn with_previous(mut self, previous: &'a Manifest) -> Self {
        self.previous = Some(previous);
        self
    }

    /// Looks up a resolved relative path.
    pub fn lookup(&self, rel: &str) -> Option<Target<'a>> {
        if let Some((original, revisioned)) = self.current.get_key_value(rel) {
            return Some(Target {
                original,
                revisioned,
            });
        }

        if let Some(original) = self.current.original_of(rel)
            && let Some((original, revisioned)) = self.current.get_key_value(original)
        {
            return Some(Target {
                original,
                revisioned,
            });
        }

        let original = self.previous?.original_of(rel)?;
        let (original, revisioned) = self.current.get_key_value(original)?;
        Some(Target {
            original,
            revisioned,
        })
    }
}

/// Options for [`rewrite_references`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RewriteOptions {
    pub ambiguity: AmbiguityPolicy,
    pub dry_run: bool,
}

/// Statistics from a rewrite pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RewriteStats {
    /// Textual files scanned
    pub files_scanned: usize,
    /// Files whose content changed (or would change in dry-run mode)
    pub files_rewritten: usize,
    /// Individual references replaced
    pub references_rewritten: usize,
}

/// Extensions of files whose relative references may be meant from the
/// page that loads them rather than from their own directory.
const SCRIPT_EXTENSIONS: &[&str] = &["js", "mjs", "cjs"];

fn is_script(file: &str) -> bool {
    file.rsplit_once('.')
        .is_some_and(|(_, ext)| SCRIPT_EXTENSIONS.contains(&ext))
}

/// Resolves one reference found in `file` to a manifest entry.
///
/// Absolute references resolve from the tree root. Relative references
/// resolve from the directory of `file`, and fall back to the tree root when
/// that names nothing. Scripts are the exception: a bare relative reference
/// such as `fetch("data/x.json")` in a script is commonly meant from the page,
/// so when both readings name different entries the reference is ambiguous.
/// Spelling it `./` or `../` settles it in favour of the script's directory.
///
/// # Errors
///
/// Returns [`RevError::AmbiguousReference`] for an ambiguous script
/// reference when the policy is [`AmbiguityPolicy::Fail`].
pub fn resolve_reference<'a>(
    file: &str,
    reference: &Reference<'_>,
    index: &RevisionIndex<'a>,
    policy: AmbiguityPolicy,
) -> Result<Option<Target<'a>>> {
    let from_root = || resolve("", reference.text).and_then(|rel| index.lookup(&rel));
    if reference.kind == ReferenceKind::Absolute {
        return Ok(from_root());
    }

    let Some(dir) = resolve(parent_dir(file), reference.text).and_then(|rel| index.lookup(&rel))
    else {
        return Ok(from_root());
    };
    if !is_script(file) || reference.is_dot_relative() {
        return Ok(Some(dir));
    }

    match from_root() {
        Some(root) if root.original != dir.original => match policy {
            AmbiguityPolicy::Fail => Err(RevError::AmbiguousReference {
                file: file.to_string(),
                reference: reference.text.to_string(),
                candidates: vec![dir.original.to_string(), root.original.to_string()],
            }),
            AmbiguityPolicy::LongestMatch if root.original.len() > dir.original.len() => {
                Ok(Some(root))
            }
            AmbiguityPolicy::LongestMatch => Ok(Some(dir)),
        },
        _ => Ok(Some(dir)),
    }
}

/// Text that should replace `reference` so it names `target`.
fn replacement(reference: &Reference<'_>, target: &Target<'_>) -> String {
    match reference.kind {
        ReferenceKind::Absolute => format!("/{}", target.revisioned),
        ReferenceKind::Relative => {
            // Revisioning never changes the directory, so swapping the last
            // segment keeps `./` and `../` spellings intact
            let prefix_len = reference.text.len() - reference.last_segment().len();
            format!(
                "{}{}",
                &reference.text[..prefix_len],
                file_name(target.revisioned)
            )
        }
    }
}

/// Rewrites the references in `content`, which was read from `file`.
///
/// Returns the new content and the number of replaced references, or `None`
/// when nothing changes. Applying the rewrite to its own output changes
/// nothing.
pub fn rewrite_content(
    file: &str,
    content: &[u8],
    index: &RevisionIndex<'_>,
    policy: AmbiguityPolicy,
) -> Result<Option<(Vec<u8>, usize)>> {
    let mut output = Vec::with_capacity(content.len());
    let mut cursor = 0;
    let mut replaced = 0;

    for reference in references(content) {
        let Some(target) = resolve_reference(file, &reference, index, policy)? else {
            continue;
        };
        let new_text = replacement(&reference, &target);
        if new_text == reference.text {
            continue;
        }

        output.extend_from_slice(&content[cursor..reference.start]);
        output.extend_from_slice(new_text.as_bytes());
        cursor = reference.end;
        replaced += 1;
    }

    if replaced == 0 {
        return Ok(None);
    }
    output.extend_from_slice(&content[cursor..]);
    Ok(Some((output, replaced)))
}

/// A file to scan for references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanFile {
    /// Path the file is served under; relative references resolve from its
    /// directory
    pub rel: String,
    /// Where the file sits on disk right now, relative to the tree root
    pub location: String,
}

impl ScanFile {
    /// A file that is read and written at its served path.
    pub fn in_place(rel: impl Into<String>) -> Self {
        let rel = rel.into();
        Self {
            location: rel.clone(),
            rel,
        }
    }

    /// A file served as `rel` that still sits at `location`.
    pub fn moved(rel: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            rel: rel.into(),
            location: location.into(),
        }
    }
}

/// New content for one scanned file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRewrite {
    pub rel: String,
    pub content: Vec<u8>,
    pub references: usize,
}

/// Computed rewrites that have not been written yet.
#[derive(Debug, Clone, Default)]
pub struct RewritePlan {
    files_scanned: usize,
    changes: Vec<FileRewrite>,
}

impl RewritePlan {
    pub fn changes(&self) -> &[FileRewrite] {
        &self.changes
    }

    pub fn stats(&self) -> RewriteStats {
        RewriteStats {
            files_scanned: self.files_scanned,
            files_rewritten: self.changes.len(),
            references_rewritten: self.changes.iter().map(|c| c.references).sum(),
        }
    }

    /// Writes every change to its served path under `root`.
    ///
    /// With `dry_run` set nothing is written and only the statistics are
    /// reported.
    pub fn write(self, root: &Path, dry_run: bool, log: &Logger) -> Result<RewriteStats> {
        let stats = self.stats();
        for change in self.changes {
            log.verbose(
                2,
                format!("  {}: {}", change.rel, plural(change.references, "reference")),
            );
            if !dry_run {
                let path = root.join(&change.rel);
                fs::write(&path, change.content).map_err(|source| RevError::io(&path, source))?;
            }
        }
        Ok(stats)
    }
}

/// Computes the new content of every file of `files` without writing.
///
/// Files are read from their current location and resolved as if they
/// already lived at their served path, so a rewrite can be planned before
/// the renames it depends on are final.
///
/// # Errors
///
/// Fails if a file cannot be read, or on an ambiguous reference (see
/// [`resolve_reference`]).
pub fn plan_rewrites(
    root: &Path,
    files: &[ScanFile],
    index: &RevisionIndex<'_>,
    policy: AmbiguityPolicy,
) -> Result<RewritePlan> {
    let changes = files
        .par_iter()
        .map(|file| {
            let path = root.join(&file.location);
            let content = fs::read(&path).map_err(|source| RevError::io(&path, source))?;
            let rewritten = rewrite_content(&file.rel, &content, index, policy)?;
            Ok(rewritten.map(|(content, references)| FileRewrite {
                rel: file.rel.clone(),
                content,
                references,
            }))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(RewritePlan {
        files_scanned: files.len(),
        changes: changes.into_iter().flatten().collect(),
    })
}

/// Rewrites every file of `files` (relative to `root`) in place.
///
/// All new contents are computed before the first write; files whose content
/// does not change are left untouched.
///
/// # Errors
///
/// Fails if a file cannot be read or written, or on an ambiguous reference
/// (see [`resolve_reference`]). On an ambiguous reference no file has been
/// written yet.
pub fn rewrite_references(
    root: &Path,
    files: &[String],
    index: &RevisionIndex<'_>,
    options: RewriteOptions,
    log: &Logger,
) -> Result<RewriteStats> {
    let files: Vec<ScanFile> = files.iter().map(ScanFile::in_place).collect();
    plan_rewrites(root, &files, index, options.ambiguity)?.write(root, options.dry_run, log)
}

/// A reference that names an asset which no longer exists under that name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingReference {
    pub file: String,
    pub reference: String,
    /// The original the reference was meant for.
    pub original: String,
}

impl std::fmt::Display for DanglingReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: '{}' ({})", self.file, self.reference, self.original)
    }
}

/// Splits a revisioned path into its original path, if the stem ends in a
/// fingerprint-shaped suffix of `length` characters.
pub(crate) fn strip_fingerprint(rel: &str, length: usize) -> Option<String> {
    static REVISIONED_STEM_RE: OnceLock<Regex> = OnceLock::new();

    let path = AssetPath::parse(rel);
    let re = REVISIONED_STEM_RE.get_or_init(|| {
        Regex::new(r"^(.+)-([0-9a-v]+)$").expect("revisioned stem regex should compile")
    });
    let captures = re.captures(path.stem())?;
    if captures[2].len() != length {
        return None;
    }

    let name = format!("{}{}", &captures[1], path.ext());
    Some(if path.dir().is_empty() {
        name
    } else {
        format!("{}/{}", path.dir(), name)
    })
}

/// Finds references that would break in the shipped tree.
///
/// A reference dangles when none of its resolutions exists on disk and one of
/// them either names an original that has been revisioned away, or looks like
/// a revision of a tracked original other than the current one.
pub fn find_dangling(
    root: &Path,
    files: &[String],
    on_disk: &HashSet<String>,
    manifest: &Manifest,
    fingerprint_length: usize,
) -> Result<Vec<DanglingReference>> {
    let found = files
        .par_iter()
        .map(|rel| {
            let path = root.join(rel);
            let content = fs::read(&path).map_err(|source| RevError::io(&path, source))?;
            Ok(dangling_in(rel, &content, on_disk, manifest, fingerprint_length))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(found.into_iter().flatten().collect())
}

fn dangling_in(
    file: &str,
    content: &[u8],
    on_disk: &HashSet<String>,
    manifest: &Manifest,
    fingerprint_length: usize,
) -> Vec<DanglingReference> {
    let mut dangling = Vec::new();

    for reference in references(content) {
        let mut candidates = vec![resolve("", reference.text)];
        if reference.kind == ReferenceKind::Relative {
            candidates.push(resolve(parent_dir(file), reference.text));
        }
        let candidates: Vec<String> = candidates.into_iter().flatten().collect();

        if candidates.iter().any(|c| on_disk.contains(c)) {
            continue;
        }

        let original = candidates.iter().find_map(|candidate| {
            if manifest.contains_original(candidate) {
                return Some(candidate.clone());
            }
            strip_fingerprint(candidate, fingerprint_length)
                .filter(|original| manifest.get(original).is_some_and(|rev| rev != candidate))
        });

        if let Some(original) = original {
            dangling.push(DanglingReference {
                file: file.to_string(),
                reference: reference.text.to_string(),
                original,
            });
        }
    }

    dangling
}
