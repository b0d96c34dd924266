//! Revisioning configuration.
//!
//! [`RevConfig`] gathers everything the pipeline needs to know about a build:
//! where the output tree and manifest live, which files are excluded from
//! revisioning, how fingerprints are rendered, which files are scanned for
//! references, and how ambiguous references are handled.
//!
//! Values are layered with the highest precedence first: command-line flags,
//! `ASSET_REV_*` environment variables (both handled by clap), an optional
//! TOML file ([`FileConfig`]), and the built-in defaults.
//!
//! # Example
//!
//! ```no_run
//! use asset_rev::config::RevConfig;
//!
//! let config = RevConfig::builder()
//!     .output_dir("dist")
//!     .exclude(["**/assets/*.*", "sitemap.xml"])
//!     .fingerprint_length(12)
//!     .build()?;
//!
//! assert!(config.is_excluded("assets/index-4f2a.js"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use serde::Deserialize;

use crate::asset_path::file_name;
use crate::error::{Result, RevError};
use crate::hashing::{
    DEFAULT_FINGERPRINT_LENGTH, FingerprintEncoding, MAX_FINGERPRINT_LENGTH,
    MIN_FINGERPRINT_LENGTH,
};
use crate::store::DEFAULT_MANIFEST_NAME;


/// Default output directory.
pub const DEFAULT_OUTPUT_DIR: &str = "dist";

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "asset-rev.toml";

/// Files that are never revisioned unless the exclusion list is overridden:
/// already content-addressed bundles, the already-revisioned service worker,
/// entry documents and the sitemap.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "**/assets/*.*",
    "**/sw-*.js",
    "**/index.html",
    "**/index-*.html",
    "sitemap.xml",
];

/// Extensions of files scanned for references.
pub const DEFAULT_SCAN_EXTENSIONS: &[&str] = &["html", "css", "js", "webmanifest"];

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// What to do when a reference resolves to more than one manifest entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum AmbiguityPolicy {
    /// Abort the build with [`RevError::AmbiguousReference`]
    #[default]
    Fail,
    /// Pick the candidate with the longest original path
    LongestMatch,
}

/// Decides which output files take part in revisioning.
///
/// Paths are `/`-separated and relative to the output tree root. Any
/// `Fn(&str) -> bool` can serve as a filter.
pub trait AssetFilter: Sync {
    /// Returns `true` if `rel` must keep its name.
    fn is_excluded(&self, rel: &str) -> bool;
}

impl<F> AssetFilter for F
where
    F: Fn(&str) -> bool + Sync,
{
    fn is_excluded(&self, rel: &str) -> bool {
        self(rel)
    }
}

/// Compiled exclusion globs.
#[derive(Debug, Clone, Default)]
pub struct GlobExclusions {
    patterns: Vec<Pattern>,
}

impl GlobExclusions {
    /// Compiles `patterns`.
    ///
    /// # Errors
    ///
    /// Returns [`RevError::InvalidPattern`] for the first invalid glob.
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| {
                let p = p.as_ref();
                Pattern::new(p).map_err(|source| RevError::InvalidPattern {
                    pattern: p.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }
}

impl AssetFilter for GlobExclusions {
    fn is_excluded(&self, rel: &str) -> bool {
        self.patterns
            .iter()
            .any(|p| p.matches_with(rel, MATCH_OPTIONS))
    }
}

/// Fully resolved configuration for one build.
#[derive(Debug, Clone)]
pub struct RevConfig {
    output_dir: PathBuf,
    manifest_path: PathBuf,
    exclusions: GlobExclusions,
    fingerprint_length: usize,
    encoding: FingerprintEncoding,
    scan_extensions: Vec<String>,
    ambiguity: AmbiguityPolicy,
    prune_empty_dirs: bool,
    dry_run: bool,
}

impl RevConfig {
    /// Creates a new builder for [`RevConfig`]
    pub fn builder() -> RevConfigBuilder {
        RevConfigBuilder::default()
    }

    /// Root of the output tree
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Location of the persisted manifest
    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    pub fn exclusions(&self) -> &GlobExclusions {
        &self.exclusions
    }

    pub fn fingerprint_length(&self) -> usize {
        self.fingerprint_length
    }

    pub fn encoding(&self) -> FingerprintEncoding {
        self.encoding
    }

    /// Lowercase extensions (without dot) of files scanned for references
    pub fn scan_extensions(&self) -> &[String] {
        &self.scan_extensions
    }

    pub fn ambiguity(&self) -> AmbiguityPolicy {
        self.ambiguity
    }

    /// Whether directories emptied by reaping are removed
    pub fn prune_empty_dirs(&self) -> bool {
        self.prune_empty_dirs
    }

    /// Whether the build only reports what it would do
    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Returns `true` if `rel` matches one of the exclusion globs.
    pub fn is_excluded(&self, rel: &str) -> bool {
        self.exclusions.is_excluded(rel)
    }

    /// Returns `true` if `rel` has one of the scanned extensions.
    pub fn is_scannable(&self, rel: &str) -> bool {
        let name = file_name(rel);
        match name.rfind('.') {
            Some(idx) if idx > 0 => {
                let ext = name[idx + 1..].to_ascii_lowercase();
                self.scan_extensions.iter().any(|e| *e == ext)
            }
            _ => false,
        }
    }
}

/// Builder for [`RevConfig`]
///
/// Unset fields fall back to a loaded [`FileConfig`] (see
/// [`RevConfigBuilder::merge_file`]) and then to the defaults.
#[derive(Debug, Default, Clone)]
pub struct RevConfigBuilder {
    output_dir: Option<PathBuf>,
    manifest_path: Option<PathBuf>,
    exclude: Option<Vec<String>>,
    fingerprint_length: Option<usize>,
    encoding: Option<FingerprintEncoding>,
    scan_extensions: Option<Vec<String>>,
    ambiguity: Option<AmbiguityPolicy>,
    prune_empty_dirs: Option<bool>,
    dry_run: bool,
}

impl RevConfigBuilder {
    /// Set the output directory
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Set the manifest location
    pub fn manifest_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest_path = Some(path.into());
        self
    }

    /// Replace the exclusion globs
    pub fn exclude<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = Some(patterns.into_iter().map(Into::into).collect());
        self
    }

    /// Set the fingerprint width in characters
    pub fn fingerprint_length(mut self, length: usize) -> Self {
        self.fingerprint_length = Some(length);
        self
    }

    /// Set the fingerprint rendering
    pub fn encoding(mut self, encoding: FingerprintEncoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    /// Replace the scanned extensions (with or without a leading dot)
    pub fn scan_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scan_extensions = Some(extensions.into_iter().map(Into::into).collect());
        self
    }

    /// Set the ambiguity policy
    pub fn ambiguity(mut self, policy: AmbiguityPolicy) -> Self {
        self.ambiguity = Some(policy);
        self
    }

    /// Enable or disable removal of emptied directories
    pub fn prune_empty_dirs(mut self, prune: bool) -> Self {
        self.prune_empty_dirs = Some(prune);
        self
    }

    /// Enable dry-run mode
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Fill every field that is still unset from `file`.
    pub fn merge_file(mut self, file: FileConfig) -> Self {
        self.output_dir = self.output_dir.or(file.output_dir);
        self.manifest_path = self.manifest_path.or(file.manifest_path);
        self.exclude = self.exclude.or(file.exclude);
        self.fingerprint_length = self.fingerprint_length.or(file.fingerprint_length);
        self.encoding = self.encoding.or(file.encoding);
        self.scan_extensions = self.scan_extensions.or(file.scan_extensions);
        self.ambiguity = self.ambiguity.or(file.ambiguity);
        self.prune_empty_dirs = self.prune_empty_dirs.or(file.prune_empty_dirs);
        self
    }

    /// Validate and build the configuration
    pub fn build(self) -> Result<RevConfig> {
        let output_dir = self
            .output_dir
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
        let manifest_path = self
            .manifest_path
            .unwrap_or_else(|| output_dir.join(DEFAULT_MANIFEST_NAME));

        let fingerprint_length = self
            .fingerprint_length
            .unwrap_or(DEFAULT_FINGERPRINT_LENGTH);
        if !(MIN_FINGERPRINT_LENGTH..=MAX_FINGERPRINT_LENGTH).contains(&fingerprint_length) {
            return Err(RevError::ConfigError {
                message: format!(
                    "fingerprint length {fingerprint_length} is outside \
                     {MIN_FINGERPRINT_LENGTH}..={MAX_FINGERPRINT_LENGTH}"
                ),
            });
        }

        let exclusions = match self.exclude {
            Some(patterns) => GlobExclusions::new(patterns)?,
            None => GlobExclusions::new(DEFAULT_EXCLUDES)?,
        };

        let scan_extensions = match self.scan_extensions {
            Some(exts) => exts
                .iter()
                .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
            None => DEFAULT_SCAN_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
        };

        Ok(RevConfig {
            output_dir,
            manifest_path,
            exclusions,
            fingerprint_length,
            encoding: self.encoding.unwrap_or_default(),
            scan_extensions,
            ambiguity: self.ambiguity.unwrap_or_default(),
            prune_empty_dirs: self.prune_empty_dirs.unwrap_or(true),
            dry_run: self.dry_run,
        })
    }
}

/// Contents of an `asset-rev.toml` file. Every key is optional.
///
/// ```toml
/// output-dir = "dist"
/// exclude = ["**/assets/*.*", "sitemap.xml"]
/// fingerprint-length = 10
/// encoding = "hex"
/// scan-extensions = ["html", "css", "js", "webmanifest"]
/// ambiguity = "fail"
/// prune-empty-dirs = true
/// ```
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileConfig {
    pub output_dir: Option<PathBuf>,
    pub manifest_path: Option<PathBuf>,
    pub exclude: Option<Vec<String>>,
    pub fingerprint_length: Option<usize>,
    pub encoding: Option<FingerprintEncoding>,
    pub scan_extensions: Option<Vec<String>>,
    pub ambiguity: Option<AmbiguityPolicy>,
    pub prune_empty_dirs: Option<bool>,
}

impl FileConfig {
    /// Parses the config file at `path`.
    ///
    /// Relative `output-dir` and `manifest-path` values are resolved against
    /// the directory containing the file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| RevError::io(path, source))?;
        let mut config: FileConfig =
            toml::from_str(&text).map_err(|source| RevError::ConfigFile {
                path: path.to_path_buf(),
                source,
            })?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        config.output_dir = config.output_dir.map(|p| base.join(p));
        config.manifest_path = config.manifest_path.map(|p| base.join(p));
        Ok(config)
    }

    /// Like [`FileConfig::load`] but returns `None` when the file is absent.
    pub fn load_optional(path: &Path) -> Result<Option<Self>> {
        if path.is_file() {
            Self::load(path).map(Some)
        } else {
            Ok(None)
        }
    }
}
