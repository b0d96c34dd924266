//! Command-line interface definitions for asset-rev.
//!
//! This module defines the CLI structure using clap, including all subcommands
//! and their arguments. The main entry point is the [`Cli`] struct.
//!
//! # Example
//!
//! ```no_run
//! use asset_rev::cli::{Cli, Commands};
//!
//! let cli = Cli::parse_args();
//!
//! match cli.command() {
//!     Commands::Build { dry_run, .. } => println!("Building (dry run: {dry_run})"),
//!     Commands::Clean => println!("Removing the manifest"),
//!     _ => {}
//! }
//! ```

use std::path::{Component, Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use crate::config::{AmbiguityPolicy, DEFAULT_CONFIG_FILE, RevConfigBuilder};
use crate::error::{Result, RevError};
use crate::hashing::FingerprintEncoding;


/// Main command-line interface for asset-rev.
///
/// Global options apply to every subcommand; the subcommand selects which
/// stages of the revisioning pipeline run.
#[derive(Parser)]
#[command(
    name = "asset-rev",
    bin_name = "asset-rev",
    author,
    version,
    about = "Content-addressed revisioning and reference rewriting for static site output",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    #[command(flatten)]
    global_opts: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

/// Global options that apply to all asset-rev commands.
#[derive(Parser)]
pub struct GlobalOpts {
    /// Root of the static output tree (defaults to ./dist)
    #[arg(long, global = true, env = "ASSET_REV_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Path to the manifest file (defaults to `<output-dir>/rev-manifest.json`)
    #[arg(long, global = true, env = "ASSET_REV_MANIFEST_PATH")]
    manifest_path: Option<PathBuf>,

    /// Path to a TOML config file (defaults to ./asset-rev.toml when present)
    #[arg(long, global = true, env = "ASSET_REV_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output (use multiple times for more verbosity)
    #[arg(short, long, global = true, action = clap::ArgAction::Count, env = "ASSET_REV_VERBOSE")]
    verbose: u8,

    /// Silence all output except for errors
    #[arg(
        short,
        long,
        global = true,
        conflicts_with = "verbose",
        env = "ASSET_REV_QUIET"
    )]
    quiet: bool,
}

impl GlobalOpts {
    /// Create a new builder for constructing `GlobalOpts` programmatically.
    pub fn builder() -> GlobalOptsBuilder {
        GlobalOptsBuilder::default()
    }

    /// Get the output directory option
    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }

    /// Get the manifest path option
    pub fn manifest_path(&self) -> Option<&Path> {
        self.manifest_path.as_deref()
    }

    /// Get the config file option
    pub fn config(&self) -> Option<&Path> {
        self.config.as_deref()
    }

    /// The config file to read, resolved against `base`.
    ///
    /// Returns the path and whether it was requested explicitly; an implicit
    /// default that does not exist is simply skipped.
    pub fn config_file(&self, base: &Path) -> (PathBuf, bool) {
        match self.config() {
            Some(path) => (normalize_path(path, base), true),
            None => (normalize_path(DEFAULT_CONFIG_FILE, base), false),
        }
    }

    /// Get the verbose level
    pub fn verbose(&self) -> u8 {
        self.verbose
    }

    /// Check if quiet mode is enabled
    pub fn quiet(&self) -> bool {
        self.quiet
    }
}

/// Builder for constructing `GlobalOpts` programmatically.
#[derive(Default)]
pub struct GlobalOptsBuilder {
    output_dir: Option<PathBuf>,
    manifest_path: Option<PathBuf>,
    config: Option<PathBuf>,
    verbose: u8,
    quiet: bool,
}

impl GlobalOptsBuilder {
    /// Set the output directory.
    pub fn output_dir(mut self, dir: Option<impl Into<PathBuf>>) -> Self {
        self.output_dir = dir.map(|d| d.into());
        self
    }

    /// Set the manifest file path.
    pub fn manifest_path(mut self, path: Option<impl Into<PathBuf>>) -> Self {
        self.manifest_path = path.map(|p| p.into());
        self
    }

    /// Set the config file path.
    pub fn config(mut self, path: Option<impl Into<PathBuf>>) -> Self {
        self.config = path.map(|p| p.into());
        self
    }

    /// Set the verbosity level (0 = normal, 1+ = verbose).
    pub fn verbose(mut self, level: u8) -> Self {
        self.verbose = level;
        self
    }

    /// Enable or disable quiet mode.
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Build the `GlobalOpts` instance with the configured values.
    pub fn build(self) -> GlobalOpts {
        GlobalOpts {
            output_dir: self.output_dir,
            manifest_path: self.manifest_path,
            config: self.config,
            verbose: self.verbose,
            quiet: self.quiet,
        }
    }
}

impl Cli {
    /// Get the global options
    pub fn global_opts(&self) -> &GlobalOpts {
        &self.global_opts
    }

    /// Get the command
    pub fn command(&self) -> &Commands {
        &self.command
    }

    /// Create a builder for programmatic construction
    pub fn builder() -> CliBuilder {
        CliBuilder::default()
    }

    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Builder for [`Cli`]
#[derive(Debug, Default)]
pub struct CliBuilder {
    output_dir: Option<PathBuf>,
    manifest_path: Option<PathBuf>,
    config: Option<PathBuf>,
    verbose: u8,
    quiet: bool,
    command: Option<Commands>,
}

impl CliBuilder {
    /// Set the output directory
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Set the manifest path
    pub fn manifest_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest_path = Some(path.into());
        self
    }

    /// Set the config file
    pub fn config(mut self, path: impl Into<PathBuf>) -> Self {
        self.config = Some(path.into());
        self
    }

    /// Set the verbose level
    pub fn verbose(mut self, level: u8) -> Self {
        self.verbose = level;
        self
    }

    /// Enable quiet mode
    pub fn quiet(mut self, enabled: bool) -> Self {
        self.quiet = enabled;
        self
    }

    /// Set the command
    pub fn command(mut self, command: Commands) -> Self {
        self.command = Some(command);
        self
    }

    /// Build the Cli instance
    pub fn build(self) -> Result<Cli> {
        let command = self.command.ok_or(RevError::ConfigError {
            message: "Command is required".to_string(),
        })?;

        Ok(Cli {
            global_opts: GlobalOpts::builder()
                .output_dir(self.output_dir)
                .manifest_path(self.manifest_path)
                .config(self.config)
                .verbose(self.verbose)
                .quiet(self.quiet)
                .build(),
            command,
        })
    }
}

/// Normalize a path to be absolute and clean, without requiring it to exist.
///
/// This function:
/// - Joins relative paths onto `base`
/// - Removes `.` and `..` components where possible
/// - Does NOT resolve symlinks (preserves user intent)
/// - Does NOT require the path to exist
pub(crate) fn normalize_path(path: impl AsRef<Path>, base: &Path) -> PathBuf {
    let path = path.as_ref();

    let absolute = if path.is_relative() {
        base.join(path)
    } else {
        path.to_path_buf()
    };

    let mut components = Vec::new();
    for component in absolute.components() {
        match component {
            Component::ParentDir => {
                if let Some(last) = components.last()
                    && matches!(last, Component::Normal(_))
                {
                    components.pop();
                    continue;
                }
                components.push(component);
            }
            Component::CurDir => continue,
            _ => components.push(component),
        }
    }

    components.into_iter().collect()
}

/// Options controlling how assets are fingerprinted and renamed.
#[derive(Debug, Default, Clone, Args)]
pub struct RevisionArgs {
    /// Glob patterns of files that keep their name (comma-separated,
    /// replaces the defaults)
    #[arg(long, value_delimiter = ',', env = "ASSET_REV_EXCLUDE")]
    pub exclude: Vec<String>,

    /// Number of fingerprint characters in revisioned names (8-52)
    #[arg(long, env = "ASSET_REV_FINGERPRINT_LENGTH")]
    pub fingerprint_length: Option<usize>,

    /// How the fingerprint is rendered
    #[arg(long, value_enum, env = "ASSET_REV_ENCODING")]
    pub encoding: Option<FingerprintEncoding>,

    /// Keep directories that reaping leaves empty
    #[arg(long, env = "ASSET_REV_KEEP_EMPTY_DIRS")]
    pub keep_empty_dirs: bool,
}

impl RevisionArgs {
    pub(crate) fn apply(&self, mut builder: RevConfigBuilder) -> RevConfigBuilder {
        if !self.exclude.is_empty() {
            builder = builder.exclude(self.exclude.iter().cloned());
        }
        if let Some(length) = self.fingerprint_length {
            builder = builder.fingerprint_length(length);
        }
        if let Some(encoding) = self.encoding {
            builder = builder.encoding(encoding);
        }
        if self.keep_empty_dirs {
            builder = builder.prune_empty_dirs(false);
        }
        builder
    }
}

/// Options controlling which files are scanned and how references resolve.
#[derive(Debug, Default, Clone, Args)]
pub struct RewriteArgs {
    /// Extensions of files scanned for references (comma-separated,
    /// replaces the defaults)
    #[arg(long, value_delimiter = ',', env = "ASSET_REV_SCAN_EXT")]
    pub scan_ext: Vec<String>,

    /// Resolve ambiguous references to the longest matching path instead of
    /// failing
    #[arg(long, env = "ASSET_REV_PREFER_LONGEST_MATCH")]
    pub prefer_longest_match: bool,
}

impl RewriteArgs {
    pub(crate) fn apply(&self, mut builder: RevConfigBuilder) -> RevConfigBuilder {
        if !self.scan_ext.is_empty() {
            builder = builder.scan_extensions(self.scan_ext.iter().cloned());
        }
        if self.prefer_longest_match {
            builder = builder.ambiguity(AmbiguityPolicy::LongestMatch);
        }
        builder
    }
}

/// Available asset-rev subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Revision the output tree and rewrite every reference
    ///
    /// Runs the complete pipeline:
    /// 1. Fingerprints every eligible file and renames it to
    ///    `<name>-<fingerprint>.<ext>`
    /// 2. Deletes revisioned files left over from the previous build
    /// 3. Saves the new manifest
    /// 4. Rewrites references in HTML, CSS, JS and web manifests
    ///
    /// Running it again on an unchanged tree changes nothing.
    Build {
        #[command(flatten)]
        revision: RevisionArgs,

        #[command(flatten)]
        rewrite: RewriteArgs,

        /// Show what would change without touching the disk
        #[arg(long, env = "ASSET_REV_DRY_RUN")]
        dry_run: bool,
    },

    /// Revision the output tree without rewriting references
    ///
    /// Performs the renaming, reaping and manifest steps of `build`. Run
    /// `rewrite` afterwards to update references.
    Stamp {
        #[command(flatten)]
        revision: RevisionArgs,

        /// Show what would change without touching the disk
        #[arg(long, env = "ASSET_REV_DRY_RUN")]
        dry_run: bool,
    },

    /// Rewrite references using the saved manifest
    Rewrite {
        #[command(flatten)]
        rewrite: RewriteArgs,

        /// Show what would change without touching the disk
        #[arg(long, env = "ASSET_REV_DRY_RUN")]
        dry_run: bool,
    },

    /// Revision files generated after the main build
    ///
    /// Fingerprints only the given files (paths relative to the output
    /// directory), merges them into the existing manifest and rewrites
    /// references to them. Typical use is a service worker that is generated
    /// from the revisioned tree.
    Append {
        /// Files to revision, relative to the output directory
        #[arg(required = true)]
        files: Vec<String>,

        #[command(flatten)]
        revision: RevisionArgs,

        #[command(flatten)]
        rewrite: RewriteArgs,

        /// Show what would change without touching the disk
        #[arg(long, env = "ASSET_REV_DRY_RUN")]
        dry_run: bool,
    },

    /// Check that no reference points at a renamed original or stale revision
    ///
    /// Read-only. Exits with an error listing a sample of the offending
    /// references.
    Verify {
        #[command(flatten)]
        rewrite: RewriteArgs,

        /// Number of characters in fingerprints to recognise
        #[arg(long, env = "ASSET_REV_FINGERPRINT_LENGTH")]
        fingerprint_length: Option<usize>,
    },

    /// Delete the manifest file
    ///
    /// The next `build` starts from scratch and will not reap files from
    /// earlier builds.
    Clean,
}
