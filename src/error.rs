//! Error types for asset-rev.
//!
//! This module defines all error types used throughout asset-rev, using
//! a combination of `thiserror` for ergonomic error definitions and `miette`
//! for rich diagnostic output.
//!
//! # Error Handling Strategy
//!
//! - All errors derive from [`RevError`]
//! - I/O failures are always fatal and carry the offending path
//! - A corrupt manifest from a previous build is recoverable: the store logs a
//!   warning and continues with an empty manifest
//! - Ambiguous references abort the build unless longest-match resolution is
//!   enabled
//! - Errors are automatically converted to `miette::Result` for CLI output
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use asset_rev::error::{Result, RevError};
//!
//! fn check_output(path: &Path) -> Result<()> {
//!     if !path.is_dir() {
//!         return Err(RevError::ConfigError {
//!             message: format!("output directory '{}' does not exist", path.display()),
//!         });
//!     }
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Error types that can occur in asset-rev operations
#[derive(Error, Debug, Diagnostic)]
pub enum RevError {
    /// File system I/O error while reading, renaming, writing or deleting.
    ///
    /// A partial rename set would desynchronize the manifest from the disk, so
    /// this is always fatal for the build.
    #[error("I/O error accessing '{path}'")]
    #[diagnostic(code(asset_rev::io_error))]
    IoError {
        /// The path that caused the I/O error
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Attempted to revision a non-regular file (symlink or directory).
    #[error("Invalid file type for '{path}': {message}")]
    #[diagnostic(
        code(asset_rev::file::invalid_type),
        help("asset-rev only revisions regular files inside the output tree.")
    )]
    InvalidFileType {
        /// The path of the invalid file
        path: PathBuf,
        /// Description of the file type issue
        message: String,
    },

    /// The manifest of the previous build exists but cannot be parsed.
    ///
    /// Returned by the inner loader only. [`crate::store::ManifestStore::load`]
    /// downgrades it to a warning and an empty manifest, since the worst
    /// outcome is that some stale files are not reaped.
    #[error("Manifest '{path}' is corrupt: {message}")]
    #[diagnostic(
        code(asset_rev::manifest::corrupt),
        help("Run 'asset-rev clean' to remove the manifest and start fresh.")
    )]
    ManifestCorrupt {
        /// Location of the unreadable manifest
        path: PathBuf,
        /// What was wrong with it
        message: String,
    },

    /// Failed to encode the manifest of the current build.
    #[error("Failed to serialize manifest")]
    #[diagnostic(code(asset_rev::manifest::serialization_error))]
    ManifestSerialization(#[source] serde_json::Error),

    /// A textual reference resolves to more than one manifest entry.
    #[error(
        "Ambiguous reference '{reference}' in '{file}' could refer to: {}",
        .candidates.join(", ")
    )]
    #[diagnostic(
        code(asset_rev::rewrite::ambiguous_reference),
        help(
            "Write the reference as an absolute path, or pass --prefer-longest-match to resolve \
             it to the most specific entry."
        )
    )]
    AmbiguousReference {
        /// Output-relative path of the referencing file
        file: String,
        /// The reference text as written
        reference: String,
        /// Manifest keys the reference could resolve to
        candidates: Vec<String>,
    },

    /// Two distinct originals would be renamed onto the same revisioned path.
    #[error("Revisioned path '{revisioned}' is claimed by both '{first}' and '{second}'")]
    #[diagnostic(
        code(asset_rev::revision::collision),
        help("Increase --fingerprint-length or rename one of the source files.")
    )]
    RevisionCollision {
        /// The contested revisioned path
        revisioned: String,
        /// The original that claimed it first
        first: String,
        /// The original that claimed it second
        second: String,
    },

    /// Textual files still reference unrevisioned or stale asset names.
    #[error("Found {count} dangling reference(s), e.g. {sample}")]
    #[diagnostic(
        code(asset_rev::verify::dangling),
        help("Run 'asset-rev rewrite' (or a full 'asset-rev build') to update references.")
    )]
    DanglingReferences {
        /// Number of dangling references found
        count: usize,
        /// The first few offending references
        sample: String,
    },

    /// An exclusion glob could not be compiled.
    #[error("Invalid exclusion pattern '{pattern}'")]
    #[diagnostic(
        code(asset_rev::config::invalid_pattern),
        help("Patterns use glob syntax: '*', '?', '[...]' and '**' for any directories.")
    )]
    InvalidPattern {
        /// The offending pattern
        pattern: String,
        /// The underlying glob error
        #[source]
        source: glob::PatternError,
    },

    /// Invalid configuration value.
    #[error("Configuration error: {message}")]
    #[diagnostic(
        code(asset_rev::config::error),
        help("Check the command-line flags, ASSET_REV_* variables and config file.")
    )]
    ConfigError {
        /// Description of the configuration error
        message: String,
    },

    /// The TOML configuration file could not be parsed.
    #[error("Failed to parse config file '{path}'")]
    #[diagnostic(code(asset_rev::config::parse_error))]
    ConfigFile {
        /// Location of the config file
        path: PathBuf,
        /// The underlying TOML error
        #[source]
        source: toml::de::Error,
    },

    /// A path in the output tree cannot be represented as UTF-8.
    ///
    /// Manifest keys and values are UTF-8, `/`-separated relative paths.
    #[error("Invalid UTF-8 in path: {path}")]
    #[diagnostic(
        code(asset_rev::path::invalid_utf8),
        help("Rename the file so that its path is valid UTF-8.")
    )]
    InvalidUtf8Path {
        /// The path containing invalid UTF-8
        path: PathBuf,
    },
}

impl RevError {
    /// Shorthand for wrapping an [`std::io::Error`] with the path it concerns.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RevError::IoError {
            path: path.into(),
            source,
        }
    }
}

/// Type alias for Results in this crate
pub type Result<T> = std::result::Result<T, RevError>;
