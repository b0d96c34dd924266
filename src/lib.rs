//! # asset-rev
//!
//! Content-addressed revisioning for static build output.
//!
//! ## Overview
//!
//! asset-rev walks a build output directory, renames every asset to a name
//! that embeds a fingerprint of its content (`app/main.css` becomes
//! `app/main-3f9a1c2b7e.css`), records the mapping in a JSON manifest, and
//! rewrites references in HTML, CSS, JS and friends so they point at the new
//! names. Files revisioned by a previous run that are no longer current are
//! removed.
//!
//! ## Key Features
//!
//! - **Content fingerprints**: BLAKE3 digests, hex or base32, truncated to a
//!   configurable length
//! - **Idempotent**: re-running on an already revisioned tree is a no-op
//! - **Stale-file reaping**: superseded revisions are deleted, never anything
//!   outside the previous manifest
//! - **Reference rewriting**: root-relative and document-relative references,
//!   with explicit handling of ambiguous matches
//! - **Append mode**: revision a late file without rebuilding the manifest
//! - **Parallel processing**: hashing and rewriting run on rayon
//!
//! ## Architecture
//!
//! - [`cli`]: Command-line interface definitions using clap
//! - [`commands`]: Implementation of all asset-rev subcommands
//! - [`config`]: Layered run configuration and exclusion filters
//! - [`pipeline`]: The build state machine tying the stages together
//! - [`revision`]: Fingerprinting and renaming
//! - [`manifest`] / [`store`]: The original to revisioned mapping and its
//!   persistence
//! - [`reap`]: Stale-file removal
//! - [`rewrite`]: Reference scanning and rewriting
//! - [`error`]: Error types and handling with thiserror + miette
//!
//! Internal modules (not part of the public API):
//! - `discovery`: Output tree enumeration
//!
//! ## Usage
//!
//! ```bash
//! # After the static site generator has written ./dist
//! asset-rev build --output-dir dist
//!
//! # A service worker generated afterwards
//! asset-rev append --output-dir dist sw.js
//! ```
//!
//! ## Library Usage
//!
//! ```no_run
//! use asset_rev::config::RevConfig;
//! use asset_rev::logging::Logger;
//! use asset_rev::pipeline::{BuildMode, Pipeline};
//!
//! let config = RevConfig::builder().output_dir("dist").build()?;
//! let report = Pipeline::new(&config, Logger::new(1, false)).run(&BuildMode::Full)?;
//! println!("{} files revisioned", report.renamed);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Error Handling
//!
//! The crate uses a combination of:
//! - `thiserror` for strongly-typed errors
//! - `miette` for rich diagnostic output in CLI
//!
//! All public functions return `Result` types with descriptive error variants.

pub mod asset_path;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod hashing;
pub mod logging;
pub mod manifest;
pub mod pipeline;
pub mod reap;
pub mod revision;
pub mod rewrite;
pub mod store;

// Internal modules
mod discovery;
