//! # asset-rev CLI
//!
//! The command-line interface for asset-rev, which renames static build
//! output to content-addressed names and rewrites the references to them.
//!
//! ## Commands
//!
//! - **build**: Revision the output tree, reap stale files, rewrite references
//! - **stamp**: Like build, without rewriting references
//! - **rewrite**: Rewrite references using the saved manifest
//! - **append**: Revision specific late files and merge them into the manifest
//! - **verify**: Fail if any reference still points at an unrevisioned asset
//! - **clean**: Remove the manifest
//!
//! ## Quick Start
//!
//! ```bash
//! npm run build
//! asset-rev build --output-dir dist
//! ```
//!
//! ## Environment Variables
//!
//! - `ASSET_REV_OUTPUT_DIR`: Output directory to revision (default: ./dist)
//! - `ASSET_REV_MANIFEST_PATH`: Custom manifest location
//! - `ASSET_REV_CONFIG`: Config file (default: ./asset-rev.toml if present)
//! - `ASSET_REV_VERBOSE`: Enable verbose output
//! - `ASSET_REV_QUIET`: Silence all output except errors
//!
//! See individual commands for more environment variables.

use std::io::IsTerminal;

use asset_rev::cli::Cli;

fn main() -> miette::Result<()> {
    // Install miette's fancy panic and error report handler
    miette::set_panic_hook();

    // Configure miette handler based on terminal capabilities
    // This provides better error formatting for both TTY and non-TTY environments
    if std::io::stderr().is_terminal() {
        miette::set_hook(Box::new(|_| {
            Box::new(
                miette::GraphicalReportHandler::new()
                    .with_theme(miette::GraphicalTheme::unicode_nocolor())
                    .with_context_lines(3),
            )
        }))?;
    } else {
        // Use a simpler handler for non-TTY environments (CI, logs, etc.)
        miette::set_hook(Box::new(|_| {
            Box::new(
                miette::GraphicalReportHandler::new()
                    .with_theme(miette::GraphicalTheme::none())
                    .with_context_lines(0),
            )
        }))?;
    }

    // Parse command line arguments
    let cli = Cli::parse_args();

    // Execute the appropriate command
    let result = asset_rev::commands::execute(&cli);

    // Convert our error type to miette's Result
    result.map_err(Into::into)
}
