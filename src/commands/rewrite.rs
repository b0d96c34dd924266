//! Rewrite command implementation.

use crate::config::RevConfig;
use crate::error::Result;
use crate::logging::Logger;
use crate::pipeline::Pipeline;

/// Executes the rewrite command.
///
/// Rewrites references in the output tree using the saved manifest. Only the
/// current original and revisioned names are known here; references to
/// revisions from earlier builds are left alone.
pub fn rewrite(config: &RevConfig, log: Logger) -> Result<()> {
    log.verbose(1, "Rewriting references from the saved manifest...");

    let stats = Pipeline::new(config, log).rewrite_from_store()?;

    if !log.quiet() {
        if config.dry_run() {
            eprintln!("Dry run, no files were changed:");
        } else {
            eprintln!("Rewrite complete:");
        }
        eprintln!("  Files scanned: {}", stats.files_scanned);
        eprintln!("  Files rewritten: {}", stats.files_rewritten);
        eprintln!("  References rewritten: {}", stats.references_rewritten);
    }

    Ok(())
}
