//! Verify command implementation.

use crate::config::RevConfig;
use crate::error::{Result, RevError};
use crate::logging::Logger;
use crate::pipeline::Pipeline;

/// How many offending references the error message lists.
const SAMPLE_SIZE: usize = 5;

/// Executes the verify command.
///
/// Fails with [`RevError::DanglingReferences`] if any scanned file still
/// references a renamed original or a stale revision.
pub fn verify(config: &RevConfig, log: Logger) -> Result<()> {
    log.verbose(1, "Verifying references...");

    let dangling = Pipeline::new(config, log).verify()?;
    for reference in &dangling {
        log.verbose(1, format!("  {reference}"));
    }

    if !dangling.is_empty() {
        let sample = dangling
            .iter()
            .take(SAMPLE_SIZE)
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        return Err(RevError::DanglingReferences {
            count: dangling.len(),
            sample,
        });
    }

    log.info("All references resolve");
    Ok(())
}
