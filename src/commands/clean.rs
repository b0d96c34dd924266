//! Clean command implementation.

use crate::config::RevConfig;
use crate::error::Result;
use crate::logging::Logger;
use crate::store::ManifestStore;

/// Executes the clean command.
///
/// Removes the manifest file. Succeeds when there is nothing to remove.
pub fn clean(config: &RevConfig, log: Logger) -> Result<()> {
    let store = ManifestStore::new(config.manifest_path());
    if store.clean()? {
        log.info(format!("Removed manifest: {}", store.path().display()));
    } else {
        log.verbose(1, "No manifest to remove");
    }
    Ok(())
}
