//! Append command implementation.

use std::collections::BTreeSet;
use std::path::Path;

use crate::asset_path::relative_to;
use crate::cli::normalize_path;
use crate::config::RevConfig;
use crate::error::Result;
use crate::logging::Logger;
use crate::pipeline::{BuildMode, Pipeline};

/// Executes the append command.
///
/// Revisions `files` on top of the existing manifest. Each file may be given
/// relative to the output directory or as a path that points into it.
pub fn append(config: &RevConfig, files: &[String], working_dir: &Path, log: Logger) -> Result<()> {
    let originals = files
        .iter()
        .map(|file| to_output_relative(config.output_dir(), file, working_dir))
        .collect::<Result<BTreeSet<_>>>()?;

    log.verbose(
        1,
        format!("Appending {} file(s) to the manifest", originals.len()),
    );

    let report = Pipeline::new(config, log).run(&BuildMode::Append(originals))?;
    report.print(&log);
    Ok(())
}

fn to_output_relative(root: &Path, file: &str, working_dir: &Path) -> Result<String> {
    let trimmed = file.trim_start_matches("./").replace('\\', "/");
    if root.join(&trimmed).is_file() {
        return relative_to(root, &normalize_path(&trimmed, root));
    }

    let resolved = normalize_path(file, working_dir);
    if resolved.starts_with(root) {
        return relative_to(root, &resolved);
    }

    // Unknown files are reported by the pipeline with the rest of the plan
    Ok(trimmed)
}
