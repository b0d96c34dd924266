//! Implementation of asset-rev subcommands.
//!
//! `mod.rs` is a thin dispatcher that layers the configuration sources;
//! command logic lives in dedicated modules.

use std::path::{Path, PathBuf};

use crate::cli::{Cli, Commands, normalize_path};
use crate::config::{DEFAULT_OUTPUT_DIR, FileConfig, RevConfig, RevConfigBuilder};
use crate::error::{Result, RevError};
use crate::logging::Logger;

pub(crate) mod append;
pub(crate) mod build;
pub(crate) mod clean;
pub(crate) mod rewrite;
pub(crate) mod verify;

pub use append::append;
pub use build::{Build, BuildBuilder};
pub use clean::clean;
pub use rewrite::rewrite;
pub use verify::verify;


/// Execute commands based on the parsed CLI arguments.
pub fn execute(cli: &Cli) -> Result<()> {
    execute_with_dir(cli, None)
}

/// Execute commands with an explicit working directory.
///
/// Relative paths given on the command line, in the environment or as the
/// config file location are resolved against `working_dir`.
pub fn execute_with_dir(cli: &Cli, working_dir: Option<&Path>) -> Result<()> {
    let opts = cli.global_opts();
    let log = Logger::new(opts.verbose(), opts.quiet());

    let current_dir = if let Some(dir) = working_dir {
        dir.to_path_buf()
    } else {
        std::env::current_dir().map_err(|source| RevError::IoError {
            path: PathBuf::from("."),
            source,
        })?
    };

    match cli.command() {
        Commands::Build {
            revision,
            rewrite,
            dry_run,
        } => {
            let config = resolve_config(cli, &current_dir, |builder| {
                rewrite.apply(revision.apply(builder)).dry_run(*dry_run)
            })?;
            Build::builder().config(&config).log(log).build()?.run()
        }
        Commands::Stamp { revision, dry_run } => {
            let config = resolve_config(cli, &current_dir, |builder| {
                revision.apply(builder).dry_run(*dry_run)
            })?;
            Build::builder()
                .config(&config)
                .log(log)
                .rewrite(false)
                .build()?
                .run()
        }
        Commands::Rewrite { rewrite, dry_run } => {
            let config = resolve_config(cli, &current_dir, |builder| {
                rewrite.apply(builder).dry_run(*dry_run)
            })?;
            self::rewrite(&config, log)
        }
        Commands::Append {
            files,
            revision,
            rewrite,
            dry_run,
        } => {
            let config = resolve_config(cli, &current_dir, |builder| {
                rewrite.apply(revision.apply(builder)).dry_run(*dry_run)
            })?;
            append(&config, files, &current_dir, log)
        }
        Commands::Verify {
            rewrite,
            fingerprint_length,
        } => {
            let config = resolve_config(cli, &current_dir, |builder| {
                let builder = rewrite.apply(builder);
                match fingerprint_length {
                    Some(length) => builder.fingerprint_length(*length),
                    None => builder,
                }
            })?;
            verify(&config, log)
        }
        Commands::Clean => {
            let config = resolve_config(cli, &current_dir, |builder| builder)?;
            clean(&config, log)
        }
    }
}

/// Layers command-line values, the config file and the defaults.
///
/// `apply` sets the command-specific flags; values it leaves unset fall back
/// to the config file and then to the defaults.
pub(crate) fn resolve_config(
    cli: &Cli,
    working_dir: &Path,
    apply: impl FnOnce(RevConfigBuilder) -> RevConfigBuilder,
) -> Result<RevConfig> {
    let opts = cli.global_opts();
    let mut builder = apply(RevConfig::builder());

    let mut has_output_dir = false;
    if let Some(dir) = opts.output_dir() {
        builder = builder.output_dir(normalize_path(dir, working_dir));
        has_output_dir = true;
    }
    if let Some(path) = opts.manifest_path() {
        builder = builder.manifest_path(normalize_path(path, working_dir));
    }

    let (config_path, explicit) = opts.config_file(working_dir);
    let file = if explicit {
        Some(FileConfig::load(&config_path)?)
    } else {
        FileConfig::load_optional(&config_path)?
    };
    if let Some(mut file) = file {
        file.output_dir = file.output_dir.map(|p| normalize_path(p, working_dir));
        file.manifest_path = file.manifest_path.map(|p| normalize_path(p, working_dir));
        has_output_dir |= file.output_dir.is_some();
        builder = builder.merge_file(file);
    }

    if !has_output_dir {
        builder = builder.output_dir(normalize_path(DEFAULT_OUTPUT_DIR, working_dir));
    }

    builder.build()
}
