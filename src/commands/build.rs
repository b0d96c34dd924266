//! Build and stamp commands.

use crate::config::RevConfig;
use crate::error::{Result, RevError};
use crate::logging::Logger;
use crate::pipeline::{BuildMode, BuildReport, Pipeline};

pub struct Build<'a> {
    config: &'a RevConfig,
    log: Logger,
    rewrite: bool,
}

pub struct BuildBuilder<'a> {
    config: Option<&'a RevConfig>,
    log: Logger,
    rewrite: bool,
}

impl Default for BuildBuilder<'_> {
    fn default() -> Self {
        Self {
            config: None,
            log: Logger::new(0, false),
            rewrite: true,
        }
    }
}

impl<'a> Build<'a> {
    pub fn builder() -> BuildBuilder<'a> {
        BuildBuilder::new()
    }

    /// Run the pipeline over the whole output tree and print the summary.
    pub fn run(self) -> Result<()> {
        self.report().map(|report| report.print(&self.log))
    }

    /// Run the pipeline and return its summary without printing it.
    pub fn report(&self) -> Result<BuildReport> {
        if self.config.dry_run() {
            self.log.info("Dry run: nothing will be renamed, deleted or rewritten");
        }
        self.log.verbose(
            1,
            format!(
                "Revisioning {} (manifest: {})",
                self.config.output_dir().display(),
                self.config.manifest_path().display()
            ),
        );

        let pipeline = Pipeline::new(self.config, self.log);
        if self.rewrite {
            pipeline.run(&BuildMode::Full)
        } else {
            pipeline.stamp(&BuildMode::Full)
        }
    }
}

impl<'a> BuildBuilder<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: &'a RevConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn log(mut self, log: Logger) -> Self {
        self.log = log;
        self
    }

    /// Whether references are rewritten after the manifest is saved
    pub fn rewrite(mut self, rewrite: bool) -> Self {
        self.rewrite = rewrite;
        self
    }

    pub fn build(self) -> Result<Build<'a>> {
        Ok(Build {
            config: self.config.ok_or_else(|| RevError::ConfigError {
                message: "config is required".to_string(),
            })?,
            log: self.log,
            rewrite: self.rewrite,
        })
    }
}
