//! Console output for the build stages.
//!
//! Everything goes to stderr so stdout stays free for callers that pipe the
//! tool. `--quiet` wins over any `-v` count.

use std::fmt::Display;

#[derive(Clone, Copy, Debug)]
pub struct Logger {
    verbose: u8,
    quiet: bool,
}

impl Logger {
    pub fn new(verbose: u8, quiet: bool) -> Self {
        Self {
            verbose: if quiet { 0 } else { verbose },
            quiet,
        }
    }

    /// A logger that prints nothing.
    pub fn silent() -> Self {
        Self::new(0, true)
    }

    pub fn info(&self, message: impl Display) {
        if !self.quiet {
            eprintln!("{message}");
        }
    }

    /// Prints `message` when at least `level` `-v` flags were given.
    pub fn verbose(&self, level: u8, message: impl Display) {
        if !self.quiet && self.verbose >= level {
            eprintln!("{message}");
        }
    }

    pub fn warn(&self, message: impl Display) {
        if !self.quiet {
            eprintln!("Warning: {message}");
        }
    }

    pub fn quiet(&self) -> bool {
        self.quiet
    }

    pub fn level(&self) -> u8 {
        self.verbose
    }
}

/// `"1 file"`, `"3 files"`.
pub(crate) fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}
