use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Result, RevError};
use crate::logging::Logger;
use crate::manifest::Manifest;

#[cfg(test)]
mod tests;

/// Default file name of the manifest inside the output directory.
pub const DEFAULT_MANIFEST_NAME: &str = "rev-manifest.json";

/// Durable home of the manifest between builds.
///
/// The store is the only state asset-rev keeps across runs: it is read at the
/// start of a build (to find stale revisions) and overwritten at the end.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    path: PathBuf,
}

impl ManifestStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the manifest file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Location of the scratch file used while saving.
    pub fn temp_path(&self) -> PathBuf {
        self.path.with_extension("tmp")
    }

    /// Loads the manifest written by the previous build.
    ///
    /// A missing or empty file yields an empty manifest. A file that exists
    /// but cannot be parsed is reported as a warning and treated as absent:
    /// the worst consequence is that some stale files survive one more build.
    ///
    /// # Errors
    ///
    /// Returns an error only if the file exists but cannot be read.
    pub fn load(&self, log: &Logger) -> Result<Manifest> {
        match self.load_inner() {
            Ok(manifest) => Ok(manifest),
            Err(RevError::ManifestCorrupt { path, message }) => {
                log.warn(format!(
                    "ignoring unreadable manifest '{}' ({message}); stale files from the \
                     previous build will not be removed",
                    path.display()
                ));
                Ok(Manifest::new())
            }
            Err(other) => Err(other),
        }
    }

    /// Loads without recovery, surfacing [`RevError::ManifestCorrupt`].
    pub(crate) fn load_inner(&self) -> Result<Manifest> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Manifest::new());
            }
            Err(source) => return Err(RevError::io(&self.path, source)),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Manifest::new());
        }

        serde_json::from_slice(&bytes).map_err(|err| RevError::ManifestCorrupt {
            path: self.path.clone(),
            message: err.to_string(),
        })
    }

    /// Saves the manifest of the current build atomically.
    ///
    /// The manifest is written to a temporary sibling, flushed, and renamed
    /// over the previous one, so a crash never leaves a truncated manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The parent directory cannot be created
    /// - The manifest cannot be serialized
    /// - The file cannot be written to disk
    pub fn save(&self, manifest: &Manifest) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| RevError::io(parent, source))?;
        }

        let mut bytes =
            serde_json::to_vec_pretty(manifest).map_err(RevError::ManifestSerialization)?;
        bytes.push(b'\n');

        let temp_path = self.temp_path();
        let mut temp_file =
            File::create(&temp_path).map_err(|source| RevError::io(&temp_path, source))?;

        temp_file
            .write_all(&bytes)
            .map_err(|source| RevError::io(&temp_path, source))?;

        temp_file
            .sync_all()
            .map_err(|source| RevError::io(&temp_path, source))?;

        fs::rename(&temp_path, &self.path).map_err(|source| RevError::io(&self.path, source))?;

        Ok(())
    }

    /// Removes the manifest file.
    ///
    /// Idempotent: returns `Ok(false)` when there was nothing to remove.
    pub fn clean(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(RevError::io(&self.path, source)),
        }
    }
}
