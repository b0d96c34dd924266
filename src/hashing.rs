use std::fs::File;
use std::path::Path;

use blake3::Hasher;
use memmap2::Mmap;
use serde::{Deserialize, Serialize};

use crate::error::RevError;

/// Shortest fingerprint accepted by the configuration.
pub const MIN_FINGERPRINT_LENGTH: usize = 8;
/// Longest fingerprint the base32 rendering of a BLAKE3 digest can provide.
pub const MAX_FINGERPRINT_LENGTH: usize = 52;
/// Default fingerprint width (matches the usual `name-0123456789.css` style).
pub const DEFAULT_FINGERPRINT_LENGTH: usize = 10;

const BASE32: base32::Alphabet = base32::Alphabet::Rfc4648HexLower { padding: false };

/// How a digest is rendered into the fingerprint token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FingerprintEncoding {
    /// Lowercase hexadecimal (4 bits per character)
    #[default]
    Hex,
    /// Lowercase RFC 4648 base32hex without padding (5 bits per character)
    Base32,
}

impl FingerprintEncoding {
    /// Renders `hash` and truncates it to `length` characters.
    pub fn render(self, hash: &blake3::Hash, length: usize) -> String {
        let mut token = match self {
            FingerprintEncoding::Hex => hash.to_hex().to_string(),
            FingerprintEncoding::Base32 => base32::encode(BASE32, hash.as_bytes()),
        };
        token.truncate(length);
        token
    }
}

/// Computes the BLAKE3 hash of a file using memory mapping and parallel
/// processing.
///
/// Symbolic links and directories are rejected: only regular files in the
/// output tree are revisioned.
///
/// # Errors
///
/// Returns an error if:
/// - The file cannot be read
/// - The path points to a symbolic link or a directory
/// - Memory mapping fails
pub fn hash_file(path: &Path) -> Result<blake3::Hash, RevError> {
    let metadata = std::fs::symlink_metadata(path).map_err(|source| RevError::io(path, source))?;

    if metadata.is_symlink() {
        return Err(RevError::InvalidFileType {
            path: path.to_path_buf(),
            message: "Symbolic links are not supported".to_string(),
        });
    }

    if metadata.is_dir() {
        return Err(RevError::InvalidFileType {
            path: path.to_path_buf(),
            message: "Directories are not supported".to_string(),
        });
    }

    // Mapping a zero-length file fails on some platforms
    if metadata.len() == 0 {
        return Ok(Hasher::new().finalize());
    }

    let file = File::open(path).map_err(|source| RevError::io(path, source))?;

    // SAFETY: the output tree is exclusively owned for the duration of a build,
    // so the file is not truncated while mapped.
    let mmap = unsafe { Mmap::map(&file) }.map_err(|source| RevError::io(path, source))?;

    let mut hasher = Hasher::new();
    hasher.update_rayon(&mmap);

    Ok(hasher.finalize())
}

/// Computes the rendered fingerprint token of a file.
pub fn fingerprint_file(
    path: &Path,
    encoding: FingerprintEncoding,
    length: usize,
) -> Result<String, RevError> {
    Ok(encoding.render(&hash_file(path)?, length))
}

/// Computes the rendered fingerprint token of in-memory content.
pub fn fingerprint_bytes(bytes: &[u8], encoding: FingerprintEncoding, length: usize) -> String {
    encoding.render(&blake3::hash(bytes), length)
}
