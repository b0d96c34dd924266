use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use asset_rev::cli::{Cli, Commands, RevisionArgs, RewriteArgs};
use asset_rev::commands::execute_with_dir;
use asset_rev::error::Result;
use asset_rev::hashing::{DEFAULT_FINGERPRINT_LENGTH, FingerprintEncoding, fingerprint_bytes};
use asset_rev::logging::Logger;
use asset_rev::manifest::Manifest;
use asset_rev::store::ManifestStore;
use assert_fs::TempDir;
use assert_fs::prelude::*;
use walkdir::WalkDir;

pub const MAIN_CSS: &str = "body { background: url(../img/logo.png); }";
pub const LOGO_PNG: &[u8] = b"\x89PNG\r\n\x1a\nlogo";
pub const APP_JS: &str = "import('./chunk.js');";
pub const CHUNK_JS: &str = "export default 1;";
pub const INDEX_HTML: &str = r#"<!doctype html>
<link rel="stylesheet" href="/css/main.css">
<script src="/js/app.js"></script>
<a href="https://example.com/css/main.css">mirror</a>"#;

/// A freshly generated site in `<temp>/dist`.
pub fn site() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let dist = temp_dir.child("dist");
    dist.child("index.html").write_str(INDEX_HTML).unwrap();
    dist.child("css/main.css").write_str(MAIN_CSS).unwrap();
    dist.child("img/logo.png").write_binary(LOGO_PNG).unwrap();
    dist.child("js/app.js").write_str(APP_JS).unwrap();
    dist.child("js/chunk.js").write_str(CHUNK_JS).unwrap();
    temp_dir
}

/// Rewrites the originals as the site generator would on its next run.
pub fn regenerate(temp_dir: &TempDir, files: &[(&str, &[u8])]) {
    let dist = temp_dir.child("dist");
    for (rel, content) in files {
        dist.child(rel).write_binary(content).unwrap();
    }
}

pub fn fp(content: impl AsRef<[u8]>) -> String {
    fingerprint_bytes(
        content.as_ref(),
        FingerprintEncoding::Hex,
        DEFAULT_FINGERPRINT_LENGTH,
    )
}

pub fn build() -> Commands {
    Commands::Build {
        revision: RevisionArgs::default(),
        rewrite: RewriteArgs::default(),
        dry_run: false,
    }
}

pub fn verify() -> Commands {
    Commands::Verify {
        rewrite: RewriteArgs::default(),
        fingerprint_length: None,
    }
}

/// Runs `command` from `working_dir` with quiet output.
pub fn run_in(working_dir: &Path, command: Commands) -> Result<()> {
    let cli = Cli::builder().quiet(true).command(command).build()?;
    execute_with_dir(&cli, Some(working_dir))
}

pub fn run(temp_dir: &TempDir, command: Commands) -> Result<()> {
    run_in(temp_dir.path(), command)
}

pub fn manifest(temp_dir: &TempDir) -> Manifest {
    ManifestStore::new(temp_dir.path().join("dist/rev-manifest.json"))
        .load(&Logger::silent())
        .unwrap()
}

/// Every file and directory under `<temp>/dist` with its bytes (empty for
/// directories).
pub fn snapshot(temp_dir: &TempDir) -> BTreeMap<String, Vec<u8>> {
    let dist = temp_dir.path().join("dist");
    WalkDir::new(&dist)
        .min_depth(1)
        .into_iter()
        .map(|entry| {
            let entry = entry.unwrap();
            let rel = entry
                .path()
                .strip_prefix(&dist)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/");
            let content = if entry.file_type().is_file() {
                fs::read(entry.path()).unwrap()
            } else {
                Vec::new()
            };
            (rel, content)
        })
        .collect()
}
