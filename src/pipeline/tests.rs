use std::fs;
use std::path::Path;

use tempfile::TempDir;

use super::*;
use crate::hashing::{FingerprintEncoding, fingerprint_bytes};

const MAIN_CSS: &str = "body { color: #222; }";
const UTIL_JS: &str = "export const answer = 42;";
const INDEX_HTML: &str = r#"<link href="/app/main.css"><script src="/app/util.js"></script>"#;

fn quiet() -> Logger {
    Logger::silent()
}

fn fp(content: &str) -> String {
    fingerprint_bytes(content.as_bytes(), FingerprintEncoding::Hex, 10)
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn site() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(root, "index.html", INDEX_HTML);
    write(root, "app/main.css", MAIN_CSS);
    write(root, "app/util.js", UTIL_JS);
    temp_dir
}

fn config(root: &Path) -> RevConfig {
    RevConfig::builder().output_dir(root).build().unwrap()
}

#[test]
fn test_first_build() {
    let temp_dir = site();
    let root = temp_dir.path();
    let config = config(root);

    let report = Pipeline::new(&config, quiet()).run(&BuildMode::Full).unwrap();
    assert_eq!(report.renamed, 2);
    assert_eq!(report.manifest_entries, 2);
    assert_eq!(report.reap.files_removed, 0);
    assert_eq!(report.rewrite.unwrap().files_rewritten, 1);

    let main = format!("app/main-{}.css", fp(MAIN_CSS));
    let util = format!("app/util-{}.js", fp(UTIL_JS));
    assert!(root.join(&main).exists());
    assert!(root.join(&util).exists());
    assert!(!root.join("app/main.css").exists());

    assert_eq!(
        fs::read_to_string(root.join("index.html")).unwrap(),
        format!(r#"<link href="/{main}"><script src="/{util}"></script>"#)
    );

    let manifest = ManifestStore::new(config.manifest_path())
        .load(&quiet())
        .unwrap();
    assert_eq!(manifest.get("app/main.css"), Some(main.as_str()));
    assert_eq!(manifest.get("app/util.js"), Some(util.as_str()));
}

#[test]
fn test_second_build_reaps_superseded_revision() {
    let temp_dir = site();
    let root = temp_dir.path();
    let config = config(root);
    Pipeline::new(&config, quiet()).run(&BuildMode::Full).unwrap();

    // Upstream regenerates the originals, with new script content
    let new_util = "export const answer = 43;";
    write(root, "index.html", INDEX_HTML);
    write(root, "app/main.css", MAIN_CSS);
    write(root, "app/util.js", new_util);

    let report = Pipeline::new(&config, quiet()).run(&BuildMode::Full).unwrap();
    assert_eq!(report.renamed, 1);
    assert_eq!(report.deduplicated, 1);
    assert_eq!(report.reap.files_removed, 1);

    let old_util = format!("app/util-{}.js", fp(UTIL_JS));
    let util = format!("app/util-{}.js", fp(new_util));
    let main = format!("app/main-{}.css", fp(MAIN_CSS));
    assert!(!root.join(&old_util).exists());
    assert!(root.join(&util).exists());
    assert!(root.join(&main).exists());
    assert!(!root.join("app/main.css").exists());
    assert!(!root.join("app/util.js").exists());
    assert_eq!(
        fs::read_to_string(root.join("index.html")).unwrap(),
        format!(r#"<link href="/{main}"><script src="/{util}"></script>"#)
    );
}

#[test]
fn test_rerun_without_changes_is_a_no_op() {
    let temp_dir = site();
    let root = temp_dir.path();
    let config = config(root);
    Pipeline::new(&config, quiet()).run(&BuildMode::Full).unwrap();
    let manifest_before = fs::read(config.manifest_path()).unwrap();

    let report = Pipeline::new(&config, quiet()).run(&BuildMode::Full).unwrap();
    assert_eq!(report.renamed, 0);
    assert_eq!(report.unchanged, 2);
    assert_eq!(report.reap.files_removed, 0);
    assert_eq!(report.rewrite.unwrap().files_rewritten, 0);
    assert_eq!(fs::read(config.manifest_path()).unwrap(), manifest_before);
}

#[test]
fn test_removed_asset_is_reaped() {
    let temp_dir = site();
    let root = temp_dir.path();
    let config = config(root);
    Pipeline::new(&config, quiet()).run(&BuildMode::Full).unwrap();

    // The next upstream build no longer produces the script at all
    fs::remove_file(root.join(format!("app/util-{}.js", fp(UTIL_JS)))).unwrap();
    write(root, "legacy/old.js", "old");
    Pipeline::new(&config, quiet()).run(&BuildMode::Full).unwrap();
    let legacy = format!("legacy/old-{}.js", fp("old"));
    assert!(root.join(&legacy).exists());

    fs::remove_file(root.join(&legacy)).unwrap();
    write(root, "legacy/keep.txt", "keep");
    let report = Pipeline::new(&config, quiet()).run(&BuildMode::Full).unwrap();
    assert_eq!(report.reap.already_missing, 1);

    let manifest = ManifestStore::new(config.manifest_path())
        .load(&quiet())
        .unwrap();
    assert!(!manifest.contains_original("app/util.js"));
    assert!(!manifest.contains_original("legacy/old.js"));
}

#[test]
fn test_dry_run_changes_nothing() {
    let temp_dir = site();
    let root = temp_dir.path();
    let config = RevConfig::builder()
        .output_dir(root)
        .dry_run(true)
        .build()
        .unwrap();

    let report = Pipeline::new(&config, quiet()).run(&BuildMode::Full).unwrap();
    assert!(report.dry_run);
    assert_eq!(report.renamed, 2);
    assert_eq!(report.rewrite.unwrap().files_rewritten, 1);

    assert!(root.join("app/main.css").exists());
    assert!(!config.manifest_path().exists());
    assert_eq!(fs::read_to_string(root.join("index.html")).unwrap(), INDEX_HTML);
}

#[test]
fn test_stamp_skips_rewrite() {
    let temp_dir = site();
    let root = temp_dir.path();
    let config = config(root);

    let report = Pipeline::new(&config, quiet()).stamp(&BuildMode::Full).unwrap();
    assert!(report.rewrite.is_none());
    assert_eq!(fs::read_to_string(root.join("index.html")).unwrap(), INDEX_HTML);

    let pipeline = Pipeline::new(&config, quiet());
    let stats = pipeline.rewrite_from_store().unwrap();
    assert_eq!(stats.files_rewritten, 1);
    assert!(pipeline.verify().unwrap().is_empty());
}

#[test]
fn test_verify_reports_unrewritten_references() {
    let temp_dir = site();
    let root = temp_dir.path();
    let config = config(root);
    let pipeline = Pipeline::new(&config, quiet());
    pipeline.stamp(&BuildMode::Full).unwrap();

    let dangling = pipeline.verify().unwrap();
    let originals: Vec<_> = dangling.iter().map(|d| d.original.as_str()).collect();
    assert_eq!(originals, vec!["app/main.css", "app/util.js"]);
}

#[test]
fn test_append_late_file() {
    let temp_dir = site();
    let root = temp_dir.path();
    write(
        root,
        "index.html",
        r#"<link href="/app/main.css"><script>navigator.serviceWorker.register('/sw.js')</script>"#,
    );
    let config = config(root);
    Pipeline::new(&config, quiet()).run(&BuildMode::Full).unwrap();

    // The service worker is generated after the main pass
    write(root, "sw.js", "self.addEventListener('fetch', () => {});");
    let mode = BuildMode::Append(["sw.js".to_string()].into());
    let report = Pipeline::new(&config, quiet()).run(&mode).unwrap();
    assert_eq!(report.renamed, 1);
    assert_eq!(report.manifest_entries, 3);

    let sw = format!("sw-{}.js", fp("self.addEventListener('fetch', () => {});"));
    assert!(root.join(&sw).exists());
    assert!(!root.join("sw.js").exists());
    assert!(
        fs::read_to_string(root.join("index.html"))
            .unwrap()
            .contains(&format!("register('/{sw}')"))
    );

    let manifest = ManifestStore::new(config.manifest_path())
        .load(&quiet())
        .unwrap();
    assert!(manifest.contains_original("app/main.css"));
    assert!(manifest.contains_original("sw.js"));
}

#[test]
fn test_append_unknown_file() {
    let temp_dir = site();
    let config = config(temp_dir.path());
    let mode = BuildMode::Append(["nope.js".to_string()].into());
    let result = Pipeline::new(&config, quiet()).run(&mode);
    assert!(matches!(result, Err(RevError::ConfigError { .. })));
}

#[test]
fn test_manifest_outside_tree() {
    let temp_dir = site();
    let root = temp_dir.path().join("dist");
    fs::create_dir_all(&root).unwrap();
    fs::rename(temp_dir.path().join("app"), root.join("app")).unwrap();
    let manifest_path = temp_dir.path().join("build/rev-manifest.json");

    let config = RevConfig::builder()
        .output_dir(&root)
        .manifest_path(&manifest_path)
        .build()
        .unwrap();
    Pipeline::new(&config, quiet()).run(&BuildMode::Full).unwrap();

    assert!(manifest_path.exists());
    assert!(!root.join("rev-manifest.json").exists());
}

#[test]
fn test_corrupt_manifest_is_not_fatal() {
    let temp_dir = site();
    let root = temp_dir.path();
    let config = config(root);
    fs::write(config.manifest_path(), "{ not json").unwrap();

    let report = Pipeline::new(&config, quiet()).run(&BuildMode::Full).unwrap();
    assert_eq!(report.renamed, 2);
    assert_eq!(report.reap.files_removed, 0);
}

#[test]
fn test_missing_output_dir() {
    let temp_dir = TempDir::new().unwrap();
    let config = config(&temp_dir.path().join("dist"));
    let result = Pipeline::new(&config, quiet()).run(&BuildMode::Full);
    assert!(matches!(result, Err(RevError::ConfigError { .. })));
}

#[test]
fn test_rebuild_without_manifest_keeps_rewritten_revisions() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    let main_css = "body { background: url(/img/a.png); }";
    write(root, "index.html", r#"<link href="/app/main.css">"#);
    write(root, "app/main.css", main_css);
    write(root, "img/a.png", "png");
    let config = config(root);
    Pipeline::new(&config, quiet()).run(&BuildMode::Full).unwrap();

    let main = format!("app/main-{}.css", fp(main_css));
    let image = format!("img/a-{}.png", fp("png"));
    let rewritten = fs::read_to_string(root.join(&main)).unwrap();
    assert_eq!(rewritten, format!("body {{ background: url(/{image}); }}"));

    // The manifest is lost and upstream regenerates the same originals
    fs::remove_file(config.manifest_path()).unwrap();
    write(root, "index.html", r#"<link href="/app/main.css">"#);
    write(root, "app/main.css", main_css);
    write(root, "img/a.png", "png");

    let pipeline = Pipeline::new(&config, quiet());
    let report = pipeline.run(&BuildMode::Full).unwrap();
    assert_eq!(report.renamed, 0);
    assert_eq!(report.deduplicated, 2);

    let manifest = ManifestStore::new(config.manifest_path())
        .load(&quiet())
        .unwrap();
    assert_eq!(manifest.get("app/main.css"), Some(main.as_str()));
    for (_, revisioned) in manifest.iter() {
        assert!(root.join(revisioned).exists(), "{revisioned} is missing");
    }
    assert_eq!(fs::read_to_string(root.join(&main)).unwrap(), rewritten);
    assert!(!root.join("app/main.css").exists());
    assert!(pipeline.verify().unwrap().is_empty());
}

#[test]
fn test_failed_rewrite_restores_tree() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    let main_css = "body { background: url(/img/a.png); }";
    write(root, "app/main.css", main_css);
    write(root, "img/a.png", "first");
    let config = config(root);
    Pipeline::new(&config, quiet()).run(&BuildMode::Full).unwrap();
    let manifest_before = fs::read(config.manifest_path()).unwrap();
    let old_image = format!("img/a-{}.png", fp("first"));
    let new_image = format!("img/a-{}.png", fp("second"));

    // The new script names `style.css`, which exists both next to it and at
    // the root
    write(root, "img/a.png", "second");
    write(root, "style.css", "a {}");
    write(root, "blog/style.css", "b {}");
    write(root, "blog/app.js", r#"fetch("style.css")"#);

    let result = Pipeline::new(&config, quiet()).run(&BuildMode::Full);
    assert!(matches!(result, Err(RevError::AmbiguousReference { .. })));

    assert!(root.join(&old_image).exists());
    assert!(!root.join(&new_image).exists());
    assert_eq!(fs::read_to_string(root.join("img/a.png")).unwrap(), "second");
    assert!(root.join("style.css").exists());
    assert!(root.join("blog/app.js").exists());
    assert_eq!(fs::read(config.manifest_path()).unwrap(), manifest_before);

    // Once the ambiguity is gone the build goes through
    fs::remove_file(root.join("blog/app.js")).unwrap();
    let pipeline = Pipeline::new(&config, quiet());
    pipeline.run(&BuildMode::Full).unwrap();

    let main = format!("app/main-{}.css", fp(main_css));
    assert_eq!(
        fs::read_to_string(root.join(&main)).unwrap(),
        format!("body {{ background: url(/{new_image}); }}")
    );
    assert!(root.join(&new_image).exists());
    assert!(!root.join(&old_image).exists());
    assert!(pipeline.verify().unwrap().is_empty());
}

#[test]
fn test_document_relative_link_next_to_root_namesake() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(root, "index.html", r#"<link href="style.css">"#);
    write(root, "blog/index.html", r#"<link href="style.css">"#);
    write(root, "style.css", "a {}");
    write(root, "blog/style.css", "b {}");
    let config = config(root);

    Pipeline::new(&config, quiet()).run(&BuildMode::Full).unwrap();

    assert_eq!(
        fs::read_to_string(root.join("index.html")).unwrap(),
        format!(r#"<link href="style-{}.css">"#, fp("a {}"))
    );
    assert_eq!(
        fs::read_to_string(root.join("blog/index.html")).unwrap(),
        format!(r#"<link href="style-{}.css">"#, fp("b {}"))
    );
}
