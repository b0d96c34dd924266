use std::fs;

use tempfile::TempDir;

use super::*;

fn quiet() -> Logger {
    Logger::new(0, true)
}

fn sample_manifest() -> Manifest {
    let mut manifest = Manifest::new();
    manifest
        .insert("app/main.css", "app/main-9f8a1c.css")
        .unwrap();
    manifest.insert("app/util.js", "app/util-b2e701.js").unwrap();
    manifest
}

#[test]
fn test_save_and_load_manifest() {
    let temp_dir = TempDir::new().unwrap();
    let store = ManifestStore::new(temp_dir.path().join("rev-manifest.json"));

    store.save(&sample_manifest()).unwrap();
    assert!(store.path().exists());

    let loaded = store.load(&quiet()).unwrap();
    assert_eq!(loaded, sample_manifest());
}

#[test]
fn test_saved_format() {
    let temp_dir = TempDir::new().unwrap();
    let store = ManifestStore::new(temp_dir.path().join("rev-manifest.json"));

    let mut manifest = Manifest::new();
    manifest
        .insert("app/main.css", "app/main-9f8a1c.css")
        .unwrap();
    store.save(&manifest).unwrap();

    let text = fs::read_to_string(store.path()).unwrap();
    assert_eq!(text, "{\n  \"app/main.css\": \"app/main-9f8a1c.css\"\n}\n");
}

#[test]
fn test_save_is_byte_stable() {
    let temp_dir = TempDir::new().unwrap();
    let store = ManifestStore::new(temp_dir.path().join("rev-manifest.json"));

    store.save(&sample_manifest()).unwrap();
    let first = fs::read(store.path()).unwrap();
    store.save(&sample_manifest()).unwrap();
    let second = fs::read(store.path()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_load_nonexistent_manifest() {
    let temp_dir = TempDir::new().unwrap();
    let store = ManifestStore::new(temp_dir.path().join("nope.json"));

    let manifest = store.load(&quiet()).unwrap();
    assert!(manifest.is_empty());
}

#[test]
fn test_load_empty_file() {
    let temp_dir = TempDir::new().unwrap();
    let store = ManifestStore::new(temp_dir.path().join("rev-manifest.json"));
    fs::write(store.path(), "  \n").unwrap();

    assert!(store.load(&quiet()).unwrap().is_empty());
}

#[test]
fn test_corrupt_manifest_degrades_to_empty() {
    let temp_dir = TempDir::new().unwrap();
    let store = ManifestStore::new(temp_dir.path().join("rev-manifest.json"));
    fs::write(store.path(), b"{ this is not json").unwrap();

    assert!(matches!(
        store.load_inner(),
        Err(RevError::ManifestCorrupt { .. })
    ));

    let manifest = store.load(&quiet()).unwrap();
    assert!(manifest.is_empty());

    // The file is left for the next save to overwrite
    assert!(store.path().exists());
}

#[test]
fn test_manifest_with_duplicate_values_is_corrupt() {
    let temp_dir = TempDir::new().unwrap();
    let store = ManifestStore::new(temp_dir.path().join("rev-manifest.json"));
    fs::write(store.path(), r#"{"a.css": "x.css", "b.css": "x.css"}"#).unwrap();

    assert!(matches!(
        store.load_inner(),
        Err(RevError::ManifestCorrupt { .. })
    ));
}

#[test]
fn test_atomic_save() {
    let temp_dir = TempDir::new().unwrap();
    let store = ManifestStore::new(temp_dir.path().join("nested/dir/rev-manifest.json"));

    store.save(&Manifest::new()).unwrap();

    assert!(!store.temp_path().exists());
    assert!(store.path().exists());
}

#[test]
fn test_clean_manifest() {
    let temp_dir = TempDir::new().unwrap();
    let store = ManifestStore::new(temp_dir.path().join("rev-manifest.json"));

    store.save(&sample_manifest()).unwrap();
    assert!(store.clean().unwrap());
    assert!(!store.path().exists());

    // Cleaning a missing file should not error
    assert!(!store.clean().unwrap());
}
