use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::asset_path::is_contained;
use crate::error::{Result, RevError};


/// The mapping from original relative path to revisioned relative path.
///
/// Both sides are `/`-separated paths relative to the output tree root. Keys
/// are unique by construction; values are kept unique by [`Manifest::insert`]
/// and checked again when a manifest is deserialized.
///
/// The on-disk form is a flat JSON object sorted by key, e.g.
/// `{"app/main.css": "app/main-9f8a1c.css"}`, so two builds over identical
/// content persist byte-identical manifests.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, String>",
    into = "BTreeMap<String, String>"
)]
pub struct Manifest {
    /// Original path to revisioned path, ordered for stable output.
    entries: BTreeMap<String, String>,

    /// Revisioned path back to original path.
    originals: HashMap<String, String>,
}

impl Manifest {
    /// Creates an empty manifest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `original` now lives at `revisioned`.
    ///
    /// Replaces any earlier mapping for `original` and returns the revisioned
    /// path it had.
    ///
    /// # Errors
    ///
    /// Returns [`RevError::RevisionCollision`] when `revisioned` is already
    /// claimed by a different original.
    pub fn insert(
        &mut self,
        original: impl Into<String>,
        revisioned: impl Into<String>,
    ) -> Result<Option<String>> {
        let original = original.into();
        let revisioned = revisioned.into();

        if let Some(owner) = self.originals.get(&revisioned)
            && owner != &original
        {
            return Err(RevError::RevisionCollision {
                revisioned,
                first: owner.clone(),
                second: original,
            });
        }

        let previous = self.entries.insert(original.clone(), revisioned.clone());
        if let Some(old) = previous.as_ref() {
            self.originals.remove(old);
        }
        self.originals.insert(revisioned, original);
        Ok(previous)
    }

    /// Revisioned path of `original`, if it is tracked.
    pub fn get(&self, original: &str) -> Option<&str> {
        self.entries.get(original).map(String::as_str)
    }

    /// Like [`Manifest::get`], but also borrows the stored key.
    pub fn get_key_value(&self, original: &str) -> Option<(&str, &str)> {
        self.entries
            .get_key_value(original)
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Original path that was revisioned to `revisioned`, if any.
    pub fn original_of(&self, revisioned: &str) -> Option<&str> {
        self.originals.get(revisioned).map(String::as_str)
    }

    pub fn contains_original(&self, original: &str) -> bool {
        self.entries.contains_key(original)
    }

    pub fn contains_revisioned(&self, revisioned: &str) -> bool {
        self.originals.contains_key(revisioned)
    }

    /// Iterates `(original, revisioned)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Iterates revisioned paths in key order.
    pub fn revisioned_paths(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(String::as_str)
    }

    /// Revisioned paths of `previous` that this manifest no longer maps to.
    ///
    /// This covers both superseded content (same key, new fingerprint) and
    /// removed assets (key gone). A value still present here is never stale,
    /// even if it moved to a different key.
    pub fn stale_since(&self, previous: &Manifest) -> Vec<String> {
        previous
            .revisioned_paths()
            .filter(|value| !self.contains_revisioned(value))
            .map(str::to_string)
            .collect()
    }

    /// Returns the number of tracked assets.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no assets are tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TryFrom<BTreeMap<String, String>> for Manifest {
    type Error = String;

    fn try_from(entries: BTreeMap<String, String>) -> std::result::Result<Self, Self::Error> {
        let mut manifest = Manifest::new();
        for (original, revisioned) in entries {
            if !is_contained(&original) || !is_contained(&revisioned) {
                return Err(format!(
                    "entry '{original}' -> '{revisioned}' is not a relative path inside the output \
                     tree"
                ));
            }
            manifest
                .insert(original, revisioned)
                .map_err(|err| err.to_string())?;
        }
        Ok(manifest)
    }
}

impl From<Manifest> for BTreeMap<String, String> {
    fn from(manifest: Manifest) -> Self {
        manifest.entries
    }
}
