//! JSON state files with corruption recovery
//!
//! Every persistent subsystem (temporal state, relationship, goals,
//! preferences, knowledge graph, emotional snapshots) stores one JSON
//! file under `data/`. The rule is always the same: a corrupt or invalid
//! file is renamed to `<name>.bak` and replaced with defaults. State
//! loss is survivable; a crash loop on startup is not.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored value, or return `T::default()` when the file is
    /// missing. A file that exists but fails to parse, or fails the
    /// `valid` check, is renamed aside with a `.bak` suffix first.
    pub fn load_or_default<T>(&self, valid: impl Fn(&T) -> bool) -> T
    where
        T: DeserializeOwned + Default,
    {
        if !self.path.exists() {
            return T::default();
        }

        match std::fs::read_to_string(&self.path) {
            Ok(raw) => match serde_json::from_str::<T>(&raw) {
                Ok(value) if valid(&value) => value,
                Ok(_) => {
                    tracing::warn!(
                        "state file {} failed validation, recreating",
                        self.path.display()
                    );
                    self.quarantine();
                    T::default()
                }
                Err(e) => {
                    tracing::warn!(
                        "state file {} corrupt ({}), recreating",
                        self.path.display(),
                        e
                    );
                    self.quarantine();
                    T::default()
                }
            },
            Err(e) => {
                tracing::error!("cannot read {}: {}", self.path.display(), e);
                T::default()
            }
        }
    }

    /// Persist via temp file + rename so a crash mid-write never leaves a
    /// half-written state file behind.
    pub fn save<T: Serialize>(&self, value: &T) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(value).context("serializing state")?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("renaming into {}", self.path.display()))?;
        Ok(())
    }

    fn quarantine(&self) {
        let backup = self.path.with_extension("json.bak");
        if let Err(e) = std::fs::rename(&self.path, &backup) {
            tracing::error!(
                "failed to back up corrupt state file {}: {}",
                self.path.display(),
                e
            );
            // Last resort: remove it so the next save can succeed.
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Demo {
        count: u64,
        name: String,
    }

    #[test]
    fn test_missing_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("demo.json"));
        let loaded: Demo = store.load_or_default(|_| true);
        assert_eq!(loaded, Demo::default());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("demo.json"));
        let value = Demo {
            count: 42,
            name: "anima".into(),
        };
        store.save(&value).unwrap();
        let loaded: Demo = store.load_or_default(|_| true);
        assert_eq!(loaded, value);
    }

    #[test]
    fn test_corrupt_file_renamed_to_bak() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo.json");
        std::fs::write(&path, "{not json at all").unwrap();

        let store = JsonStore::new(&path);
        let loaded: Demo = store.load_or_default(|_| true);
        assert_eq!(loaded, Demo::default());
        assert!(path.with_extension("json.bak").exists());
        assert!(!path.exists());
    }

    #[test]
    fn test_invalid_file_renamed_to_bak() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo.json");
        std::fs::write(&path, r#"{"count": 7, "name": "x"}"#).unwrap();

        let store = JsonStore::new(&path);
        // Validation rejects everything, so the parsed file counts as corrupt.
        let loaded: Demo = store.load_or_default(|_| false);
        assert_eq!(loaded, Demo::default());
        assert!(path.with_extension("json.bak").exists());
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("nested/deeper/demo.json"));
        store.save(&Demo::default()).unwrap();
        assert!(store.path().exists());
    }
}
