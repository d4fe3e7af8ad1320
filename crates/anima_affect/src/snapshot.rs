//! Emotional snapshot persistence
//!
//! The full affective state is serialized to `data/emotional_state.json`
//! on shutdown, on a periodic interval, and when entering sleep. The
//! restore path (with offline decay and the 24 h faded-echo rule) lives
//! in `AffectiveSystem::restore`.

use crate::system::{ActiveEmotion, Mood};
use anima_core::JsonStore;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmotionalSnapshot {
    pub dominant: Option<ActiveEmotion>,
    pub active_emotions: Vec<ActiveEmotion>,
    #[serde(default)]
    pub mood: Mood,
    /// Unix timestamp seconds; 0 means "never saved".
    pub saved_at: i64,
}

pub struct SnapshotStore {
    store: JsonStore,
}

impl SnapshotStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            store: JsonStore::new(path.as_ref().to_path_buf()),
        }
    }

    pub fn save(&self, snapshot: &EmotionalSnapshot) -> Result<()> {
        self.store.save(snapshot)
    }

    /// Load the saved snapshot. Missing or corrupt files (which are
    /// quarantined to `.bak`) yield `None` and a fresh emotional start.
    pub fn load(&self) -> Option<EmotionalSnapshot> {
        let snapshot: EmotionalSnapshot = self.store.load_or_default(|s: &EmotionalSnapshot| {
            s.saved_at >= 0
                && s.active_emotions
                    .iter()
                    .all(|a| (0.0..=1.0).contains(&a.intensity))
        });
        if snapshot.saved_at == 0 {
            None
        } else {
            Some(snapshot)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anima_core::Emotion;

    fn sample() -> EmotionalSnapshot {
        EmotionalSnapshot {
            dominant: Some(ActiveEmotion {
                emotion: Emotion::Curiosity,
                intensity: 0.7,
                cause: "testing".into(),
                generated_at: 1_700_000_000,
            }),
            active_emotions: vec![ActiveEmotion {
                emotion: Emotion::Curiosity,
                intensity: 0.7,
                cause: "testing".into(),
                generated_at: 1_700_000_000,
            }],
            mood: Mood::default(),
            saved_at: 1_700_000_100,
        }
    }

    #[test]
    fn test_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("emotional_state.json"));
        store.save(&sample()).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.saved_at, 1_700_000_100);
        assert_eq!(loaded.active_emotions.len(), 1);
        assert_eq!(loaded.dominant.unwrap().emotion, Emotion::Curiosity);
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("emotional_state.json"));
        assert!(store.load().is_none());
    }

    #[test]
    fn test_corrupt_file_is_none_and_backed_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("emotional_state.json");
        std::fs::write(&path, "{{{{").unwrap();
        let store = SnapshotStore::new(&path);
        assert!(store.load().is_none());
        assert!(path.with_extension("json.bak").exists());
    }

    #[test]
    fn test_out_of_range_intensity_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("emotional_state.json");
        let mut bad = sample();
        bad.active_emotions[0].intensity = 7.0;
        std::fs::write(&path, serde_json::to_string(&bad).unwrap()).unwrap();
        let store = SnapshotStore::new(&path);
        assert!(store.load().is_none());
    }
}
