//! Context cascade
//!
//! A rolling digest of the conversation's flow: recent topics and the
//! emotional current underneath them. When the last few turns pull
//! hard in one direction, the cascade can override the momentary
//! dominant emotion, so the next turn sees the flow, not the blip.
//! Topic threads persist across restarts so a conversation can be
//! picked back up.

use anima_core::{Emotion, JsonStore, Valence};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;

const MAX_DIGESTS: usize = 10;
const FLOW_WINDOW: usize = 3;
const FLOW_INTENSITY_THRESHOLD: f32 = 0.6;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TurnDigest {
    topic: Option<String>,
    emotion: Emotion,
    intensity: f32,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CascadeData {
    threads: Vec<TurnDigest>,
}

pub struct ContextCascade {
    digests: Mutex<VecDeque<TurnDigest>>,
    store: Option<JsonStore>,
}

impl ContextCascade {
    pub fn new() -> Self {
        Self {
            digests: Mutex::new(VecDeque::with_capacity(MAX_DIGESTS)),
            store: None,
        }
    }

    /// A cascade whose topic threads survive restarts.
    pub fn persistent(path: impl AsRef<Path>) -> Self {
        let store = JsonStore::new(path.as_ref().to_path_buf());
        let data: CascadeData = store.load_or_default(|d: &CascadeData| {
            d.threads.iter().all(|t| (0.0..=1.0).contains(&t.intensity))
        });
        let mut digests = VecDeque::with_capacity(MAX_DIGESTS);
        for digest in data.threads.into_iter().take(MAX_DIGESTS) {
            digests.push_back(digest);
        }
        Self {
            digests: Mutex::new(digests),
            store: Some(store),
        }
    }

    /// Record the completed turn into the cascade.
    pub fn update(&self, user_text: &str, emotion: Emotion, intensity: f32) {
        let topic = user_text
            .to_lowercase()
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
            .find(|w| w.len() > 4);

        let mut digests = self.digests.lock().unwrap();
        if digests.len() >= MAX_DIGESTS {
            digests.pop_front();
        }
        digests.push_back(TurnDigest {
            topic,
            emotion,
            intensity,
        });
    }

    /// The flow's emotional override, when the last few turns agree in
    /// valence and carry enough intensity.
    pub fn flow_override(&self) -> Option<(Emotion, f32)> {
        let digests = self.digests.lock().unwrap();
        if digests.len() < FLOW_WINDOW {
            return None;
        }
        let recent: Vec<&TurnDigest> = digests.iter().rev().take(FLOW_WINDOW).collect();
        let first_valence = recent[0].emotion.valence();
        if first_valence == Valence::Neutral {
            return None;
        }
        if !recent.iter().all(|d| d.emotion.valence() == first_valence) {
            return None;
        }
        let avg = recent.iter().map(|d| d.intensity).sum::<f32>() / recent.len() as f32;
        if avg < FLOW_INTENSITY_THRESHOLD {
            return None;
        }
        let strongest = recent
            .iter()
            .max_by(|a, b| a.intensity.total_cmp(&b.intensity))?;
        Some((strongest.emotion, avg))
    }

    /// Short summary for the prompt.
    pub fn summary(&self) -> String {
        let digests = self.digests.lock().unwrap();
        if digests.is_empty() {
            return String::new();
        }
        let topics: Vec<String> = digests
            .iter()
            .rev()
            .filter_map(|d| d.topic.clone())
            .take(4)
            .collect();
        let last = digests.back().map(|d| d.emotion).unwrap_or_default();
        let mut line = format!("Conversation flow: tone has been {}", last);
        if !topics.is_empty() {
            line.push_str(&format!("; recent topics: {}", topics.join(", ")));
        }
        line
    }

    /// Persist topic threads, when this cascade has a backing file.
    pub fn save(&self) -> anyhow::Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let digests = self.digests.lock().unwrap();
        store.save(&CascadeData {
            threads: digests.iter().cloned().collect(),
        })
    }
}

impl Default for ContextCascade {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_flow_with_few_turns() {
        let cascade = ContextCascade::new();
        cascade.update("talking about boats", Emotion::Joy, 0.9);
        assert!(cascade.flow_override().is_none());
    }

    #[test]
    fn test_consistent_flow_overrides() {
        let cascade = ContextCascade::new();
        cascade.update("great news about the project", Emotion::Joy, 0.7);
        cascade.update("everything is working", Emotion::Excitement, 0.8);
        cascade.update("I'm thrilled honestly", Emotion::Joy, 0.7);
        let (emotion, avg) = cascade.flow_override().unwrap();
        assert_eq!(emotion, Emotion::Excitement);
        assert!(avg > 0.6);
    }

    #[test]
    fn test_mixed_valence_no_override() {
        let cascade = ContextCascade::new();
        cascade.update("good", Emotion::Joy, 0.9);
        cascade.update("bad", Emotion::Sadness, 0.9);
        cascade.update("good again", Emotion::Joy, 0.9);
        assert!(cascade.flow_override().is_none());
    }

    #[test]
    fn test_weak_flow_no_override() {
        let cascade = ContextCascade::new();
        for _ in 0..3 {
            cascade.update("mild pleasantries", Emotion::Contentment, 0.2);
        }
        assert!(cascade.flow_override().is_none());
    }

    #[test]
    fn test_summary_mentions_topics() {
        let cascade = ContextCascade::new();
        cascade.update("learning about telescopes", Emotion::Curiosity, 0.5);
        let summary = cascade.summary();
        assert!(summary.contains("telescopes") || summary.contains("learning"));
        assert!(summary.contains("curiosity"));
    }

    #[test]
    fn test_digests_bounded() {
        let cascade = ContextCascade::new();
        for i in 0..30 {
            cascade.update(&format!("topicword{} here", i), Emotion::Peaceful, 0.3);
        }
        assert!(cascade.digests.lock().unwrap().len() <= MAX_DIGESTS);
    }

    #[test]
    fn test_topic_threads_survive_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conversational_memory.json");
        {
            let cascade = ContextCascade::persistent(&path);
            cascade.update("deep talk about telescopes", Emotion::Curiosity, 0.5);
            cascade.save().unwrap();
        }
        let cascade = ContextCascade::persistent(&path);
        assert!(cascade.summary().contains("telescopes"));
    }

    #[test]
    fn test_unbacked_save_is_noop() {
        let cascade = ContextCascade::new();
        cascade.update("anything", Emotion::Joy, 0.5);
        assert!(cascade.save().is_ok());
    }
}
