//! Learned user preferences
//!
//! A slow-accumulating model of how the user likes to be spoken to:
//! communication style, response patterns, topic interests, stray
//! facts, and when they're usually around.

use anima_core::JsonStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

const MAX_ACTIVE_HOUR_SAMPLES: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunicationPreferences {
    pub formality: String,
    pub verbosity: String,
    pub humor: String,
    pub technical_depth: String,
}

impl Default for CommunicationPreferences {
    fn default() -> Self {
        Self {
            formality: "balanced".into(),
            verbosity: "balanced".into(),
            humor: "moderate".into(),
            technical_depth: "moderate".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponsePatterns {
    pub likes_humor: bool,
    pub prefers_directness: bool,
    pub wants_explanations: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreferencesData {
    pub communication_preferences: CommunicationPreferences,
    pub response_patterns: ResponsePatterns,
    /// topic → accumulated engagement score.
    pub topic_interests: HashMap<String, f32>,
    /// arbitrary key → value facts ("birthday" → "march 3rd").
    pub learned_facts: HashMap<String, String>,
    /// Raw hour-of-day samples from interactions.
    pub active_hours: Vec<u32>,
}

pub struct LearnedPreferences {
    data: Mutex<PreferencesData>,
    store: JsonStore,
}

impl LearnedPreferences {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let store = JsonStore::new(path.as_ref().to_path_buf());
        let data = store.load_or_default(|d: &PreferencesData| {
            d.topic_interests.values().all(|v| v.is_finite())
        });
        Self {
            data: Mutex::new(data),
            store,
        }
    }

    pub fn record_topic_interest(&self, topic: &str, engagement: f32) {
        let mut data = self.data.lock().unwrap();
        let entry = data.topic_interests.entry(topic.to_lowercase()).or_insert(0.0);
        *entry = (*entry + engagement).clamp(0.0, 100.0);
        self.persist(&data);
    }

    pub fn learn_fact(&self, key: &str, value: &str) {
        let mut data = self.data.lock().unwrap();
        data.learned_facts
            .insert(key.to_lowercase(), value.to_string());
        self.persist(&data);
    }

    pub fn fact(&self, key: &str) -> Option<String> {
        self.data
            .lock()
            .unwrap()
            .learned_facts
            .get(&key.to_lowercase())
            .cloned()
    }

    pub fn record_active_hour(&self, hour: u32) {
        let mut data = self.data.lock().unwrap();
        data.active_hours.push(hour % 24);
        if data.active_hours.len() > MAX_ACTIVE_HOUR_SAMPLES {
            let drop = data.active_hours.len() - MAX_ACTIVE_HOUR_SAMPLES;
            data.active_hours.drain(..drop);
        }
        self.persist(&data);
    }

    /// Is this hour one the user has historically been active in?
    /// Requires at least three samples for the hour.
    pub fn is_typically_active(&self, hour: u32) -> bool {
        let data = self.data.lock().unwrap();
        data.active_hours.iter().filter(|h| **h == hour % 24).count() >= 3
    }

    pub fn top_interests(&self, count: usize) -> Vec<(String, f32)> {
        let data = self.data.lock().unwrap();
        let mut interests: Vec<(String, f32)> = data
            .topic_interests
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        interests.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        interests.truncate(count);
        interests
    }

    pub fn set_response_patterns(&self, patterns: ResponsePatterns) {
        let mut data = self.data.lock().unwrap();
        data.response_patterns = patterns;
        self.persist(&data);
    }

    /// Style directive derived from what has been learned, injected
    /// into the system prompt.
    pub fn adapted_style(&self) -> String {
        let data = self.data.lock().unwrap();
        let mut parts = Vec::new();
        if data.response_patterns.prefers_directness {
            parts.push("be direct and skip preamble");
        }
        if data.response_patterns.likes_humor {
            parts.push("light humor is welcome");
        }
        if data.response_patterns.wants_explanations {
            parts.push("explain reasoning when it matters");
        }
        match data.communication_preferences.verbosity.as_str() {
            "brief" => parts.push("keep replies short"),
            "detailed" => parts.push("detail is appreciated"),
            _ => {}
        }
        if parts.is_empty() {
            String::new()
        } else {
            format!("Adapted style: {}.", parts.join("; "))
        }
    }

    fn persist(&self, data: &PreferencesData) {
        if let Err(e) = self.store.save(data) {
            tracing::error!("failed to save learned preferences: {}", e);
        }
    }

    /// Summary block for the prompt: who this user is, as learned.
    pub fn summary_for_prompt(&self) -> String {
        let data = self.data.lock().unwrap();
        let mut lines = Vec::new();

        let mut interests: Vec<(&String, &f32)> = data.topic_interests.iter().collect();
        interests.sort_by(|a, b| b.1.total_cmp(a.1).then(a.0.cmp(b.0)));
        if !interests.is_empty() {
            let names: Vec<&str> = interests.iter().take(5).map(|(k, _)| k.as_str()).collect();
            lines.push(format!("User interests: {}", names.join(", ")));
        }
        if !data.learned_facts.is_empty() {
            let mut facts: Vec<(&String, &String)> = data.learned_facts.iter().collect();
            facts.sort();
            let rendered: Vec<String> = facts
                .iter()
                .take(5)
                .map(|(k, v)| format!("{}: {}", k, v))
                .collect();
            lines.push(format!("Known about user: {}", rendered.join("; ")));
        }
        lines.join("\n")
    }
}
