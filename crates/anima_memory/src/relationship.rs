//! Relationship model
//!
//! Tracks rapport, trust, and shared history with the human principal.
//! Depth grows from a score over interaction count, rapport and trust;
//! milestones mark round-number moments.

use anima_core::{JsonStore, Valence};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;

const MAX_INTERACTION_HISTORY: usize = 200;
const MAX_SHARED_EXPERIENCES: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipDepth {
    Stranger,
    Acquaintance,
    Friend,
    CloseFriend,
    Companion,
}

impl RelationshipDepth {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipDepth::Stranger => "stranger",
            RelationshipDepth::Acquaintance => "acquaintance",
            RelationshipDepth::Friend => "friend",
            RelationshipDepth::CloseFriend => "close_friend",
            RelationshipDepth::Companion => "companion",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub timestamp: i64,
    pub quality: f32,
    pub topics: Vec<String>,
    pub valence: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipMilestone {
    pub milestone: String,
    pub reached_at: i64,
    pub interaction_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedExperience {
    pub timestamp: i64,
    pub experience: String,
    pub significance: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipData {
    pub relationship_start: i64,
    pub total_interactions: u64,
    /// Interactions with quality >= 7.
    pub quality_interactions: u64,
    /// 1-10 scale.
    pub rapport_level: f32,
    /// 1-10 scale.
    pub trust_level: f32,
    pub shared_experiences: Vec<SharedExperience>,
    pub milestones: Vec<RelationshipMilestone>,
    pub conversation_streak: u64,
    pub last_interaction: Option<i64>,
    pub interaction_history: Vec<InteractionRecord>,
}

impl Default for RelationshipData {
    fn default() -> Self {
        Self {
            relationship_start: 0,
            total_interactions: 0,
            quality_interactions: 0,
            rapport_level: 1.0,
            trust_level: 5.0,
            shared_experiences: Vec::new(),
            milestones: Vec::new(),
            conversation_streak: 0,
            last_interaction: None,
            interaction_history: Vec::new(),
        }
    }
}

pub struct RelationshipTracker {
    data: Mutex<RelationshipData>,
    store: JsonStore,
}

impl RelationshipTracker {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let store = JsonStore::new(path.as_ref().to_path_buf());
        let mut data: RelationshipData = store.load_or_default(|d: &RelationshipData| {
            (1.0..=10.0).contains(&d.rapport_level) && (1.0..=10.0).contains(&d.trust_level)
        });
        if data.relationship_start == 0 {
            data.relationship_start = chrono::Utc::now().timestamp();
        }
        Self {
            data: Mutex::new(data),
            store,
        }
    }

    /// Record one interaction with its conversation-quality score
    /// (0-10) and emotional valence.
    pub fn record_interaction(&self, quality: f32, topics: Vec<String>, valence: Valence) {
        let now = chrono::Utc::now().timestamp();
        let mut data = self.data.lock().unwrap();

        data.total_interactions += 1;
        if quality >= 7.0 {
            data.quality_interactions += 1;
        }

        // Rapport moves slowly: good interactions build it, poor ones
        // erode it at half the rate.
        if quality >= 7.0 && valence == Valence::Positive {
            data.rapport_level = (data.rapport_level + 0.1).min(10.0);
        } else if quality < 5.0 {
            data.rapport_level = (data.rapport_level - 0.05).max(1.0);
        }

        if quality >= 8.0 {
            data.trust_level = (data.trust_level + 0.1).min(10.0);
        } else if quality < 4.0 {
            data.trust_level = (data.trust_level - 0.05).max(1.0);
        }

        // Streak: consecutive interactions within 24h.
        match data.last_interaction {
            Some(last) if now - last < 86_400 => data.conversation_streak += 1,
            _ => data.conversation_streak = 1,
        }

        data.interaction_history.push(InteractionRecord {
            timestamp: now,
            quality,
            topics,
            valence: match valence {
                Valence::Positive => "positive".into(),
                Valence::Negative => "negative".into(),
                Valence::Neutral => "neutral".into(),
            },
        });
        if data.interaction_history.len() > MAX_INTERACTION_HISTORY {
            let drop = data.interaction_history.len() - MAX_INTERACTION_HISTORY;
            data.interaction_history.drain(..drop);
        }

        data.last_interaction = Some(now);
        check_milestones(&mut data, now);

        if let Err(e) = self.store.save(&*data) {
            tracing::error!("failed to save relationship data: {}", e);
        }
    }

    pub fn add_shared_experience(&self, experience: &str, significance: f32) {
        let mut data = self.data.lock().unwrap();
        data.shared_experiences.push(SharedExperience {
            timestamp: chrono::Utc::now().timestamp(),
            experience: experience.to_string(),
            significance,
        });
        if data.shared_experiences.len() > MAX_SHARED_EXPERIENCES {
            data.shared_experiences
                .sort_by(|a, b| b.significance.total_cmp(&a.significance));
            data.shared_experiences.truncate(MAX_SHARED_EXPERIENCES);
        }
        if let Err(e) = self.store.save(&*data) {
            tracing::error!("failed to save relationship data: {}", e);
        }
    }

    pub fn depth(&self) -> RelationshipDepth {
        let data = self.data.lock().unwrap();
        depth_of(&data)
    }

    pub fn rapport(&self) -> f32 {
        self.data.lock().unwrap().rapport_level
    }

    pub fn trust(&self) -> f32 {
        self.data.lock().unwrap().trust_level
    }

    pub fn total_interactions(&self) -> u64 {
        self.data.lock().unwrap().total_interactions
    }

    pub fn streak(&self) -> u64 {
        self.data.lock().unwrap().conversation_streak
    }

    /// Normalized 0-1 quality signal for emotion context modifiers.
    pub fn quality_signal(&self) -> f32 {
        let data = self.data.lock().unwrap();
        ((data.rapport_level + data.trust_level) / 20.0).clamp(0.0, 1.0)
    }

    pub fn hours_since_last_interaction(&self) -> f32 {
        let data = self.data.lock().unwrap();
        match data.last_interaction {
            Some(last) => (chrono::Utc::now().timestamp() - last).max(0) as f32 / 3600.0,
            None => 999.0,
        }
    }

    /// Should the agent proactively reach out? Deeper relationships
    /// reach out sooner.
    pub fn should_reach_out(&self) -> bool {
        let hours = self.hours_since_last_interaction();
        if hours < 8.0 {
            return false;
        }
        match self.depth() {
            RelationshipDepth::Companion => hours > 24.0,
            RelationshipDepth::CloseFriend => hours > 48.0,
            RelationshipDepth::Friend => hours > 72.0,
            _ => false,
        }
    }

    pub fn recent_milestones(&self, count: usize) -> Vec<RelationshipMilestone> {
        let data = self.data.lock().unwrap();
        data.milestones.iter().rev().take(count).cloned().collect()
    }

    /// One-line summary for the prompt.
    pub fn summary_for_prompt(&self) -> String {
        let data = self.data.lock().unwrap();
        format!(
            "Relationship: {} (rapport {:.1}/10, trust {:.1}/10, {} conversations, streak {})",
            depth_of(&data).as_str(),
            data.rapport_level,
            data.trust_level,
            data.total_interactions,
            data.conversation_streak,
        )
    }
}

fn depth_of(data: &RelationshipData) -> RelationshipDepth {
    let score =
        data.total_interactions as f32 * 0.3 + data.rapport_level * 5.0 + data.trust_level * 5.0;
    if score < 50.0 {
        RelationshipDepth::Stranger
    } else if score < 150.0 {
        RelationshipDepth::Acquaintance
    } else if score < 300.0 {
        RelationshipDepth::Friend
    } else if score < 500.0 {
        RelationshipDepth::CloseFriend
    } else {
        RelationshipDepth::Companion
    }
}

fn check_milestones(data: &mut RelationshipData, now: i64) {
    let thresholds: &[(u64, &str)] = &[
        (10, "First 10 conversations"),
        (50, "50 conversations milestone"),
        (100, "Reached 100 conversations"),
        (250, "250 conversations - Strong bond"),
        (500, "500 conversations - Deep connection"),
        (1000, "1000 conversations - Unbreakable bond"),
    ];
    for (threshold, description) in thresholds {
        if data.total_interactions >= *threshold
            && !data.milestones.iter().any(|m| m.milestone == *description)
        {
            data.milestones.push(RelationshipMilestone {
                milestone: description.to_string(),
                reached_at: now,
                interaction_count: data.total_interactions,
            });
            tracing::info!("relationship milestone: {}", description);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> (tempfile::TempDir, RelationshipTracker) {
        let dir = tempfile::tempdir().unwrap();
        let t = RelationshipTracker::new(dir.path().join("relationship_data.json"));
        (dir, t)
    }

    #[test]
    fn test_fresh_relationship_is_stranger() {
        let (_dir, t) = tracker();
        assert_eq!(t.depth(), RelationshipDepth::Stranger);
        assert!((t.rapport() - 1.0).abs() < 1e-6);
        assert!((t.trust() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_quality_interactions_build_rapport() {
        let (_dir, t) = tracker();
        let before = t.rapport();
        for _ in 0..5 {
            t.record_interaction(8.0, vec!["rust".into()], Valence::Positive);
        }
        assert!(t.rapport() > before);
        assert!(t.trust() > 5.0);
        assert_eq!(t.total_interactions(), 5);
    }

    #[test]
    fn test_poor_interactions_erode_rapport_slowly() {
        let (_dir, t) = tracker();
        t.record_interaction(8.0, vec![], Valence::Positive);
        let peak = t.rapport();
        t.record_interaction(2.0, vec![], Valence::Negative);
        assert!(t.rapport() < peak);
        // Erosion is slower than growth.
        assert!(peak - t.rapport() < 0.1);
    }

    #[test]
    fn test_rapport_bounds() {
        let (_dir, t) = tracker();
        for _ in 0..200 {
            t.record_interaction(9.0, vec![], Valence::Positive);
        }
        assert!(t.rapport() <= 10.0);
        assert!(t.trust() <= 10.0);
    }

    #[test]
    fn test_streak_within_day() {
        let (_dir, t) = tracker();
        t.record_interaction(6.0, vec![], Valence::Neutral);
        t.record_interaction(6.0, vec![], Valence::Neutral);
        assert_eq!(t.streak(), 2);
    }

    #[test]
    fn test_milestone_at_ten() {
        let (_dir, t) = tracker();
        for _ in 0..10 {
            t.record_interaction(6.0, vec![], Valence::Neutral);
        }
        let milestones = t.recent_milestones(5);
        assert!(milestones
            .iter()
            .any(|m| m.milestone.contains("First 10")));
        // Recorded exactly once.
        for _ in 0..5 {
            t.record_interaction(6.0, vec![], Valence::Neutral);
        }
        let all = t.recent_milestones(50);
        assert_eq!(
            all.iter().filter(|m| m.milestone.contains("First 10")).count(),
            1
        );
    }

    #[test]
    fn test_persistence_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relationship_data.json");
        {
            let t = RelationshipTracker::new(&path);
            for _ in 0..3 {
                t.record_interaction(8.0, vec!["music".into()], Valence::Positive);
            }
        }
        let t = RelationshipTracker::new(&path);
        assert_eq!(t.total_interactions(), 3);
        assert!(t.rapport() > 1.0);
    }

    #[test]
    fn test_should_not_reach_out_when_fresh() {
        let (_dir, t) = tracker();
        t.record_interaction(8.0, vec![], Valence::Positive);
        assert!(!t.should_reach_out());
    }

    #[test]
    fn test_quality_signal_normalized() {
        let (_dir, t) = tracker();
        let q = t.quality_signal();
        assert!((0.0..=1.0).contains(&q));
    }
}
