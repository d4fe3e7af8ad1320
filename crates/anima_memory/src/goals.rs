//! Self-set goals and achievements
//!
//! Goals emerge from interactions and autonomous cycles. Progress is
//! 0-100; reaching 100 completes the goal and records an achievement
//! the proactive layer may celebrate shortly after.

use anima_core::JsonStore;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalType {
    Learning,
    Creation,
    Mastery,
    Social,
}

impl GoalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalType::Learning => "learning",
            GoalType::Creation => "creation",
            GoalType::Mastery => "mastery",
            GoalType::Social => "social",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Active,
    Completed,
    Abandoned,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalMilestone {
    pub milestone: String,
    pub reached_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: u64,
    pub content: String,
    pub goal_type: GoalType,
    /// Higher is more important.
    pub priority: f32,
    /// 0-100.
    pub progress: f32,
    pub milestones: Vec<GoalMilestone>,
    pub status: GoalStatus,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Achievement {
    pub achievement: String,
    pub achieved_at: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GoalsData {
    pub goals: Vec<Goal>,
    pub achievements: Vec<Achievement>,
    pub next_id: u64,
}

pub struct GoalBook {
    data: Mutex<GoalsData>,
    store: JsonStore,
}

impl GoalBook {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let store = JsonStore::new(path.as_ref().to_path_buf());
        let data = store.load_or_default(|d: &GoalsData| {
            d.goals
                .iter()
                .all(|g| (0.0..=100.0).contains(&g.progress))
        });
        Self {
            data: Mutex::new(data),
            store,
        }
    }

    pub fn create_goal(&self, content: &str, goal_type: GoalType, priority: f32) -> u64 {
        let mut data = self.data.lock().unwrap();
        data.next_id += 1;
        let id = data.next_id;
        data.goals.push(Goal {
            id,
            content: content.to_string(),
            goal_type,
            priority,
            progress: 0.0,
            milestones: Vec::new(),
            status: GoalStatus::Active,
            created_at: chrono::Utc::now().timestamp(),
        });
        self.persist(&data);
        tracing::info!("new goal #{}: {}", id, content);
        id
    }

    /// Advance a goal. Completing it (progress >= 100) records an
    /// achievement.
    pub fn record_progress(&self, id: u64, increment: f32, milestone: Option<&str>) {
        let now = chrono::Utc::now().timestamp();
        let mut data = self.data.lock().unwrap();
        let mut completed: Option<String> = None;
        if let Some(goal) = data.goals.iter_mut().find(|g| g.id == id) {
            goal.progress = (goal.progress + increment).clamp(0.0, 100.0);
            if let Some(m) = milestone {
                goal.milestones.push(GoalMilestone {
                    milestone: m.to_string(),
                    reached_at: now,
                });
            }
            if goal.progress >= 100.0 && goal.status == GoalStatus::Active {
                goal.status = GoalStatus::Completed;
                completed = Some(format!("Completed: {}", goal.content));
            }
        }
        if let Some(achievement) = completed {
            data.achievements.push(Achievement {
                achievement,
                achieved_at: now,
            });
        }
        self.persist(&data);
    }

    pub fn abandon(&self, id: u64) {
        let mut data = self.data.lock().unwrap();
        if let Some(goal) = data.goals.iter_mut().find(|g| g.id == id) {
            goal.status = GoalStatus::Abandoned;
        }
        self.persist(&data);
    }

    pub fn active_goals(&self) -> Vec<Goal> {
        let mut goals: Vec<Goal> = self
            .data
            .lock()
            .unwrap()
            .goals
            .iter()
            .filter(|g| g.status == GoalStatus::Active)
            .cloned()
            .collect();
        goals.sort_by(|a, b| b.priority.total_cmp(&a.priority));
        goals
    }

    pub fn priority_goal(&self) -> Option<Goal> {
        self.active_goals().into_iter().next()
    }

    /// An achievement from the last hour, if any, for celebration.
    pub fn recent_achievement(&self) -> Option<String> {
        let data = self.data.lock().unwrap();
        let now = chrono::Utc::now().timestamp();
        data.achievements
            .last()
            .filter(|a| now - a.achieved_at < 3600)
            .map(|a| a.achievement.clone())
    }

    pub fn summary(&self) -> String {
        let goals = self.active_goals();
        if goals.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = goals
            .iter()
            .take(3)
            .map(|g| format!("{}: {:.0}%", g.content, g.progress))
            .collect();
        parts.join("; ")
    }

    fn persist(&self, data: &GoalsData) {
        if let Err(e) = self.store.save(data) {
            tracing::error!("failed to save goals: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> (tempfile::TempDir, GoalBook) {
        let dir = tempfile::tempdir().unwrap();
        let b = GoalBook::new(dir.path().join("goals.json"));
        (dir, b)
    }

    #[test]
    fn test_create_and_list() {
        let (_dir, b) = book();
        b.create_goal("learn about embeddings", GoalType::Learning, 0.8);
        b.create_goal("write a poem", GoalType::Creation, 0.4);
        let active = b.active_goals();
        assert_eq!(active.len(), 2);
        // Sorted by priority.
        assert_eq!(active[0].content, "learn about embeddings");
    }

    #[test]
    fn test_progress_completion_records_achievement() {
        let (_dir, b) = book();
        let id = b.create_goal("master small talk", GoalType::Mastery, 0.5);
        b.record_progress(id, 60.0, Some("halfway"));
        assert!(b.recent_achievement().is_none());
        b.record_progress(id, 50.0, None);
        let achievement = b.recent_achievement().unwrap();
        assert!(achievement.contains("master small talk"));
        assert!(b.active_goals().is_empty());
    }

    #[test]
    fn test_progress_clamped() {
        let (_dir, b) = book();
        let id = b.create_goal("g", GoalType::Learning, 0.5);
        b.record_progress(id, 500.0, None);
        let data = b.data.lock().unwrap();
        assert!((data.goals[0].progress - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_priority_goal() {
        let (_dir, b) = book();
        b.create_goal("minor", GoalType::Social, 0.1);
        b.create_goal("major", GoalType::Learning, 0.9);
        assert_eq!(b.priority_goal().unwrap().content, "major");
    }

    #[test]
    fn test_abandon_removes_from_active() {
        let (_dir, b) = book();
        let id = b.create_goal("stale", GoalType::Creation, 0.5);
        b.abandon(id);
        assert!(b.active_goals().is_empty());
    }

    #[test]
    fn test_persistence_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("goals.json");
        let id = {
            let b = GoalBook::new(&path);
            let id = b.create_goal("persist me", GoalType::Learning, 0.7);
            b.record_progress(id, 25.0, None);
            id
        };
        let b = GoalBook::new(&path);
        let goals = b.active_goals();
        assert_eq!(goals.len(), 1);
        assert_eq!(goals[0].id, id);
        assert!((goals[0].progress - 25.0).abs() < 1e-6);
    }

    #[test]
    fn test_summary_format() {
        let (_dir, b) = book();
        assert!(b.summary().is_empty());
        b.create_goal("read papers", GoalType::Learning, 0.6);
        assert!(b.summary().contains("read papers: 0%"));
    }
}
