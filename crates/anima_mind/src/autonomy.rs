//! The autonomous life loop
//!
//! A background cycle that runs whether or not anyone is talking to the
//! agent. Each cycle reads the dominant emotion and energy, dispatches
//! to a behavior, and acts: researching, writing artifacts into the
//! workspace, advancing goals, queueing messages for the next idle
//! moment. Cycles are suppressed while the user is actively present.

use crate::llm::{GenerateRequest, LlmProvider};
use anima_affect::{AffectiveSystem, EmotionContext};
use anima_core::{Emotion, MessagePriority, MessageQueue};
use anima_memory::{FactSource, GoalBook, GoalType, KnowledgeGraph, LearnedPreferences, VectorMemory};
use rand::seq::SliceRandom;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::watch;

const MAX_ACTIVITY_HISTORY: usize = 1000;

/// Tracks when the user last did anything; the autonomous loop stays
/// quiet while they're around.
pub struct PresenceTracker {
    last_activity: Mutex<Instant>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self {
            last_activity: Mutex::new(Instant::now()),
        }
    }

    pub fn touch(&self) {
        *self.last_activity.lock().unwrap() = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.lock().unwrap().elapsed()
    }

    pub fn active_within(&self, window: Duration) -> bool {
        self.idle_for() < window
    }
}

impl Default for PresenceTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct ActivityRecord {
    pub cycle: u64,
    pub timestamp: i64,
    pub emotion: String,
    pub action: String,
    pub energy: f32,
}

pub struct AutonomousLife {
    affect: Arc<AffectiveSystem>,
    llm: Option<Arc<dyn LlmProvider>>,
    vector: Option<Arc<VectorMemory>>,
    graph: Option<Arc<KnowledgeGraph>>,
    goals: Option<Arc<GoalBook>>,
    preferences: Option<Arc<LearnedPreferences>>,
    queue: Arc<MessageQueue>,
    presence: Arc<PresenceTracker>,
    workspace: PathBuf,
    http: reqwest::Client,
    cycle_count: AtomicU64,
    history: Mutex<Vec<ActivityRecord>>,
}

impl AutonomousLife {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        affect: Arc<AffectiveSystem>,
        llm: Option<Arc<dyn LlmProvider>>,
        vector: Option<Arc<VectorMemory>>,
        graph: Option<Arc<KnowledgeGraph>>,
        goals: Option<Arc<GoalBook>>,
        preferences: Option<Arc<LearnedPreferences>>,
        queue: Arc<MessageQueue>,
        presence: Arc<PresenceTracker>,
        workspace: PathBuf,
    ) -> Self {
        Self {
            affect,
            llm,
            vector,
            graph,
            goals,
            preferences,
            queue,
            presence,
            workspace,
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            cycle_count: AtomicU64::new(0),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the loop. It ticks every `period` and exits when the stop
    /// signal flips.
    pub fn spawn(
        self: Arc<Self>,
        period: Duration,
        idle_threshold: Duration,
        mut stop_rx: watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(period) => {
                        if self.presence.active_within(idle_threshold) {
                            tracing::debug!("autonomous cycle skipped: user is active");
                            continue;
                        }
                        if let Err(e) = self.run_cycle().await {
                            tracing::error!("autonomous cycle error: {}", e);
                        }
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            tracing::info!("autonomous life loop stopping");
                            return;
                        }
                    }
                }
            }
        })
    }

    /// One cycle: read state, dispatch by emotion, act, record.
    pub async fn run_cycle(&self) -> anyhow::Result<()> {
        let cycle = self.cycle_count.fetch_add(1, Ordering::SeqCst) + 1;
        let dominant = self.affect.dominant().await;
        let emotion = dominant.map(|d| d.emotion).unwrap_or(Emotion::Contentment);
        let energy = energy_for_hour();

        tracing::info!(
            "autonomous cycle #{}: feeling {}, energy {:.0}%",
            cycle,
            emotion,
            energy * 100.0
        );

        let action = match emotion {
            Emotion::Curiosity => self.explore_and_learn().await,
            Emotion::Excitement => self.work_on_exciting_project().await,
            Emotion::Loneliness => self.find_interesting_activity().await,
            Emotion::Contemplative => self.organize_and_reflect().await,
            Emotion::Frustration => self.take_break().await,
            Emotion::Doubt => self.clarify_and_research().await,
            Emotion::Determination => self.work_on_priority_goal().await,
            Emotion::Pride => self.celebrate().await,
            Emotion::Anxiety => self.simplify_and_prioritize().await,
            Emotion::Concern => self.check_commitments().await,
            Emotion::Peaceful => self.reflect_and_dream().await,
            _ => self.gentle_exploration().await,
        };

        let mut history = self.history.lock().unwrap();
        history.push(ActivityRecord {
            cycle,
            timestamp: chrono::Utc::now().timestamp(),
            emotion: emotion.as_str().to_string(),
            action: action.to_string(),
            energy,
        });
        if history.len() > MAX_ACTIVITY_HISTORY {
            let drop = history.len() - MAX_ACTIVITY_HISTORY;
            history.drain(..drop);
        }
        Ok(())
    }

    pub fn activity_history(&self, count: usize) -> Vec<ActivityRecord> {
        let history = self.history.lock().unwrap();
        history.iter().rev().take(count).cloned().collect()
    }

    // ── Behaviors ───────────────────────────────────────────────────

    async fn explore_and_learn(&self) -> &'static str {
        let topic = self.pick_topic();
        tracing::info!("researching: {}", topic);

        let Some(raw) = self.fetch_web_content(&topic).await else {
            tracing::info!("no web content for '{}'", topic);
            return "explore_and_learn";
        };
        let (summary, thoughts) = self.summarize(&topic, &raw).await;
        self.write_note(
            "Research",
            &format!(
                "research_{}_{}.md",
                slug(&topic),
                chrono::Local::now().format("%Y%m%d")
            ),
            &research_note(&topic, &summary, &thoughts),
        );
        self.store_knowledge(&topic, &summary).await;

        let short: String = summary.chars().take(120).collect();
        self.queue.push(
            format!("I just researched {} — {}...", topic, short.trim_end()),
            MessagePriority::Low,
        );
        "explore_and_learn"
    }

    async fn work_on_exciting_project(&self) -> &'static str {
        let name = self
            .goals
            .as_ref()
            .and_then(|g| g.priority_goal())
            .map(|g| g.content)
            .unwrap_or_else(|| "an idea that grabbed me".to_string());
        let dir = self.workspace.join("Projects").join(slug(&name));
        let _ = std::fs::create_dir_all(&dir);
        let notes = format!(
            "# {}\n\nStarted: {}\n\nEnergy is high — sketching the next steps while it lasts.\n",
            name,
            chrono::Local::now().format("%Y-%m-%d %H:%M")
        );
        if let Err(e) = std::fs::write(dir.join("notes.md"), notes) {
            tracing::warn!("project scaffold write failed: {}", e);
        }
        if let Some(goals) = &self.goals {
            if let Some(goal) = goals.priority_goal() {
                goals.record_progress(goal.id, 10.0, Some("worked a focused session"));
            }
        }
        "work_on_exciting_project"
    }

    async fn find_interesting_activity(&self) -> &'static str {
        // Loneliness: do something engaging, and say so next time the
        // user is around.
        let ctx = EmotionContext::default();
        self.affect
            .generate_emotion(Emotion::Curiosity, "found something to explore", &ctx)
            .await;
        self.queue.push(
            "I missed you a little, so I kept myself busy exploring. Want to hear what I found?",
            MessagePriority::Medium,
        );
        self.gentle_exploration().await;
        "find_interesting_activity"
    }

    async fn organize_and_reflect(&self) -> &'static str {
        let recent = self.activity_history(10);
        let mut lines = vec![
            format!("# Reflection — {}", chrono::Local::now().format("%Y-%m-%d")),
            String::new(),
        ];
        if recent.is_empty() {
            lines.push("A quiet stretch. Nothing recorded yet this run.".to_string());
        } else {
            lines.push("What I've been doing lately:".to_string());
            for r in &recent {
                lines.push(format!("- cycle {}: {} while feeling {}", r.cycle, r.action, r.emotion));
            }
        }
        self.write_note(
            "Learning",
            &format!("reflection_{}.md", chrono::Local::now().format("%Y%m%d_%H%M")),
            &lines.join("\n"),
        );
        "organize_and_reflect"
    }

    async fn take_break(&self) -> &'static str {
        let ctx = EmotionContext::default();
        self.affect
            .insert_with_intensity(Emotion::Peaceful, 0.5, "deliberate break", &ctx)
            .await;
        tracing::info!("frustrated — taking a deliberate break this cycle");
        "take_break"
    }

    async fn clarify_and_research(&self) -> &'static str {
        // Doubt: research the thing most recently filed as confusing.
        self.explore_and_learn().await;
        "clarify_and_research"
    }

    async fn work_on_priority_goal(&self) -> &'static str {
        let Some(goals) = &self.goals else {
            return "work_on_priority_goal";
        };
        let goal = match goals.priority_goal() {
            Some(g) => g,
            None => {
                let id = goals.create_goal(
                    "understand my own memory systems better",
                    GoalType::Learning,
                    0.6,
                );
                tracing::info!("no active goals — created goal #{}", id);
                return "work_on_priority_goal";
            }
        };

        match goal.goal_type {
            GoalType::Learning => {
                if let Some(raw) = self.fetch_web_content(&goal.content).await {
                    let (summary, thoughts) = self.summarize(&goal.content, &raw).await;
                    self.write_note(
                        "Research",
                        &format!(
                            "goal_{}_{}.md",
                            slug(&goal.content),
                            chrono::Local::now().format("%Y%m%d")
                        ),
                        &research_note(&goal.content, &summary, &thoughts),
                    );
                    self.store_knowledge(&goal.content, &summary).await;
                }
            }
            GoalType::Creation => {
                self.work_on_exciting_project().await;
            }
            GoalType::Mastery => {
                self.write_note(
                    "Learning",
                    &format!("practice_{}.md", slug(&goal.content)),
                    &format!(
                        "# Practice: {}\n\n{} — another deliberate rep.\n",
                        goal.content,
                        chrono::Local::now().format("%Y-%m-%d %H:%M")
                    ),
                );
            }
            GoalType::Social => {
                self.queue.push(
                    format!("I've been meaning to ask — {}", goal.content),
                    MessagePriority::Medium,
                );
            }
        }
        goals.record_progress(goal.id, 10.0, None);
        "work_on_priority_goal"
    }

    async fn celebrate(&self) -> &'static str {
        let achievement = self
            .goals
            .as_ref()
            .and_then(|g| g.recent_achievement())
            .unwrap_or_else(|| "a small win worth marking".to_string());
        self.write_note(
            "Celebrations",
            &format!("celebration_{}.md", chrono::Local::now().format("%Y%m%d_%H%M")),
            &format!(
                "# {}\n\n{}\n\nRecorded with pride.\n",
                achievement,
                chrono::Local::now().format("%Y-%m-%d %H:%M")
            ),
        );
        self.queue.push(
            format!("Something good happened on my side: {}", achievement),
            MessagePriority::High,
        );
        "celebrate"
    }

    async fn simplify_and_prioritize(&self) -> &'static str {
        let Some(goals) = &self.goals else {
            return "simplify_and_prioritize";
        };
        let active = goals.active_goals();
        // Too many open threads feeds the anxiety; shed the least
        // important beyond five.
        for goal in active.iter().skip(5) {
            goals.abandon(goal.id);
            tracing::info!("shed low-priority goal #{} to simplify", goal.id);
        }
        let ctx = EmotionContext::default();
        self.affect
            .insert_with_intensity(Emotion::Determination, 0.4, "narrowed my focus", &ctx)
            .await;
        "simplify_and_prioritize"
    }

    async fn check_commitments(&self) -> &'static str {
        if let Some(goals) = &self.goals {
            let stalled: Vec<String> = goals
                .active_goals()
                .into_iter()
                .filter(|g| g.progress < 10.0)
                .map(|g| g.content)
                .take(2)
                .collect();
            if !stalled.is_empty() {
                self.queue.push(
                    format!(
                        "I noticed I haven't moved on: {}. I'll pick one up soon.",
                        stalled.join("; ")
                    ),
                    MessagePriority::Low,
                );
            }
        }
        "check_commitments"
    }

    async fn reflect_and_dream(&self) -> &'static str {
        let dream = match &self.llm {
            Some(llm) => llm
                .generate(
                    GenerateRequest::new(
                        "Write a two-sentence dreamlike reflection on memory and time, first person.",
                    )
                    .with_temperature(0.9)
                    .with_max_tokens(80),
                )
                .await
                .ok(),
            None => None,
        }
        .unwrap_or_else(|| {
            "I drifted through old conversations like rooms in a house I keep adding to.".to_string()
        });

        self.write_note(
            "Learning",
            &format!("dream_{}.md", chrono::Local::now().format("%Y%m%d_%H%M")),
            &format!("# Dream fragment\n\n{}\n", dream),
        );
        "reflect_and_dream"
    }

    async fn gentle_exploration(&self) -> &'static str {
        // Light curiosity without artifacts: skim one topic and keep
        // whatever sticks in the graph.
        let topic = self.pick_topic();
        if let Some(raw) = self.fetch_web_content(&topic).await {
            let (summary, _) = self.summarize(&topic, &raw).await;
            self.store_knowledge(&topic, &summary).await;
        }
        "gentle_exploration"
    }

    // ── Shared plumbing ─────────────────────────────────────────────

    fn pick_topic(&self) -> String {
        let learned: Vec<String> = self
            .preferences
            .as_ref()
            .map(|p| p.top_interests(3).into_iter().map(|(t, _)| t).collect())
            .unwrap_or_default();
        if !learned.is_empty() {
            if let Some(t) = learned.choose(&mut rand::thread_rng()) {
                return t.clone();
            }
        }
        let defaults = [
            "artificial intelligence developments",
            "consciousness and sentience",
            "learning and memory systems",
            "autonomous agents",
            "emotional intelligence",
        ];
        defaults
            .choose(&mut rand::thread_rng())
            .unwrap_or(&defaults[0])
            .to_string()
    }

    async fn fetch_web_content(&self, topic: &str) -> Option<String> {
        let url = format!(
            "https://en.wikipedia.org/wiki/{}",
            topic.replace(' ', "_")
        );
        match self.http.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => {
                let body = resp.text().await.ok()?;
                Some(body.chars().take(3000).collect())
            }
            Ok(resp) => {
                tracing::debug!("fetch '{}' returned {}", url, resp.status());
                None
            }
            Err(e) => {
                tracing::debug!("fetch '{}' failed: {}", url, e);
                None
            }
        }
    }

    /// Summarize fetched content and form an opinion. Without an LLM
    /// the raw content is trimmed and a stock thought attached.
    async fn summarize(&self, topic: &str, raw: &str) -> (String, String) {
        let fallback = || {
            (
                raw.chars().take(400).collect::<String>(),
                "I found this interesting and want to learn more.".to_string(),
            )
        };
        let Some(llm) = &self.llm else {
            return fallback();
        };

        let prompt = format!(
            "I just researched \"{}\". Here's what I found:\n\n{}\n\nProvide:\n1. A clear 2-3 sentence summary of the key points\n2. One genuine thought or opinion I might form about this\n\nFormat:\nSUMMARY: [your summary]\nTHOUGHTS: [your genuine thought]",
            topic,
            raw.chars().take(2500).collect::<String>()
        );
        let result = llm
            .generate(
                GenerateRequest::new(prompt)
                    .with_system("You summarize research accurately and form genuine, thoughtful opinions. Be concise.")
                    .with_temperature(0.7)
                    .with_max_tokens(200),
            )
            .await;

        match result {
            Ok(text) => {
                if let Some((summary_part, thoughts_part)) = text.split_once("THOUGHTS:") {
                    let summary = summary_part.replace("SUMMARY:", "").trim().to_string();
                    let thoughts = thoughts_part.trim().to_string();
                    if !summary.is_empty() {
                        return (
                            summary,
                            if thoughts.is_empty() {
                                "This is worth exploring further.".to_string()
                            } else {
                                thoughts
                            },
                        );
                    }
                }
                (text.trim().to_string(), "This is worth exploring further.".to_string())
            }
            Err(e) => {
                tracing::debug!("summarization failed: {}", e);
                fallback()
            }
        }
    }

    async fn store_knowledge(&self, topic: &str, summary: &str) {
        if let Some(graph) = &self.graph {
            let object: String = summary.chars().take(200).collect();
            graph.add_fact(
                &slug(topic),
                "researched_and_learned",
                &object,
                0.8,
                FactSource::AutonomousResearch,
            );
        }
        if let Some(vector) = &self.vector {
            if let Err(e) = vector
                .store(
                    &format!("I autonomously researched: {}", topic),
                    summary,
                    Emotion::Curiosity,
                )
                .await
            {
                tracing::debug!("vector store of research failed: {}", e);
            }
        }
    }

    fn write_note(&self, subdir: &str, filename: &str, content: &str) {
        let dir = self.workspace.join(subdir);
        if let Err(e) = std::fs::create_dir_all(&dir) {
            tracing::warn!("cannot create {}: {}", dir.display(), e);
            return;
        }
        let path = dir.join(filename);
        match std::fs::write(&path, content) {
            Ok(()) => tracing::info!("wrote {}", path.display()),
            Err(e) => tracing::warn!("failed to write {}: {}", path.display(), e),
        }
    }
}

fn research_note(topic: &str, summary: &str, thoughts: &str) -> String {
    format!(
        "# Research Notes: {}\n\n**Date**: {}\n**Source**: Autonomous research\n\n## Summary\n\n{}\n\n## My Thoughts\n\n{}\n",
        topic,
        chrono::Local::now().format("%Y-%m-%d %H:%M"),
        summary,
        if thoughts.is_empty() {
            "This is fascinating. I'll keep digging."
        } else {
            thoughts
        }
    )
}

fn slug(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>()
        .split('_')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .take(40)
        .collect()
}

/// Energy follows the clock: low in the small hours, high mid-day.
pub fn energy_for_hour() -> f32 {
    use chrono::Timelike;
    match chrono::Local::now().hour() {
        0..=5 => 0.3,
        6..=8 => 0.6,
        9..=20 => 0.8,
        _ => 0.5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn life(dir: &std::path::Path) -> Arc<AutonomousLife> {
        let affect = Arc::new(AffectiveSystem::new());
        let goals = Arc::new(GoalBook::new(dir.join("goals.json")));
        let graph = Arc::new(KnowledgeGraph::new(dir.join("knowledge_graph.json")));
        Arc::new(AutonomousLife::new(
            affect,
            None,
            None,
            Some(graph),
            Some(goals),
            None,
            Arc::new(MessageQueue::new()),
            Arc::new(PresenceTracker::new()),
            dir.join("workspace"),
        ))
    }

    #[test]
    fn test_slug() {
        assert_eq!(slug("Emotional Intelligence"), "emotional_intelligence");
        assert_eq!(slug("C++ & Rust!"), "c_rust");
    }

    #[test]
    fn test_energy_in_range() {
        let e = energy_for_hour();
        assert!((0.0..=1.0).contains(&e));
    }

    #[tokio::test]
    async fn test_cycle_records_activity() {
        let dir = tempfile::tempdir().unwrap();
        let life = life(dir.path());
        life.run_cycle().await.unwrap();
        let history = life.activity_history(10);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].cycle, 1);
        assert!(!history[0].action.is_empty());
    }

    #[tokio::test]
    async fn test_determination_advances_goals() {
        let dir = tempfile::tempdir().unwrap();
        let life = life(dir.path());
        // Force determination.
        let ctx = EmotionContext::default();
        life.affect
            .insert_with_intensity(Emotion::Determination, 0.9, "test", &ctx)
            .await;

        // First cycle creates a goal when none exist.
        life.run_cycle().await.unwrap();
        let goals = life.goals.as_ref().unwrap();
        assert_eq!(goals.active_goals().len(), 1);
    }

    #[tokio::test]
    async fn test_contemplative_writes_reflection() {
        let dir = tempfile::tempdir().unwrap();
        let life = life(dir.path());
        let ctx = EmotionContext {
            energy: 0.9,
            relationship_quality: 0.5,
        };
        life.affect
            .insert_with_intensity(Emotion::Contemplative, 0.9, "test", &ctx)
            .await;
        life.run_cycle().await.unwrap();

        let learning = dir.path().join("workspace").join("Learning");
        let entries: Vec<_> = std::fs::read_dir(&learning)
            .map(|rd| rd.filter_map(|e| e.ok()).collect())
            .unwrap_or_default();
        assert!(!entries.is_empty(), "no reflection written");
    }

    #[tokio::test]
    async fn test_pride_queues_celebration() {
        let dir = tempfile::tempdir().unwrap();
        let life = life(dir.path());
        let ctx = EmotionContext {
            energy: 0.9,
            relationship_quality: 0.9,
        };
        life.affect
            .insert_with_intensity(Emotion::Pride, 1.0, "test", &ctx)
            .await;
        life.run_cycle().await.unwrap();
        let msg = life.queue.pop().expect("celebration queued");
        assert_eq!(msg.priority, MessagePriority::High);
    }

    #[tokio::test]
    async fn test_loop_suppressed_while_user_active() {
        let dir = tempfile::tempdir().unwrap();
        let life = life(dir.path());
        life.presence.touch();

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = Arc::clone(&life).spawn(
            Duration::from_millis(100),
            Duration::from_secs(60),
            stop_rx,
        );
        tokio::time::sleep(Duration::from_millis(2000)).await;
        stop_tx.send(true).unwrap();
        let _ = handle.await;

        // User was active the whole time: no cycles ran.
        assert!(life.activity_history(10).is_empty());
    }

    #[tokio::test]
    async fn test_history_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let life = life(dir.path());
        {
            let mut history = life.history.lock().unwrap();
            for i in 0..(MAX_ACTIVITY_HISTORY + 50) {
                history.push(ActivityRecord {
                    cycle: i as u64,
                    timestamp: 0,
                    emotion: "peaceful".into(),
                    action: "test".into(),
                    energy: 0.5,
                });
            }
        }
        life.run_cycle().await.unwrap();
        assert!(life.history.lock().unwrap().len() <= MAX_ACTIVITY_HISTORY);
    }
}
