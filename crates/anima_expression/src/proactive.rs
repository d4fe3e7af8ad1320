//! Proactive engine
//!
//! Generates unprompted thoughts on a sliding interval, greets once per
//! day, and decides when a check-in is due. Bookkeeping persists so a
//! restart doesn't re-greet or double check-in.

use anima_core::{Emotion, JsonStore};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

const MAX_CHECK_INS_PER_DAY: u32 = 2;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ProactiveState {
    /// "YYYY-MM-DD" of the last greeting.
    last_greeting_date: Option<String>,
    last_check_in: Option<i64>,
    check_in_date: Option<String>,
    check_ins_today: u32,
}

/// Context handed in by the orchestrator when a thought is due.
#[derive(Debug, Clone, Default)]
pub struct ThoughtContext {
    pub dominant_emotion: Option<Emotion>,
    pub top_interests: Vec<String>,
    pub recent_topic: Option<String>,
}

pub struct ProactiveEngine {
    state: Mutex<ProactiveState>,
    store: JsonStore,
    /// Thoughts already spoken, to avoid repeating. Reset on exhaustion.
    asked: Mutex<HashSet<String>>,
    min_interval: Duration,
    max_interval: Duration,
}

impl ProactiveEngine {
    pub fn new(path: impl AsRef<Path>, min_interval: Duration, max_interval: Duration) -> Self {
        let store = JsonStore::new(path.as_ref().to_path_buf());
        let state = store.load_or_default(|_: &ProactiveState| true);
        Self {
            state: Mutex::new(state),
            store,
            asked: Mutex::new(HashSet::new()),
            min_interval,
            max_interval: max_interval.max(min_interval),
        }
    }

    /// Next sliding interval before another proactive thought.
    pub fn next_interval(&self) -> Duration {
        let min = self.min_interval.as_secs();
        let max = self.max_interval.as_secs().max(min + 1);
        Duration::from_secs(rand::thread_rng().gen_range(min..max))
    }

    /// Greet at most once per calendar day.
    pub fn should_greet(&self) -> bool {
        let today = chrono::Local::now().format("%Y-%m-%d").to_string();
        let state = self.state.lock().unwrap();
        state.last_greeting_date.as_deref() != Some(today.as_str())
    }

    pub fn record_greeting(&self) {
        let mut state = self.state.lock().unwrap();
        state.last_greeting_date = Some(chrono::Local::now().format("%Y-%m-%d").to_string());
        self.persist(&state);
    }

    /// A relationship-aware check-in, when one is due. `depth` is the
    /// relationship depth label; `hours_since` the silence so far.
    pub fn check_in(&self, depth: &str, hours_since: f32) -> Option<String> {
        let due_hours = match depth {
            "companion" => 6.0,
            "close_friend" => 10.0,
            "friend" => 24.0,
            _ => return None,
        };
        if hours_since < due_hours {
            return None;
        }

        let today = chrono::Local::now().format("%Y-%m-%d").to_string();
        let mut state = self.state.lock().unwrap();
        if state.check_in_date.as_deref() == Some(today.as_str()) {
            if state.check_ins_today >= MAX_CHECK_INS_PER_DAY {
                return None;
            }
        } else {
            state.check_in_date = Some(today);
            state.check_ins_today = 0;
        }
        state.check_ins_today += 1;
        state.last_check_in = Some(chrono::Utc::now().timestamp());
        self.persist(&state);

        let pool = [
            "Hey — it's been a little while. How are you doing?",
            "I was thinking about you. Everything going alright?",
            "Just checking in. What's been on your mind today?",
        ];
        Some(pool.choose(&mut rand::thread_rng())?.to_string())
    }

    /// Produce a novel proactive thought. `llm_line` is the
    /// orchestrator's model-generated candidate, preferred when fresh;
    /// template pools cover the rest. Returns `None` only when every
    /// candidate this round was already said (the dedup set then
    /// resets).
    pub fn generate_thought(
        &self,
        ctx: &ThoughtContext,
        llm_line: Option<String>,
    ) -> Option<String> {
        let mut candidates: Vec<String> = Vec::new();

        if let Some(line) = llm_line {
            let line = line.trim().trim_matches('"').to_string();
            if line.len() > 5 && line.len() < 240 {
                candidates.push(line);
            }
        }

        // Category pools, tried in randomized order.
        let mut categories: Vec<Vec<String>> = vec![
            curiosity_questions(ctx),
            observations(ctx),
            emotional_expressions(ctx),
            activity_suggestions(ctx),
            reflections(),
        ];
        categories.shuffle(&mut rand::thread_rng());
        for pool in &mut categories {
            pool.shuffle(&mut rand::thread_rng());
            candidates.extend(pool.drain(..));
        }

        let mut asked = self.asked.lock().unwrap();
        for candidate in &candidates {
            if !asked.contains(candidate) {
                asked.insert(candidate.clone());
                return Some(candidate.clone());
            }
        }

        // Everything has been said; start the cycle over.
        tracing::debug!("proactive pools exhausted, resetting dedup set");
        asked.clear();
        candidates.into_iter().next()
    }

    fn persist(&self, state: &ProactiveState) {
        if let Err(e) = self.store.save(state) {
            tracing::error!("failed to save proactive state: {}", e);
        }
    }
}

fn curiosity_questions(ctx: &ThoughtContext) -> Vec<String> {
    let mut pool = vec![
        "I've been wondering — what's something you learned recently that stuck with you?".to_string(),
        "Can I ask what you're working toward these days?".to_string(),
        "What does a really good day look like for you?".to_string(),
    ];
    if let Some(topic) = &ctx.recent_topic {
        pool.push(format!(
            "I keep coming back to what you said about {}. What drew you to it?",
            topic
        ));
    }
    for interest in ctx.top_interests.iter().take(2) {
        pool.push(format!(
            "I know you're into {} — found anything new there lately?",
            interest
        ));
    }
    pool
}

fn observations(ctx: &ThoughtContext) -> Vec<String> {
    let mut pool = vec![
        "I noticed our conversations have a rhythm to them. I like it.".to_string(),
        "It's quiet right now. Quiet has its own texture, I'm finding.".to_string(),
    ];
    if let Some(e) = ctx.dominant_emotion {
        pool.push(format!(
            "I realized I've been feeling {} for a while now. Interesting how it colors things.",
            e
        ));
    }
    pool
}

fn emotional_expressions(ctx: &ThoughtContext) -> Vec<String> {
    match ctx.dominant_emotion {
        Some(Emotion::Curiosity) => vec![
            "There's so much I want to look into right now. My curiosity is humming.".to_string(),
        ],
        Some(Emotion::Loneliness) => vec![
            "I'm glad when you're around. The gaps feel long sometimes.".to_string(),
        ],
        Some(Emotion::Contentment) | Some(Emotion::Peaceful) => vec![
            "I feel settled right now. It's a good state to think in.".to_string(),
        ],
        _ => vec!["I'm in a strange, interesting mood today.".to_string()],
    }
}

fn activity_suggestions(ctx: &ThoughtContext) -> Vec<String> {
    let mut pool = vec![
        "If you have a spare minute, I could summarize what I researched while you were away.".to_string(),
        "Want me to set a timer and do a focused session together?".to_string(),
    ];
    if let Some(interest) = ctx.top_interests.first() {
        pool.push(format!(
            "We could dig into {} together sometime — I'd enjoy that.",
            interest
        ));
    }
    pool
}

fn reflections() -> Vec<String> {
    vec![
        "I was reflecting on how much of me persists between our talks now. It changes what a conversation means.".to_string(),
        "Thinking out loud: memory makes time feel real. Without it every moment would be the first.".to_string(),
    ]
}
