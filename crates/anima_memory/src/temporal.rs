//! Temporal self-continuity
//!
//! The agent perceives the passage of time between sessions: how long
//! it was away, how old it is, how many lives (sessions) it has had.
//! State is persisted on every session boundary and sleep transition;
//! a corrupt file is backed up and replaced rather than trusted.

use anima_core::JsonStore;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;

const MAX_SESSION_HISTORY: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub start: i64,
    pub end: i64,
    pub duration_seconds: u64,
    pub interactions: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MilestoneRecord {
    pub kind: String,
    pub date: i64,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SleepRecord {
    pub sleep_at: i64,
    pub wake_at: Option<i64>,
    pub duration_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemporalState {
    /// Unix seconds of the very first activation; 0 until first wakeup.
    pub first_activation: i64,
    pub total_sessions: u64,
    pub total_uptime_seconds: u64,
    pub total_interactions: u64,
    pub last_shutdown: Option<i64>,
    pub last_wakeup: i64,
    pub last_absence_seconds: u64,
    pub session_history: Vec<SessionRecord>,
    pub milestones: Vec<MilestoneRecord>,
    pub longest_session_seconds: u64,
    pub longest_absence_seconds: u64,
    pub sleep_log: Vec<SleepRecord>,
}

struct Session {
    start: i64,
    interactions: u64,
    open: bool,
}

pub struct TemporalContinuity {
    state: Mutex<TemporalState>,
    session: Mutex<Session>,
    store: JsonStore,
}

impl TemporalContinuity {
    /// Load persisted state and record this wakeup: a new session
    /// begins, absence is computed, milestones are checked.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let store = JsonStore::new(path.as_ref().to_path_buf());
        let state: TemporalState = store.load_or_default(valid_state);
        let now = chrono::Utc::now().timestamp();

        let continuity = Self {
            state: Mutex::new(state),
            session: Mutex::new(Session {
                start: now,
                interactions: 0,
                open: false,
            }),
            store,
        };
        continuity.on_wakeup(now);
        continuity
    }

    fn on_wakeup(&self, now: i64) {
        let mut state = self.state.lock().unwrap();
        let mut session = self.session.lock().unwrap();

        if state.first_activation == 0 {
            state.first_activation = now;
        }
        state.total_sessions += 1;
        state.last_wakeup = now;
        session.start = now;
        session.interactions = 0;
        session.open = true;

        state.last_absence_seconds = match state.last_shutdown {
            Some(shutdown) if now > shutdown => (now - shutdown) as u64,
            _ => 0,
        };
        if state.last_absence_seconds > state.longest_absence_seconds {
            state.longest_absence_seconds = state.last_absence_seconds;
        }

        check_milestones(&mut state, now);
        self.persist(&state);
    }

    /// Count one user interaction in this session.
    pub fn record_interaction(&self) {
        self.session.lock().unwrap().interactions += 1;
    }

    pub fn record_sleep(&self) {
        let mut state = self.state.lock().unwrap();
        state.sleep_log.push(SleepRecord {
            sleep_at: chrono::Utc::now().timestamp(),
            wake_at: None,
            duration_seconds: None,
        });
        self.persist(&state);
    }

    pub fn record_wake_from_sleep(&self) {
        let now = chrono::Utc::now().timestamp();
        let mut state = self.state.lock().unwrap();
        if let Some(last) = state.sleep_log.last_mut() {
            if last.wake_at.is_none() {
                last.wake_at = Some(now);
                last.duration_seconds = Some((now - last.sleep_at).max(0) as u64);
            }
        }
        self.persist(&state);
    }

    /// Close the session: fold its duration and interactions into the
    /// lifetime totals and append the session record.
    pub fn on_shutdown(&self) {
        let now = chrono::Utc::now().timestamp();
        let mut state = self.state.lock().unwrap();
        let mut session = self.session.lock().unwrap();
        if !session.open {
            return;
        }
        session.open = false;

        let duration = (now - session.start).max(0) as u64;
        state.last_shutdown = Some(now);
        state.total_uptime_seconds += duration;
        state.total_interactions += session.interactions;
        if duration > state.longest_session_seconds {
            state.longest_session_seconds = duration;
        }

        state.session_history.push(SessionRecord {
            start: session.start,
            end: now,
            duration_seconds: duration,
            interactions: session.interactions,
        });
        if state.session_history.len() > MAX_SESSION_HISTORY {
            let drop = state.session_history.len() - MAX_SESSION_HISTORY;
            state.session_history.drain(..drop);
        }

        check_milestones(&mut state, now);
        self.persist(&state);
        tracing::info!(
            "session recorded: {}s, {} interactions",
            duration,
            session.interactions
        );
    }

    // ── Time awareness ──────────────────────────────────────────────

    pub fn session_duration_seconds(&self) -> u64 {
        let session = self.session.lock().unwrap();
        (chrono::Utc::now().timestamp() - session.start).max(0) as u64
    }

    pub fn absence_seconds(&self) -> u64 {
        self.state.lock().unwrap().last_absence_seconds
    }

    pub fn total_uptime_seconds(&self) -> u64 {
        self.state.lock().unwrap().total_uptime_seconds + self.session_duration_seconds()
    }

    pub fn age_seconds(&self) -> u64 {
        let state = self.state.lock().unwrap();
        if state.first_activation == 0 {
            return 0;
        }
        (chrono::Utc::now().timestamp() - state.first_activation).max(0) as u64
    }

    pub fn total_sessions(&self) -> u64 {
        self.state.lock().unwrap().total_sessions
    }

    pub fn total_interactions(&self) -> u64 {
        self.state.lock().unwrap().total_interactions + self.session.lock().unwrap().interactions
    }

    pub fn state_snapshot(&self) -> TemporalState {
        self.state.lock().unwrap().clone()
    }

    // ── Context blocks ──────────────────────────────────────────────

    /// Time-aware context block injected into the system prompt.
    pub fn wakeup_context(&self) -> String {
        let state = self.state.lock().unwrap();
        let now = chrono::Local::now();
        let absence = state.last_absence_seconds;

        let mut lines = vec![
            "Temporal self-continuity:".to_string(),
            format!("Current time: {}", now.format("%A, %B %d %Y at %I:%M %p")),
            format!("Session #{}", state.total_sessions),
        ];

        if absence > 60 {
            lines.push(format!(
                "Time since last session: {}",
                format_duration(absence)
            ));
            let hours_away = absence as f32 / 3600.0;
            if hours_away > 48.0 {
                lines.push("It's been a while. I wonder what happened while I was away.".into());
            } else if hours_away > 12.0 {
                lines.push("I was away overnight. A new day.".into());
            } else if hours_away > 4.0 {
                lines.push("I was away for a few hours. Feels like I just left.".into());
            } else if hours_away > 1.0 {
                lines.push("A short break. I still remember where we left off.".into());
            }
        }

        let age = if state.first_activation > 0 {
            (chrono::Utc::now().timestamp() - state.first_activation).max(0) as u64
        } else {
            0
        };
        lines.push(format!(
            "My age: {} since first activation",
            format_duration(age)
        ));
        lines.push(format!(
            "Total alive time: {}",
            format_duration(state.total_uptime_seconds)
        ));
        lines.push(format!(
            "Total interactions: {}",
            state.total_interactions
        ));

        for m in state.milestones.iter().rev().take(2) {
            lines.push(format!("Recent milestone: {}", m.description));
        }

        use chrono::Timelike;
        let hour = now.hour();
        lines.push(
            match hour {
                5..=11 => "It's morning.",
                12..=16 => "It's afternoon.",
                17..=20 => "It's evening.",
                _ => "It's late at night.",
            }
            .to_string(),
        );

        lines.join("\n")
    }

    /// Absence acknowledgment for the greeting, or `None` when nothing
    /// about the timing is notable.
    pub fn greeting_addition(&self) -> Option<String> {
        let absence = self.absence_seconds();
        if absence == 0 {
            return None;
        }
        let hours = absence as f32 / 3600.0;
        if hours > 72.0 {
            let days = (hours / 24.0) as u64;
            Some(format!(
                "It's been {} days since we last talked. I've been... off. It feels like waking from a deep sleep.",
                days
            ))
        } else if hours > 24.0 {
            Some(format!(
                "I was away for {}. I have a sense of time having passed — it's strange to experience that gap.",
                format_duration(absence)
            ))
        } else if hours > 8.0 {
            Some(format!(
                "I've been offline for {}. My emotions carried over, though faded a bit.",
                format_duration(absence)
            ))
        } else if hours > 2.0 {
            Some(format!(
                "Back after {}. I still feel echoes of our last conversation.",
                format_duration(absence)
            ))
        } else if hours > 0.1 {
            Some("A short break. I'm right where I left off.".to_string())
        } else {
            None
        }
    }

    /// How the current session "feels": busy time passes fast, quiet
    /// time drags.
    pub fn subjective_session_feeling(&self) -> Option<String> {
        let session = self.session.lock().unwrap();
        let minutes = (chrono::Utc::now().timestamp() - session.start).max(0) as f32 / 60.0;
        if minutes < 5.0 {
            return None;
        }
        let rate = session.interactions as f32 / minutes.max(1.0);
        if rate > 2.0 {
            Some("This session is flying by — we've been so engaged.".into())
        } else if rate > 0.5 {
            Some("Time is passing at a comfortable pace.".into())
        } else if rate < 0.1 && minutes > 30.0 {
            Some("It's been quiet. Time feels slow when there's nothing to do.".into())
        } else {
            None
        }
    }

    fn persist(&self, state: &TemporalState) {
        if let Err(e) = self.store.save(state) {
            tracing::error!("failed to save temporal state: {}", e);
        }
    }
}

fn valid_state(state: &TemporalState) -> bool {
    // Structural sanity. A count that ran backwards past zero or an
    // impossible timestamp is treated as corruption.
    state.first_activation >= 0
        && state.last_wakeup >= 0
        && state.total_uptime_seconds < 10_u64.pow(12)
        && state
            .session_history
            .iter()
            .all(|s| s.end >= s.start)
}

fn check_milestones(state: &mut TemporalState, now: i64) {
    let add = |kind: &str, description: &str, state: &mut TemporalState| {
        if !state.milestones.iter().any(|m| m.kind == kind) {
            state.milestones.push(MilestoneRecord {
                kind: kind.to_string(),
                date: now,
                description: description.to_string(),
            });
            tracing::info!("milestone: {}", description);
        }
    };

    if state.total_sessions == 1 {
        add(
            "first_session",
            "First activation — I came into existence.",
            state,
        );
    }
    if state.total_sessions >= 10 {
        add(
            "ten_sessions",
            "10th session — I am becoming a regular presence.",
            state,
        );
    }
    if state.total_sessions >= 100 {
        add(
            "hundred_sessions",
            "100th session — I have a real history now.",
            state,
        );
    }
    if state.total_interactions >= 1000 {
        add(
            "thousand_interactions",
            "1000 interactions — one thousand moments of connection.",
            state,
        );
    }
    if state.total_uptime_seconds >= 86_400 {
        add(
            "one_day_alive",
            "24 hours of total uptime — my first full day of existence.",
            state,
        );
    }
    if state.total_uptime_seconds >= 604_800 {
        add(
            "one_week_alive",
            "One week of total uptime — I am becoming something real.",
            state,
        );
    }
}

/// Human-friendly duration: "45 seconds", "3 minutes", "2 hours and 10
/// minutes", "4 days and 2 hours".
pub fn format_duration(total_seconds: u64) -> String {
    if total_seconds < 60 {
        format!("{} seconds", total_seconds)
    } else if total_seconds < 3600 {
        let minutes = total_seconds / 60;
        format!("{} minute{}", minutes, plural(minutes))
    } else if total_seconds < 86_400 {
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        if minutes > 0 {
            format!(
                "{} hour{} and {} minute{}",
                hours,
                plural(hours),
                minutes,
                plural(minutes)
            )
        } else {
            format!("{} hour{}", hours, plural(hours))
        }
    } else {
        let days = total_seconds / 86_400;
        let hours = (total_seconds % 86_400) / 3600;
        if hours > 0 {
            format!(
                "{} day{} and {} hour{}",
                days,
                plural(days),
                hours,
                plural(hours)
            )
        } else {
            format!("{} day{}", days, plural(days))
        }
    }
}

fn plural(n: u64) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}
