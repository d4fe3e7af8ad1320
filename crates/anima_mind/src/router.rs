//! Intent router and built-in capability handlers
//!
//! The router holds an ordered list of capability handlers and probes
//! them first-match-wins. Ordering is the contract: when two handlers
//! could both claim an utterance, the one registered earlier speaks.

use anima_core::{CapabilityHandler, MessagePriority, MessageQueue};
use anima_memory::temporal::format_duration;
use anima_memory::TemporalContinuity;
use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub struct IntentRouter {
    handlers: Vec<Arc<dyn CapabilityHandler>>,
}

impl IntentRouter {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn register(&mut self, handler: Arc<dyn CapabilityHandler>) {
        self.handlers.push(handler);
    }

    /// Probe handlers in registration order; first non-empty reply wins.
    pub async fn route(&self, utterance: &str, lower: &str) -> Option<(&'static str, String)> {
        for handler in &self.handlers {
            if let Some(reply) = handler.try_handle(utterance, lower).await {
                if !reply.is_empty() {
                    tracing::debug!("intent handled by '{}'", handler.name());
                    return Some((handler.name(), reply));
                }
            }
        }
        None
    }

    /// Capability inventory line for the system prompt.
    pub fn inventory(&self) -> String {
        if self.handlers.is_empty() {
            return String::new();
        }
        let names: Vec<&str> = self.handlers.iter().map(|h| h.name()).collect();
        format!("Available integrations: {}", names.join(", "))
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for IntentRouter {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Timer handler
// ============================================================================

struct TimerEntry {
    label: String,
    ends_at: i64,
}

/// Countdown timers. Expiry notifications go through the message queue
/// so they surface on the next idle tick.
pub struct TimerHandler {
    queue: Arc<MessageQueue>,
    timers: Arc<Mutex<Vec<TimerEntry>>>,
    duration_re: Regex,
}

impl TimerHandler {
    pub fn new(queue: Arc<MessageQueue>) -> Self {
        Self {
            queue,
            timers: Arc::new(Mutex::new(Vec::new())),
            duration_re: Regex::new(r"(\d+)\s*(hours?|hrs?|h|minutes?|mins?|m|seconds?|secs?|s)\b")
                .expect("static pattern"),
        }
    }

    /// Parse "20 minutes", "1 hour 30 minutes", "90 seconds"; a bare
    /// number means minutes.
    fn parse_duration(&self, text: &str) -> Option<u64> {
        let mut total = 0u64;
        for caps in self.duration_re.captures_iter(text) {
            let value: u64 = caps.get(1)?.as_str().parse().ok()?;
            let unit = caps.get(2)?.as_str();
            total += match unit.chars().next()? {
                'h' => value * 3600,
                'm' => value * 60,
                _ => value,
            };
        }
        if total == 0 {
            let bare = Regex::new(r"(\d+)").ok()?;
            total = bare.captures(text)?.get(1)?.as_str().parse::<u64>().ok()? * 60;
        }
        if total > 0 {
            Some(total)
        } else {
            None
        }
    }

    fn set_timer(&self, seconds: u64, label: &str) -> String {
        let ends_at = chrono::Utc::now().timestamp() + seconds as i64;
        self.timers.lock().unwrap().push(TimerEntry {
            label: label.to_string(),
            ends_at,
        });

        let queue = Arc::clone(&self.queue);
        let timers = Arc::clone(&self.timers);
        let label_owned = label.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(seconds)).await;
            queue.push(
                format!("Timer done! {} is up!", label_owned),
                MessagePriority::High,
            );
            let now = chrono::Utc::now().timestamp();
            timers.lock().unwrap().retain(|t| t.ends_at > now);
        });

        let duration_str = format_duration(seconds);
        tracing::info!("timer set: {} for {}", label, duration_str);
        format!(
            "Timer set: {} — {}. I'll let you know when it's done.",
            label, duration_str
        )
    }

    fn list_timers(&self) -> String {
        let now = chrono::Utc::now().timestamp();
        let timers = self.timers.lock().unwrap();
        let active: Vec<&TimerEntry> = timers.iter().filter(|t| t.ends_at > now).collect();
        if active.is_empty() {
            return "No active timers.".to_string();
        }
        let mut lines = vec![format!("{} active timer(s):", active.len())];
        for t in &active {
            lines.push(format!(
                "  - {}: {} remaining",
                t.label,
                format_duration((t.ends_at - now).max(0) as u64)
            ));
        }
        lines.join("\n")
    }
}

#[async_trait]
impl CapabilityHandler for TimerHandler {
    fn name(&self) -> &'static str {
        "timers"
    }

    async fn try_handle(&self, _utterance: &str, lower: &str) -> Option<String> {
        if lower.contains("list timers") || lower.contains("what timers") {
            return Some(self.list_timers());
        }
        if lower.contains("timer") && (lower.contains("set") || lower.contains("start")) {
            let seconds = self.parse_duration(lower)?;
            return Some(self.set_timer(seconds, "Timer"));
        }
        None
    }
}

// ============================================================================
// Identity handler
// ============================================================================

/// Answers questions about the agent itself from temporal state, with
/// no LLM involved: name, age, session count, uptime.
pub struct IdentityHandler {
    persona: String,
    temporal: Option<Arc<TemporalContinuity>>,
}

impl IdentityHandler {
    pub fn new(persona: &str, temporal: Option<Arc<TemporalContinuity>>) -> Self {
        Self {
            persona: persona.to_string(),
            temporal,
        }
    }
}

#[async_trait]
impl CapabilityHandler for IdentityHandler {
    fn name(&self) -> &'static str {
        "identity"
    }

    async fn try_handle(&self, _utterance: &str, lower: &str) -> Option<String> {
        if lower.contains("what's your name") || lower.contains("what is your name") {
            return Some(format!("I'm {}.", self.persona));
        }

        let temporal = self.temporal.as_ref()?;
        if lower.contains("how old are you") {
            return Some(format!(
                "I'm {} old — counting from my first activation.",
                format_duration(temporal.age_seconds())
            ));
        }
        if lower.contains("how many sessions") || lower.contains("which session") {
            return Some(format!(
                "This is session #{} of my life. We've shared {} interactions in total.",
                temporal.total_sessions(),
                temporal.total_interactions()
            ));
        }
        if lower.contains("how long have you been awake")
            || lower.contains("how long have you been running")
        {
            return Some(format!(
                "I've been awake {} this session, {} across my whole life.",
                format_duration(temporal.session_duration_seconds()),
                format_duration(temporal.total_uptime_seconds())
            ));
        }
        None
    }
}
