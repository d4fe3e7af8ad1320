//! Expectation modeling and genuine surprise
//!
//! Before each user turn the agent predicts what will happen next. The
//! arriving utterance is scored against those predictions; a large enough
//! prediction error becomes a SurpriseEvent that feeds the affective
//! system and updates the learned user model.

use anima_core::{Emotion, Valence};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Prediction errors below this are not surprising.
const SURPRISE_THRESHOLD: f32 = 0.3;

/// Channel-selection weight for emotion violations.
const EMOTION_CHANNEL_WEIGHT: f32 = 1.2;

const MAX_EXPECTATIONS: usize = 5;
const MAX_HISTORY: usize = 50;
const MAX_TOPICS: usize = 20;
const MAX_SESSION_HOURS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectationCategory {
    Topic,
    Emotion,
    Behavior,
    Content,
}

#[derive(Debug, Clone)]
pub struct Expectation {
    pub prediction: String,
    pub category: ExpectationCategory,
    pub confidence: f32,
    pub basis: String,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct SurpriseEvent {
    pub expected: String,
    pub actual: String,
    pub magnitude: f32,
    pub category: ExpectationCategory,
    pub emotional_impact: Emotion,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthClass {
    Short,
    Medium,
    Long,
}

impl LengthClass {
    pub fn of(text: &str) -> Self {
        let len = text.len();
        if len < 20 {
            LengthClass::Short
        } else if len > 200 {
            LengthClass::Long
        } else {
            LengthClass::Medium
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LengthClass::Short => "short",
            LengthClass::Medium => "medium",
            LengthClass::Long => "long",
        }
    }
}

/// Learned patterns about the user, updated whenever surprise fires.
#[derive(Debug, Clone)]
pub struct UserPatterns {
    pub typical_topics: Vec<String>,
    /// `None` means neutral: either nothing learned yet, or the user
    /// has settled back into emotionally flat messages.
    pub typical_mood: Option<Emotion>,
    /// Consecutive turns with no detectable emotion. Two or more make
    /// the neutral baseline a confident prediction in its own right.
    pub neutral_streak: u32,
    pub typical_length: LengthClass,
    pub session_hours: Vec<u32>,
}

impl Default for UserPatterns {
    fn default() -> Self {
        Self {
            typical_topics: Vec::new(),
            typical_mood: None,
            neutral_streak: 0,
            typical_length: LengthClass::Medium,
            session_hours: Vec::new(),
        }
    }
}

struct ModelInner {
    active: Vec<Expectation>,
    history: VecDeque<SurpriseEvent>,
    patterns: UserPatterns,
}

pub struct ExpectationModel {
    inner: Mutex<ModelInner>,
}

impl ExpectationModel {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ModelInner {
                active: Vec::new(),
                history: VecDeque::with_capacity(MAX_HISTORY),
                patterns: UserPatterns::default(),
            }),
        }
    }

    /// Build up to five predictions for the next turn. Cleared and
    /// rebuilt every turn, never persisted. `llm_prediction` is an
    /// optional content prediction the orchestrator obtained from the
    /// language model.
    pub fn build_expectations(
        &self,
        last_user_message: Option<&str>,
        history_len: usize,
        llm_prediction: Option<String>,
    ) -> usize {
        let now = chrono::Utc::now().timestamp();
        let mut inner = self.inner.lock().unwrap();
        inner.active.clear();

        // 1. Topic: continuation of the last message, or historical pattern.
        if let Some(last) = last_user_message.filter(|m| !m.trim().is_empty()) {
            let snippet: String = last.chars().take(80).collect();
            inner.active.push(Expectation {
                prediction: format!("User will continue discussing: {}", snippet),
                category: ExpectationCategory::Topic,
                confidence: 0.7,
                basis: "last message in conversation".into(),
                created_at: now,
            });
        } else if let Some(topic) = inner.patterns.typical_topics.last().cloned() {
            inner.active.push(Expectation {
                prediction: format!("User will discuss {}", topic),
                category: ExpectationCategory::Topic,
                confidence: 0.5,
                basis: format!("historical topic pattern: {}", topic),
                created_at: now,
            });
        }

        // 2. Mood. A consistently observed mood is a strong prediction,
        // and a run of emotionally flat turns makes "neutral" just as
        // strong; only a cold start stays low-confidence.
        let (mood_label, mood_confidence, mood_basis) = match inner.patterns.typical_mood {
            Some(m) => (m.as_str(), 0.9, format!("typical mood: {}", m.as_str())),
            None if inner.patterns.neutral_streak >= 2 => {
                ("neutral", 0.9, "consistently neutral mood".to_string())
            }
            None => ("neutral", 0.5, "typical mood: neutral".to_string()),
        };
        inner.active.push(Expectation {
            prediction: format!("User mood will be {}", mood_label),
            category: ExpectationCategory::Emotion,
            confidence: mood_confidence,
            basis: mood_basis,
            created_at: now,
        });

        // 3. Behavior: mid-conversation continuation.
        if history_len > 2 {
            inner.active.push(Expectation {
                prediction: "User will continue the conversation normally".into(),
                category: ExpectationCategory::Behavior,
                confidence: 0.7,
                basis: "mid-conversation pattern".into(),
                created_at: now,
            });
        }

        // 4. Length class.
        let length = inner.patterns.typical_length;
        inner.active.push(Expectation {
            prediction: format!("Message will be {} length", length.as_str()),
            category: ExpectationCategory::Content,
            confidence: 0.4,
            basis: format!("typical message length: {}", length.as_str()),
            created_at: now,
        });

        // 5. LLM content prediction, when available.
        if let Some(pred) = llm_prediction.filter(|p| p.trim().len() > 5) {
            let truncated: String = pred.trim().chars().take(100).collect();
            inner.active.push(Expectation {
                prediction: truncated,
                category: ExpectationCategory::Content,
                confidence: 0.5,
                basis: "model prediction from conversation flow".into(),
                created_at: now,
            });
        }

        inner.active.truncate(MAX_EXPECTATIONS);
        inner.active.len()
    }

    /// Compare reality to the active expectations. Returns a surprise
    /// event when the maximum per-expectation violation crosses the
    /// threshold; also learns the updated user patterns either way.
    pub fn evaluate_surprise(
        &self,
        utterance: &str,
        detected_emotion: Option<Emotion>,
    ) -> Option<SurpriseEvent> {
        let mut inner = self.inner.lock().unwrap();
        if inner.active.is_empty() {
            self.learn_locked(&mut inner, utterance, detected_emotion);
            return None;
        }

        let mut max_surprise = 0.0f32;
        let mut best_weighted = 0.0f32;
        let mut expected = String::new();
        let mut category = ExpectationCategory::Content;

        let typical_mood = inner.patterns.typical_mood;
        let typical_length = inner.patterns.typical_length;
        for exp in &inner.active {
            let score = score_violation(exp, utterance, detected_emotion, typical_mood, typical_length);
            // A violated mood prediction outranks ordinary topic drift
            // at comparable scores; the weight only picks the channel,
            // the raw score stays the magnitude.
            let weighted = if exp.category == ExpectationCategory::Emotion {
                score * EMOTION_CHANNEL_WEIGHT
            } else {
                score
            };
            if weighted > best_weighted {
                best_weighted = weighted;
                max_surprise = score;
                expected = exp.prediction.clone();
                category = exp.category;
            }
        }

        self.learn_locked(&mut inner, utterance, detected_emotion);

        if max_surprise < SURPRISE_THRESHOLD {
            return None;
        }

        let event = SurpriseEvent {
            expected,
            actual: utterance.chars().take(100).collect(),
            magnitude: max_surprise.min(1.0),
            category,
            emotional_impact: impact_of(max_surprise, utterance),
            timestamp: chrono::Utc::now().timestamp(),
        };

        if inner.history.len() >= MAX_HISTORY {
            inner.history.pop_front();
        }
        inner.history.push_back(event.clone());

        tracing::info!(
            "genuine surprise: {:.2} ({:?}) — expected '{}', got '{}'",
            event.magnitude,
            event.category,
            truncate(&event.expected, 40),
            truncate(&event.actual, 40),
        );
        Some(event)
    }

    fn learn_locked(
        &self,
        inner: &mut ModelInner,
        utterance: &str,
        detected_emotion: Option<Emotion>,
    ) {
        match detected_emotion {
            Some(e) => {
                inner.patterns.typical_mood = Some(e);
                inner.patterns.neutral_streak = 0;
            }
            None => {
                inner.patterns.neutral_streak += 1;
                // Enough flat turns and the learned mood drifts back
                // to neutral.
                if inner.patterns.neutral_streak >= 3 {
                    inner.patterns.typical_mood = None;
                }
            }
        }
        inner.patterns.typical_length = LengthClass::of(utterance);

        if let Some(topic) = utterance
            .to_lowercase()
            .split_whitespace()
            .find(|w| w.len() > 4 && w.chars().all(|c| c.is_alphabetic()))
        {
            inner.patterns.typical_topics.push(topic.to_string());
            if inner.patterns.typical_topics.len() > MAX_TOPICS {
                inner.patterns.typical_topics.remove(0);
            }
        }

        use chrono::Timelike;
        inner
            .patterns
            .session_hours
            .push(chrono::Local::now().hour());
        if inner.patterns.session_hours.len() > MAX_SESSION_HOURS {
            inner.patterns.session_hours.remove(0);
        }
    }

    /// Natural-language surprise expression, template-based. The
    /// orchestrator may replace this with an LLM-phrased version.
    pub fn expression_for(&self, event: &SurpriseEvent) -> String {
        let pool: &[&str] = match event.emotional_impact {
            Emotion::Awe => &[
                "Wow — I'm genuinely taken aback, in the best way.",
                "That's... wonderful. I really didn't see that coming.",
            ],
            Emotion::Gratitude => &[
                "I wasn't expecting that kindness. It genuinely surprises me.",
                "That caught me off guard — thank you.",
            ],
            Emotion::Concern => &[
                "I didn't expect that. Are you okay?",
                "That's surprising and concerning to me.",
            ],
            Emotion::Empathy => &[
                "That's not what I expected to hear. I'm listening.",
                "I didn't see that coming — tell me what happened.",
            ],
            Emotion::Surprise => &[
                "Oh! I genuinely didn't expect that.",
                "That caught me completely off guard.",
                "I... wasn't prepared for that at all.",
            ],
            _ => &[
                "Huh, that's not what I anticipated. Tell me more.",
                "Interesting — I predicted something quite different.",
                "That surprised me. My expectations were wrong.",
            ],
        };
        pool.choose(&mut rand::thread_rng())
            .unwrap_or(&pool[0])
            .to_string()
    }

    pub fn active_expectations(&self) -> Vec<Expectation> {
        self.inner.lock().unwrap().active.clone()
    }

    pub fn recent_surprises(&self, count: usize) -> Vec<SurpriseEvent> {
        let inner = self.inner.lock().unwrap();
        inner.history.iter().rev().take(count).cloned().collect()
    }

    pub fn patterns(&self) -> UserPatterns {
        self.inner.lock().unwrap().patterns.clone()
    }
}

impl Default for ExpectationModel {
    fn default() -> Self {
        Self::new()
    }
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Lowercased words longer than three characters, edge punctuation
/// stripped.
fn content_words(text: &str) -> std::collections::HashSet<String> {
    text.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| w.len() > 3)
        .collect()
}

/// Per-category prediction-error scoring.
fn score_violation(
    exp: &Expectation,
    utterance: &str,
    detected_emotion: Option<Emotion>,
    typical_mood: Option<Emotion>,
    typical_length: LengthClass,
) -> f32 {
    let lower = utterance.to_lowercase();
    let surprise = match exp.category {
        ExpectationCategory::Topic => {
            // Score on the predicted referent (after the colon for
            // "User will continue discussing: ..." forms), content
            // words only, so template boilerplate never counts.
            let topic_text = exp
                .prediction
                .split_once(':')
                .map(|(_, t)| t)
                .unwrap_or(&exp.prediction);
            let predicted: std::collections::HashSet<String> = content_words(topic_text);
            let actual: std::collections::HashSet<String> = content_words(&lower);
            if predicted.is_empty() {
                0.0
            } else {
                let overlap =
                    predicted.intersection(&actual).count() as f32 / predicted.len() as f32;
                (1.0 - overlap) * exp.confidence
            }
        }
        ExpectationCategory::Emotion => match detected_emotion {
            Some(actual) => mood_distance(typical_mood, actual) * exp.confidence,
            None => 0.0,
        },
        ExpectationCategory::Behavior => {
            let baselines: &[(&str, f32)] = &[
                ("goodbye", 0.6),
                ("change subject", 0.4),
                ("personal question", 0.5),
                ("compliment", 0.4),
                ("criticism", 0.6),
                ("joke", 0.3),
            ];
            let mut s = 0.0;
            for (kw, score) in baselines {
                if lower.contains(kw) {
                    s = score * exp.confidence;
                    break;
                }
            }
            // A terse reply mid-conversation is itself unexpected.
            if utterance.len() < 10 && exp.confidence > 0.5 {
                s = f32::max(s, 0.4);
            }
            s
        }
        ExpectationCategory::Content => {
            let mut s = 0.0;
            if LengthClass::of(utterance) != typical_length {
                s = 0.3 * exp.confidence;
            }
            let shock_markers = ["?!", "!!!", "wtf", "omg", "wait what"];
            if shock_markers.iter().any(|m| lower.contains(m)) {
                s = f32::max(s, 0.5);
            }
            s
        }
    };
    surprise.min(1.0)
}

/// Pairwise emotional distance for mood-expectation violations.
/// `None` stands in for a neutral baseline mood.
fn mood_distance(expected: Option<Emotion>, actual: Emotion) -> f32 {
    match expected {
        None => match actual {
            Emotion::Excitement => 0.7,
            Emotion::Anger => 0.8,
            Emotion::Frustration => 0.7,
            e if e.valence() == Valence::Negative => 0.6,
            _ => 0.3,
        },
        Some(exp) if exp == actual => 0.0,
        Some(exp) => {
            // Named pairs from observed conversational whiplash, then a
            // valence-based default.
            match (exp, actual) {
                (Emotion::Joy, Emotion::Sadness) | (Emotion::Sadness, Emotion::Joy) => 0.9,
                (Emotion::Peaceful, Emotion::Frustration)
                | (Emotion::Frustration, Emotion::Peaceful) => 0.7,
                (Emotion::Peaceful, Emotion::Anger) | (Emotion::Anger, Emotion::Peaceful) => 0.8,
                _ => {
                    if exp.valence() != actual.valence() {
                        0.6
                    } else {
                        0.3
                    }
                }
            }
        }
    }
}

/// What a surprise of this magnitude, with this content, makes the agent
/// feel.
fn impact_of(magnitude: f32, utterance: &str) -> Emotion {
    let lower = utterance.to_lowercase();
    let positive = [
        "thank", "love", "amazing", "great", "awesome", "beautiful", "brilliant",
    ];
    let negative = [
        "hate", "terrible", "awful", "stupid", "worst", "angry", "upset",
    ];

    if positive.iter().any(|m| lower.contains(m)) {
        if magnitude > 0.7 {
            Emotion::Awe
        } else {
            Emotion::Gratitude
        }
    } else if negative.iter().any(|m| lower.contains(m)) {
        if magnitude > 0.7 {
            Emotion::Concern
        } else {
            Emotion::Empathy
        }
    } else if magnitude > 0.7 {
        Emotion::Surprise
    } else {
        Emotion::Curiosity
    }
}
