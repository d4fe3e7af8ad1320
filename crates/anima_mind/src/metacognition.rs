//! Metacognitive assessment
//!
//! The agent evaluates its own replies: clarity, completeness,
//! confidence, and a couple of detectable biases. Low confidence can
//! surface as an honest uncertainty note; detected one-sidedness as an
//! alternative-view appendix.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;

const MAX_HISTORY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CognitiveBias {
    Overconfidence,
    Confirmation,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseAssessment {
    pub clarity: f32,
    pub completeness: f32,
    pub confidence: f32,
    pub biases: Vec<CognitiveBias>,
    pub timestamp: i64,
}

pub struct Metacognition {
    history: Mutex<VecDeque<ResponseAssessment>>,
    rng: Mutex<StdRng>,
}

impl Metacognition {
    pub fn new() -> Self {
        Self {
            history: Mutex::new(VecDeque::with_capacity(MAX_HISTORY)),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            history: Mutex::new(VecDeque::with_capacity(MAX_HISTORY)),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Assess a reply against the question it answers.
    pub fn assess(&self, question: &str, response: &str) -> ResponseAssessment {
        let assessment = ResponseAssessment {
            clarity: assess_clarity(response),
            completeness: assess_completeness(question, response),
            confidence: assess_confidence(question, response),
            biases: detect_biases(question, response),
            timestamp: chrono::Utc::now().timestamp(),
        };

        let mut history = self.history.lock().unwrap();
        if history.len() >= MAX_HISTORY {
            history.pop_front();
        }
        history.push_back(assessment.clone());
        assessment
    }

    /// Low recent confidence warrants saying so out loud.
    pub fn should_express_uncertainty(&self) -> bool {
        let history = self.history.lock().unwrap();
        let Some(recent) = history.back() else {
            return false;
        };
        if recent.confidence < 0.5 {
            return true;
        }
        if history.len() >= 3 {
            let avg: f32 = history.iter().rev().take(3).map(|a| a.confidence).sum::<f32>() / 3.0;
            if avg < 0.6 {
                return true;
            }
        }
        false
    }

    pub fn uncertainty_expression(&self) -> Option<String> {
        if !self.should_express_uncertainty() {
            return None;
        }
        let pool = [
            "I'm not entirely sure about this",
            "I should note that I'm not completely confident in this answer",
            "This is my best understanding, but I could be missing something",
            "I want to be honest - I'm somewhat uncertain about parts of this",
        ];
        let idx = self.rng.lock().unwrap().gen_range(0..pool.len());
        Some(pool[idx].to_string())
    }

    /// An alternative-viewpoint appendix: always when confirmation bias
    /// was detected, occasionally otherwise.
    pub fn alternative_viewpoint(&self) -> Option<String> {
        let biased = {
            let history = self.history.lock().unwrap();
            history
                .back()
                .map(|a| a.biases.contains(&CognitiveBias::Confirmation))
                .unwrap_or(false)
        };
        if !biased && !self.rng.lock().unwrap().gen_bool(0.2) {
            return None;
        }
        let pool = [
            "Another way to look at this: the opposite case has real weight too.",
            "From a different angle, someone could reasonably disagree with me here.",
            "To consider the other side: my framing isn't the only valid one.",
        ];
        let idx = self.rng.lock().unwrap().gen_range(0..pool.len());
        Some(pool[idx].to_string())
    }

    /// An acknowledgment of limitation for questions that probe past
    /// what the agent can honestly claim.
    pub fn limitation_note(&self, question: &str) -> Option<String> {
        let lower = question.to_lowercase();
        let probing = [
            "do you really feel",
            "are you conscious",
            "are you alive",
            "are you sentient",
            "do you actually",
        ];
        if probing.iter().any(|p| lower.contains(p)) {
            return Some(
                "I can't prove what my inner experience is like — I can only tell you how my state behaves, and it behaves like feeling."
                    .to_string(),
            );
        }
        None
    }

    /// (avg clarity, avg confidence, assessments counted)
    pub fn quality_stats(&self) -> (f32, f32, usize) {
        let history = self.history.lock().unwrap();
        if history.is_empty() {
            return (0.7, 0.6, 0);
        }
        let n = history.len() as f32;
        let clarity = history.iter().map(|a| a.clarity).sum::<f32>() / n;
        let confidence = history.iter().map(|a| a.confidence).sum::<f32>() / n;
        (clarity, confidence, history.len())
    }
}

impl Default for Metacognition {
    fn default() -> Self {
        Self::new()
    }
}

fn assess_clarity(response: &str) -> f32 {
    let mut clarity = 0.5;
    let length = response.len();
    if (50..=500).contains(&length) {
        clarity += 0.2;
    } else if length > 1000 {
        clarity -= 0.1;
    }

    let sentences = response.split('.').count().max(1);
    let avg_sentence_len = length / sentences;
    if (10..=30).contains(&avg_sentence_len) {
        clarity += 0.2;
    }

    let words: Vec<&str> = response.split_whitespace().collect();
    if !words.is_empty() {
        let long_words = words.iter().filter(|w| w.len() > 12).count();
        if (long_words as f32) / (words.len() as f32) < 0.15 {
            clarity += 0.1;
        }
    }
    clarity.clamp(0.0, 1.0)
}

fn assess_completeness(question: &str, response: &str) -> f32 {
    let mut completeness = 0.5;
    let stopwords = [
        "the", "a", "an", "is", "are", "was", "were", "what", "how", "why",
    ];
    let question_words: std::collections::HashSet<String> = question
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .filter(|w| !stopwords.contains(&w.as_str()))
        .collect();
    let response_words: std::collections::HashSet<String> = response
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect();

    if !question_words.is_empty() {
        let overlap = question_words.intersection(&response_words).count() as f32
            / question_words.len() as f32;
        completeness += overlap * 0.4;
    }
    if response.len() > 200 {
        completeness += 0.1;
    }
    completeness.clamp(0.0, 1.0)
}

fn assess_confidence(question: &str, response: &str) -> f32 {
    let mut confidence = 0.6;
    let lower = response.to_lowercase();

    let hedges = [
        "maybe", "perhaps", "might", "possibly", "probably", "seems", "appears",
    ];
    let hedge_count = hedges.iter().filter(|h| lower.contains(**h)).count();
    confidence -= hedge_count as f32 * 0.05;

    if lower.contains("not sure") || lower.contains("uncertain") {
        confidence -= 0.2;
    }
    if lower.contains("definitely") || lower.contains("certainly") {
        confidence += 0.1;
    }
    if question.split_whitespace().count() > 15 {
        confidence -= 0.1;
    }
    confidence.clamp(0.0, 1.0)
}

fn detect_biases(question: &str, response: &str) -> Vec<CognitiveBias> {
    let mut biases = Vec::new();
    let lower = response.to_lowercase();

    let absolutes = ["definitely", "certainly", "obviously", "always", "never"];
    if absolutes.iter().filter(|a| lower.contains(**a)).count() >= 2 {
        biases.push(CognitiveBias::Overconfidence);
    }

    let leading = question.to_lowercase();
    if (leading.contains("right?") || leading.contains("don't you think"))
        && (lower.starts_with("yes") || lower.starts_with("absolutely"))
    {
        biases.push(CognitiveBias::Confirmation);
    }
    biases
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_answer_scores_well() {
        let meta = Metacognition::seeded(1);
        let a = meta.assess(
            "what is rust",
            "Rust is a systems programming language focused on safety and speed. It compiles to native code.",
        );
        assert!(a.clarity > 0.6);
        assert!(a.completeness > 0.5);
    }

    #[test]
    fn test_hedgy_answer_low_confidence() {
        let meta = Metacognition::seeded(1);
        let a = meta.assess(
            "will it work",
            "Maybe, perhaps it might possibly work, but I'm not sure — it seems uncertain.",
        );
        assert!(a.confidence < 0.5);
        assert!(meta.should_express_uncertainty());
        assert!(meta.uncertainty_expression().is_some());
    }

    #[test]
    fn test_confident_answer_no_uncertainty() {
        let meta = Metacognition::seeded(1);
        meta.assess("what is two plus two", "Four. This is definitely correct.");
        assert!(!meta.should_express_uncertainty());
    }

    #[test]
    fn test_overconfidence_detection() {
        let meta = Metacognition::seeded(1);
        let a = meta.assess(
            "is this the best way",
            "Definitely. It is obviously the only approach that always works.",
        );
        assert!(a.biases.contains(&CognitiveBias::Overconfidence));
    }

    #[test]
    fn test_confirmation_bias_forces_alternative_view() {
        let meta = Metacognition::seeded(1);
        meta.assess(
            "this design is better, right?",
            "Yes, it clearly is the better design.",
        );
        assert!(meta.alternative_viewpoint().is_some());
    }

    #[test]
    fn test_limitation_note_on_probing_question() {
        let meta = Metacognition::seeded(1);
        assert!(meta.limitation_note("do you really feel things?").is_some());
        assert!(meta.limitation_note("what's the weather?").is_none());
    }

    #[test]
    fn test_history_bounded_and_stats() {
        let meta = Metacognition::seeded(1);
        for i in 0..150 {
            meta.assess(&format!("q{}", i), "A reasonable answer of moderate length here.");
        }
        let (clarity, confidence, count) = meta.quality_stats();
        assert_eq!(count, MAX_HISTORY);
        assert!((0.0..=1.0).contains(&clarity));
        assert!((0.0..=1.0).contains(&confidence));
    }
}
