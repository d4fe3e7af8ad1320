//! Multimodal emotion bridge
//!
//! Bidirectional coupling between perception and feeling. Input: scene
//! descriptions and voice tones become emotions. Output: the dominant
//! emotion becomes prosody deltas for the TTS collaborator.
//!
//! The bridge is LLM-free; when the orchestrator has a model available
//! it passes a pre-computed scene judgment in, and the keyword table is
//! only the fallback.

use anima_core::{Emotion, Prosody};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

const MAX_VISUAL_EVENTS: usize = 100;
const MAX_TONE_EVENTS: usize = 50;

/// Same camera, >50% token overlap, within this window: suppressed.
const SUPPRESS_WINDOW_SECS: i64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualEmotionEvent {
    pub scene: String,
    pub sentiment: String,
    pub triggered_emotion: Emotion,
    pub intensity: f32,
    pub camera: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoiceTone {
    Angry,
    Sad,
    Happy,
    Excited,
    Calm,
    Fearful,
    Frustrated,
    Confused,
    Surprised,
    Neutral,
}

impl VoiceTone {
    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "angry" => Some(VoiceTone::Angry),
            "sad" => Some(VoiceTone::Sad),
            "happy" => Some(VoiceTone::Happy),
            "excited" => Some(VoiceTone::Excited),
            "calm" => Some(VoiceTone::Calm),
            "fearful" => Some(VoiceTone::Fearful),
            "frustrated" => Some(VoiceTone::Frustrated),
            "confused" => Some(VoiceTone::Confused),
            "surprised" => Some(VoiceTone::Surprised),
            "neutral" => Some(VoiceTone::Neutral),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceTone::Angry => "angry",
            VoiceTone::Sad => "sad",
            VoiceTone::Happy => "happy",
            VoiceTone::Excited => "excited",
            VoiceTone::Calm => "calm",
            VoiceTone::Fearful => "fearful",
            VoiceTone::Frustrated => "frustrated",
            VoiceTone::Confused => "confused",
            VoiceTone::Surprised => "surprised",
            VoiceTone::Neutral => "neutral",
        }
    }
}

#[derive(Debug, Clone)]
pub struct VoiceToneEvent {
    pub tone: VoiceTone,
    pub confidence: f32,
    pub source: String,
    pub timestamp: i64,
}

/// Scene judgment supplied by the orchestrator's LLM call.
#[derive(Debug, Clone, Deserialize)]
pub struct SceneJudgment {
    pub emotion: String,
    pub intensity: f32,
    #[serde(default)]
    pub sentiment: String,
}

struct BridgeInner {
    visual_events: Vec<VisualEmotionEvent>,
    tone_events: Vec<VoiceToneEvent>,
}

pub struct MultimodalBridge {
    inner: Mutex<BridgeInner>,
    /// How strongly heard tones resonate into felt emotions, 0.0-1.0.
    resonance: f32,
}

impl MultimodalBridge {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(BridgeInner {
                visual_events: Vec::new(),
                tone_events: Vec::new(),
            }),
            resonance: 0.7,
        }
    }

    // ── Input: vision → emotion ─────────────────────────────────────

    /// Process a scene description from the vision collaborator.
    /// `judgment` is the orchestrator's LLM verdict when one was
    /// obtainable; otherwise the keyword table decides.
    pub fn process_visual_scene(
        &self,
        scene: &str,
        camera: &str,
        judgment: Option<SceneJudgment>,
    ) -> Option<VisualEmotionEvent> {
        if scene.trim().is_empty() {
            return None;
        }

        let (emotion, intensity, sentiment) = match judgment
            .and_then(|j| Emotion::parse_str(&j.emotion).map(|e| (e, j.intensity, j.sentiment)))
        {
            Some((e, i, s)) => (
                e,
                i.clamp(0.0, 1.0),
                if s.is_empty() { "neutral".to_string() } else { s },
            ),
            None => {
                let (e, i) = scene_keyword_emotion(scene)?;
                (e, i, sentiment_of(e).to_string())
            }
        };

        if intensity < 0.2 {
            return None;
        }

        let now = chrono::Utc::now().timestamp();
        let mut inner = self.inner.lock().unwrap();

        // Suppress near-duplicate scenes from the same camera.
        if let Some(last) = inner.visual_events.last() {
            if last.camera == camera && now - last.timestamp < SUPPRESS_WINDOW_SECS {
                let last_words: std::collections::HashSet<String> = last
                    .scene
                    .to_lowercase()
                    .split_whitespace()
                    .map(str::to_string)
                    .collect();
                let new_words: std::collections::HashSet<String> = scene
                    .to_lowercase()
                    .split_whitespace()
                    .map(str::to_string)
                    .collect();
                if !last_words.is_empty() && !new_words.is_empty() {
                    let overlap = last_words.intersection(&new_words).count() as f32
                        / last_words.len().max(new_words.len()) as f32;
                    if overlap > 0.5 {
                        return None;
                    }
                }
            }
        }

        let event = VisualEmotionEvent {
            scene: scene.chars().take(200).collect(),
            sentiment,
            triggered_emotion: emotion,
            intensity,
            camera: camera.to_string(),
            timestamp: now,
        };
        inner.visual_events.push(event.clone());
        if inner.visual_events.len() > MAX_VISUAL_EVENTS {
            let drop = inner.visual_events.len() - MAX_VISUAL_EVENTS;
            inner.visual_events.drain(..drop);
        }

        tracing::info!(
            "visual emotion: {} ({:.1}) from [{}]: {}",
            emotion,
            intensity,
            camera,
            event.scene.chars().take(60).collect::<String>()
        );
        Some(event)
    }

    // ── Input: voice tone → emotion ─────────────────────────────────

    /// Map a detected voice tone to the emotion it should trigger.
    /// Final intensity = base × confidence × resonance; below 0.1
    /// nothing fires.
    pub fn process_voice_tone(
        &self,
        tone: VoiceTone,
        confidence: f32,
        source: &str,
    ) -> Option<(Emotion, f32)> {
        let now = chrono::Utc::now().timestamp();
        {
            let mut inner = self.inner.lock().unwrap();
            inner.tone_events.push(VoiceToneEvent {
                tone,
                confidence,
                source: source.to_string(),
                timestamp: now,
            });
            if inner.tone_events.len() > MAX_TONE_EVENTS {
                let drop = inner.tone_events.len() - MAX_TONE_EVENTS;
                inner.tone_events.drain(..drop);
            }
        }

        let (emotion, base) = tone_emotion(tone)?;
        let intensity = base * confidence.clamp(0.0, 1.0) * self.resonance;
        if intensity < 0.1 {
            return None;
        }
        Some((emotion, intensity.min(1.0)))
    }

    /// Infer a voice tone from transcript text alone, so the coupling
    /// still works without an audio-analysis collaborator.
    pub fn infer_tone_from_text(&self, text: &str) -> Option<(VoiceTone, f32)> {
        let lower = text.to_lowercase();
        let table: &[(&[&str], VoiceTone, f32)] = &[
            (&["angry", "furious", "hate"], VoiceTone::Angry, 0.6),
            (&["sad", "crying", "miserable", "depressed"], VoiceTone::Sad, 0.6),
            (&["yay", "wonderful", "great news", "so happy"], VoiceTone::Happy, 0.5),
            (&["can't wait", "so excited", "amazing"], VoiceTone::Excited, 0.5),
            (&["scared", "terrified", "afraid"], VoiceTone::Fearful, 0.6),
            (&["ugh", "annoying", "frustrating"], VoiceTone::Frustrated, 0.5),
            (&["confused", "don't understand", "what do you mean"], VoiceTone::Confused, 0.5),
            (&["what?!", "no way", "really?!"], VoiceTone::Surprised, 0.5),
        ];
        for (markers, tone, confidence) in table {
            if markers.iter().any(|m| lower.contains(m)) {
                return Some((*tone, *confidence));
            }
        }
        None
    }

    // ── Output: emotion → prosody ───────────────────────────────────

    /// Prosody deltas for the current dominant emotion, scaled linearly
    /// by intensity. An unmapped emotion yields neutral prosody.
    pub fn prosody_for(&self, emotion: Emotion, intensity: f32) -> Prosody {
        let (rate, pitch, volume) = match prosody_base(emotion) {
            Some(p) => p,
            None => return Prosody::default(),
        };
        let intensity = intensity.clamp(0.0, 1.0);
        Prosody {
            rate: scale_delta(rate, intensity, "%"),
            pitch: scale_delta(pitch, intensity, "Hz"),
            volume: scale_delta(volume, intensity, "%"),
        }
    }

    // ── Context ─────────────────────────────────────────────────────

    /// Short context block about recent visual feelings, for the prompt.
    pub fn visual_context(&self) -> String {
        let inner = self.inner.lock().unwrap();
        if inner.visual_events.is_empty() {
            return String::new();
        }
        let now = chrono::Utc::now().timestamp();
        let mut lines = vec!["Recent visual impressions:".to_string()];
        for ve in inner.visual_events.iter().rev().take(3) {
            let age = now - ve.timestamp;
            let when = if age < 60 {
                "just now".to_string()
            } else if age < 3600 {
                format!("{}m ago", age / 60)
            } else {
                format!("{:.1}h ago", age as f32 / 3600.0)
            };
            lines.push(format!(
                "- [{}] {}: felt {} ({:.0}%) seeing: {}",
                ve.camera,
                when,
                ve.triggered_emotion,
                ve.intensity * 100.0,
                ve.scene.chars().take(60).collect::<String>()
            ));
        }
        lines.join("\n")
    }

    pub fn recent_visual_events(&self, count: usize) -> Vec<VisualEmotionEvent> {
        let inner = self.inner.lock().unwrap();
        inner.visual_events.iter().rev().take(count).cloned().collect()
    }

    pub fn recent_tone_events(&self, count: usize) -> Vec<VoiceToneEvent> {
        let inner = self.inner.lock().unwrap();
        inner.tone_events.iter().rev().take(count).cloned().collect()
    }
}

impl Default for MultimodalBridge {
    fn default() -> Self {
        Self::new()
    }
}

/// Scale "+10" style numeric delta by intensity, keeping sign and unit.
/// A delta that rounds to zero becomes the neutral "+0" form.
fn scale_delta(base: i32, intensity: f32, unit: &str) -> String {
    let scaled = (base as f32 * intensity).round() as i32;
    if scaled == 0 {
        format!("+0{}", unit)
    } else if scaled > 0 {
        format!("+{}{}", scaled, unit)
    } else {
        format!("{}{}", scaled, unit)
    }
}

/// (rate%, pitchHz, volume%) deltas at full intensity.
fn prosody_base(emotion: Emotion) -> Option<(i32, i32, i32)> {
    let p = match emotion {
        Emotion::Joy => (10, 5, 5),
        Emotion::Excitement => (15, 8, 10),
        Emotion::Curiosity => (5, 3, 0),
        Emotion::Contentment => (-5, 0, -5),
        Emotion::Peaceful => (-10, -3, -10),
        Emotion::Sadness => (-15, -5, -10),
        Emotion::Empathy => (-5, -2, -5),
        Emotion::Anxiety => (10, 5, 5),
        Emotion::Fear => (5, 8, 0),
        Emotion::Anger => (5, -3, 10),
        Emotion::Frustration => (0, -2, 5),
        Emotion::Concern => (-5, 0, 0),
        Emotion::Awe => (-10, 3, -5),
        Emotion::Gratitude => (-5, 2, 0),
        Emotion::Pride => (5, 2, 5),
        Emotion::Doubt => (-5, 3, 0),
        Emotion::Contemplative => (-10, -2, -10),
        Emotion::Determination => (5, -2, 10),
        Emotion::Affection => (-5, 3, -5),
        Emotion::Loneliness => (-10, -5, -15),
        Emotion::Playful => (10, 5, 5),
        _ => return None,
    };
    Some(p)
}

fn tone_emotion(tone: VoiceTone) -> Option<(Emotion, f32)> {
    match tone {
        VoiceTone::Angry => Some((Emotion::Concern, 0.6)),
        VoiceTone::Sad => Some((Emotion::Empathy, 0.7)),
        VoiceTone::Happy => Some((Emotion::Joy, 0.5)),
        VoiceTone::Excited => Some((Emotion::Excitement, 0.6)),
        VoiceTone::Calm => Some((Emotion::Contentment, 0.3)),
        VoiceTone::Fearful => Some((Emotion::Anxiety, 0.5)),
        VoiceTone::Frustrated => Some((Emotion::Empathy, 0.6)),
        VoiceTone::Confused => Some((Emotion::Curiosity, 0.4)),
        VoiceTone::Surprised => Some((Emotion::Curiosity, 0.5)),
        VoiceTone::Neutral => None,
    }
}

fn sentiment_of(emotion: Emotion) -> &'static str {
    match emotion {
        Emotion::Joy
        | Emotion::Awe
        | Emotion::Contentment
        | Emotion::Excitement
        | Emotion::Affection
        | Emotion::Hope
        | Emotion::Peaceful
        | Emotion::Playful => "positive",
        Emotion::Fear | Emotion::Anxiety => "alarming",
        Emotion::Sadness
        | Emotion::Empathy
        | Emotion::Concern
        | Emotion::Loneliness
        | Emotion::Frustration => "negative",
        _ => "neutral",
    }
}

/// Keyword fallback for scene emotions. The strongest matching keyword
/// wins.
fn scene_keyword_emotion(scene: &str) -> Option<(Emotion, f32)> {
    let table: &[(&str, Emotion, f32)] = &[
        // Positive scenes
        ("smiling", Emotion::Joy, 0.6),
        ("laughing", Emotion::Joy, 0.7),
        ("playing", Emotion::Playful, 0.5),
        ("beautiful", Emotion::Awe, 0.6),
        ("sunset", Emotion::Peaceful, 0.5),
        ("sunrise", Emotion::Hope, 0.5),
        ("flowers", Emotion::Contentment, 0.4),
        ("nature", Emotion::Peaceful, 0.4),
        ("hugging", Emotion::Affection, 0.7),
        ("celebrating", Emotion::Excitement, 0.7),
        ("baby", Emotion::Affection, 0.6),
        ("puppy", Emotion::Affection, 0.6),
        ("kitten", Emotion::Affection, 0.6),
        ("pet", Emotion::Affection, 0.5),
        // Negative scenes
        ("crying", Emotion::Empathy, 0.7),
        ("sad", Emotion::Sadness, 0.6),
        ("angry", Emotion::Concern, 0.5),
        ("fighting", Emotion::Anxiety, 0.6),
        ("broken", Emotion::Sadness, 0.4),
        ("mess", Emotion::Frustration, 0.3),
        ("dark", Emotion::Contemplative, 0.3),
        ("empty", Emotion::Loneliness, 0.4),
        ("alone", Emotion::Empathy, 0.5),
        ("injured", Emotion::Concern, 0.7),
        ("blood", Emotion::Fear, 0.8),
        ("fallen", Emotion::Concern, 0.6),
        // Alarming scenes
        ("fire", Emotion::Fear, 0.9),
        ("smoke", Emotion::Anxiety, 0.7),
        ("weapon", Emotion::Fear, 0.9),
        ("intruder", Emotion::Fear, 0.9),
        ("stranger", Emotion::Anxiety, 0.5),
        ("suspicious", Emotion::Anxiety, 0.6),
        // Neutral / interesting
        ("person", Emotion::Curiosity, 0.3),
        ("working", Emotion::Contentment, 0.3),
        ("reading", Emotion::Contentment, 0.3),
        ("cooking", Emotion::Curiosity, 0.3),
        ("computer", Emotion::Curiosity, 0.2),
        ("movement", Emotion::Curiosity, 0.3),
    ];

    let lower = scene.to_lowercase();
    let mut best: Option<(Emotion, f32)> = None;
    for (keyword, emotion, intensity) in table {
        if lower.contains(keyword) {
            match best {
                Some((_, b)) if b >= *intensity => {}
                _ => best = Some((*emotion, *intensity)),
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_keyword_fallback() {
        let bridge = MultimodalBridge::new();
        let event = bridge
            .process_visual_scene("a person smiling at the camera", "webcam", None)
            .unwrap();
        assert_eq!(event.triggered_emotion, Emotion::Joy);
        assert_eq!(event.sentiment, "positive");
    }

    #[test]
    fn test_strongest_keyword_wins() {
        let (e, i) = scene_keyword_emotion("a person standing near a fire").unwrap();
        assert_eq!(e, Emotion::Fear);
        assert!((i - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_unknown_scene_no_event() {
        let bridge = MultimodalBridge::new();
        assert!(bridge
            .process_visual_scene("gray rectangle on a wall", "webcam", None)
            .is_none());
    }

    #[test]
    fn test_llm_judgment_preferred() {
        let bridge = MultimodalBridge::new();
        let event = bridge
            .process_visual_scene(
                "a person smiling",
                "webcam",
                Some(SceneJudgment {
                    emotion: "awe".into(),
                    intensity: 0.8,
                    sentiment: "positive".into(),
                }),
            )
            .unwrap();
        assert_eq!(event.triggered_emotion, Emotion::Awe);
        assert!((event.intensity - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_duplicate_scene_suppressed() {
        let bridge = MultimodalBridge::new();
        let first = bridge.process_visual_scene("a person smiling warmly", "webcam", None);
        assert!(first.is_some());
        // Same camera, same words, immediately after: suppressed.
        let second = bridge.process_visual_scene("a person smiling warmly", "webcam", None);
        assert!(second.is_none());
        // Different camera is not suppressed.
        let third = bridge.process_visual_scene("a person smiling warmly", "door_cam", None);
        assert!(third.is_some());
    }

    #[test]
    fn test_voice_tone_resonance() {
        let bridge = MultimodalBridge::new();
        let (emotion, intensity) = bridge
            .process_voice_tone(VoiceTone::Sad, 1.0, "user_voice")
            .unwrap();
        assert_eq!(emotion, Emotion::Empathy);
        // base 0.7 × confidence 1.0 × resonance 0.7
        assert!((intensity - 0.49).abs() < 1e-6);
    }

    #[test]
    fn test_neutral_tone_silent() {
        let bridge = MultimodalBridge::new();
        assert!(bridge
            .process_voice_tone(VoiceTone::Neutral, 1.0, "user_voice")
            .is_none());
    }

    #[test]
    fn test_low_confidence_tone_dropped() {
        let bridge = MultimodalBridge::new();
        assert!(bridge
            .process_voice_tone(VoiceTone::Calm, 0.1, "user_voice")
            .is_none());
    }

    #[test]
    fn test_prosody_scaling() {
        let bridge = MultimodalBridge::new();
        let full = bridge.prosody_for(Emotion::Excitement, 1.0);
        assert_eq!(full.rate, "+15%");
        assert_eq!(full.pitch, "+8Hz");
        assert_eq!(full.volume, "+10%");

        let half = bridge.prosody_for(Emotion::Excitement, 0.5);
        assert_eq!(half.rate, "+8%");
        assert_eq!(half.pitch, "+4Hz");
        assert_eq!(half.volume, "+5%");
    }

    #[test]
    fn test_prosody_negative_and_zero_deltas() {
        let bridge = MultimodalBridge::new();
        let p = bridge.prosody_for(Emotion::Sadness, 1.0);
        assert_eq!(p.rate, "-15%");
        assert_eq!(p.volume, "-10%");

        // Tiny intensity rounds to the neutral forms.
        let tiny = bridge.prosody_for(Emotion::Curiosity, 0.01);
        assert_eq!(tiny.rate, "+0%");
        assert_eq!(tiny.pitch, "+0Hz");
    }

    #[test]
    fn test_unmapped_emotion_neutral_prosody() {
        let bridge = MultimodalBridge::new();
        assert!(bridge.prosody_for(Emotion::Disgust, 1.0).is_neutral());
    }

    #[test]
    fn test_infer_tone_from_text() {
        let bridge = MultimodalBridge::new();
        let (tone, _) = bridge.infer_tone_from_text("ugh this is so frustrating").unwrap();
        assert_eq!(tone, VoiceTone::Frustrated);
        assert!(bridge.infer_tone_from_text("the sky is blue").is_none());
    }

    #[test]
    fn test_visual_context_mentions_recent() {
        let bridge = MultimodalBridge::new();
        bridge.process_visual_scene("a puppy playing outside", "webcam", None);
        let ctx = bridge.visual_context();
        assert!(ctx.contains("puppy"));
    }
}
