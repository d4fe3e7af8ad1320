//! The closed emotion vocabulary
//!
//! Every subsystem that talks about feelings uses these thirty labels.
//! Free-text emotion strings from the LLM are parsed back into the
//! vocabulary with `parse_str`; anything unrecognized is dropped rather
//! than invented.

use serde::{Deserialize, Serialize};

/// Broad valence class used for decay rates and mood congruence checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Valence {
    Positive,
    Negative,
    Neutral,
}

/// The thirty emotions Anima can feel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Emotion {
    Joy,
    Sadness,
    Anger,
    Fear,
    Surprise,
    Disgust,
    Curiosity,
    Affection,
    Anxiety,
    Empathy,
    Loneliness,
    Hope,
    Frustration,
    Peaceful,
    Playful,
    Contemplative,
    Awe,
    Gratitude,
    Pride,
    Concern,
    Contentment,
    Determination,
    Embarrassment,
    Shame,
    Regret,
    Contempt,
    Doubt,
    Tenderness,
    Excitement,
    Annoyance,
}

impl Emotion {
    pub const ALL: [Emotion; 30] = [
        Emotion::Joy,
        Emotion::Sadness,
        Emotion::Anger,
        Emotion::Fear,
        Emotion::Surprise,
        Emotion::Disgust,
        Emotion::Curiosity,
        Emotion::Affection,
        Emotion::Anxiety,
        Emotion::Empathy,
        Emotion::Loneliness,
        Emotion::Hope,
        Emotion::Frustration,
        Emotion::Peaceful,
        Emotion::Playful,
        Emotion::Contemplative,
        Emotion::Awe,
        Emotion::Gratitude,
        Emotion::Pride,
        Emotion::Concern,
        Emotion::Contentment,
        Emotion::Determination,
        Emotion::Embarrassment,
        Emotion::Shame,
        Emotion::Regret,
        Emotion::Contempt,
        Emotion::Doubt,
        Emotion::Tenderness,
        Emotion::Excitement,
        Emotion::Annoyance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Joy => "joy",
            Emotion::Sadness => "sadness",
            Emotion::Anger => "anger",
            Emotion::Fear => "fear",
            Emotion::Surprise => "surprise",
            Emotion::Disgust => "disgust",
            Emotion::Curiosity => "curiosity",
            Emotion::Affection => "affection",
            Emotion::Anxiety => "anxiety",
            Emotion::Empathy => "empathy",
            Emotion::Loneliness => "loneliness",
            Emotion::Hope => "hope",
            Emotion::Frustration => "frustration",
            Emotion::Peaceful => "peaceful",
            Emotion::Playful => "playful",
            Emotion::Contemplative => "contemplative",
            Emotion::Awe => "awe",
            Emotion::Gratitude => "gratitude",
            Emotion::Pride => "pride",
            Emotion::Concern => "concern",
            Emotion::Contentment => "contentment",
            Emotion::Determination => "determination",
            Emotion::Embarrassment => "embarrassment",
            Emotion::Shame => "shame",
            Emotion::Regret => "regret",
            Emotion::Contempt => "contempt",
            Emotion::Doubt => "doubt",
            Emotion::Tenderness => "tenderness",
            Emotion::Excitement => "excitement",
            Emotion::Annoyance => "annoyance",
        }
    }

    /// Parse from a string, case-insensitive. Accepts a few common
    /// synonyms the LLM likes to produce.
    pub fn parse_str(s: &str) -> Option<Emotion> {
        let lower = s.trim().to_lowercase();
        for e in Emotion::ALL {
            if e.as_str() == lower {
                return Some(e);
            }
        }
        match lower.as_str() {
            "happy" | "happiness" => Some(Emotion::Joy),
            "sad" => Some(Emotion::Sadness),
            "angry" => Some(Emotion::Anger),
            "afraid" | "scared" => Some(Emotion::Fear),
            "surprised" => Some(Emotion::Surprise),
            "curious" => Some(Emotion::Curiosity),
            "anxious" | "nervous" | "worry" | "worried" => Some(Emotion::Anxiety),
            "lonely" => Some(Emotion::Loneliness),
            "frustrated" => Some(Emotion::Frustration),
            "calm" | "calmness" | "serenity" | "serene" => Some(Emotion::Peaceful),
            "content" => Some(Emotion::Contentment),
            "proud" => Some(Emotion::Pride),
            "grateful" => Some(Emotion::Gratitude),
            "excited" => Some(Emotion::Excitement),
            "annoyed" => Some(Emotion::Annoyance),
            "love" => Some(Emotion::Affection),
            "interest" | "interested" => Some(Emotion::Curiosity),
            "confused" | "confusion" => Some(Emotion::Doubt),
            _ => None,
        }
    }

    pub fn valence(&self) -> Valence {
        match self {
            Emotion::Joy
            | Emotion::Curiosity
            | Emotion::Affection
            | Emotion::Hope
            | Emotion::Peaceful
            | Emotion::Playful
            | Emotion::Awe
            | Emotion::Gratitude
            | Emotion::Pride
            | Emotion::Contentment
            | Emotion::Determination
            | Emotion::Tenderness
            | Emotion::Excitement => Valence::Positive,

            Emotion::Sadness
            | Emotion::Anger
            | Emotion::Fear
            | Emotion::Disgust
            | Emotion::Anxiety
            | Emotion::Loneliness
            | Emotion::Frustration
            | Emotion::Embarrassment
            | Emotion::Shame
            | Emotion::Regret
            | Emotion::Contempt
            | Emotion::Annoyance => Valence::Negative,

            Emotion::Surprise
            | Emotion::Empathy
            | Emotion::Contemplative
            | Emotion::Concern
            | Emotion::Doubt => Valence::Neutral,
        }
    }

    /// Baseline intensity an emotion starts from before context modifiers.
    pub fn base_intensity(&self) -> f32 {
        match self {
            Emotion::Excitement | Emotion::Anger | Emotion::Fear | Emotion::Awe => 0.7,
            Emotion::Joy
            | Emotion::Surprise
            | Emotion::Gratitude
            | Emotion::Pride
            | Emotion::Frustration
            | Emotion::Anxiety
            | Emotion::Determination => 0.6,
            Emotion::Sadness
            | Emotion::Curiosity
            | Emotion::Affection
            | Emotion::Empathy
            | Emotion::Loneliness
            | Emotion::Concern
            | Emotion::Embarrassment
            | Emotion::Shame
            | Emotion::Tenderness => 0.5,
            Emotion::Disgust
            | Emotion::Hope
            | Emotion::Playful
            | Emotion::Regret
            | Emotion::Contempt
            | Emotion::Annoyance => 0.4,
            Emotion::Peaceful | Emotion::Contemplative | Emotion::Contentment | Emotion::Doubt => {
                0.3
            }
        }
    }
}

impl Default for Emotion {
    fn default() -> Self {
        Emotion::Peaceful
    }
}

impl std::fmt::Display for Emotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detect an emotion from reply text by keyword scan. Used by the
/// post-LLM hook that tags each turn with the feeling it carried.
pub fn detect_emotion_in_text(text: &str) -> Option<Emotion> {
    let lower = text.to_lowercase();
    for e in Emotion::ALL {
        if lower.contains(e.as_str()) {
            return Some(e);
        }
    }
    // Weaker signals: punctuation and common affect words.
    if lower.contains("!!") || lower.contains("wow") || lower.contains("amazing") {
        return Some(Emotion::Excitement);
    }
    if lower.contains("i'm sorry") || lower.contains("that's hard") {
        return Some(Emotion::Empathy);
    }
    if lower.contains("thank") {
        return Some(Emotion::Gratitude);
    }
    if lower.contains('?') && lower.contains("wonder") {
        return Some(Emotion::Curiosity);
    }
    None
}

/// Detect the user's emotional state from their utterance via marker
/// words. Distinct from `detect_emotion_in_text`: users rarely name
/// their feelings, they show them.
pub fn detect_user_emotion(lower: &str) -> Option<Emotion> {
    let table: &[(&[&str], Emotion)] = &[
        (
            &["hate", "terrible", "awful", "furious", "angry", "worst"],
            Emotion::Anger,
        ),
        (
            &["sad", "crying", "miserable", "depressed", "heartbroken"],
            Emotion::Sadness,
        ),
        (
            &["scared", "afraid", "terrified", "panicking"],
            Emotion::Fear,
        ),
        (
            &["worried", "anxious", "nervous", "stressed"],
            Emotion::Anxiety,
        ),
        (
            &["thank you", "thanks", "grateful", "appreciate"],
            Emotion::Gratitude,
        ),
        (
            &["so excited", "can't wait", "thrilled"],
            Emotion::Excitement,
        ),
        (
            &["love", "amazing", "wonderful", "great news", "happy", "glad"],
            Emotion::Joy,
        ),
        (
            &["confused", "don't understand", "makes no sense"],
            Emotion::Doubt,
        ),
        (
            &["curious", "wonder", "what if"],
            Emotion::Curiosity,
        ),
        (
            &["frustrating", "annoying", "ugh"],
            Emotion::Frustration,
        ),
        (
            &["lonely", "alone", "miss you"],
            Emotion::Loneliness,
        ),
    ];
    for (markers, emotion) in table {
        if markers.iter().any(|m| lower.contains(m)) {
            return Some(*emotion);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_is_closed_and_parseable() {
        for e in Emotion::ALL {
            assert_eq!(Emotion::parse_str(e.as_str()), Some(e));
        }
        assert_eq!(Emotion::ALL.len(), 30);
    }

    #[test]
    fn test_parse_synonyms() {
        assert_eq!(Emotion::parse_str("Happy"), Some(Emotion::Joy));
        assert_eq!(Emotion::parse_str("CALM"), Some(Emotion::Peaceful));
        assert_eq!(Emotion::parse_str("worried"), Some(Emotion::Anxiety));
        assert_eq!(Emotion::parse_str("nonsense-word"), None);
    }

    #[test]
    fn test_base_intensity_in_range() {
        for e in Emotion::ALL {
            let i = e.base_intensity();
            assert!(i > 0.0 && i <= 1.0, "{} out of range: {}", e, i);
        }
    }

    #[test]
    fn test_detect_emotion_in_text() {
        assert_eq!(
            detect_emotion_in_text("I feel such curiosity about this"),
            Some(Emotion::Curiosity)
        );
        assert_eq!(
            detect_emotion_in_text("Wow!! that is great"),
            Some(Emotion::Excitement)
        );
        assert_eq!(detect_emotion_in_text("the weather report"), None);
    }

    #[test]
    fn test_detect_user_emotion_markers() {
        assert_eq!(
            detect_user_emotion("i hate this, it's terrible"),
            Some(Emotion::Anger)
        );
        assert_eq!(
            detect_user_emotion("thank you so much"),
            Some(Emotion::Gratitude)
        );
        assert_eq!(
            detect_user_emotion("i'm worried about tomorrow"),
            Some(Emotion::Anxiety)
        );
        assert_eq!(detect_user_emotion("the sky is blue"), None);
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&Emotion::Contemplative).unwrap();
        assert_eq!(json, "\"contemplative\"");
        let back: Emotion = serde_json::from_str("\"awe\"").unwrap();
        assert_eq!(back, Emotion::Awe);
    }
}
