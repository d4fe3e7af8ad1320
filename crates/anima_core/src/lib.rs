pub mod config;
pub mod emotion;
pub mod queue;
pub mod store;

pub use config::AnimaConfig;
pub use emotion::{Emotion, Valence};
pub use queue::{MessagePriority, MessageQueue, QueuedMessage};
pub use store::JsonStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Voice prosody adjustments for the TTS collaborator.
///
/// Values are relative deltas in the engine's native syntax
/// ("+10%", "-5Hz"). A default `Prosody` is neutral.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prosody {
    pub rate: String,
    pub pitch: String,
    pub volume: String,
}

impl Default for Prosody {
    fn default() -> Self {
        Self {
            rate: "+0%".to_string(),
            pitch: "+0Hz".to_string(),
            volume: "+0%".to_string(),
        }
    }
}

impl Prosody {
    pub fn is_neutral(&self) -> bool {
        self == &Prosody::default()
    }
}

/// Speech-to-text collaborator. Non-throwing: `None` means silence,
/// timeout, or backend failure. Callers treat all three the same way.
#[async_trait]
pub trait SpeechInput: Send + Sync {
    async fn listen(&self, timeout: Duration) -> Option<String>;
}

/// Text-to-speech collaborator. Prosody is optional; engines that cannot
/// honor it just speak the text with the emotion's stock voice.
#[async_trait]
pub trait SpeechOutput: Send + Sync {
    async fn speak(&self, text: &str, emotion: Emotion, prosody: Option<Prosody>);
}

/// An integration module (music, timers, SSH, email, ...) exposed to the
/// turn pipeline. Handlers are probed in registration order; the first
/// non-`None` reply wins and short-circuits the pipeline.
#[async_trait]
pub trait CapabilityHandler: Send + Sync {
    /// Stable name, used for the capability inventory in the system prompt.
    fn name(&self) -> &'static str;

    /// Attempt to handle the utterance. `lower` is the pre-lowercased
    /// utterance so every handler doesn't re-lowercase it.
    async fn try_handle(&self, utterance: &str, lower: &str) -> Option<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prosody_is_neutral() {
        let p = Prosody::default();
        assert!(p.is_neutral());
        assert_eq!(p.rate, "+0%");
        assert_eq!(p.pitch, "+0Hz");
    }

    #[test]
    fn test_prosody_roundtrip() {
        let p = Prosody {
            rate: "+12%".into(),
            pitch: "-4Hz".into(),
            volume: "+5%".into(),
        };
        let json = serde_json::to_string(&p).unwrap();
        let back: Prosody = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
        assert!(!back.is_neutral());
    }
}
