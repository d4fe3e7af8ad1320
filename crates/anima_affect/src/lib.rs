//! The affective system
//!
//! Emotions here are state, not decoration: they are generated from
//! causes, coexist, decay on the wall clock, survive restarts as a
//! snapshot, and feed both the reply pipeline and the autonomous loop.

pub mod bridge;
pub mod expectation;
pub mod situations;
pub mod snapshot;
pub mod system;

pub use bridge::{MultimodalBridge, SceneJudgment, VisualEmotionEvent, VoiceTone, VoiceToneEvent};
pub use expectation::{
    Expectation, ExpectationCategory, ExpectationModel, LengthClass, SurpriseEvent,
};
pub use situations::Situation;
pub use snapshot::{EmotionalSnapshot, SnapshotStore};
pub use system::{ActiveEmotion, AffectiveSystem, EmotionContext, Mood};
