//! The mind: orchestration, safety, autonomy
//!
//! This crate threads the sentience subsystems into the turn pipeline,
//! gates shell commands behind the safety classifier, and runs the
//! autonomous life loop and background task scheduler alongside.

pub mod autonomy;
pub mod cascade;
pub mod context;
pub mod llm;
pub mod metacognition;
pub mod pipeline;
pub mod providers;
pub mod router;
pub mod safety;
pub mod tasks;

pub use autonomy::{ActivityRecord, AutonomousLife, PresenceTracker};
pub use cascade::ContextCascade;
pub use context::ContextAssembler;
pub use llm::{GenerateRequest, LlmProvider};
pub use metacognition::{CognitiveBias, Metacognition, ResponseAssessment};
pub use pipeline::Orchestrator;
pub use providers::{MockProvider, OllamaProvider};
pub use router::{IdentityHandler, IntentRouter, TimerHandler};
pub use safety::{CommandGate, CommandRecord, CommandStats, SafetyLevel, SafetyRules};
pub use tasks::BackgroundTasks;
