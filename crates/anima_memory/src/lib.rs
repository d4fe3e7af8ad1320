//! The memory substrate
//!
//! Four kinds of remembering, each durable across restarts:
//! conversation turns in SQLite, semantic recall through embeddings,
//! fact triples in the knowledge graph, and the slow-moving self state
//! (relationship, preferences, goals, temporal continuity) in JSON.

pub mod embedding;
pub mod facts;
pub mod goals;
pub mod graph;
pub mod preferences;
pub mod relationship;
pub mod sqlite;
pub mod temporal;
pub mod vector;

pub use embedding::{cosine_similarity, EmbeddingModel};
pub use facts::{ExtractedFact, FactExtractor};
pub use goals::{Goal, GoalBook, GoalStatus, GoalType};
pub use graph::{Connection, Fact, FactSource, KnowledgeGraph};
pub use preferences::LearnedPreferences;
pub use relationship::{RelationshipDepth, RelationshipTracker};
pub use sqlite::{ConversationStore, ConversationTurn};
pub use temporal::{TemporalContinuity, TemporalState};
pub use vector::VectorMemory;
