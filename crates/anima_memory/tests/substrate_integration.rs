//! Integration tests across the memory substrate: extracted facts flow
//! into the graph, conversation writes survive and are readable as
//! prompt context, and the slow state files round-trip together.

use anima_core::{Emotion, Valence};
use anima_memory::{
    ConversationStore, FactExtractor, FactSource, GoalBook, GoalType, KnowledgeGraph,
    LearnedPreferences, RelationshipTracker, TemporalContinuity,
};

#[tokio::test]
async fn facts_extracted_from_turn_reach_the_graph() {
    let dir = tempfile::tempdir().unwrap();
    let graph = KnowledgeGraph::new(dir.path().join("knowledge_graph.json"));
    let extractor = FactExtractor::new();

    let utterance = "I love astronomy and I'm learning telescope repair";
    for fact in extractor.extract(utterance) {
        graph.add_fact(
            &fact.subject,
            &fact.relation,
            &fact.object,
            fact.confidence,
            FactSource::Learned,
        );
    }

    let conns = graph.connections("user", 1);
    assert!(conns
        .iter()
        .any(|c| c.relation == "likes" && c.target == "astronomy"));
    assert!(conns
        .iter()
        .any(|c| c.relation == "is_learning" && c.target == "telescope"));

    // The round-trip law: add_fact then connections yields the triple.
    graph.add_fact("user", "uses", "binoculars", 0.85, FactSource::Learned);
    let conns = graph.connections("user", 1);
    let found = conns
        .iter()
        .find(|c| c.relation == "uses" && c.target == "binoculars")
        .unwrap();
    assert_eq!(found.source, FactSource::Learned);
}

#[tokio::test]
async fn conversation_history_feeds_next_turn_context() {
    let dir = tempfile::tempdir().unwrap();
    let store = ConversationStore::new(dir.path().join("memory.db"))
        .await
        .unwrap();

    store
        .save_conversation(
            "my sister visits tomorrow",
            "that sounds lovely — are you cooking?",
            Emotion::Joy,
            0.5,
        )
        .await
        .unwrap();

    // What turn N wrote, turn N+1's assembly reads.
    let ctx = store.context_for_llm(5).await.unwrap();
    assert!(ctx.contains("my sister visits tomorrow"));
    assert!(ctx.contains("are you cooking"));
}

#[test]
fn slow_state_files_coexist_in_one_data_dir() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path();

    let relationship = RelationshipTracker::new(data.join("relationship_data.json"));
    let prefs = LearnedPreferences::new(data.join("learned_preferences.json"));
    let goals = GoalBook::new(data.join("goals.json"));
    let temporal = TemporalContinuity::new(data.join("temporal_state.json"));

    relationship.record_interaction(8.0, vec!["books".into()], Valence::Positive);
    prefs.record_topic_interest("books", 1.5);
    goals.create_goal("finish the reading list", GoalType::Learning, 0.6);
    temporal.record_interaction();
    temporal.on_shutdown();

    for file in [
        "relationship_data.json",
        "learned_preferences.json",
        "goals.json",
        "temporal_state.json",
    ] {
        assert!(data.join(file).exists(), "{} missing", file);
    }

    // Fresh handles read the same state back.
    assert_eq!(
        RelationshipTracker::new(data.join("relationship_data.json")).total_interactions(),
        1
    );
    assert_eq!(
        GoalBook::new(data.join("goals.json")).active_goals().len(),
        1
    );
    assert_eq!(
        TemporalContinuity::new(data.join("temporal_state.json")).total_sessions(),
        2
    );
}
