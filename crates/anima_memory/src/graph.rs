//! Knowledge graph
//!
//! An in-memory directed labeled multigraph of fact triples. Duplicate
//! triples merge by taking the max confidence; conflicting triples
//! coexist and confidence decides tiebreaks at query time. Queries are
//! deterministic: traversal order is sorted, never hash order.

use anima_core::JsonStore;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactSource {
    Learned,
    Inferred,
    AutonomousResearch,
}

impl FactSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FactSource::Learned => "learned",
            FactSource::Inferred => "inferred",
            FactSource::AutonomousResearch => "autonomous_research",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fact {
    pub subject: String,
    pub relation: String,
    pub object: String,
    pub confidence: f32,
    pub source: FactSource,
    pub timestamp: i64,
}

/// An outgoing edge reported by `connections`.
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    pub relation: String,
    pub target: String,
    pub source: FactSource,
    pub confidence: f32,
    pub depth: u32,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct GraphData {
    facts: Vec<Fact>,
}

struct GraphInner {
    /// subject → outgoing facts
    edges: HashMap<String, Vec<Fact>>,
    fact_count: usize,
}

pub struct KnowledgeGraph {
    inner: RwLock<GraphInner>,
    store: JsonStore,
}

impl KnowledgeGraph {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let store = JsonStore::new(path.as_ref().to_path_buf());
        let data: GraphData = store.load_or_default(|d: &GraphData| {
            d.facts
                .iter()
                .all(|f| (0.0..=1.0).contains(&f.confidence))
        });

        let mut edges: HashMap<String, Vec<Fact>> = HashMap::new();
        let mut fact_count = 0;
        for fact in data.facts {
            edges.entry(fact.subject.clone()).or_default().push(fact);
            fact_count += 1;
        }
        tracing::info!("knowledge graph loaded: {} facts", fact_count);

        Self {
            inner: RwLock::new(GraphInner { edges, fact_count }),
            store,
        }
    }

    /// Add a fact triple. A duplicate (subject, relation, object) merges
    /// by keeping the higher confidence.
    pub fn add_fact(
        &self,
        subject: &str,
        relation: &str,
        object: &str,
        confidence: f32,
        source: FactSource,
    ) {
        let confidence = confidence.clamp(0.0, 1.0);
        let mut inner = self.inner.write().unwrap();
        let entry = inner.edges.entry(subject.to_string()).or_default();
        if let Some(existing) = entry
            .iter_mut()
            .find(|f| f.relation == relation && f.object == object)
        {
            if confidence > existing.confidence {
                existing.confidence = confidence;
                existing.source = source;
                existing.timestamp = chrono::Utc::now().timestamp();
            }
            return;
        }
        entry.push(Fact {
            subject: subject.to_string(),
            relation: relation.to_string(),
            object: object.to_string(),
            confidence,
            source,
            timestamp: chrono::Utc::now().timestamp(),
        });
        inner.fact_count += 1;
    }

    /// Breadth-first outgoing connections from `node`, up to
    /// `max_depth` hops. Deterministic: edges are sorted by
    /// (relation, target), then by descending confidence.
    pub fn connections(&self, node: &str, max_depth: u32) -> Vec<Connection> {
        let inner = self.inner.read().unwrap();
        let mut out = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<(String, u32)> = VecDeque::new();
        queue.push_back((node.to_string(), 0));
        visited.insert(node.to_string());

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            let Some(edges) = inner.edges.get(&current) else {
                continue;
            };
            let mut sorted: Vec<&Fact> = edges.iter().collect();
            sorted.sort_by(|a, b| {
                a.relation
                    .cmp(&b.relation)
                    .then(a.object.cmp(&b.object))
                    .then(b.confidence.total_cmp(&a.confidence))
            });
            for fact in sorted {
                out.push(Connection {
                    relation: fact.relation.clone(),
                    target: fact.object.clone(),
                    source: fact.source,
                    confidence: fact.confidence,
                    depth: depth + 1,
                });
                if visited.insert(fact.object.clone()) {
                    queue.push_back((fact.object.clone(), depth + 1));
                }
            }
        }
        out
    }

    /// Prompt context: for each utterance word longer than four chars,
    /// the strongest known triples, at most five in total.
    pub fn neighborhood_context(&self, utterance: &str) -> String {
        let mut triples: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for word in utterance
            .to_lowercase()
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
            .filter(|w| w.len() > 4)
        {
            if !seen.insert(word.clone()) {
                continue;
            }
            for conn in self.connections(&word, 1) {
                if triples.len() >= 5 {
                    break;
                }
                triples.push(format!("{} {} {}", word, conn.relation, conn.target));
            }
            if triples.len() >= 5 {
                break;
            }
        }

        if triples.is_empty() {
            String::new()
        } else {
            format!("Known facts:\n{}", triples.join("\n"))
        }
    }

    pub fn fact_count(&self) -> usize {
        self.inner.read().unwrap().fact_count
    }

    /// Persist the whole graph. Called every few turns and at shutdown.
    pub fn save(&self) -> Result<()> {
        let inner = self.inner.read().unwrap();
        let mut facts: Vec<Fact> = inner.edges.values().flatten().cloned().collect();
        facts.sort_by(|a, b| {
            a.subject
                .cmp(&b.subject)
                .then(a.relation.cmp(&b.relation))
                .then(a.object.cmp(&b.object))
        });
        self.store.save(&GraphData { facts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> (tempfile::TempDir, KnowledgeGraph) {
        let dir = tempfile::tempdir().unwrap();
        let g = KnowledgeGraph::new(dir.path().join("knowledge_graph.json"));
        (dir, g)
    }

    #[test]
    fn test_add_and_query_fact() {
        let (_dir, g) = graph();
        g.add_fact("user", "likes", "python", 0.9, FactSource::Learned);
        let conns = g.connections("user", 1);
        assert_eq!(conns.len(), 1);
        assert_eq!(conns[0].relation, "likes");
        assert_eq!(conns[0].target, "python");
        assert_eq!(conns[0].source, FactSource::Learned);
    }

    #[test]
    fn test_duplicate_merges_max_confidence() {
        let (_dir, g) = graph();
        g.add_fact("user", "likes", "rust", 0.6, FactSource::Inferred);
        g.add_fact("user", "likes", "rust", 0.9, FactSource::Learned);
        g.add_fact("user", "likes", "rust", 0.3, FactSource::Inferred);

        assert_eq!(g.fact_count(), 1);
        let conns = g.connections("user", 1);
        assert_eq!(conns.len(), 1);
        assert!((conns[0].confidence - 0.9).abs() < 1e-6);
        assert_eq!(conns[0].source, FactSource::Learned);
    }

    #[test]
    fn test_multigraph_allows_conflicts() {
        let (_dir, g) = graph();
        g.add_fact("coffee", "is_a", "drink", 0.8, FactSource::Learned);
        g.add_fact("coffee", "is_a", "ritual", 0.5, FactSource::Inferred);
        assert_eq!(g.connections("coffee", 1).len(), 2);
    }

    #[test]
    fn test_depth_two_traversal() {
        let (_dir, g) = graph();
        g.add_fact("user", "uses", "docker", 0.85, FactSource::Learned);
        g.add_fact("docker", "requires", "linux", 0.75, FactSource::Learned);

        let depth1 = g.connections("user", 1);
        assert_eq!(depth1.len(), 1);
        let depth2 = g.connections("user", 2);
        assert_eq!(depth2.len(), 2);
        assert!(depth2.iter().any(|c| c.target == "linux" && c.depth == 2));
    }

    #[test]
    fn test_queries_are_deterministic() {
        let (_dir, g) = graph();
        g.add_fact("user", "likes", "tea", 0.8, FactSource::Learned);
        g.add_fact("user", "dislikes", "noise", 0.7, FactSource::Learned);
        g.add_fact("user", "uses", "emacs", 0.9, FactSource::Learned);

        let first = g.connections("user", 1);
        for _ in 0..10 {
            assert_eq!(g.connections("user", 1), first);
        }
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("knowledge_graph.json");
        {
            let g = KnowledgeGraph::new(&path);
            g.add_fact("user", "is_learning", "rust", 0.9, FactSource::Learned);
            g.add_fact("rust", "is_a", "language", 0.7, FactSource::Inferred);
            g.save().unwrap();
        }
        let g = KnowledgeGraph::new(&path);
        assert_eq!(g.fact_count(), 2);
        let conns = g.connections("user", 1);
        assert_eq!(conns[0].target, "rust");
    }

    #[test]
    fn test_corrupt_graph_file_recovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("knowledge_graph.json");
        std::fs::write(&path, "not json").unwrap();
        let g = KnowledgeGraph::new(&path);
        assert_eq!(g.fact_count(), 0);
        assert!(path.with_extension("json.bak").exists());
    }

    #[test]
    fn test_neighborhood_context_caps_at_five() {
        let (_dir, g) = graph();
        for i in 0..8 {
            g.add_fact("python", &format!("rel{}", i), &format!("t{}", i), 0.8, FactSource::Learned);
        }
        let ctx = g.neighborhood_context("tell me about python programming");
        assert!(!ctx.is_empty());
        // Header line plus at most five triples.
        assert!(ctx.lines().count() <= 6);
    }

    #[test]
    fn test_short_words_ignored_in_context() {
        let (_dir, g) = graph();
        g.add_fact("cat", "is_a", "animal", 0.9, FactSource::Learned);
        // "cat" is only three chars, below the context threshold.
        assert!(g.neighborhood_context("my cat is sleepy").is_empty());
    }
}
