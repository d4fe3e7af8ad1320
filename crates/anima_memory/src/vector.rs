//! Vector memory
//!
//! Semantic recall over past exchanges. The contract is narrow: store,
//! search, and a formatted context string. Every failure path degrades
//! to empty results; a broken embedding backend must never take the
//! conversation down with it.

use crate::embedding::{cosine_similarity, from_blob, to_blob, EmbeddingModel};
use anima_core::Emotion;
use anyhow::{Context, Result};
use sqlx::{Pool, Row, Sqlite};

/// Only the most recent rows are ranked; old exchanges fade out of
/// semantic reach the same way they fade from the prompt window.
const SEARCH_WINDOW: u32 = 500;

pub struct VectorMemory {
    pool: Pool<Sqlite>,
    model: EmbeddingModel,
}

impl VectorMemory {
    /// Requires a migrated pool from `ConversationStore`. Fails when the
    /// embedding model cannot initialize; the caller installs a stub.
    pub fn new(pool: Pool<Sqlite>) -> Result<Self> {
        let model = EmbeddingModel::new().context("Failed to initialize embedding model")?;
        Ok(Self { pool, model })
    }

    /// Store one exchange for later semantic recall.
    pub async fn store(&self, user: &str, reply: &str, emotion: Emotion) -> Result<()> {
        let text = format!("User: {}\nReply: {}", user, reply);
        let embedding = self.model.embed(&text)?;
        sqlx::query("INSERT INTO vector_memory (ts, text, emotion, embedding) VALUES (?, ?, ?, ?)")
            .bind(chrono::Utc::now().timestamp())
            .bind(&text)
            .bind(emotion.as_str())
            .bind(to_blob(&embedding))
            .execute(&self.pool)
            .await
            .context("Failed to store vector memory")?;
        Ok(())
    }

    /// Top-k similar stored texts with scores, best first. Any backend
    /// failure returns an empty list.
    pub async fn search_similar(&self, query: &str, k: usize) -> Vec<(String, f32)> {
        match self.search_inner(query, k).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!("vector search failed, returning empty: {}", e);
                Vec::new()
            }
        }
    }

    async fn search_inner(&self, query: &str, k: usize) -> Result<Vec<(String, f32)>> {
        let query_embedding = self.model.embed(query)?;
        let rows = sqlx::query(
            "SELECT text, embedding FROM vector_memory ORDER BY ts DESC LIMIT ?",
        )
        .bind(SEARCH_WINDOW)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch vector rows")?;

        let mut scored: Vec<(String, f32)> = rows
            .into_iter()
            .filter_map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let stored = from_blob(&blob);
                let score = cosine_similarity(&query_embedding, &stored);
                if score > 0.0 {
                    Some((row.get("text"), score))
                } else {
                    None
                }
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);
        Ok(scored)
    }

    /// Formatted recall block for the prompt; empty when nothing
    /// relevant is stored.
    pub async fn relevant_context(&self, query: &str, k: usize) -> String {
        let hits = self.search_similar(query, k).await;
        if hits.is_empty() {
            return String::new();
        }
        let mut lines = vec!["Related memories:".to_string()];
        for (text, score) in hits {
            let snippet: String = text.chars().take(160).collect();
            lines.push(format!("- ({:.2}) {}", score, snippet.replace('\n', " / ")));
        }
        lines.join("\n")
    }
}
