use anyhow::{Context, Result};
use anima_core::Emotion;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;

/// One completed round of conversation.
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub ts: i64,
    pub user_input: String,
    pub bot_response: String,
    pub emotion: String,
}

/// Snippets with at least this emotional intensity also land in the
/// emotional memory table.
const EMOTIONAL_MEMORY_THRESHOLD: f32 = 0.6;

#[derive(Clone)]
pub struct ConversationStore {
    pool: Pool<Sqlite>,
}

impl ConversationStore {
    pub async fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }

        let db_url = format!("sqlite://{}?mode=rwc", db_path.as_ref().display());
        let pool = SqlitePoolOptions::new()
            .connect(&db_url)
            .await
            .context("Failed to connect to SQLite database")?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Shared pool for sibling stores (vector memory lives in the same
    /// database file).
    pub fn pool(&self) -> Pool<Sqlite> {
        self.pool.clone()
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS session_memory (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ts INTEGER NOT NULL,
                user_input TEXT NOT NULL,
                bot_response TEXT NOT NULL,
                emotion TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create session_memory table")?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_session_memory_ts ON session_memory(ts)")
            .execute(&self.pool)
            .await
            .context("Failed to create session_memory ts index")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS persistent_memory (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ts INTEGER NOT NULL,
                refined_data TEXT NOT NULL,
                category TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create persistent_memory table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS active_instances (
                instance_name TEXT NOT NULL UNIQUE,
                last_seen INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create active_instances table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS emotional_memory (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ts INTEGER NOT NULL,
                conversation_snippet TEXT NOT NULL,
                emotion_felt TEXT NOT NULL,
                emotional_intensity REAL NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create emotional_memory table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS vector_memory (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ts INTEGER NOT NULL,
                text TEXT NOT NULL,
                emotion TEXT NOT NULL,
                embedding BLOB
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create vector_memory table")?;

        Ok(())
    }

    /// Write one turn. Emotionally intense turns also land in the
    /// emotional memory table for later recall.
    pub async fn save_conversation(
        &self,
        user_input: &str,
        bot_response: &str,
        emotion: Emotion,
        intensity: f32,
    ) -> Result<()> {
        let ts = chrono::Utc::now().timestamp();
        sqlx::query(
            "INSERT INTO session_memory (ts, user_input, bot_response, emotion) VALUES (?, ?, ?, ?)",
        )
        .bind(ts)
        .bind(user_input)
        .bind(bot_response)
        .bind(emotion.as_str())
        .execute(&self.pool)
        .await
        .context("Failed to save conversation turn")?;

        if intensity >= EMOTIONAL_MEMORY_THRESHOLD {
            let snippet: String = format!("User: {}\nReply: {}", user_input, bot_response)
                .chars()
                .take(300)
                .collect();
            sqlx::query(
                "INSERT INTO emotional_memory (ts, conversation_snippet, emotion_felt, emotional_intensity) VALUES (?, ?, ?, ?)",
            )
            .bind(ts)
            .bind(snippet)
            .bind(emotion.as_str())
            .bind(intensity as f64)
            .execute(&self.pool)
            .await
            .context("Failed to save emotional memory")?;
        }

        Ok(())
    }

    /// Most recent turns, oldest first.
    pub async fn recent_conversations(&self, limit: u32) -> Result<Vec<ConversationTurn>> {
        let rows = sqlx::query(
            "SELECT ts, user_input, bot_response, emotion FROM session_memory ORDER BY ts DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch recent conversations")?;

        let mut turns: Vec<ConversationTurn> = rows
            .into_iter()
            .map(|row| ConversationTurn {
                ts: row.get("ts"),
                user_input: row.get("user_input"),
                bot_response: row.get("bot_response"),
                emotion: row.get("emotion"),
            })
            .collect();
        turns.reverse();
        Ok(turns)
    }

    /// Formatted recent-history block for the system prompt.
    pub async fn context_for_llm(&self, max_turns: u32) -> Result<String> {
        let turns = self.recent_conversations(max_turns).await?;
        if turns.is_empty() {
            return Ok(String::new());
        }
        let mut lines = vec!["Recent conversation:".to_string()];
        for t in turns {
            lines.push(format!("User: {}", t.user_input));
            lines.push(format!("You: {}", t.bot_response));
        }
        Ok(lines.join("\n"))
    }

    pub async fn save_persistent(&self, refined_data: &str, category: &str) -> Result<()> {
        sqlx::query("INSERT INTO persistent_memory (ts, refined_data, category) VALUES (?, ?, ?)")
            .bind(chrono::Utc::now().timestamp())
            .bind(refined_data)
            .bind(category)
            .execute(&self.pool)
            .await
            .context("Failed to save persistent memory")?;
        Ok(())
    }

    pub async fn persistent_memories(
        &self,
        category: Option<&str>,
        limit: u32,
    ) -> Result<Vec<String>> {
        let rows = match category {
            Some(cat) => {
                sqlx::query(
                    "SELECT refined_data FROM persistent_memory WHERE category = ? ORDER BY ts DESC LIMIT ?",
                )
                .bind(cat)
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query("SELECT refined_data FROM persistent_memory ORDER BY ts DESC LIMIT ?")
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .context("Failed to fetch persistent memories")?;

        Ok(rows.into_iter().map(|r| r.get("refined_data")).collect())
    }

    /// Prune session turns older than `hours`. Returns rows deleted.
    pub async fn clear_old_sessions(&self, hours: u32) -> Result<u64> {
        let cutoff = chrono::Utc::now().timestamp() - (hours as i64) * 3600;
        let result = sqlx::query("DELETE FROM session_memory WHERE ts < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .context("Failed to clear old sessions")?;
        Ok(result.rows_affected())
    }

    /// Heartbeat for this process so other front-ends can see liveness.
    pub async fn touch_instance(&self, instance_name: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO active_instances (instance_name, last_seen) VALUES (?, ?)
            ON CONFLICT(instance_name) DO UPDATE SET last_seen = excluded.last_seen
            "#,
        )
        .bind(instance_name)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .context("Failed to touch instance")?;
        Ok(())
    }

    pub async fn active_instances(&self, timeout_minutes: u32) -> Result<Vec<String>> {
        let cutoff = chrono::Utc::now().timestamp() - (timeout_minutes as i64) * 60;
        let rows = sqlx::query(
            "SELECT instance_name FROM active_instances WHERE last_seen >= ? ORDER BY instance_name",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch active instances")?;
        Ok(rows.into_iter().map(|r| r.get("instance_name")).collect())
    }

    /// Recent emotionally intense snippets, newest first.
    pub async fn recent_emotional_memories(
        &self,
        limit: u32,
    ) -> Result<Vec<(String, String, f32)>> {
        let rows = sqlx::query(
            "SELECT conversation_snippet, emotion_felt, emotional_intensity FROM emotional_memory ORDER BY ts DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch emotional memories")?;
        Ok(rows
            .into_iter()
            .map(|r| {
                (
                    r.get("conversation_snippet"),
                    r.get("emotion_felt"),
                    r.get::<f64, _>("emotional_intensity") as f32,
                )
            })
            .collect())
    }

    pub async fn conversation_count(&self) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM session_memory")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count conversations")?;
        Ok(row.get::<i64, _>("n") as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> (tempfile::TempDir, ConversationStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ConversationStore::new(dir.path().join("memory.db"))
            .await
            .unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_save_and_recall_turns() {
        let (_dir, store) = test_store().await;
        store
            .save_conversation("hello there", "hi! good to see you", Emotion::Joy, 0.4)
            .await
            .unwrap();
        store
            .save_conversation("how are you", "doing well", Emotion::Contentment, 0.3)
            .await
            .unwrap();

        let turns = store.recent_conversations(10).await.unwrap();
        assert_eq!(turns.len(), 2);
        // Chronological order: earlier turn first.
        assert_eq!(turns[0].user_input, "hello there");
        assert_eq!(turns[1].user_input, "how are you");
        assert_eq!(turns[0].emotion, "joy");
    }

    #[tokio::test]
    async fn test_earlier_turns_remain_after_later_writes() {
        let (_dir, store) = test_store().await;
        for i in 0..20 {
            store
                .save_conversation(&format!("message {}", i), "ack", Emotion::Peaceful, 0.2)
                .await
                .unwrap();
        }
        assert_eq!(store.conversation_count().await.unwrap(), 20);
        let turns = store.recent_conversations(100).await.unwrap();
        assert!(turns.iter().any(|t| t.user_input == "message 0"));
        assert!(turns.iter().any(|t| t.user_input == "message 19"));
    }

    #[tokio::test]
    async fn test_emotional_memory_threshold() {
        let (_dir, store) = test_store().await;
        store
            .save_conversation("mild note", "ok", Emotion::Contentment, 0.3)
            .await
            .unwrap();
        store
            .save_conversation("I got the job!", "that's wonderful!", Emotion::Excitement, 0.9)
            .await
            .unwrap();

        let emotional = store.recent_emotional_memories(10).await.unwrap();
        assert_eq!(emotional.len(), 1);
        assert!(emotional[0].0.contains("I got the job!"));
        assert_eq!(emotional[0].1, "excitement");
        assert!((emotional[0].2 - 0.9).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_context_for_llm_format() {
        let (_dir, store) = test_store().await;
        let empty = store.context_for_llm(5).await.unwrap();
        assert!(empty.is_empty());

        store
            .save_conversation("what's rust", "a systems language", Emotion::Curiosity, 0.5)
            .await
            .unwrap();
        let ctx = store.context_for_llm(5).await.unwrap();
        assert!(ctx.contains("User: what's rust"));
        assert!(ctx.contains("You: a systems language"));
    }

    #[tokio::test]
    async fn test_persistent_memory_categories() {
        let (_dir, store) = test_store().await;
        store.save_persistent("likes tea", "preferences").await.unwrap();
        store.save_persistent("project anima", "projects").await.unwrap();

        let prefs = store
            .persistent_memories(Some("preferences"), 10)
            .await
            .unwrap();
        assert_eq!(prefs, vec!["likes tea".to_string()]);

        let all = store.persistent_memories(None, 10).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_clear_old_sessions_keeps_recent() {
        let (_dir, store) = test_store().await;
        store
            .save_conversation("fresh", "reply", Emotion::Peaceful, 0.2)
            .await
            .unwrap();
        // Nothing is older than 24h yet.
        let deleted = store.clear_old_sessions(24).await.unwrap();
        assert_eq!(deleted, 0);
        assert_eq!(store.conversation_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_instance_heartbeat() {
        let (_dir, store) = test_store().await;
        store.touch_instance("console").await.unwrap();
        store.touch_instance("console").await.unwrap();
        let active = store.active_instances(2).await.unwrap();
        assert_eq!(active, vec!["console".to_string()]);
    }
}
