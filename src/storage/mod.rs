//! SQLite persistence for completed debate turns
//!
//! Each completed turn is appended as one row; a failed turn is never
//! written. Persistence failures are logged and swallowed - the client
//! already received the content over the stream, so losing the row must
//! not fail the debate.

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::error;

use crate::debate::{DebatePhase, Position, phase_value, position_value};

/// Most recent rows returned by a history fetch.
const HISTORY_FETCH_LIMIT: i64 = 50;

/// One stored turn, as returned to history queries.
#[derive(Debug, Clone, Serialize)]
pub struct StoredMessage {
    pub role: String,
    pub phase: String,
    pub model_id: Option<String>,
    pub content: String,
    pub created_at: Option<chrono::NaiveDateTime>,
}

/// Store for debate turns, shared across concurrent invocations; the
/// pool serializes writes.
#[derive(Clone)]
pub struct DebateStore {
    pool: SqlitePool,
}

impl DebateStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the schema if it does not exist yet.
    pub async fn init(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS debate_messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                session_id TEXT NOT NULL,
                role TEXT NOT NULL,
                phase TEXT NOT NULL,
                model_id TEXT,
                content TEXT NOT NULL,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Append one completed turn. Failures are logged, never propagated.
    pub async fn append(
        &self,
        user_id: &str,
        session_id: &str,
        position: Position,
        phase: DebatePhase,
        model_id: &str,
        content: &str,
    ) {
        let result = sqlx::query(
            r#"
            INSERT INTO debate_messages (user_id, session_id, role, phase, model_id, content)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user_id)
        .bind(session_id)
        .bind(position_value(position))
        .bind(phase_value(phase))
        .bind(model_id)
        .bind(content)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            error!(user_id, session_id, error = %e, "failed to persist turn");
        }
    }

    /// Fetch the most recent turns for a session, oldest first. Errors
    /// are logged and yield an empty list.
    pub async fn fetch(&self, user_id: &str, session_id: &str) -> Vec<StoredMessage> {
        let rows: Result<
            Vec<(String, String, Option<String>, String, Option<chrono::NaiveDateTime>)>,
            sqlx::Error,
        > = sqlx::query_as(
            r#"
            SELECT role, phase, model_id, content, created_at FROM debate_messages
            WHERE user_id = $1 AND session_id = $2
            ORDER BY id DESC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(session_id)
        .bind(HISTORY_FETCH_LIMIT)
        .fetch_all(&self.pool)
        .await;

        match rows {
            Ok(rows) => rows
                .into_iter()
                .rev()
                .map(|(role, phase, model_id, content, created_at)| StoredMessage {
                    role,
                    phase,
                    model_id,
                    content,
                    created_at,
                })
                .collect(),
            Err(e) => {
                error!(user_id, session_id, error = %e, "failed to fetch history");
                Vec::new()
            }
        }
    }
}
