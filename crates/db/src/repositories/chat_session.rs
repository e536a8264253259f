use sqlx::{sqlite::SqliteRow, Row};

use maitred_core::domain::user::UserId;

use super::user::parse_timestamp;
use super::{ChatSessionRepository, RepositoryError, SessionRecord};
use crate::DbPool;

pub struct SqlChatSessionRepository {
    pool: DbPool,
}

impl SqlChatSessionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ChatSessionRepository for SqlChatSessionRepository {
    async fn find(&self, session_id: &str) -> Result<Option<SessionRecord>, RepositoryError> {
        let row = sqlx::query(
            "SELECT session_id, user_id, history_json, created_at, updated_at
             FROM chat_sessions
             WHERE session_id = ?",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(session_from_row).transpose()
    }

    async fn find_for_user(&self, owner: UserId) -> Result<Option<SessionRecord>, RepositoryError> {
        let row = sqlx::query(
            "SELECT session_id, user_id, history_json, created_at, updated_at
             FROM chat_sessions
             WHERE user_id = ?",
        )
        .bind(owner.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(session_from_row).transpose()
    }

    async fn save(&self, session: SessionRecord) -> Result<(), RepositoryError> {
        let history_json = serde_json::to_string(&session.history)
            .map_err(|error| RepositoryError::Decode(format!("history encode: {error}")))?;

        // user_id is UNIQUE: saving under a new session id re-keys the user's
        // single row instead of inserting a second one.
        sqlx::query(
            "INSERT INTO chat_sessions (session_id, user_id, history_json, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(session_id) DO UPDATE SET
                history_json = excluded.history_json,
                updated_at = excluded.updated_at
             ON CONFLICT(user_id) DO UPDATE SET
                session_id = excluded.session_id,
                history_json = excluded.history_json,
                updated_at = excluded.updated_at",
        )
        .bind(&session.session_id)
        .bind(session.owner.0)
        .bind(history_json)
        .bind(session.created_at.to_rfc3339())
        .bind(session.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM chat_sessions WHERE session_id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

fn session_from_row(row: SqliteRow) -> Result<SessionRecord, RepositoryError> {
    let history_raw = row.try_get::<String, _>("history_json")?;
    let history = serde_json::from_str(&history_raw)
        .map_err(|error| RepositoryError::Decode(format!("invalid history_json: {error}")))?;

    Ok(SessionRecord {
        session_id: row.try_get("session_id")?,
        owner: UserId(row.try_get("user_id")?),
        history,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}
