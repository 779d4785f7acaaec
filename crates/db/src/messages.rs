//! Message persistence and lookup (§3, §4.1).

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use ses_types::{ConversationMessage, Role};

use crate::error::StoreResult;

/// Insert messages for a session, skipping any that already exist under the
/// `(session_id, role, created_at)` unique key — ingestion is idempotent,
/// so re-processing the same log lines must not duplicate rows (§8).
pub async fn upsert_messages(
    pool: &SqlitePool,
    session_id: i64,
    messages: &[ConversationMessage],
) -> StoreResult<()> {
    let mut tx = pool.begin().await?;
    for message in messages {
        sqlx::query(
            r#"
            INSERT INTO messages (session_id, role, content, created_at, token_count)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(session_id, role, created_at) DO UPDATE SET
                content = excluded.content,
                token_count = excluded.token_count
            "#,
        )
        .bind(session_id)
        .bind(message.role.as_db_str())
        .bind(&message.content)
        .bind(message.created_at.to_rfc3339())
        .bind(message.token_count)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}

pub async fn get_messages(pool: &SqlitePool, session_id: i64) -> StoreResult<Vec<ConversationMessage>> {
    let rows = sqlx::query(
        "SELECT id, session_id, role, content, created_at, token_count \
         FROM messages WHERE session_id = ?1 ORDER BY created_at ASC, id ASC",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(row_to_message).collect())
}

fn row_to_message(row: sqlx::sqlite::SqliteRow) -> ConversationMessage {
    let role_str: String = row.get("role");
    let created_at: String = row.get("created_at");
    ConversationMessage {
        id: Some(row.get("id")),
        session_id: row.get("session_id"),
        role: Role::from_db_str(&role_str).expect("valid role stored in messages.role"),
        content: row.get("content"),
        created_at: parse_rfc3339(&created_at),
        token_count: row.get("token_count"),
    }
}

fn parse_rfc3339(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
