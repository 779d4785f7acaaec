//! Full-text search over messages and observations, backed by the FTS5
//! virtual tables kept current by triggers (§4.1).

use sqlx::{Row, SqlitePool};

use crate::error::StoreResult;

/// Message ids matching `query`, most relevant first (FTS5 `rank`).
pub async fn search_messages(pool: &SqlitePool, query: &str) -> StoreResult<Vec<i64>> {
    let rows = sqlx::query(
        "SELECT rowid FROM messages_fts WHERE messages_fts MATCH ?1 ORDER BY rank",
    )
    .bind(query)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|row| row.get("rowid")).collect())
}

/// Observation ids matching `query`, most relevant first.
pub async fn search_observations(pool: &SqlitePool, query: &str) -> StoreResult<Vec<i64>> {
    let rows = sqlx::query(
        "SELECT rowid FROM observations_fts WHERE observations_fts MATCH ?1 ORDER BY rank",
    )
    .bind(query)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|row| row.get("rowid")).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::upsert_messages;
    use crate::sessions::upsert_session;
    use crate::Database;
    use chrono::Utc;
    use ses_types::{ConversationMessage, ConversationSession, Role, Source};

    #[tokio::test]
    async fn search_finds_inserted_message_content() {
        let db = Database::new_in_memory().await.unwrap();
        let now = Utc::now();
        let session_id = upsert_session(
            db.pool(),
            &ConversationSession {
                id: None,
                source: Source::ClaudeCode,
                external_id: "s1".to_string(),
                title: None,
                created_at: now,
                updated_at: now,
                synced_at: None,
                content_hash: "0".repeat(16),
            },
        )
        .await
        .unwrap();

        upsert_messages(
            db.pool(),
            session_id,
            &[ConversationMessage {
                id: None,
                session_id,
                role: Role::User,
                content: "please refactor the billing module".to_string(),
                created_at: now,
                token_count: None,
            }],
        )
        .await
        .unwrap();

        let hits = search_messages(db.pool(), "billing").await.unwrap();
        assert_eq!(hits.len(), 1);

        let misses = search_messages(db.pool(), "nonexistentword").await.unwrap();
        assert!(misses.is_empty());
    }

    #[tokio::test]
    async fn deleting_a_message_removes_it_from_search() {
        let db = Database::new_in_memory().await.unwrap();
        let now = Utc::now();
        let session_id = upsert_session(
            db.pool(),
            &ConversationSession {
                id: None,
                source: Source::ClaudeCode,
                external_id: "s1".to_string(),
                title: None,
                created_at: now,
                updated_at: now,
                synced_at: None,
                content_hash: "0".repeat(16),
            },
        )
        .await
        .unwrap();

        upsert_messages(
            db.pool(),
            session_id,
            &[ConversationMessage {
                id: None,
                session_id,
                role: Role::User,
                content: "ephemeral note".to_string(),
                created_at: now,
                token_count: None,
            }],
        )
        .await
        .unwrap();
        assert_eq!(search_messages(db.pool(), "ephemeral").await.unwrap().len(), 1);

        sqlx::query("DELETE FROM messages WHERE session_id = ?1")
            .bind(session_id)
            .execute(db.pool())
            .await
            .unwrap();

        assert!(search_messages(db.pool(), "ephemeral").await.unwrap().is_empty());
    }
}
