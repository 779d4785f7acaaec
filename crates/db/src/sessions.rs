//! Session upsert and lookup queries (§3, §4.1).

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use ses_types::{ConversationSession, Source};

use crate::error::StoreResult;

/// Insert a session, or update it in place when `(source, external_id)`
/// already exists. Returns the row's id either way.
pub async fn upsert_session(pool: &SqlitePool, session: &ConversationSession) -> StoreResult<i64> {
    let id: i64 = sqlx::query(
        r#"
        INSERT INTO sessions (source, external_id, title, created_at, updated_at, synced_at, content_hash)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT(source, external_id) DO UPDATE SET
            title = excluded.title,
            updated_at = excluded.updated_at,
            content_hash = excluded.content_hash
        RETURNING id
        "#,
    )
    .bind(session.source.as_db_str())
    .bind(&session.external_id)
    .bind(&session.title)
    .bind(session.created_at.to_rfc3339())
    .bind(session.updated_at.to_rfc3339())
    .bind(session.synced_at.map(|t| t.to_rfc3339()))
    .bind(&session.content_hash)
    .fetch_one(pool)
    .await?
    .try_get("id")?;

    Ok(id)
}

pub async fn get_session_by_source_external_id(
    pool: &SqlitePool,
    source: Source,
    external_id: &str,
) -> StoreResult<Option<ConversationSession>> {
    let row = sqlx::query(
        "SELECT id, source, external_id, title, created_at, updated_at, synced_at, content_hash \
         FROM sessions WHERE source = ?1 AND external_id = ?2",
    )
    .bind(source.as_db_str())
    .bind(external_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(row_to_session))
}

pub async fn get_session_by_id(pool: &SqlitePool, id: i64) -> StoreResult<Option<ConversationSession>> {
    let row = sqlx::query(
        "SELECT id, source, external_id, title, created_at, updated_at, synced_at, content_hash \
         FROM sessions WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(row_to_session))
}

fn row_to_session(row: sqlx::sqlite::SqliteRow) -> ConversationSession {
    let source_str: String = row.get("source");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");
    let synced_at: Option<String> = row.get("synced_at");

    ConversationSession {
        id: Some(row.get("id")),
        source: Source::from_db_str(&source_str).expect("valid source stored in sessions.source"),
        external_id: row.get("external_id"),
        title: row.get("title"),
        created_at: parse_rfc3339(&created_at),
        updated_at: parse_rfc3339(&updated_at),
        synced_at: synced_at.as_deref().map(parse_rfc3339),
        content_hash: row.get("content_hash"),
    }
}

fn parse_rfc3339(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    fn sample_session(external_id: &str) -> ConversationSession {
        let now = Utc::now();
        ConversationSession {
            id: None,
            source: Source::ClaudeCode,
            external_id: external_id.to_string(),
            title: Some("proj/sess".to_string()),
            created_at: now,
            updated_at: now,
            synced_at: None,
            content_hash: "0".repeat(16),
        }
    }

    #[tokio::test]
    async fn upsert_inserts_new_session() {
        let db = Database::new_in_memory().await.unwrap();
        let id = upsert_session(db.pool(), &sample_session("s1")).await.unwrap();
        let fetched = get_session_by_id(db.pool(), id).await.unwrap().unwrap();
        assert_eq!(fetched.external_id, "s1");
    }

    #[tokio::test]
    async fn upsert_on_conflict_updates_in_place() {
        let db = Database::new_in_memory().await.unwrap();
        let mut session = sample_session("s1");
        let id1 = upsert_session(db.pool(), &session).await.unwrap();

        session.title = Some("renamed".to_string());
        let id2 = upsert_session(db.pool(), &session).await.unwrap();
        assert_eq!(id1, id2);

        let fetched = get_session_by_id(db.pool(), id1).await.unwrap().unwrap();
        assert_eq!(fetched.title.as_deref(), Some("renamed"));
    }

    #[tokio::test]
    async fn lookup_by_source_and_external_id_round_trips() {
        let db = Database::new_in_memory().await.unwrap();
        upsert_session(db.pool(), &sample_session("s1")).await.unwrap();

        let found = get_session_by_source_external_id(db.pool(), Source::ClaudeCode, "s1")
            .await
            .unwrap();
        assert!(found.is_some());

        let missing = get_session_by_source_external_id(db.pool(), Source::ClaudeCode, "nope")
            .await
            .unwrap();
        assert!(missing.is_none());
    }
}
