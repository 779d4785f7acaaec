//! Sync ledger queries: which sessions are pending cloud delivery, and
//! atomically marking a session as synced (§3 SyncLedger, §4.6, §8).

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use ses_types::{ConversationSession, Source};

use crate::error::StoreResult;
use crate::sessions::get_session_by_id;

/// Sessions with `synced_at IS NULL OR updated_at > synced_at`, most
/// recently updated first, capped at `limit` rows (§4.6 fetches at most 10
/// per pass).
pub async fn get_pending_sync(pool: &SqlitePool, limit: i64) -> StoreResult<Vec<ConversationSession>> {
    let rows = sqlx::query(
        "SELECT id FROM sessions \
         WHERE synced_at IS NULL OR updated_at > synced_at \
         ORDER BY updated_at DESC LIMIT ?1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let mut sessions = Vec::with_capacity(rows.len());
    for row in rows {
        let id: i64 = row.get("id");
        if let Some(session) = get_session_by_id(pool, id).await? {
            sessions.push(session);
        }
    }
    Ok(sessions)
}

/// Mark a session synced: update `sessions.synced_at` and upsert the ledger
/// row in one transaction, so the two never observably diverge (§5, §8).
pub async fn mark_synced(
    pool: &SqlitePool,
    source: Source,
    external_id: &str,
    synced_at: DateTime<Utc>,
    doc_service_id: Option<&str>,
    memory_synced: bool,
) -> StoreResult<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "UPDATE sessions SET synced_at = ?1 WHERE source = ?2 AND external_id = ?3",
    )
    .bind(synced_at.to_rfc3339())
    .bind(source.as_db_str())
    .bind(external_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO sync_ledger (source, external_id, last_synced_at, doc_service_id, memory_synced)
        VALUES (?1, ?2, ?3, ?4, ?5)
        ON CONFLICT(source, external_id) DO UPDATE SET
            last_synced_at = excluded.last_synced_at,
            doc_service_id = COALESCE(excluded.doc_service_id, sync_ledger.doc_service_id),
            memory_synced = sync_ledger.memory_synced OR excluded.memory_synced
        "#,
    )
    .bind(source.as_db_str())
    .bind(external_id)
    .bind(synced_at.to_rfc3339())
    .bind(doc_service_id)
    .bind(memory_synced)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::upsert_session;
    use crate::Database;

    async fn seed(pool: &SqlitePool, external_id: &str, synced_at: Option<DateTime<Utc>>) {
        let now = Utc::now();
        upsert_session(
            pool,
            &ConversationSession {
                id: None,
                source: Source::ClaudeCode,
                external_id: external_id.to_string(),
                title: None,
                created_at: now,
                updated_at: now,
                synced_at,
                content_hash: "0".repeat(16),
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn pending_sync_excludes_already_synced_sessions() {
        let db = Database::new_in_memory().await.unwrap();
        seed(db.pool(), "never-synced", None).await;
        seed(db.pool(), "already-synced", Some(Utc::now() + chrono::Duration::seconds(60))).await;

        let pending = get_pending_sync(db.pool(), 10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].external_id, "never-synced");
    }

    #[tokio::test]
    async fn pending_sync_respects_the_limit() {
        let db = Database::new_in_memory().await.unwrap();
        for i in 0..15 {
            seed(db.pool(), &format!("s{i}"), None).await;
        }
        let pending = get_pending_sync(db.pool(), 10).await.unwrap();
        assert_eq!(pending.len(), 10);
    }

    #[tokio::test]
    async fn pending_sync_orders_most_recently_updated_first() {
        let db = Database::new_in_memory().await.unwrap();
        let now = Utc::now();

        upsert_session(
            db.pool(),
            &ConversationSession {
                id: None,
                source: Source::ClaudeCode,
                external_id: "older".to_string(),
                title: None,
                created_at: now,
                updated_at: now,
                synced_at: None,
                content_hash: "0".repeat(16),
            },
        )
        .await
        .unwrap();
        upsert_session(
            db.pool(),
            &ConversationSession {
                id: None,
                source: Source::ClaudeCode,
                external_id: "newer".to_string(),
                title: None,
                created_at: now,
                updated_at: now + chrono::Duration::seconds(60),
                synced_at: None,
                content_hash: "0".repeat(16),
            },
        )
        .await
        .unwrap();

        let pending = get_pending_sync(db.pool(), 10).await.unwrap();
        assert_eq!(pending[0].external_id, "newer");
        assert_eq!(pending[1].external_id, "older");
    }

    #[tokio::test]
    async fn mark_synced_updates_session_and_ledger_together() {
        let db = Database::new_in_memory().await.unwrap();
        seed(db.pool(), "s1", None).await;

        let now = Utc::now();
        mark_synced(db.pool(), Source::ClaudeCode, "s1", now, Some("doc-1"), true)
            .await
            .unwrap();

        let pending = get_pending_sync(db.pool(), 10).await.unwrap();
        assert!(pending.is_empty());

        let row: (Option<String>, Option<String>, i64) = sqlx::query_as(
            "SELECT last_synced_at, doc_service_id, memory_synced FROM sync_ledger \
             WHERE source = 'claude_code' AND external_id = 's1'",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert!(row.0.is_some());
        assert_eq!(row.1.as_deref(), Some("doc-1"));
        assert_eq!(row.2, 1);
    }
}
