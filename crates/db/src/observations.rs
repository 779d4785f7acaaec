//! Observation persistence, sequence-number ordering, and cross-row parent
//! resolution (§3, §4.1, §8 parent-resolution invariant).

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use ses_types::{ConversationObservation, ObservationType};

use crate::error::StoreResult;

/// Insert observations for a session, skipping duplicates under the
/// `(session_id, sequence_number)` unique key, and return each inserted
/// row's database id in the same order as `observations` (so callers can
/// translate batch-local indices from `ses-session-parser` into ids for
/// [`update_observation_parents`]).
pub async fn upsert_observations(
    pool: &SqlitePool,
    session_id: i64,
    observations: &[ConversationObservation],
) -> StoreResult<Vec<i64>> {
    let mut tx = pool.begin().await?;
    let mut ids = Vec::with_capacity(observations.len());
    for observation in observations {
        let id: i64 = sqlx::query(
            r#"
            INSERT INTO observations
                (session_id, observation_type, tool_name, file_path, content,
                 token_count, sequence_number, parent_observation_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(session_id, sequence_number) DO UPDATE SET
                content = excluded.content,
                tool_name = excluded.tool_name,
                file_path = excluded.file_path,
                observation_type = excluded.observation_type,
                token_count = excluded.token_count
            RETURNING id
            "#,
        )
        .bind(session_id)
        .bind(observation.observation_type.as_db_str())
        .bind(&observation.tool_name)
        .bind(&observation.file_path)
        .bind(&observation.content)
        .bind(observation.token_count)
        .bind(observation.sequence_number)
        .bind(observation.parent_observation_id)
        .bind(observation.created_at.to_rfc3339())
        .fetch_one(&mut *tx)
        .await?
        .try_get("id")?;
        ids.push(id);
    }
    tx.commit().await?;
    Ok(ids)
}

/// Resolve deferred `tool_use_id` parent references (§9: only within the
/// same ingestion batch — callers must not carry these across batches).
///
/// `refs` pairs a child observation's database id with its parent's
/// database id, as resolved by the caller from `tool_use_block_ids`.
pub async fn update_observation_parents(pool: &SqlitePool, refs: &[(i64, i64)]) -> StoreResult<()> {
    let mut tx = pool.begin().await?;
    for (child_id, parent_id) in refs {
        sqlx::query("UPDATE observations SET parent_observation_id = ?1 WHERE id = ?2")
            .bind(parent_id)
            .bind(child_id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(())
}

/// The next `sequence_number` to assign for `session_id`, i.e. one past the
/// highest sequence number already stored (0 if the session has none yet).
/// Lets the session-log watcher resume sequencing across ingestion batches
/// for the same session.
pub async fn next_sequence_number(pool: &SqlitePool, session_id: i64) -> StoreResult<i64> {
    let row: (Option<i64>,) =
        sqlx::query_as("SELECT MAX(sequence_number) FROM observations WHERE session_id = ?1")
            .bind(session_id)
            .fetch_one(pool)
            .await?;
    Ok(row.0.map(|max| max + 1).unwrap_or(0))
}

pub async fn get_observations(
    pool: &SqlitePool,
    session_id: i64,
) -> StoreResult<Vec<ConversationObservation>> {
    let rows = sqlx::query(
        "SELECT id, session_id, observation_type, tool_name, file_path, content, \
                token_count, sequence_number, parent_observation_id, created_at \
         FROM observations WHERE session_id = ?1 ORDER BY sequence_number ASC",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(row_to_observation).collect())
}

fn row_to_observation(row: sqlx::sqlite::SqliteRow) -> ConversationObservation {
    let type_str: String = row.get("observation_type");
    let created_at: String = row.get("created_at");
    ConversationObservation {
        id: Some(row.get("id")),
        session_id: row.get("session_id"),
        observation_type: ObservationType::from_db_str(&type_str)
            .expect("valid type stored in observations.observation_type"),
        tool_name: row.get("tool_name"),
        file_path: row.get("file_path"),
        content: row.get("content"),
        token_count: row.get("token_count"),
        sequence_number: row.get("sequence_number"),
        parent_observation_id: row.get("parent_observation_id"),
        created_at: parse_rfc3339(&created_at),
    }
}

fn parse_rfc3339(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
