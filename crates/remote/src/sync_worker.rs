//! Remote sync worker (§4.6): drains the local ledger's pending sessions to
//! the two cloud endpoints on an adaptively-paced loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use ses_core::AuthService;
use ses_types::ConversationSession;

use crate::cloud::{DocumentServiceClient, MemoryServiceClient};

const MAX_SESSIONS_PER_PASS: i64 = 10;
const PRODUCTIVE_INTERVAL: Duration = Duration::from_secs(2 * 60);
const IDLE_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Render a session's messages as a markdown transcript for the document
/// service's `metadata.transcript` field (§4.6 step 3).
pub fn format_markdown_transcript(session: &ConversationSession, messages: &[ses_types::ConversationMessage]) -> String {
    let mut out = String::new();
    out.push_str(&format!("# {}\n\n", session.title.as_deref().unwrap_or(&session.external_id)));
    for message in messages {
        let heading = match message.role {
            ses_types::Role::User => "User",
            ses_types::Role::Assistant => "Assistant",
        };
        out.push_str(&format!("## {heading}\n\n{}\n\n", message.content));
    }
    out
}

pub struct SyncWorker {
    pool: SqlitePool,
    auth: Arc<dyn AuthService>,
    document_client: DocumentServiceClient,
    memory_client: MemoryServiceClient,
    tenant_id: String,
}

impl SyncWorker {
    pub fn new(
        pool: SqlitePool,
        auth: Arc<dyn AuthService>,
        document_client: DocumentServiceClient,
        memory_client: MemoryServiceClient,
        tenant_id: String,
    ) -> Self {
        Self { pool, auth, document_client, memory_client, tenant_id }
    }

    /// Run the adaptive-interval loop until `shutdown` fires.
    pub async fn run(self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        loop {
            let synced = self.run_pass().await;
            let next_interval = match synced {
                Some(n) if n > 0 => PRODUCTIVE_INTERVAL,
                _ => IDLE_INTERVAL,
            };

            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                _ = tokio::time::sleep(next_interval) => {}
            }
        }
    }

    /// Run one pass. Returns `None` if the pass aborted early for lack of a
    /// bearer credential (Auth-absent, §7) — treated the same as "zero
    /// synced" for cadence purposes, but logged separately for clarity.
    pub async fn run_pass(&self) -> Option<usize> {
        let Some(bearer) = self.auth.get_access_token().await else {
            debug!("remote sync pass aborted: no bearer credential available");
            return None;
        };

        let pending = match ses_db::get_pending_sync(&self.pool, MAX_SESSIONS_PER_PASS).await {
            Ok(sessions) => sessions,
            Err(e) => {
                warn!("failed to fetch pending sessions: {e}");
                return Some(0);
            }
        };

        let mut synced = 0;
        for session in pending {
            match self.sync_one(&bearer, &session).await {
                Ok(()) => synced += 1,
                Err(e) => warn!(session = %session.external_id, "sync failed for session: {e}"),
            }
        }

        if synced > 0 {
            info!(synced, "remote sync pass complete");
        }
        Some(synced)
    }

    async fn sync_one(&self, bearer: &str, session: &ConversationSession) -> Result<(), ses_core::RemoteError> {
        let messages = ses_db::get_messages(&self.pool, session.id.expect("session from store has an id"))
            .await
            .map_err(|e| ses_core::RemoteError::Transient { status: 0, body: e.to_string() })?;

        let transcript = format_markdown_transcript(session, &messages);
        let tags = vec![session.source.as_db_str().to_string()];

        let doc_id = self
            .document_client
            .create_document(
                bearer,
                &self.tenant_id,
                session.title.as_deref().unwrap_or(&session.external_id),
                &session.content_hash,
                &transcript,
                &tags,
            )
            .await?;

        // Best-effort memory write: any outcome (success, no-scope, error)
        // never blocks marking the session synced.
        if let Some(first_assistant) = messages.iter().find(|m| m.role == ses_types::Role::Assistant) {
            match self.memory_client.remember(bearer, &first_assistant.content, &tags).await {
                Ok(true) => debug!(session = %session.external_id, "memory write succeeded"),
                Ok(false) => debug!(session = %session.external_id, "memory write skipped: no scope"),
                Err(e) => warn!(session = %session.external_id, "memory write failed (non-fatal): {e}"),
            }
        }

        ses_db::mark_synced(&self.pool, session.source, &session.external_id, Utc::now(), Some(&doc_id), true)
            .await
            .map_err(|e| ses_core::RemoteError::Transient { status: 0, body: e.to_string() })?;

        Ok(())
    }
}
