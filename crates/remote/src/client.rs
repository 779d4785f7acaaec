//! Conversation-provider client (§4.5): paginated JSON fetch of a
//! developer's chat history, rate-limited to 5 requests/second, with three
//! sync modes driven by the dispatch worker (§4.7).

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::SqlitePool;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, warn};

use ses_core::RemoteError;
use ses_types::{ConversationMessage, ConversationSession, Role, Source};

const USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/124.0.0.0 Safari/537.36";
const REFERER: &str = "https://claude.ai/";
const PAGE_LIMIT: u32 = 50;
const RATE_LIMIT_PERMITS: usize = 5;
const RATE_LIMIT_RELEASE_AFTER: Duration = Duration::from_secs(1);

/// Which conversations a sync pass fetches (§4.5 "Sync modes").
#[derive(Debug, Clone)]
pub enum SyncMode {
    /// Iterate every conversation in the organization.
    Bulk,
    /// Fetch exactly the given conversation uuids.
    Targeted(HashSet<String>),
    /// Iterate the paginated listing, stopping at the first row whose
    /// `updated_at` falls before `cutoff`.
    Incremental { cutoff: DateTime<Utc> },
}

impl SyncMode {
    pub fn incremental_default() -> Self {
        SyncMode::Incremental { cutoff: Utc::now() - chrono::Duration::hours(24) }
    }
}

#[derive(Debug, Deserialize)]
struct OrgSummary {
    uuid: String,
}

#[derive(Debug, Deserialize)]
struct ConversationSummary {
    uuid: String,
    #[allow(dead_code)]
    name: Option<String>,
    #[allow(dead_code)]
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct ConversationDetail {
    uuid: String,
    name: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    chat_messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[allow(dead_code)]
    uuid: String,
    sender: String,
    text: String,
    created_at: DateTime<Utc>,
}

/// A coarse token-bucket approximation: acquire a permit, then schedule its
/// return one second later regardless of how long the caller's request
/// takes. At most [`RATE_LIMIT_PERMITS`] acquisitions can be outstanding in
/// any rolling one-second window (§5, §8 property 5).
struct RateLimiter {
    semaphore: Arc<Semaphore>,
}

impl RateLimiter {
    fn new() -> Self {
        Self { semaphore: Arc::new(Semaphore::new(RATE_LIMIT_PERMITS)) }
    }

    async fn acquire(&self) {
        let permit = self.semaphore.clone().acquire_owned().await.expect("semaphore never closed");
        permit.forget();
        let semaphore = self.semaphore.clone();
        tokio::spawn(async move {
            tokio::time::sleep(RATE_LIMIT_RELEASE_AFTER).await;
            semaphore.add_permits(1);
        });
    }
}

/// Thin HTTPS client against the conversation provider, carrying the
/// third-party session cookie obtained by the cookie extractor (§4.4).
pub struct ConversationProviderClient {
    http: reqwest::Client,
    base_url: String,
    cookie: String,
    rate_limiter: RateLimiter,
    org_id: Mutex<Option<String>>,
}

impl ConversationProviderClient {
    pub fn new(base_url: impl Into<String>, cookie: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            cookie: cookie.into(),
            rate_limiter: RateLimiter::new(),
            org_id: Mutex::new(None),
        }
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        // The provider accepts the session cookie under either header name;
        // both are attached so either code path on their end is satisfied.
        self.http
            .request(method, url)
            .header(reqwest::header::COOKIE, format!("sessionKey={}", self.cookie))
            .header("X-Session-Cookie", &self.cookie)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::REFERER, REFERER)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, RemoteError> {
        self.rate_limiter.acquire().await;
        let response = self.request(reqwest::Method::GET, url).send().await?;
        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(RemoteError::AuthInsufficient { status: status.as_u16() });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Transient { status: status.as_u16(), body });
        }
        Ok(response.json::<T>().await?)
    }

    /// The working organization id, fetched once and cached for the
    /// client's lifetime.
    async fn organization_id(&self) -> Result<String, RemoteError> {
        let mut cached = self.org_id.lock().await;
        if let Some(id) = cached.as_ref() {
            return Ok(id.clone());
        }
        let orgs: Vec<OrgSummary> =
            self.get_json(&format!("{}/api/organizations", self.base_url)).await?;
        let id = orgs
            .into_iter()
            .next()
            .map(|o| o.uuid)
            .ok_or_else(|| RemoteError::Transient { status: 200, body: "no organizations".into() })?;
        *cached = Some(id.clone());
        Ok(id)
    }

    async fn list_page(&self, org_id: &str, offset: u32) -> Result<Vec<ConversationSummary>, RemoteError> {
        let url = format!(
            "{}/api/organizations/{org_id}/chat_conversations?limit={PAGE_LIMIT}&offset={offset}",
            self.base_url
        );
        self.get_json(&url).await
    }

    async fn get_conversation(&self, org_id: &str, uuid: &str) -> Result<ConversationDetail, RemoteError> {
        let url = format!("{}/api/organizations/{org_id}/chat_conversations/{uuid}", self.base_url);
        self.get_json(&url).await
    }

    /// Run one sync pass against the local store, writing every fetched
    /// conversation as an upserted session plus its messages. Returns the
    /// number of conversations written.
    pub async fn sync(&self, pool: &SqlitePool, mode: SyncMode) -> Result<usize, RemoteError> {
        let org_id = self.organization_id().await?;
        let uuids = match mode {
            SyncMode::Bulk => self.collect_bulk_uuids(&org_id).await?,
            SyncMode::Targeted(uuids) => uuids.into_iter().collect(),
            SyncMode::Incremental { cutoff } => self.collect_incremental_uuids(&org_id, cutoff).await?,
        };

        let mut synced = 0;
        for uuid in uuids {
            match self.fetch_and_store(pool, &org_id, &uuid).await {
                Ok(()) => synced += 1,
                Err(e) => warn!("failed to sync conversation {uuid}: {e}"),
            }
        }
        Ok(synced)
    }

    async fn collect_bulk_uuids(&self, org_id: &str) -> Result<Vec<String>, RemoteError> {
        let mut uuids = Vec::new();
        let mut offset = 0;
        loop {
            let page = self.list_page(org_id, offset).await?;
            let page_len = page.len();
            uuids.extend(page.into_iter().map(|c| c.uuid));
            if page_len < PAGE_LIMIT as usize {
                break;
            }
            offset += PAGE_LIMIT;
        }
        Ok(uuids)
    }

    async fn collect_incremental_uuids(
        &self,
        org_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<String>, RemoteError> {
        let mut uuids = Vec::new();
        let mut offset = 0;
        'pages: loop {
            let page = self.list_page(org_id, offset).await?;
            if page.is_empty() {
                break;
            }
            let page_len = page.len();
            for summary in page {
                if summary.updated_at < cutoff {
                    break 'pages;
                }
                uuids.push(summary.uuid);
            }
            if page_len < PAGE_LIMIT as usize {
                break;
            }
            offset += PAGE_LIMIT;
        }
        Ok(uuids)
    }

    async fn fetch_and_store(&self, pool: &SqlitePool, org_id: &str, uuid: &str) -> Result<(), RemoteError> {
        let conversation = self.get_conversation(org_id, uuid).await?;
        let message_count = conversation.chat_messages.len();
        let content_hash = ses_core::content_hash(&conversation.uuid, conversation.updated_at, message_count);

        let session = ConversationSession {
            id: None,
            source: Source::ClaudeChat,
            external_id: conversation.uuid.clone(),
            title: conversation.name.clone(),
            created_at: conversation.created_at,
            updated_at: conversation.updated_at,
            synced_at: None,
            content_hash,
        };
        let session_id = ses_db::upsert_session(pool, &session).await.map_err(store_err)?;

        let messages: Vec<ConversationMessage> = conversation
            .chat_messages
            .into_iter()
            .map(|m| ConversationMessage {
                id: None,
                session_id,
                role: if m.sender == "human" { Role::User } else { Role::Assistant },
                content: m.text,
                created_at: m.created_at,
                token_count: None,
            })
            .collect();

        let synced_message_count = messages.len();
        if !messages.is_empty() {
            ses_db::upsert_messages(pool, session_id, &messages).await.map_err(store_err)?;
        }

        debug!(uuid = %conversation.uuid, messages = synced_message_count, "synced conversation");
        Ok(())
    }
}

fn store_err(e: ses_db::StoreError) -> RemoteError {
    // The store's own error taxonomy already distinguishes Storage failures;
    // surfacing it here as a Transient-remote-shaped error keeps the sync
    // loop's branch-on-kind logic in one place (§7).
    RemoteError::Transient { status: 0, body: e.to_string() }
}
