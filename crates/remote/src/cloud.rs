//! The two cloud sync targets (§4.6 steps 3–4): a document store that takes
//! the full markdown transcript, and a best-effort memory-retention store
//! that takes a short excerpt.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;

use ses_core::RemoteError;

const DOCUMENT_TIMEOUT: Duration = Duration::from_secs(30);
const MEMORY_TIMEOUT: Duration = Duration::from_secs(15);
const DOCUMENT_TYPE_ID: u32 = 4;
const MEMORY_EXCERPT_LIMIT: usize = 500;

#[derive(Debug, Serialize)]
struct DocumentRequest<'a> {
    #[serde(rename = "tenantId")]
    tenant_id: &'a str,
    #[serde(rename = "documentTypeId")]
    document_type_id: u32,
    title: &'a str,
    description: &'a str,
    #[serde(rename = "contentHash")]
    content_hash: &'a str,
    #[serde(rename = "mimeType")]
    mime_type: &'static str,
    metadata: String,
    tags: &'a [String],
    #[serde(rename = "createdBy")]
    created_by: &'static str,
}

#[derive(Debug, Deserialize)]
struct DocumentResponse {
    id: String,
}

/// Bearer-authorized client for the cloud document service.
pub struct DocumentServiceClient {
    http: reqwest::Client,
    base_url: String,
}

impl DocumentServiceClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { http: reqwest::Client::new(), base_url: base_url.into() }
    }

    /// POST the session transcript and return the cloud-assigned document id.
    pub async fn create_document(
        &self,
        bearer: &str,
        tenant_id: &str,
        title: &str,
        content_hash: &str,
        transcript_markdown: &str,
        tags: &[String],
    ) -> Result<String, RemoteError> {
        let metadata = json!({ "transcript": transcript_markdown }).to_string();
        let body = DocumentRequest {
            tenant_id,
            document_type_id: DOCUMENT_TYPE_ID,
            title,
            description: title,
            content_hash,
            mime_type: "application/json",
            metadata,
            tags,
            created_by: "ses-local",
        };

        let response = self
            .http
            .post(format!("{}/api/documents", self.base_url))
            .bearer_auth(bearer)
            .timeout(DOCUMENT_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(RemoteError::AuthInsufficient { status: status.as_u16() });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Transient { status: status.as_u16(), body });
        }

        let parsed: DocumentResponse = response.json().await?;
        Ok(parsed.id)
    }
}

#[derive(Debug, Serialize)]
struct MemoryRequest<'a> {
    content: &'a str,
    importance: u8,
    tags: &'a [String],
}

/// Bearer-authorized client for the cloud memory-retention endpoint. Every
/// call is best-effort: 401/403 and network failures are non-failures per
/// §4.6 step 4 — the caller treats `Ok(false)` and `Err` identically (log
/// and move on), this just distinguishes them for the log line.
pub struct MemoryServiceClient {
    http: reqwest::Client,
    base_url: String,
}

impl MemoryServiceClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { http: reqwest::Client::new(), base_url: base_url.into() }
    }

    /// Returns `Ok(true)` on any 2xx, `Ok(false)` on 401/403 (no scope —
    /// expected and silent), `Err` on anything else.
    pub async fn remember(&self, bearer: &str, content: &str, tags: &[String]) -> Result<bool, RemoteError> {
        let truncated = truncate_excerpt(content);
        let body = MemoryRequest { content: &truncated, importance: 3, tags };

        let response = self
            .http
            .post(format!("{}/api/memories", self.base_url))
            .bearer_auth(bearer)
            .timeout(MEMORY_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Ok(false);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Transient { status: status.as_u16(), body });
        }
        Ok(true)
    }
}

fn truncate_excerpt(content: &str) -> String {
    if content.chars().count() <= MEMORY_EXCERPT_LIMIT {
        content.to_string()
    } else {
        let truncated: String = content.chars().take(MEMORY_EXCERPT_LIMIT).collect();
        format!("{truncated}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn create_document_returns_the_cloud_assigned_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/documents"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": "doc-123"})))
            .mount(&server)
            .await;

        let client = DocumentServiceClient::new(server.uri());
        let id = client
            .create_document("tok", "tenant-1", "title", "hash", "# transcript", &[])
            .await
            .unwrap();
        assert_eq!(id, "doc-123");
    }

    #[tokio::test]
    async fn memory_401_is_reported_as_unavailable_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/memories"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = MemoryServiceClient::new(server.uri());
        let result = client.remember("tok", "hello", &[]).await.unwrap();
        assert!(!result);
    }

    #[tokio::test]
    async fn memory_excerpt_is_truncated_at_500_chars() {
        let long = "a".repeat(600);
        let truncated = truncate_excerpt(&long);
        assert_eq!(truncated.len(), 503); // 500 chars + "..."
        assert!(truncated.ends_with("..."));
    }

    #[tokio::test]
    async fn short_excerpt_is_untouched() {
        assert_eq!(truncate_excerpt("hi"), "hi");
    }
}
