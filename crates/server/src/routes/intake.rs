//! Loopback HTTP intake (§4.8): receives conversations captured by an
//! auxiliary browser-extension agent and hands auth tokens back from the
//! identity collaborator's redirect.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ses_types::{ConversationMessage, ConversationSession, Role, Source};

use crate::error::ControlError;
use crate::state::IntakeState;

const ALLOW_ORIGIN: &str = "chrome-extension://*";
const ALLOW_HEADERS: &str = "Authorization, Content-Type";

#[derive(Debug, Deserialize)]
pub struct SyncConversationsRequest {
    pub conversations: Vec<IntakeConversation>,
}

#[derive(Debug, Deserialize)]
pub struct IntakeConversation {
    pub uuid: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub messages: Vec<IntakeMessage>,
}

#[derive(Debug, Deserialize)]
pub struct IntakeMessage {
    /// Mirrors the capture agent's wire shape; the store keys messages by
    /// `(session_id, role, created_at)`, not this id.
    #[allow(dead_code)]
    pub uuid: String,
    pub sender: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SyncConversationsResponse {
    pub synced: usize,
}

async fn sync_conversations(
    State(state): State<Arc<IntakeState>>,
    headers: axum::http::HeaderMap,
    Json(body): Json<SyncConversationsRequest>,
) -> Result<Json<SyncConversationsResponse>, ControlError> {
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    let pat = state.auth.get_pat().await;
    match (presented, pat.as_deref()) {
        (Some(p), Some(expected)) if p == expected => {}
        _ => return Err(ControlError::Unauthorized),
    }

    let mut synced = 0;
    for conversation in body.conversations {
        let message_count = conversation.messages.len();
        let content_hash =
            ses_core::content_hash(&conversation.uuid, conversation.updated_at, message_count);

        let session = ConversationSession {
            id: None,
            source: Source::ChatGpt,
            external_id: conversation.uuid,
            title: conversation.name,
            created_at: conversation.created_at,
            updated_at: conversation.updated_at,
            synced_at: None,
            content_hash,
        };
        let session_id = ses_db::upsert_session(state.db.pool(), &session).await?;

        if !conversation.messages.is_empty() {
            let messages: Vec<ConversationMessage> = conversation
                .messages
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
            ses_db::upsert_messages(state.db.pool(), session_id, &messages).await?;
        }
        synced += 1;
    }

    Ok(Json(SyncConversationsResponse { synced }))
}

#[derive(Debug, Deserialize)]
struct AuthCallbackParams {
    refresh: Option<String>,
    access: Option<String>,
}

const CALLBACK_SUCCESS_HTML: &str =
    "<html><body><p>Signed in. You can close this tab.</p></body></html>";
const CALLBACK_FAILURE_HTML: &str =
    "<html><body><p>Sign-in failed: missing token in callback.</p></body></html>";

async fn auth_callback(
    State(state): State<Arc<IntakeState>>,
    Query(params): Query<AuthCallbackParams>,
) -> Response {
    match (params.refresh, params.access) {
        (Some(refresh), Some(access)) => {
            state.auth.handle_auth_callback(&refresh, &access).await;
            Html(CALLBACK_SUCCESS_HTML).into_response()
        }
        _ => (StatusCode::BAD_REQUEST, Html(CALLBACK_FAILURE_HTML)).into_response(),
    }
}

async fn fallback(method: Method) -> StatusCode {
    match method {
        Method::OPTIONS => StatusCode::NO_CONTENT,
        _ => StatusCode::NOT_FOUND,
    }
}

async fn add_cors_headers(request: axum::extract::Request, next: axum::middleware::Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static(ALLOW_ORIGIN));
    headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(ALLOW_HEADERS));
    response
}

/// Build the loopback intake router (§4.8, §6).
pub fn router(state: Arc<IntakeState>) -> Router {
    Router::new()
        .route("/api/sync/conversations", post(sync_conversations))
        .route("/auth/callback", get(auth_callback))
        .fallback(fallback)
        .layer(axum::middleware::from_fn(add_cors_headers))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use ses_core::{AuthState, NullAuthService};
    use tower::ServiceExt;

    struct FixedPatAuth(String);

    #[async_trait::async_trait]
    impl ses_core::AuthService for FixedPatAuth {
        async fn get_access_token(&self) -> Option<String> {
            None
        }
        async fn get_pat(&self) -> Option<String> {
            Some(self.0.clone())
        }
        async fn handle_auth_callback(&self, _refresh: &str, _access: &str) {}
        async fn sign_out(&self) {}
        async fn trigger_reauth(&self) {}
        async fn get_state(&self) -> AuthState {
            AuthState::SignedOut
        }
    }

    async fn state_with_pat(pat: &str) -> Arc<IntakeState> {
        let db = ses_db::Database::new_in_memory().await.unwrap();
        Arc::new(IntakeState { db, auth: Arc::new(FixedPatAuth(pat.to_string())) })
    }

    #[tokio::test]
    async fn options_any_path_returns_204_with_cors_headers() {
        let db = ses_db::Database::new_in_memory().await.unwrap();
        let state = Arc::new(IntakeState { db, auth: Arc::new(NullAuthService) });
        let app = router(state);

        let response = app
            .oneshot(Request::builder().method("OPTIONS").uri("/anything").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), ALLOW_ORIGIN);
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let db = ses_db::Database::new_in_memory().await.unwrap();
        let state = Arc::new(IntakeState { db, auth: Arc::new(NullAuthService) });
        let app = router(state);

        let response = app
            .oneshot(Request::builder().method("GET").uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn sync_rejects_mismatched_bearer() {
        let state = state_with_pat("secret-pat").await;
        let app = router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/sync/conversations")
                    .header("content-type", "application/json")
                    .header("authorization", "Bearer wrong")
                    .body(Body::from(r#"{"conversations":[]}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn sync_with_matching_bearer_upserts_session_and_messages() {
        let state = state_with_pat("secret-pat").await;
        let db = state.db.clone();
        let app = router(state);

        let body = serde_json::json!({
            "conversations": [{
                "uuid": "conv-1",
                "name": "Test",
                "created_at": "2026-01-01T00:00:00Z",
                "updated_at": "2026-01-01T00:05:00Z",
                "messages": [
                    {"uuid": "m1", "sender": "human", "text": "hi", "created_at": "2026-01-01T00:00:00Z"},
                    {"uuid": "m2", "sender": "assistant", "text": "hello", "created_at": "2026-01-01T00:01:00Z"}
                ]
            }]
        });

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/sync/conversations")
                    .header("content-type", "application/json")
                    .header("authorization", "Bearer secret-pat")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let parsed: SyncConversationsResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed.synced, 1);

        let session = ses_db::get_session_by_source_external_id(db.pool(), Source::ChatGpt, "conv-1")
            .await
            .unwrap()
            .expect("session persisted");
        let messages = ses_db::get_messages(db.pool(), session.id.unwrap()).await.unwrap();
        assert_eq!(messages.len(), 2);
    }

    #[tokio::test]
    async fn auth_callback_with_both_tokens_returns_success_page() {
        let db = ses_db::Database::new_in_memory().await.unwrap();
        let state = Arc::new(IntakeState { db, auth: Arc::new(NullAuthService) });
        let app = router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/auth/callback?refresh=r&access=a")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn auth_callback_missing_token_returns_failure_page() {
        let db = ses_db::Database::new_in_memory().await.unwrap();
        let state = Arc::new(IntakeState { db, auth: Arc::new(NullAuthService) });
        let app = router(state);

        let response = app
            .oneshot(Request::builder().method("GET").uri("/auth/callback?refresh=r").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
