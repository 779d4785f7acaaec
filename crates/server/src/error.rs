//! Control/intake API error envelope (§7 "the control-plane JSON envelope
//! `{error: \"...\"}`").

use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use ses_core::ErrorKind;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Errors surfaced by the loopback intake and control-plane routers.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("missing or invalid bearer credential")]
    Unauthorized,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("store error: {0}")]
    Store(#[from] ses_db::StoreError),

    #[error("license error: {0}")]
    License(String),
}

impl ControlError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ControlError::Unauthorized => ErrorKind::AuthAbsent,
            ControlError::BadRequest(_) => ErrorKind::Parse,
            ControlError::Store(_) => ErrorKind::Storage,
            ControlError::License(_) => ErrorKind::Configuration,
        }
    }
}

impl IntoResponse for ControlError {
    fn into_response(self) -> Response {
        let status = match &self {
            ControlError::Unauthorized => StatusCode::UNAUTHORIZED,
            ControlError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ControlError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ControlError::License(_) => StatusCode::BAD_REQUEST,
        };
        (status, Json(ErrorResponse { error: self.to_string() })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_maps_to_auth_absent_kind() {
        assert_eq!(ControlError::Unauthorized.kind(), ErrorKind::AuthAbsent);
    }

    #[tokio::test]
    async fn unauthorized_responds_401_with_error_envelope() {
        use axum::body::to_bytes;
        let response = ControlError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let parsed: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed.error, "missing or invalid bearer credential");
    }
}
