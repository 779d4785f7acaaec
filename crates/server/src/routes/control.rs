//! Privileged control plane (§4.8): status, license proxy, sign-out, and
//! the graceful-shutdown trigger. Served over the domain socket, never the
//! loopback TCP listener.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use ses_core::{AuthState, LicenseState};

use crate::error::ControlError;
use crate::state::ControlState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum AuthStateWire {
    SignedOut,
    SignedIn,
}

impl From<AuthState> for AuthStateWire {
    fn from(s: AuthState) -> Self {
        match s {
            AuthState::SignedOut => AuthStateWire::SignedOut,
            AuthState::SignedIn => AuthStateWire::SignedIn,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum LicenseStateWire {
    Unlicensed,
    Active,
    Revoked,
}

impl From<LicenseState> for LicenseStateWire {
    fn from(s: LicenseState) -> Self {
        match s {
            LicenseState::Unlicensed => LicenseStateWire::Unlicensed,
            LicenseState::Active => LicenseStateWire::Active,
            LicenseState::Revoked => LicenseStateWire::Revoked,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    auth: AuthStateWire,
    license: LicenseStateWire,
    uptime_secs: u64,
}

async fn status(State(state): State<Arc<ControlState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        auth: state.auth.get_state().await.into(),
        license: state.license.get_state().await.into(),
        uptime_secs: state.uptime_secs(),
    })
}

#[derive(Debug, Serialize)]
pub struct LicenseResponse {
    state: LicenseStateWire,
}

async fn get_license(State(state): State<Arc<ControlState>>) -> Json<LicenseResponse> {
    Json(LicenseResponse { state: state.license.get_state().await.into() })
}

#[derive(Debug, Deserialize)]
pub struct ActivateLicenseRequest {
    key: String,
}

async fn activate_license(
    State(state): State<Arc<ControlState>>,
    Json(body): Json<ActivateLicenseRequest>,
) -> Result<Json<LicenseResponse>, ControlError> {
    state.license.activate(&body.key).await.map_err(ControlError::License)?;
    Ok(Json(LicenseResponse { state: state.license.get_state().await.into() }))
}

async fn signout(State(state): State<Arc<ControlState>>) -> StatusCode {
    state.auth.sign_out().await;
    StatusCode::NO_CONTENT
}

async fn shutdown(State(state): State<Arc<ControlState>>) -> StatusCode {
    let _ = state.shutdown_tx.send(true);
    StatusCode::ACCEPTED
}

/// Build the control-plane router (§4.8).
pub fn router(state: Arc<ControlState>) -> Router {
    Router::new()
        .route("/api/status", get(status))
        .route("/api/license", get(get_license))
        .route("/api/license/activate", post(activate_license))
        .route("/api/signout", post(signout))
        .route("/api/shutdown", post(shutdown))
        .with_state(state)
}
