//! Shared application state for the two Axum routers (§4.8).

use std::sync::Arc;
use std::time::Instant;

use ses_core::{AuthService, LicenseService};
use ses_db::Database;
use tokio::sync::watch;

/// State behind the loopback intake router. Holds only what
/// `POST /api/sync/conversations` and `GET /auth/callback` need.
#[derive(Clone)]
pub struct IntakeState {
    pub db: Database,
    pub auth: Arc<dyn AuthService>,
}

/// State behind the privileged control-plane router.
#[derive(Clone)]
pub struct ControlState {
    pub auth: Arc<dyn AuthService>,
    pub license: Arc<dyn LicenseService>,
    pub start_time: Instant,
    pub shutdown_tx: watch::Sender<bool>,
}

impl ControlState {
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
