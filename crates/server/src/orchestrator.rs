//! Wires every component together, enforces single-instance, performs the
//! startup auth check, and drives graceful shutdown (§4.9).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ses_activity::{DispatchWorker, Notifier};
use ses_core::{AuthService, Config, LicenseService, NullAuthService, NullLicenseService};
use ses_db::Database;
use ses_ingest::{LdbScanner, SessionLogWatcher};
use ses_remote::{ConversationProviderClient, DocumentServiceClient, MemoryServiceClient, SyncWorker};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::lock;
use crate::routes::{control, intake};
use crate::state::{ControlState, IntakeState};
use crate::unix_serve;

const INTAKE_PORT: u16 = 37780;
const SHUTDOWN_DRAIN: Duration = Duration::from_secs(5);

/// Best-effort OS-specific location of the third-party Chromium cookie
/// store (§6 "Third-party cookie store: OS-specific SQLite file").
fn default_cookie_db_path() -> Option<PathBuf> {
    let home = dirs::home_dir()?;
    if cfg!(target_os = "macos") {
        Some(home.join("Library/Application Support/Google/Chrome/Default/Cookies"))
    } else if cfg!(target_os = "windows") {
        Some(home.join(r"AppData\Local\Google\Chrome\User Data\Default\Network\Cookies"))
    } else if cfg!(target_os = "linux") {
        Some(home.join(".config/google-chrome/Default/Cookies"))
    } else {
        None
    }
}

/// Best-effort OS-specific location of the third-party local-storage root
/// scanned by the `.ldb` scanner (§4.3, §6).
fn default_local_storage_dir() -> Option<PathBuf> {
    let home = dirs::home_dir()?;
    if cfg!(target_os = "macos") {
        Some(home.join("Library/Application Support/Claude/Local Storage/leveldb"))
    } else if cfg!(target_os = "windows") {
        Some(home.join(r"AppData\Roaming\Claude\Local Storage\leveldb"))
    } else if cfg!(target_os = "linux") {
        Some(home.join(".config/Claude/Local Storage/leveldb"))
    } else {
        None
    }
}

pub struct Orchestrator {
    config: Config,
}

impl Orchestrator {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run until a shutdown signal (OS interrupt or control-plane
    /// `/api/shutdown`) is received, then drain every component.
    pub async fn run(self) -> anyhow::Result<()> {
        let _instance_lock = match lock::acquire(&self.config.lock_path)? {
            Some(lock) => lock,
            None => {
                eprintln!("ses-local is already running; exiting");
                std::process::exit(0);
            }
        };

        let db = Database::new(&self.config.db_path).await?;

        let auth: Arc<dyn AuthService> = Arc::new(NullAuthService);
        let license: Arc<dyn LicenseService> = Arc::new(NullLicenseService);

        let auth_state = auth.get_state().await;
        info!(?auth_state, "startup authentication check complete");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let notifier = Notifier::new();
        let mut workers = Vec::new();

        if self.config.enable_claude_code_sync {
            let watcher =
                Arc::new(SessionLogWatcher::new(db.clone(), self.config.offsets_path.clone()).await);
            let root = self.config.claude_projects_dir.clone();
            watcher.initial_scan(&root).await;
            let watcher_shutdown = shutdown_rx.clone();
            workers.push(tokio::spawn(async move {
                watcher.run(root, watcher_shutdown).await;
            }));
        } else {
            info!("claude code sync disabled by configuration");
        }

        if self.config.enable_claude_desktop_sync {
            match default_local_storage_dir() {
                Some(dir) => {
                    let (events_tx, events_rx) = tokio::sync::mpsc::channel(16);
                    let scanner = LdbScanner::new(dir);
                    let scanner_shutdown = shutdown_rx.clone();
                    workers.push(tokio::spawn(async move {
                        scanner.run(events_tx, scanner_shutdown).await;
                    }));
                    let forwarder = notifier.clone();
                    workers.push(tokio::spawn(forwarder.forward_from(events_rx)));
                }
                None => info!("claude desktop local-storage directory not resolvable; scanner idle"),
            }
        } else {
            info!("claude desktop sync disabled by configuration");
        }

        let cookie = match default_cookie_db_path() {
            Some(path) => ses_ingest::get_claude_cookie(&path).await,
            None => None,
        };
        if cookie.is_none() {
            info!("no conversation-provider cookie available yet; dispatch/sync passes will report auth-absent");
        }
        let provider_client = Arc::new(ConversationProviderClient::new(
            self.config.conversation_provider_base_url.clone(),
            cookie.unwrap_or_default(),
        ));

        let dispatch = DispatchWorker::new(provider_client, db.pool().clone(), notifier.clone());
        let dispatch_shutdown = shutdown_rx.clone();
        workers.push(tokio::spawn(dispatch.run(dispatch_shutdown)));

        let document_client = DocumentServiceClient::new(self.config.document_service_base_url.clone());
        let memory_client = MemoryServiceClient::new(self.config.memory_service_base_url.clone());
        let sync_worker = SyncWorker::new(
            db.pool().clone(),
            auth.clone(),
            document_client,
            memory_client,
            self.config.cloud_tenant_id.clone(),
        );
        let sync_shutdown = shutdown_rx.clone();
        workers.push(tokio::spawn(sync_worker.run(sync_shutdown)));

        let intake_state = Arc::new(IntakeState { db: db.clone(), auth: auth.clone() });
        let intake_app = intake::router(intake_state);
        let intake_listener = TcpListener::bind(("127.0.0.1", INTAKE_PORT)).await?;
        info!(port = INTAKE_PORT, "loopback intake listening");
        let intake_shutdown = shutdown_rx.clone();
        workers.push(tokio::spawn(async move {
            let result = axum::serve(intake_listener, intake_app)
                .with_graceful_shutdown(wait_for_shutdown(intake_shutdown))
                .await;
            if let Err(e) = result {
                warn!("loopback intake server error: {e}");
            }
        }));

        let control_state = Arc::new(ControlState {
            auth: auth.clone(),
            license: license.clone(),
            start_time: std::time::Instant::now(),
            shutdown_tx: shutdown_tx.clone(),
        });
        let control_app = control::router(control_state);
        let control_socket_path = self.config.control_socket_path.clone();
        let control_shutdown = shutdown_rx.clone();
        workers.push(tokio::spawn(async move {
            if let Err(e) = unix_serve::serve(control_app, &control_socket_path, control_shutdown).await {
                warn!("control-plane server error: {e}");
            }
        }));

        let mut os_signal_shutdown = shutdown_rx.clone();
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("received interrupt; shutting down");
            }
            _ = os_signal_shutdown.changed() => {
                info!("control plane requested shutdown");
            }
        }
        let _ = shutdown_tx.send(true);

        let drain = tokio::time::timeout(SHUTDOWN_DRAIN, await_all(workers)).await;
        if drain.is_err() {
            warn!("shutdown drain window exceeded; abandoning remaining components");
        }

        Ok(())
    }
}

async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// Await every spawned worker's completion. Each handle already runs
/// concurrently (spawned via `tokio::spawn`); awaiting them in sequence here
/// only serializes observing their completion, not their execution.
async fn await_all(handles: Vec<tokio::task::JoinHandle<()>>) {
    for handle in handles {
        let _ = handle.await;
    }
}
