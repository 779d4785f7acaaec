//! Control-plane transport (§4.8, SPEC §C): the same `axum::Router` served
//! over a Unix domain socket via `hyper_util`'s connection builder, since
//! `axum::serve` only targets TCP. Windows named-pipe transport is a
//! documented gap, not implemented here (no first-party async named-pipe
//! crate in this workspace's dependency set).

use std::path::Path;

use axum::Router;
use tokio::sync::watch;
use tracing::{info, warn};

#[cfg(unix)]
pub async fn serve(router: Router, socket_path: &Path, mut shutdown: watch::Receiver<bool>) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    use hyper_util::rt::{TokioExecutor, TokioIo};
    use hyper_util::server::conn::auto::Builder;
    use hyper_util::service::TowerToHyperService;
    use tokio::net::UnixListener;

    if socket_path.exists() {
        std::fs::remove_file(socket_path)?;
    }
    let listener = UnixListener::bind(socket_path)?;
    std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
    info!(path = %socket_path.display(), "control-plane socket listening");

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
            accepted = listener.accept() => {
                let (stream, _addr) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!("control-plane accept failed: {e}");
                        continue;
                    }
                };
                let io = TokioIo::new(stream);
                let hyper_service = TowerToHyperService::new(router.clone());
                tokio::spawn(async move {
                    if let Err(e) = Builder::new(TokioExecutor::new()).serve_connection(io, hyper_service).await {
                        warn!("control-plane connection error: {e}");
                    }
                });
            }
        }
    }

    let _ = std::fs::remove_file(socket_path);
    Ok(())
}

#[cfg(not(unix))]
pub async fn serve(_router: Router, socket_path: &Path, mut shutdown: watch::Receiver<bool>) -> std::io::Result<()> {
    warn!(
        path = %socket_path.display(),
        "named-pipe control-plane transport is not implemented on this platform; control plane idle"
    );
    let _ = shutdown.changed().await;
    Ok(())
}
