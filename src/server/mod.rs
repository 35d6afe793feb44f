//! HTTP query server
//!
//! Every query goes through the [`QueryDispatcher`](symql_vtab::QueryDispatcher),
//! so request handlers never touch the SQL connection directly.

pub mod http;

pub use http::{create_router, ApiError, AppState};

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::info;

use crate::error::{Result, SymqlError};

/// Bind `addr` and serve until Ctrl-C or `POST /shutdown`.
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::AddrInUse {
            SymqlError::server(format!(
                "HTTP port {} is already in use. Use --http <addr> to pick a different address.",
                addr.port()
            ))
        } else {
            SymqlError::server(format!("Failed to bind HTTP server to {}: {}", addr, e))
        }
    })?;
    serve_on(listener, state).await
}

/// Serve on an already bound listener.
pub async fn serve_on(listener: TcpListener, state: AppState) -> Result<()> {
    let shutdown = Arc::clone(&state.shutdown);
    let app = create_router(state);

    info!(addr = %listener.local_addr()?, "Starting HTTP query server");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .map_err(|e| SymqlError::server(e.to_string()))?;
    info!("HTTP query server stopped");
    Ok(())
}

async fn shutdown_signal(requested: Arc<Notify>) {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Received Ctrl-C, shutting down"),
        _ = requested.notified() => {}
    }
}
