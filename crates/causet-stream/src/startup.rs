//! Stream server startup helper for embedding in the engine.
//!
//! [`spawn_stream_server`] binds eagerly, then runs the server on a
//! background Tokio task so the engine can keep driving the producer and
//! consumer threads.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::server::{self, ServerConfig, ServerError};
use crate::state::AppState;

/// Bind and spawn the stream server.
///
/// Returns the task handle and the bound address (useful with port 0).
/// The task ends when `shutdown` resolves.
pub async fn spawn_stream_server<F>(
    config: &ServerConfig,
    state: Arc<AppState>,
    shutdown: F,
) -> Result<(JoinHandle<()>, SocketAddr), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = server::bind(config).await?;
    let addr = listener
        .local_addr()
        .map_err(|e| ServerError::Bind(format!("listener has no address: {e}")))?;

    let handle = tokio::spawn(async move {
        if let Err(e) = server::serve(listener, state, shutdown).await {
            tracing::error!(error = %e, "Stream server exited with error");
        }
    });

    tracing::info!(%addr, "Stream server spawned on background task");
    Ok((handle, addr))
}
