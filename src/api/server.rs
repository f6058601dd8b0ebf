//! HTTP server lifecycle.
//!
//! Binds the configured address, mounts `api_router()` and runs axum
//! in a background task. The returned handle carries the bound address
//! and a graceful shutdown channel.

use std::net::SocketAddr;

use tokio::sync::oneshot;

use crate::api::router::api_router;
use crate::api::types::ApiContext;

/// Handle to a running tutoring server.
pub struct ApiServer {
    pub addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: tokio::task::JoinHandle<()>,
}

impl ApiServer {
    /// Signal the server to stop accepting connections and drain.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            tracing::info!("server shutdown signal sent");
        }
    }

    /// Wait for the server task to finish.
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

/// Bind `bind_addr` and serve the API until shutdown.
///
/// `bind_addr` accepts port 0 for an ephemeral port; the actual
/// address is on the returned handle.
pub async fn start_server(
    ctx: ApiContext,
    bind_addr: SocketAddr,
) -> std::io::Result<ApiServer> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    let addr = listener.local_addr()?;

    let app = api_router(ctx);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
            tracing::info!("server received shutdown signal");
        };

        tracing::info!(%addr, "server started");

        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
        {
            tracing::error!("server error: {e}");
        }

        tracing::info!("server stopped");
    });

    Ok(ApiServer {
        addr,
        shutdown_tx: Some(shutdown_tx),
        task,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::auth::CredentialStore;
    use crate::llm::{GenerationOptions, MockCompletionClient};
    use crate::transcript::TranscriptStore;

    fn test_ctx() -> (ApiContext, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let credentials = CredentialStore::open(&tmp.path().join("users.db")).unwrap();
        let transcripts = TranscriptStore::new(&tmp.path().join("transcripts"));
        let ctx = ApiContext::new(
            credentials,
            transcripts,
            Arc::new(MockCompletionClient::replying("ok")),
            GenerationOptions::default(),
        );
        (ctx, tmp)
    }

    fn loopback() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 0))
    }

    #[tokio::test]
    async fn start_and_stop_server() {
        let (ctx, _tmp) = test_ctx();
        let mut server = start_server(ctx, loopback()).await.expect("server should start");
        assert!(server.addr.port() > 0);

        let url = format!("http://{}/api/health", server.addr);
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);

        server.shutdown();
        server.join().await;
    }

    #[tokio::test]
    async fn protected_routes_reject_without_token_over_http() {
        let (ctx, _tmp) = test_ctx();
        let mut server = start_server(ctx, loopback()).await.expect("server should start");

        let url = format!("http://{}/api/chat/history", server.addr);
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);

        server.shutdown();
        server.join().await;
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let (ctx, _tmp) = test_ctx();
        let mut server = start_server(ctx, loopback()).await.expect("server should start");
        server.shutdown();
        server.shutdown();
        server.join().await;
    }
}
