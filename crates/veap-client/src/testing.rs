//! Test utilities for VEAP servers and clients
//!
//! Provides an embedded test server that serves an axum router on an
//! ephemeral port and shuts down when dropped.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;

use veap_core::{ServiceError, ServiceResult};

use crate::VeapClient;

/// A test server that automatically shuts down when dropped.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use veap_client::testing::TestServer;
/// use veap_server::{router, Handler};
///
/// let handler = Arc::new(Handler::new(service));
/// let server = TestServer::start(router(handler)).await?;
/// let pv = server.client.read_pv("/a").await?;
/// ```
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: VeapClient,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    /// Binds an ephemeral local port and serves the router on it.
    pub async fn start(router: axum::Router) -> ServiceResult<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|err| ServiceError::client(format!("Binding test server failed: {err}")))?;
        let addr = listener
            .local_addr()
            .map_err(|err| ServiceError::client(format!("No local address: {err}")))?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        // give the accept loop a moment to start
        tokio::time::sleep(Duration::from_millis(10)).await;

        let client = VeapClient::new(&format!("http://{addr}"))?;
        Ok(Self {
            addr,
            client,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// The base URL of the test server.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// A client connected to the test server.
    pub fn client(&self) -> &VeapClient {
        &self.client
    }

    /// Shuts the server down gracefully.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
