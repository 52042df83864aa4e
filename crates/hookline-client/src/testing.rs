//! Test utilities for hookline-client
//!
//! Runs an axum router on an ephemeral port and hands back a
//! [`ProviderSet`] already pointed at it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::ClientResult;
use crate::http::HttpTransport;
use crate::router::ProviderSet;

/// A daemon on a random local port, shut down when dropped
pub struct TestServer {
    pub addr: SocketAddr,
    pub providers: ProviderSet,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    /// Serve `router` with default client timeouts
    ///
    /// ```ignore
    /// let manager = Arc::new(ProviderManager::from_config(&HostConfig::demo()));
    /// let server = TestServer::start(hookline_daemon::create_router(manager)).await?;
    /// let providers = server.providers.providers().await?;
    /// ```
    pub async fn start(router: axum::Router) -> ClientResult<Self> {
        Self::start_with_timeout(router, Duration::from_secs(5), Duration::from_secs(2)).await
    }

    pub async fn start_with_timeout(
        router: axum::Router,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> ClientResult<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        let transport = HttpTransport::with_config(&format!("http://{}", addr), timeout, connect_timeout)?;

        Ok(Self {
            addr,
            providers: ProviderSet::new(Arc::new(transport)),
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stop accepting connections and wait for the server task
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

/// Poll `condition` every 10ms until it holds or `timeout` elapses
pub async fn wait_for<F, Fut>(condition: F, timeout: Duration) -> bool
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
