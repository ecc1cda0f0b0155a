//! Running the mock on a real socket for client tests
use crate::{MockOptions, build_router};
use anyhow::Context;
use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// A mock server listening on an ephemeral localhost port.
///
/// The server stops when the handle is dropped or [`shutdown`](Self::shutdown) is awaited.
#[derive(Debug)]
pub struct TestServerHandle {
    addr: SocketAddr,
    url: String,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl TestServerHandle {
    /// Base URL, e.g. `http://127.0.0.1:41234`. Pass it to an SDK as its base URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Absolute URL for `path`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.url, path)
    }

    /// Stop the server and wait for it to finish in-flight requests.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!(error = %e, "Test server task failed");
            }
        }
    }
}

impl Drop for TestServerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Start the mock with default options.
pub async fn spawn_test_server() -> anyhow::Result<TestServerHandle> {
    spawn_test_server_with(&MockOptions::default()).await
}

pub async fn spawn_test_server_with(options: &MockOptions) -> anyhow::Result<TestServerHandle> {
    let router = build_router(options).context("Failed to build router")?;
    spawn_router(router).await
}

/// Serve any router on an ephemeral port.
pub async fn spawn_router(router: Router) -> anyhow::Result<TestServerHandle> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .context("Failed to bind test listener")?;
    let addr = listener.local_addr()?;
    let (tx, rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = rx.await;
            })
            .await;
        if let Err(e) = result {
            error!(error = %e, "Test server stopped with an error");
        }
    });

    debug!(%addr, "Test server started");

    Ok(TestServerHandle {
        addr,
        url: format!("http://{}", addr),
        shutdown: Some(tx),
        task: Some(task),
    })
}
