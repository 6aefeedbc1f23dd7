//! Loopback content servers: the source server exposes the staging tree, the
//! broker server exposes the bootstrap page and the viewer distribution.

use std::{
    net::{Ipv4Addr, SocketAddr},
    path::PathBuf,
    sync::Arc,
};

use axum::{Router, routing::get};
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};
use tracing::{debug, info};

use super::{
    assets::{DirectoryRoot, serve_broker, serve_directory},
    error::InfraError,
};

pub const SOURCE_SERVER: &str = "source";
pub const BROKER_SERVER: &str = "broker";

/// A running server bound to an ephemeral loopback port.
pub struct ContentServer {
    name: &'static str,
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

impl ContentServer {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Stop accepting connections and wait for in-flight requests.
    pub async fn shutdown(self) -> Result<(), InfraError> {
        // The receiver is gone only if the server already stopped.
        let _ = self.shutdown.send(());
        let result = self
            .task
            .await
            .map_err(|err| InfraError::server(self.name, err.to_string()))?;
        result.map_err(|err| InfraError::server(self.name, err.to_string()))?;
        debug!(target = "bindery::http", server = self.name, "Server stopped");
        Ok(())
    }
}

pub fn build_source_router(root: PathBuf) -> Router {
    Router::new()
        .route("/", get(serve_directory))
        .route("/{*path}", get(serve_directory))
        .with_state(DirectoryRoot(Arc::new(root)))
}

pub fn build_broker_router(viewer_dir: PathBuf) -> Router {
    let viewer = Router::new()
        .route("/viewer/", get(serve_directory))
        .route("/viewer/{*path}", get(serve_directory))
        .with_state(DirectoryRoot(Arc::new(viewer_dir)));

    Router::new()
        .route("/broker/", get(serve_broker))
        .route("/broker/{*path}", get(serve_broker))
        .merge(viewer)
}

pub async fn start_source_server(root: PathBuf) -> Result<ContentServer, InfraError> {
    info!(
        target = "bindery::http",
        server = SOURCE_SERVER,
        root = %root.display(),
        "Starting content server"
    );
    spawn(SOURCE_SERVER, build_source_router(root)).await
}

pub async fn start_broker_server(viewer_dir: PathBuf) -> Result<ContentServer, InfraError> {
    if !viewer_dir.is_dir() {
        tracing::warn!(
            target = "bindery::http",
            viewer_dir = %viewer_dir.display(),
            "Viewer directory does not exist; the broker page will not find the viewer"
        );
    }
    info!(
        target = "bindery::http",
        server = BROKER_SERVER,
        viewer_dir = %viewer_dir.display(),
        "Starting content server"
    );
    spawn(BROKER_SERVER, build_broker_router(viewer_dir)).await
}

async fn spawn(name: &'static str, router: Router) -> Result<ContentServer, InfraError> {
    let requested = SocketAddr::from((Ipv4Addr::LOCALHOST, 0));
    let listener = TcpListener::bind(requested)
        .await
        .map_err(|source| InfraError::Bind {
            server: name,
            addr: requested,
            source,
        })?;
    let addr = listener.local_addr()?;

    let (shutdown, signal) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = signal.await;
            })
            .await
    });

    debug!(target = "bindery::http", server = name, %addr, "Server listening");
    Ok(ContentServer {
        name,
        addr,
        shutdown,
        task,
    })
}
