//! Websocket broadcast server

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use cynova_common::{Error, LiveMessage, LiveServerOptions, Result};

/// Frames buffered per observer before it is considered lagging
const CHANNEL_CAPACITY: usize = 1024;

struct LiveState {
    tx: broadcast::Sender<String>,
}

/// A running broadcast server
pub struct LiveServer {
    tx: broadcast::Sender<String>,
    local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl LiveServer {
    /// Bind and start serving on the current tokio runtime
    ///
    /// Usable from synchronous code as long as a runtime is reachable via
    /// `tokio::runtime::Handle::try_current`.
    pub fn start(options: &LiveServerOptions) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| Error::Live("no tokio runtime available".into()))?;

        let listener = std::net::TcpListener::bind(options.addr())?;
        listener.set_nonblocking(true)?;

        let _guard = runtime.enter();
        let listener = tokio::net::TcpListener::from_std(listener)?;
        Self::serve(listener, &runtime)
    }

    /// Bind asynchronously and start serving
    pub async fn bind(options: &LiveServerOptions) -> Result<Self> {
        let listener = tokio::net::TcpListener::bind(options.addr()).await?;
        Self::serve(listener, &tokio::runtime::Handle::current())
    }

    fn serve(listener: tokio::net::TcpListener, runtime: &tokio::runtime::Handle) -> Result<Self> {
        let local_addr = listener.local_addr()?;
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let app = router(Arc::new(LiveState { tx: tx.clone() }));

        let handle = runtime.spawn(async move {
            let shutdown = async {
                let _ = shutdown_rx.await;
            };
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!("Live server error: {}", e);
            }
        });

        info!("[CyNova] Live server listening ws://{}", local_addr);

        Ok(Self {
            tx,
            local_addr,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of currently connected observers
    pub fn observers(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Push a message to every observer; never fails
    pub fn send(&self, message: &LiveMessage) {
        match serde_json::to_string(message) {
            Ok(text) => {
                // Err only means nobody is listening
                let _ = self.tx.send(text);
            }
            Err(e) => warn!("Dropping unserializable live message: {}", e),
        }
    }

    /// Stop accepting connections and close the server task
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            // Open websocket sessions keep graceful shutdown waiting
            handle.abort();
        }
        debug!("Live server on {} stopped", self.local_addr);
    }
}

impl Drop for LiveServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn router(state: Arc<LiveState>) -> Router {
    Router::new()
        .route("/", get(websocket_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::new().allow_origin(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler(State(state): State<Arc<LiveState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "observers": state.tx.receiver_count(),
    }))
}

async fn websocket_handler(State(state): State<Arc<LiveState>>, ws: WebSocketUpgrade) -> Response {
    let rx = state.tx.subscribe();
    ws.on_upgrade(move |socket| async move {
        handle_observer(socket, rx).await;
    })
}

/// Forward broadcast frames to one observer until either side goes away
async fn handle_observer(socket: WebSocket, mut rx: broadcast::Receiver<String>) {
    debug!("Live observer connected");
    let (mut ws_write, mut ws_read) = socket.split();

    let forward = async {
        loop {
            match rx.recv().await {
                Ok(text) => {
                    if let Err(e) = ws_write.send(Message::Text(text)).await {
                        debug!("Live observer send failed: {}", e);
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Live observer lagging, skipped {} message(s)", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        let _ = ws_write.close().await;
    };

    let watch_close = async {
        while let Some(msg) = ws_read.next().await {
            match msg {
                Ok(Message::Close(_)) => {
                    debug!("Live observer closed the connection");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Live observer error: {}", e);
                    break;
                }
            }
        }
    };

    tokio::select! {
        _ = forward => {}
        _ = watch_close => {}
    }

    debug!("Live observer session ended");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_without_observers_is_silent() {
        let mut server = LiveServer::bind(&LiveServerOptions {
            enabled: true,
            host: "127.0.0.1".into(),
            port: 0,
        })
        .await
        .unwrap();

        assert_ne!(server.local_addr().port(), 0);
        assert_eq!(server.observers(), 0);
        server.send(&LiveMessage::lifecycle("before:run", None, None));
        server.shutdown();
    }

    #[test]
    fn test_start_without_runtime_fails() {
        let err = LiveServer::start(&LiveServerOptions::default()).err();
        assert!(matches!(err, Some(Error::Live(_))));
    }
}
