use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    middleware as axum_mw,
    response::Response,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::MissedTickBehavior;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::error::{LatencyError, Result};
use crate::metrics::Sample;
use crate::middleware::timing;

/// Shared state available to every handler via `State<Arc<AppState>>`.
pub struct AppState {
    /// Delay between two samples on one connection.
    pub interval: Duration,
}

impl From<&ServerConfig> for AppState {
    fn from(config: &ServerConfig) -> Self {
        Self {
            interval: config.interval,
        }
    }
}

/// Builds the `Router` with the info and upgrade endpoints.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/ws", get(ws_upgrade))
        .with_state(state)
        // ── Global middleware (applied bottom-up) ───────────────
        .layer(axum_mw::from_fn(timing::timing_middleware))
        .layer(TraceLayer::new_for_http())
}

pub async fn bind(config: &ServerConfig) -> Result<TcpListener> {
    let addr = config.bind_addr();
    TcpListener::bind(&addr)
        .await
        .map_err(|source| LatencyError::Bind { addr, source })
}

/// Serve until `shutdown` resolves. Open sample streams are left to
/// end with the process.
pub async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

// ─── GET / ───────────────────────────────────────────────────────

async fn root() -> &'static str {
    "hello world\n"
}

// ─── GET /ws ─────────────────────────────────────────────────────

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let interval = state.interval;
    ws.on_upgrade(move |socket| publish(socket, peer, interval))
}

/// Send one timestamped sample per `interval` until a write fails or
/// the peer closes.
async fn publish(socket: WebSocket, peer: SocketAddr, interval: Duration) {
    let source_port = peer.port();
    tracing::info!(%peer, "publisher started");

    let (mut sender, mut receiver) = socket.split();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut sent = 0u64;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let json = match serde_json::to_string(&Sample::now(source_port)) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to encode sample");
                        break;
                    }
                };
                tracing::debug!(%peer, %json, "publish");
                if let Err(e) = sender.send(Message::Text(json)).await {
                    tracing::info!(%peer, error = %e, "write failed, stopping publisher");
                    break;
                }
                sent += 1;
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => {
                    tracing::info!(%peer, "peer closed the connection");
                    break;
                }
                Some(Err(e)) => {
                    tracing::info!(%peer, error = %e, "read failed, stopping publisher");
                    break;
                }
                Some(Ok(_)) => {}
            }
        }
    }

    // flushes the close reply if the peer initiated the handshake
    let _ = sender.close().await;
    tracing::info!(%peer, sent, "publisher stopped");
}
