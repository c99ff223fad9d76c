//! HTTP surface: WebSocket endpoint, time sync, health, and graceful shutdown.

use std::future::Future;
use std::io;
use std::time::Duration;

use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::handlers::ws_handler;
use crate::state::SharedWorld;

/// Per-request state handed to every route.
#[derive(Clone)]
pub struct AppState {
    pub world: SharedWorld,
    /// Depth of each client's outbound queue
    pub client_buffer: usize,
    /// Upper bound on a single WebSocket write
    pub send_timeout: Duration,
}

impl AppState {
    pub fn new(world: SharedWorld, config: &ServerConfig) -> Self {
        Self {
            world,
            client_buffer: config.client_buffer.max(1),
            send_timeout: config.send_timeout,
        }
    }
}

// ─── Time Sync Endpoint ───────────────────────────────────────────────────────

async fn time_sync() -> Json<Value> {
    Json(json!({ "serverTime": Utc::now().timestamp_millis() }))
}

async fn health() -> &'static str {
    "ok"
}

pub fn build_router(state: AppState) -> Router {
    // CORS: any origin, the game front end is served from elsewhere
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws", get(ws_handler))
        .route("/sync", get(time_sync))
        .route("/health", get(health))
        .layer(cors)
        .with_state(state)
}

pub async fn bind(addr: &str) -> Result<TcpListener, ServerError> {
    TcpListener::bind(addr).await.map_err(|source| ServerError::Bind {
        addr: addr.to_string(),
        source,
    })
}

/// Serve until `shutdown` flips to `true` (or its sender is dropped), then close
/// every registered client so their sockets are released.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), ServerError> {
    let world = state.world.clone();
    let app = build_router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
            let closed = world.close_all().await;
            info!("Shutting down, closed {closed} client connections");
        })
        .await?;

    Ok(())
}

/// Request shutdown once `signal` fires. If the signal cannot be listened for, the
/// sender is held forever: dropping it would itself read as a shutdown request.
pub async fn shutdown_on<F>(signal: F, shutdown: watch::Sender<bool>)
where
    F: Future<Output = io::Result<()>>,
{
    if let Err(e) = signal.await {
        warn!("Could not listen for Ctrl+C, running without a signal handler: {e}");
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C, shutting down gracefully...");
    let _ = shutdown.send(true);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::state::WorldState;

    fn test_state() -> AppState {
        AppState {
            world: Arc::new(WorldState::new()),
            client_buffer: 8,
            send_timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let response = build_router(test_state())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn sync_reports_server_time() {
        let before = Utc::now().timestamp_millis();
        let response = build_router(test_state())
            .oneshot(Request::get("/sync").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert!(json["serverTime"].as_i64().unwrap() >= before);
    }

    #[tokio::test]
    async fn ws_route_requires_upgrade() {
        let response = build_router(test_state())
            .oneshot(Request::get("/ws").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn bind_reports_address_on_failure() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap().to_string();

        let err = bind(&addr).await.unwrap_err();
        assert!(matches!(err, ServerError::Bind { .. }));
        assert!(err.to_string().contains(&addr));
    }

    #[tokio::test]
    async fn signal_triggers_shutdown() {
        let (tx, mut rx) = watch::channel(false);
        tokio::spawn(shutdown_on(async { Ok::<(), io::Error>(()) }, tx));

        tokio::time::timeout(Duration::from_secs(1), rx.wait_for(|stop| *stop))
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn failed_signal_handler_keeps_server_running() {
        let (tx, mut rx) = watch::channel(false);
        tokio::spawn(shutdown_on(async { Err::<(), _>(io::Error::other("no signals here")) }, tx));

        // Neither a value change nor a dropped sender within the window.
        let changed = tokio::time::timeout(Duration::from_millis(200), rx.changed()).await;
        assert!(changed.is_err(), "shutdown channel fired: {changed:?}");
        assert!(!*rx.borrow());
    }

    #[tokio::test]
    async fn client_buffer_is_never_zero() {
        let config = ServerConfig { client_buffer: 0, ..ServerConfig::default() };
        let state = AppState::new(Arc::new(WorldState::new()), &config);
        assert_eq!(state.client_buffer, 1);
    }
}
