use crate::Result;
use crate::config::ServerConfig;
use crate::supervisor::HugoManager;
use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use super::routes;
use super::static_files::static_handler;

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<HugoManager>,
    /// Backlog sent to new live viewers, and the default `limit` for logs.
    pub log_lines: usize,
}

pub fn router(manager: Arc<HugoManager>, config: &ServerConfig) -> Router {
    let state = AppState {
        manager,
        log_lines: config.log_lines,
    };
    Router::new()
        // Dashboard
        .route("/", get(routes::index::index))
        .route("/_status", get(routes::index::status_partial))
        .route("/health", get(|| async { "OK" }))
        // Hugo API
        .route("/api/hugo/status", get(routes::hugo::status))
        .route("/api/hugo/start", post(routes::hugo::start))
        .route("/api/hugo/stop", post(routes::hugo::stop))
        .route("/api/hugo/restart", post(routes::hugo::restart))
        .route("/api/hugo/logs", get(routes::hugo::logs))
        .route("/api/hugo/stream", get(routes::hugo::stream_sse))
        // Static files
        .route("/static/{*path}", get(static_handler))
        .layer(cors_layer(&config.cors_origins))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("ignoring invalid CORS origin {origin:?}");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

/// Serve until SIGINT/SIGTERM, then stop Hugo and close every live viewer so
/// open event streams don't hold the graceful shutdown open.
pub async fn serve(manager: Arc<HugoManager>, config: &ServerConfig) -> Result<()> {
    let app = router(manager.clone(), config);

    let addr = format!("{}:{}", config.bind, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| miette::miette!("Failed to bind web server to {}: {}", addr, e))?;

    info!("Web UI listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("shutting down");
            manager.shutdown().await;
        })
        .await
        .map_err(|e| miette::miette!("Web server error: {}", e))?;

    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() {
    use std::process::exit;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::signal::unix::{SignalKind, signal};
    use tokio::sync::Notify;

    static RECEIVED_SIGNAL: AtomicBool = AtomicBool::new(false);
    let notify = Arc::new(Notify::new());
    let signals = [
        SignalKind::interrupt(),
        SignalKind::terminate(),
        SignalKind::hangup(),
    ];
    for kind in signals {
        let mut stream = match signal(kind) {
            Ok(stream) => stream,
            Err(err) => {
                warn!("could not listen for {kind:?}: {err}");
                continue;
            }
        };
        let notify = notify.clone();
        tokio::spawn(async move {
            while stream.recv().await.is_some() {
                // a second signal means the graceful path is stuck
                if RECEIVED_SIGNAL.swap(true, Ordering::SeqCst) {
                    exit(1);
                }
                notify.notify_one();
            }
        });
    }
    notify.notified().await;
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("could not listen for ctrl-c: {err}");
        std::future::pending::<()>().await;
    }
}
