mod config;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Request,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    response::IntoResponse,
    routing::get,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{Span, error, info, warn};

use fushub_api::storage::Storage;
use fushub_api::{AppState, AppStateInner};
use fushub_realtime::Dispatcher;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "fushub=debug,fushub_api=debug,fushub_realtime=debug,tower_http=debug".into()
            }),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("FATAL: {:#}", e);
            error!("Set FUSHUB_JWT_SECRET in your .env file and restart.");
            std::process::exit(1);
        }
    };

    let db = fushub_db::Database::open(&config.db_path)?;
    let storage = Storage::new(config.storage_dir.clone(), config.public_url.clone()).await?;
    let shutdown = CancellationToken::new();

    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret: config.jwt_secret.clone(),
        dispatcher: Dispatcher::new(),
        storage,
        shutdown: shutdown.clone(),
    });

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(false);

    let app = Router::new()
        .nest("/api", fushub_api::router(state.clone()))
        .route("/realtime", get(fushub_api::realtime::upgrade))
        .route("/health", get(health))
        .nest_service("/public", ServeDir::new(state.storage.dir()))
        .layer(cors)
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .with_state(state);

    info!("fushub listening on {}", config.addr);
    info!("Public objects served from {}/public", config.public_url);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    Ok(())
}

/// Request span with the path only. The query string can carry a session
/// token (`/realtime?token=`) and must never reach the logs.
fn request_span(req: &Request) -> Span {
    tracing::debug_span!(
        "request",
        method = %req.method(),
        path = %req.uri().path(),
        version = ?req.version(),
    )
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Resolves on Ctrl+C or SIGTERM and cancels `shutdown` so open realtime
/// connections close before the server drains.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
    shutdown.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn request_span_leaves_out_the_query_string() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let req = axum::http::Request::builder()
            .uri("/realtime?token=eyJhbGciOiJIUzI1NiJ9.secret.sig")
            .body(axum::body::Body::empty())
            .unwrap();
        tracing::subscriber::with_default(subscriber, || {
            let span = request_span(&req);
            let _entered = span.enter();
            tracing::debug!("started processing request");
        });

        let logged = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(logged.contains("path=/realtime"), "{logged}");
        assert!(!logged.contains("token"), "{logged}");
        assert!(!logged.contains("secret"), "{logged}");
    }
}
