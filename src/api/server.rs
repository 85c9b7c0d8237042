//! Axumサーバーの組み立てと起動

use anyhow::Context;
use axum::{extract::DefaultBodyLimit, http::HeaderValue, Router};
use std::future::Future;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::routes::create_router;
use super::state::AppState;
use crate::model::config::ServerSettings;

/// 許可オリジンからCORSレイヤーを作る（`*` は全許可）
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|o| o == "*") {
        return cors.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(allowed)
}

/// ミドルウェア込みのアプリケーション
pub fn build_app(state: AppState, settings: &ServerSettings) -> Router {
    create_router(state)
        .layer(DefaultBodyLimit::max(settings.max_upload_bytes))
        .layer(cors_layer(&settings.cors_origins))
        .layer(TraceLayer::new_for_http())
}

/// サーバーを起動し、`shutdown` が完了するまで待つ
pub async fn run_server<F>(state: AppState, settings: &ServerSettings, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = settings.bind_addr()?;
    let app = build_app(state, settings);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("API server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            tracing::info!("API server shutting down gracefully");
        })
        .await
        .context("server error")
}
