//! Web server setup and routing

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api;
use crate::pages;
use crate::state::AppState;

/// Build the router hosting the panel
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Panel
        .route("/", get(pages::open))
        .route("/panel", get(pages::fragment))
        .route("/register", post(pages::register))
        // API routes
        .route("/api/session", get(api::get_session))
        .route("/api/config", get(api::get_config))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

/// Run the web server
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let bind = state.config.daemon.bind.clone();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!(address = %bind, protocol = "HTTP", "Starting web server");
    axum::serve(listener, app).await?;
    Ok(())
}
