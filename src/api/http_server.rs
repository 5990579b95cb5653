// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::analyze::{analyze_handler, analyze_upload_handler};
use super::handlers::{health_handler, root_handler, test_handler};
use crate::analysis::TeaLeafAnalyzer;

/// Maximum request body (base64 inflates a 10MB photo past 13MB)
pub const MAX_BODY_SIZE: usize = 15 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    /// Fixed at start-up; `None` when model loading failed
    pub analyzer: Option<Arc<TeaLeafAnalyzer>>,
}

impl AppState {
    pub fn new(analyzer: TeaLeafAnalyzer) -> Self {
        Self {
            analyzer: Some(Arc::new(analyzer)),
        }
    }

    /// State with no analyzer loaded; `/analyze` answers 503
    pub fn without_models() -> Self {
        Self { analyzer: None }
    }

    pub fn new_for_test() -> Self {
        Self::without_models()
    }

    pub fn analyzer(&self) -> Option<Arc<TeaLeafAnalyzer>> {
        self.analyzer.clone()
    }

    pub fn models_loaded(&self) -> bool {
        self.analyzer.is_some()
    }
}

pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/test", get(test_handler))
        .route("/analyze", post(analyze_handler))
        .route("/analyze/upload", post(analyze_upload_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state((*state).clone())
}

pub async fn start_server(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let app = create_app(Arc::new(state));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("🚀 API server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down API server");
}
