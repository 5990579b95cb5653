// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use super::http_server::AppState;
use crate::version;

pub const SERVICE_NAME: &str = "TeaLeafNet ONNX API";

/// Endpoints advertised by `GET /test`
pub const ADVERTISED_ENDPOINTS: &[&str] = &["/health", "/analyze", "/test"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootResponse {
    pub message: String,
    pub version: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub models_loaded: bool,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResponse {
    pub message: String,
    pub endpoints: Vec<String>,
    pub status: String,
}

/// GET /
pub async fn root_handler() -> Json<RootResponse> {
    Json(RootResponse {
        message: format!("{} Server", SERVICE_NAME),
        version: version::VERSION_NUMBER.to_string(),
        status: "running".to_string(),
    })
}

/// GET /health
///
/// Always `healthy` while the process serves requests; `modelsLoaded`
/// tells whether `/analyze` can succeed.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: SERVICE_NAME.to_string(),
        models_loaded: state.models_loaded(),
        version: version::VERSION.to_string(),
    })
}

/// GET /test
pub async fn test_handler() -> Json<TestResponse> {
    Json(TestResponse {
        message: format!("{} is running!", SERVICE_NAME),
        endpoints: ADVERTISED_ENDPOINTS.iter().map(|e| e.to_string()).collect(),
        status: "ready".to_string(),
    })
}
