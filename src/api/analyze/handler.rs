// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Analyze endpoint handlers

use axum::{extract::State, Json};
use axum_extra::extract::Multipart;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::request::AnalyzeRequest;
use super::response::AnalyzeResponse;
use crate::analysis::{AnalysisError, AnalysisReport};
use crate::api::errors::ApiError;
use crate::api::http_server::AppState;

/// Multipart field carrying the uploaded photo
pub const IMAGE_FIELD: &str = "image";

/// POST /analyze - Run the two-stage pipeline on a base64 image
///
/// # Request
/// - `image` (or `imageBase64`): Base64-encoded image, data URLs accepted
/// - `imageType`: Optional MIME hint, ignored
///
/// # Response
/// The analysis report plus `diseaseName`, `processingTimeMs` and
/// `timestamp`. Images that cannot be decoded still produce `200` with
/// `status: "degraded"`.
///
/// # Errors
/// - 400 Bad Request: missing image or invalid base64
/// - 503 Service Unavailable: models not loaded
pub async fn analyze_handler(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let image_bytes = request.image_bytes().map_err(|e| {
        warn!("Analyze validation failed: {}", e);
        e
    })?;
    debug!("📥 Analyze request received ({} bytes)", image_bytes.len());

    run_analysis(&state, image_bytes).await.map(Json)
}

/// POST /analyze/upload - Same pipeline for a multipart `image` file field
pub async fn analyze_upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let mut image_bytes = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidRequest(e.to_string()))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        image_bytes = Some(bytes.to_vec());
        break;
    }

    let image_bytes = image_bytes
        .filter(|bytes| !bytes.is_empty())
        .ok_or_else(|| ApiError::ValidationError {
            field: IMAGE_FIELD.to_string(),
            message: "No image provided".to_string(),
        })?;
    debug!("📥 Upload received ({} bytes)", image_bytes.len());

    run_analysis(&state, image_bytes).await.map(Json)
}

async fn run_analysis(state: &AppState, image_bytes: Vec<u8>) -> Result<AnalyzeResponse, ApiError> {
    let analyzer = state.analyzer().ok_or_else(|| {
        warn!("Analyze request rejected: models not loaded");
        ApiError::ServiceUnavailable("Models not loaded".to_string())
    })?;

    let started = Instant::now();
    let report = tokio::task::spawn_blocking(move || analyzer.analyze_or_degraded(&image_bytes))
        .await
        .unwrap_or_else(|e| {
            warn!("❌ Analysis task failed: {}", e);
            AnalysisReport::degraded(&AnalysisError::Panicked(e.to_string()))
        });
    let processing_time_ms = started.elapsed().as_millis() as u64;

    info!(
        "✅ Analysis complete: isLeaf={}, disease={:?}, status={:?}, {}ms",
        report.result.is_leaf,
        report.result.disease_class.map(|c| c.code()),
        report.status,
        processing_time_ms
    );

    Ok(AnalyzeResponse::new(report, processing_time_ms))
}
