// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Two-stage analysis: leaf detection, then disease classification

use image::DynamicImage;
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{info, warn};

use super::disease::{DiseaseClass, DiseaseClassifier, DiseasePrediction};
use super::error::{panic_message, AnalysisError, ErrorKind};
use super::leaf_detector::{LeafDetection, LeafDetector};
use crate::vision::{decode_image_bytes, TensorModel};

/// Combined outcome of both stages
///
/// `disease_class` and `disease_confidence` are `Some` only when
/// `is_leaf` is true.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub is_leaf: bool,
    pub leaf_confidence: f32,
    pub disease_class: Option<DiseaseClass>,
    pub disease_confidence: Option<f32>,
}

impl AnalysisResult {
    pub fn not_a_leaf(detection: LeafDetection) -> Self {
        Self {
            is_leaf: false,
            leaf_confidence: detection.confidence,
            disease_class: None,
            disease_confidence: None,
        }
    }

    pub fn leaf_with_disease(detection: LeafDetection, prediction: DiseasePrediction) -> Self {
        Self {
            is_leaf: true,
            leaf_confidence: detection.confidence,
            disease_class: Some(prediction.class),
            disease_confidence: Some(prediction.confidence),
        }
    }

    /// Shape reported when the analysis failed
    pub fn fallback() -> Self {
        Self::not_a_leaf(LeafDetection::rejected())
    }
}

/// Whether a report carries a real result or the fallback shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Ok,
    Degraded,
}

/// Result of [`TeaLeafAnalyzer::analyze_or_degraded`]
///
/// Always structurally valid. When `status` is `Degraded` the result is
/// [`AnalysisResult::fallback`] and `error` says why.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    #[serde(flatten)]
    pub result: AnalysisResult,
    pub status: AnalysisStatus,
    pub error: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl AnalysisReport {
    pub fn ok(result: AnalysisResult) -> Self {
        Self {
            result,
            status: AnalysisStatus::Ok,
            error: None,
            error_detail: None,
        }
    }

    pub fn degraded(err: &AnalysisError) -> Self {
        Self {
            result: AnalysisResult::fallback(),
            status: AnalysisStatus::Degraded,
            error: Some(err.kind()),
            error_detail: Some(err.to_string()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.status == AnalysisStatus::Degraded
    }
}

impl From<Result<AnalysisResult, AnalysisError>> for AnalysisReport {
    fn from(outcome: Result<AnalysisResult, AnalysisError>) -> Self {
        match outcome {
            Ok(result) => AnalysisReport::ok(result),
            Err(err) => AnalysisReport::degraded(&err),
        }
    }
}

/// Service object holding both classifiers
///
/// Built once at start-up and shared read-only (`Arc<TeaLeafAnalyzer>`)
/// across requests. Analyses run synchronously on the calling thread.
#[derive(Clone)]
pub struct TeaLeafAnalyzer {
    leaf_detector: LeafDetector,
    disease_classifier: DiseaseClassifier,
}

impl TeaLeafAnalyzer {
    pub fn new(leaf_model: Arc<dyn TensorModel>, disease_model: Arc<dyn TensorModel>) -> Self {
        Self {
            leaf_detector: LeafDetector::new(leaf_model),
            disease_classifier: DiseaseClassifier::new(disease_model),
        }
    }

    /// Analyze encoded image bytes
    ///
    /// Stage 2 runs only when Stage 1 reports a leaf.
    pub fn analyze(&self, image_bytes: &[u8]) -> Result<AnalysisResult, AnalysisError> {
        let (image, info) = decode_image_bytes(image_bytes)?;
        info!(
            "🔍 Starting image analysis ({}x{} {:?}, {} bytes)",
            info.width, info.height, info.format, info.size_bytes
        );
        self.analyze_image(&image)
    }

    /// Analyze an already decoded image
    pub fn analyze_image(&self, image: &DynamicImage) -> Result<AnalysisResult, AnalysisError> {
        let detection = self.leaf_detector.detect(image)?;
        info!(
            "Stage 1 - Leaf detected: {} (confidence: {:.3})",
            detection.is_leaf, detection.confidence
        );

        if !detection.is_leaf {
            return Ok(AnalysisResult::not_a_leaf(detection));
        }

        let prediction = self.disease_classifier.classify(image)?;
        info!(
            "Stage 2 - Disease: {} (confidence: {:.3}, healthy: {})",
            prediction.class,
            prediction.confidence,
            prediction.class.is_healthy()
        );

        Ok(AnalysisResult::leaf_with_disease(detection, prediction))
    }

    /// Analyze bytes, reporting failures as the degraded fallback instead of an error
    ///
    /// Panics raised anywhere in the pipeline (decoders included) are
    /// reported the same way.
    pub fn analyze_or_degraded(&self, image_bytes: &[u8]) -> AnalysisReport {
        let outcome = catch_unwind(AssertUnwindSafe(|| self.analyze(image_bytes)))
            .unwrap_or_else(|payload| {
                Err(AnalysisError::Panicked(panic_message(payload.as_ref())))
            });
        if let Err(ref e) = outcome {
            warn!("❌ Analysis degraded ({}): {}", e.kind(), e);
        }
        outcome.into()
    }
}
