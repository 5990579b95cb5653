// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Stage 1: leaf detection
//!
//! The detector is a binary classifier whose single output is the
//! probability that the image is NOT a tea leaf.

use image::DynamicImage;
use ndarray::{Array4, ArrayD};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use super::error::{run_stage, AnalysisError, Stage};
use crate::vision::{preprocess_image, TensorModel, LEAF_INPUT_SIZE};

/// Images with `P(non-leaf)` at or below this value are leaves
pub const NON_LEAF_THRESHOLD: f32 = 0.5;

/// Stage 1 outcome
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeafDetection {
    pub is_leaf: bool,
    /// Probability of the chosen label, in `[0, 1]`
    pub confidence: f32,
}

impl LeafDetection {
    /// Interpret the model's `P(non-leaf)` output
    pub fn from_non_leaf_probability(p_non_leaf: f32) -> Self {
        let p = p_non_leaf.clamp(0.0, 1.0);
        let is_leaf = p <= NON_LEAF_THRESHOLD;
        let confidence = if is_leaf { 1.0 - p } else { p };
        Self {
            is_leaf,
            confidence,
        }
    }

    /// Result reported when detection could not run
    pub fn rejected() -> Self {
        Self {
            is_leaf: false,
            confidence: 0.0,
        }
    }
}

/// Stage 1 classifier
#[derive(Clone)]
pub struct LeafDetector {
    model: Arc<dyn TensorModel>,
}

impl LeafDetector {
    pub fn new(model: Arc<dyn TensorModel>) -> Self {
        Self { model }
    }

    /// Resize `image` to 160x160 and run detection
    pub fn detect(&self, image: &DynamicImage) -> Result<LeafDetection, AnalysisError> {
        let tensor = preprocess_image(image, LEAF_INPUT_SIZE)
            .map_err(|e| AnalysisError::from((Stage::LeafDetection, e)))?;
        self.detect_tensor(tensor)
    }

    /// Run detection on an already preprocessed `[1, 160, 160, 3]` tensor
    pub fn detect_tensor(&self, tensor: Array4<f32>) -> Result<LeafDetection, AnalysisError> {
        let output = run_stage(self.model.as_ref(), Stage::LeafDetection, tensor)?;

        let p_non_leaf = non_leaf_probability(&output)?;
        debug!("{} output P(non-leaf) = {:.4}", self.model.name(), p_non_leaf);

        Ok(LeafDetection::from_non_leaf_probability(p_non_leaf))
    }
}

/// First element of the `[1, 1]` output
fn non_leaf_probability(output: &ArrayD<f32>) -> Result<f32, AnalysisError> {
    let value = output.iter().next().copied().ok_or_else(|| {
        AnalysisError::inference(Stage::LeafDetection, "model returned an empty output")
    })?;

    if !value.is_finite() {
        return Err(AnalysisError::inference(
            Stage::LeafDetection,
            format!("model returned a non-finite probability: {}", value),
        ));
    }

    Ok(value)
}
