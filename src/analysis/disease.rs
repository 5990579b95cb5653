// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Stage 2: disease classification over the four TeaLeafNet labels

use image::DynamicImage;
use ndarray::{Array4, ArrayD};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::error::{run_stage, AnalysisError, Stage};
use crate::vision::{preprocess_image, TensorModel, DISEASE_INPUT_SIZE};

/// Disease labels, in the model's output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiseaseClass {
    #[serde(rename = "bb")]
    BrownBlight,
    #[serde(rename = "gl")]
    Healthy,
    #[serde(rename = "rr")]
    RedRust,
    #[serde(rename = "rsm")]
    RedSpiderMites,
}

impl DiseaseClass {
    /// All labels indexed by model output position
    pub const ALL: [DiseaseClass; 4] = [
        DiseaseClass::BrownBlight,
        DiseaseClass::Healthy,
        DiseaseClass::RedRust,
        DiseaseClass::RedSpiderMites,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Short label code used on the wire
    pub fn code(&self) -> &'static str {
        match self {
            DiseaseClass::BrownBlight => "bb",
            DiseaseClass::Healthy => "gl",
            DiseaseClass::RedRust => "rr",
            DiseaseClass::RedSpiderMites => "rsm",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            DiseaseClass::BrownBlight => "Brown Blight",
            DiseaseClass::Healthy => "Healthy Leaf",
            DiseaseClass::RedRust => "Red Rust",
            DiseaseClass::RedSpiderMites => "Red Spider Mites",
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, DiseaseClass::Healthy)
    }
}

impl fmt::Display for DiseaseClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Stage 2 outcome
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiseasePrediction {
    pub class: DiseaseClass,
    /// Probability of `class`, in `[0, 1]`
    pub confidence: f32,
}

impl DiseasePrediction {
    /// Arg-max over exactly four probabilities; ties go to the lowest index
    pub fn from_probabilities(probabilities: &[f32]) -> Result<Self, AnalysisError> {
        if probabilities.len() != DiseaseClass::ALL.len() {
            return Err(AnalysisError::inference(
                Stage::DiseaseClassification,
                format!(
                    "expected {} class probabilities, got {}",
                    DiseaseClass::ALL.len(),
                    probabilities.len()
                ),
            ));
        }

        let scores = probabilities;
        if let Some(bad) = scores.iter().find(|p| !p.is_finite()) {
            return Err(AnalysisError::inference(
                Stage::DiseaseClassification,
                format!("model returned a non-finite probability: {}", bad),
            ));
        }

        let (best_index, best_score) =
            scores
                .iter()
                .enumerate()
                .fold((0, scores[0]), |(bi, bs), (i, &s)| {
                    if s > bs {
                        (i, s)
                    } else {
                        (bi, bs)
                    }
                });

        let class = DiseaseClass::from_index(best_index).ok_or_else(|| {
            AnalysisError::inference(
                Stage::DiseaseClassification,
                format!("no label for output index {}", best_index),
            )
        })?;

        Ok(Self {
            class,
            confidence: best_score.clamp(0.0, 1.0),
        })
    }
}

/// Stage 2 classifier
#[derive(Clone)]
pub struct DiseaseClassifier {
    model: Arc<dyn TensorModel>,
}

impl DiseaseClassifier {
    pub fn new(model: Arc<dyn TensorModel>) -> Self {
        Self { model }
    }

    /// Resize `image` to 512x512 and classify it
    pub fn classify(&self, image: &DynamicImage) -> Result<DiseasePrediction, AnalysisError> {
        let tensor = preprocess_image(image, DISEASE_INPUT_SIZE)
            .map_err(|e| AnalysisError::from((Stage::DiseaseClassification, e)))?;
        self.classify_tensor(tensor)
    }

    /// Classify an already preprocessed `[1, 512, 512, 3]` tensor
    pub fn classify_tensor(&self, tensor: Array4<f32>) -> Result<DiseasePrediction, AnalysisError> {
        let output: ArrayD<f32> =
            run_stage(self.model.as_ref(), Stage::DiseaseClassification, tensor)?;

        let probabilities: Vec<f32> = output.iter().copied().collect();
        debug!("{} output: {:?}", self.model.name(), probabilities);

        DiseasePrediction::from_probabilities(&probabilities)
    }
}
