// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Analysis error types

use ndarray::{Array4, ArrayD};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use thiserror::Error;

use crate::vision::{ImageError, InferenceError, TensorModel};

/// Pipeline stage that produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    LeafDetection,
    DiseaseClassification,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::LeafDetection => write!(f, "leaf detection"),
            Stage::DiseaseClassification => write!(f, "disease classification"),
        }
    }
}

/// Coarse error category reported to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    DecodeError,
    InferenceError,
    ModelUnavailable,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::DecodeError => "decode_error",
            ErrorKind::InferenceError => "inference_error",
            ErrorKind::ModelUnavailable => "model_unavailable",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while analyzing a leaf image
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("image could not be decoded: {0}")]
    Decode(#[from] ImageError),

    #[error("{stage} inference failed: {message}")]
    Inference { stage: Stage, message: String },

    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("analysis panicked: {0}")]
    Panicked(String),
}

impl AnalysisError {
    pub fn inference(stage: Stage, err: impl fmt::Display) -> Self {
        AnalysisError::Inference {
            stage,
            message: err.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::Decode(_) => ErrorKind::DecodeError,
            AnalysisError::Inference { .. } | AnalysisError::Panicked(_) => {
                ErrorKind::InferenceError
            }
            AnalysisError::ModelUnavailable(_) => ErrorKind::ModelUnavailable,
        }
    }

    /// Stage the error belongs to, if it happened inside a classifier
    pub fn stage(&self) -> Option<Stage> {
        match self {
            AnalysisError::Inference { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

impl From<(Stage, InferenceError)> for AnalysisError {
    fn from((stage, err): (Stage, InferenceError)) -> Self {
        AnalysisError::inference(stage, err)
    }
}

/// Text of a panic payload (`panic!` with a literal or a formatted message)
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run one stage's model, attributing errors and panics to `stage`
pub(crate) fn run_stage(
    model: &dyn TensorModel,
    stage: Stage,
    input: Array4<f32>,
) -> Result<ArrayD<f32>, AnalysisError> {
    match catch_unwind(AssertUnwindSafe(|| model.run(input))) {
        Ok(output) => output.map_err(|e| AnalysisError::from((stage, e))),
        Err(payload) => Err(AnalysisError::inference(
            stage,
            format!("{} model panicked: {}", model.name(), panic_message(payload.as_ref())),
        )),
    }
}
