// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Tensor model seam and its ONNX Runtime implementation
//!
//! The classifiers only see a [`TensorModel`]: a callable that takes an
//! `NHWC` image tensor and returns the raw model output. Production uses
//! [`OnnxClassifier`]; tests plug in deterministic doubles.

use anyhow::{Context, Result};
use ndarray::{Array4, ArrayD};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, info};

/// Failure while invoking a model
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InferenceError {
    #[error("invalid input tensor: {0}")]
    InvalidInput(String),

    #[error("model runtime failed: {0}")]
    Runtime(String),
}

/// A loaded classifier that maps an image tensor to its raw output
pub trait TensorModel: Send + Sync {
    /// Human readable model name used in logs
    fn name(&self) -> &str;

    /// Run the model on a `[1, H, W, 3]` tensor
    fn run(&self, input: Array4<f32>) -> Result<ArrayD<f32>, InferenceError>;
}

/// Name and type of one model input or output
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TensorDescription {
    pub name: String,
    pub value_type: String,
}

/// Static information about a loaded ONNX model
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDescription {
    pub name: String,
    pub path: PathBuf,
    pub inputs: Vec<TensorDescription>,
    pub outputs: Vec<TensorDescription>,
}

/// ONNX Runtime classifier
///
/// Runs on CPU. The session sits behind a `Mutex` because `Session::run`
/// needs `&mut self`; the model weights themselves are never mutated.
pub struct OnnxClassifier {
    session: Mutex<Session>,
    input_name: String,
    description: ModelDescription,
}

impl std::fmt::Debug for OnnxClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxClassifier")
            .field("name", &self.description.name)
            .field("input_name", &self.input_name)
            .finish_non_exhaustive()
    }
}

impl OnnxClassifier {
    /// Load an ONNX classifier from disk
    ///
    /// # Errors
    /// Returns error if the file is missing, ONNX Runtime cannot build a
    /// session from it, or the model declares no inputs.
    pub fn load<P: AsRef<Path>>(
        name: impl Into<String>,
        model_path: P,
        intra_threads: usize,
    ) -> Result<Self> {
        let name = name.into();
        let model_path = model_path.as_ref();

        if !model_path.exists() {
            anyhow::bail!("{} model not found: {}", name, model_path.display());
        }

        info!("Loading {} model from {}", name, model_path.display());

        let session = Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .context("Failed to set CPU execution provider")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .with_intra_threads(intra_threads.max(1))
            .context("Failed to set intra threads")?
            .commit_from_file(model_path)
            .with_context(|| {
                format!("Failed to load {} model from {}", name, model_path.display())
            })?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .context("Model declares no inputs")?;

        let description = ModelDescription {
            name: name.clone(),
            path: model_path.to_path_buf(),
            inputs: session
                .inputs
                .iter()
                .map(|input| TensorDescription {
                    name: input.name.clone(),
                    value_type: format!("{:?}", input.input_type),
                })
                .collect(),
            outputs: session
                .outputs
                .iter()
                .map(|output| TensorDescription {
                    name: output.name.clone(),
                    value_type: format!("{:?}", output.output_type),
                })
                .collect(),
        };

        debug!("{} model inputs: {:?}", name, description.inputs);
        debug!("{} model outputs: {:?}", name, description.outputs);
        info!("✅ {} model loaded (CPU-only)", name);

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            description,
        })
    }

    /// Input/output metadata of the loaded model
    pub fn description(&self) -> &ModelDescription {
        &self.description
    }
}

impl TensorModel for OnnxClassifier {
    fn name(&self) -> &str {
        &self.description.name
    }

    fn run(&self, input: Array4<f32>) -> Result<ArrayD<f32>, InferenceError> {
        let shape = input.shape();
        if shape[0] != 1 || shape[3] != 3 {
            return Err(InferenceError::InvalidInput(format!(
                "expected [1, H, W, 3], got {:?}",
                shape
            )));
        }

        // A panic elsewhere while holding the lock leaves the session itself intact
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);

        let input_value =
            Value::from_array(input).map_err(|e| InferenceError::InvalidInput(e.to_string()))?;

        let outputs = session
            .run(ort::inputs![&self.input_name => input_value])
            .map_err(|e| InferenceError::Runtime(e.to_string()))?;

        let output_tensor = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| InferenceError::Runtime(e.to_string()))?;

        Ok(output_tensor.into_owned())
    }
}
