// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! The pair of artifacts the analyzer needs

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use super::downloading::{DownloadConfig, ModelDownloader, ModelSource, ResolvedModel};
use crate::analysis::{AnalysisError, TeaLeafAnalyzer};
use crate::vision::{ModelDescription, OnnxClassifier};

pub const LEAF_MODEL_FILE: &str = "leaf_detection.onnx";
pub const DISEASE_MODEL_FILE: &str = "disease_classification.onnx";

/// Sources for the Stage 1 and Stage 2 models
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSet {
    pub leaf: ModelSource,
    pub disease: ModelSource,
}

/// Both classifiers loaded into ONNX Runtime
pub struct LoadedModels {
    pub leaf: Arc<OnnxClassifier>,
    pub disease: Arc<OnnxClassifier>,
}

impl LoadedModels {
    pub fn descriptions(&self) -> Vec<ModelDescription> {
        vec![
            self.leaf.description().clone(),
            self.disease.description().clone(),
        ]
    }

    pub fn into_analyzer(self) -> TeaLeafAnalyzer {
        TeaLeafAnalyzer::new(self.leaf, self.disease)
    }
}

impl ModelSet {
    /// Ensure both artifacts are on disk, downloading missing ones
    ///
    /// A failure surfaces as [`AnalysisError::ModelUnavailable`].
    pub async fn resolve(&self, config: DownloadConfig) -> Result<(ResolvedModel, ResolvedModel)> {
        let downloader = ModelDownloader::new(config)?;

        let leaf = downloader
            .ensure(&self.leaf)
            .await
            .map_err(|e| AnalysisError::ModelUnavailable(e.to_string()))?;
        let disease = downloader
            .ensure(&self.disease)
            .await
            .map_err(|e| AnalysisError::ModelUnavailable(e.to_string()))?;

        Ok((leaf, disease))
    }

    /// Load both artifacts into ONNX Runtime sessions
    pub fn load(&self, intra_threads: usize) -> Result<LoadedModels> {
        let leaf = OnnxClassifier::load(&self.leaf.name, &self.leaf.path, intra_threads)?;
        let disease = OnnxClassifier::load(&self.disease.name, &self.disease.path, intra_threads)?;

        info!("🤖 Both TeaLeafNet models loaded");

        Ok(LoadedModels {
            leaf: Arc::new(leaf),
            disease: Arc::new(disease),
        })
    }

    /// Resolve, then load
    pub async fn resolve_and_load(
        &self,
        config: DownloadConfig,
        intra_threads: usize,
    ) -> Result<LoadedModels> {
        self.resolve(config).await?;

        let set = self.clone();
        tokio::task::spawn_blocking(move || set.load(intra_threads))
            .await
            .context("Model loading task panicked")?
    }
}
