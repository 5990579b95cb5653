// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod analysis;
pub mod api;
pub mod cli;
pub mod config;
pub mod models;
pub mod version;
pub mod vision;

// Re-export main types
pub use analysis::{
    AnalysisError, AnalysisReport, AnalysisResult, AnalysisStatus, DiseaseClass, ErrorKind,
    TeaLeafAnalyzer,
};
pub use config::{NodeConfig, ServerConfig};
pub use models::{LoadedModels, ModelSet, ModelSource};
pub use vision::{OnnxClassifier, TensorModel};
