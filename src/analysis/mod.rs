// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Tea leaf analysis pipeline
//!
//! Components:
//! - `leaf_detector` - Stage 1, leaf vs. non-leaf (160x160 input)
//! - `disease` - Stage 2, four disease labels (512x512 input)
//! - `analyzer` - sequences both stages into one result
//! - `error` - error kinds surfaced by the pipeline

pub mod analyzer;
pub mod disease;
pub mod error;
pub mod leaf_detector;

pub use analyzer::{AnalysisReport, AnalysisResult, AnalysisStatus, TeaLeafAnalyzer};
pub use disease::{DiseaseClass, DiseaseClassifier, DiseasePrediction};
pub use error::{panic_message, AnalysisError, ErrorKind, Stage};
pub use leaf_detector::{LeafDetection, LeafDetector, NON_LEAF_THRESHOLD};
