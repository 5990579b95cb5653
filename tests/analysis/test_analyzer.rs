// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Two-stage pipeline tests
//!
//! The ONNX sessions are replaced with in-process `TensorModel` doubles so
//! these run without model artifacts on disk.

use image::{ImageBuffer, ImageFormat, Rgb};
use ndarray::{Array4, ArrayD, IxDyn};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tealeaf_node::{
    analysis::{AnalysisError, AnalysisStatus, DiseaseClass, ErrorKind, Stage, TeaLeafAnalyzer},
    vision::{InferenceError, TensorModel},
};

/// Returns a fixed output and records every input shape it sees
struct RecordingModel {
    output: Vec<f32>,
    calls: AtomicUsize,
    shapes: Mutex<Vec<Vec<usize>>>,
}

impl RecordingModel {
    fn new(output: Vec<f32>) -> Arc<Self> {
        Arc::new(Self {
            output,
            calls: AtomicUsize::new(0),
            shapes: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn shapes(&self) -> Vec<Vec<usize>> {
        self.shapes.lock().unwrap().clone()
    }
}

impl TensorModel for RecordingModel {
    fn name(&self) -> &str {
        "recording"
    }

    fn run(&self, input: Array4<f32>) -> Result<ArrayD<f32>, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.shapes.lock().unwrap().push(input.shape().to_vec());
        let len = self.output.len();
        Ok(ArrayD::from_shape_vec(IxDyn(&[1, len]), self.output.clone()).unwrap())
    }
}

/// Derives P(non-leaf) from the mean green channel, so different images
/// produce different outputs
struct GreenMeanModel;

impl TensorModel for GreenMeanModel {
    fn name(&self) -> &str {
        "green-mean"
    }

    fn run(&self, input: Array4<f32>) -> Result<ArrayD<f32>, InferenceError> {
        let green = input.slice(ndarray::s![0, .., .., 1]);
        let mean = green.mean().unwrap_or(0.0);
        Ok(ArrayD::from_shape_vec(IxDyn(&[1, 1]), vec![1.0 - mean]).unwrap())
    }
}

struct FailingModel;

impl TensorModel for FailingModel {
    fn name(&self) -> &str {
        "failing"
    }

    fn run(&self, _input: Array4<f32>) -> Result<ArrayD<f32>, InferenceError> {
        Err(InferenceError::Runtime("session crashed".to_string()))
    }
}

struct PanickingModel;

impl TensorModel for PanickingModel {
    fn name(&self) -> &str {
        "panicking"
    }

    fn run(&self, _input: Array4<f32>) -> Result<ArrayD<f32>, InferenceError> {
        panic!("unexpected output layout");
    }
}

fn encode_png(width: u32, height: u32, pixel: [u8; 3]) -> Vec<u8> {
    let img = ImageBuffer::from_pixel(width, height, Rgb(pixel));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

fn green_leaf_png() -> Vec<u8> {
    encode_png(160, 160, [34, 139, 34])
}

#[tokio::test]
async fn test_uniform_green_image_produces_valid_result() {
    let leaf = RecordingModel::new(vec![0.2]);
    let disease = RecordingModel::new(vec![0.05, 0.85, 0.05, 0.05]);
    let analyzer = TeaLeafAnalyzer::new(leaf.clone(), disease.clone());

    let result = analyzer.analyze(&green_leaf_png()).unwrap();

    assert!(result.is_leaf);
    assert!((0.0..=1.0).contains(&result.leaf_confidence));
    assert_eq!(result.disease_class, Some(DiseaseClass::Healthy));
    let confidence = result.disease_confidence.unwrap();
    assert!((0.0..=1.0).contains(&confidence));
}

#[tokio::test]
async fn test_stages_receive_their_input_sizes() {
    let leaf = RecordingModel::new(vec![0.0]);
    let disease = RecordingModel::new(vec![0.1, 0.1, 0.7, 0.1]);
    let analyzer = TeaLeafAnalyzer::new(leaf.clone(), disease.clone());

    // Non-square source image is stretched to each model's size
    analyzer.analyze(&encode_png(300, 200, [20, 120, 30])).unwrap();

    assert_eq!(leaf.shapes(), vec![vec![1, 160, 160, 3]]);
    assert_eq!(disease.shapes(), vec![vec![1, 512, 512, 3]]);
}

#[tokio::test]
async fn test_non_leaf_never_reports_disease() {
    let leaf = RecordingModel::new(vec![0.97]);
    let disease = RecordingModel::new(vec![0.9, 0.05, 0.03, 0.02]);
    let analyzer = TeaLeafAnalyzer::new(leaf.clone(), disease.clone());

    let result = analyzer.analyze(&encode_png(64, 64, [200, 200, 200])).unwrap();

    assert!(!result.is_leaf);
    assert_eq!(result.disease_class, None);
    assert_eq!(result.disease_confidence, None);
    assert_eq!(disease.calls(), 0, "Stage 2 must not run for non-leaves");
}

#[tokio::test]
async fn test_leaf_invokes_disease_stage_exactly_once() {
    let leaf = RecordingModel::new(vec![0.1]);
    let disease = RecordingModel::new(vec![0.1, 0.1, 0.1, 0.7]);
    let analyzer = TeaLeafAnalyzer::new(leaf.clone(), disease.clone());

    let result = analyzer.analyze(&green_leaf_png()).unwrap();

    assert_eq!(result.disease_class, Some(DiseaseClass::RedSpiderMites));
    assert_eq!(leaf.calls(), 1);
    assert_eq!(disease.calls(), 1);
}

#[tokio::test]
async fn test_threshold_boundary_counts_as_leaf() {
    let leaf = RecordingModel::new(vec![0.5]);
    let disease = RecordingModel::new(vec![0.7, 0.1, 0.1, 0.1]);
    let analyzer = TeaLeafAnalyzer::new(leaf, disease);

    let result = analyzer.analyze(&green_leaf_png()).unwrap();

    assert!(result.is_leaf);
    assert!((result.leaf_confidence - 0.5).abs() < 1e-6);
    assert_eq!(result.disease_class, Some(DiseaseClass::BrownBlight));
}

#[tokio::test]
async fn test_analysis_is_idempotent() {
    let disease = RecordingModel::new(vec![0.2, 0.3, 0.4, 0.1]);
    let analyzer = TeaLeafAnalyzer::new(Arc::new(GreenMeanModel), disease);
    let bytes = green_leaf_png();

    let first = analyzer.analyze(&bytes).unwrap();
    let second = analyzer.analyze(&bytes).unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_corrupted_bytes_yield_fallback() {
    let leaf = RecordingModel::new(vec![0.1]);
    let disease = RecordingModel::new(vec![0.25, 0.25, 0.25, 0.25]);
    let analyzer = TeaLeafAnalyzer::new(leaf.clone(), disease);

    let mut bytes = green_leaf_png();
    bytes.truncate(40);

    let err = analyzer.analyze(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DecodeError);

    let report = analyzer.analyze_or_degraded(&bytes);
    assert_eq!(report.status, AnalysisStatus::Degraded);
    assert_eq!(report.error, Some(ErrorKind::DecodeError));
    assert!(!report.result.is_leaf);
    assert_eq!(report.result.leaf_confidence, 0.0);
    assert_eq!(report.result.disease_class, None);
    assert_eq!(report.result.disease_confidence, None);
    assert_eq!(leaf.calls(), 0);
}

#[tokio::test]
async fn test_disease_failure_is_explicit_error() {
    let leaf = RecordingModel::new(vec![0.1]);
    let analyzer = TeaLeafAnalyzer::new(leaf, Arc::new(FailingModel));

    let err = analyzer.analyze(&green_leaf_png()).unwrap_err();

    assert!(matches!(
        err,
        AnalysisError::Inference {
            stage: Stage::DiseaseClassification,
            ..
        }
    ));
    assert_eq!(err.kind(), ErrorKind::InferenceError);
}

#[tokio::test]
async fn test_leaf_failure_degrades() {
    let disease = RecordingModel::new(vec![0.25, 0.25, 0.25, 0.25]);
    let analyzer = TeaLeafAnalyzer::new(Arc::new(FailingModel), disease.clone());

    let report = analyzer.analyze_or_degraded(&green_leaf_png());

    assert!(report.is_degraded());
    assert_eq!(report.error, Some(ErrorKind::InferenceError));
    assert_eq!(disease.calls(), 0);
}

#[tokio::test]
async fn test_leaf_model_panic_degrades() {
    let disease = RecordingModel::new(vec![0.25, 0.25, 0.25, 0.25]);
    let analyzer = TeaLeafAnalyzer::new(Arc::new(PanickingModel), disease.clone());

    let report = analyzer.analyze_or_degraded(&green_leaf_png());

    assert_eq!(report.status, AnalysisStatus::Degraded);
    assert_eq!(report.error, Some(ErrorKind::InferenceError));
    assert!(!report.result.is_leaf);
    assert_eq!(report.result.disease_class, None);
    assert_eq!(disease.calls(), 0);

    // Repeated requests still get an answer
    let again = analyzer.analyze_or_degraded(&green_leaf_png());
    assert_eq!(again, report);
}

#[tokio::test]
async fn test_disease_model_panic_is_stage_error() {
    let leaf = RecordingModel::new(vec![0.1]);
    let analyzer = TeaLeafAnalyzer::new(leaf, Arc::new(PanickingModel));

    let err = analyzer.analyze(&green_leaf_png()).unwrap_err();

    assert_eq!(err.stage(), Some(Stage::DiseaseClassification));
    assert_eq!(err.kind(), ErrorKind::InferenceError);
}

#[tokio::test]
async fn test_five_way_disease_head_degrades() {
    let leaf = RecordingModel::new(vec![0.1]);
    let disease = RecordingModel::new(vec![0.1, 0.1, 0.1, 0.1, 0.6]);
    let analyzer = TeaLeafAnalyzer::new(leaf, disease);

    let report = analyzer.analyze_or_degraded(&green_leaf_png());

    assert!(report.is_degraded());
    assert_eq!(report.error, Some(ErrorKind::InferenceError));
    assert_eq!(report.result.disease_class, None);
}

#[tokio::test]
async fn test_concurrent_analyses_share_one_analyzer() {
    let leaf = RecordingModel::new(vec![0.1]);
    let disease = RecordingModel::new(vec![0.1, 0.2, 0.6, 0.1]);
    let analyzer = Arc::new(TeaLeafAnalyzer::new(leaf.clone(), disease.clone()));
    let bytes = Arc::new(green_leaf_png());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let analyzer = analyzer.clone();
            let bytes = bytes.clone();
            tokio::task::spawn_blocking(move || analyzer.analyze(&bytes))
        })
        .collect();

    for handle in handles {
        let result = handle.await.unwrap().unwrap();
        assert_eq!(result.disease_class, Some(DiseaseClass::RedRust));
    }
    assert_eq!(leaf.calls(), 4);
    assert_eq!(disease.calls(), 4);
}
