// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision plumbing shared by both classifier stages
//!
//! This module provides:
//! - Image decoding and format detection for uploads
//! - Resizing and normalization into model-ready tensors
//! - The `TensorModel` seam and its ONNX Runtime implementation
//!
//! Everything runs on CPU.

pub mod image_utils;
pub mod model;
pub mod preprocessing;

pub use image_utils::{decode_base64_payload, decode_image_bytes, detect_format, ImageError, ImageInfo};
pub use model::{InferenceError, ModelDescription, OnnxClassifier, TensorDescription, TensorModel};
pub use preprocessing::{preprocess_image, InputSize, DISEASE_INPUT_SIZE, LEAF_INPUT_SIZE};
