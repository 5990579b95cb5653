// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image preprocessing for the TeaLeafNet classifiers
//!
//! Both classifiers were trained on Keras pipelines that feed `NHWC` float
//! tensors scaled to `[0, 1]` with no mean/std normalization.

use image::{imageops::FilterType, DynamicImage};
use ndarray::Array4;

use super::model::InferenceError;

/// Spatial size expected by a model input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSize {
    pub width: u32,
    pub height: u32,
}

impl InputSize {
    pub const fn square(side: u32) -> Self {
        Self {
            width: side,
            height: side,
        }
    }

    /// Tensor shape `[1, H, W, 3]` for this size
    pub fn tensor_shape(&self) -> [usize; 4] {
        [1, self.height as usize, self.width as usize, 3]
    }
}

/// Input size of the Stage 1 leaf detector
pub const LEAF_INPUT_SIZE: InputSize = InputSize::square(160);

/// Input size of the Stage 2 disease classifier
pub const DISEASE_INPUT_SIZE: InputSize = InputSize::square(512);

/// Preprocess a decoded image for a classifier
///
/// Steps:
/// 1. Flatten to RGB (alpha and palette are dropped)
/// 2. Resize exactly to `size` (aspect ratio is not preserved, bicubic filter)
/// 3. Scale each channel to `[0, 1]` as `pixel / 255.0`
/// 4. Frame as `[1, H, W, 3]`
pub fn preprocess_image(
    image: &DynamicImage,
    size: InputSize,
) -> Result<Array4<f32>, InferenceError> {
    let rgb = if image.width() == size.width && image.height() == size.height {
        image.to_rgb8()
    } else {
        image
            .resize_exact(size.width, size.height, FilterType::CatmullRom)
            .to_rgb8()
    };

    let values: Vec<f32> = rgb
        .into_raw()
        .into_iter()
        .map(|v| v as f32 / 255.0)
        .collect();

    frame_nhwc(values, size)
}

/// Frame a row-major HWC buffer as `[1, H, W, 3]`
fn frame_nhwc(values: Vec<f32>, size: InputSize) -> Result<Array4<f32>, InferenceError> {
    let shape = size.tensor_shape();
    let len = values.len();
    Array4::from_shape_vec(shape, values).map_err(|e| {
        InferenceError::InvalidInput(format!(
            "{} values cannot fill tensor {:?}: {}",
            len, shape, e
        ))
    })
}
