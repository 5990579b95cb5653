// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Analyze request types and validation

use serde::{Deserialize, Serialize};

use crate::api::errors::ApiError;
use crate::vision::decode_base64_payload;

/// Maximum base64 payload length (a 10MB image grows by a third when encoded)
const MAX_ENCODED_SIZE: usize = 14 * 1024 * 1024;

/// Request for leaf analysis
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    /// Base64-encoded image data, optionally as a data URL
    #[serde(default, alias = "imageBase64")]
    pub image: Option<String>,

    /// MIME type hint sent by some clients; the format is sniffed from the
    /// bytes instead
    #[serde(default)]
    pub image_type: Option<String>,
}

impl AnalyzeRequest {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: Some(image.into()),
            image_type: None,
        }
    }

    /// Validate the request
    pub fn validate(&self) -> Result<(), ApiError> {
        let image = match self.image.as_deref().map(str::trim) {
            Some(image) if !image.is_empty() => image,
            _ => {
                return Err(ApiError::ValidationError {
                    field: "image".to_string(),
                    message: "No image provided".to_string(),
                })
            }
        };

        if image.len() > MAX_ENCODED_SIZE {
            return Err(ApiError::PayloadTooLarge {
                size: image.len(),
                max: MAX_ENCODED_SIZE,
            });
        }

        Ok(())
    }

    /// Validate, then decode the base64 payload into raw image bytes
    pub fn image_bytes(&self) -> Result<Vec<u8>, ApiError> {
        self.validate()?;
        let image = self.image.as_deref().unwrap_or_default();

        decode_base64_payload(image).map_err(|e| ApiError::ValidationError {
            field: "image".to_string(),
            message: e.to_string(),
        })
    }
}
