// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Analyze API endpoint module
//!
//! Provides POST /analyze (base64 JSON) and POST /analyze/upload (multipart).

pub mod handler;
pub mod request;
pub mod response;

pub use handler::{analyze_handler, analyze_upload_handler, IMAGE_FIELD};
pub use request::AnalyzeRequest;
pub use response::AnalyzeResponse;
