// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the TeaLeaf Node

/// Full version string with feature description
pub const VERSION: &str = "v1.0.0-two-stage-onnx-2026-10-18";

/// Semantic version number
pub const VERSION_NUMBER: &str = "1.0.0";

/// Major version number
pub const VERSION_MAJOR: u32 = 1;

/// Minor version number
pub const VERSION_MINOR: u32 = 0;

/// Patch version number
pub const VERSION_PATCH: u32 = 0;

/// Build date
pub const BUILD_DATE: &str = "2026-10-18";

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "leaf-detection",
    "disease-classification",
    "onnx-runtime-cpu",
    "explicit-degraded-status",
    "base64-upload",
    "multipart-upload",
    "model-download-cache",
    "sha256-verification",
];

/// Disease labels understood by the classifier, in model output order
pub const DISEASE_LABELS: &[&str] = &["bb", "gl", "rr", "rsm"];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("TeaLeaf Node {} ({})", VERSION_NUMBER, BUILD_DATE)
}

/// Get full version info for API responses
pub fn get_version_info() -> serde_json::Value {
    serde_json::json!({
        "version": VERSION_NUMBER,
        "build": VERSION,
        "date": BUILD_DATE,
        "features": FEATURES,
        "labels": DISEASE_LABELS,
    })
}
