// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Analyze response types

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::analysis::AnalysisReport;

/// Response from leaf analysis
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    /// isLeaf, leafConfidence, diseaseClass, diseaseConfidence, status, error
    #[serde(flatten)]
    pub report: AnalysisReport,
    /// Human readable disease name ("Red Rust"), only for leaves
    pub disease_name: Option<String>,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
    /// When the analysis finished
    pub timestamp: DateTime<Utc>,
}

impl AnalyzeResponse {
    pub fn new(report: AnalysisReport, processing_time_ms: u64) -> Self {
        let disease_name = report
            .result
            .disease_class
            .map(|class| class.display_name().to_string());

        Self {
            report,
            disease_name,
            processing_time_ms,
            timestamp: Utc::now(),
        }
    }
}
