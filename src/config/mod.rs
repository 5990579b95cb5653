// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Node configuration
//!
//! Every setting can come from a CLI flag or an environment variable.
//! A `.env` file in the working directory is loaded before parsing.

use clap::Args;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::models::{
    DownloadConfig, ModelSet, ModelSource, DISEASE_MODEL_FILE, LEAF_MODEL_FILE,
};

/// Settings shared by every subcommand
#[derive(Args, Debug, Clone, PartialEq)]
pub struct NodeConfig {
    /// Directory holding the model artifacts
    #[arg(long, env = "MODELS_DIR", default_value = "./models")]
    pub models_dir: PathBuf,

    /// Leaf detection model path (defaults to <models-dir>/leaf_detection.onnx)
    #[arg(long, env = "LEAF_MODEL_PATH")]
    pub leaf_model_path: Option<PathBuf>,

    /// Disease classification model path (defaults to <models-dir>/disease_classification.onnx)
    #[arg(long, env = "DISEASE_MODEL_PATH")]
    pub disease_model_path: Option<PathBuf>,

    /// URL to download the leaf detection model from when it is missing
    #[arg(long, env = "LEAF_MODEL_URL")]
    pub leaf_model_url: Option<String>,

    /// URL to download the disease classification model from when it is missing
    #[arg(long, env = "DISEASE_MODEL_URL")]
    pub disease_model_url: Option<String>,

    /// Expected SHA-256 of the leaf detection model
    #[arg(long, env = "LEAF_MODEL_SHA256")]
    pub leaf_model_sha256: Option<String>,

    /// Expected SHA-256 of the disease classification model
    #[arg(long, env = "DISEASE_MODEL_SHA256")]
    pub disease_model_sha256: Option<String>,

    /// ONNX Runtime intra-op threads per model
    #[arg(long, env = "INTRA_THREADS", default_value_t = 4)]
    pub intra_threads: usize,

    /// Total timeout for one model download, in seconds
    #[arg(long, env = "DOWNLOAD_TIMEOUT_SECS", default_value_t = 300)]
    pub download_timeout_secs: u64,
}

/// HTTP listener settings
#[derive(Args, Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse::<SocketAddr>()?)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("./models"),
            leaf_model_path: None,
            disease_model_path: None,
            leaf_model_url: None,
            disease_model_url: None,
            leaf_model_sha256: None,
            disease_model_sha256: None,
            intra_threads: 4,
            download_timeout_secs: 300,
        }
    }
}

impl NodeConfig {
    pub fn leaf_model_path(&self) -> PathBuf {
        self.leaf_model_path
            .clone()
            .unwrap_or_else(|| self.models_dir.join(LEAF_MODEL_FILE))
    }

    pub fn disease_model_path(&self) -> PathBuf {
        self.disease_model_path
            .clone()
            .unwrap_or_else(|| self.models_dir.join(DISEASE_MODEL_FILE))
    }

    /// Model sources described by this configuration
    pub fn model_set(&self) -> ModelSet {
        ModelSet {
            leaf: ModelSource {
                name: "leaf detection".to_string(),
                path: self.leaf_model_path(),
                url: non_empty(&self.leaf_model_url),
                sha256: non_empty(&self.leaf_model_sha256),
            },
            disease: ModelSource {
                name: "disease classification".to_string(),
                path: self.disease_model_path(),
                url: non_empty(&self.disease_model_url),
                sha256: non_empty(&self.disease_model_sha256),
            },
        }
    }

    pub fn download_config(&self) -> DownloadConfig {
        DownloadConfig {
            timeout_secs: self.download_timeout_secs,
            ..DownloadConfig::default()
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
