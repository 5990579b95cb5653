// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Model artifacts: where they live, how they are fetched, how they are loaded

pub mod downloading;
pub mod model_set;

pub use downloading::{
    file_sha256, DownloadConfig, DownloadError, ModelDownloader, ModelSource, ResolvedModel,
    RetryPolicy,
};
pub use model_set::{LoadedModels, ModelSet, DISEASE_MODEL_FILE, LEAF_MODEL_FILE};
