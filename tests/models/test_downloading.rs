// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Model artifact download tests
//!
//! A throwaway axum server on 127.0.0.1 plays the role of the model host.

use axum::{http::StatusCode, routing::get, Router};
use sha2::{Digest, Sha256};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tealeaf_node::models::{
    file_sha256, DownloadConfig, DownloadError, ModelDownloader, ModelSet, ModelSource,
    RetryPolicy, DISEASE_MODEL_FILE, LEAF_MODEL_FILE,
};
use tokio_test::assert_ok;

const MODEL_BYTES: &[u8] = b"fake onnx model bytes for download tests";

/// Serves MODEL_BYTES at /model.onnx and 404 at /missing.onnx, counting hits
async fn spawn_model_host() -> (SocketAddr, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    let app = Router::new()
        .route(
            "/model.onnx",
            get(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    MODEL_BYTES
                }
            }),
        )
        .route("/missing.onnx", get(|| async { StatusCode::NOT_FOUND }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, hits)
}

fn fast_config() -> DownloadConfig {
    DownloadConfig {
        connect_timeout_secs: 5,
        timeout_secs: 10,
        retry_policy: RetryPolicy {
            max_retries: 1,
            initial_delay_ms: 10,
            max_delay_ms: 10,
            exponential_base: 1.0,
        },
    }
}

fn expected_sha256() -> String {
    hex::encode(Sha256::digest(MODEL_BYTES))
}

#[tokio::test]
async fn test_download_missing_model() {
    let (addr, hits) = spawn_model_host().await;
    let dir = tempfile::tempdir().unwrap();
    let source = ModelSource {
        name: "leaf detection".to_string(),
        path: dir.path().join("nested").join(LEAF_MODEL_FILE),
        url: Some(format!("http://{}/model.onnx", addr)),
        sha256: Some(expected_sha256()),
    };

    let downloader = ModelDownloader::new(fast_config()).unwrap();
    let resolved = downloader.ensure(&source).await.unwrap();

    assert!(resolved.downloaded);
    assert_eq!(resolved.size_bytes, MODEL_BYTES.len() as u64);
    assert_eq!(tokio::fs::read(&source.path).await.unwrap(), MODEL_BYTES);
    assert!(!dir
        .path()
        .join("nested")
        .join(format!("{}.part", LEAF_MODEL_FILE))
        .exists());
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(file_sha256(&source.path).await.unwrap(), expected_sha256());
}

#[tokio::test]
async fn test_cached_model_is_not_downloaded_again() {
    let (addr, hits) = spawn_model_host().await;
    let dir = tempfile::tempdir().unwrap();
    let source = ModelSource {
        name: "disease classification".to_string(),
        path: dir.path().join(DISEASE_MODEL_FILE),
        url: Some(format!("http://{}/model.onnx", addr)),
        sha256: None,
    };

    let downloader = ModelDownloader::new(fast_config()).unwrap();
    let first = assert_ok!(downloader.ensure(&source).await);
    let second = assert_ok!(downloader.ensure(&source).await);

    assert!(first.downloaded);
    assert!(!second.downloaded);
    assert_eq!(second.size_bytes, first.size_bytes);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_checksum_mismatch_leaves_no_file() {
    let (addr, _hits) = spawn_model_host().await;
    let dir = tempfile::tempdir().unwrap();
    let source = ModelSource {
        name: "leaf detection".to_string(),
        path: dir.path().join(LEAF_MODEL_FILE),
        url: Some(format!("http://{}/model.onnx", addr)),
        sha256: Some("0".repeat(64)),
    };

    let downloader = ModelDownloader::new(fast_config()).unwrap();
    let err = downloader.ensure(&source).await.unwrap_err();

    assert!(matches!(err, DownloadError::ChecksumMismatch { .. }));
    assert!(!source.path.exists());
    assert!(!dir
        .path()
        .join(format!("{}.part", LEAF_MODEL_FILE))
        .exists());
}

#[tokio::test]
async fn test_failed_rename_removes_part_file() {
    let (addr, _hits) = spawn_model_host().await;
    let dir = tempfile::tempdir().unwrap();
    // A non-empty directory at the target path makes the final rename fail
    let target = dir.path().join(LEAF_MODEL_FILE);
    tokio::fs::create_dir_all(target.join("occupied")).await.unwrap();

    let source = ModelSource {
        name: "leaf detection".to_string(),
        path: target.clone(),
        url: Some(format!("http://{}/model.onnx", addr)),
        sha256: None,
    };

    let downloader = ModelDownloader::new(fast_config()).unwrap();
    let err = downloader.ensure(&source).await.unwrap_err();

    assert!(matches!(err, DownloadError::IoError(_)), "got {:?}", err);
    assert!(target.is_dir());
    assert!(!dir
        .path()
        .join(format!("{}.part", LEAF_MODEL_FILE))
        .exists());
}

#[tokio::test]
async fn test_http_error_exhausts_retries() {
    let (addr, _hits) = spawn_model_host().await;
    let dir = tempfile::tempdir().unwrap();
    let source = ModelSource {
        name: "leaf detection".to_string(),
        path: dir.path().join(LEAF_MODEL_FILE),
        url: Some(format!("http://{}/missing.onnx", addr)),
        sha256: None,
    };

    let downloader = ModelDownloader::new(fast_config()).unwrap();
    let err = downloader.ensure(&source).await.unwrap_err();

    match err {
        DownloadError::MaxRetriesExceeded { attempts, .. } => assert_eq!(attempts, 2),
        other => panic!("expected MaxRetriesExceeded, got {:?}", other),
    }
    assert!(!source.path.exists());
}

#[tokio::test]
async fn test_existing_file_needs_no_url() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(LEAF_MODEL_FILE);
    tokio::fs::write(&path, MODEL_BYTES).await.unwrap();

    let source = ModelSource {
        name: "leaf detection".to_string(),
        path: path.clone(),
        url: None,
        sha256: None,
    };

    let resolved = ModelDownloader::new(fast_config())
        .unwrap()
        .ensure(&source)
        .await
        .unwrap();
    assert_eq!(resolved.path, path);
    assert!(!resolved.downloaded);
}

#[tokio::test]
async fn test_model_set_resolves_both_artifacts() {
    let (addr, hits) = spawn_model_host().await;
    let dir = tempfile::tempdir().unwrap();
    let url = format!("http://{}/model.onnx", addr);

    let set = ModelSet {
        leaf: ModelSource {
            name: "leaf detection".to_string(),
            path: dir.path().join(LEAF_MODEL_FILE),
            url: Some(url.clone()),
            sha256: None,
        },
        disease: ModelSource {
            name: "disease classification".to_string(),
            path: dir.path().join(DISEASE_MODEL_FILE),
            url: Some(url),
            sha256: None,
        },
    };

    let (leaf, disease) = set.resolve(fast_config()).await.unwrap();
    assert!(leaf.downloaded && disease.downloaded);
    assert!(leaf.path.exists() && disease.path.exists());
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}
