// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::analysis::{AnalysisError, AnalysisReport};
use crate::api::{start_server, AppState};
use crate::config::{NodeConfig, ServerConfig};
use crate::models::LoadedModels;
use crate::version;

/// TeaLeaf Node CLI
#[derive(Parser, Debug)]
#[command(name = "tealeaf-node")]
#[command(version = version::VERSION_NUMBER)]
#[command(about = "Two-stage tea leaf disease analysis service", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub node: NodeConfig,

    #[command(flatten)]
    pub server: ServerConfig,

    /// Defaults to `serve`
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Load the models and start the HTTP API
    Serve,

    /// Analyze a local image and print the JSON report
    Analyze {
        /// Image file (JPEG, PNG, WebP, ...)
        file: PathBuf,
    },

    /// Print input and output tensors of both models
    Inspect,

    /// Download any missing model artifacts, then exit
    FetchModels,
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(cli.node, cli.server).await,
        Commands::Analyze { file } => analyze_file(cli.node, file).await,
        Commands::Inspect => inspect(cli.node).await,
        Commands::FetchModels => fetch_models(cli.node).await,
    }
}

async fn load_models(node: &NodeConfig) -> Result<LoadedModels> {
    node.model_set()
        .resolve_and_load(node.download_config(), node.intra_threads)
        .await
}

/// Start the API; a failed model load leaves `/analyze` answering 503
async fn serve(node: NodeConfig, server: ServerConfig) -> Result<()> {
    println!("🚀 Starting TeaLeaf Node...\n");
    println!("📦 BUILD VERSION: {}", version::VERSION);
    println!("📅 Build Date: {}", version::BUILD_DATE);
    println!();

    let addr = server.socket_addr()?;
    info!("{}", version::get_version_string());

    println!("🤖 Loading TeaLeafNet models from {}...", node.models_dir.display());
    let state = match load_models(&node).await {
        Ok(models) => {
            for description in models.descriptions() {
                info!(
                    "✅ {} model ready ({})",
                    description.name,
                    description.path.display()
                );
            }
            AppState::new(models.into_analyzer())
        }
        Err(e) => {
            warn!("⚠️  Failed to load models: {:#}", e);
            println!("⚠️  Models not loaded, /analyze will return 503 until restart");
            AppState::without_models()
        }
    };

    start_server(state, addr).await
}

async fn analyze_file(node: NodeConfig, file: PathBuf) -> Result<()> {
    let bytes = tokio::fs::read(&file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let analyzer = load_models(&node).await?.into_analyzer();
    let report = tokio::task::spawn_blocking(move || analyzer.analyze_or_degraded(&bytes))
        .await
        .unwrap_or_else(|e| AnalysisReport::degraded(&AnalysisError::Panicked(e.to_string())));

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn inspect(node: NodeConfig) -> Result<()> {
    let models = load_models(&node).await?;
    let report = serde_json::json!({
        "node": version::get_version_info(),
        "models": models.descriptions(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn fetch_models(node: NodeConfig) -> Result<()> {
    let (leaf, disease) = node.model_set().resolve(node.download_config()).await?;

    for resolved in [leaf, disease] {
        println!(
            "{} {} ({} bytes)",
            if resolved.downloaded { "📥" } else { "✅" },
            resolved.path.display(),
            resolved.size_bytes
        );
    }
    Ok(())
}
