mod env_file;
mod error;
mod router;

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use studio_engine::{ChatRelay, EditDispatcher, EngineConfig};
use tracing_subscriber::EnvFilter;

use crate::router::{build_router, AppState, DEFAULT_MAX_UPLOAD_BYTES};

const DEFAULT_LOG_FILTER: &str = "studio_server=info,studio_engine=info,tower_http=info";

#[derive(Debug, Parser)]
#[command(
    name = "studio-server",
    version,
    about = "Image editing and chat relay for the studio front end"
)]
struct Cli {
    #[arg(long, default_value = "127.0.0.1:3000")]
    bind: SocketAddr,
    /// Dotenv file read at startup; variables already set in the process win.
    #[arg(long, default_value = ".env")]
    env_file: PathBuf,
    /// Used when RUST_LOG is not set.
    #[arg(long, default_value = DEFAULT_LOG_FILTER)]
    log_filter: String,
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    max_upload_bytes: usize,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("studio-server error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let applied = env_file::load_env_file(&cli.env_file)?;
    init_tracing(&cli.log_filter)?;
    if applied > 0 {
        tracing::info!(path = %cli.env_file.display(), applied, "loaded env file");
    }

    let config = EngineConfig::from_env();
    tracing::info!(
        openai_base = %config.openai.api_base,
        image_model = %config.openai.image_model,
        gemini_base = %config.gemini.api_base,
        text_model = %config.gemini.text_model,
        "engine configured"
    );
    if config.openai.api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY is not set; edit endpoints will fail");
    }
    if config.gemini.api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY is not set; chat endpoint will fail");
    }

    let state = AppState::new(
        EditDispatcher::from_config(&config)?,
        ChatRelay::from_config(&config)?,
    );
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let served = runtime.block_on(serve(state.clone(), cli.bind, cli.max_upload_bytes));

    // Blocking HTTP clients must be released outside the runtime.
    drop(runtime);
    drop(state);
    served?;
    Ok(0)
}

fn init_tracing(fallback: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(fallback)
            .with_context(|| format!("invalid log filter: {fallback}"))?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|err| anyhow::anyhow!("failed to install tracing subscriber: {err}"))
}

async fn serve(state: AppState, bind: SocketAddr, max_upload_bytes: usize) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    let local = listener.local_addr().context("listener has no local address")?;
    tracing::info!(addr = %local, max_upload_bytes, "studio-server listening");

    axum::serve(listener, build_router(state, max_upload_bytes))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server terminated unexpectedly")?;
    tracing::info!("studio-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
