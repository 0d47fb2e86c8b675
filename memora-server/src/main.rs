use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use memora_server::{
    create_app,
    infra::{
        config::{ConfigLoader, ConfigLoaderOptions, ConfigOverrides},
        startup::bootstrap,
    },
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "memora-server")]
#[command(about = "Watches a media folder and serves it with thumbnails and range streaming")]
#[command(version)]
struct Cli {
    /// Path to a memora.toml file
    #[arg(long, env = "MEMORA_CONFIG")]
    config: Option<PathBuf>,

    /// Path to a .env file (defaults to ./.env when present)
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "MEMORA_PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(long, env = "MEMORA_HOST")]
    host: Option<String>,

    /// Directory to index and serve
    #[arg(long, env = "MEDIA_ROOT")]
    media_root: Option<PathBuf>,

    /// Directory holding generated thumbnails
    #[arg(long, env = "THUMBNAIL_DIR")]
    thumbnail_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Only so clap's `env` fallbacks see `.env`; ConfigLoader loads it again
    // and reports failures once logging is up.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,memora_core=info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let load = ConfigLoader::with_options(ConfigLoaderOptions {
        config_path: cli.config,
        env_file: cli.env_file,
        overrides: ConfigOverrides {
            host: cli.host,
            port: cli.port,
            media_root: cli.media_root,
            thumbnail_dir: cli.thumbnail_dir,
        },
    })
    .load()
    .context("failed to load configuration")?;

    let config = load.config;
    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    if let Some(path) = &config.metadata.config_path {
        info!(path = %path.display(), "loaded configuration file");
    }
    for warning in load.warnings.iter() {
        match &warning.hint {
            Some(hint) => warn!(hint = %hint, "{}", warning.message),
            None => warn!("{}", warning.message),
        }
    }

    let addr = config.bind_addr()?;
    let services = bootstrap(config, None).await?;
    let app = create_app(services.state.clone());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Starting Memora media server on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    services.shutdown();
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
