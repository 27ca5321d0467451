use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use thumb_proxy::{
    config::Config, observability::AppObservability, thumbnails::ThumbnailService, web::WebServer,
};

#[derive(Parser)]
#[command(name = "thumb-proxy")]
#[command(version)]
#[command(about = "Caching proxy that serves upstream thumbnails as square PNGs")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path (falls back to CONFIG_FILE)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Listening IP address
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = if cli.log_level == "trace" {
        format!("thumb_proxy={},tower_http=trace", cli.log_level)
    } else {
        format!("thumb_proxy={}", cli.log_level)
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting thumbnail proxy v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match cli.config.as_deref() {
        Some(path) => Config::load_from(Some(path))?,
        None => Config::load()?,
    };
    if let Some(host) = cli.host {
        config.web.host = host;
    }
    if let Some(port) = cli.port {
        config.web.port = port;
    }
    info!(
        "Serving {}px thumbnails, cache {} (ttl {})",
        config.thumbnail.size,
        config.storage.cache_dir.display(),
        humantime::format_duration(config.thumbnail.cache_ttl)
    );

    let observability = AppObservability::new(&config.web.service_name)?;
    let service = ThumbnailService::from_config(&config, observability.thumbnails.clone())?;

    // writes recreate the directory on demand, so a failure here is not fatal
    if let Err(e) = service.cache().ensure_cache_dir().await {
        warn!(
            "Could not create cache directory {}: {}",
            service.cache().cache_dir().display(),
            e
        );
    }

    let server = WebServer::new(Arc::new(config), Arc::new(service))?;
    server.serve().await?;

    info!("Thumbnail proxy shut down");
    Ok(())
}
