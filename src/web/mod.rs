use anyhow::{Context, Result};
use axum::{Router, routing::get};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::{config::Config, thumbnails::ThumbnailService};

pub mod handlers;
pub mod middleware;
pub mod responses;

pub use responses::{ErrorResponse, handle_error, png_response};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub thumbnails: Arc<ThumbnailService>,
}

pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub fn new(config: Arc<Config>, thumbnails: Arc<ThumbnailService>) -> Result<Self> {
        let addr: SocketAddr = format!("{}:{}", config.web.host, config.web.port)
            .parse()
            .with_context(|| {
                format!(
                    "Invalid listen address {}:{}",
                    config.web.host, config.web.port
                )
            })?;

        let app = create_router(AppState { config, thumbnails });
        Ok(Self { app, addr })
    }

    /// Serve until SIGINT or SIGTERM
    pub async fn serve(self) -> Result<()> {
        self.serve_with_shutdown(shutdown_signal()).await
    }

    /// Serve until `shutdown` resolves, letting in-flight requests finish
    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = tokio::net::TcpListener::bind(&self.addr)
            .await
            .with_context(|| format!("Failed to bind to {}", self.addr))?;
        info!("Thumbnail proxy listening on http://{}", self.addr);

        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown)
            .await?;
        info!("Web server stopped");
        Ok(())
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index::index))
        .route("/health", get(handlers::health::health_check))
        // axum cannot match a literal suffix inside a segment, the handler strips `.png`
        .route("/thumb/{file}", get(handlers::thumbnails::get_thumbnail))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(
            middleware::request_logging_middleware,
        ))
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT, shutting down gracefully"),
        _ = terminate => info!("Received SIGTERM, shutting down gracefully"),
    }
}
