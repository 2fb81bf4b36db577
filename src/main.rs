//! Publication streamer server
//!
//! Binds every recognizable publication package found in the configured
//! library directory and serves Web Publication manifests plus byte-ranged
//! resources.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use webpub_streamer::config::Config;
use webpub_streamer::drm::DrmContext;
use webpub_streamer::fetcher::{ArchiveFetcher, Fetcher, FileFetcher};
use webpub_streamer::model::FileFormat;
use webpub_streamer::parser::SourceFile;
use webpub_streamer::routes;
use webpub_streamer::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "webpub_streamer=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    tracing::info!("Starting webpub-streamer v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Manifest base URL: {}", config.server.base_url());

    let app_state = AppState::new(config.clone());

    // Bind everything in the library directory up front
    if let Some(dir) = &config.library.dir {
        if let Err(e) = scan_library(&app_state, dir).await {
            tracing::warn!(
                "Library scan of {} failed: {}. Starting with no publications",
                dir.display(),
                e
            );
        }
    }

    // Build CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router
    let app = Router::new()
        .nest("/health", routes::health::router())
        .merge(routes::publications::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state);

    // Start server with graceful shutdown
    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    tracing::info!("webpub-streamer listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Bind every recognizable package in `dir` under its file stem.
async fn scan_library(state: &AppState, dir: &Path) -> anyhow::Result<()> {
    let mut bound = 0usize;

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let (Some(name), Some(stem)) = (
            path.file_name().and_then(|s| s.to_str()).map(str::to_string),
            path.file_stem().and_then(|s| s.to_str()).map(str::to_string),
        ) else {
            continue;
        };

        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let (format, fetcher): (Option<FileFormat>, Arc<dyn Fetcher>) = match extension.as_str() {
            "epub" => match ArchiveFetcher::open(&path) {
                Ok(f) => (Some(FileFormat::Epub), Arc::new(f)),
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", path.display(), e);
                    continue;
                }
            },
            "zab" | "zip" | "cbz" => match ArchiveFetcher::open(&path) {
                Ok(f) => {
                    let format = (extension == "zab").then_some(FileFormat::Zab);
                    (format, Arc::new(f))
                }
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", path.display(), e);
                    continue;
                }
            },
            _ => {
                // Standalone files are only worth binding when they look
                // like audio.
                let is_audio = mime_guess::from_path(&path)
                    .first_raw()
                    .is_some_and(|t| t.starts_with("audio/"));
                if !is_audio {
                    continue;
                }
                match FileFetcher::new(&path) {
                    Ok(f) => (None, Arc::new(f)),
                    Err(e) => {
                        tracing::warn!("Skipping {}: {}", path.display(), e);
                        continue;
                    }
                }
            }
        };

        let source = SourceFile::new(name, format);
        match state
            .publications()
            .bind(&stem, source, fetcher, DrmContext::default(), &stem)
            .await
        {
            Ok(()) => bound += 1,
            Err(e) => tracing::warn!("Failed to bind {}: {}", path.display(), e),
        }
    }

    tracing::info!("Library scan complete, {} publication(s) bound", bound);
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
