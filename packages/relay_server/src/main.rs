use anyhow::{Context, Result};
use axum::{Router, routing::get};
use clap::{Parser, Subcommand};
use frame_relay::FrameStore;
use std::path::PathBuf;
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::CorsLayer;
use tower_http::trace::MakeSpan;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::prelude::*;
use uuid::Uuid;

mod config;
mod handlers;
mod metrics;
mod push;
#[cfg(test)]
mod test_helpers;

use crate::config::{FileConfig, RelayConfig};
use crate::metrics::RelayMetrics;

/// Custom span maker that adds a unique request ID to each incoming request
#[derive(Clone)]
struct RequestIdMakeSpan;

impl<B> MakeSpan<B> for RequestIdMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> tracing::Span {
        let request_id = Uuid::new_v4().to_string();
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    }
}

#[derive(Parser)]
#[command(name = "relay")]
#[command(about = "Live camera frame relay: push over WebSocket, watch as MJPEG")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Directory holding config.toml (defaults to the current directory)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay server in the foreground (default)
    Serve(ServeArgs),

    /// Push image files to a relay as a fake camera
    Push(PushArgs),
}

#[derive(Parser, Default)]
struct ServeArgs {
    /// Port for the web server (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind to (overrides config)
    #[arg(short = 'b', long)]
    host: Option<String>,
}

#[derive(Parser)]
struct PushArgs {
    /// Relay base URL
    #[arg(long, default_value = "ws://127.0.0.1:8000")]
    url: String,

    /// Device identifier
    #[arg(long)]
    robot_id: String,

    /// Camera identifier
    #[arg(long, default_value = "default")]
    camera_id: String,

    /// Frames per second to push
    #[arg(long, default_value = "10")]
    fps: f64,

    /// Stop after this many frames
    #[arg(long)]
    count: Option<u64>,

    /// Image files, sent in order and repeated
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[derive(Clone)]
pub(crate) struct AppState {
    /// Latest frame per device/stream
    pub store: Arc<FrameStore>,
    pub config: Arc<RelayConfig>,
    /// Relay metrics for observability
    pub metrics: Arc<RelayMetrics>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    match cli.command {
        Some(Commands::Push(args)) => {
            push::push(push::PushOptions {
                url: args.url,
                robot_id: args.robot_id,
                camera_id: args.camera_id,
                fps: args.fps,
                files: args.files,
                count: args.count,
            })
            .await?;
            Ok(())
        }
        Some(Commands::Serve(args)) => run_server(args, cli.data_dir).await,
        None => run_server(ServeArgs::default(), cli.data_dir).await,
    }
}

fn init_logging(debug: bool) {
    let default_directive = if debug {
        "relay_server=debug,frame_relay=debug,tower_http=debug,info"
    } else {
        "relay_server=info,frame_relay=info,tower_http=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();
}

/// All relay routes, mounted the way devices and apps expect them.
pub(crate) fn build_router(state: AppState) -> Router {
    let camera_routes = Router::new()
        .route("/upload/ws", get(handlers::upload_websocket_handler))
        .route("/mjpeg", get(handlers::mjpeg_handler))
        .route("/snapshot", get(handlers::snapshot_handler))
        .route("/robots/online", get(handlers::robots_online_handler));

    Router::new()
        .nest("/api/v1/camera", camera_routes)
        // Health endpoints
        .route("/health", get(handlers::health_handler))
        .route("/health/live", get(handlers::health_live_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(TraceLayer::new_for_http().make_span_with(RequestIdMakeSpan))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn run_server(args: ServeArgs, data_dir: Option<PathBuf>) -> Result<()> {
    info!("Starting frame relay");

    let data_dir = match data_dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to resolve current directory")?,
    };
    let file_config: FileConfig = config::load_config(&data_dir)
        .extract()
        .with_context(|| {
            format!(
                "Invalid configuration in {}",
                config::config_toml_path(&data_dir).display()
            )
        })?;
    let relay_config = RelayConfig::from_file(&file_config);

    info!(
        "Stream config: max_fps={}, stale_timeout={}s, idle_poll={}ms, new_frame_poll={}ms",
        relay_config.stream.effective_fps(),
        relay_config.stream.stale_timeout.as_secs(),
        relay_config.stream.idle_poll_interval.as_millis(),
        relay_config.stream.new_frame_poll_interval.as_millis()
    );
    match relay_config.retention.max_age {
        Some(age) => info!("Evicting keys idle for more than {}s", age.as_secs()),
        None => info!("Key eviction disabled (set RELAY_RETENTION__MAX_AGE_SECS to enable)"),
    }

    let store = Arc::new(FrameStore::new());
    let metrics = Arc::new(RelayMetrics::new());

    let sweeper = {
        let store = store.clone();
        let metrics = metrics.clone();
        let policy = relay_config.retention.clone();
        tokio::spawn(frame_relay::run_sweeper(store, policy, move |n| {
            metrics.keys_evicted(n)
        }))
    };

    let app_state = AppState {
        store,
        config: Arc::new(relay_config),
        metrics,
    };
    let app = build_router(app_state);

    let host = args.host.unwrap_or(file_config.server.host);
    let port = args.port.unwrap_or(file_config.server.port);
    let addr = format!("{}:{}", host, port).parse::<SocketAddr>()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    let actual_addr = listener.local_addr()?;

    info!("Frame relay listening on http://{}", actual_addr);
    info!("");
    info!("Endpoints:");
    info!("  WS  /api/v1/camera/upload/ws    - Push frames (robot_id, camera_id)");
    info!("  GET /api/v1/camera/mjpeg        - MJPEG stream");
    info!("  GET /api/v1/camera/snapshot     - Latest JPEG");
    info!("  GET /api/v1/camera/robots/online - Recently active streams");

    // Create shutdown signal handler
    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal, cleaning up...");
    };

    let server_result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("Server error");

    sweeper.abort();
    info!("Shutdown complete");
    server_result
}
