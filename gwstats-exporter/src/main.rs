// gwstats Exporter - Prometheus exporter for gateway link statistics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # gwstats Exporter
//!
//! Prometheus exporter for gateway link statistics with record replay support.
//!
//! ## Usage
//!
//! ```bash
//! # Replay captured records
//! gwstats-exporter --records capture.jsonl --speed 10.0
//!
//! # Run on custom port with a stats configuration
//! gwstats-exporter --records capture.jsonl --port 9090 --config stats.json
//! ```

mod metrics;
mod replay;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use clap::Parser;
use gwstats::StatsConfig;
use metrics::encode_metrics;
use replay::{LatestPayloads, ReplayConfig, ReplayEngine, ReplayState};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

/// gwstats Prometheus Exporter
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "9100")]
    port: u16,

    /// JSON Lines record file to replay
    #[arg(short, long)]
    records: Option<String>,

    /// Replay speed multiplier (1.0 = real-time)
    #[arg(short, long, default_value = "1.0")]
    speed: f64,

    /// Loop the replay when it reaches the end
    #[arg(short, long)]
    loop_replay: bool,

    /// Stats engine configuration (JSON)
    #[arg(short, long)]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Application state shared across handlers.
struct AppState {
    replay_state: Option<Arc<ReplayState>>,
    latest: Option<LatestPayloads>,
    entity_count: usize,
    start_time: std::time::Instant,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match args.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        EnvFilter::from_default_env().add_directive(level.into())
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("gwstats Exporter v{}", env!("CARGO_PKG_VERSION"));

    let stats_config = match load_stats_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid stats configuration: {}", e);
            std::process::exit(2);
        }
    };

    // Initialize replay engine if a record file was given
    let (replay_state, latest, entity_count) = if let Some(records_path) = args.records.clone() {
        let config = ReplayConfig {
            records_path,
            speed: args.speed,
            loop_replay: args.loop_replay,
            ..Default::default()
        };

        match ReplayEngine::from_file(config, stats_config) {
            Ok(engine) => {
                let state = engine.state();
                let latest = engine.latest();
                let entity_count = engine.entity_count();

                tokio::spawn(async move {
                    engine.run().await;
                });

                (Some(state), Some(latest), entity_count)
            }
            Err(e) => {
                error!("Failed to load records: {}", e);
                (None, None, 0)
            }
        }
    } else {
        info!("No record file specified, running in static mode");
        (None, None, 0)
    };

    let state = Arc::new(AppState {
        replay_state,
        latest,
        entity_count,
        start_time: std::time::Instant::now(),
    });

    // Build router
    let app = Router::new()
        .route("/", get(root_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/status", get(status_handler))
        .route("/entities/:id", get(entity_handler))
        .with_state(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    info!("Starting server on http://{}", addr);
    info!("Metrics endpoint: http://{}/metrics", addr);

    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
    }
}

/// Read and validate the stats configuration, or use the defaults.
fn load_stats_config(path: Option<&str>) -> gwstats::Result<StatsConfig> {
    let Some(path) = path else {
        return Ok(StatsConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .map_err(|e| gwstats::StatsError::InvalidConfig(format!("{}: {}", path, e)))?;
    StatsConfig::from_json_str(&text)
}

/// Root handler - shows a simple HTML page.
async fn root_handler() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>gwstats Exporter</title>
    <style>
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; max-width: 800px; margin: 50px auto; padding: 20px; }
        h1 { color: #2c3e50; }
        a { color: #3498db; text-decoration: none; }
        .endpoints { background: #f8f9fa; padding: 20px; border-radius: 8px; margin: 20px 0; }
        .endpoint { margin: 10px 0; }
        code { background: #e9ecef; padding: 2px 6px; border-radius: 4px; }
    </style>
</head>
<body>
    <h1>gwstats Exporter</h1>
    <p>Prometheus exporter for gateway, Zigbee and BLE link statistics.</p>

    <div class="endpoints">
        <h2>Endpoints</h2>
        <div class="endpoint"><a href="/metrics">/metrics</a> - Prometheus metrics</div>
        <div class="endpoint"><a href="/health">/health</a> - Health check</div>
        <div class="endpoint"><a href="/ready">/ready</a> - Readiness check</div>
        <div class="endpoint"><a href="/status">/status</a> - Status information (JSON)</div>
        <div class="endpoint"><code>/entities/{id}</code> - Latest attributes of one device (JSON)</div>
    </div>

    <h2>Metrics</h2>
    <ul>
        <li><code>gwstats_msg_received</code> - Messages received per device</li>
        <li><code>gwstats_msg_missed</code> - Estimated Zigbee messages lost</li>
        <li><code>gwstats_link_quality</code> - Link quality of the last frame</li>
        <li><code>gwstats_rssi</code> - Signal strength of the last frame</li>
        <li><code>gwstats_new_resets</code> - Device resets since first seen</li>
        <li><code>gwstats_gateway_*</code> - Gateway health</li>
        <li><code>gwstats_serial_counter</code> - Radio chip UART counters</li>
    </ul>
</body>
</html>"#,
    )
}

/// Metrics handler - returns Prometheus text format.
async fn metrics_handler() -> impl IntoResponse {
    let metrics = encode_metrics();
    (
        StatusCode::OK,
        [("Content-Type", "text/plain; charset=utf-8")],
        metrics,
    )
}

/// Health check handler.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Readiness check handler.
async fn ready_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.replay_state {
        Some(ref replay_state) if !replay_state.is_ready() => {
            (StatusCode::SERVICE_UNAVAILABLE, "Starting")
        }
        _ => (StatusCode::OK, "Ready"),
    }
}

/// Status information response.
#[derive(Serialize)]
struct StatusResponse {
    version: String,
    uptime_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    replay: Option<ReplayStatus>,
}

/// Replay status information.
#[derive(Serialize)]
struct ReplayStatus {
    running: bool,
    position: usize,
    total_records: usize,
    dispatched: usize,
    progress_percent: f64,
    entity_count: usize,
}

/// Status handler - returns JSON status information.
async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let replay = state.replay_state.as_ref().map(|replay_state| {
        let position = replay_state.position.load(Ordering::SeqCst);
        let total = replay_state.total_records.load(Ordering::SeqCst);
        let progress = if total > 0 {
            (position as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        ReplayStatus {
            running: replay_state.running.load(Ordering::SeqCst),
            position,
            total_records: total,
            dispatched: replay_state.dispatched.load(Ordering::SeqCst),
            progress_percent: progress,
            entity_count: state.entity_count,
        }
    });

    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        replay,
    })
}

/// Entity handler - returns the latest merged payload of one device.
async fn entity_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    let Some(ref latest) = state.latest else {
        return (StatusCode::NOT_FOUND, "No replay running").into_response();
    };

    let latest = latest.read().await;
    match latest.get(&id) {
        Some(payload) => Json(payload.clone()).into_response(),
        None => (StatusCode::NOT_FOUND, format!("Unknown entity: {}", id)).into_response(),
    }
}
