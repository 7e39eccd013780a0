use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use chrono::NaiveDate;
use futures::{SinkExt, StreamExt};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tower_http::services::ServeDir;

use crate::detection;
use crate::generator::MarketGenerator;
use crate::latency::{LatencyStats, RecomputeTracker};
use crate::types::{Analysis, AnalysisConfig, BandPoint, MarketRecord};

const MAX_TABLE_ROWS: usize = 200;
const MAX_SERIES: usize = 16;

#[derive(Clone, Serialize)]
struct DashboardUpdate {
    std_threshold: f64,
    volume_multiplier: f64,
    total_records: usize,
    securities: usize,
    defects: usize,
    buzzing: Vec<BuzzRow>,
    price_alerts: Vec<PriceAlertRow>,
    volume_spikes: Vec<VolumeSpikeRow>,
    series: Vec<SeriesRow>,
    latency: LatencyStats,
    uptime_secs: u64,
}

#[derive(Clone, Serialize)]
struct BuzzRow {
    security_id: String,
    symbol: String,
    alerts: usize,
}

#[derive(Clone, Serialize)]
struct PriceAlertRow {
    date: NaiveDate,
    symbol: String,
    price: f64,
}

#[derive(Clone, Serialize)]
struct VolumeSpikeRow {
    date: NaiveDate,
    symbol: String,
    volume: u64,
}

/// Per-security time-ordered band series for charting.
#[derive(Clone, Serialize)]
struct SeriesRow {
    security_id: String,
    symbol: String,
    points: Vec<BandPoint>,
}

/// Threshold change sent by a dashboard client. Each one triggers a
/// full recompute, the web rendition of the original slider controls.
#[derive(Debug, Deserialize)]
struct ConfigMsg {
    std_threshold: Option<f64>,
    volume_multiplier: Option<f64>,
}

struct AppState {
    tx: broadcast::Sender<String>,
    config_tx: mpsc::Sender<ConfigMsg>,
}

pub async fn run(
    port: u16,
    records: Vec<MarketRecord>,
    config: AnalysisConfig,
    generator: Option<MarketGenerator>,
    duration: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let (tx, _) = broadcast::channel::<String>(256);
    let (config_tx, config_rx) = mpsc::channel::<ConfigMsg>(32);
    let state = Arc::new(AppState {
        tx: tx.clone(),
        config_tx,
    });

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .fallback_service(ServeDir::new("static"))
        .with_state(state);

    // Spawn the screening engine
    let engine_tx = tx.clone();
    tokio::spawn(async move {
        run_engine(engine_tx, config_rx, records, config, generator, duration).await;
    });

    let addr = format!("0.0.0.0:{port}");
    info!("dashboard at http://localhost:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let rx = state.tx.subscribe();
    let config_tx = state.config_tx.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, rx, config_tx))
}

async fn handle_socket(
    socket: WebSocket,
    mut rx: broadcast::Receiver<String>,
    config_tx: mpsc::Sender<ConfigMsg>,
) {
    let (mut sender, mut receiver) = socket.split();
    loop {
        tokio::select! {
            update = rx.recv() => match update {
                Ok(msg) => {
                    if sender.send(Message::Text(msg)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            },
            inbound = receiver.next() => match inbound {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<ConfigMsg>(&text) {
                    Ok(msg) => {
                        let _ = config_tx.send(msg).await;
                    }
                    Err(e) => warn!("ignoring malformed config message: {e}"),
                },
                Some(Ok(_)) => continue,
                _ => break,
            },
        }
    }
}

async fn run_engine(
    tx: broadcast::Sender<String>,
    mut config_rx: mpsc::Receiver<ConfigMsg>,
    mut records: Vec<MarketRecord>,
    mut config: AnalysisConfig,
    mut generator: Option<MarketGenerator>,
    duration: u64,
) {
    let mut tracker = RecomputeTracker::new();
    let run_duration = if duration == 0 {
        Duration::from_secs(3600)
    } else {
        Duration::from_secs(duration)
    };
    let start = Instant::now();

    let mut analysis = recompute(&records, &config, &mut tracker);
    broadcast_update(&tx, &analysis, &config, &tracker, start);

    let mut day_tick = tokio::time::interval(Duration::from_secs(1));
    day_tick.tick().await; // first tick fires immediately

    while start.elapsed() < run_duration {
        let mut dirty = false;
        tokio::select! {
            Some(msg) = config_rx.recv() => {
                if let Some(k) = msg.std_threshold {
                    config.std_threshold = k.clamp(1.0, 5.0);
                }
                if let Some(m) = msg.volume_multiplier {
                    config.volume_multiplier = m.clamp(1.0, 10.0);
                }
                dirty = true;
            }
            _ = day_tick.tick() => {
                // Live mode: one generated trading day per tick.
                if let Some(gen) = generator.as_mut() {
                    records.extend(gen.generate_day());
                    dirty = true;
                }
            }
        }
        if dirty {
            analysis = recompute(&records, &config, &mut tracker);
            broadcast_update(&tx, &analysis, &config, &tracker, start);
        }
    }
}

fn recompute(
    records: &[MarketRecord],
    config: &AnalysisConfig,
    tracker: &mut RecomputeTracker,
) -> Analysis {
    let started = Instant::now();
    let analysis = detection::analyze(records, config);
    tracker.record(started);
    analysis
}

fn broadcast_update(
    tx: &broadcast::Sender<String>,
    analysis: &Analysis,
    config: &AnalysisConfig,
    tracker: &RecomputeTracker,
    start: Instant,
) {
    let summary = &analysis.summary;

    let buzzing: Vec<BuzzRow> = summary
        .buzzing
        .iter()
        .map(|id| BuzzRow {
            security_id: id.clone(),
            symbol: summary.symbols.get(id).cloned().unwrap_or_default(),
            alerts: analysis
                .groups
                .get(id)
                .map(|g| g.flags.iter().filter(|fl| fl.price_alert).count())
                .unwrap_or(0),
        })
        .collect();

    // Latest rows first, capped to keep the payload bounded.
    let price_alerts: Vec<PriceAlertRow> = summary
        .price_alerts
        .iter()
        .rev()
        .take(MAX_TABLE_ROWS)
        .map(|rec| PriceAlertRow {
            date: rec.date,
            symbol: rec.symbol.clone(),
            price: rec.price,
        })
        .collect();

    let volume_spikes: Vec<VolumeSpikeRow> = summary
        .volume_spikes
        .iter()
        .rev()
        .take(MAX_TABLE_ROWS)
        .map(|rec| VolumeSpikeRow {
            date: rec.date,
            symbol: rec.symbol.clone(),
            volume: rec.volume,
        })
        .collect();

    let series: Vec<SeriesRow> = analysis
        .groups
        .values()
        .take(MAX_SERIES)
        .map(|g| SeriesRow {
            security_id: g.security_id.clone(),
            symbol: g.symbol.clone(),
            points: g.band_series(config.std_threshold),
        })
        .collect();

    let update = DashboardUpdate {
        std_threshold: config.std_threshold,
        volume_multiplier: config.volume_multiplier,
        total_records: analysis.filtered.len(),
        securities: analysis.groups.len(),
        defects: analysis.defects.len(),
        buzzing,
        price_alerts,
        volume_spikes,
        series,
        latency: tracker.stats(),
        uptime_secs: start.elapsed().as_secs(),
    };

    match serde_json::to_string(&update) {
        Ok(json) => {
            let _ = tx.send(json);
        }
        Err(e) => warn!("failed to serialize dashboard update: {e}"),
    }
}
