use std::path::PathBuf;
use std::time::Instant;

use chrono::NaiveDate;
use clap::Parser;

use stock_buzz_detect::detection;
use stock_buzz_detect::export;
use stock_buzz_detect::generator::MarketGenerator;
use stock_buzz_detect::ingest;
use stock_buzz_detect::latency::format_latency;
use stock_buzz_detect::stress;
use stock_buzz_detect::tui;
use stock_buzz_detect::types::{AnalysisConfig, DateRange, DefectKind, MarketRecord};
use stock_buzz_detect::web;

#[derive(Parser)]
#[command(
    name = "stock-buzz-detect",
    about = "Daily price/volume anomaly screener with buzzing-stock detection"
)]
struct Cli {
    /// Run mode: tui, web, headless, or stress
    #[arg(long, default_value = "tui")]
    mode: String,

    /// Web server port (web mode only)
    #[arg(long, default_value = "3000")]
    port: u16,

    /// Directory of daily CSV files; omit to screen generated demo data
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Price deviation threshold in standard deviations
    #[arg(long, default_value = "2.0")]
    std_threshold: f64,

    /// Volume spike multiple of average volume
    #[arg(long, default_value = "3.0")]
    volume_multiplier: f64,

    /// Range start (YYYY-MM-DD); defaults to the earliest loaded date
    #[arg(long)]
    start_date: Option<NaiveDate>,

    /// Range end (YYYY-MM-DD); defaults to the latest loaded date
    #[arg(long)]
    end_date: Option<NaiveDate>,

    /// Write the filtered record set as CSV (headless mode)
    #[arg(long)]
    export: Option<PathBuf>,

    /// Trading days of demo history when no data directory is given
    #[arg(long, default_value = "90")]
    demo_days: usize,

    /// Anomaly injection rate for demo data (0.0-1.0)
    #[arg(long, default_value = "0.05")]
    anomaly_rate: f64,

    /// Keep appending generated days in tui/web demo modes
    #[arg(long)]
    live: bool,

    /// Run duration in seconds (0 = infinite); per level in stress mode
    #[arg(long, default_value = "0")]
    duration: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if cli.mode == "stress" {
        stress::run(if cli.duration == 0 { 10 } else { cli.duration });
        return Ok(());
    }

    let (records, generator) = load_dataset(&cli)?;
    let config = build_config(&cli, &records);

    match cli.mode.as_str() {
        "tui" => tui::run(records, config, generator, cli.duration)?,
        "web" => web::run(cli.port, records, config, generator, cli.duration).await?,
        "headless" => run_headless(&cli, &records, &config)?,
        other => eprintln!("Unknown mode: {other}. Use --mode tui|web|headless|stress"),
    }

    Ok(())
}

/// Load the CSV directory, or fall back to generated demo data. The
/// generator is kept around only when `--live` asks for appended days.
fn load_dataset(
    cli: &Cli,
) -> Result<(Vec<MarketRecord>, Option<MarketGenerator>), Box<dyn std::error::Error>> {
    match &cli.data_dir {
        Some(dir) => {
            let report = ingest::load_dir(dir)?;
            Ok((report.records, None))
        }
        None => {
            // Backdate the demo window so it ends near today
            // (5 trading days per 7 calendar days).
            let today = chrono::Local::now().date_naive();
            let start = today - chrono::Duration::days(cli.demo_days as i64 * 7 / 5 + 7);
            let mut gen = MarketGenerator::new(cli.anomaly_rate, start);
            let records = gen.generate_history(cli.demo_days);
            Ok((records, cli.live.then_some(gen)))
        }
    }
}

fn build_config(cli: &Cli, records: &[MarketRecord]) -> AnalysisConfig {
    let range = if cli.start_date.is_none() && cli.end_date.is_none() {
        None
    } else {
        // One-sided ranges take the dataset's own bound on the open side.
        let start = cli.start_date.or_else(|| records.iter().map(|r| r.date).min());
        let end = cli.end_date.or_else(|| records.iter().map(|r| r.date).max());
        match (start, end) {
            (Some(start), Some(end)) => Some(DateRange { start, end }),
            _ => None,
        }
    };
    AnalysisConfig {
        std_threshold: cli.std_threshold,
        volume_multiplier: cli.volume_multiplier,
        range,
    }
}

fn run_headless(
    cli: &Cli,
    records: &[MarketRecord],
    config: &AnalysisConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== stock-buzz-detect (headless) ===");
    println!(
        "Records: {}, k={:.2}, m={:.1}",
        records.len(),
        config.std_threshold,
        config.volume_multiplier
    );
    if let Some(range) = &config.range {
        println!("Range: {} to {} (inclusive)", range.start, range.end);
    }
    println!();

    let started = Instant::now();
    let analysis = detection::analyze(records, config);
    let elapsed_us = started.elapsed().as_micros() as u64;
    let summary = &analysis.summary;

    println!("=== Results ===");
    println!("  Securities screened: {}", analysis.groups.len());
    println!("  In-range records:    {}", analysis.filtered.len());
    println!("  Price alerts:        {}", summary.price_alerts.len());
    println!("  Volume spikes:       {}", summary.volume_spikes.len());
    println!("  Buzzing securities:  {}", summary.buzzing.len());
    println!("  Validation defects:  {}", analysis.defects.len());
    println!("  Recompute time:      {}", format_latency(elapsed_us));
    println!();

    if !summary.buzzing.is_empty() {
        println!("  Buzzing:");
        for id in &summary.buzzing {
            let symbol = summary.symbols.get(id).map(String::as_str).unwrap_or("-");
            println!("    {symbol:<12} {id}");
        }
        println!();
    }

    if !summary.price_alerts.is_empty() {
        println!("  Price alerts (first {}):", summary.price_alerts.len().min(20));
        for rec in summary.price_alerts.iter().take(20) {
            println!("    {} {:<12} {:.2}", rec.date, rec.symbol, rec.price);
        }
        println!();
    }

    if !summary.volume_spikes.is_empty() {
        println!("  Volume spikes (first {}):", summary.volume_spikes.len().min(20));
        for rec in summary.volume_spikes.iter().take(20) {
            println!("    {} {:<12} {}", rec.date, rec.symbol, rec.volume);
        }
        println!();
    }

    if !analysis.defects.is_empty() {
        println!("  Defects (first {}):", analysis.defects.len().min(10));
        for defect in analysis.defects.iter().take(10) {
            let DefectKind::MissingField { field } = &defect.kind;
            println!("    {} missing {}", defect.location, field);
        }
        println!();
    }

    if let Some(path) = &cli.export {
        export::export_file(path, &analysis.filtered)?;
        println!("Exported {} records to {}", analysis.filtered.len(), path.display());
    }

    Ok(())
}
