//! Recompute-throughput sweep across growing dataset sizes.
//!
//! Every threshold change in the dashboards is a full recompute, so
//! the number that matters is how fast `analyze` turns a dataset into
//! a fresh `Analysis` at each scale.

use std::time::{Duration, Instant};

use chrono::NaiveDate;

use crate::detection;
use crate::generator;
use crate::latency::{format_latency, RecomputeTracker};
use crate::types::AnalysisConfig;

struct StressLevel {
    securities: usize,
    days: usize,
}

const LEVELS: &[StressLevel] = &[
    StressLevel { securities: 25, days: 60 },
    StressLevel { securities: 100, days: 60 },
    StressLevel { securities: 250, days: 120 },
    StressLevel { securities: 500, days: 250 },
    StressLevel { securities: 1000, days: 250 },
    StressLevel { securities: 2000, days: 500 },
];

struct LevelResult {
    level: usize,
    securities: usize,
    days: usize,
    records: usize,
    recomputes: u64,
    recomputes_per_sec: f64,
    p50_us: u64,
    p99_us: u64,
    price_alerts: usize,
    volume_spikes: usize,
    duration_secs: f64,
}

pub fn run(level_duration: u64) {
    let total_time = LEVELS.len() as u64 * level_duration;
    println!("=== STRESS SWEEP ===");
    println!(
        "Levels: {}, Duration per level: {}s, Total estimated: {}s",
        LEVELS.len(),
        level_duration,
        total_time
    );
    println!();

    let config = AnalysisConfig::default();
    let start_date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let level_dur = Duration::from_secs(level_duration);
    let mut results = Vec::new();
    let mut tracker = RecomputeTracker::new();

    for (idx, level) in LEVELS.iter().enumerate() {
        let dataset = generator::generate_universe(level.securities, level.days, start_date);
        print!(
            "Level {}/{}: {} securities x {} days ({} records) ... ",
            idx + 1,
            LEVELS.len(),
            level.securities,
            level.days,
            dataset.len()
        );

        tracker.reset();
        let mut recomputes = 0u64;
        let mut last_alerts = (0usize, 0usize);

        let level_start = Instant::now();
        while level_start.elapsed() < level_dur {
            let run_start = Instant::now();
            let analysis = detection::analyze(&dataset, &config);
            tracker.record(run_start);
            recomputes += 1;
            last_alerts = (
                analysis.summary.price_alerts.len(),
                analysis.summary.volume_spikes.len(),
            );
        }

        let elapsed = level_start.elapsed().as_secs_f64();
        let stats = tracker.stats();
        println!(
            "{:.1} recomputes/sec (p99={})",
            recomputes as f64 / elapsed,
            format_latency(stats.p99_us)
        );

        results.push(LevelResult {
            level: idx + 1,
            securities: level.securities,
            days: level.days,
            records: dataset.len(),
            recomputes,
            recomputes_per_sec: recomputes as f64 / elapsed,
            p50_us: stats.p50_us,
            p99_us: stats.p99_us,
            price_alerts: last_alerts.0,
            volume_spikes: last_alerts.1,
            duration_secs: elapsed,
        });
    }

    println!();
    print_results_table(&results);
    print_peak(&results);
}

fn print_results_table(results: &[LevelResult]) {
    println!("{}", "=".repeat(96));
    println!("{:^96}", "STRESS SWEEP RESULTS");
    println!("{}", "=".repeat(96));
    println!(
        " {:<5} {:>10} {:>6} {:>9} {:>12} {:>10} {:>10} {:>8} {:>8}",
        "Level", "Securities", "Days", "Records", "Recompute/s", "p50", "p99", "PriceAl", "VolSpk"
    );
    println!("{}", "-".repeat(96));
    for r in results {
        println!(
            " {:<5} {:>10} {:>6} {:>9} {:>12.1} {:>10} {:>10} {:>8} {:>8}",
            r.level,
            r.securities,
            r.days,
            r.records,
            r.recomputes_per_sec,
            format_latency(r.p50_us),
            format_latency(r.p99_us),
            r.price_alerts,
            r.volume_spikes,
        );
    }
    println!("{}", "=".repeat(96));

    let total_recomputes: u64 = results.iter().map(|r| r.recomputes).sum();
    let total_time: f64 = results.iter().map(|r| r.duration_secs).sum();
    println!("Totals: {total_recomputes} recomputes in {total_time:.1}s");
}

fn print_peak(results: &[LevelResult]) {
    // Records/sec is the scale-independent throughput measure.
    let peak = results
        .iter()
        .max_by(|a, b| {
            let ra = a.recomputes_per_sec * a.records as f64;
            let rb = b.recomputes_per_sec * b.records as f64;
            ra.total_cmp(&rb)
        });
    if let Some(p) = peak {
        println!(
            "Peak throughput: ~{:.0} records/sec screened (Level {}, {} records/run)",
            p.recomputes_per_sec * p.records as f64,
            p.level,
            p.records
        );
    }
}
