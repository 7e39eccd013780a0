use chrono::NaiveDate;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use stock_buzz_detect::detection;
use stock_buzz_detect::generator;
use stock_buzz_detect::types::{AnalysisConfig, DateRange};

fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn full_pipeline(c: &mut Criterion) {
    let config = AnalysisConfig::default();

    let mut group = c.benchmark_group("analyze");
    for (securities, days) in [(10, 60), (100, 60), (250, 250), (1000, 250)] {
        let dataset = generator::generate_universe(securities, days, start_date());
        group.throughput(Throughput::Elements(dataset.len() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{securities}x{days}")),
            &dataset,
            |b, dataset| {
                b.iter(|| detection::analyze(dataset, &config));
            },
        );
    }
    group.finish();
}

fn baseline_stage(c: &mut Criterion) {
    // One security with a long history isolates the statistics pass.
    let dataset = generator::generate_universe(1, 2500, start_date());

    let mut group = c.benchmark_group("baseline");
    group.throughput(Throughput::Elements(dataset.len() as u64));
    group.bench_function("2500_records", |b| {
        b.iter(|| detection::baseline(&dataset));
    });
    group.finish();
}

fn filter_stage(c: &mut Criterion) {
    let dataset = generator::generate_universe(500, 250, start_date());
    // A mid-window range that keeps roughly half the records.
    let range = DateRange {
        start: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
        end: NaiveDate::from_ymd_opt(2024, 9, 30).unwrap(),
    };

    let mut group = c.benchmark_group("filter_range");
    group.throughput(Throughput::Elements(dataset.len() as u64));
    group.bench_function("500x250", |b| {
        b.iter(|| detection::filter_range(&dataset, Some(&range)));
    });
    group.finish();
}

criterion_group!(benches, full_pipeline, baseline_stage, filter_stage);
criterion_main!(benches);
