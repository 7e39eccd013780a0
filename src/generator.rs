use std::collections::HashMap;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rand::Rng;

use crate::types::MarketRecord;

pub const SYMBOLS: &[(&str, &str, f64, u64)] = &[
    ("INE002A01018", "RELIANCE", 2900.0, 5_000_000),
    ("INE467B01029", "TCS", 4100.0, 1_800_000),
    ("INE009A01021", "INFY", 1650.0, 4_200_000),
    ("INE040A01034", "HDFCBANK", 1450.0, 9_500_000),
    ("INE062A01020", "SBIN", 780.0, 12_000_000),
];

#[derive(Debug, Clone, Copy)]
enum AnomalyScenario {
    PriceShock,
    VolumeSurge,
}

const ALL_SCENARIOS: &[AnomalyScenario] =
    &[AnomalyScenario::PriceShock, AnomalyScenario::VolumeSurge];

/// Synthetic daily market data for the demo modes, the stress sweep
/// and the benchmarks: a random walk per symbol with anomaly
/// scenarios injected at a configured rate.
pub struct MarketGenerator {
    prices: HashMap<String, f64>,
    pub anomaly_rate: f64,
    next_date: NaiveDate,
}

impl MarketGenerator {
    pub fn new(anomaly_rate: f64, start_date: NaiveDate) -> Self {
        let mut prices = HashMap::new();
        for (isin, _, base_price, _) in SYMBOLS {
            prices.insert(isin.to_string(), *base_price);
        }
        Self {
            prices,
            anomaly_rate,
            next_date: next_trading_day(start_date),
        }
    }

    /// Generate one trading day for every symbol and advance the date
    /// (weekends are skipped).
    pub fn generate_day(&mut self) -> Vec<MarketRecord> {
        let mut rng = rand::thread_rng();
        let date = self.next_date;
        self.next_date = next_trading_day(date + Duration::days(1));

        // Pick at most one anomalous symbol per day.
        let anomaly = if rng.gen_bool(self.anomaly_rate.min(1.0)) {
            let idx = rng.gen_range(0..SYMBOLS.len());
            let scenario = ALL_SCENARIOS[rng.gen_range(0..ALL_SCENARIOS.len())];
            Some((SYMBOLS[idx].0, scenario))
        } else {
            None
        };

        let mut records = Vec::with_capacity(SYMBOLS.len());
        for (isin, ticker, _, base_volume) in SYMBOLS {
            let price = self.prices.get_mut(*isin).unwrap();
            let mut volume =
                (*base_volume as f64 * rng.gen_range(0.7..1.3)) as u64;

            match anomaly {
                Some((target, AnomalyScenario::PriceShock)) if target == *isin => {
                    let jump = *price * rng.gen_range(0.08..0.15);
                    if rng.gen_bool(0.5) {
                        *price += jump;
                    } else {
                        *price -= jump;
                    }
                }
                Some((target, AnomalyScenario::VolumeSurge)) if target == *isin => {
                    volume *= rng.gen_range(5..10);
                    *price += *price * rng.gen_range(-0.015..0.015);
                }
                _ => {
                    *price += *price * rng.gen_range(-0.015..0.015);
                }
            }

            records.push(MarketRecord {
                security_id: isin.to_string(),
                symbol: ticker.to_string(),
                date,
                price: *price,
                volume,
            });
        }
        records
    }

    /// Seed an initial history of `days` trading days for all symbols.
    pub fn generate_history(&mut self, days: usize) -> Vec<MarketRecord> {
        let mut records = Vec::with_capacity(days * SYMBOLS.len());
        for _ in 0..days {
            records.extend(self.generate_day());
        }
        records
    }
}

/// Bulk synthetic universe for the stress sweep and benchmarks:
/// `securities` random-walk instruments over `days` trading days.
pub fn generate_universe(securities: usize, days: usize, start: NaiveDate) -> Vec<MarketRecord> {
    let mut rng = rand::thread_rng();
    let mut records = Vec::with_capacity(securities * days);
    for s in 0..securities {
        let id = format!("SYN{s:06}");
        let ticker = format!("SYM{s}");
        let mut price = rng.gen_range(50.0..5000.0);
        let base_volume = rng.gen_range(100_000..10_000_000u64);
        let mut date = next_trading_day(start);
        for _ in 0..days {
            price += price * rng.gen_range(-0.015..0.015);
            records.push(MarketRecord {
                security_id: id.clone(),
                symbol: ticker.clone(),
                date,
                price,
                volume: (base_volume as f64 * rng.gen_range(0.7..1.3)) as u64,
            });
            date = next_trading_day(date + Duration::days(1));
        }
    }
    records
}

fn next_trading_day(mut date: NaiveDate) -> NaiveDate {
    while matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
        date = date + Duration::days(1);
    }
    date
}
