use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ── Input Types (produced by ingestion or the generator) ──

/// One daily observation for a security. Immutable once created;
/// within one security's history `date` should be unique (duplicates
/// are an ingestion concern, see `ingest`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketRecord {
    pub security_id: String,
    pub symbol: String,
    pub date: NaiveDate,
    pub price: f64,
    pub volume: u64,
}

/// Screening thresholds and the active date window. `range: None`
/// means the whole dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisConfig {
    pub std_threshold: f64,
    pub volume_multiplier: f64,
    pub range: Option<DateRange>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            std_threshold: 2.0,
            volume_multiplier: 3.0,
            range: None,
        }
    }
}

/// Inclusive calendar-date window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

// ── Derived Types (rebuilt on every run) ──

/// Per-security statistics over the in-range history. `std_price` is
/// the sample standard deviation and is NaN when the group has fewer
/// than two records.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Baseline {
    pub mean_price: f64,
    pub std_price: f64,
    pub mean_volume: f64,
}

impl Baseline {
    /// Deviation band `(upper, lower)` for the given threshold.
    pub fn band(&self, std_threshold: f64) -> (f64, f64) {
        let width = std_threshold * self.std_price;
        (self.mean_price + width, self.mean_price - width)
    }
}

/// Per-record classification against the group baseline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AlertFlags {
    pub price_alert: bool,
    pub volume_spike: bool,
}

/// One point of the charting series: price with its deviation band.
#[derive(Debug, Clone, Serialize)]
pub struct BandPoint {
    pub date: NaiveDate,
    pub price: f64,
    pub upper: f64,
    pub lower: f64,
    pub volume: u64,
}

/// One security's in-range history with its baseline and per-record
/// flags. `records` and `flags` are parallel, both in date order.
#[derive(Debug, Clone, Serialize)]
pub struct SecurityAnalysis {
    pub security_id: String,
    pub symbol: String,
    pub baseline: Baseline,
    pub records: Vec<MarketRecord>,
    pub flags: Vec<AlertFlags>,
}

impl SecurityAnalysis {
    /// Time-ordered `(date, price, band, volume)` series for charting.
    pub fn band_series(&self, std_threshold: f64) -> Vec<BandPoint> {
        let (upper, lower) = self.baseline.band(std_threshold);
        self.records
            .iter()
            .map(|r| BandPoint {
                date: r.date,
                price: r.price,
                upper,
                lower,
                volume: r.volume,
            })
            .collect()
    }

    pub fn has_price_alert(&self) -> bool {
        self.flags.iter().any(|f| f.price_alert)
    }
}

/// Cross-security aggregation of one screening run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    /// Securities with at least one price alert in range.
    pub buzzing: BTreeSet<String>,
    /// Records flagged by price, in security-id then date order.
    pub price_alerts: Vec<MarketRecord>,
    /// Records flagged by volume, same ordering.
    pub volume_spikes: Vec<MarketRecord>,
    /// security_id -> display symbol, last seen wins.
    pub symbols: HashMap<String, String>,
}

/// Full result of one screening run. `filtered` is the unmodified
/// in-range record set, kept for export; `defects` are the records
/// excluded by validation.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub groups: BTreeMap<String, SecurityAnalysis>,
    pub summary: Summary,
    pub filtered: Vec<MarketRecord>,
    pub defects: Vec<RecordDefect>,
}

// ── Validation ──

/// A record excluded from computation, reported to the caller instead
/// of aborting the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordDefect {
    /// `file.csv:17` from ingestion, `record[3]` from validation.
    pub location: String,
    pub kind: DefectKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DefectKind {
    MissingField { field: &'static str },
}
