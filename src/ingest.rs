//! CSV ingestion and schema normalization.
//!
//! Raw daily files arrive with heterogeneous headers — NSE
//! bhavcopy-style `TradDt/ISIN/TckrSymb/ClsPric/TtlTradgVol` or the
//! simplified `date/stock/price/volume` layout. The loader reconciles
//! any supported header onto the fixed [`MarketRecord`] shape before
//! the screening core ever sees the data; the core stays
//! schema-agnostic. Rows with missing or unparseable required cells
//! become per-row defects, never a failed load.

use std::collections::HashMap;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use log::{info, warn};

use crate::types::{DefectKind, MarketRecord, RecordDefect};

// Column aliases, matched case-insensitively; first hit wins.
const DATE_ALIASES: &[&str] = &["date", "traddt", "trade_date"];
const SECURITY_ALIASES: &[&str] = &["isin", "security_id", "instrument_id", "stock"];
const SYMBOL_ALIASES: &[&str] = &["ticker", "tckrsymb", "symbol"];
const PRICE_ALIASES: &[&str] = &["price", "clspric", "close_price", "close"];
const VOLUME_ALIASES: &[&str] = &["volume", "ttltradgvol", "total_volume"];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d-%m-%Y", "%d-%b-%Y", "%Y/%m/%d"];

/// Column indices of one supported raw schema. `symbol` is optional:
/// the simplified layout uses a single stock column for both identity
/// and display.
struct SchemaMap {
    date: usize,
    security: usize,
    symbol: Option<usize>,
    price: usize,
    volume: usize,
}

/// Outcome of a directory load.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub records: Vec<MarketRecord>,
    pub defects: Vec<RecordDefect>,
    pub files: usize,
    pub duplicates_dropped: usize,
}

fn map_header(header: &str) -> Option<SchemaMap> {
    let cols: Vec<String> = header
        .trim_start_matches('\u{feff}')
        .split(',')
        .map(|c| c.trim().to_ascii_lowercase())
        .collect();
    let find = |aliases: &[&str]| cols.iter().position(|c| aliases.contains(&c.as_str()));

    Some(SchemaMap {
        date: find(DATE_ALIASES)?,
        security: find(SECURITY_ALIASES)?,
        symbol: find(SYMBOL_ALIASES),
        price: find(PRICE_ALIASES)?,
        volume: find(VOLUME_ALIASES)?,
    })
}

fn parse_date(cell: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(cell, fmt).ok())
}

/// Parse one data row. The error is the name of the field that was
/// missing or unreadable.
fn parse_row(schema: &SchemaMap, cells: &[&str]) -> Result<MarketRecord, &'static str> {
    let cell = |idx: usize| cells.get(idx).map(|c| c.trim()).filter(|c| !c.is_empty());

    let security_id = cell(schema.security).ok_or("security_id")?.to_string();
    let date = cell(schema.date)
        .and_then(parse_date)
        .ok_or("date")?;
    let price: f64 = cell(schema.price)
        .and_then(|c| c.parse().ok())
        .filter(|p: &f64| p.is_finite() && *p >= 0.0)
        .ok_or("price")?;
    let volume: u64 = cell(schema.volume)
        .and_then(|c| c.parse().ok())
        .ok_or("volume")?;
    let symbol = schema
        .symbol
        .and_then(|idx| cell(idx))
        .unwrap_or(security_id.as_str())
        .to_string();

    Ok(MarketRecord {
        security_id,
        symbol,
        date,
        price,
        volume,
    })
}

/// Parse one CSV document. `source` labels defect locations
/// (`source:line`). An unrecognized header is an error; bad rows are
/// defects.
pub fn parse_csv(
    source: &str,
    text: &str,
) -> Result<(Vec<MarketRecord>, Vec<RecordDefect>), Box<dyn Error>> {
    let mut lines = text.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());

    let (_, header) = lines
        .next()
        .ok_or_else(|| format!("{source}: empty file"))?;
    let schema = map_header(header)
        .ok_or_else(|| format!("{source}: unrecognized column header"))?;

    let mut records = Vec::new();
    let mut defects = Vec::new();
    for (line_idx, line) in lines {
        let cells: Vec<&str> = line.split(',').collect();
        match parse_row(&schema, &cells) {
            Ok(rec) => records.push(rec),
            Err(field) => defects.push(RecordDefect {
                location: format!("{source}:{}", line_idx + 1),
                kind: DefectKind::MissingField { field },
            }),
        }
    }
    Ok((records, defects))
}

/// Load every `*.csv` under `dir`, in sorted filename order so the
/// result is deterministic, then resolve duplicate
/// `(security_id, date)` pairs last-write-wins. The screening core
/// never resolves duplicates itself.
pub fn load_dir(dir: &Path) -> Result<LoadReport, Box<dyn Error>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")))
        .collect();
    paths.sort();

    let mut report = LoadReport::default();
    for path in &paths {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let text = fs::read_to_string(path)?;
        match parse_csv(&name, &text) {
            Ok((records, defects)) => {
                report.records.extend(records);
                report.defects.extend(defects);
                report.files += 1;
            }
            Err(e) => warn!("skipping {name}: {e}"),
        }
    }

    let (records, dropped) = dedup_last_wins(std::mem::take(&mut report.records));
    report.records = records;
    report.duplicates_dropped = dropped;
    if dropped > 0 {
        warn!("dropped {dropped} duplicate (security, date) rows, keeping last seen");
    }
    info!(
        "loaded {} records from {} files ({} defects)",
        report.records.len(),
        report.files,
        report.defects.len()
    );
    Ok(report)
}

/// Keep the last value seen for each `(security_id, date)`, at the
/// position of the first occurrence.
fn dedup_last_wins(records: Vec<MarketRecord>) -> (Vec<MarketRecord>, usize) {
    let mut kept: Vec<MarketRecord> = Vec::with_capacity(records.len());
    let mut index: HashMap<(String, NaiveDate), usize> = HashMap::new();
    let mut dropped = 0;
    for rec in records {
        let key = (rec.security_id.clone(), rec.date);
        match index.get(&key) {
            Some(&pos) => {
                kept[pos] = rec;
                dropped += 1;
            }
            None => {
                index.insert(key, kept.len());
                kept.push(rec);
            }
        }
    }
    (kept, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const NSE_CSV: &str = "\
TradDt,ISIN,TckrSymb,ClsPric,TtlTradgVol
2024-06-03,INE002A01018,RELIANCE,2911.50,4523120
2024-06-04,INE002A01018,RELIANCE,2875.10,5120040
";

    const SIMPLE_CSV: &str = "\
date,stock,price,volume
2024-06-03,RELIANCE,2911.50,4523120
2024-06-04,RELIANCE,2875.10,5120040
";

    #[test]
    fn nse_schema_normalizes() {
        let (records, defects) = parse_csv("bhav.csv", NSE_CSV).unwrap();
        assert!(defects.is_empty());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].security_id, "INE002A01018");
        assert_eq!(records[0].symbol, "RELIANCE");
        assert_eq!(records[0].price, 2911.50);
        assert_eq!(records[0].volume, 4_523_120);
    }

    #[test]
    fn simple_schema_uses_stock_as_symbol() {
        let (nse, _) = parse_csv("a.csv", NSE_CSV).unwrap();
        let (simple, defects) = parse_csv("b.csv", SIMPLE_CSV).unwrap();
        assert!(defects.is_empty());
        assert_eq!(simple[0].security_id, "RELIANCE");
        assert_eq!(simple[0].symbol, "RELIANCE");
        // Same dates/prices/volumes either way.
        assert_eq!(simple[0].date, nse[0].date);
        assert_eq!(simple[0].price, nse[0].price);
        assert_eq!(simple[0].volume, nse[0].volume);
    }

    #[test]
    fn missing_cell_is_one_defect_not_an_abort() {
        let text = "\
date,stock,price,volume
2024-06-03,RELIANCE,,4523120
2024-06-04,RELIANCE,2875.10,5120040
";
        let (records, defects) = parse_csv("gap.csv", text).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(defects.len(), 1);
        assert_eq!(defects[0].kind, DefectKind::MissingField { field: "price" });
        assert_eq!(defects[0].location, "gap.csv:2");
    }

    #[test]
    fn unrecognized_header_is_an_error() {
        assert!(parse_csv("odd.csv", "foo,bar,baz\n1,2,3\n").is_err());
    }

    #[test]
    fn date_formats_are_reconciled() {
        for (cell, expect) in [
            ("2024-06-03", (2024, 6, 3)),
            ("03-06-2024", (2024, 6, 3)),
            ("03-Jun-2024", (2024, 6, 3)),
            ("2024/06/03", (2024, 6, 3)),
        ] {
            let text = format!("date,stock,price,volume\n{cell},X,1.0,1\n");
            let (records, defects) = parse_csv("fmt.csv", &text).unwrap();
            assert!(defects.is_empty(), "{cell} should parse");
            let d = records[0].date;
            use chrono::Datelike;
            assert_eq!((d.year(), d.month(), d.day()), expect);
        }
    }

    #[test]
    fn header_matching_ignores_case_and_padding() {
        let text = " Date , Stock , Price , Volume \n2024-06-03, X ,1.0,1\n";
        let (records, defects) = parse_csv("pad.csv", text).unwrap();
        assert!(defects.is_empty());
        assert_eq!(records[0].security_id, "X");
    }

    #[test]
    fn load_dir_dedups_last_write_wins_across_files() {
        let dir = tempfile::tempdir().unwrap();
        // Sorted filename order decides which value survives.
        let mut a = std::fs::File::create(dir.path().join("a_old.csv")).unwrap();
        write!(
            a,
            "date,stock,price,volume\n2024-06-03,RELIANCE,100.0,1000\n"
        )
        .unwrap();
        let mut b = std::fs::File::create(dir.path().join("b_new.csv")).unwrap();
        write!(
            b,
            "date,stock,price,volume\n2024-06-03,RELIANCE,111.0,2000\n2024-06-04,RELIANCE,112.0,900\n"
        )
        .unwrap();

        let report = load_dir(dir.path()).unwrap();
        assert_eq!(report.files, 2);
        assert_eq!(report.duplicates_dropped, 1);
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.records[0].price, 111.0, "later file wins the duplicate");
        assert_eq!(report.records[0].volume, 2000);
    }
}
