//! The screening pipeline: validation, range filtering, grouping and
//! per-security baselines.
//!
//! The whole pipeline is a deterministic pure transform
//! `(records, config) -> Analysis`, rerun in full whenever the dataset
//! or a threshold changes. There is no incremental path and no state
//! between invocations.

use std::collections::BTreeMap;

use crate::alerts;
use crate::types::*;

/// Screen records missing a required field value out of the run.
/// Rejected records become per-record defects; the run continues.
pub fn validate(records: &[MarketRecord]) -> (Vec<MarketRecord>, Vec<RecordDefect>) {
    let mut valid = Vec::with_capacity(records.len());
    let mut defects = Vec::new();
    for (idx, rec) in records.iter().enumerate() {
        let missing = if rec.security_id.is_empty() {
            Some("security_id")
        } else if !rec.price.is_finite() || rec.price < 0.0 {
            Some("price")
        } else {
            None
        };
        match missing {
            Some(field) => defects.push(RecordDefect {
                location: format!("record[{idx}]"),
                kind: DefectKind::MissingField { field },
            }),
            None => valid.push(rec.clone()),
        }
    }
    (valid, defects)
}

/// Inclusive date-window filter. An empty result is valid, not an
/// error, and flows through to an empty `Summary`.
pub fn filter_range(records: &[MarketRecord], range: Option<&DateRange>) -> Vec<MarketRecord> {
    match range {
        Some(r) => records
            .iter()
            .filter(|rec| r.contains(rec.date))
            .cloned()
            .collect(),
        None => records.to_vec(),
    }
}

/// Group in-range records by security id. Map order is id order; each
/// group is date-sorted (stable, so duplicate dates keep input order).
/// Securities with no in-range records simply have no group.
fn group_by_security(filtered: &[MarketRecord]) -> BTreeMap<String, Vec<MarketRecord>> {
    let mut groups: BTreeMap<String, Vec<MarketRecord>> = BTreeMap::new();
    for rec in filtered {
        groups
            .entry(rec.security_id.clone())
            .or_default()
            .push(rec.clone());
    }
    for group in groups.values_mut() {
        group.sort_by_key(|r| r.date);
    }
    groups
}

/// Mean/dispersion of price and mean of volume over one non-empty
/// group. Dispersion is the sample standard deviation (n − 1 divisor),
/// NaN below two records. Order of records does not affect the result;
/// the date sort exists for downstream charting only.
pub fn baseline(group: &[MarketRecord]) -> Baseline {
    let n = group.len() as f64;
    let mean_price = group.iter().map(|r| r.price).sum::<f64>() / n;
    let mean_volume = group.iter().map(|r| r.volume as f64).sum::<f64>() / n;
    let std_price = if group.len() < 2 {
        f64::NAN
    } else {
        let sq_sum: f64 = group
            .iter()
            .map(|r| (r.price - mean_price).powi(2))
            .sum();
        (sq_sum / (n - 1.0)).sqrt()
    };
    Baseline {
        mean_price,
        std_price,
        mean_volume,
    }
}

/// Run the full screening pipeline over a dataset.
pub fn analyze(records: &[MarketRecord], config: &AnalysisConfig) -> Analysis {
    let (valid, defects) = validate(records);
    let filtered = filter_range(&valid, config.range.as_ref());

    let mut groups = BTreeMap::new();
    for (id, group) in group_by_security(&filtered) {
        let baseline = baseline(&group);
        let flags: Vec<AlertFlags> = group
            .iter()
            .map(|r| alerts::evaluate(r, &baseline, config))
            .collect();
        // Group is never empty by construction.
        let symbol = group[group.len() - 1].symbol.clone();
        groups.insert(
            id.clone(),
            SecurityAnalysis {
                security_id: id,
                symbol,
                baseline,
                records: group,
                flags,
            },
        );
    }

    let summary = alerts::summarize(&groups, &filtered);
    Analysis {
        groups,
        summary,
        filtered,
        defects,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn rec(id: &str, day: u32, price: f64, volume: u64) -> MarketRecord {
        MarketRecord {
            security_id: id.to_string(),
            symbol: id.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 6, day).unwrap(),
            price,
            volume,
        }
    }

    #[test]
    fn baseline_matches_hand_computation() {
        let group: Vec<_> = [100.0, 102.0, 98.0, 101.0, 150.0]
            .iter()
            .enumerate()
            .map(|(i, p)| rec("A", i as u32 + 1, *p, 1000))
            .collect();
        let b = baseline(&group);
        assert!((b.mean_price - 110.2).abs() < 1e-9);
        assert!((b.std_price - 22.29798197).abs() < 1e-6);
        assert!((b.mean_volume - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn baseline_single_record_has_nan_dispersion() {
        let b = baseline(&[rec("A", 1, 42.0, 100)]);
        assert!(b.std_price.is_nan());
        assert_eq!(b.mean_price, 42.0);
        assert_eq!(b.mean_volume, 100.0);
    }

    #[test]
    fn baseline_is_order_independent() {
        let fwd: Vec<_> = (1..=5).map(|d| rec("A", d, 100.0 + d as f64, 10 * d as u64)).collect();
        let mut rev = fwd.clone();
        rev.reverse();
        let (a, b) = (baseline(&fwd), baseline(&rev));
        assert_eq!(a.mean_price, b.mean_price);
        assert_eq!(a.std_price, b.std_price);
        assert_eq!(a.mean_volume, b.mean_volume);
    }

    #[test]
    fn filter_range_is_inclusive_on_both_ends() {
        let records: Vec<_> = (1..=5).map(|d| rec("A", d, 100.0, 1000)).collect();
        let range = DateRange {
            start: NaiveDate::from_ymd_opt(2024, 6, 2).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 6, 4).unwrap(),
        };
        let kept = filter_range(&records, Some(&range));
        assert_eq!(kept.len(), 3);
        assert_eq!(kept[0].date, range.start);
        assert_eq!(kept[2].date, range.end);
    }

    #[test]
    fn validate_reports_missing_fields() {
        let mut bad_id = rec("", 1, 100.0, 1000);
        bad_id.symbol = "X".to_string();
        let bad_price = MarketRecord {
            price: f64::NAN,
            ..rec("B", 2, 0.0, 1000)
        };
        let good = rec("C", 3, 100.0, 1000);
        let (valid, defects) = validate(&[bad_id, bad_price, good]);
        assert_eq!(valid.len(), 1);
        assert_eq!(valid[0].security_id, "C");
        assert_eq!(defects.len(), 2);
        assert_eq!(defects[0].kind, DefectKind::MissingField { field: "security_id" });
        assert_eq!(defects[1].kind, DefectKind::MissingField { field: "price" });
        assert_eq!(defects[1].location, "record[1]");
    }

    #[test]
    fn baseline_stats_are_bounded() {
        let records = crate::generator::generate_universe(
            3,
            40,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        );
        let analysis = analyze(&records, &AnalysisConfig::default());
        assert_eq!(analysis.groups.len(), 3);
        for group in analysis.groups.values() {
            let min = group.records.iter().map(|r| r.price).fold(f64::INFINITY, f64::min);
            let max = group.records.iter().map(|r| r.price).fold(f64::NEG_INFINITY, f64::max);
            assert!(group.baseline.mean_price >= min && group.baseline.mean_price <= max);
            assert!(group.baseline.std_price >= 0.0);
        }
    }

    #[test]
    fn groups_are_date_sorted_regardless_of_input_order() {
        let records = vec![rec("A", 3, 3.0, 1), rec("A", 1, 1.0, 1), rec("A", 2, 2.0, 1)];
        let analysis = analyze(&records, &AnalysisConfig::default());
        let days: Vec<u32> = analysis.groups["A"]
            .records
            .iter()
            .map(|r| chrono::Datelike::day(&r.date))
            .collect();
        assert_eq!(days, vec![1, 2, 3]);
    }
}
