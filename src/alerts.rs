//! Per-record alert evaluation and cross-security aggregation.

use std::collections::BTreeMap;

use crate::types::*;

/// Classify one record against its group's baseline.
///
/// A single-record group has NaN dispersion: no baseline can be
/// established there, so `price_alert` is always false. A
/// zero-dispersion baseline is a zero-width band: any deviation from
/// the constant price is flagged, whatever the threshold. The volume
/// test is division-free, so a positive volume against a zero mean is
/// flagged.
pub fn evaluate(record: &MarketRecord, baseline: &Baseline, config: &AnalysisConfig) -> AlertFlags {
    let price_alert = if baseline.std_price.is_nan() {
        false
    } else {
        let (upper, lower) = baseline.band(config.std_threshold);
        record.price > upper || record.price < lower
    };

    let volume_spike = record.volume as f64 > config.volume_multiplier * baseline.mean_volume;

    AlertFlags {
        price_alert,
        volume_spike,
    }
}

/// Merge per-group flags into the run-level `Summary`.
///
/// A security is buzzing exactly when its group holds at least one
/// price alert; volume spikes alone never qualify. Flagged records are
/// concatenated in group (security-id) order, date order within the
/// group, so output is deterministic for a given input. The symbol
/// lookup is built from the filtered set in input order, last seen
/// wins.
pub fn summarize(
    groups: &BTreeMap<String, SecurityAnalysis>,
    filtered: &[MarketRecord],
) -> Summary {
    let mut summary = Summary::default();

    for (id, sec) in groups {
        let mut any_price_alert = false;
        for (rec, flags) in sec.records.iter().zip(&sec.flags) {
            if flags.price_alert {
                any_price_alert = true;
                summary.price_alerts.push(rec.clone());
            }
            if flags.volume_spike {
                summary.volume_spikes.push(rec.clone());
            }
        }
        if any_price_alert {
            summary.buzzing.insert(id.clone());
        }
    }

    for rec in filtered {
        summary
            .symbols
            .insert(rec.security_id.clone(), rec.symbol.clone());
    }

    summary
}
