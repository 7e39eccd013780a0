//! Delimited-text export of the filtered record set.
//!
//! Field selection only — values are written back out exactly as the
//! core holds them, in the normalized column order.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use log::info;

use crate::types::MarketRecord;

pub const HEADER: &str = "Date,ISIN,Ticker,Price,Volume";

/// Write records as CSV to any sink.
pub fn write_csv<W: Write>(out: &mut W, records: &[MarketRecord]) -> io::Result<()> {
    writeln!(out, "{HEADER}")?;
    for r in records {
        writeln!(
            out,
            "{},{},{},{},{}",
            r.date, r.security_id, r.symbol, r.price, r.volume
        )?;
    }
    Ok(())
}

/// Write records as a CSV file.
pub fn export_file(path: &Path, records: &[MarketRecord]) -> io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    write_csv(&mut out, records)?;
    out.flush()?;
    info!("exported {} records to {}", records.len(), path.display());
    Ok(())
}
