//! Trace CSV export and JSON persistence of simulation output.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::Result;
use crate::runner::SimulationOutput;
use crate::sim::types::{SimulationTrace, TraceRecord};

/// Column header for trace CSV export.
const HEADER: &str = "timestamp,pass,load_kw,pv_power_kw,net_load_kw,discharge_kw,\
                      soe_pct,soh_pct,grid_import_kw,grid_export_kw,pv_to_load_kw,\
                      pv_to_battery_kw,pv_curtailment_kw,md30_baseline_kw,\
                      md30_pv_only_kw,md30_final_kw";

/// Exports a trace to a CSV file at the given path.
///
/// Writes the primary records followed by the extension records, tagged in
/// the `pass` column. Produces deterministic output for identical inputs.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_csv(trace: &SimulationTrace, path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    write_csv(trace, BufWriter::new(file))
}

/// Writes a trace as CSV to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_csv(trace: &SimulationTrace, writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    wtr.write_record(HEADER.split(',').map(str::trim))?;

    let passes = trace
        .records
        .iter()
        .map(|r| ("primary", r))
        .chain(trace.extension_records.iter().map(|r| ("extension", r)));
    for (pass, r) in passes {
        wtr.write_record(row(pass, r))?;
    }

    wtr.flush()?;
    Ok(())
}

fn row(pass: &str, r: &TraceRecord) -> [String; 16] {
    [
        r.timestamp.format("%Y-%m-%dT%H:%M:%S").to_string(),
        pass.to_string(),
        format!("{:.4}", r.load_kw),
        format!("{:.4}", r.pv_power_kw),
        format!("{:.4}", r.net_load_kw),
        format!("{:.4}", r.discharge_kw),
        format!("{:.4}", r.soe_pct),
        format!("{:.6}", r.soh_pct),
        format!("{:.4}", r.grid_import_kw),
        format!("{:.4}", r.grid_export_kw),
        format!("{:.4}", r.pv_to_load_kw),
        format!("{:.4}", r.pv_to_battery_kw),
        format!("{:.4}", r.pv_curtailment_kw),
        format!("{:.4}", r.md30_baseline_kw),
        format!("{:.4}", r.md30_pv_only_kw),
        format!("{:.4}", r.md30_final_kw),
    ]
}

/// Persists the full output as pretty-printed JSON.
pub fn write_json(output: &SimulationOutput, path: &Path) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, output)?;
    writer.flush()?;
    Ok(())
}

/// Rehydrates output written by [`write_json`].
pub fn read_json(path: &Path) -> Result<SimulationOutput> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}
