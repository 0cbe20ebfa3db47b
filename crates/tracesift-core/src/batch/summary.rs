use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use crate::BatchReport;

pub const SUMMARY_HEADER: [&str; 7] = [
    "filename",
    "total_packets",
    "ip_packets",
    "non_ip4_packets",
    "tcp_packets",
    "udp_packets",
    "unprocessed",
];

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON write failed: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct SummaryRow<'a> {
    filename: &'a str,
    total_packets: u64,
    ip_packets: u64,
    non_ip4_packets: u64,
    tcp_packets: u64,
    udp_packets: u64,
    unprocessed: u64,
}

/// One row per completed job, in source order. Failed jobs are omitted.
pub fn write_summary<W: Write>(writer: W, report: &BatchReport) -> Result<(), SummaryError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    writer.write_record(SUMMARY_HEADER)?;
    for result in report.completed() {
        writer.serialize(SummaryRow {
            filename: &result.file,
            total_packets: result.total_frames,
            ip_packets: result.ip_frames,
            non_ip4_packets: result.non_ip4_frames,
            tcp_packets: result.tcp_frames,
            udp_packets: result.udp_frames,
            unprocessed: result.unprocessed_frames,
        })?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_summary_file(path: &Path, report: &BatchReport) -> Result<(), SummaryError> {
    write_summary(BufWriter::new(File::create(path)?), report)
}

pub fn write_report_json(path: &Path, report: &BatchReport) -> Result<(), SummaryError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, report)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
