//! Output persistence: CSV/JSON exports and the run history.
//!
//! Exports are written whole, optionally gzip-compressed; the history CSV is
//! append-only.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use csv::WriterBuilder;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::Result;
use crate::stats::FuelStats;

/// Logs run statistics as pretty-printed JSON.
pub fn print_json(stats: &FuelStats) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(stats)?);
    Ok(())
}

/// `dir/stem.ext`, with `.gz` appended when compressing.
pub fn export_path(dir: &Path, stem: &str, ext: &str, gzip: bool) -> PathBuf {
    let name = if gzip {
        format!("{stem}.{ext}.gz")
    } else {
        format!("{stem}.{ext}")
    };
    dir.join(name)
}

fn write_bytes(path: &Path, contents: Vec<u8>, gzip: bool) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let body = if gzip {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&contents)?;
        encoder.finish()?
    } else {
        contents
    };
    debug!(path = %path.display(), bytes = body.len(), gzip, "Writing export");
    fs::write(path, body)?;
    Ok(())
}

/// Writes `rows` as a CSV export named `stem` under `dir`. Returns the path.
pub fn write_csv<T: Serialize>(dir: &Path, stem: &str, rows: &[T], gzip: bool) -> Result<PathBuf> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    let contents = writer.into_inner().map_err(|e| e.into_error())?;

    let path = export_path(dir, stem, "csv", gzip);
    write_bytes(&path, contents, gzip)?;
    info!(path = %path.display(), rows = rows.len(), "CSV export written");
    Ok(path)
}

/// Writes `value` as a pretty JSON export named `stem` under `dir`.
pub fn write_json<T: Serialize + ?Sized>(dir: &Path, stem: &str, value: &T, gzip: bool) -> Result<PathBuf> {
    let contents = serde_json::to_vec_pretty(value)?;
    let path = export_path(dir, stem, "json", gzip);
    write_bytes(&path, contents, gzip)?;
    info!(path = %path.display(), "JSON export written");
    Ok(path)
}

/// Appends a [`FuelStats`] record as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record(path: &Path, stats: &FuelStats) -> Result<()> {
    let file_exists = path.exists();
    debug!(path = %path.display(), file_exists, "Appending CSV record");

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    writer.serialize(stats)?;
    writer.flush()?;

    Ok(())
}
