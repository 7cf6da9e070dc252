//! Canonical feature table IO.

use std::{
    fs::File,
    io::{Read, Write},
    path::Path,
};

use crime_insight_ingest_models::CanonicalRow;

use crate::{IngestError, ensure_parent_dir};

/// Writes canonical rows as CSV with a header row.
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be created or written.
pub fn write_canonical_csv(path: &Path, rows: &[CanonicalRow]) -> Result<(), IngestError> {
    ensure_parent_dir(path)?;
    write_canonical_to(File::create(path)?, rows)?;
    log::info!("Wrote {} canonical rows to {}", rows.len(), path.display());
    Ok(())
}

/// Writes canonical rows as CSV to any sink.
///
/// # Errors
///
/// Returns [`IngestError`] if serialization or writing fails.
pub fn write_canonical_to(sink: impl Write, rows: &[CanonicalRow]) -> Result<(), IngestError> {
    let mut writer = csv::Writer::from_writer(sink);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Reads a canonical table written by [`write_canonical_csv`].
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be read or a row does not
/// deserialize.
pub fn read_canonical_csv(path: &Path) -> Result<Vec<CanonicalRow>, IngestError> {
    let rows = read_canonical_from(File::open(path)?)?;
    log::info!("Read {} canonical rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Reads canonical rows from any CSV source.
///
/// Unlike raw input, the canonical table is produced by this crate, so any
/// malformed row is an error rather than a skipped record.
///
/// # Errors
///
/// Returns [`IngestError::Csv`] on the first row that does not deserialize.
pub fn read_canonical_from(source: impl Read) -> Result<Vec<CanonicalRow>, IngestError> {
    let mut reader = csv::Reader::from_reader(source);
    reader
        .deserialize()
        .map(|row| row.map_err(IngestError::from))
        .collect()
}
