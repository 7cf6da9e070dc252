//! Raw incident CSV reading.
//!
//! Column names are matched case-insensitively after trimming, with spaces
//! and dashes treated as underscores, so both `Location Description` and
//! `location_description` resolve to the same column.

use std::{io::Read, path::Path};

use crime_insight_features::parsing::{parse_code, parse_coordinate, parse_text};
use crime_insight_ingest_models::{AdminCodes, RawRecord};

use crate::IngestError;

/// Columns without which no record can be built.
pub const REQUIRED_COLUMNS: [&str; 4] = ["date", "latitude", "longitude", "beat"];

/// Canonical column name of a raw header.
#[must_use]
pub fn normalize_header(header: &str) -> String {
    header
        .trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

/// Positions of the known columns in one input file.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ColumnMap {
    date: usize,
    latitude: usize,
    longitude: usize,
    beat: usize,
    location_description: Option<usize>,
    district: Option<usize>,
    ward: Option<usize>,
    community_area: Option<usize>,
    primary_type: Option<usize>,
}

impl ColumnMap {
    fn resolve(headers: &csv::StringRecord) -> Result<Self, IngestError> {
        let names: Vec<String> = headers.iter().map(normalize_header).collect();
        let find = |name: &str| names.iter().position(|n| n == name);

        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|&&c| find(c).is_none())
            .map(ToString::to_string)
            .collect();

        match (find("date"), find("latitude"), find("longitude"), find("beat")) {
            (Some(date), Some(latitude), Some(longitude), Some(beat)) => Ok(Self {
                date,
                latitude,
                longitude,
                beat,
                location_description: find("location_description"),
                district: find("district"),
                ward: find("ward"),
                community_area: find("community_area"),
                primary_type: find("primary_type"),
            }),
            _ => Err(IngestError::MissingColumns { missing }),
        }
    }

    fn record(&self, row: &csv::StringRecord) -> RawRecord {
        let field = |i: usize| row.get(i).unwrap_or_default();
        let optional = |i: Option<usize>| i.map(field).unwrap_or_default();

        RawRecord {
            date: parse_text(field(self.date)),
            latitude: parse_coordinate(field(self.latitude)),
            longitude: parse_coordinate(field(self.longitude)),
            location_description: parse_text(optional(self.location_description)),
            codes: AdminCodes {
                beat: parse_code(field(self.beat)),
                district: parse_code(optional(self.district)),
                ward: parse_code(optional(self.ward)),
                community_area: parse_code(optional(self.community_area)),
            },
            primary_type: parse_text(optional(self.primary_type)),
        }
    }
}

/// Reads raw records from a CSV file.
///
/// # Errors
///
/// See [`read_raw_from`]; also fails if the file cannot be opened.
pub fn read_raw_csv(path: &Path) -> Result<Vec<RawRecord>, IngestError> {
    log::info!("Reading raw incidents from {}", path.display());
    let file = std::fs::File::open(path)?;
    read_raw_from(file)
}

/// Reads raw records from any CSV source.
///
/// Field-level problems (bad numbers, blank text) become `None` in the
/// record and are judged later by the builder. Structural problems abort.
///
/// # Errors
///
/// * [`IngestError::EmptyInput`] if there is no header row
/// * [`IngestError::MissingColumns`] if a required column is absent
/// * [`IngestError::Csv`] if the CSV itself cannot be decoded
pub fn read_raw_from(reader: impl Read) -> Result<Vec<RawRecord>, IngestError> {
    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(IngestError::EmptyInput);
    }
    let columns = ColumnMap::resolve(&headers)?;

    let mut records = Vec::new();
    for row in csv_reader.records() {
        records.push(columns.record(&row?));
    }

    log::info!("Read {} raw records", records.len());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn portal_headers_are_normalized() {
        assert_eq!(normalize_header(" Location Description "), "location_description");
        assert_eq!(normalize_header("Community-Area"), "community_area");
        assert_eq!(normalize_header("BEAT"), "beat");
    }

    #[test]
    fn reads_portal_export() {
        let csv = "\
ID,Date,Primary Type,Location Description,Beat,District,Ward,Community Area,Latitude,Longitude
1,06/15/2023 02:00:00 PM,THEFT,STREET,0332,011,29,35.0,41.88,-87.63
2,,BATTERY,,1933,19,,,,
";
        let records = read_raw_from(csv.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.date.as_deref(), Some("06/15/2023 02:00:00 PM"));
        assert_eq!(first.codes.beat, Some(332));
        assert_eq!(first.codes.district, Some(11));
        assert_eq!(first.codes.community_area, Some(35));
        assert_eq!(first.latitude, Some(41.88));
        assert_eq!(first.primary_type.as_deref(), Some("THEFT"));

        let second = &records[1];
        assert_eq!(second.date, None);
        assert_eq!(second.location_description, None);
        assert_eq!(second.latitude, None);
        assert_eq!(second.codes.ward, None);
    }

    #[test]
    fn optional_columns_may_be_absent() {
        let csv = "date,latitude,longitude,beat\n2023-06-15 14:00,41.88,-87.63,332\n";
        let records = read_raw_from(csv.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].location_description, None);
        assert_eq!(records[0].codes.district, None);
        assert_eq!(records[0].primary_type, None);
    }

    #[test]
    fn missing_required_columns_are_fatal() {
        let csv = "date,lat,lng,beat\n2023-06-15 14:00,41.88,-87.63,332\n";
        let err = read_raw_from(csv.as_bytes()).unwrap_err();
        match err {
            IngestError::MissingColumns { missing } => {
                assert_eq!(missing, vec!["latitude".to_string(), "longitude".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_file_is_fatal() {
        assert!(matches!(
            read_raw_from("".as_bytes()),
            Err(IngestError::EmptyInput)
        ));
    }

    #[test]
    fn short_rows_read_as_blank_fields() {
        let csv = "date,latitude,longitude,beat,ward\n2023-06-15 14:00,41.88\n";
        let records = read_raw_from(csv.as_bytes()).unwrap();
        assert_eq!(records[0].longitude, None);
        assert_eq!(records[0].codes.beat, None);
    }
}
