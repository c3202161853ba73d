//! Reader for carrier CSV exports.
//!
//! The export carries one row per shipment with the whole status history
//! packed into the `Status Updates` column (see [`crate::import::parser`]).

use crate::errors::ServiceError;
use serde::Deserialize;
use std::path::Path;

/// One row of the carrier CSV export, header-mapped.
#[derive(Debug, Clone, Deserialize)]
pub struct CsvShipmentRow {
    #[serde(rename = "Order ID")]
    pub order_id: String,

    #[serde(rename = "Tracking Details")]
    pub tracking_id: String,

    /// Pipe-delimited raw status history; may be absent.
    #[serde(rename = "Status Updates", default)]
    pub status_updates: Option<String>,

    #[serde(rename = "Delivery Location", default)]
    pub address: String,

    /// Estimated delivery, sometimes as a `"start - end"` range.
    #[serde(rename = "ETA", default)]
    pub eta: Option<String>,
}

impl CsvShipmentRow {
    /// The estimate is the start bound when the ETA carries a range.
    pub fn estimated_delivery_text(&self) -> Option<&str> {
        self.eta
            .as_deref()
            .map(|eta| eta.split(" - ").next().unwrap_or(eta).trim())
            .filter(|text| !text.is_empty())
    }
}

/// Outcome of deserializing one CSV record. Malformed records are carried
/// alongside valid ones so the orchestrator can report them per row instead
/// of aborting the file.
#[derive(Debug)]
pub enum CsvRecord {
    Valid(CsvShipmentRow),
    Invalid { line: u64, message: String },
}

/// Reads all records from a CSV file. Only failure to open or read the file
/// itself is an error; malformed rows come back as [`CsvRecord::Invalid`].
pub fn read_shipment_rows(path: &Path) -> Result<Vec<CsvRecord>, ServiceError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| {
            ServiceError::InvalidInput(format!("cannot read csv {}: {e}", path.display()))
        })?;

    let mut records = Vec::new();
    for result in reader.deserialize::<CsvShipmentRow>() {
        match result {
            Ok(row) => records.push(CsvRecord::Valid(row)),
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or_default();
                records.push(CsvRecord::Invalid {
                    line,
                    message: e.to_string(),
                });
            }
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn maps_headers_and_splits_eta_range() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Order ID,Tracking Details,Status Updates,Delivery Location,ETA").unwrap();
        writeln!(
            file,
            "O1,TRK-001-99,picked_up Warehouse-A 1/2/2024,12 Elm Street,5/2/2024 - 7/2/2024"
        )
        .unwrap();
        writeln!(file, "O2,TRK-002-11,,9 Oak Avenue,").unwrap();

        let records = read_shipment_rows(file.path()).unwrap();
        assert_eq!(records.len(), 2);

        let CsvRecord::Valid(first) = &records[0] else {
            panic!("expected valid row");
        };
        assert_eq!(first.order_id, "O1");
        assert_eq!(first.tracking_id, "TRK-001-99");
        assert_eq!(first.estimated_delivery_text(), Some("5/2/2024"));

        let CsvRecord::Valid(second) = &records[1] else {
            panic!("expected valid row");
        };
        assert!(second.status_updates.as_deref().unwrap_or("").is_empty());
        assert!(second.estimated_delivery_text().is_none());
    }

    #[test]
    fn missing_file_is_an_input_error() {
        let err = read_shipment_rows(Path::new("/nonexistent/export.csv")).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }
}
