//! Capture files: CSV and JSON export, CSV import
//!
//! CSV columns are fixed:
//! `time_raw, id_type_hex, id_manufacturer_hex, id_api_class_hex,
//! id_api_index_hex, id_device_id, data_hex, decoded`. Hex fields are two
//! lowercase digits; `data_hex` is space separated; `decoded` is compact
//! JSON or empty.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use hookline_core::{Filter, MailboxItem};
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult, ImportError};
use crate::replay::ReplayRecord;

/// Header of exported CSV files
pub const CSV_HEADER: [&str; 8] = [
    "time_raw",
    "id_type_hex",
    "id_manufacturer_hex",
    "id_api_class_hex",
    "id_api_index_hex",
    "id_device_id",
    "data_hex",
    "decoded",
];

/// JSON export: filters in force and captured packets, oldest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureExport {
    pub filters: Vec<Filter>,
    pub packets: Vec<MailboxItem>,
}

/// File format, chosen by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    /// `.json` selects JSON; anything else is CSV
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ExportFormat::Json,
            _ => ExportFormat::Csv,
        }
    }
}

/// Write packets as CSV, in the order given
pub fn write_csv<'a, W, I>(items: I, writer: W) -> ClientResult<()>
where
    W: Write,
    I: IntoIterator<Item = &'a MailboxItem>,
{
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(CSV_HEADER)?;
    for item in items {
        let frame = &item.raw;
        let decoded = item
            .decoded
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_default();
        out.write_record([
            frame.timestamp.to_string(),
            format!("{:02x}", frame.id.device_type),
            format!("{:02x}", frame.id.manufacturer),
            format!("{:02x}", frame.id.api_class),
            format!("{:02x}", frame.id.api_index),
            frame.id.device_id.to_string(),
            frame.data_hex(),
            decoded,
        ])?;
    }
    out.flush()?;
    Ok(())
}

/// Write an export as pretty JSON
pub fn write_json<W: Write>(export: &CaptureExport, writer: W) -> ClientResult<()> {
    serde_json::to_writer_pretty(writer, export)?;
    Ok(())
}

/// Save an export to `path`, format chosen by extension
pub fn save(export: &CaptureExport, path: &Path) -> ClientResult<()> {
    let mut file = BufWriter::new(File::create(path)?);
    match ExportFormat::from_path(path) {
        ExportFormat::Csv => write_csv(&export.packets, &mut file)?,
        ExportFormat::Json => write_json(export, &mut file)?,
    }
    file.flush().map_err(ClientError::from)
}

/// Read a CSV file with a header row into raw records
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<ReplayRecord>, ImportError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let mut records = Vec::new();
    for row in rdr.records() {
        let row = row?;
        records.push(
            headers
                .iter()
                .zip(row.iter())
                .fold(ReplayRecord::new(), |rec, (name, value)| rec.with(name, value)),
        );
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::decode_replay;
    use hookline_core::{CanFrame, FrameId};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn items() -> Vec<MailboxItem> {
        vec![
            MailboxItem {
                seq: 1,
                raw: CanFrame::new(FrameId::new(6, 6, 1, 2, 33), 1000, vec![0x00, 0xd2, 0x04]),
                decoded: Some(json!({"model": "RangeFinder"})),
            },
            MailboxItem {
                seq: 2,
                raw: CanFrame::new(FrameId::new(2, 5, 0x3f, 15, 0), 1020, vec![]),
                decoded: None,
            },
        ]
    }

    #[test]
    fn test_csv_layout() {
        let mut out = Vec::new();
        write_csv(&items(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], CSV_HEADER.join(","));
        assert_eq!(lines[1], r#"1000,06,06,01,02,33,00 d2 04,"{""model"":""RangeFinder""}""#);
        assert_eq!(lines[2], "1020,02,05,3f,0f,0,,");
    }

    #[test]
    fn test_csv_roundtrip_reproduces_ids_and_bytes() {
        let items = items();
        let mut out = Vec::new();
        write_csv(&items, &mut out).unwrap();

        let frames = decode_replay(&read_csv(out.as_slice()).unwrap()).unwrap();
        assert_eq!(frames.len(), items.len());
        for (frame, item) in frames.iter().zip(&items) {
            assert_eq!(frame.id, item.raw.id);
            assert_eq!(frame.data, item.raw.data);
        }
        assert_eq!(frames[0].time_ms, 0.0);
        assert_eq!(frames[1].time_ms, 20.0);
    }

    #[test]
    fn test_json_export_shape() {
        let export = CaptureExport {
            filters: vec![Filter::DecodedOnly],
            packets: items(),
        };
        let mut out = Vec::new();
        write_json(&export, &mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["filters"], json!(["DecodedOnly"]));
        assert_eq!(value["packets"][0]["seq"], json!(1));
        assert_eq!(value["packets"][0]["raw"]["id"]["device_id"], json!(33));
    }

    #[test]
    fn test_save_picks_format_from_extension() {
        let dir = tempfile::tempdir().unwrap();
        let export = CaptureExport {
            filters: vec![],
            packets: items(),
        };

        let csv_path = dir.path().join("capture.csv");
        save(&export, &csv_path).unwrap();
        let text = std::fs::read_to_string(&csv_path).unwrap();
        assert!(text.starts_with("time_raw,"));

        let json_path = dir.path().join("capture.JSON");
        save(&export, &json_path).unwrap();
        let back: CaptureExport =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(back, export);
    }

    #[test]
    fn test_read_csv_requires_consistent_rows() {
        let text = "time,id_type\n1,2,3\n";
        assert!(matches!(read_csv(text.as_bytes()), Err(ImportError::Csv(_))));
    }
}
