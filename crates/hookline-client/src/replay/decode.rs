//! Row decoding, sorting and rebasing

use hookline_core::FrameId;
use serde::{Deserialize, Serialize};

use crate::error::ImportError;

/// One frame of a replay timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayFrame {
    /// Milliseconds after the first frame
    pub time_ms: f64,
    pub id: FrameId,
    pub data: Vec<u8>,
}

/// One imported row: column name and raw text, in column order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplayRecord {
    fields: Vec<(String, String)>,
}

impl ReplayRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`ReplayRecord::insert`]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.fields.push((column.into(), value.into()));
    }

    /// Raw text of a column, if the column exists
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.trim())
    }

    /// Raw text of a column if it exists and is not blank
    fn get_filled(&self, column: &str) -> Option<&str> {
        self.get(column).filter(|v| !v.is_empty())
    }

    /// The row as a JSON object, for error messages
    fn describe(&self) -> String {
        let map: serde_json::Map<String, serde_json::Value> = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();
        serde_json::Value::Object(map).to_string()
    }

    fn invalid(&self, field: &'static str, value: &str) -> ImportError {
        ImportError::InvalidField {
            field,
            value: value.to_string(),
            row: self.describe(),
        }
    }
}

/// Identifier columns: decimal name, hex name, largest value
const ID_FIELDS: [(&str, &str, u8); 4] = [
    ("id_type", "id_type_hex", 0x1F),
    ("id_manufacturer", "id_manufacturer_hex", 0xFF),
    ("id_api_class", "id_api_class_hex", 0x3F),
    ("id_api_index", "id_api_index_hex", 0x0F),
];

fn id_field(record: &ReplayRecord, (decimal, hex, max): (&'static str, &'static str, u8)) -> Result<u8, ImportError> {
    let (field, raw, parsed) = if let Some(raw) = record.get_filled(hex) {
        let digits = raw.trim_start_matches("0x").trim_start_matches("0X");
        (hex, raw, u8::from_str_radix(digits, 16).ok())
    } else {
        let raw = record.get(decimal).unwrap_or("");
        (decimal, raw, raw.parse::<u8>().ok())
    };
    parsed
        .filter(|v| *v <= max)
        .ok_or_else(|| record.invalid(field, raw))
}

fn time_field(record: &ReplayRecord) -> Result<f64, ImportError> {
    let (field, raw) = match record.get_filled("time_raw") {
        Some(raw) => ("time_raw", raw),
        None => ("time", record.get("time").unwrap_or("")),
    };
    raw.parse::<f64>()
        .ok()
        .filter(|t| t.is_finite())
        .ok_or_else(|| record.invalid(field, raw))
}

fn data_field(record: &ReplayRecord) -> Result<Vec<u8>, ImportError> {
    let (field, raw) = match (record.get_filled("data_hex"), record.get_filled("data")) {
        (Some(raw), _) => ("data_hex", raw),
        (None, Some(raw)) => ("data", raw),
        // A blank cell is an empty payload
        (None, None) if record.get("data_hex").is_some() || record.get("data").is_some() => {
            return Ok(Vec::new())
        }
        (None, None) => return Err(record.invalid("data", "")),
    };
    let digits: String = raw.split_whitespace().collect();
    hex::decode(&digits).map_err(|_| record.invalid(field, raw))
}

fn decode_row(record: &ReplayRecord) -> Result<ReplayFrame, ImportError> {
    let time_ms = time_field(record)?;
    let device_type = id_field(record, ID_FIELDS[0])?;
    let manufacturer = id_field(record, ID_FIELDS[1])?;
    let api_class = id_field(record, ID_FIELDS[2])?;
    let api_index = id_field(record, ID_FIELDS[3])?;

    let raw_device_id = record.get("id_device_id").unwrap_or("");
    let device_id = raw_device_id
        .parse::<u8>()
        .ok()
        .filter(|v| *v <= 0x3F)
        .ok_or_else(|| record.invalid("id_device_id", raw_device_id))?;

    Ok(ReplayFrame {
        time_ms,
        id: FrameId::new(device_type, manufacturer, api_class, api_index, device_id),
        data: data_field(record)?,
    })
}

/// Decode every row, then sort and rebase
///
/// The first bad row aborts the whole import.
pub fn decode_replay(records: &[ReplayRecord]) -> Result<Vec<ReplayFrame>, ImportError> {
    let frames = records
        .iter()
        .map(decode_row)
        .collect::<Result<Vec<_>, _>>()?;
    if frames.is_empty() {
        return Err(ImportError::Empty);
    }
    Ok(rebase(frames))
}

/// Stable sort by time, then shift so the earliest frame is at zero
pub fn rebase(mut frames: Vec<ReplayFrame>) -> Vec<ReplayFrame> {
    frames.sort_by(|a, b| a.time_ms.total_cmp(&b.time_ms));
    if let Some(origin) = frames.first().map(|f| f.time_ms) {
        for frame in &mut frames {
            frame.time_ms -= origin;
        }
    }
    frames
}
