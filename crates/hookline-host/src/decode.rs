//! Structured view of first-party frames
//!
//! Frames from known vendor devices are turned into JSON for the capture
//! log's `decoded` field. Anything else stays undecoded.

use hookline_core::protocol::{api_class, RangeMeasurement, Roi};
use hookline_core::{CanFrame, VendorModel, VENDOR_MANUFACTURER};
use serde_json::{json, Map, Value};

/// Decode a frame, or `None` when it is not from a known vendor device
pub fn decode_frame(frame: &CanFrame) -> Option<Value> {
    if frame.id.manufacturer != VENDOR_MANUFACTURER {
        return None;
    }
    let model = VendorModel::from_can_device_type(frame.id.device_type)?;

    let mut fields = Map::new();
    fields.insert("model".into(), json!(model.device_class()));
    fields.insert("device_id".into(), json!(frame.id.device_id));
    fields.insert("api".into(), json!(api_name(frame.id.api_class)));
    fields.extend(payload(model, frame));
    Some(Value::Object(fields))
}

fn api_name(class: u8) -> String {
    match class {
        api_class::STATUS => "status".into(),
        api_class::CONFIGURE => "configure".into(),
        api_class::BLINK => "blink".into(),
        api_class::SET_ID => "set_id".into(),
        api_class::SET_NAME => "set_name".into(),
        api_class::COMMIT => "commit".into(),
        api_class::ENTER_DFU => "enter_dfu".into(),
        api_class::FIRMWARE_CHUNK => "firmware_chunk".into(),
        api_class::FIRMWARE_DONE => "firmware_done".into(),
        other => format!("0x{:02x}", other),
    }
}

fn payload(model: VendorModel, frame: &CanFrame) -> Map<String, Value> {
    let mut out = Map::new();
    let data = &frame.data;
    match (model, frame.id.api_class) {
        (VendorModel::RangeFinder, api_class::STATUS) => {
            if let Some(m) = RangeMeasurement::from_frame_data(data, Roi::default()) {
                out.insert("status".into(), json!(m.status));
                out.insert("distance_mm".into(), json!(m.distance_mm));
                out.insert("ambient".into(), json!(m.ambient));
                out.insert("mode".into(), json!(m.mode));
                out.insert("budget".into(), json!(m.budget));
            }
        }
        (VendorModel::PowerHub, api_class::STATUS) if data.len() >= 6 => {
            out.insert("channel".into(), json!(frame.id.api_index));
            out.insert("enabled".into(), json!(data[0] != 0));
            out.insert("voltage_mv".into(), json!(u16::from_le_bytes([data[1], data[2]])));
            out.insert("current_ma".into(), json!(u16::from_le_bytes([data[3], data[4]])));
        }
        (_, api_class::SET_ID) if !data.is_empty() => {
            out.insert("new_id".into(), json!(data[0]));
        }
        (_, api_class::SET_NAME) => {
            out.insert("part".into(), json!(frame.id.api_index));
            out.insert("text".into(), json!(String::from_utf8_lossy(data)));
        }
        _ => {
            if !data.is_empty() {
                out.insert("data".into(), json!(hex::encode(data)));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use hookline_core::protocol::{RangingMode, TimingBudget};
    use hookline_core::FrameId;

    #[test]
    fn test_foreign_frames_stay_undecoded() {
        let frame = CanFrame::new(FrameId::new(6, 5, 1, 0, 1), 0, vec![]);
        assert_eq!(decode_frame(&frame), None);
        let frame = CanFrame::new(FrameId::new(3, VENDOR_MANUFACTURER, 1, 0, 1), 0, vec![]);
        assert_eq!(decode_frame(&frame), None);
    }

    #[test]
    fn test_range_finder_status() {
        let measurement = RangeMeasurement {
            status: 0,
            distance_mm: 1234,
            ambient: 7,
            mode: RangingMode::Long,
            budget: TimingBudget::Tb50ms,
            roi: Roi::default(),
        };
        let frame = CanFrame::new(
            FrameId::new(6, VENDOR_MANUFACTURER, api_class::STATUS, 0, 3),
            0,
            measurement.to_frame_data(),
        );
        let decoded = decode_frame(&frame).unwrap();
        assert_eq!(decoded["model"], json!("RangeFinder"));
        assert_eq!(decoded["api"], json!("status"));
        assert_eq!(decoded["distance_mm"], json!(1234));
        assert_eq!(decoded["budget"], json!("TB50ms"));
    }

    #[test]
    fn test_unknown_api_class_keeps_raw_bytes() {
        let frame = CanFrame::new(FrameId::new(8, VENDOR_MANUFACTURER, 0x20, 0, 3), 0, vec![0xde, 0xad]);
        let decoded = decode_frame(&frame).unwrap();
        assert_eq!(decoded["api"], json!("0x20"));
        assert_eq!(decoded["data"], json!("dead"));
    }
}
