//! Capture log entries and filters

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::frame::{CanFrame, FrameId};

/// One captured frame
///
/// `seq` is assigned by the capture source and strictly increases within a
/// session. It is the only cursor used for incremental reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailboxItem {
    pub seq: u64,
    pub raw: CanFrame,
    /// Structured payload when the source recognised the frame
    #[serde(default)]
    pub decoded: Option<Value>,
}

/// Live-capture filter, evaluated by the capture source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Filter {
    /// Keep only frames the source could decode
    DecodedOnly,
    /// Keep frames whose identifier matches `id` on the bits set in `mask`
    IdMask { id: FrameId, mask: FrameId },
    /// Same as [`Filter::IdMask`] on the packed 29-bit identifier
    IdMaskRaw { id: u32, mask: u32 },
    /// Keep frames whose payload length lies in `min..=max`
    BodySize { min: u8, max: u8 },
}

impl Filter {
    /// Whether this filter lets the frame through
    pub fn accepts(&self, frame: &CanFrame, decoded: bool) -> bool {
        match self {
            Filter::DecodedOnly => decoded,
            Filter::IdMask { id, mask } => {
                let mask = mask.to_raw();
                frame.id.to_raw() & mask == id.to_raw() & mask
            }
            Filter::IdMaskRaw { id, mask } => frame.id.to_raw() & mask == id & mask,
            Filter::BodySize { min, max } => {
                let len = frame.data.len();
                len >= *min as usize && len <= *max as usize
            }
        }
    }

    /// Whether every filter in the set lets the frame through
    pub fn accepts_all(filters: &[Filter], frame: &CanFrame, decoded: bool) -> bool {
        filters.iter().all(|f| f.accepts(frame, decoded))
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Filter::DecodedOnly => f.write_str("decoded-only"),
            Filter::IdMask { id, mask } => write!(f, "id {} mask {}", id, mask),
            Filter::IdMaskRaw { id, mask } => write!(f, "raw id 0x{:08x} mask 0x{:08x}", id, mask),
            Filter::BodySize { min, max } => write!(f, "body {}..={}", min, max),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(device_type: u8, device_id: u8, len: usize) -> CanFrame {
        CanFrame::new(FrameId::new(device_type, 6, 1, 0, device_id), 0, vec![0; len])
    }

    #[test]
    fn test_decoded_only() {
        let f = Filter::DecodedOnly;
        assert!(f.accepts(&frame(6, 1, 2), true));
        assert!(!f.accepts(&frame(6, 1, 2), false));
    }

    #[test]
    fn test_id_mask_on_device_type() {
        let f = Filter::IdMask {
            id: FrameId::new(6, 0, 0, 0, 0),
            mask: FrameId::new(0x1F, 0, 0, 0, 0),
        };
        assert!(f.accepts(&frame(6, 9, 0), false));
        assert!(!f.accepts(&frame(8, 9, 0), false));
    }

    #[test]
    fn test_id_mask_raw() {
        let f = Filter::IdMaskRaw { id: 0x05, mask: 0x3F };
        assert!(f.accepts(&frame(8, 5, 0), false));
        assert!(!f.accepts(&frame(8, 4, 0), false));
    }

    #[test]
    fn test_body_size_and_set() {
        let filters = vec![Filter::BodySize { min: 1, max: 4 }, Filter::DecodedOnly];
        assert!(Filter::accepts_all(&filters, &frame(6, 1, 4), true));
        assert!(!Filter::accepts_all(&filters, &frame(6, 1, 5), true));
        assert!(!Filter::accepts_all(&filters, &frame(6, 1, 0), true));
        assert!(Filter::accepts_all(&[], &frame(6, 1, 0), false));
    }
}
