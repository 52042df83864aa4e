//! CAN frame model
//!
//! Identifiers use the 29-bit layout common to FRC-style buses:
//!
//! | bits  | field        |
//! |-------|--------------|
//! | 24-28 | device_type  |
//! | 16-23 | manufacturer |
//! | 10-15 | api_class    |
//! | 6-9   | api_index    |
//! | 0-5   | device_id    |

use std::fmt;

use serde::{Deserialize, Serialize};

/// Largest payload of a classic CAN frame
pub const MAX_DATA_LEN: usize = 8;

/// Device id reserved for broadcast frames
pub const BROADCAST_DEVICE_ID: u8 = 0x3F;

/// Decomposed extended CAN identifier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameId {
    pub device_type: u8,
    pub manufacturer: u8,
    pub api_class: u8,
    pub api_index: u8,
    pub device_id: u8,
}

impl FrameId {
    pub fn new(device_type: u8, manufacturer: u8, api_class: u8, api_index: u8, device_id: u8) -> Self {
        Self {
            device_type,
            manufacturer,
            api_class,
            api_index,
            device_id,
        }
    }

    /// Pack into a 29-bit raw identifier. Out-of-range fields are masked.
    pub fn to_raw(&self) -> u32 {
        ((self.device_type as u32 & 0x1F) << 24)
            | ((self.manufacturer as u32) << 16)
            | ((self.api_class as u32 & 0x3F) << 10)
            | ((self.api_index as u32 & 0x0F) << 6)
            | (self.device_id as u32 & 0x3F)
    }

    pub fn from_raw(raw: u32) -> Self {
        Self {
            device_type: ((raw >> 24) & 0x1F) as u8,
            manufacturer: ((raw >> 16) & 0xFF) as u8,
            api_class: ((raw >> 10) & 0x3F) as u8,
            api_index: ((raw >> 6) & 0x0F) as u8,
            device_id: (raw & 0x3F) as u8,
        }
    }

    /// Same identifier addressed to another device
    pub fn with_device_id(mut self, device_id: u8) -> Self {
        self.device_id = device_id;
        self
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.to_raw())
    }
}

/// One frame as observed on (or sent to) the bus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanFrame {
    pub id: FrameId,
    /// Milliseconds since the bus epoch
    pub timestamp: u32,
    /// Raw payload (0-8 bytes, length not validated)
    pub data: Vec<u8>,
}

impl CanFrame {
    pub fn new(id: FrameId, timestamp: u32, data: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            timestamp,
            data: data.into(),
        }
    }

    /// Payload as space-separated lowercase hex pairs
    pub fn data_hex(&self) -> String {
        self.data
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_roundtrip() {
        let id = FrameId::new(6, 6, 0x12, 3, 0x21);
        assert_eq!(FrameId::from_raw(id.to_raw()), id);
        assert_eq!(id.to_raw(), 0x0606_48E1);
    }

    #[test]
    fn test_raw_masks_out_of_range_fields() {
        let id = FrameId::new(0xFF, 0, 0xFF, 0xFF, 0xFF);
        let raw = id.to_raw();
        assert!(raw < (1 << 29));
        assert_eq!(FrameId::from_raw(raw).device_id, 0x3F);
    }

    #[test]
    fn test_data_hex() {
        let frame = CanFrame::new(FrameId::default(), 0, vec![0x01, 0xab, 0x00]);
        assert_eq!(frame.data_hex(), "01 ab 00");
        assert_eq!(CanFrame::new(FrameId::default(), 0, vec![]).data_hex(), "");
    }
}
