//! Device and provider snapshots

use serde::{Deserialize, Serialize};

/// CAN manufacturer code carried by every first-party device
pub const VENDOR_MANUFACTURER: u8 = 6;

/// First-party device models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VendorModel {
    /// Time-of-flight distance sensor
    RangeFinder,
    /// Power distribution module with switchable and adjustable channels
    PowerHub,
    /// CAN pass-through gateway
    CanBridge,
}

impl VendorModel {
    /// CAN device-type field used by this model's frames
    pub fn can_device_type(&self) -> u8 {
        match self {
            VendorModel::RangeFinder => 6,
            VendorModel::PowerHub => 8,
            VendorModel::CanBridge => 10,
        }
    }

    /// Device class string of this model when its firmware is current
    pub fn device_class(&self) -> &'static str {
        match self {
            VendorModel::RangeFinder => "RangeFinder",
            VendorModel::PowerHub => "PowerHub",
            VendorModel::CanBridge => "CanBridge",
        }
    }

    /// Reverse of [`VendorModel::can_device_type`]
    pub fn from_can_device_type(device_type: u8) -> Option<Self> {
        match device_type {
            6 => Some(VendorModel::RangeFinder),
            8 => Some(VendorModel::PowerHub),
            10 => Some(VendorModel::CanBridge),
            _ => None,
        }
    }
}

impl std::fmt::Display for VendorModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.device_class())
    }
}

/// Closed set of device types a listing can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceType {
    /// A first-party device
    Vendor { model: VendorModel },
    /// The provider's own bus controller
    HostBridge,
    /// Seen on the bus but not identified
    Unknown,
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceType::Vendor { model } => write!(f, "{}", model),
            DeviceType::HostBridge => f.write_str("HostBridge"),
            DeviceType::Unknown => f.write_str("Unknown"),
        }
    }
}

/// Snapshot of one device, produced fresh for every listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub device_type: DeviceType,
    /// Numeric CAN device id (0..=0x3E)
    #[serde(default)]
    pub device_id: Option<u8>,
    #[serde(default)]
    pub serial: Option<u32>,
    #[serde(default)]
    pub firmware_version: Option<String>,
    /// Human-readable name stored on the device
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_dfu: bool,
    #[serde(default)]
    pub is_dfu_in_progress: bool,
}

impl DeviceInfo {
    pub fn new(device_type: DeviceType) -> Self {
        Self {
            device_type,
            device_id: None,
            serial: None,
            firmware_version: None,
            name: None,
            is_dfu: false,
            is_dfu_in_progress: false,
        }
    }

    /// Name to show an operator: the stored name, else type and serial
    pub fn display_name(&self) -> String {
        match (&self.name, self.serial) {
            (Some(name), _) if !name.is_empty() => name.clone(),
            (_, Some(serial)) => format!("{} #{}", self.device_type, serial),
            _ => self.device_type.to_string(),
        }
    }
}

/// Snapshot of one provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub address: String,
    pub description: String,
    pub connected: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_model_device_type_roundtrip() {
        for model in [VendorModel::RangeFinder, VendorModel::PowerHub, VendorModel::CanBridge] {
            assert_eq!(VendorModel::from_can_device_type(model.can_device_type()), Some(model));
        }
        assert_eq!(VendorModel::from_can_device_type(2), None);
    }

    #[test]
    fn test_display_name_fallbacks() {
        let mut info = DeviceInfo::new(DeviceType::Vendor {
            model: VendorModel::PowerHub,
        });
        assert_eq!(info.display_name(), "PowerHub");
        info.serial = Some(12);
        assert_eq!(info.display_name(), "PowerHub #12");
        info.name = Some("front".into());
        assert_eq!(info.display_name(), "front");
    }

    #[test]
    fn test_device_info_defaults_on_decode() {
        let info: DeviceInfo = serde_json::from_value(json!({
            "device_type": "Unknown"
        }))
        .unwrap();
        assert_eq!(info, DeviceInfo::new(DeviceType::Unknown));
    }
}
