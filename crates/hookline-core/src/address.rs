//! Nominal addressing of providers, domains and devices

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique key of a provider instance
pub type ProviderAddress = String;

/// Namespace for a family of devices behind one provider (e.g. "canbus")
pub type Domain = String;

/// Identifier of a device within a domain
///
/// A device in firmware-update mode answers under a different identifier than
/// in normal operation, so the two are distinct variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeviceId {
    /// Device is in firmware-update (DFU) mode
    Dfu(u32),
    /// Device is operating normally
    Serial(u32),
}

impl DeviceId {
    /// The serial number regardless of mode
    pub fn serial(&self) -> u32 {
        match self {
            DeviceId::Dfu(serial) | DeviceId::Serial(serial) => *serial,
        }
    }

    pub fn is_dfu(&self) -> bool {
        matches!(self, DeviceId::Dfu(_))
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceId::Dfu(serial) => write!(f, "Dfu({})", serial),
            DeviceId::Serial(serial) => write!(f, "Serial({})", serial),
        }
    }
}

impl std::str::FromStr for DeviceId {
    type Err = String;

    /// Parses `Serial(5)`, `Dfu(5)`, `dfu:5` or a bare serial number
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (kind, number) = if let Some(rest) = s.strip_suffix(')') {
            rest.split_once('(')
                .ok_or_else(|| format!("Invalid device id: {}", s))?
        } else if let Some((kind, number)) = s.split_once(':') {
            (kind, number)
        } else {
            ("serial", s)
        };

        let serial: u32 = number
            .trim()
            .parse()
            .map_err(|_| format!("Invalid device serial: {}", number))?;

        match kind.trim().to_ascii_lowercase().as_str() {
            "serial" => Ok(DeviceId::Serial(serial)),
            "dfu" => Ok(DeviceId::Dfu(serial)),
            other => Err(format!("Unknown device id kind: {}", other)),
        }
    }
}

/// Full address of one device: provider, domain and device id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceAddress {
    pub provider: ProviderAddress,
    pub domain: Domain,
    pub device: DeviceId,
}

impl DeviceAddress {
    pub fn new(provider: impl Into<String>, domain: impl Into<String>, device: DeviceId) -> Self {
        Self {
            provider: provider.into(),
            domain: domain.into(),
            device,
        }
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.provider, self.domain, self.device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_device_id_wire_format() {
        assert_eq!(serde_json::to_value(DeviceId::Serial(5)).unwrap(), json!({"Serial": 5}));
        assert_eq!(
            serde_json::from_value::<DeviceId>(json!({"Dfu": 7})).unwrap(),
            DeviceId::Dfu(7)
        );
    }

    #[test]
    fn test_device_id_parse() {
        assert_eq!("Serial(5)".parse::<DeviceId>().unwrap(), DeviceId::Serial(5));
        assert_eq!("dfu:12".parse::<DeviceId>().unwrap(), DeviceId::Dfu(12));
        assert_eq!("42".parse::<DeviceId>().unwrap(), DeviceId::Serial(42));
        assert!("Serial(x)".parse::<DeviceId>().is_err());
        assert!("Probe(1)".parse::<DeviceId>().is_err());
    }

    #[test]
    fn test_address_display() {
        let addr = DeviceAddress::new("P1", "canbus", DeviceId::Serial(5));
        assert_eq!(addr.to_string(), "P1/canbus/Serial(5)");
        assert_eq!(addr.device.serial(), 5);
        assert!(!addr.device.is_dfu());
    }
}
