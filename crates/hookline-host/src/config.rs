//! Host configuration
//!
//! A host file lists providers, each with the CAN domains it drives and the
//! devices on each domain:
//!
//! ```toml
//! [server]
//! port = 7340
//!
//! [[providers]]
//! address = "P1"
//! description = "Bench rig"
//!
//! [[providers.domains]]
//! name = "canbus"
//!
//! [[providers.domains.devices]]
//! class = "RangeFinder"
//! serial = 5
//! device_id = 2
//! ```

use std::collections::HashSet;
use std::path::Path;

use hookline_core::protocol::MAX_DEVICE_ID;
use hookline_core::VendorModel;
use serde::{Deserialize, Serialize};

use crate::capture_log::DEFAULT_MAX_MAILBOX;
use crate::error::{HostError, HostResult};

/// Configuration for a host
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub firmware: FirmwareConfig,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

/// Daemon listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: default_port() }
    }
}

fn default_port() -> u16 {
    7340
}

/// Bridge capture log settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Frames a bridge keeps before evicting the oldest
    #[serde(default = "default_max_mailbox")]
    pub max_mailbox: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            max_mailbox: default_max_mailbox(),
        }
    }
}

fn default_max_mailbox() -> usize {
    DEFAULT_MAX_MAILBOX
}

/// Simulated firmware upgrade settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirmwareConfig {
    /// Delay between 8-byte chunks
    #[serde(default = "default_chunk_interval_ms")]
    pub chunk_interval_ms: u64,
    /// Version devices report after an upgrade
    #[serde(default = "default_upgraded_version")]
    pub upgraded_version: String,
}

impl Default for FirmwareConfig {
    fn default() -> Self {
        Self {
            chunk_interval_ms: default_chunk_interval_ms(),
            upgraded_version: default_upgraded_version(),
        }
    }
}

fn default_chunk_interval_ms() -> u64 {
    2
}

fn default_upgraded_version() -> String {
    "2.0.0".to_string()
}

// =============================================================================
// Providers, domains and devices
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub address: String,
    #[serde(default)]
    pub description: String,
    /// Connect when the host starts
    #[serde(default)]
    pub auto_connect: bool,
    #[serde(default)]
    pub domains: Vec<DomainConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainConfig {
    pub name: String,
    /// Periodic status traffic from the domain's devices
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simulation: Option<SimulationConfig>,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_sim_interval_ms")]
    pub interval_ms: u64,
}

fn default_sim_interval_ms() -> u64 {
    100
}

/// Device classes a host can simulate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceClass {
    RangeFinder,
    PowerHub,
    OutdatedFirmware,
    CanBridge,
}

impl DeviceClass {
    /// Hardware model behind the class; outdated devices name theirs
    pub fn model(&self, configured: Option<VendorModel>) -> VendorModel {
        match self {
            DeviceClass::RangeFinder => VendorModel::RangeFinder,
            DeviceClass::PowerHub => VendorModel::PowerHub,
            DeviceClass::CanBridge => VendorModel::CanBridge,
            DeviceClass::OutdatedFirmware => configured.unwrap_or(VendorModel::RangeFinder),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub class: DeviceClass,
    pub serial: u32,
    #[serde(default)]
    pub device_id: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firmware_version: Option<String>,
    /// Hardware model of an `OutdatedFirmware` device
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<VendorModel>,
    /// Where an `OutdatedFirmware` device's upgrade can be downloaded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firmware_url: Option<String>,
}

impl DeviceConfig {
    pub fn new(class: DeviceClass, serial: u32, device_id: u8) -> Self {
        Self {
            class,
            serial,
            device_id,
            name: None,
            firmware_version: None,
            model: None,
            firmware_url: None,
        }
    }
}

// =============================================================================
// Loading
// =============================================================================

impl HostConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> HostResult<Self> {
        let config: HostConfig = toml::from_str(text).map_err(|e| HostError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn from_file(path: &Path) -> HostResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| HostError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Reject duplicate addresses and serials and out-of-range ids
    pub fn validate(&self) -> HostResult<()> {
        let mut addresses = HashSet::new();
        for provider in &self.providers {
            if !addresses.insert(provider.address.as_str()) {
                return Err(HostError::Config(format!("Duplicate provider {}", provider.address)));
            }
            let mut domains = HashSet::new();
            for domain in &provider.domains {
                if !domains.insert(domain.name.as_str()) {
                    return Err(HostError::Config(format!(
                        "Duplicate domain {} in provider {}",
                        domain.name, provider.address
                    )));
                }
                let mut serials = HashSet::new();
                for device in &domain.devices {
                    if !serials.insert(device.serial) {
                        return Err(HostError::Config(format!(
                            "Duplicate serial {} in {}/{}",
                            device.serial, provider.address, domain.name
                        )));
                    }
                    if device.device_id > MAX_DEVICE_ID {
                        return Err(HostError::Config(format!(
                            "Device id {} of serial {} is out of range",
                            device.device_id, device.serial
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// One provider `P1` with a `canbus` domain holding one device of each class
    pub fn demo() -> Self {
        let mut range_finder = DeviceConfig::new(DeviceClass::RangeFinder, 5, 2);
        range_finder.name = Some("front".into());
        range_finder.firmware_version = Some("2.0.0".into());

        let mut power_hub = DeviceConfig::new(DeviceClass::PowerHub, 7, 3);
        power_hub.firmware_version = Some("2.0.0".into());

        let mut outdated = DeviceConfig::new(DeviceClass::OutdatedFirmware, 9, 4);
        outdated.model = Some(VendorModel::RangeFinder);
        outdated.firmware_version = Some("0.9.1".into());
        outdated.firmware_url = Some("https://firmware.invalid/range-finder/2.0.0.bin".into());

        let mut bridge = DeviceConfig::new(DeviceClass::CanBridge, 1, 0);
        bridge.name = Some("bridge".into());

        Self {
            providers: vec![ProviderConfig {
                address: "P1".into(),
                description: "Demo bus".into(),
                auto_connect: false,
                domains: vec![DomainConfig {
                    name: "canbus".into(),
                    simulation: None,
                    devices: vec![range_finder, power_hub, outdated, bridge],
                }],
            }],
            ..Default::default()
        }
    }
}
