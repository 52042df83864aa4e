//! Device-class registry
//!
//! Maps the `device_class` string of a listing to a driver factory. A class
//! with no factory resolves to [`DeviceDriver::Unsupported`], never an error.

use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

use crate::devices::{CanBridge, OutdatedFirmware, PowerHub, RangeFinder};
use crate::error::{ClientError, ClientResult};
use crate::router::DeviceHandle;

/// Builds a driver around a device handle
pub type DriverFactory = fn(DeviceHandle) -> DeviceDriver;

/// A device handle paired with the driver for its class
#[derive(Debug, Clone)]
pub enum DeviceDriver {
    RangeFinder(RangeFinder),
    PowerHub(PowerHub),
    OutdatedFirmware(OutdatedFirmware),
    CanBridge(CanBridge),
    /// Listed device whose class has no driver
    Unsupported {
        device_class: String,
        handle: DeviceHandle,
    },
}

/// Run `$body` with `$g` bound to the driver's generic sub-protocol
macro_rules! with_generic {
    ($driver:expr, $g:ident => $body:expr) => {
        match $driver {
            DeviceDriver::RangeFinder(d) => {
                let $g = d.generic();
                $body
            }
            DeviceDriver::PowerHub(d) => {
                let $g = d.generic();
                $body
            }
            DeviceDriver::OutdatedFirmware(d) => {
                let $g = d.generic();
                $body
            }
            DeviceDriver::CanBridge(d) => {
                let $g = d.generic();
                $body
            }
            DeviceDriver::Unsupported { device_class, .. } => {
                Err(ClientError::unsupported(device_class.clone()))
            }
        }
    };
}

/// Run `$body` with `$f` bound to the driver's firmware sub-protocol
macro_rules! with_firmware {
    ($driver:expr, $f:ident => $body:expr) => {
        match $driver {
            DeviceDriver::RangeFinder(d) => {
                let $f = d.firmware();
                $body
            }
            DeviceDriver::PowerHub(d) => {
                let $f = d.firmware();
                $body
            }
            DeviceDriver::OutdatedFirmware(d) => {
                let $f = d.firmware();
                $body
            }
            other => Err(ClientError::unsupported(other.device_class())),
        }
    };
}

impl DeviceDriver {
    pub fn handle(&self) -> &DeviceHandle {
        match self {
            DeviceDriver::RangeFinder(d) => d.handle(),
            DeviceDriver::PowerHub(d) => d.handle(),
            DeviceDriver::OutdatedFirmware(d) => d.handle(),
            DeviceDriver::CanBridge(d) => d.handle(),
            DeviceDriver::Unsupported { handle, .. } => handle,
        }
    }

    pub fn device_class(&self) -> &str {
        match self {
            DeviceDriver::RangeFinder(_) => RangeFinder::DEVICE_CLASS,
            DeviceDriver::PowerHub(_) => PowerHub::DEVICE_CLASS,
            DeviceDriver::OutdatedFirmware(_) => OutdatedFirmware::DEVICE_CLASS,
            DeviceDriver::CanBridge(_) => CanBridge::DEVICE_CLASS,
            DeviceDriver::Unsupported { device_class, .. } => device_class,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, DeviceDriver::Unsupported { .. })
    }

    pub fn as_can_bridge(&self) -> Option<&CanBridge> {
        match self {
            DeviceDriver::CanBridge(bridge) => Some(bridge),
            _ => None,
        }
    }

    pub async fn blink(&self) -> ClientResult<()> {
        with_generic!(self, g => g.blink().await)
    }

    pub async fn set_id(&self, id: u8) -> ClientResult<()> {
        with_generic!(self, g => g.set_id(id).await)
    }

    pub async fn set_name(&self, name: &str) -> ClientResult<()> {
        with_generic!(self, g => g.set_name(name).await)
    }

    pub async fn commit_to_eeprom(&self) -> ClientResult<()> {
        with_generic!(self, g => g.commit_to_eeprom().await)
    }

    /// Reboot into DFU mode
    pub async fn start_field_upgrade(&self) -> ClientResult<()> {
        match self {
            DeviceDriver::RangeFinder(d) => d.start_field_upgrade().await,
            DeviceDriver::PowerHub(d) => d.start_field_upgrade().await,
            DeviceDriver::OutdatedFirmware(d) => d.start_field_upgrade().await,
            other => Err(ClientError::unsupported(other.device_class())),
        }
    }

    pub async fn firmware_progress(&self) -> ClientResult<Option<f64>> {
        with_firmware!(self, f => f.progress().await)
    }

    pub async fn do_field_upgrade(&self, data: Vec<u8>) -> ClientResult<()> {
        with_firmware!(self, f => f.do_field_upgrade(data).await)
    }

    /// Poll firmware progress until the upgrade ends
    pub async fn wait_for_firmware<F>(&self, interval: Duration, on_progress: F) -> ClientResult<()>
    where
        F: FnMut(f64),
    {
        with_firmware!(self, f => f.wait_for_completion(interval, on_progress).await)
    }
}

/// Registry of known device classes
pub struct DeviceRegistry {
    factories: HashMap<String, DriverFactory>,
}

impl DeviceRegistry {
    /// A registry that knows no classes
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register (or replace) the factory for a class
    pub fn register(&mut self, device_class: impl Into<String>, factory: DriverFactory) {
        self.factories.insert(device_class.into(), factory);
    }

    pub fn contains(&self, device_class: &str) -> bool {
        self.factories.contains_key(device_class)
    }

    /// Registered classes, sorted
    pub fn classes(&self) -> Vec<&str> {
        let mut classes: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        classes.sort_unstable();
        classes
    }

    /// Build the driver for a listed device
    pub fn resolve(&self, device_class: &str, handle: DeviceHandle) -> DeviceDriver {
        match self.factories.get(device_class) {
            Some(factory) => factory(handle),
            None => {
                debug!(device_class, device = %handle.device_id(), "No driver for device class");
                DeviceDriver::Unsupported {
                    device_class: device_class.to_string(),
                    handle,
                }
            }
        }
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(RangeFinder::DEVICE_CLASS, |h| {
            DeviceDriver::RangeFinder(RangeFinder::new(h))
        });
        registry.register(PowerHub::DEVICE_CLASS, |h| {
            DeviceDriver::PowerHub(PowerHub::new(h))
        });
        registry.register(OutdatedFirmware::DEVICE_CLASS, |h| {
            DeviceDriver::OutdatedFirmware(OutdatedFirmware::new(h))
        });
        registry.register(CanBridge::DEVICE_CLASS, |h| {
            DeviceDriver::CanBridge(CanBridge::new(h))
        });
        registry
    }
}

impl std::fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field("classes", &self.classes())
            .finish()
    }
}
