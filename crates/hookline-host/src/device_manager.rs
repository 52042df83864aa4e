//! Devices of one provider, grouped by domain
//!
//! Devices are keyed by serial. A device in DFU mode is only reachable as
//! `Dfu(serial)` and a device in application mode only as `Serial(serial)`.

use std::collections::BTreeMap;
use std::sync::Arc;

use hookline_core::protocol::{DeviceListing, DeviceManagerRequest, DeviceManagerResponse};
use hookline_core::{CanFrame, DeviceId, Domain};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::devices::DeviceHandler;
use crate::error::{HostError, HostResult};

type DomainDevices = BTreeMap<u32, Arc<dyn DeviceHandler>>;

#[derive(Default)]
pub struct DeviceManager {
    domains: RwLock<BTreeMap<Domain, DomainDevices>>,
}

impl DeviceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a domain with no devices yet
    pub fn add_domain(&self, domain: impl Into<String>) {
        self.domains.write().entry(domain.into()).or_default();
    }

    /// Add a device under its serial, replacing any device with the same serial
    ///
    /// A device without a serial cannot be addressed and is rejected.
    pub fn add_device(&self, domain: impl Into<String>, handler: Arc<dyn DeviceHandler>) -> HostResult<()> {
        let domain = domain.into();
        let serial = handler.info().serial.ok_or_else(|| {
            HostError::Config(format!("{} device in {} has no serial", handler.device_class(), domain))
        })?;
        let class = handler.device_class();
        if self.domains.write().entry(domain.clone()).or_default().insert(serial, handler).is_some() {
            warn!(%domain, serial, class, "Device replaced");
        } else {
            debug!(%domain, serial, class, "Device added");
        }
        Ok(())
    }

    pub fn domains(&self) -> Vec<Domain> {
        self.domains.read().keys().cloned().collect()
    }

    /// Fresh listing of every device
    pub fn devices(&self) -> BTreeMap<Domain, Vec<DeviceListing>> {
        self.domains
            .read()
            .iter()
            .map(|(domain, devices)| {
                let listing = devices
                    .values()
                    .map(|handler| (handler.device_id(), handler.info(), handler.device_class().to_string()))
                    .collect();
                (domain.clone(), listing)
            })
            .collect()
    }

    /// Look a device up by address
    pub fn device(&self, domain: &str, device_id: DeviceId) -> HostResult<Arc<dyn DeviceHandler>> {
        let domains = self.domains.read();
        let devices = domains
            .get(domain)
            .ok_or_else(|| HostError::DomainNotFound(domain.to_string()))?;
        devices
            .get(&device_id.serial())
            .filter(|handler| handler.info().is_dfu == device_id.is_dfu())
            .cloned()
            .ok_or(HostError::DeviceNotFound(device_id))
    }

    /// Forward an envelope to one device
    #[instrument(skip(self, data), fields(device = %device_id))]
    pub async fn call(&self, domain: &str, device_id: DeviceId, data: Value) -> HostResult<Value> {
        let handler = self.device(domain, device_id)?;
        handler.rpc_call(data).await
    }

    /// Deliver a bus frame to every device in the domain
    pub fn on_frame(&self, domain: &str, frame: &CanFrame) {
        let handlers: Vec<Arc<dyn DeviceHandler>> = match self.domains.read().get(domain) {
            Some(devices) => devices.values().cloned().collect(),
            None => return,
        };
        for handler in handlers {
            handler.on_frame(frame);
        }
    }

    /// Answer one device-set request
    pub async fn handle(&self, request: DeviceManagerRequest) -> HostResult<DeviceManagerResponse> {
        Ok(match request {
            DeviceManagerRequest::Devices {} => DeviceManagerResponse::Devices(self.devices()),
            DeviceManagerRequest::Call {
                domain,
                device_id,
                data,
            } => DeviceManagerResponse::Call(self.call(&domain, device_id, data).await?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hookline_core::{DeviceInfo, DeviceType};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    /// Echoes envelopes and counts frames
    struct Echo {
        info: Mutex<DeviceInfo>,
        frames: Mutex<usize>,
    }

    impl Echo {
        fn new(serial: u32) -> Arc<Self> {
            let mut info = DeviceInfo::new(DeviceType::HostBridge);
            info.serial = Some(serial);
            Arc::new(Self {
                info: Mutex::new(info),
                frames: Mutex::new(0),
            })
        }
    }

    #[async_trait]
    impl DeviceHandler for Echo {
        fn device_class(&self) -> &'static str {
            "Echo"
        }

        fn info(&self) -> DeviceInfo {
            self.info.lock().clone()
        }

        async fn rpc_call(&self, data: Value) -> HostResult<Value> {
            Ok(data)
        }

        fn on_frame(&self, _frame: &CanFrame) {
            *self.frames.lock() += 1;
        }
    }

    fn manager() -> (DeviceManager, Arc<Echo>) {
        let manager = DeviceManager::new();
        let echo = Echo::new(5);
        manager.add_device("canbus", echo.clone()).unwrap();
        manager.add_device("canbus", Echo::new(7)).unwrap();
        manager.add_domain("spare");
        (manager, echo)
    }

    #[test]
    fn test_listing_groups_by_domain() {
        let (manager, _) = manager();
        let listing = manager.devices();
        assert_eq!(listing.keys().cloned().collect::<Vec<_>>(), vec!["canbus", "spare"]);
        let ids: Vec<DeviceId> = listing["canbus"].iter().map(|(id, _, _)| *id).collect();
        assert_eq!(ids, vec![DeviceId::Serial(5), DeviceId::Serial(7)]);
        assert_eq!(listing["canbus"][0].2, "Echo");
        assert!(listing["spare"].is_empty());
    }

    #[tokio::test]
    async fn test_call_routes_by_address() {
        let (manager, _) = manager();
        let rsp = manager.call("canbus", DeviceId::Serial(7), json!({"x": 1})).await.unwrap();
        assert_eq!(rsp, json!({"x": 1}));
    }

    #[tokio::test]
    async fn test_unknown_device_and_domain() {
        let (manager, _) = manager();
        let err = manager.call("canbus", DeviceId::Serial(42), json!({})).await.unwrap_err();
        assert_eq!(err.to_string(), "No device with ID Serial(42)");
        let err = manager.call("lin", DeviceId::Serial(5), json!({})).await.unwrap_err();
        assert_eq!(err.to_string(), "No domain lin");
    }

    #[tokio::test]
    async fn test_dfu_addressing_follows_mode() {
        let (manager, echo) = manager();
        assert!(manager.device("canbus", DeviceId::Dfu(5)).is_err());

        echo.info.lock().is_dfu = true;
        assert!(manager.device("canbus", DeviceId::Serial(5)).is_err());
        assert!(manager.device("canbus", DeviceId::Dfu(5)).is_ok());
        assert_eq!(manager.devices()["canbus"][0].0, DeviceId::Dfu(5));
    }

    #[test]
    fn test_device_without_serial_is_rejected() {
        let (manager, _) = manager();
        let anonymous = Echo::new(9);
        anonymous.info.lock().serial = None;
        let err = manager.add_device("canbus", anonymous).unwrap_err();
        assert!(matches!(err, HostError::Config(_)));
        assert_eq!(manager.devices()["canbus"].len(), 2);
    }

    #[test]
    fn test_same_serial_replaces_device() {
        let (manager, echo) = manager();
        manager.add_device("canbus", Echo::new(5)).unwrap();
        assert_eq!(manager.devices()["canbus"].len(), 2);
        let current = manager.device("canbus", DeviceId::Serial(5)).unwrap();
        assert!(!Arc::ptr_eq(&current, &(echo as Arc<dyn DeviceHandler>)));
    }

    #[test]
    fn test_frames_fan_out_within_domain() {
        let (manager, echo) = manager();
        let frame = CanFrame::new(hookline_core::FrameId::default(), 0, vec![]);
        manager.on_frame("canbus", &frame);
        manager.on_frame("spare", &frame);
        assert_eq!(*echo.frames.lock(), 1);
    }
}
