//! Providers: one bus controller and the domains it drives

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hookline_core::protocol::{DeviceManagerRequest, DeviceManagerResponse, ProviderRequest, ProviderResponse};
use hookline_core::{DeviceInfo, DeviceType, ProviderInfo};
use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::bus::{CanBus, VirtualBus};
use crate::config::{DeviceClass, DeviceConfig, HostConfig, ProviderConfig};
use crate::device_manager::DeviceManager;
use crate::devices::{
    CanBridgeDevice, DeviceCore, DeviceHandler, OutdatedFirmwareDevice, PowerHubDevice, RangeFinderDevice,
};
use crate::error::{HostError, HostResult};
use crate::sim;

/// One provider as seen by the provider manager
#[async_trait]
pub trait DeviceProvider: Send + Sync {
    fn address(&self) -> &str;

    fn info(&self) -> ProviderInfo;

    async fn connect(&self) -> HostResult<()>;

    async fn disconnect(&self) -> HostResult<()>;

    /// Answer one device-set request; requires a connection
    async fn device_manager_call(&self, req: DeviceManagerRequest) -> HostResult<DeviceManagerResponse>;

    /// Answer one provider request
    async fn handle(&self, request: ProviderRequest) -> HostResult<ProviderResponse> {
        Ok(match request {
            ProviderRequest::Connect {} => {
                self.connect().await?;
                ProviderResponse::Connect(())
            }
            ProviderRequest::Disconnect {} => {
                self.disconnect().await?;
                ProviderResponse::Disconnect(())
            }
            ProviderRequest::Info {} => ProviderResponse::Info(self.info()),
            ProviderRequest::DeviceManagerCall { req } => {
                ProviderResponse::DeviceManagerCall(self.device_manager_call(req).await?)
            }
        })
    }
}

/// A CAN domain of a [`BusProvider`]
struct BusDomain {
    name: String,
    bus: Arc<VirtualBus>,
    simulation: Option<Duration>,
}

/// Provider over virtual CAN buses
///
/// Connecting marks every bus connected and starts one pump per domain that
/// feeds bus traffic to the domain's devices. Disconnecting stops the pumps.
pub struct BusProvider {
    address: String,
    description: String,
    domains: Vec<BusDomain>,
    devices: Arc<DeviceManager>,
    connected: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl BusProvider {
    pub fn new(address: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            description: description.into(),
            domains: Vec::new(),
            devices: Arc::new(DeviceManager::new()),
            connected: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Build the provider, its buses and devices from configuration
    pub fn from_config(config: &ProviderConfig, host: &HostConfig) -> Self {
        let mut provider = Self::new(config.address.clone(), config.description.clone());
        for domain in &config.domains {
            let bus = provider.add_domain(&domain.name);
            for device in &domain.devices {
                let handler = build_device(device, bus.clone(), host);
                if let Err(e) = provider.devices.add_device(domain.name.clone(), handler) {
                    warn!(provider = %config.address, error = %e, "Device skipped");
                }
            }
            if let (Some(sim), Some(last)) = (&domain.simulation, provider.domains.last_mut()) {
                last.simulation = Some(Duration::from_millis(sim.interval_ms.max(1)));
            }
        }
        provider
    }

    /// Add a domain with a fresh bus and return the bus
    pub fn add_domain(&mut self, name: &str) -> Arc<VirtualBus> {
        let bus = Arc::new(VirtualBus::new(name));
        self.domains.push(BusDomain {
            name: name.to_string(),
            bus: bus.clone(),
            simulation: None,
        });
        self.devices.add_domain(name);
        bus
    }

    pub fn devices(&self) -> &Arc<DeviceManager> {
        &self.devices
    }

    /// Bus of one domain
    pub fn bus(&self, domain: &str) -> Option<&Arc<VirtualBus>> {
        self.domains.iter().find(|d| d.name == domain).map(|d| &d.bus)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn spawn_pump(&self, domain: &BusDomain) -> JoinHandle<()> {
        let mut rx = domain.bus.subscribe();
        let devices = self.devices.clone();
        let name = domain.name.clone();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(frame) => devices.on_frame(&name, &frame),
                    Err(RecvError::Lagged(missed)) => {
                        warn!(domain = %name, missed, "Bus pump lagged, frames dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!(domain = %name, "Bus pump stopped");
        })
    }
}

#[async_trait]
impl DeviceProvider for BusProvider {
    fn address(&self) -> &str {
        &self.address
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            address: self.address.clone(),
            description: self.description.clone(),
            connected: self.is_connected(),
        }
    }

    #[instrument(skip(self), fields(provider = %self.address))]
    async fn connect(&self) -> HostResult<()> {
        if self.connected.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let mut tasks = self.tasks.lock();
        for domain in &self.domains {
            tasks.push(self.spawn_pump(domain));
            domain.bus.set_connected(true);
            if let Some(interval) = domain.simulation {
                tasks.push(sim::spawn(
                    domain.bus.clone(),
                    self.devices.clone(),
                    domain.name.clone(),
                    interval,
                ));
            }
        }
        info!(domains = self.domains.len(), "Provider connected");
        Ok(())
    }

    #[instrument(skip(self), fields(provider = %self.address))]
    async fn disconnect(&self) -> HostResult<()> {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        for domain in &self.domains {
            domain.bus.set_connected(false);
        }
        info!("Provider disconnected");
        Ok(())
    }

    async fn device_manager_call(&self, req: DeviceManagerRequest) -> HostResult<DeviceManagerResponse> {
        if !self.is_connected() {
            return Err(HostError::NotConnected(self.address.clone()));
        }
        self.devices.handle(req).await
    }
}

impl Drop for BusProvider {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}

/// Create the handler for one configured device
fn build_device(config: &DeviceConfig, bus: Arc<VirtualBus>, host: &HostConfig) -> Arc<dyn DeviceHandler> {
    let model = config.class.model(config.model);
    let mut info = DeviceInfo::new(DeviceType::Vendor { model });
    info.serial = Some(config.serial);
    info.device_id = Some(config.device_id);
    info.name = config.name.clone();
    info.firmware_version = config.firmware_version.clone();

    let bus: Arc<dyn CanBus> = bus;
    let core = DeviceCore::new(model, bus, info)
        .with_chunk_interval(Duration::from_millis(host.firmware.chunk_interval_ms))
        .with_upgraded_version(host.firmware.upgraded_version.clone());

    match config.class {
        DeviceClass::RangeFinder => Arc::new(RangeFinderDevice::new(core)),
        DeviceClass::PowerHub => Arc::new(PowerHubDevice::new(core)),
        DeviceClass::OutdatedFirmware => Arc::new(OutdatedFirmwareDevice::new(core, config.firmware_url.clone())),
        DeviceClass::CanBridge => Arc::new(CanBridgeDevice::new(core, host.capture.max_mailbox)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hookline_core::DeviceId;
    use serde_json::json;

    fn demo() -> BusProvider {
        let host = HostConfig::demo();
        BusProvider::from_config(&host.providers[0], &host)
    }

    #[tokio::test]
    async fn test_device_calls_require_connection() {
        let provider = demo();
        let err = provider
            .device_manager_call(DeviceManagerRequest::Devices {})
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Provider P1 is not connected");

        provider.connect().await.unwrap();
        assert!(provider.info().connected);
        let DeviceManagerResponse::Devices(listing) =
            provider.device_manager_call(DeviceManagerRequest::Devices {}).await.unwrap()
        else {
            panic!("unexpected response");
        };
        let classes: Vec<&str> = listing["canbus"].iter().map(|(_, _, c)| c.as_str()).collect();
        assert_eq!(classes, vec!["CanBridge", "RangeFinder", "PowerHub", "OutdatedFirmware"]);
    }

    #[tokio::test]
    async fn test_disconnect_stops_bus() {
        let provider = demo();
        provider.connect().await.unwrap();
        provider.connect().await.unwrap();
        assert!(provider.bus("canbus").unwrap().is_connected());

        provider.disconnect().await.unwrap();
        assert!(!provider.bus("canbus").unwrap().is_connected());
        assert!(provider.tasks.lock().is_empty());
    }

    #[tokio::test]
    async fn test_pump_feeds_bridge() {
        let provider = demo();
        provider.connect().await.unwrap();
        let devices = provider.devices();
        devices
            .call("canbus", DeviceId::Serial(1), json!({"method": "set_log_enabled", "data": {"enabled": true}}))
            .await
            .unwrap();
        devices
            .call("canbus", DeviceId::Serial(5), json!({"method": "generic", "data": {"msg": {"method": "blink", "data": {}}}}))
            .await
            .unwrap();

        let mut items = json!([]);
        for _ in 0..50 {
            let rsp = devices
                .call("canbus", DeviceId::Serial(1), json!({"method": "read_after", "data": {"seq": 0}}))
                .await
                .unwrap();
            items = rsp["data"].clone();
            if items.as_array().map_or(false, |a| !a.is_empty()) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(items[0]["decoded"]["api"], json!("blink"));
        assert_eq!(items[0]["decoded"]["model"], json!("RangeFinder"));
    }
}
