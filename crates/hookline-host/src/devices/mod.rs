//! Simulated first-party devices
//!
//! Each handler answers one device-class protocol. The generic and
//! firmware-upgrade sub-protocols are shared through [`DeviceCore`], which
//! also owns the device's snapshot and its bus.

mod can_bridge;
mod outdated;
mod power_hub;
mod range_finder;

pub use can_bridge::CanBridgeDevice;
pub use outdated::OutdatedFirmwareDevice;
pub use power_hub::PowerHubDevice;
pub use range_finder::RangeFinderDevice;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hookline_core::protocol::{
    api_class, FirmwareUpgradeRequest, FirmwareUpgradeResponse, GenericDeviceRequest,
    GenericDeviceResponse, FIRMWARE_CHUNK_LEN, MAX_NAME_LEN,
};
use hookline_core::{
    CanFrame, DeviceId, DeviceInfo, DeviceType, FrameId, VendorModel, BROADCAST_DEVICE_ID,
    MAX_DATA_LEN, VENDOR_MANUFACTURER,
};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bus::CanBus;
use crate::error::{HostError, HostResult};

/// One device as seen by its device manager
#[async_trait]
pub trait DeviceHandler: Send + Sync {
    /// Class string reported in listings; selects the client driver
    fn device_class(&self) -> &'static str;

    /// Fresh snapshot
    fn info(&self) -> DeviceInfo;

    /// Answer one envelope of this device's protocol
    async fn rpc_call(&self, data: Value) -> HostResult<Value>;

    /// Observe a frame from the device's bus
    fn on_frame(&self, _frame: &CanFrame) {}

    /// Address under which the device is currently reachable
    fn device_id(&self) -> DeviceId {
        let info = self.info();
        let serial = info.serial.unwrap_or_default();
        if info.is_dfu {
            DeviceId::Dfu(serial)
        } else {
            DeviceId::Serial(serial)
        }
    }
}

// =============================================================================
// Device core
// =============================================================================

/// Progress of a running firmware upgrade
#[derive(Debug, Clone, Copy)]
struct Upgrade {
    sent: usize,
    total: usize,
}

/// How long a flashed device stays in DFU mode when nobody polls its progress
const REBOOT_GRACE: Duration = Duration::from_secs(2);

/// Upgrade outcome shared between a device and its firmware worker
///
/// A finished device stays in DFU mode until its final `None` progress has
/// been read (or [`REBOOT_GRACE`] passes), so a client polling `Dfu(serial)`
/// always sees the upgrade end before the device moves to `Serial(serial)`.
#[derive(Default)]
struct UpgradeSlot {
    running: Option<Upgrade>,
    /// Version to report once the device leaves DFU mode
    finished: Option<String>,
}

impl UpgradeSlot {
    /// Leave DFU mode if an upgrade finished
    fn reboot(&mut self, info: &RwLock<DeviceInfo>) {
        if let Some(version) = self.finished.take() {
            let mut info = info.write();
            info.is_dfu = false;
            info!(serial = ?info.serial, version = %version, "Device rebooted into new firmware");
            info.firmware_version = Some(version);
        }
    }
}

/// State and behaviour shared by every first-party device
pub struct DeviceCore {
    model: VendorModel,
    bus: Arc<dyn CanBus>,
    info: Arc<RwLock<DeviceInfo>>,
    upgrade: Arc<Mutex<UpgradeSlot>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    chunk_interval: Duration,
    /// Version reported once an upgrade finishes
    upgraded_version: String,
}

impl DeviceCore {
    pub fn new(model: VendorModel, bus: Arc<dyn CanBus>, mut info: DeviceInfo) -> Self {
        if info.device_type == DeviceType::Unknown {
            info.device_type = DeviceType::Vendor { model };
        }
        Self {
            model,
            bus,
            info: Arc::new(RwLock::new(info)),
            upgrade: Arc::new(Mutex::new(UpgradeSlot::default())),
            worker: Mutex::new(None),
            chunk_interval: Duration::from_millis(2),
            upgraded_version: "latest".to_string(),
        }
    }

    /// Delay between firmware chunks
    pub fn with_chunk_interval(mut self, interval: Duration) -> Self {
        self.chunk_interval = interval;
        self
    }

    /// Firmware version the device reports after a successful upgrade
    pub fn with_upgraded_version(mut self, version: impl Into<String>) -> Self {
        self.upgraded_version = version.into();
        self
    }

    pub fn model(&self) -> VendorModel {
        self.model
    }

    pub fn info(&self) -> DeviceInfo {
        self.info.read().clone()
    }

    pub fn bus(&self) -> &Arc<dyn CanBus> {
        &self.bus
    }

    /// Current numeric CAN id
    pub fn can_id(&self) -> u8 {
        self.info.read().device_id.unwrap_or(0)
    }

    /// Frame id for one of this device's API endpoints
    pub fn frame_id(&self, api_class: u8, api_index: u8) -> FrameId {
        FrameId::new(
            self.model.can_device_type(),
            VENDOR_MANUFACTURER,
            api_class,
            api_index,
            self.can_id(),
        )
    }

    /// Whether a frame was sent by (or addressed to) this device
    pub fn owns(&self, frame: &CanFrame) -> bool {
        frame.id.manufacturer == VENDOR_MANUFACTURER
            && frame.id.device_type == self.model.can_device_type()
            && (frame.id.device_id == self.can_id() || frame.id.device_id == BROADCAST_DEVICE_ID)
    }

    pub async fn send(&self, api_class: u8, api_index: u8, data: Vec<u8>) -> HostResult<()> {
        self.bus.send(self.frame_id(api_class, api_index), data).await?;
        Ok(())
    }

    /// Put the device into DFU mode; it is then addressed as `Dfu(serial)`
    pub async fn enter_dfu(&self) -> HostResult<()> {
        self.send(api_class::ENTER_DFU, 0, vec![]).await?;
        self.info.write().is_dfu = true;
        info!(model = %self.model, serial = ?self.info.read().serial, "Device entered DFU mode");
        Ok(())
    }

    /// Answer the generic sub-protocol
    pub async fn generic(&self, msg: GenericDeviceRequest) -> HostResult<GenericDeviceResponse> {
        match msg {
            GenericDeviceRequest::Blink {} => {
                self.send(api_class::BLINK, 0, vec![]).await?;
                Ok(GenericDeviceResponse::Blink(()))
            }
            GenericDeviceRequest::SetId { id } => {
                if id >= BROADCAST_DEVICE_ID {
                    return Err(HostError::invalid(format!("Device id {} is reserved or out of range", id)));
                }
                self.send(api_class::SET_ID, 0, vec![id]).await?;
                self.info.write().device_id = Some(id);
                debug!(model = %self.model, id, "Device id changed");
                Ok(GenericDeviceResponse::SetId(()))
            }
            GenericDeviceRequest::SetName { name } => {
                let bytes: Vec<u8> = name.chars().take(MAX_NAME_LEN).collect::<String>().into_bytes();
                for (index, chunk) in bytes.chunks(MAX_DATA_LEN).enumerate() {
                    self.send(api_class::SET_NAME, index as u8, chunk.to_vec()).await?;
                }
                if bytes.is_empty() {
                    self.send(api_class::SET_NAME, 0, vec![]).await?;
                }
                self.info.write().name = Some(String::from_utf8_lossy(&bytes).into_owned());
                Ok(GenericDeviceResponse::SetName(()))
            }
            GenericDeviceRequest::CommitToEeprom {} => {
                self.send(api_class::COMMIT, 0, vec![]).await?;
                Ok(GenericDeviceResponse::CommitToEeprom(()))
            }
        }
    }

    /// Answer the firmware-upgrade sub-protocol
    pub async fn firmware(&self, msg: FirmwareUpgradeRequest) -> HostResult<FirmwareUpgradeResponse> {
        match msg {
            FirmwareUpgradeRequest::Progress {} => Ok(FirmwareUpgradeResponse::Progress(self.progress())),
            FirmwareUpgradeRequest::DoFieldUpgrade { data } => {
                self.start_upgrade(data)?;
                Ok(FirmwareUpgradeResponse::DoFieldUpgrade(()))
            }
        }
    }

    /// Percent complete, `None` when idle
    ///
    /// Reading `None` after a finished upgrade reboots the device out of DFU
    /// mode.
    pub fn progress(&self) -> Option<f64> {
        let mut slot = self.upgrade.lock();
        match slot.running {
            Some(u) => Some(u.sent as f64 * 100.0 / u.total.max(1) as f64),
            None => {
                slot.reboot(&self.info);
                None
            }
        }
    }

    fn start_upgrade(&self, image: Vec<u8>) -> HostResult<()> {
        if !self.info.read().is_dfu {
            return Err(HostError::invalid("Device is not in DFU mode"));
        }
        if image.is_empty() {
            return Err(HostError::invalid("Firmware image is empty"));
        }
        {
            let mut slot = self.upgrade.lock();
            if slot.running.is_some() {
                return Err(HostError::Busy("firmware upgrade already running".into()));
            }
            slot.finished = None;
            slot.running = Some(Upgrade {
                sent: 0,
                total: image.len(),
            });
        }
        self.info.write().is_dfu_in_progress = true;
        info!(model = %self.model, bytes = image.len(), "Firmware upgrade started");

        let worker = FirmwareWorker {
            bus: self.bus.clone(),
            info: self.info.clone(),
            upgrade: self.upgrade.clone(),
            chunk_id: self.frame_id(api_class::FIRMWARE_CHUNK, 0),
            done_id: self.frame_id(api_class::FIRMWARE_DONE, 0),
            interval: self.chunk_interval,
            version: self.upgraded_version.clone(),
        };
        *self.worker.lock() = Some(tokio::spawn(worker.run(image)));
        Ok(())
    }
}

impl Drop for DeviceCore {
    fn drop(&mut self) {
        if let Some(handle) = self.worker.lock().take() {
            handle.abort();
        }
    }
}

/// Streams an image to the bus chunk by chunk
struct FirmwareWorker {
    bus: Arc<dyn CanBus>,
    info: Arc<RwLock<DeviceInfo>>,
    upgrade: Arc<Mutex<UpgradeSlot>>,
    chunk_id: FrameId,
    done_id: FrameId,
    interval: Duration,
    version: String,
}

impl FirmwareWorker {
    async fn run(self, image: Vec<u8>) {
        let result = self.stream(&image).await;

        {
            let mut slot = self.upgrade.lock();
            slot.running = None;
            let mut info = self.info.write();
            info.is_dfu_in_progress = false;
            match result {
                Ok(()) => {
                    slot.finished = Some(self.version.clone());
                    info!(serial = ?info.serial, version = %self.version, "Firmware upgrade finished");
                }
                Err(e) => {
                    warn!(serial = ?info.serial, error = %e, "Firmware upgrade failed");
                    return;
                }
            }
        }

        tokio::time::sleep(REBOOT_GRACE).await;
        self.upgrade.lock().reboot(&self.info);
    }

    async fn stream(&self, image: &[u8]) -> HostResult<()> {
        for chunk in image.chunks(FIRMWARE_CHUNK_LEN) {
            self.bus.send(self.chunk_id, chunk.to_vec()).await?;
            if let Some(upgrade) = self.upgrade.lock().running.as_mut() {
                upgrade.sent += chunk.len();
            }
            tokio::time::sleep(self.interval).await;
        }
        let len = (image.len() as u32).to_le_bytes().to_vec();
        self.bus.send(self.done_id, len).await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::bus::VirtualBus;

    /// Connected bus plus a receiver that sees everything sent on it
    pub fn bus() -> (Arc<VirtualBus>, tokio::sync::broadcast::Receiver<CanFrame>) {
        let bus = Arc::new(VirtualBus::new("test"));
        bus.set_connected(true);
        let rx = bus.subscribe();
        (bus, rx)
    }

    pub fn info(serial: u32, device_id: u8) -> DeviceInfo {
        let mut info = DeviceInfo::new(DeviceType::Unknown);
        info.serial = Some(serial);
        info.device_id = Some(device_id);
        info
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{bus, info};
    use super::*;
    use pretty_assertions::assert_eq;

    fn core() -> (DeviceCore, tokio::sync::broadcast::Receiver<CanFrame>) {
        let (bus, rx) = bus();
        let core = DeviceCore::new(VendorModel::RangeFinder, bus, info(5, 3))
            .with_chunk_interval(Duration::from_millis(10))
            .with_upgraded_version("2.0.0");
        (core, rx)
    }

    #[tokio::test]
    async fn test_blink_sends_frame() {
        let (core, mut rx) = core();
        core.generic(GenericDeviceRequest::Blink {}).await.unwrap();
        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.id, FrameId::new(6, VENDOR_MANUFACTURER, api_class::BLINK, 0, 3));
    }

    #[tokio::test]
    async fn test_set_id_updates_snapshot() {
        let (core, mut rx) = core();
        core.generic(GenericDeviceRequest::SetId { id: 9 }).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().data, vec![9]);
        assert_eq!(core.info().device_id, Some(9));
        assert_eq!(core.frame_id(api_class::BLINK, 0).device_id, 9);
    }

    #[tokio::test]
    async fn test_set_name_splits_into_frames() {
        let (core, mut rx) = core();
        core.generic(GenericDeviceRequest::SetName {
            name: "front-left-lidar".into(),
        })
        .await
        .unwrap();
        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!((first.id.api_index, first.data), (0, b"front-le".to_vec()));
        assert_eq!((second.id.api_index, second.data), (1, b"ft-lidar".to_vec()));
        assert_eq!(core.info().name.as_deref(), Some("front-left-lidar"));
    }

    #[tokio::test]
    async fn test_upgrade_requires_dfu() {
        let (core, _rx) = core();
        let err = core
            .firmware(FirmwareUpgradeRequest::DoFieldUpgrade { data: vec![1; 16] })
            .await
            .unwrap_err();
        assert!(matches!(err, HostError::InvalidRequest(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_upgrade_progress_and_completion() {
        let (core, _rx) = core();
        assert_eq!(core.progress(), None);
        core.enter_dfu().await.unwrap();
        assert!(core.info().is_dfu);

        core.firmware(FirmwareUpgradeRequest::DoFieldUpgrade { data: vec![0xAB; 32] })
            .await
            .unwrap();
        assert!(core.info().is_dfu_in_progress);

        let busy = core
            .firmware(FirmwareUpgradeRequest::DoFieldUpgrade { data: vec![1] })
            .await
            .unwrap_err();
        assert!(matches!(busy, HostError::Busy(_)));

        tokio::time::sleep(Duration::from_millis(15)).await;
        let partial = core.progress().unwrap();
        assert!(partial > 0.0 && partial < 100.0);

        tokio::time::sleep(Duration::from_millis(100)).await;
        // Finished but still in DFU mode until the end is observed
        let info = core.info();
        assert!(info.is_dfu);
        assert!(!info.is_dfu_in_progress);

        assert_eq!(core.progress(), None);
        let info = core.info();
        assert!(!info.is_dfu);
        assert_eq!(info.firmware_version.as_deref(), Some("2.0.0"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unpolled_upgrade_reboots_after_grace() {
        let (core, _rx) = core();
        core.enter_dfu().await.unwrap();
        core.firmware(FirmwareUpgradeRequest::DoFieldUpgrade { data: vec![0xAB; 8] })
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(core.info().is_dfu);

        tokio::time::sleep(REBOOT_GRACE).await;
        let info = core.info();
        assert!(!info.is_dfu);
        assert_eq!(info.firmware_version.as_deref(), Some("2.0.0"));
    }
}
