//! Typed drivers for each known device class
//!
//! A driver wraps a [`DeviceHandle`] and speaks one device protocol. The
//! generic and firmware-upgrade sub-protocols are shared through
//! [`GenericDevice`] and [`FirmwareUpgrade`], which work with any device
//! protocol that tunnels them.

mod can_bridge;
mod outdated;
mod power_hub;
mod range_finder;

pub use can_bridge::CanBridge;
pub use outdated::OutdatedFirmware;
pub use power_hub::PowerHub;
pub use range_finder::RangeFinder;

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use hookline_core::protocol::{
    FirmwareUpgradeRequest, FirmwareUpgradeResponse, GenericDeviceRequest, GenericDeviceResponse,
    Tunnel,
};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::error::ClientResult;
use crate::poll::PollTask;
use crate::report::Reporter;
use crate::router::{expect_response, DeviceHandle};
use crate::validate;

// =============================================================================
// Generic device sub-protocol
// =============================================================================

/// Identification and persistence operations, tunnelled through protocol `P`
pub struct GenericDevice<'a, P> {
    handle: &'a DeviceHandle,
    _protocol: PhantomData<fn() -> P>,
}

impl<'a, P: Tunnel<GenericDeviceRequest>> GenericDevice<'a, P> {
    pub fn new(handle: &'a DeviceHandle) -> Self {
        Self {
            handle,
            _protocol: PhantomData,
        }
    }

    async fn call(&self, msg: GenericDeviceRequest) -> ClientResult<GenericDeviceResponse> {
        self.handle.tunnel::<P, _>(msg).await
    }

    /// Flash the status light
    pub async fn blink(&self) -> ClientResult<()> {
        let rsp = self.call(GenericDeviceRequest::Blink {}).await?;
        expect_response!(rsp, GenericDeviceResponse::Blink, "blink")
    }

    /// Change the CAN id. Rejected locally above 0x3E.
    pub async fn set_id(&self, id: u8) -> ClientResult<()> {
        validate::device_id(id)?;
        let rsp = self.call(GenericDeviceRequest::SetId { id }).await?;
        expect_response!(rsp, GenericDeviceResponse::SetId, "set_id")
    }

    /// Change the stored name. Rejected locally above 16 characters.
    pub async fn set_name(&self, name: &str) -> ClientResult<()> {
        validate::device_name(name)?;
        let rsp = self
            .call(GenericDeviceRequest::SetName {
                name: name.to_string(),
            })
            .await?;
        expect_response!(rsp, GenericDeviceResponse::SetName, "set_name")
    }

    /// Persist id and name. Independent of the calls that changed them.
    pub async fn commit_to_eeprom(&self) -> ClientResult<()> {
        let rsp = self.call(GenericDeviceRequest::CommitToEeprom {}).await?;
        expect_response!(rsp, GenericDeviceResponse::CommitToEeprom, "commit_to_eeprom")
    }
}

// =============================================================================
// Firmware-upgrade sub-protocol
// =============================================================================

/// Firmware upgrade of a device in DFU mode, tunnelled through protocol `P`
pub struct FirmwareUpgrade<'a, P> {
    handle: &'a DeviceHandle,
    _protocol: PhantomData<fn() -> P>,
}

impl<'a, P> FirmwareUpgrade<'a, P>
where
    P: Tunnel<FirmwareUpgradeRequest> + 'static,
{
    pub fn new(handle: &'a DeviceHandle) -> Self {
        Self {
            handle,
            _protocol: PhantomData,
        }
    }

    /// Percent complete, `None` when no upgrade is running
    pub async fn progress(&self) -> ClientResult<Option<f64>> {
        progress::<P>(self.handle).await
    }

    /// Start streaming `data` to the device
    pub async fn do_field_upgrade(&self, data: Vec<u8>) -> ClientResult<()> {
        validate::firmware_image(&data)?;
        info!(device = %self.handle.device_id(), bytes = data.len(), "Starting field upgrade");
        let rsp = self
            .handle
            .tunnel::<P, _>(FirmwareUpgradeRequest::DoFieldUpgrade { data })
            .await?;
        expect_response!(rsp, FirmwareUpgradeResponse::DoFieldUpgrade, "do_field_upgrade")
    }

    /// Poll until the device reports no upgrade running
    ///
    /// `on_progress` sees every percentage reported along the way.
    pub async fn wait_for_completion<F>(&self, interval: Duration, mut on_progress: F) -> ClientResult<()>
    where
        F: FnMut(f64),
    {
        loop {
            match self.progress().await? {
                Some(percent) => {
                    debug!(percent, "Upgrade progress");
                    on_progress(percent);
                }
                None => return Ok(()),
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// Poll progress in the background
    ///
    /// Failed polls go to `reporter` and polling continues. Dropping the
    /// returned [`ProgressWatch`] stops the poller.
    pub fn watch_progress(&self, interval: Duration, reporter: Arc<dyn Reporter>) -> ProgressWatch {
        let (tx, rx) = watch::channel(None);
        let tx = Arc::new(tx);
        let handle = self.handle.clone();
        let task = PollTask::spawn(interval, move || {
            let handle = handle.clone();
            let tx = tx.clone();
            let reporter = reporter.clone();
            async move {
                match progress::<P>(&handle).await {
                    Ok(value) => {
                        tx.send_replace(value);
                    }
                    Err(e) => reporter.report("firmware progress", &e),
                }
                !tx.is_closed()
            }
        });
        ProgressWatch { rx, _task: task }
    }
}

async fn progress<P: Tunnel<FirmwareUpgradeRequest>>(handle: &DeviceHandle) -> ClientResult<Option<f64>> {
    let rsp = handle
        .tunnel::<P, _>(FirmwareUpgradeRequest::Progress {})
        .await?;
    expect_response!(rsp, FirmwareUpgradeResponse::Progress, "progress")
}

/// Latest firmware progress seen by a background poller
pub struct ProgressWatch {
    rx: watch::Receiver<Option<f64>>,
    _task: PollTask,
}

impl ProgressWatch {
    /// Most recent value (last write wins)
    pub fn latest(&self) -> Option<f64> {
        *self.rx.borrow()
    }

    /// Receiver notified on every completed poll
    pub fn subscribe(&self) -> watch::Receiver<Option<f64>> {
        self.rx.clone()
    }
}
