//! Power hub driver

use hookline_core::protocol::{PowerHubRequest, PowerHubResponse, PowerHubStatus};

use super::{FirmwareUpgrade, GenericDevice};
use crate::error::ClientResult;
use crate::router::{expect_response, DeviceHandle};
use crate::validate;

/// Driver for the `PowerHub` device class
#[derive(Debug, Clone)]
pub struct PowerHub {
    handle: DeviceHandle,
}

impl PowerHub {
    pub const DEVICE_CLASS: &'static str = "PowerHub";

    pub fn new(handle: DeviceHandle) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &DeviceHandle {
        &self.handle
    }

    pub fn generic(&self) -> GenericDevice<'_, PowerHubRequest> {
        GenericDevice::new(&self.handle)
    }

    pub fn firmware(&self) -> FirmwareUpgrade<'_, PowerHubRequest> {
        FirmwareUpgrade::new(&self.handle)
    }

    pub async fn start_field_upgrade(&self) -> ClientResult<()> {
        let rsp = self.handle.call(PowerHubRequest::StartFieldUpgrade {}).await?;
        expect_response!(rsp, PowerHubResponse::StartFieldUpgrade, "start_field_upgrade")
    }

    pub async fn set_switchable_channel(&self, channel: u8, enabled: bool) -> ClientResult<()> {
        let rsp = self
            .handle
            .call(PowerHubRequest::SetSwitchableChannel { channel, enabled })
            .await?;
        expect_response!(rsp, PowerHubResponse::SetSwitchableChannel, "set_switchable_channel")
    }

    /// Set an adjustable channel. Setpoints outside 15-24 V are rejected locally.
    pub async fn set_adjustable_channel(
        &self,
        channel: u8,
        enabled: bool,
        voltage_mv: u16,
    ) -> ClientResult<()> {
        validate::adjustable_voltage(enabled, voltage_mv)?;
        let rsp = self
            .handle
            .call(PowerHubRequest::SetAdjustableChannel {
                channel,
                enabled,
                voltage_mv,
            })
            .await?;
        expect_response!(rsp, PowerHubResponse::SetAdjustableChannel, "set_adjustable_channel")
    }

    pub async fn status(&self) -> ClientResult<PowerHubStatus> {
        let rsp = self.handle.call(PowerHubRequest::Status {}).await?;
        expect_response!(rsp, PowerHubResponse::Status, "status")
    }
}
