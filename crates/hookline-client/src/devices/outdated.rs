//! Driver for devices running unsupported firmware

use hookline_core::protocol::{OutdatedFirmwareRequest, OutdatedFirmwareResponse};

use super::{FirmwareUpgrade, GenericDevice};
use crate::error::ClientResult;
use crate::router::{expect_response, DeviceHandle};

/// Driver for the `OutdatedFirmware` device class
#[derive(Debug, Clone)]
pub struct OutdatedFirmware {
    handle: DeviceHandle,
}

impl OutdatedFirmware {
    pub const DEVICE_CLASS: &'static str = "OutdatedFirmware";

    pub fn new(handle: DeviceHandle) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &DeviceHandle {
        &self.handle
    }

    pub fn generic(&self) -> GenericDevice<'_, OutdatedFirmwareRequest> {
        GenericDevice::new(&self.handle)
    }

    pub fn firmware(&self) -> FirmwareUpgrade<'_, OutdatedFirmwareRequest> {
        FirmwareUpgrade::new(&self.handle)
    }

    pub async fn start_field_upgrade(&self) -> ClientResult<()> {
        let rsp = self
            .handle
            .call(OutdatedFirmwareRequest::StartFieldUpgrade {})
            .await?;
        expect_response!(rsp, OutdatedFirmwareResponse::StartFieldUpgrade, "start_field_upgrade")
    }

    /// Why the firmware is not supported
    pub async fn error(&self) -> ClientResult<String> {
        let rsp = self.handle.call(OutdatedFirmwareRequest::GetError {}).await?;
        expect_response!(rsp, OutdatedFirmwareResponse::GetError, "get_error")
    }

    pub async fn firmware_url(&self) -> ClientResult<Option<String>> {
        let rsp = self
            .handle
            .call(OutdatedFirmwareRequest::GetFirmwareUrl {})
            .await?;
        expect_response!(rsp, OutdatedFirmwareResponse::GetFirmwareUrl, "get_firmware_url")
    }
}
