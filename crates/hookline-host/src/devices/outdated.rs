//! A device whose firmware is too old for its regular protocol
//!
//! It only answers identification, an explanation of what is wrong and the
//! firmware upgrade path.

use async_trait::async_trait;
use hookline_core::protocol::{OutdatedFirmwareRequest, OutdatedFirmwareResponse};
use hookline_core::{decode_request, encode, DeviceInfo};
use serde_json::Value;

use super::{DeviceCore, DeviceHandler};
use crate::error::HostResult;

pub struct OutdatedFirmwareDevice {
    core: DeviceCore,
    firmware_url: Option<String>,
}

impl OutdatedFirmwareDevice {
    pub const DEVICE_CLASS: &'static str = "OutdatedFirmware";

    pub fn new(core: DeviceCore, firmware_url: Option<String>) -> Self {
        Self { core, firmware_url }
    }

    /// Why the regular protocol is unavailable
    fn error(&self) -> String {
        let info = self.core.info();
        format!(
            "{} firmware {} is not supported, upgrade required",
            self.core.model(),
            info.firmware_version.as_deref().unwrap_or("unknown")
        )
    }

    async fn handle(&self, request: OutdatedFirmwareRequest) -> HostResult<OutdatedFirmwareResponse> {
        Ok(match request {
            OutdatedFirmwareRequest::StartFieldUpgrade {} => {
                self.core.enter_dfu().await?;
                OutdatedFirmwareResponse::StartFieldUpgrade(())
            }
            OutdatedFirmwareRequest::GetError {} => OutdatedFirmwareResponse::GetError(self.error()),
            OutdatedFirmwareRequest::GetFirmwareUrl {} => {
                OutdatedFirmwareResponse::GetFirmwareUrl(self.firmware_url.clone())
            }
            OutdatedFirmwareRequest::Generic { msg } => {
                OutdatedFirmwareResponse::Generic(self.core.generic(msg).await?)
            }
            OutdatedFirmwareRequest::Firmware { msg } => {
                OutdatedFirmwareResponse::Firmware(self.core.firmware(msg).await?)
            }
        })
    }
}

#[async_trait]
impl DeviceHandler for OutdatedFirmwareDevice {
    fn device_class(&self) -> &'static str {
        Self::DEVICE_CLASS
    }

    fn info(&self) -> DeviceInfo {
        self.core.info()
    }

    async fn rpc_call(&self, data: Value) -> HostResult<Value> {
        let request = decode_request::<OutdatedFirmwareRequest>(data)?;
        let response = self.handle(request).await?;
        Ok(encode(&response)?)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{bus, info};
    use super::*;
    use hookline_core::VendorModel;
    use serde_json::json;

    #[tokio::test]
    async fn test_error_and_url() {
        let (bus, _rx) = bus();
        let mut info = info(9, 4);
        info.firmware_version = Some("0.9.1".into());
        let device = OutdatedFirmwareDevice::new(
            DeviceCore::new(VendorModel::RangeFinder, bus, info),
            Some("https://example.com/fw/range-finder.bin".into()),
        );

        let rsp = device.rpc_call(json!({"method": "get_error", "data": {}})).await.unwrap();
        assert_eq!(
            rsp["data"],
            json!("RangeFinder firmware 0.9.1 is not supported, upgrade required")
        );
        let rsp = device
            .rpc_call(json!({"method": "get_firmware_url", "data": {}}))
            .await
            .unwrap();
        assert_eq!(rsp["data"], json!("https://example.com/fw/range-finder.bin"));
    }

    #[tokio::test]
    async fn test_unknown_method_is_decode_error() {
        let (bus, _rx) = bus();
        let device = OutdatedFirmwareDevice::new(DeviceCore::new(VendorModel::PowerHub, bus, info(9, 4)), None);
        let err = device
            .rpc_call(json!({"method": "set_range", "data": {"mode": "Long"}}))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::HostError::Rpc(hookline_core::RpcError::Decode(_))));
    }
}
