//! CAN bridge driver: capture source and raw frame sink

use async_trait::async_trait;
use hookline_core::protocol::{CanBridgeRequest, CanBridgeResponse, CanBridgeStatus};
use hookline_core::{Filter, FrameId, MailboxItem};

use super::GenericDevice;
use crate::capture::CaptureSource;
use crate::error::ClientResult;
use crate::replay::FrameSink;
use crate::router::{expect_response, DeviceHandle};

/// Driver for the `CanBridge` device class
#[derive(Debug, Clone)]
pub struct CanBridge {
    handle: DeviceHandle,
}

impl CanBridge {
    pub const DEVICE_CLASS: &'static str = "CanBridge";

    pub fn new(handle: DeviceHandle) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &DeviceHandle {
        &self.handle
    }

    pub fn generic(&self) -> GenericDevice<'_, CanBridgeRequest> {
        GenericDevice::new(&self.handle)
    }

    pub async fn status(&self) -> ClientResult<CanBridgeStatus> {
        let rsp = self.handle.call(CanBridgeRequest::Status {}).await?;
        expect_response!(rsp, CanBridgeResponse::Status, "status")
    }
}

#[async_trait]
impl CaptureSource for CanBridge {
    async fn set_log_enabled(&self, enabled: bool) -> ClientResult<()> {
        let rsp = self
            .handle
            .call(CanBridgeRequest::SetLogEnabled { enabled })
            .await?;
        expect_response!(rsp, CanBridgeResponse::SetLogEnabled, "set_log_enabled")
    }

    async fn clear(&self) -> ClientResult<()> {
        let rsp = self.handle.call(CanBridgeRequest::Clear {}).await?;
        expect_response!(rsp, CanBridgeResponse::Clear, "clear")
    }

    async fn read_after(&self, seq: u64) -> ClientResult<Vec<MailboxItem>> {
        let rsp = self.handle.call(CanBridgeRequest::ReadAfter { seq }).await?;
        expect_response!(rsp, CanBridgeResponse::ReadAfter, "read_after")
    }

    async fn set_filters(&self, filters: Vec<Filter>) -> ClientResult<()> {
        let rsp = self
            .handle
            .call(CanBridgeRequest::SetFilters { filters })
            .await?;
        expect_response!(rsp, CanBridgeResponse::SetFilters, "set_filters")
    }
}

#[async_trait]
impl FrameSink for CanBridge {
    async fn send_raw(&self, id: FrameId, data: Vec<u8>) -> ClientResult<()> {
        let rsp = self
            .handle
            .call(CanBridgeRequest::SendRaw { id, data })
            .await?;
        expect_response!(rsp, CanBridgeResponse::SendRaw, "send_raw")
    }
}
