//! CAN pass-through bridge
//!
//! The bridge sees every frame on its bus and keeps the capture log that
//! clients mirror. It also puts raw frames on the bus for replay.

use async_trait::async_trait;
use hookline_core::protocol::{CanBridgeRequest, CanBridgeResponse};
use hookline_core::{decode_request, encode, CanFrame, DeviceInfo};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info};

use super::{DeviceCore, DeviceHandler};
use crate::capture_log::CaptureLog;
use crate::decode::decode_frame;
use crate::error::HostResult;

pub struct CanBridgeDevice {
    core: DeviceCore,
    log: Mutex<CaptureLog>,
}

impl CanBridgeDevice {
    pub const DEVICE_CLASS: &'static str = "CanBridge";

    pub fn new(core: DeviceCore, max_mailbox: usize) -> Self {
        Self {
            core,
            log: Mutex::new(CaptureLog::new(max_mailbox)),
        }
    }

    async fn handle(&self, request: CanBridgeRequest) -> HostResult<CanBridgeResponse> {
        Ok(match request {
            CanBridgeRequest::SetLogEnabled { enabled } => {
                self.log.lock().set_enabled(enabled);
                info!(enabled, "Bridge capture log toggled");
                CanBridgeResponse::SetLogEnabled(())
            }
            CanBridgeRequest::Clear {} => {
                self.log.lock().clear();
                CanBridgeResponse::Clear(())
            }
            CanBridgeRequest::ReadAfter { seq } => {
                let items = self.log.lock().read_after(seq);
                CanBridgeResponse::ReadAfter(items)
            }
            CanBridgeRequest::SetFilters { filters } => {
                debug!(count = filters.len(), "Bridge filters replaced");
                self.log.lock().set_filters(filters);
                CanBridgeResponse::SetFilters(())
            }
            CanBridgeRequest::SendRaw { id, data } => {
                self.core.bus().send(id, data).await?;
                CanBridgeResponse::SendRaw(())
            }
            CanBridgeRequest::Status {} => {
                let status = self.log.lock().status();
                CanBridgeResponse::Status(status)
            }
            CanBridgeRequest::Generic { msg } => CanBridgeResponse::Generic(self.core.generic(msg).await?),
        })
    }
}

#[async_trait]
impl DeviceHandler for CanBridgeDevice {
    fn device_class(&self) -> &'static str {
        Self::DEVICE_CLASS
    }

    fn info(&self) -> DeviceInfo {
        self.core.info()
    }

    async fn rpc_call(&self, data: Value) -> HostResult<Value> {
        let request = decode_request::<CanBridgeRequest>(data)?;
        let response = self.handle(request).await?;
        Ok(encode(&response)?)
    }

    fn on_frame(&self, frame: &CanFrame) {
        let decoded = decode_frame(frame);
        self.log.lock().record(frame.clone(), decoded);
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{bus, info};
    use super::*;
    use hookline_core::{Filter, FrameId, VendorModel};
    use pretty_assertions::assert_eq;

    fn bridge() -> (CanBridgeDevice, tokio::sync::broadcast::Receiver<CanFrame>) {
        let (bus, rx) = bus();
        let core = DeviceCore::new(VendorModel::CanBridge, bus, info(1, 0));
        (CanBridgeDevice::new(core, 16), rx)
    }

    #[tokio::test]
    async fn test_send_raw_loops_back_into_log() {
        let (bridge, mut rx) = bridge();
        bridge.handle(CanBridgeRequest::SetLogEnabled { enabled: true }).await.unwrap();

        let id = FrameId::new(8, 6, 1, 2, 7);
        bridge
            .handle(CanBridgeRequest::SendRaw { id, data: vec![1, 2, 3] })
            .await
            .unwrap();
        // The provider pump delivers bus traffic; do it by hand here
        let frame = rx.recv().await.unwrap();
        bridge.on_frame(&frame);

        let CanBridgeResponse::ReadAfter(items) = bridge.handle(CanBridgeRequest::ReadAfter { seq: 0 }).await.unwrap()
        else {
            panic!("unexpected response");
        };
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].seq, 1);
        assert_eq!(items[0].raw.id, id);
        assert_eq!(items[0].decoded.as_ref().unwrap()["model"], "PowerHub");
    }

    #[tokio::test]
    async fn test_filters_and_status() {
        let (bridge, _rx) = bridge();
        bridge.handle(CanBridgeRequest::SetLogEnabled { enabled: true }).await.unwrap();
        bridge
            .handle(CanBridgeRequest::SetFilters {
                filters: vec![Filter::DecodedOnly],
            })
            .await
            .unwrap();

        bridge.on_frame(&CanFrame::new(FrameId::new(2, 1, 0, 0, 0), 0, vec![]));
        bridge.on_frame(&CanFrame::new(FrameId::new(6, 6, 1, 0, 0), 0, vec![]));

        let CanBridgeResponse::Status(status) = bridge.handle(CanBridgeRequest::Status {}).await.unwrap() else {
            panic!("unexpected response");
        };
        assert_eq!(status.frames_seen, 2);
        assert_eq!(status.buffered, 1);
        assert_eq!(status.last_seq, 1);
        assert_eq!(status.filters, vec![Filter::DecodedOnly]);
    }
}
