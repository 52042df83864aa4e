//! Time-of-flight range finder

use async_trait::async_trait;
use hookline_core::protocol::{
    api_class, RangeFinderRequest, RangeFinderResponse, RangeFinderStatus, RangeMeasurement,
    RangingMode, Roi, TimingBudget,
};
use hookline_core::{decode_request, encode, CanFrame, DeviceInfo};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use super::{DeviceCore, DeviceHandler};
use crate::error::HostResult;

/// Configure frame indices
const CONFIGURE_RANGE: u8 = 0;
const CONFIGURE_ROI: u8 = 1;
const CONFIGURE_BUDGET: u8 = 2;

#[derive(Debug, Clone)]
struct Settings {
    mode: RangingMode,
    roi: Roi,
    budget: TimingBudget,
}

pub struct RangeFinderDevice {
    core: DeviceCore,
    settings: RwLock<Settings>,
    last_update: RwLock<Option<RangeMeasurement>>,
}

impl RangeFinderDevice {
    pub const DEVICE_CLASS: &'static str = "RangeFinder";

    pub fn new(core: DeviceCore) -> Self {
        Self {
            core,
            settings: RwLock::new(Settings {
                mode: RangingMode::Short,
                roi: Roi::default(),
                budget: TimingBudget::Tb33ms,
            }),
            last_update: RwLock::new(None),
        }
    }

    pub fn core(&self) -> &DeviceCore {
        &self.core
    }

    async fn handle(&self, request: RangeFinderRequest) -> HostResult<RangeFinderResponse> {
        Ok(match request {
            RangeFinderRequest::StartFieldUpgrade {} => {
                self.core.enter_dfu().await?;
                RangeFinderResponse::StartFieldUpgrade(())
            }
            RangeFinderRequest::SetRange { mode } => {
                let byte = match mode {
                    RangingMode::Short => 0,
                    RangingMode::Long => 1,
                };
                self.core.send(api_class::CONFIGURE, CONFIGURE_RANGE, vec![byte]).await?;
                self.settings.write().mode = mode;
                RangeFinderResponse::SetRange(())
            }
            RangeFinderRequest::SetRoi { roi } => {
                self.core
                    .send(api_class::CONFIGURE, CONFIGURE_ROI, vec![roi.x, roi.y, roi.w, roi.h])
                    .await?;
                self.settings.write().roi = roi;
                RangeFinderResponse::SetRoi(())
            }
            RangeFinderRequest::SetTimingBudget { budget } => {
                self.core
                    .send(api_class::CONFIGURE, CONFIGURE_BUDGET, vec![budget.millis()])
                    .await?;
                self.settings.write().budget = budget;
                RangeFinderResponse::SetTimingBudget(())
            }
            RangeFinderRequest::Status {} => {
                let last_update = self.last_update.read().clone();
                RangeFinderResponse::Status(RangeFinderStatus { last_update })
            }
            RangeFinderRequest::Generic { msg } => RangeFinderResponse::Generic(self.core.generic(msg).await?),
            RangeFinderRequest::Firmware { msg } => RangeFinderResponse::Firmware(self.core.firmware(msg).await?),
        })
    }
}

#[async_trait]
impl DeviceHandler for RangeFinderDevice {
    fn device_class(&self) -> &'static str {
        Self::DEVICE_CLASS
    }

    fn info(&self) -> DeviceInfo {
        self.core.info()
    }

    async fn rpc_call(&self, data: Value) -> HostResult<Value> {
        let request = decode_request::<RangeFinderRequest>(data)?;
        let response = self.handle(request).await?;
        Ok(encode(&response)?)
    }

    fn on_frame(&self, frame: &CanFrame) {
        if frame.id.api_class != api_class::STATUS || !self.core.owns(frame) {
            return;
        }
        let roi = self.settings.read().roi;
        if let Some(measurement) = RangeMeasurement::from_frame_data(&frame.data, roi) {
            debug!(distance_mm = measurement.distance_mm, "Range update");
            *self.last_update.write() = Some(measurement);
        }
    }
}
