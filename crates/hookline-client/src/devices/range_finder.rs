//! Range finder driver

use hookline_core::protocol::{
    RangeFinderRequest, RangeFinderResponse, RangeFinderStatus, RangingMode, Roi, TimingBudget,
};

use super::{FirmwareUpgrade, GenericDevice};
use crate::error::ClientResult;
use crate::router::{expect_response, DeviceHandle};
use crate::validate;

/// Driver for the `RangeFinder` device class
#[derive(Debug, Clone)]
pub struct RangeFinder {
    handle: DeviceHandle,
}

impl RangeFinder {
    pub const DEVICE_CLASS: &'static str = "RangeFinder";

    pub fn new(handle: DeviceHandle) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &DeviceHandle {
        &self.handle
    }

    pub fn generic(&self) -> GenericDevice<'_, RangeFinderRequest> {
        GenericDevice::new(&self.handle)
    }

    pub fn firmware(&self) -> FirmwareUpgrade<'_, RangeFinderRequest> {
        FirmwareUpgrade::new(&self.handle)
    }

    /// Reboot into DFU mode
    pub async fn start_field_upgrade(&self) -> ClientResult<()> {
        let rsp = self.handle.call(RangeFinderRequest::StartFieldUpgrade {}).await?;
        expect_response!(rsp, RangeFinderResponse::StartFieldUpgrade, "start_field_upgrade")
    }

    pub async fn set_range(&self, mode: RangingMode) -> ClientResult<()> {
        let rsp = self.handle.call(RangeFinderRequest::SetRange { mode }).await?;
        expect_response!(rsp, RangeFinderResponse::SetRange, "set_range")
    }

    /// Set the region of interest. Invalid geometry is rejected locally.
    pub async fn set_roi(&self, roi: Roi) -> ClientResult<()> {
        validate::roi(&roi)?;
        let rsp = self.handle.call(RangeFinderRequest::SetRoi { roi }).await?;
        expect_response!(rsp, RangeFinderResponse::SetRoi, "set_roi")
    }

    pub async fn set_timing_budget(&self, budget: TimingBudget) -> ClientResult<()> {
        let rsp = self
            .handle
            .call(RangeFinderRequest::SetTimingBudget { budget })
            .await?;
        expect_response!(rsp, RangeFinderResponse::SetTimingBudget, "set_timing_budget")
    }

    pub async fn status(&self) -> ClientResult<RangeFinderStatus> {
        let rsp = self.handle.call(RangeFinderRequest::Status {}).await?;
        expect_response!(rsp, RangeFinderResponse::Status, "status")
    }
}
