//! Power distribution module protocol

use serde::{Deserialize, Serialize};

use super::{FirmwareUpgradeRequest, FirmwareUpgradeResponse, GenericDeviceRequest, GenericDeviceResponse};

/// Lowest setpoint of an adjustable channel
pub const ADJUSTABLE_MIN_MV: u16 = 15_000;
/// Highest setpoint of an adjustable channel
pub const ADJUSTABLE_MAX_MV: u16 = 24_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelKind {
    /// Always on
    Fixed,
    /// Can be turned on and off
    Switchable,
    /// Can be turned on and off, with a voltage setpoint
    Adjustable,
}

/// Live state of one output channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelState {
    pub kind: ChannelKind,
    pub enabled: bool,
    pub voltage_mv: u16,
    /// Only meaningful for adjustable channels
    pub voltage_setpoint_mv: u16,
    pub current_ma: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerHubStatus {
    pub channels: Vec<ChannelState>,
}

crate::rpc_protocol! {
    /// Requests understood by a power hub
    pub PowerHubRequest => PowerHubResponse {
        StartFieldUpgrade "start_field_upgrade" {} -> ();
        SetSwitchableChannel "set_switchable_channel" { channel: u8, enabled: bool } -> ();
        SetAdjustableChannel "set_adjustable_channel" { channel: u8, enabled: bool, voltage_mv: u16 } -> ();
        Status "status" {} -> PowerHubStatus;
        Generic "generic" { msg: GenericDeviceRequest } -> GenericDeviceResponse;
        Firmware "firmware" { msg: FirmwareUpgradeRequest } -> FirmwareUpgradeResponse;
    }
}

super::tunnel!(PowerHubRequest => PowerHubResponse::Generic(GenericDeviceRequest));
super::tunnel!(PowerHubRequest => PowerHubResponse::Firmware(FirmwareUpgradeRequest));
