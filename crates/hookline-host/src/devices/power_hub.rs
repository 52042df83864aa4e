//! Power distribution hub

use async_trait::async_trait;
use hookline_core::protocol::{
    api_class, ChannelKind, ChannelState, PowerHubRequest, PowerHubResponse, PowerHubStatus,
    ADJUSTABLE_MAX_MV, ADJUSTABLE_MIN_MV,
};
use hookline_core::{decode_request, encode, DeviceInfo};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use super::{DeviceCore, DeviceHandler};
use crate::error::{HostError, HostResult};

/// Output voltage of fixed and switchable channels
const RAIL_MV: u16 = 12_000;

/// Channel layout of the hub: two fixed, four switchable, two adjustable
pub fn default_channels() -> Vec<ChannelState> {
    let channel = |kind, enabled| ChannelState {
        kind,
        enabled,
        voltage_mv: if enabled { RAIL_MV } else { 0 },
        voltage_setpoint_mv: if kind == ChannelKind::Adjustable { ADJUSTABLE_MIN_MV } else { 0 },
        current_ma: 0,
    };
    let mut channels = vec![channel(ChannelKind::Fixed, true); 2];
    channels.extend(vec![channel(ChannelKind::Switchable, false); 4]);
    channels.extend(vec![channel(ChannelKind::Adjustable, false); 2]);
    channels
}

pub struct PowerHubDevice {
    core: DeviceCore,
    channels: RwLock<Vec<ChannelState>>,
}

impl PowerHubDevice {
    pub const DEVICE_CLASS: &'static str = "PowerHub";

    pub fn new(core: DeviceCore) -> Self {
        Self {
            core,
            channels: RwLock::new(default_channels()),
        }
    }

    fn channel_kind(&self, channel: u8) -> HostResult<ChannelKind> {
        self.channels
            .read()
            .get(channel as usize)
            .map(|c| c.kind)
            .ok_or_else(|| HostError::invalid(format!("No channel {}", channel)))
    }

    async fn handle(&self, request: PowerHubRequest) -> HostResult<PowerHubResponse> {
        Ok(match request {
            PowerHubRequest::StartFieldUpgrade {} => {
                self.core.enter_dfu().await?;
                PowerHubResponse::StartFieldUpgrade(())
            }
            PowerHubRequest::SetSwitchableChannel { channel, enabled } => {
                if self.channel_kind(channel)? != ChannelKind::Switchable {
                    return Err(HostError::invalid(format!("Channel {} is not switchable", channel)));
                }
                self.core
                    .send(api_class::CONFIGURE, channel, vec![enabled as u8])
                    .await?;
                if let Some(state) = self.channels.write().get_mut(channel as usize) {
                    state.enabled = enabled;
                    state.voltage_mv = if enabled { RAIL_MV } else { 0 };
                }
                debug!(channel, enabled, "Switchable channel set");
                PowerHubResponse::SetSwitchableChannel(())
            }
            PowerHubRequest::SetAdjustableChannel {
                channel,
                enabled,
                voltage_mv,
            } => {
                if self.channel_kind(channel)? != ChannelKind::Adjustable {
                    return Err(HostError::invalid(format!("Channel {} is not adjustable", channel)));
                }
                if enabled && !(ADJUSTABLE_MIN_MV..=ADJUSTABLE_MAX_MV).contains(&voltage_mv) {
                    return Err(HostError::invalid(format!(
                        "Voltage {} mV is outside {}-{} mV",
                        voltage_mv, ADJUSTABLE_MIN_MV, ADJUSTABLE_MAX_MV
                    )));
                }
                let mut data = vec![enabled as u8];
                data.extend_from_slice(&voltage_mv.to_le_bytes());
                self.core.send(api_class::CONFIGURE, channel, data).await?;
                if let Some(state) = self.channels.write().get_mut(channel as usize) {
                    state.enabled = enabled;
                    state.voltage_setpoint_mv = voltage_mv;
                    state.voltage_mv = if enabled { voltage_mv } else { 0 };
                }
                PowerHubResponse::SetAdjustableChannel(())
            }
            PowerHubRequest::Status {} => {
                let channels = self.channels.read().clone();
                PowerHubResponse::Status(PowerHubStatus { channels })
            }
            PowerHubRequest::Generic { msg } => PowerHubResponse::Generic(self.core.generic(msg).await?),
            PowerHubRequest::Firmware { msg } => PowerHubResponse::Firmware(self.core.firmware(msg).await?),
        })
    }
}

#[async_trait]
impl DeviceHandler for PowerHubDevice {
    fn device_class(&self) -> &'static str {
        Self::DEVICE_CLASS
    }

    fn info(&self) -> DeviceInfo {
        self.core.info()
    }

    async fn rpc_call(&self, data: Value) -> HostResult<Value> {
        let request = decode_request::<PowerHubRequest>(data)?;
        let response = self.handle(request).await?;
        Ok(encode(&response)?)
    }
}
