//! Time-of-flight distance sensor protocol

use serde::{Deserialize, Serialize};

use super::{FirmwareUpgradeRequest, FirmwareUpgradeResponse, GenericDeviceRequest, GenericDeviceResponse};

/// Side length of the sensor's SPAD grid
pub const ROI_GRID: u8 = 16;

/// Ranging distance mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RangingMode {
    Short,
    Long,
}

/// Integration time per measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimingBudget {
    #[serde(rename = "TB20ms")]
    Tb20ms,
    #[serde(rename = "TB33ms")]
    Tb33ms,
    #[serde(rename = "TB50ms")]
    Tb50ms,
    #[serde(rename = "TB100ms")]
    Tb100ms,
}

impl TimingBudget {
    pub fn millis(&self) -> u8 {
        match self {
            TimingBudget::Tb20ms => 20,
            TimingBudget::Tb33ms => 33,
            TimingBudget::Tb50ms => 50,
            TimingBudget::Tb100ms => 100,
        }
    }

    pub fn from_millis(ms: u8) -> Option<Self> {
        match ms {
            20 => Some(TimingBudget::Tb20ms),
            33 => Some(TimingBudget::Tb33ms),
            50 => Some(TimingBudget::Tb50ms),
            100 => Some(TimingBudget::Tb100ms),
            _ => None,
        }
    }
}

/// Region of interest on the SPAD grid, given by centre and size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub x: u8,
    pub y: u8,
    pub w: u8,
    pub h: u8,
}

impl Default for Roi {
    fn default() -> Self {
        Self {
            x: 8,
            y: 8,
            w: 16,
            h: 16,
        }
    }
}

/// One measurement reported by the sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeMeasurement {
    /// Sensor status code (0 = valid)
    pub status: u8,
    pub distance_mm: u16,
    pub ambient: u16,
    pub mode: RangingMode,
    pub budget: TimingBudget,
    pub roi: Roi,
}

impl RangeMeasurement {
    /// Decode a status frame payload: status, distance (LE), ambient (LE),
    /// mode, budget in ms. The ROI is not carried on the bus.
    pub fn from_frame_data(data: &[u8], roi: Roi) -> Option<Self> {
        if data.len() < 7 {
            return None;
        }
        Some(Self {
            status: data[0],
            distance_mm: u16::from_le_bytes([data[1], data[2]]),
            ambient: u16::from_le_bytes([data[3], data[4]]),
            mode: if data[5] == 0 {
                RangingMode::Short
            } else {
                RangingMode::Long
            },
            budget: TimingBudget::from_millis(data[6])?,
            roi,
        })
    }

    pub fn to_frame_data(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(7);
        data.push(self.status);
        data.extend_from_slice(&self.distance_mm.to_le_bytes());
        data.extend_from_slice(&self.ambient.to_le_bytes());
        data.push(match self.mode {
            RangingMode::Short => 0,
            RangingMode::Long => 1,
        });
        data.push(self.budget.millis());
        data
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeFinderStatus {
    pub last_update: Option<RangeMeasurement>,
}

crate::rpc_protocol! {
    /// Requests understood by a range finder
    pub RangeFinderRequest => RangeFinderResponse {
        /// Reboot into DFU mode
        StartFieldUpgrade "start_field_upgrade" {} -> ();
        SetRange "set_range" { mode: RangingMode } -> ();
        SetRoi "set_roi" { roi: Roi } -> ();
        SetTimingBudget "set_timing_budget" { budget: TimingBudget } -> ();
        Status "status" {} -> RangeFinderStatus;
        Generic "generic" { msg: GenericDeviceRequest } -> GenericDeviceResponse;
        Firmware "firmware" { msg: FirmwareUpgradeRequest } -> FirmwareUpgradeResponse;
    }
}

super::tunnel!(RangeFinderRequest => RangeFinderResponse::Generic(GenericDeviceRequest));
super::tunnel!(RangeFinderRequest => RangeFinderResponse::Firmware(FirmwareUpgradeRequest));

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::encode;
    use crate::protocol::Tunnel;
    use serde_json::json;

    #[test]
    fn test_measurement_frame_roundtrip() {
        let m = RangeMeasurement {
            status: 0,
            distance_mm: 1234,
            ambient: 17,
            mode: RangingMode::Long,
            budget: TimingBudget::Tb33ms,
            roi: Roi::default(),
        };
        let data = m.to_frame_data();
        assert_eq!(data.len(), 7);
        assert_eq!(RangeMeasurement::from_frame_data(&data, Roi::default()), Some(m));
        assert_eq!(RangeMeasurement::from_frame_data(&data[..3], Roi::default()), None);
    }

    #[test]
    fn test_budget_wire_names() {
        assert_eq!(
            encode(&RangeFinderRequest::SetTimingBudget {
                budget: TimingBudget::Tb100ms
            })
            .unwrap(),
            json!({"method": "set_timing_budget", "data": {"budget": "TB100ms"}})
        );
    }

    #[test]
    fn test_generic_tunnel() {
        let req = <RangeFinderRequest as Tunnel<GenericDeviceRequest>>::wrap(GenericDeviceRequest::Blink {});
        assert_eq!(
            encode(&req).unwrap(),
            json!({"method": "generic", "data": {"msg": {"method": "blink", "data": {}}}})
        );

        let ok = <RangeFinderRequest as Tunnel<GenericDeviceRequest>>::unwrap(
            RangeFinderResponse::Generic(GenericDeviceResponse::Blink(())),
        );
        assert_eq!(ok, Ok(GenericDeviceResponse::Blink(())));

        let other = <RangeFinderRequest as Tunnel<GenericDeviceRequest>>::unwrap(
            RangeFinderResponse::SetRange(()),
        );
        assert_eq!(other, Err(RangeFinderResponse::SetRange(())));
    }
}
