//! Simulated bus traffic
//!
//! Range finders on a simulated domain publish a status frame every tick,
//! so live capture has something to show without hardware.

use std::sync::Arc;
use std::time::Duration;

use hookline_core::protocol::{api_class, RangeMeasurement, RangingMode, Roi, TimingBudget};
use hookline_core::{FrameId, VendorModel, VENDOR_MANUFACTURER};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::bus::VirtualBus;
use crate::device_manager::DeviceManager;

/// Distance of the simulated target at `tick`, a triangle wave 100..=1900 mm
pub fn distance_at(tick: u64) -> u16 {
    let phase = (tick % 36) as u16;
    let step = if phase <= 18 { phase } else { 36 - phase };
    100 + step * 100
}

/// Start publishing status frames for the domain's range finders
pub fn spawn(bus: Arc<VirtualBus>, devices: Arc<DeviceManager>, domain: String, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut tick: u64 = 0;
        loop {
            ticker.tick().await;
            let listing = devices.devices();
            let Some(domain_devices) = listing.get(&domain) else {
                continue;
            };
            for (_, info, class) in domain_devices {
                if class != VendorModel::RangeFinder.device_class() || info.is_dfu {
                    continue;
                }
                let measurement = RangeMeasurement {
                    status: 0,
                    distance_mm: distance_at(tick),
                    ambient: 12,
                    mode: RangingMode::Short,
                    budget: TimingBudget::Tb33ms,
                    roi: Roi::default(),
                };
                let id = FrameId::new(
                    VendorModel::RangeFinder.can_device_type(),
                    VENDOR_MANUFACTURER,
                    api_class::STATUS,
                    0,
                    info.device_id.unwrap_or(0),
                );
                bus.inject(id, measurement.to_frame_data());
            }
            debug!(%domain, tick, "Simulated status published");
            tick += 1;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_wave() {
        assert_eq!(distance_at(0), 100);
        assert_eq!(distance_at(18), 1900);
        assert_eq!(distance_at(19), 1800);
        assert_eq!(distance_at(36), 100);
    }
}
