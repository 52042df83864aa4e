//! CAN bus abstraction
//!
//! A bus puts frames on the wire and broadcasts every frame it sees, its own
//! transmissions included, to all subscribers. [`VirtualBus`] is an
//! in-process loopback used for demos and tests.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use hookline_core::{CanFrame, FrameId, MAX_DATA_LEN};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::debug;

use crate::error::BusError;

/// One CAN bus
#[async_trait]
pub trait CanBus: Send + Sync {
    /// Transmit a frame; returns it with the bus timestamp applied
    async fn send(&self, id: FrameId, data: Vec<u8>) -> Result<CanFrame, BusError>;

    /// Receiver for every frame seen on the bus from now on
    fn subscribe(&self) -> broadcast::Receiver<CanFrame>;

    fn is_connected(&self) -> bool;

    fn set_connected(&self, connected: bool);
}

/// Loopback bus backed by a broadcast channel
pub struct VirtualBus {
    name: String,
    epoch: Instant,
    connected: AtomicBool,
    frames_tx: broadcast::Sender<CanFrame>,
}

impl VirtualBus {
    pub fn new(name: impl Into<String>) -> Self {
        let (frames_tx, _) = broadcast::channel(1024);
        Self {
            name: name.into(),
            epoch: Instant::now(),
            connected: AtomicBool::new(false),
            frames_tx,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Milliseconds since the bus was created, wrapping at `u32::MAX`
    pub fn timestamp(&self) -> u32 {
        self.epoch.elapsed().as_millis() as u32
    }

    /// Put a frame on the bus as if another node sent it
    ///
    /// Works whether or not the bus is connected; nothing sees it unless
    /// someone is subscribed.
    pub fn inject(&self, id: FrameId, data: Vec<u8>) -> CanFrame {
        let frame = CanFrame::new(id, self.timestamp(), data);
        let _ = self.frames_tx.send(frame.clone());
        frame
    }
}

#[async_trait]
impl CanBus for VirtualBus {
    async fn send(&self, id: FrameId, data: Vec<u8>) -> Result<CanFrame, BusError> {
        if !self.is_connected() {
            return Err(BusError::NotConnected);
        }
        if data.len() > MAX_DATA_LEN {
            return Err(BusError::SendFailed(format!(
                "{} data bytes exceed the {} byte frame limit",
                data.len(),
                MAX_DATA_LEN
            )));
        }
        debug!(bus = %self.name, %id, len = data.len(), "Frame sent");
        Ok(self.inject(id, data))
    }

    fn subscribe(&self) -> broadcast::Receiver<CanFrame> {
        self.frames_tx.subscribe()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_requires_connection() {
        let bus = VirtualBus::new("can0");
        let err = bus.send(FrameId::default(), vec![]).await.unwrap_err();
        assert_eq!(err, BusError::NotConnected);
    }

    #[tokio::test]
    async fn test_loopback_reaches_subscribers() {
        let bus = VirtualBus::new("can0");
        bus.set_connected(true);
        let mut rx = bus.subscribe();

        let id = FrameId::new(6, 6, 0x30, 0, 2);
        let sent = bus.send(id, vec![1, 2]).await.unwrap();
        let seen = rx.recv().await.unwrap();
        assert_eq!(seen, sent);
        assert_eq!(seen.id, id);
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let bus = VirtualBus::new("can0");
        bus.set_connected(true);
        let err = bus.send(FrameId::default(), vec![0; 9]).await.unwrap_err();
        assert!(matches!(err, BusError::SendFailed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timestamps_follow_epoch() {
        let bus = VirtualBus::new("can0");
        tokio::time::advance(std::time::Duration::from_millis(250)).await;
        let frame = bus.inject(FrameId::default(), vec![]);
        assert_eq!(frame.timestamp, 250);
    }
}
