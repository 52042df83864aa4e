//! Capture command - live bus traffic through a CAN bridge

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use hookline_client::export;
use hookline_client::{CaptureBuffer, CaptureOptions, DeviceDriver, Filter};

use crate::output::{OutputContext, PacketRow};

/// Capture until Ctrl+C or `duration` elapses, printing packets as they arrive
pub async fn capture(
    driver: DeviceDriver,
    decoded_only: bool,
    duration: Option<Duration>,
    interval: Duration,
    export_path: Option<&Path>,
    ctx: &OutputContext,
) -> Result<()> {
    let bridge = match driver {
        DeviceDriver::CanBridge(bridge) => bridge,
        other => return Err(anyhow!("{} is not a CAN bridge", other.device_class())),
    };

    let mut buffer = CaptureBuffer::new(
        bridge,
        CaptureOptions {
            poll_interval: interval,
            ..Default::default()
        },
    );
    let filters = if decoded_only { vec![Filter::DecodedOnly] } else { Vec::new() };
    buffer.set_filters(filters).await.context("Failed to set filters")?;
    buffer.start().await.context("Failed to start capture")?;

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    ctx.info("Capturing, press Ctrl+C to stop");
    let deadline = duration.map(|d| tokio::time::Instant::now() + d);
    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) && deadline.map_or(true, |d| tokio::time::Instant::now() < d) {
        match buffer.poll().await {
            Ok(added) if added > 0 => {
                let fresh: Vec<PacketRow> = buffer.history().iter().take(added).rev().map(PacketRow::from).collect();
                for row in &fresh {
                    ctx.print_packet(row, printed == 0);
                    printed += 1;
                }
            }
            Ok(_) => {}
            Err(e) => ctx.warn(&format!("Poll failed: {}", e)),
        }
        tokio::time::sleep(interval).await;
    }

    buffer.stop().await.context("Failed to stop capture")?;
    ctx.info(&format!("Captured {} packet(s)", buffer.total_captured()));

    if let Some(path) = export_path {
        export::save(&buffer.export(), path)
            .with_context(|| format!("Failed to export to {}", path.display()))?;
        ctx.success(&format!("Exported {} packet(s) to {}", buffer.len(), path.display()));
    }
    Ok(())
}
