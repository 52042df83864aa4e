//! Replay command - play a captured CSV back through a CAN bridge

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use hookline_client::{DeviceDriver, ReplayScheduler, ReplayState, TracingReporter};
use indicatif::{ProgressBar, ProgressStyle};

use crate::output::OutputContext;

/// Replay a CSV capture with its original timing
pub async fn replay(driver: DeviceDriver, file_path: &Path, ctx: &OutputContext) -> Result<()> {
    let bridge = match driver {
        DeviceDriver::CanBridge(bridge) => bridge,
        other => return Err(anyhow!("{} is not a CAN bridge", other.device_class())),
    };

    let scheduler = ReplayScheduler::spawn(bridge, Arc::new(TracingReporter));
    let loaded = scheduler
        .load_file(file_path)
        .await
        .with_context(|| format!("Failed to load {}", file_path.display()))?;
    ctx.info(&format!("Loaded {} frame(s) from {}", loaded.total, file_path.display()));

    let pb = ProgressBar::new(loaded.total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );

    let mut status = scheduler.subscribe();
    scheduler.play().await?;
    pb.set_message("Replaying...");

    loop {
        let current = *status.borrow_and_update();
        pb.set_position(current.index as u64);
        match current.state {
            ReplayState::Loaded if current.remaining() == 0 => break,
            ReplayState::Paused => {
                pb.abandon_with_message("Transmit failed");
                return Err(anyhow!(
                    "Replay stopped at frame {} of {}",
                    current.index + 1,
                    current.total
                ));
            }
            _ => {}
        }
        status.changed().await.context("Replay scheduler stopped")?;
    }

    pb.finish_with_message("Complete!");
    ctx.success(&format!("Replayed {} frame(s)", loaded.total));
    Ok(())
}
