//! Flash command - firmware update through DFU mode

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use hookline_client::{DeviceId, ProviderSet};
use indicatif::{ProgressBar, ProgressStyle};

use super::device::resolve;
use crate::output::OutputContext;

/// Interval between progress polls
const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Flash a firmware image to a device
///
/// A device in application mode is first rebooted into DFU mode; the image is
/// then streamed to its DFU identity.
pub async fn flash(
    providers: &ProviderSet,
    address: &str,
    domain: &str,
    id: DeviceId,
    file_path: &Path,
    ctx: &OutputContext,
) -> Result<()> {
    ctx.info(&format!("Reading firmware from {}...", file_path.display()));
    let firmware = std::fs::read(file_path)
        .with_context(|| format!("Failed to read firmware file: {}", file_path.display()))?;
    ctx.info(&format!("Firmware size: {} bytes", firmware.len()));

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}% {msg}")?
            .progress_chars("=>-"),
    );

    let dfu_id = DeviceId::Dfu(id.serial());
    if !id.is_dfu() {
        pb.set_message("Entering DFU mode...");
        resolve(providers, address, domain, id)
            .await?
            .start_field_upgrade()
            .await
            .context("Failed to enter DFU mode")?;
    }
    let driver = resolve(providers, address, domain, dfu_id).await?;

    pb.set_message("Flashing...");
    driver
        .do_field_upgrade(firmware)
        .await
        .context("Failed to start field upgrade")?;

    driver
        .wait_for_firmware(PROGRESS_INTERVAL, |percent| {
            pb.set_position(percent.clamp(0.0, 100.0) as u64);
            pb.set_message(format!("Flashing... {:.0}%", percent));
        })
        .await
        .context("Failed to read progress")?;
    pb.set_position(100);

    let (_, info, _) = providers
        .provider(address)
        .devices()
        .find(domain, DeviceId::Serial(id.serial()))
        .await?
        .context("Device did not come back after the upgrade")?;
    pb.finish_with_message("Complete!");
    ctx.success(&format!(
        "Firmware update completed, {} now runs {}",
        info.display_name(),
        info.firmware_version.as_deref().unwrap_or("unknown firmware")
    ));
    Ok(())
}
