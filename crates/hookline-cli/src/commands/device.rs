//! Device commands - generic operations every device class answers

use anyhow::{anyhow, Context, Result};
use hookline_client::{DeviceDriver, DeviceId, DeviceRegistry, ProviderSet};
use tracing::debug;

use crate::output::OutputContext;

/// Resolve a device to its driver using the class from a fresh listing
pub async fn resolve(providers: &ProviderSet, address: &str, domain: &str, id: DeviceId) -> Result<DeviceDriver> {
    let devices = providers.provider(address).devices();
    let (id, _, class) = devices
        .find(domain, id)
        .await
        .with_context(|| format!("Failed to list devices of {}", address))?
        .ok_or_else(|| anyhow!("No device {} in {}/{}", id, address, domain))?;
    debug!(device = %id, %class, "Resolved device");
    Ok(DeviceRegistry::default().resolve(&class, devices.device(domain, id)))
}

pub async fn blink(driver: &DeviceDriver, ctx: &OutputContext) -> Result<()> {
    driver.blink().await.context("Blink failed")?;
    ctx.success(&format!("{} is blinking", driver.handle().device_id()));
    Ok(())
}

pub async fn set_id(driver: &DeviceDriver, id: u8, ctx: &OutputContext) -> Result<()> {
    driver.set_id(id).await.context("Failed to set CAN id")?;
    ctx.success(&format!("CAN id set to {}; run `commit` to persist", id));
    Ok(())
}

pub async fn set_name(driver: &DeviceDriver, name: &str, ctx: &OutputContext) -> Result<()> {
    driver.set_name(name).await.context("Failed to set name")?;
    ctx.success(&format!("Name set to {:?}; run `commit` to persist", name));
    Ok(())
}

pub async fn commit(driver: &DeviceDriver, ctx: &OutputContext) -> Result<()> {
    driver
        .commit_to_eeprom()
        .await
        .context("Failed to commit settings")?;
    ctx.success("Settings committed");
    Ok(())
}
