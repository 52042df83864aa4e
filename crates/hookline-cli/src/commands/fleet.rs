//! Provider commands - list, connect, disconnect and device listing

use anyhow::{Context, Result};
use hookline_client::{DeviceRegistry, ProviderSet};

use crate::output::{DeviceRow, OutputContext, ProviderRow};

/// List every provider the daemon knows
pub async fn providers(providers: &ProviderSet, ctx: &OutputContext) -> Result<()> {
    let listing = providers.providers().await.context("Failed to list providers")?;
    let rows: Vec<ProviderRow> = listing.into_values().map(ProviderRow::from).collect();
    ctx.print(&rows);
    Ok(())
}

pub async fn connect(providers: &ProviderSet, address: &str, ctx: &OutputContext) -> Result<()> {
    providers
        .provider(address)
        .connect()
        .await
        .with_context(|| format!("Failed to connect {}", address))?;
    ctx.success(&format!("Connected {}", address));
    Ok(())
}

pub async fn disconnect(providers: &ProviderSet, address: &str, ctx: &OutputContext) -> Result<()> {
    providers
        .provider(address)
        .disconnect()
        .await
        .with_context(|| format!("Failed to disconnect {}", address))?;
    ctx.success(&format!("Disconnected {}", address));
    Ok(())
}

/// List a provider's devices with their class and whether a driver exists
pub async fn devices(providers: &ProviderSet, address: &str, ctx: &OutputContext) -> Result<()> {
    let registry = DeviceRegistry::default();
    let listing = providers
        .provider(address)
        .devices()
        .devices()
        .await
        .with_context(|| format!("Failed to list devices of {}", address))?;

    let rows: Vec<DeviceRow> = listing
        .iter()
        .flat_map(|(domain, rows)| {
            let registry = &registry;
            rows.iter().map(move |(id, info, class)| {
                DeviceRow::new(domain, *id, info, class, registry.contains(class))
            })
        })
        .collect();
    ctx.print(&rows);
    Ok(())
}
