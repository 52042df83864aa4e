//! The provider set: top of the host-side routing hierarchy

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use hookline_core::protocol::{ProviderManagerRequest, ProviderManagerResponse};
use hookline_core::{decode_request, encode, ProviderAddress, ProviderInfo};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::config::HostConfig;
use crate::error::{HostError, HostResult};
use crate::provider::{BusProvider, DeviceProvider};

/// Anything that answers envelopes
#[async_trait]
pub trait RpcService: Send + Sync {
    async fn rpc_call(&self, envelope: Value) -> HostResult<Value>;
}

/// Registry of every provider on this host
#[derive(Default)]
pub struct ProviderManager {
    providers: RwLock<BTreeMap<ProviderAddress, Arc<dyn DeviceProvider>>>,
}

impl ProviderManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every configured provider, disconnected
    pub fn from_config(config: &HostConfig) -> Self {
        let manager = Self::new();
        for provider in &config.providers {
            manager.register(Arc::new(BusProvider::from_config(provider, config)));
        }
        manager
    }

    /// Connect the providers the configuration marks `auto_connect`
    pub async fn auto_connect(&self, config: &HostConfig) -> HostResult<()> {
        for provider in config.providers.iter().filter(|p| p.auto_connect) {
            self.provider(&provider.address)?.connect().await?;
        }
        Ok(())
    }

    /// Register a provider, replacing one at the same address
    pub fn register(&self, provider: Arc<dyn DeviceProvider>) {
        let address = provider.address().to_string();
        if self.providers.write().insert(address.clone(), provider).is_some() {
            warn!(%address, "Provider replaced");
        } else {
            info!(%address, "Provider registered");
        }
    }

    pub fn providers(&self) -> BTreeMap<ProviderAddress, ProviderInfo> {
        self.providers
            .read()
            .iter()
            .map(|(address, provider)| (address.clone(), provider.info()))
            .collect()
    }

    pub fn provider(&self, address: &str) -> HostResult<Arc<dyn DeviceProvider>> {
        self.providers
            .read()
            .get(address)
            .cloned()
            .ok_or_else(|| HostError::ProviderNotFound(address.to_string()))
    }

    /// Disconnect and forget a provider
    pub async fn delete(&self, address: &str) -> HostResult<()> {
        let provider = self.provider(address)?;
        provider.disconnect().await?;
        self.providers.write().remove(address);
        info!(%address, "Provider deleted");
        Ok(())
    }

    /// Disconnect every provider
    pub async fn shutdown(&self) {
        let providers: Vec<_> = self.providers.read().values().cloned().collect();
        for provider in providers {
            if let Err(e) = provider.disconnect().await {
                warn!(address = provider.address(), error = %e, "Disconnect failed");
            }
        }
    }

    pub async fn handle(&self, request: ProviderManagerRequest) -> HostResult<ProviderManagerResponse> {
        Ok(match request {
            ProviderManagerRequest::Providers {} => ProviderManagerResponse::Providers(self.providers()),
            ProviderManagerRequest::Provider { address, msg } => {
                let provider = self.provider(&address)?;
                ProviderManagerResponse::Provider(provider.handle(msg).await?)
            }
            ProviderManagerRequest::Delete { address } => {
                self.delete(&address).await?;
                ProviderManagerResponse::Delete(())
            }
        })
    }
}

#[async_trait]
impl RpcService for ProviderManager {
    #[instrument(skip_all, fields(method = envelope.get("method").and_then(serde_json::Value::as_str).unwrap_or("?")))]
    async fn rpc_call(&self, envelope: Value) -> HostResult<Value> {
        let request: ProviderManagerRequest = decode_request(envelope)?;
        let response = self.handle(request).await?;
        Ok(encode(&response)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio_test::{assert_err, assert_ok};
    use serde_json::json;

    fn demo() -> ProviderManager {
        ProviderManager::from_config(&HostConfig::demo())
    }

    #[tokio::test]
    async fn test_providers_listing() {
        let manager = demo();
        let rsp = manager.rpc_call(json!({"method": "providers", "data": {}})).await.unwrap();
        assert_eq!(
            rsp,
            json!({
                "method": "providers",
                "data": {"P1": {"address": "P1", "description": "Demo bus", "connected": false}}
            })
        );
    }

    #[tokio::test]
    async fn test_connect_through_envelope() {
        let manager = demo();
        let rsp = manager
            .rpc_call(json!({
                "method": "provider",
                "data": {"address": "P1", "msg": {"method": "connect", "data": {}}}
            }))
            .await
            .unwrap();
        assert_eq!(
            rsp,
            json!({"method": "provider", "data": {"method": "connect", "data": null}})
        );
        assert!(manager.providers()["P1"].connected);
    }

    #[tokio::test]
    async fn test_unknown_provider() {
        let manager = demo();
        let err = manager
            .rpc_call(json!({
                "method": "provider",
                "data": {"address": "P9", "msg": {"method": "info", "data": {}}}
            }))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Provider not found: P9");
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_malformed_request_is_rejected() {
        let manager = demo();
        let err = manager.rpc_call(json!({"method": "reboot", "data": {}})).await.unwrap_err();
        assert!(matches!(err, HostError::Rpc(_)));
    }

    #[tokio::test]
    async fn test_delete_disconnects() {
        let manager = demo();
        let provider = assert_ok!(manager.provider("P1"));
        assert_ok!(provider.connect().await);

        assert_ok!(manager.delete("P1").await);
        assert!(!provider.info().connected);
        assert!(manager.providers().is_empty());
        assert_err!(manager.delete("P1").await);
    }

    #[tokio::test]
    async fn test_auto_connect() {
        let mut config = HostConfig::demo();
        config.providers[0].auto_connect = true;
        let manager = ProviderManager::from_config(&config);
        assert_ok!(manager.auto_connect(&config).await);
        assert!(manager.providers()["P1"].connected);
        manager.shutdown().await;
        assert!(!manager.providers()["P1"].connected);
    }
}
