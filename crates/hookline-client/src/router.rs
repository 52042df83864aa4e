//! Hierarchical router: provider set → provider → device set → device
//!
//! Each handle wraps the request of the layer below in its own variant and
//! unwraps the paired response. Below the device set the payload is an
//! untyped envelope; [`DeviceHandle::call`] re-types it for the device's
//! protocol.

use std::collections::BTreeMap;
use std::sync::Arc;

use hookline_core::protocol::{
    DeviceListing, DeviceManagerRequest, DeviceManagerResponse, ProviderManagerRequest,
    ProviderManagerResponse, ProviderRequest, ProviderResponse, Tunnel,
};
use hookline_core::{
    decode_response, encode, envelope, DeviceAddress, DeviceId, Domain, ProviderAddress,
    ProviderInfo, RpcError, RpcMessage, RpcRequest, Transport,
};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::{ClientError, ClientResult};

/// Error for a response variant the caller cannot use
pub(crate) fn unexpected(expected: &'static str, actual: &impl RpcMessage) -> ClientError {
    RpcError::UnexpectedResponse {
        expected,
        actual: actual.method(),
    }
    .into()
}

/// Unwrap one response variant or fail with [`RpcError::UnexpectedResponse`]
macro_rules! expect_response {
    ($rsp:expr, $ty:ident :: $variant:ident, $tag:literal) => {
        match $rsp {
            $ty::$variant(value) => Ok(value),
            #[allow(unreachable_patterns)]
            other => Err($crate::router::unexpected($tag, &other)),
        }
    };
}

pub(crate) use expect_response;

// =============================================================================
// Provider set
// =============================================================================

/// Root of the router, owning the transport
#[derive(Clone)]
pub struct ProviderSet {
    transport: Arc<dyn Transport>,
}

impl ProviderSet {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    async fn call(&self, request: ProviderManagerRequest) -> ClientResult<ProviderManagerResponse> {
        Ok(envelope::call(self.transport.as_ref(), request).await?)
    }

    /// Snapshot of every registered provider
    #[instrument(skip(self))]
    pub async fn providers(&self) -> ClientResult<BTreeMap<ProviderAddress, ProviderInfo>> {
        let rsp = self.call(ProviderManagerRequest::Providers {}).await?;
        expect_response!(rsp, ProviderManagerResponse::Providers, "providers")
    }

    /// Remove a provider registration
    #[instrument(skip(self))]
    pub async fn delete(&self, address: &str) -> ClientResult<()> {
        let rsp = self
            .call(ProviderManagerRequest::Delete {
                address: address.to_string(),
            })
            .await?;
        expect_response!(rsp, ProviderManagerResponse::Delete, "delete")
    }

    /// Tunnel a request to the provider at `address`
    pub async fn provider_call(
        &self,
        address: &str,
        msg: ProviderRequest,
    ) -> ClientResult<ProviderResponse> {
        let rsp = self
            .call(ProviderManagerRequest::Provider {
                address: address.to_string(),
                msg,
            })
            .await?;
        expect_response!(rsp, ProviderManagerResponse::Provider, "provider")
    }

    /// Handle to one provider. No call is made until it is used.
    pub fn provider(&self, address: impl Into<String>) -> ProviderHandle {
        ProviderHandle {
            set: self.clone(),
            address: address.into(),
        }
    }

    /// Handle to one device by full address
    pub fn device(&self, address: &DeviceAddress) -> DeviceHandle {
        self.provider(address.provider.clone())
            .devices()
            .device(address.domain.clone(), address.device)
    }
}

impl std::fmt::Debug for ProviderSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSet").finish_non_exhaustive()
    }
}

// =============================================================================
// Provider
// =============================================================================

/// One provider, addressed by name
#[derive(Debug, Clone)]
pub struct ProviderHandle {
    set: ProviderSet,
    address: ProviderAddress,
}

impl ProviderHandle {
    pub fn address(&self) -> &str {
        &self.address
    }

    async fn call(&self, msg: ProviderRequest) -> ClientResult<ProviderResponse> {
        self.set.provider_call(&self.address, msg).await
    }

    #[instrument(skip(self), fields(provider = %self.address))]
    pub async fn connect(&self) -> ClientResult<()> {
        let rsp = self.call(ProviderRequest::Connect {}).await?;
        expect_response!(rsp, ProviderResponse::Connect, "connect")
    }

    #[instrument(skip(self), fields(provider = %self.address))]
    pub async fn disconnect(&self) -> ClientResult<()> {
        let rsp = self.call(ProviderRequest::Disconnect {}).await?;
        expect_response!(rsp, ProviderResponse::Disconnect, "disconnect")
    }

    pub async fn info(&self) -> ClientResult<ProviderInfo> {
        let rsp = self.call(ProviderRequest::Info {}).await?;
        expect_response!(rsp, ProviderResponse::Info, "info")
    }

    /// Tunnel a request to this provider's device set
    pub async fn device_manager_call(
        &self,
        req: DeviceManagerRequest,
    ) -> ClientResult<DeviceManagerResponse> {
        let rsp = self.call(ProviderRequest::DeviceManagerCall { req }).await?;
        expect_response!(rsp, ProviderResponse::DeviceManagerCall, "device_manager_call")
    }

    /// This provider's device set
    pub fn devices(&self) -> DeviceSet {
        DeviceSet {
            provider: self.clone(),
        }
    }
}

// =============================================================================
// Device set
// =============================================================================

/// The devices behind one provider
#[derive(Debug, Clone)]
pub struct DeviceSet {
    provider: ProviderHandle,
}

impl DeviceSet {
    pub fn provider(&self) -> &ProviderHandle {
        &self.provider
    }

    /// Listing of every device, grouped by domain
    #[instrument(skip(self), fields(provider = %self.provider.address))]
    pub async fn devices(&self) -> ClientResult<BTreeMap<Domain, Vec<DeviceListing>>> {
        let rsp = self
            .provider
            .device_manager_call(DeviceManagerRequest::Devices {})
            .await?;
        expect_response!(rsp, DeviceManagerResponse::Devices, "devices")
    }

    /// Forward an untyped envelope to one device
    pub async fn call(&self, domain: &str, device_id: DeviceId, data: Value) -> ClientResult<Value> {
        let rsp = self
            .provider
            .device_manager_call(DeviceManagerRequest::Call {
                domain: domain.to_string(),
                device_id,
                data,
            })
            .await?;
        expect_response!(rsp, DeviceManagerResponse::Call, "call")
    }

    /// Find one device's listing row
    pub async fn find(&self, domain: &str, device_id: DeviceId) -> ClientResult<Option<DeviceListing>> {
        let mut listing = self.devices().await?;
        Ok(listing
            .remove(domain)
            .and_then(|rows| rows.into_iter().find(|(id, _, _)| *id == device_id)))
    }

    /// Handle to one device. No call is made until it is used.
    pub fn device(&self, domain: impl Into<String>, device_id: DeviceId) -> DeviceHandle {
        DeviceHandle {
            devices: self.clone(),
            domain: domain.into(),
            device_id,
        }
    }
}

// =============================================================================
// Device
// =============================================================================

/// One device, addressed by domain and id
#[derive(Debug, Clone)]
pub struct DeviceHandle {
    devices: DeviceSet,
    domain: Domain,
    device_id: DeviceId,
}

impl DeviceHandle {
    pub fn address(&self) -> DeviceAddress {
        DeviceAddress::new(
            self.devices.provider.address.clone(),
            self.domain.clone(),
            self.device_id,
        )
    }

    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Send an untyped envelope to this device
    pub async fn call_raw(&self, data: Value) -> ClientResult<Value> {
        self.devices.call(&self.domain, self.device_id, data).await
    }

    /// Send a device-protocol request and decode its paired response
    pub async fn call<R: RpcRequest>(&self, request: R) -> ClientResult<R::Response> {
        let method = request.method();
        debug!(device = %self.device_id, method, "Device call");
        let data = encode(&request)?;
        let rsp = self.call_raw(data).await?;
        Ok(decode_response::<R>(method, rsp)?)
    }

    /// Send a request of an inner protocol through the device protocol `P`
    pub async fn tunnel<P, I>(&self, inner: I) -> ClientResult<I::Response>
    where
        P: Tunnel<I>,
        I: RpcRequest,
    {
        let method = inner.method();
        let rsp = self.call(P::wrap(inner)).await?;
        P::unwrap(rsp).map_err(|other| unexpected(method, &other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hookline_core::RpcResult;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    /// Transport that answers with canned envelopes and records requests
    struct Scripted {
        sent: Mutex<Vec<Value>>,
        replies: Mutex<Vec<RpcResult<Value>>>,
    }

    impl Scripted {
        fn new(replies: Vec<RpcResult<Value>>) -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                replies: Mutex::new(replies),
            })
        }
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn send(&self, envelope: Value) -> RpcResult<Value> {
            self.sent.lock().push(envelope);
            self.replies.lock().remove(0)
        }
    }

    fn wrap_device_reply(data: Value) -> Value {
        json!({
            "method": "provider",
            "data": {
                "method": "device_manager_call",
                "data": { "method": "call", "data": data }
            }
        })
    }

    #[tokio::test]
    async fn test_device_call_wraps_every_layer() {
        let transport = Scripted::new(vec![Ok(wrap_device_reply(
            json!({"method": "blink", "data": null}),
        ))]);
        let set = ProviderSet::new(transport.clone());
        let device = set.device(&DeviceAddress::new("P1", "canbus", DeviceId::Serial(5)));

        let rsp = device
            .call(hookline_core::protocol::GenericDeviceRequest::Blink {})
            .await
            .unwrap();
        assert_eq!(rsp, hookline_core::protocol::GenericDeviceResponse::Blink(()));

        let sent = transport.sent.lock();
        assert_eq!(
            sent[0]["data"]["msg"]["data"]["req"]["data"],
            json!({
                "domain": "canbus",
                "device_id": {"Serial": 5},
                "data": {"method": "blink", "data": {}}
            })
        );
        assert_eq!(sent[0]["data"]["address"], json!("P1"));
    }

    #[tokio::test]
    async fn test_leaf_tag_mismatch_is_rejected() {
        let transport = Scripted::new(vec![Ok(wrap_device_reply(
            json!({"method": "set_id", "data": null}),
        ))]);
        let set = ProviderSet::new(transport);
        let device = set.device(&DeviceAddress::new("P1", "canbus", DeviceId::Serial(5)));

        let err = device
            .call(hookline_core::protocol::GenericDeviceRequest::Blink {})
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Rpc(RpcError::MethodMismatch { expected: "blink", .. })
        ));
    }

    #[tokio::test]
    async fn test_transport_error_surfaces_verbatim() {
        let transport = Scripted::new(vec![Err(RpcError::Transport("Provider not found: P9".into()))]);
        let set = ProviderSet::new(transport);
        let err = set.provider("P9").info().await.unwrap_err();
        assert_eq!(err.to_string(), "Provider not found: P9");
    }
}
