//! In-process transport

use std::sync::Arc;

use async_trait::async_trait;
use hookline_core::{RpcError, RpcResult, Transport};
use serde_json::Value;

use crate::manager::RpcService;

/// [`Transport`] that hands envelopes straight to a service in the same process
///
/// Service errors surface as transport failures carrying the error text, as
/// they would over HTTP.
pub struct LocalTransport<S: RpcService> {
    service: Arc<S>,
}

impl<S: RpcService> LocalTransport<S> {
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &Arc<S> {
        &self.service
    }
}

impl<S: RpcService> Clone for LocalTransport<S> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
        }
    }
}

#[async_trait]
impl<S: RpcService + 'static> Transport for LocalTransport<S> {
    async fn send(&self, envelope: Value) -> RpcResult<Value> {
        self.service
            .rpc_call(envelope)
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))
    }
}
