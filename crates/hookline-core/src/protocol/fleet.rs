//! Provider set, provider and device set layers

use std::collections::BTreeMap;

use serde_json::Value;

use crate::address::{DeviceId, Domain, ProviderAddress};
use crate::models::{DeviceInfo, ProviderInfo};

/// One row of a device listing: id, snapshot and device class
pub type DeviceListing = (DeviceId, DeviceInfo, String);

crate::rpc_protocol! {
    /// Requests addressed to the set of all providers
    pub ProviderManagerRequest => ProviderManagerResponse {
        /// Snapshot of every registered provider
        Providers "providers" {} -> BTreeMap<ProviderAddress, ProviderInfo>;
        /// Tunnel a request to the provider at `address`
        Provider "provider" { address: ProviderAddress, msg: ProviderRequest } -> ProviderResponse;
        /// Remove a provider registration
        Delete "delete" { address: ProviderAddress } -> ();
    }
}

crate::rpc_protocol! {
    /// Requests addressed to one provider
    pub ProviderRequest => ProviderResponse {
        Connect "connect" {} -> ();
        Disconnect "disconnect" {} -> ();
        Info "info" {} -> ProviderInfo;
        /// Tunnel a request to the provider's device set
        DeviceManagerCall "device_manager_call" { req: DeviceManagerRequest } -> DeviceManagerResponse;
    }
}

crate::rpc_protocol! {
    /// Requests addressed to a provider's device set
    pub DeviceManagerRequest => DeviceManagerResponse {
        /// Listing of every device, grouped by domain
        Devices "devices" {} -> BTreeMap<Domain, Vec<DeviceListing>>;
        /// Forward an untyped device-protocol envelope to one device
        Call "call" { domain: Domain, device_id: DeviceId, data: Value } -> Value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{encode, RpcMessage};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_nested_envelope_shape() {
        let req = ProviderManagerRequest::Provider {
            address: "P1".into(),
            msg: ProviderRequest::DeviceManagerCall {
                req: DeviceManagerRequest::Call {
                    domain: "canbus".into(),
                    device_id: DeviceId::Serial(5),
                    data: json!({"method": "blink", "data": {}}),
                },
            },
        };
        assert_eq!(req.method(), "provider");
        assert_eq!(
            encode(&req).unwrap(),
            json!({
                "method": "provider",
                "data": {
                    "address": "P1",
                    "msg": {
                        "method": "device_manager_call",
                        "data": {
                            "req": {
                                "method": "call",
                                "data": {
                                    "domain": "canbus",
                                    "device_id": {"Serial": 5},
                                    "data": {"method": "blink", "data": {}}
                                }
                            }
                        }
                    }
                }
            })
        );
    }

    #[test]
    fn test_unit_response_shape() {
        let rsp = ProviderResponse::Connect(());
        assert_eq!(encode(&rsp).unwrap(), json!({"method": "connect", "data": null}));
        let back: ProviderResponse =
            serde_json::from_value(json!({"method": "connect", "data": null})).unwrap();
        assert_eq!(back, rsp);
    }
}
