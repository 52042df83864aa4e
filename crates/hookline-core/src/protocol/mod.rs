//! Request/response variant sets for every protocol layer
//!
//! Layers nest: [`ProviderManagerRequest`] tunnels a [`ProviderRequest`],
//! which tunnels a [`DeviceManagerRequest`], which carries an untyped payload
//! for one device. The payload is one of the device-class protocols below;
//! those in turn tunnel the shared generic and firmware-upgrade protocols
//! (see [`Tunnel`]).

mod can_bridge;
mod device;
mod fleet;
mod outdated;
mod power_hub;
mod range_finder;

pub use can_bridge::*;
pub use device::*;
pub use fleet::*;
pub use outdated::*;
pub use power_hub::*;
pub use range_finder::*;

use crate::envelope::RpcRequest;

/// A device protocol that can carry an inner protocol
pub trait Tunnel<Inner: RpcRequest>: RpcRequest {
    /// Wrap an inner request in the outer variant
    fn wrap(inner: Inner) -> Self;

    /// Extract the inner response, handing back anything else unchanged
    fn unwrap(response: Self::Response) -> Result<Inner::Response, Self::Response>;
}

macro_rules! tunnel {
    ($outer:ident => $outer_rsp:ident :: $variant:ident ( $inner:ty )) => {
        impl $crate::protocol::Tunnel<$inner> for $outer {
            fn wrap(msg: $inner) -> Self {
                $outer::$variant { msg }
            }

            fn unwrap(
                response: $outer_rsp,
            ) -> Result<<$inner as $crate::envelope::RpcRequest>::Response, $outer_rsp> {
                match response {
                    $outer_rsp::$variant(inner) => Ok(inner),
                    other => Err(other),
                }
            }
        }
    };
}

pub(crate) use tunnel;
