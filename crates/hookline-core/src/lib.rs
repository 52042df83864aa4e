//! hookline-core - Envelope codec and protocol types for CAN device fleets
//!
//! Every layer of the fleet protocol (provider set, provider, device set and
//! each device class) is a closed pair of method-tagged request/response
//! enums. This crate defines those pairs, the codec that frames them over a
//! single opaque [`Transport`], and the addressing and frame models shared by
//! the client and host sides.

pub mod address;
pub mod envelope;
pub mod error;
pub mod models;
pub mod protocol;

pub use address::{DeviceAddress, DeviceId, Domain, ProviderAddress};
pub use envelope::{
    call, decode_request, decode_response, encode, envelope_method, RpcMessage, RpcRequest,
    Transport,
};
pub use error::{RpcError, RpcResult};
pub use models::*;
