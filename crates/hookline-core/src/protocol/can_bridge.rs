//! CAN pass-through protocol
//!
//! The bridge is the capture source for the bus it sits on and the sink for
//! raw frames sent onto it.

use serde::{Deserialize, Serialize};

use super::{GenericDeviceRequest, GenericDeviceResponse};
use crate::models::{Filter, FrameId, MailboxItem};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanBridgeStatus {
    pub log_enabled: bool,
    pub filters: Vec<Filter>,
    /// Items currently held in the mailbox
    pub buffered: usize,
    /// Highest seq assigned so far (0 when none)
    pub last_seq: u64,
    /// Frames observed since start, stored or not
    pub frames_seen: u64,
}

crate::rpc_protocol! {
    /// Requests understood by a CAN bridge
    pub CanBridgeRequest => CanBridgeResponse {
        SetLogEnabled "set_log_enabled" { enabled: bool } -> ();
        /// Empty the mailbox
        Clear "clear" {} -> ();
        /// Stored items with `seq` greater than the given one, oldest first
        ReadAfter "read_after" { seq: u64 } -> Vec<MailboxItem>;
        SetFilters "set_filters" { filters: Vec<Filter> } -> ();
        /// Put one frame on the bus
        SendRaw "send_raw" { id: FrameId, data: Vec<u8> } -> ();
        Status "status" {} -> CanBridgeStatus;
        Generic "generic" { msg: GenericDeviceRequest } -> GenericDeviceResponse;
    }
}

super::tunnel!(CanBridgeRequest => CanBridgeResponse::Generic(GenericDeviceRequest));
