//! Protocol of a device whose firmware is too old to be driven normally
//!
//! Such a device only offers identification, an explanation and a way into
//! a firmware upgrade.

use super::{FirmwareUpgradeRequest, FirmwareUpgradeResponse, GenericDeviceRequest, GenericDeviceResponse};

crate::rpc_protocol! {
    /// Requests understood by a device with unsupported firmware
    pub OutdatedFirmwareRequest => OutdatedFirmwareResponse {
        StartFieldUpgrade "start_field_upgrade" {} -> ();
        /// Why the firmware is not supported
        GetError "get_error" {} -> String;
        /// Where a current image can be downloaded, if known
        GetFirmwareUrl "get_firmware_url" {} -> Option<String>;
        Generic "generic" { msg: GenericDeviceRequest } -> GenericDeviceResponse;
        Firmware "firmware" { msg: FirmwareUpgradeRequest } -> FirmwareUpgradeResponse;
    }
}

super::tunnel!(OutdatedFirmwareRequest => OutdatedFirmwareResponse::Generic(GenericDeviceRequest));
super::tunnel!(OutdatedFirmwareRequest => OutdatedFirmwareResponse::Firmware(FirmwareUpgradeRequest));
