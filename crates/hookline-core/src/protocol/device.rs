//! Protocols shared by every first-party device

/// Largest device id a device accepts (6-bit space, broadcast excluded)
pub const MAX_DEVICE_ID: u8 = 0x3E;

/// Longest name a device stores
pub const MAX_NAME_LEN: usize = 16;

/// Bytes of firmware image carried per frame
pub const FIRMWARE_CHUNK_LEN: usize = 8;

/// API classes shared by every first-party device
pub mod api_class {
    pub const STATUS: u8 = 0x01;
    pub const CONFIGURE: u8 = 0x02;
    pub const BLINK: u8 = 0x30;
    pub const SET_ID: u8 = 0x31;
    pub const SET_NAME: u8 = 0x32;
    pub const COMMIT: u8 = 0x33;
    pub const ENTER_DFU: u8 = 0x3C;
    pub const FIRMWARE_CHUNK: u8 = 0x3D;
    pub const FIRMWARE_DONE: u8 = 0x3E;
}

crate::rpc_protocol! {
    /// Operations every first-party device understands
    pub GenericDeviceRequest => GenericDeviceResponse {
        /// Flash the device's status light
        Blink "blink" {} -> ();
        /// Change the numeric CAN id (0..=0x3E)
        SetId "set_id" { id: u8 } -> ();
        /// Change the stored name (at most 16 characters)
        SetName "set_name" { name: String } -> ();
        /// Persist id and name across power cycles
        CommitToEeprom "commit_to_eeprom" {} -> ();
    }
}

crate::rpc_protocol! {
    /// Firmware upgrade of a device in DFU mode
    pub FirmwareUpgradeRequest => FirmwareUpgradeResponse {
        /// Percent complete, or null when no upgrade is running
        Progress "progress" {} -> Option<f64>;
        /// Start streaming an image to the device
        DoFieldUpgrade "do_field_upgrade" { data: Vec<u8> } -> ();
    }
}
