//! Advisory guards applied before a call is issued
//!
//! Devices do not enforce these limits themselves; the client refuses values
//! that would leave a device in an unusable state.

use hookline_core::protocol::{
    Roi, ADJUSTABLE_MAX_MV, ADJUSTABLE_MIN_MV, MAX_DEVICE_ID, MAX_NAME_LEN, ROI_GRID,
};

use crate::error::{ClientError, ClientResult};

/// CAN device id must be in `0..=0x3E`
pub fn device_id(id: u8) -> ClientResult<()> {
    if id > MAX_DEVICE_ID {
        return Err(ClientError::validation(format!(
            "Device id {} is out of range (0-{})",
            id, MAX_DEVICE_ID
        )));
    }
    Ok(())
}

/// Device names hold at most 16 characters
pub fn device_name(name: &str) -> ClientResult<()> {
    let len = name.chars().count();
    if len > MAX_NAME_LEN {
        return Err(ClientError::validation(format!(
            "Name is {} characters long, the limit is {}",
            len, MAX_NAME_LEN
        )));
    }
    Ok(())
}

/// A region of interest must have even sides of at least 4 and lie on the grid
pub fn roi(roi: &Roi) -> ClientResult<()> {
    if roi.w % 2 != 0 || roi.h % 2 != 0 {
        return Err(ClientError::validation(format!(
            "ROI {}x{} must have even width and height",
            roi.w, roi.h
        )));
    }
    if roi.w < 4 || roi.h < 4 {
        return Err(ClientError::validation(format!(
            "ROI {}x{} is smaller than the 4x4 minimum",
            roi.w, roi.h
        )));
    }
    let fits = |centre: u8, size: u8| {
        let half = size / 2;
        centre >= half && centre as u16 + half as u16 <= ROI_GRID as u16
    };
    if !fits(roi.x, roi.w) || !fits(roi.y, roi.h) {
        return Err(ClientError::validation(format!(
            "ROI {}x{} @ ({}, {}) does not fit the {}x{} grid",
            roi.w, roi.h, roi.x, roi.y, ROI_GRID, ROI_GRID
        )));
    }
    Ok(())
}

/// Adjustable channels accept 15 V to 24 V when enabled
pub fn adjustable_voltage(enabled: bool, voltage_mv: u16) -> ClientResult<()> {
    if enabled && !(ADJUSTABLE_MIN_MV..=ADJUSTABLE_MAX_MV).contains(&voltage_mv) {
        return Err(ClientError::validation(format!(
            "Voltage {} mV is outside {}-{} mV",
            voltage_mv, ADJUSTABLE_MIN_MV, ADJUSTABLE_MAX_MV
        )));
    }
    Ok(())
}

/// A firmware image must not be empty
pub fn firmware_image(data: &[u8]) -> ClientResult<()> {
    if data.is_empty() {
        return Err(ClientError::validation("Firmware image is empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_id_range() {
        assert!(device_id(0).is_ok());
        assert!(device_id(0x3E).is_ok());
        assert!(device_id(0x3F).is_err());
        assert!(device_id(200).is_err());
    }

    #[test]
    fn test_name_length_counts_chars() {
        assert!(device_name("").is_ok());
        assert!(device_name("sixteen-chars-ok").is_ok());
        assert!(device_name("seventeen-chars-x").is_err());
        assert!(device_name("ééééééééééééééé").is_ok());
    }

    #[test]
    fn test_roi_geometry() {
        assert!(roi(&Roi::default()).is_ok());
        assert!(roi(&Roi { x: 4, y: 12, w: 8, h: 4 }).is_ok());
        assert!(roi(&Roi { x: 8, y: 8, w: 5, h: 4 }).is_err());
        assert!(roi(&Roi { x: 8, y: 8, w: 2, h: 2 }).is_err());
        assert!(roi(&Roi { x: 2, y: 8, w: 8, h: 4 }).is_err());
        assert!(roi(&Roi { x: 14, y: 8, w: 6, h: 4 }).is_err());
    }

    #[test]
    fn test_adjustable_voltage() {
        assert!(adjustable_voltage(true, 15_000).is_ok());
        assert!(adjustable_voltage(true, 24_001).is_err());
        assert!(adjustable_voltage(false, 0).is_ok());
    }
}
