//! Shared data models for providers, devices and bus frames

mod capture;
mod device;
mod frame;

pub use capture::*;
pub use device::*;
pub use frame::*;
