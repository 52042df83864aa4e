//! Command implementations for hookline

pub mod capture;
pub mod device;
pub mod fleet;
pub mod flash;
pub mod replay;

pub use capture::capture;
pub use device::{blink, commit, resolve, set_id, set_name};
pub use fleet::{connect, devices, disconnect, providers};
pub use flash::flash;
pub use replay::replay;
