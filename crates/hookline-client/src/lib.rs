//! hookline-client - Operate a fleet of CAN devices over one RPC transport
//!
//! The [`ProviderSet`] is the root of the router. From it, a
//! [`ProviderHandle`] reaches one provider, a [`DeviceSet`] that provider's
//! devices and a [`DeviceHandle`] a single device. The [`DeviceRegistry`]
//! turns a handle into a typed [`DeviceDriver`] according to the device class
//! reported by the listing.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use hookline_client::{DeviceRegistry, HttpTransport, ProviderSet};
//!
//! # async fn run() -> hookline_client::ClientResult<()> {
//! let transport = HttpTransport::new("http://localhost:7340")?;
//! let providers = ProviderSet::new(Arc::new(transport));
//!
//! let registry = DeviceRegistry::default();
//! for (domain, listing) in providers.provider("P1").devices().devices().await? {
//!     for (id, info, class) in listing {
//!         let driver = registry.resolve(&class, providers.provider("P1").devices().device(&domain, id));
//!         println!("{} {} supported={}", id, info.display_name(), driver.is_supported());
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Capture and replay
//!
//! A [`CaptureBuffer`] mirrors a bridge's capture log; a [`CaptureMonitor`]
//! polls it in the background. A [`ReplayScheduler`] plays a CSV capture back
//! through a bridge with the original inter-frame timing.

pub mod capture;
pub mod devices;
mod error;
pub mod export;
mod http;
pub mod poll;
pub mod registry;
pub mod replay;
pub mod report;
mod router;
pub mod testing;
pub mod validate;

pub use capture::{CaptureBuffer, CaptureMonitor, CaptureOptions, CaptureSource, CaptureState};
pub use devices::{CanBridge, FirmwareUpgrade, GenericDevice, OutdatedFirmware, PowerHub, RangeFinder};
pub use error::{ClientError, ClientResult, ImportError};
pub use export::{CaptureExport, ExportFormat};
pub use http::HttpTransport;
pub use registry::{DeviceDriver, DeviceRegistry};
pub use replay::{FrameSink, ReplayFrame, ReplayScheduler, ReplayState, ReplayStatus};
pub use report::{Reporter, TracingReporter};
pub use router::{DeviceHandle, DeviceSet, ProviderHandle, ProviderSet};

// Re-export core types for convenience
pub use hookline_core::{
    DeviceAddress, DeviceId, DeviceInfo, Filter, FrameId, MailboxItem, ProviderInfo, RpcError,
};
