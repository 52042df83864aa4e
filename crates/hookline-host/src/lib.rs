//! hookline-host - The serving side of the hookline fleet protocol
//!
//! A host owns a set of providers. Each provider drives one or more CAN
//! domains; each domain is a bus with the devices that sit on it.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    ProviderManager                          │
//! │  Implements RpcService (provider-set envelopes)             │
//! │                                                             │
//! │  ┌──────────────────────┐      ┌──────────────────────┐     │
//! │  │ BusProvider "P1"     │      │ BusProvider "P2"     │     │
//! │  │  pump: bus → devices │      │                      │     │
//! │  └──────────┬───────────┘      └──────────────────────┘     │
//! │             │                                               │
//! │     ┌───────┴────────┐                                      │
//! │     │ DeviceManager  │  domain → serial → DeviceHandler     │
//! │     └───────┬────────┘                                      │
//! │             │                                               │
//! │     ┌───────┴────────┐                                      │
//! │     │ CanBus         │  (VirtualBus loopback)               │
//! │     └────────────────┘                                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use hookline_host::{HostConfig, LocalTransport, ProviderManager};
//!
//! let manager = Arc::new(ProviderManager::from_config(&HostConfig::demo()));
//! let transport = LocalTransport::new(manager);
//! ```

pub mod bus;
pub mod capture_log;
pub mod config;
pub mod decode;
pub mod device_manager;
pub mod devices;
pub mod error;
pub mod local;
pub mod manager;
pub mod provider;
pub mod sim;

pub use bus::{CanBus, VirtualBus};
pub use capture_log::CaptureLog;
pub use config::HostConfig;
pub use device_manager::DeviceManager;
pub use devices::DeviceHandler;
pub use error::{BusError, HostError, HostResult};
pub use local::LocalTransport;
pub use manager::{ProviderManager, RpcService};
pub use provider::{BusProvider, DeviceProvider};
