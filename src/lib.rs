//! UART Device Agent Library
//!
//! Mediates byte-level access to devices attached over serial (UART) links,
//! exposing three access disciplines over one physical-port abstraction:
//!
//! - **generic**: bounded request/response reads and writes over a
//!   long-lived per-device connection;
//! - **monitor**: a continuous background listener that drains the line so
//!   bursts between polls are not lost;
//! - **transceiver**: one-shot write-then-read transactions over a fresh
//!   connection per call.
//!
//! # Modules
//!
//! - `port`: serial connection lifecycle and the `SerialLink` seam
//! - `channel`: the per-mode read/accumulate/terminate algorithms
//! - `registry`: lazy location-keyed channel registry
//! - `driver`: host-facing facade (attributes, typed values, lifecycle)
//! - `config`: TOML configuration with environment overrides
//! - `error`: driver-level error handling

pub mod channel;
pub mod config;
pub mod driver;
pub mod error;
pub mod port;
pub mod registry;

// Re-export commonly used types for convenience
pub use channel::{
    GenericChannel, ListenerChannel, TransactionChannel, POLL_READ_TIMEOUT, START_GRACE_PERIOD,
};
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
pub use driver::{
    AccessMode, CommandValue, DeviceAttributes, DeviceDriver, DriverDefaults, ValueKind,
};
pub use error::DriverError;
pub use port::{MockLink, MockStep, PortConfig, PortError, PortHandle, SerialLink, SyncSerialLink};
pub use registry::ChannelRegistry;
