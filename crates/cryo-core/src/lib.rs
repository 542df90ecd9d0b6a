//! `cryo-core`
//!
//! Core trait definitions and types for the cryo-daq instrument stack.
//!
//! This crate provides the building blocks shared by the driver crates and
//! the device registry:
//!
//! - Capability traits ([`capabilities::Readable`], [`capabilities::Settable`],
//!   [`capabilities::Commandable`]) that drivers implement piecemeal
//! - The [`driver::DriverFactory`] / [`driver::DeviceComponents`] plumbing used
//!   to instantiate drivers from TOML configuration
//! - The [`error::CryoError`] taxonomy for configuration and surface errors
//!   (transport errors inside calls stay as `anyhow` chains)

pub mod capabilities;
pub mod driver;
pub mod error;

// Re-export commonly used types
pub use anyhow::{anyhow, Result};
pub use error::{AppResult, CryoError, DriverError, DriverErrorKind};
