//! Cryostation s-series REST Driver
//!
//! This crate provides a driver for s-series Cryostation cryostats, whose
//! controller exposes a JSON property tree over a RESTful HTTP API.
//!
//! # Communication
//!
//! HTTP GET/PUT/POST against the controller's property tree (default port
//! 47101, `/v1` root). Properties are read with GET and written with PUT
//! (body `{leafName: value}`); controller actions are invoked by POSTing to
//! `()`-suffixed pseudo-paths such as `/controller/methods/cooldown()`.
//!
//! # Capabilities
//!
//! - `Readable` - Platform temperature in kelvin
//! - `Settable` - Named attributes (platform/sample temperatures, setpoint, stability flag)
//! - `Commandable` - Controller actions (cooldown, warmup, vent, pull_vacuum, abort)
//!
//! # Usage
//!
//! ```rust,ignore
//! use cryo_driver_cryostation::CryostationFactory;
//! use cryo_core::driver::DriverFactory;
//!
//! // Register the factory
//! registry.register_factory(Box::new(CryostationFactory));
//!
//! // Create via config
//! let config = toml::toml! {
//!     host = "192.168.1.123"
//! };
//! let components = factory.build(config.into()).await?;
//! ```
//!
//! # Mock Mode
//!
//! For testing without hardware, set `mock = true` in the configuration. The
//! mock serves an in-memory property tree with the same envelope semantics
//! as the firmware.

mod driver;
mod rest;

pub use driver::{
    CryostationConfig, CryostationDriver, CryostationFactory, PressureSample, ThermometerSample,
};
pub use rest::{
    envelope_field, leaf, MockRestClient, RecordedRequest, RestClient, RestMethod, RestOps,
    API_ROOT, DEFAULT_PORT,
};

/// Force linker to include this crate's factories.
/// Call this from the composition root to ensure the factory is available.
#[inline(never)]
pub fn link() {
    std::hint::black_box(std::any::TypeId::of::<CryostationFactory>());
}
