//! `cryo-hardware`
//!
//! Device registry and configuration loading for the cryo-daq stack.
//!
//! This crate is the device-server surface: driver factories are registered
//! at startup, devices are instantiated from a TOML device file, and callers
//! resolve capability trait objects (`Readable`, `Settable`, `Commandable`)
//! by device id. Every capability call is a direct pass-through to the
//! driver; a failed instrument call becomes a failed registry call.

pub mod config;
pub mod registry;

pub use config::{load_device_configs, register_from_file, ConfigLoadError};
pub use registry::{DeviceConfig, DeviceId, DeviceInfo, DeviceRegistry};

/// Registry with every built-in driver factory registered.
///
/// This is the composition root for the stock stack; callers embedding
/// additional drivers can keep registering factories on the result.
pub fn default_registry() -> DeviceRegistry {
    let mut registry = DeviceRegistry::new();
    registry.register_factory(Box::new(cryo_driver_cryostation::CryostationFactory));
    registry
}
