//! Driver Factory and Component Types
//!
//! This module provides the plumbing for dynamically registered drivers.
//! Drivers implement [`DriverFactory`] and are registered with the
//! DeviceRegistry at startup via explicit `registry.register_factory(...)`
//! calls. The factory parses a TOML config table, instantiates the driver,
//! and returns a [`DeviceComponents`] bag of capability trait objects.
//!
//! # Example: Implementing a Driver Factory
//!
//! ```rust,ignore
//! use cryo_core::driver::{DriverFactory, DeviceComponents, Capability};
//! use futures::future::BoxFuture;
//! use std::sync::Arc;
//!
//! pub struct CryostationFactory;
//!
//! impl DriverFactory for CryostationFactory {
//!     fn driver_type(&self) -> &'static str { "cryostation" }
//!     fn name(&self) -> &'static str { "Cryostation s-series" }
//!     fn capabilities(&self) -> &'static [Capability] {
//!         &[Capability::Readable, Capability::Settable, Capability::Commandable]
//!     }
//!
//!     fn validate(&self, config: &toml::Value) -> anyhow::Result<()> {
//!         let table = config.as_table().ok_or_else(|| anyhow::anyhow!("expected table"))?;
//!         if !table.contains_key("host") {
//!             anyhow::bail!("missing 'host' field");
//!         }
//!         Ok(())
//!     }
//!
//!     fn build(&self, config: toml::Value) -> BoxFuture<'static, anyhow::Result<DeviceComponents>> {
//!         Box::pin(async move {
//!             let cfg: CryostationConfig = config.try_into()?;
//!             let driver = CryostationDriver::new_async(&cfg.host, cfg.port, cfg.mock).await?;
//!             Ok(DeviceComponents::new()
//!                 .with_readable(driver.clone())
//!                 .with_commandable(driver))
//!         })
//!     }
//! }
//! ```

use crate::capabilities::{Commandable, Readable, Settable};
use anyhow::Result;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// =============================================================================
// Capability Enum (Runtime Introspection)
// =============================================================================

/// Runtime capability flags for device introspection.
///
/// Mirrors the capability traits as an enum so callers can query what a
/// device supports without checking each trait object individually.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Can read scalar values (thermometers, pressure gauges)
    /// Corresponds to [`crate::capabilities::Readable`]
    Readable,

    /// Has named attributes that can be read/written
    /// Corresponds to [`crate::capabilities::Settable`]
    Settable,

    /// Can execute named commands (cooldown, warmup, vent, …)
    /// Corresponds to [`crate::capabilities::Commandable`]
    Commandable,
}

impl Capability {
    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Readable => "Readable",
            Self::Settable => "Settable",
            Self::Commandable => "Commandable",
        }
    }
}

// =============================================================================
// Device Components (Capability Bag)
// =============================================================================

/// Container for capability trait objects returned by drivers.
///
/// When a driver is instantiated, it returns a `DeviceComponents` struct
/// containing the capabilities it implements. The registry uses these to
/// populate its internal maps for capability-based lookups.
///
/// Storing each capability separately avoids runtime downcasting, keeps
/// capability access type-safe, and lets drivers implement only what they
/// support.
#[derive(Default)]
pub struct DeviceComponents {
    /// Readable implementation (scalar measurements)
    pub readable: Option<Arc<dyn Readable>>,

    /// Settable implementation (named attributes)
    pub settable: Option<Arc<dyn Settable>>,

    /// Commandable implementation (named commands)
    pub commandable: Option<Arc<dyn Commandable>>,

    /// Capability-specific metadata (units, ranges)
    pub metadata: DeviceMetadata,
}

impl DeviceComponents {
    /// Create a new empty DeviceComponents
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the list of capabilities this device supports
    pub fn capabilities(&self) -> Vec<Capability> {
        let mut caps = Vec::new();

        if self.readable.is_some() {
            caps.push(Capability::Readable);
        }
        if self.settable.is_some() {
            caps.push(Capability::Settable);
        }
        if self.commandable.is_some() {
            caps.push(Capability::Commandable);
        }

        caps
    }

    // Builder methods

    /// Set Readable implementation
    pub fn with_readable(mut self, r: Arc<dyn Readable>) -> Self {
        self.readable = Some(r);
        self
    }

    /// Set Settable implementation
    pub fn with_settable(mut self, s: Arc<dyn Settable>) -> Self {
        self.settable = Some(s);
        self
    }

    /// Set Commandable implementation
    pub fn with_commandable(mut self, c: Arc<dyn Commandable>) -> Self {
        self.commandable = Some(c);
        self
    }

    /// Set device metadata
    pub fn with_metadata(mut self, metadata: DeviceMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

// =============================================================================
// Device Metadata
// =============================================================================

/// Capability-specific metadata for a device.
///
/// Holds information about device capabilities that isn't captured in the
/// trait objects themselves.
#[derive(Debug, Clone, Default)]
pub struct DeviceMetadata {
    /// For Readable devices: measurement units (e.g., "K", "torr")
    pub measurement_units: Option<String>,

    /// For Settable temperature controllers: minimum setpoint in kelvin
    pub min_temperature_k: Option<f64>,

    /// For Settable temperature controllers: maximum setpoint in kelvin
    pub max_temperature_k: Option<f64>,
}

// =============================================================================
// Driver Factory Trait
// =============================================================================

/// Trait for driver factories that create device instances.
///
/// Each driver crate implements this trait to register itself with the
/// DeviceRegistry. The factory is responsible for:
///
/// 1. Declaring what driver type it handles (matching the TOML `type` field)
/// 2. Validating configuration before instantiation
/// 3. Asynchronously creating the driver and returning capabilities
///
/// # Lifetime
///
/// Factories are registered once at startup and live for the program's
/// lifetime. They must be `Send + Sync + 'static` because they may be called
/// from any task.
///
/// # Error Handling
///
/// Both `validate()` and `build()` return `Result`. Validation errors should
/// be descriptive and actionable. Build errors may include connection
/// failures reaching the instrument.
pub trait DriverFactory: Send + Sync + 'static {
    /// Driver type name used in the TOML config `type` field.
    ///
    /// This must match exactly what users write in their config:
    /// ```toml
    /// [devices.cryo]
    /// type = "cryostation"  # matches driver_type() returning "cryostation"
    /// ```
    fn driver_type(&self) -> &'static str;

    /// Human-readable name for documentation and error messages.
    fn name(&self) -> &'static str;

    /// List of capabilities this driver type provides.
    ///
    /// Used for introspection; the actual capabilities are determined by
    /// what `build()` populates in its `DeviceComponents`.
    fn capabilities(&self) -> &'static [Capability] {
        &[]
    }

    /// Validate configuration without instantiating.
    ///
    /// Called before `build()` to provide early error feedback. Should check
    /// that all required fields exist and have valid values.
    fn validate(&self, config: &toml::Value) -> Result<()>;

    /// Async instantiation of the driver.
    ///
    /// Called after validation passes. Parses the configuration, opens the
    /// connection to the instrument, and returns `DeviceComponents` with all
    /// implemented capabilities.
    fn build(&self, config: toml::Value) -> BoxFuture<'static, Result<DeviceComponents>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    #[test]
    fn test_capability_name() {
        assert_eq!(Capability::Readable.name(), "Readable");
        assert_eq!(Capability::Commandable.name(), "Commandable");
    }

    #[test]
    fn test_capability_serde() {
        let cap = Capability::Readable;
        let json = serde_json::to_string(&cap).unwrap();
        assert_eq!(json, "\"readable\"");

        let cap: Capability = serde_json::from_str("\"commandable\"").unwrap();
        assert_eq!(cap, Capability::Commandable);
    }

    #[test]
    fn test_device_components_empty() {
        let empty = DeviceComponents::new();
        assert!(empty.capabilities().is_empty());
    }

    struct FixedThermometer(f64);

    #[async_trait]
    impl crate::capabilities::Readable for FixedThermometer {
        async fn read(&self) -> Result<f64> {
            Ok(self.0)
        }
    }

    #[test]
    fn test_device_components_builder() {
        let components = DeviceComponents::new()
            .with_readable(Arc::new(FixedThermometer(4.2)))
            .with_metadata(DeviceMetadata {
                measurement_units: Some("K".to_string()),
                min_temperature_k: Some(2.0),
                max_temperature_k: Some(350.0),
            });

        assert_eq!(components.capabilities(), vec![Capability::Readable]);
        assert_eq!(components.metadata.measurement_units.as_deref(), Some("K"));
    }
}
