//! Device Registry for Runtime Hardware Management
//!
//! Central registry for registering and looking up instrument drivers at
//! runtime. Factories are registered once at the composition root; devices
//! are then instantiated from configuration and accessed through capability
//! trait objects:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                Composition Root (main.rs)                  │
//! │  registry.register_factory(Box::new(CryostationFactory)); │
//! └────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌────────────────────────────────────────────────────────────┐
//! │                      DeviceRegistry                        │
//! │  factories: HashMap<driver_type, Box<dyn DriverFactory>>  │
//! │  devices: HashMap<device_id, DeviceComponents>            │
//! └────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌────────────────────────────────────────────────────────────┐
//! │                 Capability Traits                          │
//! │         Readable | Settable | Commandable                  │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! This is the surface a device server hangs its attributes and actions on:
//! read/write attributes resolve through `get_readable`/`get_settable`,
//! bare actions through `get_commandable`, and each call is a direct
//! pass-through to the driver; failures are not caught here.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut registry = DeviceRegistry::new();
//! registry.register_factory(Box::new(CryostationFactory));
//!
//! registry.add_device(DeviceConfig {
//!     id: "cryo".into(),
//!     name: "Lab Cryostation".into(),
//!     driver_type: "cryostation".into(),
//!     params: toml::toml! { host = "192.168.1.123" }.into(),
//! }).await?;
//!
//! let thermometer = registry.get_readable("cryo").unwrap();
//! let kelvin = thermometer.read().await?;
//! ```

use anyhow::{anyhow, Result};
use cryo_core::capabilities::{Commandable, Readable, Settable};
use cryo_core::driver::{Capability, DeviceComponents, DeviceMetadata, DriverFactory};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Unique identifier for a registered device.
///
/// Format: lowercase alphanumeric with underscores (e.g., "cryo", "cryo_2").
pub type DeviceId = String;

// =============================================================================
// Device Configuration
// =============================================================================

/// Configuration for registering a device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Unique identifier (e.g., "cryo")
    pub id: DeviceId,
    /// Human-readable name (e.g., "Lab Cryostation")
    pub name: String,
    /// Driver type, matching a registered factory (e.g., "cryostation")
    pub driver_type: String,
    /// Driver-specific parameters handed to the factory
    pub params: toml::Value,
}

/// Information about a registered device (returned by list operations)
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    /// Unique identifier
    pub id: DeviceId,
    /// Human-readable name
    pub name: String,
    /// Driver type name (e.g., "cryostation")
    pub driver_type: String,
    /// Capabilities this device supports
    pub capabilities: Vec<Capability>,
    /// Capability-specific metadata
    pub metadata: DeviceMetadata,
}

/// A registered device with its capability objects and metadata
struct RegisteredDevice {
    config: DeviceConfig,
    components: DeviceComponents,
}

// =============================================================================
// Device Registry
// =============================================================================

/// Central registry for hardware device management.
///
/// The registry is the primary interface for:
/// - Registering driver factories at startup
/// - Instantiating devices from configuration
/// - Accessing devices by capability
/// - Querying device information
#[derive(Default)]
pub struct DeviceRegistry {
    /// Registered factories by driver type
    factories: HashMap<&'static str, Box<dyn DriverFactory>>,

    /// Registered devices by ID
    devices: HashMap<DeviceId, RegisteredDevice>,
}

impl DeviceRegistry {
    /// Create a new empty device registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a driver factory.
    ///
    /// Replaces any previously registered factory for the same driver type.
    pub fn register_factory(&mut self, factory: Box<dyn DriverFactory>) {
        tracing::debug!("Registering driver factory '{}'", factory.driver_type());
        self.factories.insert(factory.driver_type(), factory);
    }

    /// Driver types with a registered factory, sorted.
    pub fn driver_types(&self) -> Vec<&'static str> {
        let mut types: Vec<_> = self.factories.keys().copied().collect();
        types.sort_unstable();
        types
    }

    /// Register a device from configuration.
    ///
    /// Validates the configuration with the matching factory, instantiates
    /// the driver, and stores its capability objects.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The device ID is already registered
    /// - No factory is registered for the driver type
    /// - Configuration validation fails
    /// - The driver fails to initialize (instrument unreachable)
    pub async fn add_device(&mut self, config: DeviceConfig) -> Result<()> {
        if self.devices.contains_key(&config.id) {
            return Err(anyhow!("Device '{}' is already registered", config.id));
        }

        let factory = self.factories.get(config.driver_type.as_str()).ok_or_else(|| {
            anyhow!(
                "No driver factory registered for type '{}' (known: {})",
                config.driver_type,
                self.driver_types().join(", ")
            )
        })?;

        factory.validate(&config.params).map_err(|e| {
            anyhow!(
                "Configuration validation failed for device '{}' ({}): {}",
                config.id,
                config.driver_type,
                e
            )
        })?;

        let components = factory.build(config.params.clone()).await?;
        tracing::info!(
            "Registered device '{}' ({}) with capabilities {:?}",
            config.id,
            config.driver_type,
            components.capabilities()
        );

        self.devices
            .insert(config.id.clone(), RegisteredDevice { config, components });
        Ok(())
    }

    /// Unregister a device.
    ///
    /// # Returns
    /// true if the device was found and removed, false if not found
    pub fn unregister(&mut self, id: &str) -> bool {
        self.devices.remove(id).is_some()
    }

    /// List all registered devices
    pub fn list_devices(&self) -> Vec<DeviceInfo> {
        self.devices
            .values()
            .map(|d| DeviceInfo {
                id: d.config.id.clone(),
                name: d.config.name.clone(),
                driver_type: d.config.driver_type.clone(),
                capabilities: d.components.capabilities(),
                metadata: d.components.metadata.clone(),
            })
            .collect()
    }

    /// Get device info by ID
    pub fn get_device_info(&self, id: &str) -> Option<DeviceInfo> {
        self.devices.get(id).map(|d| DeviceInfo {
            id: d.config.id.clone(),
            name: d.config.name.clone(),
            driver_type: d.config.driver_type.clone(),
            capabilities: d.components.capabilities(),
            metadata: d.components.metadata.clone(),
        })
    }

    /// Check if a device is registered
    pub fn contains(&self, id: &str) -> bool {
        self.devices.contains_key(id)
    }

    /// Get count of registered devices
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    // =========================================================================
    // Capability Access
    // =========================================================================

    /// Get a device as Readable (if it supports this capability)
    pub fn get_readable(&self, id: &str) -> Option<Arc<dyn Readable>> {
        self.devices.get(id).and_then(|d| d.components.readable.clone())
    }

    /// Get a device as Settable (if it supports this capability)
    pub fn get_settable(&self, id: &str) -> Option<Arc<dyn Settable>> {
        self.devices.get(id).and_then(|d| d.components.settable.clone())
    }

    /// Get a device as Commandable (if it supports this capability)
    pub fn get_commandable(&self, id: &str) -> Option<Arc<dyn Commandable>> {
        self.devices
            .get(id)
            .and_then(|d| d.components.commandable.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cryo_driver_cryostation::CryostationFactory;
    use serde_json::json;

    fn mock_device_config(id: &str) -> DeviceConfig {
        DeviceConfig {
            id: id.to_string(),
            name: "Test Cryostation".to_string(),
            driver_type: "cryostation".to_string(),
            params: toml::Value::Table(toml::toml! {
                host = "192.168.1.123"
                mock = true
            }),
        }
    }

    fn registry_with_factory() -> DeviceRegistry {
        let mut registry = DeviceRegistry::new();
        registry.register_factory(Box::new(CryostationFactory));
        registry
    }

    #[tokio::test]
    async fn test_add_and_list_devices() {
        let mut registry = registry_with_factory();
        assert!(registry.is_empty());

        registry.add_device(mock_device_config("cryo")).await.unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("cryo"));

        let devices = registry.list_devices();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].driver_type, "cryostation");
        assert!(devices[0].capabilities.contains(&Capability::Readable));
        assert!(devices[0].capabilities.contains(&Capability::Commandable));
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let mut registry = registry_with_factory();

        registry.add_device(mock_device_config("cryo")).await.unwrap();
        let err = registry
            .add_device(mock_device_config("cryo"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already registered"));
    }

    #[tokio::test]
    async fn test_unknown_driver_type_rejected() {
        let mut registry = registry_with_factory();

        let mut config = mock_device_config("cryo");
        config.driver_type = "maglev".to_string();
        let err = registry.add_device(config).await.unwrap_err();
        assert!(err.to_string().contains("No driver factory"));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_before_build() {
        let mut registry = registry_with_factory();

        let mut config = mock_device_config("cryo");
        config.params = toml::Value::Table(toml::toml! {
            host = ""
            mock = true
        });
        let err = registry.add_device(config).await.unwrap_err();
        assert!(err.to_string().contains("validation failed"));
    }

    #[tokio::test]
    async fn test_capability_accessors() {
        let mut registry = registry_with_factory();
        registry.add_device(mock_device_config("cryo")).await.unwrap();

        // Attributes pass straight through to the driver.
        let thermometer = registry.get_readable("cryo").unwrap();
        let kelvin = thermometer.read().await.unwrap();
        assert!(kelvin > 0.0);

        let settable = registry.get_settable("cryo").unwrap();
        settable
            .set_value("platform_target_temperature", json!(3.1))
            .await
            .unwrap();

        // Actions too.
        let commandable = registry.get_commandable("cryo").unwrap();
        commandable.execute_command("cooldown", json!({})).await.unwrap();

        // Absent devices yield None, not errors.
        assert!(registry.get_readable("nonexistent").is_none());
    }

    #[tokio::test]
    async fn test_unregister() {
        let mut registry = registry_with_factory();
        registry.add_device(mock_device_config("cryo")).await.unwrap();

        assert!(registry.unregister("cryo"));
        assert!(!registry.unregister("cryo"));
        assert!(registry.get_readable("cryo").is_none());
    }
}
