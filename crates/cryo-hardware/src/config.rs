//! Configuration loading for the device registry.
//!
//! Devices are declared in a single TOML file, one table per device:
//!
//! ```toml
//! [devices.cryo]
//! type = "cryostation"
//! name = "Lab Cryostation"
//! host = "192.168.1.123"
//! ```
//!
//! The `type` field selects the driver factory; `name` is optional and
//! defaults to the device id. Everything else in the table is handed to the
//! factory unchanged.

use crate::registry::{DeviceConfig, DeviceRegistry};
use anyhow::{Context, Result};
use figment::{
    providers::{Format, Toml},
    Figment,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Error types for device-file loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    /// File not found
    #[error("Device file not found: {0}")]
    NotFound(String),

    /// Parse error (invalid TOML or wrong shape)
    #[error("Failed to parse device file: {0}")]
    ParseError(String),

    /// A device entry is missing required fields
    #[error("Invalid device entry '{0}': {1}")]
    InvalidEntry(String, String),
}

/// Top-level shape of the device file.
#[derive(Debug, Deserialize)]
struct DeviceFile {
    /// Device tables keyed by id; BTreeMap for deterministic order
    #[serde(default)]
    devices: BTreeMap<String, toml::Value>,
}

/// Load device configurations from a TOML file.
///
/// Returns one [`DeviceConfig`] per `[devices.*]` entry, in id order.
/// Entries are only shape-checked here; driver-specific validation happens
/// in the factory when the device is registered.
pub fn load_device_configs(path: &Path) -> Result<Vec<DeviceConfig>> {
    if !path.exists() {
        return Err(ConfigLoadError::NotFound(path.display().to_string()).into());
    }

    debug!("Loading device file from: {}", path.display());

    let file: DeviceFile = Figment::new()
        .merge(Toml::file(path))
        .extract()
        .map_err(|e| ConfigLoadError::ParseError(e.to_string()))?;

    let mut configs = Vec::with_capacity(file.devices.len());
    for (id, entry) in file.devices {
        configs.push(split_entry(&id, entry)?);
    }

    info!(
        "Loaded {} device entr{} from {}",
        configs.len(),
        if configs.len() == 1 { "y" } else { "ies" },
        path.display()
    );

    Ok(configs)
}

/// Split a device table into identity fields and factory parameters.
fn split_entry(id: &str, entry: toml::Value) -> Result<DeviceConfig> {
    let mut table = match entry {
        toml::Value::Table(table) => table,
        other => {
            return Err(ConfigLoadError::InvalidEntry(
                id.to_string(),
                format!("expected a table, got {}", other.type_str()),
            )
            .into())
        }
    };

    let driver_type = match table.remove("type") {
        Some(toml::Value::String(s)) => s,
        Some(other) => {
            return Err(ConfigLoadError::InvalidEntry(
                id.to_string(),
                format!("'type' must be a string, got {}", other.type_str()),
            )
            .into())
        }
        None => {
            return Err(
                ConfigLoadError::InvalidEntry(id.to_string(), "missing 'type' field".into()).into(),
            )
        }
    };

    let name = match table.remove("name") {
        Some(toml::Value::String(s)) => s,
        Some(other) => {
            return Err(ConfigLoadError::InvalidEntry(
                id.to_string(),
                format!("'name' must be a string, got {}", other.type_str()),
            )
            .into())
        }
        None => id.to_string(),
    };

    Ok(DeviceConfig {
        id: id.to_string(),
        name,
        driver_type,
        params: toml::Value::Table(table),
    })
}

/// Load a device file and register every entry with the registry.
///
/// Fails on the first entry that cannot be registered: a device server with
/// a missing instrument should not come up half-configured.
pub async fn register_from_file(registry: &mut DeviceRegistry, path: &Path) -> Result<()> {
    for config in load_device_configs(path)? {
        let id = config.id.clone();
        registry
            .add_device(config)
            .await
            .with_context(|| format!("registering device '{}'", id))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cryo_driver_cryostation::CryostationFactory;
    use std::io::Write;

    fn write_temp(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_device_configs() {
        let file = write_temp(
            r#"
            [devices.cryo]
            type = "cryostation"
            name = "Lab Cryostation"
            host = "192.168.1.123"

            [devices.cryo_spare]
            type = "cryostation"
            host = "192.168.1.124"
            mock = true
            "#,
        );

        let configs = load_device_configs(file.path()).unwrap();
        assert_eq!(configs.len(), 2);

        assert_eq!(configs[0].id, "cryo");
        assert_eq!(configs[0].name, "Lab Cryostation");
        assert_eq!(configs[0].driver_type, "cryostation");
        // Identity fields are stripped from the factory params.
        assert!(configs[0].params.get("type").is_none());
        assert_eq!(
            configs[0].params.get("host").and_then(|v| v.as_str()),
            Some("192.168.1.123")
        );

        // Name defaults to the id.
        assert_eq!(configs[1].name, "cryo_spare");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = load_device_configs(Path::new("/no/such/devices.toml")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_entry_without_type_is_an_error() {
        let file = write_temp(
            r#"
            [devices.cryo]
            host = "192.168.1.123"
            "#,
        );

        let err = load_device_configs(file.path()).unwrap_err();
        assert!(err.to_string().contains("missing 'type'"));
    }

    #[tokio::test]
    async fn test_register_from_file() {
        let file = write_temp(
            r#"
            [devices.cryo]
            type = "cryostation"
            host = "192.168.1.123"
            mock = true
            "#,
        );

        let mut registry = DeviceRegistry::new();
        registry.register_factory(Box::new(CryostationFactory));

        register_from_file(&mut registry, file.path()).await.unwrap();
        assert!(registry.contains("cryo"));
        assert!(registry.get_commandable("cryo").is_some());
    }

    #[tokio::test]
    async fn test_register_from_file_fails_on_unknown_type() {
        let file = write_temp(
            r#"
            [devices.mystery]
            type = "maglev"
            host = "192.168.1.123"
            "#,
        );

        let mut registry = DeviceRegistry::new();
        registry.register_factory(Box::new(CryostationFactory));

        let err = register_from_file(&mut registry, file.path())
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("No driver factory"));
    }
}
