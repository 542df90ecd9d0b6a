//! Atomic Device Capabilities
//!
//! This module defines fine-grained capability traits that instrument drivers
//! can implement. Instead of one monolithic device trait, drivers implement
//! the specific capabilities they actually support:
//!
//! - A thermometer channel implements: `Readable`
//! - A temperature controller implements: `Readable + Settable + Commandable`
//!
//! Each capability trait:
//! - Is async (uses #[async_trait])
//! - Is thread-safe (requires Send + Sync)
//! - Uses anyhow::Result for errors
//! - Focuses on ONE thing
//!
//! Methods take `&self` so implementations can be shared as `Arc<dyn …>`
//! trait objects; drivers use interior mutability where they hold state.

use anyhow::Result;
use async_trait::async_trait;

/// Capability: Scalar Readout
///
/// Devices that produce single scalar values (thermometers, pressure gauges).
///
/// # Contract
/// - `read()` performs a measurement and returns the value
/// - Units are device-specific (document in the implementation)
/// - Reading blocks on one round trip to the instrument, nothing more
#[async_trait]
pub trait Readable: Send + Sync {
    /// Read the current value.
    ///
    /// Units depend on the device (kelvin, torr, …).
    ///
    /// # Returns
    /// - Ok(value) on successful read
    /// - Err on a transport or decode failure, unmodified
    async fn read(&self) -> Result<f64>;
}

/// Capability: Named Attributes
///
/// Devices exposing a table of named attributes that can be read and, where
/// the instrument allows it, written. This is the surface a device server
/// maps its attributes onto.
///
/// # Contract
/// - Values are `serde_json::Value` for flexibility (f64, bool, string)
/// - Writing a read-only attribute is an error
/// - No client-side range validation: bounds checking is instrument-side
#[async_trait]
pub trait Settable: Send + Sync {
    /// Set a named attribute to a new value.
    ///
    /// # Arguments
    /// * `name` - The identifier for the attribute to set.
    /// * `value` - The new value for the attribute.
    async fn set_value(&self, name: &str, value: serde_json::Value) -> Result<()>;

    /// Get the current value of a named attribute.
    ///
    /// # Arguments
    /// * `name` - The identifier for the attribute to query.
    async fn get_value(&self, name: &str) -> Result<serde_json::Value> {
        anyhow::bail!("Get value for '{}' not supported by this device", name)
    }
}

/// Capability: Generic Command Execution
///
/// Devices that can execute named commands with structured arguments
/// (cooldown, warmup, vent, …). This is the surface a device server maps its
/// bare actions onto.
///
/// # Contract
/// - `execute_command()` takes a command name and JSON arguments
/// - Returns the instrument's decoded response
/// - Unknown command names are errors, not no-ops
#[async_trait]
pub trait Commandable: Send + Sync {
    /// Execute a named command.
    ///
    /// # Arguments
    /// * `command` - Command identifier
    /// * `args` - Command arguments as a JSON object (may be ignored by
    ///   no-argument commands)
    ///
    /// # Returns
    /// - Ok(JSON value) with the instrument's response
    /// - Err if the command is unknown or execution failed
    async fn execute_command(
        &self,
        command: &str,
        args: serde_json::Value,
    ) -> Result<serde_json::Value>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockThermometer;

    #[async_trait]
    impl Readable for MockThermometer {
        async fn read(&self) -> Result<f64> {
            Ok(4.2)
        }
    }

    #[tokio::test]
    async fn test_readable_trait() {
        let thermometer = MockThermometer;
        let kelvin = thermometer.read().await.unwrap();
        assert!((kelvin - 4.2).abs() < f64::EPSILON);
    }

    struct MockController {
        target: std::sync::Mutex<f64>,
    }

    #[async_trait]
    impl Settable for MockController {
        async fn set_value(&self, name: &str, value: serde_json::Value) -> Result<()> {
            match name {
                "target_temperature" => {
                    let kelvin = value
                        .as_f64()
                        .ok_or_else(|| anyhow::anyhow!("expected a number"))?;
                    *self.target.lock().unwrap() = kelvin;
                    Ok(())
                }
                other => anyhow::bail!("unknown attribute '{}'", other),
            }
        }

        async fn get_value(&self, name: &str) -> Result<serde_json::Value> {
            match name {
                "target_temperature" => Ok(serde_json::json!(*self.target.lock().unwrap())),
                other => anyhow::bail!("unknown attribute '{}'", other),
            }
        }
    }

    #[tokio::test]
    async fn test_settable_round_trip() {
        let controller = MockController {
            target: std::sync::Mutex::new(295.0),
        };

        controller
            .set_value("target_temperature", serde_json::json!(3.1))
            .await
            .unwrap();
        let value = controller.get_value("target_temperature").await.unwrap();
        assert_eq!(value, serde_json::json!(3.1));

        assert!(controller
            .set_value("nonexistent", serde_json::json!(0))
            .await
            .is_err());
    }
}
