//! Cryostation REST Driver
//!
//! This module implements the driver for s-series Cryostation cryostats,
//! whose controller exposes a JSON property tree over HTTP. The driver is a
//! 1:1 forwarding layer: every named method aliases one fixed tree path and
//! optionally unwraps one envelope level. It holds no state beyond the
//! transport handle; every call is an independent HTTP request, and transport
//! errors propagate unchanged.
//!
//! # Example
//!
//! ```rust,ignore
//! let cryo = CryostationDriver::new_async("192.168.1.123", DEFAULT_PORT, false).await?;
//!
//! // High-level methods for common functions
//! cryo.cooldown().await?;
//! cryo.set_platform_target_temperature(3.1).await?;
//! let kelvin = cryo.get_platform_temperature().await?;
//! let (stable_ok, stability) = cryo.get_platform_temperature_stability().await?;
//! cryo.warmup().await?;
//!
//! // Generic post/get/put access to any tree path
//! cryo.call_method("/controller/methods/cooldown()").await?;
//! cryo.get_prop("/sampleChamber/temperatureControllers/platform/thermometer/properties/sample").await?;
//! cryo.set_prop("/controller/properties/platformTargetTemperature", 1.7).await?;
//! ```

use crate::rest::{envelope_field, leaf, MockRestClient, RestClient, RestOps, DEFAULT_PORT};
use anyhow::{Context, Result};
use async_trait::async_trait;
use cryo_core::capabilities::{Commandable, Readable, Settable};
use cryo_core::driver::{Capability, DeviceComponents, DeviceMetadata, DriverFactory};
use cryo_core::CryoError;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the Cryostation driver
#[derive(Debug, Clone, Deserialize)]
pub struct CryostationConfig {
    /// Hostname or IP address of the controller
    pub host: String,

    /// REST port (default: 47101)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Enable mock mode for testing without hardware
    #[serde(default)]
    pub mock: bool,

    /// Platform setpoint to apply at startup, in kelvin (optional)
    #[serde(default)]
    pub initial_target_temperature: Option<f64>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

// =============================================================================
// Typed Envelopes
// =============================================================================

/// Thermometer sample envelope as reported by the firmware.
///
/// Only the platform/user channels populate the stability fields; cooler
/// stage thermometers report just `temperature` and `temperatureOK`, so
/// everything beyond `temperature` defaults when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThermometerSample {
    /// Temperature in kelvin
    pub temperature: f64,

    /// Reading is within the sensor's calibrated range
    #[serde(rename = "temperatureOK", default)]
    pub temperature_ok: bool,

    /// Channel is inside its stability band
    #[serde(rename = "temperatureStable", default)]
    pub temperature_stable: bool,

    /// Stability statistics are valid
    #[serde(rename = "temperatureStabilityOK", default)]
    pub temperature_stability_ok: bool,

    /// Peak-to-peak stability over the firmware's sampling window, in kelvin
    #[serde(rename = "temperatureStability", default)]
    pub temperature_stability: f64,

    /// Temperature rate of change in kelvin per minute
    #[serde(rename = "temperatureSlope", default)]
    pub temperature_slope: f64,
}

/// Pressure sample envelope from a vacuum gauge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PressureSample {
    /// Pressure in torr
    pub pressure: f64,

    /// Reading is within the gauge's range
    #[serde(rename = "pressureOK", default)]
    pub pressure_ok: bool,
}

// =============================================================================
// CryostationDriver
// =============================================================================

/// Driver for s-series Cryostation cryostats.
///
/// Communicates with the controller's REST property tree. Stateless aside
/// from the transport handle: no session, no reconnection logic, no retry.
/// Numeric arguments are forwarded without range validation; bounds
/// checking is instrument-side.
pub struct CryostationDriver {
    /// REST transport (hardware client or mock)
    client: Arc<dyn RestOps>,
}

impl CryostationDriver {
    /// Create a new driver talking to the controller at `host:port`.
    ///
    /// # Arguments
    /// * `host` - Hostname or IP address
    /// * `port` - REST port (typically 47101)
    /// * `mock` - If true, use the in-memory mock transport
    ///
    /// # Returns
    /// * `Ok(Arc<Self>)` once the controller answered a probe request
    /// * `Err` if the probe fails
    pub async fn new_async(host: &str, port: u16, mock: bool) -> Result<Arc<Self>> {
        let client: Arc<dyn RestOps> = if mock {
            tracing::info!("Creating mock Cryostation driver");
            Arc::new(MockRestClient::new())
        } else {
            tracing::info!("Connecting to Cryostation at {}:{}", host, port);
            Arc::new(RestClient::new(host, port)?)
        };

        let driver = Arc::new(Self::with_transport(client));

        // Validate the controller is reachable before handing the driver out
        driver.validate_connection().await?;

        tracing::info!("Cryostation driver initialized (mock={})", mock);

        Ok(driver)
    }

    /// Build a driver over an existing transport. Used by `new_async` and by
    /// tests that need a handle on the mock.
    pub fn with_transport(client: Arc<dyn RestOps>) -> Self {
        Self { client }
    }

    /// Probe the controller by reading the platform thermometer once.
    async fn validate_connection(&self) -> Result<()> {
        let sample = self.get_platform_temperature_sample().await?;
        tracing::debug!("Validated connection: platform={} K", sample.temperature);
        Ok(())
    }

    // =========================================================================
    // Generic Tree Access
    // =========================================================================

    /// POST to an action endpoint (a `()`-suffixed pseudo-path).
    ///
    /// No request body; returns the raw decoded response. Errors from the
    /// transport (connection refused, non-2xx status) propagate unchanged.
    pub async fn call_method(&self, path: &str) -> Result<Value> {
        self.client.post_json(path).await
    }

    /// GET a property; returns the decoded JSON envelope unmodified.
    pub async fn get_prop(&self, path: &str) -> Result<Value> {
        self.client.get_json(path).await
    }

    /// PUT a property value, wrapped as `{leafName: value}` where `leafName`
    /// is the trailing path segment; returns the decoded response.
    pub async fn set_prop<T: Serialize>(&self, path: &str, value: T) -> Result<Value> {
        let body = json!({ leaf(path): serde_json::to_value(value)? });
        self.client.put_json(path, body).await
    }

    /// GET a thermometer sample envelope and decode its `sample` field.
    async fn get_thermometer_sample(&self, path: &str) -> Result<ThermometerSample> {
        let r = self.get_prop(path).await?;
        let sample = envelope_field(&r, "sample")?;
        serde_json::from_value(sample).with_context(|| format!("decoding sample from {}", path))
    }

    /// GET a scalar property and decode the envelope field named by the leaf.
    async fn get_scalar_prop(&self, path: &str) -> Result<f64> {
        let r = self.get_prop(path).await?;
        let value = envelope_field(&r, leaf(path))?;
        value
            .as_f64()
            .with_context(|| format!("expected a number at {}, got {}", path, value))
    }

    /// GET a boolean property and decode the envelope field named by the leaf.
    async fn get_bool_prop(&self, path: &str) -> Result<bool> {
        let r = self.get_prop(path).await?;
        let value = envelope_field(&r, leaf(path))?;
        value
            .as_bool()
            .with_context(|| format!("expected a boolean at {}, got {}", path, value))
    }

    // =========================================================================
    // Controller Methods
    // =========================================================================

    /// Start a cooldown.
    pub async fn cooldown(&self) -> Result<Value> {
        self.call_method("/controller/methods/cooldown()").await
    }

    /// Start a warmup.
    pub async fn warmup(&self) -> Result<Value> {
        self.call_method("/controller/methods/warmup()").await
    }

    /// Vent the sample chamber.
    pub async fn vent(&self) -> Result<Value> {
        self.call_method("/controller/methods/vent()").await
    }

    /// Pump the sample chamber down to the pull-vacuum target pressure.
    pub async fn pull_vacuum(&self) -> Result<Value> {
        self.call_method("/controller/methods/pullVacuum()").await
    }

    /// Abort the active system goal (cooldown, warmup, vent, pull vacuum).
    pub async fn abort_goal(&self) -> Result<Value> {
        self.call_method("/controller/methods/abortGoal()").await
    }

    // =========================================================================
    // Platform Methods
    // =========================================================================

    /// Full platform thermometer sample.
    pub async fn get_platform_temperature_sample(&self) -> Result<ThermometerSample> {
        self.get_thermometer_sample(
            "/sampleChamber/temperatureControllers/platform/thermometer/properties/sample",
        )
        .await
    }

    /// Platform temperature in kelvin.
    pub async fn get_platform_temperature(&self) -> Result<f64> {
        Ok(self.get_platform_temperature_sample().await?.temperature)
    }

    /// Platform temperature rate of change in kelvin per minute.
    pub async fn get_platform_temperature_rate(&self) -> Result<f64> {
        Ok(self.get_platform_temperature_sample().await?.temperature_slope)
    }

    /// Platform stability as `(temperatureStabilityOK, temperatureStability)`.
    pub async fn get_platform_temperature_stability(&self) -> Result<(bool, f64)> {
        let sample = self.get_platform_temperature_sample().await?;
        Ok((sample.temperature_stability_ok, sample.temperature_stability))
    }

    /// Platform stability flag as `(temperatureStabilityOK, temperatureStable)`.
    pub async fn get_platform_temperature_stable(&self) -> Result<(bool, bool)> {
        let sample = self.get_platform_temperature_sample().await?;
        Ok((sample.temperature_stability_ok, sample.temperature_stable))
    }

    /// Raw platform heater sample (firmware schema not documented; returned verbatim).
    pub async fn get_platform_heater_sample(&self) -> Result<Value> {
        let r = self
            .get_prop("/sampleChamber/temperatureControllers/platform/heater/properties/sample")
            .await?;
        envelope_field(&r, "sample")
    }

    /// Set the platform setpoint in kelvin.
    pub async fn set_platform_target_temperature(&self, temperature: f64) -> Result<Value> {
        self.set_prop("/controller/properties/platformTargetTemperature", temperature)
            .await
    }

    /// Current platform setpoint in kelvin.
    pub async fn get_platform_target_temperature(&self) -> Result<f64> {
        self.get_scalar_prop("/controller/properties/platformTargetTemperature")
            .await
    }

    /// Set the platform stability target in kelvin.
    pub async fn set_platform_stability_target(&self, target: f64) -> Result<Value> {
        self.set_prop(
            "/sampleChamber/temperatureControllers/platform/thermometer/properties/stabilityTarget",
            target,
        )
        .await
    }

    // =========================================================================
    // Cooler Stage Methods
    // =========================================================================

    /// Full stage 1 thermometer sample.
    pub async fn get_stage1_temperature_sample(&self) -> Result<ThermometerSample> {
        self.get_thermometer_sample(
            "/cooler/temperatureControllers/stage1/thermometer/properties/sample",
        )
        .await
    }

    /// Stage 1 reading as `(temperatureOK, temperature)`.
    pub async fn get_stage1_temperature(&self) -> Result<(bool, f64)> {
        let sample = self.get_stage1_temperature_sample().await?;
        Ok((sample.temperature_ok, sample.temperature))
    }

    /// Full stage 2 thermometer sample.
    pub async fn get_stage2_temperature_sample(&self) -> Result<ThermometerSample> {
        self.get_thermometer_sample(
            "/cooler/temperatureControllers/stage2/thermometer/properties/sample",
        )
        .await
    }

    /// Stage 2 reading as `(temperatureOK, temperature)`.
    pub async fn get_stage2_temperature(&self) -> Result<(bool, f64)> {
        let sample = self.get_stage2_temperature_sample().await?;
        Ok((sample.temperature_ok, sample.temperature))
    }

    // =========================================================================
    // Sample (User1) Methods
    // =========================================================================

    /// Full sample thermometer sample (user1 channel).
    pub async fn get_sample_temperature_sample(&self) -> Result<ThermometerSample> {
        self.get_thermometer_sample(
            "/sampleChamber/temperatureControllers/user1/thermometer/properties/sample",
        )
        .await
    }

    /// Sample temperature in kelvin.
    pub async fn get_sample_temperature(&self) -> Result<f64> {
        Ok(self.get_sample_temperature_sample().await?.temperature)
    }

    /// Sample stability flag as `(temperatureStabilityOK, temperatureStable)`.
    pub async fn get_sample_temperature_stable(&self) -> Result<(bool, bool)> {
        let sample = self.get_sample_temperature_sample().await?;
        Ok((sample.temperature_stability_ok, sample.temperature_stable))
    }

    /// Set the sample channel stability target in kelvin.
    pub async fn set_sample_stability_target(&self, target: f64) -> Result<Value> {
        self.set_prop(
            "/sampleChamber/temperatureControllers/user1/thermometer/properties/stabilityTarget",
            target,
        )
        .await
    }

    /// Enable or disable the sample temperature controller.
    pub async fn set_sample_temperature_controller_enabled(&self, enabled: bool) -> Result<Value> {
        self.set_prop(
            "/sampleChamber/temperatureControllers/user1/properties/controllerEnabled",
            enabled,
        )
        .await
    }

    /// Set the sample channel setpoint in kelvin.
    pub async fn set_sample_temperature(&self, target: f64) -> Result<Value> {
        self.set_prop(
            "/sampleChamber/temperatureControllers/user1/properties/targetTemperature",
            target,
        )
        .await
    }

    /// Raw sample heater sample.
    pub async fn get_sample_heater_sample(&self) -> Result<Value> {
        let r = self
            .get_prop("/sampleChamber/temperatureControllers/user1/heater/properties/sample")
            .await?;
        envelope_field(&r, "sample")
    }

    // =========================================================================
    // User2 Methods
    // =========================================================================

    /// Full user2 thermometer sample.
    pub async fn get_user2_temperature_sample(&self) -> Result<ThermometerSample> {
        self.get_thermometer_sample(
            "/sampleChamber/temperatureControllers/user2/thermometer/properties/sample",
        )
        .await
    }

    /// User2 reading as `(temperatureOK, temperature)`.
    pub async fn get_user2_temperature(&self) -> Result<(bool, f64)> {
        let sample = self.get_user2_temperature_sample().await?;
        Ok((sample.temperature_ok, sample.temperature))
    }

    /// User2 stability as `(temperatureStabilityOK, temperatureStability)`.
    pub async fn get_user2_temperature_stability(&self) -> Result<(bool, f64)> {
        let sample = self.get_user2_temperature_sample().await?;
        Ok((sample.temperature_stability_ok, sample.temperature_stability))
    }

    /// User2 stability flag as `(temperatureStabilityOK, temperatureStable)`.
    pub async fn get_user2_temperature_stable(&self) -> Result<(bool, bool)> {
        let sample = self.get_user2_temperature_sample().await?;
        Ok((sample.temperature_stability_ok, sample.temperature_stable))
    }

    /// Set the user2 stability target in kelvin.
    pub async fn set_user2_stability_target(&self, target: f64) -> Result<Value> {
        self.set_prop(
            "/sampleChamber/temperatureControllers/user2/thermometer/properties/stabilityTarget",
            target,
        )
        .await
    }

    /// Enable or disable the user2 temperature controller.
    pub async fn set_user2_temperature_controller_enabled(&self, enabled: bool) -> Result<Value> {
        self.set_prop(
            "/sampleChamber/temperatureControllers/user2/properties/controllerEnabled",
            enabled,
        )
        .await
    }

    /// Set the user2 setpoint in kelvin.
    pub async fn set_user2_target_temperature(&self, target: f64) -> Result<Value> {
        self.set_prop(
            "/sampleChamber/temperatureControllers/user2/properties/targetTemperature",
            target,
        )
        .await
    }

    /// Raw user2 heater sample.
    pub async fn get_user2_heater_sample(&self) -> Result<Value> {
        let r = self
            .get_prop("/sampleChamber/temperatureControllers/user2/heater/properties/sample")
            .await?;
        envelope_field(&r, "sample")
    }

    // =========================================================================
    // Cryo-Optic Methods
    // =========================================================================

    /// Full cryo-optic thermometer sample.
    pub async fn get_cryooptic_temperature_sample(&self) -> Result<ThermometerSample> {
        self.get_thermometer_sample(
            "/sampleChamber/temperatureControllers/cryoOptic/thermometer/properties/sample",
        )
        .await
    }

    /// Cryo-optic reading as `(temperatureOK, temperature)`.
    pub async fn get_cryooptic_temperature(&self) -> Result<(bool, f64)> {
        let sample = self.get_cryooptic_temperature_sample().await?;
        Ok((sample.temperature_ok, sample.temperature))
    }

    /// Cryo-optic stability as `(temperatureStabilityOK, temperatureStability)`.
    pub async fn get_cryooptic_temperature_stability(&self) -> Result<(bool, f64)> {
        let sample = self.get_cryooptic_temperature_sample().await?;
        Ok((sample.temperature_stability_ok, sample.temperature_stability))
    }

    /// Cryo-optic stability flag as `(temperatureStabilityOK, temperatureStable)`.
    pub async fn get_cryooptic_temperature_stable(&self) -> Result<(bool, bool)> {
        let sample = self.get_cryooptic_temperature_sample().await?;
        Ok((sample.temperature_stability_ok, sample.temperature_stable))
    }

    /// Set the cryo-optic stability target in kelvin.
    pub async fn set_cryooptic_stability_target(&self, target: f64) -> Result<Value> {
        self.set_prop(
            "/sampleChamber/temperatureControllers/cryoOptic/thermometer/properties/stabilityTarget",
            target,
        )
        .await
    }

    /// Enable or disable the cryo-optic temperature controller.
    pub async fn set_cryooptic_temperature_controller_enabled(
        &self,
        enabled: bool,
    ) -> Result<Value> {
        self.set_prop(
            "/sampleChamber/temperatureControllers/cryoOptic/properties/controllerEnabled",
            enabled,
        )
        .await
    }

    /// Set the cryo-optic setpoint in kelvin.
    pub async fn set_cryooptic_target_temperature(&self, target: f64) -> Result<Value> {
        self.set_prop(
            "/sampleChamber/temperatureControllers/cryoOptic/properties/targetTemperature",
            target,
        )
        .await
    }

    /// Raw cryo-optic heater sample.
    pub async fn get_cryooptic_heater_sample(&self) -> Result<Value> {
        let r = self
            .get_prop("/sampleChamber/temperatureControllers/cryoOptic/heater/properties/sample")
            .await?;
        envelope_field(&r, "sample")
    }

    // =========================================================================
    // Vacuum and Chamber Conditioning
    // =========================================================================

    /// Sample chamber pressure in torr.
    pub async fn get_sample_chamber_pressure(&self) -> Result<f64> {
        let r = self
            .get_prop("/vacuumSystem/vacuumGauges/sampleChamberPressure/properties/pressureSample")
            .await?;
        let sample: PressureSample = serde_json::from_value(envelope_field(&r, "pressureSample")?)
            .context("decoding sample chamber pressure sample")?;
        Ok(sample.pressure)
    }

    /// Set the pull-vacuum target pressure in torr.
    pub async fn set_pull_vacuum_target_pressure(&self, target: f64) -> Result<Value> {
        self.set_prop("/controller/properties/pullVacuumTargetPressure", target)
            .await
    }

    /// Enable or disable the platform bakeout step of the next cooldown.
    pub async fn set_platform_bakeout_enabled(&self, enabled: bool) -> Result<Value> {
        self.set_prop("/controller/properties/platformBakeoutEnabled", enabled)
            .await
    }

    /// Set the platform bakeout temperature in kelvin.
    pub async fn set_platform_bakeout_temperature(&self, temperature: f64) -> Result<Value> {
        self.set_prop("/controller/properties/platformBakeoutTemperature", temperature)
            .await
    }

    /// Set the platform bakeout duration in minutes.
    pub async fn set_platform_bakeout_time(&self, duration: f64) -> Result<Value> {
        self.set_prop("/controller/properties/platformBakeoutTime", duration)
            .await
    }

    /// Enable or disable the dry-nitrogen purge step of the next cooldown.
    pub async fn set_dry_nitrogen_purge_enabled(&self, enabled: bool) -> Result<Value> {
        self.set_prop("/controller/properties/dryNitrogenPurgeEnabled", enabled)
            .await
    }

    /// Set how many purge cycles run before cooldown.
    pub async fn set_dry_nitrogen_purge_num_times(&self, times: u32) -> Result<Value> {
        self.set_prop("/controller/properties/dryNitrogenPurgeNumTimes", times)
            .await
    }

    /// Enable or disable continuous venting.
    pub async fn set_vent_continuously_enabled(&self, enabled: bool) -> Result<Value> {
        self.set_prop("/controller/properties/ventContinuouslyEnabled", enabled)
            .await
    }

    // =========================================================================
    // Magneto-Optic Methods
    // =========================================================================

    /// Whether the magneto-optic magnet is enabled.
    pub async fn get_mo_enabled(&self) -> Result<bool> {
        self.get_bool_prop("/magnetoOptic/magnet/properties/enabled")
            .await
    }

    /// Enable or disable the magneto-optic magnet.
    pub async fn set_mo_enabled(&self, enabled: bool) -> Result<Value> {
        self.set_prop("/magnetoOptic/magnet/properties/enabled", enabled)
            .await
    }

    /// Magnet state string as reported by the firmware.
    pub async fn get_mo_state(&self) -> Result<String> {
        let r = self.get_prop("/magnetoOptic/magnet/properties/state").await?;
        let value = envelope_field(&r, "state")?;
        value
            .as_str()
            .map(str::to_string)
            .with_context(|| format!("expected a string magnet state, got {}", value))
    }

    /// Whether the magnet is in safe mode.
    pub async fn get_mo_safe_mode(&self) -> Result<bool> {
        self.get_bool_prop("/magnetoOptic/magnet/properties/safeMode")
            .await
    }

    /// Calculated field at the sample in mT.
    pub async fn get_mo_calculated_field(&self) -> Result<f64> {
        self.get_scalar_prop("/magnetoOptic/magnet/properties/calculatedField")
            .await
    }

    /// Measured magnet current in amps.
    pub async fn get_mo_measured_current(&self) -> Result<f64> {
        self.get_scalar_prop("/magnetoOptic/magnet/properties/measuredCurrent")
            .await
    }

    /// Target field in mT.
    pub async fn get_mo_target_field(&self) -> Result<f64> {
        self.get_scalar_prop("/magnetoOptic/magnet/properties/targetField")
            .await
    }

    /// Set the target field in mT.
    pub async fn set_mo_target_field(&self, target: f64) -> Result<Value> {
        self.set_prop("/magnetoOptic/magnet/properties/targetField", target)
            .await
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

#[async_trait]
impl Readable for CryostationDriver {
    /// Platform temperature in kelvin.
    async fn read(&self) -> Result<f64> {
        self.get_platform_temperature().await
    }
}

#[async_trait]
impl Settable for CryostationDriver {
    async fn set_value(&self, name: &str, value: Value) -> Result<()> {
        match name {
            "platform_target_temperature" => {
                let kelvin = value
                    .as_f64()
                    .with_context(|| format!("expected a number for '{}', got {}", name, value))?;
                self.set_platform_target_temperature(kelvin).await?;
                Ok(())
            }
            "platform_temperature" | "sample_temperature" | "platform_stable" => {
                Err(CryoError::AttributeReadOnly(name.to_string()).into())
            }
            other => Err(CryoError::UnknownAttribute(other.to_string()).into()),
        }
    }

    async fn get_value(&self, name: &str) -> Result<Value> {
        match name {
            "platform_temperature" => Ok(json!(self.get_platform_temperature().await?)),
            "platform_target_temperature" => {
                Ok(json!(self.get_platform_target_temperature().await?))
            }
            "sample_temperature" => Ok(json!(self.get_sample_temperature().await?)),
            "platform_stable" => {
                let (stable_ok, _) = self.get_platform_temperature_stability().await?;
                Ok(json!(stable_ok))
            }
            other => Err(CryoError::UnknownAttribute(other.to_string()).into()),
        }
    }
}

#[async_trait]
impl Commandable for CryostationDriver {
    async fn execute_command(&self, command: &str, _args: Value) -> Result<Value> {
        match command {
            "cooldown" => self.cooldown().await,
            "warmup" => self.warmup().await,
            "vent" => self.vent().await,
            "pull_vacuum" => self.pull_vacuum().await,
            "abort" | "abort_goal" => self.abort_goal().await,
            other => Err(CryoError::UnknownMethod(other.to_string()).into()),
        }
    }
}

// =============================================================================
// CryostationFactory
// =============================================================================

/// Factory for creating Cryostation driver instances.
///
/// Register this factory with the DeviceRegistry to enable device creation
/// from TOML configuration.
pub struct CryostationFactory;

/// Static capabilities for the Cryostation driver
static CRYOSTATION_CAPABILITIES: &[Capability] = &[
    Capability::Readable,
    Capability::Settable,
    Capability::Commandable,
];

impl DriverFactory for CryostationFactory {
    fn driver_type(&self) -> &'static str {
        "cryostation"
    }

    fn name(&self) -> &'static str {
        "Cryostation s-series Cryostat"
    }

    fn capabilities(&self) -> &'static [Capability] {
        CRYOSTATION_CAPABILITIES
    }

    fn validate(&self, config: &toml::Value) -> Result<()> {
        let cfg: CryostationConfig = config
            .clone()
            .try_into()
            .context("Invalid Cryostation config")?;

        if cfg.host.is_empty() {
            anyhow::bail!("'host' field cannot be empty");
        }

        if cfg.port == 0 {
            anyhow::bail!("'port' field cannot be 0");
        }

        Ok(())
    }

    fn build(&self, config: toml::Value) -> BoxFuture<'static, Result<DeviceComponents>> {
        Box::pin(async move {
            let cfg: CryostationConfig =
                config.try_into().context("Invalid Cryostation config")?;

            let driver = CryostationDriver::new_async(&cfg.host, cfg.port, cfg.mock).await?;

            if let Some(target) = cfg.initial_target_temperature {
                driver.set_platform_target_temperature(target).await?;
            }

            Ok(DeviceComponents {
                readable: Some(driver.clone()),
                settable: Some(driver.clone()),
                commandable: Some(driver),
                metadata: DeviceMetadata {
                    measurement_units: Some("K".to_string()),
                    ..Default::default()
                },
            })
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    async fn mock_driver() -> (Arc<MockRestClient>, CryostationDriver) {
        let mock = Arc::new(MockRestClient::new());
        let driver = CryostationDriver::with_transport(mock.clone());
        (mock, driver)
    }

    #[test]
    fn test_factory_driver_type() {
        let factory = CryostationFactory;
        assert_eq!(factory.driver_type(), "cryostation");
        assert_eq!(factory.name(), "Cryostation s-series Cryostat");
    }

    #[test]
    fn test_factory_capabilities() {
        let factory = CryostationFactory;
        let caps = factory.capabilities();
        assert!(caps.contains(&Capability::Readable));
        assert!(caps.contains(&Capability::Settable));
        assert!(caps.contains(&Capability::Commandable));
    }

    #[test]
    fn test_factory_validate_config() {
        let factory = CryostationFactory;

        let valid = toml::Value::Table(toml::toml! {
            host = "192.168.1.123"
        });
        assert!(factory.validate(&valid).is_ok());

        let valid_full = toml::Value::Table(toml::toml! {
            host = "192.168.1.123"
            port = 47101
            mock = true
            initial_target_temperature = 3.1
        });
        assert!(factory.validate(&valid_full).is_ok());

        let empty_host = toml::Value::Table(toml::toml! {
            host = ""
        });
        assert!(factory.validate(&empty_host).is_err());

        let missing_host = toml::Value::Table(toml::toml! {
            port = 47101
        });
        assert!(factory.validate(&missing_host).is_err());

        let zero_port = toml::Value::Table(toml::toml! {
            host = "192.168.1.123"
            port = 0
        });
        assert!(factory.validate(&zero_port).is_err());
    }

    #[tokio::test]
    async fn test_factory_build_mock() {
        let factory = CryostationFactory;

        let config = toml::Value::Table(toml::toml! {
            host = "192.168.1.123"
            mock = true
            initial_target_temperature = 4.2
        });

        let components = factory.build(config).await.unwrap();
        assert!(components.readable.is_some());
        assert!(components.settable.is_some());
        assert!(components.commandable.is_some());
        assert_eq!(components.metadata.measurement_units.as_deref(), Some("K"));

        let settable = components.settable.unwrap();
        let target = settable.get_value("platform_target_temperature").await.unwrap();
        assert_eq!(target, json!(4.2));
    }

    #[tokio::test]
    async fn test_platform_temperature_from_seeded_sample() {
        let (mock, driver) = mock_driver().await;
        mock.seed(
            "/sampleChamber/temperatureControllers/platform/thermometer/properties/sample",
            json!({ "temperature": 3.1 }),
        )
        .await.unwrap();

        let kelvin = driver.get_platform_temperature().await.unwrap();
        assert!((kelvin - 3.1).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_platform_stability_tuple() {
        let (mock, driver) = mock_driver().await;
        mock.seed(
            "/sampleChamber/temperatureControllers/platform/thermometer/properties/sample",
            json!({
                "temperature": 3.1,
                "temperatureStabilityOK": true,
                "temperatureStability": 0.012,
            }),
        )
        .await.unwrap();

        let (stable_ok, stability) = driver.get_platform_temperature_stability().await.unwrap();
        assert!(stable_ok);
        assert!((stability - 0.012).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_target_temperature_round_trip() {
        let (_mock, driver) = mock_driver().await;

        driver.set_platform_target_temperature(1.7).await.unwrap();
        let target = driver.get_platform_target_temperature().await.unwrap();
        assert!((target - 1.7).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_stage_temperatures() {
        let (_mock, driver) = mock_driver().await;

        let (ok1, stage1) = driver.get_stage1_temperature().await.unwrap();
        assert!(ok1);
        assert!((stage1 - 31.5).abs() < f64::EPSILON);

        let (ok2, stage2) = driver.get_stage2_temperature().await.unwrap();
        assert!(ok2);
        assert!((stage2 - 3.4).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_chamber_pressure() {
        let (_mock, driver) = mock_driver().await;
        let pressure = driver.get_sample_chamber_pressure().await.unwrap();
        assert!((pressure - 2.1e-4).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_magneto_optic_accessors() {
        let (_mock, driver) = mock_driver().await;

        assert!(!driver.get_mo_enabled().await.unwrap());
        assert_eq!(driver.get_mo_state().await.unwrap(), "Idle");
        assert!(driver.get_mo_safe_mode().await.unwrap());

        driver.set_mo_target_field(12.5).await.unwrap();
        let target = driver.get_mo_target_field().await.unwrap();
        assert!((target - 12.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_settable_surface() {
        let (_mock, driver) = mock_driver().await;

        driver
            .set_value("platform_target_temperature", json!(3.1))
            .await
            .unwrap();
        assert_eq!(
            driver.get_value("platform_target_temperature").await.unwrap(),
            json!(3.1)
        );

        let err = driver
            .set_value("platform_temperature", json!(300.0))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("read-only"));

        let err = driver.set_value("bogus", json!(0)).await.unwrap_err();
        assert!(err.to_string().contains("Unknown attribute"));
    }

    #[tokio::test]
    async fn test_commandable_surface() {
        let (mock, driver) = mock_driver().await;

        driver.execute_command("cooldown", json!({})).await.unwrap();
        driver.execute_command("abort", json!({})).await.unwrap();
        assert_eq!(
            mock.invoked_methods().await,
            vec![
                "/controller/methods/cooldown()",
                "/controller/methods/abortGoal()",
            ]
        );

        let err = driver
            .execute_command("selfdestruct", json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unknown method"));
    }
}
