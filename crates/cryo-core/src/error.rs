//! Error types for the cryostat control stack.
//!
//! `CryoError` consolidates the failure modes of the application: configuration
//! problems caught at startup, I/O faults, and instrument communication errors.
//! Transport-level failures inside individual REST calls are deliberately NOT
//! translated into domain errors; they bubble up unchanged as `anyhow` chains,
//! because there is no recovery layer that could act on a finer taxonomy.
//!
//! `DriverError` is the structured form used by driver factories, carrying the
//! driver type and a coarse category alongside the message.

use thiserror::Error;

// =============================================================================
// Driver Errors
// =============================================================================

/// Coarse category for a driver-level fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverErrorKind {
    Initialization,
    Configuration,
    Communication,
    Timeout,
    Unknown,
}

impl std::fmt::Display for DriverErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DriverErrorKind::Initialization => "initialization",
            DriverErrorKind::Configuration => "configuration",
            DriverErrorKind::Communication => "communication",
            DriverErrorKind::Timeout => "timeout",
            DriverErrorKind::Unknown => "unknown",
        };
        write!(f, "{}", label)
    }
}

/// Structured error raised by driver factories and registries.
#[derive(Error, Debug, Clone)]
#[error("Driver '{driver_type}' {kind} error: {message}")]
pub struct DriverError {
    pub driver_type: String,
    pub kind: DriverErrorKind,
    pub message: String,
}

impl DriverError {
    pub fn new(
        driver_type: impl Into<String>,
        kind: DriverErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            driver_type: driver_type.into(),
            kind,
            message: message.into(),
        }
    }
}

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, CryoError>;

/// Primary error type for the cryostat control stack.
///
/// # Error Categories
///
/// 1. **Configuration errors**: `Configuration`
///    - Caught at startup or device registration; permanent until the config
///      file is fixed.
/// 2. **Hardware/communication errors**: `Instrument`, `Io`, `Driver`
///    - Raised while talking to the instrument; may be transient (network
///      glitch) or permanent (device powered off).
/// 3. **Surface errors**: `AttributeReadOnly`, `UnknownAttribute`,
///    `UnknownMethod`
///    - Indicate a caller addressing the device-server surface with a name it
///      does not expose; always a caller bug, never retried.
#[derive(Error, Debug)]
pub enum CryoError {
    /// Configuration values parsed but failed semantic validation
    /// (empty host, port 0, unknown driver type).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Standard I/O failure (config file read, network socket).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Instrument communication failure surfaced by a driver.
    ///
    /// The message carries whatever the transport reported; there is no
    /// finer-grained recovery information because the stack performs none.
    #[error("Instrument error: {0}")]
    Instrument(String),

    /// Structured driver error with category.
    #[error("{0}")]
    Driver(DriverError),

    /// Attempted to write a read-only device attribute.
    #[error("Attribute '{0}' is read-only")]
    AttributeReadOnly(String),

    /// Attribute name not exposed by the device.
    #[error("Unknown attribute '{0}'")]
    UnknownAttribute(String),

    /// Method name not exposed by the device.
    #[error("Unknown method '{0}'")]
    UnknownMethod(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CryoError::Instrument("connection refused".to_string());
        assert_eq!(err.to_string(), "Instrument error: connection refused");
    }

    #[test]
    fn test_driver_error_display() {
        let err = CryoError::Driver(DriverError::new(
            "cryostation",
            DriverErrorKind::Initialization,
            "failed to reach controller",
        ));
        assert!(err
            .to_string()
            .contains("Driver 'cryostation' initialization error"));
    }

    #[test]
    fn test_surface_errors_name_the_offender() {
        assert_eq!(
            CryoError::AttributeReadOnly("platform_temperature".into()).to_string(),
            "Attribute 'platform_temperature' is read-only"
        );
        assert_eq!(
            CryoError::UnknownMethod("selfdestruct".into()).to_string(),
            "Unknown method 'selfdestruct'"
        );
    }
}
