// License serial provisioning contract
//
// Serial validation and limit computation live outside the installer. The installer gets an
// optional `SerialProvisioner`; without one the serial step does nothing.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SerialError {
    #[error("malformed serial: {0}")]
    Malformed(String),

    #[error("serial check failed: {0}")]
    Check(String),
}

pub trait SerialProvisioner: Send + Sync {
    /// `Ok(false)` and `Err(_)` both reject the serial.
    fn validate(&self, serial: &str, edition_code: u8) -> Result<bool, SerialError>;

    fn max_days(&self, serial: &str, edition_code: u8) -> Result<u64, SerialError>;

    fn max_articles(&self, serial: &str, edition_code: u8) -> Result<u64, SerialError>;

    fn max_shops(&self, serial: &str, edition_code: u8) -> Result<u64, SerialError>;

    /// Serial used when the caller gives none.
    fn default_serial(&self) -> String;
}

/// Usage limits derived from a serial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialLimits {
    pub max_days: u64,
    pub max_articles: u64,
    pub max_shops: u64,
}

impl SerialLimits {
    pub fn compute(
        provisioner: &dyn SerialProvisioner,
        serial: &str,
        edition_code: u8,
    ) -> Result<Self, SerialError> {
        Ok(Self {
            max_days: provisioner.max_days(serial, edition_code)?,
            max_articles: provisioner.max_articles(serial, edition_code)?,
            max_shops: provisioner.max_shops(serial, edition_code)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No serial provisioner was wired in.
    CapabilityUnavailable,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::CapabilityUnavailable => f.write_str("serial capability unavailable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerialOutcome {
    Applied { serial: String, limits: SerialLimits },
    Skipped(SkipReason),
}
