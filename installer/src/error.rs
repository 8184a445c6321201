// Installer error kinds
//
// Every step fails fast with one of these; `run_all` wraps the failing step's error in
// `StepFailed` so callers can see which step and which file/statement broke the run.

use std::path::PathBuf;
use thiserror::Error;

use crate::installation::InstallStep;
use crate::utils::logging::mask_sensitive;

/// Failure while reading or executing a `.sql` setup script.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("cannot read script: {0}")]
    Io(#[from] std::io::Error),

    #[error("statement {index} failed: {source}")]
    Statement {
        index: usize,
        #[source]
        source: sqlx::Error,
    },

    #[error("session setup failed: {0}")]
    Session(#[source] sqlx::Error),
}

#[derive(Debug, Error)]
pub enum InstallError {
    /// Drop/create/charset statement of the schema setup failed.
    #[error("Schema creation failed while running `{statement}`: {source}")]
    SchemaCreationFailed {
        statement: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Import of {file:?} failed: {source}")]
    ImportFailed {
        file: PathBuf,
        #[source]
        source: ImportError,
    },

    /// Display masks the serial; the field keeps it whole for callers.
    #[error("Serial '{}' is not valid for this shop", mask_sensitive(.serial))]
    SerialInvalid { serial: String },

    #[error("Encoding failed for '{value}': {reason}")]
    EncodingFailed { value: String, reason: String },

    /// Display shows only the user-facing message; details are already masked.
    #[error("{user_message}")]
    ConnectionFailed {
        user_message: String,
        internal_details: String,
    },

    #[error("Database query failed ({operation}): {source}")]
    QueryFailed {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Step '{step}' failed: {source}")]
    StepFailed {
        step: InstallStep,
        #[source]
        source: Box<InstallError>,
    },
}

impl InstallError {
    pub fn query(operation: &'static str) -> impl FnOnce(sqlx::Error) -> InstallError {
        move |source| InstallError::QueryFailed { operation, source }
    }

    /// The error without any `StepFailed` wrapping.
    pub fn root(&self) -> &InstallError {
        match self {
            InstallError::StepFailed { source, .. } => source.root(),
            other => other,
        }
    }

    /// The step that failed, if the error came out of a full run.
    pub fn failed_step(&self) -> Option<InstallStep> {
        match self {
            InstallError::StepFailed { step, .. } => Some(*step),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, InstallError>;
