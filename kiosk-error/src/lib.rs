use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type HalResult<T> = Result<T, HalError>;
pub type KioskResult<T> = Result<T, KioskError>;

/// Failures raised by the external collaborators (account database, apt,
/// network, settings store, helper binaries).
#[derive(Error, Debug)]
pub enum HalError {
    #[error("Permission denied")]
    PermissionDenied,

    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("Command failed: {program} (exit={code:?}): {stderr}")]
    CommandFailed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Command timed out: {program} after {timeout_secs}s")]
    CommandTimeout { program: String, timeout_secs: u64 },

    #[error("Account lookup failed for {name}: {reason}")]
    AccountLookup { name: String, reason: String },

    #[error("Download failed: {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("Settings store {path}: {reason}")]
    SettingsStore { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Provisioning error taxonomy. Every variant is fatal for the run.
#[derive(Error, Debug)]
pub enum KioskError {
    #[error("Root required: {0}")]
    Privilege(String),

    #[error("Unable to determine whether {subject} exists: {reason}")]
    Probe { subject: String, reason: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Conflict at {path}: {reason}")]
    Conflict { path: PathBuf, reason: String },

    #[error(transparent)]
    Collaborator(#[from] HalError),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Step '{step}' failed: {source}")]
    StepFailed {
        step: String,
        #[source]
        source: Box<KioskError>,
    },
}

impl KioskError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        KioskError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn conflict(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        KioskError::Conflict {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn probe(subject: impl Into<String>, reason: impl ToString) -> Self {
        KioskError::Probe {
            subject: subject.into(),
            reason: reason.to_string(),
        }
    }

    /// Name of the step that failed, if this error came out of the sequencer.
    pub fn failed_step(&self) -> Option<&str> {
        match self {
            KioskError::StepFailed { step, .. } => Some(step),
            _ => None,
        }
    }
}
