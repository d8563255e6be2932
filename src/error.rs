//! Unified error types for Arbor.
//!
//! Errors here are structural contract breaches, never task outcomes.
//! A task that fails is ordinary data (`Status::Failed`); an error means the
//! tree was wired or driven incorrectly and the current activation cannot
//! continue.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::core::TaskId;

/// The main error type for Arbor operations.
#[derive(Error, Debug)]
pub enum ArborError {
    /// The tree is wired incorrectly (missing child, unset distribution,
    /// bad config value).
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// A task broke the lifecycle protocol (double report, report from a
    /// stranger, re-entrant execution).
    #[error("state violation: {message}")]
    StateViolation { message: String },

    /// A task id that does not belong to this tree.
    #[error("unknown task: {id}")]
    UnknownTask { id: TaskId },

    /// I/O errors from config file operations.
    #[error("storage error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A specialized Result type for Arbor operations.
pub type Result<T> = std::result::Result<T, ArborError>;

impl ArborError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a state violation error.
    pub fn state_violation(message: impl Into<String>) -> Self {
        Self::StateViolation {
            message: message.into(),
        }
    }

    /// Create an unknown task error.
    pub fn unknown_task(id: TaskId) -> Self {
        Self::UnknownTask { id }
    }

    /// Create a storage error from an I/O error.
    pub fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// Check whether this error is a lifecycle protocol breach.
    pub fn is_state_violation(&self) -> bool {
        matches!(self, ArborError::StateViolation { .. })
    }

    /// Check whether this error is a wiring/configuration problem.
    pub fn is_configuration(&self) -> bool {
        matches!(self, ArborError::Configuration { .. })
    }
}

impl From<io::Error> for ArborError {
    fn from(err: io::Error) -> Self {
        Self::Storage {
            path: PathBuf::new(),
            source: err,
        }
    }
}

/// Trait for fail-open error handling.
///
/// Used where an error in ambient infrastructure (config files) must not
/// stop a tree from running: log the error and continue with a fallback.
pub trait FailOpen<T> {
    /// Handle an error by logging a warning and returning the default value.
    fn fail_open_default(self, context: &str) -> T
    where
        T: Default;

    /// Handle an error by logging a warning and returning the provided fallback.
    fn fail_open_with(self, context: &str, fallback: T) -> T;
}

impl<T> FailOpen<T> for Result<T> {
    fn fail_open_default(self, context: &str) -> T
    where
        T: Default,
    {
        match self {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("{}: {} (fail-open: using default)", context, err);
                T::default()
            }
        }
    }

    fn fail_open_with(self, context: &str, fallback: T) -> T {
        match self {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("{}: {} (fail-open: using fallback)", context, err);
                fallback
            }
        }
    }
}

/// Exit codes for the CLI.
pub mod exit_codes {
    /// The simulated tree succeeded (or is still running when ticks ran out).
    pub const SUCCESS: i32 = 0;

    /// The simulated tree finished with a failure outcome.
    pub const TREE_FAILED: i32 = 1;

    /// The tree could not be built or driven.
    pub const ERROR: i32 = 2;
}
