//! Task status and outcome types.
//!
//! `Status` is the lifecycle state a task is in; `Outcome` is what a task
//! reports to its parent during a tick.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a task within the current activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Never started in the current activation.
    #[default]
    Fresh,
    /// Started, no terminal outcome yet.
    Running,
    /// Reported success.
    Succeeded,
    /// Reported failure.
    Failed,
    /// Stopped from outside before reaching an outcome.
    Cancelled,
}

impl Status {
    /// Check if the status is a terminal outcome (Succeeded or Failed).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Succeeded | Status::Failed)
    }

    /// Check if the task is mid-activation.
    pub fn is_running(&self) -> bool {
        matches!(self, Status::Running)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Fresh => "fresh",
            Status::Running => "running",
            Status::Succeeded => "succeeded",
            Status::Failed => "failed",
            Status::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// What a task reports about itself during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Still working; tick again.
    Running,
    /// Finished successfully.
    Success,
    /// Finished unsuccessfully.
    Failure,
}

impl Outcome {
    /// The status a task ends up in after reporting this outcome.
    pub fn status(&self) -> Status {
        match self {
            Outcome::Running => Status::Running,
            Outcome::Success => Status::Succeeded,
            Outcome::Failure => Status::Failed,
        }
    }

    /// Swap success and failure; running stays running.
    pub fn invert(&self) -> Self {
        match self {
            Outcome::Success => Outcome::Failure,
            Outcome::Failure => Outcome::Success,
            Outcome::Running => Outcome::Running,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Outcome::Running => "running",
            Outcome::Success => "success",
            Outcome::Failure => "failure",
        };
        f.write_str(name)
    }
}
