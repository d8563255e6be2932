//! The task capability shared by every node in a behavior tree.
//!
//! A task never owns its parent or its children directly. The tree keeps
//! every task in an arena and hands out [`TaskId`]s; parents hold their
//! children's ids and the arena holds each task's parent link.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::tree::{Duplicator, TaskContext};
use crate::error::{ArborError, Result};

/// Index of a task inside its [`BehaviorTree`](crate::core::BehaviorTree).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(usize);

impl TaskId {
    /// Create a task id from a raw arena index.
    pub const fn new(index: usize) -> Self {
        TaskId(index)
    }

    /// The raw arena index.
    pub const fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle hooks of a behavior tree node over blackboard type `E`.
///
/// The tree calls `start` when a new activation begins and `run` once per
/// tick while the task is running. A task reports by calling
/// [`TaskContext::success`], [`TaskContext::fail`] or
/// [`TaskContext::running`]; the report is delivered to the parent through
/// `child_success`, `child_fail` or `child_running`.
pub trait Task<E>: Send {
    /// Name used in logs and traces.
    fn name(&self) -> &str;

    /// Prepare per-activation state. Called before the first `run` of
    /// every activation, including re-activations of a finished task.
    fn start(&mut self, _ctx: &mut TaskContext<'_, E>) -> Result<()> {
        Ok(())
    }

    /// Perform one step of work.
    fn run(&mut self, ctx: &mut TaskContext<'_, E>) -> Result<()>;

    /// A child reported success.
    fn child_success(&mut self, _ctx: &mut TaskContext<'_, E>, child: TaskId) -> Result<()> {
        Err(not_a_parent(self.name(), child))
    }

    /// A child reported failure.
    fn child_fail(&mut self, _ctx: &mut TaskContext<'_, E>, child: TaskId) -> Result<()> {
        Err(not_a_parent(self.name(), child))
    }

    /// A child reported that it is still running.
    fn child_running(&mut self, _ctx: &mut TaskContext<'_, E>, child: TaskId) -> Result<()> {
        Err(not_a_parent(self.name(), child))
    }

    /// Ids of the children this task drives.
    fn children(&self) -> Vec<TaskId> {
        Vec::new()
    }

    /// Attach a child. Tasks that cannot hold children reject this.
    fn add_child(&mut self, child: TaskId) -> Result<()> {
        Err(ArborError::configuration(format!(
            "{} cannot hold child task {}",
            self.name(),
            child
        )))
    }

    /// Drop all activation-local state so the next `start` begins clean.
    fn reset(&mut self) {}

    /// Produce a structurally equivalent copy with fresh session state.
    ///
    /// Children are copied through [`Duplicator::duplicate`] so the copy
    /// refers to the duplicated subtree, never to the original.
    fn duplicate(&self, duplicator: &mut Duplicator<'_, E>) -> Result<Box<dyn Task<E>>>;
}

fn not_a_parent(name: &str, child: TaskId) -> ArborError {
    ArborError::state_violation(format!(
        "{} received a report from {} but has no children",
        name, child
    ))
}
