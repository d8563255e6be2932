//! Core types and logic for Arbor.
//!
//! This module contains the task lifecycle: task ids and the [`Task`]
//! trait, lifecycle status, the arena-backed [`BehaviorTree`] that drives
//! tasks tick by tick, and the execution trace.

pub mod status;
pub mod task;
pub mod trace;
pub mod tree;

pub use status::{Outcome, Status};
pub use task::{Task, TaskId};
pub use trace::{EventType, TraceEvent, TraceLog};
pub use tree::{BehaviorTree, Duplicator, TaskContext};
