//! Arbor - behavior-tree execution core
//!
//! Arbor drives trees of tasks tick by tick against a caller-owned
//! blackboard. Decorators wrap a single child and reinterpret its outcome;
//! loop decorators re-drive the child across ticks, and `Repeat` does so a
//! number of times drawn from an integer distribution.

pub mod cli;
pub mod config;
pub mod core;
pub mod decorator;
pub mod distribution;
pub mod error;
pub mod leaf;
pub mod logging;

pub use config::Config;
pub use core::{
    BehaviorTree, Duplicator, EventType, Outcome, Status, Task, TaskContext, TaskId, TraceEvent,
    TraceLog,
};
pub use decorator::{
    AlwaysFail, AlwaysSucceed, Decorator, DecoratorPolicy, Invert, LoopDecorator, LoopFlow,
    LoopPolicy, Passthrough, Repeat, RepeatDecorator, UntilFail, UntilSuccess,
};
pub use distribution::{
    ConstantIntegerDistribution, DistributionSpec, IntegerDistribution,
    TriangularIntegerDistribution, UniformIntegerDistribution,
};
pub use error::{ArborError, Result};
pub use leaf::ActionTask;

// CLI commands
pub use cli::{ConfigCommand, SimulateCommand};
