//! Decorators: tasks that wrap exactly one child and reinterpret its outcome.
//!
//! [`Decorator`] forwards a single child activation through a
//! [`DecoratorPolicy`]. [`LoopDecorator`] re-drives its child across ticks
//! through a [`LoopPolicy`]; [`Repeat`] is the count-driven loop policy.

pub mod base;
pub mod looping;
pub mod repeat;

pub use base::{AlwaysFail, AlwaysSucceed, Decorator, DecoratorPolicy, Invert, Passthrough};
pub use looping::{LoopDecorator, LoopFlow, LoopPolicy, UntilFail, UntilSuccess};
pub use repeat::{Repeat, RepeatDecorator};
