//! Repeat a child a number of times drawn from a distribution.
//!
//! The repeat budget is drawn once per loop session, when the decorator
//! starts. Every completion of the child, success or failure alike, consumes
//! one unit of the budget; the completion that brings it to zero is
//! forwarded to the parent. A negative draw never reaches zero, so the
//! session only ends when the tree is cancelled or reset.
//!
//! A draw of zero still ticks the child once: the decrement is skipped for a
//! zero budget, so the first completion already finds it exhausted.

use std::sync::Arc;

use crate::core::{TaskContext, TaskId};
use crate::decorator::looping::{LoopDecorator, LoopFlow, LoopPolicy};
use crate::distribution::{ConstantIntegerDistribution, IntegerDistribution};
use crate::error::{ArborError, Result};

/// A loop decorator driven by the [`Repeat`] policy.
pub type RepeatDecorator = LoopDecorator<Repeat>;

/// Loop policy repeating the child `times` times.
#[derive(Debug, Clone)]
pub struct Repeat {
    /// Shared between every copy of the tree.
    times: Option<Arc<dyn IntegerDistribution>>,
    /// Remaining repetitions of the current session.
    count: Option<i32>,
}

impl Default for Repeat {
    fn default() -> Self {
        Self::forever()
    }
}

impl Repeat {
    /// Repeat a number of times drawn from `times` at every start.
    pub fn new(times: Arc<dyn IntegerDistribution>) -> Self {
        Self {
            times: Some(times),
            count: None,
        }
    }

    /// Repeat a fixed number of times.
    pub fn constant(times: i32) -> Self {
        Self::new(Arc::new(ConstantIntegerDistribution::new(times)))
    }

    /// Repeat until cancelled.
    pub fn forever() -> Self {
        Self::new(Arc::new(ConstantIntegerDistribution::NEGATIVE_ONE))
    }

    /// A policy whose distribution is bound later with [`Repeat::set_times`].
    /// Starting it before then is a configuration error.
    pub fn unset() -> Self {
        Self {
            times: None,
            count: None,
        }
    }

    /// Bind the distribution. Takes effect at the next start.
    pub fn set_times(&mut self, times: Arc<dyn IntegerDistribution>) {
        self.times = Some(times);
    }

    /// Builder form of [`Repeat::set_times`].
    pub fn with_times(mut self, times: Arc<dyn IntegerDistribution>) -> Self {
        self.set_times(times);
        self
    }

    /// Wrap `child` in a repeat decorator using this policy.
    pub fn decorate(self, child: TaskId) -> RepeatDecorator {
        LoopDecorator::wrap(self, child)
    }

    /// The bound distribution.
    pub fn distribution(&self) -> Option<&Arc<dyn IntegerDistribution>> {
        self.times.as_ref()
    }

    /// Remaining repetitions, or `None` outside a session.
    pub fn count(&self) -> Option<i32> {
        self.count
    }

    /// Consume one completion and decide whether the session goes on.
    fn consume(&mut self, task: TaskId) -> Result<LoopFlow> {
        let Some(count) = self.count.as_mut() else {
            return Err(ArborError::state_violation(format!(
                "repeat {} saw a child completion before it was started",
                task
            )));
        };
        if *count > 0 {
            *count -= 1;
        }
        tracing::trace!(task = %task, count = *count, "repeat completion");
        if *count == 0 {
            Ok(LoopFlow::Break)
        } else {
            Ok(LoopFlow::Continue)
        }
    }
}

impl<E> LoopPolicy<E> for Repeat {
    fn name(&self) -> &'static str {
        "repeat"
    }

    fn start(&mut self, ctx: &mut TaskContext<'_, E>) -> Result<()> {
        let times = self.times.as_ref().ok_or_else(|| {
            ArborError::configuration(format!("repeat {} has no times distribution", ctx.id()))
        })?;
        let count = times.next_int();
        tracing::debug!(task = %ctx.id(), count, "repeat count drawn");
        self.count = Some(count);
        Ok(())
    }

    fn condition(&self, looping: bool) -> bool {
        looping && self.count.is_some_and(|count| count != 0)
    }

    fn child_success(&mut self, ctx: &mut TaskContext<'_, E>, _child: TaskId) -> Result<LoopFlow> {
        let flow = self.consume(ctx.id())?;
        if flow == LoopFlow::Break {
            ctx.success()?;
        }
        Ok(flow)
    }

    fn child_fail(&mut self, ctx: &mut TaskContext<'_, E>, _child: TaskId) -> Result<LoopFlow> {
        let flow = self.consume(ctx.id())?;
        if flow == LoopFlow::Break {
            ctx.fail()?;
        }
        Ok(flow)
    }

    fn reset(&mut self) {
        self.count = None;
    }

    fn duplicate(&self) -> Self {
        Self {
            times: self.times.clone(),
            count: None,
        }
    }
}
