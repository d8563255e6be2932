//! Decorators that re-drive their child across ticks.
//!
//! A loop session is one activation of a [`LoopDecorator`]. Each tick drives
//! at most one step of the child; when the child completes, the policy
//! decides whether another child activation follows on the next tick or
//! whether the session ends with an outcome forwarded to the parent.

use crate::core::{Duplicator, Outcome, Task, TaskContext, TaskId};
use crate::decorator::base::{attach_child, check_child, duplicate_child, require_child};
use crate::error::{ArborError, Result};

/// What a loop does after its child completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopFlow {
    /// Run another child activation on the next tick.
    Continue,
    /// The session is over; the policy has already forwarded an outcome.
    Break,
}

impl LoopFlow {
    fn keeps_looping(self) -> bool {
        matches!(self, LoopFlow::Continue)
    }
}

/// Per-completion decisions of a loop decorator.
pub trait LoopPolicy<E>: Send + 'static {
    /// Name used in logs and traces.
    fn name(&self) -> &'static str;

    /// Prepare a new loop session.
    fn start(&mut self, _ctx: &mut TaskContext<'_, E>) -> Result<()> {
        Ok(())
    }

    /// Whether another iteration should run, given the current loop flag.
    fn condition(&self, looping: bool) -> bool {
        looping
    }

    /// The child succeeded. Forward an outcome before returning `Break`.
    fn child_success(&mut self, ctx: &mut TaskContext<'_, E>, child: TaskId) -> Result<LoopFlow>;

    /// The child failed. Forward an outcome before returning `Break`.
    fn child_fail(&mut self, ctx: &mut TaskContext<'_, E>, child: TaskId) -> Result<LoopFlow>;

    /// Drop session state.
    fn reset(&mut self) {}

    /// Copy the policy for a duplicated tree, without session state.
    fn duplicate(&self) -> Self
    where
        Self: Sized;
}

/// A decorator that keeps re-driving its child while its condition holds.
#[derive(Debug, Clone)]
pub struct LoopDecorator<P> {
    child: Option<TaskId>,
    looping: bool,
    policy: P,
}

impl<P> LoopDecorator<P> {
    /// Create a loop decorator with no child yet.
    pub fn new(policy: P) -> Self {
        Self {
            child: None,
            looping: false,
            policy,
        }
    }

    /// Create a loop decorator wrapping `child`.
    pub fn wrap(policy: P, child: TaskId) -> Self {
        Self {
            child: Some(child),
            looping: false,
            policy,
        }
    }

    /// The wrapped child, if attached.
    pub fn child(&self) -> Option<TaskId> {
        self.child
    }

    /// The loop flag as last set by a completion (or by `start`).
    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// The loop policy.
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Mutable access to the loop policy.
    pub fn policy_mut(&mut self) -> &mut P {
        &mut self.policy
    }

    /// Whether another child activation should follow.
    pub fn condition<E>(&self) -> bool
    where
        P: LoopPolicy<E>,
    {
        self.policy.condition(self.looping)
    }
}

impl<E, P: LoopPolicy<E>> Task<E> for LoopDecorator<P> {
    fn name(&self) -> &str {
        self.policy.name()
    }

    fn start(&mut self, ctx: &mut TaskContext<'_, E>) -> Result<()> {
        self.looping = true;
        self.policy.start(ctx)
    }

    fn run(&mut self, ctx: &mut TaskContext<'_, E>) -> Result<()> {
        let child = require_child(self.child, self.policy.name())?;

        // The first step of every tick always runs, so a session whose
        // condition is already false still drives its child once.
        let outcome = ctx.drive_child(child, self)?;
        if !matches!(outcome, Some(Outcome::Success | Outcome::Failure)) {
            return Ok(());
        }

        if self.policy.condition(self.looping) {
            tracing::trace!(task = %ctx.id(), "loop continues next tick");
            return ctx.running();
        }
        if !ctx.own_status()?.is_terminal() {
            let err = ArborError::state_violation(format!(
                "{} loop {} ended without reporting an outcome",
                self.policy.name(),
                ctx.id()
            ));
            tracing::warn!("{}", err);
            return Err(err);
        }
        Ok(())
    }

    fn child_success(&mut self, ctx: &mut TaskContext<'_, E>, child: TaskId) -> Result<()> {
        check_child(self.child, child, ctx.id())?;
        self.looping = self.policy.child_success(ctx, child)?.keeps_looping();
        Ok(())
    }

    fn child_fail(&mut self, ctx: &mut TaskContext<'_, E>, child: TaskId) -> Result<()> {
        check_child(self.child, child, ctx.id())?;
        self.looping = self.policy.child_fail(ctx, child)?.keeps_looping();
        Ok(())
    }

    fn child_running(&mut self, ctx: &mut TaskContext<'_, E>, child: TaskId) -> Result<()> {
        check_child(self.child, child, ctx.id())?;
        ctx.running()
    }

    fn children(&self) -> Vec<TaskId> {
        self.child.into_iter().collect()
    }

    fn add_child(&mut self, child: TaskId) -> Result<()> {
        attach_child(&mut self.child, child, self.policy.name())
    }

    fn reset(&mut self) {
        self.looping = false;
        self.policy.reset();
    }

    fn duplicate(&self, duplicator: &mut Duplicator<'_, E>) -> Result<Box<dyn Task<E>>> {
        Ok(Box::new(LoopDecorator {
            child: duplicate_child(self.child, duplicator)?,
            looping: false,
            policy: self.policy.duplicate(),
        }))
    }
}

/// Repeats the child until it succeeds, then succeeds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UntilSuccess;

impl<E> LoopPolicy<E> for UntilSuccess {
    fn name(&self) -> &'static str {
        "until_success"
    }

    fn child_success(&mut self, ctx: &mut TaskContext<'_, E>, _child: TaskId) -> Result<LoopFlow> {
        ctx.success()?;
        Ok(LoopFlow::Break)
    }

    fn child_fail(&mut self, _ctx: &mut TaskContext<'_, E>, _child: TaskId) -> Result<LoopFlow> {
        Ok(LoopFlow::Continue)
    }

    fn duplicate(&self) -> Self {
        UntilSuccess
    }
}

/// Repeats the child until it fails, then succeeds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UntilFail;

impl<E> LoopPolicy<E> for UntilFail {
    fn name(&self) -> &'static str {
        "until_fail"
    }

    fn child_success(&mut self, _ctx: &mut TaskContext<'_, E>, _child: TaskId) -> Result<LoopFlow> {
        Ok(LoopFlow::Continue)
    }

    fn child_fail(&mut self, ctx: &mut TaskContext<'_, E>, _child: TaskId) -> Result<LoopFlow> {
        ctx.success()?;
        Ok(LoopFlow::Break)
    }

    fn duplicate(&self) -> Self {
        UntilFail
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BehaviorTree, EventType, Status};
    use crate::leaf::ActionTask;

    #[derive(Debug, Default)]
    struct Board {
        runs: u32,
        fail_until: u32,
    }

    /// Fails until `fail_until` runs have happened, then succeeds.
    fn eventually_succeeds(board: &mut Board) -> Outcome {
        board.runs += 1;
        if board.runs > board.fail_until {
            Outcome::Success
        } else {
            Outcome::Failure
        }
    }

    /// Succeeds until `fail_until` runs have happened, then fails.
    fn eventually_fails(board: &mut Board) -> Outcome {
        board.runs += 1;
        if board.runs > board.fail_until {
            Outcome::Failure
        } else {
            Outcome::Success
        }
    }

    fn looped<P: LoopPolicy<Board>>(
        policy: P,
        leaf: fn(&mut Board) -> Outcome,
    ) -> (BehaviorTree<Board>, TaskId, TaskId) {
        let mut tree: BehaviorTree<Board> = BehaviorTree::new();
        let child = tree.insert(ActionTask::new("leaf", leaf)).unwrap();
        let root = tree.insert(LoopDecorator::wrap(policy, child)).unwrap();
        tree.set_root(root).unwrap();
        (tree, root, child)
    }

    #[test]
    fn test_until_success_one_child_activation_per_tick() {
        let (mut tree, root, child) = looped(UntilSuccess, eventually_succeeds);
        let mut board = Board {
            fail_until: 2,
            ..Default::default()
        };

        assert_eq!(tree.step(&mut board).unwrap(), Status::Running);
        assert_eq!(tree.step(&mut board).unwrap(), Status::Running);
        assert_eq!(tree.step(&mut board).unwrap(), Status::Succeeded);

        assert_eq!(tree.trace().count(child, EventType::Started), 3);
        assert_eq!(tree.trace().count(root, EventType::Started), 1);
    }

    #[test]
    fn test_until_fail_succeeds_on_failure() {
        let (mut tree, _, child) = looped(UntilFail, eventually_fails);
        let mut board = Board {
            fail_until: 1,
            ..Default::default()
        };

        assert_eq!(tree.step(&mut board).unwrap(), Status::Running);
        assert_eq!(tree.step(&mut board).unwrap(), Status::Succeeded);
        assert_eq!(tree.trace().count(child, EventType::Started), 2);
    }

    #[test]
    fn test_cancel_mid_loop_leaves_duplicate_fresh() {
        let (mut tree, root, _) = looped(UntilSuccess, eventually_succeeds);
        let mut board = Board {
            fail_until: 5,
            ..Default::default()
        };
        tree.step(&mut board).unwrap();

        let copy = tree.duplicate().unwrap();
        tree.cancel(root).unwrap();
        assert_eq!(tree.status(root).unwrap(), Status::Cancelled);

        // A copy taken mid-session starts fresh.
        let copy_root = copy.root().unwrap();
        assert_eq!(copy.status(copy_root).unwrap(), Status::Fresh);
    }

    #[test]
    fn test_loop_without_child_is_configuration_error() {
        let mut tree: BehaviorTree<Board> = BehaviorTree::new();
        let root = tree.insert(LoopDecorator::new(UntilSuccess)).unwrap();
        tree.set_root(root).unwrap();

        let err = tree.step(&mut Board::default()).unwrap_err();
        assert!(err.is_configuration());
    }

    /// A policy that stops looping without forwarding anything.
    struct Forgetful;

    impl LoopPolicy<Board> for Forgetful {
        fn name(&self) -> &'static str {
            "forgetful"
        }

        fn child_success(
            &mut self,
            _ctx: &mut TaskContext<'_, Board>,
            _c: TaskId,
        ) -> Result<LoopFlow> {
            Ok(LoopFlow::Break)
        }

        fn child_fail(
            &mut self,
            _ctx: &mut TaskContext<'_, Board>,
            _c: TaskId,
        ) -> Result<LoopFlow> {
            Ok(LoopFlow::Break)
        }

        fn duplicate(&self) -> Self {
            Forgetful
        }
    }

    #[test]
    fn test_break_without_outcome_is_state_violation() {
        let (mut tree, _, _) = looped(Forgetful, eventually_succeeds);
        let err = tree.step(&mut Board::default()).unwrap_err();
        assert!(err.is_state_violation());
    }

    #[test]
    fn test_condition_reflects_flag() {
        let deco = LoopDecorator::new(UntilSuccess);
        assert!(!deco.condition::<Board>());
        assert!(!deco.is_looping());
    }
}
