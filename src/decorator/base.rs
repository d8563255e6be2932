//! The single-child decorator and its outcome policies.

use crate::core::{Duplicator, Outcome, Task, TaskContext, TaskId};
use crate::error::{ArborError, Result};

/// How a decorator reinterprets its child's terminal outcome.
///
/// The defaults forward the outcome unchanged.
pub trait DecoratorPolicy<E>: Send + 'static {
    /// Name used in logs and traces.
    fn name(&self) -> &'static str;

    /// Prepare per-activation state.
    fn start(&mut self, _ctx: &mut TaskContext<'_, E>) -> Result<()> {
        Ok(())
    }

    /// The child succeeded.
    fn child_success(&mut self, ctx: &mut TaskContext<'_, E>, _child: TaskId) -> Result<()> {
        ctx.success()
    }

    /// The child failed.
    fn child_fail(&mut self, ctx: &mut TaskContext<'_, E>, _child: TaskId) -> Result<()> {
        ctx.fail()
    }

    /// Drop activation-local state.
    fn reset(&mut self) {}

    /// Copy the policy for a duplicated tree, without session state.
    fn duplicate(&self) -> Self
    where
        Self: Sized;
}

/// A task wrapping exactly one child.
#[derive(Debug, Clone)]
pub struct Decorator<P> {
    child: Option<TaskId>,
    policy: P,
}

impl<P> Decorator<P> {
    /// Create a decorator with no child yet; attach one with
    /// [`BehaviorTree::attach`](crate::core::BehaviorTree::attach).
    pub fn new(policy: P) -> Self {
        Self {
            child: None,
            policy,
        }
    }

    /// Create a decorator wrapping `child`.
    pub fn wrap(policy: P, child: TaskId) -> Self {
        Self {
            child: Some(child),
            policy,
        }
    }

    /// The wrapped child, if attached.
    pub fn child(&self) -> Option<TaskId> {
        self.child
    }

    /// The outcome policy.
    pub fn policy(&self) -> &P {
        &self.policy
    }
}

impl<E, P: DecoratorPolicy<E>> Task<E> for Decorator<P> {
    fn name(&self) -> &str {
        self.policy.name()
    }

    fn start(&mut self, ctx: &mut TaskContext<'_, E>) -> Result<()> {
        self.policy.start(ctx)
    }

    fn run(&mut self, ctx: &mut TaskContext<'_, E>) -> Result<()> {
        let child = require_child(self.child, self.policy.name())?;
        ctx.drive_child(child, self)?;
        Ok(())
    }

    fn child_success(&mut self, ctx: &mut TaskContext<'_, E>, child: TaskId) -> Result<()> {
        check_child(self.child, child, ctx.id())?;
        self.policy.child_success(ctx, child)
    }

    fn child_fail(&mut self, ctx: &mut TaskContext<'_, E>, child: TaskId) -> Result<()> {
        check_child(self.child, child, ctx.id())?;
        self.policy.child_fail(ctx, child)
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
        self.policy.reset();
    }

    fn duplicate(&self, duplicator: &mut Duplicator<'_, E>) -> Result<Box<dyn Task<E>>> {
        Ok(Box::new(Decorator {
            child: duplicate_child(self.child, duplicator)?,
            policy: self.policy.duplicate(),
        }))
    }
}

// =============================================================================
// Shared single-child plumbing
// =============================================================================

/// The child of a decorator about to be ticked.
pub(crate) fn require_child(child: Option<TaskId>, name: &str) -> Result<TaskId> {
    child.ok_or_else(|| {
        let err = ArborError::configuration(format!("{} decorator ticked without a child", name));
        tracing::warn!("{}", err);
        err
    })
}

/// Reject reports from anything but the wrapped child.
pub(crate) fn check_child(child: Option<TaskId>, reporter: TaskId, owner: TaskId) -> Result<()> {
    if child == Some(reporter) {
        return Ok(());
    }
    let err = ArborError::state_violation(format!(
        "task {} reported to {} but is not its child",
        reporter, owner
    ));
    tracing::warn!("{}", err);
    Err(err)
}

/// Fill an empty child slot.
pub(crate) fn attach_child(slot: &mut Option<TaskId>, child: TaskId, name: &str) -> Result<()> {
    if let Some(existing) = slot {
        return Err(ArborError::configuration(format!(
            "{} decorator already wraps {}",
            name, existing
        )));
    }
    *slot = Some(child);
    Ok(())
}

/// Duplicate the wrapped child into the target tree.
///
/// Every decorator's duplication goes through here so copies keep their
/// full depth.
pub(crate) fn duplicate_child<E>(
    child: Option<TaskId>,
    duplicator: &mut Duplicator<'_, E>,
) -> Result<Option<TaskId>> {
    child.map(|id| duplicator.duplicate(id)).transpose()
}

// =============================================================================
// Policies
// =============================================================================

/// Forwards the child's outcome unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Passthrough;

impl<E> DecoratorPolicy<E> for Passthrough {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn duplicate(&self) -> Self {
        Passthrough
    }
}

/// Swaps success and failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Invert;

impl<E> DecoratorPolicy<E> for Invert {
    fn name(&self) -> &'static str {
        "invert"
    }

    fn child_success(&mut self, ctx: &mut TaskContext<'_, E>, _child: TaskId) -> Result<()> {
        ctx.report(Outcome::Success.invert())
    }

    fn child_fail(&mut self, ctx: &mut TaskContext<'_, E>, _child: TaskId) -> Result<()> {
        ctx.report(Outcome::Failure.invert())
    }

    fn duplicate(&self) -> Self {
        Invert
    }
}

/// Succeeds whatever the child does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlwaysSucceed;

impl<E> DecoratorPolicy<E> for AlwaysSucceed {
    fn name(&self) -> &'static str {
        "always_succeed"
    }

    fn child_fail(&mut self, ctx: &mut TaskContext<'_, E>, _child: TaskId) -> Result<()> {
        ctx.success()
    }

    fn duplicate(&self) -> Self {
        AlwaysSucceed
    }
}

/// Fails whatever the child does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlwaysFail;

impl<E> DecoratorPolicy<E> for AlwaysFail {
    fn name(&self) -> &'static str {
        "always_fail"
    }

    fn child_success(&mut self, ctx: &mut TaskContext<'_, E>, _child: TaskId) -> Result<()> {
        ctx.fail()
    }

    fn duplicate(&self) -> Self {
        AlwaysFail
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
    }

    fn succeed(board: &mut Board) -> Outcome {
        board.runs += 1;
        Outcome::Success
    }

    fn fail(board: &mut Board) -> Outcome {
        board.runs += 1;
        Outcome::Failure
    }

    fn running_twice(board: &mut Board) -> Outcome {
        board.runs += 1;
        if board.runs < 3 {
            Outcome::Running
        } else {
            Outcome::Success
        }
    }

    fn decorated<P: DecoratorPolicy<Board>>(
        policy: P,
        leaf: fn(&mut Board) -> Outcome,
    ) -> (BehaviorTree<Board>, TaskId, TaskId) {
        let mut tree: BehaviorTree<Board> = BehaviorTree::new();
        let child = tree.insert(ActionTask::new("leaf", leaf)).unwrap();
        let root = tree.insert(Decorator::wrap(policy, child)).unwrap();
        tree.set_root(root).unwrap();
        (tree, root, child)
    }

    #[test]
    fn test_passthrough_forwards_success() {
        let (mut tree, _, _) = decorated(Passthrough, succeed);
        assert_eq!(tree.step(&mut Board::default()).unwrap(), Status::Succeeded);
    }

    #[test]
    fn test_passthrough_forwards_failure() {
        let (mut tree, _, _) = decorated(Passthrough, fail);
        assert_eq!(tree.step(&mut Board::default()).unwrap(), Status::Failed);
    }

    #[test]
    fn test_running_child_keeps_decorator_running() {
        let (mut tree, root, child) = decorated(Passthrough, running_twice);
        let mut board = Board::default();

        assert_eq!(tree.step(&mut board).unwrap(), Status::Running);
        assert_eq!(tree.step(&mut board).unwrap(), Status::Running);
        assert_eq!(tree.step(&mut board).unwrap(), Status::Succeeded);

        // The child is started once and then only run.
        assert_eq!(tree.trace().count(child, EventType::Started), 1);
        assert_eq!(tree.trace().count(root, EventType::Started), 1);
        assert_eq!(board.runs, 3);
    }

    #[test]
    fn test_invert() {
        let (mut tree, _, _) = decorated(Invert, succeed);
        assert_eq!(tree.step(&mut Board::default()).unwrap(), Status::Failed);

        let (mut tree, _, _) = decorated(Invert, fail);
        assert_eq!(tree.step(&mut Board::default()).unwrap(), Status::Succeeded);
    }

    #[test]
    fn test_always_succeed_and_always_fail() {
        let (mut tree, _, _) = decorated(AlwaysSucceed, fail);
        assert_eq!(tree.step(&mut Board::default()).unwrap(), Status::Succeeded);

        let (mut tree, _, _) = decorated(AlwaysFail, succeed);
        assert_eq!(tree.step(&mut Board::default()).unwrap(), Status::Failed);
    }

    #[test]
    fn test_tick_without_child_is_configuration_error() {
        let mut tree: BehaviorTree<Board> = BehaviorTree::new();
        let root = tree.insert(Decorator::new(Passthrough)).unwrap();
        tree.set_root(root).unwrap();

        let err = tree.step(&mut Board::default()).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_attach_after_construction() {
        let mut tree: BehaviorTree<Board> = BehaviorTree::new();
        let root = tree.insert(Decorator::new(Passthrough)).unwrap();
        let child = tree.insert(ActionTask::new("leaf", succeed)).unwrap();
        tree.attach(root, child).unwrap();
        tree.set_root(root).unwrap();

        assert_eq!(tree.step(&mut Board::default()).unwrap(), Status::Succeeded);
    }

    #[test]
    fn test_second_child_is_rejected() {
        let (mut tree, root, _) = decorated(Passthrough, succeed);
        let extra = tree.insert(ActionTask::new("extra", succeed)).unwrap();

        assert!(tree.attach(root, extra).unwrap_err().is_configuration());
        assert_eq!(tree.children(root).unwrap().len(), 1);
    }

    #[test]
    fn test_report_from_stranger_is_state_violation() {
        struct Stranger;

        impl Task<Board> for Stranger {
            fn name(&self) -> &str {
                "stranger"
            }

            // Drives its child but reports the outcome to a fresh decorator
            // that never wrapped it.
            fn run(&mut self, ctx: &mut TaskContext<'_, Board>) -> Result<()> {
                let mut other: Decorator<Passthrough> =
                    Decorator::wrap(Passthrough, TaskId::new(99));
                let child = TaskId::new(0);
                ctx.drive_child(child, &mut other).map(|_| ())
            }

            fn children(&self) -> Vec<TaskId> {
                vec![TaskId::new(0)]
            }

            fn duplicate(&self, _d: &mut Duplicator<'_, Board>) -> Result<Box<dyn Task<Board>>> {
                Ok(Box::new(Stranger))
            }
        }

        let mut tree: BehaviorTree<Board> = BehaviorTree::new();
        tree.insert(ActionTask::new("leaf", succeed)).unwrap();
        let root = tree.insert(Stranger).unwrap();
        tree.set_root(root).unwrap();

        let err = tree.step(&mut Board::default()).unwrap_err();
        assert!(err.is_state_violation());
    }

    #[test]
    fn test_duplicate_keeps_depth() {
        let mut tree: BehaviorTree<Board> = BehaviorTree::new();
        let leaf = tree.insert(ActionTask::new("leaf", succeed)).unwrap();
        let inner = tree.insert(Decorator::wrap(Invert, leaf)).unwrap();
        let outer = tree.insert(Decorator::wrap(Invert, inner)).unwrap();
        tree.set_root(outer).unwrap();

        let mut copy = tree.duplicate().unwrap();
        assert_eq!(copy.len(), 3);
        // Double inversion of success is success.
        assert_eq!(copy.step(&mut Board::default()).unwrap(), Status::Succeeded);
    }

    #[test]
    fn test_duplicate_without_child() {
        let mut tree: BehaviorTree<Board> = BehaviorTree::new();
        let root = tree.insert(Decorator::new(Passthrough)).unwrap();
        tree.set_root(root).unwrap();

        let copy = tree.duplicate().unwrap();
        assert_eq!(copy.len(), 1);
        assert!(copy.children(copy.root().unwrap()).unwrap().is_empty());
    }
}
