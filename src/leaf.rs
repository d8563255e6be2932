//! Leaf tasks.

use crate::core::{Duplicator, Outcome, Task, TaskContext};
use crate::error::Result;

/// A leaf that runs a closure over the blackboard each tick and reports the
/// outcome it returns.
///
/// Duplicating the task clones the closure, so any captured state is copied
/// rather than shared between tree instances.
#[derive(Clone)]
pub struct ActionTask<F> {
    name: String,
    action: F,
}

impl<F> ActionTask<F> {
    /// Create an action leaf.
    pub fn new(name: impl Into<String>, action: F) -> Self {
        Self {
            name: name.into(),
            action,
        }
    }
}

impl<F> std::fmt::Debug for ActionTask<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionTask")
            .field("name", &self.name)
            .finish()
    }
}

impl<E, F> Task<E> for ActionTask<F>
where
    F: FnMut(&mut E) -> Outcome + Clone + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&mut self, ctx: &mut TaskContext<'_, E>) -> Result<()> {
        let outcome = (self.action)(ctx.blackboard());
        ctx.report(outcome)
    }

    fn duplicate(&self, _duplicator: &mut Duplicator<'_, E>) -> Result<Box<dyn Task<E>>> {
        Ok(Box::new(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BehaviorTree, Status};

    #[test]
    fn test_action_reports_closure_outcome() {
        let mut tree: BehaviorTree<Vec<u32>> = BehaviorTree::new();
        let leaf = tree
            .insert(ActionTask::new("push", |log: &mut Vec<u32>| {
                log.push(7);
                Outcome::Failure
            }))
            .unwrap();
        tree.set_root(leaf).unwrap();

        let mut log = Vec::new();
        assert_eq!(tree.step(&mut log).unwrap(), Status::Failed);
        assert_eq!(log, vec![7]);
        assert_eq!(tree.name(leaf).unwrap(), "push");
    }

    #[test]
    fn test_duplicate_copies_captured_state() {
        let mut calls = 0u32;
        let mut tree: BehaviorTree<u32> = BehaviorTree::new();
        let leaf = tree
            .insert(ActionTask::new("count", move |seen: &mut u32| {
                calls += 1;
                *seen = calls;
                Outcome::Success
            }))
            .unwrap();
        tree.set_root(leaf).unwrap();

        let mut seen = 0;
        tree.step(&mut seen).unwrap();
        tree.step(&mut seen).unwrap();
        assert_eq!(seen, 2);

        let mut copy = tree.duplicate().unwrap();
        copy.step(&mut seen).unwrap();
        assert_eq!(seen, 3);
    }
}
