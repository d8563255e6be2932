//! Arena-backed behavior tree and the per-call task context.
//!
//! Every task lives in a slot of [`BehaviorTree`]. A slot holds the task
//! itself, its parent link, its lifecycle status and the report it made in
//! the current tick. While a task executes, its box is taken out of the
//! slot; a second attempt to execute it in the same call stack is a state
//! violation rather than a borrow conflict.

use crate::config::TraceConfig;
use crate::core::status::{Outcome, Status};
use crate::core::task::{Task, TaskId};
use crate::core::trace::{EventType, TraceLog};
use crate::error::{ArborError, Result};

struct Slot<E> {
    name: String,
    parent: Option<TaskId>,
    status: Status,
    report: Option<Outcome>,
    activations: u64,
    task: Option<Box<dyn Task<E>>>,
}

/// A behavior tree instance over blackboard type `E`.
///
/// One instance belongs to one entity. Use [`BehaviorTree::duplicate`] to
/// stamp out copies of a template; copies share immutable configuration
/// (such as repeat distributions) but never session state.
pub struct BehaviorTree<E> {
    slots: Vec<Slot<E>>,
    root: Option<TaskId>,
    tick: u64,
    trace: TraceLog,
}

impl<E> Default for BehaviorTree<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for BehaviorTree<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BehaviorTree")
            .field("tasks", &self.slots.len())
            .field("root", &self.root)
            .field("tick", &self.tick)
            .finish()
    }
}

impl<E> BehaviorTree<E> {
    /// Create an empty tree with default tracing.
    pub fn new() -> Self {
        Self::with_trace(TraceLog::default())
    }

    /// Create an empty tree with tracing configured from `config`.
    pub fn with_trace_config(config: &TraceConfig) -> Self {
        Self::with_trace(TraceLog::from_config(config))
    }

    /// Create an empty tree that records into `trace`.
    pub fn with_trace(trace: TraceLog) -> Self {
        Self {
            slots: Vec::new(),
            root: None,
            tick: 0,
            trace,
        }
    }

    // =========================================================================
    // Construction
    // =========================================================================

    /// Add a task to the tree and return its id.
    ///
    /// Children the task already refers to become owned by it; each must
    /// exist in this tree and must not have another parent.
    pub fn insert<T: Task<E> + 'static>(&mut self, task: T) -> Result<TaskId> {
        self.insert_boxed(Box::new(task))
    }

    /// Add a boxed task to the tree and return its id.
    pub fn insert_boxed(&mut self, task: Box<dyn Task<E>>) -> Result<TaskId> {
        let id = TaskId::new(self.slots.len());
        let children = task.children();
        for &child in &children {
            let slot = self.slot(child)?;
            if let Some(parent) = slot.parent {
                return Err(ArborError::configuration(format!(
                    "task {} already has parent {}",
                    child, parent
                )));
            }
            if self.root == Some(child) {
                return Err(ArborError::configuration(format!(
                    "root task {} cannot become a child",
                    child
                )));
            }
        }

        self.slots.push(Slot {
            name: task.name().to_string(),
            parent: None,
            status: Status::Fresh,
            report: None,
            activations: 0,
            task: Some(task),
        });
        for child in children {
            self.slot_mut(child)?.parent = Some(id);
        }
        Ok(id)
    }

    /// Attach `child` under `parent` after both were inserted.
    pub fn attach(&mut self, parent: TaskId, child: TaskId) -> Result<()> {
        if let Some(existing) = self.slot(child)?.parent {
            return Err(ArborError::configuration(format!(
                "task {} already has parent {}",
                child, existing
            )));
        }
        if self.root == Some(child) {
            return Err(ArborError::configuration(format!(
                "root task {} cannot become a child",
                child
            )));
        }
        // Walking up from the new parent must never reach the child.
        let mut cursor = Some(parent);
        while let Some(id) = cursor {
            if id == child {
                return Err(ArborError::configuration(format!(
                    "attaching {} under {} would create a cycle",
                    child, parent
                )));
            }
            cursor = self.slot(id)?.parent;
        }

        let mut task = self.take_task(parent)?;
        let result = task.add_child(child);
        self.restore_task(parent, task);
        result?;

        self.slot_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// Make `id` the task driven by [`BehaviorTree::step`].
    pub fn set_root(&mut self, id: TaskId) -> Result<()> {
        if let Some(parent) = self.slot(id)?.parent {
            return Err(ArborError::configuration(format!(
                "task {} has parent {} and cannot be the root",
                id, parent
            )));
        }
        self.root = Some(id);
        Ok(())
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// The root task, if one was set.
    pub fn root(&self) -> Option<TaskId> {
        self.root
    }

    /// Number of tasks in the arena.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of completed calls to [`BehaviorTree::step`].
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Current lifecycle status of a task.
    pub fn status(&self, id: TaskId) -> Result<Status> {
        Ok(self.slot(id)?.status)
    }

    /// Parent of a task, if attached.
    pub fn parent(&self, id: TaskId) -> Result<Option<TaskId>> {
        Ok(self.slot(id)?.parent)
    }

    /// Number of activations of a task that started successfully.
    ///
    /// Counted independently of the trace log, so it stays exact when
    /// tracing is disabled or the log has dropped old events.
    pub fn activations(&self, id: TaskId) -> Result<u64> {
        Ok(self.slot(id)?.activations)
    }

    /// Name of a task.
    pub fn name(&self, id: TaskId) -> Result<&str> {
        Ok(&self.slot(id)?.name)
    }

    /// Borrow a task.
    pub fn task(&self, id: TaskId) -> Result<&dyn Task<E>> {
        let slot = self.slot(id)?;
        slot.task
            .as_deref()
            .ok_or_else(|| executing(id, &slot.name))
    }

    /// Children of a task.
    pub fn children(&self, id: TaskId) -> Result<Vec<TaskId>> {
        Ok(self.task(id)?.children())
    }

    /// The execution trace.
    pub fn trace(&self) -> &TraceLog {
        &self.trace
    }

    /// Mutable access to the execution trace.
    pub fn trace_mut(&mut self) -> &mut TraceLog {
        &mut self.trace
    }

    // =========================================================================
    // Driving
    // =========================================================================

    /// Advance the tree by one tick and return the root's status.
    ///
    /// A root that is not running is started first, so a finished tree
    /// begins a new activation on the next step.
    pub fn step(&mut self, blackboard: &mut E) -> Result<Status> {
        let root = self
            .root
            .ok_or_else(|| ArborError::configuration("behavior tree has no root task"))?;
        self.tick += 1;
        tracing::trace!(tick = self.tick, root = %root, "stepping tree");

        if !self.status(root)?.is_running() {
            self.start_task(root, blackboard)?;
        }
        if self.status(root)?.is_running() {
            self.run_task(root, blackboard)?;
        }
        // The root has no parent: its report ends evaluation for this tick.
        self.take_report(root)?;
        self.status(root)
    }

    /// Begin a new activation of `id` outside of a tick.
    ///
    /// Calling this on a running task restarts it; session state such as a
    /// repeat count is drawn again.
    pub fn start(&mut self, id: TaskId, blackboard: &mut E) -> Result<()> {
        self.start_task(id, blackboard)
    }

    /// Cancel every running task in the subtree rooted at `id`.
    ///
    /// Each task's session state is reset so a later `start` begins clean.
    pub fn cancel(&mut self, id: TaskId) -> Result<()> {
        for child in self.children(id)? {
            self.cancel(child)?;
        }
        let tick = self.tick;
        let slot = self.slot_mut(id)?;
        match slot.task.as_mut() {
            Some(task) => task.reset(),
            None => return Err(executing(id, &slot.name)),
        }
        slot.report = None;
        if slot.status.is_running() {
            slot.status = Status::Cancelled;
            let name = slot.name.clone();
            tracing::debug!(task = %id, name = %name, "task cancelled");
            self.trace.record(tick, id, &name, EventType::Cancelled);
        }
        Ok(())
    }

    /// Return every task in the subtree rooted at `id` to `Fresh`.
    pub fn reset(&mut self, id: TaskId) -> Result<()> {
        for child in self.children(id)? {
            self.reset(child)?;
        }
        let tick = self.tick;
        let slot = self.slot_mut(id)?;
        match slot.task.as_mut() {
            Some(task) => task.reset(),
            None => return Err(executing(id, &slot.name)),
        }
        slot.report = None;
        slot.status = Status::Fresh;
        let name = slot.name.clone();
        self.trace.record(tick, id, &name, EventType::Reset);
        Ok(())
    }

    // =========================================================================
    // Duplication
    // =========================================================================

    /// Copy the tree reachable from the root into a new, fresh instance.
    pub fn duplicate(&self) -> Result<BehaviorTree<E>> {
        let root = self
            .root
            .ok_or_else(|| ArborError::configuration("behavior tree has no root task"))?;
        self.duplicate_subtree(root)
    }

    /// Copy the subtree rooted at `id` into a new tree whose root is the copy.
    pub fn duplicate_subtree(&self, id: TaskId) -> Result<BehaviorTree<E>> {
        let mut duplicator = Duplicator::new(self);
        let root = duplicator.duplicate(id)?;
        let mut tree = duplicator.finish();
        tree.set_root(root)?;
        Ok(tree)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn slot(&self, id: TaskId) -> Result<&Slot<E>> {
        self.slots
            .get(id.index())
            .ok_or_else(|| ArborError::unknown_task(id))
    }

    fn slot_mut(&mut self, id: TaskId) -> Result<&mut Slot<E>> {
        self.slots
            .get_mut(id.index())
            .ok_or_else(|| ArborError::unknown_task(id))
    }

    fn take_task(&mut self, id: TaskId) -> Result<Box<dyn Task<E>>> {
        let slot = self.slot_mut(id)?;
        match slot.task.take() {
            Some(task) => Ok(task),
            None => {
                let err = executing(id, &slot.name);
                tracing::warn!(task = %id, "{}", err);
                Err(err)
            }
        }
    }

    fn restore_task(&mut self, id: TaskId, task: Box<dyn Task<E>>) {
        if let Some(slot) = self.slots.get_mut(id.index()) {
            slot.task = Some(task);
        }
    }

    fn start_task(&mut self, id: TaskId, blackboard: &mut E) -> Result<()> {
        let mut task = self.take_task(id)?;
        let tick = self.tick;
        let name = {
            let slot = self.slot_mut(id)?;
            slot.status = Status::Running;
            slot.report = None;
            slot.name.clone()
        };
        tracing::debug!(task = %id, name = %name, tick, "task started");
        self.trace.record(tick, id, &name, EventType::Started);

        let result = {
            let mut ctx = TaskContext::new(self, blackboard, id);
            task.start(&mut ctx)
        };
        match result {
            Ok(()) => {
                if let Ok(slot) = self.slot_mut(id) {
                    slot.activations += 1;
                }
            }
            Err(_) => {
                // A failed start never began the activation.
                task.reset();
                if let Ok(slot) = self.slot_mut(id) {
                    slot.status = Status::Fresh;
                    slot.report = None;
                }
            }
        }
        self.restore_task(id, task);
        result
    }

    fn run_task(&mut self, id: TaskId, blackboard: &mut E) -> Result<()> {
        let mut task = self.take_task(id)?;
        let result = {
            let mut ctx = TaskContext::new(self, blackboard, id);
            task.run(&mut ctx)
        };
        self.restore_task(id, task);
        result
    }

    fn report(&mut self, id: TaskId, outcome: Outcome) -> Result<()> {
        let tick = self.tick;
        let slot = self.slot_mut(id)?;
        if !slot.status.is_running() {
            let err = ArborError::state_violation(format!(
                "task {} ({}) reported {} while {}",
                id, slot.name, outcome, slot.status
            ));
            tracing::warn!(task = %id, "{}", err);
            return Err(err);
        }
        slot.status = outcome.status();
        slot.report = Some(outcome);
        let name = slot.name.clone();
        tracing::debug!(task = %id, name = %name, %outcome, tick, "task reported");
        self.trace.record(tick, id, &name, outcome.into());
        Ok(())
    }

    fn take_report(&mut self, id: TaskId) -> Result<Option<Outcome>> {
        Ok(self.slot_mut(id)?.report.take())
    }
}

fn executing(id: TaskId, name: &str) -> ArborError {
    ArborError::state_violation(format!("task {} ({}) is already executing", id, name))
}

// =============================================================================
// TaskContext
// =============================================================================

/// Handle given to a task while one of its hooks runs.
///
/// Gives access to the blackboard, lets the task report about itself, and
/// lets parents drive their children.
pub struct TaskContext<'a, E> {
    tree: &'a mut BehaviorTree<E>,
    blackboard: &'a mut E,
    id: TaskId,
}

impl<'a, E> TaskContext<'a, E> {
    fn new(tree: &'a mut BehaviorTree<E>, blackboard: &'a mut E, id: TaskId) -> Self {
        Self {
            tree,
            blackboard,
            id,
        }
    }

    /// Id of the task this context belongs to.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Current tree tick.
    pub fn tick(&self) -> u64 {
        self.tree.tick
    }

    /// Shared state of the tree.
    pub fn blackboard(&mut self) -> &mut E {
        &mut *self.blackboard
    }

    /// Status of any task in the tree.
    pub fn status(&self, id: TaskId) -> Result<Status> {
        self.tree.status(id)
    }

    /// Status of the task this context belongs to.
    pub fn own_status(&self) -> Result<Status> {
        self.tree.status(self.id)
    }

    /// Report success for this activation.
    pub fn success(&mut self) -> Result<()> {
        self.report(Outcome::Success)
    }

    /// Report failure for this activation.
    pub fn fail(&mut self) -> Result<()> {
        self.report(Outcome::Failure)
    }

    /// Report that this task needs more ticks.
    pub fn running(&mut self) -> Result<()> {
        self.report(Outcome::Running)
    }

    /// Report `outcome`.
    ///
    /// Reporting twice with a terminal outcome in one activation, or
    /// reporting before being started, is a state violation.
    pub fn report(&mut self, outcome: Outcome) -> Result<()> {
        self.tree.report(self.id, outcome)
    }

    /// Tick `child` once on behalf of `parent` and deliver its report.
    ///
    /// The child is started first unless it is mid-activation. Whatever the
    /// child reports is handed to the matching `child_*` hook of `parent`.
    /// Returns the delivered outcome, or `None` if the child reported
    /// nothing this tick.
    pub fn drive_child(
        &mut self,
        child: TaskId,
        parent: &mut dyn Task<E>,
    ) -> Result<Option<Outcome>> {
        if self.tree.parent(child)? != Some(self.id) {
            return Err(ArborError::state_violation(format!(
                "task {} is not a child of {}",
                child, self.id
            )));
        }

        if !self.tree.status(child)?.is_running() {
            self.tree.start_task(child, &mut *self.blackboard)?;
        }
        // A child may settle its outcome in `start`; only run it if it didn't.
        if self.tree.status(child)?.is_running() {
            tracing::trace!(parent = %self.id, child = %child, "driving child");
            self.tree.run_task(child, &mut *self.blackboard)?;
        }

        let outcome = self.tree.take_report(child)?;
        match outcome {
            Some(Outcome::Success) => parent.child_success(self, child)?,
            Some(Outcome::Failure) => parent.child_fail(self, child)?,
            Some(Outcome::Running) => parent.child_running(self, child)?,
            None => {}
        }
        Ok(outcome)
    }
}

// =============================================================================
// Duplicator
// =============================================================================

/// Copies tasks from a source tree into a new tree.
///
/// Handed to [`Task::duplicate`] so parent tasks can copy their children
/// before constructing themselves.
pub struct Duplicator<'a, E> {
    source: &'a BehaviorTree<E>,
    target: BehaviorTree<E>,
}

impl<'a, E> Duplicator<'a, E> {
    fn new(source: &'a BehaviorTree<E>) -> Self {
        Self {
            source,
            target: BehaviorTree::with_trace(source.trace.empty_like()),
        }
    }

    /// Duplicate the source subtree rooted at `id`; returns the id of the
    /// copy in the target tree.
    pub fn duplicate(&mut self, id: TaskId) -> Result<TaskId> {
        let source = self.source;
        let copy = source.task(id)?.duplicate(self)?;
        self.target.insert_boxed(copy)
    }

    fn finish(self) -> BehaviorTree<E> {
        self.target
    }
}
