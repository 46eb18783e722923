//! Hierarchical, cancellable task trees.
//!
//! Every object owns an [`OrderDispatch`]: a queue of root [`TaskNode`]s of
//! which only the front one is active. A node runs its own logic only
//! while its child stack is empty; otherwise the top child runs instead.
//!
//! # Per-tick protocol
//!
//! 1. A node with children ticks its top child. When that child finishes
//!    it is ended and popped, and if no children remain the node resumes
//!    in the same tick. A node that itself finished by resuming does not
//!    let its parent resume as well: only one finish-then-resume step
//!    happens per tick.
//! 2. A node without children runs [`Task::on_tick`]. Pushing a child
//!    always defers completion, even if `on_tick` returned `true`.
//! 3. A finished root is ended and popped; the next queued task starts on
//!    the following tick.
//!
//! # Cancellation
//!
//! [`TaskNode::cancel`] is cooperative. It puts a cancellable node and its
//! cancellable children into [`TaskState::Cancelling`]; the task sees this
//! through [`TaskContext::is_cancelling`] and must finish within
//! [`Task::max_cancel_ticks`]. [`TaskNode::force_cancel`] ends the whole
//! tree in the same tick, innermost first, when every node certifies that
//! it can stop immediately.

mod attack;
mod attack_move;
mod context;
mod deploy;
mod dispatch;
mod enter;
mod factory_exit;
mod move_aside;
mod move_task;
mod wait;

pub use attack::AttackTask;
pub use attack_move::AttackMoveTask;
pub use context::{DeferredOrder, Effect, OrderMode, TaskContext, TickOutputs};
pub use deploy::DeployTask;
pub use dispatch::OrderDispatch;
pub use enter::{EnterMode, EnterTask};
pub use factory_exit::FactoryExitTask;
pub use move_aside::MoveAsideTask;
pub use move_task::MoveTask;
pub use wait::WaitTask;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::object::GameObject;
use crate::rules::Rules;

/// Lifecycle of a task node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TaskState {
    /// Created, not yet ticked.
    #[default]
    NotStarted,
    /// Started and ticking.
    Running,
    /// Asked to stop; finishing within its bound.
    Cancelling,
    /// Terminal.
    Ended,
}

/// Behaviour of one kind of task.
pub trait Task {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Called once, on the first tick the task is active.
    fn on_start(&mut self, _me: &mut GameObject, _ctx: &mut TaskContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Advance one tick. Returns `true` when finished.
    fn on_tick(&mut self, me: &mut GameObject, ctx: &mut TaskContext<'_>) -> Result<bool>;

    /// Called once when a started task ends for any reason.
    fn on_end(&mut self, _me: &mut GameObject, _ctx: &mut TaskContext<'_>) {}

    /// Whether the task can be ended right now without leaving the object
    /// in an invalid state.
    fn can_force_cancel(&self, _me: &GameObject) -> bool {
        true
    }

    /// Ticks the task may take to finish once cancelled.
    fn max_cancel_ticks(&self, _rules: &Rules) -> u32 {
        1
    }

    /// Fresh, not-started equivalent of this task.
    #[must_use]
    fn duplicate(&self) -> Self
    where
        Self: Sized;
}

/// Closed set of task kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    /// Path to a tile.
    Move(MoveTask),
    /// Move, engaging targets on the way.
    AttackMove(AttackMoveTask),
    /// Fire at one target.
    Attack(AttackTask),
    /// Step out of a blocked unit's way.
    MoveAside(MoveAsideTask),
    /// Leave a factory footprint and head for the rally point.
    FactoryExit(FactoryExitTask),
    /// Idle for a number of ticks.
    Wait(WaitTask),
    /// Morph into a building.
    Deploy(DeployTask),
    /// Capture or recycle into a building.
    Enter(EnterTask),
}

macro_rules! with_task {
    ($kind:expr, $task:ident => $body:expr) => {
        match $kind {
            TaskKind::Move($task) => $body,
            TaskKind::AttackMove($task) => $body,
            TaskKind::Attack($task) => $body,
            TaskKind::MoveAside($task) => $body,
            TaskKind::FactoryExit($task) => $body,
            TaskKind::Wait($task) => $body,
            TaskKind::Deploy($task) => $body,
            TaskKind::Enter($task) => $body,
        }
    };
}

impl TaskKind {
    /// Short name for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        with_task!(self, task => task.name())
    }

    fn on_start(&mut self, me: &mut GameObject, ctx: &mut TaskContext<'_>) -> Result<()> {
        with_task!(self, task => task.on_start(me, ctx))
    }

    fn on_tick(&mut self, me: &mut GameObject, ctx: &mut TaskContext<'_>) -> Result<bool> {
        with_task!(self, task => task.on_tick(me, ctx))
    }

    fn on_end(&mut self, me: &mut GameObject, ctx: &mut TaskContext<'_>) {
        with_task!(self, task => task.on_end(me, ctx));
    }

    fn can_force_cancel(&self, me: &GameObject) -> bool {
        with_task!(self, task => task.can_force_cancel(me))
    }

    /// Ticks this kind may take to finish once cancelled.
    #[must_use]
    pub fn max_cancel_ticks(&self, rules: &Rules) -> u32 {
        with_task!(self, task => task.max_cancel_ticks(rules))
    }

    /// Fresh equivalent of this kind.
    #[must_use]
    pub fn duplicate(&self) -> Self {
        match self {
            Self::Move(task) => Self::Move(task.duplicate()),
            Self::AttackMove(task) => Self::AttackMove(task.duplicate()),
            Self::Attack(task) => Self::Attack(task.duplicate()),
            Self::MoveAside(task) => Self::MoveAside(task.duplicate()),
            Self::FactoryExit(task) => Self::FactoryExit(task.duplicate()),
            Self::Wait(task) => Self::Wait(task.duplicate()),
            Self::Deploy(task) => Self::Deploy(task.duplicate()),
            Self::Enter(task) => Self::Enter(task.duplicate()),
        }
    }
}

/// Outcome of ticking a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Still running.
    Running,
    /// Finished this tick.
    Finished {
        /// The node finished while resuming after a child ended.
        resumed: bool,
    },
}

/// A task plus its lifecycle and child stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskNode {
    state: TaskState,
    cancellable: bool,
    children: Vec<TaskNode>,
    kind: TaskKind,
}

impl TaskNode {
    /// A cancellable node.
    #[must_use]
    pub fn new(kind: TaskKind) -> Self {
        Self {
            state: TaskState::NotStarted,
            cancellable: true,
            children: Vec::new(),
            kind,
        }
    }

    /// A node that ignores [`TaskNode::cancel`].
    #[must_use]
    pub fn non_cancellable(kind: TaskKind) -> Self {
        Self {
            cancellable: false,
            ..Self::new(kind)
        }
    }

    /// Lifecycle state.
    #[must_use]
    pub const fn state(&self) -> TaskState {
        self.state
    }

    /// Task parameters and progress.
    #[must_use]
    pub const fn kind(&self) -> &TaskKind {
        &self.kind
    }

    /// Child stack, bottom first.
    #[must_use]
    pub fn children(&self) -> &[TaskNode] {
        &self.children
    }

    /// Whether `cancel` has any effect.
    #[must_use]
    pub const fn is_cancellable(&self) -> bool {
        self.cancellable
    }

    /// Whether the node is winding down after `cancel`.
    #[must_use]
    pub fn is_cancelling(&self) -> bool {
        self.state == TaskState::Cancelling
    }

    /// Whether the node has started and not yet ended.
    #[must_use]
    pub fn is_started(&self) -> bool {
        matches!(self.state, TaskState::Running | TaskState::Cancelling)
    }

    /// Innermost node currently running (the top of the child stacks).
    #[must_use]
    pub fn active_leaf(&self) -> &TaskNode {
        let mut node = self;
        while let Some(child) = node.children.last() {
            node = child;
        }
        node
    }

    /// Whether this node or any node on its active chain matches.
    pub fn active_chain_any(&self, mut predicate: impl FnMut(&TaskKind) -> bool) -> bool {
        let mut node = self;
        loop {
            if predicate(&node.kind) {
                return true;
            }
            match node.children.last() {
                Some(child) => node = child,
                None => return false,
            }
        }
    }

    /// Request cooperative cancellation.
    pub fn cancel(&mut self) {
        if !self.cancellable {
            return;
        }
        match self.state {
            TaskState::NotStarted => self.state = TaskState::Ended,
            TaskState::Running => self.state = TaskState::Cancelling,
            TaskState::Cancelling | TaskState::Ended => {}
        }
        for child in &mut self.children {
            child.cancel();
        }
    }

    /// Upper bound on ticks to finish once cancelled.
    #[must_use]
    pub fn max_cancel_ticks(&self, rules: &Rules) -> u32 {
        self.children
            .iter()
            .map(|child| child.max_cancel_ticks(rules))
            .sum::<u32>()
            + self.kind.max_cancel_ticks(rules)
    }

    fn can_force_cancel(&self, me: &GameObject) -> bool {
        if !self.is_started() {
            return true;
        }
        self.kind.can_force_cancel(me) && self.children.iter().all(|c| c.can_force_cancel(me))
    }

    /// End the tree immediately if every started node allows it.
    ///
    /// Returns `false`, leaving the tree untouched, when any node refuses.
    pub fn force_cancel(&mut self, me: &mut GameObject, ctx: &mut TaskContext<'_>) -> bool {
        if !self.can_force_cancel(me) {
            return false;
        }
        debug!(object = me.id, task = self.kind.name(), "task force-cancelled");
        self.end(me, ctx);
        true
    }

    /// Fresh, not-started equivalent (children are not copied).
    #[must_use]
    pub fn duplicate(&self) -> Self {
        Self {
            state: TaskState::NotStarted,
            cancellable: self.cancellable,
            children: Vec::new(),
            kind: self.kind.duplicate(),
        }
    }

    /// End this node and its children, innermost first.
    ///
    /// `on_end` runs only for nodes that started.
    pub fn end(&mut self, me: &mut GameObject, ctx: &mut TaskContext<'_>) {
        while let Some(mut child) = self.children.pop() {
            child.end(me, ctx);
        }
        if self.is_started() {
            debug!(object = me.id, task = self.kind.name(), "task ended");
            self.kind.on_end(me, ctx);
        }
        self.state = TaskState::Ended;
    }

    /// Advance the tree by one tick.
    pub fn tick(&mut self, me: &mut GameObject, ctx: &mut TaskContext<'_>) -> Result<Step> {
        if self.state == TaskState::Ended {
            return Ok(Step::Finished { resumed: false });
        }

        if let Some(child) = self.children.last_mut() {
            let Step::Finished { resumed } = child.tick(me, ctx)? else {
                return Ok(Step::Running);
            };
            if let Some(mut finished) = self.children.pop() {
                finished.end(me, ctx);
            }
            if resumed || !self.children.is_empty() {
                return Ok(Step::Running);
            }
            return Ok(if self.run(me, ctx)? {
                Step::Finished { resumed: true }
            } else {
                Step::Running
            });
        }

        Ok(if self.run(me, ctx)? {
            Step::Finished { resumed: false }
        } else {
            Step::Running
        })
    }

    fn run(&mut self, me: &mut GameObject, ctx: &mut TaskContext<'_>) -> Result<bool> {
        if self.state == TaskState::NotStarted {
            self.state = TaskState::Running;
            debug!(object = me.id, task = self.kind.name(), "task started");
            self.kind.on_start(me, ctx)?;
        }

        let saved = ctx.enter_task(self.state == TaskState::Cancelling);
        let result = self.kind.on_tick(me, ctx);
        let pushed = ctx.leave_task(saved);
        let finished = result?;

        if pushed.is_empty() {
            return Ok(finished);
        }
        for mut child in pushed {
            if self.state == TaskState::Cancelling {
                child.cancel();
            }
            self.children.push(child);
        }
        Ok(false)
    }
}
