//! Per-object task queue.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Step, TaskContext, TaskKind, TaskNode, TaskState};
use crate::error::{Result, SimError};
use crate::object::GameObject;

/// Ordered queue of root tasks; only the front one is active.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderDispatch {
    tasks: VecDeque<TaskNode>,
}

impl OrderDispatch {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task.
    pub fn add_task(&mut self, task: TaskNode) {
        self.tasks.push_back(task);
    }

    /// Insert a task right after the active one.
    pub fn add_task_next(&mut self, task: TaskNode) {
        if self.tasks.is_empty() {
            self.tasks.push_back(task);
        } else {
            self.tasks.insert(1, task);
        }
    }

    /// Make a task the active one, ahead of everything queued.
    ///
    /// The caller must have ended or paused the previous front task.
    pub fn add_task_front(&mut self, task: TaskNode) {
        self.tasks.push_front(task);
    }

    /// Cancel every queued task.
    ///
    /// Tasks that had not started disappear; started ones wind down.
    pub fn cancel_all_tasks(&mut self) {
        for task in &mut self.tasks {
            task.cancel();
        }
        self.tasks.retain(|task| task.state() != TaskState::Ended);
    }

    /// The active task.
    #[must_use]
    pub fn current_task(&self) -> Option<&TaskNode> {
        self.tasks.front()
    }

    /// All queued tasks, active first.
    pub fn tasks(&self) -> impl Iterator<Item = &TaskNode> {
        self.tasks.iter()
    }

    /// Whether any task is queued.
    #[must_use]
    pub fn has_tasks(&self) -> bool {
        !self.tasks.is_empty()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Whether the active task chain contains a move-aside.
    #[must_use]
    pub fn is_moving_aside(&self) -> bool {
        self.tasks.front().is_some_and(|task| {
            task.active_chain_any(|kind| matches!(kind, TaskKind::MoveAside(_)))
        }) || self
            .tasks
            .iter()
            .skip(1)
            .any(|task| matches!(task.kind(), TaskKind::MoveAside(_)))
    }

    /// Whether the active leaf is on its way somewhere.
    ///
    /// Travelling units sort out their own blockage and are never asked to
    /// step aside.
    #[must_use]
    pub fn is_travelling(&self) -> bool {
        self.tasks.front().is_some_and(|task| {
            matches!(
                task.active_leaf().kind(),
                TaskKind::Move(_) | TaskKind::AttackMove(_) | TaskKind::FactoryExit(_)
            )
        })
    }

    /// End and drop every task, innermost first.
    pub fn end_all(&mut self, me: &mut GameObject, ctx: &mut TaskContext<'_>) {
        while let Some(mut task) = self.tasks.pop_front() {
            task.end(me, ctx);
        }
    }

    /// Advance the active task by one tick.
    ///
    /// An error aborts the whole active tree (it is ended and removed)
    /// and is returned to the caller.
    pub fn tick(&mut self, me: &mut GameObject, ctx: &mut TaskContext<'_>) -> Result<()> {
        let Some(front) = self.tasks.front_mut() else {
            return Ok(());
        };
        match front.tick(me, ctx) {
            Ok(Step::Running) => Ok(()),
            Ok(Step::Finished { .. }) => {
                if let Some(mut finished) = self.tasks.pop_front() {
                    finished.end(me, ctx);
                }
                Ok(())
            }
            Err(err) => {
                if let Some(mut aborted) = self.tasks.pop_front() {
                    aborted.end(me, ctx);
                }
                Err(err)
            }
        }
    }

    /// Run `task` now, resuming the interrupted task afterwards.
    ///
    /// A running front task is replaced by its duplicate, queued right
    /// behind `task`. An already-cancelling front task is dropped. Both
    /// require the front task to force-cancel; otherwise nothing changes
    /// and [`SimError::ForceCancelFailed`] is returned.
    pub fn interrupt(
        &mut self,
        me: &mut GameObject,
        ctx: &mut TaskContext<'_>,
        task: TaskNode,
    ) -> Result<()> {
        if let Some(front) = self.tasks.front_mut() {
            match front.state() {
                TaskState::Running => {
                    let resumed = front.duplicate();
                    if !front.force_cancel(me, ctx) {
                        return Err(SimError::ForceCancelFailed(me.id));
                    }
                    self.tasks.pop_front();
                    self.tasks.push_front(resumed);
                }
                TaskState::Cancelling => {
                    if !front.force_cancel(me, ctx) {
                        return Err(SimError::ForceCancelFailed(me.id));
                    }
                    self.tasks.pop_front();
                }
                TaskState::NotStarted | TaskState::Ended => {}
            }
        }
        debug!(object = me.id, task = task.kind().name(), "task interrupts queue");
        self.tasks.push_front(task);
        Ok(())
    }

    /// Drop every task without running any end hook.
    pub fn clear(&mut self) {
        self.tasks.clear();
    }
}
