//! World access for tasks during one object's tick.

use serde::{Deserialize, Serialize};

use super::TaskNode;
use crate::events::GameEvent;
use crate::locomotor::LocomotorContext;
use crate::map::{TileMap, Waypoint};
use crate::object::{GameObject, ObjectId, ObjectStorage, PlayerId};
use crate::rng::SimRng;
use crate::rules::Rules;

/// How a deferred order lands in the receiver's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderMode {
    /// Queue after existing tasks.
    Append,
    /// Pause the current task and run this one first.
    Interrupt,
}

/// A task for another object, applied after every object has ticked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeferredOrder {
    /// Object that issued the order.
    pub issuer: ObjectId,
    /// Object receiving the task.
    pub target: ObjectId,
    /// Task to give it.
    pub task: TaskNode,
    /// Queueing mode.
    pub mode: OrderMode,
}

/// A change to another object, applied right after the issuer's tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// Subtract hit points.
    Damage {
        /// Damaged object.
        target: ObjectId,
        /// Hit points removed.
        amount: u32,
    },
    /// Change an object's owner.
    TransferOwnership {
        /// Object changing hands.
        target: ObjectId,
        /// New owner.
        owner: PlayerId,
    },
    /// Take an object out of play.
    Remove {
        /// Object removed.
        target: ObjectId,
    },
}

/// Everything tasks produce for the simulation during a tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickOutputs {
    /// Events in emission order.
    pub events: Vec<GameEvent>,
    /// Orders for other objects, in issue order.
    pub deferred: Vec<DeferredOrder>,
    /// Effects of the object currently ticking.
    pub effects: Vec<Effect>,
}

/// Saved per-node context state, restored when the node's tick returns.
pub(super) struct TaskFrame {
    cancelling: bool,
    children: Vec<TaskNode>,
}

/// World view handed to tasks.
///
/// The ticking object is taken out of `objects` for the duration of its
/// tick and is passed to tasks separately.
pub struct TaskContext<'a> {
    /// Current tick.
    pub tick: u64,
    /// Tile grid.
    pub map: &'a TileMap,
    /// Game rules.
    pub rules: &'a Rules,
    /// Every other object.
    pub objects: &'a ObjectStorage,
    /// Simulation random number generator.
    pub rng: &'a mut SimRng,
    outputs: &'a mut TickOutputs,
    cancelling: bool,
    children: Vec<TaskNode>,
}

impl<'a> TaskContext<'a> {
    /// Create a context for one object's tick.
    pub fn new(
        tick: u64,
        map: &'a TileMap,
        rules: &'a Rules,
        objects: &'a ObjectStorage,
        rng: &'a mut SimRng,
        outputs: &'a mut TickOutputs,
    ) -> Self {
        Self {
            tick,
            map,
            rules,
            objects,
            rng,
            outputs,
            cancelling: false,
            children: Vec::new(),
        }
    }

    /// Whether the running task has been asked to stop.
    #[must_use]
    pub const fn is_cancelling(&self) -> bool {
        self.cancelling
    }

    /// Push a child onto the running task's stack.
    ///
    /// The running task will not finish this tick. Children pushed in one
    /// tick run in reverse push order.
    pub fn push_child(&mut self, child: TaskNode) {
        self.children.push(child);
    }

    /// Give another object a task at the end of this tick.
    pub fn issue_order(
        &mut self,
        issuer: &GameObject,
        target: ObjectId,
        task: TaskNode,
        mode: OrderMode,
    ) {
        self.outputs.deferred.push(DeferredOrder {
            issuer: issuer.id,
            target,
            task,
            mode,
        });
    }

    /// Record an event.
    pub fn emit(&mut self, event: GameEvent) {
        self.outputs.events.push(event);
    }

    /// Change another object.
    pub fn apply(&mut self, effect: Effect) {
        self.outputs.effects.push(effect);
    }

    /// Ground objects other than `me` on a waypoint.
    #[must_use]
    pub fn find_obstacles(&self, waypoint: &Waypoint, me: &GameObject) -> Vec<ObjectId> {
        self.objects.obstacles_at(waypoint, me.id)
    }

    /// View for locomotor calls.
    #[must_use]
    pub const fn locomotor_context(&self) -> LocomotorContext<'a> {
        LocomotorContext {
            map: self.map,
            rules: self.rules,
        }
    }

    pub(super) fn enter_task(&mut self, cancelling: bool) -> TaskFrame {
        TaskFrame {
            cancelling: std::mem::replace(&mut self.cancelling, cancelling),
            children: std::mem::take(&mut self.children),
        }
    }

    pub(super) fn leave_task(&mut self, frame: TaskFrame) -> Vec<TaskNode> {
        self.cancelling = frame.cancelling;
        std::mem::replace(&mut self.children, frame.children)
    }
}
