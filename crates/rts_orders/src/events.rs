//! Domain events produced during a tick.
//!
//! Events are collected and returned from [`crate::Simulation::tick`] for
//! presentation and replay tooling. Simulation logic never reads them.

use serde::{Deserialize, Serialize};

use crate::map::TileCoord;
use crate::object::{ObjectId, PlayerId};

/// Something observable that happened during a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEvent {
    /// A unit deployed into another type.
    Morphed {
        /// Object that changed type (keeps its id).
        object: ObjectId,
        /// Previous type.
        from_type: String,
        /// New type.
        into_type: String,
    },
    /// A unit was recycled.
    Recycled {
        /// Unit consumed.
        object: ObjectId,
        /// Building that took it.
        recycler: ObjectId,
    },
    /// A building changed hands.
    Captured {
        /// Captured building.
        building: ObjectId,
        /// Engineer that captured it.
        capturer: ObjectId,
        /// New owner.
        new_owner: PlayerId,
    },
    /// A warp was armed.
    TeleportStarted {
        /// Warping object.
        object: ObjectId,
        /// Target tile.
        destination: TileCoord,
        /// Ticks until arrival.
        delay_ticks: u32,
    },
    /// A warp expired and the object was relocated.
    TeleportCompleted {
        /// Warped object.
        object: ObjectId,
        /// Arrival tile.
        destination: TileCoord,
    },
    /// A weapon was discharged.
    WeaponFired {
        /// Shooter.
        attacker: ObjectId,
        /// Target.
        target: ObjectId,
        /// Damage dealt.
        damage: u32,
    },
    /// A task tree was aborted on an invariant violation.
    TaskAborted {
        /// Object whose tasks were aborted.
        object: ObjectId,
        /// Error message.
        reason: String,
    },
    /// An object left play.
    ObjectDestroyed {
        /// Removed object.
        object: ObjectId,
    },
}

/// Events collected during one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickEvents {
    /// Tick the events belong to.
    pub tick: u64,
    /// Events in emission order.
    pub events: Vec<GameEvent>,
}

impl TickEvents {
    /// Whether nothing happened.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
