//! Player-facing orders and their conversion to tasks.

use serde::{Deserialize, Serialize};

use crate::map::TileCoord;
use crate::object::ObjectId;
use crate::task::{
    AttackMoveTask, AttackTask, DeployTask, EnterMode, EnterTask, FactoryExitTask, MoveTask,
    TaskKind, TaskNode, WaitTask,
};

/// An order issued to one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    /// Move to a tile.
    Move {
        /// Destination tile.
        target: TileCoord,
    },
    /// Move to a tile, engaging enemies on the way.
    AttackMove {
        /// Destination tile.
        target: TileCoord,
    },
    /// Attack one object.
    Attack {
        /// Object to attack.
        target: ObjectId,
    },
    /// Cancel everything.
    Stop,
    /// Deploy into a building.
    Deploy,
    /// Capture a building.
    Capture {
        /// Building to capture.
        target: ObjectId,
    },
    /// Recycle into a building.
    Recycle {
        /// Recycler building.
        target: ObjectId,
    },
    /// Idle for a while.
    Wait {
        /// Ticks to wait.
        ticks: u32,
    },
    /// Leave a factory footprint.
    ExitFactory {
        /// Factory being left.
        factory: ObjectId,
        /// Where to go afterwards.
        rally: Option<TileCoord>,
    },
    /// Step to a random free neighbouring tile.
    Scatter,
}

impl Order {
    /// Task carrying out this order.
    ///
    /// `None` for orders that only manipulate the queue ([`Order::Stop`])
    /// or need simulation state to build ([`Order::Scatter`]).
    #[must_use]
    pub fn to_task(&self) -> Option<TaskNode> {
        let kind = match *self {
            Self::Move { target } => TaskKind::Move(MoveTask::new(target)),
            Self::AttackMove { target } => TaskKind::AttackMove(AttackMoveTask::new(target)),
            Self::Attack { target } => TaskKind::Attack(AttackTask::new(target)),
            Self::Deploy => TaskKind::Deploy(DeployTask::new()),
            Self::Capture { target } => TaskKind::Enter(EnterTask::new(target, EnterMode::Capture)),
            Self::Recycle { target } => TaskKind::Enter(EnterTask::new(target, EnterMode::Recycle)),
            Self::Wait { ticks } => TaskKind::Wait(WaitTask::new(ticks)),
            Self::ExitFactory { factory, rally } => {
                TaskKind::FactoryExit(FactoryExitTask::new(factory, rally))
            }
            Self::Stop | Self::Scatter => return None,
        };
        Some(TaskNode::new(kind))
    }
}
