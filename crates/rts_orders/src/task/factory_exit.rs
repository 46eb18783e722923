use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{MoveAsideTask, MoveTask, OrderMode, Task, TaskContext, TaskKind, TaskNode};
use crate::error::Result;
use crate::locomotor::TURN_RATE;
use crate::map::{Direction, TileCoord, TileRect, Waypoint, LEPTONS_PER_TILE};
use crate::movement::is_passable;
use crate::object::{GameObject, ObjectId};
use crate::rules::Rules;
use crate::tile_search::{map_area, DirectionalFinder, TileFinder};

/// Attempts at leaving the footprint before giving up.
const MAX_EXIT_ATTEMPTS: u32 = 3;

/// Tiles searched south of the rally point for a free spot.
const RALLY_PROBE_DISTANCE: u32 = 3;

/// Tolerance of the move to the rally point.
const RALLY_TOLERANCE: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
enum ExitPhase {
    ClearRamp,
    Exiting,
    Rallying,
}

/// Drive a freshly built unit out of its factory.
///
/// While the exit tile below the footprint is occupied, one friendly blocker per
/// tick gets a non-cancellable move-aside, for at most
/// `factory_exit_clear_ticks`. The unit then leaves with zero tolerance,
/// ignoring the factory itself, and once outside heads for the rally
/// point with a relaxed tolerance like any other move.
///
/// The leave move ignores cancellation but carries a deadline sized from
/// the unit's speed, so a cancelled exit ends within that budget, clear of
/// the ramp or stuck inside. The task cannot be force-cancelled while the
/// unit is still inside the footprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FactoryExitTask {
    factory: ObjectId,
    rally: Option<TileCoord>,
    phase: ExitPhase,
    clear_ticks: u32,
    exit_attempts: u32,
    leave_budget: u32,
    footprint: Option<TileRect>,
}

impl FactoryExitTask {
    /// Leave `factory`, then go to `rally` if given.
    #[must_use]
    pub const fn new(factory: ObjectId, rally: Option<TileCoord>) -> Self {
        Self {
            factory,
            rally,
            phase: ExitPhase::ClearRamp,
            clear_ticks: 0,
            exit_attempts: 0,
            leave_budget: 0,
            footprint: None,
        }
    }

    /// Factory being left.
    #[must_use]
    pub const fn factory(&self) -> ObjectId {
        self.factory
    }

    /// Tile just below the middle of a footprint.
    #[must_use]
    pub const fn exit_tile(footprint: &TileRect) -> TileCoord {
        let width = footprint.max.rx - footprint.min.rx + 1;
        TileCoord::new(footprint.min.rx + width / 2, footprint.max.ry + 1)
    }

    /// Ticks allowed for one attempt at stepping from `from` onto `exit`.
    ///
    /// Covers diagonal steps at base speed, the end pause, a half turn and
    /// one blocked wait.
    #[must_use]
    pub fn leave_budget(from: TileCoord, exit: TileCoord, base_speed: u32, rules: &Rules) -> u32 {
        let speed = base_speed.max(1);
        let diagonal = LEPTONS_PER_TILE.unsigned_abs() * 3 / 2;
        let per_tile = diagonal.div_ceil(speed) + 1;
        let half_turn = 128 / u32::from(TURN_RATE);
        from.chebyshev(exit).max(1) * per_tile + half_turn + rules.move_blocked_wait_ticks
    }

    fn inside(&self, me: &GameObject) -> bool {
        self.footprint.is_some_and(|rect| rect.contains(me.tile))
    }

    fn clear_ramp(&mut self, me: &GameObject, ctx: &mut TaskContext<'_>, exit: TileCoord) -> bool {
        if ctx.is_cancelling() || self.clear_ticks >= ctx.rules.factory_exit_clear_ticks {
            return false;
        }
        let blocker = ctx
            .find_obstacles(&Waypoint::ground(exit), me)
            .into_iter()
            .filter(|&id| id != self.factory)
            .find(|&id| {
                ctx.objects.get(id).is_some_and(|other| {
                    other.owner == me.owner
                        && !other.is_building()
                        && !other.orders.is_moving_aside()
                })
            });
        let Some(blocker) = blocker else {
            return false;
        };
        self.clear_ticks += 1;
        debug!(object = me.id, blocker, "clearing factory ramp");
        let aside = MoveAsideTask::new(Direction::South);
        let task = TaskNode::non_cancellable(TaskKind::MoveAside(aside));
        ctx.issue_order(me, blocker, task, OrderMode::Interrupt);
        true
    }

    fn rally_tile(&self, me: &GameObject, ctx: &TaskContext<'_>, rally: TileCoord) -> TileCoord {
        let map = ctx.map;
        let profile = me.profile;
        let area = map_area(map, |tile| {
            let waypoint = Waypoint::ground(tile.coord);
            is_passable(map, &waypoint, &profile) && ctx.find_obstacles(&waypoint, me).is_empty()
        });
        DirectionalFinder::new(area, rally, Direction::South, 0, RALLY_PROBE_DISTANCE)
            .next_tile()
            .map_or(rally, |tile| tile.coord)
    }
}

impl Task for FactoryExitTask {
    fn name(&self) -> &'static str {
        "factory_exit"
    }

    fn on_start(&mut self, me: &mut GameObject, ctx: &mut TaskContext<'_>) -> Result<()> {
        self.footprint = ctx.objects.get(self.factory).and_then(|factory| factory.foundation);
        match self.footprint {
            Some(footprint) => {
                let exit = Self::exit_tile(&footprint);
                self.leave_budget = Self::leave_budget(me.tile, exit, me.base_speed, ctx.rules);
            }
            None => self.phase = ExitPhase::Exiting,
        }
        Ok(())
    }

    fn on_tick(&mut self, me: &mut GameObject, ctx: &mut TaskContext<'_>) -> Result<bool> {
        let inside = self.inside(me);
        if ctx.is_cancelling() && !inside {
            return Ok(true);
        }

        match self.phase {
            ExitPhase::ClearRamp => {
                let Some(footprint) = self.footprint else {
                    self.phase = ExitPhase::Exiting;
                    return Ok(false);
                };
                let exit = Self::exit_tile(&footprint);
                if self.clear_ramp(me, ctx, exit) {
                    return Ok(false);
                }
                let leave = MoveTask::new(exit)
                    .with_tolerance(0)
                    .ignoring(vec![self.factory])
                    .with_deadline(ctx.tick + u64::from(self.leave_budget));
                ctx.push_child(TaskNode::non_cancellable(TaskKind::Move(leave)));
                self.phase = ExitPhase::Exiting;
                Ok(false)
            }
            ExitPhase::Exiting => {
                if inside {
                    if ctx.is_cancelling() || self.exit_attempts >= MAX_EXIT_ATTEMPTS {
                        debug!(object = me.id, factory = self.factory, "stuck in factory");
                        return Ok(true);
                    }
                    self.exit_attempts += 1;
                    self.clear_ticks = 0;
                    self.phase = ExitPhase::ClearRamp;
                    return Ok(false);
                }
                if ctx.is_cancelling() {
                    return Ok(true);
                }
                let Some(rally) = self.rally else {
                    return Ok(true);
                };
                let target = self.rally_tile(me, ctx, rally);
                let rally_move = MoveTask::new(target).with_tolerance(RALLY_TOLERANCE);
                ctx.push_child(TaskNode::new(TaskKind::Move(rally_move)));
                self.phase = ExitPhase::Rallying;
                Ok(false)
            }
            ExitPhase::Rallying => Ok(true),
        }
    }

    fn can_force_cancel(&self, me: &GameObject) -> bool {
        !self.inside(me)
    }

    fn max_cancel_ticks(&self, _rules: &Rules) -> u32 {
        self.leave_budget + 1
    }

    fn duplicate(&self) -> Self {
        Self::new(self.factory, self.rally)
    }
}
