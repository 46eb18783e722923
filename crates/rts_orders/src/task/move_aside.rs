use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{MoveTask, OrderMode, Task, TaskContext, TaskKind, TaskNode};
use crate::error::Result;
use crate::map::{Direction, Waypoint};
use crate::movement::can_step;
use crate::object::GameObject;
use crate::rules::Rules;

/// Step out of the way of a unit pushing in from `incoming`.
///
/// Scans the eight neighbours clockwise starting at the incoming
/// direction, skipping the way back towards the pusher on the first
/// attempt, and moves to the first free, legal one. When the first scan
/// finds nothing, same-owner units one tile further along `incoming` are
/// asked to move aside too (once per task). Rescans happen every
/// `move_aside_backoff_ticks` until `move_aside_timeout_ticks` have passed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MoveAsideTask {
    incoming: Direction,
    started_tick: Option<u64>,
    attempts: u32,
    retry_at: u64,
    chain_pushed: bool,
    relocating: bool,
}

impl MoveAsideTask {
    /// Make way for a unit moving in `incoming` direction.
    #[must_use]
    pub const fn new(incoming: Direction) -> Self {
        Self {
            incoming,
            started_tick: None,
            attempts: 0,
            retry_at: 0,
            chain_pushed: false,
            relocating: false,
        }
    }

    /// Direction the pusher is moving in.
    #[must_use]
    pub const fn incoming(&self) -> Direction {
        self.incoming
    }

    /// Whether the chain push has fired.
    #[must_use]
    pub const fn has_chain_pushed(&self) -> bool {
        self.chain_pushed
    }

    /// Scan attempts made so far.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    fn free_neighbour(
        &self,
        me: &GameObject,
        ctx: &TaskContext<'_>,
        first_attempt: bool,
    ) -> Option<Waypoint> {
        let from = me.waypoint();
        (0..8)
            .map(|offset| self.incoming.rotate(offset))
            .filter(|direction| !(first_attempt && *direction == self.incoming.reverse()))
            .filter_map(|direction| can_step(ctx.map, &from, direction, &me.profile))
            .find(|waypoint| ctx.find_obstacles(waypoint, me).is_empty())
    }

    fn chain_push(&mut self, me: &GameObject, ctx: &mut TaskContext<'_>) {
        self.chain_pushed = true;
        let beyond = Waypoint::ground(me.tile.step(self.incoming));
        let targets: Vec<_> = ctx
            .find_obstacles(&beyond, me)
            .into_iter()
            .filter(|&id| {
                ctx.objects.get(id).is_some_and(|other| {
                    other.owner == me.owner
                        && !other.is_building()
                        && !other.orders.is_moving_aside()
                })
            })
            .collect();
        for id in targets {
            debug!(object = me.id, target = id, "chain push");
            let task = TaskNode::new(TaskKind::MoveAside(Self::new(self.incoming)));
            ctx.issue_order(me, id, task, OrderMode::Interrupt);
        }
    }
}

impl Task for MoveAsideTask {
    fn name(&self) -> &'static str {
        "move_aside"
    }

    fn on_start(&mut self, _me: &mut GameObject, ctx: &mut TaskContext<'_>) -> Result<()> {
        self.started_tick = Some(ctx.tick);
        Ok(())
    }

    fn on_tick(&mut self, me: &mut GameObject, ctx: &mut TaskContext<'_>) -> Result<bool> {
        if ctx.is_cancelling() || self.relocating {
            return Ok(true);
        }

        let started = self.started_tick.unwrap_or(ctx.tick);
        let timeout = u64::from(ctx.rules.move_aside_timeout_ticks);
        if ctx.tick + 1 - started >= timeout {
            debug!(object = me.id, attempts = self.attempts, "move aside timed out");
            return Ok(true);
        }
        if ctx.tick < self.retry_at {
            return Ok(false);
        }

        let first_attempt = self.attempts == 0;
        self.attempts += 1;

        if let Some(waypoint) = self.free_neighbour(me, ctx, first_attempt) {
            debug!(object = me.id, tile = ?waypoint.tile, "moving aside");
            let relocate = MoveTask::new(waypoint.tile)
                .with_tolerance(0)
                .with_deadline(started + timeout - 1);
            ctx.push_child(TaskNode::new(TaskKind::Move(relocate)));
            self.relocating = true;
            return Ok(false);
        }

        if first_attempt && !self.chain_pushed {
            self.chain_push(me, ctx);
        }
        self.retry_at = ctx.tick + u64::from(ctx.rules.move_aside_backoff_ticks);
        Ok(false)
    }

    fn max_cancel_ticks(&self, rules: &Rules) -> u32 {
        rules.move_aside_timeout_ticks
    }

    fn duplicate(&self) -> Self {
        Self::new(self.incoming)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{TerrainClass, TileCoord, TileMap, LEPTONS_PER_TILE};
    use crate::math::Vec3Fixed;
    use crate::object::ObjectStorage;
    use crate::rng::SimRng;
    use crate::task::TickOutputs;

    fn unit(id: u64, x: i32, y: i32) -> GameObject {
        let centre = Vec3Fixed::from_ints(
            x * LEPTONS_PER_TILE + LEPTONS_PER_TILE / 2,
            y * LEPTONS_PER_TILE + LEPTONS_PER_TILE / 2,
            0,
        );
        let mut obj = GameObject::new(id, 1, "infantry", TileCoord::new(x, y), centre);
        obj.profile.is_infantry = true;
        obj.base_speed = 10;
        obj
    }

    #[test]
    fn test_scan_starts_at_incoming_and_skips_reverse() {
        let map = TileMap::new(3, 3);
        let rules = Rules::default();
        let objects = ObjectStorage::new();
        let mut rng = SimRng::new(0);
        let mut outputs = TickOutputs::default();
        let ctx = TaskContext::new(0, &map, &rules, &objects, &mut rng, &mut outputs);
        let me = unit(1, 1, 1);

        let task = MoveAsideTask::new(Direction::East);
        assert_eq!(
            task.free_neighbour(&me, &ctx, true).map(|w| w.tile),
            Some(TileCoord::new(2, 1))
        );
    }

    #[test]
    fn test_reverse_only_allowed_after_first_attempt() {
        // Corridor: the only free tile is back towards the pusher.
        let mut map = TileMap::new(3, 1);
        map.set_terrain(TileCoord::new(2, 0), TerrainClass::Rock);
        let rules = Rules::default();
        let objects = ObjectStorage::new();
        let mut rng = SimRng::new(0);
        let mut outputs = TickOutputs::default();
        let ctx = TaskContext::new(0, &map, &rules, &objects, &mut rng, &mut outputs);
        let me = unit(1, 1, 0);

        let task = MoveAsideTask::new(Direction::East);
        assert_eq!(task.free_neighbour(&me, &ctx, true), None);
        assert_eq!(
            task.free_neighbour(&me, &ctx, false).map(|w| w.tile),
            Some(TileCoord::new(0, 0))
        );
    }

    #[test]
    fn test_chain_push_fires_once() {
        let mut map = TileMap::new(3, 1);
        map.set_terrain(TileCoord::new(0, 0), TerrainClass::Rock);
        let rules = Rules::default();
        let mut objects = ObjectStorage::new();
        objects.insert(unit(2, 2, 0));
        let mut rng = SimRng::new(0);
        let mut outputs = TickOutputs::default();
        let mut me = unit(1, 1, 0);
        let mut task = MoveAsideTask::new(Direction::East);
        {
            let mut ctx = TaskContext::new(0, &map, &rules, &objects, &mut rng, &mut outputs);
            task.on_start(&mut me, &mut ctx).unwrap();
            for tick in 0..12 {
                ctx.tick = tick;
                assert!(!task.on_tick(&mut me, &mut ctx).unwrap());
            }
        }
        assert!(task.has_chain_pushed());
        assert_eq!(task.attempts(), 3);
        assert_eq!(outputs.deferred.len(), 1);
        assert_eq!(outputs.deferred[0].target, 2);
    }

    #[test]
    fn test_times_out_after_limit() {
        let map = TileMap::new(1, 1);
        let rules = Rules::default();
        let objects = ObjectStorage::new();
        let mut rng = SimRng::new(0);
        let mut outputs = TickOutputs::default();
        let mut ctx = TaskContext::new(100, &map, &rules, &objects, &mut rng, &mut outputs);
        let mut me = unit(1, 0, 0);
        let mut task = MoveAsideTask::new(Direction::North);
        task.on_start(&mut me, &mut ctx).unwrap();

        let mut active = 0;
        for tick in 100..200 {
            ctx.tick = tick;
            active += 1;
            if task.on_tick(&mut me, &mut ctx).unwrap() {
                break;
            }
        }
        assert_eq!(active, rules.move_aside_timeout_ticks);
    }
}
