use std::collections::{BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{MoveAsideTask, OrderMode, Task, TaskContext, TaskKind, TaskNode};
use crate::error::{Result, SimError};
use crate::events::GameEvent;
use crate::map::{Tile, TileCoord, TileMap, Waypoint};
use crate::math::{Fixed, Vec3Fixed};
use crate::movement::{can_step, find_path, is_passable, step_direction};
use crate::object::{GameObject, ObjectId, WarpStatus};
use crate::tile_search::{map_area, FloodFillFinder, RadialBackFirstFinder, TileFinder};

/// Rings searched for a standable tile when the destination is not.
const GOAL_SEARCH_RINGS: u32 = 4;

/// Radius of the reachable-area search used when no full path exists.
const FALLBACK_SEARCH_RADIUS: u32 = 32;

/// Path to a tile, one waypoint at a time.
///
/// Each waypoint is claimed while the locomotor carries the object onto
/// it. A waypoint held by another ground object blocks the move: idle
/// same-owner blockers are asked to step aside, and after
/// `move_blocked_wait_ticks` the move repaths around the blocked tile, up
/// to `move_max_repaths` times. The move is satisfied once the object is
/// within `tolerance` tiles of the goal and blocked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MoveTask {
    destination: Option<TileCoord>,
    tolerance: u32,
    ignored_blockers: Vec<ObjectId>,
    deadline_tick: Option<u64>,
    goal: Option<TileCoord>,
    path: VecDeque<Waypoint>,
    stepping: Option<Waypoint>,
    blocked_ticks: u32,
    repaths: u32,
    asked_to_move: Vec<ObjectId>,
    blocked_tiles: Vec<TileCoord>,
}

enum StepStart {
    Started,
    Waiting,
    GiveUp,
}

impl MoveTask {
    /// Move to `destination` with zero tolerance.
    #[must_use]
    pub fn new(destination: TileCoord) -> Self {
        Self {
            destination: Some(destination),
            ..Self::default()
        }
    }

    /// Accept stopping within `tolerance` tiles of the goal when blocked.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: u32) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Never treat these objects as obstacles.
    #[must_use]
    pub fn ignoring(mut self, blockers: Vec<ObjectId>) -> Self {
        self.ignored_blockers = blockers;
        self
    }

    /// Finish unconditionally at this tick.
    #[must_use]
    pub fn with_deadline(mut self, tick: u64) -> Self {
        self.deadline_tick = Some(tick);
        self
    }

    /// Requested destination.
    #[must_use]
    pub const fn destination(&self) -> Option<TileCoord> {
        self.destination
    }

    /// Tile actually headed for, once planned.
    #[must_use]
    pub const fn goal(&self) -> Option<TileCoord> {
        self.goal
    }

    /// Stopping tolerance in tiles.
    #[must_use]
    pub const fn tolerance(&self) -> u32 {
        self.tolerance
    }

    /// Waypoints still ahead, including the one being stepped onto.
    #[must_use]
    pub fn remaining_path(&self) -> &VecDeque<Waypoint> {
        &self.path
    }

    /// Repaths performed so far.
    #[must_use]
    pub const fn repaths(&self) -> u32 {
        self.repaths
    }

    fn blocked_set(&self, ctx: &TaskContext<'_>) -> BTreeSet<TileCoord> {
        ctx.objects
            .building_tiles(&self.ignored_blockers)
            .into_iter()
            .chain(self.blocked_tiles.iter().copied())
            .collect()
    }

    fn resolve_goal(
        &self,
        me: &GameObject,
        ctx: &TaskContext<'_>,
        destination: TileCoord,
    ) -> TileCoord {
        let profile = me.profile;
        let buildings: BTreeSet<TileCoord> = ctx
            .objects
            .building_tiles(&self.ignored_blockers)
            .into_iter()
            .collect();
        let map = ctx.map;
        let standable = |coord: TileCoord| {
            is_passable(map, &Waypoint::ground(coord), &profile)
                && (profile.class.ignores_terrain() || !buildings.contains(&coord))
        };
        if standable(destination) {
            return destination;
        }
        let area = map_area(map, |tile| standable(tile.coord));
        RadialBackFirstFinder::new(area, destination, (1, 1), 1, GOAL_SEARCH_RINGS)
            .next_tile()
            .map_or(destination, |tile| tile.coord)
    }

    fn plan(&mut self, me: &GameObject, ctx: &TaskContext<'_>, destination: TileCoord) {
        let goal = self.resolve_goal(me, ctx, destination);
        self.goal = Some(goal);
        self.path.clear();
        self.stepping = None;

        let current = me.waypoint();
        if ctx.map.waypoint_position(&current).planar() != me.position.planar() {
            self.path.push_back(current);
        }

        if me.profile.class.ignores_terrain() {
            if goal != me.tile {
                self.path.push_back(Waypoint::ground(goal));
            }
            return;
        }

        let blocked = self.blocked_set(ctx);
        let is_blocked = |coord: TileCoord| blocked.contains(&coord);
        let route = find_path(ctx.map, &me.profile, current, goal, is_blocked).or_else(|| {
            let nearest = self.nearest_reachable(me, ctx, goal, &blocked)?;
            find_path(ctx.map, &me.profile, current, nearest, is_blocked)
        });
        match route {
            Some(route) => self.path.extend(route),
            None => debug!(object = me.id, ?goal, "no route found"),
        }
    }

    fn nearest_reachable(
        &self,
        me: &GameObject,
        ctx: &TaskContext<'_>,
        goal: TileCoord,
        blocked: &BTreeSet<TileCoord>,
    ) -> Option<TileCoord> {
        let map = ctx.map;
        let profile = me.profile;
        let area = map_area(map, |tile| !blocked.contains(&tile.coord));
        let adjacent = |from: &Tile, to: &Tile| {
            step_direction(from.coord, to.coord)
                .and_then(|direction| {
                    can_step(map, &Waypoint::ground(from.coord), direction, &profile)
                })
                .is_some()
        };
        FloodFillFinder::new(area, me.tile, adjacent, Some(FALLBACK_SEARCH_RADIUS))
            .map(|tile| tile.coord)
            .min_by_key(|coord| (coord.chebyshev(goal), *coord))
            .filter(|coord| *coord != me.tile)
    }

    fn within_tolerance(&self, me: &GameObject) -> bool {
        self.goal
            .is_some_and(|goal| me.tile.chebyshev(goal) <= self.tolerance)
    }

    fn begin_step(
        &mut self,
        me: &mut GameObject,
        ctx: &mut TaskContext<'_>,
        next: Waypoint,
    ) -> StepStart {
        let ground = !me.profile.class.ignores_terrain();
        if ground && next.tile != me.tile {
            let obstacles: Vec<ObjectId> = ctx
                .find_obstacles(&next, me)
                .into_iter()
                .filter(|id| !self.ignored_blockers.contains(id))
                .collect();
            if !obstacles.is_empty() {
                return self.handle_blocked(me, ctx, next, &obstacles);
            }
        }

        self.blocked_ticks = 0;
        if ground && next.tile != me.tile {
            me.claimed = Some(next.tile);
        }
        self.stepping = Some(next);
        me.with_locomotor(|locomotor, obj| locomotor.on_new_waypoint(obj, &next));
        StepStart::Started
    }

    fn handle_blocked(
        &mut self,
        me: &mut GameObject,
        ctx: &mut TaskContext<'_>,
        next: Waypoint,
        obstacles: &[ObjectId],
    ) -> StepStart {
        me.velocity = Vec3Fixed::ZERO;
        if self.within_tolerance(me) {
            return StepStart::GiveUp;
        }
        self.blocked_ticks += 1;

        if let Some(incoming) = step_direction(me.tile, next.tile) {
            for &id in obstacles {
                let Some(blocker) = ctx.objects.get(id) else {
                    continue;
                };
                if blocker.owner != me.owner
                    || blocker.is_building()
                    || blocker.orders.is_travelling()
                    || blocker.orders.is_moving_aside()
                    || self.asked_to_move.contains(&id)
                {
                    continue;
                }
                debug!(object = me.id, blocker = id, ?incoming, "asking blocker to move aside");
                self.asked_to_move.push(id);
                let task = TaskNode::new(TaskKind::MoveAside(MoveAsideTask::new(incoming)));
                ctx.issue_order(me, id, task, OrderMode::Interrupt);
            }
        }

        if self.blocked_ticks < ctx.rules.move_blocked_wait_ticks {
            return StepStart::Waiting;
        }
        if self.repaths >= ctx.rules.move_max_repaths {
            debug!(object = me.id, repaths = self.repaths, "move gave up while blocked");
            return StepStart::GiveUp;
        }

        self.repaths += 1;
        self.blocked_ticks = 0;
        self.asked_to_move.clear();
        if !self.blocked_tiles.contains(&next.tile) {
            self.blocked_tiles.push(next.tile);
        }
        if let Some(destination) = self.destination {
            self.plan(me, ctx, destination);
        }
        if self.path.is_empty() {
            return StepStart::GiveUp;
        }
        StepStart::Waiting
    }

    fn advance(
        &mut self,
        me: &mut GameObject,
        ctx: &mut TaskContext<'_>,
        waypoint: Waypoint,
    ) -> bool {
        let speed = Fixed::from_num(me.base_speed);
        let loco_ctx = ctx.locomotor_context();
        let step =
            me.with_locomotor(|locomotor, obj| locomotor.tick(obj, &waypoint, speed, &loco_ctx));

        if let Some(warp) = step.teleport {
            me.velocity = Vec3Fixed::ZERO;
            me.warp = Some(WarpStatus {
                destination: warp.destination,
                expires_at: ctx.tick + u64::from(warp.delay_ticks),
            });
            debug!(
                object = me.id,
                destination = ?warp.destination.tile,
                delay = warp.delay_ticks,
                "warp armed"
            );
            ctx.emit(GameEvent::TeleportStarted {
                object: me.id,
                destination: warp.destination.tile,
                delay_ticks: warp.delay_ticks,
            });
            self.stepping = None;
            self.path.clear();
            return true;
        }

        me.position += step.displacement;
        me.velocity = step.displacement;
        if let Some(facing) = step.facing {
            me.facing = facing;
        }
        let tile = TileMap::coord_of(me.position);
        if tile != me.tile {
            me.tile = tile;
            me.on_bridge = tile == waypoint.tile && waypoint.on_bridge;
        }

        if step.done {
            me.tile = waypoint.tile;
            me.on_bridge = waypoint.on_bridge;
            me.claimed = None;
            self.stepping = None;
            self.path.pop_front();
            return self.path.is_empty();
        }
        false
    }
}

impl Task for MoveTask {
    fn name(&self) -> &'static str {
        "move"
    }

    fn on_start(&mut self, me: &mut GameObject, ctx: &mut TaskContext<'_>) -> Result<()> {
        let destination = self
            .destination
            .ok_or(SimError::MissingParameter("move destination"))?;
        self.plan(me, ctx, destination);
        Ok(())
    }

    fn on_tick(&mut self, me: &mut GameObject, ctx: &mut TaskContext<'_>) -> Result<bool> {
        if ctx.is_cancelling() || me.is_building() {
            return Ok(true);
        }
        if self.deadline_tick.is_some_and(|deadline| ctx.tick >= deadline) {
            return Ok(true);
        }

        let waypoint = match self.stepping {
            Some(waypoint) => waypoint,
            None => {
                let Some(next) = self.path.front().copied() else {
                    return Ok(true);
                };
                match self.begin_step(me, ctx, next) {
                    StepStart::Started => next,
                    StepStart::Waiting => return Ok(false),
                    StepStart::GiveUp => return Ok(true),
                }
            }
        };
        Ok(self.advance(me, ctx, waypoint))
    }

    fn on_end(&mut self, me: &mut GameObject, _ctx: &mut TaskContext<'_>) {
        me.claimed = None;
        me.velocity = Vec3Fixed::ZERO;
        self.stepping = None;
    }

    fn duplicate(&self) -> Self {
        Self {
            destination: self.destination,
            tolerance: self.tolerance,
            ignored_blockers: self.ignored_blockers.clone(),
            deadline_tick: self.deadline_tick,
            ..Self::default()
        }
    }
}
