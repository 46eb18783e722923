use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Effect, MoveTask, Task, TaskContext, TaskKind, TaskNode};
use crate::error::Result;
use crate::events::GameEvent;
use crate::map::{TileCoord, TileRect, Waypoint};
use crate::movement::is_passable;
use crate::object::{GameObject, ObjectId};
use crate::tile_search::{map_area, RadialBackFirstFinder};

/// Approach moves tried before giving up.
const MAX_APPROACHES: u32 = 2;

/// What happens on reaching the building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnterMode {
    /// Engineer takes over a capturable building owned by someone else.
    Capture,
    /// Unit is consumed by a friendly recycler.
    Recycle,
}

/// Walk up to a building and enter it.
///
/// The unit moves to the closest free tile bordering the footprint and,
/// once adjacent, is removed from play together with the effect of its
/// mode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnterTask {
    target: ObjectId,
    mode: EnterMode,
    approaches: u32,
}

impl EnterTask {
    /// Enter `target` in `mode`.
    #[must_use]
    pub const fn new(target: ObjectId, mode: EnterMode) -> Self {
        Self {
            target,
            mode,
            approaches: 0,
        }
    }

    /// Building to enter.
    #[must_use]
    pub const fn target(&self) -> ObjectId {
        self.target
    }

    /// Entry mode.
    #[must_use]
    pub const fn mode(&self) -> EnterMode {
        self.mode
    }

    fn eligible(&self, me: &GameObject, target: &GameObject, ctx: &TaskContext<'_>) -> bool {
        match self.mode {
            EnterMode::Capture => {
                target.capturable
                    && target.owner != me.owner
                    && ctx.rules.unit(&me.type_id).is_ok_and(|unit| unit.engineer)
            }
            EnterMode::Recycle => target.recycler && target.owner == me.owner,
        }
    }

    fn approach_tile(
        me: &GameObject,
        ctx: &TaskContext<'_>,
        footprint: &TileRect,
    ) -> Option<TileCoord> {
        let map = ctx.map;
        let profile = me.profile;
        let buildings: BTreeSet<TileCoord> = ctx.objects.building_tiles(&[]).into_iter().collect();
        let area = map_area(map, |tile| {
            let waypoint = Waypoint::ground(tile.coord);
            is_passable(map, &waypoint, &profile)
                && !buildings.contains(&tile.coord)
                && ctx.find_obstacles(&waypoint, me).is_empty()
        });
        let width = (footprint.max.rx - footprint.min.rx + 1) as u32;
        let height = (footprint.max.ry - footprint.min.ry + 1) as u32;
        RadialBackFirstFinder::new(area, footprint.min, (width, height), 1, 1)
            .map(|tile| tile.coord)
            .min_by_key(|coord| {
                let manhattan = (coord.rx - me.tile.rx).unsigned_abs()
                    + (coord.ry - me.tile.ry).unsigned_abs();
                (coord.chebyshev(me.tile), manhattan, *coord)
            })
    }
}

impl Task for EnterTask {
    fn name(&self) -> &'static str {
        match self.mode {
            EnterMode::Capture => "capture",
            EnterMode::Recycle => "recycle",
        }
    }

    fn on_tick(&mut self, me: &mut GameObject, ctx: &mut TaskContext<'_>) -> Result<bool> {
        if ctx.is_cancelling() {
            return Ok(true);
        }
        let Some(target) = ctx.objects.get(self.target) else {
            return Ok(true);
        };
        let Some(footprint) = target.foundation else {
            return Ok(true);
        };
        if !target.is_alive() || !self.eligible(me, target, ctx) {
            debug!(object = me.id, target = self.target, mode = ?self.mode, "cannot enter");
            return Ok(true);
        }

        if footprint.distance_to(me.tile) <= 1 {
            match self.mode {
                EnterMode::Capture => {
                    ctx.apply(Effect::TransferOwnership {
                        target: self.target,
                        owner: me.owner,
                    });
                    ctx.emit(GameEvent::Captured {
                        building: self.target,
                        capturer: me.id,
                        new_owner: me.owner,
                    });
                }
                EnterMode::Recycle => {
                    ctx.emit(GameEvent::Recycled {
                        object: me.id,
                        recycler: self.target,
                    });
                }
            }
            ctx.apply(Effect::Remove { target: me.id });
            return Ok(true);
        }

        if self.approaches >= MAX_APPROACHES {
            return Ok(true);
        }
        self.approaches += 1;
        let Some(tile) = Self::approach_tile(me, ctx, &footprint) else {
            debug!(object = me.id, target = self.target, "no free tile next to building");
            return Ok(true);
        };
        ctx.push_child(TaskNode::new(TaskKind::Move(MoveTask::new(tile))));
        Ok(false)
    }

    fn duplicate(&self) -> Self {
        Self::new(self.target, self.mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::TileMap;
    use crate::math::Vec3Fixed;
    use crate::object::{Health, ObjectStorage, NEUTRAL_PLAYER};
    use crate::rng::SimRng;
    use crate::rules::Rules;
    use crate::task::TickOutputs;

    fn building(id: ObjectId, owner: u8, x: i32, y: i32) -> GameObject {
        let mut obj =
            GameObject::new(id, owner, "tech_outpost", TileCoord::new(x, y), Vec3Fixed::ZERO);
        obj.foundation = Some(TileRect::from_size(TileCoord::new(x, y), 2, 2));
        obj.health = Some(Health::new(500));
        obj
    }

    fn engineer(x: i32, y: i32) -> GameObject {
        let mut obj = GameObject::new(1, 1, "engineer", TileCoord::new(x, y), Vec3Fixed::ZERO);
        obj.profile.is_infantry = true;
        obj.base_speed = 8;
        obj
    }

    #[test]
    fn test_adjacent_engineer_captures() {
        let map = TileMap::new(8, 8);
        let rules = Rules::default();
        let mut objects = ObjectStorage::new();
        let mut outpost = building(5, NEUTRAL_PLAYER, 3, 3);
        outpost.capturable = true;
        objects.insert(outpost);
        let mut rng = SimRng::new(0);
        let mut outputs = TickOutputs::default();
        let mut me = engineer(2, 3);
        {
            let mut ctx = TaskContext::new(0, &map, &rules, &objects, &mut rng, &mut outputs);
            assert!(EnterTask::new(5, EnterMode::Capture).on_tick(&mut me, &mut ctx).unwrap());
        }
        assert_eq!(
            outputs.effects,
            vec![
                Effect::TransferOwnership { target: 5, owner: 1 },
                Effect::Remove { target: 1 }
            ]
        );
    }

    #[test]
    fn test_far_engineer_approaches_closest_side() {
        let map = TileMap::new(10, 10);
        let rules = Rules::default();
        let mut objects = ObjectStorage::new();
        let mut outpost = building(5, 2, 5, 5);
        outpost.capturable = true;
        objects.insert(outpost);
        let mut rng = SimRng::new(0);
        let mut outputs = TickOutputs::default();
        let mut me = engineer(0, 5);
        let mut task = EnterTask::new(5, EnterMode::Capture);
        let mut ctx = TaskContext::new(0, &map, &rules, &objects, &mut rng, &mut outputs);
        assert!(!task.on_tick(&mut me, &mut ctx).unwrap());
        assert_eq!(
            EnterTask::approach_tile(&me, &ctx, &TileRect::from_size(TileCoord::new(5, 5), 2, 2)),
            Some(TileCoord::new(4, 5))
        );
    }

    #[test]
    fn test_non_engineer_cannot_capture() {
        let map = TileMap::new(8, 8);
        let rules = Rules::default();
        let mut objects = ObjectStorage::new();
        let mut outpost = building(5, 2, 3, 3);
        outpost.capturable = true;
        objects.insert(outpost);
        let mut rng = SimRng::new(0);
        let mut outputs = TickOutputs::default();
        let mut me = engineer(2, 3);
        me.type_id = "infantry".into();
        {
            let mut ctx = TaskContext::new(0, &map, &rules, &objects, &mut rng, &mut outputs);
            assert!(EnterTask::new(5, EnterMode::Capture).on_tick(&mut me, &mut ctx).unwrap());
        }
        assert!(outputs.effects.is_empty());
    }

    #[test]
    fn test_recycle_requires_own_recycler() {
        let map = TileMap::new(8, 8);
        let rules = Rules::default();
        let mut objects = ObjectStorage::new();
        let mut plant = building(5, 1, 3, 3);
        plant.recycler = true;
        objects.insert(plant);
        let mut rng = SimRng::new(0);
        let mut outputs = TickOutputs::default();
        let mut me = engineer(5, 3);
        {
            let mut ctx = TaskContext::new(0, &map, &rules, &objects, &mut rng, &mut outputs);
            assert!(EnterTask::new(5, EnterMode::Recycle).on_tick(&mut me, &mut ctx).unwrap());
        }
        assert_eq!(outputs.effects, vec![Effect::Remove { target: 1 }]);
        assert_eq!(
            outputs.events,
            vec![GameEvent::Recycled { object: 1, recycler: 5 }]
        );
    }
}
