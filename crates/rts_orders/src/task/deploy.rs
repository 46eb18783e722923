use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Task, TaskContext};
use crate::error::Result;
use crate::events::GameEvent;
use crate::map::{SpeedType, TileCoord, TileRect, Waypoint};
use crate::math::Vec3Fixed;
use crate::object::{GameObject, Health};

/// Morph a unit into the building its rules deploy into.
///
/// Waits out the unit's deploy delay, then checks that the footprint
/// centred on the unit is on open, unoccupied ground. The object keeps
/// its id and becomes the building in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeployTask {
    elapsed: u32,
}

impl DeployTask {
    /// Start deploying.
    #[must_use]
    pub const fn new() -> Self {
        Self { elapsed: 0 }
    }

    fn site_is_clear(me: &GameObject, ctx: &TaskContext<'_>, site: &TileRect) -> bool {
        (site.min.ry..=site.max.ry).all(|ry| {
            (site.min.rx..=site.max.rx).all(|rx| {
                let coord = TileCoord::new(rx, ry);
                let open = ctx.map.is_within_bounds(coord)
                    && ctx.map.tile(coord).is_some_and(|tile| {
                        tile.bridge.is_none()
                            && tile.terrain.speed_percent(SpeedType::Track, false) > 0
                    });
                open && ctx.find_obstacles(&Waypoint::ground(coord), me).is_empty()
            })
        })
    }
}

impl Task for DeployTask {
    fn name(&self) -> &'static str {
        "deploy"
    }

    fn on_tick(&mut self, me: &mut GameObject, ctx: &mut TaskContext<'_>) -> Result<bool> {
        if ctx.is_cancelling() {
            return Ok(true);
        }
        let rules = ctx.rules;
        let unit = match rules.unit(&me.type_id) {
            Ok(unit) => unit,
            Err(err) => {
                warn!(object = me.id, error = %err, "deploy skipped");
                return Ok(true);
            }
        };
        let Some(into) = unit.deploys_into.clone() else {
            warn!(object = me.id, type_id = %me.type_id, "unit type cannot deploy");
            return Ok(true);
        };
        let building = match rules.building(&into) {
            Ok(building) => building,
            Err(err) => {
                warn!(object = me.id, error = %err, "deploy skipped");
                return Ok(true);
            }
        };

        self.elapsed += 1;
        if self.elapsed < unit.deploy_delay {
            return Ok(false);
        }

        let origin = me
            .tile
            .offset(-((building.width / 2) as i32), -((building.height / 2) as i32));
        let site = TileRect::from_size(origin, building.width, building.height);
        if !Self::site_is_clear(me, ctx, &site) {
            debug!(object = me.id, ?origin, "deploy site blocked");
            return Ok(true);
        }

        let from_type = std::mem::replace(&mut me.type_id, into.clone());
        me.tile = origin;
        me.on_bridge = false;
        me.position = ctx.map.waypoint_position(&Waypoint::ground(origin));
        me.velocity = Vec3Fixed::ZERO;
        me.claimed = None;
        me.foundation = Some(site);
        me.health = Some(Health::new(building.health));
        me.capturable = building.capturable;
        me.recycler = building.recycler;
        me.factory = building.factory;
        me.armament = None;
        me.locomotor = None;
        me.base_speed = 0;

        debug!(object = me.id, %from_type, into = %into, "deployed");
        ctx.emit(GameEvent::Morphed {
            object: me.id,
            from_type,
            into_type: into,
        });
        Ok(true)
    }

    fn duplicate(&self) -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{TerrainClass, TileMap};
    use crate::object::ObjectStorage;
    use crate::rng::SimRng;
    use crate::rules::Rules;
    use crate::task::TickOutputs;

    fn mcv(x: i32, y: i32) -> GameObject {
        let mut obj = GameObject::new(1, 1, "mcv", TileCoord::new(x, y), Vec3Fixed::ZERO);
        obj.base_speed = 8;
        obj
    }

    fn run(map: &TileMap, me: &mut GameObject) -> (u32, TickOutputs) {
        let rules = Rules::default();
        let objects = ObjectStorage::new();
        let mut rng = SimRng::new(0);
        let mut outputs = TickOutputs::default();
        let mut ticks = 0;
        {
            let mut ctx = TaskContext::new(0, map, &rules, &objects, &mut rng, &mut outputs);
            let mut task = DeployTask::new();
            while ticks < 100 {
                ticks += 1;
                if task.on_tick(me, &mut ctx).unwrap() {
                    break;
                }
            }
        }
        (ticks, outputs)
    }

    #[test]
    fn test_deploys_after_delay() {
        let map = TileMap::new(8, 8);
        let mut me = mcv(4, 4);
        let (ticks, outputs) = run(&map, &mut me);
        assert_eq!(ticks, Rules::default().unit("mcv").unwrap().deploy_delay);
        assert_eq!(me.type_id, "construction_yard");
        assert_eq!(me.foundation, Some(TileRect::from_size(TileCoord::new(3, 3), 3, 3)));
        assert!(me.is_building());
        assert_eq!(
            outputs.events,
            vec![GameEvent::Morphed {
                object: 1,
                from_type: "mcv".into(),
                into_type: "construction_yard".into(),
            }]
        );
    }

    #[test]
    fn test_blocked_site_keeps_unit() {
        let mut map = TileMap::new(8, 8);
        map.set_terrain(TileCoord::new(5, 5), TerrainClass::Water);
        let mut me = mcv(4, 4);
        let (_, outputs) = run(&map, &mut me);
        assert_eq!(me.type_id, "mcv");
        assert!(outputs.events.is_empty());
    }

    #[test]
    fn test_non_deployable_finishes_at_once() {
        let map = TileMap::new(8, 8);
        let mut me = mcv(4, 4);
        me.type_id = "tank".into();
        let (ticks, _) = run(&map, &mut me);
        assert_eq!(ticks, 1);
    }
}
