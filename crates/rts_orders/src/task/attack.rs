use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{Effect, Task, TaskContext};
use crate::combat::distance_between;
use crate::error::{Result, SimError};
use crate::events::GameEvent;
use crate::map::Direction;
use crate::object::{GameObject, ObjectId};

/// Fire at one target while it stays valid and in range.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttackTask {
    target: ObjectId,
    shots: u32,
}

impl AttackTask {
    /// Attack `target`.
    #[must_use]
    pub const fn new(target: ObjectId) -> Self {
        Self { target, shots: 0 }
    }

    /// Target object.
    #[must_use]
    pub const fn target(&self) -> ObjectId {
        self.target
    }

    /// Shots fired so far.
    #[must_use]
    pub const fn shots(&self) -> u32 {
        self.shots
    }
}

impl Task for AttackTask {
    fn name(&self) -> &'static str {
        "attack"
    }

    fn on_tick(&mut self, me: &mut GameObject, ctx: &mut TaskContext<'_>) -> Result<bool> {
        if ctx.is_cancelling() {
            return Ok(true);
        }
        let Some(weapon) = me.armament else {
            warn!(error = %SimError::MissingArmament(me.id), "attack skipped");
            return Ok(true);
        };
        let Some(target) = ctx.objects.get(self.target) else {
            return Ok(true);
        };
        if !target.is_alive()
            || target.warp.is_some()
            || distance_between(me, target) > weapon.range
        {
            return Ok(true);
        }

        if let Some(direction) = Direction::towards(target.position - me.position) {
            me.facing = direction.facing();
        }
        if weapon.cooldown_remaining > 0 {
            return Ok(false);
        }

        ctx.apply(Effect::Damage {
            target: self.target,
            amount: weapon.damage,
        });
        ctx.emit(GameEvent::WeaponFired {
            attacker: me.id,
            target: self.target,
            damage: weapon.damage,
        });
        if let Some(armament) = me.armament.as_mut() {
            armament.cooldown_remaining = armament.cooldown;
        }
        self.shots += 1;
        Ok(false)
    }

    fn duplicate(&self) -> Self {
        Self::new(self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{TileCoord, TileMap};
    use crate::math::Vec3Fixed;
    use crate::object::{Armament, Health, ObjectStorage};
    use crate::rng::SimRng;
    use crate::rules::Rules;
    use crate::task::TickOutputs;

    fn armed(id: ObjectId, owner: u8, x: i32) -> GameObject {
        let position = Vec3Fixed::from_ints(x * 256 + 128, 128, 0);
        let mut obj = GameObject::new(id, owner, "tank", TileCoord::new(x, 0), position);
        obj.health = Some(Health::new(100));
        obj.armament = Some(Armament {
            damage: 25,
            range: 2,
            cooldown: 3,
            cooldown_remaining: 0,
        });
        obj
    }

    #[test]
    fn test_fires_then_waits_for_cooldown() {
        let map = TileMap::new(8, 1);
        let rules = Rules::default();
        let mut objects = ObjectStorage::new();
        objects.insert(armed(2, 2, 2));
        let mut rng = SimRng::new(0);
        let mut outputs = TickOutputs::default();
        let mut me = armed(1, 1, 0);
        let mut task = AttackTask::new(2);
        {
            let mut ctx = TaskContext::new(0, &map, &rules, &objects, &mut rng, &mut outputs);
            assert!(!task.on_tick(&mut me, &mut ctx).unwrap());
            assert!(!task.on_tick(&mut me, &mut ctx).unwrap());
        }
        assert_eq!(task.shots(), 1);
        assert_eq!(me.armament.unwrap().cooldown_remaining, 3);
        assert_eq!(me.facing, Direction::East.facing());
        assert_eq!(
            outputs.effects,
            vec![Effect::Damage {
                target: 2,
                amount: 25
            }]
        );
    }

    #[test]
    fn test_out_of_range_ends() {
        let map = TileMap::new(8, 1);
        let rules = Rules::default();
        let mut objects = ObjectStorage::new();
        objects.insert(armed(2, 2, 5));
        let mut rng = SimRng::new(0);
        let mut outputs = TickOutputs::default();
        let mut ctx = TaskContext::new(0, &map, &rules, &objects, &mut rng, &mut outputs);
        let mut me = armed(1, 1, 0);
        assert!(AttackTask::new(2).on_tick(&mut me, &mut ctx).unwrap());
    }

    #[test]
    fn test_missing_armament_is_skipped() {
        let map = TileMap::new(8, 1);
        let rules = Rules::default();
        let mut objects = ObjectStorage::new();
        objects.insert(armed(2, 2, 1));
        let mut rng = SimRng::new(0);
        let mut outputs = TickOutputs::default();
        let mut me = armed(1, 1, 0);
        me.armament = None;
        {
            let mut ctx = TaskContext::new(0, &map, &rules, &objects, &mut rng, &mut outputs);
            assert!(AttackTask::new(2).on_tick(&mut me, &mut ctx).unwrap());
        }
        assert!(outputs.effects.is_empty());
    }
}
