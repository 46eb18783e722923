use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{MoveTask, Task, TaskContext};
use crate::combat::{create_attack_task, scan_for_target};
use crate::error::Result;
use crate::map::TileCoord;
use crate::object::GameObject;

/// Move to a tile, stopping to fight anything that comes into range.
///
/// The movement runs as an inline [`MoveTask`] rather than a child so the
/// target scan can happen every tick. A target found mid-move ends that
/// move, an attack child runs, and a fresh move to the same destination
/// starts once the attack is over.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttackMoveTask {
    destination: TileCoord,
    inner: Option<MoveTask>,
    inner_started: bool,
    engagements: u32,
}

impl AttackMoveTask {
    /// Attack-move to `destination`.
    #[must_use]
    pub const fn new(destination: TileCoord) -> Self {
        Self {
            destination,
            inner: None,
            inner_started: false,
            engagements: 0,
        }
    }

    /// Destination tile.
    #[must_use]
    pub const fn destination(&self) -> TileCoord {
        self.destination
    }

    /// Targets engaged so far.
    #[must_use]
    pub const fn engagements(&self) -> u32 {
        self.engagements
    }

    fn stop_moving(&mut self, me: &mut GameObject, ctx: &mut TaskContext<'_>) {
        if let Some(mut inner) = self.inner.take() {
            if self.inner_started {
                inner.on_end(me, ctx);
            }
        }
        self.inner_started = false;
    }
}

impl Task for AttackMoveTask {
    fn name(&self) -> &'static str {
        "attack_move"
    }

    fn on_tick(&mut self, me: &mut GameObject, ctx: &mut TaskContext<'_>) -> Result<bool> {
        if ctx.is_cancelling() {
            self.stop_moving(me, ctx);
            return Ok(true);
        }

        if let Some(scan) = scan_for_target(me, ctx.objects) {
            debug!(object = me.id, target = scan.target, "attack-move engaging");
            self.stop_moving(me, ctx);
            self.engagements += 1;
            ctx.push_child(create_attack_task(&scan));
            return Ok(false);
        }

        let destination = self.destination;
        let inner = self.inner.get_or_insert_with(|| MoveTask::new(destination));
        if !self.inner_started {
            inner.on_start(me, ctx)?;
            self.inner_started = true;
        }
        if inner.on_tick(me, ctx)? {
            self.stop_moving(me, ctx);
            return Ok(true);
        }
        Ok(false)
    }

    fn on_end(&mut self, me: &mut GameObject, ctx: &mut TaskContext<'_>) {
        self.stop_moving(me, ctx);
    }

    fn duplicate(&self) -> Self {
        Self::new(self.destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locomotor::LocomotorClass;
    use crate::map::{SpeedType, TileMap};
    use crate::math::Vec3Fixed;
    use crate::object::{Armament, Health, MovementProfile, ObjectStorage};
    use crate::rng::SimRng;
    use crate::rules::Rules;
    use crate::task::{TaskKind, TaskNode, TickOutputs};

    fn tank(id: u64, owner: u8, x: i32) -> GameObject {
        let position = Vec3Fixed::from_ints(x * 256 + 128, 128, 0);
        let mut obj = GameObject::new(id, owner, "tank", TileCoord::new(x, 0), position);
        obj.profile = MovementProfile {
            class: LocomotorClass::Drive,
            speed_type: SpeedType::Track,
            is_infantry: false,
        };
        obj.base_speed = 32;
        obj.health = Some(Health::new(100));
        obj.armament = Some(Armament {
            damage: 10,
            range: 2,
            cooldown: 4,
            cooldown_remaining: 0,
        });
        obj
    }

    #[test]
    fn test_engages_enemy_in_range() {
        let map = TileMap::new(10, 1);
        let rules = Rules::default();
        let mut objects = ObjectStorage::new();
        objects.insert(tank(2, 2, 2));
        let mut rng = SimRng::new(0);
        let mut outputs = TickOutputs::default();
        let mut me = tank(1, 1, 0);
        let task = AttackMoveTask::new(TileCoord::new(9, 0));
        let mut node = TaskNode::new(TaskKind::AttackMove(task));
        let mut ctx = TaskContext::new(0, &map, &rules, &objects, &mut rng, &mut outputs);
        node.tick(&mut me, &mut ctx).unwrap();
        assert_eq!(node.children().len(), 1);
        assert!(matches!(node.children()[0].kind(), TaskKind::Attack(a) if a.target() == 2));
    }

    #[test]
    fn test_moves_when_nothing_in_range() {
        let map = TileMap::new(10, 1);
        let rules = Rules::default();
        let objects = ObjectStorage::new();
        let mut rng = SimRng::new(0);
        let mut outputs = TickOutputs::default();
        let mut me = tank(1, 1, 0);
        let mut task = AttackMoveTask::new(TileCoord::new(3, 0));
        let mut ctx = TaskContext::new(0, &map, &rules, &objects, &mut rng, &mut outputs);
        let mut finished = false;
        for tick in 0..200 {
            ctx.tick = tick;
            if task.on_tick(&mut me, &mut ctx).unwrap() {
                finished = true;
                break;
            }
        }
        assert!(finished);
        assert_eq!(me.tile, TileCoord::new(3, 0));
        assert_eq!(task.engagements(), 0);
    }
}
