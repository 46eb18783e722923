use serde::{Deserialize, Serialize};

use super::{floored_speed, vertical_step, LocomotorContext, LocomotorStep};
use crate::map::{Direction, Waypoint};
use crate::math::{fixed_serde, Fixed, Vec3Fixed};
use crate::object::GameObject;

/// Cruise height of jump jets above the higher of origin and target ground.
pub const JUMPJET_ALTITUDE: Fixed = Fixed::const_from_int(208);

/// Vertical speed of jump jets.
pub const JUMPJET_CLIMB_RATE: Fixed = Fixed::const_from_int(16);

/// Flight altitude of aircraft above the waypoint ground.
pub const FLIGHT_ALTITUDE: Fixed = Fixed::const_from_int(416);

/// Vertical speed of aircraft.
pub const FLIGHT_CLIMB_RATE: Fixed = Fixed::const_from_int(24);

fn facing_towards(vector: Vec3Fixed) -> Option<u8> {
    Direction::towards(vector).map(Direction::facing)
}

/// Jump-jet infantry: climb, cruise straight over terrain, descend.
///
/// Finishes once landed on the waypoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct JumpjetLocomotor;

impl JumpjetLocomotor {
    pub(super) fn tick(
        &mut self,
        obj: &GameObject,
        waypoint: &Waypoint,
        speed: Fixed,
        ctx: &LocomotorContext<'_>,
    ) -> LocomotorStep {
        let target = ctx.map.waypoint_position(waypoint);
        let speed = floored_speed(speed, Fixed::ONE);
        let rate = JUMPJET_CLIMB_RATE.min(speed);
        let planar = (target - obj.position).planar();

        if !planar.is_zero() {
            let cruise = ctx.map.ground_height(obj.position).max(target.z) + JUMPJET_ALTITUDE;
            if obj.position.z < cruise {
                let climb = vertical_step(obj.position.z, cruise, rate);
                return LocomotorStep::moving(
                    Vec3Fixed::new(Fixed::ZERO, Fixed::ZERO, climb),
                    false,
                    None,
                );
            }
            return LocomotorStep::moving(planar.clamp_length(speed), false, facing_towards(planar));
        }

        let descent = vertical_step(obj.position.z, target.z, rate);
        let landed = obj.position.z + descent == target.z;
        LocomotorStep::moving(Vec3Fixed::new(Fixed::ZERO, Fixed::ZERO, descent), landed, None)
    }
}

/// Aircraft: climb to [`FLIGHT_ALTITUDE`], then fly level.
///
/// Finishes when directly over the waypoint; the aircraft stays airborne.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct WingedLocomotor;

impl WingedLocomotor {
    pub(super) fn tick(
        &mut self,
        obj: &GameObject,
        waypoint: &Waypoint,
        speed: Fixed,
        ctx: &LocomotorContext<'_>,
    ) -> LocomotorStep {
        let target = ctx.map.waypoint_position(waypoint);
        let speed = floored_speed(speed, Fixed::ONE);
        let altitude = target.z + FLIGHT_ALTITUDE;

        if obj.position.z < altitude {
            let climb = vertical_step(obj.position.z, altitude, FLIGHT_CLIMB_RATE.min(speed));
            let rise = Vec3Fixed::new(Fixed::ZERO, Fixed::ZERO, climb);
            return LocomotorStep::moving(rise, false, None);
        }

        let planar = (target - obj.position).planar();
        if planar.length() <= speed {
            return LocomotorStep::moving(planar, true, facing_towards(planar));
        }
        LocomotorStep::moving(planar.clamp_length(speed), false, facing_towards(planar))
    }
}

/// Missiles: straight 3D flight, accelerating to full speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct MissileLocomotor {
    /// Speed reached so far; kept across waypoints.
    #[serde(with = "fixed_serde")]
    current_speed: Fixed,
}

impl MissileLocomotor {
    pub(super) fn tick(
        &mut self,
        obj: &GameObject,
        waypoint: &Waypoint,
        speed: Fixed,
        ctx: &LocomotorContext<'_>,
    ) -> LocomotorStep {
        let full = floored_speed(speed, Fixed::ONE);
        let acceleration = (full / Fixed::from_num(4)).floor().max(Fixed::ONE);
        self.current_speed = (self.current_speed + acceleration).min(full);

        let remaining = ctx.map.waypoint_position(waypoint) - obj.position;
        let facing = facing_towards(remaining);
        if remaining.length() <= self.current_speed {
            return LocomotorStep::moving(remaining, true, facing);
        }
        LocomotorStep::moving(remaining.clamp_length(self.current_speed), false, facing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locomotor::LocomotorClass;
    use crate::map::{TerrainClass, TileCoord, TileMap};
    use crate::object::MovementProfile;
    use crate::rules::Rules;

    fn flyer(class: LocomotorClass, position: Vec3Fixed) -> GameObject {
        let mut obj = GameObject::new(1, 1, "flyer", TileCoord::new(0, 0), position);
        obj.profile = MovementProfile {
            class,
            ..MovementProfile::default()
        };
        obj
    }

    #[test]
    fn test_jumpjet_flies_over_rock_and_lands() {
        let mut map = TileMap::new(4, 1);
        map.set_terrain(TileCoord::new(1, 0), TerrainClass::Rock);
        let rules = Rules::default();
        let ctx = LocomotorContext { map: &map, rules: &rules };
        let mut loco = JumpjetLocomotor;
        let mut obj = flyer(LocomotorClass::Jumpjet, Vec3Fixed::from_ints(128, 128, 0));
        let waypoint = Waypoint::ground(TileCoord::new(2, 0));

        let mut max_height = Fixed::ZERO;
        let mut ticks = 0;
        loop {
            let step = loco.tick(&obj, &waypoint, Fixed::from_num(18), &ctx);
            assert!(step.displacement.length() <= Fixed::from_num(18));
            obj.position += step.displacement;
            max_height = max_height.max(obj.position.z);
            ticks += 1;
            if step.done || ticks > 200 {
                break;
            }
        }
        assert_eq!(obj.position, Vec3Fixed::from_ints(640, 128, 0));
        assert_eq!(max_height, JUMPJET_ALTITUDE);
    }

    #[test]
    fn test_winged_stays_at_altitude() {
        let map = TileMap::new(4, 4);
        let rules = Rules::default();
        let ctx = LocomotorContext { map: &map, rules: &rules };
        let mut loco = WingedLocomotor;
        let mut obj = flyer(LocomotorClass::Winged, Vec3Fixed::from_ints(128, 128, 0));
        let waypoint = Waypoint::ground(TileCoord::new(3, 3));

        for _ in 0..200 {
            let step = loco.tick(&obj, &waypoint, Fixed::from_num(30), &ctx);
            obj.position += step.displacement;
            if step.done {
                break;
            }
        }
        assert_eq!(obj.position, Vec3Fixed::from_ints(896, 896, 416));
    }

    #[test]
    fn test_missile_accelerates() {
        let map = TileMap::new(8, 1);
        let rules = Rules::default();
        let ctx = LocomotorContext { map: &map, rules: &rules };
        let mut loco = MissileLocomotor::default();
        let obj = flyer(LocomotorClass::Missile, Vec3Fixed::from_ints(128, 128, 0));
        let waypoint = Waypoint::ground(TileCoord::new(7, 0));

        let speeds: Vec<Fixed> = (0..6)
            .map(|_| loco.tick(&obj, &waypoint, Fixed::from_num(40), &ctx).displacement.length())
            .collect();
        let expected: Vec<Fixed> =
            [10, 20, 30, 40, 40, 40].iter().map(|&n| Fixed::from_num(n)).collect();
        assert_eq!(speeds, expected);
    }
}
