use serde::{Deserialize, Serialize};

use super::{floored_speed, turn_facing, vertical_step, LocomotorContext, LocomotorStep, TURN_RATE};
use crate::map::{Direction, Waypoint};
use crate::math::{fixed_serde, Fixed, Vec3Fixed};
use crate::movement::tile_speed;
use crate::object::GameObject;

/// Hover height above ground or water, in leptons.
pub const HOVER_HEIGHT: Fixed = Fixed::const_from_int(32);

/// Vertical correction per tick for hovercraft.
pub const HOVER_CLIMB_RATE: Fixed = Fixed::const_from_int(8);

fn sample_speed(last: &mut Fixed, obj: &GameObject, ctx: &LocomotorContext<'_>) -> Fixed {
    let sampled = tile_speed(ctx.map, &obj.waypoint(), &obj.profile);
    if sampled > Fixed::ZERO {
        *last = sampled;
    }
    *last
}

/// Tracked, wheeled and naval vehicles.
///
/// Turns on the spot until facing the waypoint, then drives at
/// `floor(base × terrain)`. Finishes on arrival with no pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DriveLocomotor {
    #[serde(with = "fixed_serde")]
    last_tile_speed: Fixed,
}

impl Default for DriveLocomotor {
    fn default() -> Self {
        Self {
            last_tile_speed: Fixed::ONE,
        }
    }
}

impl DriveLocomotor {
    pub(super) fn tick(
        &mut self,
        obj: &GameObject,
        waypoint: &Waypoint,
        speed: Fixed,
        ctx: &LocomotorContext<'_>,
    ) -> LocomotorStep {
        let remaining = ctx.map.waypoint_position(waypoint) - obj.position;
        if remaining.is_zero() {
            return LocomotorStep::arrived();
        }

        if let Some(desired) = Direction::towards(remaining).map(Direction::facing) {
            if obj.facing != desired {
                let facing = turn_facing(obj.facing, desired, TURN_RATE);
                return LocomotorStep::moving(Vec3Fixed::ZERO, false, Some(facing));
            }
        }

        let speed = floored_speed(speed, sample_speed(&mut self.last_tile_speed, obj, ctx));
        if remaining.length() <= speed {
            return LocomotorStep::moving(remaining, true, None);
        }
        LocomotorStep::moving(remaining.clamp_length(speed), false, None)
    }
}

/// Hovercraft: no turning delay, holds [`HOVER_HEIGHT`] above the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HoverLocomotor {
    #[serde(with = "fixed_serde")]
    last_tile_speed: Fixed,
}

impl Default for HoverLocomotor {
    fn default() -> Self {
        Self {
            last_tile_speed: Fixed::ONE,
        }
    }
}

impl HoverLocomotor {
    pub(super) fn tick(
        &mut self,
        obj: &GameObject,
        waypoint: &Waypoint,
        speed: Fixed,
        ctx: &LocomotorContext<'_>,
    ) -> LocomotorStep {
        let mut target = ctx.map.waypoint_position(waypoint);
        target.z += HOVER_HEIGHT;
        let remaining = target - obj.position;
        let speed = floored_speed(speed, sample_speed(&mut self.last_tile_speed, obj, ctx));
        let facing = Direction::towards(remaining).map(Direction::facing);

        if remaining.length() <= speed {
            return LocomotorStep::moving(remaining, true, facing);
        }

        let planar = remaining.planar().clamp_length(speed);
        let climb = vertical_step(obj.position.z, target.z, HOVER_CLIMB_RATE.min(speed));
        let displacement = Vec3Fixed::new(planar.x, planar.y, climb).clamp_length(speed);
        LocomotorStep::moving(displacement, false, facing)
    }
}
