use serde::{Deserialize, Serialize};

use super::{LocomotorContext, LocomotorStep};
use crate::map::{Direction, Waypoint};
use crate::math::{fixed_serde, mul_div, Fixed};
use crate::movement::tile_speed;
use crate::object::{GameObject, Stance};

/// Walking infantry.
///
/// Speed is `floor(base × stance × panic × terrain)`. Arrival needs the
/// remaining distance to reach zero and then one extra pause tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FootLocomotor {
    /// Terrain modifier of the last passable tile sampled.
    #[serde(with = "fixed_serde")]
    last_tile_speed: Fixed,
    paused: bool,
}

impl Default for FootLocomotor {
    fn default() -> Self {
        Self {
            last_tile_speed: Fixed::ONE,
            paused: false,
        }
    }
}

impl FootLocomotor {
    pub(super) fn reset(&mut self) {
        self.paused = false;
    }

    /// Speed for this tick in leptons.
    pub fn current_speed(
        &mut self,
        obj: &GameObject,
        base: Fixed,
        ctx: &LocomotorContext<'_>,
    ) -> Fixed {
        let sampled = tile_speed(ctx.map, &obj.waypoint(), &obj.profile);
        if sampled > Fixed::ZERO {
            self.last_tile_speed = sampled;
        }

        let hundred = Fixed::from_num(100);
        let stance = match obj.stance {
            Stance::Standing => 100,
            Stance::Prone => ctx.rules.prone_speed_percent,
        };
        let panic = if obj.panicked {
            ctx.rules.panic_speed_percent
        } else {
            100
        };
        let speed = mul_div(base, Fixed::from_num(stance), hundred);
        let speed = mul_div(speed, Fixed::from_num(panic), hundred);
        (speed * self.last_tile_speed).floor().max(Fixed::ONE)
    }

    pub(super) fn tick(
        &mut self,
        obj: &GameObject,
        waypoint: &Waypoint,
        speed: Fixed,
        ctx: &LocomotorContext<'_>,
    ) -> LocomotorStep {
        let remaining = ctx.map.waypoint_position(waypoint) - obj.position;
        if remaining.is_zero() {
            if self.paused {
                return LocomotorStep::arrived();
            }
            self.paused = true;
            return LocomotorStep::idle();
        }

        let speed = self.current_speed(obj, speed, ctx);
        let facing = Direction::towards(remaining).map(Direction::facing);
        LocomotorStep::moving(remaining.clamp_length(speed), false, facing)
    }
}
