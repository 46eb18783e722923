use serde::{Deserialize, Serialize};

use super::{ChronoWarp, LocomotorContext, LocomotorStep};
use crate::map::{Waypoint, LEPTONS_PER_TILE};
use crate::math::{Fixed, Vec3Fixed};
use crate::object::GameObject;

/// Teleporting units.
///
/// Never moves the object itself. Each call reports a warp whose delay
/// depends on the straight-line distance, and finishes at once; the
/// simulation relocates the object when the warp expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ChronoLocomotor;

impl ChronoLocomotor {
    /// Warp delay in ticks for a straight-line distance in leptons.
    #[must_use]
    pub fn warp_delay(distance: Fixed, ctx: &LocomotorContext<'_>) -> u32 {
        let rules = ctx.rules;
        let range_minimum =
            Fixed::from_num(rules.chrono_range_minimum.saturating_mul(LEPTONS_PER_TILE as u32));
        if distance < range_minimum {
            return rules.chrono_minimum_delay;
        }
        let factor = Fixed::from_num(rules.chrono_distance_factor.max(1));
        (distance / factor).floor().to_num::<u32>()
    }

    pub(super) fn tick(
        &mut self,
        obj: &GameObject,
        waypoint: &Waypoint,
        ctx: &LocomotorContext<'_>,
    ) -> LocomotorStep {
        let distance = (ctx.map.waypoint_position(waypoint) - obj.position).length();
        LocomotorStep {
            displacement: Vec3Fixed::ZERO,
            done: true,
            teleport: Some(ChronoWarp {
                destination: *waypoint,
                delay_ticks: Self::warp_delay(distance, ctx),
            }),
            facing: None,
        }
    }
}
