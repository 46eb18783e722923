//! Per-movement-class physics.
//!
//! A [`Locomotor`] turns `(object, waypoint, speed)` into one tick of
//! displacement. Locomotors hold only transient accumulators, never touch
//! the task tree and never mutate the object: the calling task applies the
//! returned [`LocomotorStep`].
//!
//! Each object owns its locomotor instance (see
//! [`GameObject::with_locomotor`]). The instance is replaced when the
//! object's movement class changes.

mod air;
mod chrono;
mod foot;
mod ground;

pub use air::{JumpjetLocomotor, MissileLocomotor, WingedLocomotor};
pub use chrono::ChronoLocomotor;
pub use foot::FootLocomotor;
pub use ground::{DriveLocomotor, HoverLocomotor};

use serde::{Deserialize, Serialize};

use crate::map::{TileMap, Waypoint};
use crate::math::{Fixed, Vec3Fixed};
use crate::object::GameObject;
use crate::rules::Rules;

/// Downward acceleration of a crashing object, leptons per tick².
pub const CRASH_GRAVITY: Fixed = Fixed::const_from_int(6);

/// Facing change per tick for turning vehicles.
pub const TURN_RATE: u8 = 32;

/// Closed set of movement classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum LocomotorClass {
    /// Walking infantry.
    #[default]
    Foot,
    /// Tracked, wheeled and naval vehicles.
    Drive,
    /// Hovercraft.
    Hover,
    /// Jump-jet infantry.
    Jumpjet,
    /// Teleporting units.
    Chrono,
    /// Guided missiles.
    Missile,
    /// Aircraft.
    Winged,
}

impl LocomotorClass {
    /// Whether the class flies above units and terrain.
    #[must_use]
    pub const fn is_airborne(self) -> bool {
        matches!(self, Self::Jumpjet | Self::Missile | Self::Winged)
    }

    /// Whether terrain passability is irrelevant to the class.
    #[must_use]
    pub const fn ignores_terrain(self) -> bool {
        self.is_airborne() || matches!(self, Self::Chrono)
    }
}

/// A pending teleport reported by the chrono locomotor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChronoWarp {
    /// Where the object reappears.
    pub destination: Waypoint,
    /// Ticks until relocation.
    pub delay_ticks: u32,
}

/// Result of one locomotor tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocomotorStep {
    /// Displacement to apply this tick.
    pub displacement: Vec3Fixed,
    /// Waypoint reached.
    pub done: bool,
    /// Teleport to arm instead of moving.
    pub teleport: Option<ChronoWarp>,
    /// New facing, if the locomotor turned.
    pub facing: Option<u8>,
}

impl LocomotorStep {
    /// No movement, not finished.
    #[must_use]
    pub const fn idle() -> Self {
        Self {
            displacement: Vec3Fixed::ZERO,
            done: false,
            teleport: None,
            facing: None,
        }
    }

    /// No movement, waypoint reached.
    #[must_use]
    pub const fn arrived() -> Self {
        Self {
            displacement: Vec3Fixed::ZERO,
            done: true,
            teleport: None,
            facing: None,
        }
    }

    /// Move by `displacement`.
    #[must_use]
    pub const fn moving(displacement: Vec3Fixed, done: bool, facing: Option<u8>) -> Self {
        Self {
            displacement,
            done,
            teleport: None,
            facing,
        }
    }
}

/// Result of one tick on the crash path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrashStep {
    /// Displacement to apply this tick.
    pub displacement: Vec3Fixed,
    /// The object has hit the ground.
    pub landed: bool,
}

/// Read-only world view for locomotors.
#[derive(Debug, Clone, Copy)]
pub struct LocomotorContext<'a> {
    /// Tile grid.
    pub map: &'a TileMap,
    /// Game rules.
    pub rules: &'a Rules,
}

/// Movement strategy instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Locomotor {
    /// Walking.
    Foot(FootLocomotor),
    /// Ground vehicles.
    Drive(DriveLocomotor),
    /// Hovercraft.
    Hover(HoverLocomotor),
    /// Jump jets.
    Jumpjet(JumpjetLocomotor),
    /// Teleport.
    Chrono(ChronoLocomotor),
    /// Missiles.
    Missile(MissileLocomotor),
    /// Aircraft.
    Winged(WingedLocomotor),
}

impl Locomotor {
    /// Fresh locomotor for a movement class.
    #[must_use]
    pub fn for_class(class: LocomotorClass) -> Self {
        match class {
            LocomotorClass::Foot => Self::Foot(FootLocomotor::default()),
            LocomotorClass::Drive => Self::Drive(DriveLocomotor::default()),
            LocomotorClass::Hover => Self::Hover(HoverLocomotor::default()),
            LocomotorClass::Jumpjet => Self::Jumpjet(JumpjetLocomotor),
            LocomotorClass::Chrono => Self::Chrono(ChronoLocomotor),
            LocomotorClass::Missile => Self::Missile(MissileLocomotor::default()),
            LocomotorClass::Winged => Self::Winged(WingedLocomotor),
        }
    }

    /// Movement class of this instance.
    #[must_use]
    pub const fn class(&self) -> LocomotorClass {
        match self {
            Self::Foot(_) => LocomotorClass::Foot,
            Self::Drive(_) => LocomotorClass::Drive,
            Self::Hover(_) => LocomotorClass::Hover,
            Self::Jumpjet(_) => LocomotorClass::Jumpjet,
            Self::Chrono(_) => LocomotorClass::Chrono,
            Self::Missile(_) => LocomotorClass::Missile,
            Self::Winged(_) => LocomotorClass::Winged,
        }
    }

    /// Advance one tick towards `waypoint` with base speed `speed`.
    pub fn tick(
        &mut self,
        obj: &GameObject,
        waypoint: &Waypoint,
        speed: Fixed,
        ctx: &LocomotorContext<'_>,
    ) -> LocomotorStep {
        match self {
            Self::Foot(loco) => loco.tick(obj, waypoint, speed, ctx),
            Self::Drive(loco) => loco.tick(obj, waypoint, speed, ctx),
            Self::Hover(loco) => loco.tick(obj, waypoint, speed, ctx),
            Self::Jumpjet(loco) => loco.tick(obj, waypoint, speed, ctx),
            Self::Chrono(loco) => loco.tick(obj, waypoint, ctx),
            Self::Missile(loco) => loco.tick(obj, waypoint, speed, ctx),
            Self::Winged(loco) => loco.tick(obj, waypoint, speed, ctx),
        }
    }

    /// Reset per-waypoint accumulators.
    pub fn on_new_waypoint(&mut self, _obj: &GameObject, _waypoint: &Waypoint) {
        match self {
            Self::Foot(loco) => loco.reset(),
            Self::Drive(_)
            | Self::Hover(_)
            | Self::Jumpjet(_)
            | Self::Chrono(_)
            | Self::Missile(_)
            | Self::Winged(_) => {}
        }
    }

    /// One tick of falling for a crashing object.
    ///
    /// Airborne classes and hovercraft fall with accumulating gravity until
    /// they reach the ground; ground classes land at once.
    #[must_use]
    pub fn tick_crash(&self, obj: &GameObject, ctx: &LocomotorContext<'_>) -> CrashStep {
        let falls = self.class().is_airborne() || self.class() == LocomotorClass::Hover;
        let height = obj.position.z - ctx.map.ground_height(obj.position);
        if !falls || height <= Fixed::ZERO {
            return CrashStep {
                displacement: Vec3Fixed::ZERO,
                landed: true,
            };
        }
        let fall = (obj.velocity.z - CRASH_GRAVITY).max(-height);
        CrashStep {
            displacement: Vec3Fixed::new(Fixed::ZERO, Fixed::ZERO, fall),
            landed: fall == -height,
        }
    }
}

/// Turn `current` towards `desired` by at most `rate`, the shorter way round.
#[must_use]
pub fn turn_facing(current: u8, desired: u8, rate: u8) -> u8 {
    let diff = desired.wrapping_sub(current) as i8;
    if diff.unsigned_abs() <= rate {
        desired
    } else if diff > 0 {
        current.wrapping_add(rate)
    } else {
        current.wrapping_sub(rate)
    }
}

/// `base × tile_speed`, floored, never below one lepton per tick.
pub(crate) fn floored_speed(base: Fixed, modifier: Fixed) -> Fixed {
    (base * modifier).floor().max(Fixed::ONE)
}

/// Vertical step towards `target_z`, limited to `rate`.
pub(crate) fn vertical_step(current_z: Fixed, target_z: Fixed, rate: Fixed) -> Fixed {
    (target_z - current_z).clamp(-rate, rate)
}
