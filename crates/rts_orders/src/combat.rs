//! Minimal deterministic targeting.
//!
//! Damage is a flat per-weapon value; this module only decides who can be
//! shot at and by what.

use crate::object::{Armament, GameObject, ObjectId, ObjectStorage, NEUTRAL_PLAYER};
use crate::task::{AttackTask, TaskKind, TaskNode};

/// Result of a target scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetScan {
    /// Chosen target.
    pub target: ObjectId,
    /// Weapon that will fire.
    pub weapon: Armament,
}

/// Weapon used when no specific one is requested.
#[must_use]
pub fn select_default_weapon(me: &GameObject) -> Option<Armament> {
    me.armament
}

/// Chebyshev tile distance, measured to the nearest footprint tile of buildings.
#[must_use]
pub fn distance_between(me: &GameObject, other: &GameObject) -> u32 {
    match other.foundation {
        Some(rect) => rect.distance_to(me.tile),
        None => me.tile.chebyshev(other.tile),
    }
}

/// Whether `other` can be attacked by `me`.
#[must_use]
pub fn is_hostile(me: &GameObject, other: &GameObject) -> bool {
    other.id != me.id
        && other.owner != me.owner
        && other.owner != NEUTRAL_PLAYER
        && other.health.is_some()
        && other.is_alive()
        && other.warp.is_none()
}

/// Closest hostile object in weapon range; ties go to the lowest id.
#[must_use]
pub fn scan_for_target(me: &GameObject, objects: &ObjectStorage) -> Option<TargetScan> {
    let weapon = select_default_weapon(me)?;
    objects
        .iter()
        .filter(|other| is_hostile(me, other))
        .map(|other| (distance_between(me, other), other.id))
        .filter(|(distance, _)| *distance <= weapon.range)
        .min()
        .map(|(_, target)| TargetScan { target, weapon })
}

/// Attack task for a scan result.
#[must_use]
pub fn create_attack_task(scan: &TargetScan) -> TaskNode {
    TaskNode::new(TaskKind::Attack(AttackTask::new(scan.target)))
}
