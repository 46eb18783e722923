//! Tile and bridge-level legality for a moving object.
//!
//! Pure functions of the map and a movement profile.

use crate::map::{Direction, TileCoord, TileMap, Waypoint};
use crate::math::Fixed;
use crate::object::MovementProfile;

/// Largest elevation change a ground unit can climb in one step.
pub const MAX_LEVEL_STEP: i32 = 1;

/// Terrain speed modifier at a waypoint; zero when impassable or off-map.
#[must_use]
pub fn tile_speed(map: &TileMap, waypoint: &Waypoint, profile: &MovementProfile) -> Fixed {
    match map.tile(waypoint.tile) {
        Some(tile) => map.passable_speed(
            tile,
            profile.speed_type,
            profile.is_infantry,
            waypoint.on_bridge,
        ),
        None => Fixed::ZERO,
    }
}

/// Whether the object may stand on a waypoint.
#[must_use]
pub fn is_passable(map: &TileMap, waypoint: &Waypoint, profile: &MovementProfile) -> bool {
    if !map.is_within_bounds(waypoint.tile) {
        return false;
    }
    if profile.class.ignores_terrain() {
        return true;
    }
    tile_speed(map, waypoint, profile) > Fixed::ZERO
}

/// Choose the bridge level when stepping from `from` onto `tile`.
///
/// A unit on a deck stays on decks while they continue at its level; a
/// unit on the ground joins a deck only where the deck is a smaller climb
/// than the ground under it.
#[must_use]
pub fn resolve_bridge_level(map: &TileMap, from: &Waypoint, tile: TileCoord) -> bool {
    let Some(bridge) = map.bridge_on_tile(tile) else {
        return false;
    };
    let current_level = map.waypoint_level(from);
    if from.on_bridge {
        return (bridge.deck_level - current_level).abs() <= MAX_LEVEL_STEP;
    }
    let ground_level = map.tile(tile).map_or(0, |t| t.level);
    let deck_step = (bridge.deck_level - current_level).abs();
    let ground_step = (ground_level - current_level).abs();
    deck_step <= MAX_LEVEL_STEP && deck_step < ground_step
}

/// Waypoint reached by one step from `from` in `direction`, if legal.
///
/// Rejects impassable targets, elevation jumps above [`MAX_LEVEL_STEP`]
/// and diagonals that cut an impassable corner. Classes that ignore
/// terrain only need the target to be in bounds.
#[must_use]
pub fn can_step(
    map: &TileMap,
    from: &Waypoint,
    direction: Direction,
    profile: &MovementProfile,
) -> Option<Waypoint> {
    let tile = from.tile.step(direction);
    if profile.class.ignores_terrain() {
        return map.is_within_bounds(tile).then_some(Waypoint::ground(tile));
    }

    let to = Waypoint {
        tile,
        on_bridge: resolve_bridge_level(map, from, tile),
    };
    if !is_passable(map, &to, profile) {
        return None;
    }
    if (map.waypoint_level(&to) - map.waypoint_level(from)).abs() > MAX_LEVEL_STEP {
        return None;
    }
    if direction.is_diagonal() {
        let (dx, dy) = direction.offset();
        for corner in [from.tile.offset(dx, 0), from.tile.offset(0, dy)] {
            let corner = Waypoint {
                tile: corner,
                on_bridge: resolve_bridge_level(map, from, corner),
            };
            if !is_passable(map, &corner, profile) {
                return None;
            }
        }
    }
    Some(to)
}

/// Compass direction of the single step from `from` to an adjacent tile.
#[must_use]
pub fn step_direction(from: TileCoord, to: TileCoord) -> Option<Direction> {
    let (dx, dy) = (to.rx - from.rx, to.ry - from.ry);
    if dx.abs() > 1 || dy.abs() > 1 {
        return None;
    }
    Direction::from_offset(dx, dy)
}
