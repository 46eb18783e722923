//! Test fixtures and helpers.
//!
//! Pre-built maps and simulations for consistent testing.

use fixed::types::I32F32;
use rts_orders::map::{Bridge, TerrainClass, TileCoord, TileMap};
use rts_orders::object::{ObjectId, PlayerId};
use rts_orders::rules::Rules;
use rts_orders::simulation::Simulation;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Empty clear map of `size`×`size` tiles with default rules.
#[must_use]
pub fn open_field(size: u32, seed: u64) -> Simulation {
    Simulation::new(TileMap::new(size, size), Rules::default(), seed)
}

/// A 16×16 map with a rock ridge and water, two armies and a tech building.
///
/// Returns the simulation and the ids of player 1's units followed by
/// player 2's.
///
/// # Panics
///
/// Panics if the default rules lack a unit type used here.
#[must_use]
pub fn skirmish(seed: u64) -> (Simulation, Vec<ObjectId>) {
    let mut map = TileMap::new(16, 16);
    for ry in 4..11 {
        map.set_terrain(TileCoord::new(8, ry), TerrainClass::Rock);
    }
    for rx in 11..14 {
        map.set_terrain(TileCoord::new(rx, 2), TerrainClass::Water);
    }
    map.set_terrain(TileCoord::new(3, 12), TerrainClass::Rough);

    let mut sim = Simulation::new(map, Rules::default(), seed);
    let mut ids = Vec::new();
    for (owner, type_id, rx, ry) in [
        (1, "tank", 1, 1),
        (1, "infantry", 2, 1),
        (1, "engineer", 1, 2),
        (1, "hovercraft", 2, 2),
        (2, "tank", 14, 14),
        (2, "infantry", 13, 14),
    ] {
        ids.push(
            sim.spawn_unit(owner, type_id, TileCoord::new(rx, ry))
                .expect("default unit type"),
        );
    }
    sim.spawn_building(0, "tech_outpost", TileCoord::new(6, 12))
        .expect("default building type");
    (sim, ids)
}

/// Fill a `width`×`height` block starting at `origin` with one player's
/// infantry, returning their ids in row order.
///
/// # Panics
///
/// Panics if the block leaves the map.
pub fn packed_block(
    sim: &mut Simulation,
    owner: PlayerId,
    origin: TileCoord,
    width: i32,
    height: i32,
) -> Vec<ObjectId> {
    let mut ids = Vec::new();
    for dy in 0..height {
        for dx in 0..width {
            ids.push(
                sim.spawn_unit(owner, "infantry", origin.offset(dx, dy))
                    .expect("block inside map"),
            );
        }
    }
    ids
}

/// Wall off everything outside `rect_size`×`rect_size` tiles at the origin.
pub fn enclose(map: &mut TileMap, rect_size: i32) {
    let (width, height) = (map.width() as i32, map.height() as i32);
    for ry in 0..height {
        for rx in 0..width {
            if rx >= rect_size || ry >= rect_size {
                map.set_terrain(TileCoord::new(rx, ry), TerrainClass::Rock);
            }
        }
    }
}

/// A river running north-south at column `river_x`, crossed by a bridge
/// at row `bridge_y`, on a `size`×`size` map.
#[must_use]
pub fn bridge_crossing(size: u32, river_x: i32, bridge_y: i32) -> TileMap {
    let mut map = TileMap::new(size, size);
    for ry in 0..size as i32 {
        map.set_terrain(TileCoord::new(river_x, ry), TerrainClass::Water);
    }
    map.set_bridge(TileCoord::new(river_x, bridge_y), Some(Bridge { deck_level: 1 }));
    map
}
