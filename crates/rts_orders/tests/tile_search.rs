//! Search order and coverage of the tile finders.

use std::collections::BTreeSet;

use proptest::prelude::*;
use rts_orders::map::{Direction, TerrainClass, Tile, TileCoord, TileMap};
use rts_orders::tile_search::{
    map_area, DirectionalFinder, FloodFillFinder, IndexRng, RadialBackFirstFinder,
    WeightedRandomFinder,
};
use rts_test_utils::fixtures::enclose;
use rts_test_utils::strategies::{arb_terrain, arb_tile};

/// Always hands back the same index.
struct Constant(usize);

impl IndexRng for Constant {
    fn next_index(&mut self, len: usize) -> usize {
        self.0 % len.max(1)
    }
}

/// Replays a fixed list of raw draws.
struct Scripted {
    draws: Vec<usize>,
    cursor: usize,
}

impl IndexRng for Scripted {
    fn next_index(&mut self, _len: usize) -> usize {
        let draw = self.draws.get(self.cursor).copied().unwrap_or(usize::MAX);
        self.cursor += 1;
        draw
    }
}

fn coords(tiles: impl Iterator<Item = Tile>) -> Vec<TileCoord> {
    tiles.map(|tile| tile.coord).collect()
}

fn radial(
    map: &TileMap,
    origin: TileCoord,
    size: (u32, u32),
    start: u32,
    max: u32,
) -> Vec<TileCoord> {
    coords(RadialBackFirstFinder::new(map_area(map, |_| true), origin, size, start, max))
}

fn tiles(list: &[(i32, i32)]) -> Vec<TileCoord> {
    list.iter().map(|&(x, y)| TileCoord::new(x, y)).collect()
}

#[test]
fn test_radial_two_rings_in_order() {
    let map = TileMap::new(12, 12);
    let found = radial(&map, TileCoord::new(5, 5), (1, 1), 0, 2);

    let mut expected = vec![TileCoord::new(5, 5)];
    expected.extend(tiles(&[
        (4, 4),
        (5, 4),
        (6, 4),
        (6, 5),
        (6, 6),
        (5, 6),
        (4, 6),
        (4, 5),
    ]));
    expected.extend((3..=7).map(|x| TileCoord::new(x, 3)));
    expected.extend((4..=7).map(|y| TileCoord::new(7, y)));
    expected.extend((3..=6).rev().map(|x| TileCoord::new(x, 7)));
    expected.extend((4..=6).rev().map(|y| TileCoord::new(3, y)));
    assert_eq!(found, expected);
}

#[test]
fn test_radial_skips_missing_tiles_without_stopping() {
    let map = TileMap::new(4, 4);
    let found = radial(&map, TileCoord::new(0, 0), (1, 1), 0, 3);
    assert_eq!(found.len(), 16);
    assert_eq!(found[0], TileCoord::new(0, 0));
    assert_eq!(*found.last().unwrap(), TileCoord::new(0, 3));
}

#[test]
fn test_radial_around_building_starts_at_ring_one() {
    let map = TileMap::new(10, 10);
    let found = radial(&map, TileCoord::new(3, 3), (2, 3), 1, 1);
    assert_eq!(found.len(), 2 * (4 + 5) - 4);
    assert_eq!(found[0], TileCoord::new(2, 2));
    assert!(found.iter().all(|c| !(3..=4).contains(&c.rx) || !(3..=5).contains(&c.ry)));
}

#[test]
fn test_directional_stops_at_max() {
    let map = TileMap::new(10, 10);
    let area = map_area(&map, |_| true);
    let finder = DirectionalFinder::new(area, TileCoord::new(2, 8), Direction::NorthEast, 1, 4);
    let found = coords(finder);
    let expected: Vec<_> = (1..=4).map(|d| TileCoord::new(2 + d, 8 - d)).collect();
    assert_eq!(found, expected);
}

#[test]
fn test_flood_fill_stays_behind_walls() {
    let mut map = TileMap::new(8, 8);
    for ry in 0..8 {
        map.set_terrain(TileCoord::new(4, ry), TerrainClass::Rock);
    }
    let open = |tile: &Tile| tile.terrain != TerrainClass::Rock;
    let any = |_: &Tile, _: &Tile| true;
    let finder = FloodFillFinder::new(map_area(&map, open), TileCoord::new(1, 1), any, None);
    let found: BTreeSet<_> = coords(finder).into_iter().collect();
    assert_eq!(found.len(), 32);
    assert!(found.iter().all(|c| c.rx < 4));
}

#[test]
fn test_flood_fill_limited_inside_enclosure() {
    let mut map = TileMap::new(8, 8);
    enclose(&mut map, 5);
    let open = |tile: &Tile| tile.terrain != TerrainClass::Rock;
    let any = |_: &Tile, _: &Tile| true;

    let whole = FloodFillFinder::new(map_area(&map, open), TileCoord::new(2, 2), any, None);
    assert_eq!(whole.count(), 25);

    let near = FloodFillFinder::new(map_area(&map, open), TileCoord::new(0, 0), any, Some(1));
    let found: BTreeSet<_> = coords(near).into_iter().collect();
    assert_eq!(found, tiles(&[(0, 0), (1, 0), (0, 1), (1, 1)]).into_iter().collect());
}

#[test]
fn test_weighted_random_constant_rng_covers_box() {
    let map = TileMap::new(20, 20);
    for d in 0..4 {
        let mut rng = Constant(0);
        let area = map_area(&map, |_| true);
        let found = coords(WeightedRandomFinder::new(area, &mut rng, TileCoord::new(10, 10), d));
        let unique: BTreeSet<_> = found.iter().copied().collect();
        let side = (2 * d + 1) as usize;
        assert_eq!(found.len(), side * side);
        assert_eq!(unique.len(), side * side);
    }
}

proptest! {
    #[test]
    fn prop_weighted_random_visits_each_accepted_tile_once(
        origin in arb_tile(16),
        radius in 0u32..4,
        draws in prop::collection::vec(any::<usize>(), 0..64),
        terrain in prop::collection::vec(arb_terrain(), 256),
    ) {
        let mut map = TileMap::new(16, 16);
        for (index, class) in (0i32..).zip(&terrain) {
            map.set_terrain(TileCoord::new(index % 16, index / 16), *class);
        }
        let clear = |tile: &Tile| tile.terrain == TerrainClass::Clear;
        let mut rng = Scripted { draws, cursor: 0 };
        let area = map_area(&map, clear);
        let found = coords(WeightedRandomFinder::new(area, &mut rng, origin, radius));

        let d = radius as i32;
        let expected: BTreeSet<_> = (-d..=d)
            .flat_map(|dy| (-d..=d).map(move |dx| origin.offset(dx, dy)))
            .filter(|c| map.is_within_bounds(*c))
            .filter(|c| map.tile(*c).is_some_and(|tile| tile.terrain == TerrainClass::Clear))
            .collect();
        prop_assert_eq!(found.len(), expected.len());
        prop_assert_eq!(found.into_iter().collect::<BTreeSet<_>>(), expected);
    }

    #[test]
    fn prop_radial_rings_never_shrink(origin in arb_tile(16), max in 0u32..5) {
        let map = TileMap::new(16, 16);
        let found = radial(&map, origin, (1, 1), 0, max);
        let rings: Vec<u32> = found.iter().map(|c| c.chebyshev(origin)).collect();
        prop_assert!(rings.windows(2).all(|w| w[0] <= w[1]));
        prop_assert!(rings.iter().all(|ring| *ring <= max));
        let unique: BTreeSet<_> = found.iter().collect();
        prop_assert_eq!(unique.len(), found.len());
    }
}
