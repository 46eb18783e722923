use super::{IndexRng, SearchArea, TileFinder};
use crate::map::{Tile, TileCoord};

/// Random-order visit of every tile in a `(2d + 1)²` box.
///
/// All box indices are seeded up front and drawn without replacement, so
/// each coordinate is offered exactly once whatever the generator returns.
pub struct WeightedRandomFinder<'r, A, B, P, R> {
    area: SearchArea<A, B, P>,
    rng: &'r mut R,
    origin: TileCoord,
    max_distance: u32,
    remaining: Vec<u32>,
}

impl<'r, A, B, P, R> WeightedRandomFinder<'r, A, B, P, R> {
    /// Create a box search of radius `max_distance` around `origin`.
    pub fn new(
        area: SearchArea<A, B, P>,
        rng: &'r mut R,
        origin: TileCoord,
        max_distance: u32,
    ) -> Self {
        let side = 2 * max_distance + 1;
        Self {
            area,
            rng,
            origin,
            max_distance,
            remaining: (0..side * side).collect(),
        }
    }

    fn coord_of(&self, index: u32) -> TileCoord {
        let side = 2 * self.max_distance + 1;
        let d = self.max_distance as i32;
        self.origin
            .offset((index % side) as i32 - d, (index / side) as i32 - d)
    }
}

impl<A, B, P, R> TileFinder for WeightedRandomFinder<'_, A, B, P, R>
where
    A: Fn(i32, i32) -> Option<Tile>,
    B: Fn(TileCoord) -> bool,
    P: FnMut(&Tile) -> bool,
    R: IndexRng,
{
    fn next_tile(&mut self) -> Option<Tile> {
        while !self.remaining.is_empty() {
            let pick = self.rng.next_index(self.remaining.len()) % self.remaining.len();
            let index = self.remaining.swap_remove(pick);
            if let Some(tile) = self.area.accept(self.coord_of(index)) {
                return Some(tile);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::map::{TerrainClass, TileMap};
    use crate::tile_search::map_area;

    /// Always draws the first remaining index.
    struct FirstIndex;

    impl IndexRng for FirstIndex {
        fn next_index(&mut self, _len: usize) -> usize {
            0
        }
    }

    #[test]
    fn test_visits_every_tile_once() {
        let map = TileMap::new(9, 9);
        let mut rng = FirstIndex;
        let finder = WeightedRandomFinder::new(
            map_area(&map, |_: &Tile| true),
            &mut rng,
            TileCoord::new(4, 4),
            2,
        );
        let tiles: Vec<TileCoord> = finder.map(|t| t.coord).collect();
        let unique: BTreeSet<TileCoord> = tiles.iter().copied().collect();
        assert_eq!(tiles.len(), 25);
        assert_eq!(unique.len(), 25);
        assert!(unique.iter().all(|c| c.chebyshev(TileCoord::new(4, 4)) <= 2));
    }

    #[test]
    fn test_predicate_exclusions() {
        let mut map = TileMap::new(5, 5);
        map.set_terrain(TileCoord::new(2, 2), TerrainClass::Rock);
        map.set_terrain(TileCoord::new(1, 2), TerrainClass::Rock);
        let mut rng = crate::rng::SimRng::new(3);
        let finder = WeightedRandomFinder::new(
            map_area(&map, |t: &Tile| t.terrain != TerrainClass::Rock),
            &mut rng,
            TileCoord::new(2, 2),
            1,
        );
        assert_eq!(finder.count(), 7);
    }

    #[test]
    fn test_zero_radius_yields_origin() {
        let map = TileMap::new(2, 2);
        let mut rng = FirstIndex;
        let mut finder = WeightedRandomFinder::new(
            map_area(&map, |_: &Tile| true),
            &mut rng,
            TileCoord::new(1, 1),
            0,
        );
        assert_eq!(finder.next_tile().map(|t| t.coord), Some(TileCoord::new(1, 1)));
        assert!(finder.next_tile().is_none());
    }
}
