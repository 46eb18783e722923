use super::{SearchArea, TileFinder};
use crate::map::{Tile, TileCoord};

/// Closest-first ring search around a rectangular foundation.
///
/// Ring `d` is the perimeter of the foundation grown by `d` tiles on every
/// side. Each ring is walked along the top edge left to right, the right
/// edge top to bottom, the bottom edge right to left and the left edge
/// bottom to top.
pub struct RadialBackFirstFinder<A, B, P> {
    area: SearchArea<A, B, P>,
    origin: TileCoord,
    width: u32,
    height: u32,
    distance: u32,
    max_distance: u32,
    ring: Vec<TileCoord>,
    cursor: usize,
    finished: bool,
}

impl<A, B, P> RadialBackFirstFinder<A, B, P> {
    /// Search rings `start..=max` around a `width` × `height` foundation
    /// whose top-left tile is `origin`.
    pub fn new(
        area: SearchArea<A, B, P>,
        origin: TileCoord,
        foundation: (u32, u32),
        start_distance: u32,
        max_distance: u32,
    ) -> Self {
        let (width, height) = (foundation.0.max(1), foundation.1.max(1));
        let mut finder = Self {
            area,
            origin,
            width,
            height,
            distance: start_distance,
            max_distance,
            ring: Vec::new(),
            cursor: 0,
            finished: start_distance > max_distance,
        };
        if !finder.finished {
            finder.ring = finder.build_ring(start_distance);
        }
        finder
    }

    fn build_ring(&self, distance: u32) -> Vec<TileCoord> {
        let d = distance as i32;
        let left = self.origin.rx - d;
        let top = self.origin.ry - d;
        let right = self.origin.rx + self.width as i32 - 1 + d;
        let bottom = self.origin.ry + self.height as i32 - 1 + d;

        let mut ring = Vec::new();
        for x in left..=right {
            ring.push(TileCoord::new(x, top));
        }
        for y in top + 1..=bottom {
            ring.push(TileCoord::new(right, y));
        }
        if bottom > top {
            for x in (left..right).rev() {
                ring.push(TileCoord::new(x, bottom));
            }
        }
        if right > left {
            for y in (top + 1..bottom).rev() {
                ring.push(TileCoord::new(left, y));
            }
        }
        ring
    }
}

impl<A, B, P> TileFinder for RadialBackFirstFinder<A, B, P>
where
    A: Fn(i32, i32) -> Option<Tile>,
    B: Fn(TileCoord) -> bool,
    P: FnMut(&Tile) -> bool,
{
    fn next_tile(&mut self) -> Option<Tile> {
        while !self.finished {
            if self.cursor >= self.ring.len() {
                if self.distance >= self.max_distance {
                    self.finished = true;
                    break;
                }
                self.distance += 1;
                self.ring = self.build_ring(self.distance);
                self.cursor = 0;
                continue;
            }
            let coord = self.ring[self.cursor];
            self.cursor += 1;
            if let Some(tile) = self.area.accept(coord) {
                return Some(tile);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{TerrainClass, TileMap};
    use crate::tile_search::map_area;

    fn coords(finder: impl Iterator<Item = Tile>) -> Vec<(i32, i32)> {
        finder.map(|t| (t.coord.rx, t.coord.ry)).collect()
    }

    #[test]
    fn test_ring_order_single_tile() {
        let map = TileMap::new(10, 10);
        let finder = RadialBackFirstFinder::new(
            map_area(&map, |_: &Tile| true),
            TileCoord::new(5, 5),
            (1, 1),
            0,
            1,
        );
        assert_eq!(
            coords(finder),
            vec![
                (5, 5),
                (4, 4),
                (5, 4),
                (6, 4),
                (6, 5),
                (6, 6),
                (5, 6),
                (4, 6),
                (4, 5),
            ]
        );
    }

    #[test]
    fn test_foundation_ring_wraps_footprint() {
        let map = TileMap::new(10, 10);
        let finder = RadialBackFirstFinder::new(
            map_area(&map, |_: &Tile| true),
            TileCoord::new(4, 4),
            (2, 1),
            1,
            1,
        );
        let ring = coords(finder);
        // (2 + 2) × (1 + 2) rectangle minus the 2 × 1 footprint.
        assert_eq!(ring.len(), 10);
        assert_eq!(ring[0], (3, 3));
        assert_eq!(ring[3], (6, 3));
        assert_eq!(*ring.last().unwrap(), (3, 4));
    }

    #[test]
    fn test_skips_rejected_and_off_map_tiles() {
        let mut map = TileMap::new(3, 3);
        map.set_terrain(TileCoord::new(1, 0), TerrainClass::Rock);
        let finder = RadialBackFirstFinder::new(
            map_area(&map, |t: &Tile| t.terrain != TerrainClass::Rock),
            TileCoord::new(0, 0),
            (1, 1),
            0,
            1,
        );
        assert_eq!(coords(finder), vec![(0, 0), (1, 1), (0, 1)]);
    }

    #[test]
    fn test_start_past_max_is_empty() {
        let map = TileMap::new(3, 3);
        let mut finder = RadialBackFirstFinder::new(
            map_area(&map, |_: &Tile| true),
            TileCoord::new(1, 1),
            (1, 1),
            3,
            2,
        );
        assert!(finder.next_tile().is_none());
    }
}
