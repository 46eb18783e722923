use super::{SearchArea, TileFinder};
use crate::map::{Direction, Tile, TileCoord};

/// Steps along one compass direction from `start` to `max` tiles out.
pub struct DirectionalFinder<A, B, P> {
    area: SearchArea<A, B, P>,
    origin: TileCoord,
    direction: Direction,
    distance: Option<u32>,
    max_distance: u32,
}

impl<A, B, P> DirectionalFinder<A, B, P> {
    /// Create a search along `direction`.
    pub fn new(
        area: SearchArea<A, B, P>,
        origin: TileCoord,
        direction: Direction,
        start_distance: u32,
        max_distance: u32,
    ) -> Self {
        Self {
            area,
            origin,
            direction,
            distance: Some(start_distance),
            max_distance,
        }
    }
}

impl<A, B, P> TileFinder for DirectionalFinder<A, B, P>
where
    A: Fn(i32, i32) -> Option<Tile>,
    B: Fn(TileCoord) -> bool,
    P: FnMut(&Tile) -> bool,
{
    fn next_tile(&mut self) -> Option<Tile> {
        let (dx, dy) = self.direction.offset();
        while let Some(distance) = self.distance.filter(|d| *d <= self.max_distance) {
            self.distance = distance.checked_add(1);
            // Offsets past the coordinate range end the search.
            let Some(coord) = offset_at(self.origin, dx, dy, distance) else {
                self.distance = None;
                break;
            };
            if let Some(tile) = self.area.accept(coord) {
                return Some(tile);
            }
        }
        None
    }
}

fn offset_at(origin: TileCoord, dx: i32, dy: i32, distance: u32) -> Option<TileCoord> {
    let d = i32::try_from(distance).ok()?;
    let rx = origin.rx.checked_add(dx.checked_mul(d)?)?;
    let ry = origin.ry.checked_add(dy.checked_mul(d)?)?;
    Some(TileCoord::new(rx, ry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{TerrainClass, TileMap};
    use crate::tile_search::map_area;

    #[test]
    fn test_skips_blocked_tiles() {
        let mut map = TileMap::new(8, 3);
        map.set_terrain(TileCoord::new(3, 1), TerrainClass::Water);
        let finder = DirectionalFinder::new(
            map_area(&map, |t: &Tile| t.terrain == TerrainClass::Clear),
            TileCoord::new(1, 1),
            Direction::East,
            1,
            3,
        );
        let xs: Vec<i32> = finder.map(|t| t.coord.rx).collect();
        assert_eq!(xs, vec![2, 4]);
    }

    #[test]
    fn test_stops_at_map_edge() {
        let map = TileMap::new(3, 3);
        let finder = DirectionalFinder::new(
            map_area(&map, |_: &Tile| true),
            TileCoord::new(1, 1),
            Direction::NorthWest,
            0,
            5,
        );
        assert_eq!(finder.count(), 2);
    }

    #[test]
    fn test_stops_at_coordinate_limit() {
        let everywhere = SearchArea::new(
            |rx: i32, ry: i32| {
                Some(Tile {
                    coord: TileCoord::new(rx, ry),
                    level: 0,
                    terrain: TerrainClass::Clear,
                    bridge: None,
                })
            },
            |_: TileCoord| true,
            |_: &Tile| true,
        );
        let start = i32::MAX.unsigned_abs() - 1;
        let mut finder = DirectionalFinder::new(
            everywhere,
            TileCoord::new(0, 0),
            Direction::East,
            start,
            u32::MAX,
        );
        let xs: Vec<i32> = finder.by_ref().map(|t| t.coord.rx).collect();
        assert_eq!(xs, vec![i32::MAX - 1, i32::MAX]);
        assert!(finder.next_tile().is_none());
    }

    #[test]
    fn test_start_at_u32_max_terminates() {
        let map = TileMap::new(4, 4);
        let mut finder = DirectionalFinder::new(
            map_area(&map, |_: &Tile| true),
            TileCoord::new(0, 0),
            Direction::South,
            u32::MAX,
            u32::MAX,
        );
        assert!(finder.next_tile().is_none());
        assert!(finder.next_tile().is_none());
    }
}
