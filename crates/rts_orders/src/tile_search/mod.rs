//! Tile search cursors over the map grid.
//!
//! Each finder is created for one search, pulled with
//! [`TileFinder::next_tile`] until it returns `None`, and then dropped.
//! Coordinates with no tile and tiles rejected by the bounds check or the
//! predicate are skipped the same way; only passing the maximum distance
//! ends a search.
//!
//! Finders borrow the map through two closures (a tile accessor and a
//! bounds checker), so they work on any grid that can answer those two
//! questions. [`map_area`] builds both from a [`TileMap`].

mod directional;
mod flood_fill;
mod radial;
mod weighted_random;

pub use directional::DirectionalFinder;
pub use flood_fill::FloodFillFinder;
pub use radial::RadialBackFirstFinder;
pub use weighted_random::WeightedRandomFinder;

use crate::map::{Tile, TileCoord, TileMap};

/// A one-shot search cursor.
pub trait TileFinder {
    /// Next tile in search order, or `None` once the search is exhausted.
    fn next_tile(&mut self) -> Option<Tile>;
}

/// Caller-supplied deterministic source of indices.
pub trait IndexRng {
    /// Uniform index in `0..len`.
    fn next_index(&mut self, len: usize) -> usize;
}

/// Tile accessor, bounds checker and predicate shared by all finders.
pub struct SearchArea<A, B, P> {
    accessor: A,
    bounds: B,
    predicate: P,
    bounds_check: bool,
}

impl<A, B, P> SearchArea<A, B, P>
where
    A: Fn(i32, i32) -> Option<Tile>,
    B: Fn(TileCoord) -> bool,
    P: FnMut(&Tile) -> bool,
{
    /// Create a search area with bounds checking enabled.
    pub fn new(accessor: A, bounds: B, predicate: P) -> Self {
        Self {
            accessor,
            bounds,
            predicate,
            bounds_check: true,
        }
    }

    /// Enable or disable the bounds check.
    pub fn with_bounds_check(mut self, enabled: bool) -> Self {
        self.bounds_check = enabled;
        self
    }

    /// Tile at a coordinate if it exists and is accepted.
    pub(crate) fn accept(&mut self, coord: TileCoord) -> Option<Tile> {
        if self.bounds_check && !(self.bounds)(coord) {
            return None;
        }
        let tile = (self.accessor)(coord.rx, coord.ry)?;
        (self.predicate)(&tile).then_some(tile)
    }
}

/// Search area over a [`TileMap`], bounded by its playable area.
pub fn map_area<'m, P>(
    map: &'m TileMap,
    predicate: P,
) -> SearchArea<
    impl Fn(i32, i32) -> Option<Tile> + 'm,
    impl Fn(TileCoord) -> bool + 'm,
    P,
>
where
    P: FnMut(&Tile) -> bool,
{
    SearchArea::new(
        move |rx, ry| map.tile_at(rx, ry),
        move |coord| map.is_within_bounds(coord),
        predicate,
    )
}

macro_rules! impl_finder_iterator {
    ($finder:ident < $($param:ident),* >) => {
        impl<$($param),*> Iterator for $finder<$($param),*>
        where
            Self: TileFinder,
        {
            type Item = Tile;

            fn next(&mut self) -> Option<Tile> {
                self.next_tile()
            }
        }
    };
}

impl_finder_iterator!(RadialBackFirstFinder<A, B, P>);
impl_finder_iterator!(DirectionalFinder<A, B, P>);
impl_finder_iterator!(FloodFillFinder<A, B, P, J>);

impl<A, B, P, R> Iterator for WeightedRandomFinder<'_, A, B, P, R>
where
    Self: TileFinder,
{
    type Item = Tile;

    fn next(&mut self) -> Option<Tile> {
        self.next_tile()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::TerrainClass;

    #[test]
    fn test_missing_and_rejected_tiles_are_skipped_alike() {
        let mut map = TileMap::new(3, 1);
        map.set_terrain(TileCoord::new(1, 0), TerrainClass::Rock);
        let mut area = map_area(&map, |tile: &Tile| tile.terrain != TerrainClass::Rock);

        assert!(area.accept(TileCoord::new(0, 0)).is_some());
        assert!(area.accept(TileCoord::new(1, 0)).is_none());
        assert!(area.accept(TileCoord::new(-1, 0)).is_none());
    }

    #[test]
    fn test_bounds_check_toggle() {
        let map = TileMap::new(4, 4).with_local_bounds(crate::map::TileRect::from_size(
            TileCoord::new(1, 1),
            2,
            2,
        ));
        let mut checked = map_area(&map, |_: &Tile| true);
        assert!(checked.accept(TileCoord::new(0, 0)).is_none());

        let mut unchecked = map_area(&map, |_: &Tile| true).with_bounds_check(false);
        assert!(unchecked.accept(TileCoord::new(0, 0)).is_some());
        // Hard bounds still apply through the accessor.
        assert!(unchecked.accept(TileCoord::new(4, 0)).is_none());
    }
}
