use std::collections::BTreeSet;

use super::{SearchArea, TileFinder};
use crate::map::{Direction, Tile, TileCoord};

/// Depth-first flood fill from an origin.
///
/// A neighbour is reached when it passes the area predicate and the
/// adjacency predicate accepts the step `(from, to)`. Reached tiles are
/// yielded once each, in stack order, so results are not sorted by
/// distance. Callers wanting the nearest match must compare distances.
pub struct FloodFillFinder<A, B, P, J> {
    area: SearchArea<A, B, P>,
    adjacent: J,
    origin: TileCoord,
    max_distance: Option<u32>,
    stack: Vec<Tile>,
    visited: BTreeSet<TileCoord>,
    seeded: bool,
}

impl<A, B, P, J> FloodFillFinder<A, B, P, J> {
    /// Create a flood fill; `max_distance` bounds the Chebyshev radius.
    pub fn new(
        area: SearchArea<A, B, P>,
        origin: TileCoord,
        adjacent: J,
        max_distance: Option<u32>,
    ) -> Self {
        Self {
            area,
            adjacent,
            origin,
            max_distance,
            stack: Vec::new(),
            visited: BTreeSet::new(),
            seeded: false,
        }
    }
}

impl<A, B, P, J> TileFinder for FloodFillFinder<A, B, P, J>
where
    A: Fn(i32, i32) -> Option<Tile>,
    B: Fn(TileCoord) -> bool,
    P: FnMut(&Tile) -> bool,
    J: FnMut(&Tile, &Tile) -> bool,
{
    fn next_tile(&mut self) -> Option<Tile> {
        if !self.seeded {
            self.seeded = true;
            self.visited.insert(self.origin);
            if let Some(tile) = self.area.accept(self.origin) {
                self.stack.push(tile);
            }
        }

        let current = self.stack.pop()?;
        for direction in Direction::ALL {
            let coord = current.coord.step(direction);
            if self.visited.contains(&coord) {
                continue;
            }
            if self
                .max_distance
                .is_some_and(|max| coord.chebyshev(self.origin) > max)
            {
                continue;
            }
            let Some(next) = self.area.accept(coord) else {
                continue;
            };
            if (self.adjacent)(&current, &next) {
                self.visited.insert(coord);
                self.stack.push(next);
            }
        }
        Some(current)
    }
}
