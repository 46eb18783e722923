//! Grid A* over waypoints.
//!
//! Nodes are (tile, bridge level) pairs so decks and the ground beneath
//! them are searched as separate layers. Step legality comes from
//! [`can_step`]; cost is the inverse of the terrain speed modifier.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

use crate::map::{Direction, TileCoord, TileMap, Waypoint};
use crate::math::Fixed;
use crate::movement::position::{can_step, tile_speed};
use crate::object::MovementProfile;

/// Upper bound on node expansions for one search.
pub const MAX_EXPANSIONS: usize = 4096;

/// Cost charged for tiles whose speed modifier is unknown.
const FALLBACK_COST: Fixed = Fixed::const_from_int(1);

/// A node in the A* open set priority queue.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct AStarNode {
    waypoint: NodeKey,
    /// g + h.
    f_score: Fixed,
    /// Tie-breaker for determinism: lower keys first.
    tie_breaker: u64,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
struct NodeKey {
    tile: TileCoord,
    on_bridge: bool,
}

impl From<Waypoint> for NodeKey {
    fn from(waypoint: Waypoint) -> Self {
        Self {
            tile: waypoint.tile,
            on_bridge: waypoint.on_bridge,
        }
    }
}

impl From<NodeKey> for Waypoint {
    fn from(key: NodeKey) -> Self {
        Self {
            tile: key.tile,
            on_bridge: key.on_bridge,
        }
    }
}

impl Ord for AStarNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse for lowest f first.
        match other.f_score.cmp(&self.f_score) {
            Ordering::Equal => other.tie_breaker.cmp(&self.tie_breaker),
            ord => ord,
        }
    }
}

impl PartialOrd for AStarNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn tie_breaker(map: &TileMap, key: NodeKey) -> u64 {
    let index = (key.tile.ry as u64) * u64::from(map.width()) + key.tile.rx as u64;
    (index << 1) | u64::from(key.on_bridge)
}

#[inline]
fn chebyshev_heuristic(from: TileCoord, to: TileCoord) -> Fixed {
    Fixed::from_num(from.chebyshev(to))
}

fn step_cost(map: &TileMap, to: &Waypoint, profile: &MovementProfile) -> Fixed {
    if profile.class.ignores_terrain() {
        return Fixed::ONE;
    }
    let speed = tile_speed(map, to, profile);
    if speed > Fixed::ZERO {
        Fixed::ONE / speed
    } else {
        FALLBACK_COST
    }
}

/// Find a path from `start` to `goal`.
///
/// `blocked` marks tiles the path must avoid (buildings, known
/// blockers); the goal itself is never treated as blocked. The returned
/// waypoints exclude the start. `None` when the goal cannot be reached
/// within [`MAX_EXPANSIONS`].
pub fn find_path(
    map: &TileMap,
    profile: &MovementProfile,
    start: Waypoint,
    goal: TileCoord,
    blocked: impl Fn(TileCoord) -> bool,
) -> Option<Vec<Waypoint>> {
    if start.tile == goal {
        return Some(Vec::new());
    }

    let start_key = NodeKey::from(start);
    let mut open_set: BinaryHeap<AStarNode> = BinaryHeap::new();
    let mut came_from: BTreeMap<NodeKey, NodeKey> = BTreeMap::new();
    let mut g_score: BTreeMap<NodeKey, Fixed> = BTreeMap::new();

    g_score.insert(start_key, Fixed::ZERO);
    open_set.push(AStarNode {
        waypoint: start_key,
        f_score: chebyshev_heuristic(start.tile, goal),
        tie_breaker: tie_breaker(map, start_key),
    });

    let mut expansions = 0;
    while let Some(current) = open_set.pop() {
        if current.waypoint.tile == goal {
            return Some(reconstruct_path(&came_from, current.waypoint, start_key));
        }
        expansions += 1;
        if expansions > MAX_EXPANSIONS {
            break;
        }

        let current_g = g_score
            .get(&current.waypoint)
            .copied()
            .unwrap_or(Fixed::MAX);
        let from = Waypoint::from(current.waypoint);

        for direction in Direction::ALL {
            let Some(next) = can_step(map, &from, direction, profile) else {
                continue;
            };
            if next.tile != goal && blocked(next.tile) {
                continue;
            }
            let key = NodeKey::from(next);
            let tentative_g = current_g + step_cost(map, &next, profile);
            if tentative_g < g_score.get(&key).copied().unwrap_or(Fixed::MAX) {
                came_from.insert(key, current.waypoint);
                g_score.insert(key, tentative_g);
                open_set.push(AStarNode {
                    waypoint: key,
                    f_score: tentative_g + chebyshev_heuristic(next.tile, goal),
                    tie_breaker: tie_breaker(map, key),
                });
            }
        }
    }
    None
}

fn reconstruct_path(
    came_from: &BTreeMap<NodeKey, NodeKey>,
    goal: NodeKey,
    start: NodeKey,
) -> Vec<Waypoint> {
    let mut path = vec![Waypoint::from(goal)];
    let mut current = goal;
    while let Some(&previous) = came_from.get(&current) {
        if previous == start {
            break;
        }
        path.push(Waypoint::from(previous));
        current = previous;
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locomotor::LocomotorClass;
    use crate::map::{SpeedType, TerrainClass};

    fn infantry() -> MovementProfile {
        MovementProfile {
            class: LocomotorClass::Foot,
            speed_type: SpeedType::Foot,
            is_infantry: true,
        }
    }

    #[test]
    fn test_straight_path() {
        let map = TileMap::new(10, 10);
        let path = find_path(
            &map,
            &infantry(),
            Waypoint::ground(TileCoord::new(0, 0)),
            TileCoord::new(3, 0),
            |_| false,
        )
        .unwrap();
        let tiles: Vec<TileCoord> = path.iter().map(|w| w.tile).collect();
        assert_eq!(
            tiles,
            vec![TileCoord::new(1, 0), TileCoord::new(2, 0), TileCoord::new(3, 0)]
        );
    }

    #[test]
    fn test_path_around_wall() {
        let mut map = TileMap::new(10, 10);
        for y in 0..9 {
            map.set_terrain(TileCoord::new(5, y), TerrainClass::Rock);
        }
        let path = find_path(
            &map,
            &infantry(),
            Waypoint::ground(TileCoord::new(2, 2)),
            TileCoord::new(8, 2),
            |_| false,
        )
        .unwrap();
        assert_eq!(path.last().map(|w| w.tile), Some(TileCoord::new(8, 2)));
        assert!(path.iter().any(|w| w.tile.ry == 9));
        assert!(path
            .iter()
            .all(|w| map.tile(w.tile).unwrap().terrain != TerrainClass::Rock));
    }

    #[test]
    fn test_unreachable_goal() {
        let mut map = TileMap::new(6, 6);
        for y in 0..6 {
            map.set_terrain(TileCoord::new(3, y), TerrainClass::Water);
        }
        let result = find_path(
            &map,
            &infantry(),
            Waypoint::ground(TileCoord::new(0, 0)),
            TileCoord::new(5, 5),
            |_| false,
        );
        assert!(result.is_none());
    }

    #[test]
    fn test_blocked_tiles_are_avoided() {
        let map = TileMap::new(5, 3);
        let wall = [TileCoord::new(2, 0), TileCoord::new(2, 1)];
        let path = find_path(
            &map,
            &infantry(),
            Waypoint::ground(TileCoord::new(0, 0)),
            TileCoord::new(4, 0),
            |tile| wall.contains(&tile),
        )
        .unwrap();
        assert!(path.iter().all(|w| !wall.contains(&w.tile)));
        assert!(path.iter().any(|w| w.tile == TileCoord::new(2, 2)));
    }

    #[test]
    fn test_path_is_deterministic() {
        let map = TileMap::new(16, 16);
        let run = || {
            find_path(
                &map,
                &infantry(),
                Waypoint::ground(TileCoord::new(1, 1)),
                TileCoord::new(12, 9),
                |_| false,
            )
        };
        assert_eq!(run(), run());
    }
}
