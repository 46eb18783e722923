//! Tile grid, terrain classes and bridge metadata.
//!
//! The map is owned by the simulation and only read by tasks and
//! locomotors. Objects record their own tile; the map stores no
//! occupancy.

use serde::{Deserialize, Serialize};

use crate::math::{Fixed, Vec3Fixed};

/// Leptons along one tile edge.
pub const LEPTONS_PER_TILE: i32 = 256;

/// Leptons of height per elevation level.
pub const LEPTONS_PER_LEVEL: i32 = 104;

/// Integer tile coordinates.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct TileCoord {
    /// Column.
    pub rx: i32,
    /// Row.
    pub ry: i32,
}

impl TileCoord {
    /// Create a new coordinate.
    #[must_use]
    pub const fn new(rx: i32, ry: i32) -> Self {
        Self { rx, ry }
    }

    /// Coordinate shifted by an offset.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            rx: self.rx + dx,
            ry: self.ry + dy,
        }
    }

    /// Neighbouring coordinate in a compass direction.
    #[must_use]
    pub const fn step(self, direction: Direction) -> Self {
        let (dx, dy) = direction.offset();
        self.offset(dx, dy)
    }

    /// Chebyshev (king-move) distance.
    #[must_use]
    pub fn chebyshev(self, other: Self) -> u32 {
        self.rx.abs_diff(other.rx).max(self.ry.abs_diff(other.ry))
    }
}

/// The eight compass directions, clockwise from north.
///
/// North is towards decreasing `ry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    /// Towards -y.
    #[default]
    North,
    /// Towards +x, -y.
    NorthEast,
    /// Towards +x.
    East,
    /// Towards +x, +y.
    SouthEast,
    /// Towards +y.
    South,
    /// Towards -x, +y.
    SouthWest,
    /// Towards -x.
    West,
    /// Towards -x, -y.
    NorthWest,
}

impl Direction {
    /// All directions in clockwise order starting at north.
    pub const ALL: [Self; 8] = [
        Self::North,
        Self::NorthEast,
        Self::East,
        Self::SouthEast,
        Self::South,
        Self::SouthWest,
        Self::West,
        Self::NorthWest,
    ];

    /// Tile offset for one step in this direction.
    #[must_use]
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Self::North => (0, -1),
            Self::NorthEast => (1, -1),
            Self::East => (1, 0),
            Self::SouthEast => (1, 1),
            Self::South => (0, 1),
            Self::SouthWest => (-1, 1),
            Self::West => (-1, 0),
            Self::NorthWest => (-1, -1),
        }
    }

    /// Index in [`Direction::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Direction rotated clockwise by `steps` eighths (negative is anticlockwise).
    #[must_use]
    pub const fn rotate(self, steps: i32) -> Self {
        let index = (self.index() as i32 + steps).rem_euclid(8);
        Self::ALL[index as usize]
    }

    /// Opposite direction.
    #[must_use]
    pub const fn reverse(self) -> Self {
        self.rotate(4)
    }

    /// Facing value (0-255, clockwise from north) pointing this way.
    #[must_use]
    pub const fn facing(self) -> u8 {
        (self.index() * 32) as u8
    }

    /// Whether the direction is diagonal.
    #[must_use]
    pub const fn is_diagonal(self) -> bool {
        self.index() % 2 == 1
    }

    /// Direction for a unit tile offset.
    #[must_use]
    pub fn from_offset(dx: i32, dy: i32) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|dir| dir.offset() == (dx.signum(), dy.signum()) && (dx, dy) != (0, 0))
    }

    /// Closest compass direction for a planar vector, `None` for zero.
    ///
    /// Sectors are split at tan(22.5°) ≈ 5/12.
    #[must_use]
    pub fn towards(vector: Vec3Fixed) -> Option<Self> {
        let ax = vector.x.abs();
        let ay = vector.y.abs();
        if ax == Fixed::ZERO && ay == Fixed::ZERO {
            return None;
        }
        let five = Fixed::from_num(5);
        let twelve = Fixed::from_num(12);
        let dx = if ay * twelve < ax * five {
            vector.x.signum().to_num::<i32>()
        } else if ax * twelve < ay * five {
            0
        } else {
            vector.x.signum().to_num::<i32>()
        };
        let dy = if ax * twelve < ay * five {
            vector.y.signum().to_num::<i32>()
        } else if ay * twelve < ax * five {
            0
        } else {
            vector.y.signum().to_num::<i32>()
        };
        Self::from_offset(dx, dy)
    }

    /// One eighth-turn from `self` towards `target`, taking the shorter way.
    #[must_use]
    pub const fn turn_towards(self, target: Self) -> Self {
        let delta = (target.index() as i32 - self.index() as i32).rem_euclid(8);
        match delta {
            0 => self,
            1..=4 => self.rotate(1),
            _ => self.rotate(-1),
        }
    }
}

/// Terrain class of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TerrainClass {
    /// Open ground.
    #[default]
    Clear,
    /// Paved road.
    Road,
    /// Broken ground, slow for wheels.
    Rough,
    /// Open water.
    Water,
    /// Shoreline.
    Beach,
    /// Impassable rock and cliffs.
    Rock,
}

/// Movement speed class used to look up terrain modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SpeedType {
    /// Walking units.
    #[default]
    Foot,
    /// Tracked vehicles.
    Track,
    /// Wheeled vehicles.
    Wheel,
    /// Ships.
    Float,
    /// Hovercraft.
    Hover,
    /// Land and water vehicles.
    Amphibious,
    /// Aircraft.
    Winged,
}

impl TerrainClass {
    /// Speed percentage for a speed type on this terrain (0 = impassable).
    #[must_use]
    pub const fn speed_percent(self, speed_type: SpeedType, is_infantry: bool) -> u32 {
        use SpeedType::*;
        use TerrainClass::*;

        match (self, speed_type) {
            (_, Winged) => 100,

            (Clear, Float) => 0,
            (Clear, _) => 100,

            (Road, Float) => 0,
            (Road, Wheel) => 120,
            (Road, _) => 100,

            (Rough, Foot) => {
                if is_infantry {
                    100
                } else {
                    75
                }
            }
            (Rough, Track) => 75,
            (Rough, Wheel) => 50,
            (Rough, Float) => 0,
            (Rough, Hover) | (Rough, Amphibious) => 75,

            (Water, Float) | (Water, Hover) | (Water, Amphibious) => 100,
            (Water, _) => 0,

            (Beach, Wheel) => 75,
            (Beach, Float) => 0,
            (Beach, _) => 100,

            (Rock, _) => 0,
        }
    }
}

/// Bridge deck spanning a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bridge {
    /// Elevation level of the deck.
    pub deck_level: i32,
}

/// A single map tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tile {
    /// Tile coordinates.
    pub coord: TileCoord,
    /// Ground elevation level.
    pub level: i32,
    /// Terrain class of the ground.
    pub terrain: TerrainClass,
    /// Bridge deck over the tile, if any.
    pub bridge: Option<Bridge>,
}

/// Immutable waypoint descriptor: a tile plus the bridge level on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Waypoint {
    /// Target tile.
    pub tile: TileCoord,
    /// Whether the waypoint is on the bridge deck.
    pub on_bridge: bool,
}

impl Waypoint {
    /// Ground-level waypoint.
    #[must_use]
    pub const fn ground(tile: TileCoord) -> Self {
        Self {
            tile,
            on_bridge: false,
        }
    }
}

/// Inclusive rectangle of tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileRect {
    /// Top-left corner.
    pub min: TileCoord,
    /// Bottom-right corner (inclusive).
    pub max: TileCoord,
}

impl TileRect {
    /// Rectangle covering `width` × `height` tiles from `origin`.
    #[must_use]
    pub const fn from_size(origin: TileCoord, width: u32, height: u32) -> Self {
        Self {
            min: origin,
            max: TileCoord::new(
                origin.rx + width as i32 - 1,
                origin.ry + height as i32 - 1,
            ),
        }
    }

    /// Whether the rectangle contains a coordinate.
    #[must_use]
    pub const fn contains(&self, coord: TileCoord) -> bool {
        coord.rx >= self.min.rx
            && coord.rx <= self.max.rx
            && coord.ry >= self.min.ry
            && coord.ry <= self.max.ry
    }

    /// Chebyshev distance from a coordinate to the nearest tile of the rectangle.
    #[must_use]
    pub fn distance_to(&self, coord: TileCoord) -> u32 {
        let dx = (self.min.rx - coord.rx).max(coord.rx - self.max.rx).max(0);
        let dy = (self.min.ry - coord.ry).max(coord.ry - self.max.ry).max(0);
        dx.max(dy) as u32
    }
}

/// The tile grid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileMap {
    /// Grid width in tiles.
    width: u32,
    /// Grid height in tiles.
    height: u32,
    /// Tiles in row-major order.
    tiles: Vec<Tile>,
    /// Playable area; the rest of the grid is a hard border.
    local_bounds: TileRect,
}

impl TileMap {
    /// Create a map of clear level-0 tiles with the whole grid playable.
    ///
    /// # Panics
    ///
    /// Panics if `width` or `height` is zero.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        assert!(width > 0, "TileMap width must be positive");
        assert!(height > 0, "TileMap height must be positive");

        let mut tiles = Vec::with_capacity((width as usize) * (height as usize));
        for ry in 0..height as i32 {
            for rx in 0..width as i32 {
                tiles.push(Tile {
                    coord: TileCoord::new(rx, ry),
                    level: 0,
                    terrain: TerrainClass::Clear,
                    bridge: None,
                });
            }
        }
        Self {
            width,
            height,
            tiles,
            local_bounds: TileRect::from_size(TileCoord::new(0, 0), width, height),
        }
    }

    /// Restrict the playable area; tiles outside stay inside the hard bounds.
    #[must_use]
    pub fn with_local_bounds(mut self, bounds: TileRect) -> Self {
        self.local_bounds = bounds;
        self
    }

    /// Grid width in tiles.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in tiles.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Playable area.
    #[must_use]
    pub const fn local_bounds(&self) -> TileRect {
        self.local_bounds
    }

    fn index(&self, coord: TileCoord) -> Option<usize> {
        if self.is_within_hard_bounds(coord) {
            Some((coord.ry as usize) * (self.width as usize) + (coord.rx as usize))
        } else {
            None
        }
    }

    /// Whether the coordinate exists on the grid.
    #[must_use]
    pub const fn is_within_hard_bounds(&self, coord: TileCoord) -> bool {
        coord.rx >= 0
            && coord.ry >= 0
            && coord.rx < self.width as i32
            && coord.ry < self.height as i32
    }

    /// Whether the coordinate is inside the playable area.
    #[must_use]
    pub const fn is_within_bounds(&self, coord: TileCoord) -> bool {
        self.is_within_hard_bounds(coord) && self.local_bounds.contains(coord)
    }

    /// Tile at a coordinate.
    #[must_use]
    pub fn tile(&self, coord: TileCoord) -> Option<&Tile> {
        self.index(coord).map(|index| &self.tiles[index])
    }

    /// Tile by raw coordinates (tile accessor for finders).
    #[must_use]
    pub fn tile_at(&self, rx: i32, ry: i32) -> Option<Tile> {
        self.tile(TileCoord::new(rx, ry)).copied()
    }

    /// Set the terrain class of a tile. Returns `false` if out of bounds.
    pub fn set_terrain(&mut self, coord: TileCoord, terrain: TerrainClass) -> bool {
        match self.index(coord) {
            Some(index) => {
                self.tiles[index].terrain = terrain;
                true
            }
            None => false,
        }
    }

    /// Set the ground elevation of a tile. Returns `false` if out of bounds.
    pub fn set_level(&mut self, coord: TileCoord, level: i32) -> bool {
        match self.index(coord) {
            Some(index) => {
                self.tiles[index].level = level;
                true
            }
            None => false,
        }
    }

    /// Place or remove a bridge deck. Returns `false` if out of bounds.
    pub fn set_bridge(&mut self, coord: TileCoord, bridge: Option<Bridge>) -> bool {
        match self.index(coord) {
            Some(index) => {
                self.tiles[index].bridge = bridge;
                true
            }
            None => false,
        }
    }

    /// Bridge deck over a tile.
    #[must_use]
    pub fn bridge_on_tile(&self, coord: TileCoord) -> Option<Bridge> {
        self.tile(coord).and_then(|tile| tile.bridge)
    }

    /// Speed modifier for moving over a tile; zero means impassable.
    ///
    /// On a bridge deck the tile behaves like road, and a deck that is not
    /// there is impassable.
    #[must_use]
    pub fn passable_speed(
        &self,
        tile: &Tile,
        speed_type: SpeedType,
        is_infantry: bool,
        on_bridge: bool,
    ) -> Fixed {
        let percent = if on_bridge {
            match tile.bridge {
                Some(_) => TerrainClass::Road.speed_percent(speed_type, is_infantry),
                None => 0,
            }
        } else {
            tile.terrain.speed_percent(speed_type, is_infantry)
        };
        Fixed::from_num(percent) / Fixed::from_num(100)
    }

    /// Elevation level of a waypoint (deck level on bridges).
    #[must_use]
    pub fn waypoint_level(&self, waypoint: &Waypoint) -> i32 {
        match self.tile(waypoint.tile) {
            Some(tile) => match (waypoint.on_bridge, tile.bridge) {
                (true, Some(bridge)) => bridge.deck_level,
                _ => tile.level,
            },
            None => 0,
        }
    }

    /// World position of a waypoint: tile centre at its elevation.
    #[must_use]
    pub fn waypoint_position(&self, waypoint: &Waypoint) -> Vec3Fixed {
        let level = self.waypoint_level(waypoint);
        Vec3Fixed::from_ints(
            waypoint.tile.rx * LEPTONS_PER_TILE + LEPTONS_PER_TILE / 2,
            waypoint.tile.ry * LEPTONS_PER_TILE + LEPTONS_PER_TILE / 2,
            level * LEPTONS_PER_LEVEL,
        )
    }

    /// Ground height in leptons below a world position.
    #[must_use]
    pub fn ground_height(&self, position: Vec3Fixed) -> Fixed {
        let level = self
            .tile(Self::coord_of(position))
            .map_or(0, |tile| tile.level);
        Fixed::from_num(level * LEPTONS_PER_LEVEL)
    }

    /// Tile containing a world position.
    #[must_use]
    pub fn coord_of(position: Vec3Fixed) -> TileCoord {
        let size = Fixed::from_num(LEPTONS_PER_TILE);
        TileCoord::new(
            (position.x / size).floor().to_num::<i32>(),
            (position.y / size).floor().to_num::<i32>(),
        )
    }
}
