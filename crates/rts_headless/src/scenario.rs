//! Scenario loading and configuration.
//!
//! Scenarios define the starting state for headless runs: the map, the
//! rules, every unit and building, and a script of orders to issue.
//!
//! Objects are spawned in file order (units first, then buildings), so
//! the `n`th spawned object gets id `n + 1`. Scripted orders name their
//! recipient by that spawn index.

use std::path::Path;

use rts_orders::error::SimError;
use rts_orders::map::{Bridge, TerrainClass, TileCoord, TileMap};
use rts_orders::object::{ObjectId, PlayerId};
use rts_orders::order::Order;
use rts_orders::rules::Rules;
use rts_orders::simulation::Simulation;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// The simulation rejected a placement.
    #[error("Invalid scenario setup: {0}")]
    Setup(#[from] SimError),
    /// A scripted order names a spawn index that does not exist.
    #[error("Scripted order at tick {tick} targets unknown spawn index {index}")]
    UnknownSpawnIndex {
        /// Tick of the bad order.
        tick: u64,
        /// The index used.
        index: usize,
    },
}

/// A complete scenario configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Map dimensions (width, height) in tiles.
    pub map_size: (u32, u32),
    /// Simulation seed.
    #[serde(default)]
    pub seed: u64,
    /// Ticks to simulate.
    pub ticks: u64,
    /// Rule overrides; omitted fields keep their defaults.
    #[serde(default)]
    pub rules: Rules,
    /// Terrain painted over the clear map, in order.
    #[serde(default)]
    pub terrain: Vec<TerrainPatch>,
    /// Bridge decks.
    #[serde(default)]
    pub bridges: Vec<BridgePlacement>,
    /// Starting units.
    #[serde(default)]
    pub units: Vec<UnitPlacement>,
    /// Starting buildings.
    #[serde(default)]
    pub buildings: Vec<BuildingPlacement>,
    /// Orders to issue during the run.
    #[serde(default)]
    pub orders: Vec<ScenarioOrder>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::skirmish_1v1()
    }
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        let scenario: Scenario = ron::from_str(&contents)?;
        info!(name = %scenario.name, path = %path.display(), "scenario loaded");
        Ok(scenario)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// A built-in scenario by name.
    #[must_use]
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "skirmish_1v1" => Some(Self::skirmish_1v1()),
            "crowd_crossing" => Some(Self::crowd_crossing()),
            _ => None,
        }
    }

    /// Load `name_or_path` as a built-in name, falling back to a file path.
    pub fn resolve(name_or_path: &str) -> Result<Self, ScenarioError> {
        match Self::builtin(name_or_path) {
            Some(scenario) => Ok(scenario),
            None => Self::load(name_or_path),
        }
    }

    /// Two small armies meeting across a rocky ridge.
    #[must_use]
    pub fn skirmish_1v1() -> Self {
        let attack_move = |tick, unit, x, y| ScenarioOrder {
            tick,
            unit,
            order: Order::AttackMove {
                target: TileCoord::new(x, y),
            },
            queued: false,
        };
        Self {
            name: "Standard 1v1 Skirmish".to_string(),
            description: "Two mixed armies attack-move into each other around a ridge".to_string(),
            map_size: (24, 24),
            seed: 1,
            ticks: 1200,
            rules: Rules::default(),
            terrain: vec![
                TerrainPatch::new(TerrainClass::Rock, (11, 4), (12, 16)),
                TerrainPatch::new(TerrainClass::Water, (4, 18), (8, 20)),
                TerrainPatch::new(TerrainClass::Road, (0, 21), (23, 21)),
            ],
            bridges: Vec::new(),
            units: vec![
                UnitPlacement::new("tank", 1, (2, 2), 2),
                UnitPlacement::new("infantry", 1, (2, 4), 4),
                UnitPlacement::new("tank", 2, (19, 20), 2),
                UnitPlacement::new("infantry", 2, (18, 18), 4),
            ],
            buildings: vec![BuildingPlacement::new("tech_outpost", 0, (10, 19))],
            orders: (0..6)
                .map(|unit| attack_move(unit as u64, unit, 20, 20))
                .chain((6..12).map(|unit| attack_move(unit as u64, unit, 3, 3)))
                .collect(),
        }
    }

    /// A tank driving through a packed block of friendly infantry.
    #[must_use]
    pub fn crowd_crossing() -> Self {
        Self {
            name: "Crowd Crossing".to_string(),
            description: "Friendly infantry must step aside for a passing tank".to_string(),
            map_size: (16, 8),
            seed: 7,
            ticks: 900,
            rules: Rules::default(),
            terrain: Vec::new(),
            bridges: Vec::new(),
            units: vec![
                UnitPlacement::new("tank", 1, (1, 3), 1),
                UnitPlacement::new("infantry", 1, (5, 2), 3),
                UnitPlacement::new("infantry", 1, (5, 3), 3),
                UnitPlacement::new("infantry", 1, (5, 4), 3),
            ],
            buildings: Vec::new(),
            orders: vec![ScenarioOrder {
                tick: 0,
                unit: 0,
                order: Order::Move {
                    target: TileCoord::new(14, 3),
                },
                queued: false,
            }],
        }
    }

    /// Build the map described by this scenario.
    #[must_use]
    pub fn build_map(&self) -> TileMap {
        let mut map = TileMap::new(self.map_size.0, self.map_size.1);
        for patch in &self.terrain {
            for ry in patch.from.1..=patch.to.1 {
                for rx in patch.from.0..=patch.to.0 {
                    map.set_terrain(TileCoord::new(rx, ry), patch.terrain);
                }
            }
        }
        for bridge in &self.bridges {
            let (rx, ry) = bridge.position;
            map.set_bridge(
                TileCoord::new(rx, ry),
                Some(Bridge {
                    deck_level: bridge.deck_level,
                }),
            );
        }
        map
    }

    /// Create the starting simulation.
    ///
    /// Returns the simulation and the spawned object ids in spawn order.
    pub fn build(&self) -> Result<(Simulation, Vec<ObjectId>), ScenarioError> {
        let mut sim = Simulation::new(self.build_map(), self.rules.clone(), self.seed);
        let mut ids = Vec::new();
        for placement in &self.units {
            let (rx, ry) = placement.position;
            for offset in 0..placement.count as i32 {
                let tile = TileCoord::new(rx + offset, ry);
                ids.push(sim.spawn_unit(placement.owner, &placement.kind, tile)?);
            }
        }
        for placement in &self.buildings {
            let (rx, ry) = placement.position;
            ids.push(sim.spawn_building(placement.owner, &placement.kind, TileCoord::new(rx, ry))?);
        }
        if let Some(bad) = self.orders.iter().find(|order| order.unit >= ids.len()) {
            return Err(ScenarioError::UnknownSpawnIndex {
                tick: bad.tick,
                index: bad.unit,
            });
        }
        debug!(name = %self.name, objects = ids.len(), "scenario built");
        Ok((sim, ids))
    }

    /// Scripted orders issued before `tick`.
    pub fn orders_at(&self, tick: u64) -> impl Iterator<Item = &ScenarioOrder> {
        self.orders.iter().filter(move |order| order.tick == tick)
    }
}

/// A rectangle of one terrain class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerrainPatch {
    /// Terrain to paint.
    pub terrain: TerrainClass,
    /// Top-left tile (inclusive).
    pub from: (i32, i32),
    /// Bottom-right tile (inclusive).
    pub to: (i32, i32),
}

impl TerrainPatch {
    /// Create a new terrain patch.
    #[must_use]
    pub fn new(terrain: TerrainClass, from: (i32, i32), to: (i32, i32)) -> Self {
        Self { terrain, from, to }
    }
}

/// A bridge deck over one tile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgePlacement {
    /// Tile (x, y).
    pub position: (i32, i32),
    /// Deck elevation level.
    pub deck_level: i32,
}

/// Placement of units at scenario start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitPlacement {
    /// Unit type identifier.
    pub kind: String,
    /// Owning player.
    pub owner: PlayerId,
    /// First tile (x, y); further units go east of it.
    pub position: (i32, i32),
    /// Number of units to spawn.
    #[serde(default = "one")]
    pub count: u32,
}

fn one() -> u32 {
    1
}

impl UnitPlacement {
    /// Create a new unit placement.
    #[must_use]
    pub fn new(kind: impl Into<String>, owner: PlayerId, position: (i32, i32), count: u32) -> Self {
        Self {
            kind: kind.into(),
            owner,
            position,
            count,
        }
    }
}

/// Placement of a building at scenario start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingPlacement {
    /// Building type identifier.
    pub kind: String,
    /// Owning player (0 = neutral).
    pub owner: PlayerId,
    /// Top-left tile (x, y).
    pub position: (i32, i32),
}

impl BuildingPlacement {
    /// Create a new building placement.
    #[must_use]
    pub fn new(kind: impl Into<String>, owner: PlayerId, position: (i32, i32)) -> Self {
        Self {
            kind: kind.into(),
            owner,
            position,
        }
    }
}

/// An order issued during the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioOrder {
    /// Tick before which the order is issued.
    pub tick: u64,
    /// Spawn index of the recipient.
    pub unit: usize,
    /// The order.
    pub order: Order,
    /// Queue behind current tasks instead of replacing them.
    #[serde(default)]
    pub queued: bool,
}
