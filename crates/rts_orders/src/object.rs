//! Game objects and their deterministic storage.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::locomotor::{Locomotor, LocomotorClass};
use crate::map::{SpeedType, TileCoord, TileRect, Waypoint};
use crate::math::Vec3Fixed;
use crate::task::OrderDispatch;

/// Unique identifier for game objects.
pub type ObjectId = u64;

/// Player identifier.
pub type PlayerId = u8;

/// Owner of objects that belong to nobody (capturable tech buildings).
pub const NEUTRAL_PLAYER: PlayerId = 0;

/// Infantry stance, affecting walking speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Stance {
    /// Upright.
    #[default]
    Standing,
    /// Crawling.
    Prone,
}

/// How an object moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct MovementProfile {
    /// Locomotor class used for movement.
    pub class: LocomotorClass,
    /// Terrain speed class.
    pub speed_type: SpeedType,
    /// Whether the object is infantry.
    pub is_infantry: bool,
}

/// Hit points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Health {
    /// Remaining hit points.
    pub current: u32,
    /// Maximum hit points.
    pub max: u32,
}

impl Health {
    /// Full health.
    #[must_use]
    pub const fn new(max: u32) -> Self {
        Self { current: max, max }
    }

    /// Whether the object has run out of hit points.
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        self.current == 0
    }

    /// Apply damage, saturating at zero.
    pub fn apply_damage(&mut self, amount: u32) {
        self.current = self.current.saturating_sub(amount);
    }
}

/// A mounted weapon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Armament {
    /// Damage per shot.
    pub damage: u32,
    /// Range in tiles (Chebyshev).
    pub range: u32,
    /// Ticks between shots.
    pub cooldown: u32,
    /// Ticks until the weapon can fire again.
    pub cooldown_remaining: u32,
}

/// Active chrono warp: the object is out of play until `expires_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WarpStatus {
    /// Where the object reappears.
    pub destination: Waypoint,
    /// Tick at which the object is relocated.
    pub expires_at: u64,
}

/// A simulated unit or building.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GameObject {
    /// Object id.
    pub id: ObjectId,
    /// Owning player.
    pub owner: PlayerId,
    /// Rules type name.
    pub type_id: String,
    /// Tile the object stands on (top-left tile for buildings).
    pub tile: TileCoord,
    /// Whether the object stands on a bridge deck.
    pub on_bridge: bool,
    /// World position in leptons.
    pub position: Vec3Fixed,
    /// Facing, 0-255 clockwise from north.
    pub facing: u8,
    /// Displacement applied during the last tick.
    pub velocity: Vec3Fixed,
    /// Task queue.
    pub orders: OrderDispatch,
    /// Movement class and terrain profile.
    pub profile: MovementProfile,
    /// Base speed in leptons per tick.
    pub base_speed: u32,
    /// Infantry stance.
    pub stance: Stance,
    /// Panicked infantry run faster.
    pub panicked: bool,
    /// Tile reserved by an in-progress step.
    pub claimed: Option<TileCoord>,
    /// Hit points, if destructible.
    pub health: Option<Health>,
    /// Weapon, if armed.
    pub armament: Option<Armament>,
    /// Footprint, if a building.
    pub foundation: Option<TileRect>,
    /// Warp in progress.
    pub warp: Option<WarpStatus>,
    /// Falling out of the sky.
    pub crashing: bool,
    /// Building can be captured by engineers.
    pub capturable: bool,
    /// Building accepts units for recycling.
    pub recycler: bool,
    /// Building produces units.
    pub factory: bool,
    /// Movement strategy, created on first use.
    pub locomotor: Option<Locomotor>,
}

impl GameObject {
    /// Create a unit with no capabilities at a position.
    #[must_use]
    pub fn new(
        id: ObjectId,
        owner: PlayerId,
        type_id: impl Into<String>,
        tile: TileCoord,
        position: Vec3Fixed,
    ) -> Self {
        Self {
            id,
            owner,
            type_id: type_id.into(),
            tile,
            on_bridge: false,
            position,
            facing: 0,
            velocity: Vec3Fixed::ZERO,
            orders: OrderDispatch::default(),
            profile: MovementProfile::default(),
            base_speed: 0,
            stance: Stance::Standing,
            panicked: false,
            claimed: None,
            health: None,
            armament: None,
            foundation: None,
            warp: None,
            crashing: false,
            capturable: false,
            recycler: false,
            factory: false,
            locomotor: None,
        }
    }

    /// Current waypoint descriptor.
    #[must_use]
    pub const fn waypoint(&self) -> Waypoint {
        Waypoint {
            tile: self.tile,
            on_bridge: self.on_bridge,
        }
    }

    /// Whether the object is a building.
    #[must_use]
    pub const fn is_building(&self) -> bool {
        self.foundation.is_some()
    }

    /// Whether the object is still in play.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        !self.health.is_some_and(|health| health.is_dead())
    }

    /// Whether the object can never block ground movement.
    #[must_use]
    pub const fn is_airborne(&self) -> bool {
        self.profile.class.is_airborne()
    }

    /// Tiles this object occupies.
    #[must_use]
    pub fn occupies(&self, waypoint: &Waypoint) -> bool {
        if let Some(rect) = self.foundation {
            return rect.contains(waypoint.tile);
        }
        (self.tile == waypoint.tile && self.on_bridge == waypoint.on_bridge)
            || self.claimed == Some(waypoint.tile)
    }

    /// Run `f` with this object's locomotor, creating it on first need.
    ///
    /// The locomotor is discarded and recreated when the movement class no
    /// longer matches.
    pub fn with_locomotor<R>(&mut self, f: impl FnOnce(&mut Locomotor, &Self) -> R) -> R {
        let class = self.profile.class;
        let mut locomotor = match self.locomotor.take() {
            Some(existing) if existing.class() == class => existing,
            _ => Locomotor::for_class(class),
        };
        let result = f(&mut locomotor, self);
        self.locomotor = Some(locomotor);
        result
    }
}

/// Object storage with deterministic iteration.
///
/// Uses a `BTreeMap` so iteration is always in ascending id order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectStorage {
    objects: BTreeMap<ObjectId, GameObject>,
    next_id: ObjectId,
}

impl ObjectStorage {
    /// Create empty storage. Ids start at 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            objects: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Reserve the next object id.
    pub fn allocate_id(&mut self) -> ObjectId {
        if self.next_id == 0 {
            self.next_id = 1;
        }
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Insert an object under its own id.
    pub fn insert(&mut self, object: GameObject) {
        self.next_id = self.next_id.max(object.id + 1);
        self.objects.insert(object.id, object);
    }

    /// Remove an object.
    pub fn remove(&mut self, id: ObjectId) -> Option<GameObject> {
        self.objects.remove(&id)
    }

    /// Get an object.
    #[must_use]
    pub fn get(&self, id: ObjectId) -> Option<&GameObject> {
        self.objects.get(&id)
    }

    /// Get an object mutably.
    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut GameObject> {
        self.objects.get_mut(&id)
    }

    /// Ids in ascending order.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<ObjectId> {
        self.objects.keys().copied().collect()
    }

    /// Objects in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &GameObject> {
        self.objects.values()
    }

    /// Number of objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether there are no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Ground objects occupying a waypoint, in id order.
    ///
    /// Airborne and warping objects never obstruct.
    #[must_use]
    pub fn obstacles_at(&self, waypoint: &Waypoint, exclude: ObjectId) -> Vec<ObjectId> {
        self.objects
            .values()
            .filter(|obj| obj.id != exclude)
            .filter(|obj| !obj.is_airborne() && obj.warp.is_none())
            .filter(|obj| obj.occupies(waypoint))
            .map(|obj| obj.id)
            .collect()
    }

    /// Tiles covered by building footprints, skipping `ignored` buildings.
    #[must_use]
    pub fn building_tiles(&self, ignored: &[ObjectId]) -> Vec<TileCoord> {
        let mut tiles = Vec::new();
        for obj in self.objects.values() {
            if ignored.contains(&obj.id) {
                continue;
            }
            if let Some(rect) = obj.foundation {
                for ry in rect.min.ry..=rect.max.ry {
                    for rx in rect.min.rx..=rect.max.rx {
                        tiles.push(TileCoord::new(rx, ry));
                    }
                }
            }
        }
        tiles
    }
}
