//! Core simulation loop.
//!
//! The simulation owns the map, the rules, every object and the seeded
//! random generator, and advances them one tick at a time.
//!
//! # Tick order
//!
//! 1. Objects tick in ascending id order. Each one is taken out of storage,
//!    its task queue runs against a read-only view of everyone else, and it
//!    is put back. Its [`Effect`]s are applied right away, so later objects
//!    see them within the same tick.
//! 2. Expired chrono warps relocate their objects.
//! 3. Orders objects issued to each other are applied in issue order.
//! 4. Dead objects are removed, or start crashing if they were flying.
//!
//! # Determinism
//!
//! All state is fixed-point, stored in ordered maps and driven by a
//! seeded generator, so the same initial state and the same orders always
//! produce the same [`Simulation::state_hash`] sequence.
//!
//! # Example
//!
//! ```
//! use rts_orders::map::{TileCoord, TileMap};
//! use rts_orders::order::Order;
//! use rts_orders::rules::Rules;
//! use rts_orders::simulation::Simulation;
//!
//! let mut sim = Simulation::new(TileMap::new(16, 16), Rules::default(), 42);
//! let tank = sim.spawn_unit(1, "tank", TileCoord::new(2, 2)).unwrap();
//! sim.issue_order(tank, Order::Move { target: TileCoord::new(6, 2) }).unwrap();
//!
//! for _ in 0..200 {
//!     sim.tick();
//! }
//! assert_eq!(sim.object(tank).unwrap().tile, TileCoord::new(6, 2));
//! ```

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::{Result, SimError};
use crate::events::{GameEvent, TickEvents};
use crate::locomotor::{LocomotorClass, LocomotorContext};
use crate::map::{TileCoord, TileMap, TileRect, Waypoint};
use crate::math::{Fixed, Vec3Fixed};
use crate::movement::is_passable;
use crate::object::{
    Armament, GameObject, Health, MovementProfile, ObjectId, ObjectStorage, PlayerId,
};
use crate::order::Order;
use crate::rng::SimRng;
use crate::rules::Rules;
use crate::task::{
    DeferredOrder, Effect, FactoryExitTask, MoveTask, OrderMode, TaskContext, TaskKind, TaskNode,
    TickOutputs,
};
use crate::tile_search::{map_area, TileFinder, WeightedRandomFinder};

/// The deterministic game state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Simulation {
    tick: u64,
    map: TileMap,
    rules: Rules,
    objects: ObjectStorage,
    rng: SimRng,
}

impl Simulation {
    /// Create a simulation at tick 0 with no objects.
    #[must_use]
    pub fn new(map: TileMap, rules: Rules, seed: u64) -> Self {
        Self {
            tick: 0,
            map,
            rules,
            objects: ObjectStorage::new(),
            rng: SimRng::new(seed),
        }
    }

    /// Get the current tick number.
    #[must_use]
    pub const fn get_tick(&self) -> u64 {
        self.tick
    }

    /// The tile grid.
    #[must_use]
    pub const fn map(&self) -> &TileMap {
        &self.map
    }

    /// Mutable tile grid, for scenario setup.
    pub fn map_mut(&mut self) -> &mut TileMap {
        &mut self.map
    }

    /// Game rules.
    #[must_use]
    pub const fn rules(&self) -> &Rules {
        &self.rules
    }

    /// All objects.
    #[must_use]
    pub const fn objects(&self) -> &ObjectStorage {
        &self.objects
    }

    /// Get an object by id.
    #[must_use]
    pub fn object(&self, id: ObjectId) -> Option<&GameObject> {
        self.objects.get(id)
    }

    /// Get an object mutably.
    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut GameObject> {
        self.objects.get_mut(id)
    }

    /// Seed of the simulation generator.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.rng.seed()
    }

    /// Advance the simulation by one tick.
    pub fn tick(&mut self) -> TickEvents {
        let tick = self.tick;
        let mut outputs = TickOutputs::default();

        for id in self.objects.sorted_ids() {
            let Some(mut obj) = self.objects.remove(id) else {
                continue;
            };
            self.tick_object(&mut obj, &mut outputs);
            self.objects.insert(obj);
            self.apply_effects(&mut outputs);
        }

        self.expire_warps(&mut outputs.events);
        self.apply_deferred(&mut outputs);
        self.handle_dead(&mut outputs.events);

        #[cfg(feature = "debug-validation")]
        self.validate_occupancy();

        self.tick += 1;

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::debug!(tick = self.tick, state_hash = hash, "Simulation state hash");
        }

        TickEvents {
            tick,
            events: outputs.events,
        }
    }

    fn tick_object(&mut self, obj: &mut GameObject, outputs: &mut TickOutputs) {
        if let Some(armament) = obj.armament.as_mut() {
            armament.cooldown_remaining = armament.cooldown_remaining.saturating_sub(1);
        }

        if obj.crashing {
            let ctx = LocomotorContext {
                map: &self.map,
                rules: &self.rules,
            };
            let step = obj.with_locomotor(|locomotor, me| locomotor.tick_crash(me, &ctx));
            obj.position += step.displacement;
            obj.velocity = step.displacement;
            if step.landed {
                debug!(object = obj.id, "crashed");
                outputs.effects.push(Effect::Remove { target: obj.id });
            }
            return;
        }
        if obj.warp.is_some() {
            return;
        }

        let mut orders = std::mem::take(&mut obj.orders);
        let mut ctx = TaskContext::new(
            self.tick,
            &self.map,
            &self.rules,
            &self.objects,
            &mut self.rng,
            outputs,
        );
        if let Err(err) = orders.tick(obj, &mut ctx) {
            error!(object = obj.id, tick = self.tick, error = %err, "task aborted");
            ctx.emit(GameEvent::TaskAborted {
                object: obj.id,
                reason: err.to_string(),
            });
        }
        obj.orders = orders;
    }

    /// Warn about ground units sharing a cell.
    #[cfg(feature = "debug-validation")]
    fn validate_occupancy(&self) {
        let mut seen = std::collections::BTreeMap::new();
        let ground = self
            .objects
            .iter()
            .filter(|obj| !obj.is_building() && !obj.is_airborne() && obj.warp.is_none());
        for obj in ground {
            if let Some(first) = seen.insert((obj.tile, obj.on_bridge), obj.id) {
                tracing::warn!(
                    tick = self.tick,
                    first,
                    second = obj.id,
                    tile = ?obj.tile,
                    "ground units share a cell"
                );
            }
        }
    }

    fn apply_effects(&mut self, outputs: &mut TickOutputs) {
        for effect in std::mem::take(&mut outputs.effects) {
            match effect {
                Effect::Damage { target, amount } => {
                    let victim = self.objects.get_mut(target);
                    if let Some(health) = victim.and_then(|obj| obj.health.as_mut()) {
                        health.apply_damage(amount);
                    }
                }
                Effect::TransferOwnership { target, owner } => {
                    if let Some(obj) = self.objects.get_mut(target) {
                        debug!(object = target, from = obj.owner, to = owner, "ownership changed");
                        obj.owner = owner;
                        obj.orders.cancel_all_tasks();
                    }
                }
                Effect::Remove { target } => self.remove_object(target, &mut outputs.events),
            }
        }
    }

    fn expire_warps(&mut self, events: &mut Vec<GameEvent>) {
        for id in self.objects.sorted_ids() {
            let Some(obj) = self.objects.get_mut(id) else {
                continue;
            };
            let Some(warp) = obj.warp.filter(|warp| warp.expires_at <= self.tick) else {
                continue;
            };
            obj.tile = warp.destination.tile;
            obj.on_bridge = warp.destination.on_bridge;
            obj.position = self.map.waypoint_position(&warp.destination);
            obj.velocity = Vec3Fixed::ZERO;
            obj.warp = None;
            debug!(object = id, destination = ?warp.destination.tile, "warp completed");
            events.push(GameEvent::TeleportCompleted {
                object: id,
                destination: warp.destination.tile,
            });
        }
    }

    fn apply_deferred(&mut self, outputs: &mut TickOutputs) {
        for order in std::mem::take(&mut outputs.deferred) {
            let DeferredOrder {
                issuer,
                target,
                task,
                mode,
            } = order;
            let Some(mut obj) = self.objects.remove(target) else {
                continue;
            };
            let moving_aside = matches!(task.kind(), TaskKind::MoveAside(_));
            if obj.is_building()
                || obj.warp.is_some()
                || obj.crashing
                || (moving_aside && obj.orders.is_moving_aside())
            {
                self.objects.insert(obj);
                continue;
            }

            match mode {
                OrderMode::Append => obj.orders.add_task(task),
                OrderMode::Interrupt => {
                    let mut orders = std::mem::take(&mut obj.orders);
                    let mut ctx = TaskContext::new(
                        self.tick,
                        &self.map,
                        &self.rules,
                        &self.objects,
                        &mut self.rng,
                        outputs,
                    );
                    if let Err(err) = orders.interrupt(&mut obj, &mut ctx, task) {
                        error!(object = target, issuer, error = %err, "deferred order dropped");
                    }
                    obj.orders = orders;
                }
            }
            self.objects.insert(obj);
        }
    }

    fn handle_dead(&mut self, events: &mut Vec<GameEvent>) {
        for id in self.objects.sorted_ids() {
            let Some(obj) = self.objects.get(id) else {
                continue;
            };
            if obj.is_alive() || obj.crashing {
                continue;
            }
            let flying = obj.is_airborne() || obj.profile.class == LocomotorClass::Hover;
            let height = obj.position.z - self.map.ground_height(obj.position);
            if flying && height > Fixed::ZERO {
                self.start_crash(id, events);
            } else {
                self.remove_object(id, events);
            }
        }
    }

    fn start_crash(&mut self, id: ObjectId, events: &mut Vec<GameEvent>) {
        let Some(mut obj) = self.objects.remove(id) else {
            return;
        };
        let mut scratch = TickOutputs::default();
        let mut orders = std::mem::take(&mut obj.orders);
        {
            let mut ctx = TaskContext::new(
                self.tick,
                &self.map,
                &self.rules,
                &self.objects,
                &mut self.rng,
                &mut scratch,
            );
            orders.end_all(&mut obj, &mut ctx);
        }
        obj.crashing = true;
        obj.velocity = Vec3Fixed::new(Fixed::ZERO, Fixed::ZERO, Fixed::ZERO.min(obj.velocity.z));
        debug!(object = id, "shot down");
        self.objects.insert(obj);
        events.append(&mut scratch.events);
    }

    fn remove_object(&mut self, id: ObjectId, events: &mut Vec<GameEvent>) {
        let Some(mut obj) = self.objects.remove(id) else {
            return;
        };
        let mut scratch = TickOutputs::default();
        let mut orders = std::mem::take(&mut obj.orders);
        {
            let mut ctx = TaskContext::new(
                self.tick,
                &self.map,
                &self.rules,
                &self.objects,
                &mut self.rng,
                &mut scratch,
            );
            orders.end_all(&mut obj, &mut ctx);
        }
        debug!(object = id, type_id = %obj.type_id, "object removed");
        events.append(&mut scratch.events);
        events.push(GameEvent::ObjectDestroyed { object: id });
    }

    /// Spawn a unit on a tile.
    ///
    /// # Errors
    ///
    /// Returns an error if the type is unknown or the tile is outside the
    /// playable area.
    pub fn spawn_unit(
        &mut self,
        owner: PlayerId,
        type_id: &str,
        tile: TileCoord,
    ) -> Result<ObjectId> {
        let unit = self.rules.unit(type_id)?.clone();
        if !self.map.is_within_bounds(tile) {
            return Err(SimError::InvalidState(format!(
                "spawn tile ({}, {}) is outside the map",
                tile.rx, tile.ry
            )));
        }
        let id = self.objects.allocate_id();
        let position = self.map.waypoint_position(&Waypoint::ground(tile));
        let mut obj = GameObject::new(id, owner, type_id, tile, position);
        obj.profile = MovementProfile {
            class: unit.locomotor,
            speed_type: unit.speed_type,
            is_infantry: unit.infantry,
        };
        obj.base_speed = unit.speed;
        obj.health = Some(Health::new(unit.health));
        obj.armament = unit.weapon.map(|weapon| Armament {
            damage: weapon.damage,
            range: weapon.range,
            cooldown: weapon.cooldown,
            cooldown_remaining: 0,
        });
        self.objects.insert(obj);
        debug!(object = id, owner, type_id, ?tile, "unit spawned");
        Ok(id)
    }

    /// Place a building with its top-left tile at `origin`.
    ///
    /// # Errors
    ///
    /// Returns an error if the type is unknown or the footprint leaves the
    /// playable area.
    pub fn spawn_building(
        &mut self,
        owner: PlayerId,
        type_id: &str,
        origin: TileCoord,
    ) -> Result<ObjectId> {
        let building = self.rules.building(type_id)?.clone();
        let footprint = TileRect::from_size(origin, building.width, building.height);
        if !self.map.is_within_bounds(footprint.min) || !self.map.is_within_bounds(footprint.max) {
            return Err(SimError::InvalidState(format!(
                "building footprint at ({}, {}) leaves the map",
                origin.rx, origin.ry
            )));
        }
        let id = self.objects.allocate_id();
        let position = self.map.waypoint_position(&Waypoint::ground(origin));
        let mut obj = GameObject::new(id, owner, type_id, origin, position);
        obj.foundation = Some(footprint);
        obj.health = Some(Health::new(building.health));
        obj.capturable = building.capturable;
        obj.recycler = building.recycler;
        obj.factory = building.factory;
        self.objects.insert(obj);
        debug!(object = id, owner, type_id, ?origin, "building placed");
        Ok(id)
    }

    /// Produce a unit inside a factory and send it out.
    ///
    /// The unit appears on the bottom row of the footprint and gets a
    /// factory-exit task towards `rally`.
    ///
    /// # Errors
    ///
    /// Returns an error if the factory does not exist, is not a factory, or
    /// the unit type is unknown.
    pub fn spawn_from_factory(
        &mut self,
        factory: ObjectId,
        type_id: &str,
        rally: Option<TileCoord>,
    ) -> Result<ObjectId> {
        let building = self.objects.get(factory).ok_or(SimError::EntityNotFound(factory))?;
        let footprint = building
            .foundation
            .filter(|_| building.factory)
            .ok_or_else(|| SimError::InvalidState(format!("object {factory} is not a factory")))?;
        let owner = building.owner;
        let exit = FactoryExitTask::exit_tile(&footprint);
        let inside = TileCoord::new(exit.rx, footprint.max.ry);

        let id = self.spawn_unit(owner, type_id, inside)?;
        if let Some(obj) = self.objects.get_mut(id) {
            obj.facing = 128;
            let exit = FactoryExitTask::new(factory, rally);
            obj.orders.add_task(TaskNode::new(TaskKind::FactoryExit(exit)));
        }
        Ok(id)
    }

    /// Replace an object's orders.
    ///
    /// Everything queued is cancelled; started tasks wind down before the
    /// new order runs.
    ///
    /// # Errors
    ///
    /// Returns an error if the object does not exist.
    pub fn issue_order(&mut self, id: ObjectId, order: Order) -> Result<()> {
        let task = self.task_for(id, &order)?;
        let obj = self.objects.get_mut(id).ok_or(SimError::EntityNotFound(id))?;
        obj.orders.cancel_all_tasks();
        if let Some(task) = task {
            obj.orders.add_task(task);
        }
        debug!(object = id, ?order, "order issued");
        Ok(())
    }

    /// Queue an order behind the object's current tasks.
    ///
    /// [`Order::Stop`] still cancels everything.
    ///
    /// # Errors
    ///
    /// Returns an error if the object does not exist.
    pub fn queue_order(&mut self, id: ObjectId, order: Order) -> Result<()> {
        if order == Order::Stop {
            return self.issue_order(id, order);
        }
        let task = self.task_for(id, &order)?;
        let obj = self.objects.get_mut(id).ok_or(SimError::EntityNotFound(id))?;
        if let Some(task) = task {
            obj.orders.add_task(task);
        }
        debug!(object = id, ?order, "order queued");
        Ok(())
    }

    fn task_for(&mut self, id: ObjectId, order: &Order) -> Result<Option<TaskNode>> {
        if self.objects.get(id).is_none() {
            return Err(SimError::EntityNotFound(id));
        }
        if *order == Order::Scatter {
            return Ok(self.scatter_task(id));
        }
        Ok(order.to_task())
    }

    fn scatter_task(&mut self, id: ObjectId) -> Option<TaskNode> {
        let obj = self.objects.get(id)?;
        let map = &self.map;
        let objects = &self.objects;
        let profile = obj.profile;
        let here = obj.tile;
        let area = map_area(map, |tile| {
            let waypoint = Waypoint::ground(tile.coord);
            tile.coord != here
                && is_passable(map, &waypoint, &profile)
                && objects.obstacles_at(&waypoint, id).is_empty()
        });
        let Some(tile) = WeightedRandomFinder::new(area, &mut self.rng, here, 1).next_tile() else {
            warn!(object = id, "nowhere to scatter to");
            return None;
        };
        Some(TaskNode::new(TaskKind::Move(MoveTask::new(tile.coord).with_tolerance(0))))
    }

    /// Ground objects other than `id` on a waypoint.
    #[must_use]
    pub fn find_obstacles(&self, waypoint: &Waypoint, id: ObjectId) -> Vec<ObjectId> {
        self.objects.obstacles_at(waypoint, id)
    }

    /// Take an object out of play, ending its tasks.
    ///
    /// # Errors
    ///
    /// Returns an error if the object does not exist.
    pub fn destroy_object(&mut self, id: ObjectId) -> Result<Vec<GameEvent>> {
        if self.objects.get(id).is_none() {
            return Err(SimError::EntityNotFound(id));
        }
        let mut events = Vec::new();
        self.remove_object(id, &mut events);
        Ok(events)
    }

    /// Calculate a hash of the current simulation state.
    ///
    /// Two simulations with identical state produce identical hashes.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.tick.hash(&mut hasher);
        self.objects.len().hash(&mut hasher);
        for obj in self.objects.iter() {
            obj.hash(&mut hasher);
        }
        self.rng.seed().hash(&mut hasher);
        self.rng.word_pos().hash(&mut hasher);

        hasher.finish()
    }

    /// Serialize the simulation state for replay.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| SimError::InvalidState(format!("Failed to serialize simulation: {}", e)))
    }

    /// Deserialize simulation state from bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data).map_err(|e| {
            SimError::InvalidState(format!("Failed to deserialize simulation: {}", e))
        })
    }
}
