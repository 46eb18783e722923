//! # RTS Orders
//!
//! Deterministic order execution and movement for a tile-based RTS.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No file or network IO outside explicit load/save calls
//! - No system randomness
//! - No floating-point math (uses fixed-point)
//!
//! Every object carries a queue of hierarchical task trees. Tasks move
//! objects through per-class locomotors, find tiles with one-shot search
//! cursors, and resolve collisions by asking friendly blockers to step
//! aside. Replaying the same orders from the same state reproduces the
//! same state hash on every tick.
//!
//! ## Crate Structure
//!
//! - [`task`] - Task trees, per-object order queue and the built-in tasks
//! - [`locomotor`] - Per-movement-class physics
//! - [`tile_search`] - Radial, directional, flood-fill and random tile finders
//! - [`movement`] - Step legality and path planning
//! - [`simulation`] - Core simulation loop
//! - [`replay`] - Order recording and playback
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod combat;
pub mod error;
pub mod events;
pub mod locomotor;
pub mod map;
pub mod math;
pub mod movement;
pub mod object;
pub mod order;
pub mod replay;
pub mod rng;
pub mod rules;
pub mod simulation;
pub mod task;
pub mod tile_search;

pub use simulation::Simulation;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{Result, SimError};
    pub use crate::events::{GameEvent, TickEvents};
    pub use crate::locomotor::{Locomotor, LocomotorClass};
    pub use crate::map::{Direction, TerrainClass, TileCoord, TileMap, TileRect, Waypoint};
    pub use crate::math::{Fixed, Vec3Fixed};
    pub use crate::object::{GameObject, ObjectId, ObjectStorage, PlayerId};
    pub use crate::order::Order;
    pub use crate::replay::{Replay, ReplayPlayer};
    pub use crate::rules::Rules;
    pub use crate::simulation::Simulation;
    pub use crate::task::{OrderDispatch, Task, TaskKind, TaskNode, TaskState};
    pub use crate::tile_search::TileFinder;
}
