//! Movement legality and path planning.

pub mod pathfinding;
pub mod position;

pub use pathfinding::find_path;
pub use position::{can_step, is_passable, resolve_bridge_level, step_direction, tile_speed};
