//! Headless scenario runner for CI verification.
//!
//! This crate plays order scripts against the deterministic simulation
//! without any presentation layer. This enables:
//!
//! - **CI verification**: Automated runs of movement and collision scenarios
//! - **Determinism checks**: Repeated runs must end on the same state hash
//! - **Replay verification**: Check that replays produce identical results
//!
//! # Output
//!
//! - **stdout**: Run and replay summaries (JSON)
//! - **stderr**: Logs (human-readable)
//!
//! # Example
//!
//! ```bash
//! # Run a built-in scenario and record it
//! cargo run -p rts_headless -- run --scenario crowd_crossing --record crowd.replay
//!
//! # Verify the recording
//! cargo run -p rts_headless -- replay --file crowd.replay --verify
//! ```

pub mod runner;
pub mod scenario;

pub use runner::{play_replay, ReplaySummary, RunConfig, RunError, RunSummary, ScenarioRunner};
pub use scenario::{Scenario, ScenarioError};
