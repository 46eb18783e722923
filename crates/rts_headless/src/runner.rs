//! Scenario execution.
//!
//! A run plays a [`Scenario`] to its tick limit, issuing the scripted
//! orders on their ticks and recording every accepted order into a
//! [`Replay`]. The result is summarized as JSON-friendly structs for
//! stdout.

use std::collections::BTreeMap;
use std::path::PathBuf;

use rts_orders::error::SimError;
use rts_orders::events::GameEvent;
use rts_orders::replay::{Replay, ReplayPlayer};
use rts_orders::simulation::Simulation;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::scenario::{Scenario, ScenarioError};

/// Error type for headless runs.
#[derive(Error, Debug)]
pub enum RunError {
    /// The scenario could not be loaded or built.
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
    /// The simulation failed outside a task.
    #[error(transparent)]
    Simulation(#[from] SimError),
    /// Output could not be encoded.
    #[error("Failed to encode output: {0}")]
    Json(#[from] serde_json::Error),
}

/// Run configuration.
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    /// Override the scenario's tick limit.
    pub ticks: Option<u64>,
    /// Override the scenario's seed.
    pub seed: Option<u64>,
    /// Record a state hash every this many ticks (0 = never).
    pub hash_interval: u64,
    /// Write the replay here when the run ends.
    pub record_path: Option<PathBuf>,
}

/// Final state of one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectReport {
    /// Object id.
    pub id: u64,
    /// Owning player.
    pub owner: u8,
    /// Rules type.
    pub type_id: String,
    /// Final tile (x, y).
    pub tile: (i32, i32),
    /// Remaining hit points.
    pub health: Option<u32>,
    /// Name of the active task, if any.
    pub task: Option<String>,
}

/// Outcome of a scenario run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Scenario name.
    pub scenario: String,
    /// Seed used.
    pub seed: u64,
    /// Ticks simulated.
    pub ticks: u64,
    /// State hash after the last tick.
    pub final_hash: u64,
    /// Orders the simulation accepted.
    pub orders_issued: usize,
    /// Orders the simulation rejected.
    pub orders_rejected: usize,
    /// Event counts by kind.
    pub events: BTreeMap<String, u64>,
    /// `(tick, hash)` samples taken every `hash_interval` ticks.
    pub hash_trace: Vec<(u64, u64)>,
    /// Objects still in play.
    pub objects: Vec<ObjectReport>,
}

/// Result of replaying a recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaySummary {
    /// Scenario the replay was recorded from.
    pub scenario: String,
    /// Seed of the recording.
    pub seed: u64,
    /// Orders in the recording.
    pub orders: usize,
    /// Tick the playback reached.
    pub ticks: u64,
    /// Hash the recording ended with.
    pub expected_hash: u64,
    /// Hash the playback ended with.
    pub actual_hash: u64,
    /// Whether the hashes match.
    pub verified: bool,
}

/// Stable name of an event variant.
#[must_use]
pub fn event_kind(event: &GameEvent) -> &'static str {
    match event {
        GameEvent::Morphed { .. } => "morphed",
        GameEvent::Recycled { .. } => "recycled",
        GameEvent::Captured { .. } => "captured",
        GameEvent::TeleportStarted { .. } => "teleport_started",
        GameEvent::TeleportCompleted { .. } => "teleport_completed",
        GameEvent::WeaponFired { .. } => "weapon_fired",
        GameEvent::TaskAborted { .. } => "task_aborted",
        GameEvent::ObjectDestroyed { .. } => "object_destroyed",
    }
}

fn report_objects(sim: &Simulation) -> Vec<ObjectReport> {
    sim.objects()
        .iter()
        .map(|obj| ObjectReport {
            id: obj.id,
            owner: obj.owner,
            type_id: obj.type_id.clone(),
            tile: (obj.tile.rx, obj.tile.ry),
            health: obj.health.map(|health| health.current),
            task: obj
                .orders
                .current_task()
                .map(|task| task.active_leaf().kind().name().to_string()),
        })
        .collect()
}

/// Plays scenarios.
pub struct ScenarioRunner {
    config: RunConfig,
}

impl ScenarioRunner {
    /// Create a runner with default config.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RunConfig::default())
    }

    /// Create a runner with custom configuration.
    #[must_use]
    pub fn with_config(config: RunConfig) -> Self {
        Self { config }
    }

    /// Play `scenario`, returning the summary and the recording.
    pub fn run(&self, scenario: &Scenario) -> Result<(RunSummary, Replay), RunError> {
        let mut scenario = scenario.clone();
        if let Some(seed) = self.config.seed {
            scenario.seed = seed;
        }
        let ticks = self.config.ticks.unwrap_or(scenario.ticks);
        let (mut sim, ids) = scenario.build()?;
        let mut replay = Replay::new(scenario.name.clone(), &sim)?;

        info!(
            scenario = %scenario.name,
            seed = scenario.seed,
            ticks,
            objects = ids.len(),
            "run started"
        );

        let mut orders_issued = 0;
        let mut orders_rejected = 0;
        let mut events: BTreeMap<String, u64> = BTreeMap::new();
        let mut hash_trace = Vec::new();

        for _ in 0..ticks {
            let now = sim.get_tick();
            for scripted in scenario.orders_at(now) {
                let id = ids[scripted.unit];
                let result = if scripted.queued {
                    sim.queue_order(id, scripted.order.clone())
                } else {
                    sim.issue_order(id, scripted.order.clone())
                };
                match result {
                    Ok(()) => {
                        replay.record_order(now, id, scripted.order.clone(), scripted.queued);
                        orders_issued += 1;
                    }
                    Err(err) => {
                        warn!(tick = now, object = id, error = %err, "scripted order rejected");
                        orders_rejected += 1;
                    }
                }
            }

            for event in sim.tick().events {
                *events.entry(event_kind(&event).to_string()).or_default() += 1;
            }
            let tick = sim.get_tick();
            if self.config.hash_interval > 0 && tick % self.config.hash_interval == 0 {
                hash_trace.push((tick, sim.state_hash()));
            }
        }
        replay.finalize(&sim);

        if let Some(path) = &self.config.record_path {
            replay.save(path)?;
            info!(path = %path.display(), orders = replay.order_count(), "replay written");
        }

        let summary = RunSummary {
            scenario: scenario.name.clone(),
            seed: scenario.seed,
            ticks: sim.get_tick(),
            final_hash: sim.state_hash(),
            orders_issued,
            orders_rejected,
            events,
            hash_trace,
            objects: report_objects(&sim),
        };
        info!(final_hash = format!("{:016x}", summary.final_hash), "run finished");
        Ok((summary, replay))
    }

    /// Run `scenario` `runs` times and collect the final hashes.
    pub fn verify_determinism(&self, scenario: &Scenario, runs: u32) -> Result<Vec<u64>, RunError> {
        (0..runs.max(1))
            .map(|run| {
                let (summary, _) = self.run(scenario)?;
                debug!(run, hash = summary.final_hash, "verification run");
                Ok(summary.final_hash)
            })
            .collect()
    }
}

impl Default for ScenarioRunner {
    fn default() -> Self {
        Self::new()
    }
}

/// Play a replay to its end and compare hashes.
pub fn play_replay(replay: Replay) -> Result<ReplaySummary, RunError> {
    let mut player = ReplayPlayer::new(replay)?;
    while player.advance() {}

    let replay = player.replay();
    let actual_hash = player.simulation().state_hash();
    let summary = ReplaySummary {
        scenario: replay.scenario_id.clone(),
        seed: replay.seed,
        orders: replay.order_count(),
        ticks: player.current_tick(),
        expected_hash: replay.final_hash,
        actual_hash,
        verified: actual_hash == replay.final_hash,
    };
    if !summary.verified {
        warn!(
            expected = format!("{:016x}", summary.expected_hash),
            actual = format!("{:016x}", summary.actual_hash),
            "replay desynced"
        );
    }
    Ok(summary)
}
