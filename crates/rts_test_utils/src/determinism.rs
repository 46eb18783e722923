//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the simulation produces identical
//! results given identical inputs.
//!
//! # Testing Strategy
//!
//! Order execution must be fully deterministic for lockstep play and
//! replays. Sources of non-determinism guarded against:
//!
//! - **Floating-point math**: positions and speeds use
//!   [`rts_orders::math::Fixed`] throughout.
//!
//! - **HashMap iteration order**: objects tick in ascending id order and
//!   every collection the simulation iterates is ordered.
//!
//! - **System randomness**: scatter and random tile search draw from the
//!   seeded simulation generator only.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: individual tasks and locomotors
//! 2. **Property tests**: random order scripts still replay identically
//! 3. **Integration tests**: full scenarios are reproducible
//! 4. **Parallel tests**: simulations on separate threads all match

use std::thread;

use rts_orders::order::Order;
use rts_orders::simulation::Simulation;
use tracing::debug;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the simulation produced different hashes across runs.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// One scripted order: issued to the `unit`-th spawned object before `tick`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedOrder {
    /// Tick before which the order is issued.
    pub tick: u64,
    /// Index into the list of object ids returned by the setup.
    pub unit: usize,
    /// The order.
    pub order: Order,
    /// Queue behind existing tasks instead of replacing them.
    pub queued: bool,
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the simulation
/// * `ticks` - Number of ticks to simulate per run
/// * `setup` - Function to create initial state
/// * `step` - Function to advance state by one tick
/// * `hash` - Function to compute state hash
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();
        for _ in 0..ticks {
            step(&mut state);
        }
        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Run a scripted game `runs` times and compare final hashes.
///
/// `setup` returns the simulation and the ids the script's `unit` indices
/// refer to. Orders naming a missing index or a dead object are skipped.
pub fn verify_script_determinism<F>(
    runs: usize,
    ticks: u64,
    setup: F,
    script: &[ScriptedOrder],
) -> DeterminismResult
where
    F: Fn() -> (Simulation, Vec<u64>),
{
    verify_determinism(
        runs,
        1,
        || {
            let (mut sim, ids) = setup();
            run_script(&mut sim, &ids, script, ticks);
            sim
        },
        |_| {},
        Simulation::state_hash,
    )
}

/// Play `script` against `sim` for `ticks` ticks, returning per-tick hashes.
///
/// Orders naming an unknown spawn index or rejected by the simulation are
/// skipped and logged at debug level.
pub fn run_script(
    sim: &mut Simulation,
    ids: &[u64],
    script: &[ScriptedOrder],
    ticks: u64,
) -> Vec<u64> {
    let mut hashes = Vec::with_capacity(ticks as usize);
    for _ in 0..ticks {
        let now = sim.get_tick();
        for scripted in script.iter().filter(|s| s.tick == now) {
            let Some(&id) = ids.get(scripted.unit) else {
                debug!(tick = now, unit = scripted.unit, "scripted order names no unit");
                continue;
            };
            let result = if scripted.queued {
                sim.queue_order(id, scripted.order.clone())
            } else {
                sim.issue_order(id, scripted.order.clone())
            };
            if let Err(err) = result {
                debug!(
                    tick = now,
                    object = id,
                    order = ?scripted.order,
                    error = %err,
                    "scripted order rejected"
                );
            }
        }
        sim.tick();
        hashes.push(sim.state_hash());
    }
    hashes
}

/// Simplified determinism verification for [`Simulation`].
///
/// Runs the simulation twice with identical setup and verifies the final
/// state hashes match exactly.
pub fn verify_simulation_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> Simulation,
{
    let result = verify_determinism(
        2,
        num_ticks,
        &setup_fn,
        |sim| {
            sim.tick();
        },
        |sim| sim.state_hash(),
    );
    result.is_deterministic
}

/// Run N simulations on scoped threads and collect final hashes.
///
/// Catches non-determinism that only shows up under thread scheduling or
/// memory layout differences.
pub fn run_parallel_simulations<F>(setup_fn: F, num_sims: usize, num_ticks: u64) -> Vec<u64>
where
    F: Fn() -> Simulation + Sync,
{
    thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut sim = setup_fn();
                    for _ in 0..num_ticks {
                        sim.tick();
                    }
                    sim.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("simulation thread panicked"))
            .collect()
    })
}

/// Compare two simulation runs tick-by-tick, finding first divergence.
///
/// `None` if the runs agree throughout, `Some(tick)` at the first tick
/// whose hashes differ.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64) -> Option<u64>
where
    F: Fn() -> Simulation,
{
    let mut sim1 = setup_fn();
    let mut sim2 = setup_fn();

    if sim1.state_hash() != sim2.state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        sim1.tick();
        sim2.tick();

        if sim1.state_hash() != sim2.state_hash() {
            return Some(tick);
        }
    }

    None
}

/// Verify that a serialization round-trip mid-game changes nothing.
///
/// The restored copy must match the original both right away and after
/// `continue_ticks` further ticks.
pub fn verify_serialization_determinism<F>(setup_fn: F, num_ticks: u64, continue_ticks: u64) -> bool
where
    F: Fn() -> Simulation,
{
    let mut sim = setup_fn();
    for _ in 0..num_ticks {
        sim.tick();
    }

    let Ok(bytes) = sim.serialize() else {
        return false;
    };
    let Ok(mut restored) = Simulation::deserialize(&bytes) else {
        return false;
    };
    if sim.state_hash() != restored.state_hash() {
        return false;
    }

    for _ in 0..continue_ticks {
        sim.tick();
        restored.tick();
    }
    sim.state_hash() == restored.state_hash()
}

/// Proptest strategies for determinism testing.
///
/// These generate random but reproducible order scripts and map layouts.
pub mod strategies {
    use proptest::prelude::*;
    use rts_orders::map::{TerrainClass, TileCoord};
    use rts_orders::order::Order;

    use super::ScriptedOrder;

    /// Tile inside a `size`×`size` map.
    pub fn arb_tile(size: i32) -> impl Strategy<Value = TileCoord> {
        (0..size, 0..size).prop_map(|(rx, ry)| TileCoord::new(rx, ry))
    }

    /// Terrain a test map may contain.
    pub fn arb_terrain() -> impl Strategy<Value = TerrainClass> {
        prop_oneof![
            6 => Just(TerrainClass::Clear),
            1 => Just(TerrainClass::Rough),
            1 => Just(TerrainClass::Rock),
            1 => Just(TerrainClass::Water),
        ]
    }

    /// Any order that does not name another object.
    pub fn arb_positional_order(size: i32) -> impl Strategy<Value = Order> {
        prop_oneof![
            arb_tile(size).prop_map(|target| Order::Move { target }),
            arb_tile(size).prop_map(|target| Order::AttackMove { target }),
            (1u32..30).prop_map(|ticks| Order::Wait { ticks }),
            Just(Order::Stop),
            Just(Order::Scatter),
        ]
    }

    /// Any order, referring to objects by id in `1..=max_id`.
    pub fn arb_order(size: i32, max_id: u64) -> impl Strategy<Value = Order> {
        prop_oneof![
            4 => arb_positional_order(size),
            1 => (1..=max_id).prop_map(|target| Order::Attack { target }),
            1 => (1..=max_id).prop_map(|target| Order::Capture { target }),
            1 => Just(Order::Deploy),
        ]
    }

    /// A script of orders for `units` objects over `ticks` ticks.
    pub fn arb_script(
        size: i32,
        units: usize,
        ticks: u64,
        max_len: usize,
    ) -> impl Strategy<Value = Vec<ScriptedOrder>> {
        proptest::collection::vec(
            (0..ticks, 0..units, arb_order(size, units as u64), any::<bool>()).prop_map(
                |(tick, unit, order, queued)| ScriptedOrder {
                    tick,
                    unit,
                    order,
                    queued,
                },
            ),
            0..max_len,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{open_field, skirmish};
    use proptest::prelude::*;
    use rts_orders::map::TileCoord;

    #[test]
    fn test_empty_simulation_deterministic() {
        assert!(verify_simulation_determinism(|| open_field(8, 1), 50));
    }

    #[test]
    fn test_skirmish_deterministic() {
        let (sim, ids) = skirmish(3);
        let script: Vec<ScriptedOrder> = ids
            .iter()
            .enumerate()
            .map(|(unit, _)| ScriptedOrder {
                tick: unit as u64,
                unit,
                order: Order::AttackMove {
                    target: TileCoord::new(12, 12),
                },
                queued: false,
            })
            .collect();
        let result = verify_script_determinism(3, 200, || (sim.clone(), ids.clone()), &script);
        result.assert_deterministic();
    }

    #[test]
    fn test_run_script_skips_unknown_units() {
        let order = |unit| ScriptedOrder {
            tick: 0,
            unit,
            order: Order::Move {
                target: TileCoord::new(10, 10),
            },
            queued: false,
        };
        let (mut plain, ids) = skirmish(6);
        let expected = run_script(&mut plain, &ids, &[order(0)], 40);

        let (mut noisy, ids) = skirmish(6);
        let hashes = run_script(&mut noisy, &ids, &[order(0), order(99)], 40);
        assert_eq!(hashes.len(), 40);
        assert_eq!(hashes, expected);
    }

    #[test]
    fn test_parallel_runs_match() {
        let hashes = run_parallel_simulations(|| skirmish(5).0, 4, 100);
        assert!(hashes.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_no_divergence() {
        assert_eq!(find_first_divergence(|| skirmish(2).0, 100), None);
    }

    #[test]
    fn test_serialization_mid_game() {
        let setup = || {
            let (mut sim, ids) = skirmish(4);
            for &id in &ids {
                sim.issue_order(id, Order::Scatter).unwrap();
            }
            sim
        };
        assert!(verify_serialization_determinism(setup, 20, 50));
    }

    #[test]
    fn test_seed_changes_scatter() {
        let scatter = |seed| {
            let (mut sim, ids) = skirmish(seed);
            for &id in &ids {
                sim.issue_order(id, Order::Scatter).unwrap();
            }
            for _ in 0..60 {
                sim.tick();
            }
            sim
        };
        assert_eq!(scatter(1).state_hash(), scatter(1).state_hash());
        let tiles = |sim: &Simulation| sim.objects().iter().map(|o| o.tile).collect::<Vec<_>>();
        let distinct = (2..8).any(|seed| tiles(&scatter(seed)) != tiles(&scatter(1)));
        assert!(distinct);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_random_scripts_replay_identically(
            seed in any::<u64>(),
            script in strategies::arb_script(16, 4, 60, 12),
        ) {
            let setup = || skirmish(seed);
            let result = verify_script_determinism(2, 120, setup, &script);
            prop_assert!(result.is_deterministic, "hashes: {:?}", result.hashes);
        }
    }
}
