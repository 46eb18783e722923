//! Scenario files run end to end.

use rts_headless::{play_replay, RunConfig, Scenario, ScenarioRunner};
use rts_test_utils::determinism::verify_simulation_determinism;

const BRIDGE_RON: &str = r#"
Scenario(
    name: "Bridge",
    description: "Armour crossing a river on a single bridge",
    map_size: (12, 8),
    seed: 3,
    ticks: 900,
    terrain: [(terrain: Water, from: (6, 0), to: (6, 7))],
    bridges: [(position: (6, 4), deck_level: 1)],
    units: [
        (kind: "tank", owner: 1, position: (1, 1)),
        (kind: "hovercraft", owner: 1, position: (1, 6)),
    ],
    orders: [
        (tick: 0, unit: 0, order: Move(target: (rx: 10, ry: 1))),
        (tick: 0, unit: 1, order: Move(target: (rx: 10, ry: 6))),
        (tick: 5, unit: 1, order: Wait(ticks: 10), queued: true),
    ],
)
"#;

fn bridge_scenario() -> Scenario {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bridge.ron");
    std::fs::write(&path, BRIDGE_RON).unwrap();
    Scenario::load(&path).unwrap()
}

#[test]
fn test_bridge_scenario_arrives() {
    let (summary, _) = ScenarioRunner::new().run(&bridge_scenario()).unwrap();
    assert_eq!(summary.ticks, 900);
    assert_eq!(summary.orders_issued, 3);
    let tiles: Vec<_> = summary.objects.iter().map(|obj| obj.tile).collect();
    assert_eq!(tiles, vec![(10, 1), (10, 6)]);
    assert!(summary.objects.iter().all(|obj| obj.task.is_none()));
}

#[test]
fn test_scenario_start_is_deterministic() {
    let scenario = bridge_scenario();
    assert!(verify_simulation_determinism(|| scenario.build().unwrap().0, 120));
}

#[test]
fn test_recording_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("skirmish.replay");
    let runner = ScenarioRunner::with_config(RunConfig {
        ticks: Some(400),
        record_path: Some(path.clone()),
        ..RunConfig::default()
    });
    let (summary, _) = runner.run(&Scenario::skirmish_1v1()).unwrap();

    let replayed = play_replay(rts_orders::replay::Replay::load(&path).unwrap()).unwrap();
    assert!(replayed.verified);
    assert_eq!(replayed.orders, summary.orders_issued);
    assert_eq!(replayed.actual_hash, summary.final_hash);
}
