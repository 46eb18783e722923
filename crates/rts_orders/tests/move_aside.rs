//! Collision arbitration between friendly units.

use std::collections::BTreeSet;

use rts_orders::map::{Direction, TerrainClass, TileCoord, TileMap};
use rts_orders::object::ObjectId;
use rts_orders::order::Order;
use rts_orders::rules::Rules;
use rts_orders::simulation::Simulation;
use rts_orders::task::{MoveAsideTask, TaskKind, TaskNode};
use rts_test_utils::fixtures::{open_field, packed_block};

fn push_aside(sim: &mut Simulation, id: ObjectId, incoming: Direction) {
    sim.object_mut(id)
        .unwrap()
        .orders
        .add_task(TaskNode::new(TaskKind::MoveAside(MoveAsideTask::new(incoming))));
}

fn all_idle(sim: &Simulation, ids: &[ObjectId]) -> bool {
    ids.iter().all(|id| sim.object(*id).unwrap().orders.is_idle())
}

#[test]
fn test_steps_onto_only_free_neighbour() {
    let mut map = TileMap::new(3, 3);
    for ry in 0..3 {
        for rx in 0..3 {
            let coord = TileCoord::new(rx, ry);
            if coord != TileCoord::new(1, 1) && coord != TileCoord::new(1, 0) {
                map.set_terrain(coord, TerrainClass::Rock);
            }
        }
    }
    let mut sim = Simulation::new(map, Rules::default(), 0);
    let id = sim.spawn_unit(1, "infantry", TileCoord::new(1, 1)).unwrap();
    push_aside(&mut sim, id, Direction::East);

    sim.tick();
    let root = sim.object(id).unwrap().orders.current_task().unwrap();
    assert!(matches!(root.kind(), TaskKind::MoveAside(_)));
    let [child] = root.children() else {
        panic!("expected one relocation child");
    };
    let TaskKind::Move(relocate) = child.kind() else {
        panic!("relocation is not a move");
    };
    assert_eq!(relocate.destination(), Some(TileCoord::new(1, 0)));
    assert_eq!(relocate.tolerance(), 0);

    for _ in 0..38 {
        sim.tick();
    }
    let obj = sim.object(id).unwrap();
    assert_eq!(obj.tile, TileCoord::new(1, 0));
    assert!(obj.orders.is_idle());
}

#[test]
fn test_packed_ring_times_out_on_fortieth_tick() {
    let mut sim = Simulation::new(TileMap::new(3, 3), Rules::default(), 0);
    let ids = packed_block(&mut sim, 1, TileCoord::new(0, 0), 3, 3);
    for &id in &ids {
        push_aside(&mut sim, id, Direction::East);
    }

    for _ in 0..39 {
        sim.tick();
    }
    assert!(ids.iter().all(|id| sim.object(*id).unwrap().orders.is_moving_aside()));

    sim.tick();
    assert!(all_idle(&sim, &ids));
    let tiles: BTreeSet<_> = ids.iter().map(|id| sim.object(*id).unwrap().tile).collect();
    assert_eq!(tiles.len(), 9);
}

#[test]
fn test_corridor_chain_push() {
    let mut sim = Simulation::new(TileMap::new(6, 1), Rules::default(), 0);
    let pusher = sim.spawn_unit(1, "infantry", TileCoord::new(0, 0)).unwrap();
    let first = sim.spawn_unit(1, "infantry", TileCoord::new(1, 0)).unwrap();
    let second = sim.spawn_unit(1, "infantry", TileCoord::new(2, 0)).unwrap();
    sim.issue_order(pusher, Order::Move { target: TileCoord::new(1, 0) }).unwrap();

    sim.tick();
    assert!(sim.object(first).unwrap().orders.is_moving_aside());
    sim.tick();
    let aside = sim.object(first).unwrap().orders.current_task().unwrap();
    assert!(matches!(aside.kind(), TaskKind::MoveAside(task) if task.has_chain_pushed()));
    assert!(sim.object(second).unwrap().orders.is_moving_aside());

    for _ in 0..200 {
        sim.tick();
    }
    assert!(all_idle(&sim, &[pusher, first, second]));
    assert_eq!(sim.object(second).unwrap().tile, TileCoord::new(3, 0));
}

#[test]
fn test_mutual_blockers_give_up() {
    let mut sim = Simulation::new(TileMap::new(2, 2), Rules::default(), 0);
    let ids = packed_block(&mut sim, 1, TileCoord::new(0, 0), 2, 2);
    // Rotate clockwise: every target is held by another mover.
    let targets = [(1, 0), (1, 1), (0, 0), (0, 1)];
    for (&id, (rx, ry)) in ids.iter().zip(targets) {
        sim.issue_order(id, Order::Move { target: TileCoord::new(rx, ry) }).unwrap();
    }

    let mut settled = None;
    for tick in 0..200 {
        sim.tick();
        assert!(ids.iter().all(|id| !sim.object(*id).unwrap().orders.is_moving_aside()));
        if all_idle(&sim, &ids) {
            settled = Some(tick);
            break;
        }
    }
    assert!(settled.is_some());
    let tiles: BTreeSet<_> = ids.iter().map(|id| sim.object(*id).unwrap().tile).collect();
    assert_eq!(tiles.len(), 4);
}

#[test]
fn test_enemy_blocker_is_left_alone() {
    let mut sim = Simulation::new(TileMap::new(3, 1), Rules::default(), 0);
    let mover = sim.spawn_unit(1, "engineer", TileCoord::new(0, 0)).unwrap();
    let enemy = sim.spawn_unit(2, "engineer", TileCoord::new(1, 0)).unwrap();
    sim.issue_order(mover, Order::Move { target: TileCoord::new(2, 0) }).unwrap();

    for _ in 0..100 {
        sim.tick();
        assert!(sim.object(enemy).unwrap().orders.is_idle());
    }
    assert_eq!(sim.object(enemy).unwrap().tile, TileCoord::new(1, 0));
    assert_eq!(sim.object(mover).unwrap().tile, TileCoord::new(0, 0));
}

#[test]
fn test_vehicle_passes_idle_infantry() {
    let mut sim = open_field(8, 0);
    let tank = sim.spawn_unit(1, "tank", TileCoord::new(1, 3)).unwrap();
    let soldier = sim.spawn_unit(1, "infantry", TileCoord::new(3, 3)).unwrap();
    sim.issue_order(tank, Order::Move { target: TileCoord::new(6, 3) }).unwrap();

    let mut stepped_aside = false;
    for _ in 0..800 {
        sim.tick();
        stepped_aside |= sim.object(soldier).unwrap().orders.is_moving_aside();
    }
    assert!(stepped_aside);
    assert_eq!(sim.object(tank).unwrap().tile, TileCoord::new(6, 3));
    assert_ne!(sim.object(soldier).unwrap().tile, TileCoord::new(6, 3));
}
