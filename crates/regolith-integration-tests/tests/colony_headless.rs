//! Headless end-to-end colony scenarios: seed deployment, connectivity,
//! robot task side effects, and the factory economy, driven only through
//! the public `Colony` surface.

use regolith_core::colony::{Colony, ColonyConfig, PlacementError};
use regolith_core::connectivity::disconnect_all_and_recompute;
use regolith_core::factory::{FactoryEvent, IdleReason};
use regolith_core::registry::StructureRegistry;
use regolith_core::resources::ResourceCost;
use regolith_core::robot::{DigDirection, RobotType};
use regolith_core::site::SiteMap;
use regolith_core::structure::{
    ProductType, Structure, StructureClass, StructureKind, StructureState, TubeDir,
};
use regolith_core::test_utils::*;
use regolith_core::tile::{MineYield, Terrain, TileGrid, TilePos};

// ===========================================================================
// Seed deployment
// ===========================================================================

#[test]
fn seed_lander_deploys_a_working_colony() {
    let colony = deployed_colony();

    // Nine structures: five tubes, power, command center, factory, warehouse.
    assert_eq!(colony.registry().count(), 9);
    let (_, cc_pos) = colony.registry().command_center().unwrap();
    assert_eq!(cc_pos, TilePos::new(9, 7, 0));

    // Everything in the ring is reachable from the Command Center.
    for (_, structure) in colony.registry().iter() {
        assert!(structure.connected, "{} disconnected", structure.kind.name());
    }

    // Power plus the Command Center's own generator.
    assert_eq!(colony.registry().total_energy_production(), 120);
    // Base storage plus the seed warehouse.
    assert_eq!(colony.pool().capacity(), 350);
    // Starting cargo and one robot of each type.
    assert_eq!(colony.pool().current_level(), 160);
    assert_eq!(colony.pool().food, 125);
    for rtype in [RobotType::Digger, RobotType::Dozer, RobotType::Miner] {
        assert_eq!(colony.roster().available_count(rtype), 1);
    }
}

#[test]
fn seed_lander_deploys_only_once() {
    let mut colony = deployed_colony();
    assert_eq!(
        colony.place_seed_lander(16, 16),
        Err(PlacementError::SeedAlreadyDeployed)
    );
}

#[test]
fn obstructed_landing_site_is_rejected_without_side_effects() {
    let site = flat_site().with_mine(8, 8, MineYield::Low);
    let mut colony = Colony::new(site, ColonyConfig::default(), Default::default());
    assert_eq!(
        colony.place_seed_lander(8, 8),
        Err(PlacementError::UnsuitableLandingSite)
    );
    assert_eq!(colony.registry().count(), 0);
    assert_eq!(colony.pool().current_level(), 0);
}

#[test]
fn landing_too_close_to_the_edge_is_rejected() {
    let mut colony = Colony::new(flat_site(), ColonyConfig::default(), Default::default());
    assert_eq!(
        colony.place_seed_lander(1, 8),
        Err(PlacementError::TooCloseToMapEdge)
    );
}

// ===========================================================================
// Connectivity scenario from the registry surface
// ===========================================================================

/// Command Center at (5,5), tubes at (5,4) and (6,5): after a recompute the
/// tube tiles are connected and a bare tile like (4,4) is not.
#[test]
fn command_center_and_two_tubes_connect() {
    let site = SiteMap::flat("cc_test", 12, 12, 0, Terrain::Clear, Terrain::Rough);
    let mut grid = TileGrid::from_site(&site);
    let mut registry = StructureRegistry::new();

    registry
        .add(
            Structure::new_operational(StructureKind::CommandCenter),
            TilePos::new(5, 5, 0),
            &mut grid,
        )
        .unwrap();
    for pos in [TilePos::new(5, 4, 0), TilePos::new(6, 5, 0)] {
        registry
            .add(
                Structure::new_operational(StructureKind::Tube(TubeDir::Intersection)),
                pos,
                &mut grid,
            )
            .unwrap();
    }

    disconnect_all_and_recompute(&mut registry, &mut grid);

    assert!(grid.get(TilePos::new(6, 5, 0)).unwrap().connected);
    assert!(grid.get(TilePos::new(5, 4, 0)).unwrap().connected);
    assert!(!grid.get(TilePos::new(4, 4, 0)).unwrap().connected);
}

// ===========================================================================
// Tube and structure placement through the colony surface
// ===========================================================================

#[test]
fn bulldoze_then_extend_a_tube() {
    let mut colony = deployed_colony();
    let target = TilePos::new(10, 7, 0);

    // Raw ground first refuses the tube, then a dozer clears it.
    assert_eq!(
        colony.place_tube(target, TubeDir::Intersection),
        Err(PlacementError::NotBulldozed)
    );
    colony.bulldoze(target).unwrap();
    assert_eq!(colony.roster().available_count(RobotType::Dozer), 0);

    // Clear terrain takes one dozer turn.
    let report = colony.advance_turn();
    assert_eq!(report.robot_completions.len(), 1);
    assert_eq!(colony.roster().available_count(RobotType::Dozer), 1);

    colony.place_tube(target, TubeDir::Intersection).unwrap();
    assert!(colony.grid().get(target).unwrap().connected);
}

#[test]
fn tube_needs_a_compatible_neighbor() {
    let mut colony = deployed_colony();
    // Nothing adjacent out at (14,14) even once dozed.
    let lonely = TilePos::new(14, 14, 0);
    colony.bulldoze(lonely).unwrap();
    let _ = colony.advance_turn();
    assert_eq!(
        colony.place_tube(lonely, TubeDir::Intersection),
        Err(PlacementError::NoTubeConnection)
    );
}

#[test]
fn structure_placement_charges_the_bill_exactly_once() {
    let mut colony = deployed_colony();
    grant(&mut colony, ResourceCost::new(100, 50, 100, 50));

    // East of the CC: doze, then connect a tube, then hang a power station
    // off it.
    let tube_pos = TilePos::new(10, 7, 0);
    colony.bulldoze(tube_pos).unwrap();
    let _ = colony.advance_turn();
    colony.place_tube(tube_pos, TubeDir::Intersection).unwrap();

    let station_pos = TilePos::new(11, 7, 0);
    colony.bulldoze(station_pos).unwrap();
    let _ = colony.advance_turn();

    let before = colony.pool().current_level();
    let cost = StructureKind::PowerStation.cost();
    let id = colony
        .place_structure(StructureKind::PowerStation, station_pos)
        .unwrap();
    assert_eq!(colony.pool().current_level(), before - cost.total());
    assert_eq!(
        colony.registry().get(id).unwrap().state,
        StructureState::UnderConstruction
    );

    // Construction finishes after three turns and the new station powers up.
    for _ in 0..StructureKind::PowerStation.build_turns() {
        let _ = colony.advance_turn();
    }
    assert!(colony.registry().get(id).unwrap().is_operational());
    assert_eq!(colony.registry().total_energy_production(), 220);
}

#[test]
fn insufficient_resources_reject_placement_without_mutation() {
    let mut colony = deployed_colony();
    drain(&mut colony);

    let tube_pos = TilePos::new(10, 7, 0);
    colony.bulldoze(tube_pos).unwrap();
    let _ = colony.advance_turn();
    let count = colony.registry().count();
    assert_eq!(
        colony.place_tube(tube_pos, TubeDir::Intersection),
        Err(PlacementError::InsufficientResources)
    );
    assert_eq!(colony.registry().count(), count);
}

#[test]
fn bulldozing_a_structure_refunds_and_disconnects() {
    let mut colony = deployed_colony();
    grant(&mut colony, ResourceCost::new(50, 0, 50, 0));

    // Tube chain east: (10,7) then (11,7).
    for x in [10, 11] {
        let pos = TilePos::new(x, 7, 0);
        colony.bulldoze(pos).unwrap();
        let _ = colony.advance_turn();
        colony.place_tube(pos, TubeDir::Intersection).unwrap();
    }
    let far = TilePos::new(11, 7, 0);
    assert!(colony.grid().get(far).unwrap().connected);

    // Rip out the middle segment.
    let near = TilePos::new(10, 7, 0);
    let level_before = colony.pool().current_level();
    colony.bulldoze(near).unwrap();
    let refund = StructureKind::Tube(TubeDir::Intersection).recycle_value();
    assert_eq!(colony.pool().current_level(), level_before + refund.total());
    assert!(colony.grid().get(near).unwrap().is_empty());
    assert!(!colony.grid().get(far).unwrap().connected);
}

#[test]
fn the_command_center_refuses_the_dozer() {
    let mut colony = deployed_colony();
    let (_, cc_pos) = colony.registry().command_center().unwrap();
    assert_eq!(
        colony.bulldoze(cc_pos),
        Err(PlacementError::CannotBulldozeCommandCenter)
    );
    assert!(colony.registry().command_center().is_some());
}

// ===========================================================================
// Digger scenario
// ===========================================================================

/// A digger with a 10-turn down task at (10,10): both depth levels end up
/// excavated, an air shaft pair bridges them, and the robot returns to the
/// idle pool.
#[test]
fn digger_down_task_opens_the_underground() {
    let mut colony = deployed_colony();
    let dig = TilePos::new(10, 10, 0);
    colony.place_digger(dig, DigDirection::Down).unwrap();
    assert_eq!(colony.roster().available_count(RobotType::Digger), 0);

    for turn in 0..10 {
        let report = colony.advance_turn();
        if turn < 9 {
            assert!(report.robot_completions.is_empty(), "finished early");
        } else {
            assert_eq!(report.robot_completions.len(), 1);
        }
    }

    let below = TilePos::new(10, 10, 1);
    assert!(colony.grid().get(dig).unwrap().excavated);
    assert!(colony.grid().get(below).unwrap().excavated);

    // The air shaft pair bridges the two depths.
    let shafts: Vec<_> = colony
        .registry()
        .by_class(StructureClass::Connector)
        .into_iter()
        .filter(|id| {
            matches!(
                colony.registry().get(*id).unwrap().kind,
                StructureKind::AirShaft { .. }
            )
        })
        .collect();
    assert_eq!(shafts.len(), 2);
    let mut shaft_positions: Vec<_> = shafts
        .iter()
        .map(|id| colony.registry().position(*id).unwrap())
        .collect();
    shaft_positions.sort();
    assert_eq!(shaft_positions, vec![dig, below]);

    // The 3x3 neighborhood one level down is open.
    for dx in -1..=1 {
        for dy in -1..=1 {
            let pos = TilePos::new(10 + dx, 10 + dy, 1);
            assert!(colony.grid().get(pos).unwrap().excavated, "{pos:?} sealed");
        }
    }

    assert_eq!(colony.roster().available_count(RobotType::Digger), 1);
}

#[test]
fn digger_respects_the_map_edge_and_excavation_rules() {
    let mut colony = deployed_colony();
    assert_eq!(
        colony.place_digger(TilePos::new(1, 10, 0), DigDirection::Down),
        Err(PlacementError::TooCloseToMapEdge)
    );
    assert_eq!(
        colony.place_digger(TilePos::new(10, 10, 1), DigDirection::East),
        Err(PlacementError::NotExcavated)
    );
    assert_eq!(
        colony.place_digger(TilePos::new(10, 10, 0), DigDirection::East),
        Err(PlacementError::SurfaceMustDigDown)
    );
}

#[test]
fn underground_digger_extends_a_level_sideways() {
    let mut colony = deployed_colony();
    colony
        .place_digger(TilePos::new(10, 10, 0), DigDirection::Down)
        .unwrap();
    for _ in 0..10 {
        let _ = colony.advance_turn();
    }

    // Now dig east from the opened pocket below.
    colony
        .place_digger(TilePos::new(11, 10, 1), DigDirection::East)
        .unwrap();
    for _ in 0..10 {
        let _ = colony.advance_turn();
    }
    // Origin shifts one tile east; its whole 3x3 ring is open.
    for dy in -1..=1 {
        for dx in -1..=1 {
            let pos = TilePos::new(12 + dx, 10 + dy, 1);
            assert!(colony.grid().get(pos).unwrap().excavated);
        }
    }
}

// ===========================================================================
// Miner scenario
// ===========================================================================

#[test]
fn miner_raises_a_facility_and_the_mine_feeds_the_pool() {
    let mut colony = deployed_colony_on(mined_site());
    let deposit = TilePos::new(16, 16, 0);

    colony.place_miner(deposit).unwrap();
    for _ in 0..ColonyConfig::default().miner_task_turns {
        let _ = colony.advance_turn();
    }

    // Facility on the deposit, shaft below, both tiles open.
    let tile = colony.grid().get(deposit).unwrap();
    assert!(tile.mine.unwrap().active);
    let facility = tile.occupant.structure().unwrap();
    assert!(matches!(
        colony.registry().get(facility).unwrap().kind,
        StructureKind::MineFacility {
            grade: MineYield::Medium
        }
    ));
    let below = colony.grid().get(TilePos::new(16, 16, 1)).unwrap();
    assert!(below.excavated);
    assert!(matches!(
        colony
            .registry()
            .get(below.occupant.structure().unwrap())
            .unwrap()
            .kind,
        StructureKind::MineShaft
    ));

    // An isolated facility extracts nothing; connect it by tube and the
    // pool starts filling.
    drain(&mut colony);
    let _ = colony.advance_turn();
    assert_eq!(colony.pool().current_level(), 0);
}

#[test]
fn miner_needs_a_deposit() {
    let mut colony = deployed_colony();
    assert_eq!(
        colony.place_miner(TilePos::new(12, 12, 0)),
        Err(PlacementError::NoMineDeposit)
    );
}

// ===========================================================================
// Factory economy
// ===========================================================================

#[test]
fn factory_idles_until_materials_arrive() {
    let mut colony = deployed_colony();
    drain(&mut colony);

    let factory = colony.registry().by_class(StructureClass::Factory)[0];
    colony
        .set_factory_product(factory, Some(ProductType::Dozer))
        .unwrap();

    let report = colony.advance_turn();
    assert!(report.factory_events.iter().any(|e| matches!(
        e,
        FactoryEvent::WentIdle {
            reason: IdleReason::InsufficientResources,
            ..
        }
    )));
    assert!(colony.registry().get(factory).unwrap().is_idle());

    // Materials arrive; the next tick resumes and starts paying per cycle.
    grant(&mut colony, ResourceCost::new(40, 10, 20, 5));
    let level = colony.pool().current_level();
    let report = colony.advance_turn();
    assert!(report
        .factory_events
        .iter()
        .any(|e| matches!(e, FactoryEvent::Resumed { .. })));
    assert!(colony.registry().get(factory).unwrap().is_operational());
    assert_eq!(
        colony.pool().current_level(),
        level - ProductType::Dozer.cost().total()
    );
}

#[test]
fn finished_robots_join_the_roster() {
    let mut colony = deployed_colony();
    grant(&mut colony, ResourceCost::new(60, 20, 40, 10));

    let factory = colony.registry().by_class(StructureClass::Factory)[0];
    colony
        .set_factory_product(factory, Some(ProductType::Digger))
        .unwrap();

    let mut delivered = false;
    for _ in 0..ProductType::Digger.turns_to_build() + 1 {
        let report = colony.advance_turn();
        delivered |= report.factory_events.iter().any(|e| {
            matches!(
                e,
                FactoryEvent::ProductComplete {
                    product: ProductType::Digger,
                    ..
                }
            )
        });
    }
    assert!(delivered);
    assert_eq!(colony.roster().available_count(RobotType::Digger), 2);
}
