//! Regolith Core -- the simulation engine for a turn-based colony game.
//!
//! This crate provides the layered tile grid, the structure registry and its
//! tube-connectivity graph, the robot task lifecycle, factory production,
//! the resource economy, and versioned binary snapshots of the whole colony.
//! Rendering, input, UI, and audio live elsewhere; the core is headless and
//! fully deterministic.
//!
//! # Turn Pipeline
//!
//! Each call to [`colony::Colony::advance_turn`] runs a fixed order:
//!
//! 1. **Structures** -- construction countdowns, aging, mine extraction,
//!    food production, energy and storage recomputes.
//! 2. **Robots** -- every active task counts down one turn.
//! 3. **Robot completions** -- dozer/digger/miner side effects apply; a
//!    digger finishing a down dig changes connectivity consumed later in
//!    this same turn.
//! 4. **Factories** -- production cycles advance, paying each bill of
//!    materials atomically when a cycle starts.
//! 5. **Factory dispatch** -- finished robots enter the roster, goods land
//!    in warehouses; starved factories idle until a destination appears.
//! 6. **Bookkeeping** -- the turn counter increments and a
//!    [`colony::TurnReport`] of plain event values is returned.
//!
//! # Connectivity
//!
//! Reachability from the Command Center gates every producer. The graph is
//! implicit in the tiles; after any structural edit the whole map is
//! re-walked by [`connectivity::disconnect_all_and_recompute`].
//!
//! # Key Types
//!
//! - [`colony::Colony`] -- orchestrator owning all simulation state.
//! - [`tile::TileGrid`] -- fixed stack of 2D tile layers.
//! - [`registry::StructureRegistry`] -- arena ownership of structures.
//! - [`robot::RobotRoster`] -- arena ownership of robots, idle pools.
//! - [`structure::StructureKind`] -- the closed sum of buildable kinds.
//! - [`resources::ResourcePool`] -- clamped, all-or-nothing arithmetic.
//! - [`serialize`] -- versioned snapshots via bitcode.

pub mod colony;
pub mod connectivity;
pub mod factory;
pub mod id;
pub mod registry;
pub mod resources;
pub mod robot;
pub mod serialize;
pub mod site;
pub mod structure;
pub mod tile;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
