//! Shared test helpers for unit and integration tests.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so the same
//! helpers serve in-crate unit tests and the integration-test crate (via the
//! `test-utils` feature).

use crate::colony::{AdvisorGender, Colony, ColonyConfig};
use crate::id::StructureId;
use crate::resources::ResourceCost;
use crate::site::SiteMap;
use crate::structure::StructureState;
use crate::tile::{MineYield, Terrain};

/// A 24x24, three-level site with clear surface and rough underground.
pub fn flat_site() -> SiteMap {
    SiteMap::flat("test_site", 24, 24, 2, Terrain::Clear, Terrain::Rough)
}

/// `flat_site` with a mine deposit seeded at (16, 16).
pub fn mined_site() -> SiteMap {
    flat_site().with_mine(16, 16, MineYield::Medium)
}

/// A colony on `flat_site` with the seed lander deployed at (8, 8).
/// The Command Center lands at (9, 7).
pub fn deployed_colony() -> Colony {
    deployed_colony_on(flat_site())
}

/// Deploy the seed lander at (8, 8) on the given site.
pub fn deployed_colony_on(site: SiteMap) -> Colony {
    let mut colony = Colony::new(site, ColonyConfig::default(), AdvisorGender::Female);
    colony
        .place_seed_lander(8, 8)
        .expect("seed site on a flat map is clear");
    colony
}

/// Pour materials into the pool, ignoring capacity overflow.
pub fn grant(colony: &mut Colony, cost: ResourceCost) {
    let _ = colony.pool.deposit(&cost);
}

/// Empty the material counters.
pub fn drain(colony: &mut Colony) {
    colony.pool.common_metals = 0;
    colony.pool.rare_metals = 0;
    colony.pool.common_minerals = 0;
    colony.pool.rare_minerals = 0;
}

/// Skip a structure's construction countdown and refresh connectivity.
pub fn force_operational(colony: &mut Colony, id: StructureId) {
    let structure = colony.registry.get_mut(id).expect("structure exists");
    structure.state = StructureState::Operational;
    structure.build_remaining = 0;
    crate::connectivity::disconnect_all_and_recompute(&mut colony.registry, &mut colony.grid);
}
