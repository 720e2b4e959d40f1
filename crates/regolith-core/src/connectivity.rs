//! Reachability from the Command Center through the tube network.
//!
//! The graph is implicit: edges exist between adjacent tiles whose structures
//! carry compatible connectors, plus vertical links between matching air
//! shafts one depth apart. Nothing is materialized; every structural edit
//! triggers a full reset-and-walk from the Command Center tile. The
//! full-map recompute is deliberate (correct and simple at single-colony
//! scale); incrementalizing it is an optimization left unexplored.

use crate::registry::StructureRegistry;
use crate::structure::{StructureKind, StructureState};
use crate::tile::{Direction, Occupant, TileGrid, TilePos};
use std::collections::VecDeque;

/// Mark every structure and tile disconnected, then breadth-first walk the
/// tube network from the Command Center, marking the reachable set.
///
/// Nothing is reachable while the Command Center is still under
/// construction, or before one exists. Each tile is visited at most once,
/// so cycles in the tube network terminate.
pub fn disconnect_all_and_recompute(registry: &mut StructureRegistry, grid: &mut TileGrid) {
    registry.disconnect_all();
    grid.clear_connected();

    let Some((cc_id, cc_pos)) = registry.command_center() else {
        return;
    };
    let cc = registry
        .get(cc_id)
        .expect("command center id came from the registry");
    if cc.state == StructureState::UnderConstruction {
        return;
    }

    // The tile under the recorded Command Center position must actually hold
    // it; anything else is a corrupted occupancy index.
    let cc_tile = grid
        .get_mut(cc_pos)
        .unwrap_or_else(|| panic!("command center position {cc_pos:?} is off the grid"));
    if cc_tile.occupant != Occupant::Structure(cc_id) {
        panic!("tile at {cc_pos:?} does not hold the Command Center");
    }
    cc_tile.connected = true;
    registry.get_mut(cc_id).unwrap().connected = true;

    let mut queue = VecDeque::new();
    queue.push_back(cc_pos);

    while let Some(pos) = queue.pop_front() {
        let Some(cur_id) = grid.get(pos).and_then(|t| t.occupant.structure()) else {
            continue;
        };
        let cur_kind = registry.get(cur_id).unwrap().kind.clone();

        for dir in Direction::all() {
            if !cur_kind.connects(dir) {
                continue;
            }
            let npos = pos.step(dir);
            let Some(tile) = grid.get(npos) else {
                continue;
            };
            if tile.connected || !tile.terrain.is_passable() {
                continue;
            }
            let Some(neighbor_id) = tile.occupant.structure() else {
                continue;
            };

            // A connector must point back toward us; any other structure is
            // enterable from a connector (or the Command Center) but is an
            // endpoint of the walk.
            let (is_connector, points_back) = {
                let kind = &registry.get(neighbor_id).unwrap().kind;
                (kind.is_connector(), kind.connects(dir.opposite()))
            };
            if is_connector && !points_back {
                continue;
            }

            grid.get_mut(npos).unwrap().connected = true;
            registry.get_mut(neighbor_id).unwrap().connected = true;
            if is_connector {
                queue.push_back(npos);
            }
        }

        // Air shafts bridge to a matching shaft one level up or down.
        if matches!(cur_kind, StructureKind::AirShaft { .. }) {
            for dz in [-1, 1] {
                let vpos = pos.at_depth(pos.depth + dz);
                let Some(tile) = grid.get(vpos) else {
                    continue;
                };
                if tile.connected {
                    continue;
                }
                let Some(neighbor_id) = tile.occupant.structure() else {
                    continue;
                };
                if !matches!(
                    registry.get(neighbor_id).unwrap().kind,
                    StructureKind::AirShaft { .. }
                ) {
                    continue;
                }
                grid.get_mut(vpos).unwrap().connected = true;
                registry.get_mut(neighbor_id).unwrap().connected = true;
                queue.push_back(vpos);
            }
        }
    }
}
