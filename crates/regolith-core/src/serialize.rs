//! Versioned binary snapshots of a whole colony, via `bitcode`.
//!
//! A snapshot carries a magic/version header, the map section (site and
//! tileset identifiers plus per-tile overrides over the base terrain), the
//! ordered structure and robot sections, and the scalar tail (turn counter,
//! morale, advisor voice). The loader validates the header before touching
//! anything and rebuilds in a fixed order: tiles, then structures (Command
//! Center re-derived, connectivity and energy recomputed), then robots
//! (re-attached to their tiles), then scalars. A failed load returns an
//! error and builds nothing, so the caller's previous colony is untouched.

use crate::colony::{AdvisorGender, Colony, ColonyConfig};
use crate::connectivity::disconnect_all_and_recompute;
use crate::resources::ResourceCost;
use crate::robot::Robot;
use crate::site::SiteMap;
use crate::structure::Structure;
use crate::tile::{Terrain, TileGrid, TilePos};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying a colony snapshot.
pub const SNAPSHOT_MAGIC: u32 = 0x5245_4701;

/// Current format version. Increment when breaking the wire format.
pub const FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur while saving.
#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
}

/// Errors that can occur while loading. All of them abandon the load with
/// no state applied.
#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", SNAPSHOT_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("snapshot from future version {0} (this build supports up to {FORMAT_VERSION})")]
    FutureVersion(u32),
    #[error("unsupported format version: expected {}, got {}", FORMAT_VERSION, .0)]
    UnsupportedVersion(u32),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
    #[error("snapshot was taken on site '{got}', not '{expected}'")]
    SiteMismatch { expected: String, got: String },
    #[error("corrupt snapshot: {0}")]
    Corrupt(String),
}

// ---------------------------------------------------------------------------
// Snapshot layout
// ---------------------------------------------------------------------------

/// Header prepended to every snapshot. Checked in full before any colony
/// state is rebuilt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub magic: u32,
    pub version: u32,
    /// Turn count when the snapshot was taken.
    pub turn: u64,
}

impl SnapshotHeader {
    pub fn new(turn: u64) -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            version: FORMAT_VERSION,
            turn,
        }
    }

    /// Validate magic and version. Returns `Ok(())` if this build can read
    /// the snapshot.
    pub fn validate(&self) -> Result<(), DeserializeError> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(DeserializeError::InvalidMagic(self.magic));
        }
        if self.version > FORMAT_VERSION {
            return Err(DeserializeError::FutureVersion(self.version));
        }
        if self.version < FORMAT_VERSION {
            return Err(DeserializeError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

/// A tile whose state differs from the base site terrain.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TileRecord {
    pos: TilePos,
    terrain: Terrain,
    excavated: bool,
    /// Present when the tile's mine deposit has been activated.
    mine_active: Option<bool>,
}

/// One placed structure and its tile.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StructureRecord {
    pos: TilePos,
    structure: Structure,
}

/// One robot; `pos` is present while its task is running.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RobotRecord {
    robot: Robot,
    pos: Option<TilePos>,
}

/// The serializable whole-colony state. Connectivity flags and the derived
/// energy total are recomputed on load, never stored.
#[derive(Debug, Serialize, Deserialize)]
struct ColonySnapshot {
    header: SnapshotHeader,
    site_id: String,
    tileset_id: String,
    max_depth: i32,
    current_depth: i32,
    tiles: Vec<TileRecord>,
    structures: Vec<StructureRecord>,
    robots: Vec<RobotRecord>,
    /// The four material counters. Capacity and energy are derived state,
    /// recomputed from the restored structures.
    resources: ResourceCost,
    food: u32,
    turn: u64,
    morale: u32,
    advisor_gender: AdvisorGender,
}

// ---------------------------------------------------------------------------
// Save
// ---------------------------------------------------------------------------

/// Serialize a colony to snapshot bytes.
pub fn save(colony: &Colony) -> Result<Vec<u8>, SerializeError> {
    let baseline = TileGrid::from_site(&colony.site);

    let mut tiles = Vec::new();
    for pos in colony.grid.positions() {
        let tile = colony.grid.get(pos).expect("position iterator in bounds");
        let base = baseline.get(pos).expect("same dimensions");
        let mine_active = tile.mine.map(|m| m.active).filter(|active| *active);
        if tile.terrain != base.terrain || tile.excavated != base.excavated || mine_active.is_some()
        {
            tiles.push(TileRecord {
                pos,
                terrain: tile.terrain,
                excavated: tile.excavated,
                mine_active,
            });
        }
    }

    let structures = colony
        .registry
        .iter()
        .map(|(id, structure)| StructureRecord {
            pos: colony
                .registry
                .position(id)
                .expect("registered structure has a tile"),
            structure: structure.clone(),
        })
        .collect();

    let robots = colony
        .roster
        .iter()
        .map(|(_, robot, pos)| RobotRecord {
            robot: robot.clone(),
            pos,
        })
        .collect();

    let snapshot = ColonySnapshot {
        header: SnapshotHeader::new(colony.turn),
        site_id: colony.site.id.clone(),
        tileset_id: colony.site.tileset.clone(),
        max_depth: colony.grid.max_depth(),
        current_depth: colony.grid.current_depth(),
        tiles,
        structures,
        robots,
        resources: ResourceCost::new(
            colony.pool.common_metals,
            colony.pool.rare_metals,
            colony.pool.common_minerals,
            colony.pool.rare_minerals,
        ),
        food: colony.pool.food,
        turn: colony.turn,
        morale: colony.morale,
        advisor_gender: colony.advisor_gender,
    };

    bitcode::serialize(&snapshot).map_err(|e| SerializeError::Encode(e.to_string()))
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Rebuild a colony from snapshot bytes over the given base site.
///
/// Reconstruction order is load-bearing: map and tiles first, then
/// structures (which re-derives the Command Center and triggers the
/// connectivity and energy recomputes), then robots, then scalars.
pub fn load(
    bytes: &[u8],
    site: &SiteMap,
    config: ColonyConfig,
) -> Result<Colony, DeserializeError> {
    let snapshot: ColonySnapshot =
        bitcode::deserialize(bytes).map_err(|e| DeserializeError::Decode(e.to_string()))?;
    snapshot.header.validate()?;

    if snapshot.site_id != site.id {
        return Err(DeserializeError::SiteMismatch {
            expected: site.id.clone(),
            got: snapshot.site_id,
        });
    }

    let mut colony = Colony::new(site.clone(), config, snapshot.advisor_gender);

    // Map section: overlay the per-tile overrides on the base terrain.
    for record in &snapshot.tiles {
        let tile = colony.grid.get_mut(record.pos).ok_or_else(|| {
            DeserializeError::Corrupt(format!("tile override at {:?} is off the map", record.pos))
        })?;
        tile.terrain = record.terrain;
        tile.excavated = record.excavated;
        if let Some(active) = record.mine_active {
            match tile.mine.as_mut() {
                Some(mine) => mine.active = active,
                None => {
                    return Err(DeserializeError::Corrupt(format!(
                        "mine state recorded at {:?}, but the site has no deposit there",
                        record.pos
                    )))
                }
            }
        }
    }

    // Structures section, in saved order, then the recomputes the original
    // colony ran after its last structural edit.
    for record in snapshot.structures {
        colony
            .registry
            .add(record.structure, record.pos, &mut colony.grid)
            .map_err(|e| DeserializeError::Corrupt(e.to_string()))?;
    }
    disconnect_all_and_recompute(&mut colony.registry, &mut colony.grid);
    colony
        .registry
        .update_storage_capacity(&mut colony.pool, colony.config.base_storage_capacity);
    colony.registry.update_energy_production(&mut colony.pool);

    // Robots section: active robots re-attach to their tiles.
    for record in snapshot.robots {
        let active = record.robot.task_remaining > 0 && !record.robot.idle;
        let id = colony.roster.restore_robot(record.robot);
        if let (true, Some(pos)) = (active, record.pos) {
            colony.roster.reattach(id, pos, &mut colony.grid);
        }
    }

    // Resource counters and the scalar tail.
    colony.pool.common_metals = snapshot.resources.common_metals;
    colony.pool.rare_metals = snapshot.resources.rare_metals;
    colony.pool.common_minerals = snapshot.resources.common_minerals;
    colony.pool.rare_minerals = snapshot.resources.rare_minerals;
    colony.pool.food = snapshot.food;
    colony.grid.set_current_depth(snapshot.current_depth);
    colony.turn = snapshot.turn;
    colony.morale = snapshot.morale;

    Ok(colony)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip_is_valid() {
        let header = SnapshotHeader::new(42);
        assert!(header.validate().is_ok());
        assert_eq!(header.turn, 42);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let header = SnapshotHeader {
            magic: 0xDEAD_BEEF,
            version: FORMAT_VERSION,
            turn: 0,
        };
        assert!(matches!(
            header.validate(),
            Err(DeserializeError::InvalidMagic(0xDEAD_BEEF))
        ));
    }

    #[test]
    fn future_version_is_rejected() {
        let header = SnapshotHeader {
            magic: SNAPSHOT_MAGIC,
            version: FORMAT_VERSION + 1,
            turn: 0,
        };
        assert!(matches!(
            header.validate(),
            Err(DeserializeError::FutureVersion(_))
        ));
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let site = SiteMap::flat(
            "mars",
            8,
            8,
            1,
            crate::tile::Terrain::Clear,
            crate::tile::Terrain::Rough,
        );
        let result = load(&[0xFF; 16], &site, ColonyConfig::default());
        assert!(matches!(result, Err(DeserializeError::Decode(_))));
    }

    #[test]
    fn site_mismatch_is_rejected() {
        let site = SiteMap::flat(
            "mars",
            16,
            16,
            1,
            crate::tile::Terrain::Clear,
            crate::tile::Terrain::Rough,
        );
        let colony = Colony::new(site.clone(), ColonyConfig::default(), AdvisorGender::Female);
        let bytes = save(&colony).unwrap();

        let other_site = SiteMap::flat(
            "venus",
            16,
            16,
            1,
            crate::tile::Terrain::Clear,
            crate::tile::Terrain::Rough,
        );
        let result = load(&bytes, &other_site, ColonyConfig::default());
        assert!(matches!(result, Err(DeserializeError::SiteMismatch { .. })));
    }

    #[test]
    fn empty_colony_round_trips() {
        let site = SiteMap::flat(
            "mars",
            16,
            16,
            2,
            crate::tile::Terrain::Clear,
            crate::tile::Terrain::Rough,
        );
        let mut colony = Colony::new(site.clone(), ColonyConfig::default(), AdvisorGender::Male);
        colony.turn = 7;
        colony.morale = 550;

        let bytes = save(&colony).unwrap();
        let loaded = load(&bytes, &site, ColonyConfig::default()).unwrap();
        assert_eq!(loaded.turn(), 7);
        assert_eq!(loaded.morale(), 550);
        assert_eq!(loaded.advisor_gender(), AdvisorGender::Male);
        assert_eq!(loaded.registry().count(), 0);
    }
}
