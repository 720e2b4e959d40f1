//! The layered tile grid: terrain, excavation, occupancy, and mine deposits.
//!
//! The grid is pure data. It enforces bounds (out-of-range lookups return
//! `None`, never a panic) and the single-occupant slot per tile; every other
//! rule lives with the registry, roster, and colony orchestrator. Tiles are
//! created once at grid construction and never destroyed.

use crate::id::{RobotId, StructureId};
use crate::site::SiteMap;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Terrain
// ---------------------------------------------------------------------------

/// Terrain classes, ordered from easiest to impossible to build on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Terrain {
    /// Bulldozed flat ground; the only class structures may be placed on.
    Dozed,
    Clear,
    Rough,
    Difficult,
    /// Cannot be traversed by tubes or cleared by dozers.
    Impassable,
}

impl Terrain {
    /// Decode a stored terrain index. Returns `None` for unknown indices.
    pub fn from_index(index: u8) -> Option<Terrain> {
        match index {
            0 => Some(Terrain::Dozed),
            1 => Some(Terrain::Clear),
            2 => Some(Terrain::Rough),
            3 => Some(Terrain::Difficult),
            4 => Some(Terrain::Impassable),
            _ => None,
        }
    }

    /// The stored index for this class.
    pub fn index(self) -> u8 {
        match self {
            Terrain::Dozed => 0,
            Terrain::Clear => 1,
            Terrain::Rough => 2,
            Terrain::Difficult => 3,
            Terrain::Impassable => 4,
        }
    }

    /// Whether tubes and walks may pass over this terrain.
    pub fn is_passable(self) -> bool {
        self != Terrain::Impassable
    }

    /// Turns a dozer needs to flatten this terrain. `None` when there is
    /// nothing to doze (already flat) or it cannot be dozed at all.
    pub fn dozer_turns(self) -> Option<u32> {
        match self {
            Terrain::Dozed | Terrain::Impassable => None,
            Terrain::Clear => Some(1),
            Terrain::Rough => Some(2),
            Terrain::Difficult => Some(3),
        }
    }
}

// ---------------------------------------------------------------------------
// Positions and directions
// ---------------------------------------------------------------------------

/// A position in the layered grid. Depth 0 is the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
    pub depth: i32,
}

impl TilePos {
    pub fn new(x: i32, y: i32, depth: i32) -> Self {
        Self { x, y, depth }
    }

    /// The neighboring position one step in `dir`, same depth.
    pub fn step(&self, dir: Direction) -> TilePos {
        let (dx, dy) = dir.offset();
        TilePos::new(self.x + dx, self.y + dy, self.depth)
    }

    /// The position directly above/below by `dz` depth levels.
    pub fn at_depth(&self, depth: i32) -> TilePos {
        TilePos::new(self.x, self.y, depth)
    }
}

/// Cardinal directions on a single depth level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    /// All four cardinal directions.
    pub fn all() -> [Direction; 4] {
        [
            Direction::North,
            Direction::East,
            Direction::South,
            Direction::West,
        ]
    }

    /// Offset for this direction.
    pub fn offset(&self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
        }
    }

    pub fn opposite(&self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
        }
    }
}

// ---------------------------------------------------------------------------
// Mines
// ---------------------------------------------------------------------------

/// Richness of a mine deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MineYield {
    Low,
    Medium,
    High,
}

/// A resource deposit attached to a tile, independent of the occupant slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MineDeposit {
    pub grade: MineYield,
    /// Active once a mine facility has been raised over the deposit.
    pub active: bool,
}

impl MineDeposit {
    pub fn new(grade: MineYield) -> Self {
        Self {
            grade,
            active: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tile
// ---------------------------------------------------------------------------

/// The occupant slot of a tile: at most one structure or robot, never both.
///
/// Holds non-owning ids; the registry and roster arenas own the entities.
/// Clearing the slot detaches without destroying.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Occupant {
    #[default]
    Empty,
    Structure(StructureId),
    Robot(RobotId),
}

impl Occupant {
    pub fn is_empty(&self) -> bool {
        matches!(self, Occupant::Empty)
    }

    pub fn structure(&self) -> Option<StructureId> {
        match self {
            Occupant::Structure(id) => Some(*id),
            _ => None,
        }
    }

    pub fn robot(&self) -> Option<RobotId> {
        match self {
            Occupant::Robot(id) => Some(*id),
            _ => None,
        }
    }
}

/// One grid cell. A tile may carry a mine deposit alongside an empty or
/// occupied slot; the two are orthogonal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub terrain: Terrain,
    pub excavated: bool,
    /// Reachable from the Command Center through the tube network. Owned by
    /// the connectivity recompute; meaningless between recomputes.
    pub connected: bool,
    pub occupant: Occupant,
    pub mine: Option<MineDeposit>,
}

impl Tile {
    fn new(terrain: Terrain, excavated: bool) -> Self {
        Self {
            terrain,
            excavated,
            connected: false,
            occupant: Occupant::Empty,
            mine: None,
        }
    }

    /// Whether the occupant slot is free.
    pub fn is_empty(&self) -> bool {
        self.occupant.is_empty()
    }

    /// Detach the occupant without destroying it.
    pub fn clear_occupant(&mut self) {
        self.occupant = Occupant::Empty;
    }
}

// ---------------------------------------------------------------------------
// TileGrid
// ---------------------------------------------------------------------------

/// A fixed-size stack of 2D tile layers, one per depth level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileGrid {
    width: i32,
    height: i32,
    max_depth: i32,
    current_depth: i32,
    tiles: Vec<Tile>,
}

impl TileGrid {
    /// Build a grid from base site terrain. Surface tiles start excavated
    /// (open air); underground tiles are sealed until dug out. Mine deposits
    /// are seeded into the surface layer.
    pub fn from_site(site: &SiteMap) -> Self {
        let mut tiles = Vec::with_capacity(
            (site.width * site.height * (site.max_depth + 1)) as usize,
        );
        for depth in 0..=site.max_depth {
            for y in 0..site.height {
                for x in 0..site.width {
                    let terrain = site
                        .terrain(x, y, depth)
                        .expect("site map validated its own dimensions");
                    tiles.push(Tile::new(terrain, depth == 0));
                }
            }
        }
        let mut grid = Self {
            width: site.width,
            height: site.height,
            max_depth: site.max_depth,
            current_depth: 0,
            tiles,
        };
        for seed in site.mines() {
            if let Some(tile) = grid.get_mut(TilePos::new(seed.x, seed.y, 0)) {
                tile.mine = Some(MineDeposit::new(seed.grade));
            }
        }
        grid
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn max_depth(&self) -> i32 {
        self.max_depth
    }

    /// The depth level currently viewed. Purely a view scalar; carried in
    /// snapshots but never consulted by simulation rules.
    pub fn current_depth(&self) -> i32 {
        self.current_depth
    }

    /// Set the viewed depth, clamped to `[0, max_depth]`.
    pub fn set_current_depth(&mut self, depth: i32) {
        self.current_depth = depth.clamp(0, self.max_depth);
    }

    pub fn in_bounds(&self, pos: TilePos) -> bool {
        pos.x >= 0
            && pos.x < self.width
            && pos.y >= 0
            && pos.y < self.height
            && pos.depth >= 0
            && pos.depth <= self.max_depth
    }

    fn offset(&self, pos: TilePos) -> usize {
        ((pos.depth * self.height + pos.y) * self.width + pos.x) as usize
    }

    /// The tile at `pos`, or `None` out of bounds. Absence is the caller's
    /// signal to short-circuit; it is never an error.
    pub fn get(&self, pos: TilePos) -> Option<&Tile> {
        if !self.in_bounds(pos) {
            return None;
        }
        Some(&self.tiles[self.offset(pos)])
    }

    /// Mutable access to the tile at `pos`, or `None` out of bounds. All
    /// tile mutation goes through this reference; there is no setter API.
    pub fn get_mut(&mut self, pos: TilePos) -> Option<&mut Tile> {
        if !self.in_bounds(pos) {
            return None;
        }
        let offset = self.offset(pos);
        Some(&mut self.tiles[offset])
    }

    /// Clear every connectivity flag ahead of a recompute.
    pub fn clear_connected(&mut self) {
        for tile in &mut self.tiles {
            tile.connected = false;
        }
    }

    /// Iterate all positions, surface first, row-major within each layer.
    pub fn positions(&self) -> impl Iterator<Item = TilePos> + '_ {
        let (w, h, d) = (self.width, self.height, self.max_depth);
        (0..=d).flat_map(move |depth| {
            (0..h).flat_map(move |y| (0..w).map(move |x| TilePos::new(x, y, depth)))
        })
    }
}
