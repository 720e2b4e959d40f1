//! Robots and the roster that owns them.
//!
//! Robots cycle between an idle pool (keyed by type) and an active task on a
//! specific tile. Task completion is reported as plain [`RobotCompletion`]
//! values returned from [`RobotRoster::advance_all`]; terrain and structural
//! side effects are the orchestrator's job, dispatched in the fixed turn
//! order.

use crate::id::RobotId;
use crate::tile::{Direction, Occupant, TileGrid, TilePos};
use serde::{Deserialize, Serialize};
use slotmap::{SecondaryMap, SlotMap};

// ---------------------------------------------------------------------------
// Robot types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RobotType {
    Digger,
    Dozer,
    Miner,
}

impl RobotType {
    pub fn name(&self) -> &'static str {
        match self {
            RobotType::Digger => "Robodigger",
            RobotType::Dozer => "Robodozer",
            RobotType::Miner => "Robominer",
        }
    }
}

/// A digger's excavation heading. `Down` opens the level below and raises an
/// air shaft pair; the cardinal headings extend the current level sideways.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DigDirection {
    North,
    South,
    East,
    West,
    Down,
}

impl DigDirection {
    /// The cardinal component, `None` for `Down`.
    pub fn cardinal(&self) -> Option<Direction> {
        match self {
            DigDirection::North => Some(Direction::North),
            DigDirection::South => Some(Direction::South),
            DigDirection::East => Some(Direction::East),
            DigDirection::West => Some(Direction::West),
            DigDirection::Down => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Robot
// ---------------------------------------------------------------------------

/// One robot. Owned by the roster arena for the life of the colony; robots
/// are never destroyed, only cycled between active and idle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Robot {
    pub rtype: RobotType,
    /// Turns of wear on the fuel cell, accumulated while working.
    pub fuel_cell_age: u32,
    /// Turns left in the current task. Zero while idle.
    pub task_remaining: u32,
    pub idle: bool,
    /// Heading for the current dig. Diggers only.
    pub direction: Option<DigDirection>,
}

impl Robot {
    pub fn new(rtype: RobotType) -> Self {
        Self {
            rtype,
            fuel_cell_age: 0,
            task_remaining: 0,
            idle: true,
            direction: None,
        }
    }
}

/// A finished task, emitted by [`RobotRoster::advance_all`] and consumed by
/// the orchestrator in the same turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RobotCompletion {
    pub robot: RobotId,
    pub rtype: RobotType,
    /// The tile the robot was working.
    pub pos: TilePos,
    pub direction: Option<DigDirection>,
}

// ---------------------------------------------------------------------------
// RobotRoster
// ---------------------------------------------------------------------------

/// Owns every robot and maps active robots to the tiles they work.
#[derive(Debug, Clone, Default)]
pub struct RobotRoster {
    arena: SlotMap<RobotId, Robot>,
    /// Insertion order, for deterministic iteration and persistence.
    order: Vec<RobotId>,
    /// Tile each active robot is working.
    active: SecondaryMap<RobotId, TilePos>,
}

impl RobotRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a freshly built robot to the idle pool.
    pub fn add_robot(&mut self, rtype: RobotType) -> RobotId {
        let id = self.arena.insert(Robot::new(rtype));
        self.order.push(id);
        id
    }

    /// Re-enter a persisted robot, preserving its wear and task fields.
    /// The caller re-attaches it to a tile via [`RobotRoster::start_task`]
    /// when its task was still running.
    pub fn restore_robot(&mut self, robot: Robot) -> RobotId {
        let id = self.arena.insert(robot);
        self.order.push(id);
        id
    }

    pub fn get(&self, id: RobotId) -> Option<&Robot> {
        self.arena.get(id)
    }

    /// Look up a robot that must exist. A missing robot here means a
    /// completion event escaped the roster: a broken invariant, not a
    /// user-facing condition.
    pub fn expect_robot(&self, id: RobotId) -> &Robot {
        self.arena
            .get(id)
            .unwrap_or_else(|| panic!("robot {id:?} referenced but not present in the roster"))
    }

    /// The tile an active robot is working, if it is active.
    pub fn tile_of(&self, id: RobotId) -> Option<TilePos> {
        self.active.get(id).copied()
    }

    pub fn total_count(&self, rtype: RobotType) -> usize {
        self.order
            .iter()
            .filter(|id| self.arena[**id].rtype == rtype)
            .count()
    }

    /// Robots of a type sitting in the idle pool.
    pub fn available_count(&self, rtype: RobotType) -> usize {
        self.order
            .iter()
            .filter(|id| {
                let r = &self.arena[**id];
                r.rtype == rtype && r.idle
            })
            .count()
    }

    /// Pick an idle robot of the given type, oldest first.
    pub fn take_available(&self, rtype: RobotType) -> Option<RobotId> {
        self.order
            .iter()
            .copied()
            .find(|id| {
                let r = &self.arena[*id];
                r.rtype == rtype && r.idle
            })
    }

    /// Robots in insertion order, with the tile each active one occupies.
    pub fn iter(&self) -> impl Iterator<Item = (RobotId, &Robot, Option<TilePos>)> {
        self.order
            .iter()
            .map(|id| (*id, &self.arena[*id], self.active.get(*id).copied()))
    }

    /// Start a countdown task on a tile. The robot leaves the idle pool; if
    /// the tile's occupant slot is free the robot takes it (a digger re-dug
    /// through an air shaft shares the tile with the shaft instead).
    pub fn start_task(
        &mut self,
        id: RobotId,
        pos: TilePos,
        turns: u32,
        direction: Option<DigDirection>,
        grid: &mut TileGrid,
    ) {
        let robot = self
            .arena
            .get_mut(id)
            .unwrap_or_else(|| panic!("start_task for robot {id:?} not in the roster"));
        robot.idle = false;
        robot.task_remaining = turns.max(1);
        robot.direction = direction;
        self.active.insert(id, pos);
        if let Some(tile) = grid.get_mut(pos) {
            if tile.is_empty() {
                tile.occupant = Occupant::Robot(id);
            }
        }
    }

    /// Re-attach a restored robot to the tile its task was running on,
    /// without touching its countdown. Loader use only.
    pub(crate) fn reattach(&mut self, id: RobotId, pos: TilePos, grid: &mut TileGrid) {
        self.active.insert(id, pos);
        if let Some(tile) = grid.get_mut(pos) {
            if tile.is_empty() {
                tile.occupant = Occupant::Robot(id);
            }
        }
    }

    /// Advance every active robot by one turn. Robots reaching zero go idle,
    /// detach from their tile (only if the tile still holds them; the tile
    /// may have been overwritten this turn), and are reported as completions.
    pub fn advance_all(&mut self, grid: &mut TileGrid) -> Vec<RobotCompletion> {
        let mut completions = Vec::new();
        for &id in &self.order {
            let Some(pos) = self.active.get(id).copied() else {
                continue;
            };
            let robot = &mut self.arena[id];
            robot.fuel_cell_age += 1;
            robot.task_remaining -= 1;
            if robot.task_remaining > 0 {
                continue;
            }
            robot.idle = true;
            completions.push(RobotCompletion {
                robot: id,
                rtype: robot.rtype,
                pos,
                direction: robot.direction,
            });
            if let Some(tile) = grid.get_mut(pos) {
                if tile.occupant == Occupant::Robot(id) {
                    tile.clear_occupant();
                }
            }
        }
        for completion in &completions {
            self.active.remove(completion.robot);
        }
        completions
    }
}
