//! The colony simulation orchestrator.
//!
//! `Colony` exclusively owns the grid, registry, roster, and resource pool
//! for the life of a session. Player actions validate completely before
//! mutating anything: each either fully commits (resource deduction plus
//! structure/robot instantiation) or fully aborts with a [`PlacementError`].
//! `advance_turn` runs the fixed tick order and returns what happened as a
//! [`TurnReport`] of plain event values.

use crate::connectivity::disconnect_all_and_recompute;
use crate::factory::{advance_factories, dispatch_factory_output, FactoryEvent};
use crate::id::StructureId;
use crate::registry::{RegistryError, StructureRegistry};
use crate::resources::{ResourceCost, ResourcePool};
use crate::robot::{DigDirection, RobotCompletion, RobotRoster, RobotType};
use crate::site::SiteMap;
use crate::structure::{FactoryData, ProductType, Structure, StructureKind, TubeDir};
use crate::tile::{Terrain, TileGrid, TilePos};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Colony-wide tuning, passed in at construction. There is no global state;
/// one colony session owns one config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColonyConfig {
    /// Storage cap before any warehouse is built.
    pub base_storage_capacity: u32,
    /// Robot-command slots before any robot command facility is built.
    pub base_robot_slots: u32,
    /// Diggers and landers keep this many tiles clear of the map edge.
    pub edge_margin: i32,
    pub digger_task_turns: u32,
    pub miner_task_turns: u32,
    pub agridome_food_per_turn: u32,
    /// Materials granted when the seed lander deploys.
    pub starting_resources: ResourceCost,
    pub starting_food: u32,
    pub starting_morale: u32,
}

impl Default for ColonyConfig {
    fn default() -> Self {
        Self {
            base_storage_capacity: 250,
            base_robot_slots: 10,
            edge_margin: 3,
            digger_task_turns: 10,
            miner_task_turns: 6,
            agridome_food_per_turn: 10,
            starting_resources: ResourceCost::new(50, 30, 50, 30),
            starting_food: 125,
            starting_morale: 600,
        }
    }
}

/// Voice of the colony advisor. Cosmetic, but part of the persisted state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdvisorGender {
    #[default]
    Female,
    Male,
}

// ---------------------------------------------------------------------------
// Errors and reports
// ---------------------------------------------------------------------------

/// User-facing placement rejections. The attempted action is fully
/// discarded; nothing was mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PlacementError {
    #[error("tile is outside the map")]
    OutOfBounds,
    #[error("tile already has an occupant")]
    Occupied,
    #[error("a mine deposit is in the way")]
    MineInTheWay,
    #[error("tile has not been excavated")]
    NotExcavated,
    #[error("tile has not been bulldozed")]
    NotBulldozed,
    #[error("terrain cannot be cleared")]
    TerrainImpassable,
    #[error("no connecting tube reaches this tile")]
    NoTubeConnection,
    #[error("insufficient resources")]
    InsufficientResources,
    #[error("landing site is obstructed")]
    UnsuitableLandingSite,
    #[error("too close to the map edge")]
    TooCloseToMapEdge,
    #[error("obstruction directly below")]
    ObstructionBelow,
    #[error("maximum digging depth reached")]
    MaxDepthReached,
    #[error("surface diggers can only dig down")]
    SurfaceMustDigDown,
    #[error("tile has no mine deposit")]
    NoMineDeposit,
    #[error("the Command Center cannot be bulldozed")]
    CannotBulldozeCommandCenter,
    #[error("no idle robot of the required type")]
    NoIdleRobot,
    #[error("structure is not a factory")]
    NotAFactory,
    #[error("this structure kind is not player-buildable")]
    NotConstructible,
    #[error("the seed lander has already been deployed")]
    SeedAlreadyDeployed,
}

impl From<RegistryError> for PlacementError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::OutOfBounds(_) => PlacementError::OutOfBounds,
            RegistryError::TileOccupied(_) => PlacementError::Occupied,
        }
    }
}

/// Everything that happened during one turn, in dispatch order.
#[derive(Debug, Clone, Default)]
pub struct TurnReport {
    /// The turn number that just finished.
    pub turn: u64,
    pub robot_completions: Vec<RobotCompletion>,
    pub factory_events: Vec<FactoryEvent>,
}

// ---------------------------------------------------------------------------
// Colony
// ---------------------------------------------------------------------------

/// A running colony session.
pub struct Colony {
    pub(crate) config: ColonyConfig,
    pub(crate) site: SiteMap,
    pub(crate) grid: TileGrid,
    pub(crate) registry: StructureRegistry,
    pub(crate) roster: RobotRoster,
    pub(crate) pool: ResourcePool,
    pub(crate) turn: u64,
    pub(crate) morale: u32,
    pub(crate) advisor_gender: AdvisorGender,
}

impl Colony {
    pub fn new(site: SiteMap, config: ColonyConfig, advisor_gender: AdvisorGender) -> Self {
        let grid = TileGrid::from_site(&site);
        let pool = ResourcePool::new(config.base_storage_capacity);
        let morale = config.starting_morale;
        Self {
            config,
            site,
            grid,
            registry: StructureRegistry::new(),
            roster: RobotRoster::new(),
            pool,
            turn: 0,
            morale,
            advisor_gender,
        }
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    pub fn registry(&self) -> &StructureRegistry {
        &self.registry
    }

    pub fn roster(&self) -> &RobotRoster {
        &self.roster
    }

    pub fn pool(&self) -> &ResourcePool {
        &self.pool
    }

    pub fn config(&self) -> &ColonyConfig {
        &self.config
    }

    pub fn site(&self) -> &SiteMap {
        &self.site
    }

    pub fn turn(&self) -> u64 {
        self.turn
    }

    pub fn morale(&self) -> u32 {
        self.morale
    }

    pub fn advisor_gender(&self) -> AdvisorGender {
        self.advisor_gender
    }

    /// Change the viewed depth level. A view concern only.
    pub fn set_view_depth(&mut self, depth: i32) {
        self.grid.set_current_depth(depth);
    }

    fn within_edge_margin(&self, pos: TilePos) -> bool {
        let m = self.config.edge_margin;
        pos.x >= m
            && pos.x < self.grid.width() - m
            && pos.y >= m
            && pos.y < self.grid.height() - m
    }

    // -----------------------------------------------------------------------
    // Seed deployment
    // -----------------------------------------------------------------------

    /// Deploy the seed lander: the one-time 3x3 initial colony. Validates
    /// the landing site fully before touching anything.
    pub fn place_seed_lander(&mut self, x: i32, y: i32) -> Result<(), PlacementError> {
        if self.registry.command_center().is_some() {
            return Err(PlacementError::SeedAlreadyDeployed);
        }
        let center = TilePos::new(x, y, 0);
        if !self.within_edge_margin(center) {
            return Err(PlacementError::TooCloseToMapEdge);
        }
        // Obstruction sweep: mining beacons, occupants, impassable ground.
        for dy in -1..=1 {
            for dx in -1..=1 {
                let tile = self
                    .grid
                    .get(TilePos::new(x + dx, y + dy, 0))
                    .ok_or(PlacementError::UnsuitableLandingSite)?;
                if !tile.terrain.is_passable() || tile.mine.is_some() || !tile.is_empty() {
                    return Err(PlacementError::UnsuitableLandingSite);
                }
            }
        }

        let tube = || Structure::new_operational(StructureKind::Tube(TubeDir::Intersection));
        let place = |registry: &mut StructureRegistry,
                     grid: &mut TileGrid,
                     s: Structure,
                     dx: i32,
                     dy: i32| {
            registry
                .add(s, TilePos::new(x + dx, y + dy, 0), grid)
                .expect("landing site was validated clear");
        };

        // Top row: power, tube, command center.
        place(
            &mut self.registry,
            &mut self.grid,
            Structure::new_operational(StructureKind::PowerStation),
            -1,
            -1,
        );
        place(&mut self.registry, &mut self.grid, tube(), 0, -1);
        place(
            &mut self.registry,
            &mut self.grid,
            Structure::new_operational(StructureKind::CommandCenter),
            1,
            -1,
        );
        // Middle row: the emptied lander bay becomes the hub junction.
        place(&mut self.registry, &mut self.grid, tube(), -1, 0);
        place(&mut self.registry, &mut self.grid, tube(), 0, 0);
        place(&mut self.registry, &mut self.grid, tube(), 1, 0);
        // Bottom row: seed factory, tube, warehouse.
        place(
            &mut self.registry,
            &mut self.grid,
            Structure::new_operational(StructureKind::Factory(FactoryData::default())),
            -1,
            1,
        );
        place(&mut self.registry, &mut self.grid, tube(), 0, 1);
        place(
            &mut self.registry,
            &mut self.grid,
            Structure::new_operational(StructureKind::Warehouse),
            1,
            1,
        );

        // Initial robots and cargo.
        self.roster.add_robot(RobotType::Dozer);
        self.roster.add_robot(RobotType::Digger);
        self.roster.add_robot(RobotType::Miner);
        self.registry
            .update_storage_capacity(&mut self.pool, self.config.base_storage_capacity);
        let _ = self.pool.deposit(&self.config.starting_resources);
        self.pool.add_food(self.config.starting_food);

        disconnect_all_and_recompute(&mut self.registry, &mut self.grid);
        self.registry.update_energy_production(&mut self.pool);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Tube and structure placement
    // -----------------------------------------------------------------------

    /// Place a tube segment. The tile must be dozed, excavated, free of
    /// occupants and deposits, and reached by a compatible connector.
    pub fn place_tube(&mut self, pos: TilePos, dir: TubeDir) -> Result<(), PlacementError> {
        let kind = StructureKind::Tube(dir);
        let tile = self.grid.get(pos).ok_or(PlacementError::OutOfBounds)?;
        if !tile.is_empty() {
            return Err(PlacementError::Occupied);
        }
        if tile.mine.is_some() {
            return Err(PlacementError::MineInTheWay);
        }
        if !tile.excavated {
            return Err(PlacementError::NotExcavated);
        }
        if tile.terrain != Terrain::Dozed {
            return Err(PlacementError::NotBulldozed);
        }
        if !self.tube_would_connect(pos, &kind) {
            return Err(PlacementError::NoTubeConnection);
        }
        if !self.pool.can_afford(&kind.cost()) {
            return Err(PlacementError::InsufficientResources);
        }

        let paid = self.pool.try_deduct(&kind.cost());
        debug_assert!(paid);
        self.registry.add(Structure::new(kind), pos, &mut self.grid)?;
        disconnect_all_and_recompute(&mut self.registry, &mut self.grid);
        Ok(())
    }

    /// Whether a new connector at `pos` would join the existing network:
    /// some neighbor must carry a connector (or the Command Center) whose
    /// facing meets the new segment's axis.
    fn tube_would_connect(&self, pos: TilePos, new_kind: &StructureKind) -> bool {
        crate::tile::Direction::all().iter().any(|&dir| {
            if !new_kind.connects(dir) {
                return false;
            }
            let Some(neighbor) = self.grid.get(pos.step(dir)) else {
                return false;
            };
            let Some(id) = neighbor.occupant.structure() else {
                return false;
            };
            let kind = &self.registry.get(id).expect("occupant id is live").kind;
            (kind.is_connector() || matches!(kind, StructureKind::CommandCenter))
                && kind.connects(dir.opposite())
        })
    }

    /// Whether a structure at `pos` would touch a connector pointing at it.
    fn structure_would_connect(&self, pos: TilePos) -> bool {
        crate::tile::Direction::all().iter().any(|&dir| {
            let Some(neighbor) = self.grid.get(pos.step(dir)) else {
                return false;
            };
            let Some(id) = neighbor.occupant.structure() else {
                return false;
            };
            let kind = &self.registry.get(id).expect("occupant id is live").kind;
            kind.is_connector() && kind.connects(dir.opposite())
        })
    }

    /// Place a player-buildable structure. Validates tile, tube adjacency,
    /// and the bill of materials; deducts and commits together.
    pub fn place_structure(
        &mut self,
        kind: StructureKind,
        pos: TilePos,
    ) -> Result<StructureId, PlacementError> {
        match kind {
            StructureKind::Factory(_)
            | StructureKind::PowerStation
            | StructureKind::Agridome
            | StructureKind::Warehouse
            | StructureKind::RobotCommand => {}
            // Tubes go through place_tube; the rest are raised by robots or
            // the seed deployment, never built directly.
            _ => return Err(PlacementError::NotConstructible),
        }

        let tile = self.grid.get(pos).ok_or(PlacementError::OutOfBounds)?;
        if !tile.is_empty() {
            return Err(PlacementError::Occupied);
        }
        if tile.mine.is_some() {
            return Err(PlacementError::MineInTheWay);
        }
        if !tile.excavated {
            return Err(PlacementError::NotExcavated);
        }
        if tile.terrain != Terrain::Dozed {
            return Err(PlacementError::NotBulldozed);
        }
        if !self.structure_would_connect(pos) {
            return Err(PlacementError::NoTubeConnection);
        }
        if !self.pool.can_afford(&kind.cost()) {
            return Err(PlacementError::InsufficientResources);
        }

        let paid = self.pool.try_deduct(&kind.cost());
        debug_assert!(paid);
        let id = self
            .registry
            .add(Structure::new(kind), pos, &mut self.grid)?;
        disconnect_all_and_recompute(&mut self.registry, &mut self.grid);
        Ok(id)
    }

    /// Bulldoze a tile. Structures are recycled for materials and removed;
    /// raw terrain starts a dozer task. The Command Center refuses.
    pub fn bulldoze(&mut self, pos: TilePos) -> Result<(), PlacementError> {
        let tile = self.grid.get(pos).ok_or(PlacementError::OutOfBounds)?;

        if let Some(id) = tile.occupant.structure() {
            let structure = self.registry.get(id).expect("occupant id is live");
            if matches!(structure.kind, StructureKind::CommandCenter) {
                return Err(PlacementError::CannotBulldozeCommandCenter);
            }
            let refund = structure.kind.recycle_value();
            let _ = self.pool.deposit(&refund);
            self.registry.remove(id, &mut self.grid);
            disconnect_all_and_recompute(&mut self.registry, &mut self.grid);
            return Ok(());
        }
        if tile.occupant.robot().is_some() {
            return Err(PlacementError::Occupied);
        }
        if tile.mine.is_some() {
            return Err(PlacementError::MineInTheWay);
        }
        if !tile.excavated {
            return Err(PlacementError::NotExcavated);
        }

        let Some(turns) = tile.terrain.dozer_turns() else {
            return match tile.terrain {
                Terrain::Dozed => Ok(()), // nothing to do
                _ => Err(PlacementError::TerrainImpassable),
            };
        };
        let dozer = self
            .roster
            .take_available(RobotType::Dozer)
            .ok_or(PlacementError::NoIdleRobot)?;

        // The ground is re-terrained when the task starts; completion has
        // no further effect.
        self.grid.get_mut(pos).expect("checked above").terrain = Terrain::Dozed;
        self.roster.start_task(dozer, pos, turns, None, &mut self.grid);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Robot placement
    // -----------------------------------------------------------------------

    /// Send a digger to excavate. Surface digs always head down; cardinal
    /// digs extend an underground level sideways.
    pub fn place_digger(
        &mut self,
        pos: TilePos,
        direction: DigDirection,
    ) -> Result<(), PlacementError> {
        if !self.within_edge_margin(pos) {
            return Err(PlacementError::TooCloseToMapEdge);
        }
        let tile = self.grid.get(pos).ok_or(PlacementError::OutOfBounds)?;
        if !tile.excavated {
            return Err(PlacementError::NotExcavated);
        }
        if pos.depth == 0 && direction != DigDirection::Down {
            return Err(PlacementError::SurfaceMustDigDown);
        }

        if let Some(id) = tile.occupant.structure() {
            // Only an air shaft may be re-dug, and only when there is
            // somewhere left to go.
            let kind = &self.registry.get(id).expect("occupant id is live").kind;
            if !matches!(kind, StructureKind::AirShaft { .. }) {
                return Err(PlacementError::Occupied);
            }
            if pos.depth == self.grid.max_depth() {
                return Err(PlacementError::MaxDepthReached);
            }
        } else if !tile.is_empty() {
            return Err(PlacementError::Occupied);
        }

        if direction == DigDirection::Down {
            if pos.depth == self.grid.max_depth() {
                return Err(PlacementError::MaxDepthReached);
            }
            let below = self
                .grid
                .get(pos.at_depth(pos.depth + 1))
                .ok_or(PlacementError::OutOfBounds)?;
            if !below.is_empty() {
                return Err(PlacementError::ObstructionBelow);
            }
        }

        let digger = self
            .roster
            .take_available(RobotType::Digger)
            .ok_or(PlacementError::NoIdleRobot)?;
        self.roster.start_task(
            digger,
            pos,
            self.config.digger_task_turns,
            Some(direction),
            &mut self.grid,
        );
        Ok(())
    }

    /// Send a miner onto a surface mine deposit.
    pub fn place_miner(&mut self, pos: TilePos) -> Result<(), PlacementError> {
        let tile = self.grid.get(pos).ok_or(PlacementError::OutOfBounds)?;
        if !tile.is_empty() {
            return Err(PlacementError::Occupied);
        }
        if !tile.excavated {
            return Err(PlacementError::NotExcavated);
        }
        if tile.mine.is_none() {
            return Err(PlacementError::NoMineDeposit);
        }
        if pos.depth >= self.grid.max_depth() {
            return Err(PlacementError::MaxDepthReached);
        }
        let below = self
            .grid
            .get(pos.at_depth(pos.depth + 1))
            .ok_or(PlacementError::OutOfBounds)?;
        if !below.is_empty() {
            return Err(PlacementError::ObstructionBelow);
        }

        let miner = self
            .roster
            .take_available(RobotType::Miner)
            .ok_or(PlacementError::NoIdleRobot)?;
        self.grid.get_mut(pos).expect("checked above").terrain = Terrain::Dozed;
        self.roster.start_task(
            miner,
            pos,
            self.config.miner_task_turns,
            None,
            &mut self.grid,
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Factory control
    // -----------------------------------------------------------------------

    /// Select (or clear) what a factory produces. Changing the product
    /// abandons any progress on the current cycle.
    pub fn set_factory_product(
        &mut self,
        id: StructureId,
        product: Option<ProductType>,
    ) -> Result<(), PlacementError> {
        let structure = self.registry.get_mut(id).ok_or(PlacementError::NotAFactory)?;
        let Some(factory) = structure.factory_mut() else {
            return Err(PlacementError::NotAFactory);
        };
        factory.product = product;
        factory.turns_completed = 0;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Turn advance
    // -----------------------------------------------------------------------

    /// Advance the simulation one turn, in the fixed dispatch order:
    /// structure update, robot advance, robot completions, factory advance,
    /// factory dispatch, turn increment. A digger finishing a down dig
    /// changes connectivity consumed by the factory phases of the same turn.
    pub fn advance_turn(&mut self) -> TurnReport {
        // 1. Structures: construction, aging, extraction, energy, storage.
        let construction_finished = self.registry.update_turn(
            &mut self.pool,
            self.config.base_storage_capacity,
            self.config.agridome_food_per_turn,
        );
        if construction_finished {
            // A finished Command Center (or anything else) may open the graph.
            disconnect_all_and_recompute(&mut self.registry, &mut self.grid);
            self.registry.update_energy_production(&mut self.pool);
        }

        // 2-3. Robots advance, then their completions dispatch.
        let robot_completions = self.roster.advance_all(&mut self.grid);
        for completion in &robot_completions {
            self.dispatch_robot_completion(completion);
        }

        // 4-5. Factories advance, then finished products route out.
        let mut factory_events = advance_factories(&mut self.registry, &mut self.pool);
        factory_events.extend(dispatch_factory_output(
            &mut self.registry,
            &mut self.roster,
            self.config.base_robot_slots,
        ));

        // 6. Bookkeeping.
        self.turn += 1;
        TurnReport {
            turn: self.turn,
            robot_completions,
            factory_events,
        }
    }

    // -----------------------------------------------------------------------
    // Robot completion side effects
    // -----------------------------------------------------------------------

    fn dispatch_robot_completion(&mut self, completion: &RobotCompletion) {
        // A completion for a robot the roster does not know is a broken
        // invariant, not a user-facing condition.
        let _ = self.roster.expect_robot(completion.robot);
        match completion.rtype {
            RobotType::Dozer => {} // ground was re-terrained at task start
            RobotType::Digger => self.digger_finished(completion),
            RobotType::Miner => self.miner_finished(completion),
        }
    }

    fn digger_finished(&mut self, completion: &RobotCompletion) {
        let pos = completion.pos;
        let direction = completion
            .direction
            .unwrap_or_else(|| panic!("digger {:?} finished without a heading", completion.robot));

        let (origin, dig_depth) = match direction.cardinal() {
            // Down: raise the air shaft pair and open the level below.
            None => {
                if self.grid.get(pos).is_some_and(|t| t.is_empty()) {
                    self.registry
                        .add(
                            Structure::new(StructureKind::AirShaft {
                                underground: pos.depth > 0,
                            }),
                            pos,
                            &mut self.grid,
                        )
                        .expect("tile verified empty");
                }
                // Clear at placement; skip if something claimed it since.
                let below = pos.at_depth(pos.depth + 1);
                if self.grid.get(below).is_some_and(|t| t.is_empty()) {
                    self.registry
                        .add(
                            Structure::new(StructureKind::AirShaft { underground: true }),
                            below,
                            &mut self.grid,
                        )
                        .expect("tile verified empty");
                }
                (pos, pos.depth + 1)
            }
            Some(cardinal) => (pos.step(cardinal), pos.depth),
        };

        // Open the 3x3 neighborhood around the dig origin.
        for dy in -1..=1 {
            for dx in -1..=1 {
                let target = TilePos::new(origin.x + dx, origin.y + dy, dig_depth);
                if let Some(tile) = self.grid.get_mut(target) {
                    tile.excavated = true;
                }
            }
        }

        if direction == DigDirection::Down {
            disconnect_all_and_recompute(&mut self.registry, &mut self.grid);
        }
    }

    fn miner_finished(&mut self, completion: &RobotCompletion) {
        let pos = completion.pos;
        let grade = {
            let tile = self
                .grid
                .get_mut(pos)
                .unwrap_or_else(|| panic!("miner finished off the grid at {pos:?}"));
            let mine = tile
                .mine
                .as_mut()
                .unwrap_or_else(|| panic!("miner finished on {pos:?} with no mine deposit"));
            mine.active = true;
            mine.grade
        };

        let head = if pos.depth == 0 {
            StructureKind::MineFacility { grade }
        } else {
            StructureKind::MineShaft
        };
        self.registry
            .add(Structure::new(head), pos, &mut self.grid)
            .expect("miner tile was verified empty at placement");
        let below = pos.at_depth(pos.depth + 1);
        if self.grid.get(below).is_some_and(|t| t.is_empty()) {
            self.registry
                .add(Structure::new(StructureKind::MineShaft), below, &mut self.grid)
                .expect("tile verified empty");
        }
    }
}
