//! The structure registry: sole owner of every placed structure.
//!
//! Structures live in a slotmap arena; tiles and events hold only ids. The
//! registry keeps insertion order for deterministic iteration and
//! persistence, maps each structure to its tile, and runs the per-turn
//! structure update (construction countdowns, aging, energy and storage
//! recomputes, mine extraction, food production).

use crate::id::StructureId;
use crate::resources::{ResourceCost, ResourcePool};
use crate::structure::{Structure, StructureClass, StructureKind, StructureState};
use crate::tile::{MineYield, Occupant, Terrain, TileGrid, TilePos};
use slotmap::{SecondaryMap, SlotMap};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors from attaching a structure to the grid.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("tile ({x}, {y}, {depth}) is out of bounds", x = .0.x, y = .0.y, depth = .0.depth)]
    OutOfBounds(TilePos),
    #[error("tile ({x}, {y}, {depth}) already has an occupant", x = .0.x, y = .0.y, depth = .0.depth)]
    TileOccupied(TilePos),
}

// ---------------------------------------------------------------------------
// Mine extraction rates
// ---------------------------------------------------------------------------

/// Raw materials an operational mine facility pushes into the pool per turn.
pub fn mine_extraction(grade: MineYield) -> ResourceCost {
    match grade {
        MineYield::Low => ResourceCost::new(2, 0, 1, 0),
        MineYield::Medium => ResourceCost::new(4, 1, 2, 1),
        MineYield::High => ResourceCost::new(8, 2, 4, 2),
    }
}

// ---------------------------------------------------------------------------
// StructureRegistry
// ---------------------------------------------------------------------------

/// Owns all placed structures, indexed by tile and by class.
#[derive(Debug, Clone)]
pub struct StructureRegistry {
    arena: SlotMap<StructureId, Structure>,
    /// Insertion order; by-class queries and persistence follow it.
    order: Vec<StructureId>,
    positions: SecondaryMap<StructureId, TilePos>,
    next_serial: u32,
    energy_production: u32,
}

impl Default for StructureRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StructureRegistry {
    pub fn new() -> Self {
        Self {
            arena: SlotMap::with_key(),
            order: Vec::new(),
            positions: SecondaryMap::new(),
            next_serial: 1,
            energy_production: 0,
        }
    }

    /// Attach a structure to a tile and take ownership of it.
    ///
    /// Fails if the tile is out of bounds or occupied; the structure is
    /// dropped and nothing is registered. On success the tile is marked
    /// dozed and excavated. A zero serial is replaced with the next free
    /// one; a persisted serial is kept (snapshot restore).
    pub fn add(
        &mut self,
        mut structure: Structure,
        pos: TilePos,
        grid: &mut TileGrid,
    ) -> Result<StructureId, RegistryError> {
        let tile = grid.get_mut(pos).ok_or(RegistryError::OutOfBounds(pos))?;
        if !tile.is_empty() {
            return Err(RegistryError::TileOccupied(pos));
        }

        if structure.serial == 0 {
            structure.serial = self.next_serial;
            self.next_serial += 1;
        } else {
            self.next_serial = self.next_serial.max(structure.serial + 1);
        }

        let id = self.arena.insert(structure);
        self.order.push(id);
        self.positions.insert(id, pos);

        tile.occupant = Occupant::Structure(id);
        tile.excavated = true;
        tile.terrain = Terrain::Dozed;

        Ok(id)
    }

    /// Detach a structure from its tile and destroy it, returning the owned
    /// record. Refunds nothing; the caller computes any recycle value before
    /// removal.
    pub fn remove(&mut self, id: StructureId, grid: &mut TileGrid) -> Option<Structure> {
        let structure = self.arena.remove(id)?;
        if let Some(pos) = self.positions.remove(id) {
            if let Some(tile) = grid.get_mut(pos) {
                if tile.occupant == Occupant::Structure(id) {
                    tile.clear_occupant();
                    tile.connected = false;
                }
            }
        }
        self.order.retain(|other| *other != id);
        Some(structure)
    }

    pub fn get(&self, id: StructureId) -> Option<&Structure> {
        self.arena.get(id)
    }

    pub fn get_mut(&mut self, id: StructureId) -> Option<&mut Structure> {
        self.arena.get_mut(id)
    }

    pub fn position(&self, id: StructureId) -> Option<TilePos> {
        self.positions.get(id).copied()
    }

    pub fn count(&self) -> usize {
        self.order.len()
    }

    /// Structures in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (StructureId, &Structure)> {
        self.order.iter().map(|id| (*id, &self.arena[*id]))
    }

    /// Ids of every structure in the given class, insertion order.
    pub fn by_class(&self, class: StructureClass) -> Vec<StructureId> {
        self.order
            .iter()
            .copied()
            .filter(|id| self.arena[*id].kind.class() == class)
            .collect()
    }

    /// The unique Command Center, if one has been placed.
    pub fn command_center(&self) -> Option<(StructureId, TilePos)> {
        self.order
            .iter()
            .copied()
            .find(|id| matches!(self.arena[*id].kind, StructureKind::CommandCenter))
            .map(|id| (id, self.positions[id]))
    }

    /// Energy produced per turn as of the last update or recompute.
    pub fn total_energy_production(&self) -> u32 {
        self.energy_production
    }

    /// Robot-command slots available: the base allowance plus every
    /// operational robot command facility.
    pub fn robot_slot_total(&self, base_slots: u32) -> u32 {
        base_slots
            + self
                .iter()
                .filter(|(_, s)| s.is_operational())
                .map(|(_, s)| s.kind.robot_slots())
                .sum::<u32>()
    }

    /// Recompute energy production from operational, connected providers.
    /// Invoked at the end of each turn update and after loading a snapshot.
    pub fn update_energy_production(&mut self, pool: &mut ResourcePool) {
        self.energy_production = self
            .order
            .iter()
            .map(|id| &self.arena[*id])
            .filter(|s| s.can_process())
            .map(|s| s.kind.energy_output())
            .sum();
        pool.energy = self.energy_production;
    }

    /// Recompute the colony storage cap from built storage structures.
    pub fn update_storage_capacity(&mut self, pool: &mut ResourcePool, base_capacity: u32) {
        let bonus: u32 = self
            .order
            .iter()
            .map(|id| &self.arena[*id])
            .filter(|s| s.is_operational() || s.is_idle())
            .map(|s| s.kind.storage_bonus())
            .sum();
        pool.set_capacity(base_capacity + bonus);
    }

    /// Advance every structure by one turn: construction countdowns, aging,
    /// mine extraction, food production, then the energy and storage
    /// recomputes. Returns true when a structure finished construction, so
    /// the caller can re-run connectivity (a completed Command Center opens
    /// the graph).
    pub fn update_turn(
        &mut self,
        pool: &mut ResourcePool,
        base_storage_capacity: u32,
        agridome_food_per_turn: u32,
    ) -> bool {
        let mut construction_finished = false;

        for &id in &self.order {
            let structure = &mut self.arena[id];
            structure.age += 1;

            if structure.state == StructureState::UnderConstruction {
                structure.build_remaining -= 1;
                if structure.build_remaining == 0 {
                    structure.state = StructureState::Operational;
                    construction_finished = true;
                }
                continue;
            }

            if !structure.can_process() {
                continue;
            }

            match structure.kind {
                StructureKind::MineFacility { grade } => {
                    // Capacity overflow is discarded at the pit head.
                    let _ = pool.deposit(&mine_extraction(grade));
                }
                StructureKind::Agridome => {
                    let capacity = structure.kind.goods_capacity();
                    let fed = structure.storage.food + agridome_food_per_turn;
                    structure.storage.food = fed.min(capacity);
                }
                _ => {}
            }
        }

        self.update_storage_capacity(pool, base_storage_capacity);
        self.update_energy_production(pool);

        construction_finished
    }

    /// Mark every structure disconnected ahead of a connectivity walk.
    pub fn disconnect_all(&mut self) {
        for &id in &self.order {
            self.arena[id].connected = false;
        }
    }

    /// Total food held in operational or idle food producers.
    pub fn food_in_storage(&self) -> u32 {
        self.iter()
            .filter(|(_, s)| s.is_operational() || s.is_idle())
            .filter(|(_, s)| s.kind.class() == StructureClass::FoodProduction)
            .map(|(_, s)| s.storage.food)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::SiteMap;
    use crate::structure::{FactoryData, TubeDir};

    fn grid() -> TileGrid {
        let site = SiteMap::flat("test", 10, 10, 1, Terrain::Clear, Terrain::Rough);
        TileGrid::from_site(&site)
    }

    #[test]
    fn add_attaches_and_dozes_the_tile() {
        let mut g = grid();
        let mut reg = StructureRegistry::new();
        let pos = TilePos::new(3, 3, 0);
        let id = reg
            .add(Structure::new(StructureKind::PowerStation), pos, &mut g)
            .unwrap();

        let tile = g.get(pos).unwrap();
        assert_eq!(tile.occupant, Occupant::Structure(id));
        assert_eq!(tile.terrain, Terrain::Dozed);
        assert!(tile.excavated);
        assert_eq!(reg.position(id), Some(pos));
    }

    #[test]
    fn occupied_tile_rejects_and_leaks_nothing() {
        let mut g = grid();
        let mut reg = StructureRegistry::new();
        let pos = TilePos::new(3, 3, 0);
        reg.add(Structure::new(StructureKind::PowerStation), pos, &mut g)
            .unwrap();

        let result = reg.add(Structure::new(StructureKind::Warehouse), pos, &mut g);
        assert!(matches!(result, Err(RegistryError::TileOccupied(_))));
        assert_eq!(reg.count(), 1);
    }

    #[test]
    fn out_of_bounds_rejects() {
        let mut g = grid();
        let mut reg = StructureRegistry::new();
        let result = reg.add(
            Structure::new(StructureKind::Warehouse),
            TilePos::new(50, 0, 0),
            &mut g,
        );
        assert!(matches!(result, Err(RegistryError::OutOfBounds(_))));
    }

    #[test]
    fn remove_detaches_and_destroys() {
        let mut g = grid();
        let mut reg = StructureRegistry::new();
        let pos = TilePos::new(2, 2, 0);
        let id = reg
            .add(Structure::new(StructureKind::Warehouse), pos, &mut g)
            .unwrap();

        let removed = reg.remove(id, &mut g).unwrap();
        assert!(matches!(removed.kind, StructureKind::Warehouse));
        assert!(g.get(pos).unwrap().is_empty());
        assert_eq!(reg.count(), 0);
        assert!(reg.get(id).is_none());
    }

    #[test]
    fn serials_are_unique_and_restored_serials_respected() {
        let mut g = grid();
        let mut reg = StructureRegistry::new();
        let a = reg
            .add(
                Structure::new(StructureKind::Warehouse),
                TilePos::new(1, 1, 0),
                &mut g,
            )
            .unwrap();

        let mut persisted = Structure::new(StructureKind::PowerStation);
        persisted.serial = 17;
        reg.add(persisted, TilePos::new(2, 2, 0), &mut g).unwrap();

        let b = reg
            .add(
                Structure::new(StructureKind::Agridome),
                TilePos::new(3, 3, 0),
                &mut g,
            )
            .unwrap();

        assert_eq!(reg.get(a).unwrap().serial, 1);
        assert_eq!(reg.get(b).unwrap().serial, 18);
    }

    #[test]
    fn by_class_preserves_insertion_order() {
        let mut g = grid();
        let mut reg = StructureRegistry::new();
        let t1 = reg
            .add(
                Structure::new(StructureKind::Tube(TubeDir::Intersection)),
                TilePos::new(1, 1, 0),
                &mut g,
            )
            .unwrap();
        reg.add(
            Structure::new(StructureKind::PowerStation),
            TilePos::new(2, 2, 0),
            &mut g,
        )
        .unwrap();
        let t2 = reg
            .add(
                Structure::new(StructureKind::Tube(TubeDir::EastWest)),
                TilePos::new(3, 3, 0),
                &mut g,
            )
            .unwrap();

        assert_eq!(reg.by_class(StructureClass::Connector), vec![t1, t2]);
    }

    #[test]
    fn construction_counts_down_to_operational() {
        let mut g = grid();
        let mut reg = StructureRegistry::new();
        let mut pool = ResourcePool::new(1000);
        let id = reg
            .add(
                Structure::new(StructureKind::Warehouse),
                TilePos::new(4, 4, 0),
                &mut g,
            )
            .unwrap();
        assert_eq!(reg.get(id).unwrap().state, StructureState::UnderConstruction);

        let first = reg.update_turn(&mut pool, 250, 10);
        assert!(!first);
        let second = reg.update_turn(&mut pool, 250, 10);
        assert!(second);
        assert_eq!(reg.get(id).unwrap().state, StructureState::Operational);
        // Operational warehouse now raises the storage cap.
        assert_eq!(pool.capacity(), 350);
    }

    #[test]
    fn disconnected_providers_produce_no_energy() {
        let mut g = grid();
        let mut reg = StructureRegistry::new();
        let mut pool = ResourcePool::new(1000);
        let id = reg
            .add(
                Structure::new_operational(StructureKind::PowerStation),
                TilePos::new(4, 4, 0),
                &mut g,
            )
            .unwrap();

        reg.update_energy_production(&mut pool);
        assert_eq!(reg.total_energy_production(), 0);

        reg.get_mut(id).unwrap().connected = true;
        reg.update_energy_production(&mut pool);
        assert_eq!(reg.total_energy_production(), 100);
        assert_eq!(pool.energy, 100);
    }

    #[test]
    fn connected_mine_extracts_into_the_pool() {
        let mut g = grid();
        let mut reg = StructureRegistry::new();
        let mut pool = ResourcePool::new(1000);
        let id = reg
            .add(
                Structure::new_operational(StructureKind::MineFacility {
                    grade: MineYield::Medium,
                }),
                TilePos::new(5, 5, 0),
                &mut g,
            )
            .unwrap();
        reg.get_mut(id).unwrap().connected = true;

        reg.update_turn(&mut pool, 250, 10);
        assert_eq!(pool.common_metals, 4);
        assert_eq!(pool.rare_minerals, 1);

        // Disconnected mines stop producing.
        reg.get_mut(id).unwrap().connected = false;
        reg.update_turn(&mut pool, 250, 10);
        assert_eq!(pool.common_metals, 4);
    }

    #[test]
    fn agridome_food_is_capped_at_capacity() {
        let mut g = grid();
        let mut reg = StructureRegistry::new();
        let mut pool = ResourcePool::new(1000);
        let id = reg
            .add(
                Structure::new_operational(StructureKind::Agridome),
                TilePos::new(5, 5, 0),
                &mut g,
            )
            .unwrap();
        reg.get_mut(id).unwrap().connected = true;

        for _ in 0..200 {
            reg.update_turn(&mut pool, 250, 10);
        }
        assert_eq!(reg.food_in_storage(), 1000);
    }

    #[test]
    fn factory_class_query_finds_factories() {
        let mut g = grid();
        let mut reg = StructureRegistry::new();
        reg.add(
            Structure::new(StructureKind::Factory(FactoryData::default())),
            TilePos::new(6, 6, 0),
            &mut g,
        )
        .unwrap();
        assert_eq!(reg.by_class(StructureClass::Factory).len(), 1);
        assert!(reg.command_center().is_none());
    }
}
