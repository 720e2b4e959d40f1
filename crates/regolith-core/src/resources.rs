//! The colony resource economy: raw materials, storage capacity, food, energy.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ResourceCost
// ---------------------------------------------------------------------------

/// A bill of materials: what a structure or product costs, or what a
/// deposit/refund adds. Also used for per-turn mine extraction amounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCost {
    pub common_metals: u32,
    pub rare_metals: u32,
    pub common_minerals: u32,
    pub rare_minerals: u32,
}

impl ResourceCost {
    pub const fn new(
        common_metals: u32,
        rare_metals: u32,
        common_minerals: u32,
        rare_minerals: u32,
    ) -> Self {
        Self {
            common_metals,
            rare_metals,
            common_minerals,
            rare_minerals,
        }
    }

    /// Sum across all four materials.
    pub fn total(&self) -> u32 {
        self.common_metals + self.rare_metals + self.common_minerals + self.rare_minerals
    }

    pub fn is_zero(&self) -> bool {
        self.total() == 0
    }
}

// ---------------------------------------------------------------------------
// ResourcePool
// ---------------------------------------------------------------------------

/// The colony-wide resource pool.
///
/// The four material counters share one storage pool: their sum never
/// exceeds `capacity`. Food and energy are tracked separately and are not
/// capacity-bound here (food storage is gated by agridomes at the point of
/// production).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePool {
    pub common_metals: u32,
    pub rare_metals: u32,
    pub common_minerals: u32,
    pub rare_minerals: u32,
    capacity: u32,
    pub food: u32,
    pub energy: u32,
}

impl ResourcePool {
    pub fn new(capacity: u32) -> Self {
        Self {
            common_metals: 0,
            rare_metals: 0,
            common_minerals: 0,
            rare_minerals: 0,
            capacity,
            food: 0,
            energy: 0,
        }
    }

    /// Current fill level: the sum of the four material counters.
    pub fn current_level(&self) -> u32 {
        self.common_metals + self.rare_metals + self.common_minerals + self.rare_minerals
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Update the storage cap. An already-overfull pool keeps its contents;
    /// only future deposits are clamped.
    pub fn set_capacity(&mut self, capacity: u32) {
        self.capacity = capacity;
    }

    pub fn can_afford(&self, cost: &ResourceCost) -> bool {
        self.common_metals >= cost.common_metals
            && self.rare_metals >= cost.rare_metals
            && self.common_minerals >= cost.common_minerals
            && self.rare_minerals >= cost.rare_minerals
    }

    /// All-or-nothing deduction. If any counter would go negative, nothing
    /// changes and `false` is returned.
    #[must_use = "a rejected deduction means the caller must abort its action"]
    pub fn try_deduct(&mut self, cost: &ResourceCost) -> bool {
        if !self.can_afford(cost) {
            return false;
        }
        self.common_metals -= cost.common_metals;
        self.rare_metals -= cost.rare_metals;
        self.common_minerals -= cost.common_minerals;
        self.rare_minerals -= cost.rare_minerals;
        true
    }

    /// Deposit materials, clamped against remaining capacity. Materials are
    /// accepted in field order until the pool is full; the amount that did
    /// not fit is returned.
    #[must_use = "overflow indicates materials that were discarded"]
    pub fn deposit(&mut self, gain: &ResourceCost) -> u32 {
        let mut space = self.capacity.saturating_sub(self.current_level());
        let mut overflow = 0;

        let mut accept = |counter: &mut u32, amount: u32| {
            let taken = amount.min(space);
            *counter += taken;
            space -= taken;
            overflow += amount - taken;
        };
        accept(&mut self.common_metals, gain.common_metals);
        accept(&mut self.rare_metals, gain.rare_metals);
        accept(&mut self.common_minerals, gain.common_minerals);
        accept(&mut self.rare_minerals, gain.rare_minerals);

        overflow
    }

    pub fn add_food(&mut self, amount: u32) {
        self.food += amount;
    }
}
