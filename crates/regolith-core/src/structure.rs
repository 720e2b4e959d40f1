//! Placed structures: the closed sum of every buildable kind, their state
//! machines, and the bill-of-materials tables that gate construction.
//!
//! Structure behaviour dispatches by exhaustive `match` on [`StructureKind`];
//! there are no trait objects and no downcasts. The registry arena owns every
//! `Structure`; tiles hold only ids.

use crate::resources::ResourceCost;
use crate::robot::RobotType;
use crate::tile::{Direction, MineYield};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Connector directions
// ---------------------------------------------------------------------------

/// Axis restriction of a tube segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TubeDir {
    /// Connects in all four cardinal directions.
    Intersection,
    /// Connects east and west only.
    EastWest,
    /// Connects north and south only.
    NorthSouth,
}

/// The connector facing persisted with each structure record. `Vertical`
/// is carried by air shafts, which bridge depth levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectorDir {
    Intersection,
    EastWest,
    NorthSouth,
    Vertical,
}

// ---------------------------------------------------------------------------
// Factory production
// ---------------------------------------------------------------------------

/// Everything a factory can be told to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductType {
    Digger,
    Dozer,
    Miner,
    RoadMaterials,
    Clothing,
    Medicine,
}

impl ProductType {
    /// Turns of factory work to finish one unit.
    pub fn turns_to_build(self) -> u32 {
        match self {
            ProductType::Digger => 5,
            ProductType::Dozer => 5,
            ProductType::Miner => 6,
            ProductType::RoadMaterials => 2,
            ProductType::Clothing => 2,
            ProductType::Medicine => 3,
        }
    }

    /// Bill of materials deducted when a production cycle starts.
    pub fn cost(self) -> ResourceCost {
        match self {
            ProductType::Digger => ResourceCost::new(10, 2, 5, 1),
            ProductType::Dozer => ResourceCost::new(10, 2, 5, 1),
            ProductType::Miner => ResourceCost::new(12, 3, 6, 1),
            ProductType::RoadMaterials => ResourceCost::new(5, 0, 2, 0),
            ProductType::Clothing => ResourceCost::new(0, 0, 3, 0),
            ProductType::Medicine => ResourceCost::new(0, 1, 2, 2),
        }
    }

    /// The robot type this product becomes, for robot products.
    pub fn robot_type(self) -> Option<RobotType> {
        match self {
            ProductType::Digger => Some(RobotType::Digger),
            ProductType::Dozer => Some(RobotType::Dozer),
            ProductType::Miner => Some(RobotType::Miner),
            _ => None,
        }
    }
}

/// Per-factory production state, embedded in the factory variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactoryData {
    /// The product currently selected for production, if any.
    pub product: Option<ProductType>,
    /// Turns of work completed toward the current unit.
    pub turns_completed: u32,
    /// A finished unit waiting for a destination. While set, no new cycle
    /// starts; dispatch re-checks destinations every turn.
    pub waiting: Option<ProductType>,
}

// ---------------------------------------------------------------------------
// Stored goods
// ---------------------------------------------------------------------------

/// Goods held inside a single structure (warehouses, agridomes).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredGoods {
    pub road_materials: u32,
    pub clothing: u32,
    pub medicine: u32,
    pub food: u32,
}

impl StoredGoods {
    pub fn total(&self) -> u32 {
        self.road_materials + self.clothing + self.medicine + self.food
    }

    /// Store one finished factory good. Robot products never land here.
    pub fn store(&mut self, product: ProductType) {
        match product {
            ProductType::RoadMaterials => self.road_materials += 1,
            ProductType::Clothing => self.clothing += 1,
            ProductType::Medicine => self.medicine += 1,
            ProductType::Digger | ProductType::Dozer | ProductType::Miner => {
                panic!("robot product {product:?} routed into goods storage")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Structure kinds
// ---------------------------------------------------------------------------

/// Coarse grouping used for by-class registry queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StructureClass {
    Command,
    Connector,
    Factory,
    EnergyProduction,
    FoodProduction,
    Mine,
    Storage,
    RobotCommand,
}

/// Every placeable structure kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StructureKind {
    /// The unique root of the connectivity graph.
    CommandCenter,
    Tube(TubeDir),
    /// Vertical connector bridging two depth levels. `underground` is true
    /// for every air shaft below the surface.
    AirShaft { underground: bool },
    Factory(FactoryData),
    /// Raised over a surface mine deposit by a finishing miner robot.
    MineFacility { grade: MineYield },
    /// Underground continuation of a mine facility.
    MineShaft,
    PowerStation,
    Agridome,
    Warehouse,
    RobotCommand,
}

impl StructureKind {
    pub fn name(&self) -> &'static str {
        match self {
            StructureKind::CommandCenter => "Command Center",
            StructureKind::Tube(_) => "Tube",
            StructureKind::AirShaft { .. } => "Air Shaft",
            StructureKind::Factory(_) => "Factory",
            StructureKind::MineFacility { .. } => "Mine Facility",
            StructureKind::MineShaft => "Mine Shaft",
            StructureKind::PowerStation => "Power Station",
            StructureKind::Agridome => "Agridome",
            StructureKind::Warehouse => "Warehouse",
            StructureKind::RobotCommand => "Robot Command",
        }
    }

    pub fn class(&self) -> StructureClass {
        match self {
            StructureKind::CommandCenter => StructureClass::Command,
            StructureKind::Tube(_) | StructureKind::AirShaft { .. } => StructureClass::Connector,
            StructureKind::Factory(_) => StructureClass::Factory,
            StructureKind::MineFacility { .. } | StructureKind::MineShaft => StructureClass::Mine,
            StructureKind::PowerStation => StructureClass::EnergyProduction,
            StructureKind::Agridome => StructureClass::FoodProduction,
            StructureKind::Warehouse => StructureClass::Storage,
            StructureKind::RobotCommand => StructureClass::RobotCommand,
        }
    }

    /// Turns from placement to operational. Zero means operational at once.
    pub fn build_turns(&self) -> u32 {
        match self {
            StructureKind::CommandCenter => 4,
            StructureKind::Tube(_) => 0,
            StructureKind::AirShaft { .. } => 0,
            StructureKind::Factory(_) => 5,
            StructureKind::MineFacility { .. } => 2,
            StructureKind::MineShaft => 0,
            StructureKind::PowerStation => 3,
            StructureKind::Agridome => 3,
            StructureKind::Warehouse => 2,
            StructureKind::RobotCommand => 2,
        }
    }

    /// Bill of materials checked and deducted at placement. Kinds created
    /// by robot completions (air shafts, mine structures) cost nothing.
    pub fn cost(&self) -> ResourceCost {
        match self {
            StructureKind::CommandCenter => ResourceCost::new(0, 0, 0, 0),
            StructureKind::Tube(_) => ResourceCost::new(2, 0, 1, 0),
            StructureKind::AirShaft { .. } => ResourceCost::new(0, 0, 0, 0),
            StructureKind::Factory(_) => ResourceCost::new(25, 5, 20, 5),
            StructureKind::MineFacility { .. } => ResourceCost::new(0, 0, 0, 0),
            StructureKind::MineShaft => ResourceCost::new(0, 0, 0, 0),
            StructureKind::PowerStation => ResourceCost::new(20, 5, 15, 2),
            StructureKind::Agridome => ResourceCost::new(15, 2, 10, 2),
            StructureKind::Warehouse => ResourceCost::new(15, 2, 10, 1),
            StructureKind::RobotCommand => ResourceCost::new(10, 5, 5, 2),
        }
    }

    /// Materials refunded to the pool when the structure is bulldozed.
    pub fn recycle_value(&self) -> ResourceCost {
        let cost = self.cost();
        if cost.is_zero() {
            // Robot-built structures still scrap down to something.
            return ResourceCost::new(5, 0, 2, 0);
        }
        ResourceCost::new(
            cost.common_metals / 2,
            cost.rare_metals / 2,
            cost.common_minerals / 2,
            cost.rare_minerals / 2,
        )
    }

    /// Tubes and air shafts form the edges of the connectivity graph.
    pub fn is_connector(&self) -> bool {
        matches!(
            self,
            StructureKind::Tube(_) | StructureKind::AirShaft { .. }
        )
    }

    /// The persisted connector facing, for connectors only.
    pub fn connector_dir(&self) -> Option<ConnectorDir> {
        match self {
            StructureKind::Tube(TubeDir::Intersection) => Some(ConnectorDir::Intersection),
            StructureKind::Tube(TubeDir::EastWest) => Some(ConnectorDir::EastWest),
            StructureKind::Tube(TubeDir::NorthSouth) => Some(ConnectorDir::NorthSouth),
            StructureKind::AirShaft { .. } => Some(ConnectorDir::Vertical),
            _ => None,
        }
    }

    /// Whether this kind carries a connection edge toward `dir`. The
    /// Command Center connects on all sides; tubes only along their axis;
    /// air shafts behave as intersections on their own level.
    pub fn connects(&self, dir: Direction) -> bool {
        match self {
            StructureKind::CommandCenter => true,
            StructureKind::Tube(TubeDir::Intersection) => true,
            StructureKind::Tube(TubeDir::EastWest) => {
                matches!(dir, Direction::East | Direction::West)
            }
            StructureKind::Tube(TubeDir::NorthSouth) => {
                matches!(dir, Direction::North | Direction::South)
            }
            StructureKind::AirShaft { .. } => true,
            _ => false,
        }
    }

    pub fn is_factory(&self) -> bool {
        matches!(self, StructureKind::Factory(_))
    }

    /// Energy contributed per turn while operational and connected.
    pub fn energy_output(&self) -> u32 {
        match self {
            StructureKind::CommandCenter => 20,
            StructureKind::PowerStation => 100,
            _ => 0,
        }
    }

    /// Storage capacity contributed to the colony-wide material cap.
    pub fn storage_bonus(&self) -> u32 {
        match self {
            StructureKind::Warehouse => 100,
            _ => 0,
        }
    }

    /// Robot-command slots contributed to the roster cap.
    pub fn robot_slots(&self) -> u32 {
        match self {
            StructureKind::RobotCommand => 10,
            _ => 0,
        }
    }

    /// Goods capacity for kinds that store goods internally.
    pub fn goods_capacity(&self) -> u32 {
        match self {
            StructureKind::Warehouse => 100,
            StructureKind::Agridome => 1000,
            _ => 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Structure
// ---------------------------------------------------------------------------

/// Operating state of a placed structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StructureState {
    UnderConstruction,
    Operational,
    /// Built but not currently working (no resources, no destination).
    Idle,
    Disabled,
}

/// A placed structure. Occupies exactly one tile; owned by the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    /// Stable identifier carried through snapshots.
    pub serial: u32,
    pub kind: StructureKind,
    pub state: StructureState,
    /// Turns since placement.
    pub age: u32,
    /// Construction turns left before the structure becomes operational.
    pub build_remaining: u32,
    pub storage: StoredGoods,
    /// Reachable from the Command Center. Recomputed after every structural
    /// edit and on load; never persisted.
    #[serde(skip)]
    pub connected: bool,
}

impl Structure {
    pub fn new(kind: StructureKind) -> Self {
        let build_remaining = kind.build_turns();
        let state = if build_remaining == 0 {
            StructureState::Operational
        } else {
            StructureState::UnderConstruction
        };
        Self {
            serial: 0,
            kind,
            state,
            age: 0,
            build_remaining,
            storage: StoredGoods::default(),
            connected: false,
        }
    }

    /// A structure placed already operational (seed deployment).
    pub fn new_operational(kind: StructureKind) -> Self {
        let mut s = Self::new(kind);
        s.state = StructureState::Operational;
        s.build_remaining = 0;
        s
    }

    pub fn is_operational(&self) -> bool {
        self.state == StructureState::Operational
    }

    pub fn is_idle(&self) -> bool {
        self.state == StructureState::Idle
    }

    /// Whether this structure may do per-turn work: built, not disabled,
    /// and reachable from the Command Center.
    pub fn can_process(&self) -> bool {
        self.connected && self.is_operational()
    }

    pub fn factory(&self) -> Option<&FactoryData> {
        match &self.kind {
            StructureKind::Factory(data) => Some(data),
            _ => None,
        }
    }

    pub fn factory_mut(&mut self) -> Option<&mut FactoryData> {
        match &mut self.kind {
            StructureKind::Factory(data) => Some(data),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tubes_connect_along_their_axis_only() {
        let ew = StructureKind::Tube(TubeDir::EastWest);
        assert!(ew.connects(Direction::East));
        assert!(ew.connects(Direction::West));
        assert!(!ew.connects(Direction::North));

        let ns = StructureKind::Tube(TubeDir::NorthSouth);
        assert!(ns.connects(Direction::North));
        assert!(!ns.connects(Direction::East));

        assert!(Direction::all()
            .iter()
            .all(|d| StructureKind::Tube(TubeDir::Intersection).connects(*d)));
    }

    #[test]
    fn non_connectors_never_carry_edges() {
        let factory = StructureKind::Factory(FactoryData::default());
        assert!(!factory.is_connector());
        assert!(Direction::all().iter().all(|d| !factory.connects(*d)));
    }

    #[test]
    fn air_shaft_reports_vertical_facing() {
        let shaft = StructureKind::AirShaft { underground: true };
        assert_eq!(shaft.connector_dir(), Some(ConnectorDir::Vertical));
        assert!(shaft.is_connector());
    }

    #[test]
    fn zero_build_turn_kinds_start_operational() {
        let tube = Structure::new(StructureKind::Tube(TubeDir::Intersection));
        assert_eq!(tube.state, StructureState::Operational);

        let factory = Structure::new(StructureKind::Factory(FactoryData::default()));
        assert_eq!(factory.state, StructureState::UnderConstruction);
        assert_eq!(factory.build_remaining, 5);
    }

    #[test]
    fn recycle_value_is_never_more_than_cost() {
        let kinds = [
            StructureKind::Factory(FactoryData::default()),
            StructureKind::PowerStation,
            StructureKind::Agridome,
            StructureKind::Warehouse,
            StructureKind::RobotCommand,
            StructureKind::Tube(TubeDir::Intersection),
        ];
        for kind in kinds {
            let cost = kind.cost();
            let refund = kind.recycle_value();
            if !cost.is_zero() {
                assert!(refund.total() <= cost.total(), "kind {:?}", kind.name());
            }
        }
    }

    #[test]
    fn disconnected_structures_cannot_process() {
        let mut s = Structure::new_operational(StructureKind::Agridome);
        assert!(!s.can_process());
        s.connected = true;
        assert!(s.can_process());
        s.state = StructureState::Idle;
        assert!(!s.can_process());
    }

    #[test]
    fn goods_store_by_product() {
        let mut goods = StoredGoods::default();
        goods.store(ProductType::RoadMaterials);
        goods.store(ProductType::Medicine);
        goods.store(ProductType::Medicine);
        assert_eq!(goods.road_materials, 1);
        assert_eq!(goods.medicine, 2);
        assert_eq!(goods.total(), 3);
    }

    #[test]
    #[should_panic(expected = "routed into goods storage")]
    fn robot_products_never_enter_goods_storage() {
        let mut goods = StoredGoods::default();
        goods.store(ProductType::Digger);
    }
}
