//! Factory production: per-turn advance and finished-product dispatch.
//!
//! Factories follow `UnderConstruction -> Operational <-> Idle`. An
//! operational, connected factory with a selected product deducts the
//! product's bill of materials when a cycle starts (all or nothing) and
//! counts turns; the finished unit then waits for a destination. Robots go
//! to the roster while a robot-command slot is free; goods go to a warehouse
//! with spare capacity. With no destination the factory idles and the check
//! repeats every turn, not just at completion.

use crate::id::StructureId;
use crate::registry::StructureRegistry;
use crate::resources::ResourcePool;
use crate::robot::RobotRoster;
use crate::structure::{ProductType, StructureClass, StructureState};

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Why a factory stopped working.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleReason {
    /// The product's bill of materials could not be paid.
    InsufficientResources,
    /// No warehouse capacity or robot-command slot for the finished unit.
    NoDestination,
}

/// Production events reported out of a turn, consumed by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactoryEvent {
    /// A unit finished and was delivered to its destination.
    ProductComplete {
        factory: StructureId,
        product: ProductType,
    },
    WentIdle {
        factory: StructureId,
        reason: IdleReason,
    },
    Resumed {
        factory: StructureId,
    },
}

// ---------------------------------------------------------------------------
// Per-turn production advance
// ---------------------------------------------------------------------------

/// Advance every factory's production by one turn.
///
/// Disconnected factories are skipped outright: they neither consume
/// resources nor count progress, whatever their state. Idle factories
/// re-check affordability here every turn.
pub fn advance_factories(
    registry: &mut StructureRegistry,
    pool: &mut ResourcePool,
) -> Vec<FactoryEvent> {
    let mut events = Vec::new();

    for id in registry.by_class(StructureClass::Factory) {
        let structure = registry.get_mut(id).expect("factory id from registry");
        if !structure.connected || structure.state == StructureState::UnderConstruction {
            continue;
        }

        let Some(factory) = structure.factory_mut() else {
            continue;
        };
        let Some(product) = factory.product else {
            continue;
        };
        // A finished unit still waiting blocks the line; dispatch owns the
        // destination re-check.
        if factory.waiting.is_some() {
            continue;
        }

        let starting_cycle = factory.turns_completed == 0;
        if starting_cycle {
            if !pool.try_deduct(&product.cost()) {
                let structure = registry.get_mut(id).unwrap();
                if structure.state != StructureState::Idle {
                    structure.state = StructureState::Idle;
                    events.push(FactoryEvent::WentIdle {
                        factory: id,
                        reason: IdleReason::InsufficientResources,
                    });
                }
                continue;
            }
            // Paying the bill brings an idle factory back on line.
            let structure = registry.get_mut(id).unwrap();
            if structure.state == StructureState::Idle {
                structure.state = StructureState::Operational;
                events.push(FactoryEvent::Resumed { factory: id });
            }
        } else if registry.get(id).unwrap().state == StructureState::Idle {
            // Mid-cycle idle (destination starvation); resume handled by
            // dispatch when the unit drains.
            continue;
        }

        let factory = registry.get_mut(id).unwrap().factory_mut().unwrap();
        factory.turns_completed += 1;
        if factory.turns_completed >= product.turns_to_build() {
            factory.turns_completed = 0;
            factory.waiting = Some(product);
        }
    }

    events
}

// ---------------------------------------------------------------------------
// Finished-product dispatch
// ---------------------------------------------------------------------------

/// Route finished units to their destinations. Run every turn after
/// production so starved factories resume as soon as space appears.
pub fn dispatch_factory_output(
    registry: &mut StructureRegistry,
    roster: &mut RobotRoster,
    base_robot_slots: u32,
) -> Vec<FactoryEvent> {
    let mut events = Vec::new();

    for id in registry.by_class(StructureClass::Factory) {
        let Some(waiting) = registry
            .get(id)
            .and_then(|s| s.factory())
            .and_then(|f| f.waiting)
        else {
            continue;
        };

        let delivered = match waiting.robot_type() {
            Some(rtype) => {
                let slots = registry.robot_slot_total(base_robot_slots) as usize;
                let in_service = roster.iter().count();
                if in_service < slots {
                    roster.add_robot(rtype);
                    true
                } else {
                    false
                }
            }
            None => match find_warehouse_with_space(registry) {
                Some(warehouse) => {
                    registry
                        .get_mut(warehouse)
                        .unwrap()
                        .storage
                        .store(waiting);
                    true
                }
                None => false,
            },
        };

        let structure = registry.get_mut(id).unwrap();
        if delivered {
            structure.factory_mut().unwrap().waiting = None;
            if structure.state == StructureState::Idle {
                structure.state = StructureState::Operational;
                events.push(FactoryEvent::Resumed { factory: id });
            }
            events.push(FactoryEvent::ProductComplete {
                factory: id,
                product: waiting,
            });
        } else if structure.state != StructureState::Idle {
            structure.state = StructureState::Idle;
            events.push(FactoryEvent::WentIdle {
                factory: id,
                reason: IdleReason::NoDestination,
            });
        }
    }

    events
}

/// First warehouse, in insertion order, with room for one more unit.
fn find_warehouse_with_space(registry: &StructureRegistry) -> Option<StructureId> {
    registry
        .by_class(StructureClass::Storage)
        .into_iter()
        .find(|id| {
            let s = registry.get(*id).unwrap();
            (s.is_operational() || s.is_idle())
                && s.storage.total() < s.kind.goods_capacity()
        })
}
