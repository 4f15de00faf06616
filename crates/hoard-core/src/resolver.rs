//! Ingredient resolution: find the materials a job needs across the
//! caller's own items and every warehouse in range, then hand them over.
//!
//! Resolution runs in two phases:
//!
//! 1. **Plan** -- [`ResolutionRequest::plan`] walks each requirement, taking
//!    from in-hand items first and then from warehouses in registry order,
//!    and records which stack contributes how many units. It only reads
//!    the [`Depot`]. If any requirement falls short, the whole request
//!    fails and nothing has changed.
//!
//! 2. **Commit** -- [`ResolutionPlan::commit`] withdraws each planned
//!    quantity from its warehouse and materializes it next to that
//!    warehouse. If the world has no room for a piece, every withdrawal
//!    made by this commit is undone: placed pieces are picked back up and
//!    all of it returns to the ledgers it came from.
//!
//! Warehouses are visited in registry insertion order, not nearest first.

use std::collections::BTreeMap;

use hoard_types::{Cell, ItemFilter, ItemId, ItemStack, RegionId, WarehouseId};
use hoard_world::{Depot, Placed, Warehouse, WorldPlacement};
use tracing::{debug, info, warn};

/// Errors that can occur while resolving ingredients.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// A requirement could not be met from the items in reach.
    #[error("requirement {index} unsatisfied: needed {needed}, found {found}")]
    Unsatisfied {
        /// Position of the requirement in the request.
        index: usize,
        /// Units the requirement asked for.
        needed: u32,
        /// Units available to it.
        found: u32,
    },

    /// The world had no room for a withdrawn stack. Every withdrawal of the
    /// commit was returned to its warehouse.
    #[error("no room to materialize items from warehouse {warehouse}; {rolled_back} units returned")]
    Materialization {
        /// The warehouse whose stack could not be placed.
        warehouse: WarehouseId,
        /// Units returned to warehouses by the rollback.
        rolled_back: u64,
    },

    /// A planned stack was no longer available when the plan was committed.
    #[error("planned stock in warehouse {warehouse} changed before commit; {rolled_back} units returned")]
    StalePlan {
        /// The warehouse whose stock changed.
        warehouse: WarehouseId,
        /// Units returned to warehouses by the rollback.
        rolled_back: u64,
    },

    /// The request itself is malformed.
    #[error("invalid resolution request: {reason}")]
    InvalidRequest {
        /// What is wrong with it.
        reason: &'static str,
    },
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// One ingredient: how many units of what.
#[derive(Debug, Clone, PartialEq)]
pub struct Requirement {
    /// Which items qualify.
    pub filter: ItemFilter,
    /// Units needed.
    pub quantity: u32,
}

impl Requirement {
    /// A requirement for `quantity` units passing `filter`.
    pub const fn new(filter: ItemFilter, quantity: u32) -> Self {
        Self { filter, quantity }
    }
}

/// A job's full ingredient list plus where to look.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionRequest {
    /// Ingredients, resolved in order.
    pub requirements: Vec<Requirement>,
    /// Region to search.
    pub region: RegionId,
    /// Where the job happens.
    pub origin: Cell,
    /// Search radius around `origin`.
    pub radius: f32,
    /// Items the caller already holds. Used before any warehouse stock and
    /// never withdrawn or moved.
    pub in_hand: Vec<ItemStack>,
}

impl ResolutionRequest {
    /// An empty request centred on `origin`.
    pub const fn new(region: RegionId, origin: Cell, radius: f32) -> Self {
        Self {
            requirements: Vec::new(),
            region,
            origin,
            radius,
            in_hand: Vec::new(),
        }
    }

    /// Add a requirement.
    #[must_use]
    pub fn require(mut self, filter: ItemFilter, quantity: u32) -> Self {
        self.requirements.push(Requirement::new(filter, quantity));
        self
    }

    /// Add items the caller already holds.
    #[must_use]
    pub fn with_in_hand(mut self, items: impl IntoIterator<Item = ItemStack>) -> Self {
        self.in_hand.extend(items);
        self
    }

    fn validate(&self) -> Result<(), ResolveError> {
        if !self.radius.is_finite() || self.radius < 0.0 {
            return Err(ResolveError::InvalidRequest {
                reason: "radius must be a finite number >= 0",
            });
        }
        if self.requirements.iter().any(|r| r.quantity == 0) {
            return Err(ResolveError::InvalidRequest {
                reason: "requirement quantity must be at least 1",
            });
        }
        Ok(())
    }

    /// Work out where every unit will come from, without touching any
    /// warehouse.
    ///
    /// Only operational warehouses registered as globally visible in the
    /// request's region and within its radius are considered. A stack is
    /// never promised twice, even across requirements.
    pub fn plan(&self, depot: &Depot) -> Result<ResolutionPlan, ResolveError> {
        self.validate()?;

        let nearby: Vec<&Warehouse> = depot
            .registry()
            .within_radius(self.region, self.origin, self.radius)
            .into_iter()
            .filter_map(|id| depot.get(id))
            .filter(|w| w.is_operational())
            .collect();

        let mut claimed: BTreeMap<(Source, ItemId), u32> = BTreeMap::new();
        let mut draws = Vec::new();

        for (index, requirement) in self.requirements.iter().enumerate() {
            let mut need = requirement.quantity;
            let held = self.in_hand.iter().map(|s| (Source::InHand, s));
            let stored = nearby.iter().copied().flat_map(|w| {
                let id = w.id();
                w.stored_items().map(move |s| (Source::Warehouse(id), s))
            });

            for (source, stack) in held.chain(stored) {
                if need == 0 {
                    break;
                }
                if !requirement.filter.allows(stack) {
                    continue;
                }
                let taken = claimed.entry((source, stack.id)).or_insert(0);
                let count = stack.count.saturating_sub(*taken).min(need);
                if count == 0 {
                    continue;
                }
                *taken = taken.saturating_add(count);
                need = need.saturating_sub(count);
                draws.push(Draw {
                    requirement: index,
                    source,
                    item: stack.id,
                    count,
                });
            }

            if need > 0 {
                let found = requirement.quantity.saturating_sub(need);
                debug!(
                    requirement = index,
                    needed = requirement.quantity,
                    found,
                    warehouses = nearby.len(),
                    "ingredient requirement unsatisfied"
                );
                return Err(ResolveError::Unsatisfied {
                    index,
                    needed: requirement.quantity,
                    found,
                });
            }
        }

        debug!(draws = draws.len(), warehouses = nearby.len(), "resolution planned");
        Ok(ResolutionPlan { draws })
    }
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// Where a planned unit comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Source {
    /// The caller's own items.
    InHand,
    /// A warehouse's stored stock.
    Warehouse(WarehouseId),
}

/// One planned contribution to a requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Draw {
    /// Requirement this contributes to.
    pub requirement: usize,
    /// Where the units come from.
    pub source: Source,
    /// The contributing stack.
    pub item: ItemId,
    /// Units taken from it.
    pub count: u32,
}

/// The outcome of a successful plan. Committing it is the only way it
/// affects anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionPlan {
    draws: Vec<Draw>,
}

/// A unit batch handed to the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chosen {
    /// Requirement it satisfies.
    pub requirement: usize,
    /// Where it came from.
    pub source: Source,
    /// The item to use: the caller's own stack, or a stack freshly placed
    /// in the world.
    pub item: ItemId,
    /// Units to use.
    pub count: u32,
    /// Where a materialized stack was placed. `None` for in-hand items.
    pub cell: Option<Cell>,
}

/// What a committed plan delivered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Every batch, in requirement order.
    pub chosen: Vec<Chosen>,
}

impl Resolution {
    /// Units delivered for one requirement.
    pub fn delivered(&self, requirement: usize) -> u64 {
        self.chosen
            .iter()
            .filter(|c| c.requirement == requirement)
            .fold(0_u64, |acc, c| acc.saturating_add(u64::from(c.count)))
    }

    /// Units that came out of warehouses.
    pub fn withdrawn(&self) -> u64 {
        self.chosen
            .iter()
            .filter(|c| matches!(c.source, Source::Warehouse(_)))
            .fold(0_u64, |acc, c| acc.saturating_add(u64::from(c.count)))
    }
}

impl ResolutionPlan {
    /// Every planned contribution, in requirement order.
    pub fn draws(&self) -> &[Draw] {
        &self.draws
    }

    /// Units the plan would withdraw from warehouses.
    pub fn warehouse_units(&self) -> u64 {
        self.draws
            .iter()
            .filter(|d| matches!(d.source, Source::Warehouse(_)))
            .fold(0_u64, |acc, d| acc.saturating_add(u64::from(d.count)))
    }

    /// Withdraw and materialize every planned warehouse contribution.
    ///
    /// The depot must not have changed since the plan was made. If it has,
    /// or if the world runs out of room, everything this commit withdrew
    /// goes back to its warehouse and an error is returned.
    pub fn commit(
        self,
        depot: &mut Depot,
        world: &mut impl WorldPlacement,
    ) -> Result<Resolution, ResolveError> {
        let mut chosen = Vec::with_capacity(self.draws.len());
        let mut committed: Vec<(WarehouseId, Placed)> = Vec::new();

        for draw in self.draws {
            let Source::Warehouse(warehouse) = draw.source else {
                chosen.push(Chosen {
                    requirement: draw.requirement,
                    source: draw.source,
                    item: draw.item,
                    count: draw.count,
                    cell: None,
                });
                continue;
            };

            let taken = depot
                .get_mut(warehouse)
                .and_then(|w| w.take_from_stack(draw.item, draw.count));
            let stack = match taken {
                Some(stack) if stack.count == draw.count => stack,
                short => {
                    let mut rolled_back = 0_u64;
                    if let Some(stack) = short {
                        rolled_back = return_to(depot, warehouse, vec![stack]);
                    }
                    rolled_back = rolled_back.saturating_add(roll_back(depot, world, committed));
                    warn!(warehouse = %warehouse, item = %draw.item, rolled_back, "planned stock changed before commit");
                    return Err(ResolveError::StalePlan {
                        warehouse,
                        rolled_back,
                    });
                }
            };

            match depot.materialize(warehouse, stack, world, false) {
                Ok(placed) => {
                    for p in placed {
                        chosen.push(Chosen {
                            requirement: draw.requirement,
                            source: draw.source,
                            item: p.id,
                            count: p.count,
                            cell: Some(p.cell),
                        });
                        committed.push((warehouse, p));
                    }
                }
                Err(pieces) => {
                    let rolled_back = return_to(depot, warehouse, pieces)
                        .saturating_add(roll_back(depot, world, committed));
                    warn!(warehouse = %warehouse, rolled_back, "resolution rolled back, no room to materialize");
                    return Err(ResolveError::Materialization {
                        warehouse,
                        rolled_back,
                    });
                }
            }
        }

        let resolution = Resolution { chosen };
        info!(
            batches = resolution.chosen.len(),
            withdrawn = resolution.withdrawn(),
            "ingredients resolved"
        );
        Ok(resolution)
    }
}

/// Plan and commit in one call.
pub fn resolve(
    request: &ResolutionRequest,
    depot: &mut Depot,
    world: &mut impl WorldPlacement,
) -> Result<Resolution, ResolveError> {
    request.plan(depot)?.commit(depot, world)
}

// ---------------------------------------------------------------------------
// Rollback
// ---------------------------------------------------------------------------

/// Pick up every placed stack and return it to its warehouse.
fn roll_back(
    depot: &mut Depot,
    world: &mut impl WorldPlacement,
    committed: Vec<(WarehouseId, Placed)>,
) -> u64 {
    committed
        .into_iter()
        .rev()
        .filter_map(|(warehouse, placed)| world.despawn(placed.id).map(|s| (warehouse, s)))
        .fold(0_u64, |acc, (warehouse, stack)| {
            acc.saturating_add(return_to(depot, warehouse, vec![stack]))
        })
}

/// Force stacks back into a warehouse's ledger. Returns the units that
/// made it back.
fn return_to(depot: &mut Depot, warehouse: WarehouseId, stacks: Vec<ItemStack>) -> u64 {
    let Some(target) = depot.get_mut(warehouse) else {
        warn!(warehouse = %warehouse, stacks = stacks.len(), "rollback target vanished, stacks lost");
        return 0;
    };
    let mut returned = 0_u64;
    for stack in stacks {
        let count = u64::from(stack.count);
        match target.add(stack, true) {
            Ok(_) => returned = returned.saturating_add(count),
            Err(refused) => {
                warn!(
                    warehouse = %warehouse,
                    key = %refused.stack.key(),
                    count = refused.stack.count,
                    refusal = ?refused.refusal,
                    "rollback refused by warehouse"
                );
            }
        }
    }
    returned
}

#[cfg(test)]
mod tests {
    use hoard_types::ItemDef;
    use hoard_world::GridWorld;

    use super::*;

    fn steel() -> ItemDef {
        ItemDef::new("Steel", 75, 0.5)
    }

    fn setup() -> (Depot, GridWorld, RegionId) {
        let mut world = GridWorld::new();
        let region = RegionId::new();
        world.add_region(region, 40, 40);
        (Depot::with_seed(42), world, region)
    }

    fn stocked(
        depot: &mut Depot,
        world: &mut GridWorld,
        region: RegionId,
        cell: Cell,
        stock: u32,
    ) -> WarehouseId {
        let id = depot
            .insert(Warehouse::new(cell, ItemFilter::allow_all()))
            .unwrap_or_default();
        depot.spawn(id, region, world).ok();
        if let Some(w) = depot.get_mut(id) {
            w.add(ItemStack::new(steel(), stock), false).ok();
        }
        id
    }

    #[test]
    fn zero_quantity_is_invalid() {
        let (depot, _, region) = setup();
        let request =
            ResolutionRequest::new(region, Cell::new(0, 0), 10.0).require(ItemFilter::allow_all(), 0);
        assert!(matches!(
            request.plan(&depot),
            Err(ResolveError::InvalidRequest { .. })
        ));
    }

    #[test]
    fn negative_radius_is_invalid() {
        let (depot, _, region) = setup();
        let request = ResolutionRequest::new(region, Cell::new(0, 0), -1.0)
            .require(ItemFilter::allow_all(), 1);
        assert!(matches!(
            request.plan(&depot),
            Err(ResolveError::InvalidRequest { .. })
        ));
    }

    #[test]
    fn plan_never_promises_a_stack_twice() {
        let (mut depot, mut world, region) = setup();
        stocked(&mut depot, &mut world, region, Cell::new(5, 5), 50);
        let request = ResolutionRequest::new(region, Cell::new(5, 5), 20.0)
            .require(ItemFilter::only(["Steel"]), 30)
            .require(ItemFilter::only(["Steel"]), 30);
        let result = request.plan(&depot);
        assert!(matches!(
            result,
            Err(ResolveError::Unsatisfied {
                index: 1,
                needed: 30,
                found: 20
            })
        ));
    }

    #[test]
    fn in_hand_items_are_used_first() {
        let (mut depot, mut world, region) = setup();
        stocked(&mut depot, &mut world, region, Cell::new(5, 5), 50);
        let held = ItemStack::new(steel(), 15);
        let held_id = held.id;
        let request = ResolutionRequest::new(region, Cell::new(5, 5), 20.0)
            .require(ItemFilter::only(["Steel"]), 20)
            .with_in_hand([held]);
        let plan = request.plan(&depot).ok();
        let draws = plan.as_ref().map(ResolutionPlan::draws).unwrap_or_default();
        assert_eq!(draws.len(), 2);
        assert_eq!(draws.first().map(|d| (d.source, d.item, d.count)), Some((Source::InHand, held_id, 15)));
        assert_eq!(plan.map(|p| p.warehouse_units()), Some(5));
    }

    #[test]
    fn out_of_range_and_unpowered_warehouses_are_skipped() {
        let (mut depot, mut world, region) = setup();
        stocked(&mut depot, &mut world, region, Cell::new(35, 35), 50);
        let unpowered = depot
            .insert(
                Warehouse::new(Cell::new(6, 5), ItemFilter::allow_all())
                    .with_power(hoard_world::PowerLink::new(100.0, 1.0)),
            )
            .unwrap_or_default();
        depot.spawn(unpowered, region, &mut world).ok();
        if let Some(w) = depot.get_mut(unpowered) {
            w.add(ItemStack::new(steel(), 50), false).ok();
            w.set_power_supply(0.0);
        }

        let request = ResolutionRequest::new(region, Cell::new(5, 5), 10.0)
            .require(ItemFilter::only(["Steel"]), 1);
        assert!(matches!(
            request.plan(&depot),
            Err(ResolveError::Unsatisfied { found: 0, .. })
        ));
    }
}
