//! Scenario tests for ingredient resolution across several warehouses.
//!
//! Every test checks stock levels before and after, since a failed
//! resolution must leave every warehouse exactly as it was.

// Integration tests use expect/unwrap extensively for clarity -- panicking
// on failure is the correct behavior in test code.
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::indexing_slicing,
    clippy::panic
)]

use std::collections::{BTreeMap, BTreeSet};

use hoard_core::{Resolution, ResolutionRequest, ResolveError, Source, StorageConfig, resolve, tick_all};
use hoard_types::{Cell, ItemDef, ItemFilter, ItemId, ItemStack, RegionId, WarehouseId};
use hoard_world::{Depot, GridWorld, Warehouse};

// =============================================================================
// Helpers
// =============================================================================

fn steel() -> ItemDef {
    ItemDef::new("Steel", 75, 0.5)
}

fn components() -> ItemDef {
    ItemDef::new("ComponentIndustrial", 50, 0.6)
}

fn world() -> (GridWorld, RegionId) {
    let mut world = GridWorld::new();
    let region = RegionId::new();
    world.add_region(region, 40, 40);
    (world, region)
}

fn warehouse_with(
    depot: &mut Depot,
    world: &mut GridWorld,
    region: RegionId,
    cell: Cell,
    stock: &[(ItemDef, u32)],
) -> WarehouseId {
    let id = depot
        .insert(Warehouse::new(cell, ItemFilter::allow_all()))
        .unwrap();
    depot.spawn(id, region, world).unwrap();
    let warehouse = depot.get_mut(id).unwrap();
    for (def, count) in stock {
        warehouse
            .add(ItemStack::new(def.clone(), *count), false)
            .unwrap();
    }
    id
}

fn stock_levels(depot: &Depot) -> BTreeMap<WarehouseId, u64> {
    depot.warehouses().map(|w| (w.id(), w.count())).collect()
}

// =============================================================================
// Atomicity
// =============================================================================

#[test]
fn shortfall_leaves_every_warehouse_untouched() {
    let (mut world, region) = world();
    let mut depot = Depot::with_seed(42);
    let a = warehouse_with(&mut depot, &mut world, region, Cell::new(5, 5), &[(steel(), 60)]);
    let b = warehouse_with(&mut depot, &mut world, region, Cell::new(8, 5), &[(steel(), 30)]);
    let before = stock_levels(&depot);

    let request = ResolutionRequest::new(region, Cell::new(6, 6), 20.0)
        .require(ItemFilter::only(["Steel"]), 100);
    let result = resolve(&request, &mut depot, &mut world);

    match result {
        Err(ResolveError::Unsatisfied {
            index,
            needed,
            found,
        }) => {
            assert_eq!(index, 0);
            assert_eq!(needed, 100);
            assert_eq!(found, 90);
        }
        other => panic!("expected unsatisfied, got {other:?}"),
    }
    assert_eq!(stock_levels(&depot), before);
    assert_eq!(depot.get(a).unwrap().count(), 60);
    assert_eq!(depot.get(b).unwrap().count(), 30);
    assert_eq!(world.loose_items().count(), 0);
}

#[test]
fn later_requirement_shortfall_commits_nothing() {
    let (mut world, region) = world();
    let mut depot = Depot::with_seed(43);
    warehouse_with(
        &mut depot,
        &mut world,
        region,
        Cell::new(5, 5),
        &[(steel(), 60), (components(), 2)],
    );
    let before = stock_levels(&depot);

    let request = ResolutionRequest::new(region, Cell::new(5, 5), 20.0)
        .require(ItemFilter::only(["Steel"]), 50)
        .require(ItemFilter::only(["ComponentIndustrial"]), 3);
    let result = resolve(&request, &mut depot, &mut world);

    assert!(matches!(
        result,
        Err(ResolveError::Unsatisfied { index: 1, .. })
    ));
    assert_eq!(stock_levels(&depot), before);
    assert_eq!(world.loose_items().count(), 0);
}

// =============================================================================
// Success
// =============================================================================

#[test]
fn success_withdraws_exactly_and_places_items_near_sources() {
    let (mut world, region) = world();
    let mut depot = Depot::with_seed(44);
    let a = warehouse_with(&mut depot, &mut world, region, Cell::new(5, 5), &[(steel(), 60)]);
    let b = warehouse_with(
        &mut depot,
        &mut world,
        region,
        Cell::new(15, 5),
        &[(steel(), 30), (components(), 4)],
    );

    let request = ResolutionRequest::new(region, Cell::new(10, 5), 20.0)
        .require(ItemFilter::only(["Steel"]), 80)
        .require(ItemFilter::only(["ComponentIndustrial"]), 2);
    let resolution = resolve(&request, &mut depot, &mut world).unwrap();

    assert_eq!(resolution.delivered(0), 80);
    assert_eq!(resolution.delivered(1), 2);
    assert_eq!(resolution.withdrawn(), 82);

    // Registry order: a is drained first, b covers the rest.
    assert_eq!(depot.get(a).unwrap().count(), 0);
    assert_eq!(depot.get(b).unwrap().count_of(&steel().key()), 10);
    assert_eq!(depot.get(b).unwrap().count_of(&components().key()), 2);

    for chosen in &resolution.chosen {
        let loose = world.loose(chosen.item).unwrap();
        assert_eq!(loose.stack.count, chosen.count);
        assert!(!loose.forbidden);
        let Source::Warehouse(from) = chosen.source else {
            panic!("nothing was in hand");
        };
        let origin = depot.get(from).unwrap().cell();
        assert!(loose.cell.distance_squared(origin) <= 18);
        assert_eq!(Some(loose.cell), chosen.cell);
    }
    for warehouse in depot.warehouses() {
        assert!(warehouse.ledger().verify_aggregates().is_consistent());
    }
}

#[test]
fn in_hand_items_reduce_what_is_withdrawn() {
    let (mut world, region) = world();
    let mut depot = Depot::with_seed(45);
    let a = warehouse_with(&mut depot, &mut world, region, Cell::new(5, 5), &[(steel(), 60)]);
    let held = ItemStack::new(steel(), 25);
    let held_id = held.id;

    let request = ResolutionRequest::new(region, Cell::new(5, 5), 10.0)
        .require(ItemFilter::only(["Steel"]), 40)
        .with_in_hand([held]);
    let resolution = resolve(&request, &mut depot, &mut world).unwrap();

    assert_eq!(resolution.delivered(0), 40);
    assert_eq!(resolution.withdrawn(), 15);
    assert_eq!(depot.get(a).unwrap().count(), 45);
    let first = resolution.chosen[0];
    assert_eq!(first.source, Source::InHand);
    assert_eq!(first.item, held_id);
    assert_eq!(first.count, 25);
    assert!(first.cell.is_none());
}

#[test]
fn warehouses_outside_radius_or_region_are_ignored() {
    let (mut world, region) = world();
    let other_region = RegionId::new();
    world.add_region(other_region, 40, 40);
    let mut depot = Depot::with_seed(46);
    warehouse_with(&mut depot, &mut world, region, Cell::new(35, 35), &[(steel(), 60)]);
    warehouse_with(&mut depot, &mut world, other_region, Cell::new(5, 5), &[(steel(), 60)]);
    let before = stock_levels(&depot);

    let request = ResolutionRequest::new(region, Cell::new(5, 5), 10.0)
        .require(ItemFilter::only(["Steel"]), 1);
    assert!(matches!(
        resolve(&request, &mut depot, &mut world),
        Err(ResolveError::Unsatisfied { found: 0, .. })
    ));
    assert_eq!(stock_levels(&depot), before);
}

// =============================================================================
// Rollback
// =============================================================================

#[test]
fn blocked_world_rolls_back_every_withdrawal() {
    let (mut world, region) = world();
    let mut depot = Depot::with_seed(47);
    let a = warehouse_with(&mut depot, &mut world, region, Cell::new(5, 5), &[(steel(), 60)]);
    let b = warehouse_with(&mut depot, &mut world, region, Cell::new(30, 30), &[(steel(), 60)]);

    // Wall in b completely so nothing can be materialized next to it.
    for x in 26..=34 {
        for z in 26..=34 {
            world.block(region, Cell::new(x, z));
        }
    }
    let before = stock_levels(&depot);

    let request = ResolutionRequest::new(region, Cell::new(20, 20), 40.0)
        .require(ItemFilter::only(["Steel"]), 100);
    let plan = request.plan(&depot).unwrap();
    assert_eq!(plan.warehouse_units(), 100);

    let result = plan.commit(&mut depot, &mut world);
    match result {
        Err(ResolveError::Materialization {
            warehouse,
            rolled_back,
        }) => {
            assert_eq!(warehouse, b);
            assert_eq!(rolled_back, 100);
        }
        other => panic!("expected materialization failure, got {other:?}"),
    }

    assert_eq!(stock_levels(&depot), before);
    assert_eq!(depot.get(a).unwrap().count(), 60);
    assert_eq!(world.loose_items().count(), 0);
    for warehouse in depot.warehouses() {
        assert!(warehouse.ledger().verify_aggregates().is_consistent());
    }
}

#[test]
fn stale_plan_is_rolled_back() {
    let (mut world, region) = world();
    let mut depot = Depot::with_seed(48);
    let a = warehouse_with(&mut depot, &mut world, region, Cell::new(5, 5), &[(steel(), 60)]);

    let request = ResolutionRequest::new(region, Cell::new(5, 5), 10.0)
        .require(ItemFilter::only(["Steel"]), 50);
    let plan = request.plan(&depot).unwrap();

    // Someone else empties the warehouse between plan and commit.
    let taken = depot
        .get_mut(a)
        .unwrap()
        .try_remove(&ItemFilter::only(["Steel"]), 60, false)
        .unwrap();
    assert_eq!(taken.iter().map(|s| s.count).sum::<u32>(), 60);

    let result = plan.commit(&mut depot, &mut world);
    assert!(matches!(
        result,
        Err(ResolveError::StalePlan { rolled_back: 0, .. })
    ));
    assert_eq!(depot.get(a).unwrap().count(), 0);
    assert_eq!(world.loose_items().count(), 0);
}

// =============================================================================
// Delivered items and automatic collection
// =============================================================================

fn deliver_fifty(seed: u64) -> (GridWorld, Depot, WarehouseId, Resolution) {
    let (mut world, region) = world();
    let mut depot = Depot::with_seed(seed);
    let a = warehouse_with(&mut depot, &mut world, region, Cell::new(5, 5), &[(steel(), 60)]);
    let request = ResolutionRequest::new(region, Cell::new(5, 5), 10.0)
        .require(ItemFilter::only(["Steel"]), 50);
    let resolution = resolve(&request, &mut depot, &mut world).unwrap();
    assert_eq!(depot.get(a).unwrap().count(), 10);
    (world, depot, a, resolution)
}

fn delivered_ids(resolution: &Resolution) -> BTreeSet<ItemId> {
    resolution
        .chosen
        .iter()
        .filter(|c| matches!(c.source, Source::Warehouse(_)))
        .map(|c| c.item)
        .collect()
}

#[test]
fn excluded_deliveries_stay_loose_through_the_next_tick() {
    let (mut world, mut depot, a, resolution) = deliver_fifty(49);
    let claimed = delivered_ids(&resolution);
    assert_eq!(claimed.len(), 1);

    let summary = tick_all(&mut depot, &mut world, 1, &StorageConfig::default(), &claimed);

    assert_eq!(summary.collected, 0);
    assert_eq!(depot.get(a).unwrap().count(), 10);
    for id in &claimed {
        assert_eq!(world.loose(*id).unwrap().stack.count, 50);
    }
}

#[test]
fn unclaimed_deliveries_are_collected_back() {
    let (mut world, mut depot, a, resolution) = deliver_fifty(50);
    let delivered = delivered_ids(&resolution);

    let summary = tick_all(
        &mut depot,
        &mut world,
        1,
        &StorageConfig::default(),
        &BTreeSet::new(),
    );

    assert_eq!(summary.collected, 1);
    assert_eq!(depot.get(a).unwrap().count(), 60);
    for id in &delivered {
        assert!(world.loose(*id).is_none());
    }
}
