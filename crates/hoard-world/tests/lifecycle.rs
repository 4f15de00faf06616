//! Scenario tests for warehouse lifecycles, power loss, and persistence.
//!
//! Each test drives a [`Depot`] over an in-memory [`GridWorld`] the way a
//! host scheduler would: spawn, tick, save, reload.

// Integration tests use expect/unwrap extensively for clarity -- panicking
// on failure is the correct behavior in test code.
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::indexing_slicing
)]

use std::collections::{BTreeMap, BTreeSet};

use hoard_types::{Cell, ItemDef, ItemFilter, ItemStack, RegionId, TypeKey};
use hoard_world::{Depot, GridWorld, PowerLink, TickPolicy, Warehouse, WorldPlacement};

// =============================================================================
// Helpers
// =============================================================================

fn steel() -> ItemDef {
    ItemDef::new("Steel", 75, 0.5)
}

fn wood() -> ItemDef {
    ItemDef::new("Wood", 75, 0.4)
}

fn rifle() -> ItemDef {
    ItemDef::new("Rifle", 1, 3.5)
}

fn world() -> (GridWorld, RegionId) {
    let mut world = GridWorld::new();
    let region = RegionId::new();
    world.add_region(region, 40, 40);
    (world, region)
}

fn contents(depot: &Depot) -> BTreeMap<TypeKey, u64> {
    let mut totals = BTreeMap::new();
    for warehouse in depot.warehouses() {
        for stack in warehouse.stored_items() {
            let total = totals.entry(stack.key()).or_insert(0_u64);
            *total += u64::from(stack.count);
        }
    }
    totals
}

// =============================================================================
// Power loss
// =============================================================================

#[test]
fn power_starved_warehouse_empties_on_next_tick() {
    let (mut world, region) = world();
    let mut depot = Depot::with_seed(7);
    let id = depot
        .insert(
            Warehouse::new(Cell::new(20, 20), ItemFilter::allow_all())
                .with_power(PowerLink::new(500.0, 1.0)),
        )
        .unwrap();
    depot.spawn(id, region, &mut world).unwrap();

    let warehouse = depot.get_mut(id).unwrap();
    warehouse.add(ItemStack::new(steel(), 60), false).unwrap();
    warehouse.add(ItemStack::new(rifle(), 1), false).unwrap();
    assert!(warehouse.weight() > 0.0);

    warehouse.set_power_supply(0.0);
    assert!(!warehouse.is_operational());

    let policy = TickPolicy {
        empty_on_power_loss: true,
        ..TickPolicy::default()
    };
    let report = depot
        .tick(id, 1, &policy, &mut world, &BTreeSet::new())
        .unwrap();

    let emptied = report.emptied.expect("power loss should empty");
    assert_eq!(emptied.placed_units(), 61);
    assert_eq!(emptied.retained, 0);

    let warehouse = depot.get(id).unwrap();
    assert_eq!(warehouse.count(), 0);
    assert!(warehouse.weight().abs() < f64::EPSILON);
    for placed in &emptied.placed {
        assert!(world.item(placed.id).is_some());
        assert!(world.is_forbidden(placed.id));
    }
    assert_eq!(world.count_loose(region, &steel().key()), 60);
}

#[test]
fn starved_warehouse_without_policy_keeps_contents() {
    let (mut world, region) = world();
    let mut depot = Depot::with_seed(8);
    let id = depot
        .insert(
            Warehouse::new(Cell::new(20, 20), ItemFilter::allow_all())
                .with_power(PowerLink::new(500.0, 1.0)),
        )
        .unwrap();
    depot.spawn(id, region, &mut world).unwrap();
    depot
        .get_mut(id)
        .unwrap()
        .add(ItemStack::new(steel(), 60), false)
        .unwrap();
    depot.get_mut(id).unwrap().set_power_supply(0.0);

    let report = depot
        .tick(id, 1, &TickPolicy::default(), &mut world, &BTreeSet::new())
        .unwrap();
    assert!(report.emptied.is_none());
    assert_eq!(report.collected, 0);
    assert_eq!(depot.get(id).unwrap().count(), 60);
}

#[test]
fn tick_reports_draw_proportional_to_weight() {
    let (mut world, region) = world();
    let mut depot = Depot::with_seed(9);
    let id = depot
        .insert(
            Warehouse::new(Cell::new(20, 20), ItemFilter::allow_all())
                .with_power(PowerLink::new(500.0, 1.0)),
        )
        .unwrap();
    depot.spawn(id, region, &mut world).unwrap();
    depot
        .get_mut(id)
        .unwrap()
        .add(ItemStack::new(steel(), 40), false)
        .unwrap();

    let policy = TickPolicy {
        energy_factor: 2.5,
        ..TickPolicy::default()
    };
    let report = depot
        .tick(id, 1, &policy, &mut world, &BTreeSet::new())
        .unwrap();
    let draw = report.draw.unwrap();
    assert!((draw - 50.0).abs() < 1e-9);
}

// =============================================================================
// Despawn
// =============================================================================

#[test]
fn despawn_flushes_everything_into_the_world() {
    let (mut world, region) = world();
    let mut depot = Depot::with_seed(10);
    let id = depot
        .insert(Warehouse::new(Cell::new(10, 10), ItemFilter::allow_all()))
        .unwrap();
    depot.spawn(id, region, &mut world).unwrap();
    let warehouse = depot.get_mut(id).unwrap();
    warehouse.add(ItemStack::new(wood(), 300), false).unwrap();

    let emptied = depot.despawn(id, &mut world, false).unwrap();
    assert_eq!(emptied.placed_units(), 300);
    assert!(emptied.stranded.is_empty());
    assert_eq!(world.count_loose(region, &wood().key()), 300);
    assert!(depot.registry().is_empty());
    for placed in &emptied.placed {
        assert!(placed.count <= 75);
        assert!(!world.is_forbidden(placed.id));
    }
}

// =============================================================================
// Persistence
// =============================================================================

#[test]
fn json_round_trip_preserves_contents() {
    let (mut world, region) = world();
    let mut depot = Depot::with_seed(11);
    let a = depot
        .insert(Warehouse::new(Cell::new(5, 5), ItemFilter::allow_all()))
        .unwrap();
    let b = depot
        .insert(Warehouse::new(Cell::new(25, 25), ItemFilter::allow_all()))
        .unwrap();
    depot.spawn(a, region, &mut world).unwrap();
    depot.spawn(b, region, &mut world).unwrap();

    let wa = depot.get_mut(a).unwrap();
    wa.add(ItemStack::new(steel(), 40), false).unwrap();
    wa.add(ItemStack::new(steel(), 50), false).unwrap();
    wa.add(ItemStack::new(rifle(), 1), false).unwrap();
    depot
        .get_mut(b)
        .unwrap()
        .add(ItemStack::new(wood(), 120), false)
        .unwrap();

    let before = contents(&depot);
    let order_before = depot.registry().all_in_region(region);
    let json = depot.to_json().unwrap();

    let mut reloaded = Depot::with_seed(12);
    let dumped = reloaded.load_json(&json, &mut world).unwrap();

    assert!(dumped.is_empty());
    assert_eq!(contents(&reloaded), before);
    assert_eq!(reloaded.registry().all_in_region(region), order_before);
    for warehouse in reloaded.warehouses() {
        assert!(warehouse.ledger().verify_aggregates().is_consistent());
        assert!(warehouse.is_operational());
    }
}

#[test]
fn items_refused_after_filter_change_are_dumped_on_spawn() {
    let (mut world, region) = world();
    let mut depot = Depot::with_seed(13);
    let id = depot
        .insert(Warehouse::new(Cell::new(10, 10), ItemFilter::allow_all()))
        .unwrap();
    depot.spawn(id, region, &mut world).unwrap();
    let warehouse = depot.get_mut(id).unwrap();
    warehouse.add(ItemStack::new(steel(), 40), false).unwrap();
    warehouse.add(ItemStack::new(wood(), 30), false).unwrap();

    let mut snapshot = depot.snapshot();
    snapshot.warehouses[0].filter = ItemFilter::only(["Steel"]);
    let json = serde_json::to_string(&snapshot).unwrap();

    let mut reloaded = Depot::with_seed(14);
    let dumped = reloaded.load_json(&json, &mut world).unwrap();

    let warehouse = reloaded.get(id).unwrap();
    assert_eq!(warehouse.count_of(&steel().key()), 40);
    assert_eq!(warehouse.count_of(&wood().key()), 0);
    assert!(warehouse.pending_dump().is_empty());

    assert_eq!(dumped.len(), 1);
    assert_eq!(dumped[0].count, 30);
    let loose = world.item(dumped[0].id).unwrap();
    assert_eq!(loose.key(), wood().key());
}

#[test]
fn missing_collections_load_as_empty() {
    let (mut world, _) = world();
    let json = r#"{"warehouses":[{"id":"0191d1a4-6a7b-7c3d-8e9f-0a1b2c3d4e5f","cell":{"x":1,"z":2}}]}"#;
    let mut depot = Depot::with_seed(15);
    let dumped = depot.load_json(json, &mut world).unwrap();
    assert!(dumped.is_empty());
    assert_eq!(depot.len(), 1);
    let warehouse = depot.warehouses().next().unwrap();
    assert_eq!(warehouse.count(), 0);
    assert!(warehouse.include_in_trade_deals());
    assert!(depot.registry().is_empty());
}
