//! Demo engine binary for hoard.
//!
//! Wires the warehouse model into a real-time tick loop so the whole stack
//! can be watched through its logs.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `hoard-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Seed the demo world and its warehouses
//! 4. Run the tick loop until `engine.max_ticks` or Ctrl-C
//! 5. Save the depot, reload it, and check nothing was lost

mod error;
mod scenario;

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use hoard_core::config::StorageConfig;
use hoard_core::{Resolution, ResolveError, Source, host, resolve, tick_all};
use hoard_types::ItemId;
use hoard_world::{Depot, WorldPlacement};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::scenario::Scenario;

/// Ticks between demo crafting jobs.
const JOB_EVERY: u64 = 300;

/// Ticks a trade caravan keeps warehouse goods out in the open.
const TRADE_VISIT: u64 = 50;

/// Ticks a supplied crafting job takes before it consumes its ingredients.
const CRAFT_TICKS: u64 = 120;

/// Ingredients delivered for a job that has not finished yet.
#[derive(Debug)]
struct Job {
    /// Tick the job consumes its ingredients.
    done_at: u64,
    /// Delivered stacks lying in the world until then.
    items: Vec<ItemId>,
}

/// Application entry point for the engine.
///
/// # Errors
///
/// Returns an error if configuration, seeding, or the final snapshot
/// round trip fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!(
        seed = config.engine.seed,
        tick_interval_ms = config.engine.tick_interval_ms,
        max_ticks = config.engine.max_ticks,
        energy_factor = config.storage.energy_factor,
        "hoard-engine starting"
    );

    let mut rng = SmallRng::seed_from_u64(config.engine.seed);
    let mut scenario = Scenario::seed(&config, &mut rng)?;

    run(&mut scenario, &config).await?;
    verify_round_trip(&mut scenario)?;

    info!("hoard-engine shutdown complete");
    Ok(())
}

/// Load configuration from `hoard-config.yaml` in the working directory,
/// falling back to defaults when the file is absent.
fn load_config() -> Result<StorageConfig, EngineError> {
    let config_path = Path::new("hoard-config.yaml");
    if config_path.exists() {
        Ok(StorageConfig::from_file(config_path)?)
    } else {
        Ok(StorageConfig::default())
    }
}

/// Drive the tick loop.
///
/// Alongside the per-tick warehouse update it stages the events a host
/// would produce: a crafting job every [`JOB_EVERY`] ticks, a power cut
/// to the general store for the third quarter of the run, and a trade
/// caravan at the halfway mark. Ingredients a job receives are kept out
/// of automatic collection until the job finishes [`CRAFT_TICKS`] later.
async fn run(scenario: &mut Scenario, config: &StorageConfig) -> Result<(), EngineError> {
    let mut interval =
        tokio::time::interval(Duration::from_millis(config.engine.tick_interval_ms));
    let max_ticks = config.engine.max_ticks;
    let halfway = max_ticks.saturating_div(2);
    let power_back = halfway.saturating_add(max_ticks.saturating_div(4));
    let mut exclusions = BTreeSet::new();
    let mut jobs: Vec<Job> = Vec::new();
    let mut jobs_done = 0_u32;
    let mut jobs_failed = 0_u32;

    for now in 1..=max_ticks {
        tokio::select! {
            _ = interval.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!(tick = now, "interrupted, stopping tick loop");
                break;
            }
        }

        if now == halfway {
            let placed =
                host::gather_for_trade(&mut scenario.depot, scenario.region, &mut scenario.world);
            info!(tick = now, stacks = placed.len(), "trade caravan arrived");
            if let Some(store) = scenario.depot.get_mut(scenario.store) {
                store.set_power_supply(0.0);
                warn!(tick = now, warehouse = %scenario.store, "general store lost power");
            }
        }
        if now == halfway.saturating_add(TRADE_VISIT) {
            let absorbed = host::reclaim_all(
                &mut scenario.depot,
                scenario.region,
                &mut scenario.world,
                now,
                &exclusions,
            );
            info!(tick = now, absorbed, "trade caravan left");
        }
        if now == power_back {
            if let Some(store) = scenario.depot.get_mut(scenario.store) {
                store.set_power_supply(crate::scenario::STORE_SUPPLY);
                info!(tick = now, warehouse = %scenario.store, "general store power restored");
            }
        }

        finish_jobs(&mut jobs, now, &mut scenario.world, &mut exclusions);

        let summary = tick_all(&mut scenario.depot, &mut scenario.world, now, config, &exclusions);
        if summary.collected > 0 || !summary.emptied.is_empty() {
            info!(
                tick = now,
                collected = summary.collected,
                emptied = summary.emptied.len(),
                draw = summary.total_draw,
                "tick"
            );
        }

        if now.checked_rem(JOB_EVERY) == Some(0) {
            let request = scenario.job(config.resolver.default_search_radius);
            match resolve(&request, &mut scenario.depot, &mut scenario.world) {
                Ok(resolution) => {
                    jobs_done = jobs_done.saturating_add(1);
                    info!(tick = now, withdrawn = resolution.withdrawn(), "crafting job supplied");
                    let items = claim_delivered(&resolution, &mut exclusions);
                    jobs.push(Job {
                        done_at: now.saturating_add(CRAFT_TICKS),
                        items,
                    });
                }
                Err(e @ (ResolveError::Unsatisfied { .. } | ResolveError::Materialization { .. })) => {
                    jobs_failed = jobs_failed.saturating_add(1);
                    info!(tick = now, reason = %e, "crafting job could not be supplied");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    for (name, id) in [
        ("general store", scenario.store),
        ("lumber yard", scenario.lumber_yard),
        ("armory", scenario.armory),
    ] {
        if let Some(w) = scenario.depot.get(id) {
            info!(warehouse = %id, name, count = w.count(), weight = w.weight(), "warehouse stock");
        }
    }
    let tally = host::resource_tally(&scenario.depot, scenario.region);
    for (key, count) in &tally {
        info!(key = %key, count, "final stock");
    }
    info!(jobs_done, jobs_failed, "tick loop finished");
    Ok(())
}

/// Keep delivered ingredients out of automatic collection until their job
/// uses them up. Returns the claimed ids.
fn claim_delivered(resolution: &Resolution, exclusions: &mut BTreeSet<ItemId>) -> Vec<ItemId> {
    let items: Vec<ItemId> = resolution
        .chosen
        .iter()
        .filter(|c| matches!(c.source, Source::Warehouse(_)))
        .map(|c| c.item)
        .collect();
    exclusions.extend(items.iter().copied());
    items
}

/// Consume the ingredients of every job due by `now` and release their
/// claims.
fn finish_jobs(
    jobs: &mut Vec<Job>,
    now: u64,
    world: &mut impl WorldPlacement,
    exclusions: &mut BTreeSet<ItemId>,
) {
    jobs.retain(|job| {
        if job.done_at > now {
            return true;
        }
        let mut consumed = 0_u32;
        for id in &job.items {
            exclusions.remove(id);
            if let Some(stack) = world.despawn(*id) {
                consumed = consumed.saturating_add(stack.count);
            }
        }
        info!(tick = now, consumed, "crafting job finished");
        false
    });
}

/// Save the depot to JSON, load it into a fresh depot, and compare stock.
fn verify_round_trip(scenario: &mut Scenario) -> Result<(), EngineError> {
    let before = host::resource_tally(&scenario.depot, scenario.region);
    let json = scenario.depot.to_json()?;

    let mut reloaded = Depot::new();
    let dumped = reloaded.load_json(&json, &mut scenario.world)?;
    let after = host::resource_tally(&reloaded, scenario.region);

    if before != after {
        return Err(EngineError::RoundTrip {
            message: format!("{} types before, {} after", before.len(), after.len()),
        });
    }
    info!(
        bytes = json.len(),
        warehouses = reloaded.len(),
        dumped = dumped.len(),
        "snapshot round trip verified"
    );
    scenario.depot = reloaded;
    Ok(())
}
