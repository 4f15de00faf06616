//! Configuration, ingredient resolution, and tick orchestration for hoard.
//!
//! This crate sits on top of the warehouse model in `hoard-world` and
//! exposes what a host game loop calls: load settings, tick every
//! warehouse, find ingredients for a job, and treat stored stock as part of
//! the world for tallies and trade.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `hoard-config.yaml` into
//!   strongly-typed structs.
//! - [`resolver`] -- Two-phase ingredient resolution: a side-effect-free
//!   plan, then a commit that rolls back on failure.
//! - [`tick`] -- [`tick_all`]: the per-turn warehouse update.
//! - [`host`] -- Resource tally, trade gathering, and reclaim entry points.
//!
//! [`tick_all`]: tick::tick_all

pub mod config;
pub mod host;
pub mod resolver;
pub mod tick;

// Re-export primary types at crate root.
pub use config::{ConfigError, StorageConfig};
pub use resolver::{
    Chosen, Draw, Requirement, Resolution, ResolutionPlan, ResolutionRequest, ResolveError,
    Source, resolve,
};
pub use tick::{TickSummary, tick_all};
