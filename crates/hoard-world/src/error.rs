//! Error types for the `hoard-world` crate.
//!
//! Lifecycle misuse and unknown ids surface as [`WorldError`]. Item-level
//! refusals (filtered adds, full cells) are not errors; they hand the item
//! back to the caller instead.

use hoard_types::WarehouseId;

/// Errors that can occur during warehouse lifecycle and depot operations.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// No warehouse with this id is held by the depot.
    #[error("warehouse not found: {0}")]
    UnknownWarehouse(WarehouseId),

    /// A warehouse with this id is already held by the depot.
    #[error("duplicate warehouse id: {0}")]
    DuplicateWarehouse(WarehouseId),

    /// Spawn was requested for a warehouse that is already placed.
    #[error("warehouse {0} is already spawned")]
    AlreadySpawned(WarehouseId),

    /// The operation needs a placed warehouse.
    #[error("warehouse {0} is not spawned")]
    NotSpawned(WarehouseId),

    /// The warehouse was destroyed and cannot be used again.
    #[error("warehouse {0} has been destroyed")]
    Destroyed(WarehouseId),

    /// A snapshot could not be encoded or decoded.
    #[error("snapshot serialization failed: {source}")]
    Snapshot {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },
}
