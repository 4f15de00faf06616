//! Type-safe identifier wrappers around [`Uuid`].
//!
//! Warehouses, item instances, and regions each get a strongly-typed ID so
//! they cannot be mixed up at compile time. All IDs use UUID v7
//! (time-ordered), which keeps `BTreeMap` iteration close to creation order.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares an opaque, copyable UUID-backed id type.
///
/// Ids serialize as a bare UUID string and print the same way, which keeps
/// snapshots and log lines readable.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Mint a fresh, time-ordered id.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// The underlying UUID.
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl core::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

define_id! {
    /// Unique identifier for a warehouse placed in the world.
    WarehouseId
}

define_id! {
    /// Unique identifier for one item instance (a stack).
    ///
    /// Splitting a stack mints a new id for the split-off part; merging
    /// keeps the id of the absorbing stack.
    ItemId
}

define_id! {
    /// Unique identifier for a spatial region ("map") of the world.
    RegionId
}
