//! Error types for the engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during engine startup and the tick loop.

/// Top-level error for the engine binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: hoard_core::ConfigError,
    },

    /// A warehouse lifecycle or snapshot operation failed.
    #[error("world error: {source}")]
    World {
        /// The underlying world error.
        #[from]
        source: hoard_world::WorldError,
    },

    /// Ingredient resolution failed in a way the loop cannot absorb.
    #[error("resolver error: {source}")]
    Resolve {
        /// The underlying resolver error.
        #[from]
        source: hoard_core::ResolveError,
    },

    /// A saved depot did not reload with the same contents.
    #[error("snapshot round trip changed contents: {message}")]
    RoundTrip {
        /// Description of the mismatch.
        message: String,
    },
}
