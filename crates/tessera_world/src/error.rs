//! # World Error Types
//!
//! Errors surfaced by the world crate. Persistence failures are not in this
//! list: the chunk store recovers them internally and reports them through
//! [`CacheStats`](crate::store::CacheStats).

use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration is not valid TOML for [`WorldConfig`](crate::WorldConfig).
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A field holds a value outside its allowed range.
    #[error("invalid configuration: {field}: {reason}")]
    Invalid {
        /// Offending field, dotted path.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Errors raised by chunk store and world queries.
#[derive(Error, Debug)]
pub enum WorldError {
    /// Construction was attempted with an invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A bulk request covers more chunks than the cache can keep resident.
    #[error("area covers {requested} chunks but the cache holds only {capacity}")]
    AreaTooLarge {
        /// Chunks the request intersects.
        requested: usize,
        /// Cache capacity.
        capacity: usize,
    },

    /// A bulk request with zero width or height.
    #[error("area is empty")]
    EmptyArea,
}

/// Result type for world operations.
pub type WorldResult<T> = Result<T, WorldError>;
