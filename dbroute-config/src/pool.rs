//! Physical pool definitions.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tuning applied to a pool once, at creation.
///
/// Zero / `None` leaves the driver default in place.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct PoolOptions {
    /// Maximum open connections.
    #[serde(default)]
    pub max_open: usize,
    /// Maximum idle connections kept around.
    #[serde(default)]
    pub max_idle: usize,
    /// Close connections older than this.
    #[serde(default)]
    pub max_lifetime: Option<Duration>,
    /// Close connections idle longer than this.
    #[serde(default)]
    pub max_idle_time: Option<Duration>,
}

/// One physical database behind a shard.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct PoolConfig {
    /// Connection string. Opening it is the embedder's concern.
    pub dsn: String,
    #[serde(default)]
    pub options: PoolOptions,
}

impl PoolConfig {
    pub fn new(dsn: impl Into<String>) -> Self {
        Self {
            dsn: dsn.into(),
            options: PoolOptions::default(),
        }
    }

    pub fn options(mut self, options: PoolOptions) -> Self {
        self.options = options;
        self
    }
}
