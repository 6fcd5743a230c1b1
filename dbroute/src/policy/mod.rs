//! Routing policies.
//!
//! Database and table sharding behaviors are strategy objects bound to a
//! routing group at registration time: random or rule-driven shard
//! selection, passthrough or rule-driven table selection.

pub mod database;
pub mod table;

pub use database::{DatabasePolicy, DatabaseRoute, RandomPolicy, ShardedDatabasePolicy};
pub use table::{PassthroughPolicy, ShardedTablePolicy, TablePolicy, TableRoute};

use indexmap::IndexMap;

use crate::pool::PoolHandle;

/// Shard name.
pub type ShardName = String;

/// Pools grouped by shard name, in registration order.
pub type PoolSet = IndexMap<ShardName, Vec<PoolHandle>>;

/// Shard name used when the embedder never named any.
pub const DEFAULT_SHARD: &str = "default";
