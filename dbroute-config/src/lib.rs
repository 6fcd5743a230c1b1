//! Declarative configuration for the dbroute statement router.
//!
//! Pure data: sharding rules and pool definitions, typically loaded from a
//! JSON document written by the embedder. Compiling these into routing
//! groups is the router's job.

// Submodules
pub mod error;
pub mod pool;
pub mod rule;

pub use error::Error;
pub use pool::{PoolConfig, PoolOptions};
pub use rule::{ArchiveRule, ArchiveTarget, CommandRule, RuleSet, ShardingRule};
