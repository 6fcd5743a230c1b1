//! Statement routing between an application's data-access calls and a set
//! of physical connection pools.
//!
//! For each outgoing statement the router decides whether it reads or
//! writes, which shard receives it, which physical table it targets, and
//! how to rewrite the statement text to match, with explicit overrides
//! and a random fallback for unconfigured tables.
//!
//! ```
//! use dbroute::config::{PoolConfig, RuleSet};
//! use dbroute::policy::{ShardedDatabasePolicy, ShardedTablePolicy};
//! use dbroute::{ConfigUnit, PoolHandle, Router, StatementKind, StatementView};
//!
//! let rules = RuleSet::from_json(
//!     r#"[{
//!         "table": "orders",
//!         "database-sharding-parameter": "user_id",
//!         "database-sharding-expression": "parse('shard_', mod(user_id, 2))"
//!     }]"#,
//! )
//! .unwrap();
//!
//! let mut router = Router::new(PoolHandle::new(&PoolConfig::new("db://default")))
//!     .register(
//!         ConfigUnit::new()
//!             .table("orders")
//!             .masters("shard_0", ["db://shard0"])
//!             .masters("shard_1", ["db://shard1"])
//!             .db_policy(ShardedDatabasePolicy::new(rules.clone()))
//!             .tb_policy(ShardedTablePolicy::new(rules)),
//!     );
//! router.compile().unwrap();
//!
//! let mut stmt = StatementView::new("orders", "SELECT * FROM orders WHERE user_id = 5");
//! let decision = router.route(&mut stmt, StatementKind::Raw).unwrap();
//! assert_eq!(decision.shard.as_deref(), Some("shard_1"));
//! ```

pub mod error;
pub mod expr;
pub mod parser;
pub mod policy;
pub mod pool;
pub mod router;
pub mod statement;

pub use dbroute_config as config;

pub use error::Error;
pub use pool::{PoolHandle, PreparedStatement, StatementCache};
pub use router::{
    classify, format_trace, route_mode, ConfigUnit, Operation, PoolDef, Role, Router,
    RoutingDecision, RoutingGroup, StatementKind, ROUTE_MODE_KEY,
};
pub use statement::{Clauses, Context, ContextValue, StatementView};
