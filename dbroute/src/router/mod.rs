//! Route orchestrator.
//!
//! Compiles declarative configuration units into routing groups, then
//! resolves the group, pool, and rewritten SQL for each statement. All
//! compiled state is immutable; resolution never locks anything except a
//! pool's statement cache.

pub mod classify;
pub mod group;
pub mod trace;

pub use classify::{classify, Operation, StatementKind};
pub use group::RoutingGroup;
pub use trace::{format_trace, route_mode, Role, ROUTE_MODE_KEY};

use std::collections::HashMap;
use std::sync::Arc;

use fnv::FnvHashSet;
use indexmap::IndexMap;
use tracing::debug;

use dbroute_config::PoolConfig;

use crate::error::Error;
use crate::policy::{
    DatabasePolicy, PassthroughPolicy, PoolSet, RandomPolicy, ShardName, TablePolicy,
    DEFAULT_SHARD,
};
use crate::pool::{PoolHandle, StatementCache};
use crate::statement::StatementView;

/// Hook invoked once for every distinct registered pool, including pools
/// registered after the hook was installed.
pub type PoolHook = Box<dyn FnMut(&PoolHandle) -> Result<(), Error> + Send>;

/// Pool definition inside a configuration unit.
#[derive(Debug, Clone)]
pub enum PoolDef {
    /// Open a new pool at compile time.
    Open(PoolConfig),
    /// Attach a pool that is already open.
    Attached(PoolHandle),
}

impl From<PoolConfig> for PoolDef {
    fn from(config: PoolConfig) -> Self {
        PoolDef::Open(config)
    }
}

impl From<PoolHandle> for PoolDef {
    fn from(pool: PoolHandle) -> Self {
        PoolDef::Attached(pool)
    }
}

impl From<&str> for PoolDef {
    fn from(dsn: &str) -> Self {
        PoolDef::Open(PoolConfig::new(dsn))
    }
}

/// One declarative configuration unit: master/slave pools per shard plus
/// policies, applied to a set of tables. A unit with no tables becomes
/// the global fallback.
#[derive(Debug, Clone, Default)]
pub struct ConfigUnit {
    masters: IndexMap<ShardName, Vec<PoolDef>>,
    slaves: IndexMap<ShardName, Vec<PoolDef>>,
    db_policy: Option<Arc<dyn DatabasePolicy>>,
    tb_policy: Option<Arc<dyn TablePolicy>>,
    trace: bool,
    tables: Vec<String>,
}

impl ConfigUnit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Master pools for one shard.
    pub fn masters(
        mut self,
        shard: impl Into<ShardName>,
        pools: impl IntoIterator<Item = impl Into<PoolDef>>,
    ) -> Self {
        self.masters
            .entry(shard.into())
            .or_default()
            .extend(pools.into_iter().map(Into::into));
        self
    }

    /// Slave pools for one shard.
    pub fn slaves(
        mut self,
        shard: impl Into<ShardName>,
        pools: impl IntoIterator<Item = impl Into<PoolDef>>,
    ) -> Self {
        self.slaves
            .entry(shard.into())
            .or_default()
            .extend(pools.into_iter().map(Into::into));
        self
    }

    /// Database policy. Random when not set.
    pub fn db_policy(mut self, policy: impl DatabasePolicy + 'static) -> Self {
        self.db_policy = Some(Arc::new(policy));
        self
    }

    /// Table policy. Passthrough when not set.
    pub fn tb_policy(mut self, policy: impl TablePolicy + 'static) -> Self {
        self.tb_policy = Some(Arc::new(policy));
        self
    }

    /// Tag routed statements with the shard and role they went to.
    pub fn trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    /// Tables this unit routes.
    pub fn tables(mut self, tables: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tables.extend(tables.into_iter().map(Into::into));
        self
    }

    /// One table this unit routes.
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.tables.push(table.into());
        self
    }
}

/// Outcome of routing one statement.
#[derive(Debug, Clone)]
pub struct RoutingDecision {
    /// Classified operation.
    pub operation: Operation,
    /// Shard that was chosen; `None` on passthrough.
    pub shard: Option<ShardName>,
    /// Role of the chosen pool; `None` on passthrough.
    pub role: Option<Role>,
    /// Physical table the statement targets.
    pub table: String,
    /// Statement text to execute, rewritten when table sharding applied.
    pub sql: String,
    /// Pool to execute on.
    pub pool: PoolHandle,
    /// Shared prepared-statement cache of the pool, when the host
    /// prepares statements.
    pub statements: Option<Arc<StatementCache>>,
}

impl RoutingDecision {
    fn passthrough(op: Operation, stmt: &StatementView, pool: PoolHandle) -> Self {
        Self {
            operation: op,
            shard: None,
            role: None,
            table: stmt.table.clone(),
            sql: stmt.sql.clone(),
            pool,
            statements: None,
        }
    }
}

/// Statement router.
///
/// Register configuration units, compile once at startup, then resolve
/// per statement from any thread.
pub struct Router {
    default_pool: PoolHandle,
    configs: Vec<ConfigUnit>,
    routes: HashMap<String, Arc<RoutingGroup>>,
    global: Option<Arc<RoutingGroup>>,
    statement_caches: HashMap<u64, Arc<StatementCache>>,
    pools: Vec<PoolHandle>,
    pool_ids: FnvHashSet<u64>,
    pool_hooks: Vec<PoolHook>,
}

impl Router {
    /// New router around the already-open default pool.
    pub fn new(default_pool: PoolHandle) -> Self {
        Self {
            default_pool,
            configs: vec![],
            routes: HashMap::new(),
            global: None,
            statement_caches: HashMap::new(),
            pools: vec![],
            pool_ids: FnvHashSet::default(),
            pool_hooks: vec![],
        }
    }

    /// Queue a configuration unit. Chainable; [`Router::compile`] applies
    /// queued units.
    pub fn register(mut self, config: ConfigUnit) -> Self {
        self.configs.push(config);
        self
    }

    /// Compile queued configuration units into routing groups. May be
    /// called again after registering more units.
    pub fn compile(&mut self) -> Result<(), Error> {
        let configs = std::mem::take(&mut self.configs);
        for config in configs {
            self.compile_config(config)?;
        }
        Ok(())
    }

    fn compile_config(&mut self, config: ConfigUnit) -> Result<(), Error> {
        let ConfigUnit {
            masters,
            slaves,
            db_policy,
            tb_policy,
            trace,
            tables,
        } = config;

        let masters = if masters.is_empty() {
            // No masters: route everything to the default pool.
            let mut set = PoolSet::default();
            set.insert(DEFAULT_SHARD.to_string(), vec![self.default_pool.clone()]);
            set
        } else {
            open_pools(masters)?
        };

        let slaves = if slaves.is_empty() {
            None
        } else {
            Some(open_pools(slaves)?)
        };

        let group = Arc::new(RoutingGroup {
            masters,
            slaves,
            db_policy: db_policy.unwrap_or_else(|| Arc::new(RandomPolicy)),
            tb_policy: tb_policy.unwrap_or_else(|| Arc::new(PassthroughPolicy)),
            trace,
        });

        if tables.is_empty() {
            if self.global.is_some() {
                return Err(Error::ConflictedGlobalResolver);
            }
            debug!("registered global routing group");
            self.global = Some(group.clone());
        } else {
            debug!(tables = ?tables, "registered routing group");
            for table in tables {
                self.routes.insert(table, group.clone());
            }
        }

        self.register_pools(&group)
    }

    fn register_pools(&mut self, group: &RoutingGroup) -> Result<(), Error> {
        let mut fresh = vec![];
        let _ = group.each_pool(&mut |pool| -> Result<(), ()> {
            if self.pool_ids.insert(pool.id()) {
                self.statement_caches
                    .insert(pool.id(), Arc::new(StatementCache::new()));
                self.pools.push(pool.clone());
                fresh.push(pool.clone());
            }
            Ok(())
        });

        for pool in &fresh {
            for hook in self.pool_hooks.iter_mut() {
                hook(pool)?;
            }
        }

        Ok(())
    }

    /// Install a pool hook. Replays over every already-registered pool,
    /// so late observers never miss one.
    pub fn on_pool(
        &mut self,
        mut hook: impl FnMut(&PoolHandle) -> Result<(), Error> + Send + 'static,
    ) -> Result<(), Error> {
        for pool in &self.pools {
            hook(pool)?;
        }
        self.pool_hooks.push(Box::new(hook));
        Ok(())
    }

    /// Every distinct pool registered so far, in registration order.
    pub fn pools(&self) -> &[PoolHandle] {
        &self.pools
    }

    /// Statement cache of a pool registered here.
    pub fn statement_cache(&self, pool: &PoolHandle) -> Option<Arc<StatementCache>> {
        self.statement_caches.get(&pool.id()).cloned()
    }

    /// Resolve the route for a statement.
    ///
    /// The host renders `stmt.sql` before resolution; rule-driven policies
    /// additionally want `stmt.rendered_sql` so shard-key values are
    /// visible in the text.
    pub fn route(
        &self,
        stmt: &mut StatementView,
        kind: StatementKind,
    ) -> Result<RoutingDecision, Error> {
        let op = classify(stmt, kind);
        if op == Operation::SkipRerouting {
            return Ok(RoutingDecision::passthrough(op, stmt, self.original_pool(stmt)));
        }

        let Some(group) = self.group_for(stmt) else {
            return Ok(RoutingDecision::passthrough(op, stmt, self.original_pool(stmt)));
        };
        let group = group.clone();

        let table_route = group.rewrite(stmt)?;
        let rendered = stmt.rendered().to_string();
        let (db_route, role) = group.route(stmt, &rendered, op)?;

        let statements = if stmt.prepare {
            self.statement_cache(&db_route.pool)
        } else {
            None
        };

        Ok(RoutingDecision {
            operation: op,
            shard: Some(db_route.shard),
            role: Some(role),
            table: table_route
                .actual_table
                .unwrap_or_else(|| stmt.table.clone()),
            sql: table_route.sql,
            pool: db_route.pool,
            statements,
        })
    }

    /// Group lookup: explicit override, table name, schema-qualified
    /// table name, global fallback.
    fn group_for(&self, stmt: &StatementView) -> Option<&Arc<RoutingGroup>> {
        if !self.routes.is_empty() {
            if let Some(name) = &stmt.clauses.use_route {
                if let Some(group) = self.routes.get(name) {
                    return Some(group);
                }
            }

            if !stmt.table.is_empty() {
                if let Some(group) = self.routes.get(&stmt.table) {
                    return Some(group);
                }
            }

            if let Some(schema_table) = &stmt.schema_table {
                if let Some(group) = self.routes.get(schema_table) {
                    return Some(group);
                }
            }
        }

        self.global.as_ref()
    }

    fn original_pool(&self, stmt: &StatementView) -> PoolHandle {
        stmt.pool
            .clone()
            .unwrap_or_else(|| self.default_pool.clone())
    }
}

fn open_pools(defs: IndexMap<ShardName, Vec<PoolDef>>) -> Result<PoolSet, Error> {
    let mut set = PoolSet::default();
    for (shard, defs) in defs {
        if defs.is_empty() {
            return Err(Error::NoPools(shard));
        }

        let pools = defs
            .into_iter()
            .map(|def| match def {
                PoolDef::Open(config) => PoolHandle::new(&config),
                PoolDef::Attached(pool) => pool,
            })
            .collect();
        set.insert(shard, pools);
    }

    Ok(set)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn default_pool() -> PoolHandle {
        PoolHandle::new(&PoolConfig::new("db://default"))
    }

    #[test]
    fn second_global_unit_conflicts() {
        let mut router = Router::new(default_pool())
            .register(ConfigUnit::new())
            .register(ConfigUnit::new());

        let err = router.compile().unwrap_err();
        assert!(matches!(err, Error::ConflictedGlobalResolver));
    }

    #[test]
    fn lookup_precedence() {
        let mut router = Router::new(default_pool())
            .register(ConfigUnit::new().table("orders").masters("shard_a", ["db://a"]))
            .register(ConfigUnit::new().table("special").masters("shard_b", ["db://b"]))
            .register(ConfigUnit::new().masters("shard_g", ["db://g"]));
        router.compile().unwrap();

        // Table name.
        let mut stmt = StatementView::new("orders", "select id from orders where id=11");
        let decision = router.route(&mut stmt, StatementKind::Raw).unwrap();
        assert_eq!(decision.shard.as_deref(), Some("shard_a"));

        // Explicit override beats the table name.
        let mut stmt = StatementView::new("orders", "select id from orders where id=11");
        stmt.clauses.use_route = Some("special".into());
        let decision = router.route(&mut stmt, StatementKind::Raw).unwrap();
        assert_eq!(decision.shard.as_deref(), Some("shard_b"));

        // Schema-qualified name.
        let mut stmt = StatementView::new("", "select id from unmapped where id=11");
        stmt.schema_table = Some("special".into());
        let decision = router.route(&mut stmt, StatementKind::Raw).unwrap();
        assert_eq!(decision.shard.as_deref(), Some("shard_b"));

        // Global fallback.
        let mut stmt = StatementView::new("unmapped", "select id from unmapped where id=11");
        let decision = router.route(&mut stmt, StatementKind::Raw).unwrap();
        assert_eq!(decision.shard.as_deref(), Some("shard_g"));
    }

    #[test]
    fn no_group_full_passthrough() {
        let mut router = Router::new(default_pool())
            .register(ConfigUnit::new().table("orders").masters("shard_a", ["db://a"]));
        router.compile().unwrap();

        let sql = "select id from unmapped where id=11";
        let mut stmt = StatementView::new("unmapped", sql);
        let decision = router.route(&mut stmt, StatementKind::Raw).unwrap();

        assert_eq!(decision.shard, None);
        assert_eq!(decision.role, None);
        assert_eq!(decision.sql, sql);
        assert_eq!(decision.pool, router.default_pool);
    }

    #[test]
    fn masterless_unit_uses_default_pool() {
        let pool = default_pool();
        let mut router = Router::new(pool.clone()).register(ConfigUnit::new().table("orders"));
        router.compile().unwrap();

        let mut stmt = StatementView::new("orders", "select id from orders where id=11");
        let decision = router.route(&mut stmt, StatementKind::Raw).unwrap();
        assert_eq!(decision.pool, pool);
        assert_eq!(decision.shard.as_deref(), Some(DEFAULT_SHARD));
    }

    #[test]
    fn empty_shard_pool_list_rejected() {
        let mut router = Router::new(default_pool())
            .register(ConfigUnit::new().table("orders").masters("shard_a", Vec::<PoolDef>::new()));

        let err = router.compile().unwrap_err();
        assert!(matches!(err, Error::NoPools(shard) if shard == "shard_a"));
    }

    #[test]
    fn shared_pool_shares_statement_cache() {
        let shared = PoolHandle::new(&PoolConfig::new("db://shared"));
        let mut router = Router::new(default_pool())
            .register(ConfigUnit::new().table("orders").masters("shard_a", [shared.clone()]))
            .register(ConfigUnit::new().table("users").masters("shard_a", [shared.clone()]));
        router.compile().unwrap();

        let cache = router.statement_cache(&shared).unwrap();
        let again = router.statement_cache(&shared).unwrap();
        assert!(Arc::ptr_eq(&cache, &again));

        // One registration for the shared pool, plus nothing else.
        assert_eq!(router.pools().len(), 1);
    }

    #[test]
    fn prepared_statements_attach_cache() {
        let mut router = Router::new(default_pool())
            .register(ConfigUnit::new().table("orders").masters("shard_a", ["db://a"]));
        router.compile().unwrap();

        let mut stmt = StatementView::new("orders", "select id from orders where id=11");
        stmt.prepare = true;
        let decision = router.route(&mut stmt, StatementKind::Raw).unwrap();
        let cache = decision.statements.unwrap();

        let prepared = cache.get_or_prepare(&decision.sql);
        assert_eq!(cache.get(&decision.sql), Some(prepared));
    }

    #[test]
    fn hooks_replay_over_existing_and_future_pools() {
        static SEEN: AtomicUsize = AtomicUsize::new(0);

        let mut router = Router::new(default_pool())
            .register(ConfigUnit::new().table("orders").masters("shard_a", ["db://a", "db://b"]));
        router.compile().unwrap();

        router
            .on_pool(|_pool| {
                SEEN.fetch_add(1, Ordering::Relaxed);
                Ok(())
            })
            .unwrap();
        assert_eq!(SEEN.load(Ordering::Relaxed), 2);

        // Late registration still reaches the hook.
        router = router.register(ConfigUnit::new().table("users").masters("shard_b", ["db://c"]));
        router.compile().unwrap();
        assert_eq!(SEEN.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn transaction_statement_keeps_its_pool() {
        let bound = PoolHandle::new(&PoolConfig::new("db://txn"));
        let mut router = Router::new(default_pool())
            .register(ConfigUnit::new().table("orders").masters("shard_a", ["db://a"]));
        router.compile().unwrap();

        let mut stmt = StatementView::new("orders", "select id from orders where id=11");
        stmt.in_transaction = true;
        stmt.pool = Some(bound.clone());

        let decision = router.route(&mut stmt, StatementKind::Raw).unwrap();
        assert_eq!(decision.operation, Operation::SkipRerouting);
        assert_eq!(decision.pool, bound);
        assert_eq!(route_mode(&stmt.context), None);
    }
}
