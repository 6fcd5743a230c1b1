//! Database (shard) selection.

use std::fmt::Debug;

use rand::Rng;
use tracing::debug;

use dbroute_config::RuleSet;

use super::{PoolSet, ShardName};
use crate::error::Error;
use crate::expr::{self, ExprValue};
use crate::parser;
use crate::pool::PoolHandle;
use crate::statement::Context;

/// Chosen shard and pool.
#[derive(Debug, Clone)]
pub struct DatabaseRoute {
    pub shard: ShardName,
    pub pool: PoolHandle,
}

/// Selects the shard, and one of its pools, a statement executes on.
pub trait DatabasePolicy: Debug + Send + Sync {
    fn resolve(
        &self,
        ctx: &Context,
        pools: &PoolSet,
        table: &str,
        sql: &str,
    ) -> Result<DatabaseRoute, Error>;
}

/// Uniform random shard and pool. The default.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomPolicy;

impl DatabasePolicy for RandomPolicy {
    fn resolve(
        &self,
        _ctx: &Context,
        pools: &PoolSet,
        _table: &str,
        _sql: &str,
    ) -> Result<DatabaseRoute, Error> {
        random_route(pools)
    }
}

/// Rule-driven shard selection.
///
/// Tables without a rule, and rules that configure no shard key, fall back
/// to random selection; a sharded table always routes somewhere valid or
/// fails loudly, never silently lands on a wrong shard.
#[derive(Debug, Clone)]
pub struct ShardedDatabasePolicy {
    rules: RuleSet,
}

impl ShardedDatabasePolicy {
    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }
}

impl DatabasePolicy for ShardedDatabasePolicy {
    fn resolve(
        &self,
        ctx: &Context,
        pools: &PoolSet,
        table: &str,
        sql: &str,
    ) -> Result<DatabaseRoute, Error> {
        let Some(rule) = self.rules.get(table).filter(|rule| !rule.unsharded()) else {
            return random_route(pools);
        };

        if let Some(shard) = ctx.shard_index(table) {
            debug!(table, shard, "pre-set database sharding");
            let list = pools
                .get(shard)
                .ok_or_else(|| Error::UnknownShard(shard.to_string()))?;
            return pick(shard, list);
        }

        let shard = match &rule.database_default_sharding_value {
            Some(value) => value.clone(),
            None => {
                let parameter = rule
                    .database_sharding_parameter
                    .as_deref()
                    .ok_or_else(|| Error::IncompleteRule(table.to_string()))?;
                let expression = rule
                    .database_sharding_expression
                    .as_deref()
                    .ok_or_else(|| Error::IncompleteRule(table.to_string()))?;

                let value = parser::bound_value(sql, parameter)?.ok_or_else(|| {
                    Error::Eval(expr::Error::MissingParameter(parameter.to_string()))
                })?;
                let shard = expr::evaluate(expression, parameter, &ExprValue::from(value))?
                    .to_string();
                debug!(table, shard = %shard, "database sharding");
                shard
            }
        };

        let list = pools
            .get(shard.as_str())
            .ok_or_else(|| Error::UnknownShard(shard.clone()))?;
        pick(&shard, list)
    }
}

fn random_route(pools: &PoolSet) -> Result<DatabaseRoute, Error> {
    if pools.is_empty() {
        return Err(Error::NoShards);
    }

    let index = rand::rng().random_range(0..pools.len());
    let (shard, list) = pools.get_index(index).ok_or(Error::NoShards)?;
    pick(shard, list)
}

fn pick(shard: &str, pools: &[PoolHandle]) -> Result<DatabaseRoute, Error> {
    if pools.is_empty() {
        return Err(Error::NoPools(shard.to_string()));
    }

    let index = rand::rng().random_range(0..pools.len());
    Ok(DatabaseRoute {
        shard: shard.to_string(),
        pool: pools[index].clone(),
    })
}
