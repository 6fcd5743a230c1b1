//! Routing groups: the pools and policies governing one table, or the
//! global fallback.

use std::sync::Arc;

use super::classify::Operation;
use super::trace::{self, Role};
use crate::error::Error;
use crate::policy::{DatabasePolicy, DatabaseRoute, PoolSet, TablePolicy, TableRoute};
use crate::pool::PoolHandle;
use crate::statement::StatementView;

/// Compiled routing group. Immutable once built.
#[derive(Debug)]
pub struct RoutingGroup {
    pub(super) masters: PoolSet,
    pub(super) slaves: Option<PoolSet>,
    pub(super) db_policy: Arc<dyn DatabasePolicy>,
    pub(super) tb_policy: Arc<dyn TablePolicy>,
    pub(super) trace: bool,
}

impl RoutingGroup {
    /// Apply the table policy: physical table name and rewritten SQL.
    pub fn rewrite(&self, stmt: &StatementView) -> Result<TableRoute, Error> {
        self.tb_policy.resolve(&stmt.context, &stmt.table, &stmt.sql)
    }

    /// Apply the database policy: shard and pool. Reads go to slaves when
    /// any are configured, everything else to masters.
    pub fn route(
        &self,
        stmt: &mut StatementView,
        sql: &str,
        op: Operation,
    ) -> Result<(DatabaseRoute, Role), Error> {
        let (pools, role) = match (&self.slaves, op) {
            (Some(slaves), Operation::Read) => (slaves, Role::Slave),
            _ => (&self.masters, Role::Master),
        };

        let route = self.db_policy.resolve(&stmt.context, pools, &stmt.table, sql)?;
        if self.trace {
            trace::mark(&mut stmt.context, &route.shard, role);
        }

        Ok((route, role))
    }

    /// Visit every pool in the group, masters first.
    pub fn each_pool<E, F>(&self, f: &mut F) -> Result<(), E>
    where
        F: FnMut(&PoolHandle) -> Result<(), E>,
    {
        for pools in self.masters.values() {
            for pool in pools {
                f(pool)?;
            }
        }

        if let Some(slaves) = &self.slaves {
            for pools in slaves.values() {
                for pool in pools {
                    f(pool)?;
                }
            }
        }

        Ok(())
    }

    /// All pools in the group.
    pub fn pools(&self) -> Vec<PoolHandle> {
        let mut pools = vec![];
        let _ = self.each_pool(&mut |pool| -> Result<(), ()> {
            pools.push(pool.clone());
            Ok(())
        });
        pools
    }

    /// Slaves are configured.
    pub fn has_slaves(&self) -> bool {
        self.slaves.is_some()
    }
}
