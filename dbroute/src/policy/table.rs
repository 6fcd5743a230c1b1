//! Table (suffix) selection and SQL rewrite.

use std::fmt::Debug;

use tracing::debug;

use dbroute_config::RuleSet;

use crate::error::Error;
use crate::expr::{self, ExprValue};
use crate::parser;
use crate::statement::Context;

/// Result of table-level routing.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRoute {
    /// Physical table the statement targets, when table sharding applied.
    pub actual_table: Option<String>,
    /// Statement text, rewritten when table sharding applied.
    pub sql: String,
}

impl TableRoute {
    fn passthrough(sql: &str) -> Self {
        Self {
            actual_table: None,
            sql: sql.to_string(),
        }
    }
}

/// Maps a logical table to the physical table a statement targets.
pub trait TablePolicy: Debug + Send + Sync {
    fn resolve(&self, ctx: &Context, table: &str, sql: &str) -> Result<TableRoute, Error>;
}

/// Leaves statements untouched. The default.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughPolicy;

impl TablePolicy for PassthroughPolicy {
    fn resolve(&self, _ctx: &Context, _table: &str, sql: &str) -> Result<TableRoute, Error> {
        Ok(TableRoute::passthrough(sql))
    }
}

/// Rule-driven table sharding: rewrites the statement to target the
/// physical table computed from a pre-set index or the rule's expression.
#[derive(Debug, Clone)]
pub struct ShardedTablePolicy {
    rules: RuleSet,
}

impl ShardedTablePolicy {
    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }
}

impl TablePolicy for ShardedTablePolicy {
    fn resolve(&self, ctx: &Context, table: &str, sql: &str) -> Result<TableRoute, Error> {
        let Some(rule) = self.rules.get(table) else {
            return Ok(TableRoute::passthrough(sql));
        };

        if let Some(index) = ctx.table_index(table) {
            let actual = format!("{}_{}", table, index);
            debug!(table, actual = %actual, "pre-set table sharding");
            let sql = parser::rewrite_table(sql, &actual)?;
            return Ok(TableRoute {
                actual_table: Some(actual),
                sql,
            });
        }

        if rule.table_unsharded() {
            return Ok(TableRoute::passthrough(sql));
        }

        // The bound value is extracted with the database-level shard-key
        // parameter; the table parameter only names the binding inside the
        // expression. Longstanding behavior, kept as is.
        let extract_parameter = rule
            .database_sharding_parameter
            .as_deref()
            .ok_or_else(|| Error::IncompleteRule(table.to_string()))?;
        let bind_parameter = rule
            .table_sharding_parameter
            .as_deref()
            .ok_or_else(|| Error::IncompleteRule(table.to_string()))?;
        let expression = rule
            .table_sharding_expression
            .as_deref()
            .ok_or_else(|| Error::IncompleteRule(table.to_string()))?;

        let value = parser::bound_value(sql, extract_parameter)?.ok_or_else(|| {
            Error::Eval(expr::Error::MissingParameter(extract_parameter.to_string()))
        })?;
        let actual = expr::evaluate(expression, bind_parameter, &ExprValue::from(value))?
            .to_string();
        debug!(table, actual = %actual, "table sharding");

        let sql = parser::rewrite_table(sql, &actual)?;
        Ok(TableRoute {
            actual_table: Some(actual),
            sql,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn rules() -> RuleSet {
        RuleSet::from_json(
            r#"[
                {
                    "table": "orders",
                    "database-sharding-parameter": "user_id",
                    "database-sharding-expression": "parse('shard_', mod(user_id, 2))",
                    "table-sharding-parameter": "uid",
                    "table-sharding-expression": "parse('orders_', mod(uid, 4))"
                },
                {
                    "table": "settings",
                    "database-default-sharding-value": "shard_0"
                }
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn no_rule_passes_through() {
        let policy = ShardedTablePolicy::new(rules());
        let sql = "SELECT * FROM users WHERE id = 1";
        let route = policy.resolve(&Context::new(), "users", sql).unwrap();
        assert_eq!(route.actual_table, None);
        assert_eq!(route.sql, sql);
    }

    #[test]
    fn db_only_rule_passes_through() {
        let policy = ShardedTablePolicy::new(rules());
        let sql = "SELECT * FROM settings WHERE id = 1";
        let route = policy.resolve(&Context::new(), "settings", sql).unwrap();
        assert_eq!(route.actual_table, None);
        assert_eq!(route.sql, sql);
    }

    #[test]
    fn preset_index_rewrites() {
        let policy = ShardedTablePolicy::new(rules());
        let mut ctx = Context::new();
        ctx.set_table_index("orders", 2);

        let route = policy
            .resolve(&ctx, "orders", "SELECT * FROM orders WHERE id = ?")
            .unwrap();
        assert_eq!(route.actual_table.as_deref(), Some("orders_2"));
        assert!(route.sql.contains("orders_2"), "{}", route.sql);
        assert_eq!(route.sql.matches('?').count(), 1);
    }

    // The rule's table expression binds `uid`, but the value comes out of
    // the WHERE clause under the database parameter `user_id`.
    #[test]
    fn table_policy_reads_database_shard_parameter() {
        let policy = ShardedTablePolicy::new(rules());

        let route = policy
            .resolve(
                &Context::new(),
                "orders",
                "SELECT * FROM orders WHERE user_id = 6",
            )
            .unwrap();
        assert_eq!(route.actual_table.as_deref(), Some("orders_2"));

        // A `uid` predicate alone is not enough.
        let err = policy
            .resolve(
                &Context::new(),
                "orders",
                "SELECT * FROM orders WHERE uid = 6",
            )
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Eval(expr::Error::MissingParameter(parameter)) if parameter == "user_id"
        ));
    }

    #[test]
    fn rewrite_failure_propagates() {
        let policy = ShardedTablePolicy::new(rules());
        let mut ctx = Context::new();
        ctx.set_table_index("orders", 1);

        let err = policy
            .resolve(&ctx, "orders", "UPDATE orders SET total = 0 WHERE user_id = 6")
            .unwrap_err();
        assert!(matches!(err, Error::Parser(parser::Error::UpdateUnsupported)));
    }

    // UPDATE never reaches the rewrite: extraction only sees SELECT and
    // DELETE WHERE clauses, so the shard key comes up missing first.
    #[test]
    fn update_sharding_always_fails() {
        let policy = ShardedTablePolicy::new(rules());
        let err = policy
            .resolve(
                &Context::new(),
                "orders",
                "UPDATE orders SET total = 0 WHERE user_id = 6",
            )
            .unwrap_err();
        assert!(matches!(err, Error::Eval(expr::Error::MissingParameter(_))));
    }
}
