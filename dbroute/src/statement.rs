//! Statement descriptor supplied by the host.
//!
//! The router reads everything and writes nothing, except the diagnostics
//! marker stored in [`Context`].

use std::collections::HashMap;

use crate::pool::PoolHandle;

// Context key formats for pre-set overrides.
const SHARD_INDEX_KEY: &str = "dbIndex_";
const TABLE_INDEX_KEY: &str = "tableIndex_";

/// Typed values stored in the statement [`Context`].
#[derive(Debug, Clone, PartialEq)]
pub enum ContextValue {
    Str(String),
    Int(i64),
}

impl From<&str> for ContextValue {
    fn from(value: &str) -> Self {
        ContextValue::Str(value.to_string())
    }
}

impl From<String> for ContextValue {
    fn from(value: String) -> Self {
        ContextValue::Str(value)
    }
}

impl From<i64> for ContextValue {
    fn from(value: i64) -> Self {
        ContextValue::Int(value)
    }
}

/// Per-statement key/value store: pre-set sharding overrides and the
/// diagnostics route marker.
#[derive(Debug, Clone, Default)]
pub struct Context {
    values: HashMap<String, ContextValue>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ContextValue>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.values.get(key)
    }

    /// Pre-set the shard a table's statements go to, bypassing SQL parsing
    /// and expression evaluation.
    pub fn set_shard_index(&mut self, table: &str, shard: impl Into<String>) {
        self.insert(format!("{}{}", SHARD_INDEX_KEY, table), shard.into());
    }

    /// Pre-set shard for a table, if the caller stored one.
    pub fn shard_index(&self, table: &str) -> Option<&str> {
        match self.get(&format!("{}{}", SHARD_INDEX_KEY, table))? {
            ContextValue::Str(shard) => Some(shard),
            _ => None,
        }
    }

    /// Pre-set the physical table suffix, bypassing SQL parsing and
    /// expression evaluation.
    pub fn set_table_index(&mut self, table: &str, index: i64) {
        self.insert(format!("{}{}", TABLE_INDEX_KEY, table), index);
    }

    /// Pre-set table suffix for a table, if the caller stored one.
    pub fn table_index(&self, table: &str) -> Option<i64> {
        match self.get(&format!("{}{}", TABLE_INDEX_KEY, table))? {
            ContextValue::Int(index) => Some(*index),
            _ => None,
        }
    }
}

/// Clauses the host declared on the statement, as far as routing cares.
#[derive(Debug, Clone, Default)]
pub struct Clauses {
    /// Explicit route-override directive: route through the named group
    /// regardless of table name.
    pub use_route: Option<String>,
    /// Pessimistic locking clause (`FOR UPDATE` class).
    pub locking: bool,
    /// Caller forced write routing.
    pub write: bool,
}

/// Read-only descriptor of a statement about to execute.
#[derive(Debug, Clone, Default)]
pub struct StatementView {
    /// Logical table name, if the host resolved one.
    pub table: String,
    /// Model-derived table name, when it differs from `table`.
    pub schema_table: Option<String>,
    /// Parameterized SQL text. Empty when clauses have not been rendered
    /// into SQL yet.
    pub sql: String,
    /// SQL with parameter values substituted by the host dialect. Sharded
    /// policies extract shard-key values from this text.
    pub rendered_sql: Option<String>,
    /// Declared clauses.
    pub clauses: Clauses,
    /// Statement already runs on a transaction-scoped connection.
    pub in_transaction: bool,
    /// Host prepares statements on this connection.
    pub prepare: bool,
    /// Connection pool the statement is currently bound to, if any.
    pub pool: Option<PoolHandle>,
    /// Pre-set overrides and diagnostics markers.
    pub context: Context,
}

impl StatementView {
    pub fn new(table: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            sql: sql.into(),
            ..Default::default()
        }
    }

    /// Text used for shard-key extraction: the rendered SQL when the host
    /// provided it, the parameterized text otherwise.
    pub fn rendered(&self) -> &str {
        self.rendered_sql.as_deref().unwrap_or(&self.sql)
    }
}
