//! Sharding rules.
//!
//! The schema mirrors the JSON rule documents embedders already write:
//! kebab-case keys, everything past the table name optional.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Sharding rule for one logical table.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ShardingRule {
    /// Logical table the rule applies to.
    pub table: String,
    /// Fixed shard every statement for this table goes to.
    #[serde(default)]
    pub database_default_sharding_value: Option<String>,
    /// Column whose bound value selects the shard.
    #[serde(default)]
    pub database_sharding_parameter: Option<String>,
    /// Expression evaluated against the shard-key value; yields a shard name.
    #[serde(default)]
    pub database_sharding_expression: Option<String>,
    /// Parameter name bound when evaluating the table expression.
    #[serde(default)]
    pub table_sharding_parameter: Option<String>,
    /// Expression yielding the physical table name.
    #[serde(default)]
    pub table_sharding_expression: Option<String>,
    /// Command-scoped archival rules. Carried for embedders; core routing
    /// does not consult them.
    #[serde(default)]
    pub rules: Vec<CommandRule>,
}

impl ShardingRule {
    /// The rule selects shards neither by fixed value nor by key.
    pub fn unsharded(&self) -> bool {
        self.database_default_sharding_value.is_none()
            && self.database_sharding_parameter.is_none()
    }

    /// The rule has no table-level sharding configured.
    pub fn table_unsharded(&self) -> bool {
        self.table_sharding_parameter.is_none() && self.table_sharding_expression.is_none()
    }
}

/// Per-command override of the table sharding behavior.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct CommandRule {
    #[serde(default)]
    pub command_type: String,
    #[serde(default)]
    pub table_sharding_parameter: Option<String>,
    #[serde(default)]
    pub table_sharding_expression: Option<String>,
    #[serde(default)]
    pub write_back: bool,
    #[serde(default)]
    pub child_rule: Vec<ArchiveRule>,
}

/// Archival routing: where hits and misses of an archive lookup go.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ArchiveRule {
    #[serde(default)]
    pub archive_parameter: String,
    #[serde(default)]
    pub archive_method: String,
    #[serde(default)]
    pub hit: ArchiveTarget,
    #[serde(default)]
    pub miss: ArchiveTarget,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ArchiveTarget {
    #[serde(default)]
    pub database_sharding_value_index: i64,
}

/// Immutable set of sharding rules, looked up by table name.
///
/// Cheap to clone; policies hold their own copy.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Arc<HashMap<String, ShardingRule>>,
}

impl RuleSet {
    /// Build a rule set. Duplicate table names are a configuration error.
    pub fn new(rules: impl IntoIterator<Item = ShardingRule>) -> Result<Self, Error> {
        let mut map = HashMap::new();
        for rule in rules {
            if map.contains_key(&rule.table) {
                return Err(Error::DuplicateRule(rule.table));
            }
            map.insert(rule.table.clone(), rule);
        }

        Ok(Self {
            rules: Arc::new(map),
        })
    }

    /// Load rules from a JSON array.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let rules: Vec<ShardingRule> = serde_json::from_str(json)?;
        Self::new(rules)
    }

    /// Rule for a table, if one is registered.
    pub fn get(&self, table: &str) -> Option<&ShardingRule> {
        self.rules.get(table)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
