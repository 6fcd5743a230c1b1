//! Per-pool prepared statement cache.

use fnv::FnvHashMap;
use parking_lot::RwLock;

// Names prepared statements the way drivers expect: unique per pool.
fn statement_name(counter: usize) -> String {
    format!("__dbroute_{}", counter)
}

/// Prepared statement handle: the name the statement was prepared under
/// on its pool, plus the text it was prepared from.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedStatement {
    name: String,
    sql: String,
}

impl PreparedStatement {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }
}

/// Statement cache for one physical pool.
///
/// Shared by reference across every routing group that uses the pool.
/// Lookups take the read lock; first-time preparation takes the write
/// lock. After warm-up, reads dominate.
#[derive(Debug, Default)]
pub struct StatementCache {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    statements: FnvHashMap<String, PreparedStatement>,
    counter: usize,
}

impl StatementCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached handle for this SQL, if one was prepared before.
    pub fn get(&self, sql: &str) -> Option<PreparedStatement> {
        self.inner.read().statements.get(sql).cloned()
    }

    /// Handle for this SQL, preparing a new name on first use.
    pub fn get_or_prepare(&self, sql: &str) -> PreparedStatement {
        if let Some(statement) = self.get(sql) {
            return statement;
        }

        let mut inner = self.inner.write();

        // Re-check: another writer may have won the race between locks.
        if let Some(statement) = inner.statements.get(sql) {
            return statement.clone();
        }

        inner.counter += 1;
        let statement = PreparedStatement {
            name: statement_name(inner.counter),
            sql: sql.to_string(),
        };
        inner
            .statements
            .insert(sql.to_string(), statement.clone());
        statement
    }

    pub fn len(&self) -> usize {
        self.inner.read().statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn prepare_once() {
        let cache = StatementCache::new();
        assert!(cache.get("SELECT 1").is_none());

        let first = cache.get_or_prepare("SELECT 1");
        let again = cache.get_or_prepare("SELECT 1");
        assert_eq!(first, again);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn distinct_sql_distinct_names() {
        let cache = StatementCache::new();
        let one = cache.get_or_prepare("SELECT 1");
        let two = cache.get_or_prepare("SELECT 2");

        assert_ne!(one.name(), two.name());
        assert_eq!(cache.len(), 2);
    }
}
