//! Physical connection pool handles.
//!
//! The router never touches the network. A [`PoolHandle`] is an opaque,
//! cloneable identity the embedder maps back to a real driver pool; tuning
//! options ride along and apply once, at creation.

pub mod statements;

pub use statements::{PreparedStatement, StatementCache};

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dbroute_config::{PoolConfig, PoolOptions};

// Process-unique pool ids; the statement-cache registry keys off these.
static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// Handle to one physical connection pool.
#[derive(Clone)]
pub struct PoolHandle {
    inner: Arc<Inner>,
}

struct Inner {
    id: u64,
    dsn: String,
    options: PoolOptions,
}

impl PoolHandle {
    /// Register a new pool.
    pub fn new(config: &PoolConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
                dsn: config.dsn.clone(),
                options: config.options,
            }),
        }
    }

    /// Process-unique pool identity.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Connection string of the underlying database.
    pub fn dsn(&self) -> &str {
        &self.inner.dsn
    }

    /// Tuning applied at creation.
    pub fn options(&self) -> &PoolOptions {
        &self.inner.options
    }
}

impl fmt::Debug for PoolHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolHandle")
            .field("id", &self.inner.id)
            .field("dsn", &self.inner.dsn)
            .finish()
    }
}

impl PartialEq for PoolHandle {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for PoolHandle {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn identity_is_the_id() {
        let config = PoolConfig::new("db://one");
        let a = PoolHandle::new(&config);
        let b = PoolHandle::new(&config);

        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert_ne!(a.id(), b.id());
        assert_eq!(a.dsn(), b.dsn());
    }
}
