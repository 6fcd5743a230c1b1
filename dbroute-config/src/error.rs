//! Configuration errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Json(#[from] serde_json::Error),

    #[error("sharding rule for table \"{0}\" declared more than once")]
    DuplicateRule(String),
}
