//! Router errors.
//!
//! Parse and evaluation failures abort the call that triggered them:
//! failing loudly beats executing against the wrong shard.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("parser: {0}")]
    Parser(#[from] crate::parser::Error),

    #[error("eval: {0}")]
    Eval(#[from] crate::expr::Error),

    #[error("config: {0}")]
    Config(#[from] dbroute_config::Error),

    #[error("conflicted global resolver")]
    ConflictedGlobalResolver,

    #[error("no shards configured")]
    NoShards,

    #[error("no pools configured for shard \"{0}\"")]
    NoPools(String),

    #[error("unknown shard \"{0}\"")]
    UnknownShard(String),

    #[error("sharding rule for table \"{0}\" is missing a parameter or expression")]
    IncompleteRule(String),
}
