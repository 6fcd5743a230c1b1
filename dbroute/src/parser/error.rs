//! Parser error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Sql(#[from] sqlparser::parser::ParserError),

    #[error("empty statement")]
    EmptyStatement,

    #[error("table name not found")]
    TableNotFound,

    #[error("UPDATE table extraction is not supported")]
    UpdateUnsupported,

    #[error("unsupported statement shape")]
    UnsupportedShape,
}
