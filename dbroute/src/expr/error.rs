//! Evaluation errors.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("syntax error at offset {0}")]
    Syntax(usize),

    #[error("unknown function \"{0}\"")]
    UnknownFunction(String),

    #[error("unknown identifier \"{0}\"")]
    UnknownIdentifier(String),

    #[error("{0}() expects {1} argument(s)")]
    Arity(&'static str, usize),

    #[error("expected an integer, got \"{0}\"")]
    NotAnInteger(String),

    #[error("missing value for parameter \"{0}\"")]
    MissingParameter(String),

    #[error("division by zero in mod()")]
    DivisionByZero,
}
