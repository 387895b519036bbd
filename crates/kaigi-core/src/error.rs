use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid meeting transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("not a number: {0:?}")]
    InvalidNumber(String),

    #[error("unknown table: {0}")]
    UnknownTable(String),

    #[error("field {field:?} is not editable on table {table}")]
    UnknownField { table: String, field: String },
}
