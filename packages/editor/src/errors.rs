//! Error types for the editor layer.

use substance_model::{DecodeError, OpError, SchemaError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Nested transaction: a transaction is already active")]
    NestedTransaction,

    #[error("No active transaction to commit")]
    NoActiveTransaction,

    #[error("Direct mutation is disabled: all changes must flow through a transaction")]
    ForcedTransactions,

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Operation error: {0}")]
    Op(#[from] OpError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Transaction aborted: {0}")]
    Aborted(String),

    #[error("Invalid snapshot: {0}")]
    Snapshot(String),
}

pub type EditorResult<T> = Result<T, EditorError>;
