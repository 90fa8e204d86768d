//! Lock service error types.

use thiserror::Error;

/// Errors that can occur while talking to the lock service.
#[derive(Error, Debug)]
pub enum LockError {
    #[error("Lock operation failed: {0}")]
    Operation(String),

    #[error("Lock service connection failed: {0}")]
    Connection(String),

    #[error("Stored value is not an integer: {0}")]
    NotAnInteger(String),
}
