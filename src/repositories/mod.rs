//! Database operations adapter.
//!
//! The coordination core talks to storage only through [`DatabaseOps`].
//! Two backends implement it:
//! - [`PostgresOperations`]: relational store via diesel-async
//! - [`MemoryOperations`]: document-style in-process store without query support

mod memory;
mod ops;
mod postgres;

pub use memory::MemoryOperations;
pub use ops::{CronConfigFilter, DatabaseOps};
pub use postgres::PostgresOperations;
