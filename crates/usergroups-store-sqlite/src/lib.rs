//! SQLite backend for the user-groups term store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Subject term lists are cached in
//! process until the membership engine invalidates them.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::{SqliteStore, StoredNamespace};

#[cfg(test)]
mod tests;
