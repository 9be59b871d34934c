//! Error type for `usergroups-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  /// A namespace was used before it was declared.
  #[error("unknown namespace: {0:?}")]
  UnknownNamespace(String),

  #[error("no term {slug:?} in namespace {namespace:?}")]
  UnknownTerm { namespace: String, slug: String },

  #[error("decode error: {0}")]
  Decode(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
