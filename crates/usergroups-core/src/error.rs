//! Error types for `usergroups-core`.
//!
//! Unresolvable subjects, denied writes, unknown bulk actions and bad
//! anti-forgery tokens are not errors: the engines turn them into `None`,
//! `false` or zero-count outcomes. Only definition problems and faults raised
//! by a collaborator surface here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("namespace identifier is empty")]
  EmptyNamespace,

  #[error("namespace {namespace:?} has no {field} label")]
  MissingLabel {
    namespace: String,
    field:     &'static str,
  },

  #[error("namespace {0:?} is already registered")]
  DuplicateNamespace(String),

  #[error("unknown namespace: {0:?}")]
  UnknownNamespace(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a collaborator fault without altering it.
  pub fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(err))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
