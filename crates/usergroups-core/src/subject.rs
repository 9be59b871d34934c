//! Subjects: the user accounts whose memberships are tracked.
//!
//! The core never stores subjects. It only needs their numeric identity, which
//! the [`UserDirectory`](crate::store::UserDirectory) resolves from whatever
//! reference the caller holds.

use std::{fmt, num::NonZeroU64};

use serde::{Deserialize, Serialize};

/// A resolved, non-zero subject identifier.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
  Deserialize,
)]
#[serde(transparent)]
pub struct SubjectId(NonZeroU64);

impl SubjectId {
  /// Returns `None` for zero, which never names a real subject.
  pub fn new(raw: u64) -> Option<Self> { NonZeroU64::new(raw).map(Self) }

  pub fn get(self) -> u64 { self.0.get() }
}

impl fmt::Display for SubjectId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// A user account record as handed over by the directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
  /// Raw identifier; zero means "not a persisted account".
  pub id:           u64,
  pub login:        String,
  pub display_name: String,
}

/// Anything a caller may use to point at a subject.
#[derive(Debug, Clone, Copy)]
pub enum SubjectRef<'a> {
  /// A bare numeric identifier.
  Id(u64),
  /// A full record exposing its identifier.
  Record(&'a Subject),
}

impl SubjectRef<'_> {
  /// The raw identifier carried by the reference, before any directory
  /// lookup.
  pub fn raw_id(&self) -> u64 {
    match self {
      Self::Id(id) => *id,
      Self::Record(subject) => subject.id,
    }
  }
}

impl From<SubjectId> for SubjectRef<'_> {
  fn from(id: SubjectId) -> Self { Self::Id(id.get()) }
}

impl<'a> From<&'a Subject> for SubjectRef<'a> {
  fn from(subject: &'a Subject) -> Self { Self::Record(subject) }
}
