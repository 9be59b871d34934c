//! Anti-forgery tokens for membership writes.
//!
//! A token is bound to a secret, an action name, the acting subject and a
//! coarse time tick. Ticks are half a lifetime long and a token verifies
//! during the tick it was issued in and the one after, so it lives between
//! one half and one full lifetime.

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};

use crate::subject::SubjectId;

const TOKEN_LEN: usize = 10;

/// Default token lifetime, in seconds.
pub const DEFAULT_LIFETIME_SECS: i64 = 24 * 60 * 60;

/// How old a verified token is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceAge {
  /// Issued during the current tick.
  Fresh,
  /// Issued during the previous tick.
  Aging,
}

/// Issues and verifies tokens for one secret.
#[derive(Clone)]
pub struct NonceKeeper {
  secret:   Vec<u8>,
  lifetime: Duration,
}

impl std::fmt::Debug for NonceKeeper {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("NonceKeeper")
      .field("lifetime", &self.lifetime)
      .finish_non_exhaustive()
  }
}

impl NonceKeeper {
  pub fn new(secret: impl Into<Vec<u8>>) -> Self {
    Self {
      secret:   secret.into(),
      lifetime: Duration::seconds(DEFAULT_LIFETIME_SECS),
    }
  }

  pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
    self.lifetime = lifetime;
    self
  }

  /// Issue a token for `action` on behalf of `actor` (anonymous when `None`).
  pub fn issue(&self, action: &str, actor: Option<SubjectId>) -> String {
    self.issue_at(action, actor, Utc::now())
  }

  pub fn issue_at(
    &self,
    action: &str,
    actor: Option<SubjectId>,
    now: DateTime<Utc>,
  ) -> String {
    self.token(self.tick(now), action, actor)
  }

  /// Verify a submitted token. `None` when it is empty, forged or expired.
  pub fn verify(
    &self,
    token: &str,
    action: &str,
    actor: Option<SubjectId>,
  ) -> Option<NonceAge> {
    self.verify_at(token, action, actor, Utc::now())
  }

  pub fn verify_at(
    &self,
    token: &str,
    action: &str,
    actor: Option<SubjectId>,
    now: DateTime<Utc>,
  ) -> Option<NonceAge> {
    if token.is_empty() {
      return None;
    }
    let tick = self.tick(now);
    if constant_time_eq(&self.token(tick, action, actor), token) {
      return Some(NonceAge::Fresh);
    }
    if constant_time_eq(&self.token(tick - 1, action, actor), token) {
      return Some(NonceAge::Aging);
    }
    None
  }

  fn tick(&self, now: DateTime<Utc>) -> i64 {
    let half = (self.lifetime.num_seconds() / 2).max(1);
    now.timestamp().div_euclid(half) + 1
  }

  fn token(&self, tick: i64, action: &str, actor: Option<SubjectId>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(&self.secret);
    hasher.update(tick.to_le_bytes());
    hasher.update(action.as_bytes());
    hasher.update([0]);
    hasher.update(actor.map_or(0, SubjectId::get).to_le_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..TOKEN_LEN].to_owned()
  }
}

/// Byte comparison without an early exit on the first mismatch.
fn constant_time_eq(expected: &str, given: &str) -> bool {
  let (expected, given) = (expected.as_bytes(), given.as_bytes());
  if expected.len() != given.len() {
    return false;
  }
  expected
    .iter()
    .zip(given)
    .fold(0u8, |diff, (a, b)| diff | (a ^ b))
    == 0
}
