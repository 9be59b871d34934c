//! Terms: the labelled values inside a namespace that subjects are linked to.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque term identifier, unique within its namespace.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
  Deserialize,
)]
#[serde(transparent)]
pub struct TermId(pub i64);

impl fmt::Display for TermId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// One group (or type) within a namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
  pub term_id:       TermId,
  pub namespace:     String,
  /// URL-safe and unique within the namespace.
  pub slug:          String,
  pub name:          String,
  pub description:   String,
  /// Only meaningful when the namespace is hierarchical.
  pub parent_id:     Option<TermId>,
  /// Cached number of linked subjects. Recomputed by the membership engine,
  /// never edited by hand.
  pub subject_count: u64,
}

/// Input to [`crate::store::TermStore::create_term`].
#[derive(Debug, Clone)]
pub struct NewTerm {
  pub slug:        String,
  pub name:        String,
  pub description: String,
  pub parent_id:   Option<TermId>,
}

impl NewTerm {
  /// A top-level term with an empty description. The slug is sanitised.
  pub fn new(slug: &str, name: impl Into<String>) -> Self {
    Self {
      slug:        sanitize_key(slug),
      name:        name.into(),
      description: String::new(),
      parent_id:   None,
    }
  }
}

/// Which column [`crate::store::TermStore::get_term_by`] matches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermField {
  Id,
  Slug,
  Name,
}

/// Lower-case a key and keep only `[a-z0-9_-]`.
pub fn sanitize_key(raw: &str) -> String {
  raw
    .chars()
    .map(|c| c.to_ascii_lowercase())
    .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_' || *c == '-')
    .collect()
}

/// The slugs of `terms`, in the order given.
pub fn slugs_of(terms: &[Term]) -> Vec<String> {
  terms.iter().map(|t| t.slug.clone()).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn sanitize_key_lowercases_and_strips() {
    assert_eq!(sanitize_key("Gold Members!"), "goldmembers");
    assert_eq!(sanitize_key("user-group_2"), "user-group_2");
    assert_eq!(sanitize_key("  "), "");
  }

  #[test]
  fn new_term_sanitises_slug() {
    let term = NewTerm::new("VIP", "Very Important");
    assert_eq!(term.slug, "vip");
    assert!(term.parent_id.is_none());
  }
}
