//! Permission tokens and the per-namespace capability set.

use std::fmt;

use serde::{Deserialize, Serialize};

// ─── Capability ──────────────────────────────────────────────────────────────

/// A permission token checked against the directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Capability {
  /// Baseline right every signed-in account holds.
  Read,
  /// May browse the subject list; the elevated right for managed namespaces.
  ListUsers,
  /// May edit a particular subject. Checked together with a subject id.
  EditUser,
  Other(String),
}

impl Capability {
  pub fn as_str(&self) -> &str {
    match self {
      Self::Read => "read",
      Self::ListUsers => "list_users",
      Self::EditUser => "edit_user",
      Self::Other(s) => s,
    }
  }
}

impl From<String> for Capability {
  fn from(s: String) -> Self {
    match s.as_str() {
      "read" => Self::Read,
      "list_users" => Self::ListUsers,
      "edit_user" => Self::EditUser,
      _ => Self::Other(s),
    }
  }
}

impl From<&str> for Capability {
  fn from(s: &str) -> Self { Self::from(s.to_owned()) }
}

impl From<Capability> for String {
  fn from(c: Capability) -> Self {
    match c {
      Capability::Other(s) => s,
      other => other.as_str().to_owned(),
    }
  }
}

impl fmt::Display for Capability {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Capabilities ────────────────────────────────────────────────────────────

/// Capability requirements for one namespace. Computed once when the group is
/// defined and passed by value afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
  pub manage_terms: Capability,
  pub edit_terms:   Capability,
  pub delete_terms: Capability,
  /// Needed to add or remove a subject's membership.
  pub assign_terms: Capability,
}

/// Caller-supplied replacements for individual derived capabilities.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilityOverrides {
  pub manage_terms: Option<Capability>,
  pub edit_terms:   Option<Capability>,
  pub delete_terms: Option<Capability>,
  pub assign_terms: Option<Capability>,
}

impl Capabilities {
  /// Term management always needs `list_users`. Assignment needs `list_users`
  /// when the namespace is managed and plain `read` otherwise, so subjects
  /// can look after their own memberships.
  pub fn derive(managed: bool, overrides: &CapabilityOverrides) -> Self {
    let assign_default =
      if managed { Capability::ListUsers } else { Capability::Read };

    Self {
      manage_terms: overrides.manage_terms.clone().unwrap_or(Capability::ListUsers),
      edit_terms:   overrides.edit_terms.clone().unwrap_or(Capability::ListUsers),
      delete_terms: overrides.delete_terms.clone().unwrap_or(Capability::ListUsers),
      assign_terms: overrides.assign_terms.clone().unwrap_or(assign_default),
    }
  }
}
