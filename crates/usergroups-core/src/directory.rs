//! [`StaticDirectory`]: a fixed, configuration-driven [`UserDirectory`].
//!
//! Used by the command-line tool (where the operator's rights come from the
//! config file) and by tests. Host applications with a real account system
//! implement [`UserDirectory`] themselves.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{
  capability::Capability,
  store::UserDirectory,
  subject::{SubjectId, SubjectRef},
};

/// One actor and the rights it holds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticDirectory {
  /// Raw id of the acting account; zero or absent means anonymous.
  pub actor:             u64,
  pub capabilities:      BTreeSet<Capability>,
  /// When set, `edit_user` only covers these subjects. The actor may always
  /// edit itself.
  pub editable_subjects: Option<BTreeSet<u64>>,
}

impl StaticDirectory {
  pub fn new<I, C>(actor: u64, capabilities: I) -> Self
  where
    I: IntoIterator<Item = C>,
    C: Into<Capability>,
  {
    Self {
      actor,
      capabilities: capabilities.into_iter().map(Into::into).collect(),
      editable_subjects: None,
    }
  }

  /// Restrict `edit_user` to the given subjects.
  pub fn editing_only<I: IntoIterator<Item = u64>>(mut self, ids: I) -> Self {
    self.editable_subjects = Some(ids.into_iter().collect());
    self
  }

  fn may_edit(&self, subject: SubjectId) -> bool {
    if self.current_actor() == Some(subject) {
      return true;
    }
    if !self.capabilities.contains(&Capability::EditUser) {
      return false;
    }
    self
      .editable_subjects
      .as_ref()
      .is_none_or(|ids| ids.contains(&subject.get()))
  }
}

impl UserDirectory for StaticDirectory {
  fn resolve_subject_id(&self, subject: &SubjectRef<'_>) -> Option<SubjectId> {
    SubjectId::new(subject.raw_id())
  }

  fn current_actor(&self) -> Option<SubjectId> { SubjectId::new(self.actor) }

  fn current_actor_can(
    &self,
    capability: &Capability,
    subject: Option<SubjectId>,
  ) -> bool {
    if self.current_actor().is_none() {
      return false;
    }
    match (capability, subject) {
      (Capability::EditUser, Some(id)) => self.may_edit(id),
      (Capability::Read, _) => true,
      (cap, _) => self.capabilities.contains(cap),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn id(raw: u64) -> SubjectId { SubjectId::new(raw).unwrap() }

  #[test]
  fn anonymous_actor_can_do_nothing() {
    let dir = StaticDirectory::new(0, [Capability::ListUsers]);
    assert!(!dir.current_actor_can(&Capability::Read, None));
    assert!(!dir.current_actor_can(&Capability::ListUsers, None));
  }

  #[test]
  fn actor_may_always_edit_itself() {
    let dir = StaticDirectory::new(7, Vec::<Capability>::new());
    assert!(dir.current_actor_can(&Capability::EditUser, Some(id(7))));
    assert!(!dir.current_actor_can(&Capability::EditUser, Some(id(8))));
  }

  #[test]
  fn editable_subjects_restrict_edit_user() {
    let dir = StaticDirectory::new(1, [Capability::EditUser]).editing_only([2]);
    assert!(dir.current_actor_can(&Capability::EditUser, Some(id(2))));
    assert!(!dir.current_actor_can(&Capability::EditUser, Some(id(3))));
  }

  #[test]
  fn zero_reference_does_not_resolve() {
    let dir = StaticDirectory::default();
    assert!(dir.resolve_subject_id(&SubjectRef::Id(0)).is_none());
    assert_eq!(dir.resolve_subject_id(&SubjectRef::Id(4)), Some(id(4)));
  }
}
