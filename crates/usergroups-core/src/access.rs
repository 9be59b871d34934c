//! Access policy: pure predicates over the directory.
//!
//! Nothing here is cached; rights are re-read from the directory on every
//! call because they may change between subjects in one batch.

use crate::{
  capability::Capability,
  group::GroupDefinition,
  store::UserDirectory,
  subject::SubjectId,
};

/// Whether the current actor may change `subject`'s memberships in `group`.
///
/// Requires both the general right to edit that subject and the namespace's
/// assignment capability.
pub fn can_assign<D>(directory: &D, subject: SubjectId, group: &GroupDefinition) -> bool
where
  D: UserDirectory + ?Sized,
{
  directory.current_actor_can(&Capability::EditUser, Some(subject))
    && directory.current_actor_can(group.required_capability_to_assign(), None)
}

/// Whether the current actor may see who belongs to the terms of a
/// namespace.
pub fn can_view_members<D>(directory: &D) -> bool
where
  D: UserDirectory + ?Sized,
{
  directory.current_actor_can(&Capability::ListUsers, None)
}

/// Whether the current actor may edit the terms of `group` themselves.
pub fn can_edit_terms<D>(directory: &D, group: &GroupDefinition) -> bool
where
  D: UserDirectory + ?Sized,
{
  directory.current_actor_can(&group.capabilities().edit_terms, None)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    capability::CapabilityOverrides,
    directory::StaticDirectory,
    group::{GroupArgs, LabelOverrides},
  };

  fn group(managed: bool) -> GroupDefinition {
    let mut args = GroupArgs::named("Group", "Groups");
    args.managed = managed;
    GroupDefinition::new(
      "user-group",
      "users/group",
      args,
      LabelOverrides::default(),
      CapabilityOverrides::default(),
    )
    .unwrap()
  }

  fn id(raw: u64) -> SubjectId { SubjectId::new(raw).unwrap() }

  #[test]
  fn self_service_on_unmanaged_namespace() {
    let dir = StaticDirectory::new(5, Vec::<Capability>::new());
    assert!(can_assign(&dir, id(5), &group(false)));
    assert!(!can_assign(&dir, id(6), &group(false)));
  }

  #[test]
  fn managed_namespace_blocks_self_service() {
    let dir = StaticDirectory::new(5, Vec::<Capability>::new());
    assert!(!can_assign(&dir, id(5), &group(true)));
  }

  #[test]
  fn admin_can_assign_anyone_in_managed_namespace() {
    let dir = StaticDirectory::new(1, [Capability::EditUser, Capability::ListUsers]);
    assert!(can_assign(&dir, id(42), &group(true)));
    assert!(can_view_members(&dir));
    assert!(can_edit_terms(&dir, &group(true)));
  }
}
