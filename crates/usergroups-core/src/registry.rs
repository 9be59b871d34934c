//! The group registry: every namespace known to the application, keyed by
//! namespace id and built once at startup.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::{
  Error, Result,
  capability::CapabilityOverrides,
  group::{GroupArgs, GroupDefinition, LabelOverrides},
  store::TermStore,
};

/// Namespace of the default "groups" grouping.
pub const DEFAULT_GROUP_NAMESPACE: &str = "user-group";
/// Namespace of the default "types" grouping.
pub const DEFAULT_TYPE_NAMESPACE: &str = "user-type";

/// The two groupings registered unless the host opts out.
pub fn default_groups() -> Result<Vec<GroupDefinition>> {
  Ok(vec![
    GroupDefinition::new(
      DEFAULT_GROUP_NAMESPACE,
      "users/group",
      GroupArgs::named("Group", "Groups"),
      LabelOverrides::default(),
      CapabilityOverrides::default(),
    )?,
    GroupDefinition::new(
      DEFAULT_TYPE_NAMESPACE,
      "users/type",
      GroupArgs::named("Type", "Types"),
      LabelOverrides::default(),
      CapabilityOverrides::default(),
    )?,
  ])
}

#[derive(Debug, Clone, Default)]
pub struct GroupRegistry {
  groups: BTreeMap<String, GroupDefinition>,
}

impl GroupRegistry {
  pub fn new() -> Self { Self::default() }

  /// A registry holding [`default_groups`].
  pub fn with_defaults() -> Result<Self> {
    let mut registry = Self::new();
    for group in default_groups()? {
      registry.insert(group)?;
    }
    Ok(registry)
  }

  /// Add a definition. Namespace ids are unique.
  pub fn insert(&mut self, group: GroupDefinition) -> Result<()> {
    let namespace = group.namespace_id().to_owned();
    if self.groups.contains_key(&namespace) {
      return Err(Error::DuplicateNamespace(namespace));
    }
    self.groups.insert(namespace, group);
    Ok(())
  }

  /// Build and add a definition in one step.
  ///
  /// An empty namespace id is a no-op and yields `Ok(None)`; every other
  /// construction problem is an error.
  pub fn define(
    &mut self,
    namespace_id: &str,
    url_slug: &str,
    args: GroupArgs,
    labels: LabelOverrides,
    capabilities: CapabilityOverrides,
  ) -> Result<Option<&GroupDefinition>> {
    let group =
      match GroupDefinition::new(namespace_id, url_slug, args, labels, capabilities) {
        Ok(group) => group,
        Err(Error::EmptyNamespace) => {
          debug!("skipping group definition with an empty namespace id");
          return Ok(None);
        }
        Err(e) => return Err(e),
      };

    let namespace = group.namespace_id().to_owned();
    self.insert(group)?;
    Ok(self.groups.get(&namespace))
  }

  pub fn get(&self, namespace_id: &str) -> Option<&GroupDefinition> {
    self.groups.get(namespace_id)
  }

  /// Like [`GroupRegistry::get`], failing with [`Error::UnknownNamespace`].
  pub fn require(&self, namespace_id: &str) -> Result<&GroupDefinition> {
    self
      .get(namespace_id)
      .ok_or_else(|| Error::UnknownNamespace(namespace_id.to_owned()))
  }

  /// All definitions, ordered by namespace id.
  pub fn iter(&self) -> impl Iterator<Item = &GroupDefinition> { self.groups.values() }

  pub fn namespaces(&self) -> impl Iterator<Item = &str> {
    self.groups.keys().map(String::as_str)
  }

  pub fn len(&self) -> usize { self.groups.len() }

  pub fn is_empty(&self) -> bool { self.groups.is_empty() }

  /// A username equal to a namespace id would clash with the namespace's
  /// query parameter, so such usernames are refused.
  pub fn is_reserved_username(&self, username: &str) -> bool {
    self.groups.contains_key(username)
  }

  /// Declare every namespace to the term store.
  pub async fn register_all<S: TermStore>(&self, store: &S) -> Result<()> {
    for group in self.groups.values() {
      store
        .create_namespace(&group.registration())
        .await
        .map_err(Error::store)?;
      info!(namespace = group.namespace_id(), "namespace registered");
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_register_groups_and_types() {
    let registry = GroupRegistry::with_defaults().unwrap();
    let namespaces: Vec<&str> = registry.namespaces().collect();
    assert_eq!(namespaces, ["user-group", "user-type"]);
    assert_eq!(registry.require("user-type").unwrap().plural_label(), "Types");
  }

  #[test]
  fn duplicate_namespace_is_rejected() {
    let mut registry = GroupRegistry::with_defaults().unwrap();
    let err = registry
      .define(
        "user-group",
        "x",
        GroupArgs::named("G", "Gs"),
        LabelOverrides::default(),
        CapabilityOverrides::default(),
      )
      .unwrap_err();
    assert!(matches!(err, Error::DuplicateNamespace(ns) if ns == "user-group"));
  }

  #[test]
  fn empty_namespace_is_a_noop() {
    let mut registry = GroupRegistry::new();
    let defined = registry
      .define(
        "",
        "x",
        GroupArgs::named("G", "Gs"),
        LabelOverrides::default(),
        CapabilityOverrides::default(),
      )
      .unwrap();
    assert!(defined.is_none());
    assert!(registry.is_empty());
  }

  #[test]
  fn namespace_ids_are_reserved_usernames() {
    let registry = GroupRegistry::with_defaults().unwrap();
    assert!(registry.is_reserved_username("user-group"));
    assert!(!registry.is_reserved_username("alice"));
  }

  #[test]
  fn unknown_namespace_is_an_error() {
    let registry = GroupRegistry::new();
    assert!(matches!(registry.require("nope"), Err(Error::UnknownNamespace(_))));
  }
}
