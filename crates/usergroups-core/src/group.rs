//! Group definitions: one per namespace.
//!
//! A [`GroupDefinition`] is built once at startup from its identifier, url
//! slug, behavioural arguments, optional label overrides and optional
//! capability overrides. Everything derived from those inputs (display
//! labels, capability requirements, the registration handed to the term
//! store) is computed here and never looked up again.

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  capability::{Capabilities, Capability, CapabilityOverrides},
  term::sanitize_key,
};

/// The object type subjects are registered under unless told otherwise.
pub const USER_OBJECT_TYPE: &str = "user";

// ─── Arguments ───────────────────────────────────────────────────────────────

/// Behavioural arguments for a group definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupArgs {
  pub singular:     Option<String>,
  pub plural:       Option<String>,
  /// Whether terms may nest under parent terms.
  pub hierarchical: bool,
  /// A subject may hold at most one term in the namespace.
  pub exclusive:    bool,
  /// Only elevated actors may change memberships.
  pub managed:      bool,
  pub public:       bool,
  pub show_ui:      bool,
}

impl Default for GroupArgs {
  fn default() -> Self {
    Self {
      singular:     None,
      plural:       None,
      hierarchical: true,
      exclusive:    false,
      managed:      false,
      public:       false,
      show_ui:      true,
    }
  }
}

impl GroupArgs {
  pub fn named(singular: impl Into<String>, plural: impl Into<String>) -> Self {
    Self {
      singular: Some(singular.into()),
      plural: Some(plural.into()),
      ..Self::default()
    }
  }
}

// ─── Labels ──────────────────────────────────────────────────────────────────

/// The complete set of display strings for a namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Labels {
  pub menu_name:                  String,
  pub name:                       String,
  pub singular_name:              String,
  pub search_items:               String,
  pub popular_items:              String,
  pub all_items:                  String,
  pub parent_item:                String,
  pub parent_item_colon:          String,
  pub edit_item:                  String,
  pub view_item:                  String,
  pub update_item:                String,
  pub add_new_item:               String,
  pub new_item_name:              String,
  pub separate_items_with_commas: String,
  pub add_or_remove_items:        String,
  pub choose_from_most_used:      String,
  pub not_found:                  String,
  pub no_item:                    String,
  pub no_items:                   String,
}

/// Replacements for any subset of [`Labels`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelOverrides {
  pub menu_name:                  Option<String>,
  pub name:                       Option<String>,
  pub singular_name:              Option<String>,
  pub search_items:               Option<String>,
  pub popular_items:              Option<String>,
  pub all_items:                  Option<String>,
  pub parent_item:                Option<String>,
  pub parent_item_colon:          Option<String>,
  pub edit_item:                  Option<String>,
  pub view_item:                  Option<String>,
  pub update_item:                Option<String>,
  pub add_new_item:               Option<String>,
  pub new_item_name:              Option<String>,
  pub separate_items_with_commas: Option<String>,
  pub add_or_remove_items:        Option<String>,
  pub choose_from_most_used:      Option<String>,
  pub not_found:                  Option<String>,
  pub no_item:                    Option<String>,
  pub no_items:                   Option<String>,
}

impl Labels {
  fn derive(singular: &str, plural: &str, o: LabelOverrides) -> Self {
    let plural_low = plural.to_lowercase();
    let pick = |v: Option<String>, default: String| v.unwrap_or(default);

    Self {
      menu_name:                  pick(o.menu_name, plural.to_owned()),
      name:                       pick(o.name, plural.to_owned()),
      singular_name:              pick(o.singular_name, singular.to_owned()),
      search_items:               pick(o.search_items, format!("Search {plural}")),
      popular_items:              pick(o.popular_items, format!("Popular {plural}")),
      all_items:                  pick(o.all_items, format!("All {plural}")),
      parent_item:                pick(o.parent_item, format!("Parent {singular}")),
      parent_item_colon:          pick(o.parent_item_colon, format!("Parent {singular}:")),
      edit_item:                  pick(o.edit_item, format!("Edit {singular}")),
      view_item:                  pick(o.view_item, format!("View {singular}")),
      update_item:                pick(o.update_item, format!("Update {singular}")),
      add_new_item:               pick(o.add_new_item, format!("Add New {singular}")),
      new_item_name:              pick(o.new_item_name, format!("New {singular} Name")),
      separate_items_with_commas: pick(
        o.separate_items_with_commas,
        format!("Separate {plural_low} with commas"),
      ),
      add_or_remove_items:        pick(o.add_or_remove_items, format!("Add or remove {plural_low}")),
      choose_from_most_used:      pick(
        o.choose_from_most_used,
        format!("Choose from most used {plural_low}"),
      ),
      not_found:                  pick(o.not_found, format!("No {plural_low} found")),
      no_item:                    pick(o.no_item, format!("No {singular}")),
      no_items:                   pick(o.no_items, format!("No {plural_low}")),
    }
  }
}

// ─── Registration ────────────────────────────────────────────────────────────

/// Permalink settings for term archive links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rewrite {
  pub slug:         String,
  pub with_front:   bool,
  pub hierarchical: bool,
}

/// How the store keeps `subject_count` current for terms in a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountStrategy {
  /// Count live subject relationships through the membership engine's
  /// recount hook whenever relationships change.
  LinkedSubjects,
}

/// Everything declared to the term store for one namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceOptions {
  /// Marks the namespace as a subject grouping.
  pub user_group:   bool,
  pub public:       bool,
  pub show_ui:      bool,
  pub hierarchical: bool,
  pub exclusive:    bool,
  pub managed:      bool,
  pub labels:       Labels,
  pub capabilities: Capabilities,
  pub rewrite:      Rewrite,
  pub count:        CountStrategy,
}

/// Input to [`crate::store::TermStore::create_namespace`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceRegistration {
  pub namespace_id: String,
  pub object_types: Vec<String>,
  pub options:      NamespaceOptions,
}

// ─── GroupDefinition ─────────────────────────────────────────────────────────

/// A namespace of groups (or types) and the rules it imposes.
#[derive(Debug, Clone)]
pub struct GroupDefinition {
  namespace_id: String,
  url_slug:     String,
  labels:       Labels,
  singular_low: String,
  plural_low:   String,
  hierarchical: bool,
  exclusive:    bool,
  managed:      bool,
  public:       bool,
  show_ui:      bool,
  capabilities: Capabilities,
  object_types: Vec<String>,
}

impl GroupDefinition {
  /// Build a definition.
  ///
  /// Fails with [`Error::EmptyNamespace`] when the identifier sanitises to
  /// nothing and with [`Error::MissingLabel`] when neither `args` nor
  /// `labels` supply a singular and a plural name.
  pub fn new(
    namespace_id: &str,
    url_slug: &str,
    args: GroupArgs,
    labels: LabelOverrides,
    capabilities: CapabilityOverrides,
  ) -> Result<Self> {
    let namespace_id = sanitize_key(namespace_id);
    if namespace_id.is_empty() {
      return Err(Error::EmptyNamespace);
    }

    let singular = args
      .singular
      .clone()
      .or_else(|| labels.singular_name.clone())
      .ok_or_else(|| Error::MissingLabel {
        namespace: namespace_id.clone(),
        field:     "singular",
      })?;
    let plural = args
      .plural
      .clone()
      .or_else(|| labels.name.clone())
      .ok_or_else(|| Error::MissingLabel {
        namespace: namespace_id.clone(),
        field:     "plural",
      })?;

    let url_slug = url_slug.trim().to_owned();
    let capabilities = Capabilities::derive(args.managed, &capabilities);

    Ok(Self {
      labels: Labels::derive(&singular, &plural, labels),
      singular_low: singular.to_lowercase(),
      plural_low: plural.to_lowercase(),
      namespace_id,
      url_slug,
      hierarchical: args.hierarchical,
      exclusive: args.exclusive,
      managed: args.managed,
      public: args.public,
      show_ui: args.show_ui,
      capabilities,
      object_types: vec![USER_OBJECT_TYPE.to_owned()],
    })
  }

  /// Link the namespace to further object types besides `user`.
  ///
  /// Object ids from different types share one relationship table, so ids
  /// must not collide.
  pub fn with_object_types<I, T>(mut self, types: I) -> Self
  where
    I: IntoIterator<Item = T>,
    T: Into<String>,
  {
    let types: Vec<String> = types.into_iter().map(Into::into).collect();
    if !types.is_empty() {
      self.object_types = types;
    }
    self
  }

  pub fn namespace_id(&self) -> &str { &self.namespace_id }

  pub fn url_slug(&self) -> &str { &self.url_slug }

  pub fn labels(&self) -> &Labels { &self.labels }

  pub fn singular_label(&self) -> &str { &self.labels.singular_name }

  pub fn plural_label(&self) -> &str { &self.labels.name }

  pub fn singular_lower(&self) -> &str { &self.singular_low }

  pub fn plural_lower(&self) -> &str { &self.plural_low }

  pub fn is_hierarchical(&self) -> bool { self.hierarchical }

  pub fn is_exclusive(&self) -> bool { self.exclusive }

  pub fn is_managed(&self) -> bool { self.managed }

  pub fn shows_ui(&self) -> bool { self.show_ui }

  pub fn capabilities(&self) -> &Capabilities { &self.capabilities }

  pub fn required_capability_to_assign(&self) -> &Capability {
    &self.capabilities.assign_terms
  }

  pub fn object_types(&self) -> &[String] { &self.object_types }

  /// Name of the submitted form field carrying the desired slugs.
  pub fn field_name(&self) -> &str { &self.namespace_id }

  /// Name of the submitted field carrying the profile form nonce.
  pub fn nonce_field_name(&self) -> String {
    format!("user_groups_nonce_{}", self.namespace_id)
  }

  /// Nonce action guarding single-subject profile saves.
  pub fn profile_nonce_action(&self) -> &str { &self.namespace_id }

  /// Nonce action guarding bulk requests.
  pub fn bulk_nonce_action(&self) -> String {
    format!("bulk-edit-{}", self.namespace_id)
  }

  /// The registration handed to the term store.
  pub fn registration(&self) -> NamespaceRegistration {
    NamespaceRegistration {
      namespace_id: self.namespace_id.clone(),
      object_types: self.object_types.clone(),
      options:      NamespaceOptions {
        user_group:   true,
        public:       self.public,
        show_ui:      self.show_ui,
        hierarchical: self.hierarchical,
        exclusive:    self.exclusive,
        managed:      self.managed,
        labels:       self.labels.clone(),
        capabilities: self.capabilities.clone(),
        rewrite:      Rewrite {
          slug:         self.url_slug.clone(),
          with_front:   false,
          hierarchical: true,
        },
        count:        CountStrategy::LinkedSubjects,
      },
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn define(ns: &str, args: GroupArgs) -> Result<GroupDefinition> {
    GroupDefinition::new(
      ns,
      "users/group",
      args,
      LabelOverrides::default(),
      CapabilityOverrides::default(),
    )
  }

  #[test]
  fn empty_namespace_is_rejected() {
    let err = define("  ", GroupArgs::named("Group", "Groups")).unwrap_err();
    assert!(matches!(err, Error::EmptyNamespace));
  }

  #[test]
  fn namespace_is_sanitised() {
    let def = define("User Group", GroupArgs::named("Group", "Groups")).unwrap();
    assert_eq!(def.namespace_id(), "usergroup");
  }

  #[test]
  fn missing_labels_are_rejected() {
    let err = define("user-group", GroupArgs::default()).unwrap_err();
    assert!(matches!(err, Error::MissingLabel { field: "singular", .. }));
  }

  #[test]
  fn label_overrides_can_stand_in_for_args() {
    let labels = LabelOverrides {
      singular_name: Some("Team".into()),
      name: Some("Teams".into()),
      ..Default::default()
    };
    let def = GroupDefinition::new(
      "team",
      "users/team",
      GroupArgs::default(),
      labels,
      CapabilityOverrides::default(),
    )
    .unwrap();
    assert_eq!(def.singular_label(), "Team");
    assert_eq!(def.labels().not_found, "No teams found");
  }

  #[test]
  fn labels_derive_from_args() {
    let def = define("user-group", GroupArgs::named("Group", "Groups")).unwrap();
    let labels = def.labels();
    assert_eq!(labels.menu_name, "Groups");
    assert_eq!(labels.search_items, "Search Groups");
    assert_eq!(labels.parent_item_colon, "Parent Group:");
    assert_eq!(labels.add_or_remove_items, "Add or remove groups");
    assert_eq!(def.singular_lower(), "group");
    assert_eq!(def.plural_lower(), "groups");
  }

  #[test]
  fn registration_declares_defaults() {
    let mut args = GroupArgs::named("Type", "Types");
    args.managed = true;
    let reg = define("user-type", args).unwrap().registration();
    assert_eq!(reg.object_types, vec!["user".to_owned()]);
    assert!(!reg.options.public);
    assert!(reg.options.show_ui);
    assert!(reg.options.user_group);
    assert_eq!(reg.options.rewrite.slug, "users/group");
    assert_eq!(reg.options.capabilities.assign_terms, Capability::ListUsers);
  }

  #[test]
  fn object_types_can_be_extended() {
    let def = define("user-group", GroupArgs::named("Group", "Groups"))
      .unwrap()
      .with_object_types(["user", "site"]);
    assert_eq!(def.object_types(), ["user".to_owned(), "site".to_owned()]);
  }
}
