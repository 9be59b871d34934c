//! Runtime configuration for the `usergroups` binary.
//!
//! Read from a TOML file layered with `USERGROUPS_*` environment variables.
//!
//! ```toml
//! store_path        = "~/.local/share/usergroups/store.db"
//! nonce_secret      = "change me"
//! register_defaults = true
//!
//! [actor]
//! actor        = 1
//! capabilities = ["edit_user", "list_users"]
//!
//! [[groups]]
//! namespace = "tier"
//! slug      = "users/tier"
//! singular  = "Tier"
//! plural    = "Tiers"
//! exclusive = true
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use rand_core::{OsRng, RngCore as _};
use serde::Deserialize;
use usergroups_core::{
  capability::CapabilityOverrides,
  directory::StaticDirectory,
  group::{GroupArgs, GroupDefinition, LabelOverrides},
  nonce::NonceKeeper,
  registry::GroupRegistry,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CliConfig {
  pub store_path:        PathBuf,
  /// Secret for anti-forgery tokens. A random one is drawn per process when
  /// unset, so tokens do not survive a restart.
  pub nonce_secret:      Option<String>,
  /// Register the `user-group` and `user-type` namespaces.
  pub register_defaults: bool,
  pub groups:            Vec<GroupConfig>,
  /// Who the tool acts as, and with which rights.
  pub actor:             StaticDirectory,
}

impl Default for CliConfig {
  fn default() -> Self {
    Self {
      store_path:        PathBuf::from("~/.local/share/usergroups/store.db"),
      nonce_secret:      None,
      register_defaults: true,
      groups:            Vec::new(),
      actor:             StaticDirectory::default(),
    }
  }
}

/// One extra group definition.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupConfig {
  pub namespace:    String,
  pub slug:         String,
  #[serde(flatten)]
  pub args:         GroupArgs,
  #[serde(default)]
  pub labels:       LabelOverrides,
  #[serde(default)]
  pub capabilities: CapabilityOverrides,
  #[serde(default)]
  pub object_types: Vec<String>,
}

impl CliConfig {
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("USERGROUPS"))
      .build()
      .context("failed to read config file")?;

    settings
      .try_deserialize()
      .context("failed to deserialise CliConfig")
  }

  /// The registry described by this configuration.
  pub fn registry(&self) -> anyhow::Result<GroupRegistry> {
    let mut registry = if self.register_defaults {
      GroupRegistry::with_defaults()?
    } else {
      GroupRegistry::new()
    };

    for group in &self.groups {
      let definition = GroupDefinition::new(
        &group.namespace,
        &group.slug,
        group.args.clone(),
        group.labels.clone(),
        group.capabilities.clone(),
      )
      .with_context(|| format!("invalid group {:?}", group.namespace))?
      .with_object_types(group.object_types.iter().cloned());
      registry
        .insert(definition)
        .with_context(|| format!("cannot register group {:?}", group.namespace))?;
    }
    Ok(registry)
  }

  pub fn nonce_keeper(&self) -> NonceKeeper {
    match &self.nonce_secret {
      Some(secret) => NonceKeeper::new(secret.as_bytes()),
      None => {
        let mut secret = [0u8; 32];
        OsRng.fill_bytes(&mut secret);
        NonceKeeper::new(secret.to_vec())
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn groups_deserialise_with_flattened_args() {
    let group: GroupConfig = serde_json::from_value(serde_json::json!({
      "namespace": "tier",
      "slug": "users/tier",
      "singular": "Tier",
      "plural": "Tiers",
      "exclusive": true,
      "labels": { "not_found": "Nothing here" },
    }))
    .unwrap();
    assert!(group.args.exclusive);
    assert!(group.args.hierarchical);

    let config = CliConfig { groups: vec![group], ..CliConfig::default() };
    let registry = config.registry().unwrap();
    let tier = registry.require("tier").unwrap();
    assert!(tier.is_exclusive());
    assert_eq!(tier.labels().not_found, "Nothing here");
    assert_eq!(registry.len(), 3);
  }

  #[test]
  fn defaults_can_be_turned_off() {
    let config = CliConfig { register_defaults: false, ..CliConfig::default() };
    assert!(config.registry().unwrap().is_empty());
  }

  #[test]
  fn configured_secret_is_stable() {
    let config = CliConfig {
      nonce_secret: Some("s3cret".into()),
      ..CliConfig::default()
    };
    let token = config.nonce_keeper().issue("user-group", None);
    assert!(config.nonce_keeper().verify(&token, "user-group", None).is_some());
  }
}
