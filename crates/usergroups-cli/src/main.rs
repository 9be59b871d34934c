//! `usergroups`: administer user group memberships in a SQLite store.
//!
//! Reads `usergroups.toml` (or the path given with `--config`), registers
//! the configured namespaces and runs one command as the configured actor.
//!
//! ```
//! usergroups terms user-group
//! usergroups term-add user-group gold "Gold"
//! usergroups set user-group 42 gold silver
//! usergroups bulk user-group add-gold-user-group 42 43 44
//! ```

mod config;

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use usergroups_core::{
  UserGroups,
  bulk::NoticeLevel,
  directory::StaticDirectory,
  store::TermStore,
  subject::{SubjectId, SubjectRef},
  term::{NewTerm, TermField, TermId},
};
use usergroups_store_sqlite::SqliteStore;

use crate::config::CliConfig;

type Service = UserGroups<SqliteStore, StaticDirectory>;

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(author, version, about = "Manage user groups and memberships")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "usergroups.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// List the namespaces declared in the store.
  Namespaces,

  /// List the terms of a namespace with their member counts.
  Terms {
    namespace: String,
    /// Leave out terms nobody belongs to.
    #[arg(long)]
    hide_empty: bool,
  },

  /// Create a term.
  TermAdd {
    namespace:   String,
    slug:        String,
    name:        String,
    #[arg(long, default_value = "")]
    description: String,
    /// Slug of the parent term.
    #[arg(long)]
    parent:      Option<String>,
  },

  /// Show a subject's memberships.
  Get { namespace: String, subject: u64 },

  /// Replace a subject's memberships; no slugs removes them all.
  Set {
    namespace: String,
    subject:   u64,
    slugs:     Vec<String>,
  },

  /// List the subjects belonging to any of the given terms.
  Members { namespace: String, slugs: Vec<String> },

  /// List the bulk actions available for a namespace.
  BulkActions { namespace: String },

  /// Apply a bulk action token to several subjects.
  Bulk {
    namespace: String,
    action:    String,
    #[arg(required = true)]
    subjects:  Vec<u64>,
  },

  /// Recompute the member count of every term in a namespace.
  Recount { namespace: String },

  /// Print the profile sections for a subject as JSON.
  Profile { subject: u64 },

  /// Remove a deleted subject from every namespace.
  DeleteSubject { subject: u64 },

  /// Check whether a username clashes with a namespace.
  CheckUsername { username: String },
}

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = CliConfig::load(&cli.config)?;

  let store_path = expand_tilde(&cfg.store_path);
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }

  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let registry = cfg.registry()?;
  let service = UserGroups::new(store, cfg.actor.clone(), registry, cfg.nonce_keeper())
    .await
    .context("failed to register namespaces")?;

  run(&service, cli.command).await
}

async fn run(service: &Service, command: Command) -> anyhow::Result<()> {
  match command {
    Command::Namespaces => {
      let stored = service
        .store()
        .list_namespaces()
        .await
        .context("failed to list namespaces")?;
      for ns in stored {
        let options = &ns.registration.options;
        println!(
          "{}\t{}\texclusive={}\tmanaged={}",
          ns.registration.namespace_id, options.labels.name, options.exclusive, options.managed,
        );
      }
    }

    Command::Terms { namespace, hide_empty } => {
      service.registry().require(&namespace)?;
      let terms = service
        .store()
        .get_terms(&namespace, !hide_empty)
        .await
        .context("failed to list terms")?;
      for term in terms {
        println!("{}\t{}\t{}", term.slug, term.name, term.subject_count);
      }
    }

    Command::TermAdd { namespace, slug, name, description, parent } => {
      service.registry().require(&namespace)?;
      let parent_id = match parent {
        Some(parent) => Some(term_id(service, &namespace, &parent).await?),
        None => None,
      };
      let mut new_term = NewTerm::new(&slug, name);
      new_term.description = description;
      new_term.parent_id = parent_id;

      let term = service
        .store()
        .create_term(&namespace, new_term)
        .await
        .with_context(|| format!("failed to create term {slug:?}"))?;
      println!("{}\t{}", term.term_id, term.slug);
    }

    Command::Get { namespace, subject } => {
      match service
        .get_memberships(SubjectRef::Id(subject), &namespace)
        .await?
      {
        Some(terms) => {
          for term in terms {
            println!("{}\t{}", term.slug, term.name);
          }
        }
        None => anyhow::bail!("subject {subject} does not exist"),
      }
    }

    Command::Set { namespace, subject, slugs } => {
      let written = service
        .set_memberships(SubjectRef::Id(subject), &namespace, Some(&slugs))
        .await?;
      if !written {
        anyhow::bail!(
          "nothing written: subject {subject} does not exist or no slug names a term"
        );
      }
      tracing::info!(%namespace, subject, "memberships saved");
    }

    Command::Members { namespace, slugs } => {
      let slugs: Vec<&str> = slugs.iter().map(String::as_str).collect();
      let subjects = service
        .membership(&namespace)?
        .subjects_in_terms(&slugs)
        .await?;
      for subject in subjects {
        println!("{subject}");
      }
    }

    Command::BulkActions { namespace } => {
      for choice in service.bulk(&namespace)?.bulk_actions().await? {
        println!("{}\t{}", choice.token, choice.label);
      }
    }

    Command::Bulk { namespace, action, subjects } => {
      let subject_ids: Vec<SubjectId> =
        subjects.into_iter().filter_map(SubjectId::new).collect();
      let outcome = service
        .apply_bulk_action(&action, &subject_ids, &namespace)
        .await?;

      let Some(slug) = outcome.term_slug.as_deref() else {
        anyhow::bail!("unknown bulk action {action:?} for {namespace}");
      };
      let term_name = service
        .store()
        .get_term_by(TermField::Slug, slug, &namespace)
        .await
        .context("failed to read term")?
        .map_or_else(|| slug.to_owned(), |t| t.name);

      let group = service.registry().require(&namespace)?;
      if let Some(notice) = outcome.notice(group, &term_name) {
        match notice.level {
          NoticeLevel::Success => println!("{}", notice.text),
          NoticeLevel::Warning => eprintln!("{}", notice.text),
        }
      }
    }

    Command::Recount { namespace } => {
      let ids: Vec<TermId> = service
        .store()
        .get_terms(&namespace, true)
        .await
        .context("failed to list terms")?
        .into_iter()
        .map(|t| t.term_id)
        .collect();
      service
        .membership(&namespace)?
        .update_term_subject_count(&ids, None)
        .await?;
      tracing::info!(%namespace, terms = ids.len(), "counts recomputed");
    }

    Command::Profile { subject } => {
      let sections = service.profile_sections(SubjectRef::Id(subject)).await?;
      println!("{}", serde_json::to_string_pretty(&sections)?);
    }

    Command::DeleteSubject { subject } => {
      service.delete_subject(SubjectRef::Id(subject)).await?;
      tracing::info!(subject, "subject removed from every namespace");
    }

    Command::CheckUsername { username } => {
      if service.registry().is_reserved_username(&username) {
        anyhow::bail!("username {username:?} is reserved by a namespace");
      }
      println!("{username} is available");
    }
  }
  Ok(())
}

async fn term_id(service: &Service, namespace: &str, slug: &str) -> anyhow::Result<TermId> {
  service
    .store()
    .get_term_by(TermField::Slug, slug, namespace)
    .await
    .context("failed to read term")?
    .map(|t| t.term_id)
    .with_context(|| format!("no term {slug:?} in {namespace}"))
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
