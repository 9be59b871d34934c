//! The membership engine: reads and replaces one subject's memberships in
//! one namespace.
//!
//! Unresolvable subjects, denied writes and bad anti-forgery tokens all end
//! in a silent no-op (`None` / `false`). Only faults raised by the term store
//! propagate, as [`Error::Store`].

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
  Error, Result, access,
  group::GroupDefinition,
  nonce::NonceKeeper,
  store::{TermStore, UserDirectory},
  subject::{SubjectId, SubjectRef},
  term::{Term, TermField, TermId, sanitize_key},
};

/// The profile section a grouped profile editor saves memberships from.
pub const PROFILE_SECTION: &str = "groups";

// ─── Submission ──────────────────────────────────────────────────────────────

/// The parts of a pending form submission the engine reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileSubmission {
  /// Multi-valued form fields, keyed by field name.
  pub fields:  BTreeMap<String, Vec<String>>,
  /// Anti-forgery tokens, keyed by nonce field name.
  pub nonces:  BTreeMap<String, String>,
  /// The profile section being saved, when the editor is split in sections.
  pub section: Option<String>,
}

impl ProfileSubmission {
  pub fn with_field<I, T>(mut self, name: &str, values: I) -> Self
  where
    I: IntoIterator<Item = T>,
    T: Into<String>,
  {
    self
      .fields
      .insert(name.to_owned(), values.into_iter().map(Into::into).collect());
    self
  }

  pub fn with_nonce(mut self, name: impl Into<String>, token: impl Into<String>) -> Self {
    self.nonces.insert(name.into(), token.into());
    self
  }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// Membership operations for one [`GroupDefinition`].
pub struct MembershipEngine<'a, S, D> {
  store:     &'a S,
  directory: &'a D,
  group:     &'a GroupDefinition,
}

impl<'a, S, D> MembershipEngine<'a, S, D>
where
  S: TermStore,
  D: UserDirectory,
{
  pub fn new(store: &'a S, directory: &'a D, group: &'a GroupDefinition) -> Self {
    Self { store, directory, group }
  }

  pub fn group(&self) -> &'a GroupDefinition { self.group }

  fn namespace(&self) -> &'a str { self.group.namespace_id() }

  fn resolve(&self, subject: &SubjectRef<'_>) -> Option<SubjectId> {
    let id = self.directory.resolve_subject_id(subject);
    if id.is_none() {
      debug!(
        namespace = self.namespace(),
        raw_id = subject.raw_id(),
        "subject reference did not resolve"
      );
    }
    id
  }

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Every term the subject belongs to in this namespace, as full records.
  ///
  /// `None` when the reference does not resolve to a subject.
  pub async fn get_memberships(
    &self,
    subject: SubjectRef<'_>,
  ) -> Result<Option<Vec<Term>>> {
    let Some(subject_id) = self.resolve(&subject) else {
      return Ok(None);
    };

    let terms = self
      .store
      .get_subject_terms(subject_id, self.namespace())
      .await
      .map_err(Error::store)?;
    Ok(Some(terms))
  }

  /// Whether the subject currently holds the term named `slug`.
  pub async fn is_member(&self, subject: SubjectRef<'_>, slug: &str) -> Result<bool> {
    let slug = sanitize_key(slug);
    Ok(
      self
        .get_memberships(subject)
        .await?
        .is_some_and(|terms| terms.iter().any(|t| t.slug == slug)),
    )
  }

  /// The union of subjects linked to any of the terms named by `slugs`,
  /// sorted by id. Unknown slugs contribute nothing.
  pub async fn subjects_in_terms(&self, slugs: &[&str]) -> Result<Vec<SubjectId>> {
    let mut subjects = BTreeSet::new();
    for slug in slugs {
      let slug = sanitize_key(slug);
      let term = self
        .store
        .get_term_by(TermField::Slug, &slug, self.namespace())
        .await
        .map_err(Error::store)?;
      let Some(term) = term else {
        debug!(namespace = self.namespace(), slug = %slug, "no such term");
        continue;
      };
      subjects.extend(
        self
          .store
          .get_subjects_linked_to_term(term.term_id, self.namespace())
          .await
          .map_err(Error::store)?,
      );
    }
    Ok(subjects.into_iter().collect())
  }

  // ── Writes ────────────────────────────────────────────────────────────

  /// Replace the subject's memberships with exactly `desired`.
  ///
  /// `None` or an empty list removes every membership in the namespace.
  /// Slugs are sanitised and de-duplicated, and slugs naming no existing
  /// term are dropped. A non-empty list in which no slug survives leaves
  /// the memberships untouched. In an exclusive namespace only the first
  /// remaining slug is kept. Returns `false` when nothing was written.
  ///
  /// This is the programmatic primitive and performs no permission check;
  /// see [`MembershipEngine::save_for_current_request`].
  pub async fn set_memberships(
    &self,
    subject: SubjectRef<'_>,
    desired: Option<&[String]>,
  ) -> Result<bool> {
    let Some(subject_id) = self.resolve(&subject) else {
      return Ok(false);
    };

    let slugs = match desired {
      Some(desired) if !desired.is_empty() => {
        let slugs = self.normalize(desired).await?;
        if slugs.is_empty() {
          warn!(
            namespace = self.namespace(),
            subject = %subject_id,
            ?desired,
            "no requested slug names a term; memberships left unchanged"
          );
          return Ok(false);
        }
        slugs
      }
      _ => Vec::new(),
    };

    let touched = if slugs.is_empty() {
      self
        .store
        .delete_all_subject_terms(subject_id, self.namespace())
        .await
        .map_err(Error::store)?
    } else {
      self
        .store
        .replace_subject_terms(subject_id, self.namespace(), &slugs)
        .await
        .map_err(Error::store)?
    };

    self.update_term_subject_count(&touched, None).await?;
    self
      .store
      .invalidate_cache(subject_id, self.namespace())
      .await
      .map_err(Error::store)?;

    debug!(
      namespace = self.namespace(),
      subject = %subject_id,
      slugs = ?slugs,
      "memberships replaced"
    );
    Ok(true)
  }

  /// Save memberships from a submitted profile form.
  ///
  /// Reads the desired slugs from the field named after the namespace and
  /// writes them only when the submission carries a valid token for this
  /// namespace and the actor may assign terms to the subject. A submission
  /// for a different profile section is ignored. Returns whether anything
  /// was written.
  pub async fn save_for_current_request(
    &self,
    subject: SubjectRef<'_>,
    submission: &ProfileSubmission,
    nonces: &NonceKeeper,
  ) -> Result<bool> {
    let token = submission
      .nonces
      .get(&self.group.nonce_field_name())
      .map(String::as_str)
      .unwrap_or_default();
    let actor = self.directory.current_actor();
    if nonces
      .verify(token, self.group.profile_nonce_action(), actor)
      .is_none()
    {
      debug!(namespace = self.namespace(), "profile save dropped: bad nonce");
      return Ok(false);
    }

    if let Some(section) = submission.section.as_deref()
      && sanitize_key(section) != PROFILE_SECTION
    {
      return Ok(false);
    }

    let Some(subject_id) = self.resolve(&subject) else {
      return Ok(false);
    };
    if !access::can_assign(self.directory, subject_id, self.group) {
      debug!(
        namespace = self.namespace(),
        subject = %subject_id,
        "profile save dropped: actor may not assign"
      );
      return Ok(false);
    }

    let desired = submission.fields.get(self.group.field_name());
    // Managed sections render read-only and submit no field.
    if desired.is_none() && self.group.is_managed() {
      debug!(
        namespace = self.namespace(),
        subject = %subject_id,
        "profile save skipped: read-only section"
      );
      return Ok(false);
    }
    self
      .set_memberships(SubjectRef::from(subject_id), desired.map(Vec::as_slice))
      .await
  }

  /// Remove every membership of a subject that is being deleted.
  pub async fn delete_term_relationships(&self, subject: SubjectRef<'_>) -> Result<bool> {
    self.set_memberships(subject, None).await
  }

  // ── Counts ────────────────────────────────────────────────────────────

  /// Recompute the cached subject count of each term from its live
  /// relationships. Falls back to this engine's namespace when `namespace`
  /// is `None`. Safe to call redundantly.
  pub async fn update_term_subject_count(
    &self,
    term_ids: &[TermId],
    namespace: Option<&str>,
  ) -> Result<()> {
    let namespace = namespace
      .filter(|ns| !ns.is_empty())
      .unwrap_or(self.namespace());

    let mut seen = HashSet::new();
    for &term_id in term_ids {
      if !seen.insert(term_id) {
        continue;
      }
      let linked = self
        .store
        .get_subjects_linked_to_term(term_id, namespace)
        .await
        .map_err(Error::store)?;
      self
        .store
        .set_term_count(term_id, namespace, linked.len() as u64)
        .await
        .map_err(Error::store)?;
    }
    Ok(())
  }

  // ── Helpers ───────────────────────────────────────────────────────────

  async fn normalize(&self, desired: &[String]) -> Result<Vec<String>> {
    let mut slugs: Vec<String> = Vec::with_capacity(desired.len());
    for raw in desired {
      let slug = sanitize_key(raw);
      if !slug.is_empty() && !slugs.contains(&slug) {
        slugs.push(slug);
      }
    }
    if slugs.is_empty() {
      return Ok(slugs);
    }

    let known: HashSet<String> = self
      .store
      .get_terms(self.namespace(), true)
      .await
      .map_err(Error::store)?
      .into_iter()
      .map(|t| t.slug)
      .collect();

    let (mut kept, dropped): (Vec<String>, Vec<String>) =
      slugs.into_iter().partition(|s| known.contains(s));
    if !dropped.is_empty() {
      warn!(namespace = self.namespace(), ?dropped, "ignoring unknown term slugs");
    }

    if self.group.is_exclusive() && kept.len() > 1 {
      warn!(
        namespace = self.namespace(),
        kept = %kept[0],
        dropped = ?&kept[1..],
        "exclusive namespace: keeping only the first term"
      );
      kept.truncate(1);
    }
    Ok(kept)
  }
}
