//! The collaborator traits the engines consume.
//!
//! [`TermStore`] persists namespaces, terms and subject relationships.
//! [`UserDirectory`] resolves subject references and answers permission
//! questions about the current actor. Both are implemented outside this
//! crate (e.g. `usergroups-store-sqlite`, or the host application's account
//! system); the engines depend only on these abstractions.

use std::future::Future;

use crate::{
  capability::Capability,
  group::NamespaceRegistration,
  subject::{SubjectId, SubjectRef},
  term::{NewTerm, Term, TermField, TermId},
};

// ─── TermStore ───────────────────────────────────────────────────────────────

/// Abstraction over the term/relationship persistence substrate.
///
/// `replace_subject_terms` must be atomic for a single subject and namespace.
/// A backend that cannot guarantee that has to serialise writes per
/// `(subject, namespace)` itself.
pub trait TermStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Namespaces ────────────────────────────────────────────────────────

  /// Declare a namespace. Re-declaring an existing namespace replaces its
  /// options.
  fn create_namespace<'a>(
    &'a self,
    registration: &'a NamespaceRegistration,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  // ── Terms ─────────────────────────────────────────────────────────────

  /// Persist a new term in `namespace`.
  fn create_term<'a>(
    &'a self,
    namespace: &'a str,
    term: NewTerm,
  ) -> impl Future<Output = Result<Term, Self::Error>> + Send + 'a;

  /// All terms in `namespace`, ordered by name. With `include_empty` false,
  /// terms whose cached count is zero are left out.
  fn get_terms<'a>(
    &'a self,
    namespace: &'a str,
    include_empty: bool,
  ) -> impl Future<Output = Result<Vec<Term>, Self::Error>> + Send + 'a;

  /// Look a single term up by id, slug or name.
  fn get_term_by<'a>(
    &'a self,
    field: TermField,
    value: &'a str,
    namespace: &'a str,
  ) -> impl Future<Output = Result<Option<Term>, Self::Error>> + Send + 'a;

  /// Overwrite the cached subject count of one term.
  fn set_term_count<'a>(
    &'a self,
    term_id: TermId,
    namespace: &'a str,
    count: u64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  // ── Relationships ─────────────────────────────────────────────────────

  /// Every subject currently linked to `term_id`.
  fn get_subjects_linked_to_term<'a>(
    &'a self,
    term_id: TermId,
    namespace: &'a str,
  ) -> impl Future<Output = Result<Vec<SubjectId>, Self::Error>> + Send + 'a;

  /// Every term in `namespace` linked to `subject_id`. May be served from a
  /// cache that [`TermStore::invalidate_cache`] clears.
  fn get_subject_terms<'a>(
    &'a self,
    subject_id: SubjectId,
    namespace: &'a str,
  ) -> impl Future<Output = Result<Vec<Term>, Self::Error>> + Send + 'a;

  /// Atomically replace the subject's relationships in `namespace` with
  /// exactly the terms named by `slugs`.
  ///
  /// Returns the ids of every term whose relationship set changed or may
  /// have changed (previous and new terms), for count recalculation.
  fn replace_subject_terms<'a>(
    &'a self,
    subject_id: SubjectId,
    namespace: &'a str,
    slugs: &'a [String],
  ) -> impl Future<Output = Result<Vec<TermId>, Self::Error>> + Send + 'a;

  /// Remove every relationship of the subject in `namespace`. Returns the
  /// ids of the terms that lost the subject.
  fn delete_all_subject_terms<'a>(
    &'a self,
    subject_id: SubjectId,
    namespace: &'a str,
  ) -> impl Future<Output = Result<Vec<TermId>, Self::Error>> + Send + 'a;

  /// Drop any cached view of the subject's terms in `namespace`.
  fn invalidate_cache<'a>(
    &'a self,
    subject_id: SubjectId,
    namespace: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

// ─── UserDirectory ───────────────────────────────────────────────────────────

/// The host's account system, seen from the current request.
pub trait UserDirectory: Send + Sync {
  /// Turn a reference into a concrete subject id. `None` when the reference
  /// does not name a persisted subject.
  fn resolve_subject_id(&self, subject: &SubjectRef<'_>) -> Option<SubjectId>;

  /// The actor performing the current request, if signed in.
  fn current_actor(&self) -> Option<SubjectId>;

  /// Whether the current actor holds `capability`, optionally with respect to
  /// one particular subject.
  fn current_actor_can(
    &self,
    capability: &Capability,
    subject: Option<SubjectId>,
  ) -> bool;
}
