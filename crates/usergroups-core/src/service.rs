//! [`UserGroups`]: the outward face of the crate.
//!
//! Bundles a term store, a user directory, the registry and the nonce keeper,
//! and dispatches namespace-addressed calls to the right engine.

use crate::{
  Result,
  bulk::{BulkEngine, BulkOutcome},
  membership::MembershipEngine,
  nonce::NonceKeeper,
  profile::{ProfileSection, RenderContext, profile_section},
  registry::GroupRegistry,
  store::{TermStore, UserDirectory},
  subject::{SubjectId, SubjectRef},
  term::Term,
};

pub struct UserGroups<S, D> {
  store:     S,
  directory: D,
  registry:  GroupRegistry,
  nonces:    NonceKeeper,
}

impl<S, D> UserGroups<S, D>
where
  S: TermStore,
  D: UserDirectory,
{
  /// Declare every registered namespace to `store` and build the facade.
  pub async fn new(
    store: S,
    directory: D,
    registry: GroupRegistry,
    nonces: NonceKeeper,
  ) -> Result<Self> {
    registry.register_all(&store).await?;
    Ok(Self { store, directory, registry, nonces })
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn directory(&self) -> &D { &self.directory }

  pub fn registry(&self) -> &GroupRegistry { &self.registry }

  pub fn nonces(&self) -> &NonceKeeper { &self.nonces }

  pub fn membership(&self, namespace: &str) -> Result<MembershipEngine<'_, S, D>> {
    let group = self.registry.require(namespace)?;
    Ok(MembershipEngine::new(&self.store, &self.directory, group))
  }

  pub fn bulk(&self, namespace: &str) -> Result<BulkEngine<'_, S, D>> {
    let group = self.registry.require(namespace)?;
    Ok(BulkEngine::new(&self.store, &self.directory, group))
  }

  /// See [`MembershipEngine::get_memberships`].
  pub async fn get_memberships(
    &self,
    subject: SubjectRef<'_>,
    namespace: &str,
  ) -> Result<Option<Vec<Term>>> {
    self.membership(namespace)?.get_memberships(subject).await
  }

  /// See [`MembershipEngine::set_memberships`].
  pub async fn set_memberships(
    &self,
    subject: SubjectRef<'_>,
    namespace: &str,
    slugs: Option<&[String]>,
  ) -> Result<bool> {
    self.membership(namespace)?.set_memberships(subject, slugs).await
  }

  /// See [`BulkEngine::apply_bulk_action`].
  pub async fn apply_bulk_action(
    &self,
    token: &str,
    subject_ids: &[SubjectId],
    namespace: &str,
  ) -> Result<BulkOutcome> {
    self.bulk(namespace)?.apply_bulk_action(token, subject_ids).await
  }

  /// Drop a deleted subject from every namespace.
  pub async fn delete_subject(&self, subject: SubjectRef<'_>) -> Result<()> {
    for group in self.registry.iter() {
      MembershipEngine::new(&self.store, &self.directory, group)
        .delete_term_relationships(subject)
        .await?;
    }
    Ok(())
  }

  /// Every visible group section of the subject's profile page, with the
  /// heading on the first one.
  pub async fn profile_sections(
    &self,
    subject: SubjectRef<'_>,
  ) -> Result<Vec<ProfileSection>> {
    let mut ctx = RenderContext::new();
    let mut sections = Vec::new();
    for group in self.registry.iter() {
      if let Some(section) = profile_section(
        &self.store,
        &self.directory,
        group,
        subject,
        &self.nonces,
        &mut ctx,
      )
      .await?
      {
        sections.push(section);
      }
    }
    Ok(sections)
  }
}
