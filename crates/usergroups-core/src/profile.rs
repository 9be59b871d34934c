//! The profile "Relationships" section as a view model.
//!
//! Rendering is left to the host. This module decides what a profile editor
//! should show for one namespace: whether the section appears at all, which
//! input to offer, which terms are checked and which row actions apply.
//! Several namespaces share one page through an explicit [`RenderContext`],
//! which makes sure the section heading appears once.

use serde::Serialize;

use crate::{
  Error, Result, access,
  group::GroupDefinition,
  nonce::NonceKeeper,
  store::{TermStore, UserDirectory},
  subject::SubjectRef,
  term::Term,
};

/// Heading shown above the first group section on a page.
pub const SECTION_HEADING: &str = "Relationships";

/// Per-page render state shared by every group section.
#[derive(Debug, Default)]
pub struct RenderContext {
  header_emitted: bool,
}

impl RenderContext {
  pub fn new() -> Self { Self::default() }

  /// `true` exactly once per context.
  fn claim_header(&mut self) -> bool {
    !std::mem::replace(&mut self.header_emitted, true)
  }
}

/// The control offered for choosing terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
  /// Any number of terms.
  Checkbox,
  /// At most one term (exclusive namespace).
  Radio,
  /// Shown but not changeable here (managed namespace).
  ReadOnly,
}

#[derive(Debug, Clone, Serialize)]
pub struct TermRow {
  pub term:     Term,
  pub active:   bool,
  /// The actor may open the list of this term's members.
  pub can_view: bool,
  /// The actor may edit the term itself.
  pub can_edit: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileSection {
  /// Present only on the first section of a page.
  pub heading:     Option<&'static str>,
  pub namespace:   String,
  pub label:       String,
  pub input:       InputKind,
  pub select_all:  bool,
  pub field_name:  String,
  pub rows:        Vec<TermRow>,
  /// Shown when `rows` is empty.
  pub empty_text:  String,
  /// `(field name, token)` to embed in the form.
  pub nonce_field: (String, String),
}

/// Build the section for `group`, or `None` when the actor may not assign
/// terms to the subject or the namespace has no UI.
pub async fn profile_section<S, D>(
  store: &S,
  directory: &D,
  group: &GroupDefinition,
  subject: SubjectRef<'_>,
  nonces: &NonceKeeper,
  ctx: &mut RenderContext,
) -> Result<Option<ProfileSection>>
where
  S: TermStore,
  D: UserDirectory,
{
  let Some(subject_id) = directory.resolve_subject_id(&subject) else {
    return Ok(None);
  };
  if !access::can_assign(directory, subject_id, group) || !group.shows_ui() {
    return Ok(None);
  }

  let namespace = group.namespace_id();
  let terms = store.get_terms(namespace, true).await.map_err(Error::store)?;
  let held = store
    .get_subject_terms(subject_id, namespace)
    .await
    .map_err(Error::store)?;

  let can_view = access::can_view_members(directory);
  let can_edit = access::can_edit_terms(directory, group);
  let rows = terms
    .into_iter()
    .map(|term| TermRow {
      active: held.iter().any(|h| h.term_id == term.term_id),
      term,
      can_view,
      can_edit,
    })
    .collect();

  let input = if group.is_managed() {
    InputKind::ReadOnly
  } else if group.is_exclusive() {
    InputKind::Radio
  } else {
    InputKind::Checkbox
  };

  Ok(Some(ProfileSection {
    heading: ctx.claim_header().then_some(SECTION_HEADING),
    namespace: namespace.to_owned(),
    label: group.plural_label().to_owned(),
    input,
    select_all: input == InputKind::Checkbox,
    field_name: group.field_name().to_owned(),
    rows,
    empty_text: group.labels().not_found.clone(),
    nonce_field: (
      group.nonce_field_name(),
      nonces.issue(group.profile_nonce_action(), directory.current_actor()),
    ),
  }))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn header_is_claimed_once() {
    let mut ctx = RenderContext::new();
    assert!(ctx.claim_header());
    assert!(!ctx.claim_header());
    assert!(!ctx.claim_header());
  }
}
