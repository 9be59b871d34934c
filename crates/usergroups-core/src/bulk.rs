//! The bulk mutation engine: one add/remove action across many subjects.
//!
//! Subjects are processed one at a time in the order given, each with its
//! own read-modify-write. Nothing spans subjects, so an interrupted batch
//! leaves every processed subject committed and the rest untouched; running
//! the same action again is safe because add and remove are idempotent.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator as _};
use tracing::{debug, info};

use crate::{
  Error, Result, access,
  group::GroupDefinition,
  membership::MembershipEngine,
  nonce::NonceKeeper,
  store::{TermStore, UserDirectory},
  subject::{SubjectId, SubjectRef},
  term::slugs_of,
};

// ─── Action ──────────────────────────────────────────────────────────────────

/// What a bulk action does to each subject.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
  EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Operation {
  Add,
  Remove,
}

/// One bulk action: an operation against a term of a namespace.
///
/// The textual token is `{operation}-{term_slug}-{namespace_id}`. Decoding
/// strips the operation prefix and the exact namespace suffix, so slugs that
/// themselves contain dashes or the namespace name decode correctly. The
/// struct also serialises as a plain JSON triple for callers that prefer a
/// structured token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkAction {
  pub operation:    Operation,
  pub term_slug:    String,
  pub namespace_id: String,
}

impl BulkAction {
  pub fn new(
    operation: Operation,
    term_slug: impl Into<String>,
    namespace_id: impl Into<String>,
  ) -> Self {
    Self {
      operation,
      term_slug: term_slug.into(),
      namespace_id: namespace_id.into(),
    }
  }

  pub fn token(&self) -> String {
    format!("{}-{}-{}", self.operation, self.term_slug, self.namespace_id)
  }

  /// Decode a textual token for the known `namespace`. `None` when the token
  /// does not have the expected shape.
  pub fn decode(token: &str, namespace: &str) -> Option<Self> {
    let (op, rest) = token.split_once('-')?;
    let operation: Operation = op.parse().ok()?;
    let term_slug = rest.strip_suffix(namespace)?.strip_suffix('-')?;
    if term_slug.is_empty() {
      return None;
    }
    Some(Self::new(operation, term_slug, namespace))
  }

  pub fn to_json(&self) -> Result<String> { Ok(serde_json::to_string(self)?) }

  pub fn from_json(s: &str) -> Result<Self> { Ok(serde_json::from_str(s)?) }
}

/// A selectable bulk action with its display label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkChoice {
  pub token:  String,
  pub label:  String,
  pub action: BulkAction,
}

// ─── Outcome ─────────────────────────────────────────────────────────────────

/// The result of one bulk run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkOutcome {
  /// Subjects whose memberships actually changed.
  pub affected_count: usize,
  /// `None` when the token did not resolve to a term of the namespace.
  pub operation:      Option<Operation>,
  pub term_slug:      Option<String>,
  pub namespace_id:   String,
}

impl BulkOutcome {
  fn unresolved(namespace_id: &str) -> Self {
    Self {
      affected_count: 0,
      operation:      None,
      term_slug:      None,
      namespace_id:   namespace_id.to_owned(),
    }
  }

  /// The operator-facing message for this outcome. `None` for an unresolved
  /// action.
  pub fn notice(&self, group: &GroupDefinition, term_name: &str) -> Option<BulkNotice> {
    let operation = self.operation?;
    let singular = group.singular_label();
    let verb = match operation {
      Operation::Add => "added to",
      Operation::Remove => "removed from",
    };

    let notice = match self.affected_count {
      0 => BulkNotice {
        level: NoticeLevel::Warning,
        text:  format!("No users {verb} the \"{term_name}\" {singular}."),
      },
      1 => BulkNotice {
        level: NoticeLevel::Success,
        text:  format!("1 user {verb} the \"{term_name}\" {singular}."),
      },
      n => BulkNotice {
        level: NoticeLevel::Success,
        text:  format!("{n} users {verb} the \"{term_name}\" {singular}."),
      },
    };
    Some(notice)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
  Success,
  Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkNotice {
  pub level: NoticeLevel,
  pub text:  String,
}

/// A submitted bulk form: the chosen token, raw subject ids and the
/// anti-forgery token.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkRequest {
  pub action:      String,
  pub subject_ids: Vec<u64>,
  pub nonce:       String,
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// Bulk operations for one [`GroupDefinition`].
pub struct BulkEngine<'a, S, D> {
  store:      &'a S,
  directory:  &'a D,
  membership: MembershipEngine<'a, S, D>,
}

impl<'a, S, D> BulkEngine<'a, S, D>
where
  S: TermStore,
  D: UserDirectory,
{
  pub fn new(store: &'a S, directory: &'a D, group: &'a GroupDefinition) -> Self {
    Self {
      store,
      directory,
      membership: MembershipEngine::new(store, directory, group),
    }
  }

  fn group(&self) -> &'a GroupDefinition { self.membership.group() }

  fn namespace(&self) -> &'a str { self.group().namespace_id() }

  /// Every add and remove action for the namespace's current terms, all adds
  /// first.
  pub async fn bulk_actions(&self) -> Result<Vec<BulkChoice>> {
    let terms = self
      .store
      .get_terms(self.namespace(), true)
      .await
      .map_err(Error::store)?;
    let singular = self.group().singular_label();

    let mut choices = Vec::with_capacity(terms.len() * 2);
    for operation in Operation::iter() {
      for term in &terms {
        let action = BulkAction::new(operation, &term.slug, self.namespace());
        let label = match operation {
          Operation::Add => format!("Add to {} {singular}", term.name),
          Operation::Remove => format!("Remove from {} {singular}", term.name),
        };
        choices.push(BulkChoice { token: action.token(), label, action });
      }
    }
    Ok(choices)
  }

  /// Apply `token` to each subject the actor may modify.
  ///
  /// A token naming no current term of the namespace yields a zero outcome
  /// with no operation. Subjects the actor may not modify are skipped
  /// without being reported.
  pub async fn apply_bulk_action(
    &self,
    token: &str,
    subject_ids: &[SubjectId],
  ) -> Result<BulkOutcome> {
    let terms = self
      .store
      .get_terms(self.namespace(), true)
      .await
      .map_err(Error::store)?;

    let action = BulkAction::decode(token, self.namespace())
      .filter(|a| terms.iter().any(|t| t.slug == a.term_slug));
    let Some(action) = action else {
      debug!(namespace = self.namespace(), token, "unknown bulk action");
      return Ok(BulkOutcome::unresolved(self.namespace()));
    };

    let mut affected_count = 0;
    for &subject_id in subject_ids {
      if !access::can_assign(self.directory, subject_id, self.group()) {
        debug!(
          namespace = self.namespace(),
          subject = %subject_id,
          "bulk: skipping subject the actor may not modify"
        );
        continue;
      }

      let current = slugs_of(
        &self
          .store
          .get_subject_terms(subject_id, self.namespace())
          .await
          .map_err(Error::store)?,
      );
      let Some(updated) = self.apply_to(&action, &current) else {
        continue;
      };

      // An empty set takes the deletion path.
      let desired = (!updated.is_empty()).then_some(updated.as_slice());
      if self
        .membership
        .set_memberships(SubjectRef::from(subject_id), desired)
        .await?
      {
        affected_count += 1;
      }
    }

    info!(
      namespace = self.namespace(),
      operation = %action.operation,
      term = %action.term_slug,
      affected_count,
      "bulk action applied"
    );

    Ok(BulkOutcome {
      affected_count,
      operation: Some(action.operation),
      term_slug: Some(action.term_slug),
      namespace_id: self.namespace().to_owned(),
    })
  }

  /// Verify the bulk form's anti-forgery token, then apply its action.
  ///
  /// A missing or invalid token yields a zero outcome before the store is
  /// touched. Raw ids that do not resolve are dropped.
  pub async fn apply_bulk_request(
    &self,
    request: &BulkRequest,
    nonces: &NonceKeeper,
  ) -> Result<BulkOutcome> {
    let actor = self.directory.current_actor();
    if nonces
      .verify(&request.nonce, &self.group().bulk_nonce_action(), actor)
      .is_none()
    {
      debug!(namespace = self.namespace(), "bulk request dropped: bad nonce");
      return Ok(BulkOutcome::unresolved(self.namespace()));
    }

    let subject_ids: Vec<SubjectId> = request
      .subject_ids
      .iter()
      .filter_map(|&raw| self.directory.resolve_subject_id(&SubjectRef::Id(raw)))
      .collect();
    self.apply_bulk_action(&request.action, &subject_ids).await
  }

  /// The subject's new slug set, or `None` when the action changes nothing.
  fn apply_to(&self, action: &BulkAction, current: &[String]) -> Option<Vec<String>> {
    let slug = &action.term_slug;
    match action.operation {
      Operation::Add if current.contains(slug) => None,
      // Exclusive namespaces hold one term, so adding moves the subject.
      Operation::Add if self.group().is_exclusive() => Some(vec![slug.clone()]),
      Operation::Add => {
        let mut updated = current.to_vec();
        updated.push(slug.clone());
        Some(updated)
      }
      Operation::Remove => {
        let pos = current.iter().position(|s| s == slug)?;
        let mut updated = current.to_vec();
        updated.remove(pos);
        Some(updated)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn token_encodes_triple() {
    let action = BulkAction::new(Operation::Add, "gold", "user-group");
    assert_eq!(action.token(), "add-gold-user-group");
  }

  #[test]
  fn decode_uses_exact_namespace_suffix() {
    let action = BulkAction::decode("remove-user-group-admins-user-group", "user-group")
      .unwrap();
    assert_eq!(action.operation, Operation::Remove);
    assert_eq!(action.term_slug, "user-group-admins");
  }

  #[test]
  fn decode_rejects_malformed_tokens() {
    assert!(BulkAction::decode("promote-gold-user-group", "user-group").is_none());
    assert!(BulkAction::decode("add-gold-user-type", "user-group").is_none());
    assert!(BulkAction::decode("add--user-group", "user-group").is_none());
    assert!(BulkAction::decode("add-user-group", "user-group").is_none());
    assert!(BulkAction::decode("", "user-group").is_none());
  }

  #[test]
  fn structured_token_roundtrip() {
    let action = BulkAction::new(Operation::Remove, "gold", "user-type");
    let json = action.to_json().unwrap();
    assert_eq!(
      json,
      r#"{"operation":"remove","term_slug":"gold","namespace_id":"user-type"}"#
    );
    assert_eq!(BulkAction::from_json(&json).unwrap(), action);
  }
}
