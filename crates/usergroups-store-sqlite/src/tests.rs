//! Integration tests for `SqliteStore` against an in-memory database.

use usergroups_core::{
  UserGroups,
  capability::{Capability, CapabilityOverrides},
  directory::StaticDirectory,
  group::{GroupArgs, GroupDefinition, LabelOverrides},
  nonce::NonceKeeper,
  registry::GroupRegistry,
  store::TermStore,
  subject::{SubjectId, SubjectRef},
  term::{NewTerm, TermField, TermId},
};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn group(ns: &str, exclusive: bool) -> GroupDefinition {
  let mut args = GroupArgs::named("Group", "Groups");
  args.exclusive = exclusive;
  GroupDefinition::new(
    ns,
    "users/group",
    args,
    LabelOverrides::default(),
    CapabilityOverrides::default(),
  )
  .unwrap()
}

/// A store with the `user-group` namespace and three terms.
async fn seeded() -> SqliteStore {
  let s = store().await;
  s.create_namespace(&group("user-group", false).registration())
    .await
    .unwrap();
  for (slug, name) in [("gold", "Gold"), ("silver", "Silver"), ("bronze", "Bronze")] {
    s.create_term("user-group", NewTerm::new(slug, name)).await.unwrap();
  }
  s
}

fn id(raw: u64) -> SubjectId { SubjectId::new(raw).unwrap() }

fn slugs(list: &[&str]) -> Vec<String> { list.iter().map(|s| s.to_string()).collect() }

async fn term_id(s: &SqliteStore, slug: &str) -> TermId {
  s.get_term_by(TermField::Slug, slug, "user-group")
    .await
    .unwrap()
    .unwrap()
    .term_id
}

// ─── Namespaces ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn namespace_roundtrips_options() {
  let s = store().await;
  s.create_namespace(&group("user-type", true).registration())
    .await
    .unwrap();

  let stored = s.list_namespaces().await.unwrap();
  assert_eq!(stored.len(), 1);
  let reg = &stored[0].registration;
  assert_eq!(reg.namespace_id, "user-type");
  assert_eq!(reg.object_types, ["user".to_owned()]);
  assert!(reg.options.exclusive);
  assert_eq!(reg.options.labels.name, "Groups");
}

#[tokio::test]
async fn redeclaring_namespace_replaces_options() {
  let s = store().await;
  s.create_namespace(&group("user-group", false).registration())
    .await
    .unwrap();
  let first = s.list_namespaces().await.unwrap()[0].registered_at;

  s.create_namespace(&group("user-group", true).registration())
    .await
    .unwrap();
  let stored = s.list_namespaces().await.unwrap();
  assert_eq!(stored.len(), 1);
  assert!(stored[0].registration.options.exclusive);
  assert_eq!(stored[0].registered_at, first);
}

// ─── Terms ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_term_requires_namespace() {
  let s = store().await;
  let err = s
    .create_term("user-group", NewTerm::new("gold", "Gold"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::UnknownNamespace(ns) if ns == "user-group"));
}

#[tokio::test]
async fn duplicate_slug_is_rejected() {
  let s = seeded().await;
  let err = s
    .create_term("user-group", NewTerm::new("gold", "Gold again"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Database(_)));
}

#[tokio::test]
async fn terms_are_listed_by_name() {
  let s = seeded().await;
  let names: Vec<String> = s
    .get_terms("user-group", true)
    .await
    .unwrap()
    .into_iter()
    .map(|t| t.name)
    .collect();
  assert_eq!(names, ["Bronze", "Gold", "Silver"]);
  assert!(s.get_terms("user-group", false).await.unwrap().is_empty());
  assert!(s.get_terms("user-type", true).await.unwrap().is_empty());
}

#[tokio::test]
async fn term_lookup_by_each_field() {
  let s = seeded().await;
  let gold = s
    .get_term_by(TermField::Slug, "gold", "user-group")
    .await
    .unwrap()
    .unwrap();
  assert_eq!(gold.name, "Gold");
  assert_eq!(gold.subject_count, 0);

  let by_id = s
    .get_term_by(TermField::Id, &gold.term_id.to_string(), "user-group")
    .await
    .unwrap();
  assert_eq!(by_id.as_ref(), Some(&gold));

  let by_name = s.get_term_by(TermField::Name, "Gold", "user-group").await.unwrap();
  assert_eq!(by_name, Some(gold));

  assert!(
    s.get_term_by(TermField::Id, "not-a-number", "user-group")
      .await
      .unwrap()
      .is_none()
  );
  assert!(
    s.get_term_by(TermField::Slug, "gold", "user-type")
      .await
      .unwrap()
      .is_none()
  );
}

#[tokio::test]
async fn child_terms_keep_parent() {
  let s = seeded().await;
  let gold = term_id(&s, "gold").await;
  let mut child = NewTerm::new("gold-plus", "Gold Plus");
  child.parent_id = Some(gold);
  let created = s.create_term("user-group", child).await.unwrap();
  assert_eq!(created.parent_id, Some(gold));
}

// ─── Relationships ───────────────────────────────────────────────────────────

#[tokio::test]
async fn replace_returns_old_and_new_terms() {
  let s = seeded().await;
  let first = s
    .replace_subject_terms(id(7), "user-group", &slugs(&["gold", "silver"]))
    .await
    .unwrap();
  assert_eq!(first.len(), 2);

  let second = s
    .replace_subject_terms(id(7), "user-group", &slugs(&["bronze"]))
    .await
    .unwrap();
  let gold = term_id(&s, "gold").await;
  let silver = term_id(&s, "silver").await;
  let bronze = term_id(&s, "bronze").await;
  assert_eq!(second.len(), 3);
  for t in [gold, silver, bronze] {
    assert!(second.contains(&t));
  }

  let held = s.get_subject_terms(id(7), "user-group").await.unwrap();
  assert_eq!(held.len(), 1);
  assert_eq!(held[0].slug, "bronze");
}

#[tokio::test]
async fn replace_with_unknown_slug_changes_nothing() {
  let s = seeded().await;
  s.replace_subject_terms(id(7), "user-group", &slugs(&["gold"]))
    .await
    .unwrap();

  let err = s
    .replace_subject_terms(id(7), "user-group", &slugs(&["silver", "platinum"]))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::UnknownTerm { slug, .. } if slug == "platinum"));

  s.invalidate_cache(id(7), "user-group").await.unwrap();
  let held = s.get_subject_terms(id(7), "user-group").await.unwrap();
  assert_eq!(held.len(), 1);
  assert_eq!(held[0].slug, "gold");
}

#[tokio::test]
async fn delete_all_reports_lost_terms() {
  let s = seeded().await;
  s.replace_subject_terms(id(7), "user-group", &slugs(&["gold", "silver"]))
    .await
    .unwrap();

  let lost = s.delete_all_subject_terms(id(7), "user-group").await.unwrap();
  assert_eq!(lost.len(), 2);
  assert!(
    s.delete_all_subject_terms(id(7), "user-group")
      .await
      .unwrap()
      .is_empty()
  );
}

#[tokio::test]
async fn linked_subjects_and_counts() {
  let s = seeded().await;
  for subject in [3, 1, 2] {
    s.replace_subject_terms(id(subject), "user-group", &slugs(&["gold"]))
      .await
      .unwrap();
  }
  let gold = term_id(&s, "gold").await;
  let linked = s.get_subjects_linked_to_term(gold, "user-group").await.unwrap();
  assert_eq!(linked, [id(1), id(2), id(3)]);

  s.set_term_count(gold, "user-group", 3).await.unwrap();
  let listed = s.get_terms("user-group", false).await.unwrap();
  assert_eq!(listed.len(), 1);
  assert_eq!(listed[0].subject_count, 3);
}

#[tokio::test]
async fn subject_terms_are_cached_until_invalidated() {
  let s = seeded().await;
  s.replace_subject_terms(id(7), "user-group", &slugs(&["gold"]))
    .await
    .unwrap();
  assert_eq!(s.get_subject_terms(id(7), "user-group").await.unwrap().len(), 1);

  // A raw replace does not touch the cache.
  s.replace_subject_terms(id(7), "user-group", &slugs(&["gold", "silver"]))
    .await
    .unwrap();
  assert_eq!(s.get_subject_terms(id(7), "user-group").await.unwrap().len(), 1);

  s.invalidate_cache(id(7), "user-group").await.unwrap();
  assert_eq!(s.get_subject_terms(id(7), "user-group").await.unwrap().len(), 2);
}

#[tokio::test]
async fn stale_read_is_not_cached_after_invalidation() {
  let s = seeded().await;
  s.replace_subject_terms(id(7), "user-group", &slugs(&["gold"]))
    .await
    .unwrap();

  // A reader starts, another writer replaces and invalidates, then the
  // reader tries to cache what it saw.
  let key = (id(7), "user-group".to_owned());
  let (cached, seen) = s.cached(&key).await;
  assert!(cached.is_none());
  let stale = s.get_subject_terms(id(7), "user-group").await.unwrap();
  s.invalidate_cache(id(7), "user-group").await.unwrap();

  s.replace_subject_terms(id(7), "user-group", &slugs(&["silver"]))
    .await
    .unwrap();
  s.invalidate_cache(id(7), "user-group").await.unwrap();
  s.fill_cache(key.clone(), stale, seen).await;

  assert!(s.cached(&key).await.0.is_none());
  let held = s.get_subject_terms(id(7), "user-group").await.unwrap();
  assert_eq!(held.len(), 1);
  assert_eq!(held[0].slug, "silver");
}

#[tokio::test]
async fn count_updates_evict_cached_terms() {
  let s = seeded().await;
  s.replace_subject_terms(id(7), "user-group", &slugs(&["gold"]))
    .await
    .unwrap();
  let cached = s.get_subject_terms(id(7), "user-group").await.unwrap();
  assert_eq!(cached[0].subject_count, 0);

  s.set_term_count(cached[0].term_id, "user-group", 1).await.unwrap();
  let fresh = s.get_subject_terms(id(7), "user-group").await.unwrap();
  assert_eq!(fresh[0].subject_count, 1);
}

#[tokio::test]
async fn namespaces_do_not_share_relationships() {
  let s = seeded().await;
  s.create_namespace(&group("user-type", true).registration())
    .await
    .unwrap();
  s.create_term("user-type", NewTerm::new("staff", "Staff")).await.unwrap();

  s.replace_subject_terms(id(7), "user-group", &slugs(&["gold"]))
    .await
    .unwrap();
  s.replace_subject_terms(id(7), "user-type", &slugs(&["staff"]))
    .await
    .unwrap();
  s.delete_all_subject_terms(id(7), "user-type").await.unwrap();

  assert_eq!(s.get_subject_terms(id(7), "user-group").await.unwrap().len(), 1);
  assert!(s.get_subject_terms(id(7), "user-type").await.unwrap().is_empty());
}

// ─── Engines over SQLite ─────────────────────────────────────────────────────

async fn service() -> UserGroups<SqliteStore, StaticDirectory> {
  let directory = StaticDirectory::new(1, [Capability::EditUser, Capability::ListUsers]);
  let svc = UserGroups::new(
    store().await,
    directory,
    GroupRegistry::with_defaults().unwrap(),
    NonceKeeper::new(b"sqlite-tests".to_vec()),
  )
  .await
  .unwrap();
  for (slug, name) in [("gold", "Gold"), ("silver", "Silver")] {
    svc
      .store()
      .create_term("user-group", NewTerm::new(slug, name))
      .await
      .unwrap();
  }
  svc
}

async fn held(svc: &UserGroups<SqliteStore, StaticDirectory>, subject: u64) -> Vec<String> {
  svc
    .get_memberships(SubjectRef::Id(subject), "user-group")
    .await
    .unwrap()
    .unwrap()
    .into_iter()
    .map(|t| t.slug)
    .collect()
}

#[tokio::test]
async fn engine_replaces_memberships_and_counts() {
  let svc = service().await;
  svc
    .set_memberships(SubjectRef::Id(10), "user-group", Some(&slugs(&["gold", "silver"])))
    .await
    .unwrap();
  assert_eq!(held(&svc, 10).await, ["gold", "silver"]);

  svc
    .set_memberships(SubjectRef::Id(10), "user-group", Some(&slugs(&["silver"])))
    .await
    .unwrap();
  assert_eq!(held(&svc, 10).await, ["silver"]);

  let terms = svc.store().get_terms("user-group", true).await.unwrap();
  let counts: Vec<(String, u64)> =
    terms.into_iter().map(|t| (t.slug, t.subject_count)).collect();
  assert_eq!(counts, [("gold".to_owned(), 0), ("silver".to_owned(), 1)]);
}

#[tokio::test]
async fn engine_bulk_add_then_remove() {
  let svc = service().await;
  let subjects = [id(10), id(11)];

  let added = svc
    .apply_bulk_action("add-gold-user-group", &subjects, "user-group")
    .await
    .unwrap();
  assert_eq!(added.affected_count, 2);
  let again = svc
    .apply_bulk_action("add-gold-user-group", &subjects, "user-group")
    .await
    .unwrap();
  assert_eq!(again.affected_count, 0);

  let removed = svc
    .apply_bulk_action("remove-gold-user-group", &subjects, "user-group")
    .await
    .unwrap();
  assert_eq!(removed.affected_count, 2);
  assert!(held(&svc, 10).await.is_empty());

  let gold = svc
    .store()
    .get_term_by(TermField::Slug, "gold", "user-group")
    .await
    .unwrap()
    .unwrap();
  assert_eq!(gold.subject_count, 0);
}

#[tokio::test]
async fn store_faults_wrap_into_core_errors() {
  let svc = service().await;
  svc
    .set_memberships(SubjectRef::Id(10), "user-group", Some(&slugs(&["gold"])))
    .await
    .unwrap();

  // `user-type` has no terms: the engine drops the slug and writes nothing.
  let membership = svc.membership("user-type").unwrap();
  assert!(
    !membership
      .set_memberships(SubjectRef::Id(10), Some(&slugs(&["gold"])))
      .await
      .unwrap()
  );
  assert_eq!(held(&svc, 10).await, ["gold"]);

  let err = svc
    .store()
    .replace_subject_terms(id(10), "user-type", &slugs(&["gold"]))
    .await
    .map_err(usergroups_core::Error::store)
    .unwrap_err();
  assert!(matches!(err, usergroups_core::Error::Store(_)));
  assert!(err.to_string().contains("no term \"gold\""));
}
