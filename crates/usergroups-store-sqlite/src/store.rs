//! [`SqliteStore`]: the SQLite implementation of [`TermStore`].

use std::{collections::HashMap, path::Path, sync::Arc};

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, types::Value};
use tokio::sync::RwLock;
use tracing::debug;

use usergroups_core::{
  group::NamespaceRegistration,
  store::TermStore,
  subject::SubjectId,
  term::{NewTerm, Term, TermField, TermId},
};

use crate::{
  Error, Result,
  encode::{
    RawNamespace, RawTerm, decode_subject_id, encode_dt, encode_object_types,
    encode_options, encode_subject_id,
  },
  schema::SCHEMA,
};

/// A namespace as persisted, with the time it was first declared.
#[derive(Debug, Clone)]
pub struct StoredNamespace {
  pub registration:  NamespaceRegistration,
  pub registered_at: DateTime<Utc>,
}

pub(crate) type CacheKey = (SubjectId, String);

/// Cached term lists keyed by `(subject, namespace)`.
///
/// `generation` moves on every invalidation. A list read from the database
/// is only cached if no invalidation happened since the read began.
#[derive(Default)]
pub(crate) struct TermCache {
  entries:    HashMap<CacheKey, Vec<Term>>,
  generation: u64,
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A user-groups term store backed by a single SQLite file.
///
/// Cloning is cheap; clones share the connection and the term cache.
#[derive(Clone)]
pub struct SqliteStore {
  conn:  tokio_rusqlite::Connection,
  cache: Arc<RwLock<TermCache>>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, cache: Arc::default() };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, cache: Arc::default() };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Every declared namespace, ordered by id.
  pub async fn list_namespaces(&self) -> Result<Vec<StoredNamespace>> {
    let raws: Vec<RawNamespace> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT namespace_id, object_types, options, registered_at
           FROM namespaces ORDER BY namespace_id",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawNamespace {
              namespace_id:  row.get(0)?,
              object_types:  row.get(1)?,
              options:       row.get(2)?,
              registered_at: row.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawNamespace::into_stored).collect()
  }

  async fn require_namespace(&self, namespace: &str) -> Result<()> {
    let ns = namespace.to_owned();
    let exists = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM namespaces WHERE namespace_id = ?1",
              rusqlite::params![ns],
              |_| Ok(()),
            )
            .optional()?
            .is_some(),
        )
      })
      .await?;

    if exists {
      Ok(())
    } else {
      Err(Error::UnknownNamespace(namespace.to_owned()))
    }
  }

  /// Drop every cached term list of `namespace`; cached terms carry counts.
  async fn evict_namespace(&self, namespace: &str) {
    let mut cache = self.cache.write().await;
    cache.entries.retain(|(_, ns), _| ns != namespace);
    cache.generation += 1;
  }

  /// The cached list for `key`, if any, and the generation it was read at.
  pub(crate) async fn cached(&self, key: &CacheKey) -> (Option<Vec<Term>>, u64) {
    let cache = self.cache.read().await;
    (cache.entries.get(key).cloned(), cache.generation)
  }

  /// Cache `terms` unless the cache was invalidated after `seen`.
  pub(crate) async fn fill_cache(&self, key: CacheKey, terms: Vec<Term>, seen: u64) {
    let mut cache = self.cache.write().await;
    if cache.generation == seen {
      cache.entries.insert(key, terms);
    }
  }
}

// ─── TermStore impl ──────────────────────────────────────────────────────────

impl TermStore for SqliteStore {
  type Error = Error;

  // ── Namespaces ────────────────────────────────────────────────────────────

  async fn create_namespace(&self, registration: &NamespaceRegistration) -> Result<()> {
    let namespace_id = registration.namespace_id.clone();
    let object_types = encode_object_types(&registration.object_types)?;
    let options      = encode_options(&registration.options)?;
    let at_str       = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO namespaces (namespace_id, object_types, options, registered_at)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (namespace_id) DO UPDATE SET
             object_types = excluded.object_types,
             options      = excluded.options",
          rusqlite::params![namespace_id, object_types, options, at_str],
        )?;
        Ok(())
      })
      .await?;

    debug!(namespace = %registration.namespace_id, "namespace stored");
    Ok(())
  }

  // ── Terms ─────────────────────────────────────────────────────────────────

  async fn create_term(&self, namespace: &str, term: NewTerm) -> Result<Term> {
    self.require_namespace(namespace).await?;
    let ns = namespace.to_owned();

    let raw: RawTerm = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO terms (namespace, slug, name, description, parent_id)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![
            ns,
            term.slug,
            term.name,
            term.description,
            term.parent_id.map(|p| p.0),
          ],
        )?;
        let term_id = conn.last_insert_rowid();
        Ok(conn.query_row(
          &format!("SELECT {} FROM terms t WHERE t.term_id = ?1", RawTerm::COLUMNS),
          rusqlite::params![term_id],
          RawTerm::from_row,
        )?)
      })
      .await?;

    raw.into_term()
  }

  async fn get_terms(&self, namespace: &str, include_empty: bool) -> Result<Vec<Term>> {
    let ns = namespace.to_owned();

    let raws: Vec<RawTerm> = self
      .conn
      .call(move |conn| {
        let filter = if include_empty { "" } else { "AND t.subject_count > 0" };
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM terms t
           WHERE t.namespace = ?1 {filter}
           ORDER BY t.name, t.term_id",
          RawTerm::COLUMNS
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![ns], RawTerm::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawTerm::into_term).collect()
  }

  async fn get_term_by(
    &self,
    field: TermField,
    value: &str,
    namespace: &str,
  ) -> Result<Option<Term>> {
    let (column, key) = match field {
      TermField::Id => match value.parse::<i64>() {
        Ok(id) => ("t.term_id", Value::Integer(id)),
        Err(_) => return Ok(None),
      },
      TermField::Slug => ("t.slug", Value::Text(value.to_owned())),
      TermField::Name => ("t.name", Value::Text(value.to_owned())),
    };
    let ns = namespace.to_owned();

    let raw: Option<RawTerm> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {} FROM terms t
                 WHERE t.namespace = ?1 AND {column} = ?2
                 ORDER BY t.term_id LIMIT 1",
                RawTerm::COLUMNS
              ),
              rusqlite::params![ns, key],
              RawTerm::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawTerm::into_term).transpose()
  }

  async fn set_term_count(&self, term_id: TermId, namespace: &str, count: u64) -> Result<()> {
    let ns = namespace.to_owned();
    let count = i64::try_from(count).unwrap_or(i64::MAX);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE terms SET subject_count = ?1 WHERE term_id = ?2 AND namespace = ?3",
          rusqlite::params![count, term_id.0, ns],
        )?;
        Ok(())
      })
      .await?;

    self.evict_namespace(namespace).await;
    Ok(())
  }

  // ── Relationships ─────────────────────────────────────────────────────────

  async fn get_subjects_linked_to_term(
    &self,
    term_id: TermId,
    namespace: &str,
  ) -> Result<Vec<SubjectId>> {
    let ns = namespace.to_owned();

    let raws: Vec<i64> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT r.subject_id FROM relationships r
           JOIN terms t ON t.term_id = r.term_id
           WHERE r.term_id = ?1 AND t.namespace = ?2
           ORDER BY r.subject_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![term_id.0, ns], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(decode_subject_id).collect()
  }

  async fn get_subject_terms(
    &self,
    subject_id: SubjectId,
    namespace: &str,
  ) -> Result<Vec<Term>> {
    let key = (subject_id, namespace.to_owned());
    let (cached, seen) = self.cached(&key).await;
    if let Some(terms) = cached {
      return Ok(terms);
    }

    let sid = encode_subject_id(subject_id)?;
    let ns = namespace.to_owned();
    let raws: Vec<RawTerm> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM terms t
           JOIN relationships r ON r.term_id = t.term_id
           WHERE r.subject_id = ?1 AND t.namespace = ?2
           ORDER BY t.name, t.term_id",
          RawTerm::COLUMNS
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![sid, ns], RawTerm::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let terms: Vec<Term> = raws
      .into_iter()
      .map(RawTerm::into_term)
      .collect::<Result<_>>()?;
    self.fill_cache(key, terms.clone(), seen).await;
    Ok(terms)
  }

  async fn replace_subject_terms(
    &self,
    subject_id: SubjectId,
    namespace: &str,
    slugs: &[String],
  ) -> Result<Vec<TermId>> {
    let sid = encode_subject_id(subject_id)?;
    let ns = namespace.to_owned();
    let slugs = slugs.to_vec();

    // The inner `Err` carries a slug that names no term; the transaction is
    // rolled back when it is dropped.
    let outcome: std::result::Result<Vec<i64>, String> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let mut new_ids = Vec::with_capacity(slugs.len());
        for slug in &slugs {
          let id: Option<i64> = tx
            .query_row(
              "SELECT term_id FROM terms WHERE namespace = ?1 AND slug = ?2",
              rusqlite::params![ns, slug],
              |row| row.get(0),
            )
            .optional()?;
          match id {
            Some(id) => new_ids.push(id),
            None => return Ok(Err(slug.clone())),
          }
        }

        let mut touched: Vec<i64> = {
          let mut stmt = tx.prepare(
            "SELECT r.term_id FROM relationships r
             JOIN terms t ON t.term_id = r.term_id
             WHERE r.subject_id = ?1 AND t.namespace = ?2",
          )?;
          stmt
            .query_map(rusqlite::params![sid, ns], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };

        tx.execute(
          "DELETE FROM relationships
           WHERE subject_id = ?1
             AND term_id IN (SELECT term_id FROM terms WHERE namespace = ?2)",
          rusqlite::params![sid, ns],
        )?;
        for id in &new_ids {
          tx.execute(
            "INSERT OR IGNORE INTO relationships (subject_id, term_id) VALUES (?1, ?2)",
            rusqlite::params![sid, id],
          )?;
        }
        tx.commit()?;

        for id in new_ids {
          if !touched.contains(&id) {
            touched.push(id);
          }
        }
        Ok(Ok(touched))
      })
      .await?;

    let touched = outcome.map_err(|slug| Error::UnknownTerm {
      namespace: namespace.to_owned(),
      slug,
    })?;
    Ok(touched.into_iter().map(TermId).collect())
  }

  async fn delete_all_subject_terms(
    &self,
    subject_id: SubjectId,
    namespace: &str,
  ) -> Result<Vec<TermId>> {
    let sid = encode_subject_id(subject_id)?;
    let ns = namespace.to_owned();

    let touched: Vec<i64> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let touched = {
          let mut stmt = tx.prepare(
            "SELECT r.term_id FROM relationships r
             JOIN terms t ON t.term_id = r.term_id
             WHERE r.subject_id = ?1 AND t.namespace = ?2",
          )?;
          stmt
            .query_map(rusqlite::params![sid, ns], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        tx.execute(
          "DELETE FROM relationships
           WHERE subject_id = ?1
             AND term_id IN (SELECT term_id FROM terms WHERE namespace = ?2)",
          rusqlite::params![sid, ns],
        )?;
        tx.commit()?;
        Ok(touched)
      })
      .await?;

    Ok(touched.into_iter().map(TermId).collect())
  }

  async fn invalidate_cache(&self, subject_id: SubjectId, namespace: &str) -> Result<()> {
    let mut cache = self.cache.write().await;
    cache.entries.remove(&(subject_id, namespace.to_owned()));
    cache.generation += 1;
    Ok(())
  }
}
