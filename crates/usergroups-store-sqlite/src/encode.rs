//! Encoding and decoding helpers between core types and the plain values
//! stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings. Namespace options and object
//! type lists are stored as compact JSON. Subject and term ids are plain
//! integers.

use chrono::{DateTime, Utc};
use usergroups_core::{
  group::{NamespaceOptions, NamespaceRegistration},
  subject::SubjectId,
  term::{Term, TermId},
};

use crate::{Error, Result, store::StoredNamespace};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(e.to_string()))
}

// ─── Ids ─────────────────────────────────────────────────────────────────────

/// SQLite integers are signed; subject ids above `i64::MAX` cannot be stored.
pub fn encode_subject_id(id: SubjectId) -> Result<i64> {
  i64::try_from(id.get())
    .map_err(|_| Error::Decode(format!("subject id {id} out of range")))
}

pub fn decode_subject_id(raw: i64) -> Result<SubjectId> {
  u64::try_from(raw)
    .ok()
    .and_then(SubjectId::new)
    .ok_or_else(|| Error::Decode(format!("invalid subject id: {raw}")))
}

// ─── Options ─────────────────────────────────────────────────────────────────

pub fn encode_object_types(types: &[String]) -> Result<String> {
  Ok(serde_json::to_string(types)?)
}

pub fn encode_options(options: &NamespaceOptions) -> Result<String> {
  Ok(serde_json::to_string(options)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `terms` row.
pub struct RawTerm {
  pub term_id:       i64,
  pub namespace:     String,
  pub slug:          String,
  pub name:          String,
  pub description:   String,
  pub parent_id:     Option<i64>,
  pub subject_count: i64,
}

impl RawTerm {
  /// Select list for a `terms` table aliased as `t`.
  pub const COLUMNS: &'static str =
    "t.term_id, t.namespace, t.slug, t.name, t.description, t.parent_id, t.subject_count";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      term_id:       row.get(0)?,
      namespace:     row.get(1)?,
      slug:          row.get(2)?,
      name:          row.get(3)?,
      description:   row.get(4)?,
      parent_id:     row.get(5)?,
      subject_count: row.get(6)?,
    })
  }

  pub fn into_term(self) -> Result<Term> {
    let subject_count = u64::try_from(self.subject_count).map_err(|_| {
      Error::Decode(format!(
        "negative subject count {} on term {}",
        self.subject_count, self.term_id
      ))
    })?;

    Ok(Term {
      term_id: TermId(self.term_id),
      namespace: self.namespace,
      slug: self.slug,
      name: self.name,
      description: self.description,
      parent_id: self.parent_id.map(TermId),
      subject_count,
    })
  }
}

/// Raw strings read directly from a `namespaces` row.
pub struct RawNamespace {
  pub namespace_id:  String,
  pub object_types:  String,
  pub options:       String,
  pub registered_at: String,
}

impl RawNamespace {
  pub fn into_stored(self) -> Result<StoredNamespace> {
    Ok(StoredNamespace {
      registration:  NamespaceRegistration {
        namespace_id: self.namespace_id,
        object_types: serde_json::from_str(&self.object_types)?,
        options:      serde_json::from_str(&self.options)?,
      },
      registered_at: decode_dt(&self.registered_at)?,
    })
  }
}
