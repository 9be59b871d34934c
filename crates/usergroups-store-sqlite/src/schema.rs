//! SQL schema for the user-groups SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS namespaces (
    namespace_id  TEXT PRIMARY KEY,
    object_types  TEXT NOT NULL,   -- JSON array of object type names
    options       TEXT NOT NULL,   -- JSON-encoded NamespaceOptions
    registered_at TEXT NOT NULL    -- ISO 8601 UTC; first registration
);

CREATE TABLE IF NOT EXISTS terms (
    term_id       INTEGER PRIMARY KEY AUTOINCREMENT,
    namespace     TEXT    NOT NULL REFERENCES namespaces(namespace_id),
    slug          TEXT    NOT NULL,
    name          TEXT    NOT NULL,
    description   TEXT    NOT NULL DEFAULT '',
    parent_id     INTEGER REFERENCES terms(term_id),
    subject_count INTEGER NOT NULL DEFAULT 0,
    UNIQUE (namespace, slug)
);

-- One row per (subject, term) link. Subjects live outside this database.
CREATE TABLE IF NOT EXISTS relationships (
    subject_id INTEGER NOT NULL,
    term_id    INTEGER NOT NULL REFERENCES terms(term_id) ON DELETE CASCADE,
    PRIMARY KEY (subject_id, term_id)
);

CREATE INDEX IF NOT EXISTS terms_namespace_idx     ON terms(namespace, name);
CREATE INDEX IF NOT EXISTS relationships_term_idx  ON relationships(term_id);

PRAGMA user_version = 1;
";
