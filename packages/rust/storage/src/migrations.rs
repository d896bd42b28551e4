//! SQL migration definitions for the AccessCMS database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: entities, adapted_content",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Original content, one row per hotel / tour / care service
CREATE TABLE IF NOT EXISTS entities (
    id            TEXT PRIMARY KEY,
    kind          TEXT NOT NULL,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL,
    original_json TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_entities_kind ON entities(kind, created_at);

-- Per-profile adapted content
CREATE TABLE IF NOT EXISTS adapted_content (
    entity_id    TEXT NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
    profile      TEXT NOT NULL,
    content_json TEXT NOT NULL,
    provenance   TEXT NOT NULL,
    model_id     TEXT,
    source_hash  TEXT NOT NULL,
    generated_at TEXT NOT NULL,
    PRIMARY KEY (entity_id, profile)
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
