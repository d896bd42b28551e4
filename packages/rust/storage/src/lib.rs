//! Turso Embedded / libSQL storage layer (offline mode).
//!
//! The [`Storage`] struct wraps a libSQL database holding original entity
//! content and the adapted content generated for each disability profile.
//! Content is stored as serialized JSON; validating it is the caller's job.
//!
//! **Access rules:**
//! - CLI commands that write: read-write via [`Storage::open`]
//! - Viewing commands: read-only via [`Storage::open_readonly`]

mod migrations;

use std::path::Path;

use accesscms_shared::{AccessCmsError, DisabilityProfile, EntityId, EntityKind, Provenance, Result};
use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use tracing::debug;

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

/// A stored entity with its original content.
#[derive(Debug, Clone)]
pub struct EntityRow {
    pub id: EntityId,
    pub kind: EntityKind,
    /// Serialized original record.
    pub original_json: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Adapted content to be written for one profile.
#[derive(Debug, Clone)]
pub struct AdaptedWrite {
    pub profile: DisabilityProfile,
    pub content_json: String,
    pub provenance: Provenance,
    pub model_id: Option<String>,
    /// Hash of the serialized original this content was derived from.
    pub source_hash: String,
}

/// Stored adapted content for one profile.
#[derive(Debug, Clone)]
pub struct AdaptedRow {
    pub entity_id: EntityId,
    pub profile: DisabilityProfile,
    pub content_json: String,
    pub provenance: Provenance,
    pub model_id: Option<String>,
    pub source_hash: String,
    pub generated_at: DateTime<Utc>,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AccessCmsError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;

        let conn = db.connect().map_err(storage_err)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .await
            .map_err(storage_err)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AccessCmsError::Storage(format!(
                "database not found at {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;

        let conn = db.connect().map_err(storage_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    AccessCmsError::Storage(format!("migration v{} failed: {e}", migration.version))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(AccessCmsError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Entity operations
    // -----------------------------------------------------------------------

    /// Insert a new entity together with its adapted content, atomically.
    pub async fn insert_entity(
        &self,
        id: EntityId,
        kind: EntityKind,
        original_json: &str,
        adapted: &[AdaptedWrite],
    ) -> Result<()> {
        self.check_writable()?;
        let id = id.to_string();
        let now = Utc::now().to_rfc3339();

        let tx = self.conn.transaction().await.map_err(storage_err)?;
        tx.execute(
            "INSERT INTO entities (id, kind, created_at, updated_at, original_json)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id.as_str(), kind.as_str(), now.as_str(), now.as_str(), original_json],
        )
        .await
        .map_err(storage_err)?;

        for item in adapted {
            upsert_adapted(&tx, &id, item, &now).await?;
        }
        tx.commit().await.map_err(storage_err)?;

        debug!(%kind, %id, profiles = adapted.len(), "entity stored");
        Ok(())
    }

    /// Get an entity by ID.
    pub async fn get_entity(&self, id: EntityId) -> Result<Option<EntityRow>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, kind, original_json, created_at, updated_at FROM entities WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_entity(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    /// List all entities of one kind, oldest first.
    pub async fn list_entities(&self, kind: EntityKind) -> Result<Vec<EntityRow>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, kind, original_json, created_at, updated_at FROM entities
                 WHERE kind = ?1 ORDER BY created_at, id",
                params![kind.as_str()],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_entity(&row)?);
        }
        Ok(results)
    }

    /// Delete an entity and all of its adapted content. Returns whether a
    /// row was removed.
    pub async fn delete_entity(&self, id: EntityId) -> Result<bool> {
        self.check_writable()?;
        let id = id.to_string();

        let tx = self.conn.transaction().await.map_err(storage_err)?;
        tx.execute(
            "DELETE FROM adapted_content WHERE entity_id = ?1",
            params![id.as_str()],
        )
        .await
        .map_err(storage_err)?;
        let removed = tx
            .execute("DELETE FROM entities WHERE id = ?1", params![id.as_str()])
            .await
            .map_err(storage_err)?;
        tx.commit().await.map_err(storage_err)?;

        Ok(removed > 0)
    }

    // -----------------------------------------------------------------------
    // Adapted content operations
    // -----------------------------------------------------------------------

    /// Replace the adapted content for one profile and bump the entity's
    /// `updated_at`. Other profiles are left untouched.
    pub async fn store_adapted(&self, id: EntityId, adapted: &AdaptedWrite) -> Result<()> {
        self.check_writable()?;
        let id = id.to_string();
        let now = Utc::now().to_rfc3339();

        let tx = self.conn.transaction().await.map_err(storage_err)?;
        let touched = tx
            .execute(
                "UPDATE entities SET updated_at = ?1 WHERE id = ?2",
                params![now.as_str(), id.as_str()],
            )
            .await
            .map_err(storage_err)?;
        if touched == 0 {
            return Err(AccessCmsError::not_found("entity", id));
        }
        upsert_adapted(&tx, &id, adapted, &now).await?;
        tx.commit().await.map_err(storage_err)?;
        Ok(())
    }

    /// Get the adapted content for one profile.
    pub async fn get_adapted(
        &self,
        id: EntityId,
        profile: DisabilityProfile,
    ) -> Result<Option<AdaptedRow>> {
        let mut rows = self
            .conn
            .query(
                "SELECT entity_id, profile, content_json, provenance, model_id, source_hash, generated_at
                 FROM adapted_content WHERE entity_id = ?1 AND profile = ?2",
                params![id.to_string(), profile.as_str()],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_adapted(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    /// List every stored adaptation for an entity, in catalog order.
    pub async fn list_adapted(&self, id: EntityId) -> Result<Vec<AdaptedRow>> {
        let mut rows = self
            .conn
            .query(
                "SELECT entity_id, profile, content_json, provenance, model_id, source_hash, generated_at
                 FROM adapted_content WHERE entity_id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_adapted(&row)?);
        }
        results.sort_by_key(|r| r.profile.index());
        Ok(results)
    }
}

/// Insert or replace one profile's adapted content.
async fn upsert_adapted(
    conn: &Connection,
    entity_id: &str,
    adapted: &AdaptedWrite,
    now: &str,
) -> Result<()> {
    let provenance = adapted.provenance.to_string();
    conn.execute(
        "INSERT INTO adapted_content
             (entity_id, profile, content_json, provenance, model_id, source_hash, generated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(entity_id, profile) DO UPDATE SET
           content_json = excluded.content_json,
           provenance = excluded.provenance,
           model_id = excluded.model_id,
           source_hash = excluded.source_hash,
           generated_at = excluded.generated_at",
        params![
            entity_id,
            adapted.profile.as_str(),
            adapted.content_json.as_str(),
            provenance.as_str(),
            adapted.model_id.as_deref(),
            adapted.source_hash.as_str(),
            now
        ],
    )
    .await
    .map_err(storage_err)?;
    Ok(())
}

fn storage_err(e: libsql::Error) -> AccessCmsError {
    AccessCmsError::Storage(e.to_string())
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AccessCmsError::Storage(format!("invalid date: {e}")))
}

fn parse_column<T>(value: String) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|e| AccessCmsError::Storage(format!("invalid column value '{value}': {e}")))
}

/// Convert a database row to an [`EntityRow`].
fn row_to_entity(row: &libsql::Row) -> Result<EntityRow> {
    Ok(EntityRow {
        id: parse_column(row.get::<String>(0).map_err(storage_err)?)?,
        kind: parse_column(row.get::<String>(1).map_err(storage_err)?)?,
        original_json: row.get::<String>(2).map_err(storage_err)?,
        created_at: parse_timestamp(&row.get::<String>(3).map_err(storage_err)?)?,
        updated_at: parse_timestamp(&row.get::<String>(4).map_err(storage_err)?)?,
    })
}

/// Convert a database row to an [`AdaptedRow`].
fn row_to_adapted(row: &libsql::Row) -> Result<AdaptedRow> {
    Ok(AdaptedRow {
        entity_id: parse_column(row.get::<String>(0).map_err(storage_err)?)?,
        profile: parse_column(row.get::<String>(1).map_err(storage_err)?)?,
        content_json: row.get::<String>(2).map_err(storage_err)?,
        provenance: parse_column(row.get::<String>(3).map_err(storage_err)?)?,
        model_id: row.get::<String>(4).ok(),
        source_hash: row.get::<String>(5).map_err(storage_err)?,
        generated_at: parse_timestamp(&row.get::<String>(6).map_err(storage_err)?)?,
    })
}
