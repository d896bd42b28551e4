//! Record assembler.
//!
//! Maps engine output into the persisted shape: creating an entity stores the
//! validated original plus one adaptation per profile, and regenerating one
//! profile re-reads the stored original and replaces only that profile's
//! content. Also provides the read side (entity documents, content views with
//! fallback to the original, per-kind listings).

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::ser::SerializeMap;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};

use accesscms_shared::{
    AccessCmsError, DisabilityProfile, EntityId, EntityKind, Provenance, Result,
};
use accesscms_storage::{AdaptedRow, AdaptedWrite, EntityRow, Storage};

use crate::engine::{Adaptation, AdaptationEngine, AdaptationProgress, AdaptationSet};
use crate::schema::{ContentRecord, ContentSchema, schema_for};

/// Result of creating an entity.
#[derive(Debug, Clone)]
pub struct CreatedEntity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub original: ContentRecord,
    pub adaptations: AdaptationSet,
}

/// A stored adaptation, decoded.
#[derive(Debug, Clone, Serialize)]
pub struct StoredAdaptation {
    pub content: ContentRecord,
    pub provenance: Provenance,
    pub model_id: Option<String>,
    pub generated_at: DateTime<Utc>,
    /// The original has changed since this content was generated.
    pub stale: bool,
}

/// An entity with its original and a slot for every profile.
#[derive(Debug, Clone, Serialize)]
pub struct EntityDocument {
    pub id: EntityId,
    pub kind: EntityKind,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub original: ContentRecord,
    pub adapted: AdaptedSlots,
}

/// Exactly one slot per profile, in catalog order. A slot is empty when
/// nothing has been stored for that profile.
#[derive(Debug, Clone)]
pub struct AdaptedSlots([Option<StoredAdaptation>; DisabilityProfile::ALL.len()]);

impl AdaptedSlots {
    pub fn get(&self, profile: DisabilityProfile) -> Option<&StoredAdaptation> {
        self.0[profile.index()].as_ref()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DisabilityProfile, Option<&StoredAdaptation>)> {
        DisabilityProfile::ALL
            .into_iter()
            .zip(self.0.iter().map(Option::as_ref))
    }
}

impl Serialize for AdaptedSlots {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(DisabilityProfile::ALL.len()))?;
        for (profile, slot) in self.iter() {
            map.serialize_entry(profile.as_str(), &slot)?;
        }
        map.end()
    }
}

/// Content for one entity as seen by one audience.
#[derive(Debug, Clone, Serialize)]
pub struct ContentView {
    pub id: EntityId,
    pub kind: EntityKind,
    /// `original` or `adaptive_<profile>`.
    pub content_type: String,
    /// Present when adapted content was served.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
    pub content: ContentRecord,
}

/// One row of a per-kind listing.
#[derive(Debug, Clone, Serialize)]
pub struct EntitySummary {
    pub id: EntityId,
    pub kind: EntityKind,
    pub name: String,
    /// Location for hotels, description otherwise.
    pub headline: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Write side
// ---------------------------------------------------------------------------

/// Validate `raw`, adapt it for every profile and persist the lot.
///
/// Invalid caller input fails with a schema error before any generation
/// happens. Generation problems never fail the call; they show up as
/// fallback provenance on the affected profiles.
#[instrument(skip_all, fields(kind = %kind))]
pub async fn create_entity(
    engine: &AdaptationEngine,
    storage: &Storage,
    kind: EntityKind,
    raw: &Value,
    progress: &dyn AdaptationProgress,
) -> Result<CreatedEntity> {
    let schema = schema_for(kind);

    progress.phase("Validating content");
    let original = schema.validate(raw)?;

    progress.phase("Adapting for each profile");
    let adaptations = engine.adapt_all(&original, schema, progress).await;

    progress.phase("Storing");
    let id = EntityId::new();
    let hash = source_hash(&original);
    let writes: Vec<AdaptedWrite> = adaptations
        .iter()
        .map(|a| adapted_write(a, &hash))
        .collect();
    storage
        .insert_entity(id, kind, &original.to_value().to_string(), &writes)
        .await?;

    info!(
        %id,
        fallbacks = adaptations.fallback_count(),
        "entity created"
    );

    Ok(CreatedEntity {
        id,
        kind,
        original,
        adaptations,
    })
}

/// Re-adapt one profile from the stored original and replace its content.
///
/// Prior adaptations are never used as input. The original and every other
/// profile are left untouched.
#[instrument(skip_all, fields(kind = %kind, %id, %profile))]
pub async fn regenerate(
    engine: &AdaptationEngine,
    storage: &Storage,
    kind: EntityKind,
    id: EntityId,
    profile: DisabilityProfile,
) -> Result<Adaptation> {
    let (_, original) = load_original(storage, kind, id).await?;
    let schema = schema_for(kind);

    let adaptation = engine.adapt_one(&original, schema, profile).await;
    storage
        .store_adapted(id, &adapted_write(&adaptation, &source_hash(&original)))
        .await?;

    info!(provenance = %adaptation.provenance, "profile regenerated");
    Ok(adaptation)
}

/// Delete an entity of the given kind and its adaptations.
pub async fn delete_entity(storage: &Storage, kind: EntityKind, id: EntityId) -> Result<()> {
    entity_of_kind(storage, kind, id).await?;
    storage.delete_entity(id).await?;
    info!(%kind, %id, "entity deleted");
    Ok(())
}

// ---------------------------------------------------------------------------
// Read side
// ---------------------------------------------------------------------------

/// Load and re-validate the stored original of an entity.
pub async fn load_original(
    storage: &Storage,
    kind: EntityKind,
    id: EntityId,
) -> Result<(EntityRow, ContentRecord)> {
    let row = entity_of_kind(storage, kind, id).await?;
    let original = decode(schema_for(kind), &row.original_json).map_err(|e| {
        AccessCmsError::Storage(format!("stored original of {kind} {id} is invalid: {e}"))
    })?;
    Ok((row, original))
}

/// The full entity: original plus a slot for each of the five profiles.
pub async fn get_entity(storage: &Storage, kind: EntityKind, id: EntityId) -> Result<EntityDocument> {
    let (row, original) = load_original(storage, kind, id).await?;
    let schema = schema_for(kind);
    let hash = source_hash(&original);

    let mut slots: [Option<StoredAdaptation>; DisabilityProfile::ALL.len()] =
        Default::default();
    for adapted in storage.list_adapted(id).await? {
        let profile = adapted.profile;
        slots[profile.index()] = decode_adapted(schema, adapted, &hash);
    }

    Ok(EntityDocument {
        id: row.id,
        kind: row.kind,
        created_at: row.created_at,
        updated_at: row.updated_at,
        original,
        adapted: AdaptedSlots(slots),
    })
}

/// Content of an entity for one audience.
///
/// With no profile, or when nothing is stored for the requested profile, the
/// original is returned with content type `original`.
pub async fn content_view(
    storage: &Storage,
    kind: EntityKind,
    id: EntityId,
    profile: Option<DisabilityProfile>,
) -> Result<ContentView> {
    let (_, original) = load_original(storage, kind, id).await?;

    if let Some(profile) = profile {
        let stored = storage.get_adapted(id, profile).await?;
        let hash = source_hash(&original);
        if let Some(adapted) = stored.and_then(|row| decode_adapted(schema_for(kind), row, &hash)) {
            return Ok(ContentView {
                id,
                kind,
                content_type: profile.content_type(),
                provenance: Some(adapted.provenance),
                content: adapted.content,
            });
        }
    }

    Ok(ContentView {
        id,
        kind,
        content_type: "original".into(),
        provenance: None,
        content: original,
    })
}

/// Every entity of one kind, oldest first.
pub async fn list_entities(storage: &Storage, kind: EntityKind) -> Result<Vec<EntitySummary>> {
    let headline_field = match kind {
        EntityKind::Hotel => "location",
        EntityKind::Tour | EntityKind::CareService => "description",
    };

    let rows = storage.list_entities(kind).await?;
    Ok(rows
        .into_iter()
        .map(|row| {
            let original: Value = match serde_json::from_str(&row.original_json) {
                Ok(value) => value,
                Err(e) => {
                    warn!(entity = %row.id, error = %e, "stored original is not valid JSON");
                    Value::Null
                }
            };
            let text = |field: &str| {
                original
                    .get(field)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            };
            EntitySummary {
                id: row.id,
                kind: row.kind,
                name: text("name"),
                headline: text(headline_field),
                created_at: row.created_at,
                updated_at: row.updated_at,
            }
        })
        .collect())
}

/// Validate a payload without storing anything.
pub fn validate_payload(kind: EntityKind, raw: &Value) -> Result<ContentRecord> {
    schema_for(kind).validate(raw)
}

/// SHA-256 of a record's canonical serialized form.
pub fn source_hash(record: &ContentRecord) -> String {
    let mut hasher = Sha256::new();
    hasher.update(record.to_json_pretty().as_bytes());
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn entity_of_kind(storage: &Storage, kind: EntityKind, id: EntityId) -> Result<EntityRow> {
    match storage.get_entity(id).await? {
        Some(row) if row.kind == kind => Ok(row),
        _ => Err(AccessCmsError::not_found(kind.label(), id.to_string())),
    }
}

fn adapted_write(adaptation: &Adaptation, source_hash: &str) -> AdaptedWrite {
    AdaptedWrite {
        profile: adaptation.profile,
        content_json: adaptation.record.to_value().to_string(),
        provenance: adaptation.provenance,
        model_id: adaptation.model_id.clone(),
        source_hash: source_hash.to_string(),
    }
}

fn decode(schema: &ContentSchema, json: &str) -> Result<ContentRecord> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| AccessCmsError::schema(format!("not valid JSON: {e}")))?;
    schema.validate(&value)
}

/// Decode a stored adaptation. Rows that no longer validate are skipped.
fn decode_adapted(schema: &ContentSchema, row: AdaptedRow, current_hash: &str) -> Option<StoredAdaptation> {
    match decode(schema, &row.content_json) {
        Ok(content) => Some(StoredAdaptation {
            content,
            provenance: row.provenance,
            model_id: row.model_id,
            generated_at: row.generated_at,
            stale: row.source_hash != current_hash,
        }),
        Err(e) => {
            warn!(entity = %row.entity_id, profile = %row.profile, error = %e, "ignoring invalid stored adaptation");
            None
        }
    }
}
