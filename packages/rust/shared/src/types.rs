//! Core domain identifiers for AccessCMS entities and adaptations.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AccessCmsError;

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for entity identifiers (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub Uuid);

impl EntityId {
    /// Generate a new time-sortable entity identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for EntityId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// EntityKind
// ---------------------------------------------------------------------------

/// The three kinds of accessibility-relevant entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Hotel,
    Tour,
    CareService,
}

impl EntityKind {
    /// All entity kinds.
    pub const ALL: [EntityKind; 3] = [Self::Hotel, Self::Tour, Self::CareService];

    /// Storage key for the `entities.kind` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hotel => "hotel",
            Self::Tour => "tour",
            Self::CareService => "care_service",
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Hotel => "Hotel",
            Self::Tour => "Tour",
            Self::CareService => "Care service",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityKind {
    type Err = AccessCmsError;

    /// Accepts the storage key as well as the dashed route form (`care-service`).
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "hotel" | "hotels" => Ok(Self::Hotel),
            "tour" | "tours" => Ok(Self::Tour),
            "care_service" | "care_services" => Ok(Self::CareService),
            _ => Err(AccessCmsError::UnknownKind(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// DisabilityProfile
// ---------------------------------------------------------------------------

/// The five fixed target audiences for content adaptation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisabilityProfile {
    WheelchairUser,
    Dyslexia,
    CognitiveImpairment,
    AnxietyTravelFear,
    LowVision,
}

impl DisabilityProfile {
    /// Every profile, in catalog order.
    pub const ALL: [DisabilityProfile; 5] = [
        Self::WheelchairUser,
        Self::Dyslexia,
        Self::CognitiveImpairment,
        Self::AnxietyTravelFear,
        Self::LowVision,
    ];

    /// Stable identifier, also used as the `adapted_content.profile` key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WheelchairUser => "wheelchair_user",
            Self::Dyslexia => "dyslexia",
            Self::CognitiveImpairment => "cognitive_impairment",
            Self::AnxietyTravelFear => "anxiety_travel_fear",
            Self::LowVision => "low_vision",
        }
    }

    /// Position of this profile in [`DisabilityProfile::ALL`].
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Label used when presenting adapted content (`adaptive_<profile>`).
    pub fn content_type(&self) -> String {
        format!("adaptive_{}", self.as_str())
    }
}

impl std::fmt::Display for DisabilityProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DisabilityProfile {
    type Err = AccessCmsError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s.trim())
            .ok_or_else(|| AccessCmsError::UnknownProfile(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Provenance
// ---------------------------------------------------------------------------

/// Why an adaptation fell back to the original record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FallbackReason {
    /// No generation capability configured.
    CapabilityUnavailable,
    /// The generator call failed.
    Generation,
    /// The generator call exceeded its time budget.
    Timeout,
    /// The generator output was not parseable as JSON.
    Parse,
    /// The parsed output did not conform to the schema.
    Schema,
    /// The adaptation task itself aborted.
    Aborted,
}

impl FallbackReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CapabilityUnavailable => "capability_unavailable",
            Self::Generation => "generation",
            Self::Timeout => "timeout",
            Self::Parse => "parse",
            Self::Schema => "schema",
            Self::Aborted => "aborted",
        }
    }

    const ALL: [FallbackReason; 6] = [
        Self::CapabilityUnavailable,
        Self::Generation,
        Self::Timeout,
        Self::Parse,
        Self::Schema,
        Self::Aborted,
    ];
}

/// How an adapted record came to be.
///
/// Persisted next to adapted content so callers can tell a genuine model
/// adaptation apart from a copy of the original.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Provenance {
    /// Produced by the generator and validated against the schema.
    Adapted,
    /// Identical to the original record.
    Fallback(FallbackReason),
}

impl Provenance {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Adapted => f.write_str("adapted"),
            Self::Fallback(reason) => write!(f, "fallback:{}", reason.as_str()),
        }
    }
}

impl std::str::FromStr for Provenance {
    type Err = AccessCmsError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s == "adapted" {
            return Ok(Self::Adapted);
        }
        s.strip_prefix("fallback:")
            .and_then(|r| FallbackReason::ALL.into_iter().find(|f| f.as_str() == r))
            .map(Self::Fallback)
            .ok_or_else(|| AccessCmsError::Storage(format!("invalid provenance '{s}'")))
    }
}

impl From<Provenance> for String {
    fn from(p: Provenance) -> Self {
        p.to_string()
    }
}

impl TryFrom<String> for Provenance {
    type Error = AccessCmsError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}
