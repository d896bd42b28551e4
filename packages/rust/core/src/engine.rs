//! Content adaptation engine.
//!
//! [`AdaptationEngine::adapt_one`] runs validate → prompt → generate → parse →
//! re-validate for one profile and never returns a record that breaks the
//! schema: on any recoverable failure it returns the original record, tagged
//! with a [`Provenance::Fallback`] reason. [`AdaptationEngine::adapt_all`] fans
//! out across every catalog profile as bounded concurrent tasks.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use accesscms_generation::{Capability, GenerationRequest, TextGenerator};
use accesscms_shared::{
    AccessCmsError, AppConfig, DisabilityProfile, FallbackReason, Provenance, Result,
};

use crate::profiles;
use crate::schema::{ContentRecord, ContentSchema};

/// System instruction sent with every adaptation request.
pub const SYSTEM_INSTRUCTION: &str = "You are an accessibility expert who adapts content for \
people with disabilities. Always return valid JSON with the exact same structure as input.";

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Tunables for generator calls and fan-out.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Output token budget per call.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Maximum concurrent generator calls during [`AdaptationEngine::adapt_all`].
    pub max_concurrency: usize,
    /// Attempts per profile; only retryable generation errors are attempted
    /// again.
    pub max_attempts: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for EngineSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_tokens: config.generation.max_tokens,
            temperature: config.generation.temperature,
            timeout: config.generation.timeout(),
            max_concurrency: config.adaptation.max_concurrency.max(1) as usize,
            max_attempts: config.adaptation.max_attempts.max(1),
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// The outcome of adapting one record for one profile.
#[derive(Debug, Clone, PartialEq)]
pub struct Adaptation {
    pub profile: DisabilityProfile,
    /// Always conforms to the schema it was adapted against.
    pub record: ContentRecord,
    pub provenance: Provenance,
    /// Model that produced the record, if any.
    pub model_id: Option<String>,
}

impl Adaptation {
    fn fallback(profile: DisabilityProfile, original: &ContentRecord, reason: FallbackReason) -> Self {
        Self {
            profile,
            record: original.clone(),
            provenance: Provenance::Fallback(reason),
            model_id: None,
        }
    }
}

/// One [`Adaptation`] per catalog profile.
#[derive(Debug, Clone)]
pub struct AdaptationSet {
    /// Index-aligned with [`DisabilityProfile::ALL`].
    entries: Vec<Adaptation>,
}

impl AdaptationSet {
    pub fn get(&self, profile: DisabilityProfile) -> &Adaptation {
        &self.entries[profile.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Adaptation> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of profiles that fell back to the original.
    pub fn fallback_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|a| a.provenance.is_fallback())
            .count()
    }
}

impl IntoIterator for AdaptationSet {
    type Item = Adaptation;
    type IntoIter = std::vec::IntoIter<Adaptation>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

// ---------------------------------------------------------------------------
// Progress trait
// ---------------------------------------------------------------------------

/// Progress callback for adaptation operations.
pub trait AdaptationProgress: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called as each profile finishes.
    fn profile_done(&self, adaptation: &Adaptation, completed: usize, total: usize);
}

/// No-op adaptation progress.
pub struct SilentProgress;

impl AdaptationProgress for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn profile_done(&self, _adaptation: &Adaptation, _completed: usize, _total: usize) {}
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Why a single adaptation attempt was rejected.
#[derive(Debug)]
enum AdaptFailure {
    Generate(AccessCmsError),
    Parse(serde_json::Error),
    Validate(AccessCmsError),
}

impl AdaptFailure {
    fn reason(&self) -> FallbackReason {
        match self {
            Self::Generate(AccessCmsError::CapabilityUnavailable) => {
                FallbackReason::CapabilityUnavailable
            }
            Self::Generate(AccessCmsError::Timeout { .. }) => FallbackReason::Timeout,
            Self::Generate(_) => FallbackReason::Generation,
            Self::Parse(_) => FallbackReason::Parse,
            Self::Validate(_) => FallbackReason::Schema,
        }
    }
}

impl std::fmt::Display for AdaptFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Generate(e) | Self::Validate(e) => write!(f, "{e}"),
            Self::Parse(e) => write!(f, "output is not valid JSON: {e}"),
        }
    }
}

/// Orchestrates schema-safe adaptation around an optional generator.
#[derive(Clone)]
pub struct AdaptationEngine {
    generator: Capability,
    settings: EngineSettings,
}

impl AdaptationEngine {
    /// Create an engine. A `None` generator is a valid configuration: every
    /// adaptation then returns the original record.
    pub fn new(generator: Capability, settings: EngineSettings) -> Self {
        Self {
            generator,
            settings,
        }
    }

    /// Build the engine and its generator from application config.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let generator = accesscms_generation::from_config(config)?;
        Ok(Self::new(generator, EngineSettings::from(config)))
    }

    /// Whether a generator is configured.
    pub fn is_available(&self) -> bool {
        self.generator.is_some()
    }

    /// Adapt `record` for one profile.
    ///
    /// The returned record always conforms to `schema`. Generation failures,
    /// timeouts, unparseable output and schema violations all resolve to a
    /// copy of `record` and are logged, never propagated.
    #[instrument(skip_all, fields(kind = %schema.kind, profile = %profile))]
    pub async fn adapt_one(
        &self,
        record: &ContentRecord,
        schema: &ContentSchema,
        profile: DisabilityProfile,
    ) -> Adaptation {
        debug_assert_eq!(record.kind(), schema.kind, "record adapted against foreign schema");

        let outcome = match &self.generator {
            Some(generator) => self
                .try_adapt(generator.as_ref(), record, schema, profile)
                .await
                .map(|adapted| (adapted, generator.model_id().to_string())),
            None => Err(AdaptFailure::Generate(AccessCmsError::CapabilityUnavailable)),
        };

        match outcome {
            Ok((adapted, model_id)) => {
                debug!("adaptation accepted");
                Adaptation {
                    profile,
                    record: adapted,
                    provenance: Provenance::Adapted,
                    model_id: Some(model_id),
                }
            }
            Err(failure) => {
                let reason = failure.reason();
                // Already reported once when the engine was built.
                if reason == FallbackReason::CapabilityUnavailable {
                    debug!(error = %failure, "returning original");
                } else {
                    warn!(reason = reason.as_str(), error = %failure, "adaptation failed, using original");
                }
                Adaptation::fallback(profile, record, reason)
            }
        }
    }

    /// Adapt `record` for every catalog profile.
    ///
    /// Profiles run as independent tasks, at most `max_concurrency` at a
    /// time. One profile's failure never affects another's result, and the
    /// returned set always has one entry per profile.
    #[instrument(skip_all, fields(kind = %schema.kind))]
    pub async fn adapt_all(
        &self,
        record: &ContentRecord,
        schema: &'static ContentSchema,
        progress: &dyn AdaptationProgress,
    ) -> AdaptationSet {
        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrency));
        let total = DisabilityProfile::ALL.len();

        let handles: Vec<_> = DisabilityProfile::ALL
            .into_iter()
            .map(|profile| {
                let engine = self.clone();
                let record = record.clone();
                let sem = semaphore.clone();
                let handle = tokio::spawn(async move {
                    // The semaphore is never closed; a failed acquire only
                    // loses the bound, not the result.
                    let _permit = sem.acquire_owned().await.ok();
                    engine.adapt_one(&record, schema, profile).await
                });
                (profile, handle)
            })
            .collect();

        let mut slots: [Option<Adaptation>; DisabilityProfile::ALL.len()] = Default::default();
        for (completed, (profile, handle)) in handles.into_iter().enumerate() {
            let adaptation = match handle.await {
                Ok(adaptation) => adaptation,
                Err(e) => {
                    warn!(%profile, error = %e, "adaptation task aborted, using original");
                    Adaptation::fallback(profile, record, FallbackReason::Aborted)
                }
            };
            progress.profile_done(&adaptation, completed + 1, total);
            slots[profile.index()] = Some(adaptation);
        }

        let entries: Vec<Adaptation> = slots
            .into_iter()
            .zip(DisabilityProfile::ALL)
            .map(|(slot, profile)| {
                slot.unwrap_or_else(|| Adaptation::fallback(profile, record, FallbackReason::Aborted))
            })
            .collect();
        let set = AdaptationSet { entries };

        info!(
            profiles = set.len(),
            fallbacks = set.fallback_count(),
            "adaptation fan-out complete"
        );
        set
    }

    async fn try_adapt(
        &self,
        generator: &dyn TextGenerator,
        record: &ContentRecord,
        schema: &ContentSchema,
        profile: DisabilityProfile,
    ) -> std::result::Result<ContentRecord, AdaptFailure> {
        let serialized = record.to_json_pretty();
        let request = GenerationRequest {
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
            user_prompt: build_prompt(profiles::directive_for(profile), &serialized),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };

        let raw = self
            .generate_with_retry(generator, &request)
            .await
            .map_err(AdaptFailure::Generate)?;

        let parsed: serde_json::Value =
            serde_json::from_str(strip_code_fence(&raw)).map_err(AdaptFailure::Parse)?;

        schema.validate(&parsed).map_err(AdaptFailure::Validate)
    }

    /// Call the generator with a per-attempt timeout, retrying
    /// [retryable](AccessCmsError::is_retryable) failures up to
    /// `max_attempts` in total.
    async fn generate_with_retry(
        &self,
        generator: &dyn TextGenerator,
        request: &GenerationRequest,
    ) -> Result<String> {
        let attempts = self.settings.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let outcome = match tokio::time::timeout(self.settings.timeout, generator.generate(request)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(AccessCmsError::Timeout {
                    after_ms: self.settings.timeout.as_millis() as u64,
                }),
            };

            match outcome {
                Ok(text) => return Ok(text),
                Err(e) if attempt < attempts && e.is_retryable() => {
                    debug!(attempt, error = %e, "generation attempt failed, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Compose the user prompt for one profile.
pub fn build_prompt(directive: &str, serialized_record: &str) -> String {
    format!(
        "{directive}

IMPORTANT: You must return content that follows the exact same structure as the input.
All field names must remain identical. Only modify the content/values, not the structure.

Original Content:
{serialized_record}

Please return only valid JSON with the adapted content using the same field structure."
    )
}

/// Strip a Markdown code fence the model may wrap its output in.
pub fn strip_code_fence(text: &str) -> &str {
    let mut s = text.trim();
    if let Some(rest) = s.strip_prefix("```json") {
        s = rest;
    } else if let Some(rest) = s.strip_prefix("```") {
        s = rest;
    }
    if let Some(rest) = s.strip_suffix("```") {
        s = rest;
    }
    s.trim()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
