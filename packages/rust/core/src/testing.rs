//! Test doubles shared by the engine and assembler tests.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use accesscms_generation::{GenerationRequest, TextGenerator};
use accesscms_shared::{DisabilityProfile, Result};

use crate::engine::{AdaptationEngine, EngineSettings};
use crate::profiles;
use crate::schema::{ContentRecord, HOTEL_SCHEMA};

/// Generator driven by a closure. Records every request it sees.
pub struct FnGenerator<F> {
    f: F,
    pub calls: AtomicUsize,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl<F> FnGenerator<F>
where
    F: Fn(&GenerationRequest) -> Result<String> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn last_request(&self) -> Option<GenerationRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl<F> TextGenerator for FnGenerator<F>
where
    F: Fn(&GenerationRequest) -> Result<String> + Send + Sync,
{
    fn model_id(&self) -> &str {
        "test-model"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        (self.f)(request)
    }
}

/// Generator that sleeps before answering and tracks peak concurrency.
pub struct SlowGenerator {
    delay: Duration,
    output: String,
    in_flight: AtomicUsize,
    pub peak: AtomicUsize,
    pub calls: AtomicUsize,
}

impl SlowGenerator {
    pub fn new(delay: Duration, output: &str) -> Self {
        Self {
            delay,
            output: output.to_string(),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TextGenerator for SlowGenerator {
    fn model_id(&self) -> &str {
        "slow-model"
    }

    async fn generate(&self, _request: &GenerationRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(self.output.clone())
    }
}

/// Generator that never answers in time for one profile and answers
/// immediately for the rest.
pub struct StallingGenerator {
    stalled: DisabilityProfile,
    output: String,
}

impl StallingGenerator {
    pub fn new(stalled: DisabilityProfile, output: &str) -> Self {
        Self {
            stalled,
            output: output.to_string(),
        }
    }
}

#[async_trait]
impl TextGenerator for StallingGenerator {
    fn model_id(&self) -> &str {
        "stalling-model"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        if profile_of(request) == self.stalled {
            tokio::time::sleep(Duration::from_secs(10)).await;
        }
        Ok(self.output.clone())
    }
}

/// Engine backed by an [`FnGenerator`], plus a handle for inspecting it.
pub fn engine_with<F>(settings: EngineSettings, f: F) -> (AdaptationEngine, Arc<FnGenerator<F>>)
where
    F: Fn(&GenerationRequest) -> Result<String> + Send + Sync + 'static,
{
    let generator = Arc::new(FnGenerator::new(f));
    let engine = AdaptationEngine::new(Some(generator.clone()), settings);
    (engine, generator)
}

/// Which profile a request was built for.
pub fn profile_of(request: &GenerationRequest) -> DisabilityProfile {
    DisabilityProfile::ALL
        .into_iter()
        .find(|p| request.user_prompt.starts_with(profiles::directive_for(*p)))
        .expect("request prompt starts with a catalog directive")
}

/// A minimal hotel record.
pub fn seaside_inn() -> ContentRecord {
    HOTEL_SCHEMA
        .validate(&json!({"name": "Seaside Inn", "location": "Bay City"}))
        .expect("valid hotel")
}
