use crate::ai::backends::{GeminiBackend, LLMBackend, OpenAIBackend};
use crate::ai::prompts::Prompt;
use crate::config::{Config, ProviderKind};
use crate::error::{AnalysisError, ConfigError, FailedAttempt, ProviderError};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// One provider/model pair tried during a request
#[derive(Clone)]
pub struct Candidate {
    pub provider: String,
    pub model: String,
    pub backend: Arc<dyn LLMBackend>,
}

impl Candidate {
    /// Candidate named after the backend's provider
    pub fn new(backend: Arc<dyn LLMBackend>, model: impl Into<String>) -> Self {
        Self {
            provider: backend.name().to_string(),
            model: model.into(),
            backend,
        }
    }
}

impl std::fmt::Debug for Candidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Candidate")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .finish()
    }
}

/// Successful provider output
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResponse {
    pub raw_text: String,
    pub model_used: String,
    pub provider: String,
}

/// Executes prompts against an ordered candidate list
///
/// Each request makes at most one attempt per candidate, strictly in order,
/// and returns on the first success. Every attempt runs under a hard timeout,
/// so a request takes at most `candidates × timeout` plus any time spent
/// waiting for a call permit. Permits are shared by every request on the
/// gateway and bound the number of outbound calls in flight.
pub struct ProviderGateway {
    candidates: Vec<Candidate>,
    timeout: Duration,
    permits: Semaphore,
}

impl ProviderGateway {
    pub fn new(
        candidates: Vec<Candidate>,
        timeout: Duration,
        max_concurrent_calls: usize,
    ) -> Result<Self, ConfigError> {
        if candidates.is_empty() {
            return Err(ConfigError::ValidationError(
                "provider gateway needs at least one candidate".to_string(),
            ));
        }
        if timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "provider timeout must be positive".to_string(),
            ));
        }
        if max_concurrent_calls == 0 {
            return Err(ConfigError::ValidationError(
                "max_concurrent_calls must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            candidates,
            timeout,
            permits: Semaphore::new(max_concurrent_calls),
        })
    }

    /// Build backends and candidates from configuration
    ///
    /// Candidates are ordered provider-first: every model of the first
    /// provider, then every model of the second, and so on.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let mut candidates = Vec::new();

        for provider in &config.providers {
            let credential = provider.credential()?;
            let backend: Arc<dyn LLMBackend> = match provider.kind {
                ProviderKind::Gemini => {
                    let api_key = credential.ok_or_else(|| ConfigError::MissingCredential {
                        provider: provider.name.clone(),
                        detail: "Gemini requires an API key".to_string(),
                    })?;
                    let base_url = provider
                        .base_url
                        .clone()
                        .unwrap_or_else(|| GeminiBackend::DEFAULT_BASE_URL.to_string());
                    Arc::new(
                        GeminiBackend::with_base_url(api_key, base_url)
                            .map_err(|e| ConfigError::ValidationError(e.to_string()))?,
                    )
                }
                ProviderKind::OpenAI => {
                    let base_url = provider
                        .base_url
                        .clone()
                        .unwrap_or_else(|| OpenAIBackend::DEFAULT_BASE_URL.to_string());
                    Arc::new(
                        OpenAIBackend::with_base_url(provider.name.clone(), credential, base_url)
                            .map_err(|e| ConfigError::ValidationError(e.to_string()))?,
                    )
                }
            };

            for model in &provider.models {
                candidates.push(Candidate {
                    provider: provider.name.clone(),
                    model: model.clone(),
                    backend: Arc::clone(&backend),
                });
            }
        }

        info!(
            "Provider gateway configured with {} candidates: {}",
            candidates.len(),
            candidates
                .iter()
                .map(|c| format!("{}/{}", c.provider, c.model))
                .collect::<Vec<_>>()
                .join(", ")
        );

        Self::new(
            candidates,
            config.timeout(),
            config.gateway.max_concurrent_calls,
        )
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `prompt` with the configured per-call timeout
    pub async fn analyze(&self, prompt: &Prompt) -> Result<ProviderResponse, AnalysisError> {
        self.analyze_with_timeout(prompt, self.timeout).await
    }

    /// Run `prompt`, trying candidates in order until one succeeds
    ///
    /// Dropping the returned future cancels the in-flight call and releases
    /// its permit.
    pub async fn analyze_with_timeout(
        &self,
        prompt: &Prompt,
        timeout: Duration,
    ) -> Result<ProviderResponse, AnalysisError> {
        let mut attempts = Vec::new();

        for candidate in &self.candidates {
            match self.attempt(candidate, prompt, timeout).await {
                Ok(raw_text) => {
                    if !attempts.is_empty() {
                        info!(
                            "{} answered by fallback {}/{} after {} failed attempts",
                            prompt.task,
                            candidate.provider,
                            candidate.model,
                            attempts.len()
                        );
                    }
                    return Ok(ProviderResponse {
                        raw_text,
                        model_used: candidate.model.clone(),
                        provider: candidate.provider.clone(),
                    });
                }
                Err(e) => {
                    if e.is_transient() {
                        warn!(
                            "Provider {}/{} failed transiently: {}",
                            candidate.provider, candidate.model, e
                        );
                    } else {
                        error!(
                            "Provider {}/{} failed: {}",
                            candidate.provider, candidate.model, e
                        );
                    }
                    attempts.push(FailedAttempt {
                        provider: candidate.provider.clone(),
                        model: candidate.model.clone(),
                        error: e,
                    });
                }
            }
        }

        error!(
            "All {} provider candidates failed for {}",
            attempts.len(),
            prompt.task
        );
        Err(AnalysisError::ProviderExhausted { attempts })
    }

    /// One call against one candidate
    async fn attempt(
        &self,
        candidate: &Candidate,
        prompt: &Prompt,
        timeout: Duration,
    ) -> Result<String, ProviderError> {
        // Waiting for a permit does not count against the call timeout
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ProviderError::Transport("provider gateway is closed".to_string()))?;

        debug!(
            "Calling {}/{} for {} (timeout {:?})",
            candidate.provider, candidate.model, prompt.task, timeout
        );
        let started = Instant::now();

        let text = tokio::time::timeout(timeout, candidate.backend.complete(&candidate.model, prompt))
            .await
            .map_err(|_| ProviderError::Timeout(timeout))??;

        debug!(
            "{}/{} responded in {:?} with {} bytes",
            candidate.provider,
            candidate.model,
            started.elapsed(),
            text.len()
        );

        if text.trim().is_empty() {
            return Err(ProviderError::InvalidResponse(
                "provider returned empty text".to_string(),
            ));
        }
        Ok(text)
    }
}
