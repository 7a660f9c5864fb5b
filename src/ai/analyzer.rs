use crate::ai::extractor::extract_object;
use crate::ai::gateway::{ProviderGateway, ProviderResponse};
use crate::ai::prompts::build_prompt;
use crate::ai::tasks::{AnalysisRequest, TaskOutput, TaskType};
use crate::error::AnalysisError;
use crate::events::Timestamp;
use chrono::Utc;
use log::{debug, error, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Fully populated, schema-valid result of one analysis
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub task_type: TaskType,
    pub output: TaskOutput,
    /// Provider text exactly as received
    pub raw_provider_text: String,
    /// Whether a JSON object could be recovered from the provider text
    pub parse_succeeded: bool,
    /// Whether any field carries a default instead of provider data
    pub used_fallback_defaults: bool,
    pub provider_model_used: String,
    pub provider_used: String,
    pub generated_at: Timestamp,
    /// Paths of the fields that were defaulted
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub defaulted_fields: Vec<String>,
}

/// Turns analysis requests into typed, default-filled results
///
/// Provider exhaustion is the only error surfaced; malformed or partial
/// provider output always resolves to a flagged result.
pub struct AnalysisOrchestrator {
    gateway: Arc<ProviderGateway>,
}

impl AnalysisOrchestrator {
    pub fn new(gateway: Arc<ProviderGateway>) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &ProviderGateway {
        &self.gateway
    }

    /// Build the prompt, call the providers and interpret the reply
    ///
    /// Dropping the returned future cancels the in-flight provider call.
    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        let task = request.task_type();
        let prompt = build_prompt(request);
        info!(
            "Starting {} analysis ({} zone snapshots)",
            task,
            request.snapshot.as_ref().map_or(0, Vec::len)
        );

        let started = Instant::now();
        let response = match self.gateway.analyze(&prompt).await {
            Ok(response) => response,
            Err(e) => {
                error!("{} analysis failed after {:?}: {}", task, started.elapsed(), e);
                return Err(e);
            }
        };

        let result = interpret(task, response, Utc::now());
        info!(
            "{} analysis completed in {:?} via {}/{}: parse_succeeded={}, used_fallback_defaults={}",
            task,
            started.elapsed(),
            result.provider_used,
            result.provider_model_used,
            result.parse_succeeded,
            result.used_fallback_defaults
        );
        Ok(result)
    }
}

/// Interpret provider text for `task`
///
/// Pure: the same inputs always produce the same result.
pub fn interpret(task: TaskType, response: ProviderResponse, generated_at: Timestamp) -> AnalysisResult {
    let schema = task.schema();

    let (output, parse_succeeded, defaulted_fields) = match extract_object(&response.raw_text) {
        Ok(object) => {
            let conformed = schema.conform(&object);
            if !conformed.defaulted.is_empty() {
                debug!(
                    "{} result defaulted fields: {}",
                    task,
                    conformed.defaulted.join(", ")
                );
            }
            match TaskOutput::from_object(task, conformed.object) {
                Ok(output) => (output, true, conformed.defaulted),
                Err(e) => {
                    // Conformed objects always decode; keep the result valid regardless
                    error!("Conformed {} result did not decode: {}", task, e);
                    (TaskOutput::fallback(task), true, schema.field_names())
                }
            }
        }
        Err(failure) => {
            warn!(
                "No JSON object recovered from {} response ({}), using defaults",
                task, failure.reason
            );
            (TaskOutput::fallback(task), false, schema.field_names())
        }
    };

    AnalysisResult {
        task_type: task,
        output,
        used_fallback_defaults: !defaulted_fields.is_empty(),
        parse_succeeded,
        raw_provider_text: response.raw_text,
        provider_model_used: response.model_used,
        provider_used: response.provider,
        generated_at,
        defaulted_fields,
    }
}
