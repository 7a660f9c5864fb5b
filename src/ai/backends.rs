use crate::ai::prompts::Prompt;
use crate::error::ProviderError;
use log::debug;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Longest provider error body kept in an error message
const MAX_ERROR_BODY: usize = 500;

/// Trait for text-generation provider implementations
///
/// A backend performs exactly one call per invocation; retries, fallback and
/// timeouts belong to the gateway. Dropping the returned future cancels the
/// call.
pub trait LLMBackend: Send + Sync {
    /// Provider name used in logs and attempt records
    fn name(&self) -> &str;

    fn complete<'a>(
        &'a self,
        model: &'a str,
        prompt: &'a Prompt,
    ) -> Pin<Box<dyn Future<Output = Result<String, ProviderError>> + Send + 'a>>;
}

/// Turn a non-success HTTP response into a classified provider error
async fn error_from_response(response: Response) -> ProviderError {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    let mut message = body.trim().to_string();
    if message.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !message.is_char_boundary(cut) {
            cut -= 1;
        }
        message.truncate(cut);
    }
    ProviderError::from_status(status, message)
}

/// Google Gemini backend (`generateContent`)
pub struct GeminiBackend {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    system_instruction: GeminiContent,
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    top_p: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiResponseContent>,
    #[allow(dead_code)]
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    #[serde(default)]
    code: Option<u16>,
    message: String,
}

impl GeminiBackend {
    pub const DEFAULT_BASE_URL: &'static str = "https://generativelanguage.googleapis.com";

    /// Create a backend against the public Gemini endpoint
    pub fn new(api_key: String) -> Result<Self, ProviderError> {
        Self::with_base_url(api_key, Self::DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Result<Self, ProviderError> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            api_key,
            base_url,
        })
    }

    fn api_url(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model
        )
    }

    fn build_request(prompt: &Prompt) -> GeminiRequest {
        GeminiRequest {
            system_instruction: GeminiContent {
                parts: vec![GeminiPart {
                    text: prompt.system.clone(),
                }],
            },
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: prompt.text.clone(),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: prompt.temperature,
                top_p: prompt.top_p,
                max_output_tokens: prompt.max_output_tokens,
            },
        }
    }

    /// Concatenated text of the first candidate
    fn response_text(response: GeminiResponse) -> Result<String, ProviderError> {
        if let Some(error) = response.error {
            return Err(match error.code {
                Some(code) => ProviderError::from_status(code, error.message),
                None => ProviderError::InvalidResponse(error.message),
            });
        }

        let candidate = response.candidates.into_iter().next().ok_or_else(|| {
            ProviderError::InvalidResponse("No candidates in Gemini response".to_string())
        })?;
        let text: String = candidate
            .content
            .map(|content| content.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();
        Ok(text)
    }
}

impl LLMBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    fn complete<'a>(
        &'a self,
        model: &'a str,
        prompt: &'a Prompt,
    ) -> Pin<Box<dyn Future<Output = Result<String, ProviderError>> + Send + 'a>> {
        Box::pin(async move {
            let request = Self::build_request(prompt);
            debug!("Sending {} prompt to Gemini model {}", prompt.task, model);

            let response = self
                .client
                .post(self.api_url(model))
                .header("x-goog-api-key", &self.api_key)
                .json(&request)
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(error_from_response(response).await);
            }

            let gemini_response: GeminiResponse = response.json().await?;
            Self::response_text(gemini_response)
        })
    }
}

/// OpenAI-compatible chat completions backend
///
/// Works with OpenAI and with local servers exposing the same API (Ollama's
/// `/v1` endpoint, for example).
pub struct OpenAIBackend {
    client: Client,
    name: String,
    api_key: Option<String>,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
    response_format: OpenAIResponseFormat,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct OpenAIResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
    #[serde(default)]
    error: Option<OpenAIError>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
    #[allow(dead_code)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIError {
    message: String,
    #[serde(rename = "type")]
    error_type: String,
}

impl OpenAIBackend {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com/v1";

    /// Create a backend against the public OpenAI endpoint
    pub fn new(api_key: String) -> Result<Self, ProviderError> {
        Self::with_base_url(
            "openai".to_string(),
            Some(api_key),
            Self::DEFAULT_BASE_URL.to_string(),
        )
    }

    /// Create a backend for any OpenAI-compatible endpoint
    ///
    /// `api_key` may be `None` for local servers that do not authenticate.
    pub fn with_base_url(
        name: String,
        api_key: Option<String>,
        base_url: String,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            name,
            api_key,
            base_url,
        })
    }

    fn api_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn build_request(model: &str, prompt: &Prompt) -> OpenAIRequest {
        OpenAIRequest {
            model: model.to_string(),
            messages: vec![
                OpenAIMessage {
                    role: "system".to_string(),
                    content: prompt.system.clone(),
                },
                OpenAIMessage {
                    role: "user".to_string(),
                    content: prompt.text.clone(),
                },
            ],
            temperature: prompt.temperature,
            top_p: prompt.top_p,
            max_tokens: prompt.max_output_tokens,
            response_format: OpenAIResponseFormat {
                format_type: "json_object".to_string(),
            },
        }
    }

    fn response_text(response: OpenAIResponse) -> Result<String, ProviderError> {
        if let Some(error) = response.error {
            return Err(ProviderError::InvalidResponse(format!(
                "OpenAI API error ({}): {}",
                error.error_type, error.message
            )));
        }

        let choice = response.choices.into_iter().next().ok_or_else(|| {
            ProviderError::InvalidResponse("No choices in OpenAI response".to_string())
        })?;
        Ok(choice.message.content.unwrap_or_default())
    }
}

impl LLMBackend for OpenAIBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn complete<'a>(
        &'a self,
        model: &'a str,
        prompt: &'a Prompt,
    ) -> Pin<Box<dyn Future<Output = Result<String, ProviderError>> + Send + 'a>> {
        Box::pin(async move {
            let request = Self::build_request(model, prompt);
            debug!("Sending {} prompt to {} model {}", prompt.task, self.name, model);

            let mut builder = self.client.post(self.api_url()).json(&request);
            if let Some(api_key) = &self.api_key {
                builder = builder.bearer_auth(api_key);
            }
            let response = builder.send().await?;

            if !response.status().is_success() {
                return Err(error_from_response(response).await);
            }

            let openai_response: OpenAIResponse = response.json().await?;
            Self::response_text(openai_response)
        })
    }
}

/// Scripted in-process backend for tests and dry runs
///
/// Responses are returned in order and cycle after the last one. Per-model
/// scripts take precedence over the shared script.
#[derive(Clone)]
pub struct MockBackend {
    name: String,
    responses: Arc<Vec<Result<String, ProviderError>>>,
    model_responses: Arc<Vec<(String, Result<String, ProviderError>)>>,
    current_index: Arc<AtomicUsize>,
    delay: Option<Duration>,
    model_delays: Arc<Vec<(String, Duration)>>,
    call_log: Arc<Mutex<Vec<String>>>,
    completed: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    last_prompt: Arc<Mutex<Option<Prompt>>>,
}

impl MockBackend {
    /// A backend that always answers with `text`
    pub fn with_text(text: impl Into<String>) -> Self {
        Self::with_responses(vec![Ok(text.into())])
    }

    /// A backend that replays `responses` in order
    pub fn with_responses(responses: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            name: "mock".to_string(),
            responses: Arc::new(responses),
            model_responses: Arc::new(Vec::new()),
            current_index: Arc::new(AtomicUsize::new(0)),
            delay: None,
            model_delays: Arc::new(Vec::new()),
            call_log: Arc::new(Mutex::new(Vec::new())),
            completed: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            last_prompt: Arc::new(Mutex::new(None)),
        }
    }

    /// A backend whose every call fails with `error`
    pub fn failing(error: ProviderError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Always answer calls for `model` with `response`
    pub fn with_model_response(
        mut self,
        model: impl Into<String>,
        response: Result<String, ProviderError>,
    ) -> Self {
        Arc::make_mut(&mut self.model_responses).push((model.into(), response));
        self
    }

    /// Add a delay to every response
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Add a delay to calls for one model
    pub fn with_model_delay(mut self, model: impl Into<String>, delay: Duration) -> Self {
        Arc::make_mut(&mut self.model_delays).push((model.into(), delay));
        self
    }

    /// Number of calls started
    pub fn call_count(&self) -> usize {
        self.calls().len()
    }

    /// Models requested, in call order
    pub fn calls(&self) -> Vec<String> {
        self.call_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of calls that ran to completion (not cancelled)
    pub fn completed_count(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Highest number of calls observed running at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<Prompt> {
        self.last_prompt
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn next_response(&self, model: &str) -> Result<String, ProviderError> {
        if let Some((_, response)) = self.model_responses.iter().find(|(m, _)| m == model) {
            return response.clone();
        }
        if self.responses.is_empty() {
            return Err(ProviderError::InvalidResponse(
                "mock backend has no scripted responses".to_string(),
            ));
        }
        let index = self.current_index.fetch_add(1, Ordering::SeqCst);
        self.responses[index % self.responses.len()].clone()
    }
}

/// Decrements the in-flight counter when a call ends or is dropped
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl LLMBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn complete<'a>(
        &'a self,
        model: &'a str,
        prompt: &'a Prompt,
    ) -> Pin<Box<dyn Future<Output = Result<String, ProviderError>> + Send + 'a>> {
        Box::pin(async move {
            self.call_log
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(model.to_string());
            *self.last_prompt.lock().unwrap_or_else(PoisonError::into_inner) = Some(prompt.clone());

            let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(running, Ordering::SeqCst);
            let _guard = InFlightGuard(&self.in_flight);

            let delay = self
                .model_delays
                .iter()
                .find(|(m, _)| m == model)
                .map(|(_, d)| *d)
                .or(self.delay);
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let response = self.next_response(model);
            self.completed.fetch_add(1, Ordering::SeqCst);
            response
        })
    }
}
