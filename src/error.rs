use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while ingesting or persisting telemetry samples
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Invalid sample: {0}")]
    InvalidSample(String),

    #[error("Corrupt journal at line {line}: {message}")]
    CorruptJournal { line: usize, message: String },

    #[error("Telemetry store is read-only")]
    ReadOnly,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Failure of a single provider/model call
///
/// Every variant is candidate-scoped: the gateway records it and moves on to
/// the next candidate. `is_transient` only decides how loudly it is logged.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },
}

impl ProviderError {
    /// Map a non-success HTTP status to a provider error
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 | 403 => ProviderError::Unauthorized(message),
            404 => ProviderError::ModelNotFound(message),
            408 => ProviderError::Timeout(Duration::ZERO),
            429 => ProviderError::RateLimited(message),
            500..=599 => ProviderError::ServerError { status, message },
            _ => ProviderError::Rejected { status, message },
        }
    }

    /// Whether the failure is expected to clear up on its own
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::Timeout(_)
                | ProviderError::RateLimited(_)
                | ProviderError::ServerError { .. }
                | ProviderError::InvalidResponse(_)
                | ProviderError::Transport(_)
        )
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout(Duration::ZERO)
        } else if err.is_decode() {
            ProviderError::InvalidResponse(err.to_string())
        } else if let Some(status) = err.status() {
            ProviderError::from_status(status.as_u16(), err.to_string())
        } else {
            ProviderError::Transport(err.to_string())
        }
    }
}

/// One failed candidate attempt, kept for diagnostics
#[derive(Debug, Clone, PartialEq)]
pub struct FailedAttempt {
    pub provider: String,
    pub model: String,
    pub error: ProviderError,
}

/// Errors surfaced to callers of the analysis layer
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("All {} provider candidates failed", .attempts.len())]
    ProviderExhausted { attempts: Vec<FailedAttempt> },
}

/// Reason a JSON object could not be recovered from provider text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionFailure {
    #[error("no opening brace found")]
    NoOpeningBrace,

    #[error("unbalanced braces")]
    Unbalanced,

    #[error("parse error: {0}")]
    Parse(String),
}

/// Extraction failure with the untouched provider text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Extraction failed: {reason}")]
pub struct ExtractionFailed {
    pub reason: ExtractionFailure,
    pub raw_text: String,
}

/// Errors that can occur during configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Invalid configuration value: {0}")]
    ValidationError(String),

    #[error("Missing credential for provider '{provider}': {detail}")]
    MissingCredential { provider: String, detail: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            ProviderError::from_status(429, "slow down".to_string()),
            ProviderError::RateLimited(_)
        ));
        assert!(matches!(
            ProviderError::from_status(503, "unavailable".to_string()),
            ProviderError::ServerError { status: 503, .. }
        ));
        assert!(matches!(
            ProviderError::from_status(404, "no such model".to_string()),
            ProviderError::ModelNotFound(_)
        ));
        assert!(matches!(
            ProviderError::from_status(401, "bad key".to_string()),
            ProviderError::Unauthorized(_)
        ));
        assert!(matches!(
            ProviderError::from_status(400, "bad request".to_string()),
            ProviderError::Rejected { status: 400, .. }
        ));
    }

    #[test]
    fn test_transient_classification() {
        assert!(ProviderError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(ProviderError::RateLimited(String::new()).is_transient());
        assert!(ProviderError::InvalidResponse(String::new()).is_transient());
        assert!(!ProviderError::Unauthorized(String::new()).is_transient());
        assert!(!ProviderError::ModelNotFound(String::new()).is_transient());
    }

    #[test]
    fn test_exhausted_message_counts_attempts() {
        let err = AnalysisError::ProviderExhausted {
            attempts: vec![
                FailedAttempt {
                    provider: "gemini".to_string(),
                    model: "gemini-2.5-flash".to_string(),
                    error: ProviderError::RateLimited("quota".to_string()),
                },
                FailedAttempt {
                    provider: "gemini".to_string(),
                    model: "gemini-2.0-flash".to_string(),
                    error: ProviderError::Timeout(Duration::from_secs(30)),
                },
            ],
        };
        assert_eq!(err.to_string(), "All 2 provider candidates failed");
    }
}
