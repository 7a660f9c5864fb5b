use crate::error::ConfigError;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Upper bound for the per-call provider timeout
const MAX_TIMEOUT_SECS: u64 = 600;

/// Upper bound for simultaneous outbound provider calls
const MAX_CONCURRENT_CALLS: usize = 256;

/// Root configuration, loaded from TOML
///
/// Every section is optional; missing sections take their defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Providers in fallback priority order
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,

    #[serde(default)]
    pub alerts: AlertConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Provider call limits
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayConfig {
    /// Hard timeout for a single provider call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum provider calls in flight across all requests
    #[serde(default = "default_max_concurrent_calls")]
    pub max_concurrent_calls: usize,
}

/// Wire protocol spoken by a provider
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    /// OpenAI chat completions, or any server exposing the same API
    OpenAI,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Gemini => f.write_str("gemini"),
            ProviderKind::OpenAI => f.write_str("openai"),
        }
    }
}

/// One provider and its candidate models
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
    pub name: String,
    pub kind: ProviderKind,

    /// Inline credential; takes precedence over `api_key_env`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable holding the credential
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Model identifiers in fallback priority order
    pub models: Vec<String>,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_key_env", &self.api_key_env)
            .field("base_url", &self.base_url)
            .field("models", &self.models)
            .finish()
    }
}

impl ProviderConfig {
    /// Resolve the credential, inline first, then from the environment
    ///
    /// Returns `Ok(None)` when the provider declares no credential at all,
    /// which is valid for local OpenAI-compatible servers.
    pub fn credential(&self) -> Result<Option<String>, ConfigError> {
        if let Some(key) = &self.api_key {
            return Ok(Some(key.clone()));
        }

        match &self.api_key_env {
            Some(var) => match std::env::var(var) {
                Ok(value) if !value.trim().is_empty() => Ok(Some(value)),
                _ => Err(ConfigError::MissingCredential {
                    provider: self.name.clone(),
                    detail: format!("environment variable {} is not set", var),
                }),
            },
            None if self.kind == ProviderKind::Gemini => Err(ConfigError::MissingCredential {
                provider: self.name.clone(),
                detail: "set api_key or api_key_env".to_string(),
            }),
            None => Ok(None),
        }
    }
}

/// Alert list limits
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertConfig {
    #[serde(default = "default_max_alerts")]
    pub max_alerts: usize,

    /// Maximum alert message length in bytes
    #[serde(default = "default_max_message_len")]
    pub max_message_len: usize,
}

/// Telemetry persistence
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetryConfig {
    /// JSON-lines journal backing the sample store
    #[serde(default = "default_journal_path")]
    pub journal_path: PathBuf,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_concurrent_calls() -> usize {
    4
}

fn default_max_alerts() -> usize {
    10
}

fn default_max_message_len() -> usize {
    280
}

fn default_journal_path() -> PathBuf {
    PathBuf::from("crowdwatch-samples.jsonl")
}

fn default_providers() -> Vec<ProviderConfig> {
    vec![ProviderConfig {
        name: "gemini".to_string(),
        kind: ProviderKind::Gemini,
        api_key: None,
        api_key_env: Some("GEMINI_API_KEY".to_string()),
        base_url: None,
        models: vec!["gemini-2.5-flash".to_string(), "gemini-2.0-flash".to_string()],
    }]
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_concurrent_calls: default_max_concurrent_calls(),
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            max_alerts: default_max_alerts(),
            max_message_len: default_max_message_len(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            journal_path: default_journal_path(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            providers: default_providers(),
            alerts: AlertConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl Config {
    /// Load and validate configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::ReadError(format!("{}: {}", path.display(), e))
        })?;
        debug!("Loaded configuration from {}", path.display());
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check limits and provider declarations
    ///
    /// Credentials are not resolved here; a missing environment variable
    /// surfaces when the gateway is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway.timeout_secs == 0 || self.gateway.timeout_secs > MAX_TIMEOUT_SECS {
            return Err(ConfigError::ValidationError(format!(
                "gateway.timeout_secs must be between 1 and {}",
                MAX_TIMEOUT_SECS
            )));
        }

        if self.gateway.max_concurrent_calls == 0
            || self.gateway.max_concurrent_calls > MAX_CONCURRENT_CALLS
        {
            return Err(ConfigError::ValidationError(format!(
                "gateway.max_concurrent_calls must be between 1 and {}",
                MAX_CONCURRENT_CALLS
            )));
        }

        if self.providers.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one provider must be configured".to_string(),
            ));
        }

        for (i, provider) in self.providers.iter().enumerate() {
            if provider.name.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "providers[{}].name cannot be empty",
                    i
                )));
            }
            if self.providers[..i].iter().any(|p| p.name == provider.name) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate provider name '{}'",
                    provider.name
                )));
            }
            if provider.models.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "provider '{}' lists no models",
                    provider.name
                )));
            }
            if provider.models.iter().any(|m| m.trim().is_empty()) {
                return Err(ConfigError::ValidationError(format!(
                    "provider '{}' has an empty model name",
                    provider.name
                )));
            }
            if let Some(url) = &provider.base_url {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(ConfigError::ValidationError(format!(
                        "provider '{}' base_url must start with http:// or https://",
                        provider.name
                    )));
                }
            }
        }

        if self.alerts.max_alerts == 0 {
            return Err(ConfigError::ValidationError(
                "alerts.max_alerts must be at least 1".to_string(),
            ));
        }

        // Room for the "..." suffix plus at least one character
        if self.alerts.max_message_len < 4 {
            return Err(ConfigError::ValidationError(
                "alerts.max_message_len must be at least 4".to_string(),
            ));
        }

        if self.telemetry.journal_path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "telemetry.journal_path cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Per-call timeout as a `Duration`
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.gateway.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const FULL_CONFIG: &str = r#"
[gateway]
timeout_secs = 15
max_concurrent_calls = 2

[[providers]]
name = "gemini"
kind = "gemini"
api_key = "inline-key"
models = ["gemini-2.5-flash", "gemini-2.0-flash"]

[[providers]]
name = "ollama"
kind = "openai"
base_url = "http://localhost:11434/v1"
models = ["llama3.1"]

[alerts]
max_alerts = 5
max_message_len = 120

[telemetry]
journal_path = "/var/lib/crowdwatch/samples.jsonl"
"#;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.gateway.timeout_secs, 30);
        assert_eq!(config.providers[0].models[0], "gemini-2.5-flash");
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_full_config_parses() {
        let config = Config::from_toml_str(FULL_CONFIG).unwrap();

        assert_eq!(config.timeout(), std::time::Duration::from_secs(15));
        assert_eq!(config.gateway.max_concurrent_calls, 2);
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.providers[1].kind, ProviderKind::OpenAI);
        assert_eq!(config.alerts.max_alerts, 5);
        assert_eq!(
            config.telemetry.journal_path,
            PathBuf::from("/var/lib/crowdwatch/samples.jsonl")
        );
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let config = Config::from_toml_str("[gateway]\ntimeout_secs = 5\n").unwrap();
        assert_eq!(config.gateway.timeout_secs, 5);
        assert_eq!(config.gateway.max_concurrent_calls, 4);
        assert_eq!(config.alerts, AlertConfig::default());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let cases = [
            "[gateway]\ntimeout_secs = 0\n",
            "[gateway]\nmax_concurrent_calls = 0\n",
            "providers = []\n",
            "[alerts]\nmax_alerts = 0\n",
            "[alerts]\nmax_message_len = 2\n",
            "[[providers]]\nname = \"a\"\nkind = \"gemini\"\nmodels = []\n",
            "[[providers]]\nname = \"a\"\nkind = \"openai\"\nbase_url = \"localhost\"\nmodels = [\"m\"]\n",
            "[[providers]]\nname = \"a\"\nkind = \"openai\"\nmodels = [\"m\"]\n[[providers]]\nname = \"a\"\nkind = \"openai\"\nmodels = [\"n\"]\n",
        ];
        for case in cases {
            assert!(
                matches!(
                    Config::from_toml_str(case),
                    Err(ConfigError::ValidationError(_))
                ),
                "expected validation error for {:?}",
                case
            );
        }
    }

    #[test]
    fn test_unknown_provider_kind_is_parse_error() {
        let toml = "[[providers]]\nname = \"a\"\nkind = \"claude\"\nmodels = [\"m\"]\n";
        assert!(matches!(
            Config::from_toml_str(toml),
            Err(ConfigError::TomlError(_))
        ));
    }

    #[test]
    fn test_credential_resolution() {
        let config = Config::from_toml_str(FULL_CONFIG).unwrap();
        assert_eq!(
            config.providers[0].credential().unwrap().as_deref(),
            Some("inline-key")
        );
        assert_eq!(config.providers[1].credential().unwrap(), None);

        let missing = ProviderConfig {
            name: "gemini".to_string(),
            kind: ProviderKind::Gemini,
            api_key: None,
            api_key_env: Some("CROWDWATCH_TEST_UNSET_KEY_VAR".to_string()),
            base_url: None,
            models: vec!["m".to_string()],
        };
        assert!(matches!(
            missing.credential(),
            Err(ConfigError::MissingCredential { .. })
        ));

        let undeclared = ProviderConfig {
            api_key_env: None,
            ..missing
        };
        assert!(undeclared.credential().is_err());
    }

    #[test]
    fn test_debug_redacts_inline_key() {
        let config = Config::from_toml_str(FULL_CONFIG).unwrap();
        let debug = format!("{:?}", config.providers[0]);
        assert!(!debug.contains("inline-key"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(FULL_CONFIG.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.providers[0].name, "gemini");

        assert!(matches!(
            Config::from_file("/nonexistent/crowdwatch.toml"),
            Err(ConfigError::ReadError(_))
        ));
    }
}
