/// Error types for ingestion, provider calls, analysis and configuration
pub mod error;

/// Samples, incidents and shared enums
pub mod events;

/// Append-only sample store with optional journal
pub mod telemetry;

/// Per-zone snapshot aggregation
pub mod aggregator;

/// Provider gateway, prompts and structured result recovery
pub mod ai;

/// Alert composition
pub mod alerts;

/// Configuration management
pub mod config;

// Re-export commonly used types
pub use ai::{AnalysisOrchestrator, AnalysisRequest, AnalysisResult, ProviderGateway, TaskType};
pub use error::{AnalysisError, ConfigError, IngestError, ProviderError};
pub use events::{DensitySample, Incident, NewSample, Severity};
pub use telemetry::TelemetryStore;
