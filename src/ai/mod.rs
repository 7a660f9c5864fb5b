/// Prompt construction, provider calls and structured result recovery
pub mod analyzer;
pub mod backends;
pub mod extractor;
pub mod gateway;
pub mod prompts;
pub mod schema;
pub mod tasks;

pub use analyzer::{interpret, AnalysisOrchestrator, AnalysisResult};
pub use backends::{GeminiBackend, LLMBackend, MockBackend, OpenAIBackend};
pub use extractor::extract_object;
pub use gateway::{Candidate, ProviderGateway, ProviderResponse};
pub use prompts::{build_prompt, Prompt};
pub use tasks::{AnalysisRequest, TaskOutput, TaskPayload, TaskType};
