//! RAG core: query classification, prompt composition, and the
//! reasoning-chain generation orchestrator.
//!
//! # Examples
//!
//! ```rust,no_run
//! use satrag::config::AppConfig;
//! use satrag::rag::RagService;
//! use satrag::rag::ChatRequest;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     let service = RagService::new(&config).await?;
//!
//!     let request = ChatRequest {
//!         message: "What notice is required to terminate a commercial lease?".to_string(),
//!         conversation_id: None,
//!         history: Vec::new(),
//!     };
//!     let outcome = service.chat(&request, None).await;
//!     println!("{}", outcome.response);
//!
//!     Ok(())
//! }
//! ```

pub mod classifier;
pub mod context;
pub mod generation;
pub mod parsing;
pub mod pipeline;
pub mod prompts;
pub mod tokens;

use serde::Deserialize;
use serde::Serialize;

pub use classifier::QueryClassifier;
pub use context::ComposedContext;
pub use context::ContextBuilder;
pub use generation::GenerationOrchestrator;
pub use generation::ReasoningMode;
pub use generation::StepPlan;
pub use parsing::Argument;
pub use pipeline::ArgumentsOutcome;
pub use pipeline::ArgumentsRequest;
pub use pipeline::ChatOutcome;
pub use pipeline::ChatRequest;
pub use pipeline::RagService;
pub use prompts::PromptTemplate;

/// Query label driving prompt-template selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryLabel {
    CaseSpecific,
    General,
}

impl QueryLabel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CaseSpecific => "case_specific",
            Self::General => "general",
        }
    }
}

/// Heuristic classification of a user query.
///
/// This is a tie-break rule for prompt selection, not a trained classifier;
/// `confidence` is always within [0.5, 0.95].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QueryClassification {
    pub label: QueryLabel,
    pub confidence: f32,
}

/// Per-step token and timing metrics. Token counts are model-aware
/// approximations for display, never limit checks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepMetrics {
    pub input_tokens: usize,
    pub output_tokens: usize,
    /// Wall-clock seconds for this step
    pub execution_time: f64,
}

/// One stage of a multi-step generation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningStep {
    pub name: String,
    pub instructions: String,
    pub output: String,
    pub metrics: StepMetrics,
}

/// Aggregate token usage across one orchestrator run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub total_tokens: usize,
}

impl TokenUsage {
    pub fn add(&mut self, input: usize, output: usize) {
        self.input_tokens += input;
        self.output_tokens += output;
        self.total_tokens = self.input_tokens + self.output_tokens;
    }
}

/// Final output of one orchestrator run.
///
/// `steps` is empty in single-call mode. When a streaming callback was
/// supplied, `final_output` is empty because the content was already
/// delivered incrementally — callers must not expect both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    pub final_output: String,
    pub steps: Vec<ReasoningStep>,
    pub token_usage: TokenUsage,
    /// Wall-clock seconds for the whole run
    pub execution_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
