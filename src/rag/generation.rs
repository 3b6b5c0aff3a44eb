//! Reasoning-chain generation orchestrator
//!
//! Runs a query through context composition and one or more LLM calls.
//! Multi-step plans feed each step the concatenated outputs of all prior
//! steps; single-call mode collapses the same analysis into one prompt. A
//! failing primary provider triggers exactly one call to the configured
//! fallback per step; if that also fails the error text is recorded and the
//! chain continues, so callers always receive the full step history.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::error;
use tracing::info;
use tracing::warn;

use super::context::ComposedContext;
use super::context::ContextBuilder;
use super::prompts::LegalPrompts;
use super::tokens::count_tokens;
use super::GenerationResult;
use super::ReasoningStep;
use super::StepMetrics;
use super::TokenUsage;
use crate::config::AppConfig;
use crate::llm::get_fallback_provider;
use crate::llm::get_llm_provider;
use crate::llm::CallPurpose;
use crate::llm::GenerationOptions;
use crate::llm::LlmProvider;
use crate::llm::TokenStream;
use crate::models::ContextItem;

const NO_RELEVANT_CASES: &str = "No sufficiently relevant cases were found.";
const NO_RELEVANT_CASES_OUTPUT: &str =
    "No sufficiently relevant cases were found to generate arguments.";

/// One stage of a multi-step plan
#[derive(Debug, Clone, Copy)]
pub struct StepSpec {
    pub name: &'static str,
    pub instructions: &'static str,
}

/// The three-step plan: analysis and comparison are merged, evaluation and
/// formulation each get a dedicated pass.
pub const OPTIMIZED_STEPS: &[StepSpec] = &[
    StepSpec {
        name: "Analyze Case & Compare",
        instructions: "Analyze the provided CASE CONTENT in light of the SIMILAR CASES/CHUNKS. Identify the key **legal issues** and relevant **legal principles/rules** (including primary legislation sections like EO Act s.66V, s.66W, and relevant principles from precedents). Generate 3-4 key **insights** *specific* to applying these principles to the case facts, noting similarities/differences with precedents. For each insight, assess its strength (Strong, Moderate, Weak) based on Australian law/precedents. Use the EXACT format: '[Insight text]. Strength: [StrengthValue]'. Do not include extra formatting.",
    },
    StepSpec {
        name: "Identify & Evaluate Arguments",
        instructions: "Based on the issues and insights from Step 1, identify potential legal arguments. For each argument: **(1) State the relevant legal RULE** (cite specific legislation section AND key precedent principle). **(2) APPLY the rule by comparing the specific facts** of the input case content to the facts and outcomes of the cited precedents. **(3) Evaluate the argument's STRENGTH** (Strong/Moderate/Weak) considering how well the facts align with supportive precedents and potential counterarguments.",
    },
    StepSpec {
        name: "Formulate Final Arguments",
        instructions: "Review the analysis. **First, reiterate Key Insights and strengths.** Then, formulate the final arguments using a clear IRAC structure for each. For every argument: **(1) State the ISSUE.** **(2) State the applicable RULE** (cite specific legislation section AND key precedent). **(3) APPLY the rule by explicitly comparing the client's facts to the facts of the supporting/distinguishing precedents.** **(4) CONCLUDE on the argument and its assessed STRENGTH (Strong/Moderate/Weak).** Format using clear titles, 'Legal Reasoning' (covering Rule & Application), 'Supporting Cases' (list cited precedents), and 'Supporting Legislation'. Ensure citations directly support the Rule and Application analysis.",
    },
];

/// The original five-step plan, kept for callers that want finer-grained
/// intermediate reasoning.
pub const LEGACY_STEPS: &[StepSpec] = &[
    StepSpec {
        name: "Analyze Case Content",
        instructions: "Analyze the given case content. Identify the key legal issues, facts, and any specific legal principles mentioned.",
    },
    StepSpec {
        name: "Compare With Similar Cases",
        instructions: "Compare the current case with the similar cases provided. Identify similarities and differences in legal principles, facts, and outcomes.",
    },
    StepSpec {
        name: "Identify Potential Arguments",
        instructions: "Based on the analysis and comparison, identify potential legal arguments that could be made. Consider both supporting and opposing arguments.",
    },
    StepSpec {
        name: "Evaluate Argument Strength",
        instructions: "Evaluate the strength of each identified argument. Consider legal precedent, factual support, and potential counterarguments.",
    },
    StepSpec {
        name: "Formulate Final Arguments",
        instructions: "Review the analysis from previous steps. Formulate the final arguments with clear titles, supporting cases, and assessed strength (Strong, Moderate, or Weak). **Crucially, first reiterate the Key Insights identified in the 'Analyze Case & Compare' step, including their strengths.** Format your response clearly, starting with a '## Key Insights' section, followed by a '## Key Arguments' section.",
    },
];

/// Which fixed step sequence a multi-step run uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPlan {
    /// Three steps
    Optimized,
    /// Five steps
    Legacy,
}

impl StepPlan {
    #[must_use]
    pub const fn steps(self) -> &'static [StepSpec] {
        match self {
            Self::Optimized => OPTIMIZED_STEPS,
            Self::Legacy => LEGACY_STEPS,
        }
    }
}

/// How the orchestrator structures its LLM calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasoningMode {
    /// One prompt instructing the model to reason through every step
    /// internally
    SingleCall,
    /// One LLM call per step, each seeing all prior step outputs
    MultiStep(StepPlan),
}

/// Invoked synchronously after each recorded step, before the next begins
pub type StepCallback<'a> = &'a mut (dyn FnMut(&ReasoningStep) + Send);

/// Receives incremental text fragments during streaming generation
pub type ChunkCallback<'a> = &'a mut (dyn FnMut(&str) + Send);

/// The reasoning-chain state machine
pub struct GenerationOrchestrator {
    primary: Arc<dyn LlmProvider>,
    fallback: Arc<dyn LlmProvider>,
    options: GenerationOptions,
    context_builder: ContextBuilder,
}

impl GenerationOrchestrator {
    pub fn new(
        primary: Arc<dyn LlmProvider>,
        fallback: Arc<dyn LlmProvider>,
        options: GenerationOptions,
        context_builder: ContextBuilder,
    ) -> Self {
        Self {
            primary,
            fallback,
            options,
            context_builder,
        }
    }

    /// Build from configuration for the arguments surface, optionally
    /// overriding the model.
    pub fn from_config(config: &AppConfig, llm_model: Option<&str>) -> Self {
        let primary = get_llm_provider(config, None, llm_model, CallPurpose::Arguments);
        let fallback = get_fallback_provider(config);
        Self::new(
            primary,
            fallback,
            GenerationOptions::from_config(config),
            ContextBuilder::from_config(config),
        )
    }

    #[must_use]
    pub fn primary_name(&self) -> String {
        self.primary.name()
    }

    /// Run the reasoning chain over a case and its retrieved context.
    ///
    /// With a `chunk_callback`, the final LLM call streams and the returned
    /// `final_output` is the empty string — the content was already delivered
    /// incrementally. Callers get one or the other, never both.
    pub async fn run(
        &self,
        case_content: &str,
        similar: &[ContextItem],
        topic: Option<&str>,
        mode: ReasoningMode,
        mut step_callback: Option<StepCallback<'_>>,
        chunk_callback: Option<ChunkCallback<'_>>,
    ) -> GenerationResult {
        let started = Instant::now();

        let context = match self.context_builder.compose(similar) {
            ComposedContext::Relevant(text) => text,
            ComposedContext::Insufficient => {
                // Hard gate: no provider call happens in either mode.
                if let Some(cb) = &mut step_callback {
                    cb(&ReasoningStep {
                        name: "Error".to_string(),
                        instructions: String::new(),
                        output: NO_RELEVANT_CASES_OUTPUT.to_string(),
                        metrics: StepMetrics::default(),
                    });
                }
                return GenerationResult {
                    final_output: NO_RELEVANT_CASES_OUTPUT.to_string(),
                    steps: Vec::new(),
                    token_usage: TokenUsage::default(),
                    execution_time: started.elapsed().as_secs_f64(),
                    error: Some(NO_RELEVANT_CASES.to_string()),
                };
            }
        };

        let topic = topic.unwrap_or("Not specified");

        match mode {
            ReasoningMode::MultiStep(plan) => {
                self.run_multi_step(
                    case_content,
                    &context,
                    topic,
                    plan,
                    step_callback,
                    chunk_callback,
                    started,
                )
                .await
            }
            ReasoningMode::SingleCall => {
                self.run_single_call(case_content, &context, topic, chunk_callback, started)
                    .await
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_multi_step(
        &self,
        case_content: &str,
        context: &str,
        topic: &str,
        plan: StepPlan,
        mut step_callback: Option<StepCallback<'_>>,
        mut chunk_callback: Option<ChunkCallback<'_>>,
        started: Instant,
    ) -> GenerationResult {
        let template = LegalPrompts::step_reasoning();
        let specs = plan.steps();
        let last_index = specs.len() - 1;

        let mut steps: Vec<ReasoningStep> = Vec::with_capacity(specs.len());
        let mut previous_steps = String::new();
        let mut usage = TokenUsage::default();

        for (i, spec) in specs.iter().enumerate() {
            let step_started = Instant::now();
            info!("Starting step {}: {}", i + 1, spec.name);

            let mut values = HashMap::new();
            values.insert("content", case_content.to_string());
            values.insert("context", context.to_string());
            values.insert("topic", topic.to_string());
            values.insert("step", spec.name.to_string());
            values.insert("step_instructions", spec.instructions.to_string());
            values.insert("previous_steps", previous_steps.clone());
            let prompt = template.render(&values);

            let input_tokens = count_tokens(&prompt, &self.primary.name());

            // The final step streams when the caller asked for streaming.
            let (raw_output, model_label, streamed) = if i == last_index {
                match chunk_callback.as_mut() {
                    Some(cb) => {
                        let (text, label) = self.stream_with_fallback(&prompt, &mut **cb).await;
                        (text, label, true)
                    }
                    None => {
                        let (text, label) = self.generate_with_fallback(&prompt).await;
                        (text, label, false)
                    }
                }
            } else {
                let (text, label) = self.generate_with_fallback(&prompt).await;
                (text, label, false)
            };

            let output_tokens = count_tokens(&raw_output, &model_label);
            usage.add(input_tokens, output_tokens);

            let recorded_output = if streamed { String::new() } else { raw_output };

            steps.push(ReasoningStep {
                name: spec.name.to_string(),
                instructions: spec.instructions.to_string(),
                output: recorded_output.clone(),
                metrics: StepMetrics {
                    input_tokens,
                    output_tokens,
                    execution_time: step_started.elapsed().as_secs_f64(),
                },
            });

            previous_steps.push_str(&format!(
                "\n\nSTEP {}: {}\n{}",
                i + 1,
                spec.name,
                recorded_output
            ));

            if let Some(cb) = &mut step_callback {
                if let Some(step) = steps.last() {
                    cb(step);
                }
            }
            info!("Completed step {}: {}", i + 1, spec.name);
        }

        let final_output = steps
            .last()
            .map_or_else(|| "Failed to generate arguments".to_string(), |s| s.output.clone());

        GenerationResult {
            final_output,
            steps,
            token_usage: usage,
            execution_time: started.elapsed().as_secs_f64(),
            error: None,
        }
    }

    async fn run_single_call(
        &self,
        case_content: &str,
        context: &str,
        topic: &str,
        mut chunk_callback: Option<ChunkCallback<'_>>,
        started: Instant,
    ) -> GenerationResult {
        let mut values = HashMap::new();
        values.insert("content", case_content.to_string());
        values.insert("context", context.to_string());
        values.insert("topic", topic.to_string());
        let prompt = LegalPrompts::single_call_reasoning().render(&values);

        let input_tokens = count_tokens(&prompt, &self.primary.name());

        let (raw_output, model_label, streamed) = match chunk_callback.as_mut() {
            Some(cb) => {
                let (text, label) = self.stream_with_fallback(&prompt, &mut **cb).await;
                (text, label, true)
            }
            None => {
                let (text, label) = self.generate_with_fallback(&prompt).await;
                (text, label, false)
            }
        };

        let output_tokens = count_tokens(&raw_output, &model_label);
        let mut usage = TokenUsage::default();
        usage.add(input_tokens, output_tokens);

        GenerationResult {
            final_output: if streamed { String::new() } else { raw_output },
            steps: Vec::new(),
            token_usage: usage,
            execution_time: started.elapsed().as_secs_f64(),
            error: None,
        }
    }

    /// Generate key insights only: one call over the arguments template,
    /// parsed into a list. An insufficient context yields a single
    /// explanatory entry.
    pub async fn generate_insights(
        &self,
        case_content: &str,
        similar: &[ContextItem],
        topic: Option<&str>,
    ) -> Vec<String> {
        let context = match self.context_builder.compose(similar) {
            ComposedContext::Relevant(text) => text,
            ComposedContext::Insufficient => {
                return vec![
                    "No sufficiently relevant cases were found to generate insights.".to_string(),
                ];
            }
        };

        let mut values = HashMap::new();
        values.insert("content", case_content.to_string());
        values.insert("context", context);
        values.insert("topic", topic.unwrap_or("Not specified").to_string());
        let mut prompt = LegalPrompts::build_arguments().render(&values);
        prompt.push_str(super::prompts::INSIGHTS_SUFFIX);

        let (response, _) = self.generate_with_fallback(&prompt).await;
        super::parsing::parse_insights(&response)
    }

    /// Generate titled arguments without the step-by-step chain: one call
    /// over the arguments template, parsed into [`Argument`]s.
    ///
    /// [`Argument`]: super::parsing::Argument
    pub async fn generate_arguments(
        &self,
        case_content: &str,
        similar: &[ContextItem],
        topic: Option<&str>,
        mut chunk_callback: Option<ChunkCallback<'_>>,
    ) -> Vec<super::parsing::Argument> {
        let context = match self.context_builder.compose(similar) {
            ComposedContext::Relevant(text) => text,
            ComposedContext::Insufficient => {
                return vec![super::parsing::Argument {
                    title: "Insufficient Similar Cases".to_string(),
                    content: NO_RELEVANT_CASES_OUTPUT.to_string(),
                    supporting_cases: Vec::new(),
                    strength: "N/A".to_string(),
                }];
            }
        };

        let mut values = HashMap::new();
        values.insert("content", case_content.to_string());
        values.insert("context", context);
        values.insert("topic", topic.unwrap_or("Not specified").to_string());
        let mut prompt = LegalPrompts::build_arguments().render(&values);
        prompt.push_str(super::prompts::ARGUMENTS_SUFFIX);

        let response = match chunk_callback.as_mut() {
            Some(cb) => self.stream_with_fallback(&prompt, &mut **cb).await.0,
            None => self.generate_with_fallback(&prompt).await.0,
        };
        super::parsing::parse_arguments(&response)
    }

    /// Call the primary provider; on failure, call the fallback exactly once.
    /// Returns the text and the provider/model label that produced it.
    async fn generate_with_fallback(&self, prompt: &str) -> (String, String) {
        match self.primary.generate(prompt, &self.options).await {
            Ok(text) => (text, self.primary.name()),
            Err(primary_err) => {
                warn!(
                    "Primary provider {} failed ({primary_err}), falling back to {}",
                    self.primary.name(),
                    self.fallback.name()
                );
                match self.fallback.generate(prompt, &self.options).await {
                    Ok(text) => (text, self.fallback.name()),
                    Err(fallback_err) => {
                        error!(
                            "Fallback provider {} also failed: {fallback_err}",
                            self.fallback.name()
                        );
                        (
                            format!("Error generating response: {fallback_err}"),
                            self.fallback.name(),
                        )
                    }
                }
            }
        }
    }

    /// Streaming variant of [`generate_with_fallback`](Self::generate_with_fallback).
    /// Returns the accumulated text (for metrics) and the producing label.
    async fn stream_with_fallback(
        &self,
        prompt: &str,
        on_chunk: &mut (dyn FnMut(&str) + Send),
    ) -> (String, String) {
        match self.primary.generate_stream(prompt, &self.options).await {
            Ok(stream) => (drain_stream(stream, on_chunk).await, self.primary.name()),
            Err(primary_err) => {
                warn!(
                    "Primary provider {} failed to stream ({primary_err}), falling back to {}",
                    self.primary.name(),
                    self.fallback.name()
                );
                on_chunk("\n[Switching to backup model...]\n");
                match self.fallback.generate_stream(prompt, &self.options).await {
                    Ok(stream) => (drain_stream(stream, on_chunk).await, self.fallback.name()),
                    Err(fallback_err) => {
                        error!(
                            "Fallback provider {} also failed to stream: {fallback_err}",
                            self.fallback.name()
                        );
                        let message = format!("Error generating response: {fallback_err}");
                        on_chunk(&message);
                        (message, self.fallback.name())
                    }
                }
            }
        }
    }
}

/// Forward fragments to the callback in order. A mid-stream failure delivers
/// one final error fragment and ends the stream.
async fn drain_stream(mut stream: TokenStream, on_chunk: &mut (dyn FnMut(&str) + Send)) -> String {
    let mut collected = String::new();
    while let Some(item) = stream.next().await {
        match item {
            Ok(fragment) => {
                on_chunk(&fragment);
                collected.push_str(&fragment);
            }
            Err(e) => {
                let message = format!("\nError generating response: {e}");
                on_chunk(&message);
                collected.push_str(&message);
                break;
            }
        }
    }
    collected
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use super::*;
    use crate::models::RetrievedDocument;
    use crate::SatRagError;

    struct FixedProvider {
        label: &'static str,
        text: &'static str,
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
    }

    impl FixedProvider {
        fn new(label: &'static str, text: &'static str) -> Arc<Self> {
            Arc::new(Self {
                label,
                text,
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for FixedProvider {
        async fn generate(&self, prompt: &str, _options: &GenerationOptions) -> crate::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.text.to_string())
        }

        async fn generate_stream(
            &self,
            prompt: &str,
            _options: &GenerationOptions,
        ) -> crate::Result<TokenStream> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            let (sender, receiver) = mpsc::channel(4);
            let text = self.text.to_string();
            tokio::spawn(async move {
                let _ = sender.send(Ok(text)).await;
            });
            Ok(TokenStream::new(receiver))
        }

        fn name(&self) -> String {
            self.label.to_string()
        }
    }

    struct FailingProvider {
        label: &'static str,
        calls: AtomicUsize,
    }

    impl FailingProvider {
        fn new(label: &'static str) -> Arc<Self> {
            Arc::new(Self {
                label,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for FailingProvider {
        async fn generate(&self, _prompt: &str, _options: &GenerationOptions) -> crate::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(SatRagError::provider(self.label, "connection refused"))
        }

        async fn generate_stream(
            &self,
            _prompt: &str,
            _options: &GenerationOptions,
        ) -> crate::Result<TokenStream> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(SatRagError::provider(self.label, "connection refused"))
        }

        fn name(&self) -> String {
            self.label.to_string()
        }
    }

    fn context_items(similarities: &[f32]) -> Vec<ContextItem> {
        similarities
            .iter()
            .enumerate()
            .map(|(i, &similarity)| {
                ContextItem::Document(RetrievedDocument {
                    id: format!("case{i}"),
                    case_title: format!("Case {i}"),
                    reasons_summary: Some(format!("Summary of case {i}.")),
                    reasons: None,
                    citation_number: Some(format!("202{i} WASAT {i}")),
                    case_topic: None,
                    catchwords: None,
                    case_url: Some(format!("https://example.com/case{i}")),
                    similarity,
                    rerank_score: None,
                })
            })
            .collect()
    }

    fn orchestrator(
        primary: Arc<dyn LlmProvider>,
        fallback: Arc<dyn LlmProvider>,
    ) -> GenerationOrchestrator {
        GenerationOrchestrator::new(
            primary,
            fallback,
            GenerationOptions::default(),
            ContextBuilder::new(0.5, 0.5),
        )
    }

    #[tokio::test]
    async fn single_call_returns_the_provider_text() {
        let primary = FixedProvider::new("stub/primary", "LEGAL ANALYSIS: TENANCY");
        let fallback = FailingProvider::new("stub/fallback");
        let result = orchestrator(primary.clone(), fallback.clone())
            .run(
                "case content",
                &context_items(&[0.85, 0.30]),
                Some("Commercial Tenancy"),
                ReasoningMode::SingleCall,
                None,
                None,
            )
            .await;

        assert_eq!(result.final_output, "LEGAL ANALYSIS: TENANCY");
        assert!(result.steps.is_empty());
        assert!(result.error.is_none());
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn no_context_short_circuits_before_any_provider_call() {
        let primary = FixedProvider::new("stub/primary", "should not run");
        let fallback = FixedProvider::new("stub/fallback", "should not run");
        let orchestrator = orchestrator(primary.clone(), fallback.clone());

        for mode in [
            ReasoningMode::SingleCall,
            ReasoningMode::MultiStep(StepPlan::Optimized),
        ] {
            let result = orchestrator
                .run("case content", &context_items(&[0.1]), None, mode, None, None)
                .await;
            assert!(result.error.is_some());
            assert!(result.steps.is_empty());
            assert!(result.final_output.contains("No sufficiently relevant cases"));
        }
        assert_eq!(primary.calls.load(Ordering::SeqCst), 0);
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fallback_triggers_exactly_once_per_step() {
        let primary = FailingProvider::new("stub/primary");
        let fallback = FixedProvider::new("stub/fallback", "fallback text");
        let result = orchestrator(primary.clone(), fallback.clone())
            .run(
                "case content",
                &context_items(&[0.9]),
                None,
                ReasoningMode::MultiStep(StepPlan::Optimized),
                None,
                None,
            )
            .await;

        assert_eq!(result.steps.len(), 3);
        assert_eq!(primary.calls.load(Ordering::SeqCst), 3);
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 3);
        for step in &result.steps {
            assert_eq!(step.output, "fallback text");
        }
        assert_eq!(result.final_output, "fallback text");
    }

    #[tokio::test]
    async fn exhausted_fallback_records_error_text_and_continues() {
        let primary = FailingProvider::new("stub/primary");
        let fallback = FailingProvider::new("stub/fallback");
        let result = orchestrator(primary, fallback)
            .run(
                "case content",
                &context_items(&[0.9]),
                None,
                ReasoningMode::MultiStep(StepPlan::Optimized),
                None,
                None,
            )
            .await;

        // The chain never aborts: all steps are recorded with the error text.
        assert_eq!(result.steps.len(), 3);
        for step in &result.steps {
            assert!(step.output.starts_with("Error generating response:"));
        }
    }

    #[tokio::test]
    async fn step_prompts_accumulate_all_prior_outputs() {
        let primary = FixedProvider::new("stub/primary", "STEP-OUTPUT-MARKER");
        let fallback = FailingProvider::new("stub/fallback");
        let orchestrator = orchestrator(primary.clone(), fallback);

        let mut seen_steps: Vec<String> = Vec::new();
        let mut record_step = |step: &ReasoningStep| seen_steps.push(step.name.clone());
        let result = orchestrator
            .run(
                "case content",
                &context_items(&[0.9]),
                None,
                ReasoningMode::MultiStep(StepPlan::Optimized),
                Some(&mut record_step),
                None,
            )
            .await;

        assert_eq!(result.steps.len(), 3);
        assert_eq!(
            seen_steps,
            vec![
                "Analyze Case & Compare",
                "Identify & Evaluate Arguments",
                "Formulate Final Arguments"
            ]
        );

        let prompts = primary.prompts.lock().unwrap();
        // Step 3's prompt carries both prior outputs, tagged by step name.
        assert!(prompts[2].contains("STEP 1: Analyze Case & Compare"));
        assert!(prompts[2].contains("STEP 2: Identify & Evaluate Arguments"));
        assert_eq!(prompts[2].matches("STEP-OUTPUT-MARKER").count(), 2);
        // Step 1 saw no prior reasoning.
        assert!(!prompts[0].contains("STEP 1:"));
    }

    #[tokio::test]
    async fn legacy_plan_runs_five_steps_with_metrics() {
        let primary = FixedProvider::new("stub/primary", "output");
        let fallback = FailingProvider::new("stub/fallback");
        let result = orchestrator(primary, fallback)
            .run(
                "case content",
                &context_items(&[0.9]),
                None,
                ReasoningMode::MultiStep(StepPlan::Legacy),
                None,
                None,
            )
            .await;

        assert_eq!(result.steps.len(), 5);
        for step in &result.steps {
            assert!(step.metrics.input_tokens > 0);
        }
        assert_eq!(
            result.token_usage.total_tokens,
            result.token_usage.input_tokens + result.token_usage.output_tokens
        );
    }

    #[tokio::test]
    async fn streaming_yields_empty_final_output() {
        let primary = FixedProvider::new("stub/primary", "streamed analysis text");
        let fallback = FailingProvider::new("stub/fallback");
        let orchestrator = orchestrator(primary, fallback);

        let mut collected = String::new();
        let mut on_chunk = |chunk: &str| collected.push_str(chunk);
        let result = orchestrator
            .run(
                "case content",
                &context_items(&[0.9]),
                None,
                ReasoningMode::SingleCall,
                None,
                Some(&mut on_chunk),
            )
            .await;

        assert_eq!(result.final_output, "");
        assert_eq!(collected, "streamed analysis text");
    }

    #[tokio::test]
    async fn non_streaming_yields_non_empty_final_output() {
        let primary = FixedProvider::new("stub/primary", "direct analysis text");
        let fallback = FailingProvider::new("stub/fallback");
        let result = orchestrator(primary, fallback)
            .run(
                "case content",
                &context_items(&[0.9]),
                None,
                ReasoningMode::SingleCall,
                None,
                None,
            )
            .await;

        assert_eq!(result.final_output, "direct analysis text");
    }

    #[tokio::test]
    async fn insights_parse_from_the_generated_list() {
        let primary = FixedProvider::new(
            "stub/primary",
            "## Key Insights\n1. The notice was defective. Strength: Strong\n2. Precedent favours the tenant. Strength: Moderate\n",
        );
        let fallback = FailingProvider::new("stub/fallback");
        let insights = orchestrator(primary, fallback)
            .generate_insights("case content", &context_items(&[0.9]), None)
            .await;

        assert_eq!(insights.len(), 2);
        assert!(insights[0].contains("notice was defective"));
        assert!(insights[0].contains("Strength: Strong"));
    }

    #[tokio::test]
    async fn insufficient_context_yields_placeholder_argument() {
        let primary = FixedProvider::new("stub/primary", "should not run");
        let fallback = FixedProvider::new("stub/fallback", "should not run");
        let arguments = orchestrator(primary.clone(), fallback)
            .generate_arguments("case content", &context_items(&[0.1]), None, None)
            .await;

        assert_eq!(arguments.len(), 1);
        assert_eq!(arguments[0].title, "Insufficient Similar Cases");
        assert_eq!(arguments[0].strength, "N/A");
        assert_eq!(primary.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn streaming_fallback_announces_the_switch() {
        let primary = FailingProvider::new("stub/primary");
        let fallback = FixedProvider::new("stub/fallback", "backup text");
        let orchestrator = orchestrator(primary, fallback);

        let mut collected = String::new();
        let mut on_chunk = |chunk: &str| collected.push_str(chunk);
        let result = orchestrator
            .run(
                "case content",
                &context_items(&[0.9]),
                None,
                ReasoningMode::SingleCall,
                None,
                Some(&mut on_chunk),
            )
            .await;

        assert_eq!(result.final_output, "");
        assert!(collected.contains("[Switching to backup model...]"));
        assert!(collected.ends_with("backup text"));
    }
}
