//! End-to-end generation flow tests with stubbed providers.
//!
//! These exercise the orchestrator through the public API without a
//! database or network: context composition, prompt contents, reasoning
//! step ordering, and the streaming contract.

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use satrag::llm::GenerationOptions;
use satrag::llm::LlmProvider;
use satrag::llm::TokenStream;
use satrag::models::ContextItem;
use satrag::models::RetrievedDocument;
use satrag::rag::generation::StepPlan;
use satrag::rag::ContextBuilder;
use satrag::rag::GenerationOrchestrator;
use satrag::rag::ReasoningMode;
use tokio::sync::mpsc;

struct StubProvider {
    label: &'static str,
    text: &'static str,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl StubProvider {
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
impl LlmProvider for StubProvider {
    async fn generate(&self, prompt: &str, _options: &GenerationOptions) -> satrag::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.text.to_string())
    }

    async fn generate_stream(
        &self,
        prompt: &str,
        _options: &GenerationOptions,
    ) -> satrag::Result<TokenStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        let (sender, receiver) = mpsc::channel(8);
        let text = self.text.to_string();
        tokio::spawn(async move {
            // Deliver in two fragments to exercise ordering.
            let midpoint = text.len() / 2;
            let _ = sender.send(Ok(text[..midpoint].to_string())).await;
            let _ = sender.send(Ok(text[midpoint..].to_string())).await;
        });
        Ok(TokenStream::new(receiver))
    }

    fn name(&self) -> String {
        self.label.to_string()
    }
}

fn document(id: &str, title: &str, similarity: f32) -> ContextItem {
    ContextItem::Document(RetrievedDocument {
        id: id.to_string(),
        case_title: title.to_string(),
        reasons_summary: Some(format!("{title}: summary of the tribunal's reasons.")),
        reasons: None,
        citation_number: Some("2023 WASAT 123".to_string()),
        case_topic: Some("Commercial Tenancy".to_string()),
        catchwords: None,
        case_url: Some(format!("https://example.com/{id}")),
        similarity,
        rerank_score: None,
    })
}

/// The round-trip scenario: one qualifying document, single-call generation,
/// stubbed provider output passed through verbatim with zero steps.
#[tokio::test]
async fn round_trip_single_call_over_composed_context() {
    let primary = StubProvider::new("stub/primary", "LEGAL ANALYSIS: COMMERCIAL TENANCY");
    let fallback = StubProvider::new("stub/fallback", "unused");

    // Nominal threshold applied directly (factor 1.0): 0.85 passes, 0.30 is cut.
    let orchestrator = GenerationOrchestrator::new(
        primary.clone(),
        fallback.clone(),
        GenerationOptions::default(),
        ContextBuilder::new(0.5, 1.0),
    );

    let pool = vec![
        document("case1", "Harbour Holdings v Pell", 0.85),
        document("case2", "Unrelated Matter", 0.30),
    ];

    let result = orchestrator
        .run(
            "commercial lease termination notice",
            &pool,
            Some("Commercial Tenancy"),
            ReasoningMode::SingleCall,
            None,
            None,
        )
        .await;

    assert_eq!(result.final_output, "LEGAL ANALYSIS: COMMERCIAL TENANCY");
    assert!(result.steps.is_empty());
    assert!(result.error.is_none());
    assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);

    let prompts = primary.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Harbour Holdings v Pell"));
    assert!(!prompts[0].contains("Unrelated Matter"));
    assert!(prompts[0].contains("DOCUMENT 1"));
    assert!(prompts[0].contains("https://example.com/case1"));
}

#[tokio::test]
async fn multi_step_runs_in_order_and_reports_each_step() {
    let primary = StubProvider::new("stub/primary", "reasoned output");
    let fallback = StubProvider::new("stub/fallback", "unused");
    let orchestrator = GenerationOrchestrator::new(
        primary.clone(),
        fallback,
        GenerationOptions::default(),
        ContextBuilder::new(0.5, 0.5),
    );

    let pool = vec![document("case1", "Harbour Holdings v Pell", 0.9)];

    let mut reported: Vec<String> = Vec::new();
    let mut on_step = |step: &satrag::rag::ReasoningStep| reported.push(step.name.clone());

    let result = orchestrator
        .run(
            "the tenant disputes the termination notice",
            &pool,
            None,
            ReasoningMode::MultiStep(StepPlan::Optimized),
            Some(&mut on_step),
            None,
        )
        .await;

    assert_eq!(result.steps.len(), 3);
    assert_eq!(result.final_output, "reasoned output");
    // Callbacks fired once per step, in plan order.
    assert_eq!(
        reported,
        vec![
            "Analyze Case & Compare",
            "Identify & Evaluate Arguments",
            "Formulate Final Arguments"
        ]
    );
    // Aggregate usage sums the three steps.
    let summed: usize = result.steps.iter().map(|s| s.metrics.input_tokens).sum();
    assert_eq!(result.token_usage.input_tokens, summed);
}

#[tokio::test]
async fn streaming_and_non_streaming_outputs_are_mutually_exclusive() {
    let pool = vec![document("case1", "Harbour Holdings v Pell", 0.9)];

    // Streaming run: chunks arrive, the returned text is empty.
    let primary = StubProvider::new("stub/primary", "streamed legal analysis");
    let fallback = StubProvider::new("stub/fallback", "unused");
    let orchestrator = GenerationOrchestrator::new(
        primary,
        fallback,
        GenerationOptions::default(),
        ContextBuilder::new(0.5, 0.5),
    );

    let mut collected = String::new();
    let mut on_chunk = |fragment: &str| collected.push_str(fragment);
    let streamed = orchestrator
        .run(
            "query",
            &pool,
            None,
            ReasoningMode::SingleCall,
            None,
            Some(&mut on_chunk),
        )
        .await;

    assert_eq!(streamed.final_output, "");
    assert_eq!(collected, "streamed legal analysis");

    // Non-streaming run over the same inputs returns the text directly.
    let direct = orchestrator
        .run("query", &pool, None, ReasoningMode::SingleCall, None, None)
        .await;
    assert_eq!(direct.final_output, "streamed legal analysis");
}
