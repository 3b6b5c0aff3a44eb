//! Cross-encoder reranking
//!
//! A cross-encoder scores each (query, passage) pair jointly, which is far
//! more accurate than independent vector similarity but expensive per pair.
//! The production implementation runs an exported ms-marco-MiniLM-L-6-v2
//! pair-classification model through ONNX Runtime. Loading is expensive, so
//! one instance is cached process-wide; swapping the configured model
//! directory forces a reload.

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::OnceLock;

use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use parking_lot::Mutex;
use parking_lot::RwLock;
use tracing::info;

use crate::errors::SatRagError;
use crate::Result;

/// Scores candidate passages against a raw query text.
///
/// Implementations must return one score per passage, aligned to input order.
/// Higher means more relevant; scores are unbounded logits.
pub trait Reranker: Send + Sync {
    fn score(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>>;
}

/// ONNX cross-encoder reranker
pub struct CrossEncoderReranker {
    session: Mutex<Session>,
    tokenizer: tokenizers::Tokenizer,
    max_length: usize,
}

impl CrossEncoderReranker {
    /// Load from a directory containing the exported model
    /// (`model.onnx` or `model_O4.onnx`) and its `tokenizer.json`.
    pub fn load(model_dir: &Path) -> Result<Self> {
        let model_path = find_model(model_dir)?;
        let tokenizer_path = model_dir.join("tokenizer.json");

        let tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| SatRagError::Reranker(format!("Failed to load tokenizer: {e:?}")))?;

        let model_bytes = std::fs::read(&model_path)?;
        let session = Session::builder()
            .map_err(|e| SatRagError::Reranker(format!("Session builder: {e:?}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| SatRagError::Reranker(format!("Optimization level: {e:?}")))?
            .commit_from_memory(&model_bytes)
            .map_err(|e| SatRagError::Reranker(format!("Failed to load model: {e:?}")))?;

        info!("Loaded cross-encoder reranker from {}", model_dir.display());

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            max_length: 512,
        })
    }
}

fn find_model(model_dir: &Path) -> Result<PathBuf> {
    let candidates = [model_dir.join("model_O4.onnx"), model_dir.join("model.onnx")];
    candidates
        .into_iter()
        .find(|path| path.exists())
        .ok_or_else(|| {
            SatRagError::Reranker(format!("No reranker model found in {}", model_dir.display()))
        })
}

impl Reranker for CrossEncoderReranker {
    fn score(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>> {
        if passages.is_empty() {
            return Ok(Vec::new());
        }

        const MAX_BATCH: usize = 16;
        let mut scores = Vec::with_capacity(passages.len());

        for batch in passages.chunks(MAX_BATCH) {
            let encodings: Vec<_> = batch
                .iter()
                .map(|passage| {
                    self.tokenizer
                        .encode((query, *passage), true)
                        .map_err(|e| SatRagError::Reranker(format!("Tokenization failed: {e:?}")))
                })
                .collect::<Result<_>>()?;

            let max_len = encodings
                .iter()
                .map(|e| e.get_ids().len().min(self.max_length))
                .max()
                .unwrap_or(1);
            let batch_size = encodings.len();

            let mut ids = Vec::with_capacity(batch_size * max_len);
            let mut mask = Vec::with_capacity(batch_size * max_len);
            let mut type_ids = Vec::with_capacity(batch_size * max_len);

            for encoding in &encodings {
                let len = encoding.get_ids().len().min(max_len);
                for i in 0..len {
                    ids.push(i64::from(encoding.get_ids()[i]));
                    mask.push(i64::from(encoding.get_attention_mask()[i]));
                    type_ids.push(i64::from(encoding.get_type_ids()[i]));
                }
                for _ in len..max_len {
                    ids.push(0);
                    mask.push(0);
                    type_ids.push(0);
                }
            }

            let shape = vec![batch_size, max_len];
            let input_ids = Value::from_array((shape.clone(), ids))
                .map_err(|e| SatRagError::Reranker(format!("input_ids: {e:?}")))?;
            let attention_mask = Value::from_array((shape.clone(), mask))
                .map_err(|e| SatRagError::Reranker(format!("attention_mask: {e:?}")))?;
            let token_type_ids = Value::from_array((shape, type_ids))
                .map_err(|e| SatRagError::Reranker(format!("token_type_ids: {e:?}")))?;

            let inputs = ort::inputs![
                "input_ids" => input_ids,
                "attention_mask" => attention_mask,
                "token_type_ids" => token_type_ids,
            ];

            let mut session = self.session.lock();
            let outputs = session
                .run(inputs)
                .map_err(|e| SatRagError::Reranker(format!("Inference failed: {e:?}")))?;

            // One logit per row: shape [batch_size, 1]
            let (_shape, logits) = outputs["logits"]
                .try_extract_tensor::<f32>()
                .map_err(|e| SatRagError::Reranker(format!("Failed to extract logits: {e:?}")))?;

            if logits.len() < batch_size {
                return Err(SatRagError::Reranker(format!(
                    "Cross-encoder returned {} logits for {} pairs",
                    logits.len(),
                    batch_size
                )));
            }
            scores.extend_from_slice(&logits[..batch_size]);
        }

        Ok(scores)
    }
}

static RERANKER_CACHE: OnceLock<RwLock<Option<(PathBuf, Arc<CrossEncoderReranker>)>>> =
    OnceLock::new();

/// Get or initialize the process-wide reranker.
///
/// The instance is loaded once and shared; concurrent first calls race only
/// on the write lock, never on duplicate sessions reaching callers. Passing
/// a different directory than the cached one reloads the model.
pub fn get_reranker(model_dir: &Path) -> Result<Arc<CrossEncoderReranker>> {
    let cache = RERANKER_CACHE.get_or_init(|| RwLock::new(None));

    if let Some((cached_dir, reranker)) = cache.read().as_ref() {
        if cached_dir == model_dir {
            return Ok(Arc::clone(reranker));
        }
    }

    let mut slot = cache.write();
    // Another task may have loaded it while we waited on the lock.
    if let Some((cached_dir, reranker)) = slot.as_ref() {
        if cached_dir == model_dir {
            return Ok(Arc::clone(reranker));
        }
        info!(
            "Reranker model changed ({} -> {}), reloading",
            cached_dir.display(),
            model_dir.display()
        );
    }

    let reranker = Arc::new(CrossEncoderReranker::load(model_dir)?);
    *slot = Some((model_dir.to_path_buf(), Arc::clone(&reranker)));
    Ok(reranker)
}
