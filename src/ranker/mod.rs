//! Cross-encoder similarity ranking.
//!
//! [`SimilarityRanker`] scores (query, document) pairs with a pretrained
//! sequence-classification model and reorders the documents by relevance.
//! Lifecycle is two-phase: construct with a [`RankerConfig`], then
//! [`warm_up`](SimilarityRanker::warm_up) to load the model before
//! [`run`](SimilarityRanker::run).

pub mod config;
pub mod error;
pub mod loader;
pub mod model;

#[cfg(any(test, feature = "mock"))]
pub mod mock;


pub use config::{COMPONENT_TYPE, ModelKwargs, RankerConfig, TokenizerKwargs};
pub use error::RankerError;
pub use model::BertCrossEncoder;

#[cfg(any(test, feature = "mock"))]
pub use mock::MockBackend;

use std::cmp::Ordering;

use candle_core::{DType, Device, Tensor};
use serde::Serialize;
use serde_json::Value;
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use crate::constants::MAX_SEQ_LEN;
use crate::device::{DeviceSpec, select_device};
use crate::document::Document;

use loader::{load_ranking_tokenizer, resolve_model_dir};

/// Result of a ranking run: surviving documents, scored and sorted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankerOutput {
    pub documents: Vec<Document>,
}

enum Backend {
    Candle {
        model: BertCrossEncoder,
        tokenizer: Tokenizer,
        device: Device,
    },
    #[cfg(any(test, feature = "mock"))]
    Mock(std::sync::Arc<MockBackend>),
}

impl Backend {
    fn score_pairs(
        &self,
        pairs: &[(String, String)],
        batch_size: usize,
    ) -> Result<Vec<f32>, RankerError> {
        match self {
            Backend::Candle {
                model,
                tokenizer,
                device,
            } => {
                let mut logits = Vec::with_capacity(pairs.len());

                for chunk in pairs.chunks(batch_size) {
                    let encodings = tokenizer
                        .encode_batch(chunk.to_vec(), true)
                        .map_err(|e| RankerError::TokenizationFailed {
                            reason: e.to_string(),
                        })?;

                    let mut id_rows = Vec::with_capacity(encodings.len());
                    let mut type_rows = Vec::with_capacity(encodings.len());
                    let mut mask_rows = Vec::with_capacity(encodings.len());
                    for encoding in &encodings {
                        id_rows.push(Tensor::new(encoding.get_ids(), device)?);
                        type_rows.push(Tensor::new(encoding.get_type_ids(), device)?);
                        mask_rows.push(Tensor::new(encoding.get_attention_mask(), device)?);
                    }

                    let input_ids = Tensor::stack(&id_rows, 0)?;
                    let token_type_ids = Tensor::stack(&type_rows, 0)?;
                    let attention_mask = Tensor::stack(&mask_rows, 0)?;

                    let chunk_logits = model
                        .forward_logits(&input_ids, &token_type_ids, Some(&attention_mask))
                        .map_err(|e| RankerError::InferenceFailed {
                            reason: e.to_string(),
                        })?;
                    logits.extend(chunk_logits);
                }

                Ok(logits)
            }
            #[cfg(any(test, feature = "mock"))]
            Backend::Mock(backend) => backend.score_pairs(pairs),
        }
    }
}

struct RuntimeState {
    backend: Backend,
    device: Option<DeviceSpec>,
}

/// Cross-encoder document ranker with an explicit warm-up lifecycle.
pub struct SimilarityRanker {
    config: RankerConfig,
    state: Option<RuntimeState>,
}

impl std::fmt::Debug for SimilarityRanker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimilarityRanker")
            .field("config", &self.config)
            .field("warmed_up", &self.state.is_some())
            .finish()
    }
}

impl SimilarityRanker {
    /// Creates an unloaded ranker after validating the configuration.
    ///
    /// When both an explicit `device` and a `device_map` override are set,
    /// the device map wins and a warning is logged.
    pub fn new(config: RankerConfig) -> Result<Self, RankerError> {
        config.validate()?;

        if config.has_device_conflict() {
            warn!(
                "Both `device` and `device_map` from model_kwargs are set; \
                 ignoring `device` and using `device_map`"
            );
        }

        Ok(Self {
            config,
            state: None,
        })
    }

    /// Rebuilds a ranker from its serialized mapping form.
    pub fn from_dict(data: &Value) -> Result<Self, RankerError> {
        Self::new(RankerConfig::from_dict(data)?)
    }

    /// Serializes the configuration to the component mapping form.
    pub fn to_dict(&self) -> Result<Value, RankerError> {
        self.config.to_dict()
    }

    pub fn config(&self) -> &RankerConfig {
        &self.config
    }

    pub fn is_warmed_up(&self) -> bool {
        self.state.is_some()
    }

    /// Resolved device, if known. `None` before warm-up or when an `auto`
    /// device map left the choice to the loader.
    pub fn device(&self) -> Option<DeviceSpec> {
        self.state.as_ref().and_then(|state| state.device)
    }

    /// Loads the tokenizer and model. Calling again reloads.
    pub fn warm_up(&mut self) -> Result<(), RankerError> {
        let token = match &self.config.token {
            Some(secret) => secret.resolve()?,
            None => None,
        };

        let model_dir = resolve_model_dir(&self.config.model, token.as_deref())?;

        // Device map first, explicit device second, feature fallback last.
        let (device, device_spec) = match self.config.resolved_device_spec() {
            Some(spec) => (spec.to_candle()?, Some(spec)),
            None => {
                let device = select_device()?;
                let spec = matches!(&device, Device::Cpu).then_some(DeviceSpec::Cpu);
                (device, spec)
            }
        };

        let dtype = self.config.model_kwargs.dtype.unwrap_or(DType::F32);

        info!(
            model = %self.config.model,
            device = ?device,
            dtype = ?dtype,
            "Loading cross-encoder model"
        );

        let model = BertCrossEncoder::load(&model_dir, dtype, &device).map_err(|e| {
            RankerError::ModelLoadFailed {
                reason: format!("failed to load cross-encoder: {e}"),
            }
        })?;

        let max_len = self
            .config
            .tokenizer_kwargs
            .model_max_length
            .unwrap_or(MAX_SEQ_LEN);
        let tokenizer = load_ranking_tokenizer(&model_dir, max_len)?;

        info!(model = %self.config.model, "Cross-encoder model loaded");

        self.state = Some(RuntimeState {
            backend: Backend::Candle {
                model,
                tokenizer,
                device,
            },
            device: device_spec,
        });

        Ok(())
    }

    /// Installs a mock backend in place of a loaded model.
    #[cfg(any(test, feature = "mock"))]
    pub fn warm_up_mock(&mut self, backend: std::sync::Arc<MockBackend>) {
        let device = self.config.resolved_device_spec();
        self.state = Some(RuntimeState {
            backend: Backend::Mock(backend),
            device,
        });
    }

    /// Ranks `documents` against `query`.
    ///
    /// Scores every document, applies the optional threshold, sorts by score
    /// descending (ties keep their source order), assigns each surviving
    /// document's score, and truncates to `top_k` (the runtime override wins
    /// over the configured default).
    ///
    /// An empty input returns empty output without touching the model; any
    /// other input before [`warm_up`](Self::warm_up) is a usage error.
    pub fn run(
        &self,
        query: &str,
        documents: Vec<Document>,
        top_k: Option<usize>,
    ) -> Result<RankerOutput, RankerError> {
        if documents.is_empty() {
            return Ok(RankerOutput { documents });
        }

        let state = self.state.as_ref().ok_or(RankerError::NotWarmedUp)?;

        let top_k = top_k.unwrap_or(self.config.top_k);
        if top_k == 0 {
            return Err(RankerError::InvalidConfig {
                reason: "top_k must be at least 1".to_string(),
            });
        }

        let pairs = self.build_pairs(query, &documents);

        debug!(
            query_len = query.len(),
            num_documents = documents.len(),
            batch_size = self.config.batch_size,
            "Scoring query-document pairs"
        );

        let logits = state.backend.score_pairs(&pairs, self.config.batch_size)?;

        let mut scored: Vec<(Document, f32)> = documents
            .into_iter()
            .zip(logits.into_iter().map(|logit| self.scale(logit)))
            .collect();

        if let Some(threshold) = self.config.score_threshold {
            let before = scored.len();
            scored.retain(|(_, score)| *score > threshold);
            debug!(
                threshold,
                kept = scored.len(),
                total = before,
                "Filtered by score threshold"
            );
        }

        // Stable sort: equal scores keep their source order.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(top_k);

        let documents: Vec<Document> = scored
            .into_iter()
            .map(|(mut doc, score)| {
                doc.score = Some(score);
                doc
            })
            .collect();

        debug!(
            returned = documents.len(),
            top_score = documents.first().and_then(|doc| doc.score),
            "Ranking complete"
        );

        Ok(RankerOutput { documents })
    }

    /// Builds the (query, document) text pairs handed to the tokenizer.
    ///
    /// Configured metadata fields present on a document are stringified and
    /// joined with the content by the embedding separator; prefixes are
    /// prepended verbatim.
    fn build_pairs(&self, query: &str, documents: &[Document]) -> Vec<(String, String)> {
        let query_text = format!("{}{}", self.config.query_prefix, query);

        documents
            .iter()
            .map(|doc| {
                let mut parts: Vec<String> = self
                    .config
                    .meta_fields_to_embed
                    .iter()
                    .filter_map(|field| doc.meta.get(field))
                    .filter(|value| !value.is_null())
                    .map(|value| match value {
                        Value::String(text) => text.clone(),
                        other => other.to_string(),
                    })
                    .collect();
                parts.push(doc.content.clone());

                let doc_text = format!(
                    "{}{}",
                    self.config.document_prefix,
                    parts.join(&self.config.embedding_separator)
                );

                (query_text.clone(), doc_text)
            })
            .collect()
    }

    fn scale(&self, logit: f32) -> f32 {
        if self.config.scale_score {
            // validate() guarantees a positive factor when scaling is on.
            let factor = self
                .config
                .calibration_factor
                .unwrap_or(crate::constants::DEFAULT_CALIBRATION_FACTOR)
                as f32;
            sigmoid(logit / factor)
        } else {
            logit
        }
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
