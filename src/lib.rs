//! crossrank: cross-encoder similarity ranking for retrieval pipelines.
//!
//! A [`SimilarityRanker`] scores (query, document) pairs with a pretrained
//! sequence-classification model and reorders a document list by relevance.
//!
//! # Public API Surface
//!
//! ## Core Types
//! - [`SimilarityRanker`], [`RankerOutput`] - the ranking component
//! - [`RankerConfig`], [`ModelKwargs`], [`TokenizerKwargs`] - configuration
//!   with lossless mapping (de)serialization
//! - [`Document`] - caller-owned document type
//!
//! ## Supporting Types
//! - [`Secret`] - env-var / raw-token secret references
//! - [`DeviceSpec`], [`DeviceMapSpec`], [`select_device`] - device resolution
//! - [`BertCrossEncoder`] - the underlying candle model
//!
//! ## Errors
//! - [`RankerError`], [`SecretError`], [`DeviceError`]
//!
//! ## Test/Mock Support
//! [`MockBackend`] is available behind `#[cfg(any(test, feature = "mock"))]`.
//!
//! # Lifecycle
//!
//! ```no_run
//! use crossrank::{Document, RankerConfig, SimilarityRanker};
//!
//! # fn main() -> Result<(), crossrank::RankerError> {
//! let mut ranker = SimilarityRanker::new(RankerConfig::default())?;
//! ranker.warm_up()?;
//!
//! let documents = vec![
//!     Document::new("Berlin"),
//!     Document::new("Belgrade"),
//!     Document::new("Sarajevo"),
//! ];
//! let output = ranker.run("City in Bosnia and Herzegovina", documents, None)?;
//! println!("{:?}", output.documents.first());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod constants;
pub mod device;
pub mod document;
pub mod ranker;

pub use auth::{Secret, SecretError};
pub use constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_CALIBRATION_FACTOR, DEFAULT_EMBEDDING_SEPARATOR, DEFAULT_MODEL,
    DEFAULT_TOP_K, MAX_SEQ_LEN, TOKEN_ENV_VARS,
};
pub use device::{DeviceError, DeviceMapSpec, DeviceSpec, select_device};
pub use document::Document;
pub use ranker::{
    BertCrossEncoder, COMPONENT_TYPE, ModelKwargs, RankerConfig, RankerError, RankerOutput,
    SimilarityRanker, TokenizerKwargs,
};

#[cfg(any(test, feature = "mock"))]
pub use ranker::MockBackend;
