//! Cross-cutting, shared constants.
//!
//! Prefer deriving secondary values from these primary ones to avoid drift.

/// Default cross-encoder model identifier (hub repo id or local directory).
pub const DEFAULT_MODEL: &str = "cross-encoder/ms-marco-MiniLM-L-6-v2";

/// Default number of documents kept after ranking.
pub const DEFAULT_TOP_K: usize = 10;

/// Default number of (query, document) pairs tokenized and scored per forward pass.
pub const DEFAULT_BATCH_SIZE: usize = 16;

/// Default divisor applied to raw logits before the sigmoid transform.
pub const DEFAULT_CALIBRATION_FACTOR: f64 = 1.0;

/// Default separator between embedded metadata values and document content.
pub const DEFAULT_EMBEDDING_SEPARATOR: &str = "\n";

/// Maximum sequence length for cross-encoder inputs (tokenizer truncation).
pub const MAX_SEQ_LEN: usize = 512;

/// Environment variables checked (in order) for a hub authentication token.
pub const TOKEN_ENV_VARS: [&str; 2] = ["HF_API_TOKEN", "HF_TOKEN"];
