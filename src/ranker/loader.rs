//! Model directory resolution and tokenizer loading.

use std::path::{Path, PathBuf};

use hf_hub::api::sync::ApiBuilder;
use tokenizers::{PaddingParams, Tokenizer, TruncationParams};
use tracing::{debug, info};

use super::error::RankerError;

/// Files a cross-encoder model directory must provide.
const MODEL_FILES: [&str; 3] = ["config.json", "model.safetensors", "tokenizer.json"];

/// Resolves a model identifier to a local directory.
///
/// An existing path is used as-is. A path-like identifier that does not exist
/// is an error. Anything else is treated as a hub repo id and fetched with
/// the given token.
pub fn resolve_model_dir(model: &str, token: Option<&str>) -> Result<PathBuf, RankerError> {
    let path = Path::new(model);

    if path.exists() {
        debug!(model, "Using local model directory");
        let dir = path.to_path_buf();
        ensure_model_files(&dir)?;
        return Ok(dir);
    }

    if path.is_absolute() || model.starts_with('.') {
        return Err(RankerError::ModelNotFound {
            model: model.to_string(),
        });
    }

    info!(model, "Fetching model from hub");
    fetch_from_hub(model, token)
}

fn fetch_from_hub(model: &str, token: Option<&str>) -> Result<PathBuf, RankerError> {
    let api = ApiBuilder::new()
        .with_token(token.map(str::to_string))
        .build()
        .map_err(|e| RankerError::ModelLoadFailed {
            reason: format!("hub client init failed: {e}"),
        })?;

    let repo = api.model(model.to_string());

    let mut last_file = None;
    for file in MODEL_FILES {
        let local = repo.get(file).map_err(|e| RankerError::ModelLoadFailed {
            reason: format!("failed to fetch {file} for '{model}': {e}"),
        })?;
        last_file = Some(local);
    }

    // Hub files land in a shared snapshot directory.
    let snapshot = last_file
        .and_then(|file| file.parent().map(Path::to_path_buf))
        .ok_or_else(|| RankerError::ModelLoadFailed {
            reason: format!("hub snapshot for '{model}' has no parent directory"),
        })?;

    Ok(snapshot)
}

fn ensure_model_files(dir: &Path) -> Result<(), RankerError> {
    if !dir.is_dir() {
        return Err(RankerError::ModelLoadFailed {
            reason: format!("model path is not a directory: {}", dir.display()),
        });
    }

    for file in MODEL_FILES {
        if !dir.join(file).exists() {
            return Err(RankerError::ModelLoadFailed {
                reason: format!("missing {file} in {}", dir.display()),
            });
        }
    }

    Ok(())
}

/// Loads a tokenizer configured for batched pair ranking: truncation at
/// `max_len` and padding to the longest sequence in each batch.
pub fn load_ranking_tokenizer(model_dir: &Path, max_len: usize) -> Result<Tokenizer, RankerError> {
    let tokenizer_path = model_dir.join("tokenizer.json");

    let mut tokenizer =
        Tokenizer::from_file(&tokenizer_path).map_err(|e| RankerError::ModelLoadFailed {
            reason: format!("failed to load tokenizer: {e}"),
        })?;

    let truncation = TruncationParams {
        max_length: max_len,
        ..Default::default()
    };
    tokenizer
        .with_truncation(Some(truncation))
        .map_err(|e| RankerError::ModelLoadFailed {
            reason: format!("failed to configure truncation: {e}"),
        })?;

    tokenizer.with_padding(Some(PaddingParams::default()));

    Ok(tokenizer)
}
