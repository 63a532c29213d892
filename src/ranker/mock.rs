//! Mock scoring backend with seeded logits and call recording.

use parking_lot::Mutex;

use super::error::RankerError;

/// Stands in for the model + tokenizer during tests: returns pre-seeded
/// logits and records every (query, document) pair it was asked to score.
#[derive(Debug, Default)]
pub struct MockBackend {
    logits: Vec<f32>,
    recorded: Mutex<Vec<(String, String)>>,
}

impl MockBackend {
    /// Creates a backend that yields the given logits, one per pair, in order.
    pub fn with_logits(logits: Vec<f32>) -> Self {
        Self {
            logits,
            recorded: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn score_pairs(&self, pairs: &[(String, String)]) -> Result<Vec<f32>, RankerError> {
        self.recorded.lock().extend_from_slice(pairs);

        if pairs.len() != self.logits.len() {
            return Err(RankerError::InferenceFailed {
                reason: format!(
                    "mock backend seeded with {} logits but asked to score {} pairs",
                    self.logits.len(),
                    pairs.len()
                ),
            });
        }

        Ok(self.logits.clone())
    }

    /// All pairs scored so far, in call order.
    pub fn recorded_pairs(&self) -> Vec<(String, String)> {
        self.recorded.lock().clone()
    }
}
