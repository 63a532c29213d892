//! Sequence-classification model producing one relevance logit per pair.

use std::path::Path;

use candle_core::{DType, Device, IndexOp, Result, Tensor};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config};

struct CrossEncoderImpl {
    encoder: BertModel,
    classifier: Linear,
}

impl CrossEncoderImpl {
    fn load(vb: VarBuilder, config: &Config) -> Result<Self> {
        // Checkpoints prefix the encoder differently depending on export.
        let encoder = if vb.contains_tensor("bert.embeddings.word_embeddings.weight") {
            BertModel::load(vb.pp("bert"), config)?
        } else if vb.contains_tensor("roberta.embeddings.word_embeddings.weight") {
            BertModel::load(vb.pp("roberta"), config)?
        } else {
            BertModel::load(vb.clone(), config)?
        };

        let classifier = candle_nn::linear(config.hidden_size, 1, vb.pp("classifier"))?;

        Ok(Self {
            encoder,
            classifier,
        })
    }

    fn forward(
        &self,
        input_ids: &Tensor,
        token_type_ids: &Tensor,
        attention_mask: Option<&Tensor>,
    ) -> Result<Tensor> {
        let output = self
            .encoder
            .forward(input_ids, token_type_ids, attention_mask)?;
        // [CLS] token representation feeds the classification head.
        let cls_token = output.i((.., 0, ..))?;
        self.classifier.forward(&cls_token)
    }
}

/// A BERT (or RoBERTa) cross-encoder with a single-logit classification head.
#[derive(Clone)]
pub struct BertCrossEncoder(std::sync::Arc<CrossEncoderImpl>);

impl BertCrossEncoder {
    /// Loads the model from a directory containing `config.json` and
    /// `model.safetensors`, casting weights to `dtype`.
    pub fn load<P: AsRef<Path>>(model_dir: P, dtype: DType, device: &Device) -> Result<Self> {
        let model_dir = model_dir.as_ref();
        let config_path = model_dir.join("config.json");
        let weights_path = model_dir.join("model.safetensors");

        let config_content = std::fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_content)
            .map_err(|e| candle_core::Error::Msg(format!("Failed to parse config: {}", e)))?;

        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights_path], dtype, device)? };

        let model = CrossEncoderImpl::load(vb, &config)?;

        Ok(Self(std::sync::Arc::new(model)))
    }

    /// Scores a padded batch, returning one logit per row as `f32`.
    ///
    /// All three tensors are shaped `[batch, seq]`.
    pub fn forward_logits(
        &self,
        input_ids: &Tensor,
        token_type_ids: &Tensor,
        attention_mask: Option<&Tensor>,
    ) -> Result<Vec<f32>> {
        let logits = self
            .0
            .forward(input_ids, token_type_ids, attention_mask)?;
        // [batch, 1] -> [batch], upcast so callers see f32 regardless of dtype.
        logits.squeeze(1)?.to_dtype(DType::F32)?.to_vec1::<f32>()
    }
}
