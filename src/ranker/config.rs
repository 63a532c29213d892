//! Ranker configuration and its mapping (de)serialization.
//!
//! [`RankerConfig`] round-trips losslessly through a JSON mapping via
//! [`to_dict`](RankerConfig::to_dict) / [`from_dict`](RankerConfig::from_dict).
//! Non-primitive fields go through explicit codecs: dtypes as name strings,
//! device maps in their normalized form, tokens as secret references.

use std::env;

use candle_core::DType;
use serde::de::{self, Deserializer};
use serde::ser::{self, SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::auth::Secret;
use crate::constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_CALIBRATION_FACTOR, DEFAULT_EMBEDDING_SEPARATOR, DEFAULT_MODEL,
    DEFAULT_TOP_K, TOKEN_ENV_VARS,
};
use crate::device::{DeviceMapSpec, DeviceSpec};

use super::error::RankerError;

/// Component type name written into serialized mappings.
pub const COMPONENT_TYPE: &str = "crossrank.ranker.SimilarityRanker";

/// Dtype codec table: candle dtypes by serialized name.
const DTYPE_NAMES: [(DType, &str); 7] = [
    (DType::U8, "u8"),
    (DType::U32, "u32"),
    (DType::I64, "i64"),
    (DType::BF16, "bf16"),
    (DType::F16, "f16"),
    (DType::F32, "f32"),
    (DType::F64, "f64"),
];

fn dtype_name(dtype: DType) -> Option<&'static str> {
    DTYPE_NAMES
        .iter()
        .find(|(d, _)| *d == dtype)
        .map(|(_, name)| *name)
}

fn parse_dtype(name: &str) -> Option<DType> {
    DTYPE_NAMES
        .iter()
        .find(|(_, n)| *n == name)
        .map(|(d, _)| *d)
}

/// Model loading overrides.
///
/// `dtype` and `device_map` are typed and go through their codecs; anything
/// else rides along in `extra` as plain JSON.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelKwargs {
    /// Weight dtype override (e.g. f16 for half-precision inference).
    pub dtype: Option<DType>,

    /// Model placement override; takes precedence over the explicit device.
    pub device_map: Option<DeviceMapSpec>,

    /// Remaining overrides, passed through untyped.
    pub extra: Map<String, Value>,
}

impl ModelKwargs {
    /// Returns `true` if no override is set.
    pub fn is_empty(&self) -> bool {
        self.dtype.is_none() && self.device_map.is_none() && self.extra.is_empty()
    }
}

impl Serialize for ModelKwargs {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        for (key, value) in &self.extra {
            map.serialize_entry(key, value)?;
        }
        if let Some(dtype) = self.dtype {
            let name = dtype_name(dtype)
                .ok_or_else(|| ser::Error::custom(format!("unsupported dtype {dtype:?}")))?;
            map.serialize_entry("dtype", name)?;
        }
        if let Some(device_map) = &self.device_map {
            map.serialize_entry("device_map", device_map)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ModelKwargs {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut raw = Map::deserialize(deserializer)?;

        let dtype = match raw.remove("dtype") {
            None | Some(Value::Null) => None,
            Some(Value::String(name)) => Some(
                parse_dtype(&name)
                    .ok_or_else(|| de::Error::custom(format!("unknown dtype '{name}'")))?,
            ),
            Some(other) => {
                return Err(de::Error::custom(format!(
                    "dtype must be a string, got {other}"
                )));
            }
        };

        let device_map = match raw.remove("device_map") {
            None | Some(Value::Null) => None,
            Some(value) => Some(serde_json::from_value(value).map_err(de::Error::custom)?),
        };

        Ok(Self {
            dtype,
            device_map,
            extra: raw,
        })
    }
}

/// Tokenizer loading overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenizerKwargs {
    /// Truncation length override (defaults to [`MAX_SEQ_LEN`](crate::constants::MAX_SEQ_LEN)).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_max_length: Option<usize>,

    /// Remaining overrides, passed through untyped.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TokenizerKwargs {
    /// Returns `true` if no override is set.
    pub fn is_empty(&self) -> bool {
        self.model_max_length.is_none() && self.extra.is_empty()
    }
}

/// Cross-encoder ranker configuration.
///
/// Immutable once handed to the ranker. Missing keys in a serialized mapping
/// take these defaults; unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RankerConfig {
    /// Model identifier: hub repo id or local model directory.
    pub model: String,

    /// Explicit compute device. A configured `device_map` wins over this.
    pub device: Option<DeviceSpec>,

    /// Hub authentication token reference. Defaults to a non-strict lookup of
    /// `HF_API_TOKEN` / `HF_TOKEN`.
    pub token: Option<Secret>,

    /// Number of documents kept after ranking. Default: `10`.
    pub top_k: usize,

    /// Prepended verbatim to the query text.
    pub query_prefix: String,

    /// Prepended verbatim to each document text.
    pub document_prefix: String,

    /// Metadata fields embedded ahead of the document content, in order.
    pub meta_fields_to_embed: Vec<String>,

    /// Separator between embedded metadata values and content. Default: `"\n"`.
    pub embedding_separator: String,

    /// Apply a sigmoid to the logits. Default: `true`.
    pub scale_score: bool,

    /// Divisor applied to logits before the sigmoid. Default: `1.0`.
    pub calibration_factor: Option<f64>,

    /// Drop documents scoring at or below this value.
    pub score_threshold: Option<f32>,

    /// Model loading overrides.
    pub model_kwargs: ModelKwargs,

    /// Tokenizer loading overrides.
    pub tokenizer_kwargs: TokenizerKwargs,

    /// Pairs scored per forward pass. Default: `16`.
    pub batch_size: usize,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            device: None,
            token: Some(Secret::from_env_vars(TOKEN_ENV_VARS, false)),
            top_k: DEFAULT_TOP_K,
            query_prefix: String::new(),
            document_prefix: String::new(),
            meta_fields_to_embed: Vec::new(),
            embedding_separator: DEFAULT_EMBEDDING_SEPARATOR.to_string(),
            scale_score: true,
            calibration_factor: Some(DEFAULT_CALIBRATION_FACTOR),
            score_threshold: None,
            model_kwargs: ModelKwargs::default(),
            tokenizer_kwargs: TokenizerKwargs::default(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl RankerConfig {
    const ENV_MODEL: &'static str = "CROSSRANK_MODEL";
    const ENV_DEVICE: &'static str = "CROSSRANK_DEVICE";
    const ENV_TOP_K: &'static str = "CROSSRANK_TOP_K";
    const ENV_BATCH_SIZE: &'static str = "CROSSRANK_BATCH_SIZE";
    const ENV_SCORE_THRESHOLD: &'static str = "CROSSRANK_SCORE_THRESHOLD";
    const ENV_QUERY_PREFIX: &'static str = "CROSSRANK_QUERY_PREFIX";
    const ENV_DOCUMENT_PREFIX: &'static str = "CROSSRANK_DOCUMENT_PREFIX";

    /// Creates a configuration for the given model with defaults elsewhere.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_device(mut self, device: DeviceSpec) -> Self {
        self.device = Some(device);
        self
    }

    pub fn with_token(mut self, token: Option<Secret>) -> Self {
        self.token = token;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_query_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.query_prefix = prefix.into();
        self
    }

    pub fn with_document_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.document_prefix = prefix.into();
        self
    }

    pub fn with_meta_fields_to_embed<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.meta_fields_to_embed = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_embedding_separator(mut self, separator: impl Into<String>) -> Self {
        self.embedding_separator = separator.into();
        self
    }

    pub fn with_scale_score(mut self, scale_score: bool) -> Self {
        self.scale_score = scale_score;
        self
    }

    pub fn with_calibration_factor(mut self, factor: Option<f64>) -> Self {
        self.calibration_factor = factor;
        self
    }

    pub fn with_score_threshold(mut self, threshold: f32) -> Self {
        self.score_threshold = Some(threshold);
        self
    }

    pub fn with_model_kwargs(mut self, kwargs: ModelKwargs) -> Self {
        self.model_kwargs = kwargs;
        self
    }

    pub fn with_tokenizer_kwargs(mut self, kwargs: TokenizerKwargs) -> Self {
        self.tokenizer_kwargs = kwargs;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Checks internal invariants.
    pub fn validate(&self) -> Result<(), RankerError> {
        if self.top_k == 0 {
            return Err(RankerError::InvalidConfig {
                reason: "top_k must be at least 1".to_string(),
            });
        }

        if self.batch_size == 0 {
            return Err(RankerError::InvalidConfig {
                reason: "batch_size must be at least 1".to_string(),
            });
        }

        match self.calibration_factor {
            None if self.scale_score => {
                return Err(RankerError::InvalidConfig {
                    reason: "scale_score requires a calibration_factor".to_string(),
                });
            }
            Some(factor) if factor <= 0.0 => {
                return Err(RankerError::InvalidConfig {
                    reason: format!("calibration_factor must be positive, got {factor}"),
                });
            }
            _ => {}
        }

        Ok(())
    }

    /// Returns `true` if both an explicit device and a device map are set.
    pub(crate) fn has_device_conflict(&self) -> bool {
        self.device.is_some() && self.model_kwargs.device_map.is_some()
    }

    /// Single-device resolution order: device map first, then explicit device.
    pub(crate) fn resolved_device_spec(&self) -> Option<DeviceSpec> {
        self.model_kwargs
            .device_map
            .as_ref()
            .and_then(DeviceMapSpec::first_device)
            .or(self.device)
    }

    /// Serializes to the component mapping form.
    pub fn to_dict(&self) -> Result<Value, RankerError> {
        let params = serde_json::to_value(self).map_err(|e| RankerError::Serialization {
            reason: e.to_string(),
        })?;
        Ok(json!({
            "type": COMPONENT_TYPE,
            "init_parameters": params,
        }))
    }

    /// Rebuilds a configuration from the component mapping form.
    ///
    /// Missing init parameters take defaults; unknown keys and a wrong
    /// component type are errors.
    pub fn from_dict(data: &Value) -> Result<Self, RankerError> {
        let component_type =
            data.get("type")
                .and_then(Value::as_str)
                .ok_or_else(|| RankerError::Serialization {
                    reason: "missing component 'type' field".to_string(),
                })?;

        if component_type != COMPONENT_TYPE {
            return Err(RankerError::Serialization {
                reason: format!("unknown component type '{component_type}'"),
            });
        }

        let params = data
            .get("init_parameters")
            .cloned()
            .unwrap_or_else(|| json!({}));

        serde_json::from_value(params).map_err(|e| RankerError::Serialization {
            reason: e.to_string(),
        })
    }

    /// Loads configuration from `CROSSRANK_*` environment variables
    /// (falling back to defaults).
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let model = env::var(Self::ENV_MODEL)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.model);

        let device = env::var(Self::ENV_DEVICE)
            .ok()
            .and_then(|v| v.parse().ok());

        let top_k = env::var(Self::ENV_TOP_K)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.top_k);

        let batch_size = env::var(Self::ENV_BATCH_SIZE)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.batch_size);

        let score_threshold = env::var(Self::ENV_SCORE_THRESHOLD)
            .ok()
            .and_then(|v| v.parse().ok());

        let query_prefix = env::var(Self::ENV_QUERY_PREFIX).unwrap_or(defaults.query_prefix);
        let document_prefix =
            env::var(Self::ENV_DOCUMENT_PREFIX).unwrap_or(defaults.document_prefix);

        Self {
            model,
            device,
            top_k,
            batch_size,
            score_threshold,
            query_prefix,
            document_prefix,
            ..Default::default()
        }
    }
}
