use thiserror::Error;

use crate::auth::SecretError;
use crate::device::DeviceError;

#[derive(Debug, Error)]
pub enum RankerError {
    #[error("invalid ranker configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("ranker model not found: {model}")]
    ModelNotFound { model: String },

    #[error("failed to load ranker model: {reason}")]
    ModelLoadFailed { reason: String },

    #[error("{device} device unavailable: {reason}")]
    DeviceUnavailable { device: String, reason: String },

    #[error("tokenization failed: {reason}")]
    TokenizationFailed { reason: String },

    #[error("ranker inference failed: {reason}")]
    InferenceFailed { reason: String },

    #[error("ranker has not been warmed up; call warm_up() before run()")]
    NotWarmedUp,

    #[error("configuration serialization failed: {reason}")]
    Serialization { reason: String },
}

impl From<candle_core::Error> for RankerError {
    fn from(err: candle_core::Error) -> Self {
        RankerError::InferenceFailed {
            reason: err.to_string(),
        }
    }
}

impl From<std::io::Error> for RankerError {
    fn from(err: std::io::Error) -> Self {
        RankerError::ModelLoadFailed {
            reason: err.to_string(),
        }
    }
}

impl From<DeviceError> for RankerError {
    fn from(err: DeviceError) -> Self {
        match err {
            DeviceError::Unavailable { device, reason } => {
                RankerError::DeviceUnavailable { device, reason }
            }
            DeviceError::InvalidSpec { value } => RankerError::InvalidConfig {
                reason: format!("invalid device specification '{value}'"),
            },
        }
    }
}

impl From<SecretError> for RankerError {
    fn from(err: SecretError) -> Self {
        RankerError::InvalidConfig {
            reason: err.to_string(),
        }
    }
}
