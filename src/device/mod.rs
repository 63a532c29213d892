//! Device specifications, device maps, and compute-device resolution.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use candle_core::Device;
use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

#[cfg(any(feature = "metal", feature = "cuda"))]
use tracing::info;

#[cfg(not(any(feature = "metal", feature = "cuda")))]
use tracing::debug;

/// Errors raised while parsing or resolving device specifications.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The device string could not be parsed.
    #[error("invalid device specification '{value}'")]
    InvalidSpec { value: String },

    /// The device exists in the spec but cannot be initialized.
    #[error("{device} device unavailable: {reason}")]
    Unavailable { device: String, reason: String },
}

/// A single compute device, in the normalized `"<kind>[:ordinal]"` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DeviceSpec {
    Cpu,
    Cuda(usize),
    Metal(usize),
}

impl DeviceSpec {
    /// Resolves the spec to a candle device.
    pub fn to_candle(self) -> Result<Device, DeviceError> {
        match self {
            DeviceSpec::Cpu => Ok(Device::Cpu),
            DeviceSpec::Cuda(ordinal) => {
                Device::new_cuda(ordinal).map_err(|e| DeviceError::Unavailable {
                    device: format!("cuda:{ordinal}"),
                    reason: e.to_string(),
                })
            }
            DeviceSpec::Metal(ordinal) => {
                Device::new_metal(ordinal).map_err(|e| DeviceError::Unavailable {
                    device: format!("metal:{ordinal}"),
                    reason: e.to_string(),
                })
            }
        }
    }
}

impl fmt::Display for DeviceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceSpec::Cpu => write!(f, "cpu"),
            DeviceSpec::Cuda(ordinal) => write!(f, "cuda:{ordinal}"),
            DeviceSpec::Metal(ordinal) => write!(f, "metal:{ordinal}"),
        }
    }
}

impl FromStr for DeviceSpec {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DeviceError::InvalidSpec {
            value: s.to_string(),
        };

        let (kind, ordinal) = match s.split_once(':') {
            Some((kind, ordinal)) => {
                let ordinal: usize = ordinal.parse().map_err(|_| invalid())?;
                (kind, ordinal)
            }
            None => (s, 0),
        };

        match kind {
            "cpu" => Ok(DeviceSpec::Cpu),
            "cuda" => Ok(DeviceSpec::Cuda(ordinal)),
            // "mps" is a common alias for Apple GPU devices.
            "metal" | "mps" => Ok(DeviceSpec::Metal(ordinal)),
            _ => Err(invalid()),
        }
    }
}

impl Serialize for DeviceSpec {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DeviceSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            // Bare integers are CUDA ordinals, matching common device maps.
            Ordinal(usize),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Ordinal(ordinal) => Ok(DeviceSpec::Cuda(ordinal)),
            Repr::Text(text) => text.parse().map_err(de::Error::custom),
        }
    }
}

/// A model placement override: automatic, a single device, or a per-submodule map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceMapSpec {
    /// Let the loader decide.
    Auto,
    /// Place the whole model on one device.
    Single(DeviceSpec),
    /// Place named submodules on specific devices.
    Map(BTreeMap<String, DeviceSpec>),
}

impl DeviceMapSpec {
    /// Deterministic single-device view of the map.
    ///
    /// `Auto` has no concrete device; a submodule map resolves to its first
    /// entry in key order.
    pub fn first_device(&self) -> Option<DeviceSpec> {
        match self {
            DeviceMapSpec::Auto => None,
            DeviceMapSpec::Single(device) => Some(*device),
            DeviceMapSpec::Map(map) => map.values().next().copied(),
        }
    }
}

impl Serialize for DeviceMapSpec {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            DeviceMapSpec::Auto => serializer.serialize_str("auto"),
            DeviceMapSpec::Single(device) => device.serialize(serializer),
            DeviceMapSpec::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (module, device) in map {
                    out.serialize_entry(module, device)?;
                }
                out.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for DeviceMapSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Map(BTreeMap<String, DeviceSpec>),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Text(text) if text == "auto" => Ok(DeviceMapSpec::Auto),
            Repr::Text(text) => text
                .parse()
                .map(DeviceMapSpec::Single)
                .map_err(de::Error::custom),
            Repr::Map(map) => Ok(DeviceMapSpec::Map(map)),
        }
    }
}

/// Selects the compute device based on enabled features (falls back to CPU).
pub fn select_device() -> Result<Device, DeviceError> {
    #[cfg(any(feature = "metal", feature = "cuda"))]
    let mut failures: Vec<String> = Vec::new();

    #[cfg(not(any(feature = "metal", feature = "cuda")))]
    let failures: Vec<String> = Vec::new();

    #[cfg(feature = "metal")]
    {
        match Device::new_metal(0) {
            Ok(device) => {
                info!("Using Metal GPU acceleration");
                return Ok(device);
            }
            Err(e) => {
                let msg = e.to_string();
                if cfg!(feature = "cuda") {
                    warn!(error = %msg, "Metal device unavailable, trying CUDA");
                } else {
                    warn!(error = %msg, "Metal device unavailable");
                }
                failures.push(format!("metal failed: {msg}"));
            }
        }
    }

    #[cfg(feature = "cuda")]
    {
        match Device::new_cuda(0) {
            Ok(device) => {
                info!("Using CUDA GPU acceleration");
                return Ok(device);
            }
            Err(e) => {
                let msg = e.to_string();
                warn!(error = %msg, "CUDA device unavailable");
                failures.push(format!("cuda failed: {msg}"));
            }
        }
    }

    #[cfg(not(any(feature = "metal", feature = "cuda")))]
    {
        debug!("No GPU features enabled");
    }

    let reason = if !cfg!(any(feature = "metal", feature = "cuda")) {
        "no GPU backend compiled".to_string()
    } else if failures.is_empty() {
        "no GPU device available".to_string()
    } else {
        failures.join("; ")
    };

    warn!(reason = %reason, "Falling back to CPU device");
    Ok(Device::Cpu)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_device_specs() {
        assert_eq!("cpu".parse::<DeviceSpec>().unwrap(), DeviceSpec::Cpu);
        assert_eq!("cpu:0".parse::<DeviceSpec>().unwrap(), DeviceSpec::Cpu);
        assert_eq!("cuda".parse::<DeviceSpec>().unwrap(), DeviceSpec::Cuda(0));
        assert_eq!("cuda:1".parse::<DeviceSpec>().unwrap(), DeviceSpec::Cuda(1));
        assert_eq!(
            "metal:0".parse::<DeviceSpec>().unwrap(),
            DeviceSpec::Metal(0)
        );
        assert_eq!("mps".parse::<DeviceSpec>().unwrap(), DeviceSpec::Metal(0));
    }

    #[test]
    fn test_parse_rejects_unknown_devices() {
        assert!("tpu".parse::<DeviceSpec>().is_err());
        assert!("cuda:x".parse::<DeviceSpec>().is_err());
    }

    #[test]
    fn test_serialize_normalizes() {
        // "cpu:0" and "mps" normalize to their canonical names.
        let cpu: DeviceSpec = "cpu:0".parse().unwrap();
        assert_eq!(serde_json::to_value(cpu).unwrap(), "cpu");

        let metal: DeviceSpec = "mps".parse().unwrap();
        assert_eq!(serde_json::to_value(metal).unwrap(), "metal:0");
    }

    #[test]
    fn test_deserialize_integer_is_cuda_ordinal() {
        let device: DeviceSpec = serde_json::from_value(serde_json::json!(1)).unwrap();
        assert_eq!(device, DeviceSpec::Cuda(1));
    }

    #[test]
    fn test_device_map_serde_forms() {
        let auto: DeviceMapSpec = serde_json::from_value(serde_json::json!("auto")).unwrap();
        assert_eq!(auto, DeviceMapSpec::Auto);
        assert_eq!(serde_json::to_value(&auto).unwrap(), "auto");

        let single: DeviceMapSpec = serde_json::from_value(serde_json::json!("cuda:0")).unwrap();
        assert_eq!(single, DeviceMapSpec::Single(DeviceSpec::Cuda(0)));
        assert_eq!(serde_json::to_value(&single).unwrap(), "cuda:0");

        let map: DeviceMapSpec =
            serde_json::from_value(serde_json::json!({"layer_1": 1, "classifier": "cpu"})).unwrap();
        assert_eq!(
            serde_json::to_value(&map).unwrap(),
            serde_json::json!({"classifier": "cpu", "layer_1": "cuda:1"})
        );
    }

    #[test]
    fn test_first_device() {
        assert_eq!(DeviceMapSpec::Auto.first_device(), None);
        assert_eq!(
            DeviceMapSpec::Single(DeviceSpec::Cpu).first_device(),
            Some(DeviceSpec::Cpu)
        );

        let map: DeviceMapSpec =
            serde_json::from_value(serde_json::json!({"layer_1": 1, "classifier": "cpu"}))
                .unwrap();
        // First entry in key order.
        assert_eq!(map.first_device(), Some(DeviceSpec::Cpu));

        assert_eq!(DeviceMapSpec::Map(BTreeMap::new()).first_device(), None);
    }

    #[test]
    fn test_select_device_returns_a_device() {
        // Without GPU features this is always CPU; with them it may be GPU.
        assert!(select_device().is_ok());
    }

    #[test]
    fn test_cpu_spec_resolves() {
        let device = DeviceSpec::Cpu.to_candle().unwrap();
        assert!(matches!(device, Device::Cpu));
    }
}
