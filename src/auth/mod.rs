//! Secret references for hub authentication.
//!
//! A [`Secret`] names where a token comes from instead of carrying it around
//! in plain sight. Environment-variable references serialize to a structured
//! mapping; raw tokens refuse serialization outright and redact their value
//! in debug output.

use std::env;

use serde::de::{self, Deserializer};
use serde::ser::{self, SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while resolving or serializing secrets.
#[derive(Debug, Error)]
pub enum SecretError {
    /// A strict env-var secret found none of its variables set.
    #[error("none of the environment variables {env_vars:?} are set")]
    MissingEnvVars { env_vars: Vec<String> },

    /// Raw token secrets must never be written out.
    #[error("refusing to serialize a raw token secret")]
    RawTokenSerialization,
}

/// A reference to an authentication token.
#[derive(Clone, PartialEq, Eq)]
pub enum Secret {
    /// Look the token up in the first set variable of `env_vars`.
    ///
    /// `strict` turns "none set" into an error instead of `None`.
    EnvVar { env_vars: Vec<String>, strict: bool },

    /// A raw token value. Resolvable, never serializable.
    Token(String),
}

impl Secret {
    /// Creates a non-strict env-var secret over the given variables.
    pub fn from_env_vars<I, S>(env_vars: I, strict: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::EnvVar {
            env_vars: env_vars.into_iter().map(Into::into).collect(),
            strict,
        }
    }

    /// Wraps a raw token value.
    pub fn from_token(token: impl Into<String>) -> Self {
        Self::Token(token.into())
    }

    /// Resolves the secret to a token value.
    ///
    /// Env-var secrets return the first set variable, `Ok(None)` when unset
    /// and non-strict, and [`SecretError::MissingEnvVars`] when unset and
    /// strict.
    pub fn resolve(&self) -> Result<Option<String>, SecretError> {
        match self {
            Secret::EnvVar { env_vars, strict } => {
                for var in env_vars {
                    if let Ok(value) = env::var(var) {
                        return Ok(Some(value));
                    }
                }
                if *strict {
                    Err(SecretError::MissingEnvVars {
                        env_vars: env_vars.clone(),
                    })
                } else {
                    Ok(None)
                }
            }
            Secret::Token(token) => Ok(Some(token.clone())),
        }
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Secret::EnvVar { env_vars, strict } => f
                .debug_struct("EnvVar")
                .field("env_vars", env_vars)
                .field("strict", strict)
                .finish(),
            Secret::Token(_) => f.debug_tuple("Token").field(&"<redacted>").finish(),
        }
    }
}

impl Serialize for Secret {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Secret::EnvVar { env_vars, strict } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("type", "env_var")?;
                map.serialize_entry("env_vars", env_vars)?;
                map.serialize_entry("strict", strict)?;
                map.end()
            }
            Secret::Token(_) => Err(ser::Error::custom(SecretError::RawTokenSerialization)),
        }
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct Repr {
            r#type: String,
            #[serde(default)]
            env_vars: Vec<String>,
            #[serde(default)]
            strict: bool,
        }

        let repr = Repr::deserialize(deserializer)?;
        if repr.r#type != "env_var" {
            return Err(de::Error::custom(format!(
                "unsupported secret type '{}'",
                repr.r#type
            )));
        }
        Ok(Secret::EnvVar {
            env_vars: repr.env_vars,
            strict: repr.strict,
        })
    }
}
