//! Bridge settings

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable holding a JSON-encoded [`BridgeConfig`].
pub const CONFIG_ENV: &str = "TETHER_BRIDGE_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid bridge config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("string class must be a non-empty binary name")]
    EmptyStringClass,

    #[error("charset must be a non-empty name")]
    EmptyCharset,
}

/// JVM bridge settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Class whose `<init>([BLjava/nio/charset/Charset;)V` and
    /// `getBytes(Ljava/nio/charset/Charset;)[B` are cached.
    pub string_class: String,
    /// Charset name passed to `Charset.forName` for both directions. UTF-8
    /// replaces malformed input; `ISO-8859-1` round-trips any byte sequence.
    pub charset: String,
    /// Ask the JVM to print drained exceptions before clearing them. When
    /// off, the exception's `toString()` is logged instead.
    pub describe_exceptions: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            string_class: "java/lang/String".to_string(),
            charset: "UTF-8".to_string(),
            describe_exceptions: true,
        }
    }
}

impl BridgeConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads [`CONFIG_ENV`], falling back to defaults when it is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var(CONFIG_ENV) {
            Ok(json) => Self::from_json(&json),
            Err(_) => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.string_class.trim().is_empty() {
            return Err(ConfigError::EmptyStringClass);
        }
        if self.charset.trim().is_empty() {
            return Err(ConfigError::EmptyCharset);
        }
        Ok(())
    }
}
