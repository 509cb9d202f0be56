//! Session configuration, loaded from TOML.
//!
//! Every field has a default so a partial file (or none) is valid.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::preview::PreviewTiming;
use crate::request::{DEFAULT_DPI, DEFAULT_ORDER_TYPE};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid render endpoint: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Product variant the session customizes.
    pub variant_id: String,
    /// Real host substituted for the placeholder token in asset refs.
    pub asset_host: String,
    pub render_endpoint: String,
    /// Capability tag a font needs to be usable by the render pipeline.
    pub font_tag: String,
    /// Code prefix of customizable templates.
    pub template_prefix: String,
    /// Palette code applied when a template declares no colour.
    pub fallback_colour_code: String,
    pub default_order_type: String,
    pub dpi: u32,
    pub debounce_ms: u64,
    pub indicator_guard_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            variant_id: String::new(),
            asset_host: "https://assets.example.com".to_string(),
            render_endpoint: "https://render.example.com/api/render".to_string(),
            font_tag: "Embroidery".to_string(),
            template_prefix: "PZ".to_string(),
            fallback_colour_code: "1801".to_string(),
            default_order_type: DEFAULT_ORDER_TYPE.to_string(),
            dpi: DEFAULT_DPI,
            debounce_ms: 350,
            indicator_guard_ms: 10_000,
        }
    }
}

impl SessionConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.render_url()?;
        Ok(config)
    }

    pub fn render_url(&self) -> Result<Url, ConfigError> {
        Ok(Url::parse(&self.render_endpoint)?)
    }

    pub fn timing(&self) -> PreviewTiming {
        PreviewTiming {
            debounce: Duration::from_millis(self.debounce_ms),
            indicator_guard: Duration::from_millis(self.indicator_guard_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = SessionConfig::from_toml_str("variant_id = \"v1\"\ndpi = 150\n").unwrap();
        assert_eq!(config.variant_id, "v1");
        assert_eq!(config.dpi, 150);
        assert_eq!(config.font_tag, "Embroidery");
        assert_eq!(config.timing().debounce, Duration::from_millis(350));
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let err = SessionConfig::from_toml_str("render_endpoint = \"not a url\"").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl(_)));
    }

    #[test]
    fn test_load_round_trip() {
        let config = SessionConfig {
            variant_id: "v9".into(),
            ..SessionConfig::default()
        };
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(toml::to_string(&config).unwrap().as_bytes()).unwrap();
        assert_eq!(SessionConfig::load(file.path()).unwrap(), config);
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(
            SessionConfig::from_toml_str("dpi = \"many\""),
            Err(ConfigError::Parse(_))
        ));
    }
}
