//! Configuration structures for the extraction service.

use serde::{Deserialize, Serialize};

use crate::card::MatchPolicy;

/// Main configuration for the cin service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CinConfig {
    /// OCR engine configuration (boundary layer only).
    pub ocr: OcrConfig,

    /// Field extraction configuration (core pipeline).
    pub extraction: ExtractionConfig,

    /// HTTP server configuration.
    pub server: ServerConfig,
}

/// Which OCR engine to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// Google Cloud Vision when an API key is available, Tesseract otherwise.
    #[default]
    Auto,
    /// Local `tesseract` binary.
    Tesseract,
    /// Google Cloud Vision REST API.
    GoogleVision,
}

/// OCR engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Primary engine.
    pub engine: EngineKind,

    /// Engine tried once when the primary fails or scores too low.
    pub fallback_engine: Option<EngineKind>,

    /// Mean field confidence below which the fallback engine is tried (0.0 - 1.0).
    pub escalation_threshold: f32,

    /// Tesseract settings.
    pub tesseract: TesseractConfig,

    /// Google Cloud Vision settings.
    pub google_vision: GoogleVisionConfig,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::Auto,
            fallback_engine: None,
            escalation_threshold: 0.4,
            tesseract: TesseractConfig::default(),
            google_vision: GoogleVisionConfig::default(),
        }
    }
}

/// Tesseract CLI settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TesseractConfig {
    /// Path or name of the `tesseract` binary.
    pub binary: String,

    /// Language packs, joined with `+` on the command line.
    pub languages: Vec<String>,

    /// Page segmentation mode (`--psm`).
    pub page_segmentation_mode: Option<u8>,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            binary: "tesseract".to_string(),
            languages: vec!["fra".to_string(), "ara".to_string(), "eng".to_string()],
            page_segmentation_mode: None,
        }
    }
}

/// Google Cloud Vision settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleVisionConfig {
    /// API base URL.
    pub endpoint: String,

    /// API key. The environment variable named by `api_key_env` wins.
    pub api_key: Option<String>,

    /// Environment variable holding the API key.
    pub api_key_env: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for GoogleVisionConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://vision.googleapis.com".to_string(),
            api_key: None,
            api_key_env: "GOOGLE_VISION_API_KEY".to_string(),
            timeout_secs: 30,
        }
    }
}

impl GoogleVisionConfig {
    /// Resolve the API key from the environment, then the config file.
    pub fn resolve_api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.api_key.clone().filter(|k| !k.trim().is_empty()))
    }
}

/// Field extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Rule for choosing among several candidates for one field.
    pub match_policy: MatchPolicy,

    /// Minimum confidence to keep an extracted field.
    pub min_field_confidence: f32,

    /// Run field extractors on scoped threads.
    pub parallel: bool,

    /// Repair common OCR substitutions inside numbers and dates.
    pub ocr_corrections: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            match_policy: MatchPolicy::default(),
            min_field_confidence: 0.0,
            parallel: false,
            ocr_corrections: true,
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address.
    pub bind: String,

    /// Maximum accepted upload size in bytes.
    pub max_upload_bytes: usize,

    /// Per-request time limit in seconds (0 = unlimited).
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
            max_upload_bytes: 10 * 1024 * 1024,
            timeout_secs: 30,
        }
    }
}

impl CinConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: CinConfig =
            serde_json::from_str(r#"{"ocr": {"engine": "tesseract"}, "extraction": {"parallel": true}}"#)
                .unwrap();

        assert_eq!(config.ocr.engine, EngineKind::Tesseract);
        assert_eq!(config.ocr.tesseract.binary, "tesseract");
        assert!(config.extraction.parallel);
        assert!(config.extraction.ocr_corrections);
        assert_eq!(config.server.bind, "0.0.0.0:8000");
    }

    #[test]
    fn test_config_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = CinConfig::default();
        config.ocr.fallback_engine = Some(EngineKind::GoogleVision);
        config.extraction.match_policy = MatchPolicy::HighestConfidence;
        config.save(&path).unwrap();

        let loaded = CinConfig::from_file(&path).unwrap();
        assert_eq!(loaded.ocr.fallback_engine, Some(EngineKind::GoogleVision));
        assert_eq!(loaded.extraction.match_policy, MatchPolicy::HighestConfidence);
    }

    #[test]
    fn test_api_key_from_config_when_env_missing() {
        let config = GoogleVisionConfig {
            api_key: Some("key-123".to_string()),
            api_key_env: "CIN_TEST_UNSET_VISION_KEY".to_string(),
            ..Default::default()
        };
        assert_eq!(config.resolve_api_key().as_deref(), Some("key-123"));
    }
}
