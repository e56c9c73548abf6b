//! OCR engine adapters.
//!
//! Engines turn image bytes into a [`RawOcrResult`]; everything after that
//! is the core pipeline's job.

mod tesseract;
mod vision;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use cin_core::{EngineKind, OcrConfig, OcrError, RawOcrResult};

pub use tesseract::TesseractEngine;
pub use vision::GoogleVisionEngine;

/// An OCR engine.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Engine name used in logs and errors.
    fn name(&self) -> &str;

    /// Recognize the text in an encoded image.
    async fn recognize(&self, image: &[u8]) -> Result<RawOcrResult, OcrError>;
}

/// Resolve `Auto` to a concrete engine.
pub fn resolve_kind(kind: EngineKind, config: &OcrConfig) -> EngineKind {
    match kind {
        EngineKind::Auto if config.google_vision.resolve_api_key().is_some() => EngineKind::GoogleVision,
        EngineKind::Auto => EngineKind::Tesseract,
        other => other,
    }
}

/// Create an engine of the given kind.
pub fn create_engine(kind: EngineKind, config: &OcrConfig) -> Result<Arc<dyn OcrEngine>, OcrError> {
    let kind = resolve_kind(kind, config);
    debug!("Using OCR engine {:?}", kind);

    match kind {
        EngineKind::GoogleVision => Ok(Arc::new(GoogleVisionEngine::new(config.google_vision.clone())?)),
        _ => Ok(Arc::new(TesseractEngine::new(config.tesseract.clone()))),
    }
}

/// Check that the bytes decode as an image and return its dimensions.
pub(crate) fn image_dimensions(image: &[u8]) -> Result<(u32, u32), OcrError> {
    let decoded = image::load_from_memory(image).map_err(|e| OcrError::InvalidImage(e.to_string()))?;
    Ok((decoded.width(), decoded.height()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cin_core::GoogleVisionConfig;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_auto_without_key_is_tesseract() {
        let config = OcrConfig {
            google_vision: GoogleVisionConfig {
                api_key: None,
                api_key_env: "CIN_TEST_UNSET_ENGINE_KEY".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(resolve_kind(EngineKind::Auto, &config), EngineKind::Tesseract);
        assert_eq!(resolve_kind(EngineKind::GoogleVision, &config), EngineKind::GoogleVision);
    }

    #[test]
    fn test_auto_with_key_is_google_vision() {
        let config = OcrConfig {
            google_vision: GoogleVisionConfig {
                api_key: Some("key".to_string()),
                api_key_env: "CIN_TEST_UNSET_ENGINE_KEY".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(resolve_kind(EngineKind::Auto, &config), EngineKind::GoogleVision);
    }

    #[test]
    fn test_invalid_image_bytes() {
        assert!(matches!(image_dimensions(b"not an image"), Err(OcrError::InvalidImage(_))));
    }
}
