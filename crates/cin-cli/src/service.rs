//! Extraction service: OCR engine plus core pipeline, with engine fallback.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use cin_core::{CinConfig, CinError, CinPipeline, ExtractionResult, OcrError, RawOcrResult};

use crate::engines::{create_engine, resolve_kind, OcrEngine};

/// Runs OCR and the pipeline for one image.
///
/// When the primary engine fails, finds no text, or yields a mean field
/// confidence below the escalation threshold, the fallback engine (if any)
/// is tried once and the better of the two results is kept.
pub struct ExtractionService {
    primary: Arc<dyn OcrEngine>,
    fallback: Option<Arc<dyn OcrEngine>>,
    pipeline: Arc<CinPipeline>,
    escalation_threshold: f32,
}

impl ExtractionService {
    pub fn new(primary: Arc<dyn OcrEngine>, pipeline: CinPipeline) -> Self {
        Self {
            primary,
            fallback: None,
            pipeline: Arc::new(pipeline),
            escalation_threshold: 0.0,
        }
    }

    /// Build engines and pipeline from the configuration.
    pub fn from_config(config: &CinConfig) -> Result<Self, OcrError> {
        let primary = create_engine(config.ocr.engine, &config.ocr)?;

        let primary_kind = resolve_kind(config.ocr.engine, &config.ocr);
        let fallback = match config.ocr.fallback_engine {
            Some(kind) if resolve_kind(kind, &config.ocr) != primary_kind => match create_engine(kind, &config.ocr) {
                Ok(engine) => Some(engine),
                Err(e) => {
                    warn!("Fallback engine {:?} unavailable: {}", kind, e);
                    None
                }
            },
            _ => None,
        };

        let service = Self::new(primary, CinPipeline::from_config(&config.extraction))
            .with_escalation_threshold(config.ocr.escalation_threshold);
        Ok(match fallback {
            Some(engine) => service.with_fallback(engine),
            None => service,
        })
    }

    pub fn with_fallback(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.fallback = Some(engine);
        self
    }

    pub fn with_escalation_threshold(mut self, threshold: f32) -> Self {
        self.escalation_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Extract the record from an encoded image.
    pub async fn extract(&self, image: &[u8], deadline: Option<Instant>) -> Result<ExtractionResult, CinError> {
        let first = self.extract_with(&self.primary, image, deadline).await;

        let Some(fallback) = &self.fallback else {
            return first;
        };
        if !self.should_escalate(&first) {
            return first;
        }

        warn!(
            "Escalating from {} to {}: {}",
            self.primary.name(),
            fallback.name(),
            match &first {
                Ok(result) => format!("mean confidence {:.2}", result.mean_confidence()),
                Err(e) => e.to_string(),
            }
        );

        let second = self.extract_with(fallback, image, deadline).await;
        better(first, second)
    }

    async fn extract_with(
        &self,
        engine: &Arc<dyn OcrEngine>,
        image: &[u8],
        deadline: Option<Instant>,
    ) -> Result<ExtractionResult, CinError> {
        let start = Instant::now();
        let outcome = engine.recognize(image).await;
        info!("{} finished in {}ms", engine.name(), start.elapsed().as_millis());

        self.run_pipeline(outcome, deadline).await
    }

    async fn run_pipeline(
        &self,
        outcome: Result<RawOcrResult, OcrError>,
        deadline: Option<Instant>,
    ) -> Result<ExtractionResult, CinError> {
        let pipeline = Arc::clone(&self.pipeline);
        tokio::task::spawn_blocking(move || pipeline.run_ocr_outcome(outcome, deadline))
            .await
            .map_err(|e| CinError::Io(std::io::Error::other(e.to_string())))?
    }

    fn should_escalate(&self, result: &Result<ExtractionResult, CinError>) -> bool {
        match result {
            Ok(result) => result.mean_confidence() < self.escalation_threshold,
            Err(CinError::EmptyInput | CinError::UpstreamOcr(_)) => true,
            Err(_) => false,
        }
    }
}

/// Pick the better of two attempts; a success beats any failure, and the
/// first attempt wins ties.
fn better(
    first: Result<ExtractionResult, CinError>,
    second: Result<ExtractionResult, CinError>,
) -> Result<ExtractionResult, CinError> {
    match (first, second) {
        (Ok(a), Ok(b)) if b.mean_confidence() > a.mean_confidence() => Ok(b),
        (Ok(a), _) => Ok(a),
        (Err(_), Ok(b)) => Ok(b),
        (Err(a), Err(_)) => Err(a),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Engine returning a fixed outcome and counting its calls.
    pub(crate) struct StubEngine {
        name: &'static str,
        text: Option<&'static str>,
        pub(crate) calls: AtomicUsize,
    }

    impl StubEngine {
        pub(crate) fn text(name: &'static str, text: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                text: Some(text),
                calls: AtomicUsize::new(0),
            })
        }

        pub(crate) fn failing(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                text: None,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl OcrEngine for StubEngine {
        fn name(&self) -> &str {
            self.name
        }

        async fn recognize(&self, _image: &[u8]) -> Result<RawOcrResult, OcrError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.text {
                Some(text) => Ok(RawOcrResult::from_text(text)),
                None => Err(OcrError::engine(self.name, "service down")),
            }
        }
    }

    pub(crate) const FRONT: &str = "ROYAUME DU MAROC\nCARTE NATIONALE D'IDENTITE\nMOHAMED\nALAMI\nNé le 01.01.1990\nà CASABLANCA\nAB123456";

    #[tokio::test]
    async fn test_primary_success_skips_fallback() {
        let fallback = StubEngine::text("fallback", FRONT);
        let service = ExtractionService::new(StubEngine::text("primary", FRONT), CinPipeline::new())
            .with_fallback(fallback.clone());

        let result = service.extract(b"img", None).await.unwrap();
        assert_eq!(result.record.cin_number.as_deref(), Some("AB123456"));
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_upstream_failure_uses_fallback() {
        let service = ExtractionService::new(StubEngine::failing("primary"), CinPipeline::new())
            .with_fallback(StubEngine::text("fallback", FRONT));

        let result = service.extract(b"img", None).await.unwrap();
        assert_eq!(result.record.first_name_fr.as_deref(), Some("MOHAMED"));
    }

    #[tokio::test]
    async fn test_upstream_failure_without_fallback() {
        let service = ExtractionService::new(StubEngine::failing("primary"), CinPipeline::new());
        let result = service.extract(b"img", None).await;
        assert!(matches!(result, Err(CinError::UpstreamOcr(_))));
    }

    #[tokio::test]
    async fn test_low_confidence_escalates_and_keeps_better() {
        let fallback = StubEngine::text("fallback", FRONT);
        let service = ExtractionService::new(StubEngine::text("primary", "MOHAMED ALAMI\n01.01.1990"), CinPipeline::new())
            .with_fallback(fallback.clone())
            .with_escalation_threshold(0.9);

        let result = service.extract(b"img", None).await.unwrap();
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.record.cin_number.as_deref(), Some("AB123456"));
    }

    #[tokio::test]
    async fn test_both_failing_reports_first_error() {
        let service = ExtractionService::new(StubEngine::text("primary", "  "), CinPipeline::new())
            .with_fallback(StubEngine::failing("fallback"));

        let result = service.extract(b"img", None).await;
        assert!(matches!(result, Err(CinError::EmptyInput)));
    }
}
