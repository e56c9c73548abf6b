//! Pipeline orchestration: normalize, classify, extract, assemble.

use std::fmt;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::assembler::RecordAssembler;
use super::rules::default_extractors;
use super::side::SideClassifier;
use super::{FieldExtractor, FieldMatch, MatchPolicy};
use crate::error::{CinError, OcrError, Result};
use crate::models::config::ExtractionConfig;
use crate::models::record::{CardSide, ExtractionResult};
use crate::normalize::{NormalizedText, TextNormalizer};
use crate::ocr::RawOcrResult;

/// Stage of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Received,
    Normalized,
    SideResolved,
    FieldsExtracted,
    /// Terminal success.
    Assembled,
    /// Terminal failure.
    Failed,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Received => "RECEIVED",
            PipelineStage::Normalized => "NORMALIZED",
            PipelineStage::SideResolved => "SIDE_RESOLVED",
            PipelineStage::FieldsExtracted => "FIELDS_EXTRACTED",
            PipelineStage::Assembled => "ASSEMBLED",
            PipelineStage::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStage::Assembled | PipelineStage::Failed)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage tracker for one run.
struct Run {
    stage: PipelineStage,
}

impl Run {
    fn start() -> Self {
        Self {
            stage: PipelineStage::Received,
        }
    }

    fn advance(&mut self, next: PipelineStage) {
        debug_assert!(!self.stage.is_terminal(), "run already finished");
        debug!("Pipeline {} -> {}", self.stage, next);
        self.stage = next;
    }

    fn fail(&mut self, error: CinError) -> CinError {
        warn!("Pipeline failed at {}: {}", self.stage, error);
        self.advance(PipelineStage::Failed);
        error
    }
}

/// CIN extraction pipeline.
///
/// Stateless between runs: the same OCR result always yields the same
/// record. Only unusable input fails a run; missing fields come back as
/// `None` in a successful result.
pub struct CinPipeline {
    normalizer: TextNormalizer,
    classifier: SideClassifier,
    extractors: Vec<Box<dyn FieldExtractor>>,
    assembler: RecordAssembler,
    parallel: bool,
}

impl CinPipeline {
    /// Create a pipeline with default settings.
    pub fn new() -> Self {
        Self {
            normalizer: TextNormalizer::new(),
            classifier: SideClassifier::new(),
            extractors: default_extractors(MatchPolicy::default()),
            assembler: RecordAssembler::new(),
            parallel: false,
        }
    }

    /// Create a pipeline from the extraction section of the configuration.
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new()
            .with_match_policy(config.match_policy)
            .with_min_confidence(config.min_field_confidence)
            .with_parallel(config.parallel)
            .with_ocr_corrections(config.ocr_corrections)
    }

    /// Set the rule for choosing among several candidates.
    pub fn with_match_policy(mut self, policy: MatchPolicy) -> Self {
        self.extractors = default_extractors(policy);
        self
    }

    /// Set minimum confidence threshold.
    pub fn with_min_confidence(mut self, confidence: f32) -> Self {
        self.assembler = self.assembler.with_min_confidence(confidence);
        self
    }

    /// Run extractors on scoped threads.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set repair of OCR substitutions in numbers and dates.
    pub fn with_ocr_corrections(mut self, enabled: bool) -> Self {
        self.normalizer = self.normalizer.with_ocr_corrections(enabled);
        self
    }

    /// Run the pipeline on one OCR result.
    pub fn run(&self, raw: &RawOcrResult) -> Result<ExtractionResult> {
        self.run_from(raw, Run::start())
    }

    fn run_from(&self, raw: &RawOcrResult, mut run: Run) -> Result<ExtractionResult> {
        let start = Instant::now();

        info!("Extracting CIN fields from {} characters of OCR text", raw.text.len());

        let text = self.normalizer.normalize(raw).map_err(|e| run.fail(e))?;
        run.advance(PipelineStage::Normalized);

        let decision = self.classifier.classify(&text);
        run.advance(PipelineStage::SideResolved);

        let matches = self.extract_fields(&text, decision.side);
        run.advance(PipelineStage::FieldsExtracted);

        let assembled = self.assembler.assemble(decision.side, &matches);
        run.advance(PipelineStage::Assembled);

        let processing_time_ms = start.elapsed().as_millis() as u64;
        info!(
            "Extracted {} fields from {} side in {}ms",
            assembled.field_confidence.len(),
            decision.side,
            processing_time_ms
        );

        Ok(ExtractionResult {
            record: assembled.record,
            side_confidence: decision.confidence,
            field_confidence: assembled.field_confidence,
            warnings: assembled.warnings,
            processing_time_ms,
        })
    }

    /// Run the pipeline on the outcome of an OCR call.
    ///
    /// An OCR failure is passed through unchanged. The deadline is checked
    /// once, right after the OCR call returned and before any work starts.
    pub fn run_ocr_outcome(
        &self,
        outcome: std::result::Result<RawOcrResult, OcrError>,
        deadline: Option<Instant>,
    ) -> Result<ExtractionResult> {
        let mut run = Run::start();

        let raw = outcome.map_err(|e| run.fail(CinError::UpstreamOcr(e)))?;
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(run.fail(CinError::Cancelled));
        }

        self.run_from(&raw, run)
    }

    fn extract_fields(&self, text: &NormalizedText, side: CardSide) -> Vec<FieldMatch> {
        let per_extractor: Vec<Vec<FieldMatch>> = if self.parallel {
            std::thread::scope(|scope| {
                let handles: Vec<_> = self
                    .extractors
                    .iter()
                    .map(|extractor| (extractor.name(), scope.spawn(move || extractor.extract(text, side))))
                    .collect();

                handles
                    .into_iter()
                    .map(|(name, handle)| {
                        handle.join().unwrap_or_else(|_| {
                            warn!("Extractor {} panicked; its fields are left empty", name);
                            Vec::new()
                        })
                    })
                    .collect()
            })
        } else {
            self.extractors
                .iter()
                .map(|extractor| extractor.extract(text, side))
                .collect()
        };

        self.extractors
            .iter()
            .zip(per_extractor)
            .flat_map(|(extractor, matches)| {
                let matches = owned_matches(extractor.as_ref(), matches);
                debug!(
                    "Extractor {} found {} of {} candidates",
                    extractor.name(),
                    matches.iter().filter(|m| m.is_found()).count(),
                    matches.len()
                );
                matches
            })
            .collect()
    }
}

/// Restrict `matches` to the fields `extractor` owns, adding a "not found"
/// entry for every owned field it did not report.
fn owned_matches(extractor: &dyn FieldExtractor, mut matches: Vec<FieldMatch>) -> Vec<FieldMatch> {
    let owned = extractor.fields();
    matches.retain(|m| {
        let keep = owned.contains(&m.field);
        if !keep {
            warn!("Extractor {} reported {}, which it does not own", extractor.name(), m.field);
        }
        keep
    });
    for field in owned {
        if !matches.iter().any(|m| m.field == *field) {
            matches.push(FieldMatch::not_found(*field));
        }
    }
    matches
}

impl Default for CinPipeline {
    fn default() -> Self {
        Self::new()
    }
}
