//! Identity card field extraction.

mod assembler;
mod pipeline;
pub mod rules;
pub mod side;

pub use assembler::{AssembledRecord, RecordAssembler};
pub use pipeline::{CinPipeline, PipelineStage};
pub use side::{SideClassifier, SideDecision};

use serde::{Deserialize, Serialize};

use crate::models::record::{CardSide, Field};
use crate::normalize::NormalizedText;

use self::rules::ExtractionMatch;

/// Zone of the card that produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pass {
    /// Printed, human-readable text.
    Front,
    /// Machine-readable zone on the back.
    Back,
}

/// One extractor output for one field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMatch {
    pub field: Field,
    /// `None` means "not found".
    pub value: Option<String>,
    /// Confidence (0.0 - 1.0); 0 when not found.
    pub confidence: f32,
    pub pass: Pass,
}

impl FieldMatch {
    pub fn found(field: Field, value: impl Into<String>, confidence: f32, pass: Pass) -> Self {
        Self {
            field,
            value: Some(value.into()),
            confidence: confidence.clamp(0.0, 1.0),
            pass,
        }
    }

    pub fn not_found(field: Field) -> Self {
        Self {
            field,
            value: None,
            confidence: 0.0,
            pass: Pass::Front,
        }
    }

    /// Build from an optional candidate, falling back to "not found".
    pub fn from_candidate(field: Field, candidate: Option<ExtractionMatch<String>>, pass: Pass) -> Self {
        match candidate {
            Some(m) => Self::found(field, m.value, m.confidence, pass),
            None => Self::not_found(field),
        }
    }

    pub fn is_found(&self) -> bool {
        self.value.is_some()
    }
}

/// A field-category extraction strategy.
///
/// Implementations are pure: they read the normalized text and the side
/// hint and hold no mutable state, so they may run in any order or in
/// parallel. Every field listed by [`fields`](Self::fields) gets at least one
/// [`FieldMatch`] per call, possibly "not found".
pub trait FieldExtractor: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Fields this extractor owns.
    fn fields(&self) -> &'static [Field];

    /// Extract the owned fields.
    fn extract(&self, text: &NormalizedText, side: CardSide) -> Vec<FieldMatch>;
}

/// How to choose among several candidates for one field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// First candidate in reading order.
    #[default]
    FirstInReadingOrder,
    /// Last candidate in reading order.
    LastInReadingOrder,
    /// Highest confidence; ties go to the earlier candidate.
    HighestConfidence,
}

impl MatchPolicy {
    /// Pick one candidate. Candidates must be in reading order.
    pub fn select<T>(&self, candidates: Vec<ExtractionMatch<T>>) -> Option<ExtractionMatch<T>> {
        match self {
            MatchPolicy::FirstInReadingOrder => candidates.into_iter().next(),
            MatchPolicy::LastInReadingOrder => candidates.into_iter().last(),
            MatchPolicy::HighestConfidence => candidates.into_iter().fold(None, |best, m| match best {
                Some(b) if b.confidence >= m.confidence => Some(b),
                _ => Some(m),
            }),
        }
    }
}
