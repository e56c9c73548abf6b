//! Rule-based field extractors for identity cards.

pub mod address;
pub mod cin;
pub mod dates;
pub mod labels;
pub mod mrz;
pub mod names;
pub mod parentage;
pub mod patterns;
pub mod places;

pub use address::AddressExtractor;
pub use cin::CinNumberExtractor;
pub use dates::{find_date, BirthDateExtractor};
pub use mrz::{find_mrz, MrzData};
pub use names::NameExtractor;
pub use parentage::ParentageExtractor;
pub use places::BirthPlaceExtractor;

use super::{FieldExtractor, MatchPolicy};

/// A candidate value with its confidence and location.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionMatch<T> {
    /// Extracted value.
    pub value: T,
    /// Confidence score (0.0 - 1.0).
    pub confidence: f32,
    /// Line index and byte offset in that line.
    pub position: Option<(usize, usize)>,
    /// Source text that was matched.
    pub source: String,
}

impl<T> ExtractionMatch<T> {
    pub fn new(value: T, confidence: f32, source: impl Into<String>) -> Self {
        Self {
            value,
            confidence,
            position: None,
            source: source.into(),
        }
    }

    pub fn with_position(mut self, line: usize, offset: usize) -> Self {
        self.position = Some((line, offset));
        self
    }

    /// Line index of the match, if known.
    pub fn line(&self) -> Option<usize> {
        self.position.map(|(line, _)| line)
    }

    /// Transform the value, keeping confidence and location.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ExtractionMatch<U> {
        ExtractionMatch {
            value: f(self.value),
            confidence: self.confidence,
            position: self.position,
            source: self.source,
        }
    }

    /// Scale the confidence by `factor`.
    pub fn scaled(mut self, factor: f32) -> Self {
        self.confidence = (self.confidence * factor).clamp(0.0, 1.0);
        self
    }
}

/// The standard set of extractors, one per field category.
pub fn default_extractors(policy: MatchPolicy) -> Vec<Box<dyn FieldExtractor>> {
    vec![
        Box::new(CinNumberExtractor::new().with_policy(policy)),
        Box::new(NameExtractor::new().with_policy(policy)),
        Box::new(BirthDateExtractor::new().with_policy(policy)),
        Box::new(BirthPlaceExtractor::new().with_policy(policy)),
        Box::new(ParentageExtractor::new().with_policy(policy)),
        Box::new(AddressExtractor::new().with_policy(policy)),
    ]
}
