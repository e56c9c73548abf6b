//! Merging of extractor outputs into one record.

use std::collections::BTreeMap;

use tracing::debug;

use super::{FieldMatch, Pass};
use crate::models::record::{is_canonical_cin, is_canonical_date, CardSide, CinRecord, Field};

/// Assembled record with per-field confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledRecord {
    pub record: CinRecord,
    pub field_confidence: BTreeMap<Field, f32>,
    pub warnings: Vec<String>,
}

/// Merges field matches into a [`CinRecord`].
#[derive(Debug, Clone, Default)]
pub struct RecordAssembler {
    min_confidence: f32,
}

/// Whether `candidate` should replace `current` for the same field.
fn outranks(candidate: &FieldMatch, current: &FieldMatch) -> bool {
    candidate.confidence > current.confidence
        || (candidate.confidence == current.confidence
            && candidate.pass == Pass::Front
            && current.pass == Pass::Back)
}

fn conforms(field: Field, value: &str) -> bool {
    match field {
        Field::CinNumber => is_canonical_cin(value),
        Field::DateOfBirth => is_canonical_date(value),
        _ => !value.trim().is_empty(),
    }
}

impl RecordAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop values whose confidence is below `min_confidence`.
    pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
        self.min_confidence = min_confidence.clamp(0.0, 1.0);
        self
    }

    /// Build the record for `side` from all extractor outputs.
    ///
    /// Per field the highest confidence wins; ties go to the printed zone,
    /// then to the earlier match. Fields that do not belong on `side` are
    /// dropped even when a value was found.
    pub fn assemble(&self, side: CardSide, matches: &[FieldMatch]) -> AssembledRecord {
        let mut best: BTreeMap<Field, &FieldMatch> = BTreeMap::new();

        for m in matches
            .iter()
            .filter(|m| m.is_found() && m.confidence >= self.min_confidence)
        {
            match best.get(&m.field) {
                Some(current) if !outranks(m, current) => {
                    if current.value != m.value {
                        debug!(
                            "Keeping {} = {:?} ({:.2}) over {:?} ({:.2})",
                            m.field, current.value, current.confidence, m.value, m.confidence
                        );
                    }
                }
                _ => {
                    best.insert(m.field, m);
                }
            }
        }

        let mut record = CinRecord::new(side);
        let mut field_confidence = BTreeMap::new();
        let mut warnings = Vec::new();

        for field in Field::ALL {
            let allowed = field.allowed_on(side);
            let Some(chosen) = best.get(&field) else {
                if allowed {
                    warnings.push(format!("Could not extract {}", field));
                }
                continue;
            };

            if !allowed {
                debug!("Dropping {} found on a {} card", field, side);
                continue;
            }

            let Some(value) = chosen.value.as_deref().filter(|v| conforms(field, v)) else {
                debug!("Dropping non-canonical {} = {:?}", field, chosen.value);
                warnings.push(format!("Could not extract {}", field));
                continue;
            };

            record.set(field, Some(value.to_string()));
            field_confidence.insert(field, chosen.confidence);
        }

        AssembledRecord {
            record,
            field_confidence,
            warnings,
        }
    }
}
