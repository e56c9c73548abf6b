//! CIN number extraction.

use super::mrz::find_mrz;
use super::patterns::{is_mrz_line, CIN_LABEL, CIN_NUMBER};
use super::ExtractionMatch;
use crate::card::{FieldExtractor, FieldMatch, MatchPolicy, Pass};
use crate::models::record::{is_canonical_cin, CardSide, Field};
use crate::normalize::{NormalizedLine, NormalizedText};

const LABELED: f32 = 0.95;
const LAYOUT: f32 = 0.85;
const BARE: f32 = 0.7;
const FROM_MRZ: f32 = 0.6;

/// A visual-zone CIN candidate.
struct Candidate {
    found: ExtractionMatch<String>,
    labeled: bool,
    /// Higher towards the top-right corner of the card.
    layout_score: Option<f32>,
}

/// CIN number extractor.
///
/// In the printed zone a labelled number is preferred, then the number
/// closest to the top-right corner when geometry is known, then the match
/// policy. The MRZ number is reported as a separate back-zone match.
pub struct CinNumberExtractor {
    policy: MatchPolicy,
}

impl CinNumberExtractor {
    pub fn new() -> Self {
        Self {
            policy: MatchPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: MatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn candidates(&self, text: &NormalizedText) -> Vec<Candidate> {
        let mut results = Vec::new();
        let mut previous: Option<&NormalizedLine> = None;

        for line in text.lines() {
            if is_mrz_line(&line.text) {
                previous = Some(line);
                continue;
            }

            // A bare label on the line above also counts
            let label_above = previous
                .is_some_and(|p| CIN_LABEL.is_match(&p.text) && !CIN_NUMBER.is_match(&p.text));

            for caps in CIN_NUMBER.captures_iter(&line.text) {
                let value = format!("{}{}", caps[1].to_uppercase(), &caps[2]);
                let Some(full) = caps.get(0) else { continue };
                if !is_canonical_cin(&value) {
                    continue;
                }

                let labeled = label_above || CIN_LABEL.is_match(&line.text[..full.start()]);
                let layout_score = match (text.extent(), line.rect) {
                    (Some((width, height)), Some((x1, y1, x2, y2))) if width > 0.0 && height > 0.0 => {
                        let cx = (x1 + x2) / 2.0 / width;
                        let cy = (y1 + y2) / 2.0 / height;
                        Some(cx - cy)
                    }
                    _ => None,
                };

                results.push(Candidate {
                    found: ExtractionMatch::new(value, line.confidence, &line.text)
                        .with_position(line.index, full.start()),
                    labeled,
                    layout_score,
                });
            }

            previous = Some(line);
        }

        results
    }

    fn select_visual(&self, candidates: Vec<Candidate>) -> Option<ExtractionMatch<String>> {
        if candidates.iter().any(|c| c.labeled) {
            let labeled = candidates
                .into_iter()
                .filter(|c| c.labeled)
                .map(|c| c.found)
                .collect();
            return self.policy.select(labeled).map(|m| m.scaled(LABELED));
        }

        if !candidates.is_empty() && candidates.iter().all(|c| c.layout_score.is_some()) {
            let best = candidates.into_iter().fold(None::<Candidate>, |best, c| match best {
                Some(b) if b.layout_score >= c.layout_score => Some(b),
                _ => Some(c),
            });
            return best.map(|c| c.found.scaled(LAYOUT));
        }

        let all = candidates.into_iter().map(|c| c.found).collect();
        self.policy.select(all).map(|m| m.scaled(BARE))
    }
}

impl Default for CinNumberExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for CinNumberExtractor {
    fn name(&self) -> &'static str {
        "cin_number"
    }

    fn fields(&self) -> &'static [Field] {
        &[Field::CinNumber]
    }

    fn extract(&self, text: &NormalizedText, side: CardSide) -> Vec<FieldMatch> {
        let visual = self.select_visual(self.candidates(text));
        let mut matches = vec![FieldMatch::from_candidate(Field::CinNumber, visual, Pass::Front)];

        if side != CardSide::Front {
            if let Some(cin) = find_mrz(text).and_then(|mrz| mrz.cin_number) {
                matches.push(FieldMatch::found(Field::CinNumber, cin, FROM_MRZ, Pass::Back));
            }
        }

        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::rules::test_support::normalized;
    use crate::normalize::TextNormalizer;
    use crate::ocr::{RawOcrResult, TextBox};
    use pretty_assertions::assert_eq;

    fn visual(text: &str) -> FieldMatch {
        CinNumberExtractor::new()
            .extract(&normalized(text), CardSide::Front)
            .remove(0)
    }

    #[test]
    fn test_labeled_number_wins() {
        let m = visual("BE654321\nCIN: AB123456");
        assert_eq!(m.value.as_deref(), Some("AB123456"));
        assert_eq!(m.confidence, LABELED);
    }

    #[test]
    fn test_label_on_previous_line() {
        let m = visual("N°\nAB123456");
        assert_eq!(m.value.as_deref(), Some("AB123456"));
        assert_eq!(m.confidence, LABELED);
    }

    #[test]
    fn test_bare_number_uses_policy() {
        let text = normalized("BE654321 AB123456");
        let first = CinNumberExtractor::new().extract(&text, CardSide::Front);
        let last = CinNumberExtractor::new()
            .with_policy(MatchPolicy::LastInReadingOrder)
            .extract(&text, CardSide::Front);

        assert_eq!(first[0].value.as_deref(), Some("BE654321"));
        assert_eq!(first[0].confidence, BARE);
        assert_eq!(last[0].value.as_deref(), Some("AB123456"));
    }

    #[test]
    fn test_rejects_malformed_numbers() {
        assert!(!visual("ABC123456 A12345 1234567").is_found());
    }

    #[test]
    fn test_top_right_number_wins_with_geometry() {
        let raw = RawOcrResult::from_boxes(vec![
            TextBox::from_rect("BE654321", (20.0, 400.0, 200.0, 430.0), 1.0),
            TextBox::from_rect("AB123456", (600.0, 20.0, 780.0, 50.0), 1.0),
        ])
        .with_image_size(800, 500);
        let text = TextNormalizer::new().normalize(&raw).unwrap();
        let m = CinNumberExtractor::new().extract(&text, CardSide::Front).remove(0);

        assert_eq!(m.value.as_deref(), Some("AB123456"));
        assert_eq!(m.confidence, LAYOUT);
    }

    #[test]
    fn test_mrz_number_is_a_back_match() {
        let matches = CinNumberExtractor::new().extract(
            &normalized("IDMARAB1234567<AB123456<<<<<<"),
            CardSide::Back,
        );
        assert!(!matches[0].is_found());
        assert_eq!(matches[1].value.as_deref(), Some("AB123456"));
        assert_eq!(matches[1].pass, Pass::Back);
    }
}
