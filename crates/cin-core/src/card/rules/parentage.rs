//! Father and mother names, printed on the back.

use regex::Regex;

use super::labels::{clean_name, clean_names, find_labeled, LabelRule};
use super::patterns::{
    has_digit, is_label_line, is_mrz_line, FATHER_AR, FATHER_FR, MOTHER_AR, MOTHER_FR,
    MOTHER_PREFIX_AR,
};
use super::ExtractionMatch;
use crate::card::{FieldExtractor, FieldMatch, MatchPolicy, Pass};
use crate::models::record::{CardSide, Field};
use crate::normalize::{NormalizedText, Script};

const MOTHER_AFTER_FATHER: f32 = 0.85;
const ADJACENT: f32 = 0.5;

/// Arabic conjunction joining the father and mother on one line.
const AND: &str = " و ";

/// Parentage extractor.
///
/// "Fils de X et de Y" on the French side; "ابن X" followed by "و Y" on
/// the Arabic side. A parent found in one script only is looked up on the
/// neighbouring unlabelled line of the other script.
pub struct ParentageExtractor {
    policy: MatchPolicy,
}

impl ParentageExtractor {
    pub fn new() -> Self {
        Self {
            policy: MatchPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: MatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn labeled(&self, text: &NormalizedText, label: &Regex, script: Script) -> Vec<ExtractionMatch<String>> {
        clean_names(find_labeled(text, &LabelRule::new(label, script)))
    }

    fn arabic_fathers(&self, text: &NormalizedText) -> Vec<ExtractionMatch<String>> {
        let raw = find_labeled(text, &LabelRule::new(&FATHER_AR, Script::Arabic))
            .into_iter()
            .map(|m| {
                let father = m.value.split_once(AND).map(|(father, _)| father.to_string());
                match father {
                    Some(value) => ExtractionMatch { value, ..m },
                    None => m,
                }
            })
            .collect();
        clean_names(raw)
    }

    fn arabic_mothers(&self, text: &NormalizedText) -> Vec<ExtractionMatch<String>> {
        let mut results = self.labeled(text, &MOTHER_AR, Script::Arabic);

        for line in text.lines().iter().filter(|l| FATHER_AR.is_match(&l.text)) {
            let inline = line
                .text
                .split_once(AND)
                .and_then(|(_, mother)| clean_name(mother))
                .map(|value| {
                    ExtractionMatch::new(value, MOTHER_AFTER_FATHER * line.confidence, &line.text)
                        .with_position(line.index, 0)
                });
            let below = text.line(line.index + 1).and_then(|next| {
                MOTHER_PREFIX_AR
                    .captures(&next.text)
                    .and_then(|caps| clean_name(&caps[1]))
                    .map(|value| {
                        ExtractionMatch::new(value, MOTHER_AFTER_FATHER * next.confidence, &next.text)
                            .with_position(next.index, 0)
                    })
            });
            results.extend(inline.or(below));
        }

        results.sort_by_key(|m| m.position);
        results
    }

    /// Unlabelled line of `script` right below or above `anchor`.
    fn adjacent(
        &self,
        text: &NormalizedText,
        anchor: &ExtractionMatch<String>,
        script: Script,
        used: &[usize],
    ) -> Option<ExtractionMatch<String>> {
        let line = anchor.line()?;
        [Some(line + 1), line.checked_sub(1)]
            .into_iter()
            .flatten()
            .filter_map(|i| text.line(i))
            .filter(|l| l.script == script && !used.contains(&l.index))
            .filter(|l| !is_label_line(&l.text) && !is_mrz_line(&l.text) && !has_digit(&l.text))
            .find_map(|l| {
                clean_name(&l.text).map(|value| {
                    ExtractionMatch::new(value, ADJACENT * l.confidence, &l.text)
                        .with_position(l.index, 0)
                })
            })
    }
}

impl Default for ParentageExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for ParentageExtractor {
    fn name(&self) -> &'static str {
        "parentage"
    }

    fn fields(&self) -> &'static [Field] {
        &[
            Field::FatherNameFr,
            Field::FatherNameAr,
            Field::MotherNameFr,
            Field::MotherNameAr,
        ]
    }

    fn extract(&self, text: &NormalizedText, side: CardSide) -> Vec<FieldMatch> {
        let mut father_fr = self.policy.select(self.labeled(text, &FATHER_FR, Script::Latin));
        let mut father_ar = self.policy.select(self.arabic_fathers(text));
        let mut mother_fr = self.policy.select(self.labeled(text, &MOTHER_FR, Script::Latin));
        let mut mother_ar = self.policy.select(self.arabic_mothers(text));

        if side != CardSide::Front {
            let used: Vec<usize> = [&father_fr, &father_ar, &mother_fr, &mother_ar]
                .iter()
                .filter_map(|m| m.as_ref().and_then(|m| m.line()))
                .chain(
                    text.lines()
                        .iter()
                        .filter(|l| MOTHER_PREFIX_AR.is_match(&l.text))
                        .map(|l| l.index),
                )
                .collect();

            for (latin, arabic) in [(&mut father_fr, &mut father_ar), (&mut mother_fr, &mut mother_ar)] {
                match (latin.as_ref(), arabic.as_ref()) {
                    (Some(found), None) => *arabic = self.adjacent(text, found, Script::Arabic, &used),
                    (None, Some(found)) => *latin = self.adjacent(text, found, Script::Latin, &used),
                    _ => {}
                }
            }
        }

        vec![
            FieldMatch::from_candidate(Field::FatherNameFr, father_fr, Pass::Front),
            FieldMatch::from_candidate(Field::FatherNameAr, father_ar, Pass::Front),
            FieldMatch::from_candidate(Field::MotherNameFr, mother_fr, Pass::Front),
            FieldMatch::from_candidate(Field::MotherNameAr, mother_ar, Pass::Front),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::rules::test_support::normalized;
    use pretty_assertions::assert_eq;

    fn values(text: &str) -> Vec<Option<String>> {
        ParentageExtractor::new()
            .extract(&normalized(text), CardSide::Back)
            .into_iter()
            .map(|m| m.value)
            .collect()
    }

    fn some(s: &str) -> Option<String> {
        Some(s.to_string())
    }

    #[test]
    fn test_standard_back_layout() {
        let found = values("Fils de MOHAMED\net de FATIMA\nابن محمد\nو فاطمة\nAdresse: 12 RUE X CASABLANCA");
        assert_eq!(
            found,
            vec![some("MOHAMED"), some("محمد"), some("FATIMA"), some("فاطمة")]
        );
    }

    #[test]
    fn test_single_lines() {
        let found = values("Fils de AHMED et de KHADIJA\nابن أحمد و خديجة");
        assert_eq!(
            found,
            vec![some("AHMED"), some("أحمد"), some("KHADIJA"), some("خديجة")]
        );
    }

    #[test]
    fn test_adjacent_fallback() {
        let matches = ParentageExtractor::new().extract(&normalized("Fils de MOHAMED\nمحمد"), CardSide::Back);
        assert_eq!(matches[1].value.as_deref(), Some("محمد"));
        assert_eq!(matches[1].confidence, ADJACENT);
    }

    #[test]
    fn test_labeled_headers() {
        let found = values("Nom du père: HASSAN\nNom de la mère: AICHA");
        assert_eq!(found[0], some("HASSAN"));
        assert_eq!(found[2], some("AICHA"));
    }
}
