//! Address extraction.

use regex::Regex;

use super::labels::{find_labeled, trim_separators, LabelRule};
use super::patterns::{
    is_label_line, is_mrz_line, ADDRESS_AR, ADDRESS_FR, CIN_NUMBER, FATHER_AR, FATHER_FR,
    MOTHER_AR, MOTHER_FR, MOTHER_PREFIX_AR,
};
use super::ExtractionMatch;
use crate::card::{FieldExtractor, FieldMatch, MatchPolicy, Pass};
use crate::models::record::{CardSide, Field};
use crate::normalize::{NormalizedText, Script};

const AFTER_PARENTAGE: f32 = 0.45;

/// Lines joined below an "Adresse" label.
const MAX_LINES: usize = 2;

fn clean_address(value: &str) -> Option<String> {
    let cleaned = trim_separators(value)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let letters = cleaned.chars().filter(|c| c.is_alphabetic()).count();
    (letters >= 2 && cleaned.chars().count() >= 3).then_some(cleaned)
}

/// Address extractor.
pub struct AddressExtractor {
    policy: MatchPolicy,
}

impl AddressExtractor {
    pub fn new() -> Self {
        Self {
            policy: MatchPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: MatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn labeled(&self, text: &NormalizedText, label: &Regex, script: Script) -> Option<ExtractionMatch<String>> {
        let rule = LabelRule::new(label, script).with_max_lines(MAX_LINES);
        let candidates = find_labeled(text, &rule)
            .into_iter()
            .filter_map(|m| {
                let value = clean_address(&m.value)?;
                Some(ExtractionMatch { value, ..m })
            })
            .collect();
        self.policy.select(candidates)
    }

    /// First unlabelled line of `script` after the parentage block.
    fn after_parentage(&self, text: &NormalizedText, script: Script) -> Option<ExtractionMatch<String>> {
        let parentage = [&*FATHER_FR, &*MOTHER_FR, &*FATHER_AR, &*MOTHER_AR, &*MOTHER_PREFIX_AR];
        let last = text
            .lines()
            .iter()
            .rposition(|l| parentage.iter().any(|r| r.is_match(&l.text)))?;

        text.lines()[last + 1..]
            .iter()
            .filter(|l| l.script == script)
            .filter(|l| !is_label_line(&l.text) && !is_mrz_line(&l.text) && !CIN_NUMBER.is_match(&l.text))
            .find_map(|l| {
                clean_address(&l.text).map(|value| {
                    ExtractionMatch::new(value, AFTER_PARENTAGE * l.confidence, &l.text)
                        .with_position(l.index, 0)
                })
            })
    }

    fn extract_script(&self, text: &NormalizedText, side: CardSide, label: &Regex, script: Script) -> Option<ExtractionMatch<String>> {
        let labeled = self.labeled(text, label, script);
        if labeled.is_some() || side == CardSide::Front {
            return labeled;
        }
        self.after_parentage(text, script)
    }
}

impl Default for AddressExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for AddressExtractor {
    fn name(&self) -> &'static str {
        "address"
    }

    fn fields(&self) -> &'static [Field] {
        &[Field::AddressFr, Field::AddressAr]
    }

    fn extract(&self, text: &NormalizedText, side: CardSide) -> Vec<FieldMatch> {
        vec![
            FieldMatch::from_candidate(
                Field::AddressFr,
                self.extract_script(text, side, &ADDRESS_FR, Script::Latin),
                Pass::Front,
            ),
            FieldMatch::from_candidate(
                Field::AddressAr,
                self.extract_script(text, side, &ADDRESS_AR, Script::Arabic),
                Pass::Front,
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::rules::test_support::normalized;
    use pretty_assertions::assert_eq;

    fn addresses(text: &str) -> (Option<String>, Option<String>) {
        let mut matches = AddressExtractor::new().extract(&normalized(text), CardSide::Back);
        let ar = matches.remove(1).value;
        let fr = matches.remove(0).value;
        (fr, ar)
    }

    #[test]
    fn test_inline_addresses() {
        let (fr, ar) = addresses("Adresse: 12 RUE IBN SINA AGDAL RABAT\nالعنوان: 12 زنقة ابن سينا أكدال الرباط");
        assert_eq!(fr.as_deref(), Some("12 RUE IBN SINA AGDAL RABAT"));
        assert_eq!(ar.as_deref(), Some("12 زنقة ابن سينا أكدال الرباط"));
    }

    #[test]
    fn test_address_on_following_lines() {
        let (fr, _) = addresses("Adresse\n12 RUE IBN SINA\nAGDAL RABAT\nIDMARAB1234567<AB123456<<<<<<");
        assert_eq!(fr.as_deref(), Some("12 RUE IBN SINA, AGDAL RABAT"));
    }

    #[test]
    fn test_after_parentage_fallback() {
        let matches = AddressExtractor::new().extract(
            &normalized("Fils de MOHAMED\net de FATIMA\n12 RUE IBN SINA RABAT"),
            CardSide::Back,
        );
        assert_eq!(matches[0].value.as_deref(), Some("12 RUE IBN SINA RABAT"));
        assert_eq!(matches[0].confidence, AFTER_PARENTAGE);
    }

    #[test]
    fn test_no_fallback_on_front() {
        let matches = AddressExtractor::new().extract(
            &normalized("Fils de MOHAMED\n12 RUE IBN SINA RABAT"),
            CardSide::Front,
        );
        assert!(!matches[0].is_found());
    }
}
