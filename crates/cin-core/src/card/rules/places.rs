//! Places of birth in French and Arabic.

use regex::Regex;

use super::dates::find_date;
use super::labels::{find_labeled, script_run, text_in_script, trim_separators, LabelRule};
use super::patterns::{
    has_digit, is_label_line, is_mrz_line, BIRTH_LABEL_AR, BIRTH_LABEL_FR, PLACE_LABEL_AR,
    PLACE_LABEL_FR, PLACE_PREFIX_FR,
};
use super::ExtractionMatch;
use crate::card::{FieldExtractor, FieldMatch, MatchPolicy, Pass};
use crate::models::record::{CardSide, Field};
use crate::normalize::{NormalizedLine, NormalizedText, Script};

const AFTER_BIRTH_DATE: f32 = 0.9;
const BELOW_BIRTH_LINE: f32 = 0.85;
const UNLABELED: f32 = 0.5;

/// Lines read below the birth line when looking for the place.
const LOOKAHEAD: usize = 2;

/// Collapse whitespace and keep only place characters; at least two letters.
fn clean_place(value: &str) -> Option<String> {
    let cleaned = trim_separators(value)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let valid = !has_digit(&cleaned)
        && cleaned
            .chars()
            .all(|c| c.is_alphabetic() || matches!(c, ' ' | '-' | '\'' | '.' | '\u{064B}'..='\u{065F}'));
    let letters = cleaned.chars().filter(|c| c.is_alphabetic()).count();
    (valid && letters >= 2).then_some(cleaned)
}

/// Strip the Arabic "ب" (in, at) that introduces a place: "ب فاس",
/// "بالدار البيضاء", "ببني ملال". `None` when the text has no such prefix.
fn strip_arabic_prefix(text: &str) -> Option<&str> {
    let text = text.trim();
    if let Some(rest) = text.strip_prefix("ب ") {
        return Some(rest.trim());
    }
    if text.starts_with("بال") || text.starts_with("بب") {
        return text.strip_prefix('ب');
    }
    None
}

/// Whether a line holds a date and nothing else.
fn is_date_only(text: &str) -> bool {
    find_date(text).is_some_and(|date| {
        let start = date.position.map_or(0, |(_, o)| o);
        let end = start + date.source.len();
        trim_separators(&text[..start]).is_empty() && trim_separators(&text[end..]).is_empty()
    })
}

/// Text on the birth line that follows the birth date, if there is a date.
fn after_birth_date<'t>(line: &'t NormalizedLine, label: &Regex) -> Option<&'t str> {
    let label_end = label.find(&line.text)?.end();
    let after = &line.text[label_end..];
    let date = find_date(after)?;
    let end = date.position.map_or(0, |(_, o)| o) + date.source.len();
    Some(&after[end..])
}

/// Up to `LOOKAHEAD` lines after `index`, skipping lines that hold only a date.
fn lines_after(text: &NormalizedText, index: usize) -> impl Iterator<Item = &NormalizedLine> {
    text.lines()
        .iter()
        .skip(index + 1)
        .take(LOOKAHEAD)
        .filter(|l| !is_date_only(&l.text))
}

/// Birth place extractor.
///
/// French: "Lieu de naissance", "Né le <date> à X", or a line starting
/// with "à" below the birth line. Arabic: "مكان الازدياد", or text starting
/// with "ب" after the Arabic birth date.
pub struct BirthPlaceExtractor {
    policy: MatchPolicy,
}

impl BirthPlaceExtractor {
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
        find_labeled(text, &LabelRule::new(label, script))
            .into_iter()
            .filter_map(|m| {
                let value = clean_place(&m.value)?;
                Some(ExtractionMatch { value, ..m })
            })
            .collect()
    }

    /// Place introduced by a prefix after the birth date, on the birth line
    /// or just below it.
    fn after_birth(
        &self,
        text: &NormalizedText,
        birth_label: &Regex,
        script: Script,
        prefix: impl Fn(&str) -> Option<String>,
    ) -> Vec<ExtractionMatch<String>> {
        let mut results = Vec::new();

        for line in text.lines().iter().filter(|l| birth_label.is_match(&l.text)) {
            let inline = after_birth_date(line, birth_label)
                .and_then(|rest| prefix(script_run(rest, script)))
                .and_then(|v| clean_place(&v));
            if let Some(value) = inline {
                results.push(
                    ExtractionMatch::new(value, AFTER_BIRTH_DATE * line.confidence, &line.text)
                        .with_position(line.index, 0),
                );
                continue;
            }

            let below = lines_after(text, line.index).find_map(|next| {
                prefix(script_run(&next.text, script))
                    .and_then(|v| clean_place(&v))
                    .map(|value| {
                        ExtractionMatch::new(value, BELOW_BIRTH_LINE * next.confidence, &next.text)
                            .with_position(next.index, 0)
                    })
            });
            results.extend(below);
        }

        results
    }

    /// First unlabelled line of `script` right after the birth line. The
    /// birth line of the other script stands in when this one has none.
    fn unlabeled(&self, text: &NormalizedText, birth_labels: [&Regex; 2], script: Script) -> Option<ExtractionMatch<String>> {
        let birth = birth_labels
            .iter()
            .find_map(|label| text.lines().iter().find(|l| label.is_match(&l.text)))?;
        let (next, run) = lines_after(text, birth.index)
            .find_map(|l| text_in_script(l, script).map(|run| (l, run)))?;
        if is_label_line(&next.text) || is_mrz_line(&next.text) {
            return None;
        }

        let value = match script {
            Script::Arabic => strip_arabic_prefix(run).unwrap_or(run),
            _ => run,
        };
        clean_place(value).map(|value| {
            ExtractionMatch::new(value, UNLABELED * next.confidence, &next.text)
                .with_position(next.index, 0)
        })
    }

    fn select(&self, mut candidates: Vec<ExtractionMatch<String>>) -> Option<ExtractionMatch<String>> {
        candidates.sort_by_key(|m| m.position);
        self.policy.select(candidates)
    }

    fn french(&self, text: &NormalizedText) -> Option<ExtractionMatch<String>> {
        let mut candidates = self.labeled(text, &PLACE_LABEL_FR, Script::Latin);
        candidates.extend(self.after_birth(text, &BIRTH_LABEL_FR, Script::Latin, |s| {
            PLACE_PREFIX_FR.captures(s).map(|caps| caps[1].to_string())
        }));

        self.select(candidates)
            .or_else(|| self.unlabeled(text, [&*BIRTH_LABEL_FR, &*BIRTH_LABEL_AR], Script::Latin))
    }

    fn arabic(&self, text: &NormalizedText) -> Option<ExtractionMatch<String>> {
        let mut candidates = self.labeled(text, &PLACE_LABEL_AR, Script::Arabic);
        candidates.extend(self.after_birth(text, &BIRTH_LABEL_AR, Script::Arabic, |s| {
            strip_arabic_prefix(s).map(str::to_string)
        }));

        self.select(candidates)
            .or_else(|| self.unlabeled(text, [&*BIRTH_LABEL_AR, &*BIRTH_LABEL_FR], Script::Arabic))
    }
}

impl Default for BirthPlaceExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for BirthPlaceExtractor {
    fn name(&self) -> &'static str {
        "birth_place"
    }

    fn fields(&self) -> &'static [Field] {
        &[Field::PlaceOfBirthFr, Field::PlaceOfBirthAr]
    }

    fn extract(&self, text: &NormalizedText, _side: CardSide) -> Vec<FieldMatch> {
        vec![
            FieldMatch::from_candidate(Field::PlaceOfBirthFr, self.french(text), Pass::Front),
            FieldMatch::from_candidate(Field::PlaceOfBirthAr, self.arabic(text), Pass::Front),
        ]
    }
}
