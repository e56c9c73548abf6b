//! First and last names in French and Arabic.

use regex::Regex;

use super::dates::find_date;
use super::labels::{clean_name, clean_names, find_labeled, text_in_script, LabelRule};
use super::mrz::find_mrz;
use super::patterns::{
    has_digit, is_label_line, is_mrz_line, BIRTH_LABEL_AR, BIRTH_LABEL_FR, FATHER_FR,
    FIRST_NAME_AR, FIRST_NAME_FR, FRONT_HEADER, FULL_NAME_AR, FULL_NAME_FR, LAST_NAME_AR,
    LAST_NAME_FR, MOTHER_FR,
};
use super::ExtractionMatch;
use crate::card::{FieldExtractor, FieldMatch, MatchPolicy, Pass};
use crate::models::record::{CardSide, Field};
use crate::normalize::{NormalizedText, Script};

const UNLABELED: f32 = 0.5;
const FROM_MRZ: f32 = 0.5;

type NamePair = (Option<ExtractionMatch<String>>, Option<ExtractionMatch<String>>);

/// Labels and output fields for one script.
struct NameLabels {
    script: Script,
    first: &'static Regex,
    last: &'static Regex,
    full: &'static Regex,
    first_ignore: Vec<&'static Regex>,
    last_ignore: Vec<&'static Regex>,
    first_field: Field,
    last_field: Field,
}

impl NameLabels {
    fn latin() -> Self {
        Self {
            script: Script::Latin,
            first: &*FIRST_NAME_FR,
            last: &*LAST_NAME_FR,
            full: &*FULL_NAME_FR,
            first_ignore: vec![&*FULL_NAME_FR],
            last_ignore: vec![&*FULL_NAME_FR, &*FATHER_FR, &*MOTHER_FR],
            first_field: Field::FirstNameFr,
            last_field: Field::LastNameFr,
        }
    }

    fn arabic() -> Self {
        Self {
            script: Script::Arabic,
            first: &*FIRST_NAME_AR,
            last: &*LAST_NAME_AR,
            full: &*FULL_NAME_AR,
            first_ignore: vec![&*FULL_NAME_AR, &*LAST_NAME_AR],
            last_ignore: vec![&*FULL_NAME_AR],
            first_field: Field::FirstNameAr,
            last_field: Field::LastNameAr,
        }
    }
}

/// Split "FIRST REST OF NAME" into first token and remainder.
fn split_full(full: ExtractionMatch<String>) -> NamePair {
    let parts = full
        .value
        .split_once(' ')
        .map(|(f, r)| (f.to_string(), r.to_string()));
    let Some((first, rest)) = parts else {
        return (None, Some(full));
    };

    (
        Some(ExtractionMatch {
            value: first,
            ..full.clone()
        }),
        Some(ExtractionMatch { value: rest, ..full }),
    )
}

/// Name extractor for both scripts.
///
/// Labels are tried first; a combined "Nom et prénom" value is split on its
/// first space. Without any label, the lines between the national header
/// and the birth line are read in order as first then last name.
pub struct NameExtractor {
    policy: MatchPolicy,
}

impl NameExtractor {
    pub fn new() -> Self {
        Self {
            policy: MatchPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: MatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn labeled(&self, text: &NormalizedText, labels: &NameLabels) -> NamePair {
        let first_rule = LabelRule::new(labels.first, labels.script).ignoring(&labels.first_ignore);
        let last_rule = LabelRule::new(labels.last, labels.script).ignoring(&labels.last_ignore);
        let full_rule = LabelRule::new(labels.full, labels.script);

        let mut first = self.policy.select(clean_names(find_labeled(text, &first_rule)));
        let mut last = self.policy.select(clean_names(find_labeled(text, &last_rule)));

        if first.is_none() || last.is_none() {
            if let Some(full) = self.policy.select(clean_names(find_labeled(text, &full_rule))) {
                let (f, l) = split_full(full);
                first = first.or(f);
                last = last.or(l);
            }
        }

        // A lone "Nom" label carrying the whole name
        let first_label_present = text.lines().iter().any(|l| first_rule.is_present(&l.text));
        if first.is_none() && !first_label_present {
            if let Some(whole) = last.take() {
                (first, last) = split_full(whole);
            }
        }

        (first, last)
    }

    /// Unlabelled name lines between the national header and the birth line.
    fn unlabeled(&self, text: &NormalizedText, script: Script) -> NamePair {
        let lines = text.lines();
        let end = lines
            .iter()
            .position(|l| {
                BIRTH_LABEL_FR.is_match(&l.text)
                    || BIRTH_LABEL_AR.is_match(&l.text)
                    || find_date(&l.text).is_some()
            })
            .unwrap_or(lines.len());
        let start = lines[..end]
            .iter()
            .rposition(|l| FRONT_HEADER.is_match(&l.text))
            .map_or(0, |i| i + 1);

        let mut candidates = lines[start..end]
            .iter()
            .filter(|l| !has_digit(&l.text) && !is_label_line(&l.text) && !is_mrz_line(&l.text))
            .filter_map(|l| {
                let value = clean_name(text_in_script(l, script)?)?;
                Some(
                    ExtractionMatch::new(value, UNLABELED * l.confidence, &l.text)
                        .with_position(l.index, 0),
                )
            });

        match (candidates.next(), candidates.next()) {
            (Some(first), Some(last)) => (Some(first), Some(last)),
            (Some(whole), None) => split_full(whole),
            _ => (None, None),
        }
    }

    fn extract_script(&self, text: &NormalizedText, side: CardSide, labels: &NameLabels) -> Vec<FieldMatch> {
        let (mut first, mut last) = self.labeled(text, labels);
        if first.is_none() && last.is_none() && side != CardSide::Back {
            (first, last) = self.unlabeled(text, labels.script);
        }

        vec![
            FieldMatch::from_candidate(labels.first_field, first, Pass::Front),
            FieldMatch::from_candidate(labels.last_field, last, Pass::Front),
        ]
    }
}

impl Default for NameExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for NameExtractor {
    fn name(&self) -> &'static str {
        "names"
    }

    fn fields(&self) -> &'static [Field] {
        &[
            Field::FirstNameFr,
            Field::LastNameFr,
            Field::FirstNameAr,
            Field::LastNameAr,
        ]
    }

    fn extract(&self, text: &NormalizedText, side: CardSide) -> Vec<FieldMatch> {
        let mut matches = self.extract_script(text, side, &NameLabels::latin());
        matches.extend(self.extract_script(text, side, &NameLabels::arabic()));

        if side != CardSide::Front {
            if let Some(mrz) = find_mrz(text) {
                let names = [
                    (Field::FirstNameFr, mrz.first_name),
                    (Field::LastNameFr, mrz.last_name),
                ];
                for (field, value) in names {
                    if let Some(value) = value {
                        matches.push(FieldMatch::found(field, value, FROM_MRZ, Pass::Back));
                    }
                }
            }
        }

        matches
    }
}
