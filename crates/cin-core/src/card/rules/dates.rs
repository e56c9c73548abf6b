//! Birth date extraction.

use chrono::NaiveDate;

use super::mrz::find_mrz;
use super::patterns::{
    is_label_line, is_mrz_line, BIRTH_LABEL_AR, BIRTH_LABEL_FR, DATE_DMY, DATE_FRENCH_LONG, DATE_YMD,
    EXPIRY_LABEL,
};
use super::ExtractionMatch;
use crate::card::{FieldExtractor, FieldMatch, MatchPolicy, Pass};
use crate::models::record::{CardSide, Field};
use crate::normalize::NormalizedText;

/// Output format of every date in a record.
pub const DATE_FORMAT: &str = "%d/%m/%Y";

const LABELED_INLINE: f32 = 0.95;
const LABELED_NEXT_LINE: f32 = 0.85;
const UNLABELED: f32 = 0.6;
const FROM_MRZ: f32 = 0.5;

fn valid_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    if !(1900..=2100).contains(&year) {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Every valid calendar date in `text`, ordered by byte offset.
///
/// Candidates that do not form a real date (31/02, month 13) are skipped.
pub fn find_dates(text: &str) -> Vec<ExtractionMatch<NaiveDate>> {
    let mut results: Vec<ExtractionMatch<NaiveDate>> = Vec::new();

    // DD.MM.YYYY or DD/MM/YYYY or DD-MM-YYYY
    for caps in DATE_DMY.captures_iter(text) {
        let day: u32 = caps[1].parse().unwrap_or(0);
        let month: u32 = caps[2].parse().unwrap_or(0);
        let year: i32 = caps[3].parse().unwrap_or(0);

        if let (Some(date), Some(full)) = (valid_date(year, month, day), caps.get(0)) {
            results.push(ExtractionMatch::new(date, 0.9, full.as_str()).with_position(0, full.start()));
        }
    }

    // YYYY-MM-DD or YYYY/MM/DD
    for caps in DATE_YMD.captures_iter(text) {
        let year: i32 = caps[1].parse().unwrap_or(0);
        let month: u32 = caps[2].parse().unwrap_or(0);
        let day: u32 = caps[3].parse().unwrap_or(0);

        if let (Some(date), Some(full)) = (valid_date(year, month, day), caps.get(0)) {
            results.push(ExtractionMatch::new(date, 0.9, full.as_str()).with_position(0, full.start()));
        }
    }

    // French long format: "1 janvier 1990"
    for caps in DATE_FRENCH_LONG.captures_iter(text) {
        let day: u32 = caps[1].parse().unwrap_or(0);
        let month = french_month_to_number(&caps[2]);
        let year: i32 = caps[3].parse().unwrap_or(0);

        if let (Some(date), Some(full)) = (valid_date(year, month, day), caps.get(0)) {
            results.push(ExtractionMatch::new(date, 0.95, full.as_str()).with_position(0, full.start()));
        }
    }

    results.sort_by_key(|m| m.position.map(|(_, offset)| offset));
    results
}

/// Whether `text` holds something written like a date, valid or not.
pub fn has_date_shape(text: &str) -> bool {
    DATE_DMY.is_match(text) || DATE_YMD.is_match(text) || DATE_FRENCH_LONG.is_match(text)
}

/// First valid date in `text`.
pub fn find_date(text: &str) -> Option<ExtractionMatch<NaiveDate>> {
    find_dates(text).into_iter().next()
}

/// Place a match found in a slice of line `line` starting at byte `base`.
fn relocate(
    date: ExtractionMatch<NaiveDate>,
    line: usize,
    base: usize,
    confidence: f32,
) -> ExtractionMatch<NaiveDate> {
    let offset = base + date.position.map_or(0, |(_, o)| o);
    ExtractionMatch {
        confidence: confidence.clamp(0.0, 1.0),
        ..date.with_position(line, offset)
    }
}

/// Format a date as `DD/MM/YYYY`.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn french_month_to_number(month: &str) -> u32 {
    match month.to_lowercase().as_str() {
        "janvier" => 1,
        "février" | "fevrier" => 2,
        "mars" => 3,
        "avril" => 4,
        "mai" => 5,
        "juin" => 6,
        "juillet" => 7,
        "août" | "aout" => 8,
        "septembre" => 9,
        "octobre" => 10,
        "novembre" => 11,
        "décembre" | "decembre" => 12,
        _ => 0,
    }
}

/// Birth date extractor.
///
/// A date next to a birth label wins over any other date; an unlabelled date
/// is only taken when it is not the card's expiry date. A labelled value
/// that is not a real date leaves the field empty. The MRZ birth date
/// is reported separately as a back-zone match.
pub struct BirthDateExtractor {
    policy: MatchPolicy,
}

impl BirthDateExtractor {
    pub fn new() -> Self {
        Self {
            policy: MatchPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: MatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Dates next to a birth label, and whether a labelled value was
    /// rejected as an impossible date.
    fn labeled(&self, text: &NormalizedText) -> (Vec<ExtractionMatch<NaiveDate>>, bool) {
        let mut results = Vec::new();
        let mut rejected = false;

        for line in text.lines() {
            let Some(label) = BIRTH_LABEL_FR
                .find(&line.text)
                .or_else(|| BIRTH_LABEL_AR.find(&line.text))
            else {
                continue;
            };

            // Value after the label, or before it in right-to-left layouts
            let inline = find_date(&line.text[label.end()..])
                .map(|d| relocate(d, line.index, label.end(), LABELED_INLINE * line.confidence))
                .or_else(|| {
                    find_date(&line.text[..label.start()])
                        .map(|d| relocate(d, line.index, 0, LABELED_INLINE * line.confidence))
                });
            if let Some(date) = inline {
                results.push(date);
                continue;
            }
            if has_date_shape(&line.text) {
                rejected = true;
                continue;
            }

            let Some(next) = text.line(line.index + 1) else {
                continue;
            };
            if EXPIRY_LABEL.is_match(&next.text) || is_label_line(&next.text) || is_mrz_line(&next.text) {
                continue;
            }
            match find_date(&next.text) {
                Some(d) => results.push(relocate(d, next.index, 0, LABELED_NEXT_LINE * next.confidence)),
                None => rejected |= has_date_shape(&next.text),
            }
        }

        (results, rejected)
    }

    fn unlabeled(&self, text: &NormalizedText) -> Vec<ExtractionMatch<NaiveDate>> {
        let mut results = Vec::new();
        let mut after_expiry_label = false;

        for line in text.lines() {
            let is_expiry = EXPIRY_LABEL.is_match(&line.text);
            if is_expiry || after_expiry_label || is_mrz_line(&line.text) {
                after_expiry_label = is_expiry && find_date(&line.text).is_none();
                continue;
            }
            after_expiry_label = false;

            results.extend(
                find_dates(&line.text)
                    .into_iter()
                    .map(|d| relocate(d, line.index, 0, UNLABELED * line.confidence)),
            );
        }

        results
    }
}

impl Default for BirthDateExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for BirthDateExtractor {
    fn name(&self) -> &'static str {
        "birth_date"
    }

    fn fields(&self) -> &'static [Field] {
        &[Field::DateOfBirth]
    }

    fn extract(&self, text: &NormalizedText, side: CardSide) -> Vec<FieldMatch> {
        let (labeled, rejected) = self.labeled(text);
        let mut candidate = self.policy.select(labeled);
        if candidate.is_none() && !rejected && side != CardSide::Back {
            candidate = self.policy.select(self.unlabeled(text));
        }

        let mut matches = vec![FieldMatch::from_candidate(
            Field::DateOfBirth,
            candidate.map(|m| m.map(format_date)),
            Pass::Front,
        )];

        if side != CardSide::Front {
            if let Some(date) = find_mrz(text).and_then(|mrz| mrz.birth_date) {
                matches.push(FieldMatch::found(
                    Field::DateOfBirth,
                    format_date(date),
                    FROM_MRZ,
                    Pass::Back,
                ));
            }
        }

        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::rules::test_support::normalized;
    use pretty_assertions::assert_eq;

    fn extract(text: &str, side: CardSide) -> Vec<FieldMatch> {
        BirthDateExtractor::new().extract(&normalized(text), side)
    }

    #[test]
    fn test_find_date_formats() {
        let expected = NaiveDate::from_ymd_opt(1990, 1, 15);
        assert_eq!(find_date("15.01.1990").map(|m| m.value), expected);
        assert_eq!(find_date("15/01/1990").map(|m| m.value), expected);
        assert_eq!(find_date("1990-01-15").map(|m| m.value), expected);
        assert_eq!(find_date("15 janvier 1990").map(|m| m.value), expected);
        assert_eq!(find_date("15 Fevrier 1990").map(|m| m.value), NaiveDate::from_ymd_opt(1990, 2, 15));
    }

    #[test]
    fn test_invalid_calendar_dates_are_skipped() {
        assert!(find_date("31/02/1990").is_none());
        assert!(find_date("01/13/1990").is_none());
        assert!(find_date("01/01/1850").is_none());
        assert_eq!(
            find_date("31/02/1990 puis 28/02/1990").map(|m| m.value),
            NaiveDate::from_ymd_opt(1990, 2, 28)
        );
    }

    #[test]
    fn test_labeled_birth_date() {
        let matches = extract("Valable jusqu'au 01.01.2030\nNé le 05.06.1985 à CASABLANCA", CardSide::Front);
        assert_eq!(matches[0].value.as_deref(), Some("05/06/1985"));
        assert_eq!(matches[0].confidence, 0.95);
    }

    #[test]
    fn test_arabic_label_and_next_line() {
        let matches = extract("مزداد بتاريخ\n05.06.1985", CardSide::Front);
        assert_eq!(matches[0].value.as_deref(), Some("05/06/1985"));
        assert_eq!(matches[0].confidence, 0.85);
    }

    #[test]
    fn test_unlabeled_date_skips_expiry() {
        let matches = extract("Valable jusqu'au\n01.01.2030\nMOHAMED\n05.06.1985", CardSide::Unknown);
        assert_eq!(matches[0].value.as_deref(), Some("05/06/1985"));
        assert_eq!(matches[0].confidence, UNLABELED);
    }

    #[test]
    fn test_impossible_labeled_date_is_not_replaced() {
        let matches = extract("ROYAUME DU MAROC\nNé le 31.02.1990\nValable jusqu'au 01.01.2030", CardSide::Front);
        assert_eq!(matches, vec![FieldMatch::not_found(Field::DateOfBirth)]);

        let matches = extract("Date de naissance\n31.02.1990\nMOHAMED\n05.06.1985", CardSide::Front);
        assert_eq!(matches, vec![FieldMatch::not_found(Field::DateOfBirth)]);
    }

    #[test]
    fn test_label_does_not_read_expiry_line() {
        let matches = extract("ROYAUME DU MAROC\nDate de naissance\nValable jusqu'au 01.01.2030", CardSide::Front);
        assert_eq!(matches, vec![FieldMatch::not_found(Field::DateOfBirth)]);
    }

    #[test]
    fn test_has_date_shape() {
        assert!(has_date_shape("Né le 31.02.1990"));
        assert!(has_date_shape("le 30 février 1990"));
        assert!(!has_date_shape("Né le"));
    }

    #[test]
    fn test_mrz_birth_date_on_back() {
        let matches = extract(
            "IDMARAB1234567<AB123456<<<<<<\n9001011M3001014MAR<<<<<<<<<<<6",
            CardSide::Back,
        );
        assert!(!matches[0].is_found());
        assert_eq!(matches[1].value.as_deref(), Some("01/01/1990"));
        assert_eq!(matches[1].pass, Pass::Back);
    }

    #[test]
    fn test_no_date() {
        let matches = extract("MOHAMED ALAMI", CardSide::Front);
        assert_eq!(matches, vec![FieldMatch::not_found(Field::DateOfBirth)]);
    }
}
