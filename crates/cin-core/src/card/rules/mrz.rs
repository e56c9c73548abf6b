//! Machine-readable zone (TD1, three lines of 30 characters) on the back.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

use super::patterns::{compact_mrz, is_mrz_line};
use crate::models::record::is_canonical_cin;
use crate::normalize::NormalizedText;

lazy_static! {
    static ref DATES_LINE: Regex = Regex::new(r"^([0-9]{6})([0-9<])[MF<]").unwrap();
    static ref NAMES_LINE: Regex =
        Regex::new(r"^([A-Z]+(?:<[A-Z]+)*)<<([A-Z]+(?:<[A-Z]+)*)<*$").unwrap();
    static ref EMBEDDED_CIN: Regex = Regex::new(r"([A-Z]{1,2}[0-9]{6})(?:<|$)").unwrap();
}

/// Fields decoded from the MRZ.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MrzData {
    pub cin_number: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub last_name: Option<String>,
    pub first_name: Option<String>,
    /// Index of the first MRZ line.
    pub line: usize,
}

/// ICAO 9303 check digit (weights 7, 3, 1).
pub fn check_digit(data: &str) -> u32 {
    data.chars()
        .zip([7u32, 3, 1].iter().cycle())
        .map(|(c, weight)| {
            let value = match c {
                '0'..='9' => c as u32 - '0' as u32,
                'A'..='Z' => c as u32 - 'A' as u32 + 10,
                _ => 0,
            };
            value * weight
        })
        .sum::<u32>()
        % 10
}

/// CIN from line 1: the optional data field first, then the document number.
fn document_cin(line: &str) -> Option<String> {
    let optional = line.get(15..).unwrap_or("");
    let document = line.get(5..14).unwrap_or("");

    [optional, document]
        .iter()
        .flat_map(|segment| segment.split('<'))
        .find(|token| is_canonical_cin(token))
        .map(str::to_string)
        .or_else(|| {
            EMBEDDED_CIN
                .captures(line.get(5..).unwrap_or(""))
                .map(|caps| caps[1].to_string())
        })
}

/// Birth date from line 2 (YYMMDD), rejected when the check digit disagrees.
fn birth_date(line: &str) -> Option<NaiveDate> {
    let caps = DATES_LINE.captures(line)?;
    let digits = &caps[1];
    if let Some(expected) = caps[2].chars().next().and_then(|c| c.to_digit(10)) {
        if check_digit(digits) != expected {
            return None;
        }
    }

    let yy: i32 = digits[0..2].parse().ok()?;
    let month: u32 = digits[2..4].parse().ok()?;
    let day: u32 = digits[4..6].parse().ok()?;
    // Holders are born in the past: two-digit years above the current one are 19xx
    let year = if yy > 26 { 1900 + yy } else { 2000 + yy };
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Locate and decode the MRZ, if any line of the text belongs to one.
pub fn find_mrz(text: &NormalizedText) -> Option<MrzData> {
    let lines: Vec<(usize, String)> = text
        .lines()
        .iter()
        .filter(|l| is_mrz_line(&l.text))
        .map(|l| (l.index, compact_mrz(&l.text)))
        .collect();

    let (first, _) = lines.first()?;
    let mut data = MrzData {
        line: *first,
        ..Default::default()
    };

    for (_, line) in &lines {
        if line.starts_with("ID") || line.starts_with("I<") {
            data.cin_number = data.cin_number.or_else(|| document_cin(line));
        } else if DATES_LINE.is_match(line) {
            data.birth_date = data.birth_date.or_else(|| birth_date(line));
        } else if let Some(caps) = NAMES_LINE.captures(line) {
            data.last_name.get_or_insert_with(|| caps[1].replace('<', " "));
            data.first_name.get_or_insert_with(|| caps[2].replace('<', " "));
        }
    }

    Some(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::rules::test_support::normalized;
    use pretty_assertions::assert_eq;

    const MRZ: &str = "IDMARAB1234567<AB123456<<<<<<\n9001011M3001014MAR<<<<<<<<<<<6\nALAMI<<MOHAMED<<<<<<<<<<<<<<<<";

    #[test]
    fn test_check_digit() {
        assert_eq!(check_digit("900101"), 1);
        assert_eq!(check_digit("520727"), 3);
        assert_eq!(check_digit("<<<"), 0);
    }

    #[test]
    fn test_decode_td1() {
        let text = normalized(&format!("Adresse: RUE 1 CASABLANCA\n{}", MRZ));
        let mrz = find_mrz(&text).unwrap();

        assert_eq!(mrz.line, 1);
        assert_eq!(mrz.cin_number.as_deref(), Some("AB123456"));
        assert_eq!(mrz.birth_date, NaiveDate::from_ymd_opt(1990, 1, 1));
        assert_eq!(mrz.last_name.as_deref(), Some("ALAMI"));
        assert_eq!(mrz.first_name.as_deref(), Some("MOHAMED"));
    }

    #[test]
    fn test_bad_check_digit_drops_birth_date() {
        let text = normalized("9001015M3001014MAR<<<<<<<<<<<6");
        assert_eq!(find_mrz(&text).unwrap().birth_date, None);
    }

    #[test]
    fn test_no_mrz() {
        assert!(find_mrz(&normalized("ROYAUME DU MAROC\nMOHAMED")).is_none());
    }
}
