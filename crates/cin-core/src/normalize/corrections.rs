//! Repair of common OCR character substitutions.
//!
//! Only tokens shaped like a CIN number or a numeric date are touched, so
//! names and places keep their letters.

use std::borrow::Cow;

use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    static ref IDENTIFIER_TOKEN: Regex =
        Regex::new(r"\b([A-Za-z]{1,2})([0-9OoQDIlSBZG]{6})\b").unwrap();
    static ref DATE_TOKEN: Regex =
        Regex::new(r"\b([0-9OoIl]{1,2})([./\-])([0-9OoIl]{1,2})([./\-])([0-9OoIl]{4})\b").unwrap();
}

/// Digits that OCR engines commonly read as letters.
fn as_digit(c: char) -> char {
    match c {
        'O' | 'o' | 'Q' | 'D' => '0',
        'I' | 'l' => '1',
        'S' => '5',
        'B' => '8',
        'Z' => '2',
        'G' => '6',
        other => other,
    }
}

fn ascii_digits(s: &str) -> usize {
    s.chars().filter(|c| c.is_ascii_digit()).count()
}

/// Map letters to digits inside identifier- and date-shaped tokens.
pub fn correct_substitutions(line: &str) -> Cow<'_, str> {
    let fixed = IDENTIFIER_TOKEN.replace_all(line, |caps: &Captures| {
        let digits = &caps[2];
        if ascii_digits(digits) >= 4 {
            format!("{}{}", caps[1].to_uppercase(), digits.chars().map(as_digit).collect::<String>())
        } else {
            caps[0].to_string()
        }
    });

    let needs_date_fix = DATE_TOKEN
        .captures_iter(&fixed)
        .any(|caps| ascii_digits(&caps[0]) < caps[0].len() - 2);
    if !needs_date_fix {
        return fixed;
    }

    let fixed = DATE_TOKEN
        .replace_all(&fixed, |caps: &Captures| {
            let token = &caps[0];
            if ascii_digits(token) >= 5 {
                format!(
                    "{}{}{}{}{}",
                    caps[1].chars().map(as_digit).collect::<String>(),
                    &caps[2],
                    caps[3].chars().map(as_digit).collect::<String>(),
                    &caps[4],
                    caps[5].chars().map(as_digit).collect::<String>(),
                )
            } else {
                token.to_string()
            }
        })
        .into_owned();
    Cow::Owned(fixed)
}
