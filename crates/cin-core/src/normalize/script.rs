//! Character-range script detection for bilingual French/Arabic text.

use serde::{Deserialize, Serialize};

/// Writing system of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Script {
    Arabic,
    Latin,
    /// Both Arabic and Latin letters.
    Mixed,
    /// No letters of either script (digits, punctuation, unrecognized glyphs).
    Unknown,
}

/// Arabic letters, including presentation forms.
pub fn is_arabic(c: char) -> bool {
    matches!(c,
        '\u{0600}'..='\u{06FF}'
        | '\u{0750}'..='\u{077F}'
        | '\u{08A0}'..='\u{08FF}'
        | '\u{FB50}'..='\u{FDFF}'
        | '\u{FE70}'..='\u{FEFF}')
        && c.is_alphabetic()
}

/// Latin letters: ASCII, Latin-1 Supplement and Latin Extended-A/B.
pub fn is_latin(c: char) -> bool {
    c.is_ascii_alphabetic()
        || (matches!(c, '\u{00C0}'..='\u{024F}') && c != '\u{00D7}' && c != '\u{00F7}')
}

/// Detect the script of a piece of text.
pub fn detect_script(text: &str) -> Script {
    let mut arabic = false;
    let mut latin = false;

    for c in text.chars() {
        arabic |= is_arabic(c);
        latin |= is_latin(c);
        if arabic && latin {
            return Script::Mixed;
        }
    }

    match (arabic, latin) {
        (true, false) => Script::Arabic,
        (false, true) => Script::Latin,
        _ => Script::Unknown,
    }
}

/// Whether a letter belongs to the script opposite to `script`.
fn is_foreign(c: char, script: Script) -> bool {
    match script {
        Script::Latin => is_arabic(c),
        Script::Arabic => is_latin(c),
        Script::Mixed | Script::Unknown => false,
    }
}

/// Leading part of `text` written in `script`: everything up to the first
/// letter of the other script, trimmed.
pub fn leading_run(text: &str, script: Script) -> &str {
    let end = text
        .char_indices()
        .find(|(_, c)| is_foreign(*c, script))
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    text[..end].trim()
}

/// Trailing part of `text` written in `script`: everything after the last
/// letter of the other script, trimmed.
pub fn trailing_run(text: &str, script: Script) -> &str {
    let start = text
        .char_indices()
        .rev()
        .find(|(_, c)| is_foreign(*c, script))
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    text[start..].trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_script() {
        assert_eq!(detect_script("MOHAMED ALAMI"), Script::Latin);
        assert_eq!(detect_script("محمد العلمي"), Script::Arabic);
        assert_eq!(detect_script("Nom: ALAMI النسب"), Script::Mixed);
        assert_eq!(detect_script("01.01.1990"), Script::Unknown);
        assert_eq!(detect_script("Né le"), Script::Latin);
    }

    #[test]
    fn test_script_runs() {
        assert_eq!(leading_run(": ALAMI النسب: العلمي", Script::Latin), ": ALAMI");
        assert_eq!(leading_run(": العلمي Nom", Script::Arabic), ": العلمي");
        assert_eq!(trailing_run("ALAMI العلمي", Script::Arabic), "العلمي");
        assert_eq!(trailing_run("العلمي ALAMI", Script::Latin), "ALAMI");
        assert_eq!(leading_run("CASABLANCA", Script::Latin), "CASABLANCA");
    }
}
