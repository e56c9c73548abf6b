//! Common regex patterns for Moroccan identity card extraction.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // CIN number: 1-2 letters followed by exactly 6 digits
    pub static ref CIN_NUMBER: Regex = Regex::new(
        r"\b([A-Za-z]{1,2})([0-9]{6})\b"
    ).unwrap();

    pub static ref CIN_LABEL: Regex = Regex::new(
        r"(?i)\bc\.?\s?i\.?\s?n\b|\bn\s?[°º]|\bnum[ée]ro\b|رقم"
    ).unwrap();

    // Date patterns
    pub static ref DATE_DMY: Regex = Regex::new(
        r"\b([0-9]{1,2})[./\-]([0-9]{1,2})[./\-]([0-9]{4})\b"
    ).unwrap();

    pub static ref DATE_YMD: Regex = Regex::new(
        r"\b([0-9]{4})[./\-]([0-9]{1,2})[./\-]([0-9]{1,2})\b"
    ).unwrap();

    pub static ref DATE_FRENCH_LONG: Regex = Regex::new(
        r"(?i)\b([0-9]{1,2})\s+(janvier|f[ée]vrier|mars|avril|mai|juin|juillet|ao[uû]t|septembre|octobre|novembre|d[ée]cembre)\s+([0-9]{4})\b"
    ).unwrap();

    // National header printed on the front
    pub static ref FRONT_HEADER: Regex = Regex::new(
        r"(?i)royaume\s+du\s+maroc|carte\s+nationale|d'?\s?identit[ée]|المملكة\s*المغربية|البطاقة\s*الوطنية"
    ).unwrap();

    // Birth labels
    pub static ref BIRTH_LABEL_FR: Regex = Regex::new(
        r"(?i)\bn[ée]e?(?:\s?\(\s?e\s?\))?\s+le\b|\bdate\s+de\s+naissance\b"
    ).unwrap();

    pub static ref BIRTH_LABEL_AR: Regex = Regex::new(
        r"مزداد(?:ة)?(?:\s*(?:بتاريخ|في))?|تاريخ\s*الازدياد|تاريخ\s*الولادة"
    ).unwrap();

    pub static ref PLACE_LABEL_FR: Regex = Regex::new(
        r"(?i)\blieu\s+de\s+naissance\b"
    ).unwrap();

    pub static ref PLACE_LABEL_AR: Regex = Regex::new(
        r"مكان\s*(?:الازدياد|الولادة)"
    ).unwrap();

    // "à CASABLANCA" following the birth date
    pub static ref PLACE_PREFIX_FR: Regex = Regex::new(
        r"(?i)^(?:à|a)\s+(.+)$"
    ).unwrap();

    pub static ref EXPIRY_LABEL: Regex = Regex::new(
        r"(?i)valable\s+jusqu|date\s+d'?\s?expiration|صالحة\s*(?:إلى|الى|لغاية|حتى)"
    ).unwrap();

    // Name labels
    pub static ref FULL_NAME_FR: Regex = Regex::new(
        r"(?i)\bnoms?\s+(?:et|&)\s+pr[ée]noms?\b|\bnom\s+complet\b"
    ).unwrap();

    pub static ref FIRST_NAME_FR: Regex = Regex::new(
        r"(?i)\bpr[ée]noms?\b"
    ).unwrap();

    pub static ref LAST_NAME_FR: Regex = Regex::new(
        r"(?i)\bnom(?:\s+de\s+famille)?\b"
    ).unwrap();

    pub static ref FULL_NAME_AR: Regex = Regex::new(
        r"الاسم\s*الكامل"
    ).unwrap();

    pub static ref FIRST_NAME_AR: Regex = Regex::new(
        r"الاسم(?:\s*الشخصي)?"
    ).unwrap();

    pub static ref LAST_NAME_AR: Regex = Regex::new(
        r"النسب|الاسم\s*العائلي"
    ).unwrap();

    // Parentage labels (back)
    pub static ref FATHER_FR: Regex = Regex::new(
        r"(?i)\bfil(?:s|le)\s+de\b|\bnom\s+du\s+p[èe]re\b|\bp[èe]re\b"
    ).unwrap();

    pub static ref MOTHER_FR: Regex = Regex::new(
        r"(?i)\bet\s+de\b|\bnom\s+de\s+la\s+m[èe]re\b|\bm[èe]re\b"
    ).unwrap();

    pub static ref FATHER_AR: Regex = Regex::new(
        r"^\s*(?:ابن|بنت)\b|اسم\s*الأب\b|اسم\s*الاب\b|\bالأب\b|\bالاب\b"
    ).unwrap();

    pub static ref MOTHER_AR: Regex = Regex::new(
        r"اسم\s*الأم\b|اسم\s*الام\b|\bالأم\b|\bالام\b"
    ).unwrap();

    // "و فاطمة بنت علي" following the father line
    pub static ref MOTHER_PREFIX_AR: Regex = Regex::new(
        r"^و\s+(.+)$"
    ).unwrap();

    // Address labels (back)
    pub static ref ADDRESS_FR: Regex = Regex::new(
        r"(?i)\badresse\b|\baddress\b|\bdomicile\b"
    ).unwrap();

    pub static ref ADDRESS_AR: Regex = Regex::new(
        r"العنوان|محل\s*السكنى"
    ).unwrap();

    pub static ref CIVIL_STATUS: Regex = Regex::new(
        r"(?i)[ée]tat\s+civil|\bsexe\b|الحالة\s*المدنية|الجنس"
    ).unwrap();
}

/// Anchors that only appear on the front.
pub fn front_anchors() -> [&'static Regex; 12] {
    [
        &*FRONT_HEADER,
        &*BIRTH_LABEL_FR,
        &*BIRTH_LABEL_AR,
        &*PLACE_LABEL_FR,
        &*PLACE_LABEL_AR,
        &*EXPIRY_LABEL,
        &*FULL_NAME_FR,
        &*FIRST_NAME_FR,
        &*LAST_NAME_FR,
        &*FULL_NAME_AR,
        &*FIRST_NAME_AR,
        &*LAST_NAME_AR,
    ]
}

/// Anchors that only appear on the back.
pub fn back_anchors() -> [&'static Regex; 7] {
    [
        &*FATHER_FR,
        &*MOTHER_FR,
        &*FATHER_AR,
        &*MOTHER_AR,
        &*ADDRESS_FR,
        &*ADDRESS_AR,
        &*CIVIL_STATUS,
    ]
}

/// Whether a line carries any field label or header.
pub fn is_label_line(text: &str) -> bool {
    CIN_LABEL.is_match(text)
        || front_anchors().iter().any(|r| r.is_match(text))
        || back_anchors().iter().any(|r| r.is_match(text))
}

/// Byte offset of the first label or header in `text`.
pub fn first_label_offset(text: &str) -> Option<usize> {
    front_anchors()
        .iter()
        .chain(back_anchors().iter())
        .chain(std::iter::once(&&*CIN_LABEL))
        .filter_map(|r| r.find(text).map(|m| m.start()))
        .min()
}

/// Whether a line looks like part of a machine-readable zone.
pub fn is_mrz_line(text: &str) -> bool {
    let compact = compact_mrz(text);
    compact.len() >= 20
        && compact.contains('<')
        && compact
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '<')
}

/// MRZ text without spaces, with guillemets read as filler pairs.
pub fn compact_mrz(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(|c| match c {
            '«' => vec!['<', '<'],
            c => vec![c],
        })
        .collect()
}

/// Whether a line contains an ASCII digit.
pub fn has_digit(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_digit())
}
