//! Identity card record model.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Face of the identity card.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CardSide {
    /// Photo side: names, birth date and place.
    Front,
    /// Reverse side: parentage, address, machine-readable zone.
    Back,
    /// No side-specific signal was found.
    #[default]
    Unknown,
}

impl CardSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardSide::Front => "FRONT",
            CardSide::Back => "BACK",
            CardSide::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for CardSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An extractable field of [`CinRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    CinNumber,
    FirstNameFr,
    LastNameFr,
    FirstNameAr,
    LastNameAr,
    DateOfBirth,
    PlaceOfBirthFr,
    PlaceOfBirthAr,
    FatherNameFr,
    FatherNameAr,
    MotherNameFr,
    MotherNameAr,
    AddressFr,
    AddressAr,
}

impl Field {
    /// All fields in record order.
    pub const ALL: [Field; 14] = [
        Field::CinNumber,
        Field::FirstNameFr,
        Field::LastNameFr,
        Field::FirstNameAr,
        Field::LastNameAr,
        Field::DateOfBirth,
        Field::PlaceOfBirthFr,
        Field::PlaceOfBirthAr,
        Field::FatherNameFr,
        Field::FatherNameAr,
        Field::MotherNameFr,
        Field::MotherNameAr,
        Field::AddressFr,
        Field::AddressAr,
    ];

    /// JSON name of the field.
    pub fn name(&self) -> &'static str {
        match self {
            Field::CinNumber => "cin_number",
            Field::FirstNameFr => "first_name_fr",
            Field::LastNameFr => "last_name_fr",
            Field::FirstNameAr => "first_name_ar",
            Field::LastNameAr => "last_name_ar",
            Field::DateOfBirth => "date_of_birth",
            Field::PlaceOfBirthFr => "place_of_birth_fr",
            Field::PlaceOfBirthAr => "place_of_birth_ar",
            Field::FatherNameFr => "father_name_fr",
            Field::FatherNameAr => "father_name_ar",
            Field::MotherNameFr => "mother_name_fr",
            Field::MotherNameAr => "mother_name_ar",
            Field::AddressFr => "address_fr",
            Field::AddressAr => "address_ar",
        }
    }

    /// The side this field is printed on, or `None` for the CIN number,
    /// which appears on both.
    pub fn side(&self) -> Option<CardSide> {
        match self {
            Field::CinNumber => None,
            Field::FirstNameFr
            | Field::LastNameFr
            | Field::FirstNameAr
            | Field::LastNameAr
            | Field::DateOfBirth
            | Field::PlaceOfBirthFr
            | Field::PlaceOfBirthAr => Some(CardSide::Front),
            Field::FatherNameFr
            | Field::FatherNameAr
            | Field::MotherNameFr
            | Field::MotherNameAr
            | Field::AddressFr
            | Field::AddressAr => Some(CardSide::Back),
        }
    }

    /// Whether a value for this field may appear in a record of `side`.
    pub fn allowed_on(&self, side: CardSide) -> bool {
        match (self.side(), side) {
            (None, _) | (_, CardSide::Unknown) => true,
            (Some(own), side) => own == side,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Canonical output record.
///
/// Every field is nullable; `None` means "not found". All fields are always
/// serialized, absent ones as `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CinRecord {
    pub side: CardSide,
    pub cin_number: Option<String>,
    pub first_name_fr: Option<String>,
    pub last_name_fr: Option<String>,
    pub first_name_ar: Option<String>,
    pub last_name_ar: Option<String>,
    /// Birth date formatted `DD/MM/YYYY`.
    pub date_of_birth: Option<String>,
    pub place_of_birth_fr: Option<String>,
    pub place_of_birth_ar: Option<String>,
    pub father_name_fr: Option<String>,
    pub mother_name_fr: Option<String>,
    pub father_name_ar: Option<String>,
    pub mother_name_ar: Option<String>,
    pub address_fr: Option<String>,
    pub address_ar: Option<String>,
}

impl CinRecord {
    /// Create an empty record for `side`.
    pub fn new(side: CardSide) -> Self {
        Self {
            side,
            ..Self::default()
        }
    }

    /// Value of a field.
    pub fn get(&self, field: Field) -> Option<&str> {
        self.slot(field).as_deref()
    }

    /// Set or clear a field.
    pub fn set(&mut self, field: Field, value: Option<String>) {
        *self.slot_mut(field) = value;
    }

    fn slot(&self, field: Field) -> &Option<String> {
        match field {
            Field::CinNumber => &self.cin_number,
            Field::FirstNameFr => &self.first_name_fr,
            Field::LastNameFr => &self.last_name_fr,
            Field::FirstNameAr => &self.first_name_ar,
            Field::LastNameAr => &self.last_name_ar,
            Field::DateOfBirth => &self.date_of_birth,
            Field::PlaceOfBirthFr => &self.place_of_birth_fr,
            Field::PlaceOfBirthAr => &self.place_of_birth_ar,
            Field::FatherNameFr => &self.father_name_fr,
            Field::FatherNameAr => &self.father_name_ar,
            Field::MotherNameFr => &self.mother_name_fr,
            Field::MotherNameAr => &self.mother_name_ar,
            Field::AddressFr => &self.address_fr,
            Field::AddressAr => &self.address_ar,
        }
    }

    fn slot_mut(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::CinNumber => &mut self.cin_number,
            Field::FirstNameFr => &mut self.first_name_fr,
            Field::LastNameFr => &mut self.last_name_fr,
            Field::FirstNameAr => &mut self.first_name_ar,
            Field::LastNameAr => &mut self.last_name_ar,
            Field::DateOfBirth => &mut self.date_of_birth,
            Field::PlaceOfBirthFr => &mut self.place_of_birth_fr,
            Field::PlaceOfBirthAr => &mut self.place_of_birth_ar,
            Field::FatherNameFr => &mut self.father_name_fr,
            Field::FatherNameAr => &mut self.father_name_ar,
            Field::MotherNameFr => &mut self.mother_name_fr,
            Field::MotherNameAr => &mut self.mother_name_ar,
            Field::AddressFr => &mut self.address_fr,
            Field::AddressAr => &mut self.address_ar,
        }
    }

    /// Fields that carry a value, in record order.
    pub fn found_fields(&self) -> Vec<Field> {
        Field::ALL
            .iter()
            .copied()
            .filter(|f| self.get(*f).is_some())
            .collect()
    }

    /// True when no field carries a value.
    pub fn is_empty(&self) -> bool {
        self.found_fields().is_empty()
    }

    /// Check the record invariants and return any issues found.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        for field in Field::ALL {
            if self.get(field).is_some() && !field.allowed_on(self.side) {
                issues.push(format!("{} must be null on the {} side", field, self.side));
            }
        }

        if let Some(cin) = &self.cin_number {
            if !is_canonical_cin(cin) {
                issues.push(format!("CIN number {:?} is not 1-2 letters + 6 digits", cin));
            }
        }

        if let Some(date) = &self.date_of_birth {
            if !is_canonical_date(date) {
                issues.push(format!("date of birth {:?} is not a valid DD/MM/YYYY date", date));
            }
        }

        issues
    }
}

/// Check `^[A-Z]{1,2}[0-9]{6}$`.
pub fn is_canonical_cin(value: &str) -> bool {
    let letters = value.chars().take_while(|c| c.is_ascii_uppercase()).count();
    let digits = &value[letters..];
    (1..=2).contains(&letters) && digits.len() == 6 && digits.chars().all(|c| c.is_ascii_digit())
}

/// Check that `value` is a real calendar date written `DD/MM/YYYY`.
pub fn is_canonical_date(value: &str) -> bool {
    value.len() == 10 && NaiveDate::parse_from_str(value, "%d/%m/%Y").is_ok()
}

/// Result of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Assembled record.
    pub record: CinRecord,

    /// Confidence of the side decision (0.0 - 1.0).
    pub side_confidence: f32,

    /// Confidence of every field kept in the record.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub field_confidence: BTreeMap<Field, f32>,

    /// Fields that were expected for the side but not found.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,

    /// Processing time in milliseconds.
    pub processing_time_ms: u64,
}

impl ExtractionResult {
    /// Mean confidence over the fields that were found, 0 when none were.
    pub fn mean_confidence(&self) -> f32 {
        if self.field_confidence.is_empty() {
            return 0.0;
        }
        self.field_confidence.values().sum::<f32>() / self.field_confidence.len() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_side_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&CardSide::Front).unwrap(), "\"FRONT\"");
        assert_eq!(serde_json::to_string(&CardSide::Unknown).unwrap(), "\"UNKNOWN\"");
    }

    #[test]
    fn test_record_serializes_every_field() {
        let json = serde_json::to_value(CinRecord::new(CardSide::Back)).unwrap();
        let obj = json.as_object().unwrap();

        assert_eq!(obj.len(), 15);
        assert_eq!(obj["side"], "BACK");
        for field in Field::ALL {
            assert!(obj[field.name()].is_null(), "{} should be null", field);
        }
    }

    #[test]
    fn test_field_side_affinity() {
        assert!(Field::CinNumber.allowed_on(CardSide::Front));
        assert!(Field::CinNumber.allowed_on(CardSide::Back));
        assert!(Field::FirstNameAr.allowed_on(CardSide::Front));
        assert!(!Field::FirstNameAr.allowed_on(CardSide::Back));
        assert!(!Field::AddressFr.allowed_on(CardSide::Front));
        assert!(Field::AddressFr.allowed_on(CardSide::Unknown));
    }

    #[test]
    fn test_canonical_cin() {
        assert!(is_canonical_cin("AB123456"));
        assert!(is_canonical_cin("J123456"));
        assert!(!is_canonical_cin("ABC123456"));
        assert!(!is_canonical_cin("AB1234567"));
        assert!(!is_canonical_cin("ab123456"));
        assert!(!is_canonical_cin("123456"));
    }

    #[test]
    fn test_canonical_date() {
        assert!(is_canonical_date("29/02/2000"));
        assert!(!is_canonical_date("29/02/2001"));
        assert!(!is_canonical_date("1/2/2000"));
        assert!(!is_canonical_date("32/01/1990"));
    }

    #[test]
    fn test_validate_flags_side_violations() {
        let mut record = CinRecord::new(CardSide::Front);
        record.set(Field::FatherNameFr, Some("AHMED".to_string()));
        record.set(Field::CinNumber, Some("AB12345".to_string()));

        let issues = record.validate();
        assert_eq!(issues.len(), 2);
    }
}
