//! Cleaning and line segmentation of raw OCR output.

mod corrections;
pub mod script;

pub use corrections::correct_substitutions;
pub use script::{detect_script, Script};

use tracing::debug;

use crate::error::{CinError, Result};
use crate::ocr::RawOcrResult;

/// One logical line of cleaned OCR text.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedLine {
    /// Position in reading order.
    pub index: usize,
    /// Cleaned text.
    pub text: String,
    /// Detected script.
    pub script: Script,
    /// OCR confidence of the source line (1.0 when the engine gave none).
    pub confidence: f32,
    /// Axis-aligned box (x1, y1, x2, y2) when the engine reported one.
    pub rect: Option<(f32, f32, f32, f32)>,
}

/// Cleaned OCR text for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedText {
    lines: Vec<NormalizedLine>,
    extent: Option<(f32, f32)>,
}

impl NormalizedText {
    /// Lines in reading order.
    pub fn lines(&self) -> &[NormalizedLine] {
        &self.lines
    }

    /// Line at `index`.
    pub fn line(&self, index: usize) -> Option<&NormalizedLine> {
        self.lines.get(index)
    }

    /// Width and height of the recognized area, if known.
    pub fn extent(&self) -> Option<(f32, f32)> {
        self.extent
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Zero-width, bidirectional and other invisible formatting characters.
fn is_invisible(c: char) -> bool {
    matches!(c,
        '\u{00AD}'
        | '\u{061C}'
        | '\u{0640}'
        | '\u{200B}'..='\u{200F}'
        | '\u{202A}'..='\u{202E}'
        | '\u{2060}'..='\u{2069}'
        | '\u{FEFF}')
}

/// Arabic-Indic and Eastern Arabic-Indic digits to ASCII.
fn fold_digit(c: char) -> char {
    match c {
        '\u{0660}'..='\u{0669}' => char::from(b'0' + (c as u32 - 0x0660) as u8),
        '\u{06F0}'..='\u{06F9}' => char::from(b'0' + (c as u32 - 0x06F0) as u8),
        other => other,
    }
}

/// Strip control and formatting characters and collapse whitespace.
pub fn clean_line(raw: &str) -> String {
    raw.chars()
        .filter(|c| !is_invisible(*c))
        .map(|c| if c.is_control() { ' ' } else { fold_digit(c) })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Cleaned text, line confidence and optional rectangle.
type Segment = (String, f32, Option<(f32, f32, f32, f32)>);

/// Text normalizer: cleans raw OCR output and segments it into lines.
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    ocr_corrections: bool,
}

impl TextNormalizer {
    /// Create a normalizer with OCR corrections enabled.
    pub fn new() -> Self {
        Self {
            ocr_corrections: true,
        }
    }

    /// Enable or disable repair of OCR substitutions in numbers and dates.
    pub fn with_ocr_corrections(mut self, enabled: bool) -> Self {
        self.ocr_corrections = enabled;
        self
    }

    /// Normalize a raw OCR result.
    ///
    /// Boxes, when present, become lines in the order given; otherwise the
    /// text is split on line breaks. Lines are never dropped for containing
    /// unrecognized characters, only for being empty after cleaning.
    pub fn normalize(&self, raw: &RawOcrResult) -> Result<NormalizedText> {
        let from_boxes: Vec<Segment> = raw
            .boxes
            .iter()
            .map(|b| (clean_line(&b.text), b.confidence.clamp(0.0, 1.0), Some(b.rect())))
            .filter(|(text, _, _)| !text.is_empty())
            .collect();

        let segments: Vec<Segment> = if from_boxes.is_empty() {
            raw.text
                .lines()
                .map(|l| (clean_line(l), 1.0, None))
                .filter(|(text, _, _)| !text.is_empty())
                .collect()
        } else {
            from_boxes
        };

        if segments.is_empty() {
            return Err(CinError::EmptyInput);
        }

        let lines: Vec<NormalizedLine> = segments
            .into_iter()
            .enumerate()
            .map(|(index, (text, confidence, rect))| {
                let text = if self.ocr_corrections {
                    correct_substitutions(&text).into_owned()
                } else {
                    text
                };
                NormalizedLine {
                    index,
                    script: detect_script(&text),
                    text,
                    confidence,
                    rect,
                }
            })
            .collect();

        debug!("Normalized OCR output into {} lines", lines.len());

        Ok(NormalizedText {
            lines,
            extent: raw.extent(),
        })
    }
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::TextBox;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_clean_line() {
        assert_eq!(clean_line("  MOHAMED\t\tALAMI  "), "MOHAMED ALAMI");
        assert_eq!(clean_line("\u{200F}محمد\u{200E}  العلمي\u{0007}"), "محمد العلمي");
        assert_eq!(clean_line("الـعـلـمـي"), "العلمي");
        assert_eq!(clean_line("١٩٩٠"), "1990");
    }

    #[test]
    fn test_segments_text_and_tags_scripts() {
        let raw = RawOcrResult::from_text("ROYAUME DU MAROC\n\n  المملكة المغربية \nNom: ALAMI النسب\n01.01.1990\n");
        let text = TextNormalizer::new().normalize(&raw).unwrap();

        let scripts: Vec<Script> = text.lines().iter().map(|l| l.script).collect();
        assert_eq!(
            scripts,
            vec![Script::Latin, Script::Arabic, Script::Mixed, Script::Unknown]
        );
        assert_eq!(text.line(1).unwrap().index, 1);
        assert_eq!(text.line(1).unwrap().text, "المملكة المغربية");
    }

    #[test]
    fn test_unrecognized_lines_are_kept() {
        let raw = RawOcrResult::from_text("@@## ~~\nALAMI");
        let text = TextNormalizer::new().normalize(&raw).unwrap();
        assert_eq!(text.len(), 2);
        assert_eq!(text.lines()[0].text, "@@## ~~");
    }

    #[test]
    fn test_boxes_take_precedence() {
        let raw = RawOcrResult {
            text: "ignored".to_string(),
            boxes: vec![
                TextBox::from_rect("CIN AB123456", (500.0, 10.0, 700.0, 40.0), 0.9),
                TextBox::from_rect("  ", (0.0, 0.0, 1.0, 1.0), 0.9),
            ],
            image_size: Some((800, 500)),
        };
        let text = TextNormalizer::new().normalize(&raw).unwrap();

        assert_eq!(text.len(), 1);
        assert_eq!(text.lines()[0].rect, Some((500.0, 10.0, 700.0, 40.0)));
        assert_eq!(text.extent(), Some((800.0, 500.0)));
    }

    #[test]
    fn test_whitespace_only_is_empty_input() {
        let raw = RawOcrResult::from_text(" \n\t \u{200F}\n");
        assert!(matches!(
            TextNormalizer::new().normalize(&raw),
            Err(CinError::EmptyInput)
        ));
    }

    #[test]
    fn test_corrections_can_be_disabled() {
        let raw = RawOcrResult::from_text("AB12345O");
        let fixed = TextNormalizer::new().normalize(&raw).unwrap();
        let kept = TextNormalizer::new()
            .with_ocr_corrections(false)
            .normalize(&raw)
            .unwrap();
        assert_eq!(fixed.lines()[0].text, "AB123450");
        assert_eq!(kept.lines()[0].text, "AB12345O");
    }
}
