//! Values printed next to, or below, a field label.

use regex::Regex;

use super::patterns::{first_label_offset, is_label_line, is_mrz_line};
use super::ExtractionMatch;
use crate::normalize::script::{is_arabic, is_latin, leading_run, trailing_run};
use crate::normalize::{NormalizedLine, NormalizedText, Script};

/// Confidence of a value on the same line as its label.
pub const INLINE_CONFIDENCE: f32 = 0.9;
/// Confidence of a value on the lines following its label.
pub const NEXT_LINE_CONFIDENCE: f32 = 0.8;

/// How to read a labelled value.
pub struct LabelRule<'a> {
    pub label: &'a Regex,
    /// Script the value is written in.
    pub script: Script,
    /// Label matches overlapping one of these are ignored.
    pub ignore_within: &'a [&'a Regex],
    /// Lines read below a label that has no inline value.
    pub max_lines: usize,
}

impl<'a> LabelRule<'a> {
    pub fn new(label: &'a Regex, script: Script) -> Self {
        Self {
            label,
            script,
            ignore_within: &[],
            max_lines: 1,
        }
    }

    pub fn ignoring(mut self, patterns: &'a [&'a Regex]) -> Self {
        self.ignore_within = patterns;
        self
    }

    pub fn with_max_lines(mut self, max_lines: usize) -> Self {
        self.max_lines = max_lines;
        self
    }

    /// Whether `text` carries this label outside the ignored patterns.
    pub fn is_present(&self, text: &str) -> bool {
        self.label
            .find_iter(text)
            .any(|m| !self.is_ignored(text, m.start(), m.end()))
    }

    fn is_ignored(&self, text: &str, start: usize, end: usize) -> bool {
        self.ignore_within
            .iter()
            .flat_map(|r| r.find_iter(text))
            .any(|m| m.start() < end && start < m.end())
    }
}

fn has_letter_of(text: &str, script: Script) -> bool {
    text.chars().any(|c| match script {
        Script::Arabic => is_arabic(c),
        Script::Latin => is_latin(c),
        Script::Mixed | Script::Unknown => c.is_alphabetic(),
    })
}

/// The part of `text` written in `script`, whichever end of the line it is on.
pub fn script_run(text: &str, script: Script) -> &str {
    let lead = leading_run(text, script);
    if has_letter_of(lead, script) {
        lead
    } else {
        trailing_run(text, script)
    }
}

/// Text of `line` written in `script`: the whole line when it is in that
/// script, the matching run of a bilingual line, `None` otherwise.
pub fn text_in_script(line: &NormalizedLine, script: Script) -> Option<&str> {
    if line.script == script {
        return Some(line.text.as_str());
    }
    if line.script != Script::Mixed {
        return None;
    }
    let run = script_run(&line.text, script);
    has_letter_of(run, script).then_some(run)
}

/// Trim whitespace and separator punctuation from both ends.
pub fn trim_separators(value: &str) -> &str {
    value.trim_matches(|c: char| c.is_whitespace() || ":-.,،;؛/|_".contains(c))
}

/// Collapse whitespace and keep only name characters; at least two letters.
pub fn clean_name(value: &str) -> Option<String> {
    let cleaned = trim_separators(value)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let valid = cleaned.chars().all(|c| {
        c.is_alphabetic() || matches!(c, ' ' | '-' | '\'' | '\u{064B}'..='\u{065F}')
    });
    let letters = cleaned.chars().filter(|c| c.is_alphabetic()).count();
    (valid && letters >= 2).then_some(cleaned)
}

/// Keep the candidates that are plausible names, cleaned.
pub fn clean_names(matches: Vec<ExtractionMatch<String>>) -> Vec<ExtractionMatch<String>> {
    matches
        .into_iter()
        .filter_map(|m| {
            let value = clean_name(&m.value)?;
            Some(ExtractionMatch { value, ..m })
        })
        .collect()
}

/// Find every value introduced by `rule.label`, in reading order.
///
/// The inline value is the rest of the label line up to the next label,
/// restricted to the value's script. When the label line holds nothing, up
/// to `max_lines` following lines are joined, stopping at the first label
/// or MRZ line.
pub fn find_labeled(text: &NormalizedText, rule: &LabelRule) -> Vec<ExtractionMatch<String>> {
    let mut results = Vec::new();

    for line in text.lines() {
        for m in rule.label.find_iter(&line.text) {
            if rule.is_ignored(&line.text, m.start(), m.end()) {
                continue;
            }

            let rest = &line.text[m.end()..];
            let rest = match first_label_offset(rest) {
                Some(end) => &rest[..end],
                None => rest,
            };
            let inline = trim_separators(script_run(rest, rule.script));
            if !inline.is_empty() {
                results.push(
                    ExtractionMatch::new(
                        inline.to_string(),
                        INLINE_CONFIDENCE * line.confidence,
                        &line.text,
                    )
                    .with_position(line.index, m.end()),
                );
                continue;
            }

            let mut parts = Vec::new();
            let mut confidence = 1.0f32;
            for next in text.lines().iter().skip(line.index + 1).take(rule.max_lines) {
                if is_label_line(&next.text) || is_mrz_line(&next.text) {
                    break;
                }
                let value = trim_separators(script_run(&next.text, rule.script));
                if value.is_empty() {
                    break;
                }
                parts.push(value);
                confidence = confidence.min(next.confidence);
            }

            if !parts.is_empty() {
                results.push(
                    ExtractionMatch::new(
                        parts.join(", "),
                        NEXT_LINE_CONFIDENCE * confidence,
                        &line.text,
                    )
                    .with_position(line.index + 1, 0),
                );
            }
        }
    }

    results
}
