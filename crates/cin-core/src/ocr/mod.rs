//! Raw OCR output as handed over by an OCR engine.

use serde::{Deserialize, Serialize};

use crate::normalize::script::{detect_script, Script};

/// A recognized piece of text with its coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBox {
    /// Bounding box coordinates (x1, y1, x2, y2, x3, y3, x4, y4) for quadrilateral.
    pub bbox: [f32; 8],

    /// Recognized text content.
    pub text: String,

    /// Recognition confidence score (0.0 - 1.0).
    #[serde(default = "default_confidence")]
    pub confidence: f32,
}

fn default_confidence() -> f32 {
    1.0
}

impl TextBox {
    /// Create a box from an axis-aligned rectangle.
    pub fn from_rect(text: impl Into<String>, rect: (f32, f32, f32, f32), confidence: f32) -> Self {
        let (x1, y1, x2, y2) = rect;
        Self {
            bbox: [x1, y1, x2, y1, x2, y2, x1, y2],
            text: text.into(),
            confidence,
        }
    }

    /// Get the center point of the bounding box.
    pub fn center(&self) -> (f32, f32) {
        let x = (self.bbox[0] + self.bbox[2] + self.bbox[4] + self.bbox[6]) / 4.0;
        let y = (self.bbox[1] + self.bbox[3] + self.bbox[5] + self.bbox[7]) / 4.0;
        (x, y)
    }

    /// Get the height of the bounding box.
    pub fn height(&self) -> f32 {
        let (_, min_y, _, max_y) = self.rect();
        max_y - min_y
    }

    /// Get the axis-aligned bounding rectangle.
    pub fn rect(&self) -> (f32, f32, f32, f32) {
        let xs = [self.bbox[0], self.bbox[2], self.bbox[4], self.bbox[6]];
        let ys = [self.bbox[1], self.bbox[3], self.bbox[5], self.bbox[7]];

        let min_x = xs.iter().cloned().fold(f32::INFINITY, f32::min);
        let max_x = xs.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let min_y = ys.iter().cloned().fold(f32::INFINITY, f32::min);
        let max_y = ys.iter().cloned().fold(f32::NEG_INFINITY, f32::max);

        (min_x, min_y, max_x, max_y)
    }
}

/// Output of an OCR engine for one image. Immutable once received.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawOcrResult {
    /// Full recognized text.
    pub text: String,

    /// Line or word boxes, in the order the engine reported them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub boxes: Vec<TextBox>,

    /// Image dimensions (width, height).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_size: Option<(u32, u32)>,
}

impl RawOcrResult {
    /// Create a result carrying only text.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Create a result from line boxes; the text is the boxes joined by newlines.
    pub fn from_boxes(boxes: Vec<TextBox>) -> Self {
        let text = boxes
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            text,
            boxes,
            image_size: None,
        }
    }

    /// Attach image dimensions.
    pub fn with_image_size(mut self, width: u32, height: u32) -> Self {
        self.image_size = Some((width, height));
        self
    }

    /// Width and height of the recognized area: the image size when known,
    /// otherwise the far corner of all boxes.
    pub fn extent(&self) -> Option<(f32, f32)> {
        if let Some((w, h)) = self.image_size {
            if w > 0 && h > 0 {
                return Some((w as f32, h as f32));
            }
        }
        if self.boxes.is_empty() {
            return None;
        }
        let (w, h) = self.boxes.iter().fold((0.0f32, 0.0f32), |(w, h), b| {
            let (_, _, x2, y2) = b.rect();
            (w.max(x2), h.max(y2))
        });
        (w > 0.0 && h > 0.0).then_some((w, h))
    }
}

/// Merge word boxes into line boxes.
///
/// Words whose vertical centers lie within half a word height of a row join
/// that row. Rows come out top to bottom; words inside a row run left to
/// right, or right to left when the row is mostly Arabic. The line
/// confidence is the mean word confidence.
pub fn group_into_lines(mut words: Vec<TextBox>) -> Vec<TextBox> {
    words.retain(|w| !w.text.trim().is_empty());
    words.sort_by(|a, b| {
        a.center()
            .1
            .partial_cmp(&b.center().1)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut rows: Vec<Vec<TextBox>> = Vec::new();
    for word in words {
        let (_, cy) = word.center();
        let joins_last = rows.last().is_some_and(|row| {
            let row_cy = row.iter().map(|w| w.center().1).sum::<f32>() / row.len() as f32;
            let row_h = row.iter().map(|w| w.height()).fold(0.0f32, f32::max);
            (cy - row_cy).abs() < 0.5 * row_h.max(word.height()).max(1.0)
        });
        if joins_last {
            if let Some(row) = rows.last_mut() {
                row.push(word);
            }
        } else {
            rows.push(vec![word]);
        }
    }

    rows.into_iter().map(merge_row).collect()
}

fn merge_row(mut row: Vec<TextBox>) -> TextBox {
    let arabic_words = row
        .iter()
        .filter(|w| detect_script(&w.text) == Script::Arabic)
        .count();
    let right_to_left = arabic_words * 2 > row.len();

    row.sort_by(|a, b| {
        let ord = a
            .center()
            .0
            .partial_cmp(&b.center().0)
            .unwrap_or(std::cmp::Ordering::Equal);
        if right_to_left { ord.reverse() } else { ord }
    });

    let (mut x1, mut y1, mut x2, mut y2) = (f32::INFINITY, f32::INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY);
    for w in &row {
        let (a, b, c, d) = w.rect();
        x1 = x1.min(a);
        y1 = y1.min(b);
        x2 = x2.max(c);
        y2 = y2.max(d);
    }

    let confidence = row.iter().map(|w| w.confidence).sum::<f32>() / row.len() as f32;
    let text = row
        .iter()
        .map(|w| w.text.trim())
        .collect::<Vec<_>>()
        .join(" ");

    TextBox::from_rect(text, (x1, y1, x2, y2), confidence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn word(text: &str, x: f32, y: f32, confidence: f32) -> TextBox {
        TextBox::from_rect(text, (x, y, x + 40.0, y + 20.0), confidence)
    }

    #[test]
    fn test_group_words_into_lines() {
        let words = vec![
            word("ALAMI", 100.0, 52.0, 0.8),
            word("MOHAMED", 10.0, 10.0, 0.9),
            word("Nom", 10.0, 50.0, 1.0),
            word("Prénom", 60.0, 11.0, 0.7),
        ];

        let lines = group_into_lines(words);

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "MOHAMED Prénom");
        assert_eq!(lines[1].text, "Nom ALAMI");
        assert!((lines[0].confidence - 0.8).abs() < 1e-6);
        assert_eq!(lines[1].rect(), (10.0, 50.0, 140.0, 72.0));
    }

    #[test]
    fn test_arabic_rows_read_right_to_left() {
        let words = vec![word("العلمي", 10.0, 10.0, 1.0), word("محمد", 100.0, 10.0, 1.0)];

        let lines = group_into_lines(words);

        assert_eq!(lines[0].text, "محمد العلمي");
    }

    #[test]
    fn test_extent_falls_back_to_boxes() {
        let raw = RawOcrResult::from_boxes(vec![word("A", 0.0, 0.0, 1.0), word("B", 200.0, 90.0, 1.0)]);
        assert_eq!(raw.extent(), Some((240.0, 110.0)));
        assert_eq!(raw.text, "A\nB");

        let raw = raw.with_image_size(800, 500);
        assert_eq!(raw.extent(), Some((800.0, 500.0)));
    }
}
