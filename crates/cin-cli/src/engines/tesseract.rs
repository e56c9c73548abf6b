//! Local Tesseract engine driven through its command line.

use std::io::ErrorKind;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use cin_core::{OcrError, RawOcrResult, TesseractConfig, TextBox};

use super::{image_dimensions, OcrEngine};

const NAME: &str = "tesseract";

/// Word level in Tesseract TSV output.
const WORD_LEVEL: &str = "5";

/// Runs the `tesseract` binary on a temporary copy of the image.
pub struct TesseractEngine {
    config: TesseractConfig,
}

impl TesseractEngine {
    pub fn new(config: TesseractConfig) -> Self {
        Self { config }
    }

    fn languages(&self) -> String {
        if self.config.languages.is_empty() {
            "fra+ara+eng".to_string()
        } else {
            self.config.languages.join("+")
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        NAME
    }

    async fn recognize(&self, image: &[u8]) -> Result<RawOcrResult, OcrError> {
        let (width, height) = image_dimensions(image)?;
        let extension = image::guess_format(image)
            .ok()
            .and_then(|f| f.extensions_str().first().copied())
            .unwrap_or("png");

        let file = tempfile::Builder::new()
            .prefix("cin-")
            .suffix(&format!(".{}", extension))
            .tempfile()?;
        tokio::fs::write(file.path(), image).await?;

        let mut command = Command::new(&self.config.binary);
        command.arg(file.path()).arg("stdout").arg("-l").arg(self.languages());
        if let Some(psm) = self.config.page_segmentation_mode {
            command.arg("--psm").arg(psm.to_string());
        }
        command.arg("tsv");

        debug!("Running {} on {}x{} image", self.config.binary, width, height);

        let output = command.output().await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => OcrError::Unavailable(format!("{} binary not found", self.config.binary)),
            _ => OcrError::Io(e),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::engine(NAME, stderr.trim()));
        }

        let lines = parse_tsv(&String::from_utf8_lossy(&output.stdout));
        debug!("Tesseract returned {} lines", lines.len());

        Ok(RawOcrResult::from_boxes(lines).with_image_size(width, height))
    }
}

/// Words of one TSV line, keyed by page, block, paragraph and line number.
struct LineWords {
    key: [String; 4],
    words: Vec<(String, f32)>,
    rect: (f32, f32, f32, f32),
}

/// Group Tesseract TSV words into line boxes in output order.
///
/// Word confidences of -1 (no recognition) are ignored in the line mean;
/// a line with none left gets 0.
pub fn parse_tsv(tsv: &str) -> Vec<TextBox> {
    let mut lines: Vec<LineWords> = Vec::new();

    for row in tsv.lines().skip(1) {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 || cols[0] != WORD_LEVEL {
            continue;
        }
        let text = cols[11].trim();
        if text.is_empty() {
            continue;
        }

        let num = |i: usize| cols[i].trim().parse::<f32>().unwrap_or(0.0);
        let (left, top, width, height) = (num(6), num(7), num(8), num(9));
        let confidence = num(10);
        let key = [cols[1], cols[2], cols[3], cols[4]].map(str::to_string);
        let rect = (left, top, left + width, top + height);

        match lines.iter_mut().find(|l| l.key == key) {
            Some(line) => {
                line.words.push((text.to_string(), confidence));
                line.rect = (
                    line.rect.0.min(rect.0),
                    line.rect.1.min(rect.1),
                    line.rect.2.max(rect.2),
                    line.rect.3.max(rect.3),
                );
            }
            None => lines.push(LineWords {
                key,
                words: vec![(text.to_string(), confidence)],
                rect,
            }),
        }
    }

    lines
        .into_iter()
        .map(|line| {
            let scored: Vec<f32> = line.words.iter().map(|(_, c)| *c).filter(|c| *c >= 0.0).collect();
            let confidence = if scored.is_empty() {
                0.0
            } else {
                (scored.iter().sum::<f32>() / scored.len() as f32 / 100.0).clamp(0.0, 1.0)
            };
            let text = line
                .words
                .iter()
                .map(|(w, _)| w.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            TextBox::from_rect(text, line.rect, confidence)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TSV: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
1\t1\t0\t0\t0\t0\t0\t0\t800\t500\t-1\t
4\t1\t1\t1\t1\t0\t20\t10\t300\t30\t-1\t
5\t1\t1\t1\t1\t1\t20\t10\t120\t30\t96.5\tROYAUME
5\t1\t1\t1\t1\t2\t150\t12\t40\t28\t90.5\tDU
5\t1\t1\t1\t1\t3\t200\t10\t120\t30\t-1\tMAROC
5\t1\t1\t1\t2\t1\t600\t60\t180\t30\t80\tAB123456
5\t1\t1\t1\t2\t2\t790\t60\t5\t30\t10\t ";

    #[test]
    fn test_parse_tsv_lines() {
        let lines = parse_tsv(TSV);

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "ROYAUME DU MAROC");
        assert_eq!(lines[0].rect(), (20.0, 10.0, 320.0, 40.0));
        assert!((lines[0].confidence - 0.935).abs() < 1e-4);
        assert_eq!(lines[1].text, "AB123456");
        assert!((lines[1].confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_parse_empty_tsv() {
        assert!(parse_tsv("").is_empty());
        assert!(parse_tsv("level\tpage_num\n").is_empty());
    }

    #[test]
    fn test_languages() {
        let engine = TesseractEngine::new(TesseractConfig::default());
        assert_eq!(engine.languages(), "fra+ara+eng");
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let engine = TesseractEngine::new(TesseractConfig {
            binary: "cin-test-no-such-tesseract".to_string(),
            ..Default::default()
        });

        let mut png = Vec::new();
        image::DynamicImage::new_rgb8(4, 4)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let result = engine.recognize(&png).await;
        assert!(matches!(result, Err(OcrError::Unavailable(_))));
    }
}
