//! Process command - extract fields from a single card.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use cin_core::{CinConfig, CinPipeline, CinRecord, EngineKind, ExtractionResult, Field, RawOcrResult};

use super::load_config;
use crate::service::ExtractionService;

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input file (card image, OCR text, or saved OCR result)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Treat the input as plain OCR text
    #[arg(long, conflicts_with = "ocr_json")]
    text: bool,

    /// Treat the input as a saved OCR result (JSON)
    #[arg(long)]
    ocr_json: bool,

    /// OCR engine to use for images
    #[arg(short, long, value_enum)]
    engine: Option<EngineArg>,

    /// Show extraction confidence scores
    #[arg(long)]
    show_confidence: bool,

    /// Validate extracted data
    #[arg(long)]
    validate: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text summary
    Text,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

/// OCR engine selection on the command line.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum EngineArg {
    /// Google Vision when an API key is set, Tesseract otherwise
    Auto,
    /// Local tesseract binary
    Tesseract,
    /// Google Cloud Vision API
    GoogleVision,
}

impl From<EngineArg> for EngineKind {
    fn from(arg: EngineArg) -> Self {
        match arg {
            EngineArg::Auto => EngineKind::Auto,
            EngineArg::Tesseract => EngineKind::Tesseract,
            EngineArg::GoogleVision => EngineKind::GoogleVision,
        }
    }
}

/// What an input file holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputKind {
    /// Encoded card image, sent to an OCR engine.
    Image,
    /// Plain OCR text.
    Text,
    /// Serialized [`RawOcrResult`].
    OcrJson,
}

impl InputKind {
    /// Guess the kind from the file extension.
    pub fn detect(path: &Path) -> Option<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match extension.as_str() {
            "png" | "jpg" | "jpeg" | "webp" | "tiff" | "tif" | "bmp" => Some(InputKind::Image),
            "txt" => Some(InputKind::Text),
            "json" => Some(InputKind::OcrJson),
            _ => None,
        }
    }
}

/// Runs extraction for files of any [`InputKind`].
///
/// Text and saved OCR results go straight to the pipeline; images go
/// through the OCR service, which is only built when images are expected.
pub struct FileExtractor {
    pipeline: CinPipeline,
    service: Option<ExtractionService>,
}

impl FileExtractor {
    pub fn new(config: &CinConfig, with_ocr: bool) -> anyhow::Result<Self> {
        let service = if with_ocr {
            Some(ExtractionService::from_config(config)?)
        } else {
            None
        };

        Ok(Self {
            pipeline: CinPipeline::from_config(&config.extraction),
            service,
        })
    }

    pub async fn extract(&self, path: &Path, kind: InputKind) -> anyhow::Result<ExtractionResult> {
        match kind {
            InputKind::Text => {
                let text = fs::read_to_string(path)?;
                Ok(self.pipeline.run(&RawOcrResult::from_text(text))?)
            }
            InputKind::OcrJson => {
                let raw: RawOcrResult = serde_json::from_str(&fs::read_to_string(path)?)?;
                Ok(self.pipeline.run(&raw)?)
            }
            InputKind::Image => {
                let service = self
                    .service
                    .as_ref()
                    .ok_or_else(|| anyhow::anyhow!("No OCR engine configured for {}", path.display()))?;
                let image = tokio::fs::read(path).await?;
                Ok(service.extract(&image, None).await?)
            }
        }
    }
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    if let Some(engine) = args.engine {
        config.ocr.engine = engine.into();
    }

    // Check input file exists
    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let kind = if args.text {
        InputKind::Text
    } else if args.ocr_json {
        InputKind::OcrJson
    } else {
        InputKind::detect(&args.input).ok_or_else(|| {
            anyhow::anyhow!("Unsupported file format: {} (use --text or --ocr-json)", args.input.display())
        })?
    };

    info!("Processing {:?} input: {}", kind, args.input.display());

    let extractor = FileExtractor::new(&config, kind == InputKind::Image)?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.set_message(match kind {
        InputKind::Image => "Running OCR...",
        _ => "Extracting fields...",
    });

    let result = extractor.extract(&args.input, kind).await;
    pb.finish_and_clear();
    let result = result?;

    if args.validate {
        let issues = result.record.validate();
        if !issues.is_empty() {
            eprintln!("{}", style("Validation issues:").yellow());
            for issue in &issues {
                eprintln!("  - {}", issue);
            }
        }
    }

    let output = format_record(&result.record, args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    if args.show_confidence {
        print_confidence(&result);
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

fn print_confidence(result: &ExtractionResult) {
    println!();
    println!(
        "{} Side: {} ({:.1}%)",
        style("ℹ").blue(),
        result.record.side,
        result.side_confidence * 100.0
    );
    for (field, confidence) in &result.field_confidence {
        println!("  {:<18} {:.1}%", field.name(), confidence * 100.0);
    }
    println!(
        "{} Mean field confidence: {:.1}%",
        style("ℹ").blue(),
        result.mean_confidence() * 100.0
    );
    println!("{} Processing time: {}ms", style("ℹ").blue(), result.processing_time_ms);
    for warning in &result.warnings {
        println!("{} {}", style("!").yellow(), warning);
    }
}

pub fn format_record(record: &CinRecord, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(record)?),
        OutputFormat::Csv => format_csv(record),
        OutputFormat::Text => Ok(format_text(record)),
    }
}

fn format_csv(record: &CinRecord) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = vec!["side"];
    header.extend(Field::ALL.iter().map(|f| f.name()));
    wtr.write_record(&header)?;

    let mut row = vec![record.side.as_str()];
    row.extend(Field::ALL.iter().map(|f| record.get(*f).unwrap_or("")));
    wtr.write_record(&row)?;

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(record: &CinRecord) -> String {
    let mut output = String::new();

    output.push_str(&format!("Side: {}\n", record.side));
    for field in Field::ALL {
        if !field.allowed_on(record.side) {
            continue;
        }
        let value = record.get(field).unwrap_or("-");
        output.push_str(&format!("  {:<18} {}\n", field.name(), value));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use cin_core::CardSide;
    use pretty_assertions::assert_eq;

    fn front_record() -> CinRecord {
        let mut record = CinRecord::new(CardSide::Front);
        record.cin_number = Some("AB123456".to_string());
        record.last_name_fr = Some("ALAMI".to_string());
        record
    }

    #[test]
    fn test_detect_input_kind() {
        assert_eq!(InputKind::detect(Path::new("card.JPG")), Some(InputKind::Image));
        assert_eq!(InputKind::detect(Path::new("ocr.txt")), Some(InputKind::Text));
        assert_eq!(InputKind::detect(Path::new("ocr.json")), Some(InputKind::OcrJson));
        assert_eq!(InputKind::detect(Path::new("card.pdf")), None);
    }

    #[test]
    fn test_csv_output() {
        let csv = format_record(&front_record(), OutputFormat::Csv).unwrap();
        let mut lines = csv.lines();

        assert!(lines.next().unwrap().starts_with("side,cin_number,first_name_fr,last_name_fr"));
        assert!(lines.next().unwrap().starts_with("FRONT,AB123456,,ALAMI"));
    }

    #[test]
    fn test_text_output_lists_side_fields() {
        let text = format_record(&front_record(), OutputFormat::Text).unwrap();

        assert!(text.starts_with("Side: FRONT\n"));
        assert!(text.contains("AB123456"));
        assert!(text.contains("first_name_fr"));
        assert!(!text.contains("father_name_fr"));
    }

    #[tokio::test]
    async fn test_text_input_needs_no_engine() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("card.txt");
        fs::write(&path, "CIN: AB123456\nNom et prénom\nMOHAMED ALAMI").unwrap();

        let extractor = FileExtractor::new(&CinConfig::default(), false).unwrap();
        let result = extractor.extract(&path, InputKind::Text).await.unwrap();
        assert_eq!(result.record.first_name_fr.as_deref(), Some("MOHAMED"));

        let image = dir.path().join("card.png");
        assert!(extractor.extract(&image, InputKind::Image).await.is_err());
    }
}
