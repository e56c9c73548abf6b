//! Core library for Moroccan identity card (CIN) field extraction.
//!
//! This crate provides:
//! - OCR result types shared with engine adapters
//! - Text normalization for bilingual French/Arabic OCR output
//! - Front/back side classification
//! - Rule-based field extractors (CIN number, names, birth date and place,
//!   parentage, address, machine-readable zone)
//! - Record assembly with side consistency and confidence arbitration

pub mod card;
pub mod error;
pub mod models;
pub mod normalize;
pub mod ocr;

pub use card::{
    CinPipeline, FieldExtractor, FieldMatch, MatchPolicy, Pass, PipelineStage, RecordAssembler,
    SideClassifier, SideDecision,
};
pub use error::{CinError, OcrError, Result};
pub use models::config::{CinConfig, EngineKind, ExtractionConfig, GoogleVisionConfig, OcrConfig, ServerConfig, TesseractConfig};
pub use models::record::{CardSide, CinRecord, ExtractionResult, Field};
pub use normalize::{NormalizedLine, NormalizedText, Script, TextNormalizer};
pub use ocr::{group_into_lines, RawOcrResult, TextBox};
