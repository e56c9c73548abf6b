//! Google Cloud Vision engine over the REST API.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use cin_core::{group_into_lines, GoogleVisionConfig, OcrError, RawOcrResult, TextBox};

use super::{image_dimensions, OcrEngine};

const NAME: &str = "google_vision";

/// Sends images to `images:annotate` with `TEXT_DETECTION`.
pub struct GoogleVisionEngine {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl GoogleVisionEngine {
    /// Create the engine; fails when no API key is configured.
    pub fn new(config: GoogleVisionConfig) -> Result<Self, OcrError> {
        let api_key = config.resolve_api_key().ok_or_else(|| {
            OcrError::Unavailable(format!("no Google Vision API key (set {})", config.api_key_env))
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| OcrError::engine(NAME, e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[derive(Serialize)]
struct AnnotateRequest {
    requests: Vec<ImageRequest>,
}

#[derive(Serialize)]
struct ImageRequest {
    image: ImageContent,
    features: Vec<Feature>,
}

#[derive(Serialize)]
struct ImageContent {
    content: String,
}

#[derive(Serialize)]
struct Feature {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<ImageResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageResponse {
    #[serde(default)]
    text_annotations: Vec<TextAnnotation>,
    error: Option<ApiStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TextAnnotation {
    description: String,
    bounding_poly: Option<BoundingPoly>,
}

#[derive(Debug, Deserialize)]
struct BoundingPoly {
    #[serde(default)]
    vertices: Vec<Vertex>,
}

#[derive(Debug, Default, Deserialize)]
struct Vertex {
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
}

#[derive(Debug, Deserialize)]
struct ApiStatus {
    #[serde(default)]
    message: String,
}

impl TextAnnotation {
    fn to_box(&self) -> Option<TextBox> {
        let vertices = &self.bounding_poly.as_ref()?.vertices;
        if vertices.len() != 4 {
            return None;
        }
        let mut bbox = [0.0f32; 8];
        for (i, v) in vertices.iter().enumerate() {
            bbox[2 * i] = v.x;
            bbox[2 * i + 1] = v.y;
        }
        Some(TextBox {
            bbox,
            text: self.description.clone(),
            confidence: 1.0,
        })
    }
}

/// Convert one image response: the first annotation is the full text, the
/// rest are words that get grouped into lines.
fn to_raw_result(response: ImageResponse) -> Result<RawOcrResult, OcrError> {
    if let Some(status) = response.error {
        return Err(OcrError::engine(NAME, status.message));
    }

    let mut annotations = response.text_annotations.into_iter();
    let Some(full) = annotations.next() else {
        return Ok(RawOcrResult::default());
    };

    let words: Vec<TextBox> = annotations.filter_map(|a| a.to_box()).collect();
    Ok(RawOcrResult {
        text: full.description,
        boxes: group_into_lines(words),
        image_size: None,
    })
}

#[async_trait]
impl OcrEngine for GoogleVisionEngine {
    fn name(&self) -> &str {
        NAME
    }

    async fn recognize(&self, image: &[u8]) -> Result<RawOcrResult, OcrError> {
        let (width, height) = image_dimensions(image)?;

        let body = AnnotateRequest {
            requests: vec![ImageRequest {
                image: ImageContent {
                    content: STANDARD.encode(image),
                },
                features: vec![Feature {
                    kind: "TEXT_DETECTION",
                }],
            }],
        };

        debug!("Sending {} byte image to Google Vision", image.len());

        let response = self
            .client
            .post(format!("{}/v1/images:annotate", self.endpoint))
            .query(&[("key", &self.api_key)])
            .json(&body)
            .send()
            .await
            .map_err(|e| OcrError::engine(NAME, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(OcrError::engine(NAME, format!("HTTP {}: {}", status, error_body)));
        }

        let parsed: AnnotateResponse = response
            .json()
            .await
            .map_err(|e| OcrError::engine(NAME, format!("invalid response: {}", e)))?;

        let first = parsed.responses.into_iter().next().unwrap_or_default();
        Ok(to_raw_result(first)?.with_image_size(width, height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn word(text: &str, x: f32, y: f32) -> serde_json::Value {
        serde_json::json!({
            "description": text,
            "boundingPoly": {"vertices": [
                {"x": x, "y": y}, {"x": x + 50.0, "y": y},
                {"x": x + 50.0, "y": y + 20.0}, {"x": x, "y": y + 20.0}
            ]}
        })
    }

    #[test]
    fn test_response_to_lines() {
        let json = serde_json::json!({
            "textAnnotations": [
                {"description": "ROYAUME DU MAROC\nAB123456"},
                word("ROYAUME", 10.0, 10.0),
                word("MAROC", 130.0, 11.0),
                word("DU", 70.0, 10.0),
                word("AB123456", 10.0, 60.0),
            ]
        });
        let response: ImageResponse = serde_json::from_value(json).unwrap();

        let raw = to_raw_result(response).unwrap();
        assert_eq!(raw.text, "ROYAUME DU MAROC\nAB123456");
        let lines: Vec<&str> = raw.boxes.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(lines, vec!["ROYAUME DU MAROC", "AB123456"]);
    }

    #[test]
    fn test_missing_vertex_coordinates_default_to_zero() {
        let json = serde_json::json!({
            "textAnnotations": [
                {"description": "CIN"},
                {"description": "CIN", "boundingPoly": {"vertices": [{}, {"x": 30}, {"x": 30, "y": 10}, {"y": 10}]}}
            ]
        });
        let response: ImageResponse = serde_json::from_value(json).unwrap();

        let raw = to_raw_result(response).unwrap();
        assert_eq!(raw.boxes[0].rect(), (0.0, 0.0, 30.0, 10.0));
    }

    #[test]
    fn test_api_error_is_engine_error() {
        let response: ImageResponse =
            serde_json::from_value(serde_json::json!({"error": {"code": 3, "message": "Bad image data."}})).unwrap();

        match to_raw_result(response) {
            Err(OcrError::Engine { engine, message }) => {
                assert_eq!(engine, NAME);
                assert_eq!(message, "Bad image data.");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_empty_response_is_empty_text() {
        let raw = to_raw_result(ImageResponse::default()).unwrap();
        assert!(raw.text.is_empty());
    }

    #[test]
    fn test_missing_key_is_unavailable() {
        let config = GoogleVisionConfig {
            api_key: None,
            api_key_env: "CIN_TEST_UNSET_VISION_ENGINE_KEY".to_string(),
            ..Default::default()
        };
        assert!(matches!(GoogleVisionEngine::new(config), Err(OcrError::Unavailable(_))));
    }
}
