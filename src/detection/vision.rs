//! Vision-model inference adapter
//!
//! Asks an Anthropic vision model to list the objects in a frame as JSON and
//! converts its normalized boxes to image pixels.

use std::time::Duration;

use base64::Engine;
use serde::{Deserialize, Serialize};

use super::{BoundingBox, Detection, Detector, Frame};
use crate::{Error, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const ANTHROPIC_VERSION: &str = "2023-06-01";

const DETECTION_PROMPT: &str = "List the distinct physical objects visible in this image \
that matter to a visually-impaired pedestrian. Answer with only a JSON array, no prose. \
Each element: {\"label\": short lowercase noun, \"confidence\": number 0-1, \
\"box\": [x0, y0, x1, y1] normalized to 0-1 with the origin at the top left}. \
Answer [] if nothing is visible.";

#[derive(Debug, Serialize)]
struct MessageRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: Vec<ContentBlock<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ContentBlock<'a> {
    Text { text: &'a str },
    Image { source: ImageSource<'a> },
}

#[derive(Debug, Serialize)]
struct ImageSource<'a> {
    #[serde(rename = "type")]
    source_type: &'a str,
    media_type: &'a str,
    data: String,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Vec<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    text: Option<String>,
}

/// One object as the model reports it
#[derive(Debug, Deserialize)]
struct RawDetection {
    label: String,
    confidence: f32,
    #[serde(rename = "box")]
    bbox: [f32; 4],
}

/// [`Detector`] backed by the Anthropic messages API
pub struct VisionDetector {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl VisionDetector {
    /// Create a detector
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing
    pub fn new(api_key: String, base_url: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "Anthropic API key required for object detection".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        })
    }

    async fn request(&self, frame: &Frame) -> Result<String> {
        let request = MessageRequest {
            model: &self.model,
            max_tokens: 1024,
            messages: vec![Message {
                role: "user",
                content: vec![
                    ContentBlock::Image {
                        source: ImageSource {
                            source_type: "base64",
                            media_type: normalize_mime_type(&frame.mime_type),
                            data: base64::engine::general_purpose::STANDARD.encode(&frame.data),
                        },
                    },
                    ContentBlock::Text {
                        text: DETECTION_PROMPT,
                    },
                ],
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Inference(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Inference(format!("API error {status}: {body}")));
        }

        let result: MessageResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("parse error: {e}")))?;

        Ok(result
            .content
            .into_iter()
            .filter_map(|c| c.text)
            .collect::<Vec<_>>()
            .join(""))
    }
}

impl Detector for VisionDetector {
    fn detect(&self, frame: &Frame, threshold: f32) -> Result<Vec<Detection>> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Inference(format!("no async runtime: {e}")))?;
        let text = handle.block_on(self.request(frame))?;
        let detections = parse_detections(&text, frame.width, frame.height, threshold)?;
        tracing::debug!(count = detections.len(), model = %self.model, "vision detections");
        Ok(detections)
    }
}

/// Parse the model's JSON answer into pixel-space detections
///
/// Code fences around the array are tolerated. Entries below `threshold`
/// are dropped; model order is kept.
///
/// # Errors
///
/// Returns error if the answer is not a JSON array of detections
#[allow(clippy::cast_precision_loss)]
pub fn parse_detections(
    text: &str,
    width: u32,
    height: u32,
    threshold: f32,
) -> Result<Vec<Detection>> {
    let json = strip_code_fence(text);
    let raw: Vec<RawDetection> = serde_json::from_str(json)
        .map_err(|e| Error::Inference(format!("unexpected detector answer: {e}")))?;

    let (w, h) = (width as f32, height as f32);
    Ok(raw
        .into_iter()
        .filter(|d| d.confidence >= threshold)
        .map(|d| {
            let [x0, y0, x1, y1] = d.bbox.map(|v| v.clamp(0.0, 1.0));
            Detection {
                label: d.label.trim().to_lowercase(),
                confidence: d.confidence.clamp(0.0, 1.0),
                bounding_box: BoundingBox::new(
                    x0.min(x1) * w,
                    y0.min(y1) * h,
                    x0.max(x1) * w,
                    y0.max(y1) * h,
                ),
            }
        })
        .collect())
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Anthropic accepts png, gif, webp and jpeg
fn normalize_mime_type(mime_type: &str) -> &'static str {
    match mime_type.to_lowercase().as_str() {
        "image/png" => "image/png",
        "image/gif" => "image/gif",
        "image/webp" => "image/webp",
        _ => "image/jpeg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_scales_boxes() {
        let text = r#"[{"label": "Chair", "confidence": 0.9, "box": [0.1, 0.2, 0.5, 0.6]}]"#;
        let dets = parse_detections(text, 100, 200, 0.5).unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].label, "chair");
        let b = dets[0].bounding_box;
        assert!((b.left - 10.0).abs() < 1e-4);
        assert!((b.top - 40.0).abs() < 1e-4);
        assert!((b.right - 50.0).abs() < 1e-4);
        assert!((b.bottom - 120.0).abs() < 1e-4);
    }

    #[test]
    fn threshold_filters_and_order_is_kept() {
        let text = r#"```json
[{"label": "person", "confidence": 0.7, "box": [0,0,1,1]},
 {"label": "cat", "confidence": 0.3, "box": [0,0,1,1]},
 {"label": "door", "confidence": 0.5, "box": [0,0,1,1]}]
```"#;
        let dets = parse_detections(text, 10, 10, 0.5).unwrap();
        let labels: Vec<_> = dets.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(labels, vec!["person", "door"]);
    }

    #[test]
    fn prose_is_an_inference_error() {
        let err = parse_detections("I see a chair.", 10, 10, 0.5).unwrap_err();
        assert!(matches!(err, Error::Inference(_)));
    }

    #[test]
    fn empty_array_is_no_detections() {
        assert!(parse_detections("[]", 10, 10, 0.0).unwrap().is_empty());
    }

    #[test]
    fn requires_api_key() {
        assert!(VisionDetector::new(String::new(), "http://x".into(), "m".into()).is_err());
    }
}
