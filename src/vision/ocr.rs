//! OCR (Optical Character Recognition) module
//!
//! Recognition runs in an external service. The pipeline only depends on the
//! [`TextRecognizer`] contract; [`HttpRecognizer`] is the production backend,
//! posting the JPEG-encoded frame to a JSON endpoint.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FrameError, RecognitionError};
use crate::vision::codec::CompressedImage;
use crate::vision::RecognizedText;

/// Clockwise rotation needed to bring a frame upright
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Map a producer-reported rotation; anything but a right angle is malformed
    pub fn from_degrees(degrees: u32) -> Result<Self, FrameError> {
        match degrees {
            0 => Ok(Self::Deg0),
            90 => Ok(Self::Deg90),
            180 => Ok(Self::Deg180),
            270 => Ok(Self::Deg270),
            other => Err(FrameError::UnsupportedRotation(other)),
        }
    }

    pub fn degrees(&self) -> u32 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }
}

/// What the recognition service receives for one frame
#[derive(Debug, Clone)]
pub struct RecognizerInput {
    /// Frame sequence number, for logging
    pub frame_id: u64,
    /// Full-frame JPEG
    pub image: CompressedImage,
    /// Rotation the service applies before recognizing
    pub rotation: Rotation,
}

/// Asynchronous text recognition service
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// Recognize the text in one frame, yielding blocks and lines in reading order
    async fn recognize(&self, input: RecognizerInput) -> Result<RecognizedText, RecognitionError>;
}

/// Request body sent to the recognition endpoint
#[derive(Debug, Serialize)]
struct RecognitionRequest<'a> {
    image: &'a str,
    width: u32,
    height: u32,
    rotation: u32,
}

/// Response body: either the block/line structure or a service error
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RecognitionResponse {
    Failure { error: String },
    Success(RecognizedText),
}

/// Recognition backend talking JSON over HTTP
pub struct HttpRecognizer {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpRecognizer {
    /// Create a recognizer for `endpoint` with a per-request timeout
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create recognition HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    /// Endpoint frames are posted to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TextRecognizer for HttpRecognizer {
    async fn recognize(&self, input: RecognizerInput) -> Result<RecognizedText, RecognitionError> {
        let encoded = BASE64.encode(&input.image.jpeg);
        let body = RecognitionRequest {
            image: &encoded,
            width: input.image.width,
            height: input.image.height,
            rotation: input.rotation.degrees(),
        };

        debug!(
            "Posting frame {} ({} JPEG bytes) to {}",
            input.frame_id,
            input.image.jpeg.len(),
            self.endpoint
        );

        let response = self.client.post(&self.endpoint).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RecognitionError::Status(status.as_u16()));
        }

        let bytes = response.bytes().await?;
        parse_response(&bytes)
    }
}

/// Decode a recognition response body
fn parse_response(body: &[u8]) -> Result<RecognizedText, RecognitionError> {
    match serde_json::from_slice::<RecognitionResponse>(body)? {
        RecognitionResponse::Success(text) => Ok(text),
        RecognitionResponse::Failure { error } => Err(RecognitionError::Service(error)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::Rect;

    #[test]
    fn test_rotation_from_degrees() {
        assert_eq!(Rotation::from_degrees(0).unwrap(), Rotation::Deg0);
        assert_eq!(Rotation::from_degrees(270).unwrap().degrees(), 270);
        assert!(matches!(
            Rotation::from_degrees(45),
            Err(FrameError::UnsupportedRotation(45))
        ));
        assert!(Rotation::from_degrees(360).is_err());
    }

    #[test]
    fn test_parse_response_blocks_and_lines() {
        let body = br#"{
            "blocks": [
                {"lines": [
                    {"text": "Coffee", "bounding_box": {"left": 1, "top": 2, "right": 30, "bottom": 12}},
                    {"text": "120", "bounding_box": null}
                ]},
                {"lines": [{"text": "THB"}]}
            ]
        }"#;

        let text = parse_response(body).unwrap();
        assert_eq!(text.blocks.len(), 2);

        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].text, "Coffee");
        assert_eq!(lines[0].bounding_box, Some(Rect::new(1, 2, 30, 12)));
        assert_eq!(lines[1].bounding_box, None);
        assert_eq!(lines[2].bounding_box, None);
    }

    #[test]
    fn test_parse_response_empty_object_is_no_text() {
        let text = parse_response(b"{}").unwrap();
        assert!(text.blocks.is_empty());
    }

    #[test]
    fn test_parse_response_service_error() {
        let err = parse_response(br#"{"error": "model not loaded"}"#).unwrap_err();
        match err {
            RecognitionError::Service(message) => assert_eq!(message, "model not loaded"),
            other => panic!("Expected service error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_response_malformed() {
        assert!(matches!(
            parse_response(b"not json"),
            Err(RecognitionError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_request_body_shape() {
        let body = RecognitionRequest {
            image: "AAEC",
            width: 640,
            height: 480,
            rotation: 90,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["image"], "AAEC");
        assert_eq!(json["rotation"], 90);
        assert_eq!(json["width"], 640);
    }

    #[test]
    fn test_http_recognizer_keeps_endpoint() {
        let recognizer = HttpRecognizer::new("http://127.0.0.1:9/ocr", Duration::from_millis(50)).unwrap();
        assert_eq!(recognizer.endpoint(), "http://127.0.0.1:9/ocr");
    }
}
