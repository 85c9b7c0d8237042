//! 手ランドマーク検出サービスのクライアント
//!
//! ランドマーク検出自体は外部サービス（ブラックボックス）が行います。
//! ここではフレームを送信し、最初の1つの手のランドマークだけを受け取ります。

use anyhow::{Context, Result};
use async_trait::async_trait;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::model::config::{DetectionThresholds, LandmarkSettings};
use crate::types::{DetectionMode, HandDetection, Landmark};
use crate::vision::frame_codec::encode_jpeg_base64;

/// 手ランドマーク検出器
#[async_trait]
pub trait HandLandmarker: Send + Sync {
    async fn detect(&self, frame: &RgbImage, mode: DetectionMode) -> Result<HandDetection>;
}

#[derive(Debug, Serialize)]
struct LandmarkRequest {
    image: String,
    static_image_mode: bool,
    max_num_hands: u8,
    min_detection_confidence: f32,
    min_tracking_confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LandmarkResponse {
    #[serde(default)]
    hands: Vec<HandPayload>,
}

#[derive(Debug, Deserialize)]
struct HandPayload {
    #[serde(default)]
    landmarks: Vec<Landmark>,
}

impl LandmarkResponse {
    fn into_detection(self) -> HandDetection {
        match self.hands.into_iter().next() {
            Some(hand) if !hand.landmarks.is_empty() => HandDetection::Hand(hand.landmarks),
            _ => HandDetection::NoHand,
        }
    }
}

/// HTTP経由のランドマーク検出器
pub struct RemoteLandmarker {
    client: reqwest::Client,
    settings: LandmarkSettings,
}

impl RemoteLandmarker {
    pub fn new(settings: LandmarkSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .build()
            .context("Failed to build landmark HTTP client")?;
        Ok(Self { client, settings })
    }

    fn thresholds(&self, mode: DetectionMode) -> DetectionThresholds {
        if mode.is_static() {
            self.settings.static_thresholds
        } else {
            self.settings.stream_thresholds
        }
    }
}

#[async_trait]
impl HandLandmarker for RemoteLandmarker {
    async fn detect(&self, frame: &RgbImage, mode: DetectionMode) -> Result<HandDetection> {
        let thresholds = self.thresholds(mode);
        let stream_id = match mode {
            DetectionMode::StaticImage => None,
            DetectionMode::Stream { stream_id } => Some(stream_id.to_string()),
        };

        let request = LandmarkRequest {
            image: encode_jpeg_base64(frame)?,
            static_image_mode: mode.is_static(),
            max_num_hands: 1,
            min_detection_confidence: thresholds.min_detection_confidence,
            min_tracking_confidence: thresholds.min_tracking_confidence,
            stream_id,
        };

        let response = self
            .client
            .post(&self.settings.service_url)
            .json(&request)
            .send()
            .await
            .context("Landmark service request failed")?
            .error_for_status()
            .context("Landmark service returned an error status")?;

        let body: LandmarkResponse = response
            .json()
            .await
            .context("Landmark service returned an invalid body")?;

        Ok(body.into_detection())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_first_hand_is_used() {
        let body: LandmarkResponse = serde_json::from_value(serde_json::json!({
            "hands": [
                {"landmarks": [{"x": 0.1, "y": 0.2, "z": 0.0}]},
                {"landmarks": [{"x": 0.9, "y": 0.9}]}
            ]
        }))
        .unwrap();

        assert_eq!(
            body.into_detection(),
            HandDetection::Hand(vec![Landmark::new(0.1, 0.2)])
        );
    }

    #[test]
    fn test_empty_response_is_no_hand() {
        let body: LandmarkResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(body.into_detection(), HandDetection::NoHand);

        let body: LandmarkResponse =
            serde_json::from_str(r#"{"hands": [{"landmarks": []}]}"#).unwrap();
        assert_eq!(body.into_detection(), HandDetection::NoHand);
    }

    #[test]
    fn test_thresholds_follow_mode() {
        let landmarker = RemoteLandmarker::new(LandmarkSettings::default()).unwrap();

        let still = landmarker.thresholds(DetectionMode::StaticImage);
        assert_eq!(still.min_detection_confidence, 0.5);
        assert_eq!(still.min_tracking_confidence, 0.0);

        let stream = landmarker.thresholds(DetectionMode::Stream {
            stream_id: uuid::Uuid::new_v4(),
        });
        assert_eq!(stream.min_detection_confidence, 0.7);
        assert_eq!(stream.min_tracking_confidence, 0.7);
    }
}
