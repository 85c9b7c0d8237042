//! 結合テスト用の偽ランドマーク検出器・分類器

#![allow(dead_code)]

use async_trait::async_trait;
use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::{Arc, Mutex};

use signlink::api::AppState;
use signlink::db::Database;
use signlink::inference::{ClassifierError, SignClassifier};
use signlink::model::config::VideoSettings;
use signlink::pipeline::SignPipeline;
use signlink::types::{DetectionMode, HandDetection, Landmark, Prediction};
use signlink::vision::{HandLandmarker, DEFAULT_PADDING};

/// 固定の検出結果を返し、呼ばれたモードを記録する
pub struct FakeLandmarker {
    detection: HandDetection,
    pub modes: Mutex<Vec<DetectionMode>>,
}

impl FakeLandmarker {
    pub fn with_hand() -> Self {
        Self {
            detection: HandDetection::Hand(vec![
                Landmark::new(0.25, 0.25),
                Landmark::new(0.75, 0.75),
            ]),
            modes: Mutex::new(Vec::new()),
        }
    }

    pub fn without_hand() -> Self {
        Self {
            detection: HandDetection::NoHand,
            modes: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl HandLandmarker for FakeLandmarker {
    async fn detect(&self, _frame: &RgbImage, mode: DetectionMode) -> anyhow::Result<HandDetection> {
        self.modes.lock().unwrap().push(mode);
        Ok(self.detection.clone())
    }
}

/// 固定ラベルを返す（`fail` なら 503 相当のエラー）
pub struct FakeClassifier {
    pub label: &'static str,
    pub fail: bool,
}

#[async_trait]
impl SignClassifier for FakeClassifier {
    async fn classify(&self, _crop: &RgbImage) -> Result<Prediction, ClassifierError> {
        if self.fail {
            return Err(ClassifierError::Status {
                status: 503,
                body: "provider unavailable".into(),
            });
        }
        Ok(Prediction::new(self.label, 0.93))
    }
}

pub async fn app_state(landmarker: Arc<FakeLandmarker>, classifier: FakeClassifier) -> AppState {
    let db = Database::in_memory().await.unwrap();
    let pipeline = Arc::new(SignPipeline::new(landmarker, Arc::new(classifier), DEFAULT_PADDING));
    AppState::new(pipeline, db, VideoSettings::default())
}

/// 単色のPNG画像
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb([180, 140, 120]));
    let mut buf = Vec::new();
    image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
    buf
}
