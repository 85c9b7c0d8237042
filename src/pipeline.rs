//! 1フレーム分の手話認識パイプライン
//!
//! ランドマーク検出 → 手領域 → 切り出し → 分類 の順に処理します。
//! 画像・動画・Webカメラの各入力で共通に使います。

use anyhow::Result;
use image::RgbImage;
use std::sync::Arc;

use crate::inference::{ClassifierError, SignClassifier};
use crate::types::{DetectionMode, Prediction};
use crate::vision::{crop_hand, HandLandmarker, HandRegion};

/// 1フレームの処理結果
#[derive(Debug)]
pub enum FrameOutcome {
    /// 手が検出されなかった（または領域が潰れた）
    NoHand,
    /// 分類できた
    Classified {
        region: HandRegion,
        prediction: Prediction,
    },
    /// 手領域はあるが分類器が失敗した
    ClassifierFailed {
        region: HandRegion,
        error: ClassifierError,
    },
}

impl FrameOutcome {
    pub fn region(&self) -> Option<&HandRegion> {
        match self {
            FrameOutcome::NoHand => None,
            FrameOutcome::Classified { region, .. } | FrameOutcome::ClassifierFailed { region, .. } => {
                Some(region)
            }
        }
    }
}

/// 手話認識パイプライン
pub struct SignPipeline {
    landmarker: Arc<dyn HandLandmarker>,
    classifier: Arc<dyn SignClassifier>,
    padding: u32,
}

impl SignPipeline {
    pub fn new(
        landmarker: Arc<dyn HandLandmarker>,
        classifier: Arc<dyn SignClassifier>,
        padding: u32,
    ) -> Self {
        Self {
            landmarker,
            classifier,
            padding,
        }
    }

    /// フレームを処理する
    ///
    /// ランドマーク検出の失敗だけがエラーになる。分類器の失敗は
    /// [`FrameOutcome::ClassifierFailed`] として返し、扱いは呼び出し側が決める。
    pub async fn analyze(&self, frame: &RgbImage, mode: DetectionMode) -> Result<FrameOutcome> {
        let detection = self.landmarker.detect(frame, mode).await?;

        let Some((region, crop)) = crop_hand(frame, &detection, self.padding) else {
            return Ok(FrameOutcome::NoHand);
        };

        Ok(match self.classifier.classify(&crop).await {
            Ok(prediction) => FrameOutcome::Classified { region, prediction },
            Err(error) => FrameOutcome::ClassifierFailed { region, error },
        })
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::types::HandDetection;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_hand_is_cropped_and_classified() {
        let classifier = Arc::new(CountingClassifier::default());
        let pipeline = SignPipeline::new(Arc::new(FixedLandmarker::centered()), classifier.clone(), 20);

        let outcome = pipeline
            .analyze(&RgbImage::new(200, 100), DetectionMode::StaticImage)
            .await
            .unwrap();

        match outcome {
            FrameOutcome::Classified { region, prediction } => {
                assert_eq!(region, HandRegion { x_min: 60, y_min: 20, x_max: 140, y_max: 80 });
                assert_eq!(prediction.label, "80x60");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_hand_skips_classifier() {
        let classifier = Arc::new(CountingClassifier::default());
        let pipeline = SignPipeline::new(
            Arc::new(FixedLandmarker(HandDetection::NoHand)),
            classifier.clone(),
            20,
        );

        let outcome = pipeline
            .analyze(&RgbImage::new(64, 64), DetectionMode::StaticImage)
            .await
            .unwrap();

        assert!(matches!(outcome, FrameOutcome::NoHand));
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_classifier_failure_keeps_region() {
        let classifier = Arc::new(CountingClassifier { fail: true, ..Default::default() });
        let pipeline = SignPipeline::new(Arc::new(FixedLandmarker::centered()), classifier, 0);

        let outcome = pipeline
            .analyze(&RgbImage::new(100, 100), DetectionMode::StaticImage)
            .await
            .unwrap();

        assert!(matches!(outcome, FrameOutcome::ClassifierFailed { .. }));
        assert!(outcome.region().is_some());
    }
}
