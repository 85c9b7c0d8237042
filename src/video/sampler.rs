//! 動画の手話翻訳
//!
//! 一定間隔（既定 0.5 秒）ごとのフレームをパイプラインに通し、手が写っている
//! フレームの予測を時刻付きで集めます。デコードはブロッキングスレッドで行い、
//! フレームは有界チャネルで非同期側へ渡します。

use image::RgbImage;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::model::config::VideoSettings;
use crate::pipeline::{FrameOutcome, SignPipeline};
use crate::types::{DetectionMode, Prediction};
use crate::video::frame_extractor::{FrameExtractor, FrameStats, VideoStreamInfo};

/// デコード側と推論側の間に溜めるフレーム数
const FRAME_QUEUE_DEPTH: usize = 4;

/// サンプリングしたフレームの予測
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FramePrediction {
    pub frame: u32,
    pub timestamp_sec: f64,
    pub prediction: Prediction,
}

/// 動画翻訳のエラー
#[derive(Debug, thiserror::Error)]
pub enum VideoError {
    #[error("Failed to open video file for reading. The file may be corrupted or unreadable.")]
    Open(#[source] anyhow::Error),
    #[error("Video contains no frames. The file may be corrupted.")]
    NoFrames,
    #[error("No hands detected in video or video may be corrupted.")]
    NoHands,
    #[error("Failed to decode video: {0}")]
    Decode(#[source] anyhow::Error),
    #[error("Hand landmark detection failed: {0}")]
    Landmarks(#[source] anyhow::Error),
}

/// 有効なFPS（0・非有限値はフォールバック値）
pub fn effective_fps(reported: f64, fallback: f64) -> f64 {
    if reported.is_finite() && reported > 0.0 {
        reported
    } else {
        fallback
    }
}

/// サンプリング間隔（フレーム数、最低1）
pub fn sample_interval(fps: f64, interval_secs: f64) -> u32 {
    ((fps * interval_secs) as u32).max(1)
}

/// フレーム番号から秒（小数第2位で丸め）
pub fn timestamp_sec(frame: u32, fps: f64) -> f64 {
    (frame as f64 / fps * 100.0).round() / 100.0
}

/// 受信したフレームを順にパイプラインへ通す
///
/// 手が無いフレームは飛ばし、分類器が失敗したフレームは "None" で埋める。
/// ランドマーク検出が失敗した時点で打ち切る。
pub async fn collect_predictions(
    mut rx: mpsc::Receiver<(RgbImage, u32)>,
    pipeline: &SignPipeline,
    fps: f64,
) -> Result<Vec<FramePrediction>, VideoError> {
    let mut predictions = Vec::new();

    while let Some((frame, index)) = rx.recv().await {
        let prediction = match pipeline.analyze(&frame, DetectionMode::StaticImage).await {
            Ok(FrameOutcome::NoHand) => continue,
            Ok(FrameOutcome::Classified { prediction, .. }) => prediction,
            Ok(FrameOutcome::ClassifierFailed { error, .. }) => {
                tracing::warn!(frame = index, error = %error, "classification failed for frame");
                Prediction::none()
            }
            Err(e) => return Err(VideoError::Landmarks(e)),
        };

        predictions.push(FramePrediction {
            frame: index,
            timestamp_sec: timestamp_sec(index, fps),
            prediction,
        });
    }
    Ok(predictions)
}

/// デコード結果と予測から空の動画・手の無い動画を弾く
pub fn check_results(predictions: &[FramePrediction], stats: &FrameStats) -> Result<(), VideoError> {
    if stats.total_frames == 0 {
        return Err(VideoError::NoFrames);
    }
    if predictions.is_empty() {
        return Err(VideoError::NoHands);
    }
    Ok(())
}

/// 動画ファイルを翻訳する
///
/// 手が検出されたフレームの予測を返す。分類器が失敗したフレームは
/// ログを出して "None" の予測で埋める。
pub async fn translate_video(
    pipeline: Arc<SignPipeline>,
    video_path: PathBuf,
    settings: &VideoSettings,
) -> Result<Vec<FramePrediction>, VideoError> {
    let info_path = video_path.clone();
    let info: VideoStreamInfo =
        tokio::task::spawn_blocking(move || FrameExtractor::probe(info_path))
            .await
            .map_err(|e| VideoError::Open(e.into()))?
            .map_err(VideoError::Open)?;

    let fps = effective_fps(info.fps, settings.fallback_fps);
    let extractor = FrameExtractor::new(sample_interval(fps, settings.sample_interval_secs));
    tracing::info!(
        width = info.width,
        height = info.height,
        fps,
        duration_sec = info.duration_sec,
        interval = extractor.frame_interval(),
        "translating video"
    );

    let (tx, rx) = mpsc::channel::<(RgbImage, u32)>(FRAME_QUEUE_DEPTH);
    let decoder = tokio::task::spawn_blocking(move || {
        extractor.process_frames_sync(&video_path, |image, index| {
            tx.blocking_send((image, index))
                .map_err(|_| anyhow::anyhow!("frame receiver closed"))
        })
    });

    let collected = collect_predictions(rx, &pipeline, fps).await;

    // 途中で抜けた場合は受信側が閉じているのでデコード側も止まる
    let decoded = decoder.await.map_err(|e| VideoError::Decode(e.into()))?;
    let predictions = collected?;
    let stats: FrameStats = decoded.map_err(VideoError::Decode)?;
    check_results(&predictions, &stats)?;

    tracing::info!(
        total_frames = stats.total_frames,
        sampled_frames = stats.sampled_frames,
        predictions = predictions.len(),
        "video translated"
    );
    Ok(predictions)
}
