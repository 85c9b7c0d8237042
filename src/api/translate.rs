//! 画像・動画の翻訳エンドポイント

use axum::{
    body::Bytes,
    extract::{Multipart, State},
    Json,
};
use serde_json::{json, Value};
use std::path::Path;

use super::error::ApiError;
use super::state::AppState;
use crate::pipeline::FrameOutcome;
use crate::types::DetectionMode;
use crate::video::translate_video;
use crate::vision::decode_frame;

/// アップロードファイルのフィールド名
pub const FILE_FIELD: &str = "file";

const INVALID_VIDEO_TYPE: &str = "Invalid file type. Please upload an MP4, AVI, or MOV video.";

/// multipart から取り出したファイル
#[derive(Debug)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// `file` フィールドを読み出す（無ければ 400）
pub async fn read_file_field(multipart: &mut Multipart) -> Result<UploadedFile, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {e}")))?;
        return Ok(UploadedFile {
            file_name,
            content_type,
            bytes,
        });
    }
    Err(ApiError::bad_request("Missing 'file' field in upload"))
}

/// POST /image/predict, /predict-image
pub async fn predict_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let upload = read_file_field(&mut multipart).await?;
    let frame = decode_frame(&upload.bytes)
        .map_err(|e| ApiError::bad_request(format!("Invalid image file: {e:#}")))?;

    match state.pipeline.analyze(&frame, DetectionMode::StaticImage).await? {
        FrameOutcome::NoHand => Err(ApiError::not_found("No hand detected")),
        FrameOutcome::ClassifierFailed { error, .. } => Err(error.into()),
        FrameOutcome::Classified { region, prediction } => {
            tracing::info!(label = %prediction.label, confidence = prediction.confidence, "image classified");
            Ok(Json(json!({ "prediction": prediction, "region": region })))
        }
    }
}

/// 一時ファイルの拡張子（元ファイル名から、無ければ mp4）
fn upload_suffix(file_name: Option<&str>) -> String {
    file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_else(|| ".mp4".to_string())
}

/// POST /video/translate, /video/predict
pub async fn translate_video_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let upload = read_file_field(&mut multipart).await?;
    if !state.video.accepts(upload.content_type.as_deref()) {
        return Err(ApiError::bad_request(INVALID_VIDEO_TYPE));
    }

    // Drop 時に削除される
    let temp = tempfile::Builder::new()
        .prefix("signlink-upload-")
        .suffix(&upload_suffix(upload.file_name.as_deref()))
        .tempfile()
        .map_err(|e| ApiError::internal(format!("Failed to store upload: {e}")))?;
    tokio::fs::write(temp.path(), &upload.bytes)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to store upload: {e}")))?;

    tracing::info!(
        bytes = upload.bytes.len(),
        content_type = upload.content_type.as_deref().unwrap_or_default(),
        "video upload received"
    );

    let predictions =
        translate_video(state.pipeline.clone(), temp.path().to_path_buf(), &state.video).await?;
    Ok(Json(json!({ "predictions": predictions })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_suffix() {
        assert_eq!(upload_suffix(Some("clip.MOV")), ".mov");
        assert_eq!(upload_suffix(Some("clip.avi")), ".avi");
        assert_eq!(upload_suffix(Some("noext")), ".mp4");
        assert_eq!(upload_suffix(Some("weird.m p4")), ".mp4");
        assert_eq!(upload_suffix(None), ".mp4");
    }
}
