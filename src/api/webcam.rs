//! Webカメラのリアルタイム翻訳（WebSocket）
//!
//! 1メッセージ = 1フレーム。フレームごとに注釈付きJPEG（バイナリ）と
//! `{"prediction": ...}`（テキスト）の2通を返します。

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use uuid::Uuid;

use super::state::AppState;
use crate::pipeline::{FrameOutcome, SignPipeline};
use crate::types::{DetectionMode, Prediction};
use crate::vision::{decode_data_url, decode_frame, draw_region, encode_jpeg};

/// GET /webcam/ws
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// 受信メッセージからフレームのバイト列を取り出す（対象外なら None）
fn frame_bytes(message: Message) -> Option<Vec<u8>> {
    match message {
        Message::Text(text) => match decode_data_url(&text)? {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::debug!(error = %e, "invalid base64 frame skipped");
                None
            }
        },
        Message::Binary(bytes) => Some(bytes),
        _ => None,
    }
}

/// 1フレームを処理し、注釈付きJPEGと予測を返す
async fn process_frame(
    pipeline: &SignPipeline,
    bytes: &[u8],
    stream_id: Uuid,
) -> anyhow::Result<(Vec<u8>, Option<Prediction>)> {
    let mut frame = decode_frame(bytes)?;

    let prediction = match pipeline.analyze(&frame, DetectionMode::Stream { stream_id }).await {
        Ok(FrameOutcome::NoHand) => None,
        Ok(FrameOutcome::Classified { region, prediction }) => {
            draw_region(&mut frame, &region);
            Some(prediction)
        }
        Ok(FrameOutcome::ClassifierFailed { region, error }) => {
            draw_region(&mut frame, &region);
            tracing::warn!(%stream_id, error = %error, "classification failed");
            None
        }
        Err(e) => {
            tracing::warn!(%stream_id, error = %format!("{e:#}"), "hand landmark detection failed");
            None
        }
    };

    Ok((encode_jpeg(&frame)?, prediction))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let stream_id = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();
    tracing::info!(%stream_id, "webcam client connected");

    while let Some(message) = receiver.next().await {
        let message = match message {
            Ok(Message::Close(_)) => break,
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(%stream_id, error = %e, "webcam receive error");
                break;
            }
        };
        let Some(bytes) = frame_bytes(message) else {
            continue;
        };

        let (jpeg, prediction) = match process_frame(&state.pipeline, &bytes, stream_id).await {
            Ok(result) => result,
            Err(e) => {
                tracing::debug!(%stream_id, error = %format!("{e:#}"), "frame skipped");
                continue;
            }
        };

        let payload = json!({ "prediction": prediction }).to_string();
        if sender.send(Message::Binary(jpeg)).await.is_err()
            || sender.send(Message::Text(payload)).await.is_err()
        {
            break;
        }
    }

    tracing::info!(%stream_id, "webcam client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_bytes_filters_messages() {
        assert_eq!(frame_bytes(Message::Binary(vec![1, 2, 3])), Some(vec![1, 2, 3]));
        assert_eq!(frame_bytes(Message::Text("hello".into())), None);
        assert_eq!(
            frame_bytes(Message::Text("data:image/jpeg;base64,AQID".into())),
            Some(vec![1, 2, 3])
        );
        assert_eq!(frame_bytes(Message::Text("data:image/jpeg;base64,@@@".into())), None);
        assert_eq!(frame_bytes(Message::Ping(vec![])), None);
    }
}
