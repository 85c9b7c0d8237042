//! 手領域画像の分類（推論のディスパッチ）
//!
//! 切り出した手の画像を分類器へ渡し、型付きの [`Prediction`] を返します。
//! 分類器はホスト型推論ワークフロー、または学習済みのローカルモデルです。

pub mod response;
pub mod retry;
pub mod workflow;
#[cfg(feature = "ml")]
pub mod local;

use async_trait::async_trait;
use image::RgbImage;
use std::time::Duration;

use crate::types::Prediction;

pub use response::parse_provider_payload;
pub use retry::with_retry;
pub use workflow::WorkflowClient;
#[cfg(feature = "ml")]
pub use local::LocalClassifier;

/// 分類エラー
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("failed to encode image: {0}")]
    Encode(String),
    #[error("inference request failed: {0}")]
    Transport(String),
    #[error("inference service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("inference request timed out after {0:?}")]
    Timeout(Duration),
    #[error("unexpected inference response: {0}")]
    Decode(String),
    #[error("local model error: {0}")]
    Model(String),
    #[error("inference service is not configured: {0} is missing")]
    NotConfigured(&'static str),
}

impl ClassifierError {
    /// 再試行で回復し得るエラーか（通信エラー、タイムアウト、429、5xx）
    pub fn is_transient(&self) -> bool {
        match self {
            ClassifierError::Transport(_) | ClassifierError::Timeout(_) => true,
            ClassifierError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// 手話文字の分類器
#[async_trait]
pub trait SignClassifier: Send + Sync {
    async fn classify(&self, crop: &RgbImage) -> Result<Prediction, ClassifierError>;
}

/// 設定が足りない分類器
///
/// 起動は止めず、分類のたびに何が足りないかを返す。
#[derive(Debug, Clone, Copy)]
pub struct UnconfiguredClassifier {
    pub missing: &'static str,
}

#[async_trait]
impl SignClassifier for UnconfiguredClassifier {
    async fn classify(&self, _crop: &RgbImage) -> Result<Prediction, ClassifierError> {
        Err(ClassifierError::NotConfigured(self.missing))
    }
}
