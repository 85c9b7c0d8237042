//! モデルメタデータの定義
//!
//! tar.gz形式のモデルファイルに同梱され、推論時のクラス名と入力サイズを決めます。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// モデルメタデータ
///
/// tar.gz形式で保存される情報：
/// - metadata.json: このメタデータ（JSON形式）
/// - model.bin: モデルの重み（バイナリ）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// クラスラベル（インデックス順）
    /// 例: ["A", "B", ..., "Z", "del", "nothing", "space"]
    pub class_labels: Vec<String>,

    /// モデル入力サイズ（正方形、通常64）
    pub image_size: u32,

    /// ドロップアウト率
    #[serde(default)]
    pub dropout: f64,

    /// 学習エポック数
    pub num_epochs: u32,

    /// 学習・検証サンプル数
    #[serde(default)]
    pub train_samples: usize,
    #[serde(default)]
    pub validation_samples: usize,

    /// 学習後の検証精度（0.0〜1.0）
    #[serde(default)]
    pub validation_accuracy: Option<f32>,

    /// モデルの学習時刻（ISO8601形式）
    pub trained_at: String,
}

impl ModelMetadata {
    /// 新しいメタデータを作成（学習時刻は現在時刻）
    pub fn new(class_labels: Vec<String>, image_size: u32, dropout: f64, num_epochs: u32) -> Self {
        Self {
            class_labels,
            image_size,
            dropout,
            num_epochs,
            train_samples: 0,
            validation_samples: 0,
            validation_accuracy: None,
            trained_at: chrono::Local::now().to_rfc3339(),
        }
    }

    pub fn num_classes(&self) -> usize {
        self.class_labels.len()
    }

    /// クラスインデックスからラベルを取得
    pub fn label_for(&self, index: usize) -> Option<&str> {
        self.class_labels.get(index).map(String::as_str)
    }

    /// メタデータをJSON文字列に変換
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize metadata to JSON")
    }

    /// JSON文字列からメタデータを生成
    pub fn from_json_string(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to deserialize metadata from JSON")
    }

    /// メタデータをログに出力
    pub fn log_summary(&self) {
        tracing::info!(
            classes = self.num_classes(),
            image_size = self.image_size,
            epochs = self.num_epochs,
            train_samples = self.train_samples,
            validation_samples = self.validation_samples,
            validation_accuracy = ?self.validation_accuracy,
            trained_at = %self.trained_at,
            "model metadata"
        );
    }
}
