use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 手のランドマーク座標
///
/// x, y は画像の幅・高さに対する比率（0.0〜1.0）。
/// 手が画面端にかかっている場合は範囲外の値も取り得る。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: 0.0 }
    }
}

/// ランドマーク検出結果（手は最大1つ）
#[derive(Debug, Clone, PartialEq)]
pub enum HandDetection {
    NoHand,
    Hand(Vec<Landmark>),
}

impl HandDetection {
    pub fn landmarks(&self) -> Option<&[Landmark]> {
        match self {
            HandDetection::NoHand => None,
            HandDetection::Hand(points) => Some(points),
        }
    }
}

/// 検出モード
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionMode {
    /// 静止画モード（画像・動画フレーム）: フレームごとに独立して検出
    StaticImage,
    /// ストリームモード（Webカメラ）: 接続ごとのIDでフレーム間トラッキング
    Stream { stream_id: Uuid },
}

impl DetectionMode {
    pub fn is_static(&self) -> bool {
        matches!(self, DetectionMode::StaticImage)
    }
}

/// 手話文字の分類結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    pub confidence: f32,
    /// 推論サービスが返した生のペイロード（リモート推論時のみ）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
}

impl Prediction {
    /// 予測が得られなかった場合のラベル
    pub const NONE_LABEL: &'static str = "None";

    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence: confidence.clamp(0.0, 1.0),
            raw: None,
        }
    }

    /// 予測なし（ラベル "None"、信頼度 0）
    pub fn none() -> Self {
        Self::new(Self::NONE_LABEL, 0.0)
    }

    pub fn with_raw(mut self, raw: serde_json::Value) -> Self {
        self.raw = Some(raw);
        self
    }

    pub fn is_none(&self) -> bool {
        self.label == Self::NONE_LABEL
    }
}
