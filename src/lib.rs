//! SignLink: ASL（アメリカ手話）指文字認識のバックエンドと学習パイプライン
//!
//! 画像・動画・Webカメラのフレームから手を検出し、手の領域を切り出して分類します。
//! 分類はホスト型の推論ワークフロー、または `ml` フィーチャーで学習したローカルモデルで行います。

#![recursion_limit = "256"]

pub mod types;
pub mod logging;

// 手の検出と切り出し
pub mod vision;
pub mod inference;
pub mod pipeline;
pub mod video;
pub mod model;
#[cfg(feature = "ml")]
pub mod ml;

// アカウントと設定
pub mod db;
pub mod auth;

pub mod api;
