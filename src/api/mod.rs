//! HTTP / WebSocket API
//!
//! - `POST /image/predict`, `/predict-image`: 画像1枚の手話認識
//! - `POST /video/translate`, `/video/predict`: 動画の手話翻訳
//! - `GET /webcam/ws`: Webカメラのリアルタイム翻訳
//! - `/auth/*`, `/settings/*`: アカウントとユーザー設定
//! - `GET /health`

pub mod accounts;
pub mod error;
pub mod routes;
pub mod server;
pub mod settings;
pub mod state;
pub mod translate;
pub mod webcam;

pub use error::ApiError;
pub use routes::create_router;
pub use server::{build_app, run_server};
pub use state::{build_classifier, AppState};
