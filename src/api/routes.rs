//! APIルート定義

use axum::{
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use super::state::AppState;
use super::{accounts, settings, translate, webcam};

/// 全エンドポイントのルーターを作成
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        // 画像
        .route("/image/predict", post(translate::predict_image))
        .route("/predict-image", post(translate::predict_image))
        // 動画
        .route("/video/translate", post(translate::translate_video_upload))
        .route("/video/predict", post(translate::translate_video_upload))
        // Webカメラ
        .route("/webcam/ws", get(webcam::ws_handler))
        // アカウント
        .route("/auth/signup", post(accounts::signup))
        .route("/auth/login", post(accounts::login))
        // ユーザー設定
        .route("/settings", post(settings::create_settings))
        .route("/settings/", post(settings::create_settings))
        .route(
            "/settings/:user_id",
            get(settings::get_settings).put(settings::update_settings),
        )
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
