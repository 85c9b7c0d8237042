mod common;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use common::{app_state, png_bytes, FakeClassifier, FakeLandmarker};
use signlink::api::{create_router, AppState};
use signlink::inference::UnconfiguredClassifier;
use signlink::model::config::VideoSettings;
use signlink::pipeline::SignPipeline;
use signlink::vision::DEFAULT_PADDING;

const BOUNDARY: &str = "signlink-test-boundary";

async fn router_with(landmarker: FakeLandmarker, classifier: FakeClassifier) -> Router {
    create_router(app_state(Arc::new(landmarker), classifier).await)
}

async fn router() -> Router {
    router_with(FakeLandmarker::with_hand(), FakeClassifier { label: "A", fail: false }).await
}

fn multipart_body(field: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn multipart_request(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap()
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

fn signup_body(username: &str, email: &str) -> Value {
    json!({
        "first_name": "Ada",
        "last_name": "Lovelace",
        "email": email,
        "username": username,
        "password": "analytical-engine"
    })
}

#[tokio::test]
async fn health_reports_ok() {
    let app = router().await;
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn signup_login_and_duplicates() {
    let app = router().await;

    let (status, profile) =
        send(&app, json_request(Method::POST, "/auth/signup", signup_body("ada", "ada@example.com"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["username"], "ada");
    assert!(profile["id"].as_i64().is_some());
    assert!(profile.get("password").is_none());

    let (status, body) =
        send(&app, json_request(Method::POST, "/auth/signup", signup_body("other", "ada@example.com"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Username or email already exists");

    let (status, body) = send(
        &app,
        json_request(Method::POST, "/auth/login", json!({ "username": "ada", "password": "analytical-engine" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, profile);

    for credentials in [
        json!({ "username": "ada", "password": "difference-engine" }),
        json!({ "username": "nobody", "password": "analytical-engine" }),
    ] {
        let (status, body) = send(&app, json_request(Method::POST, "/auth/login", credentials)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["detail"], "Invalid credentials");
    }
}

#[tokio::test]
async fn signup_rejects_malformed_email() {
    let app = router().await;
    let (status, body) =
        send(&app, json_request(Method::POST, "/auth/signup", signup_body("ada", "not-an-email"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().is_some());
}

#[tokio::test]
async fn settings_lifecycle() {
    let app = router().await;
    let (_, profile) =
        send(&app, json_request(Method::POST, "/auth/signup", signup_body("ada", "ada@example.com"))).await;
    let user_id = profile["id"].as_i64().unwrap();

    let missing = Request::builder()
        .uri(format!("/settings/{user_id}"))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, missing).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "User settings not found");

    let (status, created) = send(
        &app,
        json_request(Method::POST, "/settings/", json!({ "user_id": user_id, "speech_enabled": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["speech_enabled"], true);
    assert_eq!(created["webcam_enabled"], true);

    let fetch = Request::builder()
        .uri(format!("/settings/{user_id}"))
        .body(Body::empty())
        .unwrap();
    let (status, fetched) = send(&app, fetch).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);

    let (status, body) =
        send(&app, json_request(Method::POST, "/settings", json!({ "user_id": user_id }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Settings already exist for this user");

    let (status, updated) = send(
        &app,
        json_request(Method::PUT, &format!("/settings/{user_id}"), json!({ "webcam_enabled": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["speech_enabled"], true);
    assert_eq!(updated["webcam_enabled"], false);

    let (status, _) = send(
        &app,
        json_request(Method::PUT, "/settings/9999", json!({ "speech_enabled": false })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) =
        send(&app, json_request(Method::POST, "/settings/", json!({ "user_id": 9999 }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn image_prediction_returns_label_and_region() {
    let app = router().await;
    let body = multipart_body("file", "hand.png", "image/png", &png_bytes(64, 48));

    for uri in ["/image/predict", "/predict-image"] {
        let (status, json) = send(&app, multipart_request(uri, body.clone())).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert_eq!(json["prediction"]["label"], "A");
        assert_eq!(json["region"]["x_min"], 0);
        assert_eq!(json["region"]["x_max"], 64);
        assert_eq!(json["region"]["y_max"], 48);
    }
}

#[tokio::test]
async fn image_without_hand_is_not_found() {
    let app = router_with(FakeLandmarker::without_hand(), FakeClassifier { label: "A", fail: false }).await;
    let body = multipart_body("file", "hand.png", "image/png", &png_bytes(32, 32));

    let (status, json) = send(&app, multipart_request("/image/predict", body)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["detail"], "No hand detected");
}

#[tokio::test]
async fn image_classifier_failure_is_server_error() {
    let app = router_with(FakeLandmarker::with_hand(), FakeClassifier { label: "A", fail: true }).await;
    let body = multipart_body("file", "hand.png", "image/png", &png_bytes(32, 32));

    let (status, json) = send(&app, multipart_request("/image/predict", body)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["detail"].as_str().unwrap().contains("503"));
}

#[tokio::test]
async fn missing_api_key_keeps_server_up() {
    let db = signlink::db::Database::in_memory().await.unwrap();
    let pipeline = Arc::new(SignPipeline::new(
        Arc::new(FakeLandmarker::with_hand()),
        Arc::new(UnconfiguredClassifier { missing: "ROBOFLOW_API_KEY" }),
        DEFAULT_PADDING,
    ));
    let app = create_router(AppState::new(pipeline, db, VideoSettings::default()));

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);

    let body = multipart_body("file", "hand.png", "image/png", &png_bytes(32, 32));
    let (status, json) = send(&app, multipart_request("/image/predict", body)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["detail"].as_str().unwrap().contains("ROBOFLOW_API_KEY is missing"));
}

#[tokio::test]
async fn image_upload_validation() {
    let app = router().await;

    let garbage = multipart_body("file", "hand.png", "image/png", b"definitely not an image");
    let (status, _) = send(&app, multipart_request("/image/predict", garbage)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let wrong_field = multipart_body("upload", "hand.png", "image/png", &png_bytes(8, 8));
    let (status, json) = send(&app, multipart_request("/image/predict", wrong_field)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["detail"].as_str().unwrap().contains("file"));
}

#[tokio::test]
async fn video_rejects_unsupported_content_type() {
    let app = router().await;

    for uri in ["/video/translate", "/video/predict"] {
        let body = multipart_body("file", "clip.gif", "image/gif", b"GIF89a");
        let (status, json) = send(&app, multipart_request(uri, body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            json["detail"],
            "Invalid file type. Please upload an MP4, AVI, or MOV video."
        );
    }
}
