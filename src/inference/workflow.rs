//! ホスト型推論ワークフローのクライアント
//!
//! `POST {api_url}/{workspace}/workflows/{workflow_id}` に Base64 画像を送り、
//! 応答の `outputs` を [`parse_provider_payload`] で正規化します。

use async_trait::async_trait;
use image::RgbImage;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use super::{parse_provider_payload, with_retry, ClassifierError, SignClassifier};
use crate::model::config::WorkflowSettings;
use crate::types::Prediction;
use crate::vision::frame_codec::encode_jpeg_base64;

#[derive(Debug, Serialize)]
struct WorkflowRequest<'a> {
    api_key: &'a str,
    inputs: WorkflowInputs<'a>,
    use_cache: bool,
}

#[derive(Debug, Serialize)]
struct WorkflowInputs<'a> {
    image: ImageInput<'a>,
}

#[derive(Debug, Serialize)]
struct ImageInput<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    value: &'a str,
}

/// ワークフロークライアント
pub struct WorkflowClient {
    client: reqwest::Client,
    settings: WorkflowSettings,
    api_key: String,
    timeout: Duration,
}

impl WorkflowClient {
    /// APIキーが無い場合は `NotConfigured`
    pub fn new(settings: WorkflowSettings) -> Result<Self, ClassifierError> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ClassifierError::NotConfigured("ROBOFLOW_API_KEY"))?;
        let timeout = Duration::from_secs(settings.timeout_secs.max(1));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClassifierError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            settings,
            api_key,
            timeout,
        })
    }

    /// ワークフローのエンドポイントURL
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}/workflows/{}",
            self.settings.api_url.trim_end_matches('/'),
            self.settings.workspace,
            self.settings.workflow_id
        )
    }

    /// ワークフローを1回実行し、`outputs`（無ければ応答全体）を返す
    async fn run_once(&self, image_base64: &str) -> Result<Value, ClassifierError> {
        let request = WorkflowRequest {
            api_key: &self.api_key,
            inputs: WorkflowInputs {
                image: ImageInput {
                    kind: "base64",
                    value: image_base64,
                },
            },
            use_cache: self.settings.use_cache,
        };

        let response = self
            .client
            .post(self.endpoint())
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifierError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let mut body: Value = response
            .json()
            .await
            .map_err(|e| ClassifierError::Decode(e.to_string()))?;

        Ok(match body.get_mut("outputs") {
            Some(outputs) => outputs.take(),
            None => body,
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> ClassifierError {
        if err.is_timeout() {
            ClassifierError::Timeout(self.timeout)
        } else {
            ClassifierError::Transport(err.to_string())
        }
    }

    /// 一時的な失敗を再試行しながらワークフローを実行
    pub async fn run_workflow(&self, image_base64: &str) -> Result<Value, ClassifierError> {
        with_retry(&self.settings.retry, "workflow", || self.run_once(image_base64)).await
    }
}

#[async_trait]
impl SignClassifier for WorkflowClient {
    async fn classify(&self, crop: &RgbImage) -> Result<Prediction, ClassifierError> {
        let image_base64 =
            encode_jpeg_base64(crop).map_err(|e| ClassifierError::Encode(e.to_string()))?;
        let payload = self.run_workflow(&image_base64).await?;
        let prediction = parse_provider_payload(&payload);

        tracing::debug!(
            label = %prediction.label,
            confidence = prediction.confidence,
            "workflow prediction"
        );
        Ok(prediction)
    }
}
