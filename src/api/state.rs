//! ハンドラ間で共有する状態

use anyhow::Context;
use std::sync::Arc;

use crate::auth::AccountService;
use crate::db::Database;
use crate::inference::{ClassifierError, SignClassifier, UnconfiguredClassifier, WorkflowClient};
use crate::model::config::{AppConfig, ClassifierBackend, VideoSettings};
use crate::pipeline::SignPipeline;
use crate::vision::{HandLandmarker, RemoteLandmarker};

/// アプリケーション状態（クローンは安価）
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<SignPipeline>,
    pub accounts: AccountService,
    pub db: Database,
    pub video: Arc<VideoSettings>,
}

impl AppState {
    pub fn new(pipeline: Arc<SignPipeline>, db: Database, video: VideoSettings) -> Self {
        Self {
            pipeline,
            accounts: AccountService::new(db.clone()),
            db,
            video: Arc::new(video),
        }
    }

    /// 設定から外部サービスのクライアントを組み立てる
    pub fn from_config(config: &AppConfig, db: Database) -> anyhow::Result<Self> {
        let landmarker: Arc<dyn HandLandmarker> = Arc::new(
            RemoteLandmarker::new(config.landmarks.clone()).context("failed to build landmark client")?,
        );
        let classifier = build_classifier(config)?;
        let pipeline = Arc::new(SignPipeline::new(
            landmarker,
            classifier,
            config.landmarks.crop_padding,
        ));
        Ok(Self::new(pipeline, db, config.video.clone()))
    }
}

/// 設定されたバックエンドの分類器を作る
pub fn build_classifier(config: &AppConfig) -> anyhow::Result<Arc<dyn SignClassifier>> {
    match config.classifier {
        ClassifierBackend::Workflow => match WorkflowClient::new(config.workflow.clone()) {
            Ok(client) => {
                tracing::info!(endpoint = %client.endpoint(), "using hosted workflow classifier");
                Ok(Arc::new(client))
            }
            // キーが無くてもヘルスチェックとアカウント機能は動かす
            Err(ClassifierError::NotConfigured(missing)) => {
                tracing::warn!(missing, "hosted workflow classifier is not configured; predictions will fail");
                Ok(Arc::new(UnconfiguredClassifier { missing }))
            }
            Err(e) => Err(e.into()),
        },
        #[cfg(feature = "ml")]
        ClassifierBackend::Local => {
            let path = &config.model.model_path;
            let classifier = crate::inference::LocalClassifier::load(path)
                .with_context(|| format!("failed to load local model: {path}"))?;
            tracing::info!(model_path = %path, "using local classifier");
            Ok(Arc::new(classifier))
        }
        #[cfg(not(feature = "ml"))]
        ClassifierBackend::Local => {
            anyhow::bail!("local classifier requires the `ml` feature")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_api_key_still_builds_classifier() {
        let mut config = AppConfig::default();
        config.classifier = ClassifierBackend::Workflow;
        config.workflow.api_key = None;

        let classifier = build_classifier(&config).unwrap();
        let err = classifier.classify(&image::RgbImage::new(8, 8)).await.unwrap_err();

        assert!(matches!(err, ClassifierError::NotConfigured("ROBOFLOW_API_KEY")));
    }
}
