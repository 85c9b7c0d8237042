//! 学習済みローカルモデルによる分類器

use async_trait::async_trait;
use image::RgbImage;
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::{ClassifierError, SignClassifier};
use crate::ml::InferenceEngine;
use crate::types::Prediction;

/// ローカルモデル分類器（推論はブロッキングスレッドで実行）
pub struct LocalClassifier {
    engine: Arc<Mutex<InferenceEngine>>,
}

impl LocalClassifier {
    pub fn load<P: AsRef<Path>>(model_path: P) -> anyhow::Result<Self> {
        let engine = InferenceEngine::load(model_path)?;
        engine.metadata().log_summary();
        Ok(Self {
            engine: Arc::new(Mutex::new(engine)),
        })
    }
}

#[async_trait]
impl SignClassifier for LocalClassifier {
    async fn classify(&self, crop: &RgbImage) -> Result<Prediction, ClassifierError> {
        let engine = self.engine.clone();
        let crop = crop.clone();

        let (label, confidence) = tokio::task::spawn_blocking(move || {
            let engine = engine
                .lock()
                .map_err(|_| ClassifierError::Model("inference engine lock poisoned".into()))?;
            engine
                .classify_label(&crop)
                .map_err(|e| ClassifierError::Model(e.to_string()))
        })
        .await
        .map_err(|e| ClassifierError::Model(e.to_string()))??;

        Ok(Prediction::new(label, confidence))
    }
}
