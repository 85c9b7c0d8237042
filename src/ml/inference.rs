//! 学習済みモデルによる推論

use anyhow::Result;
use burn::{
    module::Module,
    record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
    tensor::{activation::softmax, Tensor},
};
use burn_ndarray::{NdArray, NdArrayDevice};
use image::RgbImage;
use std::path::Path;

use crate::ml::ml_model::{image_to_chw, resize_for_model, AslClassifier, ModelConfig};
use crate::model::{load_model_with_metadata, ModelMetadata};

/// 推論エンジン（CPU）
pub struct InferenceEngine {
    model: AslClassifier<NdArray>,
    metadata: ModelMetadata,
    device: NdArrayDevice,
}

impl InferenceEngine {
    /// モデルを読み込んで推論エンジンを初期化
    pub fn load<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let (metadata, model_binary) = load_model_with_metadata(model_path.as_ref())?;
        let device = NdArrayDevice::Cpu;

        // 推論時はドロップアウトなし
        let model = ModelConfig::new(metadata.num_classes())
            .with_dropout(0.0)
            .with_image_size(metadata.image_size as usize)
            .init::<NdArray>(&device)?;

        let record = BinBytesRecorder::<FullPrecisionSettings>::default()
            .load(model_binary, &device)
            .map_err(|e| anyhow::anyhow!("モデル重みの読み込みエラー: {:?}", e))?;

        Ok(Self {
            model: model.load_record(record),
            metadata,
            device,
        })
    }

    /// 手領域画像を分類し、(クラスID, softmax確率) を返す
    pub fn classify_image(&self, image: &RgbImage) -> Result<(usize, f32)> {
        let size = self.metadata.image_size as usize;
        let input = image_to_chw(&resize_for_model(image, size));

        let tensor = Tensor::<NdArray, 1>::from_floats(input.as_slice(), &self.device)
            .reshape([1, 3, size, size]);
        let probabilities = softmax(self.model.forward(tensor), 1)
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| anyhow::anyhow!("推論結果の取得エラー: {:?}", e))?;

        probabilities
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .ok_or_else(|| anyhow::anyhow!("推論結果が空です"))
    }

    /// 手領域画像を分類し、(ラベル, 確率) を返す
    pub fn classify_label(&self, image: &RgbImage) -> Result<(String, f32)> {
        let (index, confidence) = self.classify_image(image)?;
        let label = self
            .metadata
            .label_for(index)
            .ok_or_else(|| anyhow::anyhow!("クラスインデックス {} は範囲外です", index))?;
        Ok((label.to_string(), confidence))
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::save_model_with_metadata;

    fn write_untrained_model(dir: &Path, labels: &[&str]) -> std::path::PathBuf {
        let device = NdArrayDevice::Cpu;
        let model = ModelConfig::new(labels.len())
            .with_image_size(32)
            .init::<NdArray>(&device)
            .unwrap();
        let binary = BinBytesRecorder::<FullPrecisionSettings>::default()
            .record(model.into_record(), ())
            .unwrap();
        let metadata =
            ModelMetadata::new(labels.iter().map(|s| s.to_string()).collect(), 32, 0.5, 1);
        save_model_with_metadata(&dir.join("model"), &metadata, &binary).unwrap()
    }

    #[test]
    fn test_loaded_engine_returns_known_label() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_untrained_model(dir.path(), &["A", "B", "C"]);

        let engine = InferenceEngine::load(&path).unwrap();
        let (label, confidence) = engine.classify_label(&RgbImage::new(50, 40)).unwrap();

        assert!(["A", "B", "C"].contains(&label.as_str()));
        assert!((0.0..=1.0).contains(&confidence));
    }
}
