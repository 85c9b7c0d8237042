//! モデル学習
//!
//! クラスごとのディレクトリに分かれた画像データセットを読み込み、
//! シード付きで学習・検証に分割してCNNを学習し、tar.gz形式で保存します。

use anyhow::{Context, Result};
use burn::{
    data::{
        dataloader::{batcher::Batcher, DataLoaderBuilder},
        dataset::Dataset,
    },
    module::Module,
    optim::AdamConfig,
    record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
    tensor::{
        backend::{AutodiffBackend, Backend},
        ElementConversion, Int, Tensor,
    },
    train::{
        metric::{AccuracyMetric, LossMetric},
        ClassificationOutput, LearnerBuilder, LearningStrategy, TrainOutput, TrainStep,
        ValidStep,
    },
};
use burn_autodiff::Autodiff;
use burn_ndarray::{NdArray, NdArrayDevice};
use burn_wgpu::{Wgpu, WgpuDevice};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::{Path, PathBuf};

use crate::ml::augment::AugmentConfig;
use crate::ml::ml_model::{image_to_chw, load_image_with_size, AslClassifier, ModelConfig};
use crate::model::config::{DeviceType, TrainingSettings};
use crate::model::{save_model_with_metadata, ModelMetadata};

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

fn is_image(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// 学習データセット（パスのリストのみ保持）
#[derive(Debug, Clone)]
pub struct SignDataset {
    samples: Vec<(PathBuf, usize)>, // (画像パス, クラスID)
    class_names: Vec<String>,
}

impl SignDataset {
    /// ディレクトリから学習データを読み込む
    ///
    /// サブディレクトリ名をクラス名とし、名前順にクラスIDを割り当てる。
    pub fn from_directory(data_dir: &Path) -> Result<Self> {
        let mut class_names = Vec::new();
        for entry in std::fs::read_dir(data_dir)
            .with_context(|| format!("データセットディレクトリを読み込めません: {}", data_dir.display()))?
        {
            let path = entry?.path();
            if path.is_dir() {
                let name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .ok_or_else(|| anyhow::anyhow!("不正なディレクトリ名です: {:?}", path))?;
                class_names.push(name.to_string());
            }
        }
        class_names.sort();

        let mut samples = Vec::new();
        for (class_id, class_name) in class_names.iter().enumerate() {
            let mut files: Vec<PathBuf> = std::fs::read_dir(data_dir.join(class_name))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| is_image(path))
                .collect();
            // シード付き分割の再現性のためにファイル順を固定
            files.sort();

            tracing::info!(class = %class_name, class_id, samples = files.len(), "loaded class");
            samples.extend(files.into_iter().map(|path| (path, class_id)));
        }

        if samples.is_empty() {
            anyhow::bail!("学習データが見つかりません: {}", data_dir.display());
        }

        tracing::info!(
            samples = samples.len(),
            classes = class_names.len(),
            "dataset loaded"
        );

        Ok(Self {
            samples,
            class_names,
        })
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    /// データセットを学習用と検証用に分割
    ///
    /// シード付きでシャッフルし、末尾の `validation_split` を検証用にする。
    pub fn split(self, validation_split: f32, seed: u64) -> (Self, Self) {
        let mut samples = self.samples;
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        samples.shuffle(&mut rng);

        let total = samples.len();
        let val_len = ((total as f32) * validation_split.clamp(0.0, 1.0)) as usize;
        let val_samples = samples.split_off(total - val_len);

        (
            Self {
                samples,
                class_names: self.class_names.clone(),
            },
            Self {
                samples: val_samples,
                class_names: self.class_names,
            },
        )
    }
}

/// データセットアイテム（画像パスのみ保持）
#[derive(Clone, Debug)]
pub struct SignItem {
    pub path: PathBuf,
    pub label: usize,
}

impl Dataset<SignItem> for SignDataset {
    fn get(&self, index: usize) -> Option<SignItem> {
        let (path, label) = self.samples.get(index)?;
        Some(SignItem {
            path: path.clone(),
            label: *label,
        })
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// バッチャー
#[derive(Clone)]
pub struct SignBatcher<B: Backend> {
    device: B::Device,
    image_size: usize,
    augment: Option<AugmentConfig>,
}

impl<B: Backend> SignBatcher<B> {
    pub fn new(device: B::Device, image_size: usize) -> Self {
        Self {
            device,
            image_size,
            augment: None,
        }
    }

    /// 学習用: バッチ作成時にデータ拡張を適用
    pub fn with_augmentation(mut self, config: AugmentConfig) -> Self {
        self.augment = Some(config);
        self
    }
}

/// バッチデータ
#[derive(Clone, Debug)]
pub struct SignBatch<B: Backend> {
    pub images: Tensor<B, 4>,
    pub targets: Tensor<B, 1, Int>,
}

impl<B: Backend> Batcher<B, SignItem, SignBatch<B>> for SignBatcher<B> {
    fn batch(&self, items: Vec<SignItem>, _device: &B::Device) -> SignBatch<B> {
        let batch_size = items.len();
        let size = self.image_size;
        let mut pixels = Vec::with_capacity(batch_size * 3 * size * size);
        let mut targets = Vec::with_capacity(batch_size);
        let mut rng = rand::thread_rng();

        for item in items {
            match load_image_with_size(&item.path, size) {
                Ok(image) => {
                    let image = match &self.augment {
                        Some(config) => config.apply(&image, &mut rng),
                        None => image,
                    };
                    pixels.extend(image_to_chw(&image));
                }
                Err(e) => {
                    // 読み込めない画像はゼロで埋める
                    tracing::warn!(path = %item.path.display(), error = %e, "failed to load training image");
                    pixels.extend(std::iter::repeat(0.0f32).take(3 * size * size));
                }
            }
            targets.push(item.label as i64);
        }

        let images = Tensor::<B, 1>::from_floats(pixels.as_slice(), &self.device)
            .reshape([batch_size, 3, size, size]);
        let targets = Tensor::<B, 1, Int>::from_ints(targets.as_slice(), &self.device);

        SignBatch { images, targets }
    }
}

/// TrainStep実装 (学習時の順伝播 + 逆伝播)
impl<B: AutodiffBackend> TrainStep<SignBatch<B>, ClassificationOutput<B>> for AslClassifier<B> {
    fn step(&self, batch: SignBatch<B>) -> TrainOutput<ClassificationOutput<B>> {
        let item = self.forward_classification(batch.images, batch.targets);
        let grads = item.loss.backward();
        TrainOutput::new(self, grads, item)
    }
}

/// ValidStep実装 (検証時の順伝播のみ)
impl<B: Backend> ValidStep<SignBatch<B>, ClassificationOutput<B>> for AslClassifier<B> {
    fn step(&self, batch: SignBatch<B>) -> ClassificationOutput<B> {
        self.forward_classification(batch.images, batch.targets)
    }
}

/// 学習リクエスト
#[derive(Debug, Clone)]
pub struct TrainingRequest {
    pub data_dir: PathBuf,
    pub output_path: PathBuf,
    pub image_size: usize,
    pub dropout: f64,
    pub settings: TrainingSettings,
}

/// 学習結果
#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub model_path: PathBuf,
    pub metadata: ModelMetadata,
}

/// 設定されたデバイスで学習を実行
pub fn run_training(request: TrainingRequest, device_type: &DeviceType) -> Result<TrainingSummary> {
    tracing::info!(device = %device_type, "starting training");
    match device_type {
        DeviceType::Wgpu => train_model::<Autodiff<Wgpu>>(request, WgpuDevice::default()),
        DeviceType::Cpu => train_model::<Autodiff<NdArray>>(request, NdArrayDevice::Cpu),
    }
}

/// モデル学習を実行
pub fn train_model<B: AutodiffBackend>(
    request: TrainingRequest,
    device: B::Device,
) -> Result<TrainingSummary> {
    let settings = &request.settings;
    let dataset = SignDataset::from_directory(&request.data_dir)?;
    let class_names = dataset.class_names().to_vec();

    let (dataset_train, dataset_val) = dataset.split(settings.validation_split, settings.seed);
    if dataset_train.len() == 0 || dataset_val.len() == 0 {
        anyhow::bail!(
            "学習データが不足しています（学習: {} 枚, 検証: {} 枚）",
            dataset_train.len(),
            dataset_val.len()
        );
    }
    let (train_samples, validation_samples) = (dataset_train.len(), dataset_val.len());
    tracing::info!(train_samples, validation_samples, "dataset split");

    let model_config = ModelConfig::new(class_names.len())
        .with_dropout(request.dropout)
        .with_image_size(request.image_size);
    let model = model_config.init::<B>(&device)?;

    let mut batcher_train = SignBatcher::<B>::new(device.clone(), request.image_size);
    if settings.augment {
        batcher_train = batcher_train.with_augmentation(AugmentConfig::default());
    }
    let batcher_val = SignBatcher::<B::InnerBackend>::new(device.clone(), request.image_size);

    let dataloader_train = DataLoaderBuilder::new(batcher_train)
        .batch_size(settings.batch_size)
        .shuffle(settings.seed)
        .num_workers(settings.num_workers)
        .build(dataset_train);

    let dataloader_val = DataLoaderBuilder::new(batcher_val.clone())
        .batch_size(settings.batch_size)
        .num_workers(settings.num_workers)
        .build(dataset_val.clone());

    let artifact_dir = tempfile::Builder::new()
        .prefix("signlink-training-")
        .tempdir()
        .context("学習用の作業ディレクトリを作成できませんでした")?;
    let artifact_dir_str = artifact_dir.path().to_string_lossy().to_string();

    tracing::info!(
        epochs = settings.num_epochs,
        batch_size = settings.batch_size,
        learning_rate = settings.learning_rate,
        "fitting model"
    );

    let learner = LearnerBuilder::new(&artifact_dir_str)
        .metric_train_numeric(AccuracyMetric::new())
        .metric_valid_numeric(AccuracyMetric::new())
        .metric_train_numeric(LossMetric::new())
        .metric_valid_numeric(LossMetric::new())
        .learning_strategy(LearningStrategy::SingleDevice(device.clone()))
        .num_epochs(settings.num_epochs)
        .summary()
        .build(model, AdamConfig::new().init(), settings.learning_rate);

    let trained = learner.fit(dataloader_train, dataloader_val).model;

    let accuracy = evaluate(&trained, &batcher_val, &dataset_val, settings.batch_size);
    tracing::info!(validation_accuracy = accuracy, params = trained.num_params(), "training finished");

    let model_binary = BinBytesRecorder::<FullPrecisionSettings>::default()
        .record(trained.into_record(), ())
        .map_err(|e| anyhow::anyhow!("モデル重みのシリアライズに失敗しました: {:?}", e))?;

    let mut metadata = ModelMetadata::new(
        class_names,
        request.image_size as u32,
        request.dropout,
        settings.num_epochs as u32,
    );
    metadata.train_samples = train_samples;
    metadata.validation_samples = validation_samples;
    metadata.validation_accuracy = Some(accuracy);

    let model_path = save_model_with_metadata(&request.output_path, &metadata, &model_binary)?;
    tracing::info!(path = %model_path.display(), bytes = model_binary.len(), "model saved");

    Ok(TrainingSummary {
        model_path,
        metadata,
    })
}

/// 検証データでの正解率
fn evaluate<B: Backend>(
    model: &AslClassifier<B>,
    batcher: &SignBatcher<B>,
    dataset: &SignDataset,
    batch_size: usize,
) -> f32 {
    let loader = DataLoaderBuilder::new(batcher.clone())
        .batch_size(batch_size)
        .build(dataset.clone());

    let mut correct = 0i64;
    let mut total = 0usize;
    for batch in loader.iter() {
        let [n] = batch.targets.dims();
        let predicted = model.forward(batch.images).argmax(1).reshape([n]);
        correct += predicted
            .equal(batch.targets)
            .int()
            .sum()
            .into_scalar()
            .elem::<i64>();
        total += n;
    }

    if total == 0 {
        0.0
    } else {
        correct as f32 / total as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn write_dataset(root: &Path, classes: &[(&str, usize)]) {
        for (class, count) in classes {
            let dir = root.join(class);
            std::fs::create_dir_all(&dir).unwrap();
            for i in 0..*count {
                RgbImage::from_pixel(10, 10, Rgb([i as u8, 0, 0]))
                    .save(dir.join(format!("{class}_{i}.png")))
                    .unwrap();
            }
        }
        std::fs::write(root.join("README.txt"), "not a class").unwrap();
        std::fs::write(root.join("A").join("notes.txt"), "not an image").unwrap();
    }

    #[test]
    fn test_classes_are_sorted_by_name() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path(), &[("space", 1), ("B", 2), ("A", 3), ("del", 1)]);

        let dataset = SignDataset::from_directory(dir.path()).unwrap();
        assert_eq!(dataset.class_names(), &["A", "B", "del", "space"]);
        assert_eq!(dataset.len(), 7);
        assert_eq!(dataset.get(0).unwrap().label, 0);
        assert_eq!(dataset.get(6).unwrap().label, 3);
    }

    #[test]
    fn test_empty_dataset_is_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("A")).unwrap();
        let err = SignDataset::from_directory(dir.path()).unwrap_err();
        assert!(err.to_string().starts_with("学習データが見つかりません"));

        let missing = dir.path().join("missing");
        let err = SignDataset::from_directory(&missing).unwrap_err();
        assert!(err.to_string().starts_with("データセットディレクトリを読み込めません"));
    }

    #[test]
    fn test_split_is_seeded_and_disjoint() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path(), &[("A", 10), ("B", 10)]);

        let (train, val) = SignDataset::from_directory(dir.path()).unwrap().split(0.2, 123);
        assert_eq!((train.len(), val.len()), (16, 4));

        let (train_again, val_again) =
            SignDataset::from_directory(dir.path()).unwrap().split(0.2, 123);
        assert_eq!(train.samples, train_again.samples);
        assert_eq!(val.samples, val_again.samples);

        for sample in &val.samples {
            assert!(!train.samples.contains(sample));
        }
    }

    #[test]
    fn test_batcher_shapes() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path(), &[("A", 2), ("B", 1)]);
        let dataset = SignDataset::from_directory(dir.path()).unwrap();

        let device = NdArrayDevice::Cpu;
        let batcher = SignBatcher::<NdArray>::new(device, 24)
            .with_augmentation(AugmentConfig::default());
        let items: Vec<SignItem> = (0..dataset.len()).filter_map(|i| dataset.get(i)).collect();
        let batch = batcher.batch(items, &device);

        assert_eq!(batch.images.dims(), [3, 3, 24, 24]);
        assert_eq!(batch.targets.into_data().to_vec::<i64>().unwrap(), vec![0, 0, 1]);
    }
}
