//! 機械学習モデルの共通定義
//!
//! 手話アルファベット分類用のCNNモデルと、画像の前処理を提供します。

use anyhow::Result;
use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        loss::CrossEntropyLossConfig,
        pool::{MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig, Linear, LinearConfig, Relu,
    },
    tensor::{backend::Backend, Int, Tensor},
    train::ClassificationOutput,
};
use image::{imageops::FilterType, RgbImage};

/// 画像サイズ
pub const IMAGE_SIZE: usize = 64;

/// ASLアルファベットのクラス名（ディレクトリ名のソート順）
pub const ASL_CLASS_NAMES: [&str; 29] = [
    "A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K", "L", "M", "N", "O", "P", "Q", "R",
    "S", "T", "U", "V", "W", "X", "Y", "Z", "del", "nothing", "space",
];

/// 畳み込みブロックの出力チャネル
const CHANNELS: [usize; 3] = [32, 64, 128];

/// 全結合層の隠れユニット数
const HIDDEN_UNITS: usize = 128;

/// モデル設定
#[derive(Config, Debug)]
pub struct ModelConfig {
    /// 分類クラス数
    pub num_classes: usize,
    /// ドロップアウト率
    #[config(default = 0.5)]
    pub dropout: f64,
    /// 入力画像サイズ（正方形）
    #[config(default = 64)]
    pub image_size: usize,
}

impl ModelConfig {
    /// 最後のプーリング後の特徴マップサイズ
    ///
    /// Conv 3x3 (padding無し) で -2、MaxPool 2x2 (stride 2) で 1/2 (切り捨て) を3回。
    /// 入力が小さすぎる場合は `None`。
    pub fn feature_map_size(&self) -> Option<usize> {
        let mut size = self.image_size;
        for _ in CHANNELS {
            size = size.checked_sub(2)? / 2;
            if size == 0 {
                return None;
            }
        }
        Some(size)
    }

    /// モデルを初期化
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<AslClassifier<B>> {
        if self.num_classes == 0 {
            anyhow::bail!("クラス数が0です");
        }
        let feature_map_size = self.feature_map_size().ok_or_else(|| {
            anyhow::anyhow!("入力サイズが小さすぎます: {} (最小22x22が必要)", self.image_size)
        })?;

        // 特徴次元 d = 128チャネル * feature_map_size^2
        let d = CHANNELS[2] * feature_map_size * feature_map_size;
        tracing::debug!(
            image_size = self.image_size,
            feature_map_size,
            features = d,
            classes = self.num_classes,
            "initializing ASL classifier"
        );

        Ok(AslClassifier {
            conv1: Conv2dConfig::new([3, CHANNELS[0]], [3, 3]).init(device),
            conv2: Conv2dConfig::new([CHANNELS[0], CHANNELS[1]], [3, 3]).init(device),
            conv3: Conv2dConfig::new([CHANNELS[1], CHANNELS[2]], [3, 3]).init(device),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            fc1: LinearConfig::new(d, HIDDEN_UNITS).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
            fc2: LinearConfig::new(HIDDEN_UNITS, self.num_classes).init(device),
            activation: Relu::new(),
        })
    }
}

/// 手話アルファベット分類用CNNモデル
///
/// # アーキテクチャ
/// - {Conv 3x3 (no padding) + ReLU + MaxPool 2x2} x 3層 (32, 64, 128ch)
/// - Flatten
/// - FC: d -> 128 + ReLU
/// - Dropout
/// - FC: 128 -> num_classes
/// - Softmax (推論時)
#[derive(Module, Debug)]
pub struct AslClassifier<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
    conv3: Conv2d<B>,
    pool: MaxPool2d,
    fc1: Linear<B>,
    dropout: Dropout,
    fc2: Linear<B>,
    activation: Relu,
}

impl<B: Backend> AslClassifier<B> {
    /// 順伝播
    ///
    /// - `images`: [batch_size, 3, size, size]
    /// - 戻り値: クラスごとのロジット [batch_size, num_classes]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let [batch_size, _, _, _] = images.dims();

        let x = self.pool.forward(self.activation.forward(self.conv1.forward(images)));
        let x = self.pool.forward(self.activation.forward(self.conv2.forward(x)));
        let x = self.pool.forward(self.activation.forward(self.conv3.forward(x)));

        let [_, c, h, w] = x.dims();
        let x = x.reshape([batch_size, c * h * w]);

        let x = self.activation.forward(self.fc1.forward(x));
        let x = self.dropout.forward(x);
        self.fc2.forward(x)
    }

    /// 順伝播と損失計算（学習用）
    pub fn forward_classification(
        &self,
        images: Tensor<B, 4>,
        targets: Tensor<B, 1, Int>,
    ) -> ClassificationOutput<B> {
        let output = self.forward(images);
        let loss = CrossEntropyLossConfig::new()
            .init(&output.device())
            .forward(output.clone(), targets.clone());

        ClassificationOutput::new(loss, output, targets)
    }
}

/// 画像をモデル入力サイズにリサイズ
pub fn resize_for_model(image: &RgbImage, size: usize) -> RgbImage {
    let size = size as u32;
    if image.dimensions() == (size, size) {
        return image.clone();
    }
    image::imageops::resize(image, size, size, FilterType::Triangle)
}

/// RGB画像を [0, 1] にスケーリングし、(C, H, W) の順で平坦化
pub fn image_to_chw(image: &RgbImage) -> Vec<f32> {
    let (width, height) = image.dimensions();
    let mut data = Vec::with_capacity(3 * (width * height) as usize);

    for channel in 0..3 {
        for y in 0..height {
            for x in 0..width {
                data.push(image.get_pixel(x, y)[channel] as f32 / 255.0);
            }
        }
    }

    data
}

/// 画像ファイルを読み込んでリサイズ
pub fn load_image_with_size(path: &std::path::Path, size: usize) -> Result<RgbImage> {
    let image = image::open(path)?.to_rgb8();
    Ok(resize_for_model(&image, size))
}
