//! アプリケーション設定管理モジュール
//!
//! サーバー、外部サービス、データベース、学習設定などをJSON形式で保存・読み込みします。
//! 秘匿情報や接続先は環境変数で上書きできます。

use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// 設定ファイルパスを指定する環境変数
pub const CONFIG_PATH_ENV: &str = "SIGNLINK_CONFIG";

/// 計算デバイスの種類
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub enum DeviceType {
    /// WGPU (GPU) バックエンド
    #[default]
    Wgpu,
    /// NdArray (CPU) バックエンド
    Cpu,
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceType::Wgpu => write!(f, "WGPU (GPU)"),
            DeviceType::Cpu => write!(f, "CPU (NdArray)"),
        }
    }
}

/// HTTPサーバー設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// アップロードの最大サイズ（バイト）
    pub max_upload_bytes: usize,
    /// CORS許可オリジン（"*" を含む場合は全許可）
    pub cors_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_upload_bytes: 200 * 1024 * 1024,
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

impl ServerSettings {
    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid bind address {}:{}: {}", self.host, self.port, e))
    }
}

/// ログ設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// ログレベル（RUST_LOG があればそちらが優先）
    pub level: String,
    /// JSON形式で出力するか
    pub json: bool,
    /// ログファイル出力先（未指定なら標準出力）
    pub dir: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            dir: None,
        }
    }
}

/// データベース設定
/// 既定のデータベース（カレントディレクトリのSQLiteファイル、無ければ作成）
pub const DEFAULT_DATABASE_URL: &str = "sqlite://signlink.db?mode=rwc";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// 接続文字列（DATABASE_URL で上書き）
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: Some(DEFAULT_DATABASE_URL.to_string()),
            max_connections: 5,
        }
    }
}

/// リトライ設定（指数バックオフ + ジッター）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrySettings {
    /// 最大試行回数（初回を含む）
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 2000,
        }
    }
}

/// ホスト型推論ワークフローの設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowSettings {
    pub api_url: String,
    pub workspace: String,
    pub workflow_id: String,
    /// APIキー（ROBOFLOW_API_KEY で指定。ファイルには書き出さない）
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub use_cache: bool,
    /// 1リクエストあたりのタイムアウト（秒）
    pub timeout_secs: u64,
    pub retry: RetrySettings,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            api_url: "https://serverless.roboflow.com".to_string(),
            workspace: "sweng894".to_string(),
            workflow_id: "asl-alphabet".to_string(),
            api_key: None,
            use_cache: true,
            timeout_secs: 10,
            retry: RetrySettings::default(),
        }
    }
}

/// ランドマーク検出の閾値
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DetectionThresholds {
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
}

/// 手ランドマーク検出サービスの設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LandmarkSettings {
    pub service_url: String,
    /// 画像・動画用
    pub static_thresholds: DetectionThresholds,
    /// Webカメラ用
    pub stream_thresholds: DetectionThresholds,
    /// 手領域のパディング（ピクセル）
    pub crop_padding: u32,
    pub timeout_secs: u64,
}

impl Default for LandmarkSettings {
    fn default() -> Self {
        Self {
            service_url: "http://127.0.0.1:8100/hands".to_string(),
            static_thresholds: DetectionThresholds {
                min_detection_confidence: 0.5,
                min_tracking_confidence: 0.0,
            },
            stream_thresholds: DetectionThresholds {
                min_detection_confidence: 0.7,
                min_tracking_confidence: 0.7,
            },
            crop_padding: crate::vision::DEFAULT_PADDING,
            timeout_secs: 5,
        }
    }
}

/// 動画翻訳の設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSettings {
    /// サンプリング間隔（秒）
    pub sample_interval_secs: f64,
    /// FPSが取得できない場合の値
    pub fallback_fps: f64,
    /// 受け付けるContent-Type
    pub allowed_content_types: Vec<String>,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            sample_interval_secs: 0.5,
            fallback_fps: 30.0,
            allowed_content_types: ["video/mp4", "video/avi", "video/mov", "video/quicktime"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl VideoSettings {
    pub fn accepts(&self, content_type: Option<&str>) -> bool {
        content_type.is_some_and(|ct| {
            self.allowed_content_types
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(ct.trim()))
        })
    }
}

/// 分類器のバックエンド
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierBackend {
    /// ホスト型推論ワークフロー
    #[default]
    Workflow,
    /// 学習済みローカルモデル（model.model_path）
    Local,
}

/// モデル設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// 使用するモデルファイルのパス
    pub model_path: String,
    /// ドロップアウト率
    pub dropout: f64,
    /// 入力画像サイズ（正方形）
    pub image_size: usize,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model_path: "models/asl_cnn_model.tar.gz".to_string(),
            dropout: 0.5,
            image_size: 64,
        }
    }
}

/// トレーニング設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingSettings {
    /// エポック数
    pub num_epochs: usize,
    /// バッチサイズ
    pub batch_size: usize,
    /// ワーカー数
    pub num_workers: usize,
    /// 学習率
    pub learning_rate: f64,
    /// ランダムシード
    pub seed: u64,
    /// 検証データの割合
    pub validation_split: f32,
    /// 学習データにデータ拡張を適用するか
    pub augment: bool,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            num_epochs: 5,
            batch_size: 32,
            num_workers: 1,
            learning_rate: 1e-3,
            seed: 123,
            validation_split: 0.2,
            augment: true,
        }
    }
}

/// アプリケーション設定
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub workflow: WorkflowSettings,
    pub landmarks: LandmarkSettings,
    pub video: VideoSettings,
    pub classifier: ClassifierBackend,
    /// 計算デバイスの種類
    pub device_type: DeviceType,
    /// モデル設定
    pub model: ModelSettings,
    /// トレーニング設定
    pub training: TrainingSettings,
}

impl AppConfig {
    /// 設定ファイルのデフォルトパス
    pub fn default_path() -> PathBuf {
        std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.json"))
    }

    /// 設定を読み込む
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// デフォルトパスから設定を読み込む、存在しない場合はデフォルト設定を返す
    ///
    /// ログ初期化前に呼ばれるため警告は標準エラーに出す。
    pub fn load_or_default() -> Self {
        let path = Self::default_path();
        if !path.exists() {
            return Self::default();
        }
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!(
                    "警告: 設定ファイルの読み込みに失敗しました ({}): {}",
                    path.display(),
                    e
                );
                eprintln!("デフォルト設定を使用します");
                Self::default()
            }
        }
    }

    /// 設定を保存する
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// 環境変数で上書き
    pub fn with_env_overrides(mut self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok());
        self
    }

    /// 任意の参照関数で上書き（空文字列は無視）
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("DATABASE_URL") {
            self.database.url = Some(url);
        }
        if let Some(key) = get("ROBOFLOW_API_KEY") {
            self.workflow.api_key = Some(key);
        }
        if let Some(workspace) = get("ROBOFLOW_WORKSPACE") {
            self.workflow.workspace = workspace;
        }
        if let Some(workflow_id) = get("ROBOFLOW_WORKFLOW_ID") {
            self.workflow.workflow_id = workflow_id;
        }
        if let Some(url) = get("LANDMARK_SERVICE_URL") {
            self.landmarks.service_url = url;
        }
        if let Some(host) = get("SIGNLINK_HOST") {
            self.server.host = host;
        }
        if let Some(port) = get("SIGNLINK_PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
    }

    /// 必須のデータベースURLを取得
    pub fn database_url(&self) -> anyhow::Result<&str> {
        self.database
            .url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("データベースURLが設定されていません (DATABASE_URL)"))
    }
}
