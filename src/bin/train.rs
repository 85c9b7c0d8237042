//! ASL分類モデルの学習
//!
//! Usage: train <data_dir> [output_path] [epochs] [cpu|wgpu]

use anyhow::{bail, Context};
use std::path::PathBuf;

use signlink::logging::init_logging;
use signlink::ml::{run_training, TrainingRequest, ASL_CLASS_NAMES};
use signlink::model::{AppConfig, DeviceType};

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: train <data_dir> [output_path] [epochs] [cpu|wgpu]");
        std::process::exit(2);
    }

    let config = AppConfig::load_or_default().with_env_overrides();
    let _log_guard = init_logging(
        &config.logging.level,
        config.logging.json,
        config.logging.dir.as_ref().map(PathBuf::from),
    );

    let data_dir = PathBuf::from(&args[1]);
    let output_path = args
        .get(2)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&config.model.model_path));

    let mut settings = config.training.clone();
    if let Some(epochs) = args.get(3) {
        settings.num_epochs = epochs
            .parse()
            .with_context(|| format!("invalid epoch count: {epochs}"))?;
    }

    let device_type = match args.get(4).map(String::as_str) {
        None => config.device_type.clone(),
        Some("cpu") => DeviceType::Cpu,
        Some("wgpu") => DeviceType::Wgpu,
        Some(other) => bail!("unknown backend: {other} (expected cpu or wgpu)"),
    };

    let summary = run_training(
        TrainingRequest {
            data_dir,
            output_path,
            image_size: config.model.image_size,
            dropout: config.model.dropout,
            settings,
        },
        &device_type,
    )?;

    let labels = &summary.metadata.class_labels;
    if labels.iter().map(String::as_str).ne(ASL_CLASS_NAMES.iter().copied()) {
        tracing::warn!(
            classes = labels.len(),
            "dataset classes differ from the ASL alphabet; the model labels follow the dataset"
        );
    }

    println!("Model saved to {}", summary.model_path.display());
    if let Some(accuracy) = summary.metadata.validation_accuracy {
        println!("Validation accuracy: {:.2}%", accuracy * 100.0);
    }
    Ok(())
}
