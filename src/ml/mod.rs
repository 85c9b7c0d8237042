pub mod augment;
pub mod inference;
pub mod ml_model;
pub mod training;

pub use augment::AugmentConfig;
pub use inference::InferenceEngine;
pub use ml_model::{AslClassifier, ModelConfig, ASL_CLASS_NAMES, IMAGE_SIZE};
pub use training::{run_training, train_model, SignDataset, TrainingRequest, TrainingSummary};
