pub mod frame_extractor;
pub mod sampler;

pub use frame_extractor::{FrameExtractor, FrameStats, VideoStreamInfo};
pub use sampler::{translate_video, FramePrediction, VideoError};
