pub mod frame_codec;
pub mod hand_region;
pub mod landmarks;

pub use frame_codec::{decode_data_url, decode_frame, encode_jpeg, encode_jpeg_base64};
pub use hand_region::{crop_hand, draw_region, locate_hand, HandRegion, DEFAULT_PADDING};
pub use landmarks::{HandLandmarker, RemoteLandmarker};
