pub mod color_heuristic;
pub mod confidence_scorer;
pub mod frame;
pub mod fusion_gate;
pub mod hysteresis;
#[cfg(feature = "onnx")]
pub mod onnx_classifier;
pub mod pixel;
pub mod rate_meter;
pub mod utils;
