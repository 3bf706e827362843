// Inference: trait-based abstraction for swappable model backends.
//
// SentimentModel and TopicModel define the interface. The local ONNX
// backend is the default; the Hugging Face Inference API backend runs the
// same models remotely. InferenceAdapter is what the rest of the crate
// talks to.

pub mod adapter;
pub mod download;
pub mod hosted;
pub mod onnx;
pub mod rate_limiter;
pub mod traits;
