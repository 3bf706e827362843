// reviewlens: sentiment and topic analysis for student course reviews
//
// This is the library root. Each module corresponds to a stage of the
// load → clean → infer → export pipeline.

pub mod config;
pub mod error;
pub mod inference;
pub mod output;
pub mod pipeline;
pub mod reviews;
