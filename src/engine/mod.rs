//! Inference engine module
//!
//! Provides the objects exposed over the dispatch endpoints:
//! - Video object segmentation core with frame memory
//! - Stroke-to-mask controller
//! - Click-based mask refinement controller
//!
//! Networks are reached through the [`Model`] seam; [`Runtime`] loads
//! OpenVINO checkpoints that implement it.

pub mod clicks;
pub mod model;
pub mod processor;
pub mod runtime;
pub mod strokes;
pub mod tensor;

pub use clicks::ClickController;
pub use model::{Model, ModelLoader};
pub use processor::{CoreConfig, InferenceCore};
pub use runtime::{CompiledNetwork, Runtime};
pub use strokes::StrokeController;
pub use tensor::Tensor;
