//! In-process image transformation.

mod pipeline;

pub use pipeline::ImageProcessor;
