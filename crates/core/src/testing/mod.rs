//! Testing utilities and mock implementations.
//!
//! The mock processor stands in for ffmpeg and the image pipeline so the
//! orchestrator and the HTTP surface can be exercised without real tools.
//!
//! # Example
//!
//! ```rust,ignore
//! use m4k_core::testing::MockProcessor;
//!
//! let processor = MockProcessor::new();
//! processor.set_progress(vec![0, 100]).await;
//! processor.set_payload(b"converted".to_vec()).await;
//! ```

mod mock_processor;

pub use mock_processor::{MockProcessor, RecordedJob};
