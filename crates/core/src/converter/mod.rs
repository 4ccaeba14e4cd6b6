//! Audio and video processing through an external ffmpeg process.
//!
//! Option sets are mapped to ffmpeg arguments ([`build_output_args`]); one
//! invocation produces every requested output of a job. The driver stages
//! the input, parses progress from ffmpeg's stderr, honours cancellation and
//! removes every temp file it created.
//!
//! # Example
//!
//! ```ignore
//! use m4k_core::converter::{ConverterConfig, FfmpegConverter};
//!
//! let converter = FfmpegConverter::new(
//!     ConverterConfig::default().with_temp_dir("/tmp/m4k/audio"),
//! );
//! converter.process(input, &options, &events, &cancel).await?;
//! ```

mod args;
mod config;
mod driver;
mod mime;
mod progress;

pub use args::{build_command_args, build_output_args, extension_for_format, OutputArgs};
pub use config::ConverterConfig;
pub use driver::FfmpegConverter;
pub use mime::{mime_type_for, DEFAULT_MIME_TYPE};
pub use progress::ProgressParser;
