//! Job pipeline: jobs, events, the processor seam and the per-kind service.
//!
//! A [`MediaService`] owns one bounded queue and one [`Processor`]. Submitting
//! a [`Job`] returns the receiving end of its event channel:
//!
//! ```ignore
//! use m4k_core::processor::{Event, Job, JobInput, MediaKind, MediaService};
//!
//! let service = MediaService::from_config(MediaKind::Audio, &config);
//! let mut events = service.submit(Job::new(MediaKind::Audio, options, JobInput::Path(path)))?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         Event::QueuePosition { position } => println!("position {}", position),
//!         Event::Progress { progress } => println!("{}%", progress),
//!         Event::ProcessedFile(file) => println!("file {}", file.name),
//!         Event::ProcessingError { message } => eprintln!("{}", message),
//!     }
//! }
//! ```

mod error;
mod service;
mod traits;
mod types;

pub use error::{ProcessError, SubmitError};
pub use service::MediaService;
pub use traits::Processor;
pub use types::{
    Event, EventSink, FileRelease, Job, JobInput, MediaKind, ProcessedFile, StatusPayload,
};
