//! Trait definitions for the processor module.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::error::ProcessError;
use super::types::{EventSink, JobInput};
use crate::options::MediaOptions;

/// Runs the actual work of one admitted job.
///
/// Implementations stage the input, produce one output per entry of
/// `options` (in order), report progress and files through `events`, and
/// remove every temp file they created before returning, whatever the
/// outcome.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Returns the name of this processor implementation.
    fn name(&self) -> &str;

    /// Processes one job.
    ///
    /// Returns [`ProcessError::Aborted`] when `cancel` fires and
    /// [`ProcessError::Disconnected`] when the event receiver goes away.
    async fn process(
        &self,
        input: JobInput,
        options: &[MediaOptions],
        events: &EventSink,
        cancel: &CancellationToken,
    ) -> Result<(), ProcessError>;
}
