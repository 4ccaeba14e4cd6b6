//! The ffmpeg process driver.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::args::{build_command_args, build_output_args, OutputArgs};
use super::config::ConverterConfig;
use super::mime::mime_type_for;
use super::progress::ProgressParser;
use crate::options::MediaOptions;
use crate::processor::{EventSink, JobInput, ProcessError, ProcessedFile, Processor};
use crate::staging::{new_job_id, output_path, remove_quietly, stage_input, StagedInput};

const READ_BUFFER: usize = 8 * 1024;

/// Runs one ffmpeg invocation per job, producing every requested output.
pub struct FfmpegConverter {
    config: ConverterConfig,
}

impl FfmpegConverter {
    pub fn new(config: ConverterConfig) -> Self {
        Self { config }
    }

    fn spawn(&self, args: &[String]) -> Result<Child, ProcessError> {
        Command::new(&self.config.ffmpeg_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ProcessError::FfmpegNotFound {
                        path: self.config.ffmpeg_path.clone(),
                    }
                } else {
                    ProcessError::Io(e)
                }
            })
    }

    async fn run(
        &self,
        id: &str,
        staged: &StagedInput,
        outputs: &[OutputArgs],
        paths: &[PathBuf],
        events: &EventSink,
        cancel: &CancellationToken,
    ) -> Result<(), ProcessError> {
        let path_strings: Vec<String> = paths
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        let args = build_command_args(
            &staged.path().to_string_lossy(),
            outputs.iter().zip(path_strings.iter().map(String::as_str)),
        );

        let mut child = self.spawn(&args)?;
        info!(id, pid = child.id(), outputs = outputs.len(), "ffmpeg started");
        debug!(id, ?args, "ffmpeg arguments");

        let result = tokio::select! {
            result = drive(&mut child, events) => result,
            _ = cancel.cancelled() => Err(ProcessError::Aborted),
        };

        if result.is_err() {
            if let Ok(None) = child.try_wait() {
                warn!(id, "Killing ffmpeg");
                if let Err(e) = child.kill().await {
                    warn!(id, error = %e, "Failed to kill ffmpeg");
                }
            }
        }

        // A killed process also ends its output early; never report that as
        // anything but the cancellation.
        match result {
            Err(e) if cancel.is_cancelled() && !e.is_cancellation() => {
                return Err(ProcessError::Aborted)
            }
            other => other?,
        }

        // Outside the select: a file handed to the consumer is waited for
        // even when the run is cancelled meanwhile.
        for path in paths {
            emit_file(path, events, cancel).await?;
        }
        Ok(())
    }
}

/// Reads diagnostics and progress until ffmpeg exits successfully.
async fn drive(child: &mut Child, events: &EventSink) -> Result<(), ProcessError> {
    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| std::io::Error::other("ffmpeg stderr was not captured"))?;

    let mut parser = ProgressParser::new();
    let mut diagnostics = Vec::new();
    let mut buf = vec![0u8; READ_BUFFER];

    loop {
        let n = stderr.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        diagnostics.extend_from_slice(&buf[..n]);
        for progress in parser.feed(&buf[..n]) {
            events.progress(progress).await?;
        }
    }
    for progress in parser.finish() {
        events.progress(progress).await?;
    }

    let status = child.wait().await?;
    if !status.success() {
        return Err(ProcessError::process_failed(
            status.code(),
            String::from_utf8_lossy(&diagnostics),
        ));
    }
    debug!(duration_ms = ?parser.duration_ms(), "ffmpeg finished");

    if parser.last() != Some(100) {
        events.progress(100).await?;
    }
    Ok(())
}

/// Sends one output and deletes it once the consumer is done with it.
async fn emit_file(
    path: &Path,
    events: &EventSink,
    cancel: &CancellationToken,
) -> Result<(), ProcessError> {
    tokio::fs::metadata(path).await?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();

    let (file, release) = ProcessedFile::new(name, mime_type_for(&extension), path);
    let sent = events.file(file, release, cancel).await;
    remove_quietly(path).await;
    sent
}

#[async_trait]
impl Processor for FfmpegConverter {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn process(
        &self,
        input: JobInput,
        options: &[MediaOptions],
        events: &EventSink,
        cancel: &CancellationToken,
    ) -> Result<(), ProcessError> {
        if cancel.is_cancelled() {
            return Err(ProcessError::Aborted);
        }

        let outputs = options
            .iter()
            .map(|o| {
                build_output_args(o).ok_or_else(|| {
                    ProcessError::invalid_options(format!(
                        "{} options cannot be processed by ffmpeg",
                        o.kind()
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        if outputs.is_empty() {
            return Err(ProcessError::invalid_options("no outputs requested"));
        }

        let id = new_job_id();
        let dir = &self.config.temp_dir;
        tokio::fs::create_dir_all(dir).await?;

        let paths: Vec<PathBuf> = outputs
            .iter()
            .enumerate()
            .map(|(i, o)| output_path(dir, &id, i + 1, &o.extension))
            .collect();

        let staged = stage_input(input, dir, &id, cancel).await?;
        let result = self
            .run(&id, &staged, &outputs, &paths, events, cancel)
            .await;

        for path in &paths {
            remove_quietly(path).await;
        }
        staged.cleanup().await;

        match &result {
            Ok(()) => info!(id, "ffmpeg job completed"),
            Err(e) if e.is_cancellation() => info!(id, reason = %e, "ffmpeg job stopped"),
            Err(e) => warn!(id, error = %e, "ffmpeg job failed"),
        }
        result
    }
}
