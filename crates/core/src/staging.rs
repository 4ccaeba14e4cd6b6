//! Temp-file handling shared by the processors.
//!
//! Every invocation gets a random id that namespaces the temp paths it
//! creates (`in-<id>`, `out-<id>-<n>.<ext>`), so concurrent jobs sharing a
//! directory never collide and no locking is needed.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::processor::{JobInput, ProcessError};

/// Generates a random, filesystem-safe invocation id.
pub fn new_job_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Path of the `n`th output (1-based) of invocation `id`.
pub fn output_path(dir: &Path, id: &str, n: usize, extension: &str) -> PathBuf {
    dir.join(format!("out-{}-{}.{}", id, n, extension))
}

/// The input of a job as a path the processor can read.
#[derive(Debug)]
pub struct StagedInput {
    path: PathBuf,
    /// Whether the file was created by staging and must be removed.
    owned: bool,
}

impl StagedInput {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_owned(&self) -> bool {
        self.owned
    }

    /// Removes the staged file if staging created it.
    pub async fn cleanup(self) {
        if self.owned {
            remove_quietly(&self.path).await;
        }
    }
}

/// Makes the job input available as a file under `dir`.
///
/// Path inputs are used in place. Streamed inputs are copied to `in-<id>`;
/// the copy stops as soon as `cancel` fires, and a partial file is removed
/// before the error is returned.
pub async fn stage_input(
    input: JobInput,
    dir: &Path,
    id: &str,
    cancel: &CancellationToken,
) -> Result<StagedInput, ProcessError> {
    if cancel.is_cancelled() {
        return Err(ProcessError::Aborted);
    }

    let mut reader = match input {
        JobInput::Path(path) => {
            return Ok(StagedInput { path, owned: false });
        }
        JobInput::Reader(reader) => reader,
    };

    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format!("in-{}", id));
    let staged = StagedInput {
        path: path.clone(),
        owned: true,
    };

    let copy = async {
        let mut file = tokio::fs::File::create(&path).await?;
        let bytes = tokio::io::copy(&mut reader, &mut file).await?;
        file.flush().await?;
        Ok::<u64, std::io::Error>(bytes)
    };

    let result = tokio::select! {
        result = copy => result.map_err(ProcessError::from),
        _ = cancel.cancelled() => Err(ProcessError::Aborted),
    };

    match result {
        Ok(bytes) => {
            debug!(path = %path.display(), bytes, "Input staged");
            Ok(staged)
        }
        Err(e) => {
            staged.cleanup().await;
            Err(e)
        }
    }
}

/// Removes a file, logging failures other than it already being gone.
pub async fn remove_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed temp file"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove temp file"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_job_ids_are_unique_and_safe() {
        let a = new_job_id();
        let b = new_job_id();
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_output_path_layout() {
        let path = output_path(Path::new("/tmp/m4k/audio"), "abc", 2, "ogg");
        assert_eq!(path, PathBuf::from("/tmp/m4k/audio/out-abc-2.ogg"));
    }

    #[tokio::test]
    async fn test_stage_reader_input() {
        let dir = TempDir::new().unwrap();
        let input = JobInput::reader(&b"hello"[..]);

        let staged = stage_input(input, dir.path(), "id1", &CancellationToken::new())
            .await
            .unwrap();
        assert!(staged.is_owned());
        assert_eq!(staged.path(), dir.path().join("in-id1"));
        assert_eq!(tokio::fs::read(staged.path()).await.unwrap(), b"hello");

        let path = staged.path().to_path_buf();
        staged.cleanup().await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_path_input_is_not_owned() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("source.wav");
        tokio::fs::write(&file, b"data").await.unwrap();

        let staged = stage_input(
            JobInput::Path(file.clone()),
            dir.path(),
            "id2",
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(!staged.is_owned());
        staged.cleanup().await;
        assert!(file.exists());
    }

    #[tokio::test]
    async fn test_cancelled_before_staging() {
        let dir = TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = stage_input(JobInput::reader(&b"x"[..]), dir.path(), "id3", &cancel).await;
        assert!(matches!(result, Err(ProcessError::Aborted)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_during_staging_removes_partial_file() {
        let dir = TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        let (mut writer, reader) = tokio::io::duplex(64);

        let task = {
            let dir = dir.path().to_path_buf();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                stage_input(JobInput::reader(reader), &dir, "id4", &cancel).await
            })
        };

        writer.write_all(b"partial").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        cancel.cancel();

        let result = task.await.unwrap();
        assert!(matches!(result, Err(ProcessError::Aborted)));
        assert!(!dir.path().join("in-id4").exists());
    }
}
