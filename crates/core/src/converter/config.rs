//! Configuration for the ffmpeg driver.

use std::path::PathBuf;

use crate::config::Config;
use crate::processor::MediaKind;

/// Settings of one [`FfmpegConverter`](super::FfmpegConverter).
#[derive(Debug, Clone)]
pub struct ConverterConfig {
    /// Path to ffmpeg binary.
    pub ffmpeg_path: PathBuf,

    /// Directory for staged inputs and produced outputs.
    pub temp_dir: PathBuf,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("m4k")
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            temp_dir: default_temp_dir(),
        }
    }
}

impl ConverterConfig {
    /// Driver settings for one media kind of the service configuration.
    pub fn from_config(kind: MediaKind, config: &Config) -> Self {
        Self {
            ffmpeg_path: config.processing.ffmpeg_path.clone(),
            temp_dir: config.processing.kind_tmp_dir(kind),
        }
    }

    /// Sets the ffmpeg binary.
    pub fn with_ffmpeg_path(mut self, ffmpeg_path: impl Into<PathBuf>) -> Self {
        self.ffmpeg_path = ffmpeg_path.into();
        self
    }

    /// Sets the temp directory.
    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = temp_dir.into();
        self
    }
}
