use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::processor::MediaKind;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default = "default_audio_queue")]
    pub audio: QueueConfig,
    #[serde(default = "default_video_queue")]
    pub video: QueueConfig,
    #[serde(default = "default_image_queue")]
    pub image: QueueConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            processing: ProcessingConfig::default(),
            audio: default_audio_queue(),
            video: default_video_queue(),
            image: default_image_queue(),
        }
    }
}

impl Config {
    /// Queue sizing for a media kind.
    pub fn queue(&self, kind: MediaKind) -> &QueueConfig {
        match kind {
            MediaKind::Audio => &self.audio,
            MediaKind::Video => &self.video,
            MediaKind::Image => &self.image,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Interval between keepalive parts while a job is idle.
    #[serde(default = "default_keepalive_interval")]
    pub keepalive_interval_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            keepalive_interval_ms: default_keepalive_interval(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    3000
}

fn default_keepalive_interval() -> u64 {
    5000
}

/// Settings shared by every processing job.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcessingConfig {
    /// Path to the ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,
    /// Root of the temp directories; each media kind uses a subdirectory.
    #[serde(default = "default_tmp_dir")]
    pub tmp_dir: PathBuf,
    /// Upper bound for the run phase of one job. 0 disables the limit.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Capacity of the per-job event channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            tmp_dir: default_tmp_dir(),
            timeout_secs: default_timeout(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl ProcessingConfig {
    /// Temp directory for one media kind.
    pub fn kind_tmp_dir(&self, kind: MediaKind) -> PathBuf {
        self.tmp_dir.join(kind.as_str())
    }
}

fn default_ffmpeg_path() -> PathBuf {
    std::env::var_os("FFMPEG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("ffmpeg"))
}

fn default_tmp_dir() -> PathBuf {
    std::env::temp_dir().join("m4k")
}

fn default_timeout() -> u64 {
    3600
}

fn default_event_buffer() -> usize {
    16
}

/// Sizing of one job queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct QueueConfig {
    /// Jobs allowed to run at the same time.
    pub parallelize: usize,
    /// Jobs admitted at once, running plus waiting.
    pub max: usize,
}

impl QueueConfig {
    pub fn new(parallelize: usize, max: usize) -> Self {
        Self { parallelize, max }
    }
}

fn default_audio_queue() -> QueueConfig {
    QueueConfig::new(1, 5)
}

fn default_video_queue() -> QueueConfig {
    QueueConfig::new(1, 5)
}

fn default_image_queue() -> QueueConfig {
    QueueConfig::new(5, 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_full_config() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 9000
keepalive_interval_ms = 250

[processing]
ffmpeg_path = "/opt/ffmpeg/bin/ffmpeg"
tmp_dir = "/var/tmp/m4k"
timeout_secs = 60

[audio]
parallelize = 2
max = 10
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host.to_string(), "127.0.0.1");
        assert_eq!(config.server.keepalive_interval_ms, 250);
        assert_eq!(
            config.processing.ffmpeg_path,
            PathBuf::from("/opt/ffmpeg/bin/ffmpeg")
        );
        assert_eq!(config.processing.timeout_secs, 60);
        assert_eq!(config.audio, QueueConfig::new(2, 10));
        // Unspecified sections fall back to per-kind defaults
        assert_eq!(config.video, QueueConfig::new(1, 5));
        assert_eq!(config.image, QueueConfig::new(5, 100));
    }

    #[test]
    fn test_deserialize_empty_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.processing.event_buffer, 16);
        assert_eq!(config.queue(MediaKind::Image).parallelize, 5);
    }

    #[test]
    fn test_kind_tmp_dir() {
        let processing = ProcessingConfig {
            tmp_dir: PathBuf::from("/tmp/m4k"),
            ..Default::default()
        };
        assert_eq!(
            processing.kind_tmp_dir(MediaKind::Audio),
            PathBuf::from("/tmp/m4k/audio")
        );
        assert_eq!(
            processing.kind_tmp_dir(MediaKind::Video),
            PathBuf::from("/tmp/m4k/video")
        );
    }
}
