use std::time::Duration;

use m4k_core::{Config, MediaKind, MediaService};

/// Shared application state
pub struct AppState {
    config: Config,
    audio: MediaService,
    video: MediaService,
    image: MediaService,
}

impl AppState {
    pub fn new(
        config: Config,
        audio: MediaService,
        video: MediaService,
        image: MediaService,
    ) -> Self {
        Self {
            config,
            audio,
            video,
            image,
        }
    }

    /// Builds every service with its default processor.
    pub fn from_config(config: Config) -> Self {
        let audio = MediaService::from_config(MediaKind::Audio, &config);
        let video = MediaService::from_config(MediaKind::Video, &config);
        let image = MediaService::from_config(MediaKind::Image, &config);
        Self::new(config, audio, video, image)
    }

    pub fn service(&self, kind: MediaKind) -> &MediaService {
        match kind {
            MediaKind::Audio => &self.audio,
            MediaKind::Video => &self.video,
            MediaKind::Image => &self.image,
        }
    }

    /// Idle time after which a streaming response emits a keepalive part.
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.config.server.keepalive_interval_ms.max(1))
    }
}
