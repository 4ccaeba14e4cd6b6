//! Per-kind option sets describing one requested output.

use serde::{Deserialize, Serialize};

use crate::processor::MediaKind;

/// Options for one audio output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AudioOptions {
    /// Output container format (`-f`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Forced input format (input `-f`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_format: Option<String>,
    /// Start position (`-ss`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seek: Option<String>,
    /// Output duration (`-t`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    /// Audio bitrate (`-b:a`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<String>,
    /// Audio filter graph (`-af`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<String>,
    /// Complex filter graph (`-filter_complex`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complex_filters: Option<String>,
    /// Audio codec (`-c:a`), `copy` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codec: Option<String>,
    /// Explicit output file extension.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// Options for one video output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_format: Option<String>,
    /// Number of video frames to write (`-frames:v`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frames: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seek: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_bitrate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_bitrate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_filters: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_filters: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complex_filters: Option<String>,
    /// Display aspect ratio (`-aspect`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect: Option<String>,
    /// Arguments of a `pad` video filter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pad: Option<String>,
    /// Output frame rate (`-r`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
    /// Frame size (`-s`), e.g. `1280x720`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_codec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_codec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// Output encodings supported by the image pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Avif,
    Jpeg,
    Png,
    Webp,
    Tiff,
    Gif,
    Ppm,
}

impl ImageFormat {
    pub const NAMES: &'static [&'static str] =
        &["avif", "jpeg", "png", "webp", "tiff", "gif", "ppm"];

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Avif => "avif",
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Tiff => "tiff",
            Self::Gif => "gif",
            Self::Ppm => "ppm",
        }
    }
}

/// How an image is fitted into a requested box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fit {
    /// Letterbox into the box, preserving aspect ratio.
    Contain,
    /// Fill the box, cropping the overflow.
    Cover,
    /// Stretch to exactly the box.
    Fill,
    /// Largest size that fits inside the box.
    #[default]
    Inside,
    /// Smallest size that covers the box.
    Outside,
}

impl Fit {
    pub const NAMES: &'static [&'static str] = &["contain", "cover", "fill", "inside", "outside"];
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Resize {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fit: Option<Fit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crop {
    #[serde(default)]
    pub left: u32,
    #[serde(default)]
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

/// Options for one image output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageOptions {
    /// Clockwise rotation in degrees; multiples of 90.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotate: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resize: Option<Resize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop: Option<Crop>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<ImageFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colorspace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_metadata: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_exif: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_icc: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// The option set of one output, tagged by media kind.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaOptions {
    Audio(AudioOptions),
    Video(VideoOptions),
    Image(ImageOptions),
}

impl MediaOptions {
    pub fn kind(&self) -> MediaKind {
        match self {
            Self::Audio(_) => MediaKind::Audio,
            Self::Video(_) => MediaKind::Video,
            Self::Image(_) => MediaKind::Image,
        }
    }

    /// File name to report instead of the generated one.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Audio(o) => o.name.as_deref(),
            Self::Video(o) => o.name.as_deref(),
            Self::Image(o) => o.name.as_deref(),
        }
    }

    /// Disk path to write the output to instead of streaming it back.
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::Audio(o) => o.output.as_deref(),
            Self::Video(o) => o.output.as_deref(),
            Self::Image(o) => o.output.as_deref(),
        }
    }
}

impl From<AudioOptions> for MediaOptions {
    fn from(options: AudioOptions) -> Self {
        Self::Audio(options)
    }
}

impl From<VideoOptions> for MediaOptions {
    fn from(options: VideoOptions) -> Self {
        Self::Video(options)
    }
}

impl From<ImageOptions> for MediaOptions {
    fn from(options: ImageOptions) -> Self {
        Self::Image(options)
    }
}
