//! Image processing with the `image` crate.

use async_trait::async_trait;
use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat as EncodedFormat, RgbaImage};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::converter::mime_type_for;
use crate::options::{Crop, Fit, ImageFormat, ImageOptions, MediaOptions, Resize};
use crate::processor::{EventSink, JobInput, ProcessError, ProcessedFile, Processor};
use crate::staging::{new_job_id, output_path, remove_quietly, stage_input};

const DEFAULT_QUALITY: u8 = 80;
const AVIF_SPEED: u8 = 8;
const FILTER: FilterType = FilterType::Lanczos3;

/// Renders one image output per option set from a single decoded input.
pub struct ImageProcessor {
    temp_dir: PathBuf,
}

impl ImageProcessor {
    pub fn new(temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            temp_dir: temp_dir.into(),
        }
    }

    async fn run(
        &self,
        id: &str,
        input: &Path,
        options: &[ImageOptions],
        events: &EventSink,
        cancel: &CancellationToken,
    ) -> Result<(), ProcessError> {
        events.progress(0).await?;

        let bytes = tokio::fs::read(input).await?;
        let decoded = blocking(cancel, move || {
            image::load_from_memory(&bytes).map_err(|e| ProcessError::image(e.to_string()))
        })
        .await?;
        debug!(id, width = decoded.width(), height = decoded.height(), "Image decoded");

        let total = options.len();
        for (index, opts) in options.iter().enumerate() {
            let format = opts.format.unwrap_or_default();
            let path = output_path(&self.temp_dir, id, index + 1, format.extension());

            let source = decoded.clone();
            let target = path.clone();
            let opts = opts.clone();
            let rendered = blocking(cancel, move || render(source, &opts, &target)).await;
            if let Err(e) = rendered {
                remove_quietly(&path).await;
                return Err(e);
            }

            let name = format!("file{}.{}", index + 1, format.extension());
            let mime_type = mime_type_for(format.extension());
            let (file, release) = ProcessedFile::new(name, mime_type, &path);
            let sent = events.file(file, release, cancel).await;
            remove_quietly(&path).await;
            sent?;

            let done = index + 1;
            let progress = ((done as f64) * 100.0 / total as f64).round() as u8;
            events.progress(progress).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Processor for ImageProcessor {
    fn name(&self) -> &str {
        "image"
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

        let options = options
            .iter()
            .map(|o| match o {
                MediaOptions::Image(image) => Ok(image.clone()),
                other => Err(ProcessError::invalid_options(format!(
                    "{} options cannot be processed as images",
                    other.kind()
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        if options.is_empty() {
            return Err(ProcessError::invalid_options("no outputs requested"));
        }

        let id = new_job_id();
        tokio::fs::create_dir_all(&self.temp_dir).await?;
        let staged = stage_input(input, &self.temp_dir, &id, cancel).await?;

        let result = self.run(&id, staged.path(), &options, events, cancel).await;
        staged.cleanup().await;

        match &result {
            Ok(()) => info!(id, outputs = options.len(), "Image job completed"),
            Err(e) if e.is_cancellation() => info!(id, reason = %e, "Image job stopped"),
            Err(e) => warn!(id, error = %e, "Image job failed"),
        }
        result
    }
}

/// Runs CPU-bound work off the async threads; reports cancellation once it ends.
async fn blocking<T, F>(cancel: &CancellationToken, work: F) -> Result<T, ProcessError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ProcessError> + Send + 'static,
{
    let mut handle = tokio::task::spawn_blocking(work);
    tokio::select! {
        joined = &mut handle => joined.map_err(|e| ProcessError::image(e.to_string()))?,
        _ = cancel.cancelled() => {
            // Let it finish so nothing writes into the temp dir after cleanup.
            let _ = handle.await;
            Err(ProcessError::Aborted)
        }
    }
}

/// Applies one option set and writes the encoded result to `path`.
fn render(image: DynamicImage, opts: &ImageOptions, path: &Path) -> Result<(), ProcessError> {
    let mut image = rotate(image, opts.rotate.unwrap_or(0))?;
    if let Some(resize) = &opts.resize {
        image = apply_resize(image, resize);
    }
    if let Some(colorspace) = &opts.colorspace {
        image = apply_colorspace(image, colorspace)?;
    }
    if let Some(crop) = &opts.crop {
        image = apply_crop(image, crop)?;
    }
    encode(
        &image,
        opts.format.unwrap_or_default(),
        opts.quality.unwrap_or(DEFAULT_QUALITY),
        path,
    )
}

fn rotate(image: DynamicImage, degrees: i32) -> Result<DynamicImage, ProcessError> {
    match degrees.rem_euclid(360) {
        0 => Ok(image),
        90 => Ok(image.rotate90()),
        180 => Ok(image.rotate180()),
        270 => Ok(image.rotate270()),
        _ => Err(ProcessError::image(format!(
            "Rotation must be a multiple of 90 degrees, got {}",
            degrees
        ))),
    }
}

fn apply_resize(image: DynamicImage, resize: &Resize) -> DynamicImage {
    let (iw, ih) = (image.width().max(1), image.height().max(1));
    let scaled = |from: u32, to: u32, other: u32| -> u32 {
        ((other as f64) * (to as f64) / (from as f64)).round().max(1.0) as u32
    };

    let (width, height) = match (resize.width, resize.height) {
        (None, None) => return image,
        (Some(w), None) => return image.resize_exact(w.max(1), scaled(iw, w, ih), FILTER),
        (None, Some(h)) => return image.resize_exact(scaled(ih, h, iw), h.max(1), FILTER),
        (Some(w), Some(h)) => (w.max(1), h.max(1)),
    };

    match resize.fit.unwrap_or_default() {
        Fit::Inside => image.resize(width, height, FILTER),
        Fit::Cover => image.resize_to_fill(width, height, FILTER),
        Fit::Fill => image.resize_exact(width, height, FILTER),
        Fit::Outside => {
            let factor = (width as f64 / iw as f64).max(height as f64 / ih as f64);
            let w = ((iw as f64) * factor).round().max(1.0) as u32;
            let h = ((ih as f64) * factor).round().max(1.0) as u32;
            image.resize_exact(w, h, FILTER)
        }
        Fit::Contain => {
            let inner = image.resize(width, height, FILTER).to_rgba8();
            let mut canvas = RgbaImage::new(width, height);
            let x = (width.saturating_sub(inner.width()) / 2) as i64;
            let y = (height.saturating_sub(inner.height()) / 2) as i64;
            imageops::overlay(&mut canvas, &inner, x, y);
            DynamicImage::ImageRgba8(canvas)
        }
    }
}

fn apply_colorspace(image: DynamicImage, colorspace: &str) -> Result<DynamicImage, ProcessError> {
    match colorspace.to_ascii_lowercase().as_str() {
        "b-w" | "grey" | "gray" | "grey16" => Ok(image.grayscale()),
        "srgb" | "rgb" => Ok(DynamicImage::ImageRgba8(image.to_rgba8())),
        other => Err(ProcessError::image(format!(
            "Unsupported colorspace: {}",
            other
        ))),
    }
}

fn apply_crop(image: DynamicImage, crop: &Crop) -> Result<DynamicImage, ProcessError> {
    let fits_x = crop.left.checked_add(crop.width).is_some_and(|r| r <= image.width());
    let fits_y = crop.top.checked_add(crop.height).is_some_and(|b| b <= image.height());
    if crop.width == 0 || crop.height == 0 || !fits_x || !fits_y {
        return Err(ProcessError::image(format!(
            "Crop area {}x{}+{}+{} is outside the {}x{} image",
            crop.width,
            crop.height,
            crop.left,
            crop.top,
            image.width(),
            image.height()
        )));
    }
    Ok(image.crop_imm(crop.left, crop.top, crop.width, crop.height))
}

fn encode(
    image: &DynamicImage,
    format: ImageFormat,
    quality: u8,
    path: &Path,
) -> Result<(), ProcessError> {
    let mut writer = BufWriter::new(File::create(path)?);
    let quality = quality.clamp(1, 100);
    let to_err = |e: image::ImageError| ProcessError::image(e.to_string());

    match format {
        ImageFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut writer, quality);
            DynamicImage::ImageRgb8(image.to_rgb8())
                .write_with_encoder(encoder)
                .map_err(to_err)?;
        }
        ImageFormat::Avif => {
            let encoder = AvifEncoder::new_with_speed_quality(&mut writer, AVIF_SPEED, quality);
            DynamicImage::ImageRgba8(image.to_rgba8())
                .write_with_encoder(encoder)
                .map_err(to_err)?;
        }
        ImageFormat::Webp => DynamicImage::ImageRgba8(image.to_rgba8())
            .write_to(&mut writer, EncodedFormat::WebP)
            .map_err(to_err)?,
        ImageFormat::Gif => DynamicImage::ImageRgba8(image.to_rgba8())
            .write_to(&mut writer, EncodedFormat::Gif)
            .map_err(to_err)?,
        ImageFormat::Ppm => DynamicImage::ImageRgb8(image.to_rgb8())
            .write_to(&mut writer, EncodedFormat::Pnm)
            .map_err(to_err)?,
        ImageFormat::Png => image.write_to(&mut writer, EncodedFormat::Png).map_err(to_err)?,
        ImageFormat::Tiff => DynamicImage::ImageRgba8(image.to_rgba8())
            .write_to(&mut writer, EncodedFormat::Tiff)
            .map_err(to_err)?,
    }

    std::io::Write::flush(&mut writer)?;
    Ok(())
}
