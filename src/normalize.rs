//! Shrink user photos until they fit inside a single stored record
//
// Every photo is stored inline as a base64 JPEG data URL, so the encoded
// string has to stay below the record size ceiling of the store. Images are
// bounded to a maximum dimension first, then the JPEG quality is lowered step
// by step, and as a last resort the image is downscaled once more.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use camino::{Utf8Path, Utf8PathBuf};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, RgbImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("unable to decode image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("unable to read {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to encode image: {0}")]
    Encode(#[source] image::ImageError),
    #[error("image normalization did not complete: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("not a JPEG data URL")]
    NotDataUrl,
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Limits applied when normalizing an image.
///
/// Qualities are JPEG qualities in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizerSettings {
    /// Longest side allowed before the first encode.
    pub max_dimension: u32,
    /// Size ceiling of the image payload before base64 inflation.
    pub max_size_bytes: usize,
    /// Growth factor of base64 text over the raw bytes.
    pub inflation: f64,
    pub initial_quality: u8,
    pub quality_step: u8,
    pub min_quality: u8,
    /// Applied to both dimensions when quality reduction is not enough.
    pub fallback_scale: f64,
    pub fallback_quality: u8,
}

impl Default for NormalizerSettings {
    fn default() -> Self {
        Self {
            max_dimension: 1600,
            max_size_bytes: 1_000_000,
            inflation: 1.33,
            initial_quality: 90,
            quality_step: 10,
            min_quality: 50,
            fallback_scale: 0.7,
            fallback_quality: 60,
        }
    }
}

impl NormalizerSettings {
    /// The longest encoded data URL accepted without further reduction.
    pub fn encoded_limit(&self) -> usize {
        (self.max_size_bytes as f64 * self.inflation) as usize
    }
}

/// How the final encoding was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncodePath {
    /// The first encode was already small enough.
    Direct,
    /// The quality was lowered at least once.
    Reduced,
    /// The image was downscaled and encoded once at the fallback quality.
    /// The result is not checked against the ceiling.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedImage {
    pub data_url: String,
    pub width: u32,
    pub height: u32,
    pub quality: u8,
    pub path: EncodePath,
}

impl NormalizedImage {
    pub fn encoded_len(&self) -> usize {
        self.data_url.len()
    }
}

/// Dimensions bounded so the longer side is at most `max`.
///
/// Images are never upscaled and the aspect ratio is kept.
pub fn target_dimensions(width: u32, height: u32, max: u32) -> (u32, u32) {
    let scale = |side: u32, long: u32| -> u32 {
        let scaled = (side as f64 * (max as f64 / long as f64)).round();
        (scaled as u32).max(1)
    };

    if width > height {
        if width > max {
            return (max, scale(height, width));
        }
    } else if height > max {
        return (scale(width, height), max);
    }
    (width, height)
}

/// Normalize an in-memory image file.
pub fn normalize_bytes(
    bytes: &[u8],
    settings: &NormalizerSettings,
) -> Result<NormalizedImage, NormalizeError> {
    let source = decode(bytes)?;
    let (width, height) = target_dimensions(source.width(), source.height(), settings.max_dimension);
    let canvas = resample(&source, width, height);

    let limit = settings.encoded_limit();
    let mut quality = settings.initial_quality;
    let mut data_url = encode(&canvas, quality)?;
    let mut path = EncodePath::Direct;

    while data_url.len() > limit {
        let Some(next) = quality
            .checked_sub(settings.quality_step)
            .filter(|q| *q >= settings.min_quality && *q < quality)
        else {
            break;
        };
        quality = next;
        data_url = encode(&canvas, quality)?;
        path = EncodePath::Reduced;
        tracing::debug!(quality, size = data_url.len(), "Reduced JPEG quality");
    }

    if data_url.len() <= limit {
        return Ok(NormalizedImage {
            data_url,
            width,
            height,
            quality,
            path,
        });
    }

    // One final downscale, accepted whatever size it ends up at
    let shrink = |side: u32| ((side as f64 * settings.fallback_scale) as u32).max(1);
    let (width, height) = (shrink(width), shrink(height));
    let canvas = resample(&source, width, height);
    let quality = settings.fallback_quality;
    let data_url = encode(&canvas, quality)?;
    tracing::warn!(
        width,
        height,
        size = data_url.len(),
        limit,
        "Image still too large at minimum quality, downscaled"
    );
    Ok(NormalizedImage {
        data_url,
        width,
        height,
        quality,
        path: EncodePath::Fallback,
    })
}

/// Read and normalize a single image file.
///
/// The decoding and encoding runs on the blocking thread pool.
#[tracing::instrument(name = "Normalizing image", skip_all, fields(path = %path))]
pub async fn normalize_file(
    path: &Utf8Path,
    settings: NormalizerSettings,
) -> Result<NormalizedImage, NormalizeError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| NormalizeError::Io {
            path: path.to_owned(),
            source,
        })?;
    let normalized =
        tokio::task::spawn_blocking(move || normalize_bytes(&bytes, &settings)).await??;
    tracing::debug!(
        width = normalized.width,
        height = normalized.height,
        quality = normalized.quality,
        size = normalized.encoded_len(),
        "Normalized image"
    );
    Ok(normalized)
}

/// Normalize all files concurrently.
///
/// The first failure rejects the whole batch. On success the images are in
/// the same order as `paths`.
pub async fn normalize_batch<P: AsRef<Utf8Path>>(
    paths: &[P],
    settings: NormalizerSettings,
) -> Result<Vec<NormalizedImage>, NormalizeError> {
    futures::future::try_join_all(paths.iter().map(|p| normalize_file(p.as_ref(), settings)))
        .await
}

/// Decode a data URL produced by the normalizer back into pixels.
pub fn decode_data_url(data_url: &str) -> Result<DynamicImage, NormalizeError> {
    let payload = data_url
        .strip_prefix(DATA_URL_PREFIX)
        .ok_or(NormalizeError::NotDataUrl)?;
    let bytes = STANDARD.decode(payload)?;
    image::load_from_memory_with_format(&bytes, ImageFormat::Jpeg).map_err(NormalizeError::Decode)
}

fn decode(bytes: &[u8]) -> Result<DynamicImage, NormalizeError> {
    let image = image::load_from_memory(bytes).map_err(NormalizeError::Decode)?;
    Ok(apply_orientation(image, exif_orientation(bytes)))
}

// Photos straight from a camera or phone are often stored sideways with an
// EXIF orientation tag. Browsers honour that tag when drawing, so do the same.
fn exif_orientation(bytes: &[u8]) -> u32 {
    exif::Reader::new()
        .read_from_container(&mut Cursor::new(bytes))
        .ok()
        .and_then(|exif| {
            exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
                .and_then(|field| field.value.get_uint(0))
        })
        .unwrap_or(1)
}

fn apply_orientation(image: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => image.fliph(),
        3 => image.rotate180(),
        4 => image.flipv(),
        5 => image.rotate90().fliph(),
        6 => image.rotate90(),
        7 => image.rotate270().fliph(),
        8 => image.rotate270(),
        _ => image,
    }
}

// JPEG has no alpha channel, transparent areas are flattened.
fn resample(source: &DynamicImage, width: u32, height: u32) -> RgbImage {
    if source.dimensions() == (width, height) {
        source.to_rgb8()
    } else {
        source
            .resize_exact(width, height, FilterType::Triangle)
            .to_rgb8()
    }
}

fn encode(canvas: &RgbImage, quality: u8) -> Result<String, NormalizeError> {
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality)
        .encode_image(canvas)
        .map_err(NormalizeError::Encode)?;

    let mut data_url = String::with_capacity(DATA_URL_PREFIX.len() + buffer.len() * 4 / 3 + 4);
    data_url.push_str(DATA_URL_PREFIX);
    STANDARD.encode_string(&buffer, &mut data_url);
    Ok(data_url)
}

#[cfg(test)]
pub(crate) mod tests {
    use image::{ImageBuffer, Rgb, Rgba, RgbaImage};

    use super::*;

    /// A smooth gradient, compresses well.
    pub(crate) fn gradient(width: u32, height: u32) -> RgbImage {
        ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([
                (x * 255 / width.max(1)) as u8,
                (y * 255 / height.max(1)) as u8,
                128,
            ])
        })
    }

    /// Pseudo random pixels, compresses badly.
    pub(crate) fn noise(width: u32, height: u32) -> RgbImage {
        let mut state: u32 = 0x9E37_79B9;
        ImageBuffer::from_fn(width, height, |_, _| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let [r, g, b, _] = state.to_le_bytes();
            Rgb([r, g, b])
        })
    }

    pub(crate) fn png_bytes(image: &RgbImage) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        image
            .write_to(&mut buffer, ImageFormat::Png)
            .expect("Error writing image to buffer");
        buffer.into_inner()
    }

    #[test]
    fn bounds_landscape_images() {
        assert_eq!(target_dimensions(4000, 3000, 1600), (1600, 1200));
        assert_eq!(target_dimensions(3000, 4000, 1600), (1200, 1600));
        assert_eq!(target_dimensions(2000, 2000, 1600), (1600, 1600));
        assert_eq!(target_dimensions(1601, 3, 1600), (1600, 3));
    }

    #[test]
    fn never_upscales() {
        assert_eq!(target_dimensions(1600, 900, 1600), (1600, 900));
        assert_eq!(target_dimensions(640, 480, 1600), (640, 480));
        assert_eq!(target_dimensions(1, 1, 1600), (1, 1));
    }

    #[test]
    fn keeps_aspect_ratio_within_a_pixel() {
        for (width, height) in [(4032, 3024), (5000, 1234), (1700, 1699), (2448, 3264)] {
            let (w, h) = target_dimensions(width, height, 1600);
            assert_eq!(w.max(h), 1600);
            let expected = if width > height {
                height as f64 * w as f64 / width as f64
            } else {
                width as f64 * h as f64 / height as f64
            };
            let actual = f64::from(if width > height { h } else { w });
            assert!((actual - expected).abs() <= 1.0, "{width}x{height}");
        }
    }

    #[test]
    fn small_images_are_encoded_once() {
        let bytes = png_bytes(&gradient(320, 200));
        let normalized = normalize_bytes(&bytes, &NormalizerSettings::default()).unwrap();
        assert_eq!((normalized.width, normalized.height), (320, 200));
        assert_eq!(normalized.quality, 90);
        assert_eq!(normalized.path, EncodePath::Direct);
        assert!(normalized.data_url.starts_with(DATA_URL_PREFIX));

        let decoded = decode_data_url(&normalized.data_url).unwrap();
        assert_eq!(decoded.dimensions(), (320, 200));
    }

    #[test]
    fn lowers_quality_before_downscaling() {
        let bytes = png_bytes(&noise(200, 200));
        let unlimited = normalize_bytes(&bytes, &NormalizerSettings::default()).unwrap();
        let at_minimum = {
            let settings = NormalizerSettings {
                initial_quality: 50,
                ..Default::default()
            };
            normalize_bytes(&bytes, &settings).unwrap()
        };
        // Ceiling between the best and worst quality encodings
        let ceiling = (unlimited.encoded_len() + at_minimum.encoded_len()) / 2;
        let settings = NormalizerSettings {
            max_size_bytes: ceiling,
            inflation: 1.0,
            ..Default::default()
        };

        let normalized = normalize_bytes(&bytes, &settings).unwrap();
        assert_eq!(normalized.path, EncodePath::Reduced);
        assert!(normalized.quality < 90 && normalized.quality >= 50);
        assert!(normalized.encoded_len() <= ceiling);
        assert_eq!((normalized.width, normalized.height), (200, 200));
    }

    #[test]
    fn falls_back_to_a_single_downscale() {
        let bytes = png_bytes(&noise(200, 100));
        let settings = NormalizerSettings {
            max_size_bytes: 64,
            inflation: 1.0,
            ..Default::default()
        };

        let normalized = normalize_bytes(&bytes, &settings).unwrap();
        assert_eq!(normalized.path, EncodePath::Fallback);
        assert_eq!(normalized.quality, 60);
        assert_eq!((normalized.width, normalized.height), (140, 70));
        // The fallback is not checked against the ceiling
        assert!(normalized.encoded_len() > settings.encoded_limit());
    }

    #[test]
    fn flattens_transparency() {
        let image: RgbaImage = ImageBuffer::from_pixel(40, 30, Rgba([255, 0, 0, 0]));
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, ImageFormat::Png).unwrap();

        let normalized =
            normalize_bytes(buffer.get_ref(), &NormalizerSettings::default()).unwrap();
        assert_eq!((normalized.width, normalized.height), (40, 30));
    }

    #[test]
    fn rejects_empty_input() {
        assert!(matches!(
            normalize_bytes(&[], &NormalizerSettings::default()),
            Err(NormalizeError::Decode(_))
        ));
    }

    #[test]
    fn rejects_non_images() {
        let text = b"these are not the pixels you are looking for";
        assert!(matches!(
            normalize_bytes(text, &NormalizerSettings::default()),
            Err(NormalizeError::Decode(_))
        ));
    }

    #[test]
    fn rejects_truncated_images() {
        let bytes = png_bytes(&gradient(64, 64));
        assert!(matches!(
            normalize_bytes(&bytes[..bytes.len() / 2], &NormalizerSettings::default()),
            Err(NormalizeError::Decode(_))
        ));
    }

    #[test]
    fn rotates_sideways_photos() {
        let image = DynamicImage::ImageRgb8(gradient(60, 20));
        assert_eq!(apply_orientation(image.clone(), 6).dimensions(), (20, 60));
        assert_eq!(apply_orientation(image.clone(), 3).dimensions(), (60, 20));
        assert_eq!(apply_orientation(image, 1).dimensions(), (60, 20));
    }

    #[test]
    fn rejects_foreign_data_urls() {
        assert!(matches!(
            decode_data_url("data:image/png;base64,AAAA"),
            Err(NormalizeError::NotDataUrl)
        ));
    }

    #[tokio::test]
    async fn batch_is_rejected_by_one_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        let mut paths = Vec::new();
        for i in 0..3 {
            let path = root.join(format!("good-{i}.png"));
            std::fs::write(&path, png_bytes(&gradient(50, 40))).unwrap();
            paths.push(path);
        }
        let corrupt = root.join("corrupt.jpg");
        std::fs::write(&corrupt, b"\xFF\xD8 not really a jpeg").unwrap();

        let good = normalize_batch(&paths, NormalizerSettings::default())
            .await
            .unwrap();
        assert_eq!(good.len(), 3);

        paths.push(corrupt);
        let result = normalize_batch(&paths, NormalizerSettings::default()).await;
        assert!(matches!(result, Err(NormalizeError::Decode(_))));
    }

    #[tokio::test]
    async fn missing_files_are_io_errors() {
        let result = normalize_file(
            Utf8Path::new("/definitely/not/here.jpg"),
            NormalizerSettings::default(),
        )
        .await;
        assert!(matches!(result, Err(NormalizeError::Io { .. })));
    }
}
