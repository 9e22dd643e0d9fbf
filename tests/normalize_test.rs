use std::io::Cursor;

use camino::Utf8PathBuf;
use image::codecs::jpeg::JpegEncoder;
use image::{GenericImageView, ImageBuffer, ImageFormat, Rgb, RgbImage};
use posing_library::normalize::{
    decode_data_url, normalize_bytes, normalize_file, target_dimensions, EncodePath,
    NormalizerSettings,
};
use proptest::prelude::*;

// A photo-like frame: smooth lighting with some fine detail.
fn portrait(width: u32, height: u32) -> RgbImage {
    ImageBuffer::from_fn(width, height, |x, y| {
        let detail = ((x / 7 + y / 5) % 3) as u8 * 12;
        Rgb([
            (x * 200 / width) as u8 + detail,
            (y * 200 / height) as u8 + detail,
            150 - detail,
        ])
    })
}

fn jpeg_bytes(image: &RgbImage) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buffer, 95)
        .encode_image(image)
        .unwrap();
    buffer.into_inner()
}

#[test]
fn large_photo_fits_under_ceiling() {
    let settings = NormalizerSettings::default();
    let bytes = jpeg_bytes(&portrait(4000, 3000));

    let normalized = normalize_bytes(&bytes, &settings).unwrap();
    assert_eq!((normalized.width, normalized.height), (1600, 1200));
    assert!(normalized.encoded_len() <= 1_330_000);
    assert_ne!(normalized.path, EncodePath::Fallback);

    let decoded = decode_data_url(&normalized.data_url).unwrap();
    assert_eq!(decoded.dimensions(), (1600, 1200));
}

#[test]
fn portrait_orientation_keeps_aspect_ratio() {
    let settings = NormalizerSettings::default();
    let bytes = jpeg_bytes(&portrait(1000, 3000));

    let normalized = normalize_bytes(&bytes, &settings).unwrap();
    assert_eq!(normalized.height, 1600);
    let expected = 1000.0 * 1600.0 / 3000.0;
    assert!((f64::from(normalized.width) - expected).abs() <= 1.0);
}

#[tokio::test]
async fn normalizes_files_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(dir.path().join("studio.jpg")).unwrap();
    std::fs::write(&path, jpeg_bytes(&portrait(640, 480))).unwrap();

    let normalized = normalize_file(&path, NormalizerSettings::default())
        .await
        .unwrap();
    assert_eq!((normalized.width, normalized.height), (640, 480));
    assert_eq!(normalized.path, EncodePath::Direct);
    assert_eq!(normalized.quality, 90);
    assert!(normalized.data_url.starts_with("data:image/jpeg;base64,"));
}

// Blocks of pseudo random colour, somewhere between a photo and pure noise.
fn speckled(width: u32, height: u32, seed: u32) -> Vec<u8> {
    let mut state = seed | 1;
    let image: RgbImage = ImageBuffer::from_fn(width, height, |x, y| {
        if (x + y) % 3 == 0 {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
        }
        let [r, g, b, _] = state.to_le_bytes();
        Rgb([r, g, b])
    });
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png).unwrap();
    buffer.into_inner()
}

proptest! {
    #[test]
    fn long_side_is_bounded(width in 1u32..20_000, height in 1u32..20_000) {
        let (w, h) = target_dimensions(width, height, 1600);
        prop_assert!(w <= width && h <= height);
        if width <= 1600 && height <= 1600 {
            prop_assert_eq!((w, h), (width, height));
        } else {
            prop_assert_eq!(w.max(h), 1600);
            let long = f64::from(width.max(height));
            let expected_w = f64::from(width) * 1600.0 / long;
            let expected_h = f64::from(height) * 1600.0 / long;
            prop_assert!((f64::from(w) - expected_w).abs() <= 1.0);
            prop_assert!((f64::from(h) - expected_h).abs() <= 1.0);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn output_respects_limits(
        width in 1u32..120,
        height in 1u32..120,
        seed in any::<u32>(),
        max_size_bytes in 100usize..12_000,
    ) {
        let settings = NormalizerSettings {
            max_dimension: 80,
            max_size_bytes,
            ..Default::default()
        };
        let normalized = normalize_bytes(&speckled(width, height, seed), &settings).unwrap();

        prop_assert!(normalized.width.max(normalized.height) <= 80);
        match normalized.path {
            EncodePath::Fallback => prop_assert_eq!(normalized.quality, 60),
            _ => {
                prop_assert!(normalized.encoded_len() <= settings.encoded_limit());
                prop_assert!((50..=90).contains(&normalized.quality));
            }
        }
        let decoded = decode_data_url(&normalized.data_url).unwrap();
        prop_assert_eq!(decoded.dimensions(), (normalized.width, normalized.height));
    }
}
