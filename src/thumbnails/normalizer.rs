//! Square PNG normalization
//!
//! Every thumbnail leaves here as an RGBA8 PNG of exactly `size x size`
//! pixels: the largest centered square is cropped out and resampled with
//! Lanczos3.

use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::imageops::{self, FilterType};
use image::{ExtendedColorType, ImageEncoder, ImageError, ImageReader, Limits, RgbaImage};
use std::io::Cursor;
use tracing::trace;

use crate::errors::NormalizeError;

/// Largest source width or height the decoder accepts
pub const MAX_SOURCE_DIMENSION: u32 = 4096;

/// Decoder allocation ceiling, one RGBA frame at the maximum dimensions
const MAX_DECODE_ALLOC: u64 = MAX_SOURCE_DIMENSION as u64 * MAX_SOURCE_DIMENSION as u64 * 4;

#[derive(Debug, Clone, Copy)]
pub struct ImageNormalizer {
    size: u32,
}

impl ImageNormalizer {
    pub fn new(size: u32) -> Self {
        Self { size }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Decode, center-crop, resize and re-encode arbitrary image bytes
    pub fn normalize(&self, bytes: &[u8]) -> Result<Vec<u8>, NormalizeError> {
        let decoded = decode_limited(bytes)?;
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        if width == 0 || height == 0 {
            return Err(NormalizeError::Empty { width, height });
        }

        let side = width.min(height);
        let left = (width - side) / 2;
        let top = (height - side) / 2;
        trace!(
            "Cropping {}x{} image to {}x{} at ({}, {})",
            width, height, side, side, left, top
        );
        let square = imageops::crop_imm(&rgba, left, top, side, side).to_image();

        let resized = if side == self.size {
            square
        } else {
            imageops::resize(&square, self.size, self.size, FilterType::Lanczos3)
        };

        encode_png(&resized)
    }

    /// Fully transparent square used when no real thumbnail is available
    pub fn blank(&self) -> Result<Vec<u8>, NormalizeError> {
        encode_png(&RgbaImage::new(self.size, self.size))
    }
}

fn decode_limited(bytes: &[u8]) -> Result<image::DynamicImage, NormalizeError> {
    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_SOURCE_DIMENSION);
    limits.max_image_height = Some(MAX_SOURCE_DIMENSION);
    limits.max_alloc = Some(MAX_DECODE_ALLOC);

    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| NormalizeError::Decode(ImageError::IoError(e)))?;
    reader.limits(limits);
    reader.decode().map_err(NormalizeError::Decode)
}

fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, NormalizeError> {
    let mut png_bytes = Vec::new();
    PngEncoder::new_with_quality(&mut png_bytes, CompressionType::Best, PngFilterType::Adaptive)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgba8,
        )
        .map_err(NormalizeError::Encode)?;
    Ok(png_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{
        ColorType, DynamicImage, GenericImageView, GrayImage, ImageFormat, Luma, Rgb, RgbImage,
        Rgba,
    };

    const RED: Rgb<u8> = Rgb([255, 0, 0]);
    const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
    const BLUE: Rgb<u8> = Rgb([0, 0, 255]);

    fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
        bytes
    }

    fn decode(bytes: &[u8]) -> DynamicImage {
        image::load_from_memory_with_format(bytes, ImageFormat::Png).unwrap()
    }

    #[test]
    fn test_landscape_jpeg_becomes_target_square() {
        let source = RgbImage::from_pixel(192, 108, Rgb([40, 90, 160]));
        let bytes = encode(DynamicImage::ImageRgb8(source), ImageFormat::Jpeg);

        let normalized = ImageNormalizer::new(64).normalize(&bytes).unwrap();
        let output = decode(&normalized);

        assert_eq!((output.width(), output.height()), (64, 64));
        assert_eq!(output.color(), ColorType::Rgba8);
    }

    #[test]
    fn test_landscape_crop_keeps_center_columns() {
        // 30x10: red | green | blue thirds, the centered 10x10 square is all green
        let source = RgbImage::from_fn(30, 10, |x, _| match x {
            0..10 => RED,
            10..20 => GREEN,
            _ => BLUE,
        });
        let bytes = encode(DynamicImage::ImageRgb8(source), ImageFormat::Png);

        let normalized = ImageNormalizer::new(10).normalize(&bytes).unwrap();
        let output = decode(&normalized).to_rgba8();

        assert_eq!(output.dimensions(), (10, 10));
        assert!(output.pixels().all(|p| *p == Rgba([0, 255, 0, 255])));
    }

    #[test]
    fn test_portrait_crop_keeps_center_rows() {
        let source = RgbImage::from_fn(10, 30, |_, y| match y {
            0..10 => RED,
            10..20 => GREEN,
            _ => BLUE,
        });
        let bytes = encode(DynamicImage::ImageRgb8(source), ImageFormat::Png);

        let normalized = ImageNormalizer::new(10).normalize(&bytes).unwrap();
        let output = decode(&normalized).to_rgba8();

        assert!(output.pixels().all(|p| *p == Rgba([0, 255, 0, 255])));
    }

    #[test]
    fn test_odd_margin_floors_crop_offset() {
        // 11x4 leaves 7 spare columns, so the crop starts at column 3
        let source = RgbImage::from_fn(11, 4, |x, _| if (3..7).contains(&x) { GREEN } else { RED });
        let bytes = encode(DynamicImage::ImageRgb8(source), ImageFormat::Png);

        let normalized = ImageNormalizer::new(4).normalize(&bytes).unwrap();
        let output = decode(&normalized).to_rgba8();

        assert!(output.pixels().all(|p| *p == Rgba([0, 255, 0, 255])));
    }

    #[test]
    fn test_small_square_is_upscaled() {
        let source = RgbImage::from_pixel(8, 8, BLUE);
        let bytes = encode(DynamicImage::ImageRgb8(source), ImageFormat::Png);

        let normalized = ImageNormalizer::new(32).normalize(&bytes).unwrap();
        assert_eq!(decode(&normalized).dimensions(), (32, 32));
    }

    #[test]
    fn test_grayscale_input_is_promoted_to_rgba() {
        let source = GrayImage::from_pixel(20, 10, Luma([128]));
        let bytes = encode(DynamicImage::ImageLuma8(source), ImageFormat::Png);

        let normalized = ImageNormalizer::new(8).normalize(&bytes).unwrap();
        let output = decode(&normalized);

        assert_eq!(output.color(), ColorType::Rgba8);
        assert_eq!(output.dimensions(), (8, 8));
    }

    #[test]
    fn test_garbage_bytes_fail_to_decode() {
        let normalizer = ImageNormalizer::new(16);
        assert!(matches!(
            normalizer.normalize(b"<html>not an image</html>"),
            Err(NormalizeError::Decode(_))
        ));
        assert!(matches!(normalizer.normalize(&[]), Err(NormalizeError::Decode(_))));
    }

    #[test]
    fn test_oversized_source_dimensions_are_rejected() {
        // tiny file, but decoding it would exceed the dimension limit
        let source = GrayImage::from_pixel(MAX_SOURCE_DIMENSION + 1, 1, Luma([0]));
        let bytes = encode(DynamicImage::ImageLuma8(source), ImageFormat::Png);
        assert!(bytes.len() < 1024);

        assert!(matches!(
            ImageNormalizer::new(16).normalize(&bytes),
            Err(NormalizeError::Decode(_))
        ));
    }

    #[test]
    fn test_source_at_dimension_limit_is_accepted() {
        let source = GrayImage::from_pixel(MAX_SOURCE_DIMENSION, 2, Luma([90]));
        let bytes = encode(DynamicImage::ImageLuma8(source), ImageFormat::Png);

        let normalized = ImageNormalizer::new(8).normalize(&bytes).unwrap();
        assert_eq!(decode(&normalized).dimensions(), (8, 8));
    }

    #[test]
    fn test_blank_is_fully_transparent() {
        let blank = ImageNormalizer::new(24).blank().unwrap();
        let output = decode(&blank).to_rgba8();

        assert_eq!(output.dimensions(), (24, 24));
        assert!(output.pixels().all(|p| p[3] == 0));
    }
}
