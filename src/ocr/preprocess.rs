use std::path::Path;

use image::{DynamicImage, GrayImage, Luma};
use serde::{Deserialize, Serialize};

use super::enhance::{clahe, denoise_nl_means};
use crate::error::{ReadingError, Result};

/// Foreground/background levels of a binarized image.
pub const WHITE: u8 = 255;
pub const BLACK: u8 = 0;

/// Tunable parameters of the preprocessing chain.
///
/// The defaults are tuned for photos of the HTC-2 LCD taken under room light.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessParams {
    /// CLAHE clip limit (0 disables clipping)
    pub clahe_clip_limit: f32,
    /// CLAHE tiles per axis
    pub clahe_tile_grid: u32,
    /// Non-local-means filter strength `h`
    pub denoise_strength: f32,
    /// Non-local-means patch size (odd)
    pub denoise_patch_size: u32,
    /// Non-local-means search window (odd)
    pub denoise_search_window: u32,
    /// Adaptive threshold neighbourhood size (odd, >= 3)
    pub threshold_block_size: u32,
    /// Constant subtracted from the weighted neighbourhood mean
    pub threshold_offset: i32,
}

impl Default for PreprocessParams {
    fn default() -> Self {
        Self {
            clahe_clip_limit: 2.0,
            clahe_tile_grid: 8,
            denoise_strength: 10.0,
            denoise_patch_size: 7,
            denoise_search_window: 21,
            threshold_block_size: 11,
            threshold_offset: 2,
        }
    }
}

/// Output of [`preprocess`]: the untouched source plus its binarized form.
#[derive(Clone, Debug)]
pub struct Preprocessed {
    pub original: DynamicImage,
    pub binarized: GrayImage,
}

/// Decodes an image file, mapping any failure to [`ReadingError::UnreadableImage`].
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    image::open(path).map_err(|source| ReadingError::UnreadableImage {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads `path` and runs the full preprocessing chain on it.
pub fn preprocess_file(path: &Path, params: &PreprocessParams) -> Result<Preprocessed> {
    let raw = load_image(path)?;
    log::debug!(
        "Loaded {} ({}x{})",
        path.display(),
        raw.width(),
        raw.height()
    );
    preprocess(&raw, params)
}

/// Turns a photograph into a two-level image suited for digit recognition.
///
/// Steps: luminance → CLAHE → non-local-means denoising → adaptive Gaussian
/// threshold → 2×2 closing → 2×2 opening. The result only contains
/// [`BLACK`] and [`WHITE`] pixels.
pub fn preprocess(raw: &DynamicImage, params: &PreprocessParams) -> Result<Preprocessed> {
    let gray = to_luminance(raw);
    let enhanced = clahe(
        &gray,
        params.clahe_tile_grid,
        params.clahe_tile_grid,
        params.clahe_clip_limit,
    )?;
    let denoised = denoise_nl_means(
        &enhanced,
        params.denoise_strength,
        params.denoise_patch_size,
        params.denoise_search_window,
    )?;
    let binary = adaptive_gaussian_threshold(
        &denoised,
        params.threshold_block_size,
        params.threshold_offset,
    )?;
    let binarized = open_2x2(&close_2x2(&binary));

    Ok(Preprocessed {
        original: raw.clone(),
        binarized,
    })
}

/// Converts to single-channel luminance.
///
/// Uses the ITU-R BT.601 luma formula: Y = 0.299*R + 0.587*G + 0.114*B
pub fn to_luminance(img: &DynamicImage) -> GrayImage {
    if let DynamicImage::ImageLuma8(gray) = img {
        return gray.clone();
    }

    let rgb = img.to_rgb8();
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let p = rgb.get_pixel(x, y);
        let luma = 0.299 * p[0] as f32 + 0.587 * p[1] as f32 + 0.114 * p[2] as f32;
        Luma([luma.round().clamp(0.0, 255.0) as u8])
    })
}

/// Normalized 1-D Gaussian kernel of `size` taps.
///
/// Sigma is derived from the size: `0.3 * ((size - 1) * 0.5 - 1) + 0.8`.
fn gaussian_kernel(size: u32) -> Vec<f32> {
    let sigma = 0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let center = (size / 2) as f32;
    let mut kernel: Vec<f32> = (0..size)
        .map(|i| {
            let d = i as f32 - center;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let total: f32 = kernel.iter().sum();
    for k in kernel.iter_mut() {
        *k /= total;
    }
    kernel
}

/// Gaussian-weighted local mean with replicated borders, rounded to u8.
fn gaussian_mean(img: &GrayImage, block_size: u32) -> GrayImage {
    let (width, height) = img.dimensions();
    let kernel = gaussian_kernel(block_size);
    let radius = (block_size / 2) as i64;
    let clamp_x = |x: i64| x.clamp(0, width as i64 - 1) as u32;
    let clamp_y = |y: i64| y.clamp(0, height as i64 - 1) as u32;

    // Horizontal pass
    let mut horizontal = vec![0f32; (width * height) as usize];
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let sx = clamp_x(x as i64 + k as i64 - radius);
                acc += weight * img.get_pixel(sx, y)[0] as f32;
            }
            horizontal[(y * width + x) as usize] = acc;
        }
    }

    // Vertical pass
    GrayImage::from_fn(width, height, |x, y| {
        let mut acc = 0.0;
        for (k, weight) in kernel.iter().enumerate() {
            let sy = clamp_y(y as i64 + k as i64 - radius);
            acc += weight * horizontal[(sy * width + x) as usize];
        }
        Luma([acc.round().clamp(0.0, 255.0) as u8])
    })
}

/// Binarizes against a Gaussian-weighted local mean.
///
/// A pixel becomes [`WHITE`] when it is brighter than its neighbourhood mean
/// minus `offset`, otherwise [`BLACK`]. This copes with illumination that
/// varies across a curved, glossy display.
pub fn adaptive_gaussian_threshold(img: &GrayImage, block_size: u32, offset: i32) -> Result<GrayImage> {
    if block_size < 3 || block_size % 2 == 0 {
        return Err(ReadingError::InvalidParameter(format!(
            "threshold block size must be odd and at least 3, got {}",
            block_size
        )));
    }

    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Ok(img.clone());
    }

    let mean = gaussian_mean(img, block_size);
    Ok(GrayImage::from_fn(width, height, |x, y| {
        let value = img.get_pixel(x, y)[0] as i32;
        let local = mean.get_pixel(x, y)[0] as i32;
        Luma([if value - local > -offset { WHITE } else { BLACK }])
    }))
}

/// Applies a 2×2 min/max filter. `dir` selects the element's offsets:
/// -1 covers (x-1..=x, y-1..=y), +1 covers (x..=x+1, y..=y+1).
/// Pixels outside the image are ignored.
fn filter_2x2(img: &GrayImage, dir: i64, dilate: bool) -> GrayImage {
    let (width, height) = img.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        let mut value = img.get_pixel(x, y)[0];
        for (ox, oy) in [(dir, 0), (0, dir), (dir, dir)] {
            let nx = x as i64 + ox;
            let ny = y as i64 + oy;
            if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                continue;
            }
            let n = img.get_pixel(nx as u32, ny as u32)[0];
            value = if dilate { value.max(n) } else { value.min(n) };
        }
        Luma([value])
    })
}

/// Morphological closing with a 2×2 square: fills pinholes in strokes.
pub fn close_2x2(img: &GrayImage) -> GrayImage {
    filter_2x2(&filter_2x2(img, -1, true), 1, false)
}

/// Morphological opening with a 2×2 square: removes isolated specks.
pub fn open_2x2(img: &GrayImage) -> GrayImage {
    filter_2x2(&filter_2x2(img, -1, false), 1, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use tempfile::tempdir;

    /// Synthetic "display": light background with two dark bars and soft noise.
    fn synthetic_display() -> DynamicImage {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_fn(48, 40, |x, y| {
            let noise = ((x * 31 + y * 17) % 7) as u8;
            let in_bar = (8..40).contains(&x) && ((6..14).contains(&y) || (24..32).contains(&y));
            if in_bar {
                Rgb([30 + noise, 30 + noise, 30 + noise])
            } else {
                Rgb([200 - noise, 205 - noise, 190 - noise])
            }
        });
        DynamicImage::ImageRgb8(img)
    }

    fn small_params() -> PreprocessParams {
        PreprocessParams {
            denoise_patch_size: 3,
            denoise_search_window: 7,
            ..PreprocessParams::default()
        }
    }

    #[test]
    fn test_to_luminance_bt601() {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_fn(2, 1, |x, _| {
            if x == 0 { Rgb([255, 0, 0]) } else { Rgb([0, 0, 255]) }
        });
        let gray = to_luminance(&DynamicImage::ImageRgb8(img));
        assert_eq!(gray.get_pixel(0, 0)[0], 76);
        assert_eq!(gray.get_pixel(1, 0)[0], 29);
    }

    #[test]
    fn test_gaussian_kernel_is_normalized_and_symmetric() {
        let kernel = gaussian_kernel(11);
        assert_eq!(kernel.len(), 11);
        let total: f32 = kernel.iter().sum();
        assert!((total - 1.0).abs() < 1e-5);
        assert!((kernel[0] - kernel[10]).abs() < 1e-7);
        assert!(kernel[5] > kernel[4]);
    }

    #[test]
    fn test_adaptive_threshold_rejects_even_block() {
        let img = GrayImage::new(10, 10);
        assert!(adaptive_gaussian_threshold(&img, 10, 2).is_err());
        assert!(adaptive_gaussian_threshold(&img, 1, 2).is_err());
    }

    #[test]
    fn test_adaptive_threshold_uniform_is_white() {
        // value - mean == 0 > -2 for every pixel
        let img = GrayImage::from_pixel(20, 20, Luma([77]));
        let out = adaptive_gaussian_threshold(&img, 11, 2).unwrap();
        assert!(out.pixels().all(|p| p[0] == WHITE));
    }

    #[test]
    fn test_adaptive_threshold_marks_dark_stroke() {
        let img = GrayImage::from_fn(21, 21, |x, _| Luma([if x == 10 { 20 } else { 220 }]));
        let out = adaptive_gaussian_threshold(&img, 11, 2).unwrap();
        assert_eq!(out.get_pixel(10, 10)[0], BLACK);
        assert_eq!(out.get_pixel(3, 10)[0], WHITE);
    }

    #[test]
    fn test_close_fills_single_pixel_hole() {
        let mut img = GrayImage::from_pixel(6, 6, Luma([WHITE]));
        img.put_pixel(3, 3, Luma([BLACK]));
        let closed = close_2x2(&img);
        assert!(closed.pixels().all(|p| p[0] == WHITE));
    }

    #[test]
    fn test_open_removes_single_pixel_speck() {
        let mut img = GrayImage::from_pixel(6, 6, Luma([BLACK]));
        img.put_pixel(2, 2, Luma([WHITE]));
        let opened = open_2x2(&img);
        assert!(opened.pixels().all(|p| p[0] == BLACK));
    }

    #[test]
    fn test_open_keeps_large_block_in_place() {
        let img = GrayImage::from_fn(10, 10, |x, y| {
            Luma([if (3..7).contains(&x) && (3..7).contains(&y) { WHITE } else { BLACK }])
        });
        assert_eq!(open_2x2(&img), img);
        assert_eq!(close_2x2(&img), img);
    }

    #[test]
    fn test_preprocess_is_binary_and_same_size() {
        let raw = synthetic_display();
        let result = preprocess(&raw, &small_params()).unwrap();
        assert_eq!(result.binarized.dimensions(), (48, 40));
        assert!(result.binarized.pixels().all(|p| p[0] == WHITE || p[0] == BLACK));
        assert_eq!(result.original, raw);
    }

    #[test]
    fn test_preprocess_is_idempotent() {
        let raw = synthetic_display();
        let first = preprocess(&raw, &small_params()).unwrap();
        let second = preprocess(&raw, &small_params()).unwrap();
        assert_eq!(first.binarized, second.binarized);
    }

    #[test]
    fn test_preprocess_rejects_bad_params() {
        let raw = synthetic_display();
        let params = PreprocessParams {
            clahe_tile_grid: 0,
            ..PreprocessParams::default()
        };
        assert!(matches!(
            preprocess(&raw, &params),
            Err(ReadingError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_preprocess_file_missing_is_unreadable() {
        let dir = tempdir().unwrap();
        let err = preprocess_file(&dir.path().join("nope.jpg"), &small_params()).unwrap_err();
        assert!(matches!(err, ReadingError::UnreadableImage { .. }));
    }

    #[test]
    fn test_preprocess_file_corrupt_is_unreadable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"definitely not a png").unwrap();
        let err = preprocess_file(&path, &small_params()).unwrap_err();
        assert!(matches!(err, ReadingError::UnreadableImage { .. }));
    }

    #[test]
    fn test_preprocess_file_roundtrip_png() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("display.png");
        synthetic_display().save(&path).unwrap();
        let result = preprocess_file(&path, &small_params()).unwrap();
        assert_eq!(result.binarized.dimensions(), (48, 40));
    }
}
