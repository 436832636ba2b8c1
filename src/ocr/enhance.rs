//! Contrast enhancement and denoising for photographed displays.
//!
//! Both filters work on single-channel images and are fully deterministic,
//! so running them twice on the same input gives identical output.

use image::{GrayImage, Luma};

use crate::error::{ReadingError, Result};

/// Histogram bins for 8-bit images.
const BINS: usize = 256;

/// Weights below this are treated as zero by the non-local-means filter.
const MIN_WEIGHT: f64 = 1e-3;

/// Contrast-limited adaptive histogram equalization (CLAHE).
///
/// The image is divided into `tiles_x` × `tiles_y` tiles. Each tile gets its
/// own equalization curve, built from a histogram clipped at
/// `clip_limit * tile_area / 256` (at least 1) with the excess spread over all
/// bins. Every pixel is mapped through the four nearest tile curves and the
/// results are blended bilinearly, which avoids visible tile seams.
///
/// A `clip_limit` of zero disables clipping (plain tiled equalization).
pub fn clahe(img: &GrayImage, tiles_x: u32, tiles_y: u32, clip_limit: f32) -> Result<GrayImage> {
    if tiles_x == 0 || tiles_y == 0 {
        return Err(ReadingError::InvalidParameter(format!(
            "CLAHE tile grid must be positive, got {}x{}",
            tiles_x, tiles_y
        )));
    }
    if !clip_limit.is_finite() || clip_limit < 0.0 {
        return Err(ReadingError::InvalidParameter(format!(
            "CLAHE clip limit must be a non-negative number, got {}",
            clip_limit
        )));
    }

    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Ok(img.clone());
    }

    // Never use more tiles than pixels along an axis
    let tile_w = width.div_ceil(tiles_x.min(width));
    let tile_h = height.div_ceil(tiles_y.min(height));
    let grid_x = width.div_ceil(tile_w) as usize;
    let grid_y = height.div_ceil(tile_h) as usize;

    let mut luts: Vec<[u8; BINS]> = Vec::with_capacity(grid_x * grid_y);
    for ty in 0..grid_y as u32 {
        for tx in 0..grid_x as u32 {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(width);
            let y1 = (y0 + tile_h).min(height);
            luts.push(tile_lut(img, x0, y0, x1, y1, clip_limit));
        }
    }

    let inv_tw = 1.0 / tile_w as f32;
    let inv_th = 1.0 / tile_h as f32;
    let mut output = GrayImage::new(width, height);

    for y in 0..height {
        let tyf = y as f32 * inv_th - 0.5;
        let ty1f = tyf.floor();
        let ya = tyf - ty1f;
        let ty1 = (ty1f as isize).clamp(0, grid_y as isize - 1) as usize;
        let ty2 = ((ty1f as isize) + 1).clamp(0, grid_y as isize - 1) as usize;

        for x in 0..width {
            let txf = x as f32 * inv_tw - 0.5;
            let tx1f = txf.floor();
            let xa = txf - tx1f;
            let tx1 = (tx1f as isize).clamp(0, grid_x as isize - 1) as usize;
            let tx2 = ((tx1f as isize) + 1).clamp(0, grid_x as isize - 1) as usize;

            let v = img.get_pixel(x, y)[0] as usize;
            let top = luts[ty1 * grid_x + tx1][v] as f32 * (1.0 - xa)
                + luts[ty1 * grid_x + tx2][v] as f32 * xa;
            let bottom = luts[ty2 * grid_x + tx1][v] as f32 * (1.0 - xa)
                + luts[ty2 * grid_x + tx2][v] as f32 * xa;
            let blended = top * (1.0 - ya) + bottom * ya;

            output.put_pixel(x, y, Luma([blended.round().clamp(0.0, 255.0) as u8]));
        }
    }

    Ok(output)
}

/// Builds the clipped equalization curve for one tile `[x0, x1) × [y0, y1)`.
fn tile_lut(img: &GrayImage, x0: u32, y0: u32, x1: u32, y1: u32, clip_limit: f32) -> [u8; BINS] {
    let mut hist = [0u32; BINS];
    for y in y0..y1 {
        for x in x0..x1 {
            hist[img.get_pixel(x, y)[0] as usize] += 1;
        }
    }

    let area = (x1 - x0) * (y1 - y0);

    if clip_limit > 0.0 {
        let clip = ((clip_limit * area as f32 / BINS as f32) as u32).max(1);

        let mut excess = 0u32;
        for bin in hist.iter_mut() {
            if *bin > clip {
                excess += *bin - clip;
                *bin = clip;
            }
        }

        let batch = excess / BINS as u32;
        let residual = (excess % BINS as u32) as usize;
        for bin in hist.iter_mut() {
            *bin += batch;
        }
        if residual > 0 {
            let step = (BINS / residual).max(1);
            for bin in hist.iter_mut().step_by(step).take(residual) {
                *bin += 1;
            }
        }
    }

    let scale = 255.0 / area as f32;
    let mut lut = [0u8; BINS];
    let mut cumulative = 0u32;
    for (i, &count) in hist.iter().enumerate() {
        cumulative += count;
        lut[i] = (cumulative as f32 * scale).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

/// Non-local-means denoising for grayscale images.
///
/// Each output pixel is a weighted average of the pixels in a
/// `search_window` × `search_window` neighbourhood. A candidate's weight is
/// `exp(-d / h²)` where `d` is the mean squared difference between the
/// `patch_size` × `patch_size` patches around the two pixels. Image borders
/// are replicated.
///
/// Patch distances are computed per search offset with an integral image, so
/// the cost is independent of the patch size.
pub fn denoise_nl_means(
    img: &GrayImage,
    strength: f32,
    patch_size: u32,
    search_window: u32,
) -> Result<GrayImage> {
    if patch_size == 0 || patch_size % 2 == 0 {
        return Err(ReadingError::InvalidParameter(format!(
            "denoise patch size must be odd and positive, got {}",
            patch_size
        )));
    }
    if search_window == 0 || search_window % 2 == 0 {
        return Err(ReadingError::InvalidParameter(format!(
            "denoise search window must be odd and positive, got {}",
            search_window
        )));
    }
    if !strength.is_finite() || strength <= 0.0 {
        return Err(ReadingError::InvalidParameter(format!(
            "denoise strength must be positive, got {}",
            strength
        )));
    }

    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Ok(img.clone());
    }

    let w = width as usize;
    let h = height as usize;
    let pr = (patch_size / 2) as usize;
    let sr = (search_window / 2) as usize;
    let pad = pr + sr;

    // Replicate-padded copy so every patch and search offset stays in bounds
    let pw = w + 2 * pad;
    let ph = h + 2 * pad;
    let mut padded = vec![0i32; pw * ph];
    for py in 0..ph {
        let sy = (py as isize - pad as isize).clamp(0, h as isize - 1) as u32;
        for px in 0..pw {
            let sx = (px as isize - pad as isize).clamp(0, w as isize - 1) as u32;
            padded[py * pw + px] = img.get_pixel(sx, sy)[0] as i32;
        }
    }

    // Weight lookup indexed by the rounded mean squared patch difference
    let h2 = (strength as f64) * (strength as f64);
    let cutoff = ((-MIN_WEIGHT.ln()) * h2).ceil() as usize + 1;
    let weights: Vec<f64> = (0..cutoff).map(|d| (-(d as f64) / h2).exp()).collect();
    let patch_area = (patch_size * patch_size) as u64;

    // Integral image over the region the patches of all output pixels touch
    let iw = w + 2 * pr;
    let ih = h + 2 * pr;
    let stride = iw + 1;
    let mut integral = vec![0u64; stride * (ih + 1)];

    let mut sum = vec![0f64; w * h];
    let mut weight_sum = vec![0f64; w * h];

    let offset = pad - pr;
    for dy in -(sr as isize)..=(sr as isize) {
        for dx in -(sr as isize)..=(sr as isize) {
            for j in 0..ih {
                let row = (j + offset) * pw;
                let shifted = ((j + offset) as isize + dy) as usize * pw;
                let mut row_sum = 0u64;
                for i in 0..iw {
                    let a = padded[row + i + offset];
                    let b = padded[shifted + ((i + offset) as isize + dx) as usize];
                    let diff = (a - b) as i64;
                    row_sum += (diff * diff) as u64;
                    integral[(j + 1) * stride + i + 1] = integral[j * stride + i + 1] + row_sum;
                }
            }

            let span = 2 * pr + 1;
            for y in 0..h {
                for x in 0..w {
                    let ssd = integral[(y + span) * stride + x + span] + integral[y * stride + x]
                        - integral[y * stride + x + span]
                        - integral[(y + span) * stride + x];
                    let d = ((ssd + patch_area / 2) / patch_area) as usize;
                    let Some(&weight) = weights.get(d) else {
                        continue;
                    };
                    if weight < MIN_WEIGHT {
                        continue;
                    }
                    let candidate = padded[((y + pad) as isize + dy) as usize * pw
                        + ((x + pad) as isize + dx) as usize];
                    sum[y * w + x] += weight * candidate as f64;
                    weight_sum[y * w + x] += weight;
                }
            }
        }
    }

    // The zero offset always contributes weight 1, so weight_sum is never zero
    Ok(GrayImage::from_fn(width, height, |x, y| {
        let idx = y as usize * w + x as usize;
        Luma([(sum[idx] / weight_sum[idx]).round().clamp(0.0, 255.0) as u8])
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| Luma([((x * 7 + y * 3) % 256) as u8]))
    }

    #[test]
    fn test_clahe_rejects_empty_grid() {
        let img = gradient(16, 16);
        assert!(clahe(&img, 0, 8, 2.0).is_err());
        assert!(clahe(&img, 8, 8, -1.0).is_err());
    }

    #[test]
    fn test_clahe_keeps_dimensions() {
        let img = gradient(37, 23);
        let out = clahe(&img, 8, 8, 2.0).unwrap();
        assert_eq!(out.dimensions(), (37, 23));
    }

    #[test]
    fn test_clahe_uniform_image_stays_uniform() {
        let img = GrayImage::from_pixel(32, 32, Luma([90]));
        let out = clahe(&img, 8, 8, 2.0).unwrap();
        let first = out.get_pixel(0, 0)[0];
        assert!(out.pixels().all(|p| p[0] == first));
    }

    #[test]
    fn test_clahe_stretches_low_contrast() {
        // Two close gray levels should be pushed further apart
        let img = GrayImage::from_fn(64, 64, |x, _| Luma([if x < 32 { 100 } else { 110 }]));
        let out = clahe(&img, 1, 1, 0.0).unwrap();
        let dark = out.get_pixel(0, 0)[0] as i32;
        let bright = out.get_pixel(63, 0)[0] as i32;
        assert!(bright - dark > 10, "dark={} bright={}", dark, bright);
    }

    #[test]
    fn test_clahe_handles_image_smaller_than_grid() {
        let img = gradient(3, 2);
        let out = clahe(&img, 8, 8, 2.0).unwrap();
        assert_eq!(out.dimensions(), (3, 2));
    }

    #[test]
    fn test_denoise_rejects_even_windows() {
        let img = gradient(8, 8);
        assert!(denoise_nl_means(&img, 10.0, 6, 21).is_err());
        assert!(denoise_nl_means(&img, 10.0, 7, 20).is_err());
        assert!(denoise_nl_means(&img, 0.0, 7, 21).is_err());
    }

    #[test]
    fn test_denoise_uniform_image_unchanged() {
        let img = GrayImage::from_pixel(20, 20, Luma([123]));
        let out = denoise_nl_means(&img, 10.0, 7, 21).unwrap();
        assert_eq!(out, img);
    }

    #[test]
    fn test_denoise_removes_single_speck() {
        let mut img = GrayImage::from_pixel(15, 15, Luma([200]));
        img.put_pixel(7, 7, Luma([185]));
        let out = denoise_nl_means(&img, 10.0, 3, 7).unwrap();
        let center = out.get_pixel(7, 7)[0];
        assert!(center > 185, "speck should be pulled toward background, got {}", center);
    }

    #[test]
    fn test_denoise_is_deterministic() {
        let img = gradient(24, 18);
        let a = denoise_nl_means(&img, 10.0, 7, 21).unwrap();
        let b = denoise_nl_means(&img, 10.0, 7, 21).unwrap();
        assert_eq!(a, b);
    }
}
