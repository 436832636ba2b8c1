//! Region-of-interest localization.
//!
//! The HTC-2 shows temperature on the top line and humidity on the bottom
//! line of a single LCD panel, so one display rectangle split in two halves
//! yields both digit regions.

use std::fmt;
use std::str::FromStr;

use image::GrayImage;
use imageproc::contours::{find_contours, BorderType, Contour};
use serde::{Deserialize, Serialize};

use crate::error::{ReadingError, Result};

/// An axis-aligned rectangle in pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rectangle {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rectangle {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// The rectangle covering a whole `width` × `height` image.
    pub const fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// True when the rectangle is non-empty and lies completely inside the image.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && self.x as u64 + self.width as u64 <= width as u64
            && self.y as u64 + self.height as u64 <= height as u64
    }

    /// Splits into top and bottom halves by row count.
    ///
    /// The top half gets `height / 2` rows and the bottom half the rest, so an
    /// odd extra row lands in the bottom half. The halves never overlap and
    /// together cover the rectangle exactly.
    pub fn split_rows(&self) -> (Rectangle, Rectangle) {
        let top_height = self.height / 2;
        let top = Rectangle::new(self.x, self.y, self.width, top_height);
        let bottom = Rectangle::new(
            self.x,
            self.y + top_height,
            self.width,
            self.height - top_height,
        );
        (top, bottom)
    }
}

impl fmt::Display for Rectangle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.x, self.y, self.width, self.height)
    }
}

/// Parses `x,y,width,height`.
impl FromStr for Rectangle {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let values = s
            .split(',')
            .map(|part| {
                part.trim()
                    .parse::<u32>()
                    .map_err(|e| format!("invalid coordinate '{}': {}", part.trim(), e))
            })
            .collect::<std::result::Result<Vec<u32>, String>>()?;

        match values.as_slice() {
            &[x, y, width, height] => Ok(Rectangle::new(x, y, width, height)),
            _ => Err(format!(
                "expected 4 comma-separated values (x,y,width,height), got {}",
                values.len()
            )),
        }
    }
}

/// How the digit regions are found.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegionSpec {
    /// Locate the display by its largest external contour.
    Auto,
    /// A known display rectangle, split into top and bottom halves.
    Display(Rectangle),
    /// Independently calibrated rectangles for each reading.
    Separate {
        temperature: Rectangle,
        humidity: Rectangle,
    },
}

/// The two digit regions cropped from the binarized image.
#[derive(Clone, Debug)]
pub struct RoiPair {
    pub temperature: GrayImage,
    pub humidity: GrayImage,
}

/// Crops a rectangle, rejecting rectangles that are empty or leave the image.
pub fn crop_rect(img: &GrayImage, rect: &Rectangle) -> Result<GrayImage> {
    let (width, height) = img.dimensions();
    if !rect.fits_within(width, height) {
        return Err(ReadingError::RegionOutOfBounds {
            rect: *rect,
            width,
            height,
        });
    }
    Ok(image::imageops::crop_imm(img, rect.x, rect.y, rect.width, rect.height).to_image())
}

/// Crops `display` and splits it into temperature (top) and humidity (bottom).
pub fn split_display(img: &GrayImage, display: &Rectangle) -> Result<RoiPair> {
    let (width, height) = img.dimensions();
    if !display.fits_within(width, height) {
        return Err(ReadingError::RegionOutOfBounds {
            rect: *display,
            width,
            height,
        });
    }

    let (top, bottom) = display.split_rows();
    let crop = |r: &Rectangle| image::imageops::crop_imm(img, r.x, r.y, r.width, r.height).to_image();
    Ok(RoiPair {
        temperature: crop(&top),
        humidity: crop(&bottom),
    })
}

/// Area enclosed by a contour polygon (shoelace formula).
fn contour_area(contour: &Contour<i32>) -> f64 {
    let points = &contour.points;
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice_area = 0i64;
    for (i, p) in points.iter().enumerate() {
        let q = &points[(i + 1) % points.len()];
        twice_area += p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64;
    }
    (twice_area as f64 / 2.0).abs()
}

fn bounding_rect(contour: &Contour<i32>) -> Option<Rectangle> {
    let min_x = contour.points.iter().map(|p| p.x).min()?;
    let max_x = contour.points.iter().map(|p| p.x).max()?;
    let min_y = contour.points.iter().map(|p| p.y).min()?;
    let max_y = contour.points.iter().map(|p| p.y).max()?;
    Some(Rectangle::new(
        min_x as u32,
        min_y as u32,
        (max_x - min_x + 1) as u32,
        (max_y - min_y + 1) as u32,
    ))
}

/// Finds the bounding rectangle of the largest external contour.
///
/// Foreground is every non-zero pixel. Returns `None` if the image has no
/// foreground at all. On equal areas the first contour found wins.
pub fn detect_display(img: &GrayImage) -> Option<Rectangle> {
    let contours = find_contours::<i32>(img);

    let mut best: Option<(&Contour<i32>, f64)> = None;
    for contour in contours
        .iter()
        .filter(|c| c.parent.is_none() && matches!(c.border_type, BorderType::Outer))
    {
        let area = contour_area(contour);
        match best {
            Some((_, best_area)) if area <= best_area => {}
            _ => best = Some((contour, area)),
        }
    }

    best.and_then(|(contour, area)| {
        let rect = bounding_rect(contour)?;
        log::debug!("Largest contour: area={:.1}, bounds={}", area, rect);
        Some(rect)
    })
}

/// Determines the temperature and humidity regions of a binarized image.
pub fn locate_regions(binarized: &GrayImage, spec: &RegionSpec) -> Result<RoiPair> {
    match spec {
        RegionSpec::Display(rect) => {
            log::debug!("Using manual display region {}", rect);
            split_display(binarized, rect)
        }
        RegionSpec::Separate {
            temperature,
            humidity,
        } => {
            log::debug!(
                "Using calibrated regions: temperature={}, humidity={}",
                temperature,
                humidity
            );
            Ok(RoiPair {
                temperature: crop_rect(binarized, temperature)?,
                humidity: crop_rect(binarized, humidity)?,
            })
        }
        RegionSpec::Auto => {
            let (width, height) = binarized.dimensions();
            let display = detect_display(binarized).unwrap_or_else(|| {
                log::warn!("No contours found, falling back to the whole image");
                Rectangle::full(width, height)
            });
            if display.area() == 0 {
                return Err(ReadingError::RegionOutOfBounds {
                    rect: display,
                    width,
                    height,
                });
            }
            split_display(binarized, &display)
        }
    }
}
