// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raster preprocessing applied to rendered pages before recognition.
//
// Every function here is total for well-formed rasters and returns a new
// image. Only `auto_rotate` may change dimensions.

use image::{DynamicImage, GrayImage, Luma};
use imageproc::edges::canny;
use imageproc::filter::bilateral::GaussianEuclideanColorDistance;
use imageproc::filter::bilateral_filter;
use imageproc::hough::{LineDetectionOptions, detect_lines};
use imageproc::morphology::{Mask, grayscale_close};
use scanlayer_core::{PreprocessParams, PreprocessingFlags};
use tracing::{debug, instrument};

use super::filter::{clahe, linear_adjust, map_luminance};
use super::geometry::{ink_row_extremes, min_area_rect_angle, rotate_replicate};
use super::threshold::{PAPER, binarize_adaptive, binarize_otsu};

/// Skews at or below this many degrees are left alone.
const MIN_SKEW_DEGREES: f64 = 0.5;

/// 9×9 window.
const BILATERAL_RADIUS: u8 = 4;
const BILATERAL_SIGMA_COLOR: f32 = 75.0;
const BILATERAL_SIGMA_SPACE: f32 = 75.0;

const CLAHE_CLIP_LIMIT: f32 = 2.0;
const CLAHE_GRID: u32 = 8;

/// 11×11 window.
const ADAPTIVE_RADIUS: u32 = 5;
const ADAPTIVE_C: f64 = 2.0;

const CANNY_LOW: f32 = 50.0;
const CANNY_HIGH: f32 = 150.0;
const HOUGH_VOTES: u32 = 200;
/// Only the first lines reported by the accumulator vote on orientation.
const ORIENTATION_SAMPLE: usize = 20;

// -- Deskew -------------------------------------------------------------------

/// Estimated skew of the ink on `gray`, in degrees within `(-45, 45]`.
///
/// `None` for pages without enough ink to form a rectangle.
pub fn estimate_skew(gray: &GrayImage) -> Option<f64> {
    let (mask, _) = binarize_otsu(gray);
    min_area_rect_angle(&ink_row_extremes(&mask))
}

/// Straighten a slightly rotated scan.
///
/// The image is rotated back only when the estimated skew is above half a
/// degree and no larger than `max_angle`; anything else is returned as is.
#[instrument(skip(image), fields(width = image.width(), height = image.height()))]
pub fn deskew(image: &DynamicImage, max_angle: f32) -> DynamicImage {
    let Some(angle) = estimate_skew(&image.to_luma8()) else {
        debug!("No ink found, skipping deskew");
        return image.clone();
    };

    if angle.abs() <= MIN_SKEW_DEGREES || angle.abs() > max_angle as f64 {
        debug!(angle, max_angle, "Skew outside correction band");
        return image.clone();
    }

    debug!(angle, "Correcting skew");
    match image {
        DynamicImage::ImageLuma8(gray) => DynamicImage::ImageLuma8(rotate_replicate(gray, -angle)),
        other => DynamicImage::ImageRgb8(rotate_replicate(&other.to_rgb8(), -angle)),
    }
}

// -- Despeckle ----------------------------------------------------------------

/// Edge-preserving smoothing followed by a 3×3 opening of the ink layer.
///
/// Ink is dark, so opening it is a grey-level closing: isolated dark specks
/// narrower than the cross-shaped mask are lifted to the surrounding paper.
/// Colour input returns colour output with the cleaned grey replicated.
#[instrument(skip(image), fields(width = image.width(), height = image.height()))]
pub fn despeckle(image: &DynamicImage) -> DynamicImage {
    let smoothed = bilateral_filter(
        &image.to_luma8(),
        BILATERAL_RADIUS,
        BILATERAL_SIGMA_SPACE,
        GaussianEuclideanColorDistance::new(BILATERAL_SIGMA_COLOR),
    );
    let cleaned = grayscale_close(&smoothed, &Mask::diamond(1));
    match image {
        DynamicImage::ImageLuma8(_) => DynamicImage::ImageLuma8(cleaned),
        _ => DynamicImage::ImageLuma8(cleaned).to_rgb8().into(),
    }
}

// -- Enhance ------------------------------------------------------------------

/// Linear contrast/brightness, then CLAHE on luminance only.
#[instrument(skip(image), fields(width = image.width(), height = image.height()))]
pub fn enhance(image: &DynamicImage, contrast: f32, brightness: f32) -> DynamicImage {
    let adjusted = linear_adjust(image, contrast, brightness);
    map_luminance(&adjusted, |luma| clahe(luma, CLAHE_CLIP_LIMIT, CLAHE_GRID))
}

// -- Background suppression -----------------------------------------------------

/// Push tinted or textured background to white.
///
/// Pixels brighter than `threshold` are lifted to white first, then the page
/// is binarized against its local mean. The result is a grey image.
#[instrument(skip(image), fields(width = image.width(), height = image.height()))]
pub fn suppress_background(image: &DynamicImage, threshold: u8) -> DynamicImage {
    let mut gray = image.to_luma8();
    for pixel in gray.pixels_mut() {
        if pixel.0[0] > threshold {
            *pixel = Luma([PAPER]);
        }
    }
    DynamicImage::ImageLuma8(binarize_adaptive(&gray, ADAPTIVE_RADIUS, ADAPTIVE_C))
}

// -- Orientation ----------------------------------------------------------------

/// Detect a page lying on its side and turn it upright.
///
/// Returns the (possibly rotated) image and the counter-clockwise rotation
/// applied: 0 when the dominant lines are horizontal, 90 when they are
/// vertical and 270 when no axis dominates. Quarter turns swap the canvas
/// dimensions; nothing is cropped.
#[instrument(skip(image), fields(width = image.width(), height = image.height()))]
pub fn auto_rotate(image: &DynamicImage) -> (DynamicImage, u32) {
    let edges = canny(&image.to_luma8(), CANNY_LOW, CANNY_HIGH);
    let lines = detect_lines(
        &edges,
        LineDetectionOptions {
            vote_threshold: HOUGH_VOTES,
            suppression_radius: 8,
        },
    );
    if lines.is_empty() {
        return (image.clone(), 0);
    }

    let mut angles: Vec<u32> = lines
        .iter()
        .take(ORIENTATION_SAMPLE)
        .map(|line| line.angle_in_degrees)
        .collect();
    angles.sort_unstable();
    let median = angles[angles.len() / 2];
    let rotation = orientation_for(median);
    debug!(line_count = lines.len(), median, rotation, "Dominant line orientation");

    let rotated = match rotation {
        90 => image.rotate270(),
        270 => image.rotate90(),
        _ => image.clone(),
    };
    (rotated, rotation)
}

/// Counter-clockwise quarter turn for a median line normal in degrees.
///
/// The normal of a horizontal line points at ~90, a vertical line at ~0 or
/// ~180.
fn orientation_for(median_normal: u32) -> u32 {
    match median_normal {
        81..=99 => 0,
        0..=9 | 171.. => 90,
        _ => 270,
    }
}

// -- Composition ----------------------------------------------------------------

/// Run the enabled steps in their fixed order: auto-rotate, deskew,
/// despeckle, enhance, suppress-background.
#[instrument(skip(image, params), fields(width = image.width(), height = image.height()))]
pub fn preprocess(
    image: &DynamicImage,
    flags: &PreprocessingFlags,
    params: &PreprocessParams,
) -> DynamicImage {
    let mut current = image.clone();
    if flags.auto_rotate {
        current = auto_rotate(&current).0;
    }
    if flags.deskew {
        current = deskew(&current, params.max_skew_angle);
    }
    if flags.despeckle {
        current = despeckle(&current);
    }
    if flags.enhance {
        current = enhance(&current, params.contrast, params.brightness);
    }
    if flags.suppress_background {
        current = suppress_background(&current, params.background_threshold);
    }
    current
}
