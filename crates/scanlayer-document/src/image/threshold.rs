// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Global and adaptive binarization over grayscale rasters.
//
// The adaptive variant subtracts a constant from the local mean, which
// imageproc's `adaptive_threshold` does not offer.

use image::{GrayImage, Luma};
use imageproc::contrast::otsu_level;

/// Ink value in binary masks.
pub const INK: u8 = 0;
/// Paper value in binary masks.
pub const PAPER: u8 = 255;

/// Otsu threshold: the grey level that maximizes between-class variance of
/// the dark and light pixel populations.
pub fn otsu_threshold(gray: &GrayImage) -> u8 {
    if gray.width() == 0 || gray.height() == 0 {
        return 128;
    }
    otsu_level(gray)
}

/// Binarize with a single global threshold. Pixels at or below `threshold`
/// become ink.
pub fn binarize_global(gray: &GrayImage, threshold: u8) -> GrayImage {
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        if gray.get_pixel(x, y).0[0] <= threshold {
            Luma([INK])
        } else {
            Luma([PAPER])
        }
    })
}

/// Otsu binarization. Returns the mask together with the threshold used.
pub fn binarize_otsu(gray: &GrayImage) -> (GrayImage, u8) {
    let threshold = otsu_threshold(gray);
    (binarize_global(gray, threshold), threshold)
}

// -- Summed-area table --------------------------------------------------------

/// Summed-area table of a grayscale image with a zero-padded top row and left
/// column, so `at(x, y)` is the sum over `[0, x) × [0, y)`.
pub struct IntegralImage {
    table: Vec<u64>,
    width: u32,
    height: u32,
}

impl IntegralImage {
    pub fn new(gray: &GrayImage) -> Self {
        let (width, height) = gray.dimensions();
        let stride = (width + 1) as usize;
        let mut table = vec![0u64; stride * (height + 1) as usize];

        for y in 0..height {
            let mut row_sum = 0u64;
            for x in 0..width {
                row_sum += gray.get_pixel(x, y).0[0] as u64;
                let idx = (y + 1) as usize * stride + (x + 1) as usize;
                let above = y as usize * stride + (x + 1) as usize;
                table[idx] = row_sum + table[above];
            }
        }

        Self {
            table,
            width,
            height,
        }
    }

    fn at(&self, x: usize, y: usize) -> u64 {
        self.table[y * (self.width + 1) as usize + x]
    }

    /// Mean value of the square window of `radius` centred on `(cx, cy)`,
    /// clipped to the image.
    pub fn window_mean(&self, cx: u32, cy: u32, radius: u32) -> f64 {
        let x1 = cx.saturating_sub(radius) as usize;
        let y1 = cy.saturating_sub(radius) as usize;
        let x2 = ((cx + radius + 1) as usize).min(self.width as usize);
        let y2 = ((cy + radius + 1) as usize).min(self.height as usize);

        let area = ((x2 - x1) * (y2 - y1)) as f64;
        if area == 0.0 {
            return 128.0;
        }

        let sum = self.at(x2, y2) as f64 - self.at(x2, y1) as f64 - self.at(x1, y2) as f64
            + self.at(x1, y1) as f64;
        sum / area
    }
}

/// Adaptive local-mean binarization.
///
/// A pixel is paper when it is brighter than its window mean minus `c`,
/// otherwise ink. The window is `(2 * radius + 1)` pixels square.
pub fn binarize_adaptive(gray: &GrayImage, radius: u32, c: f64) -> GrayImage {
    let integral = IntegralImage::new(gray);
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let threshold = integral.window_mean(x, y, radius) - c;
        if gray.get_pixel(x, y).0[0] as f64 > threshold {
            Luma([PAPER])
        } else {
            Luma([INK])
        }
    })
}
