// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Contrast-limited adaptive histogram equalization and tone mapping.
//
// imageproc covers smoothing and morphology but has no tile-based CLAHE, so
// that one is done here.

use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};

// -- CLAHE --------------------------------------------------------------------

/// Contrast-limited adaptive histogram equalization.
///
/// The image is split into a `grid × grid` layout of tiles. Each tile gets a
/// clipped, redistributed histogram mapping, and each pixel is bilinearly
/// interpolated between the mappings of its four nearest tile centres.
pub fn clahe(gray: &GrayImage, clip_limit: f32, grid: u32) -> GrayImage {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 || grid == 0 {
        return gray.clone();
    }

    let tile_w = width.div_ceil(grid).max(1);
    let tile_h = height.div_ceil(grid).max(1);
    let tiles_x = width.div_ceil(tile_w);
    let tiles_y = height.div_ceil(tile_h);

    let mut luts = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(width);
            let y1 = (y0 + tile_h).min(height);
            luts.push(tile_lut(gray, x0, y0, x1, y1, clip_limit));
        }
    }

    let lut_at = |tx: u32, ty: u32| &luts[(ty * tiles_x + tx) as usize];

    GrayImage::from_fn(width, height, |x, y| {
        let fx = (x as f32 + 0.5) / tile_w as f32 - 0.5;
        let fy = (y as f32 + 0.5) / tile_h as f32 - 0.5;
        let tx0 = (fx.floor().max(0.0) as u32).min(tiles_x - 1);
        let ty0 = (fy.floor().max(0.0) as u32).min(tiles_y - 1);
        let tx1 = (tx0 + 1).min(tiles_x - 1);
        let ty1 = (ty0 + 1).min(tiles_y - 1);
        let ax = (fx - tx0 as f32).clamp(0.0, 1.0);
        let ay = (fy - ty0 as f32).clamp(0.0, 1.0);

        let v = gray.get_pixel(x, y).0[0] as usize;
        let top = lut_at(tx0, ty0)[v] as f32 * (1.0 - ax) + lut_at(tx1, ty0)[v] as f32 * ax;
        let bottom = lut_at(tx0, ty1)[v] as f32 * (1.0 - ax) + lut_at(tx1, ty1)[v] as f32 * ax;
        Luma([(top * (1.0 - ay) + bottom * ay).round().clamp(0.0, 255.0) as u8])
    })
}

fn tile_lut(gray: &GrayImage, x0: u32, y0: u32, x1: u32, y1: u32, clip_limit: f32) -> [u8; 256] {
    let mut histogram = [0u32; 256];
    for y in y0..y1 {
        for x in x0..x1 {
            histogram[gray.get_pixel(x, y).0[0] as usize] += 1;
        }
    }
    let area = ((x1 - x0) * (y1 - y0)).max(1);

    let clip = ((clip_limit * area as f32 / 256.0) as u32).max(1);
    let mut excess = 0u32;
    for bin in histogram.iter_mut() {
        if *bin > clip {
            excess += *bin - clip;
            *bin = clip;
        }
    }
    let share = excess / 256;
    let remainder = (excess % 256) as usize;
    for (i, bin) in histogram.iter_mut().enumerate() {
        *bin += share + u32::from(i < remainder);
    }

    let mut lut = [0u8; 256];
    let mut cdf = 0u32;
    for (i, &count) in histogram.iter().enumerate() {
        cdf += count;
        lut[i] = ((cdf as f32 * 255.0 / area as f32).round()).clamp(0.0, 255.0) as u8;
    }
    lut
}

// -- Tone -----------------------------------------------------------------------

/// `clamp(alpha * v + beta)` on every channel.
pub fn linear_adjust(image: &DynamicImage, alpha: f32, beta: f32) -> DynamicImage {
    let map = |v: u8| (alpha * v as f32 + beta).round().clamp(0.0, 255.0) as u8;
    match image {
        DynamicImage::ImageLuma8(gray) => {
            DynamicImage::ImageLuma8(GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
                Luma([map(gray.get_pixel(x, y).0[0])])
            }))
        }
        other => {
            let rgb = other.to_rgb8();
            DynamicImage::ImageRgb8(RgbImage::from_fn(rgb.width(), rgb.height(), |x, y| {
                let [r, g, b] = rgb.get_pixel(x, y).0;
                Rgb([map(r), map(g), map(b)])
            }))
        }
    }
}

/// Apply `f` to the luminance of `image`, leaving chrominance untouched.
///
/// Grey images are passed through directly; colour images go through a
/// full-range YCbCr round trip.
pub fn map_luminance(image: &DynamicImage, f: impl Fn(&GrayImage) -> GrayImage) -> DynamicImage {
    if let DynamicImage::ImageLuma8(gray) = image {
        return DynamicImage::ImageLuma8(f(gray));
    }

    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();
    let mut luma = GrayImage::new(width, height);
    let mut chroma = Vec::with_capacity((width * height) as usize);
    for (x, y, pixel) in rgb.enumerate_pixels() {
        let [r, g, b] = pixel.0.map(f32::from);
        let yy = 0.299 * r + 0.587 * g + 0.114 * b;
        chroma.push((-0.168_736 * r - 0.331_264 * g + 0.5 * b, 0.5 * r - 0.418_688 * g - 0.081_312 * b));
        luma.put_pixel(x, y, Luma([yy.round().clamp(0.0, 255.0) as u8]));
    }

    let mapped = f(&luma);
    let to_u8 = |v: f32| v.round().clamp(0.0, 255.0) as u8;
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        let yy = mapped.get_pixel(x, y).0[0] as f32;
        let (cb, cr) = chroma[(y * width + x) as usize];
        Rgb([
            to_u8(yy + 1.402 * cr),
            to_u8(yy - 0.344_136 * cb - 0.714_136 * cr),
            to_u8(yy + 1.772 * cb),
        ])
    }))
}
