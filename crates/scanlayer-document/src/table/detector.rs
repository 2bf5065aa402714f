// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Table structure detection from ruling lines.
//
// Long horizontal and vertical ink runs are isolated separately, their union
// is split into connected regions, and every region that is large enough and
// table-shaped is turned into a row/column grid by projecting the line masks
// onto each axis.

use image::{DynamicImage, GrayImage, Luma};
use imageproc::morphology::{Mask, grayscale_open};
use imageproc::region_labelling::{Connectivity, connected_components};
use scanlayer_core::{BBox, TableCell, TableStructure};
use tracing::{debug, instrument};

use crate::image::threshold::{INK, binarize_otsu};

const MIN_TABLE_AREA: u32 = 10_000;
const MIN_ASPECT: f32 = 0.5;
const MAX_ASPECT: f32 = 10.0;
/// Structuring elements are 1/30th of the image in their direction.
const KERNEL_DIVISOR: u32 = 30;
const PROJECTION_PEAK_RATIO: f64 = 0.3;
const MERGE_DISTANCE: u32 = 5;

const LINE: u8 = 255;

/// Find ruled tables in `image`, keeping those scoring at least
/// `min_confidence`. Boxes are in `image` pixel space.
#[instrument(skip(image), fields(width = image.width(), height = image.height()))]
pub fn detect_tables(image: &DynamicImage, min_confidence: f32) -> Vec<TableStructure> {
    let (ink, _) = binarize_otsu(&image.to_luma8());
    let (width, height) = ink.dimensions();

    let horizontal = horizontal_lines(&ink, (width / KERNEL_DIVISOR).max(1));
    let vertical = vertical_lines(&ink, (height / KERNEL_DIVISOR).max(1));
    let union = GrayImage::from_fn(width, height, |x, y| {
        Luma([horizontal.get_pixel(x, y)[0].max(vertical.get_pixel(x, y)[0])])
    });

    let candidates = table_regions(&union);
    debug!(candidates = candidates.len(), "Table candidates found");

    candidates
        .into_iter()
        .filter_map(|region| table_structure(region, &horizontal, &vertical))
        .filter(|table| table.confidence >= min_confidence)
        .collect()
}

// -- Line masks -------------------------------------------------------------------

/// Longest structuring element imageproc accepts along one axis.
const MAX_KERNEL: u32 = 511;

/// Ink as foreground: `LINE` where `ink` has ink, zero elsewhere.
fn foreground(ink: &GrayImage) -> GrayImage {
    GrayImage::from_fn(ink.width(), ink.height(), |x, y| {
        if ink.get_pixel(x, y)[0] == INK { Luma([LINE]) } else { Luma([0]) }
    })
}

/// Straight structuring element of `length` pixels, centred.
fn line_mask(length: u32, horizontal: bool) -> Mask {
    let length = length.clamp(1, MAX_KERNEL);
    let centre = ((length - 1) / 2) as u8;
    if horizontal {
        Mask::from_image(&GrayImage::from_pixel(length, 1, Luma([LINE])), centre, 0)
    } else {
        Mask::from_image(&GrayImage::from_pixel(1, length, Luma([LINE])), 0, centre)
    }
}

/// Opening with a `1 × length` element: keeps ink pixels that belong to a
/// horizontal run at least `length` long.
fn horizontal_lines(ink: &GrayImage, length: u32) -> GrayImage {
    grayscale_open(&foreground(ink), &line_mask(length, true))
}

/// Vertical counterpart of [`horizontal_lines`].
fn vertical_lines(ink: &GrayImage, length: u32) -> GrayImage {
    grayscale_open(&foreground(ink), &line_mask(length, false))
}

// -- Regions ----------------------------------------------------------------------

/// Pixel bounds `[x1, y1, x2, y2)` of one connected region.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Region {
    x1: u32,
    y1: u32,
    x2: u32,
    y2: u32,
}

impl Region {
    fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    fn height(&self) -> u32 {
        self.y2 - self.y1
    }
}

/// 8-connected regions of the line mask that are big enough and shaped
/// like a table, top to bottom.
fn table_regions(mask: &GrayImage) -> Vec<Region> {
    let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));
    let mut bounds: Vec<Option<Region>> = Vec::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label[0] as usize;
        if label == 0 {
            continue;
        }
        if bounds.len() <= label {
            bounds.resize(label + 1, None);
        }
        bounds[label] = Some(match bounds[label] {
            None => Region { x1: x, y1: y, x2: x + 1, y2: y + 1 },
            Some(r) => Region {
                x1: r.x1.min(x),
                y1: r.y1.min(y),
                x2: r.x2.max(x + 1),
                y2: r.y2.max(y + 1),
            },
        });
    }

    let mut regions: Vec<Region> = bounds
        .into_iter()
        .flatten()
        .filter(|r| r.width() * r.height() >= MIN_TABLE_AREA)
        .filter(|r| {
            let aspect = r.width() as f32 / r.height() as f32;
            (MIN_ASPECT..=MAX_ASPECT).contains(&aspect)
        })
        .collect();
    regions.sort_by_key(|r| (r.y1, r.x1));
    regions
}

// -- Structure --------------------------------------------------------------------

fn table_structure(region: Region, horizontal: &GrayImage, vertical: &GrayImage) -> Option<TableStructure> {
    let row_projection: Vec<u32> = (region.y1..region.y2)
        .map(|y| {
            (region.x1..region.x2)
                .filter(|&x| horizontal.get_pixel(x, y)[0] == LINE)
                .count() as u32
        })
        .collect();
    let col_projection: Vec<u32> = (region.x1..region.x2)
        .map(|x| {
            (region.y1..region.y2)
                .filter(|&y| vertical.get_pixel(x, y)[0] == LINE)
                .count() as u32
        })
        .collect();

    let rows = line_positions(&row_projection);
    let cols = line_positions(&col_projection);
    if rows.len() < 2 || cols.len() < 2 {
        return None;
    }

    let (ox, oy) = (region.x1 as f32, region.y1 as f32);
    let mut cells = Vec::with_capacity((rows.len() - 1) * (cols.len() - 1));
    for (row, ys) in rows.windows(2).enumerate() {
        for (col, xs) in cols.windows(2).enumerate() {
            cells.push(TableCell {
                row,
                col,
                bbox: BBox::new(ox + xs[0] as f32, oy + ys[0] as f32, ox + xs[1] as f32, oy + ys[1] as f32),
                text: None,
            });
        }
    }

    let table = TableStructure {
        bbox: BBox::new(ox, oy, region.x2 as f32, region.y2 as f32),
        row_count: rows.len() - 1,
        col_count: cols.len() - 1,
        cells,
        confidence: table_confidence(&rows, &cols),
    };
    debug!(rows = table.row_count, cols = table.col_count, confidence = table.confidence, "Table structure");
    Some(table)
}

/// Offsets whose projection exceeds 30% of the peak, with runs closer than
/// the merge distance collapsed to their mean.
fn line_positions(projection: &[u32]) -> Vec<u32> {
    let peak = projection.iter().copied().max().unwrap_or(0);
    if peak == 0 {
        return Vec::new();
    }
    let threshold = f64::from(peak) * PROJECTION_PEAK_RATIO;

    let mut positions = Vec::new();
    let mut group: Vec<u32> = Vec::new();
    for (offset, &value) in projection.iter().enumerate() {
        if f64::from(value) <= threshold {
            continue;
        }
        let offset = offset as u32;
        if let Some(&last) = group.last()
            && offset - last > MERGE_DISTANCE
        {
            positions.push(mean(&group));
            group.clear();
        }
        group.push(offset);
    }
    if !group.is_empty() {
        positions.push(mean(&group));
    }
    positions
}

fn mean(values: &[u32]) -> u32 {
    (values.iter().map(|&v| u64::from(v)).sum::<u64>() / values.len() as u64) as u32
}

/// Regularity score of a grid.
///
/// Starts at 1.0 and is halved for a single row or column. Each axis with
/// more than two boundaries is then scaled by `0.5 + 0.5 · (1 − min(cv, 1))`
/// where `cv` is the coefficient of variation of its spacings.
pub(crate) fn table_confidence(rows: &[u32], cols: &[u32]) -> f32 {
    let mut confidence = 1.0f64;
    if rows.len() < 3 || cols.len() < 3 {
        confidence *= 0.5;
    }
    for boundaries in [rows, cols] {
        if boundaries.len() <= 2 {
            continue;
        }
        let spacings: Vec<f64> = boundaries.windows(2).map(|w| f64::from(w[1]) - f64::from(w[0])).collect();
        let n = spacings.len() as f64;
        let mean = spacings.iter().sum::<f64>() / n;
        if mean <= 0.0 {
            continue;
        }
        let std = (spacings.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n).sqrt();
        let regularity = 1.0 - (std / mean).min(1.0);
        confidence *= 0.5 + 0.5 * regularity;
    }
    confidence.min(1.0) as f32
}
