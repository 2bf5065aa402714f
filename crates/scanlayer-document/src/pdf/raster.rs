// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page rasterization for scanned documents.
//
// A scanned page is one or more image XObjects placed by the content stream.
// Rendering decodes those images and composites them at their CTM-placed
// boxes over a white canvas sized to the MediaBox. Vector text and paths are
// not drawn.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage};
use lopdf::{Object, Stream};
use scanlayer_core::error::{Result, ScanlayerError};
use tracing::{debug, warn};

use super::content::Matrix;
use super::reader::PdfDocument;

/// Refuse canvases beyond this many pixels per side.
const MAX_CANVAS_SIDE: f32 = 20_000.0;

/// Rasterize `page_index` at `zoom` pixels per point.
pub fn render_page(doc: &PdfDocument, page_index: usize, zoom: f32) -> Result<DynamicImage> {
    let render_error = |reason: String| ScanlayerError::Render {
        page: page_index,
        reason,
    };

    if !(zoom.is_finite() && zoom > 0.0) {
        return Err(render_error(format!("invalid zoom {zoom}")));
    }
    let [x0, y0, x1, y1] = doc.media_box(page_index)?;
    let canvas_w = ((x1 - x0) * zoom).ceil();
    let canvas_h = ((y1 - y0) * zoom).ceil();
    if !(1.0..=MAX_CANVAS_SIDE).contains(&canvas_w) || !(1.0..=MAX_CANVAS_SIDE).contains(&canvas_h) {
        return Err(render_error(format!("canvas {canvas_w}x{canvas_h} out of bounds")));
    }
    let mut canvas = RgbImage::from_pixel(canvas_w as u32, canvas_h as u32, Rgb([255, 255, 255]));

    let images = doc.image_streams(page_index)?;
    let operations = doc.page_operations(page_index)?;

    let mut ctm = Matrix::IDENTITY;
    let mut saved: Vec<Matrix> = Vec::new();
    let mut drawn = 0usize;
    let mut failures: Vec<String> = Vec::new();

    for op in &operations {
        match op.operator.as_str() {
            "q" => saved.push(ctm),
            "Q" => {
                if let Some(previous) = saved.pop() {
                    ctm = previous;
                }
            }
            "cm" => {
                if let Some(m) = Matrix::from_operands(&op.operands) {
                    ctm = m.then(&ctm);
                }
            }
            "Do" => {
                let Some(name) = op.operands.first().and_then(|o| o.as_name().ok()) else {
                    continue;
                };
                let name = String::from_utf8_lossy(name);
                let Some((_, stream)) = images.iter().find(|(n, _)| *n == name) else {
                    continue;
                };
                match decode_image(doc, stream) {
                    Ok(decoded) => {
                        if place_image(&mut canvas, &decoded, &ctm, [x0, y1], zoom) {
                            drawn += 1;
                        }
                    }
                    Err(reason) => {
                        warn!(page_index, image = %name, %reason, "Skipping undecodable image");
                        failures.push(format!("{name}: {reason}"));
                    }
                }
            }
            _ => {}
        }
    }

    if drawn == 0 && !failures.is_empty() {
        return Err(render_error(failures.join("; ")));
    }
    debug!(page_index, drawn, width = canvas.width(), height = canvas.height(), "Page rendered");
    Ok(DynamicImage::ImageRgb8(canvas))
}

/// Draw `image` into the unit square mapped by `ctm`. `origin` is the
/// MediaBox's top-left corner in PDF space. Returns whether anything landed.
fn place_image(canvas: &mut RgbImage, image: &DynamicImage, ctm: &Matrix, origin: [f32; 2], zoom: f32) -> bool {
    let (bx1, by1, bx2, by2) = ctm.unit_square_bounds();
    let left = ((bx1 - origin[0]) * zoom).round();
    let top = ((origin[1] - by2) * zoom).round();
    let width = ((bx2 - bx1) * zoom).round();
    let height = ((by2 - by1) * zoom).round();
    if width < 1.0 || height < 1.0 || width > MAX_CANVAS_SIDE || height > MAX_CANVAS_SIDE {
        return false;
    }

    let mut scaled = imageops::resize(&image.to_rgb8(), width as u32, height as u32, FilterType::Triangle);
    // Image space has its origin at the bottom-left of the unit square; a
    // negative scale mirrors it.
    if ctm.a < 0.0 {
        imageops::flip_horizontal_in_place(&mut scaled);
    }
    if ctm.d < 0.0 {
        imageops::flip_vertical_in_place(&mut scaled);
    }
    imageops::overlay(canvas, &scaled, left as i64, top as i64);
    true
}

// -- Image XObject decoding -------------------------------------------------------

/// Filter names applied to a stream, outermost first.
pub fn filters(doc: &PdfDocument, stream: &Stream) -> Vec<String> {
    match stream.dict.get(b"Filter").map(|f| doc.resolve(f)) {
        Ok(Object::Name(name)) => vec![String::from_utf8_lossy(name).into_owned()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_name().ok())
            .map(|name| String::from_utf8_lossy(name).into_owned())
            .collect(),
        _ => Vec::new(),
    }
}

fn decode_image(doc: &PdfDocument, stream: &Stream) -> std::result::Result<DynamicImage, String> {
    let dict = &stream.dict;
    let int = |key: &[u8]| dict.get(key).ok().and_then(|v| doc.resolve(v).as_i64().ok());

    if dict.get(b"ImageMask").and_then(Object::as_bool).unwrap_or(false) {
        return Err("stencil masks are not drawn".into());
    }

    let filters = filters(doc, stream);
    match filters.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["DCTDecode"] => {
            return image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg)
                .map_err(|err| format!("JPEG decode failed: {err}"));
        }
        [] => {}
        list if list.iter().all(|f| matches!(*f, "FlateDecode" | "LZWDecode")) => {}
        other => return Err(format!("unsupported filter chain {other:?}")),
    }

    let data = if filters.is_empty() {
        stream.content.clone()
    } else {
        stream
            .decompressed_content()
            .map_err(|err| format!("decompression failed: {err}"))?
    };

    let width = int(b"Width").filter(|w| *w > 0).ok_or("missing /Width")? as u32;
    let height = int(b"Height").filter(|h| *h > 0).ok_or("missing /Height")? as u32;
    let bits = int(b"BitsPerComponent").unwrap_or(8);
    let pixels = width as usize * height as usize;

    match bits {
        1 => decode_bilevel(&data, width, height),
        8 => {
            let components = if pixels == 0 { 0 } else { data.len() / pixels };
            match components {
                1 => GrayImage::from_raw(width, height, data[..pixels].to_vec())
                    .map(DynamicImage::ImageLuma8)
                    .ok_or_else(|| "short grey data".to_string()),
                3 => RgbImage::from_raw(width, height, data[..pixels * 3].to_vec())
                    .map(DynamicImage::ImageRgb8)
                    .ok_or_else(|| "short RGB data".to_string()),
                4 => Ok(DynamicImage::ImageRgb8(cmyk_to_rgb(&data, width, height))),
                n => Err(format!("{n} components per pixel not supported")),
            }
        }
        other => Err(format!("{other} bits per component not supported")),
    }
}

/// 1-bit grey, rows padded to whole bytes, 1 = white.
fn decode_bilevel(data: &[u8], width: u32, height: u32) -> std::result::Result<DynamicImage, String> {
    let row_bytes = width.div_ceil(8) as usize;
    if data.len() < row_bytes * height as usize {
        return Err("short 1-bit data".into());
    }
    Ok(DynamicImage::ImageLuma8(GrayImage::from_fn(width, height, |x, y| {
        let byte = data[y as usize * row_bytes + (x / 8) as usize];
        let bit = (byte >> (7 - (x % 8))) & 1;
        Luma([if bit == 1 { 255 } else { 0 }])
    })))
}

fn cmyk_to_rgb(data: &[u8], width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let i = (y as usize * width as usize + x as usize) * 4;
        let [c, m, yy, k] = [data[i], data[i + 1], data[i + 2], data[i + 3]].map(|v| v as f32 / 255.0);
        let channel = |ink: f32| ((1.0 - ink) * (1.0 - k) * 255.0).round() as u8;
        Rgb([channel(c), channel(m), channel(yy)])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::fixtures::{PageSpec, build_pdf, gray_pattern};
    use crate::pdf::source::DocumentSource;

    #[test]
    fn renders_full_page_image_at_zoom() {
        let doc = build_pdf(&[PageSpec::scanned(GrayImage::from_pixel(10, 10, Luma([0])))]);
        let pdf = PdfDocument::from_bytes(&doc).unwrap();
        let raster = pdf.render_page(0, 0.5).unwrap().to_rgb8();
        assert_eq!(raster.dimensions(), (306, 396));
        // Scanned fixtures cover the whole MediaBox.
        assert_eq!(raster.get_pixel(150, 200).0, [0, 0, 0]);
    }

    #[test]
    fn text_only_page_renders_white() {
        let doc = build_pdf(&[PageSpec::text("vector text is not drawn")]);
        let pdf = PdfDocument::from_bytes(&doc).unwrap();
        let raster = pdf.render_page(0, 0.25).unwrap().to_rgb8();
        assert!(raster.pixels().all(|p| p.0 == [255, 255, 255]));
    }

    #[test]
    fn bottom_half_image_lands_at_bottom() {
        let doc = build_pdf(&[PageSpec::scanned(gray_pattern(20, 20)).placed(0.0, 0.0, 612.0, 396.0)]);
        let pdf = PdfDocument::from_bytes(&doc).unwrap();
        let raster = pdf.render_page(0, 0.5).unwrap().to_rgb8();
        // Top half stays white.
        assert_eq!(raster.get_pixel(10, 10).0, [255, 255, 255]);
        assert_ne!(raster.get_pixel(5, 390).0, [255, 255, 255]);
    }

    #[test]
    fn zero_zoom_is_render_error() {
        let doc = build_pdf(&[PageSpec::text("x")]);
        let pdf = PdfDocument::from_bytes(&doc).unwrap();
        assert!(matches!(pdf.render_page(0, 0.0), Err(ScanlayerError::Render { page: 0, .. })));
    }

    #[test]
    fn bilevel_bits_map_to_black_and_white() {
        let img = decode_bilevel(&[0b1010_0000], 3, 1).unwrap().to_luma8();
        assert_eq!(img.as_raw(), &vec![255, 0, 255]);
    }
}
