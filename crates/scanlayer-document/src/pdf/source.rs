// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The document surface the recognition pipeline consumes.

use std::path::Path;

use image::DynamicImage;
use scanlayer_core::BBox;
use scanlayer_core::error::Result;

/// A run of native text found in a page's content stream.
///
/// `bbox` is in PDF points with a top-left origin, like raster boxes at
/// zoom 1.0.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub bbox: BBox,
    pub text: String,
}

/// An image XObject referenced by a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDescriptor {
    /// Resource name the page uses to draw it (without the leading slash).
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub bits_per_component: u8,
    pub color_space: String,
    /// Outermost stream filter, if any.
    pub filter: Option<String>,
}

/// An open document the pipeline can read pages from and save.
///
/// Each worker opens its own handle; dropping the handle closes it.
pub trait DocumentSource: Sized {
    fn open(path: &Path) -> Result<Self>;

    fn page_count(&self) -> usize;

    /// Rasterize a page at `zoom` (1.0 = one pixel per point).
    fn render_page(&self, page_index: usize, zoom: f32) -> Result<DynamicImage>;

    /// All native text on a page, blocks separated by newlines.
    fn native_text(&self, page_index: usize) -> Result<String> {
        Ok(self
            .native_text_blocks(page_index)?
            .into_iter()
            .map(|block| block.text)
            .collect::<Vec<_>>()
            .join("\n"))
    }

    fn native_text_blocks(&self, page_index: usize) -> Result<Vec<TextBlock>>;

    fn embedded_images(&self, page_index: usize) -> Result<Vec<ImageDescriptor>>;

    fn save(&mut self, path: &Path, compress: bool) -> Result<()>;
}
