// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF document handle over `lopdf`: page access, native text, image
// inventory, rasterization, and saving.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use scanlayer_core::error::{Result, ScanlayerError};
use tracing::{debug, info, instrument, warn};

use super::content::{extract_text_blocks, number};
use super::raster;
use super::source::{DocumentSource, ImageDescriptor, TextBlock};

/// US Letter, used when a page tree carries no MediaBox at all.
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Guards against cyclic `/Parent` chains in damaged files.
const MAX_INHERITANCE_DEPTH: usize = 32;

/// An open PDF.
///
/// Each pipeline worker owns its own `PdfDocument`; dropping it releases the
/// parsed object graph.
pub struct PdfDocument {
    document: Document,
    /// Page object ids in page order.
    page_ids: Vec<ObjectId>,
    /// Source path, if opened from a file (useful for diagnostics).
    source_path: Option<PathBuf>,
}

impl PdfDocument {
    // -- Construction ---------------------------------------------------------

    /// Open a PDF from the filesystem.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn open(path: &Path) -> Result<Self> {
        let document = Document::load(path).map_err(|err| {
            ScanlayerError::PdfError(format!("failed to open {}: {}", path.display(), err))
        })?;
        let mut reader = Self::from_document(document);
        reader.source_path = Some(path.to_path_buf());
        info!(pages = reader.page_ids.len(), "PDF opened");
        Ok(reader)
    }

    /// Load a PDF already in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = Document::load_mem(data).map_err(|err| {
            ScanlayerError::PdfError(format!("failed to load PDF from memory: {}", err))
        })?;
        let reader = Self::from_document(document);
        debug!(pages = reader.page_ids.len(), "PDF loaded from bytes");
        Ok(reader)
    }

    fn from_document(document: Document) -> Self {
        // lopdf keys pages by 1-indexed page number, in order.
        let page_ids = document.get_pages().into_values().collect();
        Self {
            document,
            page_ids,
            source_path: None,
        }
    }

    // -- Inspection -----------------------------------------------------------

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    pub(crate) fn document(&self) -> &Document {
        &self.document
    }

    pub(crate) fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub(crate) fn page_id(&self, page_index: usize) -> Result<ObjectId> {
        self.page_ids
            .get(page_index)
            .copied()
            .ok_or(ScanlayerError::PageOutOfRange {
                page: page_index,
                page_count: self.page_ids.len(),
            })
    }

    /// Decoded content-stream operations of a page.
    pub(crate) fn page_operations(&self, page_index: usize) -> Result<Vec<Operation>> {
        let page_id = self.page_id(page_index)?;
        let bytes = self.document.get_page_content(page_id).map_err(|err| {
            ScanlayerError::PdfError(format!("page {page_index}: unreadable content: {err}"))
        })?;
        let content = Content::decode(&bytes).map_err(|err| {
            ScanlayerError::PdfError(format!("page {page_index}: undecodable content: {err}"))
        })?;
        Ok(content.operations)
    }

    /// `[x1, y1, x2, y2]` MediaBox of a page, honouring inheritance.
    pub(crate) fn media_box(&self, page_index: usize) -> Result<[f32; 4]> {
        let page_id = self.page_id(page_index)?;
        let media_box = self
            .inherited(page_id, b"MediaBox")
            .and_then(|object| object.as_array().ok())
            .and_then(|values| {
                let numbers: Vec<f32> = values
                    .iter()
                    .filter_map(|v| number(self.resolve(v)))
                    .collect();
                (numbers.len() == 4).then(|| {
                    [
                        numbers[0].min(numbers[2]),
                        numbers[1].min(numbers[3]),
                        numbers[0].max(numbers[2]),
                        numbers[1].max(numbers[3]),
                    ]
                })
            })
            .unwrap_or(DEFAULT_MEDIA_BOX);
        Ok(media_box)
    }

    /// The page's resource dictionary, honouring inheritance.
    pub(crate) fn resources(&self, page_id: ObjectId) -> Option<&Dictionary> {
        self.inherited(page_id, b"Resources")
            .and_then(|object| object.as_dict().ok())
    }

    /// Image XObjects on a page, keyed by resource name.
    pub(crate) fn image_streams(&self, page_index: usize) -> Result<Vec<(String, &Stream)>> {
        let page_id = self.page_id(page_index)?;
        let Some(xobjects) = self
            .resources(page_id)
            .and_then(|resources| resources.get(b"XObject").ok())
            .and_then(|object| self.resolve(object).as_dict().ok())
        else {
            return Ok(Vec::new());
        };

        let mut images = Vec::new();
        for (name, value) in xobjects.iter() {
            let Ok(stream) = self.resolve(value).as_stream() else {
                continue;
            };
            let is_image = stream
                .dict
                .get(b"Subtype")
                .and_then(Object::as_name)
                .is_ok_and(|subtype| subtype == b"Image");
            if is_image {
                images.push((String::from_utf8_lossy(name).into_owned(), stream));
            }
        }
        Ok(images)
    }

    // -- Helpers --------------------------------------------------------------

    /// Follow one level of indirection.
    pub(crate) fn resolve<'a>(&'a self, object: &'a Object) -> &'a Object {
        match object {
            Object::Reference(id) => self.document.get_object(*id).unwrap_or(object),
            other => other,
        }
    }

    /// Look `key` up on a page dictionary, walking `/Parent` for inheritable
    /// attributes.
    fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        let mut node = self.document.get_dictionary(page_id).ok()?;
        for _ in 0..MAX_INHERITANCE_DEPTH {
            if let Ok(value) = node.get(key) {
                return Some(self.resolve(value));
            }
            let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
            node = self.document.get_dictionary(parent).ok()?;
        }
        None
    }
}

impl DocumentSource for PdfDocument {
    fn open(path: &Path) -> Result<Self> {
        PdfDocument::open(path)
    }

    fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    #[instrument(skip(self))]
    fn render_page(&self, page_index: usize, zoom: f32) -> Result<DynamicImage> {
        raster::render_page(self, page_index, zoom)
    }

    fn native_text_blocks(&self, page_index: usize) -> Result<Vec<TextBlock>> {
        let operations = self.page_operations(page_index)?;
        let [_, _, _, top] = self.media_box(page_index)?;
        Ok(extract_text_blocks(&operations, top))
    }

    fn embedded_images(&self, page_index: usize) -> Result<Vec<ImageDescriptor>> {
        let images = self.image_streams(page_index)?;
        Ok(images
            .into_iter()
            .map(|(name, stream)| describe_image(self, name, stream))
            .collect())
    }

    #[instrument(skip_all, fields(path = %path.display(), compress = compress))]
    fn save(&mut self, path: &Path, compress: bool) -> Result<()> {
        if compress {
            let pruned = self.document.prune_objects();
            self.document.renumber_objects();
            self.document.compress();
            debug!(pruned = pruned.len(), "Document compacted");
        }
        self.document.save(path).map_err(|err| {
            ScanlayerError::PdfError(format!("failed to write {}: {}", path.display(), err))
        })?;
        // Renumbering invalidates cached ids.
        self.page_ids = self.document.get_pages().into_values().collect();
        info!("PDF saved");
        Ok(())
    }
}

fn describe_image(doc: &PdfDocument, name: String, stream: &Stream) -> ImageDescriptor {
    let int = |key: &[u8]| {
        stream
            .dict
            .get(key)
            .ok()
            .and_then(|v| doc.resolve(v).as_i64().ok())
            .unwrap_or(0)
    };
    let color_space = match stream.dict.get(b"ColorSpace").map(|v| doc.resolve(v)) {
        Ok(Object::Name(name)) => String::from_utf8_lossy(name).into_owned(),
        Ok(Object::Array(items)) => items
            .first()
            .and_then(|first| first.as_name().ok())
            .map(|name| String::from_utf8_lossy(name).into_owned())
            .unwrap_or_default(),
        _ => String::new(),
    };
    let filter = raster::filters(doc, stream).into_iter().next();
    if int(b"Width") <= 0 || int(b"Height") <= 0 {
        warn!(image = %name, "Image XObject without dimensions");
    }
    ImageDescriptor {
        name,
        width: int(b"Width").max(0) as u32,
        height: int(b"Height").max(0) as u32,
        bits_per_component: int(b"BitsPerComponent").clamp(0, 16) as u8,
        color_space,
        filter,
    }
}
