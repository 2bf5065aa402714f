// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text-layer embedder: writes recognized text as an invisible overlay so a
// scanned PDF becomes searchable while looking unchanged.
//
// Each region becomes one `BT … ET` object in rendering mode 3 (neither fill
// nor stroke), sized and horizontally scaled to cover its box. The page's
// existing content is wrapped in `q … Q` first so any graphics state it
// leaves behind cannot displace the overlay.

use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Object, ObjectId, Stream, StringFormat, dictionary};
use scanlayer_core::error::{Result, ScanlayerError};
use scanlayer_core::{OutputArtifact, PageRecognitionResult, RecognizedTextRegion};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use super::reader::PdfDocument;
use super::source::DocumentSource;

/// Resource name of the overlay font.
const OVERLAY_FONT: &[u8] = b"FScanlayer";
/// Invisible text: neither fill nor stroke.
const RENDER_MODE_INVISIBLE: i64 = 3;
const FONT_SIZE_RATIO: f32 = 0.8;
/// Helvetica's average advance, in thousandths of an em.
const AVERAGE_ADVANCE: f32 = 500.0;

/// Embed every region of `page_results` into a copy of `input` written to
/// `output`.
///
/// Refuses, before opening anything, when there are no regions at all.
/// Bounding boxes are moved to point space using each result's render zoom.
/// The written file must exist and be non-empty to count as success.
///
/// The overlay uses the standard Helvetica font with WinAnsi encoding, so
/// only Latin-1 text survives. Every other character is written as `?`,
/// which means recognized Cyrillic, Greek, CJK or Arabic text is not
/// searchable in the output even though it is kept in the page results.
#[instrument(skip_all, fields(
    input = %input.display(),
    output = %output.display(),
    pages = page_results.len(),
    compress = compress,
))]
pub fn embed(
    page_results: &[PageRecognitionResult],
    input: &Path,
    output: &Path,
    compress: bool,
) -> Result<OutputArtifact> {
    let region_total: usize = page_results.iter().map(|page| page.regions().len()).sum();
    if region_total == 0 {
        warn!("Nothing to embed");
        return Err(ScanlayerError::NoRecognizedText);
    }

    let mut document = PdfDocument::open(input)?;
    let font_id = document.document_mut().add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    let mut embedded = 0usize;
    for page in page_results {
        if page.regions().is_empty() {
            continue;
        }
        embedded += embed_page(&mut document, &page.to_point_space(), font_id)?;
    }
    info!(embedded, region_total, "Text layer built");

    document.save(output, compress)?;
    verify_output(output)
}

/// Add one page's overlay. Returns the number of regions written.
fn embed_page(document: &mut PdfDocument, page: &PageRecognitionResult, font_id: ObjectId) -> Result<usize> {
    let page_index = page.page_index();
    let page_id = document.page_id(page_index)?;
    let [left, _, _, top] = document.media_box(page_index)?;

    let mut overlay = vec![Operation::new("Q", vec![])];
    let mut written = 0usize;
    for region in page.regions() {
        if let Some(ops) = region_operations(region, left, top) {
            overlay.extend(ops);
            written += 1;
        }
    }
    if written == 0 {
        return Ok(0);
    }

    let resources = overlay_resources(document, page_id, font_id);
    let existing = content_ids(document, page_id);

    let pdf = document.document_mut();
    let save_id = pdf.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
    // Streams are concatenated on read; keep the overlay's first token apart.
    let mut overlay_bytes = b"\n".to_vec();
    overlay_bytes.extend(
        Content { operations: overlay }
            .encode()
            .map_err(|err| ScanlayerError::PdfError(format!("page {page_index}: overlay encoding failed: {err}")))?,
    );
    let overlay_id = pdf.add_object(Stream::new(dictionary! {}, overlay_bytes));

    let mut contents = vec![Object::Reference(save_id)];
    contents.extend(existing.into_iter().map(Object::Reference));
    contents.push(Object::Reference(overlay_id));

    let page_dict = pdf
        .get_dictionary_mut(page_id)
        .map_err(|err| ScanlayerError::PdfError(format!("page {page_index}: {err}")))?;
    page_dict.set("Contents", Object::Array(contents));
    page_dict.set("Resources", Object::Dictionary(resources));

    debug!(page_index, written, "Page overlay added");
    Ok(written)
}

/// `BT 3 Tr /F size Tf scale Tz 1 0 0 1 x y Tm (text) Tj ET` for one region in
/// point space, or `None` when nothing printable remains.
fn region_operations(region: &RecognizedTextRegion, left: f32, top: f32) -> Option<Vec<Operation>> {
    let encoded = encode_win_ansi(region.text().trim());
    if encoded.is_empty() {
        return None;
    }
    let bbox = region.bbox();
    let height = bbox.height();
    let font_size = (height * FONT_SIZE_RATIO).max(1.0);
    let natural_width = encoded.len() as f32 * AVERAGE_ADVANCE / 1000.0 * font_size;
    let scaling = if natural_width > 0.0 && bbox.width() > 0.0 {
        (bbox.width() / natural_width * 100.0).clamp(1.0, 1000.0)
    } else {
        100.0
    };
    let x = left + bbox.x1;
    let baseline = top - bbox.y2;

    Some(vec![
        Operation::new("BT", vec![]),
        Operation::new("Tr", vec![Object::Integer(RENDER_MODE_INVISIBLE)]),
        Operation::new("Tf", vec![Object::Name(OVERLAY_FONT.to_vec()), Object::Real(font_size)]),
        Operation::new("Tz", vec![Object::Real(scaling)]),
        Operation::new(
            "Tm",
            [1.0, 0.0, 0.0, 1.0, x, baseline].into_iter().map(Object::Real).collect(),
        ),
        Operation::new("Tj", vec![Object::String(encoded, StringFormat::Literal)]),
        Operation::new("ET", vec![]),
    ])
}

/// Single-byte encoding for the standard Helvetica font. Characters outside
/// Latin-1 become `?`.
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match u32::from(c) {
            code @ 0x20..=0x7E | code @ 0xA0..=0xFF => code as u8,
            _ if c.is_whitespace() => b' ',
            _ => b'?',
        })
        .collect()
}

/// The page's effective resources, materialized inline, with the overlay font
/// registered.
fn overlay_resources(document: &PdfDocument, page_id: ObjectId, font_id: ObjectId) -> Dictionary {
    let mut resources = document.resources(page_id).cloned().unwrap_or_default();
    let mut fonts = resources
        .get(b"Font")
        .ok()
        .and_then(|fonts| document.resolve(fonts).as_dict().ok())
        .cloned()
        .unwrap_or_default();
    fonts.set(OVERLAY_FONT.to_vec(), Object::Reference(font_id));
    resources.set("Font", Object::Dictionary(fonts));
    resources
}

/// Content stream ids currently drawn by the page, in order.
fn content_ids(document: &PdfDocument, page_id: ObjectId) -> Vec<ObjectId> {
    let Ok(page) = document.document().get_dictionary(page_id) else {
        return Vec::new();
    };
    match page.get(b"Contents") {
        Ok(Object::Reference(id)) => match document.document().get_object(*id) {
            // An indirect array of streams.
            Ok(Object::Array(items)) => items.iter().filter_map(|o| o.as_reference().ok()).collect(),
            _ => vec![*id],
        },
        Ok(Object::Array(items)) => items.iter().filter_map(|o| o.as_reference().ok()).collect(),
        _ => Vec::new(),
    }
}

/// A missing or zero-byte output is a failure no matter what the writer said.
fn verify_output(output: &Path) -> Result<OutputArtifact> {
    let metadata = std::fs::metadata(output).map_err(|err| {
        ScanlayerError::OutputVerification(format!("{} missing after save: {err}", output.display()))
    })?;
    if metadata.len() == 0 {
        return Err(ScanlayerError::OutputVerification(format!(
            "{} is empty after save",
            output.display()
        )));
    }
    let bytes = std::fs::read(output)?;
    let artifact = OutputArtifact {
        path: output.to_path_buf(),
        size_bytes: metadata.len(),
        sha256: hash_bytes(&bytes),
    };
    info!(size_bytes = artifact.size_bytes, sha256 = %artifact.sha256, "Output verified");
    Ok(artifact)
}

/// Lowercase hex SHA-256 of `data`.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
