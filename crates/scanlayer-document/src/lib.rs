// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// scanlayer-document: Everything that touches a single document or page.
//
// PDF access over lopdf (native text, image inventory, rasterization,
// saving), the invisible text-layer embedder, raster preprocessing, the
// recognition adapter, table structure detection, and the scan classifier
// and page orchestrator built on top of them.

pub mod image;
pub mod pdf;
pub mod recognition;
pub mod scan;
pub mod table;

// Re-export the primary entry points so callers can use
// `scanlayer_document::PdfDocument` etc.
pub use crate::image::preprocess;
pub use pdf::{DocumentSource, PdfDocument, ReportSection, ReportWriter};
pub use recognition::{BackendLoader, RecognitionBackend, RecognitionEngine};
pub use scan::{ExtractionSettings, extract_document, extract_page, is_scanned};
pub use table::detect_tables;

#[cfg(feature = "ocr")]
pub use recognition::OcrsLoader;
