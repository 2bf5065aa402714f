// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module: the document collaborator (read, rasterize, save), the
// invisible text-layer embedder, and the report writer.

pub mod content;
pub mod raster;
pub mod reader;
pub mod source;
pub mod text_layer;
pub mod writer;

#[cfg(test)]
pub(crate) mod fixtures;

pub use reader::PdfDocument;
pub use source::{DocumentSource, ImageDescriptor, TextBlock};
pub use text_layer::embed;
pub use writer::{ReportSection, ReportWriter};
