// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Report writer: lays recognized text out as a fresh, readable PDF using
// `printpdf` 0.8.
//
// Each section (one per recognized page) starts on a new sheet with a bold
// heading; its body is word-wrapped and flows onto further sheets as needed.

use std::path::Path;

use printpdf::{BuiltinFont, Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Point, Pt, TextItem};
use scanlayer_core::error::{Result, ScanlayerError};
use tracing::{debug, info, instrument, warn};

const A4_MM: (f32, f32) = (210.0, 297.0);
const MARGIN_MM: f32 = 20.0;
const BODY_SIZE_PT: f32 = 11.0;
const LINE_HEIGHT_PT: f32 = 14.0;
const HEADING_SIZE_PT: f32 = 16.0;
const HEADING_GAP_PT: f32 = 28.0;
/// Average Helvetica advance as a fraction of the font size.
const AVERAGE_GLYPH_WIDTH: f32 = 0.5;

/// One titled block of the report.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportSection {
    pub heading: String,
    pub body: String,
}

impl ReportSection {
    pub fn new(heading: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            heading: heading.into(),
            body: body.into(),
        }
    }
}

/// Builds paginated text reports.
pub struct ReportWriter {
    title: String,
    page_size: (Mm, Mm),
}

impl ReportWriter {
    /// A4 report with the given document title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            page_size: (Mm(A4_MM.0), Mm(A4_MM.1)),
        }
    }

    /// Render `sections` to PDF bytes. An empty report is one blank sheet.
    #[instrument(skip_all, fields(title = %self.title, sections = sections.len()))]
    pub fn render(&self, sections: &[ReportSection]) -> Vec<u8> {
        let (page_w, page_h) = self.page_size;
        let margin_pt = Mm(MARGIN_MM).into_pt().0;
        let top_pt = page_h.into_pt().0 - margin_pt;
        let usable_w_pt = page_w.into_pt().0 - 2.0 * margin_pt;
        let chars_per_line = ((usable_w_pt / (AVERAGE_GLYPH_WIDTH * BODY_SIZE_PT)) as usize).max(1);

        let mut pages: Vec<PdfPage> = Vec::new();
        for section in sections {
            let mut ops = Vec::new();
            push_line(&mut ops, &section.heading, margin_pt, top_pt, HEADING_SIZE_PT, BuiltinFont::HelveticaBold);
            let mut y = top_pt - HEADING_GAP_PT;

            for line in wrap_text(&section.body, chars_per_line) {
                if y < margin_pt {
                    pages.push(PdfPage::new(page_w, page_h, std::mem::take(&mut ops)));
                    y = top_pt;
                }
                if !line.is_empty() {
                    push_line(&mut ops, &line, margin_pt, y, BODY_SIZE_PT, BuiltinFont::Helvetica);
                }
                y -= LINE_HEIGHT_PT;
            }
            pages.push(PdfPage::new(page_w, page_h, ops));
        }
        if pages.is_empty() {
            pages.push(PdfPage::new(page_w, page_h, Vec::new()));
        }

        let mut doc = PdfDocument::new(&self.title);
        doc.with_pages(pages);
        debug!(pages = doc.pages.len(), "Report laid out");

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let bytes = doc.save(&PdfSaveOptions::default(), &mut warnings);
        if !warnings.is_empty() {
            warn!(count = warnings.len(), "printpdf reported warnings");
        }
        bytes
    }

    /// Render and write to `path`.
    pub fn write_to_file(&self, sections: &[ReportSection], path: &Path) -> Result<u64> {
        let bytes = self.render(sections);
        std::fs::write(path, &bytes)
            .map_err(|err| ScanlayerError::Export(format!("cannot write {}: {err}", path.display())))?;
        info!(path = %path.display(), bytes = bytes.len(), "Wrote report PDF");
        Ok(bytes.len() as u64)
    }
}

fn push_line(ops: &mut Vec<Op>, text: &str, x: f32, y: f32, size: f32, font: BuiltinFont) {
    ops.push(Op::StartTextSection);
    ops.push(Op::SetTextCursor {
        pos: Point { x: Pt(x), y: Pt(y) },
    });
    ops.push(Op::SetFontSizeBuiltinFont { size: Pt(size), font });
    ops.push(Op::WriteTextBuiltinFont {
        items: vec![TextItem::Text(text.to_string())],
        font,
    });
    ops.push(Op::EndTextSection);
}

// -- Wrapping ---------------------------------------------------------------------

/// Word-wrap to at most `max_width` characters per line. Existing newlines
/// are kept; words longer than a line are split.
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut current = String::new();
        let mut current_len = 0usize;
        for word in paragraph.split_whitespace() {
            let mut chars: Vec<char> = word.chars().collect();
            while chars.len() > max_width {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                let rest = chars.split_off(max_width);
                lines.push(chars.into_iter().collect());
                chars = rest;
            }
            if chars.is_empty() {
                continue;
            }
            let word_len = chars.len();
            if current_len > 0 && current_len + 1 + word_len > max_width {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if current_len > 0 {
                current.push(' ');
                current_len += 1;
            }
            current.extend(chars);
            current_len += word_len;
        }
        lines.push(current);
    }
    lines
}
