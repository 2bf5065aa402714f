// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Scanlayer recognition pipeline.
//
// Every bounding box produced by recognition lives in the pixel space of the
// raster it was recognized from (the page rendered at `render_zoom`). Only
// `PageRecognitionResult::to_point_space` moves boxes into PDF point space.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Confidence below which a region counts as low-confidence in per-page
/// statistics.
pub const LOW_CONFIDENCE_THRESHOLD: f32 = 0.75;

/// Unique identifier for one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Axis-aligned rectangle `(x1, y1)`–`(x2, y2)`, top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    /// The substitute box used when a recognizer reports a malformed polygon.
    pub const UNIT: BBox = BBox {
        x1: 0.0,
        y1: 0.0,
        x2: 1.0,
        y2: 1.0,
    };

    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Multiply every coordinate by `factor`.
    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            x1: self.x1 * factor,
            y1: self.y1 * factor,
            x2: self.x2 * factor,
            y2: self.y2 * factor,
        }
    }

    pub fn translated(&self, dx: f32, dy: f32) -> Self {
        Self {
            x1: self.x1 + dx,
            y1: self.y1 + dy,
            x2: self.x2 + dx,
            y2: self.y2 + dy,
        }
    }

    /// Smallest box containing both `self` and `other`.
    pub fn union(&self, other: &BBox) -> Self {
        Self {
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
            x2: self.x2.max(other.x2),
            y2: self.y2.max(other.y2),
        }
    }
}

/// One piece of text found by the recognizer.
///
/// Immutable once built. The constructor normalizes its inputs, so every
/// region has a confidence in `[0, 1]` and a box with `x1 <= x2`, `y1 <= y2`
/// whoever builds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedTextRegion {
    text: String,
    confidence: f32,
    bbox: BBox,
    language: String,
}

impl RecognizedTextRegion {
    /// Build a region. Confidence is clamped into `[0, 1]` (NaN becomes 0)
    /// and the box corners are reordered if they arrive swapped.
    pub fn new(
        text: impl Into<String>,
        confidence: f32,
        bbox: BBox,
        language: impl Into<String>,
    ) -> Self {
        let confidence = if confidence.is_nan() { 0.0 } else { confidence.clamp(0.0, 1.0) };
        Self {
            text: text.into(),
            confidence,
            bbox: BBox::new(
                bbox.x1.min(bbox.x2),
                bbox.y1.min(bbox.y2),
                bbox.x1.max(bbox.x2),
                bbox.y1.max(bbox.y2),
            ),
            language: language.into(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn bbox(&self) -> BBox {
        self.bbox
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// A copy of this region with its box divided by `zoom`.
    fn rescaled(&self, zoom: f32) -> Self {
        Self {
            bbox: self.bbox.scaled(1.0 / zoom),
            ..self.clone()
        }
    }
}

/// Recognition output for one page of one pipeline run.
///
/// The aggregates (`full_text`, `word_count`, `average_confidence`) are
/// computed from the region list on every call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecognitionResult {
    page_index: usize,
    regions: Vec<RecognizedTextRegion>,
    /// Zoom the page was rasterized at; bboxes are in that raster's pixels.
    render_zoom: f32,
    processing_duration: Duration,
}

impl PageRecognitionResult {
    pub fn new(
        page_index: usize,
        regions: Vec<RecognizedTextRegion>,
        render_zoom: f32,
        processing_duration: Duration,
    ) -> Self {
        Self {
            page_index,
            regions,
            render_zoom,
            processing_duration,
        }
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn regions(&self) -> &[RecognizedTextRegion] {
        &self.regions
    }

    pub fn render_zoom(&self) -> f32 {
        self.render_zoom
    }

    pub fn processing_duration(&self) -> Duration {
        self.processing_duration
    }

    /// Region texts joined by newlines, in recognition order.
    pub fn full_text(&self) -> String {
        self.regions
            .iter()
            .map(RecognizedTextRegion::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn word_count(&self) -> usize {
        self.regions
            .iter()
            .map(|region| region.text.split_whitespace().count())
            .sum()
    }

    /// Mean region confidence, or 0.0 for a page without regions.
    pub fn average_confidence(&self) -> f32 {
        if self.regions.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.regions.iter().map(|r| r.confidence as f64).sum();
        (sum / self.regions.len() as f64) as f32
    }

    /// A new result whose boxes are expressed in PDF points (zoom 1.0).
    ///
    /// Applying this twice is a no-op the second time.
    pub fn to_point_space(&self) -> Self {
        if self.render_zoom <= 0.0 || (self.render_zoom - 1.0).abs() < f32::EPSILON {
            return self.clone();
        }
        Self {
            page_index: self.page_index,
            regions: self
                .regions
                .iter()
                .map(|region| region.rescaled(self.render_zoom))
                .collect(),
            render_zoom: 1.0,
            processing_duration: self.processing_duration,
        }
    }

    /// Snapshot of this page's statistics for progress reporting.
    pub fn statistics(&self) -> PageStatistics {
        let confidences: Vec<f32> = self.regions.iter().map(|r| r.confidence).collect();
        let full_text = self.full_text();
        PageStatistics {
            word_count: self.word_count(),
            char_count: full_text.chars().count(),
            line_count: self.regions.len(),
            average_confidence: self.average_confidence(),
            min_confidence: confidences.iter().copied().fold(None, |acc: Option<f32>, c| {
                Some(acc.map_or(c, |a| a.min(c)))
            })
            .unwrap_or(0.0),
            max_confidence: confidences.iter().copied().fold(None, |acc: Option<f32>, c| {
                Some(acc.map_or(c, |a| a.max(c)))
            })
            .unwrap_or(0.0),
            low_confidence_count: confidences
                .iter()
                .filter(|&&c| c < LOW_CONFIDENCE_THRESHOLD)
                .count(),
            processing_duration: self.processing_duration,
        }
    }
}

/// Per-page figures emitted alongside each `page_done` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageStatistics {
    pub word_count: usize,
    pub char_count: usize,
    pub line_count: usize,
    pub average_confidence: f32,
    pub min_confidence: f32,
    pub max_confidence: f32,
    pub low_confidence_count: usize,
    pub processing_duration: Duration,
}

/// One cell of an inferred table grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableCell {
    pub row: usize,
    pub col: usize,
    pub bbox: BBox,
    /// Filled only when cell-level recognition is run afterwards.
    pub text: Option<String>,
}

/// A detected table region with its row/column grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableStructure {
    pub bbox: BBox,
    pub row_count: usize,
    pub col_count: usize,
    /// Row-major, `(row, col)` unique.
    pub cells: Vec<TableCell>,
    pub confidence: f32,
}

impl TableStructure {
    /// A copy of this table with cell texts replaced by `texts`, matched by
    /// `(row, col)`. Cells without an entry keep their current text.
    pub fn with_cell_text(&self, texts: &[((usize, usize), String)]) -> Self {
        let cells = self
            .cells
            .iter()
            .map(|cell| {
                let text = texts
                    .iter()
                    .find(|((row, col), _)| *row == cell.row && *col == cell.col)
                    .map(|(_, text)| text.clone())
                    .or_else(|| cell.text.clone());
                TableCell {
                    text,
                    ..cell.clone()
                }
            })
            .collect();
        Self {
            cells,
            ..self.clone()
        }
    }
}

/// A region whose confidence fell below the analysis threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspiciousRegion {
    pub page_index: usize,
    pub text: String,
    pub confidence: f32,
    pub bbox: BBox,
}

/// Document-level aggregate over a list of page results.
///
/// Always recomputed from the results, never edited by hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecognitionStatistics {
    pub total_words: usize,
    pub average_confidence: f32,
    pub suspicious_regions: Vec<SuspiciousRegion>,
    pub pages_processed: usize,
}

/// Which page images go through which preprocessing steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreprocessingFlags {
    pub auto_rotate: bool,
    pub deskew: bool,
    pub despeckle: bool,
    pub enhance: bool,
    pub suppress_background: bool,
}

impl PreprocessingFlags {
    /// Every step disabled.
    pub fn none() -> Self {
        Self {
            auto_rotate: false,
            deskew: false,
            despeckle: false,
            enhance: false,
            suppress_background: false,
        }
    }

    pub fn any(&self) -> bool {
        self.auto_rotate || self.deskew || self.despeckle || self.enhance || self.suppress_background
    }
}

impl Default for PreprocessingFlags {
    fn default() -> Self {
        Self {
            auto_rotate: false,
            deskew: true,
            despeckle: true,
            enhance: true,
            suppress_background: true,
        }
    }
}

/// Half-open page interval `[start, end)`, 0-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: usize,
    pub end: usize,
}

impl PageRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Clamp this range to a document of `page_count` pages.
    pub fn clamp_to(&self, page_count: usize) -> std::ops::Range<usize> {
        let end = self.end.min(page_count);
        self.start.min(end)..end
    }
}

/// Formats accepted by the export dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    /// Page headers followed by each page's text.
    PlainText,
    /// A paginated PDF report with one heading per page.
    FormattedDocument,
    /// Comma-separated sheet.
    Spreadsheet,
}

/// Output file written by one embed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputArtifact {
    pub path: std::path::PathBuf,
    pub size_bytes: u64,
    /// Hex-encoded SHA-256 of the written file.
    pub sha256: String,
}

/// Summary of one recognition run, attached to terminal events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub language: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub pages_requested: usize,
    pub pages_succeeded: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(text: &str, confidence: f32, bbox: BBox) -> RecognizedTextRegion {
        RecognizedTextRegion::new(text, confidence, bbox, "en")
    }

    fn sample_page() -> PageRecognitionResult {
        PageRecognitionResult::new(
            2,
            vec![
                region("Invoice number 42", 0.9, BBox::new(20.0, 40.0, 220.0, 80.0)),
                region("Total", 0.5, BBox::new(20.0, 100.0, 120.0, 130.0)),
            ],
            2.0,
            Duration::from_millis(120),
        )
    }

    #[test]
    fn regions_normalize_their_inputs() {
        let swapped = region("x", 1.7, BBox::new(50.0, 40.0, 10.0, 20.0));
        assert_eq!(swapped.confidence(), 1.0);
        assert_eq!(swapped.bbox(), BBox::new(10.0, 20.0, 50.0, 40.0));
        assert_eq!(region("x", f32::NAN, BBox::UNIT).confidence(), 0.0);
        assert_eq!(region("x", -0.2, BBox::UNIT).confidence(), 0.0);
    }

    #[test]
    fn aggregates_follow_regions() {
        let page = sample_page();
        assert_eq!(page.full_text(), "Invoice number 42\nTotal");
        assert_eq!(page.word_count(), 4);
        assert!((page.average_confidence() - 0.7).abs() < 1e-6);
        // Recomputing yields the same values.
        assert_eq!(page.word_count(), page.word_count());
        assert_eq!(page.average_confidence(), page.average_confidence());
    }

    #[test]
    fn empty_page_has_zero_confidence() {
        let page = PageRecognitionResult::new(0, Vec::new(), 2.0, Duration::ZERO);
        assert_eq!(page.average_confidence(), 0.0);
        assert_eq!(page.word_count(), 0);
        let stats = page.statistics();
        assert_eq!(stats.min_confidence, 0.0);
        assert_eq!(stats.max_confidence, 0.0);
    }

    #[test]
    fn confidence_is_clamped() {
        assert_eq!(region("a", 1.7, BBox::UNIT).confidence(), 1.0);
        assert_eq!(region("a", -0.2, BBox::UNIT).confidence(), 0.0);
    }

    #[test]
    fn point_space_divides_by_zoom_once() {
        let page = sample_page();
        let points = page.to_point_space();
        assert_eq!(points.render_zoom(), 1.0);
        assert_eq!(points.regions()[0].bbox(), BBox::new(10.0, 20.0, 110.0, 40.0));
        assert_eq!(points.to_point_space(), points);
        // The original result is untouched.
        assert_eq!(page.regions()[0].bbox(), BBox::new(20.0, 40.0, 220.0, 80.0));
    }

    #[test]
    fn page_statistics_snapshot() {
        let stats = sample_page().statistics();
        assert_eq!(stats.line_count, 2);
        assert_eq!(stats.low_confidence_count, 1);
        assert_eq!(stats.min_confidence, 0.5);
        assert_eq!(stats.max_confidence, 0.9);
        assert_eq!(stats.char_count, "Invoice number 42\nTotal".len());
    }

    #[test]
    fn page_range_clamps() {
        assert_eq!(PageRange::new(2, 10).clamp_to(5), 2..5);
        assert_eq!(PageRange::new(7, 10).clamp_to(5), 5..5);
    }

    #[test]
    fn cell_text_is_replacement() {
        let table = TableStructure {
            bbox: BBox::new(0.0, 0.0, 100.0, 50.0),
            row_count: 1,
            col_count: 2,
            cells: vec![
                TableCell { row: 0, col: 0, bbox: BBox::new(0.0, 0.0, 50.0, 50.0), text: None },
                TableCell { row: 0, col: 1, bbox: BBox::new(50.0, 0.0, 100.0, 50.0), text: None },
            ],
            confidence: 1.0,
        };
        let filled = table.with_cell_text(&[((0, 1), "Qty".to_string())]);
        assert_eq!(filled.cells[1].text.as_deref(), Some("Qty"));
        assert_eq!(filled.cells[0].text, None);
        assert!(table.cells.iter().all(|c| c.text.is_none()));
    }

    #[test]
    fn bbox_union_and_translate() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(5.0, -5.0, 20.0, 8.0);
        assert_eq!(a.union(&b), BBox::new(0.0, -5.0, 20.0, 10.0));
        assert_eq!(a.translated(3.0, 4.0), BBox::new(3.0, 4.0, 13.0, 14.0));
        assert_eq!(a.area(), 100.0);
    }
}
