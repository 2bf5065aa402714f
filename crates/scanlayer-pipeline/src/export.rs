// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Export dispatch: recognized pages or detected tables to plain text, a
// formatted PDF report, or a CSV sheet.

use std::fmt::Write as _;
use std::path::Path;

use csv::{QuoteStyle, Terminator, WriterBuilder};
use scanlayer_core::error::{Result, ScanlayerError};
use scanlayer_core::{ExportFormat, PageRecognitionResult, TableStructure};
use scanlayer_document::table::{to_grid, to_markdown};
use scanlayer_document::{ReportSection, ReportWriter};
use tracing::{info, instrument};

const REPORT_TITLE: &str = "Recognized text";
/// Blank rows between consecutive tables on a sheet.
const TABLE_GAP_ROWS: usize = 2;

/// What is being exported.
#[derive(Debug, Clone, Copy)]
pub enum ExportSource<'a> {
    Pages(&'a [PageRecognitionResult]),
    Tables(&'a [TableStructure]),
}

impl ExportSource<'_> {
    fn len(&self) -> usize {
        match self {
            Self::Pages(pages) => pages.len(),
            Self::Tables(tables) => tables.len(),
        }
    }
}

/// Write `source` to `path` in `format`.
#[instrument(skip(source, path), fields(path = %path.display(), items = source.len()))]
pub fn export(source: ExportSource<'_>, format: ExportFormat, path: &Path) -> Result<()> {
    match format {
        ExportFormat::PlainText => {
            let text = plain_text(source);
            std::fs::write(path, text)
                .map_err(|err| ScanlayerError::Export(format!("cannot write {}: {err}", path.display())))?;
        }
        ExportFormat::FormattedDocument => {
            ReportWriter::new(REPORT_TITLE).write_to_file(&report_sections(source), path)?;
        }
        ExportFormat::Spreadsheet => {
            let rows = match source {
                ExportSource::Pages(pages) => region_rows(pages),
                ExportSource::Tables(tables) => table_rows(tables),
            };
            write_csv(&rows, path)?;
        }
    }
    info!("Export written");
    Ok(())
}

// -- Plain text and report ----------------------------------------------------------

fn plain_text(source: ExportSource<'_>) -> String {
    let mut out = String::new();
    match source {
        ExportSource::Pages(pages) => {
            for page in pages {
                let _ = write!(out, "=== Page {} ===\n\n{}\n\n", page.page_index() + 1, page.full_text());
            }
        }
        ExportSource::Tables(tables) => {
            for (i, table) in tables.iter().enumerate() {
                let _ = write!(out, "=== Table {} ===\n\n{}\n\n", i + 1, to_markdown(table));
            }
        }
    }
    out
}

fn report_sections(source: ExportSource<'_>) -> Vec<ReportSection> {
    match source {
        ExportSource::Pages(pages) => pages
            .iter()
            .map(|page| ReportSection::new(format!("Page {}", page.page_index() + 1), page.full_text()))
            .collect(),
        ExportSource::Tables(tables) => tables
            .iter()
            .enumerate()
            .map(|(i, table)| ReportSection::new(format!("Table {}", i + 1), to_markdown(table)))
            .collect(),
    }
}

// -- Spreadsheet --------------------------------------------------------------------

/// One row per region, boxes in document points.
fn region_rows(pages: &[PageRecognitionResult]) -> Vec<Vec<String>> {
    let mut rows = vec![
        ["page", "text", "confidence", "x1", "y1", "x2", "y2"]
            .map(String::from)
            .to_vec(),
    ];
    for page in pages {
        let page = page.to_point_space();
        for region in page.regions() {
            let bbox = region.bbox();
            rows.push(vec![
                (page.page_index() + 1).to_string(),
                region.text().to_string(),
                format!("{:.3}", region.confidence()),
                format!("{:.1}", bbox.x1),
                format!("{:.1}", bbox.y1),
                format!("{:.1}", bbox.x2),
                format!("{:.1}", bbox.y2),
            ]);
        }
    }
    rows
}

/// Each table under a `Table N` title row and one blank row, cells at their
/// (row, col) offsets, tables separated by two blank rows. Every row is
/// padded to the widest table.
fn table_rows(tables: &[TableStructure]) -> Vec<Vec<String>> {
    let width = tables.iter().map(|t| t.col_count).max().unwrap_or(0).max(1);
    let blank = || vec![String::new(); width];

    let mut rows = Vec::new();
    for (i, table) in tables.iter().enumerate() {
        if i > 0 {
            rows.extend((0..TABLE_GAP_ROWS).map(|_| blank()));
        }
        let mut title = blank();
        title[0] = format!("Table {}", i + 1);
        rows.push(title);
        rows.push(blank());
        for grid_row in to_grid(table) {
            let mut row = blank();
            for (slot, text) in row.iter_mut().zip(grid_row) {
                *slot = text;
            }
            rows.push(row);
        }
    }
    rows
}

fn write_csv(rows: &[Vec<String>], path: &Path) -> Result<()> {
    let export_error = |err: csv::Error| ScanlayerError::Export(format!("{}: {err}", path.display()));
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::Any(b'\n'))
        .flexible(true)
        .from_path(path)
        .map_err(export_error)?;
    for row in rows {
        writer.write_record(row).map_err(export_error)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use scanlayer_core::{BBox, RecognizedTextRegion, TableCell};

    use super::*;

    fn page(index: usize, texts: &[&str]) -> PageRecognitionResult {
        let regions = texts
            .iter()
            .map(|text| RecognizedTextRegion::new(*text, 0.9, BBox::new(20.0, 40.0, 220.0, 80.0), "en"))
            .collect();
        PageRecognitionResult::new(index, regions, 2.0, Duration::ZERO)
    }

    fn table(texts: &[&[&str]]) -> TableStructure {
        let mut cells = Vec::new();
        for (row, line) in texts.iter().enumerate() {
            for (col, text) in line.iter().enumerate() {
                cells.push(TableCell {
                    row,
                    col,
                    bbox: BBox::UNIT,
                    text: Some(text.to_string()),
                });
            }
        }
        TableStructure {
            bbox: BBox::UNIT,
            row_count: texts.len(),
            col_count: texts[0].len(),
            cells,
            confidence: 1.0,
        }
    }

    #[test]
    fn plain_text_has_page_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let pages = [page(0, &["Hello", "world"]), page(2, &["Third"])];
        export(ExportSource::Pages(&pages), ExportFormat::PlainText, &path).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "=== Page 1 ===\n\nHello\nworld\n\n=== Page 3 ===\n\nThird\n\n"
        );
    }

    #[test]
    fn tables_are_laid_out_on_one_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tables.csv");
        let tables = [table(&[&["a", "b"], &["c", "d"]]), table(&[&["x"]])];
        export(ExportSource::Tables(&tables), ExportFormat::Spreadsheet, &path).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "Table 1,\n,\na,b\nc,d\n,\n,\nTable 2,\n,\nx,\n"
        );
    }

    #[test]
    fn region_sheet_uses_document_points() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("regions.csv");
        export(ExportSource::Pages(&[page(0, &["Total, net"])]), ExportFormat::Spreadsheet, &path).unwrap();
        let sheet = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = sheet.lines().collect();
        assert_eq!(lines[0], "page,text,confidence,x1,y1,x2,y2");
        assert_eq!(lines[1], "1,\"Total, net\",0.900,10.0,20.0,110.0,40.0");
    }

    #[test]
    fn formatted_report_is_a_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        export(ExportSource::Pages(&[page(0, &["Hello"])]), ExportFormat::FormattedDocument, &path).unwrap();
        assert!(std::fs::read(&path).unwrap().starts_with(b"%PDF"));
    }

    #[test]
    fn unwritable_path_is_an_export_error() {
        let err = export(
            ExportSource::Tables(&[table(&[&["a"]])]),
            ExportFormat::Spreadsheet,
            Path::new("/nonexistent/dir/out.csv"),
        )
        .unwrap_err();
        assert!(matches!(err, ScanlayerError::Export(_)));
    }
}
