// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Table conversion: text grid, Markdown, CSV, and cell-level recognition.

use csv::{QuoteStyle, Terminator, WriterBuilder};
use image::DynamicImage;
use scanlayer_core::error::{Result, ScanlayerError};
use scanlayer_core::{ErrorClass, TableStructure};
use tracing::{debug, instrument};

use crate::recognition::RecognitionEngine;

/// Row-major grid of cell texts; cells without text are empty strings.
pub fn to_grid(table: &TableStructure) -> Vec<Vec<String>> {
    let mut grid = vec![vec![String::new(); table.col_count]; table.row_count];
    for cell in &table.cells {
        if let (Some(row), Some(text)) = (grid.get_mut(cell.row), cell.text.as_ref())
            && let Some(slot) = row.get_mut(cell.col)
        {
            slot.clone_from(text);
        }
    }
    grid
}

/// Markdown table. The first grid row is the header.
pub fn to_markdown(table: &TableStructure) -> String {
    let grid = to_grid(table);
    let Some((header, body)) = grid.split_first() else {
        return String::new();
    };
    let row = |cells: &[String]| format!("| {} |", cells.join(" | "));

    let mut lines = vec![row(header), row(&vec!["---".to_string(); table.col_count])];
    lines.extend(body.iter().map(|cells| row(cells)));
    lines.join("\n")
}

/// Delimited text, one line per row. Fields containing the delimiter or a
/// quote are quoted, with internal quotes doubled.
pub fn to_csv(table: &TableStructure, delimiter: u8) -> Result<String> {
    let mut writer = WriterBuilder::new()
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::Any(b'\n'))
        .flexible(true)
        .from_writer(Vec::<u8>::new());
    for row in to_grid(table) {
        writer
            .write_record(&row)
            .map_err(|err| ScanlayerError::Export(format!("csv row: {err}")))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| ScanlayerError::Export(format!("csv flush: {err}")))?;
    let text = String::from_utf8(bytes).map_err(|err| ScanlayerError::Export(format!("csv encoding: {err}")))?;
    Ok(text.trim_end_matches('\n').to_string())
}

/// Recognize the text of every cell and return a new table carrying it.
///
/// A cell whose recognition fails keeps its previous text.
#[instrument(skip_all, fields(rows = table.row_count, cols = table.col_count))]
pub fn fill_cell_text(engine: &RecognitionEngine, image: &DynamicImage, table: &TableStructure) -> TableStructure {
    let mut texts = Vec::with_capacity(table.cells.len());
    for cell in &table.cells {
        match engine.recognize_region(image, cell.bbox) {
            Ok(Some(region)) => texts.push(((cell.row, cell.col), region.text().to_string())),
            Ok(None) => {}
            Err(err) => debug!(
                row = cell.row,
                col = cell.col,
                class = ?ErrorClass::PerRegion,
                error = %err,
                "Cell recognition failed"
            ),
        }
    }
    debug!(filled = texts.len(), "Cell text recognized");
    table.with_cell_text(&texts)
}
