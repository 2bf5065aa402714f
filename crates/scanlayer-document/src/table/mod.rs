// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Table structure detection and table export.

pub mod detector;
pub mod export;

pub use detector::detect_tables;
pub use export::{fill_cell_text, to_csv, to_grid, to_markdown};
