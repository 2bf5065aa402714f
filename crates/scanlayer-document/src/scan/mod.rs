// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan classification and page-by-page recognition.

pub mod classifier;
pub mod extract;

pub use classifier::{DEFAULT_SAMPLE_COUNT, PageSignals, is_scanned};
pub use extract::{ExtractionSettings, extract_document, extract_page};
