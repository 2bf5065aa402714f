// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// scanlayer-pipeline: background recognition and save runs, document-level
// confidence analysis, and export.

pub mod confidence;
pub mod coordinator;
pub mod events;
pub mod export;
pub mod save;

pub use confidence::analyze;
pub use coordinator::{Coordinator, RunHandle, classify_scanned};
pub use events::{CancellationFlag, RunEvent, RunState, SaveEvent};
pub use export::{ExportSource, export};
pub use save::SaveHandle;
