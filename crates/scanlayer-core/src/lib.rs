// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanlayer: Core types and error definitions shared across all crates.

pub mod config;
pub mod error;
pub mod human_errors;
pub mod types;

pub use config::{DEFAULT_RENDER_ZOOM, PipelineConfig, PreprocessParams};
pub use error::{ErrorClass, ScanlayerError};
pub use types::*;
