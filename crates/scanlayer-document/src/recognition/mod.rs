// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Recognition engine adapter.

pub mod backend;
pub mod decode;
pub mod engine;
pub mod language;

#[cfg(feature = "ocr")]
pub mod ocrs_backend;

pub use backend::{BackendLoader, RecognitionBackend};
pub use engine::{AUTO_LANGUAGE, RecognitionEngine};
pub use language::detect_language;

#[cfg(feature = "ocr")]
pub use ocrs_backend::OcrsLoader;
