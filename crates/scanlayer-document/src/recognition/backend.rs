// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Seams between the recognition adapter and whatever model actually reads
// the pixels.

use image::DynamicImage;
use scanlayer_core::error::Result;
use serde_json::Value;

/// One loaded recognition model.
///
/// `infer` returns the model's raw output unparsed. Its shape is not trusted:
/// the adapter decodes it defensively (see `decode`).
pub trait RecognitionBackend: Send {
    fn infer(&self, image: &DynamicImage) -> Result<Value>;
}

/// Builds a backend for a language. Loading is the expensive step, so
/// callers keep the result for as long as the language stays the same.
///
/// A failed load is fatal for the run that asked for it.
pub trait BackendLoader: Send + Sync {
    fn load(&self, language: &str) -> Result<Box<dyn RecognitionBackend>>;
}
