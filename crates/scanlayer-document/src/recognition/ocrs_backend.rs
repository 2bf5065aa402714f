// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Default recognition backend: the pure-Rust `ocrs` engine running `rten`
// models.
//
// # Model Setup
//
// A model directory holds `text-detection.rten` and `text-recognition.rten`.
// When `<model_dir>/<language>/` exists and contains both files it is used
// instead, so per-language models can sit next to the defaults:
//
// ```text
// models/
//   text-detection.rten
//   text-recognition.rten
//   de/
//     text-detection.rten
//     text-recognition.rten
// ```
//
// ocrs must be compiled in release mode; debug builds are 10-100x slower.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use ocrs::{ImageSource, OcrEngine, OcrEngineParams, TextItem};
use rten::Model;
use scanlayer_core::error::{Result, ScanlayerError};
use serde_json::{Value, json};
use tracing::{debug, info, instrument};

use super::backend::{BackendLoader, RecognitionBackend};

pub const DETECTION_MODEL_FILENAME: &str = "text-detection.rten";
pub const RECOGNITION_MODEL_FILENAME: &str = "text-recognition.rten";

/// Loads ocrs engines from a model directory.
#[derive(Debug, Clone)]
pub struct OcrsLoader {
    model_dir: PathBuf,
}

impl OcrsLoader {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
        }
    }

    /// The directory models for `language` are read from.
    pub fn model_dir_for(&self, language: &str) -> PathBuf {
        let specific = self.model_dir.join(language);
        if has_models(&specific) {
            specific
        } else {
            self.model_dir.clone()
        }
    }
}

fn has_models(dir: &Path) -> bool {
    dir.join(DETECTION_MODEL_FILENAME).is_file() && dir.join(RECOGNITION_MODEL_FILENAME).is_file()
}

fn load_model(path: &Path) -> Result<Model> {
    if !path.is_file() {
        return Err(ScanlayerError::EngineUnavailable(format!(
            "model not found at {}",
            path.display()
        )));
    }
    Model::load_file(path).map_err(|err| {
        ScanlayerError::EngineUnavailable(format!("failed to load model from {}: {err}", path.display()))
    })
}

impl BackendLoader for OcrsLoader {
    #[instrument(skip(self), fields(model_dir = %self.model_dir.display()))]
    fn load(&self, language: &str) -> Result<Box<dyn RecognitionBackend>> {
        let dir = self.model_dir_for(language);
        info!(dir = %dir.display(), "Loading recognition models");

        let detection_model = load_model(&dir.join(DETECTION_MODEL_FILENAME))?;
        let recognition_model = load_model(&dir.join(RECOGNITION_MODEL_FILENAME))?;
        let engine = OcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            ..Default::default()
        })
        .map_err(|err| ScanlayerError::EngineUnavailable(format!("failed to initialise ocrs: {err}")))?;

        Ok(Box::new(OcrsBackend { engine }))
    }
}

/// A loaded ocrs engine.
pub struct OcrsBackend {
    engine: OcrEngine,
}

impl RecognitionBackend for OcrsBackend {
    /// One `[polygon, text]` entry per recognized line. ocrs gives no line
    /// score, so entries carry none.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    fn infer(&self, image: &DynamicImage) -> Result<Value> {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        let source = ImageSource::from_bytes(rgb.as_raw(), (width, height)).map_err(|err| {
            ScanlayerError::Recognition(format!("failed to create image source ({width}x{height}): {err}"))
        })?;
        let input = self
            .engine
            .prepare_input(source)
            .map_err(|err| ScanlayerError::Recognition(format!("preprocessing failed: {err}")))?;

        let words = self
            .engine
            .detect_words(&input)
            .map_err(|err| ScanlayerError::Recognition(format!("word detection failed: {err}")))?;
        let line_rects = self.engine.find_text_lines(&input, &words);
        let lines = self
            .engine
            .recognize_text(&input, &line_rects)
            .map_err(|err| ScanlayerError::Recognition(format!("line recognition failed: {err}")))?;

        let entries: Vec<Value> = lines
            .iter()
            .flatten()
            .map(|line| {
                let rect = line.bounding_rect();
                let (left, top) = (rect.left() as f64, rect.top() as f64);
                let (right, bottom) = (rect.right() as f64, rect.bottom() as f64);
                json!([[[left, top], [right, top], [right, bottom], [left, bottom]], line.to_string()])
            })
            .collect();
        debug!(words = words.len(), lines = entries.len(), "ocrs pass complete");
        Ok(Value::Array(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_shared_models() {
        let dir = tempfile::tempdir().unwrap();
        let loader = OcrsLoader::new(dir.path());
        assert_eq!(loader.model_dir_for("de"), dir.path());
    }

    #[test]
    fn prefers_language_directory() {
        let dir = tempfile::tempdir().unwrap();
        let de = dir.path().join("de");
        std::fs::create_dir(&de).unwrap();
        std::fs::write(de.join(DETECTION_MODEL_FILENAME), b"x").unwrap();
        std::fs::write(de.join(RECOGNITION_MODEL_FILENAME), b"x").unwrap();
        assert_eq!(OcrsLoader::new(dir.path()).model_dir_for("de"), de);
    }

    #[test]
    fn missing_models_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = OcrsLoader::new(dir.path()).load("en").err().unwrap();
        assert!(matches!(err, ScanlayerError::EngineUnavailable(_)));
    }
}
