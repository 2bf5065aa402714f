// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Recognition engine: one loaded backend bound to one language, turning raw
// model output into validated `RecognizedTextRegion`s.

use image::{DynamicImage, GenericImageView};
use scanlayer_core::error::{Result, ScanlayerError};
use scanlayer_core::{BBox, RecognizedTextRegion};
use tracing::{debug, info, instrument};

use super::backend::{BackendLoader, RecognitionBackend};
use super::decode::{DecodedLine, decode};
use super::language::detect_language;

/// Language binding that tags each region by its detected script.
pub const AUTO_LANGUAGE: &str = "auto";

/// A backend bound to a language.
///
/// Not shared between concurrent runs: the owner hands out `&self` to one
/// worker at a time.
pub struct RecognitionEngine {
    language: String,
    backend: Box<dyn RecognitionBackend>,
}

impl std::fmt::Debug for RecognitionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecognitionEngine")
            .field("language", &self.language)
            .finish_non_exhaustive()
    }
}

impl RecognitionEngine {
    /// Wrap an already-loaded backend.
    pub fn new(language: impl Into<String>, backend: Box<dyn RecognitionBackend>) -> Self {
        Self {
            language: language.into(),
            backend,
        }
    }

    /// Load a backend for `language` through `loader`.
    #[instrument(skip(loader))]
    pub fn load(loader: &dyn BackendLoader, language: &str) -> Result<Self> {
        let backend = loader.load(language).map_err(|err| match err {
            ScanlayerError::EngineUnavailable(_) => err,
            other => ScanlayerError::EngineUnavailable(format!("{language}: {other}")),
        })?;
        info!(language, "Recognition engine ready");
        Ok(Self::new(language, backend))
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    // -- Recognition ----------------------------------------------------------

    /// Every region of `image` scoring at least `min_confidence`, in the order
    /// the backend reported them. Boxes are in `image` pixel space.
    ///
    /// A backend failure is a per-page error; malformed entries in its output
    /// are skipped.
    #[instrument(skip_all, fields(width = image.width(), height = image.height(), language = %self.language))]
    pub fn recognize(&self, image: &DynamicImage, min_confidence: f32) -> Result<Vec<RecognizedTextRegion>> {
        let raw = self.backend.infer(image).map_err(|err| match err {
            ScanlayerError::Recognition(_) => err,
            other => ScanlayerError::Recognition(other.to_string()),
        })?;

        let lines = decode(&raw);
        let decoded = lines.len();
        let regions: Vec<RecognizedTextRegion> = lines
            .into_iter()
            .filter(|line| line.confidence >= min_confidence)
            .map(|line| self.region(line))
            .collect();

        debug!(decoded, kept = regions.len(), min_confidence, "Recognition complete");
        Ok(regions)
    }

    /// Recognize only `sub_rect` of `image` and merge what is found into one
    /// region in full-image coordinates.
    ///
    /// `sub_rect` is clamped to the image; an empty intersection, or a crop
    /// with no text, gives `None`.
    pub fn recognize_region(&self, image: &DynamicImage, sub_rect: BBox) -> Result<Option<RecognizedTextRegion>> {
        let (width, height) = image.dimensions();
        let x1 = sub_rect.x1.max(0.0).floor().min(width as f32) as u32;
        let y1 = sub_rect.y1.max(0.0).floor().min(height as f32) as u32;
        let x2 = sub_rect.x2.max(0.0).ceil().min(width as f32) as u32;
        let y2 = sub_rect.y2.max(0.0).ceil().min(height as f32) as u32;
        if x2 <= x1 || y2 <= y1 {
            return Ok(None);
        }

        let crop = image.crop_imm(x1, y1, x2 - x1, y2 - y1);
        let regions = self.recognize(&crop, 0.0)?;
        let Some(first) = regions.first() else {
            return Ok(None);
        };

        let (dx, dy) = (x1 as f32, y1 as f32);
        let bbox = regions
            .iter()
            .map(|region| region.bbox().translated(dx, dy))
            .fold(first.bbox().translated(dx, dy), |acc, b| acc.union(&b));
        let text = regions
            .iter()
            .map(RecognizedTextRegion::text)
            .collect::<Vec<_>>()
            .join(" ");
        let confidence = regions.iter().map(RecognizedTextRegion::confidence).sum::<f32>() / regions.len() as f32;

        Ok(Some(self.region(DecodedLine { text, confidence, bbox })))
    }

    /// Script-based language tag for `text`.
    pub fn detect_language(&self, text: &str) -> &'static str {
        detect_language(text)
    }

    fn region(&self, line: DecodedLine) -> RecognizedTextRegion {
        let language = if self.language == AUTO_LANGUAGE {
            detect_language(&line.text).to_string()
        } else {
            self.language.clone()
        };
        RecognizedTextRegion::new(line.text, line.confidence, line.bbox, language)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use image::RgbImage;
    use serde_json::{Value, json};

    use super::*;

    /// Returns a fixed output and records the size of every image it saw.
    struct Scripted {
        output: Value,
        seen: std::sync::Arc<Mutex<Vec<(u32, u32)>>>,
    }

    impl RecognitionBackend for Scripted {
        fn infer(&self, image: &DynamicImage) -> Result<Value> {
            self.seen.lock().unwrap().push(image.dimensions());
            Ok(self.output.clone())
        }
    }

    struct Broken;

    impl RecognitionBackend for Broken {
        fn infer(&self, _image: &DynamicImage) -> Result<Value> {
            Err(ScanlayerError::ImageError("tensor shape mismatch".into()))
        }
    }

    fn engine(language: &str, output: Value) -> (RecognitionEngine, std::sync::Arc<Mutex<Vec<(u32, u32)>>>) {
        let seen = std::sync::Arc::new(Mutex::new(Vec::new()));
        let backend = Scripted {
            output,
            seen: seen.clone(),
        };
        (RecognitionEngine::new(language, Box::new(backend)), seen)
    }

    fn page() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(200, 100, image::Rgb([255, 255, 255])))
    }

    #[test]
    fn hello_parses_to_one_region() {
        let (engine, _) = engine("en", json!([[[[10, 10], [50, 10], [50, 30], [10, 30]], ["Hello", 0.92]]]));
        let regions = engine.recognize(&page(), 0.0).unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].text(), "Hello");
        assert_eq!(regions[0].confidence(), 0.92);
        assert_eq!(regions[0].bbox(), BBox::new(10.0, 10.0, 50.0, 30.0));
        assert_eq!(regions[0].language(), "en");
    }

    #[test]
    fn low_confidence_is_dropped() {
        let quad = json!([[0, 0], [5, 0], [5, 5], [0, 5]]);
        let (engine, _) = engine("en", json!([[quad, ["keep", 0.8]], [quad, ["drop", 0.3]]]));
        let regions = engine.recognize(&page(), 0.5).unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].text(), "keep");
    }

    #[test]
    fn every_confidence_is_in_unit_range() {
        let quad = json!([[0, 0], [5, 0], [5, 5], [0, 5]]);
        let (engine, _) = engine("en", json!([[quad, ["a", 3.5]], [quad, ["b", -1]], [quad, "c"]]));
        for region in engine.recognize(&page(), 0.0).unwrap() {
            assert!((0.0..=1.0).contains(&region.confidence()));
        }
    }

    #[test]
    fn auto_language_tags_by_script() {
        let quad = json!([[0, 0], [5, 0], [5, 5], [0, 5]]);
        let (engine, _) = engine(AUTO_LANGUAGE, json!([[quad, "مرحبا"], [quad, "hello"]]));
        let regions = engine.recognize(&page(), 0.0).unwrap();
        assert_eq!(regions[0].language(), "ar");
        assert_eq!(regions[1].language(), "en");
    }

    #[test]
    fn region_is_rebased_and_merged() {
        let output = json!([
            [[[0, 0], [20, 0], [20, 10], [0, 10]], ["Net", 0.8]],
            [[[25, 0], [60, 0], [60, 10], [25, 10]], ["total", 0.6]],
        ]);
        let (engine, seen) = engine("en", output);
        let region = engine
            .recognize_region(&page(), BBox::new(100.0, 40.0, 180.0, 70.0))
            .unwrap()
            .unwrap();
        assert_eq!(seen.lock().unwrap().as_slice(), &[(80, 30)]);
        assert_eq!(region.text(), "Net total");
        assert!((region.confidence() - 0.7).abs() < 1e-6);
        assert_eq!(region.bbox(), BBox::new(100.0, 40.0, 160.0, 50.0));
    }

    #[test]
    fn region_outside_image_is_none() {
        let (engine, seen) = engine("en", json!([]));
        let outside = engine.recognize_region(&page(), BBox::new(300.0, 300.0, 400.0, 400.0)).unwrap();
        assert!(outside.is_none());
        assert!(seen.lock().unwrap().is_empty());
        // Partially outside is clamped rather than rejected.
        engine.recognize_region(&page(), BBox::new(150.0, -20.0, 260.0, 50.0)).unwrap();
        assert_eq!(seen.lock().unwrap().as_slice(), &[(50, 50)]);
    }

    #[test]
    fn backend_failure_is_per_page() {
        let engine = RecognitionEngine::new("en", Box::new(Broken));
        let err = engine.recognize(&page(), 0.0).unwrap_err();
        assert_eq!(err.class(), scanlayer_core::ErrorClass::PerPage);
    }

    #[test]
    fn failed_load_is_fatal() {
        struct NoModels;
        impl BackendLoader for NoModels {
            fn load(&self, _language: &str) -> Result<Box<dyn RecognitionBackend>> {
                Err(ScanlayerError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "missing")))
            }
        }
        let err = RecognitionEngine::load(&NoModels, "de").unwrap_err();
        assert!(matches!(err, ScanlayerError::EngineUnavailable(_)));
        assert_eq!(err.class(), scanlayer_core::ErrorClass::Fatal);
    }
}
