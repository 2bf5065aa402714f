// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page recognition orchestrator: render, optionally preprocess, recognize,
// and time each page.

use std::path::Path;
use std::time::Instant;

use scanlayer_core::error::Result;
use scanlayer_core::{
    DEFAULT_RENDER_ZOOM, PageRange, PageRecognitionResult, PipelineConfig, PreprocessParams, PreprocessingFlags,
};
use tracing::{debug, info, instrument, warn};

use crate::image::preprocess;
use crate::pdf::source::DocumentSource;
use crate::recognition::RecognitionEngine;

/// How pages are turned into recognition results.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractionSettings {
    pub render_zoom: f32,
    pub preprocessing: PreprocessingFlags,
    pub params: PreprocessParams,
    pub min_confidence: f32,
}

impl ExtractionSettings {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            render_zoom: config.render_zoom,
            preprocessing: config.preprocessing,
            params: config.preprocess_params,
            min_confidence: config.min_confidence,
        }
    }

    /// Same settings with preprocessing switched by `flags`.
    pub fn with_preprocessing(self, flags: PreprocessingFlags) -> Self {
        Self {
            preprocessing: flags,
            ..self
        }
    }
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            render_zoom: DEFAULT_RENDER_ZOOM,
            preprocessing: PreprocessingFlags::default(),
            params: PreprocessParams::default(),
            min_confidence: 0.5,
        }
    }
}

/// Recognize one page of an open document.
///
/// Boxes in the result are in raster space at `settings.render_zoom`, which
/// the result carries.
#[instrument(skip(doc, engine, settings), fields(zoom = settings.render_zoom))]
pub fn extract_page<D: DocumentSource>(
    doc: &D,
    engine: &RecognitionEngine,
    page_index: usize,
    settings: &ExtractionSettings,
) -> Result<PageRecognitionResult> {
    let started = Instant::now();

    let raster = doc.render_page(page_index, settings.render_zoom)?;
    let raster = if settings.preprocessing.any() {
        preprocess(&raster, &settings.preprocessing, &settings.params)
    } else {
        raster
    };
    let regions = engine.recognize(&raster, settings.min_confidence)?;

    let elapsed = started.elapsed();
    debug!(regions = regions.len(), elapsed_ms = elapsed.as_millis() as u64, "Page recognized");
    Ok(PageRecognitionResult::new(page_index, regions, settings.render_zoom, elapsed))
}

/// Recognize `range` (or every page) of the document at `path`.
///
/// The document is opened here and closed on return. Pages run in
/// ascending order; `on_progress(done, total)` fires after every page,
/// including pages that failed and were left out of the result.
#[instrument(skip(path, engine, settings, on_progress), fields(path = %path.display()))]
pub fn extract_document<D: DocumentSource>(
    path: &Path,
    engine: &RecognitionEngine,
    range: Option<PageRange>,
    settings: &ExtractionSettings,
    mut on_progress: impl FnMut(usize, usize),
) -> Result<Vec<PageRecognitionResult>> {
    let doc = D::open(path)?;
    let page_count = doc.page_count();
    let pages = range.unwrap_or(PageRange::new(0, page_count)).clamp_to(page_count);
    let total = pages.len();

    let mut results = Vec::with_capacity(total);
    for (done, page_index) in pages.enumerate() {
        match extract_page(&doc, engine, page_index, settings) {
            Ok(result) => results.push(result),
            Err(err) => warn!(page_index, class = ?err.class(), error = %err, "Page skipped"),
        }
        on_progress(done + 1, total);
    }

    info!(pages = total, succeeded = results.len(), "Document recognized");
    Ok(results)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use image::DynamicImage;
    use scanlayer_core::error::ScanlayerError;
    use serde_json::{Value, json};

    use super::*;
    use crate::pdf::PdfDocument;
    use crate::pdf::fixtures::{PageSpec, build_pdf, gray_pattern};
    use crate::recognition::RecognitionBackend;

    /// Reports one "Hello" line per page; fails on the call numbered `fail_on`.
    struct Hello {
        calls: AtomicUsize,
        fail_on: Option<usize>,
    }

    impl RecognitionBackend for Hello {
        fn infer(&self, _image: &DynamicImage) -> scanlayer_core::error::Result<Value> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if Some(call) == self.fail_on {
                return Err(ScanlayerError::Recognition("model hiccup".into()));
            }
            Ok(json!([[[[10, 10], [50, 10], [50, 30], [10, 30]], ["Hello", 0.92]]]))
        }
    }

    fn engine(fail_on: Option<usize>) -> RecognitionEngine {
        RecognitionEngine::new(
            "en",
            Box::new(Hello {
                calls: AtomicUsize::new(0),
                fail_on,
            }),
        )
    }

    fn scanned(dir: &Path, pages: usize) -> std::path::PathBuf {
        let specs: Vec<PageSpec> = (0..pages).map(|_| PageSpec::scanned(gray_pattern(20, 20))).collect();
        let path = dir.join("scan.pdf");
        std::fs::write(&path, build_pdf(&specs)).unwrap();
        path
    }

    fn fast() -> ExtractionSettings {
        ExtractionSettings {
            render_zoom: 0.5,
            ..ExtractionSettings::default()
        }
        .with_preprocessing(PreprocessingFlags::none())
    }

    #[test]
    fn page_result_carries_zoom() {
        let dir = tempfile::tempdir().unwrap();
        let doc = PdfDocument::open(&scanned(dir.path(), 1)).unwrap();
        let result = extract_page(&doc, &engine(None), 0, &fast()).unwrap();
        assert_eq!(result.page_index(), 0);
        assert_eq!(result.render_zoom(), 0.5);
        assert_eq!(result.full_text(), "Hello");
    }

    #[test]
    fn preprocessing_runs_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let doc = PdfDocument::open(&scanned(dir.path(), 1)).unwrap();
        let settings = fast().with_preprocessing(PreprocessingFlags::default());
        let result = extract_page(&doc, &engine(None), 0, &settings).unwrap();
        assert_eq!(result.regions().len(), 1);
    }

    #[test]
    fn range_is_clamped_and_ordered() {
        let dir = tempfile::tempdir().unwrap();
        let path = scanned(dir.path(), 4);
        let mut progress = Vec::new();
        let results = extract_document::<PdfDocument>(
            &path,
            &engine(None),
            Some(PageRange::new(1, 99)),
            &fast(),
            |done, total| progress.push((done, total)),
        )
        .unwrap();
        let pages: Vec<usize> = results.iter().map(|r| r.page_index()).collect();
        assert_eq!(pages, vec![1, 2, 3]);
        assert_eq!(progress, vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[test]
    fn failed_pages_are_skipped_but_counted() {
        let dir = tempfile::tempdir().unwrap();
        let path = scanned(dir.path(), 3);
        let mut progress = Vec::new();
        let results =
            extract_document::<PdfDocument>(&path, &engine(Some(1)), None, &fast(), |done, total| {
                progress.push((done, total))
            })
            .unwrap();
        let pages: Vec<usize> = results.iter().map(|r| r.page_index()).collect();
        assert_eq!(pages, vec![0, 2]);
        assert_eq!(progress.len(), 3);
    }

    #[test]
    fn unopenable_document_is_an_error() {
        let err = extract_document::<PdfDocument>(Path::new("/nonexistent.pdf"), &engine(None), None, &fast(), |_, _| {})
            .unwrap_err();
        assert_ne!(err.class(), scanlayer_core::ErrorClass::PerPage);
    }
}
