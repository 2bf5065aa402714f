// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline coordinator: owns the recognition engine binding and runs each
// recognition pass on its own named worker thread.
//
// The caller never blocks: it gets a `RunHandle` back immediately and
// follows the run through its event channel and state. Pages run strictly in
// ascending order; the cancel flag is checked only between pages.
//
// Table detection is the one synchronous operation: it renders a single page
// and shares the engine with runs, so it waits for a run in progress.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use chrono::Utc;
use scanlayer_core::error::{Result, ScanlayerError};
use scanlayer_core::human_errors::{humanize_error, summarize_run};
use scanlayer_core::{
    OutputArtifact, PageRange, PageRecognitionResult, PipelineConfig, PreprocessingFlags, RunId, RunReport, TableStructure,
};
use scanlayer_document::scan::{ExtractionSettings, extract_page, is_scanned};
use scanlayer_document::table::fill_cell_text;
use scanlayer_document::{BackendLoader, DocumentSource, PdfDocument, RecognitionEngine, detect_tables};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, error, info, instrument, warn};

use crate::confidence::analyze;
use crate::events::{CancellationFlag, RunEvent, RunState};
use crate::save::{self, SaveHandle};

/// Whether the document at `path` looks scanned. Fails open to `false`.
pub fn classify_scanned(path: &Path, sample_count: usize) -> bool {
    is_scanned::<PdfDocument>(path, sample_count)
}

/// Lock `mutex`, taking over the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Entry point for recognition and save runs.
///
/// Cheap to clone; clones share the engine binding.
#[derive(Clone)]
pub struct Coordinator {
    loader: Arc<dyn BackendLoader>,
    /// The single loaded engine. The lock is held for a whole run, which
    /// also keeps runs from sharing the model concurrently.
    engine: Arc<Mutex<Option<RecognitionEngine>>>,
    /// Language of the engine in `engine`, readable while a run holds it.
    loaded: Arc<Mutex<Option<String>>>,
    config: PipelineConfig,
}

impl Coordinator {
    pub fn new(loader: Arc<dyn BackendLoader>, config: PipelineConfig) -> Self {
        Self {
            loader,
            engine: Arc::new(Mutex::new(None)),
            loaded: Arc::new(Mutex::new(None)),
            config,
        }
    }

    /// Coordinator backed by the ocrs engine, reading models from the
    /// configured model directory.
    #[cfg(feature = "ocr")]
    pub fn with_ocrs(config: PipelineConfig) -> Self {
        let loader = scanlayer_document::OcrsLoader::new(config.model_dir.clone());
        Self::new(Arc::new(loader), config)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Language of the currently loaded engine, if any. Never waits on a
    /// running pass.
    pub fn loaded_language(&self) -> Option<String> {
        lock(&self.loaded).clone()
    }

    /// [`classify_scanned`] with the configured sample count.
    pub fn classify_scanned(&self, path: &Path) -> bool {
        classify_scanned(path, self.config.scan_sample_count)
    }

    // -- Recognition runs -----------------------------------------------------

    /// Start recognizing `page_range` (all pages when `None`) of `path`.
    ///
    /// `language` falls back to the configured one when `None`.
    pub fn run(
        &self,
        path: &Path,
        language: Option<&str>,
        page_range: Option<PageRange>,
        flags: PreprocessingFlags,
    ) -> Result<RunHandle> {
        self.run_with_cancellation(path, language, page_range, flags, CancellationFlag::new())
    }

    /// [`run`](Self::run) observing a caller-supplied cancel flag.
    #[instrument(skip(self, path, flags, cancel), fields(path = %path.display()))]
    pub fn run_with_cancellation(
        &self,
        path: &Path,
        language: Option<&str>,
        page_range: Option<PageRange>,
        flags: PreprocessingFlags,
        cancel: CancellationFlag,
    ) -> Result<RunHandle> {
        let language = language.unwrap_or(&self.config.language);
        let run_id = RunId::new();
        let state = Arc::new(Mutex::new(RunState::Idle));
        let (events_tx, events_rx) = unbounded_channel();

        let worker = RunWorker {
            run_id,
            path: path.to_path_buf(),
            language: language.to_string(),
            page_range,
            settings: ExtractionSettings::from_config(&self.config).with_preprocessing(flags),
            suspicious_threshold: self.config.suspicious_threshold,
            loader: Arc::clone(&self.loader),
            engine: Arc::clone(&self.engine),
            loaded: Arc::clone(&self.loaded),
            cancel: cancel.clone(),
            state: Arc::clone(&state),
            events: events_tx,
        };
        let thread = std::thread::Builder::new()
            .name(format!("scanlayer-run-{}", &run_id.to_string()[..8]))
            .spawn(move || worker.run())?;

        info!(%run_id, language, "Recognition run started");
        Ok(RunHandle {
            run_id,
            cancel,
            state,
            events: events_rx,
            thread: Some(thread),
        })
    }

    // -- Tables ---------------------------------------------------------------

    /// Find ruled tables on `page_index` of `path` and recognize their cell
    /// text.
    ///
    /// The page is rendered at the configured zoom and tables scoring below
    /// the configured minimum confidence are dropped. Boxes are in rendered
    /// pixel space.
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub fn detect_tables(&self, path: &Path, page_index: usize, language: Option<&str>) -> Result<Vec<TableStructure>> {
        let language = language.unwrap_or(&self.config.language);
        let doc = PdfDocument::open(path)?;
        let image = doc.render_page(page_index, self.config.render_zoom)?;
        let tables = detect_tables(&image, self.config.min_table_confidence);
        if tables.is_empty() {
            debug!("No tables above the confidence threshold");
            return Ok(tables);
        }

        let mut engine = lock(&self.engine);
        bind_engine(self.loader.as_ref(), &mut engine, &self.loaded, language)?;
        let Some(engine) = engine.as_ref() else {
            return Err(ScanlayerError::EngineUnavailable(language.to_string()));
        };
        let filled: Vec<TableStructure> = tables.iter().map(|table| fill_cell_text(engine, &image, table)).collect();
        info!(tables = filled.len(), "Tables detected");
        Ok(filled)
    }

    // -- Save runs ------------------------------------------------------------

    /// Embed `results` into a copy of `input` written to `output` on a
    /// background worker.
    pub fn embed_and_save(
        &self,
        results: Vec<PageRecognitionResult>,
        input: &Path,
        output: &Path,
        compress: bool,
    ) -> Result<SaveHandle> {
        save::spawn(results, input, output, compress, CancellationFlag::new())
    }

    /// Embed synchronously on the calling thread.
    pub fn embed_now(
        &self,
        results: &[PageRecognitionResult],
        input: &Path,
        output: &Path,
    ) -> Result<OutputArtifact> {
        save::embed_point_space(results, input, output, self.config.compress_output)
    }
}

// -- Run handle ---------------------------------------------------------------

/// The caller's side of a running recognition pass.
pub struct RunHandle {
    run_id: RunId,
    cancel: CancellationFlag,
    state: Arc<Mutex<RunState>>,
    events: UnboundedReceiver<RunEvent>,
    thread: Option<JoinHandle<()>>,
}

impl RunHandle {
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Ask the worker to stop after the page it is on.
    pub fn cancel(&self) {
        info!(run_id = %self.run_id, "Cancellation requested");
        self.cancel.cancel();
    }

    pub fn state(&self) -> RunState {
        *lock(&self.state)
    }

    /// Next event, waiting for it. `None` once the worker has finished and
    /// every event was taken. Must not be called from async code.
    pub fn blocking_next(&mut self) -> Option<RunEvent> {
        self.events.blocking_recv()
    }

    /// Next event, for async callers.
    pub async fn next(&mut self) -> Option<RunEvent> {
        self.events.recv().await
    }

    /// Collect every remaining event and wait for the worker to exit.
    pub fn wait(mut self) -> Vec<RunEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.events.blocking_recv() {
            events.push(event);
        }
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            error!(run_id = %self.run_id, "Recognition worker panicked");
        }
        events
    }
}

// -- Worker -------------------------------------------------------------------

struct RunWorker {
    run_id: RunId,
    path: PathBuf,
    language: String,
    page_range: Option<PageRange>,
    settings: ExtractionSettings,
    suspicious_threshold: f32,
    loader: Arc<dyn BackendLoader>,
    engine: Arc<Mutex<Option<RecognitionEngine>>>,
    loaded: Arc<Mutex<Option<String>>>,
    cancel: CancellationFlag,
    state: Arc<Mutex<RunState>>,
    events: UnboundedSender<RunEvent>,
}

/// How the page loop ended.
enum LoopEnd {
    Finished,
    Cancelled,
}

impl RunWorker {
    fn run(self) {
        let started_at = Utc::now();
        let span = tracing::info_span!("run", run_id = %self.run_id, language = %self.language);
        let _entered = span.enter();

        self.set_state(RunState::Initializing);
        self.emit(RunEvent::Progress {
            completed: 0,
            total: 0,
            message: format!("Loading recognition engine ({})", self.language),
        });

        let engine_slot = Arc::clone(&self.engine);
        let mut engine = lock(&engine_slot);
        if let Err(err) = self.bind_engine(&mut engine) {
            return self.fail(&err);
        }
        let Some(engine) = engine.as_ref() else {
            return self.fail(&ScanlayerError::EngineUnavailable(self.language.clone()));
        };

        let doc = match PdfDocument::open(&self.path) {
            Ok(doc) => doc,
            Err(err) => return self.fail(&err),
        };
        let pages = self
            .page_range
            .unwrap_or(PageRange::new(0, doc.page_count()))
            .clamp_to(doc.page_count());
        let total = pages.len();

        let mut results = Vec::with_capacity(total);
        let mut end = LoopEnd::Finished;
        for (position, page_index) in pages.enumerate() {
            if self.cancel.is_cancelled() {
                end = LoopEnd::Cancelled;
                break;
            }
            self.set_state(RunState::Running { page: position, total });

            match extract_page(&doc, engine, page_index, &self.settings) {
                Ok(result) => {
                    self.emit(RunEvent::PageDone {
                        page_index,
                        stats: result.statistics(),
                    });
                    results.push(result);
                }
                Err(err) => warn!(page_index, class = ?err.class(), error = %err, "Page skipped"),
            }
            self.emit(RunEvent::Progress {
                completed: position + 1,
                total,
                message: format!("Recognized page {} of {}", position + 1, total),
            });
        }
        drop(doc);

        let report = RunReport {
            run_id: self.run_id,
            language: self.language.clone(),
            started_at,
            finished_at: Utc::now(),
            pages_requested: total,
            pages_succeeded: results.len(),
        };
        match end {
            LoopEnd::Cancelled => {
                info!(pages_succeeded = report.pages_succeeded, "Run cancelled");
                self.set_state(RunState::Cancelled);
                self.emit(RunEvent::Cancelled { results, report });
            }
            LoopEnd::Finished => {
                info!(summary = %summarize_run(results.len(), total, None), "Run completed");
                let statistics = analyze(&results, self.suspicious_threshold);
                self.set_state(RunState::Completed);
                self.emit(RunEvent::Done {
                    results,
                    statistics,
                    report,
                });
            }
        }
    }

    fn bind_engine(&self, slot: &mut Option<RecognitionEngine>) -> Result<()> {
        bind_engine(self.loader.as_ref(), slot, &self.loaded, &self.language)
    }

    fn fail(&self, err: &ScanlayerError) {
        let human = humanize_error(err);
        error!(error = %err, class = ?human.class, severity = ?human.severity, "Run failed");
        self.set_state(RunState::Failed);
        self.emit(RunEvent::Failed {
            reason: summarize_run(0, 0, Some(err)),
            suggestion: human.suggestion,
            severity: human.severity,
            class: human.class,
        });
    }

    fn set_state(&self, state: RunState) {
        *lock(&self.state) = state;
    }

    fn emit(&self, event: RunEvent) {
        if self.events.send(event).is_err() {
            debug!("Run handle dropped; event discarded");
        }
    }
}

/// Reuse the engine in `slot` when its language matches, else load anew.
/// `loaded` mirrors the language of whatever `slot` holds.
fn bind_engine(
    loader: &dyn BackendLoader,
    slot: &mut Option<RecognitionEngine>,
    loaded: &Mutex<Option<String>>,
    language: &str,
) -> Result<()> {
    if slot.as_ref().is_some_and(|engine| engine.language() == language) {
        debug!("Reusing loaded recognition engine");
        return Ok(());
    }
    // Drop the old model before loading the next one.
    *slot = None;
    *lock(loaded) = None;
    *slot = Some(RecognitionEngine::load(loader, language)?);
    *lock(loaded) = Some(language.to_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use image::DynamicImage;
    use scanlayer_document::RecognitionBackend;
    use serde_json::{Value, json};

    use super::*;

    struct Silent;

    impl RecognitionBackend for Silent {
        fn infer(&self, _image: &DynamicImage) -> Result<Value> {
            Ok(json!([]))
        }
    }

    /// Counts loads; refuses the language "xx".
    #[derive(Default)]
    struct CountingLoader {
        loads: Mutex<Vec<String>>,
    }

    impl BackendLoader for CountingLoader {
        fn load(&self, language: &str) -> Result<Box<dyn RecognitionBackend>> {
            lock(&self.loads).push(language.to_string());
            if language == "xx" {
                return Err(ScanlayerError::EngineUnavailable("no models for xx".into()));
            }
            Ok(Box::new(Silent))
        }
    }

    fn worker(loader: Arc<CountingLoader>, language: &str) -> RunWorker {
        let (events, _rx) = unbounded_channel();
        RunWorker {
            run_id: RunId::new(),
            path: PathBuf::from("/unused.pdf"),
            language: language.to_string(),
            page_range: None,
            settings: ExtractionSettings::default(),
            suspicious_threshold: 0.75,
            loader,
            engine: Arc::new(Mutex::new(None)),
            loaded: Arc::new(Mutex::new(None)),
            cancel: CancellationFlag::new(),
            state: Arc::new(Mutex::new(RunState::Idle)),
            events,
        }
    }

    #[test]
    fn engine_is_reused_until_language_changes() {
        let loader = Arc::new(CountingLoader::default());
        let mut slot = None;
        worker(Arc::clone(&loader), "en").bind_engine(&mut slot).unwrap();
        worker(Arc::clone(&loader), "en").bind_engine(&mut slot).unwrap();
        worker(Arc::clone(&loader), "de").bind_engine(&mut slot).unwrap();
        assert_eq!(*lock(&loader.loads), vec!["en", "de"]);
        assert_eq!(slot.as_ref().map(RecognitionEngine::language), Some("de"));
    }

    #[test]
    fn failed_load_leaves_no_engine() {
        let loader = Arc::new(CountingLoader::default());
        let mut slot = None;
        worker(Arc::clone(&loader), "en").bind_engine(&mut slot).unwrap();
        let failing = worker(loader, "xx");
        let err = failing.bind_engine(&mut slot).unwrap_err();
        assert!(matches!(err, ScanlayerError::EngineUnavailable(_)));
        assert!(slot.is_none());
        assert!(lock(&failing.loaded).is_none());
    }

    #[test]
    fn loaded_language_is_readable_while_the_engine_is_held() {
        let loader = Arc::new(CountingLoader::default());
        let coordinator = Coordinator::new(Arc::clone(&loader) as Arc<dyn BackendLoader>, PipelineConfig::default());
        assert_eq!(coordinator.loaded_language(), None);

        let mut slot = lock(&coordinator.engine);
        bind_engine(loader.as_ref(), &mut slot, &coordinator.loaded, "de").unwrap();
        assert_eq!(coordinator.loaded_language().as_deref(), Some("de"));
        drop(slot);
    }

    #[test]
    fn run_defaults_to_the_configured_language() {
        let loader = Arc::new(CountingLoader::default());
        let config = PipelineConfig {
            language: "de".into(),
            ..PipelineConfig::default()
        };
        let coordinator = Coordinator::new(Arc::clone(&loader) as Arc<dyn BackendLoader>, config);
        let events = coordinator
            .run(Path::new("/unused.pdf"), None, None, PreprocessingFlags::none())
            .unwrap()
            .wait();
        assert!(matches!(events.last(), Some(RunEvent::Failed { .. })));
        assert_eq!(*lock(&loader.loads), vec!["de"]);
        assert_eq!(coordinator.loaded_language().as_deref(), Some("de"));
    }

    #[test]
    fn engine_failure_fails_the_run() {
        let loader = Arc::new(CountingLoader::default());
        let coordinator = Coordinator::new(loader, PipelineConfig::default());
        let handle = coordinator
            .run(Path::new("/unused.pdf"), Some("xx"), None, PreprocessingFlags::none())
            .unwrap();
        let events = handle.wait();
        match events.last() {
            Some(RunEvent::Failed {
                reason,
                suggestion,
                severity,
                class,
            }) => {
                assert_eq!(reason, "Recognition failed: Text recognition could not start.");
                assert!(suggestion.contains("no models for xx"));
                assert_eq!(*severity, scanlayer_core::human_errors::Severity::Permanent);
                assert_eq!(*class, scanlayer_core::ErrorClass::Fatal);
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(!events.iter().any(|e| matches!(e, RunEvent::PageDone { .. })));
    }
}
