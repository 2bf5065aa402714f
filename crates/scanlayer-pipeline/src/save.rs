// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Save worker: embeds recognized text into a fresh copy of the input on a
// background thread, with the same progress and cancel contract as
// recognition runs.

use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

use scanlayer_core::error::Result;
use scanlayer_core::{OutputArtifact, PageRecognitionResult};
use scanlayer_document::pdf::embed;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, error, info, instrument, warn};

use crate::events::{CancellationFlag, SaveEvent};

const STAGES: usize = 2;

/// Rescale every result to document points, then embed.
///
/// The embedder opens `input` itself, so no caller-held handle is touched.
pub(crate) fn embed_point_space(
    results: &[PageRecognitionResult],
    input: &Path,
    output: &Path,
    compress: bool,
) -> Result<OutputArtifact> {
    let point_space: Vec<PageRecognitionResult> = results.iter().map(PageRecognitionResult::to_point_space).collect();
    embed(&point_space, input, output, compress)
}

/// Start a save worker.
#[instrument(skip_all, fields(input = %input.display(), output = %output.display(), pages = results.len(), compress = compress))]
pub fn spawn(
    results: Vec<PageRecognitionResult>,
    input: &Path,
    output: &Path,
    compress: bool,
    cancel: CancellationFlag,
) -> Result<SaveHandle> {
    let (events_tx, events_rx) = unbounded_channel();
    let worker = SaveWorker {
        results,
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        compress,
        cancel: cancel.clone(),
        events: events_tx,
    };
    let thread = std::thread::Builder::new()
        .name("scanlayer-save".into())
        .spawn(move || worker.run())?;
    Ok(SaveHandle {
        cancel,
        events: events_rx,
        thread: Some(thread),
    })
}

/// The caller's side of a save run.
pub struct SaveHandle {
    cancel: CancellationFlag,
    events: UnboundedReceiver<SaveEvent>,
    thread: Option<JoinHandle<()>>,
}

impl SaveHandle {
    /// Ask the worker to stop before its next stage. A write in progress
    /// always completes.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn blocking_next(&mut self) -> Option<SaveEvent> {
        self.events.blocking_recv()
    }

    pub async fn next(&mut self) -> Option<SaveEvent> {
        self.events.recv().await
    }

    /// Collect every remaining event and wait for the worker to exit.
    pub fn wait(mut self) -> Vec<SaveEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.events.blocking_recv() {
            events.push(event);
        }
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            error!("Save worker panicked");
        }
        events
    }
}

struct SaveWorker {
    results: Vec<PageRecognitionResult>,
    input: PathBuf,
    output: PathBuf,
    compress: bool,
    cancel: CancellationFlag,
    events: UnboundedSender<SaveEvent>,
}

impl SaveWorker {
    fn run(self) {
        if self.cancelled() {
            return;
        }
        self.progress(0, format!("Rescaling {} pages to document space", self.results.len()));
        let point_space: Vec<PageRecognitionResult> =
            self.results.iter().map(PageRecognitionResult::to_point_space).collect();

        if self.cancelled() {
            return;
        }
        self.progress(1, "Embedding text layer".into());
        let outcome = embed(&point_space, &self.input, &self.output, self.compress);

        match &outcome {
            Ok(artifact) => {
                info!(path = %artifact.path.display(), size_bytes = artifact.size_bytes, "Saved");
                self.progress(STAGES, "Saved".into());
            }
            Err(err) => warn!(error = %err, class = ?err.class(), "Save failed"),
        }
        self.emit(SaveEvent::Done {
            outcome: outcome.map_err(|err| err.to_string()),
        });
    }

    /// Emit `Cancelled` and report true when a cancel was requested.
    fn cancelled(&self) -> bool {
        if !self.cancel.is_cancelled() {
            return false;
        }
        info!("Save cancelled");
        self.emit(SaveEvent::Cancelled);
        true
    }

    fn progress(&self, completed: usize, message: String) {
        self.emit(SaveEvent::Progress {
            completed,
            total: STAGES,
            message,
        });
    }

    fn emit(&self, event: SaveEvent) {
        if self.events.send(event).is_err() {
            debug!("Save handle dropped; event discarded");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn nothing_to_embed_is_reported_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.pdf");
        let empty = vec![PageRecognitionResult::new(0, Vec::new(), 2.0, Duration::ZERO)];
        let handle = spawn(empty, Path::new("/missing/in.pdf"), &output, true, CancellationFlag::new()).unwrap();

        let events = handle.wait();
        match events.last() {
            Some(SaveEvent::Done { outcome: Err(reason) }) => assert!(reason.contains("no recognized text")),
            other => panic!("expected a failed outcome, got {other:?}"),
        }
        assert!(!output.exists());
    }

    #[test]
    fn cancelled_before_start_does_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.pdf");
        let cancel = CancellationFlag::new();
        cancel.cancel();
        let handle = spawn(Vec::new(), Path::new("/missing/in.pdf"), &output, true, cancel).unwrap();
        let events = handle.wait();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], SaveEvent::Cancelled));
        assert!(!output.exists());
    }
}
