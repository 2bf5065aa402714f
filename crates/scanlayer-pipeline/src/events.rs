// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Run states, worker events, and cooperative cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use scanlayer_core::human_errors::Severity;
use scanlayer_core::{
    DocumentRecognitionStatistics, ErrorClass, OutputArtifact, PageRecognitionResult, PageStatistics, RunReport,
};

/// Shared cancel request. Workers check it only between units of work, so
/// whatever is in flight still finishes.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Lifecycle of a recognition run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Idle,
    /// Loading (or reusing) the recognition engine.
    Initializing,
    /// Working on `page` (0-based position in the run) of `total`.
    Running { page: usize, total: usize },
    Completed,
    Cancelled,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

/// Events from a recognition worker, in emission order.
#[derive(Debug, Clone)]
pub enum RunEvent {
    Progress {
        completed: usize,
        total: usize,
        message: String,
    },
    PageDone {
        page_index: usize,
        stats: PageStatistics,
    },
    Done {
        results: Vec<PageRecognitionResult>,
        statistics: DocumentRecognitionStatistics,
        report: RunReport,
    },
    /// Results collected before the cancel request was seen.
    Cancelled {
        results: Vec<PageRecognitionResult>,
        report: RunReport,
    },
    /// The run could not start or could not open its document. `reason`
    /// is the one-line summary, `suggestion` what the user can try.
    Failed {
        reason: String,
        suggestion: String,
        severity: Severity,
        class: ErrorClass,
    },
}

impl RunEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Cancelled { .. } | Self::Failed { .. })
    }
}

/// Events from a save worker.
#[derive(Debug, Clone)]
pub enum SaveEvent {
    Progress {
        completed: usize,
        total: usize,
        message: String,
    },
    /// The embed outcome: the written artifact, or why nothing usable was
    /// written.
    Done {
        outcome: Result<OutputArtifact, String>,
    },
    Cancelled,
}

impl SaveEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Cancelled)
    }
}
