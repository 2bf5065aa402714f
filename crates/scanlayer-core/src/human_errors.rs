// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable outcome messages.
//
// Every technical error is mapped to plain English with a clear suggestion,
// and every finished run gets a one-line summary that says which class of
// outcome occurred so the caller can retry, keep partial results, or abort.

use crate::error::{ErrorClass, ScanlayerError};

/// Severity of an outcome from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Retrying may help (busy disk, flaky page render).
    Transient,
    /// The user must do something first (pick pages with text, fix a path).
    ActionRequired,
    /// Retrying will not help (damaged file, missing model).
    Permanent,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether trying the same operation again is reasonable.
    pub retriable: bool,
    pub severity: Severity,
    /// Taxonomy class of the underlying error.
    pub class: ErrorClass,
}

/// Convert a `ScanlayerError` into a `HumanError`.
pub fn humanize_error(err: &ScanlayerError) -> HumanError {
    let class = err.class();
    let (message, suggestion, retriable, severity) = match err {
        // -- Recognition --
        ScanlayerError::EngineUnavailable(detail) => (
            "Text recognition could not start.".to_string(),
            format!("Check that the recognition model files are installed for this language. ({detail})"),
            false,
            Severity::Permanent,
        ),

        ScanlayerError::Recognition(_) => (
            "Text recognition didn't work on this page.".into(),
            "Try scanning the page again with better lighting, making sure the text is clear and in focus.".into(),
            true,
            Severity::Transient,
        ),

        // -- Document --
        ScanlayerError::PdfError(_) => (
            "There's a problem with this PDF file.".into(),
            "The file may be damaged. Try opening it in another viewer to check it works, or try a different file.".into(),
            false,
            Severity::Permanent,
        ),

        ScanlayerError::Render { page, .. } => (
            format!("Page {} could not be turned into an image.", page + 1),
            "This page was skipped. The rest of the document was still processed.".into(),
            true,
            Severity::Transient,
        ),

        ScanlayerError::ImageError(_) => (
            "There's a problem with a scanned image.".into(),
            "The image may be damaged or in an unusual format. Try rescanning the page.".into(),
            false,
            Severity::Permanent,
        ),

        ScanlayerError::PageOutOfRange { page_count, .. } => (
            "That page doesn't exist in this document.".into(),
            format!("Choose a page between 1 and {page_count}."),
            false,
            Severity::ActionRequired,
        ),

        // -- Output --
        ScanlayerError::NoRecognizedText => (
            "No text was recognized, so there is nothing to add to the PDF.".into(),
            "Run text recognition first, or check that the document contains readable text.".into(),
            false,
            Severity::ActionRequired,
        ),

        ScanlayerError::OutputVerification(_) => (
            "The searchable PDF was not saved correctly.".into(),
            "Check there is free space on the disk and that you can write to the chosen folder, then save again.".into(),
            true,
            Severity::Transient,
        ),

        ScanlayerError::Export(detail) => (
            "The export could not be written.".into(),
            format!("Try a different file name or folder. ({detail})"),
            true,
            Severity::Transient,
        ),

        ScanlayerError::Config(detail) => (
            "The settings file has a problem.".into(),
            format!("Fix or delete the settings file to go back to defaults. ({detail})"),
            false,
            Severity::ActionRequired,
        ),

        ScanlayerError::Io(io_err) => match io_err.kind() {
            std::io::ErrorKind::NotFound => (
                "The file couldn't be found.".into(),
                "It may have been moved or deleted. Try choosing the file again.".into(),
                false,
                Severity::ActionRequired,
            ),
            std::io::ErrorKind::PermissionDenied => (
                "There is no permission to use that file.".into(),
                "Check the file permissions, or try copying the file to a different location first.".into(),
                false,
                Severity::ActionRequired,
            ),
            _ => (
                "There was a problem reading or writing a file.".into(),
                "Try again. If this keeps happening, the disk may be full.".into(),
                true,
                Severity::Transient,
            ),
        },

        ScanlayerError::Serialization(_) => (
            "Some saved data could not be read.".into(),
            "Try again. If this keeps happening, please report it.".into(),
            true,
            Severity::Transient,
        ),
    };

    HumanError {
        message,
        suggestion,
        retriable,
        severity,
        class,
    }
}

/// One-line summary of a finished recognition run.
///
/// A fatal error always wins. Otherwise the summary states how many of the
/// requested pages produced a result.
pub fn summarize_run(succeeded: usize, requested: usize, fatal: Option<&ScanlayerError>) -> String {
    if let Some(err) = fatal {
        return format!("Recognition failed: {}", humanize_error(err).message);
    }
    if succeeded == requested {
        format!("Completed: all {requested} pages processed.")
    } else {
        format!("Completed with {succeeded}/{requested} pages successfully processed.")
    }
}
