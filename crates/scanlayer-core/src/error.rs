// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Scanlayer.

use thiserror::Error;

/// Top-level error type for all Scanlayer operations.
#[derive(Debug, Error)]
pub enum ScanlayerError {
    // -- Recognition engine --
    #[error("recognition engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("recognition failed: {0}")]
    Recognition(String),

    // -- Document errors --
    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("page {page} could not be rendered: {reason}")]
    Render { page: usize, reason: String },

    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("page {page} out of range (document has {page_count} pages)")]
    PageOutOfRange { page: usize, page_count: usize },

    // -- Embedding / output --
    #[error("no recognized text regions to embed")]
    NoRecognizedText,

    #[error("output verification failed: {0}")]
    OutputVerification(String),

    #[error("export failed: {0}")]
    Export(String),

    // -- Storage / persistence --
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Where an error sits in the pipeline's failure taxonomy.
///
/// Fatal and precondition errors surface to the caller as explicit failure
/// states. Per-page and per-region errors are absorbed by the pipeline and
/// only show up as a shorter result list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Missing or unloadable recognition backend. Aborts the run.
    Fatal,
    /// Render, preprocessing, or inference failure on one page.
    PerPage,
    /// One malformed recognition-output entry.
    PerRegion,
    /// Operation attempted without its inputs (e.g. embedding zero regions).
    Precondition,
    /// The write reported success but the output is missing or empty.
    Verification,
}

impl ScanlayerError {
    /// Classify this error for propagation and user reporting.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::EngineUnavailable(_) => ErrorClass::Fatal,
            Self::Recognition(_) | Self::Render { .. } | Self::ImageError(_) => {
                ErrorClass::PerPage
            }
            Self::NoRecognizedText | Self::PageOutOfRange { .. } => ErrorClass::Precondition,
            Self::OutputVerification(_) => ErrorClass::Verification,
            Self::PdfError(_)
            | Self::Export(_)
            | Self::Config(_)
            | Self::Io(_)
            | Self::Serialization(_) => ErrorClass::Fatal,
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ScanlayerError>;
