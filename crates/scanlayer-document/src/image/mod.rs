// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image module: page raster preprocessing (deskew, despeckle, enhance,
// background suppression, orientation) and the filters behind it.

pub mod filter;
pub mod geometry;
pub mod preprocess;
pub mod threshold;

pub use preprocess::{auto_rotate, deskew, despeckle, enhance, preprocess, suppress_background};
