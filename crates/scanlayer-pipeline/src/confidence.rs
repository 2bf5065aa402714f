// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Confidence analyzer: document-level statistics over page results.

use scanlayer_core::{DocumentRecognitionStatistics, PageRecognitionResult, SuspiciousRegion};
use tracing::{debug, instrument};

/// Aggregate `results`. Regions scoring below `threshold` are listed as
/// suspicious with their page and box.
///
/// Pure: the same input always yields an identical value.
#[instrument(skip(results), fields(pages = results.len()))]
pub fn analyze(results: &[PageRecognitionResult], threshold: f32) -> DocumentRecognitionStatistics {
    let total_words = results.iter().map(PageRecognitionResult::word_count).sum();

    let mut confidence_sum = 0.0f64;
    let mut region_count = 0usize;
    let mut suspicious_regions = Vec::new();
    for page in results {
        for region in page.regions() {
            confidence_sum += f64::from(region.confidence());
            region_count += 1;
            if region.confidence() < threshold {
                suspicious_regions.push(SuspiciousRegion {
                    page_index: page.page_index(),
                    text: region.text().to_string(),
                    confidence: region.confidence(),
                    bbox: region.bbox(),
                });
            }
        }
    }
    let average_confidence = if region_count == 0 {
        0.0
    } else {
        (confidence_sum / region_count as f64) as f32
    };

    debug!(total_words, region_count, suspicious = suspicious_regions.len(), "Statistics computed");
    DocumentRecognitionStatistics {
        total_words,
        average_confidence,
        suspicious_regions,
        pages_processed: results.len(),
    }
}
