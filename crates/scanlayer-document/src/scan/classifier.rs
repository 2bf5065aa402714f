// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan classifier: decides whether a document is image-only and needs
// recognition before it can be searched.

use std::path::Path;

use scanlayer_core::error::Result;
use tracing::{debug, info, instrument, warn};

use crate::pdf::source::DocumentSource;

/// Pages sampled when the caller has no preference.
pub const DEFAULT_SAMPLE_COUNT: usize = 5;
/// Trimmed length above which a native text block counts as meaningful.
const MEANINGFUL_BLOCK_LEN: usize = 10;
/// Fraction of sampled pages that must look scanned.
const SCANNED_RATIO: f64 = 0.6;
/// Score at which a page counts as a scanned indicator.
const INDICATOR_SCORE: u8 = 2;

/// What the classifier looks at on one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSignals {
    /// Characters of the page's native text, trimmed at both ends.
    pub text_len: usize,
    pub has_images: bool,
    /// Native text blocks longer than ten characters after trimming.
    pub meaningful_blocks: usize,
}

impl PageSignals {
    /// Gather signals from page `page_index` of `doc`.
    pub fn read<D: DocumentSource>(doc: &D, page_index: usize) -> Result<Self> {
        let text_len = doc.native_text(page_index)?.trim().chars().count();
        let blocks = doc.native_text_blocks(page_index)?;
        let meaningful_blocks = blocks
            .iter()
            .filter(|b| b.text.trim().chars().count() > MEANINGFUL_BLOCK_LEN)
            .count();
        let has_images = !doc.embedded_images(page_index)?.is_empty();
        Ok(Self {
            text_len,
            has_images,
            meaningful_blocks,
        })
    }
}

/// Scanned-ness score of one page, 0..=3.
///
/// Substantial native text (over 200 characters with a meaningful block)
/// always scores 0.
pub fn score_page(signals: &PageSignals) -> u8 {
    if signals.text_len > 200 && signals.meaningful_blocks >= 1 {
        return 0;
    }
    let mut score = 0;
    if signals.text_len < 100 {
        score += 1;
    }
    if signals.has_images && signals.meaningful_blocks < 2 {
        score += 1;
    }
    if signals.text_len < 20 && signals.has_images {
        score += 1;
    }
    score
}

/// Scanned when more than 60% of the sampled pages are indicators.
pub fn classify(pages: &[PageSignals]) -> bool {
    if pages.is_empty() {
        return false;
    }
    let indicators = pages.iter().filter(|p| score_page(p) >= INDICATOR_SCORE).count();
    indicators as f64 / pages.len() as f64 > SCANNED_RATIO
}

/// Evenly spaced page indices, at most `sample_count` of them.
pub fn sample_pages(page_count: usize, sample_count: usize) -> Vec<usize> {
    let k = sample_count.min(page_count);
    (0..k).map(|i| i * page_count / k).collect()
}

/// Whether the document at `path` looks scanned.
///
/// Never fails: a document that cannot be opened or read is reported as not
/// scanned, with a warning.
#[instrument(skip_all, fields(path = %path.display(), sample_count = sample_count))]
pub fn is_scanned<D: DocumentSource>(path: &Path, sample_count: usize) -> bool {
    match sample_signals::<D>(path, sample_count) {
        Ok(signals) => {
            let scanned = classify(&signals);
            info!(sampled = signals.len(), scanned, "Scan classification");
            scanned
        }
        Err(err) => {
            warn!(error = %err, "Scan classification failed; treating document as not scanned");
            false
        }
    }
}

fn sample_signals<D: DocumentSource>(path: &Path, sample_count: usize) -> Result<Vec<PageSignals>> {
    let doc = D::open(path)?;
    sample_pages(doc.page_count(), sample_count)
        .into_iter()
        .map(|page_index| {
            let signals = PageSignals::read(&doc, page_index)?;
            debug!(page_index, ?signals, score = score_page(&signals), "Sampled page");
            Ok(signals)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use scanlayer_core::error::ScanlayerError;

    use super::*;
    use crate::pdf::PdfDocument;
    use crate::pdf::fixtures::{PageSpec, build_pdf, gray_pattern};
    use crate::pdf::source::{ImageDescriptor, TextBlock};

    const IMAGE_ONLY: PageSignals = PageSignals {
        text_len: 5,
        has_images: true,
        meaningful_blocks: 0,
    };
    const TEXT_HEAVY: PageSignals = PageSignals {
        text_len: 450,
        has_images: true,
        meaningful_blocks: 3,
    };

    #[test]
    fn scores_each_signal() {
        assert_eq!(score_page(&IMAGE_ONLY), 3);
        assert_eq!(score_page(&TEXT_HEAVY), 0);
        let short_text_no_images = PageSignals {
            text_len: 50,
            has_images: false,
            meaningful_blocks: 1,
        };
        assert_eq!(score_page(&short_text_no_images), 1);
        let captioned_image = PageSignals {
            text_len: 150,
            has_images: true,
            meaningful_blocks: 1,
        };
        assert_eq!(score_page(&captioned_image), 1);
    }

    #[test]
    fn two_of_five_scanned_is_not_enough() {
        let pages = [IMAGE_ONLY, IMAGE_ONLY, TEXT_HEAVY, TEXT_HEAVY, TEXT_HEAVY];
        assert!(!classify(&pages));
    }

    #[test]
    fn ratio_must_exceed_threshold() {
        // 3/5 = 0.6 is not above 0.6.
        assert!(!classify(&[IMAGE_ONLY, IMAGE_ONLY, IMAGE_ONLY, TEXT_HEAVY, TEXT_HEAVY]));
        assert!(classify(&[IMAGE_ONLY, IMAGE_ONLY, IMAGE_ONLY, IMAGE_ONLY, TEXT_HEAVY]));
        assert!(!classify(&[]));
    }

    #[test]
    fn samples_spread_across_document() {
        assert_eq!(sample_pages(10, 5), vec![0, 2, 4, 6, 8]);
        assert_eq!(sample_pages(3, 5), vec![0, 1, 2]);
        assert_eq!(sample_pages(7, 3), vec![0, 2, 4]);
        assert!(sample_pages(0, 5).is_empty());
    }

    /// One page of fixed native text blocks and no images.
    struct TextOnly(Vec<&'static str>);

    impl DocumentSource for TextOnly {
        fn open(_path: &Path) -> Result<Self> {
            Err(ScanlayerError::PdfError("in-memory only".into()))
        }

        fn page_count(&self) -> usize {
            1
        }

        fn render_page(&self, _page_index: usize, _zoom: f32) -> Result<image::DynamicImage> {
            Err(ScanlayerError::PdfError("not renderable".into()))
        }

        fn native_text_blocks(&self, _page_index: usize) -> Result<Vec<TextBlock>> {
            Ok(self
                .0
                .iter()
                .map(|text| TextBlock {
                    bbox: scanlayer_core::BBox::new(0.0, 0.0, 10.0, 10.0),
                    text: text.to_string(),
                })
                .collect())
        }

        fn embedded_images(&self, _page_index: usize) -> Result<Vec<ImageDescriptor>> {
            Ok(Vec::new())
        }

        fn save(&mut self, _path: &Path, _compress: bool) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn text_length_counts_the_joined_page_text() {
        let doc = TextOnly(vec!["  two words  ", "", " and more "]);
        let signals = PageSignals::read(&doc, 0).unwrap();
        // "two words  \n\n and more" keeps inner spacing and separators.
        assert_eq!(signals.text_len, "two words  \n\n and more".chars().count());
        assert_eq!(signals.meaningful_blocks, 0);
        assert!(!signals.has_images);
    }

    #[test]
    fn classifies_real_documents() {
        let dir = tempfile::tempdir().unwrap();
        let scanned = dir.path().join("scanned.pdf");
        let pages: Vec<PageSpec> = (0..3).map(|_| PageSpec::scanned(gray_pattern(40, 40))).collect();
        std::fs::write(&scanned, build_pdf(&pages)).unwrap();
        assert!(is_scanned::<PdfDocument>(&scanned, DEFAULT_SAMPLE_COUNT));

        let born_digital = dir.path().join("digital.pdf");
        let long_line = "This page was typeset and carries plenty of native text. ".repeat(5);
        let pages: Vec<PageSpec> = (0..3).map(|_| PageSpec::text(&long_line)).collect();
        std::fs::write(&born_digital, build_pdf(&pages)).unwrap();
        assert!(!is_scanned::<PdfDocument>(&born_digital, DEFAULT_SAMPLE_COUNT));
    }

    #[test]
    fn unreadable_documents_fail_open() {
        let dir = tempfile::tempdir().unwrap();
        let garbage = dir.path().join("garbage.pdf");
        std::fs::write(&garbage, b"not a pdf").unwrap();
        assert!(!is_scanned::<PdfDocument>(&garbage, DEFAULT_SAMPLE_COUNT));
        assert!(!is_scanned::<PdfDocument>(&dir.path().join("missing.pdf"), DEFAULT_SAMPLE_COUNT));
    }
}
