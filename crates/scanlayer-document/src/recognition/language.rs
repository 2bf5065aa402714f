// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Best-effort script detection for regions recognized in "auto" mode.

use std::ops::RangeInclusive;

/// Language tag used when no listed script is found.
pub const LATIN: &str = "en";

/// Checked in order; the first script with any character in the text wins.
const SCRIPTS: &[(&str, &[RangeInclusive<u32>])] = &[
    ("zh_sim", &[0x4E00..=0x9FFF, 0x3400..=0x4DBF]),
    ("ar", &[0x0600..=0x06FF, 0x0750..=0x077F]),
    ("hi", &[0x0900..=0x097F]),
    ("bn", &[0x0980..=0x09FF]),
    ("ja", &[0x3040..=0x309F, 0x30A0..=0x30FF]),
    ("ko", &[0xAC00..=0xD7AF, 0x1100..=0x11FF]),
];

/// Classify `text` by Unicode block.
pub fn detect_language(text: &str) -> &'static str {
    SCRIPTS
        .iter()
        .find(|(_, ranges)| {
            text.chars()
                .any(|c| ranges.iter().any(|range| range.contains(&u32::from(c))))
        })
        .map_or(LATIN, |(tag, _)| *tag)
}
