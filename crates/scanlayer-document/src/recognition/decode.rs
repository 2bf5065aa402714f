// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Decoder for raw recognizer output.
//
// Accepted shapes, per line entry:
//
//   [polygon, [text, confidence]]
//   [polygon, text]                 confidence 1.0
//   [polygon, text, confidence]
//
// The top level is a list of entries, or a list of lists of entries (nested
// once). Anything else is skipped without failing the batch.

use scanlayer_core::{BBox, ErrorClass};
use serde_json::Value;
use tracing::debug;

/// A line the recognizer reported, before confidence filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedLine {
    pub text: String,
    pub confidence: f32,
    pub bbox: BBox,
}

/// What one element of the raw output turned out to be.
#[derive(Debug)]
enum RawEntry<'a> {
    Line {
        polygon: &'a Value,
        text: &'a str,
        confidence: Option<&'a Value>,
    },
    Group(&'a [Value]),
    Unrecognized(&'static str),
}

fn classify(value: &Value) -> RawEntry<'_> {
    let Some(items) = value.as_array() else {
        return RawEntry::Unrecognized("entry is not a list");
    };
    match items.as_slice() {
        [polygon @ Value::Array(_), Value::String(text)] => RawEntry::Line {
            polygon,
            text,
            confidence: None,
        },
        [polygon @ Value::Array(_), Value::String(text), confidence] => RawEntry::Line {
            polygon,
            text,
            confidence: Some(confidence),
        },
        [polygon @ Value::Array(_), Value::Array(pair)] => match pair.as_slice() {
            [Value::String(text), confidence] => RawEntry::Line {
                polygon,
                text,
                confidence: Some(confidence),
            },
            [Value::String(text)] => RawEntry::Line {
                polygon,
                text,
                confidence: None,
            },
            _ => RawEntry::Group(items),
        },
        _ if items.iter().all(Value::is_array) && !items.is_empty() => RawEntry::Group(items),
        _ => RawEntry::Unrecognized("unknown entry shape"),
    }
}

/// Decode everything usable out of `raw`.
pub fn decode(raw: &Value) -> Vec<DecodedLine> {
    let Some(entries) = raw.as_array() else {
        debug!(class = ?ErrorClass::PerRegion, "Recognizer output is not a list");
        return Vec::new();
    };

    let mut lines = Vec::new();
    for entry in entries {
        match classify(entry) {
            RawEntry::Group(members) => {
                // Only one level of nesting is flattened.
                for member in members {
                    match classify(member) {
                        RawEntry::Line {
                            polygon,
                            text,
                            confidence,
                        } => lines.extend(decode_line(polygon, text, confidence)),
                        RawEntry::Group(_) => skip("nested deeper than one level"),
                        RawEntry::Unrecognized(reason) => skip(reason),
                    }
                }
            }
            RawEntry::Line {
                polygon,
                text,
                confidence,
            } => lines.extend(decode_line(polygon, text, confidence)),
            RawEntry::Unrecognized(reason) => skip(reason),
        }
    }
    lines
}

fn skip(reason: &str) {
    debug!(class = ?ErrorClass::PerRegion, reason, "Skipped recognizer entry");
}

fn decode_line(polygon: &Value, text: &str, confidence: Option<&Value>) -> Option<DecodedLine> {
    let text = text.trim();
    if text.is_empty() {
        skip("empty text");
        return None;
    }
    let confidence = match confidence {
        None => 1.0,
        Some(value) => match value.as_f64().filter(|c| c.is_finite()) {
            Some(c) => c.clamp(0.0, 1.0) as f32,
            None => {
                skip("confidence is not a finite number");
                return None;
            }
        },
    };
    Some(DecodedLine {
        text: text.to_string(),
        confidence,
        bbox: polygon_bounds(polygon).unwrap_or(BBox::UNIT),
    })
}

/// Axis-aligned bounds of `[[x, y], ...]`, any number of points.
fn polygon_bounds(polygon: &Value) -> Option<BBox> {
    let points = polygon.as_array()?;
    let mut bounds: Option<BBox> = None;
    for point in points {
        let [x, y] = point.as_array()?.as_slice() else {
            return None;
        };
        let (x, y) = (x.as_f64()? as f32, y.as_f64()? as f32);
        let here = BBox::new(x, y, x, y);
        bounds = Some(bounds.map_or(here, |b| b.union(&here)));
    }
    bounds
}
