// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content-stream interpretation: transformation matrices, operand helpers,
// string decoding, and native text-block extraction.
//
// Only what the scan classifier and the round-trip checks need is modelled.
// Glyph widths are estimated from the font size rather than read from font
// metrics.

use lopdf::Object;
use lopdf::content::Operation;
use scanlayer_core::BBox;

use super::source::TextBlock;

/// Average Helvetica advance as a fraction of the font size.
const AVERAGE_GLYPH_WIDTH: f32 = 0.5;
/// A `TJ` adjustment more negative than this (thousandths of an em) is
/// treated as a word gap.
const TJ_SPACE_THRESHOLD: f32 = -200.0;

// -- Matrices -------------------------------------------------------------------

/// PDF affine matrix `[a b c d e f]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn translation(tx: f32, ty: f32) -> Self {
        Self {
            e: tx,
            f: ty,
            ..Self::IDENTITY
        }
    }

    /// Build from six numeric operands, as used by `cm` and `Tm`.
    pub fn from_operands(operands: &[Object]) -> Option<Self> {
        if operands.len() < 6 {
            return None;
        }
        Some(Self {
            a: number(&operands[0])?,
            b: number(&operands[1])?,
            c: number(&operands[2])?,
            d: number(&operands[3])?,
            e: number(&operands[4])?,
            f: number(&operands[5])?,
        })
    }

    /// `self × other`: apply `self` first, then `other`.
    pub fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Axis-aligned bounds of the unit square under this matrix.
    pub fn unit_square_bounds(&self) -> (f32, f32, f32, f32) {
        let corners = [
            self.apply(0.0, 0.0),
            self.apply(1.0, 0.0),
            self.apply(0.0, 1.0),
            self.apply(1.0, 1.0),
        ];
        corners.iter().fold(
            (f32::MAX, f32::MAX, f32::MIN, f32::MIN),
            |(x1, y1, x2, y2), &(x, y)| (x1.min(x), y1.min(y), x2.max(x), y2.max(y)),
        )
    }

    fn vertical_scale(&self) -> f32 {
        (self.b * self.b + self.d * self.d).sqrt()
    }

    fn horizontal_scale(&self) -> f32 {
        (self.a * self.a + self.c * self.c).sqrt()
    }
}

// -- Operand helpers --------------------------------------------------------------

/// Numeric value of an integer or real operand.
pub fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Decode a PDF string operand: UTF-16BE when it starts with a byte-order
/// mark, otherwise one byte per character.
pub fn decode_pdf_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&b| b as char).collect()
}

// -- Text blocks ------------------------------------------------------------------

#[derive(Default)]
struct BlockBuilder {
    text: String,
    bounds: Option<(f32, f32, f32, f32)>,
    pending_space: bool,
}

impl BlockBuilder {
    fn push(&mut self, fragment: &str, bounds: (f32, f32, f32, f32)) {
        if fragment.is_empty() {
            return;
        }
        if self.pending_space && !self.text.is_empty() && !self.text.ends_with(' ') {
            self.text.push(' ');
        }
        self.pending_space = false;
        self.text.push_str(fragment);
        self.bounds = Some(match self.bounds {
            None => bounds,
            Some((x1, y1, x2, y2)) => (
                x1.min(bounds.0),
                y1.min(bounds.1),
                x2.max(bounds.2),
                y2.max(bounds.3),
            ),
        });
    }

    fn finish(self, page_top: f32) -> Option<TextBlock> {
        let (x1, y1, x2, y2) = self.bounds?;
        if self.text.trim().is_empty() {
            return None;
        }
        Some(TextBlock {
            bbox: BBox::new(x1, page_top - y2, x2, page_top - y1),
            text: self.text,
        })
    }
}

struct TextState {
    ctm: Matrix,
    text_matrix: Matrix,
    line_matrix: Matrix,
    font_size: f32,
    leading: f32,
    horizontal_scaling: f32,
}

impl TextState {
    fn new() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            text_matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
            font_size: 12.0,
            leading: 0.0,
            horizontal_scaling: 1.0,
        }
    }

    fn next_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = Matrix::translation(tx, ty).then(&self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    /// Bounds of `text` drawn at the current position, in page space, then
    /// advance the text matrix past it.
    fn show(&mut self, text: &str) -> (f32, f32, f32, f32) {
        let advance =
            text.chars().count() as f32 * AVERAGE_GLYPH_WIDTH * self.font_size * self.horizontal_scaling;
        let to_page = self.text_matrix.then(&self.ctm);
        let (x0, y0) = to_page.apply(0.0, 0.0);
        let width = advance * to_page.horizontal_scale();
        let height = self.font_size * to_page.vertical_scale();
        self.text_matrix = Matrix::translation(advance, 0.0).then(&self.text_matrix);
        (x0, y0, x0 + width, y0 + height)
    }
}

/// Group the text shown between each `BT`/`ET` pair into one block.
///
/// `page_top` is the top edge of the MediaBox; returned boxes have a
/// top-left origin.
pub fn extract_text_blocks(operations: &[Operation], page_top: f32) -> Vec<TextBlock> {
    let mut blocks = Vec::new();
    let mut state = TextState::new();
    let mut saved: Vec<Matrix> = Vec::new();
    let mut current: Option<BlockBuilder> = None;

    for op in operations {
        let operands = &op.operands;
        match op.operator.as_str() {
            "q" => saved.push(state.ctm),
            "Q" => {
                if let Some(ctm) = saved.pop() {
                    state.ctm = ctm;
                }
            }
            "cm" => {
                if let Some(m) = Matrix::from_operands(operands) {
                    state.ctm = m.then(&state.ctm);
                }
            }
            "BT" => {
                state.text_matrix = Matrix::IDENTITY;
                state.line_matrix = Matrix::IDENTITY;
                current = Some(BlockBuilder::default());
            }
            "ET" => {
                if let Some(block) = current.take().and_then(|b| b.finish(page_top)) {
                    blocks.push(block);
                }
            }
            "Tf" => {
                if let Some(size) = operands.get(1).and_then(number) {
                    state.font_size = size;
                }
            }
            "TL" => {
                if let Some(leading) = operands.first().and_then(number) {
                    state.leading = leading;
                }
            }
            "Tz" => {
                if let Some(scale) = operands.first().and_then(number) {
                    state.horizontal_scaling = scale / 100.0;
                }
            }
            "Tm" => {
                if let Some(m) = Matrix::from_operands(operands) {
                    state.text_matrix = m;
                    state.line_matrix = m;
                    mark_space(&mut current);
                }
            }
            "Td" | "TD" => {
                if let (Some(tx), Some(ty)) = (
                    operands.first().and_then(number),
                    operands.get(1).and_then(number),
                ) {
                    if op.operator == "TD" {
                        state.leading = -ty;
                    }
                    state.next_line(tx, ty);
                    mark_space(&mut current);
                }
            }
            "T*" => {
                let leading = state.leading;
                state.next_line(0.0, -leading);
                mark_space(&mut current);
            }
            "Tj" => show_string(operands.first(), &mut state, &mut current),
            "'" => {
                let leading = state.leading;
                state.next_line(0.0, -leading);
                mark_space(&mut current);
                show_string(operands.first(), &mut state, &mut current);
            }
            "\"" => {
                let leading = state.leading;
                state.next_line(0.0, -leading);
                mark_space(&mut current);
                show_string(operands.get(2), &mut state, &mut current);
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    for item in items {
                        match item {
                            Object::String(..) => show_string(Some(item), &mut state, &mut current),
                            other => {
                                if let Some(adjust) = number(other) {
                                    let shift = -adjust / 1000.0
                                        * state.font_size
                                        * state.horizontal_scaling;
                                    state.text_matrix =
                                        Matrix::translation(shift, 0.0).then(&state.text_matrix);
                                    if adjust < TJ_SPACE_THRESHOLD {
                                        mark_space(&mut current);
                                    }
                                }
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }

    // An unterminated text object still counts.
    if let Some(block) = current.and_then(|b| b.finish(page_top)) {
        blocks.push(block);
    }
    blocks
}

fn mark_space(current: &mut Option<BlockBuilder>) {
    if let Some(builder) = current {
        builder.pending_space = true;
    }
}

fn show_string(operand: Option<&Object>, state: &mut TextState, current: &mut Option<BlockBuilder>) {
    let Some(Object::String(bytes, _)) = operand else {
        return;
    };
    let text = decode_pdf_string(bytes);
    let bounds = state.show(&text);
    if let Some(builder) = current {
        builder.push(&text, bounds);
    }
}
