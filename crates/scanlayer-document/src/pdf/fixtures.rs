// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Small PDFs built in memory for unit tests.

use image::{GrayImage, Luma};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, StringFormat, dictionary};

/// One page of a test document.
pub struct PageSpec {
    text: Option<String>,
    image: Option<GrayImage>,
    /// `[x, y, w, h]` placement of the image in PDF points.
    placement: [f32; 4],
}

impl PageSpec {
    /// A page with one line of Helvetica text and no images.
    pub fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            image: None,
            placement: [0.0, 0.0, 612.0, 792.0],
        }
    }

    /// A page that is a single full-page grey image.
    pub fn scanned(image: GrayImage) -> Self {
        Self {
            text: None,
            image: Some(image),
            placement: [0.0, 0.0, 612.0, 792.0],
        }
    }

    /// Add native text to this page.
    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn placed(mut self, x: f32, y: f32, w: f32, h: f32) -> Self {
        self.placement = [x, y, w, h];
        self
    }
}

/// Grey gradient with no pure-white pixels.
pub fn gray_pattern(width: u32, height: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| Luma([((x * 7 + y * 13) % 200) as u8]))
}

/// Serialize a Letter-sized document with one page per spec.
pub fn build_pdf(pages: &[PageSpec]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids = Vec::new();
    for spec in pages {
        let mut operations = Vec::new();
        let mut xobjects = lopdf::Dictionary::new();

        if let Some(image) = &spec.image {
            let image_id = doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => image.width() as i64,
                    "Height" => image.height() as i64,
                    "ColorSpace" => "DeviceGray",
                    "BitsPerComponent" => 8i64,
                },
                image.as_raw().clone(),
            ));
            xobjects.set("Im1", Object::Reference(image_id));
            let [x, y, w, h] = spec.placement;
            operations.push(Operation::new("q", vec![]));
            operations.push(Operation::new(
                "cm",
                [w, 0.0, 0.0, h, x, y].into_iter().map(Object::Real).collect(),
            ));
            operations.push(Operation::new("Do", vec![Object::Name(b"Im1".to_vec())]));
            operations.push(Operation::new("Q", vec![]));
        }

        if let Some(text) = &spec.text {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(12)]));
            operations.push(Operation::new("Td", vec![Object::Integer(72), Object::Integer(700)]));
            operations.push(Operation::new(
                "Tj",
                vec![Object::String(text.as_bytes().to_vec(), StringFormat::Literal)],
            ));
            operations.push(Operation::new("ET", vec![]));
        }

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().unwrap_or_default(),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(612), Object::Integer(792)],
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
                "XObject" => xobjects,
            },
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("in-memory save");
    bytes
}
