//! Positioned text and redaction operations.

use super::entity::{PiiCategory, PiiEntity};
use serde::Serialize;
use std::ops::Range;

/// Axis-aligned box in page coordinates (origin top-left, y down).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct BBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BBox {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }

    pub fn union(&self, other: &BBox) -> BBox {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        BBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    pub fn scaled(&self, factor: f32) -> BBox {
        BBox {
            x0: self.x0 * factor,
            y0: self.y0 * factor,
            x1: self.x1 * factor,
            y1: self.y1 * factor,
        }
    }
}

/// One extracted line of text with its geometry.
///
/// `char_boxes` holds one box per char of `text` when the extractor provides
/// geometry (PDF); it is empty for word-processor paragraphs.
#[derive(Debug, Clone, Serialize)]
pub struct TextSpan {
    pub page: usize,
    pub block: usize,
    pub line: usize,
    pub bbox: BBox,
    pub font_size: f32,
    pub text: String,
    pub char_boxes: Vec<BBox>,
    pub entities: Vec<PiiEntity>,
}

impl TextSpan {
    /// Creates a span without geometry.
    pub fn new(page: usize, block: usize, line: usize, text: impl Into<String>) -> Self {
        Self {
            page,
            block,
            line,
            bbox: BBox::default(),
            font_size: 0.0,
            text: text.into(),
            char_boxes: Vec::new(),
            entities: Vec::new(),
        }
    }

    pub fn with_geometry(mut self, bbox: BBox, font_size: f32, char_boxes: Vec<BBox>) -> Self {
        self.bbox = bbox;
        self.font_size = font_size;
        self.char_boxes = char_boxes;
        self
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    /// Text of a char range.
    pub fn slice(&self, range: Range<usize>) -> String {
        self.text
            .chars()
            .skip(range.start)
            .take(range.len())
            .collect()
    }

    /// Box covering the chars of `range`, or the whole span box when the
    /// extractor gave no per-char geometry.
    pub fn sub_box(&self, range: Range<usize>) -> BBox {
        if self.char_boxes.len() != self.char_count() {
            return self.bbox;
        }
        self.char_boxes[range.start.min(self.char_boxes.len())..range.end.min(self.char_boxes.len())]
            .iter()
            .fold(BBox::default(), |acc, b| acc.union(b))
    }

    /// Entities that survived suppression.
    pub fn redacted_entities(&self) -> impl Iterator<Item = &PiiEntity> {
        self.entities.iter().filter(|e| !e.is_suppressed())
    }

    pub fn has_redactions(&self) -> bool {
        self.redacted_entities().next().is_some()
    }
}

/// Removal of one region of a page and the text re-inserted in its place.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RedactionOp {
    pub page: usize,
    /// Index of the span in extraction order (paragraph index for DOCX)
    pub span_index: usize,
    /// Char range in the span text
    pub range: Range<usize>,
    pub target: BBox,
    /// Empty means blank fill
    pub replacement: String,
    pub font_size: f32,
    pub category: PiiCategory,
}
