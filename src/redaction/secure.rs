//! Secure redaction strategy using MuPDF.
//!
//! This strategy physically removes text from PDF documents using MuPDF's
//! redaction API, ensuring that redacted content cannot be recovered, then
//! writes the replacement text back in place with [`super::insert`].

use super::insert::{self, InsertionStyle};
use super::strategy::{RedactionResult, RedactionStrategy};
use crate::domain::{BBox, RedactionOp, TextSpan};
use crate::error::{AnonymizerError, AnonymizerResult};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use mupdf::pdf::{PdfAnnotationType, PdfDocument, PdfPage};
use mupdf::{Quad, Rect as MuRect, TextPageFlags};

/// Secure redaction strategy that physically removes text using MuPDF.
///
/// This strategy:
/// 1. Creates PDF redaction annotations over each target box
/// 2. Applies redactions using `pdf_redact_page` (physical removal)
/// 3. Saves the modified PDF and re-inserts the replacement text
///
/// **Security**: Redacted text is completely removed and cannot be extracted.
#[derive(Debug, Clone)]
pub struct SecureRedactionStrategy {
    /// Maximum redaction annotations per page; a page needing more fails
    max_hits: u32,
    style: InsertionStyle,
}

impl Default for SecureRedactionStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl SecureRedactionStrategy {
    /// Creates a new secure redaction strategy with default settings.
    pub fn new() -> Self {
        Self {
            max_hits: 500,
            style: InsertionStyle::default(),
        }
    }

    /// Sets the maximum number of redactions per page.
    pub fn with_max_hits(mut self, max_hits: u32) -> Self {
        self.max_hits = max_hits;
        self
    }

    pub fn with_style(mut self, style: InsertionStyle) -> Self {
        self.style = style;
        self
    }

    /// True when at least one page has a non-blank text layer.
    pub fn has_text_layer(&self, input: &Path) -> AnonymizerResult<bool> {
        Ok(self
            .extract_spans(input)?
            .iter()
            .any(|s| !s.text.trim().is_empty()))
    }

    fn open(input: &Path) -> AnonymizerResult<PdfDocument> {
        let input_str = input.to_str().ok_or_else(|| AnonymizerError::InvalidInput {
            parameter: "input".to_string(),
            reason: "Path contains invalid UTF-8".to_string(),
        })?;

        PdfDocument::open(input_str).map_err(|e| AnonymizerError::PdfProcessing {
            message: "Failed to open PDF with MuPDF".to_string(),
            page: None,
            source: Some(Box::new(e)),
        })
    }

    /// Marks every op as a redaction annotation and applies them page by
    /// page, before anything is re-inserted.
    fn apply_mupdf_redactions(
        &self,
        pdf_doc: &PdfDocument,
        ops: &[RedactionOp],
    ) -> AnonymizerResult<RedactionResult> {
        let page_count = pdf_doc
            .page_count()
            .map_err(|e| AnonymizerError::mupdf("Failed to get page count", e))?;

        let mut result = RedactionResult {
            pages_processed: page_count as usize,
            secure: true,
            ..Default::default()
        };

        let mut by_page: BTreeMap<usize, Vec<&RedactionOp>> = BTreeMap::new();
        for op in ops {
            by_page.entry(op.page).or_default().push(op);
        }

        for (page_idx, page_ops) in by_page {
            if page_ops.len() > self.max_hits as usize {
                return Err(AnonymizerError::PdfProcessing {
                    message: format!(
                        "{} redactions exceed the per-page limit of {}",
                        page_ops.len(),
                        self.max_hits
                    ),
                    page: Some(page_idx + 1),
                    source: None,
                });
            }

            let page = pdf_doc
                .load_page(page_idx as i32)
                .map_err(|e| AnonymizerError::PdfProcessing {
                    message: format!("Failed to load page {}", page_idx + 1),
                    page: Some(page_idx + 1),
                    source: Some(Box::new(e)),
                })?;

            let mut pdf_page =
                PdfPage::try_from(page.clone()).map_err(|_| AnonymizerError::PdfProcessing {
                    message: "Page is not a PDF page".to_string(),
                    page: Some(page_idx + 1),
                    source: None,
                })?;

            let mut page_redactions = 0;
            for op in &page_ops {
                if op.target.is_empty() {
                    continue;
                }
                let annot = pdf_page
                    .create_annotation(PdfAnnotationType::Redact)
                    .map_err(|e| AnonymizerError::PdfProcessing {
                        message: "Failed to create redaction annotation".to_string(),
                        page: Some(page_idx + 1),
                        source: Some(Box::new(e)),
                    })?;

                let rect = MuRect {
                    x0: op.target.x0,
                    y0: op.target.y0,
                    x1: op.target.x1,
                    y1: op.target.y1,
                };
                unsafe {
                    ffi::set_annotation_rect(&annot, rect);
                }
                page_redactions += 1;
            }

            // Applied once per page so the boxes of one line do not cut
            // into text inserted for another.
            if page_redactions > 0 {
                pdf_page
                    .redact()
                    .map_err(|e| AnonymizerError::PdfProcessing {
                        message: format!("Failed to apply redactions on page {}", page_idx + 1),
                        page: Some(page_idx + 1),
                        source: Some(Box::new(e)),
                    })?;

                result.instances_redacted += page_redactions;
                result.pages_modified += 1;
            }
        }

        Ok(result)
    }
}

fn quad_box(quad: &Quad) -> BBox {
    BBox::new(
        quad.ul.x.min(quad.ll.x).min(quad.ur.x).min(quad.lr.x),
        quad.ul.y.min(quad.ll.y).min(quad.ur.y).min(quad.lr.y),
        quad.ul.x.max(quad.ll.x).max(quad.ur.x).max(quad.lr.x),
        quad.ul.y.max(quad.ll.y).max(quad.ur.y).max(quad.lr.y),
    )
}

impl RedactionStrategy for SecureRedactionStrategy {
    fn extract_spans(&self, input: &Path) -> AnonymizerResult<Vec<TextSpan>> {
        let pdf_doc = Self::open(input)?;
        let page_count = pdf_doc
            .page_count()
            .map_err(|e| AnonymizerError::mupdf("Failed to get page count", e))?;

        let mut spans = Vec::new();
        for page_idx in 0..page_count {
            let page = pdf_doc
                .load_page(page_idx)
                .map_err(|e| AnonymizerError::PdfProcessing {
                    message: format!("Failed to load page {}", page_idx + 1),
                    page: Some(page_idx as usize + 1),
                    source: Some(Box::new(e)),
                })?;
            let text_page = page
                .to_text_page(TextPageFlags::empty())
                .map_err(|e| AnonymizerError::TextExtraction {
                    path: input.to_path_buf(),
                    reason: format!("page {}: {}", page_idx + 1, e),
                })?;

            for (block_idx, block) in text_page.blocks().enumerate() {
                for (line_idx, line) in block.lines().enumerate() {
                    let mut text = String::new();
                    let mut boxes = Vec::new();
                    let mut font_size: f32 = 0.0;
                    for ch in line.chars() {
                        let Some(c) = ch.char() else { continue };
                        text.push(c);
                        boxes.push(quad_box(&ch.quad()));
                        font_size = font_size.max(ch.size());
                    }
                    if text.trim().is_empty() {
                        continue;
                    }
                    let bounds = line.bounds();
                    let bbox = BBox::new(bounds.x0, bounds.y0, bounds.x1, bounds.y1);
                    spans.push(
                        TextSpan::new(page_idx as usize, block_idx, line_idx, text)
                            .with_geometry(bbox, font_size, boxes),
                    );
                }
            }
        }

        debug!(path = %input.display(), spans = spans.len(), "Extracted text spans");
        Ok(spans)
    }

    fn apply(
        &self,
        input: &Path,
        output: &Path,
        ops: &[RedactionOp],
    ) -> AnonymizerResult<RedactionResult> {
        // If nothing to redact, just copy the file
        if ops.is_empty() {
            std::fs::copy(input, output).map_err(|e| AnonymizerError::Io {
                path: output.to_path_buf(),
                source: e,
            })?;
            return Ok(RedactionResult::none());
        }

        let pdf_doc = Self::open(input)?;
        let result = self.apply_mupdf_redactions(&pdf_doc, ops)?;

        let output_str = output.to_str().ok_or_else(|| AnonymizerError::InvalidInput {
            parameter: "output".to_string(),
            reason: "Path contains invalid UTF-8".to_string(),
        })?;
        pdf_doc
            .save(output_str)
            .map_err(|e| AnonymizerError::PdfProcessing {
                message: "Failed to save redacted PDF".to_string(),
                page: None,
                source: Some(Box::new(e)),
            })?;
        // Release MuPDF's handle before the file is rewritten.
        drop(pdf_doc);

        let erased = std::fs::read(output).map_err(|e| AnonymizerError::Io {
            path: output.to_path_buf(),
            source: e,
        })?;
        let finished = insert::reinsert(&erased, ops, &self.style)?;
        std::fs::write(output, finished).map_err(|e| AnonymizerError::Io {
            path: output.to_path_buf(),
            source: e,
        })?;

        Ok(result)
    }

    fn extension(&self) -> &str {
        "pdf"
    }

    fn name(&self) -> &str {
        "SecureRedaction"
    }

    fn is_secure(&self) -> bool {
        true
    }
}

/// FFI helpers for MuPDF annotation operations.
mod ffi {
    use mupdf::pdf::PdfAnnotation;
    use mupdf::Rect;

    /// Sets the rectangle for a PDF annotation via FFI.
    ///
    /// # Safety
    /// This function uses unsafe FFI calls to access MuPDF's C API.
    /// The annotation must be valid and the context properly initialized.
    pub unsafe fn set_annotation_rect(annot: &PdfAnnotation, rect: Rect) {
        #[repr(C)]
        struct PdfAnnotRaw {
            inner: *mut mupdf_sys::pdf_annot,
        }

        let annot_raw = std::mem::transmute::<&PdfAnnotation, &PdfAnnotRaw>(annot);
        let ctx = mupdf_sys::mupdf_new_base_context();

        if !ctx.is_null() {
            let fz_rect = mupdf_sys::fz_rect {
                x0: rect.x0,
                y0: rect.y0,
                x1: rect.x1,
                y1: rect.y1,
            };

            mupdf_sys::pdf_set_annot_rect(ctx, annot_raw.inner, fz_rect);
            mupdf_sys::mupdf_drop_base_context(ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mupdf::Point;

    #[test]
    fn test_strategy_creation() {
        let strategy = SecureRedactionStrategy::new();
        assert_eq!(strategy.name(), "SecureRedaction");
        assert_eq!(strategy.extension(), "pdf");
        assert!(strategy.is_secure());
    }

    #[test]
    fn test_max_hits_configuration() {
        let strategy = SecureRedactionStrategy::new().with_max_hits(50);
        assert_eq!(strategy.max_hits, 50);
    }

    #[test]
    fn test_quad_box_normalizes_corners() {
        let quad = Quad {
            ul: Point { x: 10.0, y: 20.0 },
            ur: Point { x: 30.0, y: 20.0 },
            ll: Point { x: 10.0, y: 32.0 },
            lr: Point { x: 30.0, y: 32.0 },
        };
        assert_eq!(quad_box(&quad), BBox::new(10.0, 20.0, 30.0, 32.0));
    }
}
