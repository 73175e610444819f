//! Re-insertion of replacement text after MuPDF removed the originals.
//!
//! MuPDF has already erased the glyphs; this pass appends one content stream
//! per modified page that paints each target white and writes the
//! replacement with a standard Helvetica font at the original font size.
//! The existing content is wrapped in `q`/`Q` so that graphics state left
//! over by the page cannot move the inserted text.

use crate::domain::{BBox, RedactionOp};
use crate::error::{AnonymizerError, AnonymizerResult};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::collections::BTreeMap;
use tracing::debug;

/// Resource name of the inserted font.
const FONT_RESOURCE: &[u8] = b"FAnon";

/// Font size used when extraction reported none.
const FALLBACK_FONT_SIZE: f32 = 10.0;

/// Placement of re-inserted text relative to the erased box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InsertionStyle {
    /// Baseline offset below the top of the box, as a fraction of the font
    /// size
    pub vertical_offset_ratio: f32,
    /// Shift to the right of the box origin, in points
    pub horizontal_offset: f32,
}

impl Default for InsertionStyle {
    fn default() -> Self {
        Self {
            vertical_offset_ratio: 0.8,
            horizontal_offset: 0.0,
        }
    }
}

/// Encodes text for a WinAnsi simple font; unmappable chars become `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\u{20}'..='\u{7e}' => c as u8,
            '\u{a0}'..='\u{ff}' => c as u32 as u8,
            '€' => 0x80,
            '’' => 0x92,
            '‘' => 0x91,
            '“' => 0x93,
            '”' => 0x94,
            '–' => 0x96,
            '—' => 0x97,
            _ => b'?',
        })
        .collect()
}

/// Writes the replacement text of `ops` into `pdf` and returns the new bytes.
pub fn reinsert(pdf: &[u8], ops: &[RedactionOp], style: &InsertionStyle) -> AnonymizerResult<Vec<u8>> {
    if ops.is_empty() {
        return Ok(pdf.to_vec());
    }
    let mut doc = Document::load_mem(pdf)
        .map_err(|e| AnonymizerError::lopdf("Failed to load erased PDF", e))?;

    let mut by_page: BTreeMap<usize, Vec<&RedactionOp>> = BTreeMap::new();
    for op in ops {
        by_page.entry(op.page).or_default().push(op);
    }

    let pages = doc.get_pages();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    for (page_index, page_ops) in by_page {
        let page_id = *pages
            .get(&(page_index as u32 + 1))
            .ok_or_else(|| AnonymizerError::PdfProcessing {
                message: "Redaction targets a page that does not exist".to_string(),
                page: Some(page_index + 1),
                source: None,
            })?;

        let page_box = visible_box(&doc, page_id).unwrap_or(BBox::new(0.0, 0.0, 612.0, 792.0));
        let content = page_content(&page_ops, page_box, style);
        let encoded = content
            .encode()
            .map_err(|e| AnonymizerError::lopdf("Failed to encode replacement text", e))?;

        install_font(&mut doc, page_id, font_id)?;
        append_content(&mut doc, page_id, encoded)?;
        debug!(page = page_index + 1, ops = page_ops.len(), "Replacement text inserted");
    }

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| AnonymizerError::Io {
            path: "<memory>".into(),
            source: e,
        })?;
    Ok(out)
}

/// Builds the operators painting and writing every op of one page.
fn page_content(ops: &[&RedactionOp], page_box: BBox, style: &InsertionStyle) -> Content {
    let mut operations = vec![Operation::new("q", vec![])];

    for op in ops {
        let target = op.target;
        if target.is_empty() {
            continue;
        }
        // Page space is y-up from the visible box's lower-left corner.
        let left = page_box.x0 + target.x0;
        let bottom = page_box.y1 - target.y1;

        operations.push(Operation::new("rg", vec![1.into(), 1.into(), 1.into()]));
        operations.push(Operation::new(
            "re",
            vec![
                Object::Real(left),
                Object::Real(bottom),
                Object::Real(target.width()),
                Object::Real(target.height()),
            ],
        ));
        operations.push(Operation::new("f", vec![]));

        if op.replacement.is_empty() {
            continue;
        }
        let size = if op.font_size > 0.0 {
            op.font_size
        } else {
            FALLBACK_FONT_SIZE
        };
        let baseline = page_box.y1 - (target.y0 + style.vertical_offset_ratio * size);

        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new("rg", vec![0.into(), 0.into(), 0.into()]));
        operations.push(Operation::new(
            "Tf",
            vec![Object::Name(FONT_RESOURCE.to_vec()), Object::Real(size)],
        ));
        operations.push(Operation::new(
            "Td",
            vec![
                Object::Real(left + style.horizontal_offset),
                Object::Real(baseline),
            ],
        ));
        operations.push(Operation::new(
            "Tj",
            vec![Object::String(
                encode_win_ansi(&op.replacement),
                StringFormat::Literal,
            )],
        ));
        operations.push(Operation::new("ET", vec![]));
    }

    operations.push(Operation::new("Q", vec![]));
    Content { operations }
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Looks `key` up on the page, then on its ancestors.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    loop {
        if let Ok(value) = node.get(key) {
            return Some(match value {
                Object::Reference(id) => doc.get_object(*id).ok()?,
                other => other,
            });
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
}

/// CropBox, else MediaBox, of a page.
fn visible_box(doc: &Document, page_id: ObjectId) -> Option<BBox> {
    let array = inherited(doc, page_id, b"CropBox")
        .or_else(|| inherited(doc, page_id, b"MediaBox"))?
        .as_array()
        .ok()?;
    let values: Vec<f32> = array.iter().filter_map(number).collect();
    match values.as_slice() {
        [x0, y0, x1, y1] => Some(BBox::new(*x0, *y0, *x1, *y1)),
        _ => None,
    }
}

/// Copies the page's (possibly inherited) resources inline and adds the
/// replacement font to them.
fn install_font(doc: &mut Document, page_id: ObjectId, font_id: ObjectId) -> AnonymizerResult<()> {
    let mut resources = match inherited(doc, page_id, b"Resources") {
        Some(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    };
    let mut fonts = match resources.get(b"Font") {
        Ok(Object::Dictionary(dict)) => dict.clone(),
        Ok(Object::Reference(id)) => doc.get_dictionary(*id).cloned().unwrap_or_default(),
        _ => Dictionary::new(),
    };
    fonts.set(FONT_RESOURCE.to_vec(), Object::Reference(font_id));
    resources.set("Font", Object::Dictionary(fonts));

    page_dict_mut(doc, page_id)?.set("Resources", Object::Dictionary(resources));
    Ok(())
}

/// Wraps existing content in `q`/`Q` and appends `content` after it.
fn append_content(doc: &mut Document, page_id: ObjectId, content: Vec<u8>) -> AnonymizerResult<()> {
    let current = doc
        .get_dictionary(page_id)
        .ok()
        .and_then(|d| d.get(b"Contents").ok())
        .cloned();
    let existing: Vec<Object> = match current {
        Some(Object::Array(items)) => items,
        Some(Object::Reference(id)) => vec![Object::Reference(id)],
        Some(Object::Stream(stream)) => vec![Object::Reference(doc.add_object(stream))],
        _ => Vec::new(),
    };

    let open = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let close = doc.add_object(Stream::new(Dictionary::new(), b"\nQ\n".to_vec()));
    let added = doc.add_object(Stream::new(Dictionary::new(), content));

    let mut contents = Vec::with_capacity(existing.len() + 3);
    contents.push(Object::Reference(open));
    contents.extend(existing);
    contents.push(Object::Reference(close));
    contents.push(Object::Reference(added));

    page_dict_mut(doc, page_id)?.set("Contents", Object::Array(contents));
    Ok(())
}

fn page_dict_mut(doc: &mut Document, page_id: ObjectId) -> AnonymizerResult<&mut Dictionary> {
    doc.get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| AnonymizerError::lopdf("Page object is not a dictionary", e))
}
