//! Redaction of word-processor (`.docx`) documents.
//!
//! A paragraph's text is spread over `<w:t>` runs. Each paragraph becomes one
//! span without geometry; applying an op rewrites the runs it covers, putting
//! the replacement in the run holding the first removed char. The body,
//! headers, footers, notes and comments are handled, as are the free-text
//! document properties. Author names in the package metadata and on comments
//! or tracked changes are blanked whatever the classifier finds; everything
//! else in the package is copied untouched.

use super::strategy::{RedactionResult, RedactionStrategy};
use crate::domain::{RedactionOp, TextSpan};
use crate::error::{AnonymizerError, AnonymizerResult};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

static PARAGRAPH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<w:p[ >].*?</w:p>").expect("Valid regex"));

static TEXT_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(<w:t(?:\s[^>]*)?>)([^<]*)(</w:t>)").expect("Valid regex"));

static SECONDARY_PART: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^word/(header\d*|footer\d*|footnotes|endnotes|comments)\.xml$")
        .expect("Valid regex")
});

/// Free-text core properties, classified like paragraphs.
static CORE_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(<(?:dc:title|dc:subject|dc:description|cp:keywords)(?:\s[^>]*)?>)([^<]*)(</(?:dc:title|dc:subject|dc:description|cp:keywords)>)",
    )
    .expect("Valid regex")
});

/// Properties naming people or organizations, always blanked.
static AUTHOR_ELEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(<(?:dc:creator|cp:lastModifiedBy|Company|Manager)(?:\s[^>]*)?>)[^<]+(</(?:dc:creator|cp:lastModifiedBy|Company|Manager)>)",
    )
    .expect("Valid regex")
});

static AUTHOR_ATTRIBUTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\b(w:author|w:initials)="[^"]*""#).expect("Valid regex"));

const BODY_PART: &str = "word/document.xml";
const CORE_PART: &str = "docProps/core.xml";
const APP_PART: &str = "docProps/app.xml";

/// Unit and run patterns of a part holding classifiable text: each unit
/// becomes one span, made of the text of its runs.
fn layout(name: &str) -> Option<(&'static Regex, &'static Regex)> {
    if name == BODY_PART || SECONDARY_PART.is_match(name) {
        Some((&*PARAGRAPH, &*TEXT_RUN))
    } else if name == CORE_PART {
        Some((&*CORE_TEXT, &*CORE_TEXT))
    } else {
        None
    }
}

fn part_order(name: &str) -> (u8, &str) {
    (u8::from(name != BODY_PART), name)
}

/// Blanks author names in metadata elements and attributes.
fn scrub_authors(xml: &str) -> Cow<'_, str> {
    match AUTHOR_ELEMENT.replace_all(xml, "${1}${2}") {
        Cow::Borrowed(_) => AUTHOR_ATTRIBUTE.replace_all(xml, "${1}=\"\""),
        Cow::Owned(blanked) => Cow::Owned(
            AUTHOR_ATTRIBUTE
                .replace_all(&blanked, "${1}=\"\"")
                .into_owned(),
        ),
    }
}

/// Decodes the entities that may appear in `<w:t>` content.
pub fn xml_unescape(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        let Some(end) = rest.find(';') else {
            break;
        };
        let entity = &rest[1..end];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .and_then(|h| u32::from_str_radix(h, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse().ok()))
                .and_then(char::from_u32),
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

pub fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Decoded text of each run of a unit.
fn unit_runs(run: &Regex, unit: &str) -> Vec<String> {
    run.captures_iter(unit)
        .map(|c| xml_unescape(&c[2]))
        .collect()
}

/// Paragraphs that become spans: at least one run and some visible text.
fn is_span(runs: &[String]) -> bool {
    runs.iter().any(|r| !r.trim().is_empty())
}

/// Removes `range` (chars of the joined runs) and inserts `replacement` in
/// the run that held its first char.
fn splice_runs(runs: &mut [Vec<char>], range: std::ops::Range<usize>, replacement: &str) {
    let total: usize = runs.iter().map(Vec::len).sum();
    let start = range.start.min(total);
    let end = range.end.min(total);

    let mut offset = 0;
    let mut owner = runs.len().saturating_sub(1);
    for (i, run) in runs.iter().enumerate() {
        if start < offset + run.len() {
            owner = i;
            break;
        }
        offset += run.len();
    }

    let mut offset = 0;
    for (i, run) in runs.iter_mut().enumerate() {
        let run_start = offset;
        let run_end = offset + run.len();
        offset = run_end;
        let local_start = start.clamp(run_start, run_end) - run_start;
        let local_end = end.clamp(run_start, run_end) - run_start;
        run.drain(local_start..local_end);
        if i == owner {
            run.splice(local_start..local_start, replacement.chars());
        }
    }
}

/// Rewrites the runs of one unit with `ops`, which must not overlap.
fn rewrite_unit(run: &Regex, unit: &str, ops: &[&RedactionOp]) -> String {
    let mut runs: Vec<Vec<char>> = unit_runs(run, unit)
        .iter()
        .map(|r| r.chars().collect())
        .collect();

    let mut ordered: Vec<&&RedactionOp> = ops.iter().collect();
    ordered.sort_by(|a, b| b.range.start.cmp(&a.range.start));
    for op in ordered {
        splice_runs(&mut runs, op.range.clone(), &op.replacement);
    }

    let mut next = runs.into_iter();
    run.replace_all(unit, |caps: &Captures| {
        let text: String = next.next().unwrap_or_default().into_iter().collect();
        let open = &caps[1];
        let needs_preserve = open.starts_with("<w:t")
            && (text.starts_with(' ') || text.ends_with(' '))
            && !open.contains("xml:space");
        let open = if needs_preserve {
            "<w:t xml:space=\"preserve\">"
        } else {
            open
        };
        format!("{}{}{}", open, xml_escape(&text), &caps[3])
    })
    .into_owned()
}

/// Word-processor redaction: text is rewritten in the package XML, so the
/// original characters are gone from the output.
#[derive(Debug, Clone, Default)]
pub struct WordRedactionStrategy;

impl WordRedactionStrategy {
    pub fn new() -> Self {
        Self
    }

    fn read_entries(input: &Path) -> AnonymizerResult<Vec<(String, Vec<u8>)>> {
        let bytes = std::fs::read(input).map_err(|e| AnonymizerError::Io {
            path: input.to_path_buf(),
            source: e,
        })?;
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            let name = entry.name().to_string();
            let mut data = Vec::new();
            entry.read_to_end(&mut data).map_err(|e| AnonymizerError::Io {
                path: input.to_path_buf(),
                source: e,
            })?;
            entries.push((name, data));
        }
        if !entries.iter().any(|(n, _)| n == BODY_PART) {
            return Err(AnonymizerError::UnsupportedFormat {
                name: input.display().to_string(),
                extension: Some("docx".to_string()),
            });
        }
        Ok(entries)
    }

    fn write_entries(output: &Path, entries: &[(String, Vec<u8>)]) -> AnonymizerResult<()> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, data) in entries {
            let options = if name.starts_with("word/media/") {
                stored
            } else {
                deflated
            };
            zip.start_file(name.as_str(), options)?;
            zip.write_all(data).map_err(|e| AnonymizerError::Io {
                path: output.to_path_buf(),
                source: e,
            })?;
        }
        let bytes = zip.finish()?.into_inner();
        std::fs::write(output, bytes).map_err(|e| AnonymizerError::Io {
            path: output.to_path_buf(),
            source: e,
        })
    }

    /// Text parts in span order.
    fn text_parts(entries: &[(String, Vec<u8>)]) -> Vec<usize> {
        let mut parts: Vec<usize> = entries
            .iter()
            .enumerate()
            .filter(|(_, (name, _))| layout(name).is_some())
            .map(|(i, _)| i)
            .collect();
        parts.sort_by(|a, b| part_order(&entries[*a].0).cmp(&part_order(&entries[*b].0)));
        parts
    }
}

impl RedactionStrategy for WordRedactionStrategy {
    fn extract_spans(&self, input: &Path) -> AnonymizerResult<Vec<TextSpan>> {
        let entries = Self::read_entries(input)?;
        let mut spans = Vec::new();
        for (block, index) in Self::text_parts(&entries).into_iter().enumerate() {
            let (name, data) = &entries[index];
            let Some((unit, run)) = layout(name) else {
                continue;
            };
            let xml = String::from_utf8_lossy(data);
            let mut line = 0;
            for found in unit.find_iter(&xml) {
                let runs = unit_runs(run, found.as_str());
                if !is_span(&runs) {
                    continue;
                }
                spans.push(TextSpan::new(0, block, line, runs.concat()));
                line += 1;
            }
        }
        debug!(path = %input.display(), paragraphs = spans.len(), "Extracted word paragraphs");
        Ok(spans)
    }

    fn apply(
        &self,
        input: &Path,
        output: &Path,
        ops: &[RedactionOp],
    ) -> AnonymizerResult<RedactionResult> {
        let mut by_span: HashMap<usize, Vec<&RedactionOp>> = HashMap::new();
        for op in ops {
            by_span.entry(op.span_index).or_default().push(op);
        }

        let mut entries = Self::read_entries(input)?;
        let parts = Self::text_parts(&entries);
        let mut result = RedactionResult {
            pages_processed: parts.len(),
            secure: true,
            ..Default::default()
        };

        let mut span_index = 0;
        for index in parts {
            let Some((unit, run)) = layout(&entries[index].0) else {
                continue;
            };
            let xml = String::from_utf8_lossy(&entries[index].1).into_owned();
            let mut rewritten = String::with_capacity(xml.len());
            let mut last = 0;

            for found in unit.find_iter(&xml) {
                rewritten.push_str(&xml[last..found.start()]);
                last = found.end();

                let runs = unit_runs(run, found.as_str());
                if !is_span(&runs) {
                    rewritten.push_str(found.as_str());
                    continue;
                }
                match by_span.get(&span_index) {
                    Some(span_ops) => {
                        rewritten.push_str(&rewrite_unit(run, found.as_str(), span_ops));
                        result.instances_redacted += span_ops.len();
                    }
                    None => rewritten.push_str(found.as_str()),
                }
                span_index += 1;
            }
            rewritten.push_str(&xml[last..]);

            let scrubbed = scrub_authors(&rewritten).into_owned();
            if scrubbed != xml {
                entries[index].1 = scrubbed.into_bytes();
                result.pages_modified += 1;
            }
        }

        if let Some(entry) = entries.iter_mut().find(|(name, _)| name == APP_PART) {
            let xml = String::from_utf8_lossy(&entry.1).into_owned();
            if let Cow::Owned(scrubbed) = scrub_authors(&xml) {
                entry.1 = scrubbed.into_bytes();
            }
        }

        Self::write_entries(output, &entries)?;
        Ok(result)
    }

    fn rewrites_metadata(&self) -> bool {
        true
    }

    fn extension(&self) -> &str {
        "docx"
    }

    fn name(&self) -> &str {
        "WordRedaction"
    }

    fn is_secure(&self) -> bool {
        true
    }
}
