//! Paragraph-level text rewriting for WordprocessingML parts.
//!
//! Word splits the visible text of a paragraph into runs (`<w:r><w:t>..</w:t></w:r>`)
//! at arbitrary points, so a token such as `{{ client_name }}` may be spread
//! over several `<w:t>` elements. The rewriter merges the text of each
//! paragraph, lets the caller compute replacements on the merged string, and
//! writes the result back into the original runs: a replacement lands in the
//! run where its range starts and the rest of the range is removed from the
//! following runs. Formatting of the first run is therefore kept.

use std::ops::Range;

use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use thiserror::Error;

const PARAGRAPH: &[u8] = b"w:p";
const TEXT: &[u8] = b"w:t";

#[derive(Debug, Error)]
pub enum MarkupError {
    #[error("malformed XML: {0}")]
    Malformed(String),
    #[error("failed to write XML: {0}")]
    Write(String),
}

/// Replace `range` (byte offsets into the merged paragraph text) with `text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub range: Range<usize>,
    pub text: String,
}

enum Item {
    Event(Event<'static>),
    Text(usize),
}

#[derive(Default)]
struct Segment {
    items: Vec<Item>,
    texts: Vec<String>,
}

/// Rewrite one XML part.
///
/// `visit` is called once per paragraph with its merged text and returns the
/// replacements to apply, sorted by start and non-overlapping.
pub fn rewrite_part<F, E>(xml: &[u8], mut visit: F) -> Result<Vec<u8>, E>
where
    F: FnMut(&str) -> Result<Vec<Replacement>, E>,
    E: From<MarkupError>,
{
    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut buf = Vec::new();
    let mut segment = Segment::default();
    let mut depth: usize = 0;
    let mut in_text = false;

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| {
            MarkupError::Malformed(format!("{e} (near byte {})", reader.buffer_position()))
        })?;

        match event {
            Event::Eof => break,
            Event::Start(ref start) => {
                depth += 1;
                let name = start.name();
                if name.as_ref() == PARAGRAPH {
                    flush(&mut segment, &mut writer, &mut visit)?;
                    segment.items.push(Item::Event(event.into_owned()));
                } else if name.as_ref() == TEXT {
                    in_text = true;
                    segment
                        .items
                        .push(Item::Event(Event::Start(preserve_space(start))));
                } else {
                    segment.items.push(Item::Event(event.into_owned()));
                }
            }
            Event::End(ref end) => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    MarkupError::Malformed("closing tag without opening tag".to_string())
                })?;
                let is_paragraph = end.name().as_ref() == PARAGRAPH;
                if end.name().as_ref() == TEXT {
                    in_text = false;
                }
                segment.items.push(Item::Event(event.into_owned()));
                if is_paragraph {
                    flush(&mut segment, &mut writer, &mut visit)?;
                }
            }
            Event::Text(ref text) if in_text => {
                let unescaped = text
                    .unescape()
                    .map_err(|e| MarkupError::Malformed(e.to_string()))?;
                segment.texts.push(unescaped.into_owned());
                segment.items.push(Item::Text(segment.texts.len() - 1));
            }
            other => segment.items.push(Item::Event(other.into_owned())),
        }
        buf.clear();
    }

    if depth != 0 {
        return Err(MarkupError::Malformed("unexpected end of part".to_string()).into());
    }
    flush(&mut segment, &mut writer, &mut visit)?;
    Ok(writer.into_inner())
}

/// Merged text of every paragraph in the part, in document order.
pub fn paragraph_texts(xml: &[u8]) -> Result<Vec<String>, MarkupError> {
    let mut paragraphs = Vec::new();
    rewrite_part(xml, |text| {
        paragraphs.push(text.to_string());
        Ok::<_, MarkupError>(Vec::new())
    })?;
    Ok(paragraphs)
}

fn preserve_space(start: &BytesStart<'_>) -> BytesStart<'static> {
    let mut owned = start.to_owned();
    let has_space_attr = start
        .attributes()
        .flatten()
        .any(|attr| attr.key.as_ref() == b"xml:space");
    if !has_space_attr {
        owned.push_attribute(("xml:space", "preserve"));
    }
    owned
}

fn flush<F, E>(
    segment: &mut Segment,
    writer: &mut Writer<Vec<u8>>,
    visit: &mut F,
) -> Result<(), E>
where
    F: FnMut(&str) -> Result<Vec<Replacement>, E>,
    E: From<MarkupError>,
{
    let merged: String = segment.texts.concat();
    let replacements = if merged.is_empty() {
        Vec::new()
    } else {
        visit(&merged)?
    };
    let texts = if replacements.is_empty() {
        std::mem::take(&mut segment.texts)
    } else {
        distribute(&merged, &segment.texts, &replacements)
    };

    for item in segment.items.drain(..) {
        let event = match item {
            Item::Event(event) => event,
            Item::Text(index) => Event::Text(BytesText::new(&texts[index]).into_owned()),
        };
        writer
            .write_event(event)
            .map_err(|e| MarkupError::Write(e.to_string()))?;
    }
    segment.texts.clear();
    Ok(())
}

/// Spread replacements over the original text nodes.
fn distribute(merged: &str, texts: &[String], replacements: &[Replacement]) -> Vec<String> {
    let mut result = Vec::with_capacity(texts.len());
    let mut offset = 0;

    for text in texts {
        let start = offset;
        let end = offset + text.len();
        let mut piece = String::with_capacity(text.len());
        let mut cursor = start;

        for replacement in replacements {
            let range = &replacement.range;
            if range.end <= start || range.start >= end {
                continue;
            }
            let overlap_start = range.start.max(start);
            let overlap_end = range.end.min(end);
            piece.push_str(&merged[cursor..overlap_start]);
            if range.start >= start {
                piece.push_str(&replacement.text);
            }
            cursor = overlap_end;
        }

        piece.push_str(&merged[cursor..end]);
        result.push(piece);
        offset = end;
    }

    result
}
