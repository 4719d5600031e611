//! Recovers line/column positions for elements and attribute values.
//!
//! The document model carries no source positions, so elements are located
//! by scanning the raw text for their start tags in document order. The
//! result is best effort: elements the HTML parser inserts on its own have
//! no position, and values rewritten by entity decoding fall back to the
//! position of their element.
use weft_lang::Position;

#[derive(Debug)]
pub struct SourceMap<'a> {
    source: &'a str,
    lower: String,
    cursor: usize,
}

impl<'a> SourceMap<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            lower: source.to_ascii_lowercase(),
            cursor: 0,
        }
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    /// Byte offset of the next `<tag` start tag. Calls must follow document
    /// order.
    pub fn element(&mut self, tag: &str) -> Option<usize> {
        let needle = format!("<{}", tag.to_ascii_lowercase());
        let mut from = self.cursor;

        while let Some(found) = self.lower.get(from..)?.find(&needle) {
            let start = from + found;
            let end = start + needle.len();
            let boundary = self.lower[end..]
                .chars()
                .next()
                .is_none_or(|c| c.is_ascii_whitespace() || c == '>' || c == '/');

            if boundary {
                self.cursor = end;
                return Some(start);
            }
            from = end;
        }

        None
    }

    /// Byte offset of `needle` at or after `from`.
    pub fn find(&self, from: usize, needle: &str) -> Option<usize> {
        if needle.is_empty() {
            return None;
        }
        self.source
            .get(from..)?
            .find(needle)
            .map(|found| from + found)
    }

    pub fn position(&self, offset: usize) -> Position {
        let before = &self.source[..floor_char_boundary(self.source, offset)];
        let line = before.matches('\n').count() as u32 + 1;
        let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);

        Position::new(line, before[line_start..].chars().count() + 1)
    }
}

fn floor_char_boundary(s: &str, offset: usize) -> usize {
    let mut offset = offset.min(s.len());
    while !s.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}
