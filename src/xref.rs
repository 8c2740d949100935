//! Cross-reference table parsing.
//!
//! Supports traditional xref tables (PDF 1.0-1.4) including incremental
//! updates via `/Prev` chains. Cross-reference streams (PDF 1.5+) are
//! detected and rejected with `Error::Unsupported`; a redaction tool must
//! not guess at file structure it cannot fully rewrite.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom};

/// A single entry in the cross-reference table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XRefEntry {
    /// Byte offset of the object (or next free object number for free entries)
    pub offset: u64,
    /// Generation number
    pub generation: u16,
    /// Whether the entry is in use (`n`) or free (`f`)
    pub in_use: bool,
}

impl XRefEntry {
    /// Create an in-use entry at the given byte offset.
    pub fn in_use(offset: u64, generation: u16) -> Self {
        Self { offset, generation, in_use: true }
    }

    /// Create a free entry.
    pub fn free(next_free: u64, generation: u16) -> Self {
        Self { offset: next_free, generation, in_use: false }
    }
}

/// The complete cross-reference table of a document.
///
/// Maps object numbers to their entries. With incremental updates the same
/// object number can appear in several tables; the newest entry wins.
#[derive(Debug, Default)]
pub struct CrossRefTable {
    entries: HashMap<u32, XRefEntry>,
}

impl CrossRefTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entry(&mut self, object_number: u32, entry: XRefEntry) {
        self.entries.insert(object_number, entry);
    }

    pub fn get(&self, object_number: u32) -> Option<&XRefEntry> {
        self.entries.get(&object_number)
    }

    pub fn contains(&self, object_number: u32) -> bool {
        self.entries.contains_key(&object_number)
    }

    /// Iterate all object numbers present in the table.
    pub fn all_object_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.keys().copied()
    }

    /// Merge entries from an older table. Entries already present (newer)
    /// are kept.
    pub fn merge_from(&mut self, older: CrossRefTable) {
        for (num, entry) in older.entries {
            self.entries.entry(num).or_insert(entry);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Locate the xref offset recorded after the `startxref` keyword near the
/// end of the file.
pub fn find_xref_offset<R: Read + Seek>(reader: &mut R) -> Result<u64> {
    let file_size = reader.seek(SeekFrom::End(0))?;

    // The startxref keyword sits in the last few lines; 2KB covers even
    // bloated trailers.
    let read_size = std::cmp::min(2048, file_size);
    reader.seek(SeekFrom::End(-(read_size as i64)))?;

    let mut buf = Vec::new();
    reader.take(read_size).read_to_end(&mut buf)?;

    let content = String::from_utf8_lossy(&buf);
    let pos = content.rfind("startxref").ok_or(Error::InvalidXref)?;
    let after = &content[pos + "startxref".len()..];

    for line in split_lines(after) {
        let trimmed = line.trim();
        if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
            return trimmed.parse::<u64>().map_err(|_| Error::InvalidXref);
        }
    }

    Err(Error::InvalidXref)
}

/// Parse the cross-reference table at the given byte offset, following
/// `/Prev` pointers through incremental updates.
///
/// Returns the merged table and the trailer dictionary of the newest
/// update (the one at `offset`).
///
/// # Errors
///
/// Returns `Error::Unsupported` when the offset points at a cross-reference
/// stream, and `Error::InvalidXref` on malformed tables.
pub fn parse_xref<R: Read + Seek>(
    reader: &mut R,
    offset: u64,
) -> Result<(CrossRefTable, HashMap<String, crate::object::Object>)> {
    parse_xref_recursive(reader, offset, 0)
}

fn parse_xref_recursive<R: Read + Seek>(
    reader: &mut R,
    offset: u64,
    depth: u32,
) -> Result<(CrossRefTable, HashMap<String, crate::object::Object>)> {
    // Circular /Prev chains must not loop forever
    if depth > 100 {
        return Err(Error::InvalidPdf("xref /Prev chain deeper than 100".to_string()));
    }

    reader.seek(SeekFrom::Start(offset))?;
    let mut peek = [0u8; 20];
    let n = reader.read(&mut peek)?;
    let peek_str = String::from_utf8_lossy(&peek[..n]);
    let trimmed = peek_str.trim_start();

    log::debug!("parsing xref at offset {}", offset);

    if !trimmed.starts_with("xref") {
        if trimmed.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            // `N G obj` at the xref offset means a cross-reference stream
            return Err(Error::Unsupported(
                "cross-reference streams (PDF 1.5+)".to_string(),
            ));
        }
        return Err(Error::InvalidXref);
    }

    let (mut xref, trailer) = parse_traditional_xref(reader, offset)?;

    if let Some(prev) = trailer.get("Prev").and_then(crate::object::Object::as_integer) {
        log::debug!("following /Prev to offset {}", prev);
        let (older, _) = parse_xref_recursive(reader, prev as u64, depth + 1)?;
        xref.merge_from(older);
    }

    Ok((xref, trailer))
}

/// Parse a traditional cross-reference table and its trailer dictionary.
///
/// Format:
/// ```text
/// xref
/// 0 3
/// 0000000000 65535 f
/// 0000000018 00000 n
/// 0000000154 00000 n
/// trailer
/// << /Size 3 /Root 1 0 R >>
/// ```
fn parse_traditional_xref<R: Read + Seek>(
    reader: &mut R,
    offset: u64,
) -> Result<(CrossRefTable, HashMap<String, crate::object::Object>)> {
    reader.seek(SeekFrom::Start(offset))?;
    let mut buffer = Vec::new();
    reader.read_to_end(&mut buffer)?;

    let content = String::from_utf8_lossy(&buffer);
    let lines = split_lines(&content);

    let mut xref = CrossRefTable::new();
    let mut line_idx = 0;

    // Find the xref keyword, skipping leading blank lines
    loop {
        match lines.get(line_idx).map(|l| l.trim()) {
            Some("") => line_idx += 1,
            Some(l) if l.starts_with("xref") => {
                line_idx += 1;
                break;
            },
            _ => return Err(Error::InvalidXref),
        }
    }

    // Subsections until the trailer keyword
    let mut saw_trailer = false;
    while line_idx < lines.len() {
        let header = lines[line_idx].trim();
        line_idx += 1;

        if header.starts_with("trailer") {
            saw_trailer = true;
            break;
        }
        if header.is_empty() || header.starts_with('%') {
            continue;
        }

        let parts: Vec<&str> = header.split_whitespace().collect();
        if parts.len() != 2 {
            continue;
        }
        let start_obj: u32 = parts[0].parse().map_err(|_| Error::InvalidXref)?;
        let count: u32 = parts[1].parse().map_err(|_| Error::InvalidXref)?;

        if count > 1_000_000 {
            return Err(Error::InvalidPdf("xref subsection count exceeds limit".to_string()));
        }

        let mut i = 0;
        while i < count && line_idx < lines.len() {
            let entry_line = lines[line_idx].trim();
            line_idx += 1;

            if entry_line.is_empty() {
                continue;
            }
            if entry_line.starts_with("trailer") {
                log::warn!("expected {} xref entries, found {} before trailer", count, i);
                line_idx -= 1;
                break;
            }

            let parts: Vec<&str> = entry_line.split_whitespace().collect();
            if parts.len() < 3 {
                log::warn!("malformed xref entry: {:?}", entry_line);
                // A placeholder free entry keeps the object numbering aligned
                xref.add_entry(start_obj + i, XRefEntry::free(0, 65535));
                i += 1;
                continue;
            }

            let entry_offset: u64 = parts[0].parse().unwrap_or(0);
            let generation: u16 = parts[1].parse().unwrap_or(65535);
            let in_use = match parts[2].chars().next() {
                Some('n') | Some('N') => true,
                Some('f') | Some('F') => false,
                _ => {
                    log::warn!("invalid xref type flag {:?}, treating as free", parts[2]);
                    false
                },
            };

            xref.add_entry(start_obj + i, XRefEntry { offset: entry_offset, generation, in_use });
            i += 1;
        }
    }

    if !saw_trailer {
        return Err(Error::InvalidPdf("trailer keyword not found after xref table".to_string()));
    }

    // The trailer dictionary follows the keyword
    let trailer_pos = find_substring(&buffer, b"trailer").ok_or(Error::InvalidXref)?;
    let dict_start = trailer_pos + "trailer".len();
    let (_, trailer_obj) =
        crate::parser::parse_object(&buffer[dict_start..]).map_err(|e| Error::ParseError {
            offset: offset as usize + dict_start,
            reason: format!("failed to parse trailer dictionary: {:?}", e),
        })?;

    match trailer_obj {
        crate::object::Object::Dictionary(d) => Ok((xref, d)),
        _ => Err(Error::InvalidPdf("trailer is not a dictionary".to_string())),
    }
}

/// Split text into lines handling CR, LF, and CRLF endings.
///
/// `str::lines` does not treat a lone CR as a line ending, and old
/// Mac-generated PDFs use exactly that.
fn split_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\n' => lines.push(std::mem::take(&mut current)),
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                lines.push(std::mem::take(&mut current));
            },
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }

    lines
}

fn find_substring(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
