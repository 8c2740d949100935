//! Content-stream tokenizer.
//!
//! Unlike the object lexer, this tokenizer is byte-faithful: every token
//! carries the exact input bytes it was produced from, and concatenating the
//! `raw` fields of all tokens reproduces the stream byte for byte. The
//! redaction filter relies on this to leave untouched streams untouched.
//!
//! Tokenization is also total. Any input tokenizes; a byte that fits no
//! category becomes a one-byte `Other` token.

use crate::parser::{decode_hex, decode_literal_string_escapes};

/// Category of a content-stream token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Operator word (`BT`, `Tj`, `q`, `re`, ...)
    Word,
    /// Literal or hex string
    Str,
    /// Run of whitespace and/or `%` comments
    Space,
    /// Anything else: numbers, names, delimiters, inline image data
    Other,
}

/// A single token from a content stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentToken {
    pub kind: TokenKind,
    /// The exact bytes this token occupies in the stream
    pub raw: Vec<u8>,
    /// Decoded content: string bytes for `Str`, the bare name for name
    /// tokens, empty otherwise
    pub value: Vec<u8>,
}

impl ContentToken {
    fn new(kind: TokenKind, raw: Vec<u8>, value: Vec<u8>) -> Self {
        Self { kind, raw, value }
    }

    /// True if this is the operator word `word`.
    pub fn is_word(&self, word: &[u8]) -> bool {
        self.kind == TokenKind::Word && self.raw == word
    }
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C)
}

fn is_delimiter(b: u8) -> bool {
    matches!(b, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

/// Tokenize a complete content stream.
pub fn tokenize(data: &[u8]) -> Vec<ContentToken> {
    Tokenizer::new(data).collect()
}

/// Re-encode edited string content as a string token.
///
/// Printable content becomes an escaped literal string, binary content a hex
/// string. Used by match-scope substitution after editing a string's value.
pub fn encode_string_token(content: &[u8]) -> ContentToken {
    let printable = content
        .iter()
        .all(|&b| b == b'\n' || b == b'\r' || b == b'\t' || (0x20..=0x7E).contains(&b));

    let mut raw = Vec::with_capacity(content.len() + 2);
    if printable {
        raw.push(b'(');
        for &b in content {
            match b {
                b'(' => raw.extend_from_slice(b"\\("),
                b')' => raw.extend_from_slice(b"\\)"),
                b'\\' => raw.extend_from_slice(b"\\\\"),
                b'\n' => raw.extend_from_slice(b"\\n"),
                b'\r' => raw.extend_from_slice(b"\\r"),
                b'\t' => raw.extend_from_slice(b"\\t"),
                _ => raw.push(b),
            }
        }
        raw.push(b')');
    } else {
        raw.push(b'<');
        for &b in content {
            raw.extend_from_slice(format!("{:02X}", b).as_bytes());
        }
        raw.push(b'>');
    }

    ContentToken::new(TokenKind::Str, raw, content.to_vec())
}

/// Iterator producing content tokens from a byte slice.
pub struct Tokenizer<'a> {
    data: &'a [u8],
    pos: usize,
    /// Set after the `ID` operator so the next chunk is read as inline
    /// image data up to `EI`
    inline_image: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0, inline_image: false }
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn take_space(&mut self) -> ContentToken {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if is_whitespace(b) {
                self.pos += 1;
            } else if b == b'%' {
                while let Some(c) = self.peek() {
                    if c == b'\r' || c == b'\n' {
                        break;
                    }
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
        ContentToken::new(TokenKind::Space, self.data[start..self.pos].to_vec(), Vec::new())
    }

    fn take_literal_string(&mut self) -> ContentToken {
        let start = self.pos;
        self.pos += 1; // opening paren
        let mut depth = 1usize;

        while depth > 0 {
            match self.peek() {
                None => break, // unterminated: the rest of the stream is the token
                Some(b'\\') => {
                    self.pos += 1;
                    if self.peek().is_some() {
                        self.pos += 1;
                    }
                },
                Some(b'(') => {
                    depth += 1;
                    self.pos += 1;
                },
                Some(b')') => {
                    depth -= 1;
                    self.pos += 1;
                },
                Some(_) => self.pos += 1,
            }
        }

        let raw = &self.data[start..self.pos];
        let inner_end = if depth == 0 { raw.len() - 1 } else { raw.len() };
        let value = decode_literal_string_escapes(&raw[1..inner_end]);
        ContentToken::new(TokenKind::Str, raw.to_vec(), value)
    }

    fn take_hex_string(&mut self) -> ContentToken {
        let start = self.pos;
        self.pos += 1; // opening angle
        while let Some(b) = self.peek() {
            self.pos += 1;
            if b == b'>' {
                break;
            }
        }

        let raw = &self.data[start..self.pos];
        let inner_end = if raw.last() == Some(&b'>') { raw.len() - 1 } else { raw.len() };
        // Invalid hex digits make this not really a string, but totality
        // wins: keep the raw bytes and an empty value.
        let value = decode_hex(&raw[1..inner_end]).unwrap_or_default();
        ContentToken::new(TokenKind::Str, raw.to_vec(), value)
    }

    fn take_name(&mut self) -> ContentToken {
        let start = self.pos;
        self.pos += 1; // slash
        while let Some(b) = self.peek() {
            if is_whitespace(b) || is_delimiter(b) {
                break;
            }
            self.pos += 1;
        }

        let raw = &self.data[start..self.pos];
        let bare = String::from_utf8_lossy(&raw[1..]);
        let value = crate::lexer::decode_name_escapes(&bare).into_bytes();
        ContentToken::new(TokenKind::Other, raw.to_vec(), value)
    }

    fn take_regular_run(&mut self) -> ContentToken {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if is_whitespace(b) || is_delimiter(b) {
                break;
            }
            self.pos += 1;
        }
        let raw = &self.data[start..self.pos];

        // Numbers are operands, not operators
        let kind = if looks_like_number(raw) { TokenKind::Other } else { TokenKind::Word };
        ContentToken::new(kind, raw.to_vec(), Vec::new())
    }

    /// Consume inline image data after `ID` up to and including `EI`.
    ///
    /// The binary payload must not be tokenized: a stray `(` inside it would
    /// desynchronize everything after the image.
    fn take_inline_image_data(&mut self) -> ContentToken {
        let start = self.pos;
        let data = &self.data[self.pos..];

        // EI preceded by whitespace, followed by whitespace or EOF
        let mut i = 0;
        while i + 2 <= data.len() {
            if &data[i..i + 2] == b"EI"
                && (i == 0 || is_whitespace(data[i - 1]))
                && (i + 2 == data.len() || is_whitespace(data[i + 2]) || is_delimiter(data[i + 2]))
            {
                self.pos += i + 2;
                return ContentToken::new(
                    TokenKind::Other,
                    self.data[start..self.pos].to_vec(),
                    Vec::new(),
                );
            }
            i += 1;
        }

        // No terminator: rest of the stream is the token
        self.pos = self.data.len();
        ContentToken::new(TokenKind::Other, self.data[start..].to_vec(), Vec::new())
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = ContentToken;

    fn next(&mut self) -> Option<ContentToken> {
        let b = self.peek()?;

        if self.inline_image {
            self.inline_image = false;
            return Some(self.take_inline_image_data());
        }

        let tok = match b {
            _ if is_whitespace(b) || b == b'%' => self.take_space(),
            b'(' => self.take_literal_string(),
            b'<' => {
                if self.data.get(self.pos + 1) == Some(&b'<') {
                    self.pos += 2;
                    ContentToken::new(TokenKind::Other, b"<<".to_vec(), Vec::new())
                } else {
                    self.take_hex_string()
                }
            },
            b'>' => {
                if self.data.get(self.pos + 1) == Some(&b'>') {
                    self.pos += 2;
                    ContentToken::new(TokenKind::Other, b">>".to_vec(), Vec::new())
                } else {
                    self.pos += 1;
                    ContentToken::new(TokenKind::Other, vec![b], Vec::new())
                }
            },
            b'/' => self.take_name(),
            b'[' | b']' | b'{' | b'}' | b')' => {
                self.pos += 1;
                ContentToken::new(TokenKind::Other, vec![b], Vec::new())
            },
            _ => self.take_regular_run(),
        };

        if tok.is_word(b"ID") {
            self.inline_image = true;
        }

        Some(tok)
    }
}

fn looks_like_number(raw: &[u8]) -> bool {
    if raw.is_empty() {
        return false;
    }
    let body = match raw[0] {
        b'+' | b'-' => &raw[1..],
        _ => raw,
    };
    !body.is_empty()
        && body.iter().all(|&b| b.is_ascii_digit() || b == b'.')
        && body.iter().any(|&b| b.is_ascii_digit())
}
