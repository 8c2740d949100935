//! The token-level redaction filter.
//!
//! A small state machine driven by one content token at a time. Tokens are
//! buffered in a stack of frames; a frame holds the raw bytes of a region
//! that may still be discarded (an operator instruction, a `BT`/`ET` text
//! object, or a `q`/`Q` block) together with the decoded text collected from
//! its string operands. When a region closes, its frame is either merged
//! into the parent byte-for-byte or dropped entirely.
//!
//! The bottom frame is never discarded; it accumulates the stream output.
//! Its match state is reported to the caller instead, which is how stream
//! and page scoped redaction detect a hit without modifying anything.

use crate::content::{encode_string_token, ContentToken, TokenKind};
use crate::redact::Scope;
use regex::bytes::Regex;

#[derive(Default)]
struct Frame {
    /// Raw bytes buffered for this region
    raw: Vec<u8>,
    /// Decoded text of the string operands seen in this region
    text: Vec<u8>,
    /// Set when a single string operand already matched on its own
    redact: bool,
}

/// Scope-aware redaction filter over one content stream.
pub struct RedactionFilter<'a> {
    pattern: &'a Regex,
    scope: Scope,
    stack: Vec<Frame>,
    /// Swallow exactly one whitespace token after a discarded region
    trim: bool,
}

impl<'a> RedactionFilter<'a> {
    pub fn new(pattern: &'a Regex, scope: Scope) -> Self {
        Self {
            pattern,
            scope,
            stack: vec![Frame::default()],
            trim: false,
        }
    }

    /// Feed the next token of the stream.
    pub fn handle_token(&mut self, token: ContentToken) {
        match token.kind {
            TokenKind::Word => {
                if token.is_word(b"BT") {
                    self.start(Scope::TextObject, token);
                } else if token.is_word(b"ET") {
                    self.end(Scope::TextObject, token);
                } else if token.is_word(b"q") {
                    self.start(Scope::GraphicsState, token);
                } else if token.is_word(b"Q") {
                    self.end(Scope::GraphicsState, token);
                } else {
                    // Any other word terminates the instruction its
                    // operands belong to
                    self.end(Scope::Operator, token);
                }
            },
            TokenKind::Space => {
                if !self.trim {
                    self.add(token);
                }
                self.trim = false;
            },
            TokenKind::Str => {
                if self.scope == Scope::Match {
                    // Substitute in place and re-encode; nothing is
                    // buffered. Strings without a match keep their original
                    // raw bytes, so a clean stream passes through unchanged
                    // whatever encoding its strings use.
                    if self.pattern.is_match(&token.value) {
                        let replaced = self.pattern.replace_all(&token.value, &b""[..]);
                        self.add(encode_string_token(&replaced));
                    } else {
                        self.add(token);
                    }
                } else {
                    self.start(Scope::Operator, token);
                }
            },
            TokenKind::Other => {
                // Operands may precede their operator; operator regions do
                // not nest so restarting here is a no-op
                self.start(Scope::Operator, token);
            },
        }
    }

    /// Flush all open regions and emit the stream.
    ///
    /// Returns the rewritten bytes and whether the stream as a whole
    /// contained a match. The filter is reset and can process another
    /// stream afterwards.
    pub fn finish(&mut self) -> (Vec<u8>, bool) {
        while self.stack.len() > 1 {
            self.flush();
        }

        // Bottom frame always exists
        let bottom = self.stack.pop().unwrap_or_default();
        let matched = bottom.redact || self.pattern.is_match(&bottom.text);

        self.stack.push(Frame::default());
        self.trim = false;

        (bottom.raw, matched)
    }

    /// Append a token to the innermost frame.
    fn add(&mut self, token: ContentToken) {
        // Stack is never empty
        let top = match self.stack.last_mut() {
            Some(f) => f,
            None => return,
        };
        if token.kind == TokenKind::Str {
            top.text.extend_from_slice(&token.value);
            if self.pattern.is_match(&token.value) {
                top.redact = true;
            }
        }
        top.raw.extend_from_slice(&token.raw);
        self.trim = false;
    }

    /// Open a region if `scope` is the configured scope, then add the token.
    fn start(&mut self, scope: Scope, token: ContentToken) {
        if self.scope == scope && (scope.nestable() || self.stack.len() == 1) {
            self.stack.push(Frame::default());
        }
        self.add(token);
    }

    /// Add the token, then close the innermost region if `scope` is the
    /// configured scope. An end marker with no open region is a plain token.
    fn end(&mut self, scope: Scope, token: ContentToken) {
        self.add(token);
        if self.scope == scope && self.stack.len() > 1 {
            self.flush();
        }
    }

    /// Close the innermost region: merge it into the parent, or discard it
    /// when its text matched.
    fn flush(&mut self) {
        let top = match self.stack.pop() {
            Some(f) => f,
            None => return,
        };

        if top.redact || self.pattern.is_match(&top.text) {
            // Discarded; also swallow the following whitespace so two
            // deletions do not leave a double space behind
            self.trim = true;
        } else if let Some(parent) = self.stack.last_mut() {
            parent.raw.extend_from_slice(&top.raw);
            parent.text.extend_from_slice(&top.text);
            self.trim = false;
        }
    }
}
