//! Stream redaction driver.
//!
//! Runs the filter over one decoded content stream and turns the result
//! into a decision the orchestrator can act on.

use crate::content::Tokenizer;
use crate::error::Result;
use crate::redact::{RedactionFilter, Scope};
use regex::bytes::Regex;

/// Outcome of redacting a single content stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamAction {
    /// Keep the stream with these (possibly rewritten) bytes
    Keep(Vec<u8>),
    /// Drop this stream from its page
    DropStream,
    /// Delete the whole page containing this stream
    DropPage,
}

/// Redact one decoded content stream at the given scope.
///
/// At `Stream` and `Page` scope the filter only detects; the returned
/// `Keep` bytes are identical to the input. At narrower scopes the bytes
/// carry the rewrite.
pub fn apply_to_stream(data: &[u8], pattern: &Regex, scope: Scope) -> Result<StreamAction> {
    let mut filter = RedactionFilter::new(pattern, scope);
    for token in Tokenizer::new(data) {
        filter.handle_token(token);
    }
    let (rewritten, matched) = filter.finish();

    if matched {
        match scope {
            Scope::Page => return Ok(StreamAction::DropPage),
            Scope::Stream => return Ok(StreamAction::DropStream),
            _ => {},
        }
    }

    Ok(StreamAction::Keep(rewritten))
}
