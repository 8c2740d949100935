//! Scope-aware content redaction.
//!
//! The submodules implement three layers:
//! - [`filter`]: the token-level state machine that rewrites one stream
//! - [`stream`]: runs the filter over a stream and decides its fate
//! - [`page`]: applies stream decisions across pages, forms, and the
//!   document

mod filter;
mod page;
mod stream;

pub use filter::RedactionFilter;
pub use page::{redact_document, redact_page, RedactionSummary};
pub use stream::{apply_to_stream, StreamAction};

/// Granularity at which matching content is removed.
///
/// Ordered from narrowest to widest. The two block scopes (`TextObject`,
/// `GraphicsState`) correspond to operators that can nest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Scope {
    /// Remove only the matched text from string operands
    Match,
    /// Remove the operator instruction containing a match
    Operator,
    /// Remove the enclosing `BT`/`ET` text object
    TextObject,
    /// Remove the enclosing `q`/`Q` graphics-state block
    GraphicsState,
    /// Drop the whole content stream
    Stream,
    /// Delete the whole page
    Page,
}

impl Scope {
    /// Flag characters accepted on the command line, in scope order.
    pub const FLAGS: &'static str = "motqsp";

    /// Whether this scope's block operators can nest.
    pub fn nestable(self) -> bool {
        matches!(self, Scope::TextObject | Scope::GraphicsState)
    }

    /// Map a command-line flag character to its scope.
    pub fn from_flag(flag: char) -> Option<Scope> {
        match flag {
            'm' => Some(Scope::Match),
            'o' => Some(Scope::Operator),
            't' => Some(Scope::TextObject),
            'q' => Some(Scope::GraphicsState),
            's' => Some(Scope::Stream),
            'p' => Some(Scope::Page),
            _ => None,
        }
    }
}
