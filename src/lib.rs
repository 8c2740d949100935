//! # pdf_redact
//!
//! Scope-aware text redaction for PDF content streams.
//!
//! Given a regular expression and a scope, the library removes matching
//! content from a PDF at the chosen granularity:
//!
//! - `Match`: only the matched text inside string operands
//! - `Operator`: the whole instruction (operator plus operands)
//! - `TextObject`: the enclosing `BT`/`ET` block
//! - `GraphicsState`: the enclosing `q`/`Q` block
//! - `Stream`: the whole content stream
//! - `Page`: the whole page
//!
//! Streams that contain no match are preserved byte for byte.
//!
//! ## Quick start
//!
//! ```no_run
//! use pdf_redact::{redact_document, PdfDocument, Scope};
//!
//! let pattern = regex::bytes::Regex::new("confidential")?;
//! let mut doc = PdfDocument::open("report.pdf")?;
//! let summary = redact_document(&mut doc, &pattern, Scope::Operator)?;
//! println!("rewrote {} streams", summary.streams_rewritten);
//! doc.save("report-clean.pdf")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Limitations
//!
//! Encrypted files, cross-reference streams, object streams, and stream
//! filters other than FlateDecode/ASCIIHexDecode are rejected up front
//! with [`Error::Unsupported`] rather than producing partial output.

pub mod content;
pub mod decoders;
pub mod document;
pub mod error;
pub mod lexer;
pub mod object;
pub mod parser;
pub mod redact;
pub mod writer;
pub mod xref;

pub use document::PdfDocument;
pub use error::{Error, Result};
pub use object::{Object, ObjectRef};
pub use redact::{
    apply_to_stream, redact_document, redact_page, RedactionFilter, RedactionSummary, Scope,
    StreamAction,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
