//! Page and document orchestration.
//!
//! Applies the stream driver across a page's content streams and its form
//! XObjects, then across the whole document.

use crate::document::PdfDocument;
use crate::error::Result;
use crate::object::ObjectRef;
use crate::redact::{apply_to_stream, Scope, StreamAction};
use regex::bytes::Regex;
use std::collections::HashSet;

/// Counters for one redaction run, logged at the end.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RedactionSummary {
    pub pages_removed: usize,
    pub streams_dropped: usize,
    pub streams_rewritten: usize,
}

/// Redact one page. Returns true when the page itself must be deleted.
///
/// Each direct content stream runs through the driver: `DropPage`
/// short-circuits without touching the remaining streams, `DropStream`
/// omits the stream from the page, and `Keep` writes back any rewrite.
/// Form XObjects reachable from the page are processed recursively.
pub fn redact_page(
    doc: &mut PdfDocument,
    page: ObjectRef,
    pattern: &Regex,
    scope: Scope,
) -> Result<bool> {
    let mut summary = RedactionSummary::default();
    let mut visited = HashSet::new();
    let drop = redact_page_inner(doc, page, pattern, scope, &mut summary, &mut visited)?;
    Ok(drop)
}

fn redact_page_inner(
    doc: &mut PdfDocument,
    page: ObjectRef,
    pattern: &Regex,
    scope: Scope,
    summary: &mut RedactionSummary,
    visited: &mut HashSet<ObjectRef>,
) -> Result<bool> {
    let mut kept = Vec::new();

    for stream_ref in doc.content_streams(page)? {
        let data = doc.stream_data(stream_ref)?;
        match apply_to_stream(&data, pattern, scope)? {
            StreamAction::DropPage => {
                log::debug!("page {} flagged for deletion by stream {}", page, stream_ref);
                return Ok(true);
            },
            StreamAction::DropStream => {
                log::debug!("dropping content stream {}", stream_ref);
                summary.streams_dropped += 1;
            },
            StreamAction::Keep(rewritten) => {
                if rewritten != data {
                    doc.set_stream_data(stream_ref, &rewritten)?;
                    summary.streams_rewritten += 1;
                }
                kept.push(stream_ref);
            },
        }
    }

    doc.set_content_streams(page, &kept)?;

    for (name, form_ref) in doc.form_xobjects(page)? {
        if !visited.insert(form_ref) {
            log::warn!("form XObject cycle at {}, skipping", form_ref);
            continue;
        }
        log::debug!("descending into form XObject /{} ({})", name, form_ref);
        if redact_form(doc, form_ref, pattern, scope, summary, visited)? {
            return Ok(true);
        }
    }

    Ok(false)
}

/// Redact one form XObject. Returns true when the match escalates to
/// deleting the host page.
///
/// A form is a single stream, so `DropStream` cannot remove it from the
/// page's resources without breaking references to it. Instead its content
/// is emptied in place.
fn redact_form(
    doc: &mut PdfDocument,
    form: ObjectRef,
    pattern: &Regex,
    scope: Scope,
    summary: &mut RedactionSummary,
    visited: &mut HashSet<ObjectRef>,
) -> Result<bool> {
    let data = doc.stream_data(form)?;
    match apply_to_stream(&data, pattern, scope)? {
        StreamAction::DropPage => return Ok(true),
        StreamAction::DropStream => {
            log::debug!("emptying form XObject {}", form);
            doc.set_stream_data(form, b"")?;
            summary.streams_dropped += 1;
        },
        StreamAction::Keep(rewritten) => {
            if rewritten != data {
                doc.set_stream_data(form, &rewritten)?;
                summary.streams_rewritten += 1;
            }
        },
    }

    for (name, nested) in doc.form_xobjects(form)? {
        if !visited.insert(nested) {
            log::warn!("form XObject cycle at {}, skipping", nested);
            continue;
        }
        log::debug!("descending into nested form /{} ({})", name, nested);
        if redact_form(doc, nested, pattern, scope, summary, visited)? {
            return Ok(true);
        }
    }

    Ok(false)
}

/// Redact every page of the document and prune what is no longer used.
pub fn redact_document(
    doc: &mut PdfDocument,
    pattern: &Regex,
    scope: Scope,
) -> Result<RedactionSummary> {
    let mut summary = RedactionSummary::default();
    let mut doomed = Vec::new();

    for page in doc.pages()? {
        // Fresh cycle guard per page: a form shared between pages must be
        // able to flag each of them
        let mut visited = HashSet::new();
        if redact_page_inner(doc, page, pattern, scope, &mut summary, &mut visited)? {
            doomed.push(page);
        }
    }

    for page in doomed {
        doc.remove_page(page)?;
        summary.pages_removed += 1;
    }

    doc.remove_unreferenced_resources()?;

    log::info!(
        "redaction complete: {} pages removed, {} streams dropped, {} streams rewritten",
        summary.pages_removed,
        summary.streams_dropped,
        summary.streams_rewritten
    );

    Ok(summary)
}
