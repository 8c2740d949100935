//! End-to-end redaction tests.
//!
//! Each test assembles a small PDF in memory, runs the document-level
//! redaction, saves, and re-opens the result to check what survived.

use pdf_redact::writer::ObjectSerializer;
use pdf_redact::{redact_document, Object, ObjectRef, PdfDocument, Scope};
use regex::bytes::Regex;
use std::collections::HashMap;

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap()
}

fn content_stream(data: &[u8]) -> Object {
    Object::Stream {
        dict: HashMap::new(),
        data: bytes::Bytes::copy_from_slice(data),
    }
}

/// Assemble a PDF from objects numbered 1..=n (object 1 must be the
/// catalog referenced by the trailer).
fn assemble(objects: Vec<Object>) -> Vec<u8> {
    let serializer = ObjectSerializer::new();
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");

    let mut offsets = Vec::new();
    for (i, obj) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(&serializer.serialize_indirect(i as u32 + 1, 0, obj));
    }

    let xref_offset = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!("trailer\n<< /Size {} /Root 1 0 R >>\n", objects.len() + 1).as_bytes(),
    );
    out.extend_from_slice(format!("startxref\n{}\n%%EOF\n", xref_offset).as_bytes());
    out
}

fn catalog() -> Object {
    ObjectSerializer::dict(vec![
        ("Type", ObjectSerializer::name("Catalog")),
        ("Pages", ObjectSerializer::reference(2, 0)),
    ])
}

fn pages_node(kids: Vec<u32>) -> Object {
    ObjectSerializer::dict(vec![
        ("Type", ObjectSerializer::name("Pages")),
        (
            "Kids",
            ObjectSerializer::array(kids.iter().map(|id| ObjectSerializer::reference(*id, 0)).collect()),
        ),
        ("Count", ObjectSerializer::integer(kids.len() as i64)),
    ])
}

fn page(contents: Vec<u32>, extra: Vec<(&str, Object)>) -> Object {
    let contents_obj = if contents.len() == 1 {
        ObjectSerializer::reference(contents[0], 0)
    } else {
        ObjectSerializer::array(
            contents.iter().map(|id| ObjectSerializer::reference(*id, 0)).collect(),
        )
    };
    let mut entries = vec![
        ("Type", ObjectSerializer::name("Page")),
        ("Parent", ObjectSerializer::reference(2, 0)),
        ("Contents", contents_obj),
    ];
    entries.extend(extra);
    ObjectSerializer::dict(entries)
}

/// One page, one content stream: objects 1=catalog, 2=pages, 3=page, 4=stream.
fn single_page_pdf(content: &[u8]) -> Vec<u8> {
    assemble(vec![
        catalog(),
        pages_node(vec![3]),
        page(vec![4], vec![]),
        content_stream(content),
    ])
}

fn first_page_content(pdf: Vec<u8>) -> Vec<u8> {
    let mut doc = PdfDocument::from_bytes(pdf).unwrap();
    let pages = doc.pages().unwrap();
    let streams = doc.content_streams(pages[0]).unwrap();
    let mut data = Vec::new();
    for s in streams {
        data.extend_from_slice(&doc.stream_data(s).unwrap());
    }
    data
}

fn redact_and_save(pdf: Vec<u8>, pattern: &str, scope: Scope) -> Vec<u8> {
    let mut doc = PdfDocument::from_bytes(pdf).unwrap();
    redact_document(&mut doc, &re(pattern), scope).unwrap();
    doc.save_to_bytes().unwrap()
}

#[test]
fn untouched_document_when_nothing_matches() {
    let content: &[u8] = b"BT /F1 12 Tf (public notice) Tj ET\nq 0.5 0 0 0.5 10 10 cm Q\n";
    for scope in [
        Scope::Match,
        Scope::Operator,
        Scope::TextObject,
        Scope::GraphicsState,
        Scope::Stream,
        Scope::Page,
    ] {
        let mut doc = PdfDocument::from_bytes(single_page_pdf(content)).unwrap();
        let summary = redact_document(&mut doc, &re("absent"), scope).unwrap();
        assert_eq!(summary.pages_removed, 0);
        assert_eq!(summary.streams_dropped, 0);
        assert_eq!(summary.streams_rewritten, 0);

        let saved = doc.save_to_bytes().unwrap();
        assert_eq!(first_page_content(saved), content);
    }
}

#[test]
fn match_scope_removes_only_the_text() {
    let saved = redact_and_save(
        single_page_pdf(b"BT (account 1234 closed) Tj ET"),
        "[0-9]{4}",
        Scope::Match,
    );
    assert_eq!(first_page_content(saved), b"BT (account  closed) Tj ET");
}

#[test]
fn match_scope_is_idempotent() {
    let once = redact_and_save(
        single_page_pdf(b"(secret one) Tj (keep) Tj"),
        "secret",
        Scope::Match,
    );
    let content_once = first_page_content(once.clone());

    let twice = redact_and_save(once, "secret", Scope::Match);
    assert_eq!(first_page_content(twice), content_once);
}

#[test]
fn operator_scope_removes_whole_instruction() {
    let saved = redact_and_save(
        single_page_pdf(b"(keep) Tj (secret) Tj (also keep) Tj"),
        "secret",
        Scope::Operator,
    );
    assert_eq!(first_page_content(saved), b"(keep) Tj (also keep) Tj");
}

#[test]
fn nesting_graphics_state_vs_operator() {
    let content: &[u8] = b"q 1 0 0 1 0 0 cm (secret) Tj Q (after) Tj";

    let block = redact_and_save(single_page_pdf(content), "secret", Scope::GraphicsState);
    assert_eq!(first_page_content(block), b"(after) Tj");

    let op = redact_and_save(single_page_pdf(content), "secret", Scope::Operator);
    assert_eq!(first_page_content(op), b"q 1 0 0 1 0 0 cm Q (after) Tj");
}

#[test]
fn text_object_scope_keeps_siblings() {
    let saved = redact_and_save(
        single_page_pdf(b"BT (secret) Tj ET BT (public) Tj ET"),
        "secret",
        Scope::TextObject,
    );
    assert_eq!(first_page_content(saved), b"BT (public) Tj ET");
}

#[test]
fn page_scope_removes_matching_page_only() {
    // Two pages: objects 3/5 are pages, 4/6 their streams
    let pdf = assemble(vec![
        catalog(),
        pages_node(vec![3, 5]),
        page(vec![4], vec![]),
        content_stream(b"BT (secret data) Tj ET"),
        page(vec![6], vec![]),
        content_stream(b"BT (public data) Tj ET"),
    ]);

    let mut doc = PdfDocument::from_bytes(pdf).unwrap();
    let summary = redact_document(&mut doc, &re("secret"), Scope::Page).unwrap();
    assert_eq!(summary.pages_removed, 1);

    let saved = doc.save_to_bytes().unwrap();
    let mut reopened = PdfDocument::from_bytes(saved.clone()).unwrap();
    let pages = reopened.pages().unwrap();
    assert_eq!(pages.len(), 1);
    assert_eq!(first_page_content(saved.clone()), b"BT (public data) Tj ET");

    // The removed page and its stream are garbage collected
    let text = String::from_utf8_lossy(&saved);
    assert!(!text.contains("3 0 obj"));
    assert!(!text.contains("4 0 obj"));
}

#[test]
fn stream_scope_drops_only_the_matching_stream() {
    let pdf = assemble(vec![
        catalog(),
        pages_node(vec![3]),
        page(vec![4, 5], vec![]),
        content_stream(b"BT (secret) Tj ET\n"),
        content_stream(b"BT (public) Tj ET\n"),
    ]);

    let mut doc = PdfDocument::from_bytes(pdf).unwrap();
    let summary = redact_document(&mut doc, &re("secret"), Scope::Stream).unwrap();
    assert_eq!(summary.streams_dropped, 1);
    assert_eq!(summary.pages_removed, 0);

    let saved = doc.save_to_bytes().unwrap();
    // Only the clean stream remains, byte for byte
    assert_eq!(first_page_content(saved), b"BT (public) Tj ET\n");
}

#[test]
fn page_scope_short_circuits_remaining_streams() {
    // The first stream flags the page; the second would fail to decode.
    // Short-circuiting means the run still succeeds because the second
    // stream is never touched.
    let undecodable = {
        let mut dict = HashMap::new();
        dict.insert("Filter".to_string(), Object::Name("LZWDecode".to_string()));
        Object::Stream {
            dict,
            data: bytes::Bytes::from_static(b"\x80\x0B\x60\x50"),
        }
    };
    let pdf = assemble(vec![
        catalog(),
        pages_node(vec![3]),
        page(vec![4, 5], vec![]),
        content_stream(b"BT (secret) Tj ET"),
        undecodable,
    ]);

    let mut doc = PdfDocument::from_bytes(pdf).unwrap();
    let summary = redact_document(&mut doc, &re("secret"), Scope::Page).unwrap();
    assert_eq!(summary.pages_removed, 1);
    assert!(doc.pages().unwrap().is_empty());

    // Both streams go with the page
    let saved = doc.save_to_bytes().unwrap();
    let text = String::from_utf8_lossy(&saved);
    assert!(!text.contains("LZWDecode"));
}

#[test]
fn form_match_escalates_to_page_at_page_scope() {
    // Page content is clean; the match hides inside a form XObject
    let form = {
        let mut dict = HashMap::new();
        dict.insert("Type".to_string(), Object::Name("XObject".to_string()));
        dict.insert("Subtype".to_string(), Object::Name("Form".to_string()));
        Object::Stream {
            dict,
            data: bytes::Bytes::from_static(b"BT (secret inside form) Tj ET"),
        }
    };
    let resources = ObjectSerializer::dict(vec![(
        "XObject",
        ObjectSerializer::dict(vec![("Fm0", ObjectSerializer::reference(5, 0))]),
    )]);
    let pdf = assemble(vec![
        catalog(),
        pages_node(vec![3]),
        page(vec![4], vec![("Resources", resources)]),
        content_stream(b"/Fm0 Do"),
        form,
    ]);

    let mut doc = PdfDocument::from_bytes(pdf).unwrap();
    let summary = redact_document(&mut doc, &re("secret"), Scope::Page).unwrap();
    assert_eq!(summary.pages_removed, 1);
    assert!(doc.pages().unwrap().is_empty());
}

#[test]
fn form_emptied_in_place_at_stream_scope() {
    let form = {
        let mut dict = HashMap::new();
        dict.insert("Type".to_string(), Object::Name("XObject".to_string()));
        dict.insert("Subtype".to_string(), Object::Name("Form".to_string()));
        Object::Stream {
            dict,
            data: bytes::Bytes::from_static(b"BT (secret inside form) Tj ET"),
        }
    };
    let resources = ObjectSerializer::dict(vec![(
        "XObject",
        ObjectSerializer::dict(vec![("Fm0", ObjectSerializer::reference(5, 0))]),
    )]);
    let pdf = assemble(vec![
        catalog(),
        pages_node(vec![3]),
        page(vec![4], vec![("Resources", resources)]),
        content_stream(b"/Fm0 Do"),
        form,
    ]);

    let mut doc = PdfDocument::from_bytes(pdf).unwrap();
    let summary = redact_document(&mut doc, &re("secret"), Scope::Stream).unwrap();
    assert_eq!(summary.pages_removed, 0);
    assert_eq!(summary.streams_dropped, 1);

    let saved = doc.save_to_bytes().unwrap();
    let mut reopened = PdfDocument::from_bytes(saved).unwrap();
    let pages = reopened.pages().unwrap();
    assert_eq!(pages.len(), 1);
    // The page still draws the form, but the form is now empty
    assert_eq!(reopened.stream_data(ObjectRef::new(5, 0)).unwrap(), b"");
    let streams = reopened.content_streams(pages[0]).unwrap();
    assert_eq!(reopened.stream_data(streams[0]).unwrap(), b"/Fm0 Do");
}

#[test]
fn unused_font_is_pruned_after_redaction() {
    let font = |name: &str| {
        ObjectSerializer::dict(vec![
            ("Type", ObjectSerializer::name("Font")),
            ("Subtype", ObjectSerializer::name("Type1")),
            ("BaseFont", ObjectSerializer::name(name)),
        ])
    };
    let resources = ObjectSerializer::dict(vec![(
        "Font",
        ObjectSerializer::dict(vec![
            ("F1", ObjectSerializer::reference(5, 0)),
            ("F2", ObjectSerializer::reference(6, 0)),
        ]),
    )]);
    let pdf = assemble(vec![
        catalog(),
        pages_node(vec![3]),
        page(vec![4], vec![("Resources", resources)]),
        content_stream(b"BT /F1 12 Tf (keep) Tj ET BT /F2 12 Tf (secret) Tj ET"),
        font("Helvetica"),
        font("Courier"),
    ]);

    let saved = redact_and_save(pdf, "secret", Scope::TextObject);
    let text = String::from_utf8_lossy(&saved);

    // F1 and its font object survive; F2's font object is unreachable
    assert!(text.contains("/F1"));
    assert!(!text.contains("/F2"));
    assert!(text.contains("Helvetica"));
    assert!(!text.contains("Courier"));
}

#[test]
fn on_disk_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let infile = dir.path().join("input.pdf");
    std::fs::write(&infile, single_page_pdf(b"(keep) Tj (secret) Tj")).unwrap();

    let mut doc = PdfDocument::open(&infile).unwrap();
    redact_document(&mut doc, &re("secret"), Scope::Operator).unwrap();

    // In-place pattern: temporary sibling, then rename over the input
    let tmp = dir.path().join("input.pdf~");
    doc.save(&tmp).unwrap();
    std::fs::rename(&tmp, &infile).unwrap();

    let reopened = std::fs::read(&infile).unwrap();
    assert_eq!(first_page_content(reopened), b"(keep) Tj");
}

#[test]
fn unsupported_filter_aborts_cleanly() {
    let stream = {
        let mut dict = HashMap::new();
        dict.insert("Filter".to_string(), Object::Name("LZWDecode".to_string()));
        Object::Stream {
            dict,
            data: bytes::Bytes::from_static(b"\x80\x0B\x60\x50"),
        }
    };
    let pdf = assemble(vec![catalog(), pages_node(vec![3]), page(vec![4], vec![]), stream]);

    let mut doc = PdfDocument::from_bytes(pdf).unwrap();
    match redact_document(&mut doc, &re("x"), Scope::Match) {
        Err(pdf_redact::Error::UnsupportedFilter(name)) => assert_eq!(name, "LZWDecode"),
        other => panic!("expected UnsupportedFilter, got {:?}", other.map(|_| ())),
    }
}
