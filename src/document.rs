//! PDF document: loading, mutation, and saving.
//!
//! [`PdfDocument`] reads the whole file into memory, resolves objects
//! lazily through the cross-reference table, and keeps every loaded or
//! modified object in a cache. Saving is always a full rewrite: header,
//! every object reachable from the trailer, a fresh xref table, and a new
//! trailer. Objects orphaned by page removal simply stop being reachable
//! and are dropped from the output.

use crate::error::{Error, Result};
use crate::object::{Object, ObjectRef};
use crate::parser::parse_object;
use crate::writer::ObjectSerializer;
use crate::xref::{find_xref_offset, parse_xref, CrossRefTable};
use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Write};
use std::path::Path;

/// An in-memory PDF document.
pub struct PdfDocument {
    buffer: Vec<u8>,
    version: String,
    xref: CrossRefTable,
    trailer: HashMap<String, Object>,
    /// Loaded and modified objects; entries here shadow the file bytes
    cache: HashMap<ObjectRef, Object>,
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("version", &self.version)
            .field("xref_entries", &self.xref.len())
            .field("cached_objects", &self.cache.len())
            .finish()
    }
}

impl PdfDocument {
    /// Open a PDF file from disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let buffer = std::fs::read(path.as_ref())?;
        Self::from_bytes(buffer)
    }

    /// Open a PDF from bytes already in memory.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidHeader` when the `%PDF-` magic is missing, with
    /// `Unsupported` for encrypted files or cross-reference streams, and
    /// with `InvalidXref` on a broken table.
    pub fn from_bytes(buffer: Vec<u8>) -> Result<Self> {
        let version = parse_header(&buffer)?;
        log::debug!("PDF version {}", version);

        let mut cursor = Cursor::new(&buffer);
        let xref_offset = find_xref_offset(&mut cursor)?;
        let (xref, trailer) = parse_xref(&mut cursor, xref_offset)?;

        if trailer.contains_key("Encrypt") {
            return Err(Error::Unsupported("encrypted documents".to_string()));
        }

        Ok(Self {
            buffer,
            version,
            xref,
            trailer,
            cache: HashMap::new(),
        })
    }

    /// The trailer dictionary.
    pub fn trailer(&self) -> &HashMap<String, Object> {
        &self.trailer
    }

    /// Load an indirect object, from cache when available.
    ///
    /// A reference to a free xref entry resolves to null, which is what the
    /// reference would mean to any reader.
    pub fn load_object(&mut self, obj_ref: ObjectRef) -> Result<Object> {
        if let Some(cached) = self.cache.get(&obj_ref) {
            return Ok(cached.clone());
        }

        let entry = self
            .xref
            .get(obj_ref.id)
            .ok_or(Error::ObjectNotFound(obj_ref.id, obj_ref.gen))?;

        if !entry.in_use {
            log::warn!("reference to free object {}, resolving to null", obj_ref);
            return Ok(Object::Null);
        }

        let offset = entry.offset as usize;
        if offset >= self.buffer.len() {
            return Err(Error::ParseError {
                offset,
                reason: format!("offset of object {} is past end of file", obj_ref),
            });
        }

        let object = parse_indirect_object(&self.buffer[offset..], obj_ref, offset)?;
        self.cache.insert(obj_ref, object.clone());
        Ok(object)
    }

    /// Resolve one level of indirection.
    pub fn resolve(&mut self, obj: &Object) -> Result<Object> {
        match obj {
            Object::Reference(r) => self.load_object(*r),
            other => Ok(other.clone()),
        }
    }

    /// Replace an object in the document.
    pub fn replace_object(&mut self, obj_ref: ObjectRef, obj: Object) {
        self.cache.insert(obj_ref, obj);
    }

    /// The document catalog reference from the trailer.
    fn root_ref(&self) -> Result<ObjectRef> {
        self.trailer
            .get("Root")
            .and_then(Object::as_reference)
            .ok_or_else(|| Error::InvalidPdf("trailer has no /Root reference".to_string()))
    }

    /// All page references in document order.
    ///
    /// Walks `/Root → /Pages` through intermediate `/Pages` nodes. A
    /// malformed tree with a cycle terminates with an error rather than
    /// looping.
    pub fn pages(&mut self) -> Result<Vec<ObjectRef>> {
        let root_ref = self.root_ref()?;
        let root = self.load_object(root_ref)?;
        let pages_ref = root
            .as_dict()
            .and_then(|d| d.get("Pages"))
            .and_then(Object::as_reference)
            .ok_or_else(|| Error::InvalidPdf("catalog has no /Pages reference".to_string()))?;

        let mut pages = Vec::new();
        let mut visited = HashSet::new();
        self.collect_pages(pages_ref, &mut pages, &mut visited)?;
        Ok(pages)
    }

    fn collect_pages(
        &mut self,
        node_ref: ObjectRef,
        pages: &mut Vec<ObjectRef>,
        visited: &mut HashSet<ObjectRef>,
    ) -> Result<()> {
        if !visited.insert(node_ref) {
            return Err(Error::InvalidPdf(format!("page tree cycle at {}", node_ref)));
        }

        let node = self.load_object(node_ref)?;
        let dict = node
            .as_dict()
            .ok_or_else(|| Error::InvalidPdf(format!("page tree node {} is not a dictionary", node_ref)))?;

        match dict.get("Type").and_then(Object::as_name) {
            Some("Pages") => {
                let kids: Vec<ObjectRef> = dict
                    .get("Kids")
                    .and_then(Object::as_array)
                    .map(|arr| arr.iter().filter_map(Object::as_reference).collect())
                    .unwrap_or_default();
                for kid in kids {
                    self.collect_pages(kid, pages, visited)?;
                }
            },
            Some("Page") => pages.push(node_ref),
            other => {
                log::warn!("page tree node {} has type {:?}, skipping", node_ref, other);
            },
        }

        Ok(())
    }

    /// References to a page's direct content streams.
    ///
    /// `/Contents` may be absent (empty page), a single reference, or an
    /// array of references.
    pub fn content_streams(&mut self, page: ObjectRef) -> Result<Vec<ObjectRef>> {
        let page_obj = self.load_object(page)?;
        let dict = page_obj
            .as_dict()
            .ok_or_else(|| Error::InvalidPdf(format!("page {} is not a dictionary", page)))?;

        match dict.get("Contents") {
            None => Ok(Vec::new()),
            Some(Object::Reference(r)) => {
                // A single reference may still point at an array
                match self.load_object(*r)? {
                    Object::Array(arr) => {
                        Ok(arr.iter().filter_map(Object::as_reference).collect())
                    },
                    _ => Ok(vec![*r]),
                }
            },
            Some(Object::Array(arr)) => Ok(arr.iter().filter_map(Object::as_reference).collect()),
            Some(other) => Err(Error::InvalidObjectType {
                expected: "Reference or Array".to_string(),
                found: other.type_name().to_string(),
            }),
        }
    }

    /// Store the page's `/Contents`: one stream directly, several as an
    /// array, none as an empty array.
    pub fn set_content_streams(&mut self, page: ObjectRef, streams: &[ObjectRef]) -> Result<()> {
        let mut page_obj = self.load_object(page)?;
        let dict = page_obj
            .as_dict_mut()
            .ok_or_else(|| Error::InvalidPdf(format!("page {} is not a dictionary", page)))?;

        let contents = if streams.len() == 1 {
            Object::Reference(streams[0])
        } else {
            Object::Array(streams.iter().map(|r| Object::Reference(*r)).collect())
        };
        dict.insert("Contents".to_string(), contents);

        self.cache.insert(page, page_obj);
        Ok(())
    }

    /// Form XObjects reachable from a page's (or form's) resources, as
    /// (resource name, reference) pairs sorted by name.
    pub fn form_xobjects(&mut self, owner: ObjectRef) -> Result<Vec<(String, ObjectRef)>> {
        let owner_obj = self.load_object(owner)?;
        let resources = match owner_obj.as_dict().and_then(|d| d.get("Resources")) {
            Some(res) => self.resolve(res)?,
            None => return Ok(Vec::new()),
        };
        let xobjects = match resources.as_dict().and_then(|d| d.get("XObject")) {
            Some(x) => self.resolve(x)?,
            None => return Ok(Vec::new()),
        };
        let entries: Vec<(String, ObjectRef)> = match xobjects.as_dict() {
            Some(d) => d
                .iter()
                .filter_map(|(name, obj)| obj.as_reference().map(|r| (name.clone(), r)))
                .collect(),
            None => return Ok(Vec::new()),
        };

        let mut forms = Vec::new();
        for (name, r) in entries {
            let obj = self.load_object(r)?;
            let is_form = obj
                .as_dict()
                .and_then(|d| d.get("Subtype"))
                .and_then(Object::as_name)
                == Some("Form");
            if is_form {
                forms.push((name, r));
            }
        }
        forms.sort();
        Ok(forms)
    }

    /// The decoded data of a stream object.
    pub fn stream_data(&mut self, stream: ObjectRef) -> Result<Vec<u8>> {
        self.load_object(stream)?.decode_stream_data()
    }

    /// Replace a stream's data. The new data is stored FlateDecode
    /// compressed with `/Filter` and `/Length` updated to match.
    pub fn set_stream_data(&mut self, stream: ObjectRef, data: &[u8]) -> Result<()> {
        let obj = self.load_object(stream)?;
        let mut dict = match &obj {
            Object::Stream { dict, .. } => dict.clone(),
            other => {
                return Err(Error::InvalidObjectType {
                    expected: "Stream".to_string(),
                    found: other.type_name().to_string(),
                });
            },
        };

        let compressed = crate::decoders::flate_encode(data)?;
        dict.insert("Filter".to_string(), Object::Name("FlateDecode".to_string()));
        dict.insert("Length".to_string(), Object::Integer(compressed.len() as i64));
        dict.remove("DecodeParms");

        self.cache.insert(
            stream,
            Object::Stream {
                dict,
                data: bytes::Bytes::from(compressed),
            },
        );
        Ok(())
    }

    /// Delete a page from the page tree, fixing `/Kids` on its parent and
    /// `/Count` on every ancestor.
    pub fn remove_page(&mut self, page: ObjectRef) -> Result<()> {
        let page_obj = self.load_object(page)?;
        let mut parent = page_obj
            .as_dict()
            .and_then(|d| d.get("Parent"))
            .and_then(Object::as_reference)
            .ok_or_else(|| Error::InvalidPdf(format!("page {} has no /Parent", page)))?;

        // Remove from the immediate parent's /Kids
        {
            let mut parent_obj = self.load_object(parent)?;
            let dict = parent_obj
                .as_dict_mut()
                .ok_or_else(|| Error::InvalidPdf(format!("node {} is not a dictionary", parent)))?;
            if let Some(Object::Array(kids)) = dict.get_mut("Kids") {
                kids.retain(|k| k.as_reference() != Some(page));
            }
            self.cache.insert(parent, parent_obj);
        }

        // Decrement /Count up the ancestor chain
        let mut guard = HashSet::new();
        loop {
            if !guard.insert(parent) {
                return Err(Error::InvalidPdf(format!("page tree cycle at {}", parent)));
            }

            let mut node_obj = self.load_object(parent)?;
            let dict = node_obj
                .as_dict_mut()
                .ok_or_else(|| Error::InvalidPdf(format!("node {} is not a dictionary", parent)))?;
            if let Some(count) = dict.get("Count").and_then(Object::as_integer) {
                dict.insert("Count".to_string(), Object::Integer(count - 1));
            }
            let next = dict.get("Parent").and_then(Object::as_reference);
            self.cache.insert(parent, node_obj);

            match next {
                Some(p) => parent = p,
                None => break,
            }
        }

        log::debug!("removed page {}", page);
        Ok(())
    }

    /// Drop `/Font`, `/XObject`, and `/ExtGState` resource entries whose
    /// names are never used by the content streams that can see them.
    ///
    /// Usage is collected per resources dictionary, so a dictionary shared
    /// between pages keeps an entry as long as any of its users still
    /// names it.
    pub fn remove_unreferenced_resources(&mut self) -> Result<()> {
        // owner of the resources -> union of names used by its users
        let mut used: HashMap<ResourcesSlot, HashSet<String>> = HashMap::new();

        let mut owners: Vec<ObjectRef> = self.pages()?;
        let mut seen_forms: HashSet<ObjectRef> = HashSet::new();
        let mut i = 0;
        while i < owners.len() {
            let owner = owners[i];
            i += 1;
            for (_, form) in self.form_xobjects(owner)? {
                if seen_forms.insert(form) {
                    owners.push(form);
                }
            }
        }

        for owner in &owners {
            let slot = self.resources_slot(*owner)?;
            let names = self.used_resource_names(*owner)?;
            used.entry(slot).or_default().extend(names);
        }

        for (slot, names) in used {
            self.prune_resources(slot, &names)?;
        }
        Ok(())
    }

    /// Where an owner's resources dictionary actually lives.
    fn resources_slot(&mut self, owner: ObjectRef) -> Result<ResourcesSlot> {
        let obj = self.load_object(owner)?;
        match obj.as_dict().and_then(|d| d.get("Resources")) {
            Some(Object::Reference(r)) => Ok(ResourcesSlot::Indirect(*r)),
            _ => Ok(ResourcesSlot::Inline(owner)),
        }
    }

    /// All names mentioned in the content stream(s) of a page or form.
    fn used_resource_names(&mut self, owner: ObjectRef) -> Result<HashSet<String>> {
        let obj = self.load_object(owner)?;
        let streams = if obj.is_stream() {
            vec![owner]
        } else {
            self.content_streams(owner)?
        };

        let mut names = HashSet::new();
        for s in streams {
            let data = self.stream_data(s)?;
            for token in crate::content::Tokenizer::new(&data) {
                if token.kind == crate::content::TokenKind::Other
                    && token.raw.first() == Some(&b'/')
                {
                    names.insert(String::from_utf8_lossy(&token.value).into_owned());
                }
            }
        }
        Ok(names)
    }

    fn prune_resources(&mut self, slot: ResourcesSlot, used: &HashSet<String>) -> Result<()> {
        let (target, key_path) = match slot {
            ResourcesSlot::Indirect(r) => (r, false),
            ResourcesSlot::Inline(owner) => (owner, true),
        };

        let mut obj = self.load_object(target)?;
        {
            let dict = match obj.as_dict_mut() {
                Some(d) => d,
                None => return Ok(()),
            };
            let resources = if key_path {
                match dict.get_mut("Resources").and_then(|o| match o {
                    Object::Dictionary(d) => Some(d),
                    _ => None,
                }) {
                    Some(d) => d,
                    None => return Ok(()),
                }
            } else {
                dict
            };

            for category in ["Font", "XObject", "ExtGState"] {
                if let Some(Object::Dictionary(entries)) = resources.get_mut(category) {
                    let before = entries.len();
                    entries.retain(|name, _| used.contains(name));
                    let removed = before - entries.len();
                    if removed > 0 {
                        log::debug!("pruned {} unused /{} entries", removed, category);
                    }
                }
            }
        }
        self.cache.insert(target, obj);
        Ok(())
    }

    /// Serialize the document to bytes: a complete rewrite containing every
    /// object reachable from the trailer.
    pub fn save_to_bytes(&mut self) -> Result<Vec<u8>> {
        self.load_all();

        let reachable = self.reachable_objects();
        let serializer = ObjectSerializer::new();

        let mut out = Vec::new();
        write!(out, "%PDF-{}\n", self.version)?;
        // Binary marker comment keeps transfer tools treating the file as
        // binary
        out.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");

        let mut ids: Vec<u32> = reachable.iter().map(|r| r.id).collect();
        ids.sort_unstable();
        ids.dedup();

        let mut offsets: HashMap<u32, u64> = HashMap::new();
        for id in &ids {
            let obj_ref = ObjectRef::new(*id, 0);
            let obj = match self.cache.get(&obj_ref) {
                Some(o) => o,
                None => continue,
            };
            offsets.insert(*id, out.len() as u64);
            // Every object is emitted at generation 0, so references into
            // older generations must be renumbered to match
            let obj = zero_reference_generations(obj);
            out.extend_from_slice(&serializer.serialize_indirect(*id, 0, &obj));
        }

        let xref_offset = out.len();
        write_xref_table(&mut out, &ids, &offsets)?;

        let mut trailer = HashMap::new();
        let size = ids.iter().max().map(|m| m + 1).unwrap_or(1);
        trailer.insert("Size".to_string(), Object::Integer(size as i64));
        if let Some(root) = self.trailer.get("Root") {
            trailer.insert("Root".to_string(), root.clone());
        }
        if let Some(info) = self.trailer.get("Info") {
            trailer.insert("Info".to_string(), info.clone());
        }

        write!(out, "trailer\n")?;
        out.extend_from_slice(
            &serializer.serialize(&zero_reference_generations(&Object::Dictionary(trailer))),
        );
        write!(out, "\nstartxref\n{}\n%%EOF\n", xref_offset)?;

        Ok(out)
    }

    /// Write the document to a file.
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.save_to_bytes()?;
        std::fs::write(path.as_ref(), bytes)?;
        Ok(())
    }

    /// Bring every in-use object into the cache so reachability can walk
    /// the full graph.
    fn load_all(&mut self) {
        let ids: Vec<u32> = self.xref.all_object_numbers().collect();
        for id in ids {
            let Some(entry) = self.xref.get(id) else { continue };
            if !entry.in_use {
                continue;
            }
            // Normalize to generation 0: the rewrite emits everything at
            // gen 0 anyway
            let obj_ref = ObjectRef::new(id, 0);
            if self.cache.contains_key(&obj_ref) {
                continue;
            }
            if let Err(e) = self.load_object(obj_ref) {
                log::warn!("skipping unloadable object {}: {}", obj_ref, e);
            }
        }
    }

    /// Objects reachable from the trailer's `/Root` and `/Info`.
    fn reachable_objects(&self) -> HashSet<ObjectRef> {
        let mut reachable = HashSet::new();
        let mut work: Vec<ObjectRef> = Vec::new();

        for key in ["Root", "Info"] {
            if let Some(r) = self.trailer.get(key).and_then(Object::as_reference) {
                work.push(r);
            }
        }

        while let Some(r) = work.pop() {
            if !reachable.insert(r) {
                continue;
            }
            // Objects are cached under gen 0 after a load_all pass
            let obj = self
                .cache
                .get(&r)
                .or_else(|| self.cache.get(&ObjectRef::new(r.id, 0)));
            if let Some(obj) = obj {
                collect_references(obj, &mut work);
            } else {
                log::warn!("reachable object {} missing from cache", r);
            }
        }

        reachable
    }
}

/// Identifies where a resources dictionary is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ResourcesSlot {
    /// Its own indirect object
    Indirect(ObjectRef),
    /// Inline in this page or form dictionary under `/Resources`
    Inline(ObjectRef),
}

/// Parse `id gen obj <object> endobj` at the start of `input`.
fn parse_indirect_object(input: &[u8], expected: ObjectRef, file_offset: usize) -> Result<Object> {
    use crate::lexer::{token, Token};

    let err = |reason: String| Error::ParseError { offset: file_offset, reason };

    let (rest, id_tok) =
        token(input).map_err(|e| err(format!("expected object number: {:?}", e)))?;
    let (rest, gen_tok) =
        token(rest).map_err(|e| err(format!("expected generation number: {:?}", e)))?;
    let (rest, obj_tok) = token(rest).map_err(|e| err(format!("expected obj keyword: {:?}", e)))?;

    match (&id_tok, &gen_tok, &obj_tok) {
        (Token::Integer(id), Token::Integer(_), Token::ObjStart) => {
            if *id as u32 != expected.id {
                log::warn!(
                    "object number mismatch at offset {}: expected {}, found {}",
                    file_offset,
                    expected.id,
                    id
                );
            }
        },
        _ => return Err(err("malformed indirect object header".to_string())),
    }

    let (_, object) = parse_object(rest)
        .map_err(|e| err(format!("failed to parse object body: {:?}", e)))?;
    Ok(object)
}

/// Validate the `%PDF-x.y` header and return the version string.
fn parse_header(buffer: &[u8]) -> Result<String> {
    let head = &buffer[..buffer.len().min(16)];
    if !head.starts_with(b"%PDF-") {
        let shown = String::from_utf8_lossy(&head[..head.len().min(8)]).into_owned();
        return Err(Error::InvalidHeader(shown));
    }
    let version: String = head[5..]
        .iter()
        .take_while(|&&b| b.is_ascii_digit() || b == b'.')
        .map(|&b| b as char)
        .collect();
    if version.is_empty() {
        return Err(Error::InvalidHeader(String::from_utf8_lossy(head).into_owned()));
    }
    Ok(version)
}

/// Clone `obj` with every reference generation reset to 0.
///
/// The rewrite serializes all objects at generation 0; a reference that
/// kept a generation from an incremental update would dangle.
fn zero_reference_generations(obj: &Object) -> Object {
    match obj {
        Object::Reference(r) => Object::Reference(ObjectRef::new(r.id, 0)),
        Object::Array(arr) => {
            Object::Array(arr.iter().map(zero_reference_generations).collect())
        },
        Object::Dictionary(dict) => Object::Dictionary(
            dict.iter()
                .map(|(k, v)| (k.clone(), zero_reference_generations(v)))
                .collect(),
        ),
        Object::Stream { dict, data } => Object::Stream {
            dict: dict
                .iter()
                .map(|(k, v)| (k.clone(), zero_reference_generations(v)))
                .collect(),
            data: data.clone(),
        },
        other => other.clone(),
    }
}

/// Append every reference inside `obj` to the worklist.
fn collect_references(obj: &Object, work: &mut Vec<ObjectRef>) {
    match obj {
        Object::Reference(r) => work.push(*r),
        Object::Array(arr) => {
            for item in arr {
                collect_references(item, work);
            }
        },
        Object::Dictionary(dict) | Object::Stream { dict, .. } => {
            for value in dict.values() {
                collect_references(value, work);
            }
        },
        _ => {},
    }
}

/// Emit a classic xref table with one subsection per contiguous id run.
fn write_xref_table(
    out: &mut Vec<u8>,
    ids: &[u32],
    offsets: &HashMap<u32, u64>,
) -> Result<()> {
    write!(out, "xref\n0 1\n0000000000 65535 f \n")?;

    let mut run_start = 0usize;
    while run_start < ids.len() {
        let mut run_end = run_start + 1;
        while run_end < ids.len() && ids[run_end] == ids[run_end - 1] + 1 {
            run_end += 1;
        }

        write!(out, "{} {}\n", ids[run_start], run_end - run_start)?;
        for id in &ids[run_start..run_end] {
            let offset = offsets.get(id).copied().unwrap_or(0);
            write!(out, "{:010} 00000 n \n", offset)?;
        }

        run_start = run_end;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_pdf() -> Vec<u8> {
        // One page with a single content stream, traditional xref
        let serializer = ObjectSerializer::new();
        let mut out = Vec::new();
        out.extend_from_slice(b"%PDF-1.4\n");

        let objects: Vec<(u32, Object)> = vec![
            (
                1,
                ObjectSerializer::dict(vec![
                    ("Type", ObjectSerializer::name("Catalog")),
                    ("Pages", ObjectSerializer::reference(2, 0)),
                ]),
            ),
            (
                2,
                ObjectSerializer::dict(vec![
                    ("Type", ObjectSerializer::name("Pages")),
                    ("Kids", ObjectSerializer::array(vec![ObjectSerializer::reference(3, 0)])),
                    ("Count", ObjectSerializer::integer(1)),
                ]),
            ),
            (
                3,
                ObjectSerializer::dict(vec![
                    ("Type", ObjectSerializer::name("Page")),
                    ("Parent", ObjectSerializer::reference(2, 0)),
                    ("Contents", ObjectSerializer::reference(4, 0)),
                ]),
            ),
            (4, {
                let mut dict = HashMap::new();
                dict.insert("Length".to_string(), Object::Integer(17));
                Object::Stream {
                    dict,
                    data: bytes::Bytes::from_static(b"BT (hello) Tj ET\n"),
                }
            }),
        ];

        let mut offsets = Vec::new();
        for (id, obj) in &objects {
            offsets.push((*id, out.len()));
            out.extend_from_slice(&serializer.serialize_indirect(*id, 0, obj));
        }

        let xref_offset = out.len();
        out.extend_from_slice(b"xref\n0 5\n0000000000 65535 f \n");
        for (_, offset) in &offsets {
            out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        out.extend_from_slice(b"trailer\n<< /Size 5 /Root 1 0 R >>\n");
        out.extend_from_slice(format!("startxref\n{}\n%%EOF\n", xref_offset).as_bytes());
        out
    }

    #[test]
    fn test_open_minimal() {
        let mut doc = PdfDocument::from_bytes(minimal_pdf()).unwrap();
        let pages = doc.pages().unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0], ObjectRef::new(3, 0));
    }

    #[test]
    fn test_header_rejected() {
        match PdfDocument::from_bytes(b"not a pdf at all".to_vec()) {
            Err(Error::InvalidHeader(_)) => {},
            other => panic!("expected InvalidHeader, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_encrypted_rejected() {
        let mut pdf = minimal_pdf();
        let pos = pdf.windows(9).position(|w| w == b"/Size 5 /").unwrap();
        let mut patched = pdf[..pos].to_vec();
        patched.extend_from_slice(b"/Encrypt 9 0 R /");
        patched.extend_from_slice(&pdf[pos + 9..]);
        pdf = patched;

        match PdfDocument::from_bytes(pdf) {
            Err(Error::Unsupported(what)) => assert!(what.contains("encrypted")),
            other => panic!("expected Unsupported, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_content_streams_single() {
        let mut doc = PdfDocument::from_bytes(minimal_pdf()).unwrap();
        let streams = doc.content_streams(ObjectRef::new(3, 0)).unwrap();
        assert_eq!(streams, vec![ObjectRef::new(4, 0)]);
        let data = doc.stream_data(streams[0]).unwrap();
        assert_eq!(data, b"BT (hello) Tj ET\n");
    }

    #[test]
    fn test_set_stream_data_round_trip() {
        let mut doc = PdfDocument::from_bytes(minimal_pdf()).unwrap();
        let stream = ObjectRef::new(4, 0);
        doc.set_stream_data(stream, b"BT (replaced) Tj ET").unwrap();
        assert_eq!(doc.stream_data(stream).unwrap(), b"BT (replaced) Tj ET");

        // The stored form is compressed
        match doc.load_object(stream).unwrap() {
            Object::Stream { dict, .. } => {
                assert_eq!(dict.get("Filter").unwrap().as_name(), Some("FlateDecode"));
            },
            other => panic!("expected stream, got {:?}", other),
        }
    }

    #[test]
    fn test_save_and_reopen() {
        let mut doc = PdfDocument::from_bytes(minimal_pdf()).unwrap();
        let saved = doc.save_to_bytes().unwrap();
        assert!(saved.starts_with(b"%PDF-1.4"));
        assert!(saved.ends_with(b"%%EOF\n"));

        let mut reopened = PdfDocument::from_bytes(saved).unwrap();
        let pages = reopened.pages().unwrap();
        assert_eq!(pages.len(), 1);
        let streams = reopened.content_streams(pages[0]).unwrap();
        assert_eq!(reopened.stream_data(streams[0]).unwrap(), b"BT (hello) Tj ET\n");
    }

    #[test]
    fn test_remove_page_updates_tree() {
        let mut doc = PdfDocument::from_bytes(minimal_pdf()).unwrap();
        doc.remove_page(ObjectRef::new(3, 0)).unwrap();

        assert!(doc.pages().unwrap().is_empty());
        let pages_node = doc.load_object(ObjectRef::new(2, 0)).unwrap();
        let dict = pages_node.as_dict().unwrap();
        assert_eq!(dict.get("Count").unwrap().as_integer(), Some(0));
        assert!(dict.get("Kids").unwrap().as_array().unwrap().is_empty());
    }

    #[test]
    fn test_removed_page_garbage_collected() {
        let mut doc = PdfDocument::from_bytes(minimal_pdf()).unwrap();
        doc.remove_page(ObjectRef::new(3, 0)).unwrap();
        let saved = doc.save_to_bytes().unwrap();

        // The page and its content stream are unreachable and must be gone
        let text = String::from_utf8_lossy(&saved);
        assert!(!text.contains("3 0 obj"));
        assert!(!text.contains("4 0 obj"));
        assert!(text.contains("1 0 obj"));
    }

    #[test]
    fn test_save_normalizes_reference_generations() {
        // Same document as minimal_pdf, but the content stream lives at
        // generation 1 (as after an incremental update) and the page
        // references it as `4 1 R`
        let serializer = ObjectSerializer::new();
        let mut out = Vec::new();
        out.extend_from_slice(b"%PDF-1.4\n");

        let objects: Vec<(u32, u16, Object)> = vec![
            (
                1,
                0,
                ObjectSerializer::dict(vec![
                    ("Type", ObjectSerializer::name("Catalog")),
                    ("Pages", ObjectSerializer::reference(2, 0)),
                ]),
            ),
            (
                2,
                0,
                ObjectSerializer::dict(vec![
                    ("Type", ObjectSerializer::name("Pages")),
                    ("Kids", ObjectSerializer::array(vec![ObjectSerializer::reference(3, 0)])),
                    ("Count", ObjectSerializer::integer(1)),
                ]),
            ),
            (
                3,
                0,
                ObjectSerializer::dict(vec![
                    ("Type", ObjectSerializer::name("Page")),
                    ("Parent", ObjectSerializer::reference(2, 0)),
                    ("Contents", ObjectSerializer::reference(4, 1)),
                ]),
            ),
            (4, 1, {
                Object::Stream {
                    dict: HashMap::new(),
                    data: bytes::Bytes::from_static(b"BT (hello) Tj ET\n"),
                }
            }),
        ];

        let mut offsets = Vec::new();
        for (id, gen, obj) in &objects {
            offsets.push((*gen, out.len()));
            out.extend_from_slice(&serializer.serialize_indirect(*id, *gen, obj));
        }

        let xref_offset = out.len();
        out.extend_from_slice(b"xref\n0 5\n0000000000 65535 f \n");
        for (gen, offset) in &offsets {
            out.extend_from_slice(format!("{:010} {:05} n \n", offset, gen).as_bytes());
        }
        out.extend_from_slice(b"trailer\n<< /Size 5 /Root 1 0 R >>\n");
        out.extend_from_slice(format!("startxref\n{}\n%%EOF\n", xref_offset).as_bytes());

        let mut doc = PdfDocument::from_bytes(out).unwrap();
        let saved = doc.save_to_bytes().unwrap();

        // The rewrite emits everything at generation 0, so no reference may
        // keep the old generation
        let text = String::from_utf8_lossy(&saved);
        assert!(!text.contains(" 1 R"));

        let mut reopened = PdfDocument::from_bytes(saved).unwrap();
        let pages = reopened.pages().unwrap();
        let streams = reopened.content_streams(pages[0]).unwrap();
        assert_eq!(streams, vec![ObjectRef::new(4, 0)]);
        assert_eq!(reopened.stream_data(streams[0]).unwrap(), b"BT (hello) Tj ET\n");
    }

    #[test]
    fn test_parse_header_versions() {
        assert_eq!(parse_header(b"%PDF-1.7\nrest").unwrap(), "1.7");
        assert!(parse_header(b"%PDF-x").is_err());
    }

    #[test]
    fn test_free_reference_resolves_to_null() {
        let mut doc = PdfDocument::from_bytes(minimal_pdf()).unwrap();
        // Object 0 is the free list head
        assert!(doc.load_object(ObjectRef::new(0, 65535)).unwrap().is_null());
    }
}
