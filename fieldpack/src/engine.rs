//! The pack/unpack engine.
//!
//! A [`Packer`] pairs one shared, immutable [`Schema`] with one owned
//! [`Values`] tree and a cursor over both. Encoding walks schema and values
//! together depth-first; decoding mirrors it, consuming an input buffer left
//! to right and preserving unknown tags as undefined children instead of
//! failing.

use crate::{
    codec::Body,
    error::Error,
    navigator,
    schema::{FieldId, FieldKind, Schema},
    value::{UndefinedChild, ValueId, Values},
};
use bytes::{Buf, Bytes, BytesMut};
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Bounded cursor over the input buffer during decoding.
///
/// Positions are absolute offsets into the whole message, so truncation
/// errors report where in the input decoding stopped.
struct Reader {
    buf: Bytes,
    pos: usize,
}

impl Reader {
    /// Runs a codec against the window `[pos, end)`, advancing `pos` by
    /// however many bytes the codec consumed and rebasing any buffer error
    /// onto the absolute offset.
    fn with_codec<T>(
        &mut self,
        end: usize,
        f: impl FnOnce(&mut dyn Buf) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let mut window: &[u8] = &self.buf[self.pos..end];
        let before = window.len();
        let result = f(&mut window).map_err(|e| e.offset(self.pos))?;
        self.pos += before - window.len();
        Ok(result)
    }
}

/// The pack/unpack engine: one schema, one value tree, one cursor.
///
/// Construct one per message; the schema may be shared across any number of
/// concurrently running packers.
#[derive(Debug)]
pub struct Packer<'s> {
    schema: &'s Schema,
    values: Values,
    cur_f: FieldId,
    cur_v: ValueId,
}

impl<'s> Packer<'s> {
    /// Creates an empty value tree over `schema`, focused on the root.
    pub fn new(schema: &'s Schema) -> Self {
        Self {
            schema,
            values: Values::new(schema),
            cur_f: Schema::ROOT,
            cur_v: Values::ROOT,
        }
    }

    pub fn schema(&self) -> &'s Schema {
        self.schema
    }

    pub fn values(&self) -> &Values {
        &self.values
    }

    /// Releases the value tree to the caller.
    pub fn into_values(self) -> Values {
        self.values
    }

    fn path(&self, id: FieldId) -> String {
        navigator::path(self.schema, id)
    }

    // ---- cursor -----------------------------------------------------------

    /// Moves the cursor to the root.
    pub fn root(&mut self) -> &mut Self {
        self.cur_f = Schema::ROOT;
        self.cur_v = Values::ROOT;
        self
    }

    /// Descends to the named child, creating its value node on first visit.
    /// With repeated tags, the cursor lands on the latest occurrence.
    pub fn child(&mut self, name: &str) -> Result<&mut Self, Error> {
        let fid = navigator::child_by_name(self.schema, self.cur_f, name)?;
        let vid = match self.values.last_occurrence(self.cur_v, fid) {
            Some(vid) => vid,
            None => self.values.push_child(self.schema, self.cur_v, fid),
        };
        self.cur_f = fid;
        self.cur_v = vid;
        Ok(self)
    }

    /// Moves the cursor to an absolute dotted path from the root.
    pub fn at(&mut self, path: &str) -> Result<&mut Self, Error> {
        self.root();
        for name in path.split('.') {
            self.child(name)?;
        }
        Ok(self)
    }

    /// Clones the current value node (subtree included) as a new sibling
    /// occurrence for a repeated tag, and focuses the clone.
    pub fn again(&mut self) -> Result<&mut Self, Error> {
        if self.values.node(self.cur_v).parent().is_none() {
            return Err(Error::Unresolved {
                field: self.path(self.cur_f),
                message: "the root cannot repeat".to_string(),
            });
        }
        self.cur_v = self.values.clone_occurrence(self.cur_v);
        Ok(self)
    }

    /// Sets the body of the focused field.
    pub fn set(&mut self, body: Body) -> &mut Self {
        self.values.node_mut(self.cur_v).body = Some(body);
        self
    }

    pub fn set_text(&mut self, text: impl Into<String>) -> &mut Self {
        self.set(Body::Text(text.into()))
    }

    pub fn set_int(&mut self, value: u64) -> &mut Self {
        self.set(Body::Int(value))
    }

    pub fn set_raw(&mut self, bytes: impl Into<Bytes>) -> &mut Self {
        self.set(Body::Raw(bytes.into()))
    }

    // ---- read access ------------------------------------------------------

    /// Resolves a dotted path to the latest value occurrence, `""` meaning
    /// the root.
    fn find(&self, path: &str) -> Result<(FieldId, ValueId), Error> {
        let mut fid = Schema::ROOT;
        let mut vid = Values::ROOT;
        if path.is_empty() {
            return Ok((fid, vid));
        }
        for name in path.split('.') {
            fid = navigator::child_by_name(self.schema, fid, name)?;
            vid = self
                .values
                .last_occurrence(vid, fid)
                .ok_or_else(|| Error::MissingValue {
                    field: self.path(fid),
                })?;
        }
        Ok((fid, vid))
    }

    /// The body at a dotted path (latest occurrence for repeated tags).
    pub fn get(&self, path: &str) -> Result<&Body, Error> {
        let (fid, vid) = self.find(path)?;
        self.values
            .node(vid)
            .body()
            .ok_or_else(|| Error::MissingValue {
                field: self.path(fid),
            })
    }

    pub fn text(&self, path: &str) -> Result<&str, Error> {
        let (fid, _) = self.find(path)?;
        self.get(path)?.as_text().map_err(|e| e.at(self.path(fid)))
    }

    pub fn int(&self, path: &str) -> Result<u64, Error> {
        let (fid, _) = self.find(path)?;
        self.get(path)?.as_int().map_err(|e| e.at(self.path(fid)))
    }

    pub fn raw(&self, path: &str) -> Result<&Bytes, Error> {
        let (fid, _) = self.find(path)?;
        self.get(path)?.as_raw().map_err(|e| e.at(self.path(fid)))
    }

    /// All occurrence bodies of the field at a dotted path, in arrival
    /// order.
    pub fn bodies(&self, path: &str) -> Result<Vec<&Body>, Error> {
        let (parent, leaf) = match path.rsplit_once('.') {
            Some((parent, leaf)) => (parent, leaf),
            None => ("", path),
        };
        let (parent_f, parent_v) = self.find(parent)?;
        let fid = navigator::child_by_name(self.schema, parent_f, leaf)?;
        Ok(self
            .values
            .occurrences(parent_v, fid)
            .into_iter()
            .filter_map(|vid| self.values.node(vid).body())
            .collect())
    }

    /// The undefined children decoded under the field at a dotted path
    /// (`""` for the root).
    pub fn undefined(&self, path: &str) -> Result<&BTreeMap<String, UndefinedChild>, Error> {
        let (_, vid) = self.find(path)?;
        Ok(self.values.node(vid).undefined())
    }

    /// The stable indented path/value rendering of this message.
    pub fn render(&self) -> String {
        navigator::render(self.schema, &self.values)
    }

    // ---- validation -------------------------------------------------------

    /// Pre-pack check that every schema-mandatory leaf has a value.
    ///
    /// Optionality exists only for children of a bitmap container (and for
    /// undefined children); everything else must be populated.
    pub fn validate_data(&self) -> Result<(), Error> {
        self.check_values(Schema::ROOT, Values::ROOT)
    }

    fn check_values(&self, fid: FieldId, vid: ValueId) -> Result<(), Error> {
        let node = self.schema.node(fid);
        if node.children().is_empty() {
            if self.values.node(vid).body().is_none() {
                return Err(Error::MissingValue {
                    field: self.path(fid),
                });
            }
            return Ok(());
        }
        let optional = node.kind() == FieldKind::BitmapContainer;
        for &child in node.children() {
            let occurrences = self.values.occurrences(vid, child);
            if occurrences.is_empty() {
                if optional {
                    continue;
                }
                return Err(Error::MissingValue {
                    field: self.path(child),
                });
            }
            for occurrence in occurrences {
                self.check_values(child, occurrence)?;
            }
        }
        Ok(())
    }

    // ---- encoding ---------------------------------------------------------

    /// Serializes the value tree to bytes.
    pub fn pack(&self) -> Result<Bytes, Error> {
        let mut buf = BytesMut::new();
        self.encode_node(Schema::ROOT, Values::ROOT, &mut buf)?;
        trace!(bytes = buf.len(), "packed message");
        Ok(buf.freeze())
    }

    fn encode_node(&self, fid: FieldId, vid: ValueId, buf: &mut BytesMut) -> Result<(), Error> {
        navigator::verify(self.schema, fid, &self.values, vid)?;
        let node = self.schema.node(fid);
        match node.kind() {
            FieldKind::Message => self.encode_children(fid, vid, buf),
            FieldKind::FixedValue | FieldKind::TagValue => {
                let body = self.encode_body(fid, vid)?;
                let declared = node.fixed_len().ok_or_else(|| Error::InvalidSchema {
                    field: self.path(fid),
                    message: "no fixed body length declared".to_string(),
                })?;
                if body.len() != declared {
                    return Err(Error::FixedLengthMismatch {
                        field: self.path(fid),
                        declared,
                        encoded: body.len(),
                    });
                }
                if node.kind() == FieldKind::TagValue {
                    self.encode_tag(fid, buf)?;
                }
                buf.extend_from_slice(&body);
                Ok(())
            }
            FieldKind::LengthValue => {
                let body = self.encode_body(fid, vid)?;
                self.encode_length(fid, body.len(), buf)?;
                buf.extend_from_slice(&body);
                Ok(())
            }
            FieldKind::TagLengthValue => {
                let body = self.encode_body(fid, vid)?;
                self.encode_tag(fid, buf)?;
                self.encode_length(fid, body.len(), buf)?;
                buf.extend_from_slice(&body);
                Ok(())
            }
            FieldKind::LengthTagValue => {
                let body = self.encode_body(fid, vid)?;
                self.encode_length(fid, body.len(), buf)?;
                self.encode_tag(fid, buf)?;
                buf.extend_from_slice(&body);
                Ok(())
            }
            FieldKind::BitmapContainer => self.encode_bitmap(fid, vid, buf),
        }
    }

    /// Emits every occurrence of every schema child, in schema order, with
    /// occurrences in the order their values were added.
    fn encode_children(&self, fid: FieldId, vid: ValueId, buf: &mut BytesMut) -> Result<(), Error> {
        for &child in self.schema.node(fid).children() {
            for occurrence in self.values.occurrences(vid, child) {
                self.encode_node(child, occurrence, buf)?;
            }
        }
        Ok(())
    }

    /// Encodes the body region of a field: its children when it is a group,
    /// its body codec output when it is a leaf. The caller derives any
    /// length prefix from the returned bytes, so length and body cannot
    /// disagree.
    fn encode_body(&self, fid: FieldId, vid: ValueId) -> Result<BytesMut, Error> {
        let node = self.schema.node(fid);
        let mut body = BytesMut::new();
        if !node.children().is_empty() {
            self.encode_children(fid, vid, &mut body)?;
        } else {
            let value = self
                .values
                .node(vid)
                .body()
                .ok_or_else(|| Error::MissingValue {
                    field: self.path(fid),
                })?;
            let codec = node.body.as_ref().ok_or_else(|| Error::InvalidSchema {
                field: self.path(fid),
                message: "no body codec on a leaf field".to_string(),
            })?;
            codec
                .write(value, &mut body)
                .map_err(|e| e.at(self.path(fid)))?;
        }
        if let Some(max) = node.max_len() {
            if body.len() > max {
                return Err(Error::LengthExceeded {
                    field: self.path(fid),
                    len: body.len(),
                    max,
                });
            }
        }
        Ok(body)
    }

    fn encode_tag(&self, fid: FieldId, buf: &mut BytesMut) -> Result<(), Error> {
        let node = self.schema.node(fid);
        let tag = node.tag().ok_or_else(|| Error::InvalidSchema {
            field: self.path(fid),
            message: "no tag value on a tagged field".to_string(),
        })?;
        let codec = navigator::resolve_tag_codec(self.schema, fid)?;
        let width = navigator::resolve_tag_width(self.schema, fid)?;
        codec
            .write(tag, width, buf)
            .map_err(|e| e.at(self.path(fid)))
    }

    fn encode_length(&self, fid: FieldId, len: usize, buf: &mut BytesMut) -> Result<(), Error> {
        let codec = navigator::resolve_len_codec(self.schema, fid)?;
        codec.write(len, buf).map_err(|e| e.at(self.path(fid)))
    }

    fn encode_bitmap(&self, fid: FieldId, vid: ValueId, buf: &mut BytesMut) -> Result<(), Error> {
        let node = self.schema.node(fid);
        let codec = node.bitmap.as_ref().ok_or_else(|| Error::InvalidSchema {
            field: self.path(fid),
            message: "no bitmap codec".to_string(),
        })?;
        let bits: Vec<bool> = node
            .children()
            .iter()
            .map(|&child| !self.values.occurrences(vid, child).is_empty())
            .collect();
        codec.write(&bits, buf).map_err(|e| e.at(self.path(fid)))?;
        self.encode_children(fid, vid, buf)
    }

    // ---- decoding ---------------------------------------------------------

    /// Deserializes `buf` into a new value tree over `schema`.
    pub fn unpack(schema: &'s Schema, mut buf: impl Buf) -> Result<Self, Error> {
        let bytes = buf.copy_to_bytes(buf.remaining());
        let end = bytes.len();
        trace!(bytes = end, "unpacking message");
        let mut packer = Packer::new(schema);
        let mut reader = Reader { buf: bytes, pos: 0 };
        packer.decode_root(&mut reader, end)?;
        if reader.pos != end {
            return Err(Error::InvalidData {
                field: packer.path(Schema::ROOT),
                message: format!("{} trailing bytes after the last field", end - reader.pos),
            });
        }
        Ok(packer)
    }

    /// Decodes the root field: its own tag/length headers first, when its
    /// kind carries any, then its body region. Mirrors what [`Packer::pack`]
    /// emits for the root.
    fn decode_root(&mut self, reader: &mut Reader, end: usize) -> Result<(), Error> {
        let fid = Schema::ROOT;
        let vid = Values::ROOT;
        let len = match self.schema.node(fid).kind() {
            FieldKind::Message | FieldKind::BitmapContainer => {
                return self.decode_into(fid, vid, reader, end);
            }
            FieldKind::FixedValue => self.fixed_len_of(fid)?,
            FieldKind::LengthValue => self.decode_length(fid, reader, end)?,
            FieldKind::TagValue => {
                self.expect_tag(fid, reader, end)?;
                self.fixed_len_of(fid)?
            }
            FieldKind::TagLengthValue => {
                self.expect_tag(fid, reader, end)?;
                self.decode_length(fid, reader, end)?
            }
            FieldKind::LengthTagValue => {
                let len = self.decode_length(fid, reader, end)?;
                self.expect_tag(fid, reader, end)?;
                len
            }
        };
        self.decode_region_into(fid, vid, reader, len, end)
    }

    /// Decodes the body region `[reader.pos, end)` of an already-headed
    /// field into `vid`.
    fn decode_into(
        &mut self,
        fid: FieldId,
        vid: ValueId,
        reader: &mut Reader,
        end: usize,
    ) -> Result<(), Error> {
        let node = self.schema.node(fid);
        if node.kind() == FieldKind::BitmapContainer {
            return self.decode_bitmap(fid, vid, reader, end);
        }
        let children = node.children().to_vec();
        if children.is_empty() {
            // A childless container: the whole region is its body.
            let len = end - reader.pos;
            return self.decode_leaf_body(fid, vid, reader, len, end);
        }
        if self.schema.node(children[0]).kind().has_tag() {
            self.decode_tagged_children(fid, vid, reader, end)
        } else {
            for child in children {
                self.decode_field(child, vid, reader, end)?;
            }
            Ok(())
        }
    }

    /// Decodes one full group (headers included) for the schema child `fid`.
    /// Used for positional children and bitmap positions.
    fn decode_field(
        &mut self,
        fid: FieldId,
        parent: ValueId,
        reader: &mut Reader,
        end: usize,
    ) -> Result<(), Error> {
        let node = self.schema.node(fid);
        match node.kind() {
            FieldKind::Message | FieldKind::BitmapContainer => {
                let vid = self.values.push_child(self.schema, parent, fid);
                self.decode_into(fid, vid, reader, end)
            }
            FieldKind::FixedValue => {
                let len = self.fixed_len_of(fid)?;
                self.decode_body_region(fid, parent, reader, len, end)
            }
            FieldKind::LengthValue => {
                let len = self.decode_length(fid, reader, end)?;
                self.decode_body_region(fid, parent, reader, len, end)
            }
            FieldKind::TagValue => {
                self.expect_tag(fid, reader, end)?;
                let len = self.fixed_len_of(fid)?;
                self.decode_body_region(fid, parent, reader, len, end)
            }
            FieldKind::TagLengthValue => {
                self.expect_tag(fid, reader, end)?;
                let len = self.decode_length(fid, reader, end)?;
                self.decode_body_region(fid, parent, reader, len, end)
            }
            FieldKind::LengthTagValue => {
                let len = self.decode_length(fid, reader, end)?;
                self.expect_tag(fid, reader, end)?;
                self.decode_body_region(fid, parent, reader, len, end)
            }
        }
    }

    /// Tag-driven loop for a container whose children carry tags: read
    /// tag/length groups until the enclosing boundary, matching children by
    /// tag number and preserving unknown tags as undefined children.
    fn decode_tagged_children(
        &mut self,
        fid: FieldId,
        vid: ValueId,
        reader: &mut Reader,
        end: usize,
    ) -> Result<(), Error> {
        let children = self.schema.node(fid).children().to_vec();
        let first = children[0];
        // Structural validation guarantees uniform header conventions across
        // a tagged group, so resolving from the first child stands for all.
        let tag_codec = navigator::resolve_tag_codec(self.schema, first)?;
        let tag_width = navigator::resolve_tag_width(self.schema, first)?;
        let length_first = self.schema.node(first).kind().length_first();

        let mut last_matched: Option<FieldId> = None;
        let mut clones: usize = 0;
        while reader.pos < end {
            let pre_length = if length_first {
                Some(self.decode_length(first, reader, end)?)
            } else {
                None
            };
            let tag = reader
                .with_codec(end, |buf| tag_codec.read(buf, tag_width))
                .map_err(|e| e.at(self.path(fid)))?;

            match navigator::find_child_by_tag(self.schema, fid, tag) {
                Some(child) => {
                    last_matched = Some(child);
                    let len = self.group_body_len(child, pre_length, reader, end)?;
                    self.decode_body_region(child, vid, reader, len, end)?;
                }
                None => {
                    // Forward compatibility: decode with the definition of
                    // the nearest preceding matched sibling (or the first
                    // child before any match) and keep the value aside.
                    let anchor = last_matched.unwrap_or(first);
                    let len = self.group_body_len(anchor, pre_length, reader, end)?;
                    let body = self.decode_anchor_body(anchor, reader, len, end)?;
                    clones += 1;
                    let name = format!("{}-clone-{}", self.anchor_name(anchor), clones);
                    debug!(tag, name = %name, "unknown tag preserved as undefined child");
                    self.values
                        .node_mut(vid)
                        .undefined
                        .insert(name, UndefinedChild { tag, body });
                }
            }
        }
        Ok(())
    }

    /// The body length of one tag-loop group, per the definition's kind.
    fn group_body_len(
        &mut self,
        fid: FieldId,
        pre_length: Option<usize>,
        reader: &mut Reader,
        end: usize,
    ) -> Result<usize, Error> {
        let kind = self.schema.node(fid).kind();
        match kind {
            FieldKind::TagValue => self.fixed_len_of(fid),
            FieldKind::TagLengthValue => self.decode_length(fid, reader, end),
            FieldKind::LengthTagValue => pre_length.ok_or_else(|| Error::InvalidData {
                field: self.path(fid),
                message: "length-tag-value group without a leading length".to_string(),
            }),
            other => Err(Error::InvalidData {
                field: self.path(fid),
                message: format!("tag matched a definition of kind {other}"),
            }),
        }
    }

    /// Decodes a body of `len` bytes for a matched schema child, appending a
    /// new occurrence under `parent`.
    fn decode_body_region(
        &mut self,
        fid: FieldId,
        parent: ValueId,
        reader: &mut Reader,
        len: usize,
        end: usize,
    ) -> Result<(), Error> {
        let vid = self.values.push_child(self.schema, parent, fid);
        self.decode_region_into(fid, vid, reader, len, end)
    }

    /// Decodes a body of `len` bytes into an existing value node.
    fn decode_region_into(
        &mut self,
        fid: FieldId,
        vid: ValueId,
        reader: &mut Reader,
        len: usize,
        end: usize,
    ) -> Result<(), Error> {
        if reader.pos + len > end {
            return Err(Error::EndOfBuffer {
                field: self.path(fid),
                offset: reader.pos,
                need: len,
                have: end - reader.pos,
            });
        }
        let body_end = reader.pos + len;
        if let Some(max) = self.schema.node(fid).max_len() {
            if len > max {
                return Err(Error::LengthExceeded {
                    field: self.path(fid),
                    len,
                    max,
                });
            }
        }
        if self.schema.node(fid).children().is_empty() {
            self.decode_leaf_body(fid, vid, reader, len, body_end)
        } else {
            self.decode_into(fid, vid, reader, body_end)?;
            if reader.pos != body_end {
                return Err(Error::InvalidData {
                    field: self.path(fid),
                    message: format!(
                        "container body underran its boundary by {} bytes",
                        body_end - reader.pos
                    ),
                });
            }
            Ok(())
        }
    }

    fn decode_leaf_body(
        &mut self,
        fid: FieldId,
        vid: ValueId,
        reader: &mut Reader,
        len: usize,
        end: usize,
    ) -> Result<(), Error> {
        let codec = self
            .schema
            .node(fid)
            .body
            .clone()
            .ok_or_else(|| Error::InvalidSchema {
                field: self.path(fid),
                message: "no body codec on a leaf field".to_string(),
            })?;
        let body = reader
            .with_codec(end, |buf| codec.read(buf, len))
            .map_err(|e| e.at(self.path(fid)))?;
        self.values.node_mut(vid).body = Some(body);
        Ok(())
    }

    /// Decodes an unknown tag's body with the anchor definition's codecs;
    /// an anchor that is itself a group falls back to raw bytes.
    fn decode_anchor_body(
        &mut self,
        anchor: FieldId,
        reader: &mut Reader,
        len: usize,
        end: usize,
    ) -> Result<Body, Error> {
        if reader.pos + len > end {
            return Err(Error::EndOfBuffer {
                field: self.path(anchor),
                offset: reader.pos,
                need: len,
                have: end - reader.pos,
            });
        }
        match self.schema.node(anchor).body.clone() {
            Some(codec) => reader
                .with_codec(end, |buf| codec.read(buf, len))
                .map_err(|e| e.at(self.path(anchor))),
            None => {
                let raw = reader.buf.slice(reader.pos..reader.pos + len);
                reader.pos += len;
                Ok(Body::Raw(raw))
            }
        }
    }

    fn decode_bitmap(
        &mut self,
        fid: FieldId,
        vid: ValueId,
        reader: &mut Reader,
        end: usize,
    ) -> Result<(), Error> {
        let node = self.schema.node(fid);
        let codec = node.bitmap.clone().ok_or_else(|| Error::InvalidSchema {
            field: self.path(fid),
            message: "no bitmap codec".to_string(),
        })?;
        let children = node.children().to_vec();
        let bits = reader
            .with_codec(end, |buf| codec.read(buf))
            .map_err(|e| e.at(self.path(fid)))?;
        for (position, set) in bits.iter().enumerate() {
            if !set {
                continue;
            }
            let child = *children.get(position).ok_or_else(|| Error::InvalidData {
                field: self.path(fid),
                message: format!("bitmap position {position} has no schema child"),
            })?;
            self.decode_field(child, vid, reader, end)?;
        }
        Ok(())
    }

    /// Reads a positional tag header and checks it names this field.
    fn expect_tag(&mut self, fid: FieldId, reader: &mut Reader, end: usize) -> Result<(), Error> {
        let codec = navigator::resolve_tag_codec(self.schema, fid)?;
        let width = navigator::resolve_tag_width(self.schema, fid)?;
        let tag = reader
            .with_codec(end, |buf| codec.read(buf, width))
            .map_err(|e| e.at(self.path(fid)))?;
        let declared = self.schema.node(fid).tag_number();
        if declared != Some(tag) {
            return Err(Error::InvalidData {
                field: self.path(fid),
                message: format!("decoded tag {tag} does not match declared tag {declared:?}"),
            });
        }
        Ok(())
    }

    fn decode_length(
        &mut self,
        fid: FieldId,
        reader: &mut Reader,
        end: usize,
    ) -> Result<usize, Error> {
        let codec = navigator::resolve_len_codec(self.schema, fid)?;
        reader
            .with_codec(end, |buf| codec.read(buf))
            .map_err(|e| e.at(self.path(fid)))
    }

    fn fixed_len_of(&self, fid: FieldId) -> Result<usize, Error> {
        self.schema
            .node(fid)
            .fixed_len()
            .ok_or_else(|| Error::InvalidSchema {
                field: self.path(fid),
                message: "no fixed body length declared".to_string(),
            })
    }

    /// The display name of an unknown-tag anchor, used in synthetic names.
    fn anchor_name(&self, fid: FieldId) -> String {
        let node = self.schema.node(fid);
        match (node.name(), node.tag_number()) {
            (Some(name), _) => name.to_string(),
            (None, Some(tag)) => tag.to_string(),
            (None, None) => node.kind().as_str().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        builder::SchemaBuilder,
        codec::{Ascii, BcdLength, FixedBitmap, HexLength, HexTag},
    };
    use std::sync::Arc;

    /// A message of TLV siblings `tag-1` and `tag-3` with one-byte hex tags
    /// and one-byte BCD lengths.
    fn tlv_schema() -> Schema {
        let schema = SchemaBuilder::root(FieldKind::Message)
            .name("root")
            .children_tag_codec(Arc::new(HexTag))
            .children_len_codec(Arc::new(BcdLength::new(1)))
            .children_tag_width(1)
            .child(FieldKind::TagLengthValue)
            .name("tag-1")
            .tag(1)
            .body(Arc::new(Ascii))
            .sibling_like("tag-1")
            .unwrap()
            .name("tag-3")
            .tag(3)
            .build();
        schema.validate().unwrap();
        schema
    }

    #[test]
    fn test_tlv_round_trip() {
        let schema = tlv_schema();
        let mut message = Packer::new(&schema);
        message.at("tag-1").unwrap().set_text("11");
        message.at("tag-3").unwrap().set_text("33");
        message.validate_data().unwrap();

        let wire = message.pack().unwrap();
        assert_eq!(wire.to_vec(), vec![0x01, 0x02, b'1', b'1', 0x03, 0x02, b'3', b'3']);

        let decoded = Packer::unpack(&schema, &wire[..]).unwrap();
        assert_eq!(decoded.text("tag-1").unwrap(), "11");
        assert_eq!(decoded.text("tag-3").unwrap(), "33");
        assert!(decoded.undefined("").unwrap().is_empty());
    }

    #[test]
    fn test_unknown_tag_round_trip() {
        let schema = tlv_schema();
        let wire = [
            0x01, 0x02, b'1', b'1', // tag-1
            0x02, 0x02, b'2', b'2', // tag 2: not in the schema
            0x03, 0x02, b'3', b'3', // tag-3
        ];
        let decoded = Packer::unpack(&schema, &wire[..]).unwrap();
        assert_eq!(decoded.text("tag-1").unwrap(), "11");
        assert_eq!(decoded.text("tag-3").unwrap(), "33");

        let undefined = decoded.undefined("").unwrap();
        assert_eq!(undefined.len(), 1);
        let entry = undefined.get("tag-1-clone-1").expect("synthetic name");
        assert_eq!(entry.tag, 2);
        assert_eq!(entry.body, Body::Text("22".into()));
    }

    #[test]
    fn test_unknown_tag_before_any_match_uses_first_child() {
        let schema = tlv_schema();
        let wire = [0x07, 0x02, b'7', b'7', 0x01, 0x02, b'1', b'1'];
        let decoded = Packer::unpack(&schema, &wire[..]).unwrap();
        let undefined = decoded.undefined("").unwrap();
        assert!(undefined.contains_key("tag-1-clone-1"));
        assert_eq!(decoded.text("tag-1").unwrap(), "11");
    }

    #[test]
    fn test_unknown_tag_anchors_to_nearest_preceding_match() {
        let schema = tlv_schema();
        let wire = [
            0x01, 0x02, b'1', b'1',
            0x03, 0x02, b'3', b'3',
            0x05, 0x02, b'5', b'5', // unknown, after tag-3 matched
            0x06, 0x02, b'6', b'6', // unknown again
        ];
        let decoded = Packer::unpack(&schema, &wire[..]).unwrap();
        let undefined = decoded.undefined("").unwrap();
        assert_eq!(undefined.len(), 2);
        assert_eq!(undefined.get("tag-3-clone-1").unwrap().tag, 5);
        assert_eq!(undefined.get("tag-3-clone-2").unwrap().tag, 6);
    }

    #[test]
    fn test_repeated_tag_round_trip() {
        let schema = tlv_schema();
        let mut message = Packer::new(&schema);
        message.at("tag-1").unwrap().set_text("11");
        message.again().unwrap().set_text("33");
        message.at("tag-3").unwrap().set_text("99");

        let wire = message.pack().unwrap();
        assert_eq!(
            wire.to_vec(),
            vec![
                0x01, 0x02, b'1', b'1',
                0x01, 0x02, b'3', b'3',
                0x03, 0x02, b'9', b'9',
            ]
        );

        let decoded = Packer::unpack(&schema, &wire[..]).unwrap();
        let bodies = decoded.bodies("tag-1").unwrap();
        assert_eq!(
            bodies,
            vec![&Body::Text("11".into()), &Body::Text("33".into())]
        );
        // The latest occurrence wins for single-value accessors.
        assert_eq!(decoded.text("tag-1").unwrap(), "33");
    }

    #[test]
    fn test_length_tag_value_round_trip() {
        let schema = SchemaBuilder::root(FieldKind::Message)
            .name("root")
            .children_tag_codec(Arc::new(HexTag))
            .children_len_codec(Arc::new(BcdLength::new(1)))
            .children_tag_width(1)
            .child(FieldKind::LengthTagValue)
            .name("f")
            .tag(0x10)
            .body(Arc::new(Ascii))
            .build();
        schema.validate().unwrap();

        let mut message = Packer::new(&schema);
        message.at("f").unwrap().set_text("AB");
        let wire = message.pack().unwrap();
        // Length first, then tag, then body.
        assert_eq!(wire.to_vec(), vec![0x02, 0x10, b'A', b'B']);

        let decoded = Packer::unpack(&schema, &wire[..]).unwrap();
        assert_eq!(decoded.text("f").unwrap(), "AB");
    }

    #[test]
    fn test_tag_value_fixed_width_round_trip() {
        let schema = SchemaBuilder::root(FieldKind::Message)
            .name("root")
            .children_tag_codec(Arc::new(HexTag))
            .children_tag_width(1)
            .child(FieldKind::TagValue)
            .name("f")
            .tag(1)
            .fixed_len(2)
            .body(Arc::new(Ascii))
            .build();
        schema.validate().unwrap();

        let mut message = Packer::new(&schema);
        message.at("f").unwrap().set_text("AB");
        let wire = message.pack().unwrap();
        assert_eq!(wire.to_vec(), vec![0x01, b'A', b'B']);

        let decoded = Packer::unpack(&schema, &wire[..]).unwrap();
        assert_eq!(decoded.text("f").unwrap(), "AB");
    }

    #[test]
    fn test_fixed_length_mismatch() {
        let schema = SchemaBuilder::root(FieldKind::Message)
            .name("root")
            .child(FieldKind::FixedValue)
            .name("mti")
            .fixed_len(4)
            .body(Arc::new(Ascii))
            .build();
        let mut message = Packer::new(&schema);
        message.at("mti").unwrap().set_text("01");
        let err = message.pack().unwrap_err();
        assert!(matches!(
            err,
            Error::FixedLengthMismatch { declared: 4, encoded: 2, .. }
        ));
    }

    #[test]
    fn test_bitmap_container_round_trip() {
        let schema = SchemaBuilder::root(FieldKind::BitmapContainer)
            .name("root")
            .bitmap(Arc::new(FixedBitmap::new(1)))
            .children_len_codec(Arc::new(BcdLength::new(1)))
            .child(FieldKind::LengthValue)
            .name("f1")
            .body(Arc::new(Ascii))
            .sibling_like("f1")
            .unwrap()
            .name("f2")
            .sibling_like("f1")
            .unwrap()
            .name("f3")
            .build();
        schema.validate().unwrap();

        let mut message = Packer::new(&schema);
        message.at("f1").unwrap().set_text("11");
        message.at("f3").unwrap().set_text("33");
        message.validate_data().unwrap();

        let wire = message.pack().unwrap();
        // Positions 0 and 2 populated: 1010_0000.
        assert_eq!(
            wire.to_vec(),
            vec![0xA0, 0x02, b'1', b'1', 0x02, b'3', b'3']
        );

        let decoded = Packer::unpack(&schema, &wire[..]).unwrap();
        assert_eq!(decoded.text("f1").unwrap(), "11");
        assert_eq!(decoded.text("f3").unwrap(), "33");
        assert!(matches!(
            decoded.get("f2"),
            Err(Error::MissingValue { .. })
        ));
    }

    #[test]
    fn test_nested_group_round_trip() {
        let schema = SchemaBuilder::root(FieldKind::Message)
            .name("root")
            .children_tag_codec(Arc::new(HexTag))
            .children_len_codec(Arc::new(BcdLength::new(1)))
            .children_tag_width(1)
            .child(FieldKind::TagLengthValue)
            .name("group")
            .tag(0x48)
            .children_tag_codec(Arc::new(HexTag))
            .children_len_codec(Arc::new(BcdLength::new(1)))
            .children_tag_width(1)
            .child(FieldKind::TagLengthValue)
            .name("inner")
            .tag(1)
            .body(Arc::new(Ascii))
            .build();
        schema.validate().unwrap();

        let mut message = Packer::new(&schema);
        message.at("group.inner").unwrap().set_text("77");
        let wire = message.pack().unwrap();
        // group: tag 0x48, length 4, then the inner TLV.
        assert_eq!(
            wire.to_vec(),
            vec![0x48, 0x04, 0x01, 0x02, b'7', b'7']
        );

        let decoded = Packer::unpack(&schema, &wire[..]).unwrap();
        assert_eq!(decoded.text("group.inner").unwrap(), "77");
    }

    #[test]
    fn test_header_bearing_root_round_trip() {
        let schema = SchemaBuilder::root(FieldKind::TagLengthValue)
            .name("frame")
            .tag(0x10)
            .tag_codec(Arc::new(HexTag))
            .tag_width(1)
            .len_codec(Arc::new(HexLength))
            .body(Arc::new(Ascii))
            .build();
        schema.validate().unwrap();

        let mut message = Packer::new(&schema);
        message.set_text("AB");
        let wire = message.pack().unwrap();
        assert_eq!(wire.to_vec(), vec![0x10, 0x02, b'A', b'B']);

        // The root's own headers are consumed before its body.
        let decoded = Packer::unpack(&schema, &wire[..]).unwrap();
        assert_eq!(decoded.text("").unwrap(), "AB");
    }

    #[test]
    fn test_length_tag_value_root_round_trip() {
        let schema = SchemaBuilder::root(FieldKind::LengthTagValue)
            .name("frame")
            .tag(0x10)
            .tag_codec(Arc::new(HexTag))
            .tag_width(1)
            .len_codec(Arc::new(HexLength))
            .body(Arc::new(Ascii))
            .build();
        schema.validate().unwrap();

        let mut message = Packer::new(&schema);
        message.set_text("AB");
        let wire = message.pack().unwrap();
        assert_eq!(wire.to_vec(), vec![0x02, 0x10, b'A', b'B']);

        let decoded = Packer::unpack(&schema, &wire[..]).unwrap();
        assert_eq!(decoded.text("").unwrap(), "AB");
    }

    #[test]
    fn test_fixed_value_root_round_trip() {
        let schema = SchemaBuilder::root(FieldKind::FixedValue)
            .fixed_len(2)
            .body(Arc::new(Ascii))
            .build();
        schema.validate().unwrap();

        let mut message = Packer::new(&schema);
        message.set_text("01");
        let wire = message.pack().unwrap();
        assert_eq!(wire.to_vec(), b"01");

        let decoded = Packer::unpack(&schema, &wire[..]).unwrap();
        assert_eq!(decoded.text("").unwrap(), "01");

        // The fixed length bounds the body; extra input is trailing bytes.
        let err = Packer::unpack(&schema, &b"0199"[..]).unwrap_err();
        assert!(matches!(err, Error::InvalidData { .. }));
        assert!(err.to_string().contains("trailing"), "{err}");
    }

    #[test]
    fn test_truncated_body_reports_offset() {
        let schema = tlv_schema();
        // Declares a 5-byte body but carries only one byte.
        let wire = [0x01, 0x05, b'1'];
        let err = Packer::unpack(&schema, &wire[..]).unwrap_err();
        match err {
            Error::EndOfBuffer { field, offset, need, have } => {
                assert_eq!(field, "root.tag-1(1)");
                assert_eq!(offset, 2);
                assert_eq!(need, 5);
                assert_eq!(have, 1);
            }
            other => panic!("expected EndOfBuffer, got {other}"),
        }
    }

    #[test]
    fn test_truncated_tag() {
        let schema = SchemaBuilder::root(FieldKind::Message)
            .name("root")
            .children_tag_codec(Arc::new(HexTag))
            .children_len_codec(Arc::new(BcdLength::new(1)))
            .children_tag_width(2)
            .child(FieldKind::TagLengthValue)
            .name("f")
            .tag(1)
            .body(Arc::new(Ascii))
            .build();
        let err = Packer::unpack(&schema, &[0x00u8][..]).unwrap_err();
        assert!(matches!(err, Error::EndOfBuffer { need: 2, have: 1, .. }));
    }

    #[test]
    fn test_validate_data_missing_mandatory() {
        let schema = tlv_schema();
        let mut message = Packer::new(&schema);
        message.at("tag-1").unwrap().set_text("11");
        let err = message.validate_data().unwrap_err();
        assert!(matches!(err, Error::MissingValue { .. }));
        assert!(err.to_string().contains("root.tag-3(3)"), "{err}");
    }

    #[test]
    fn test_pack_wrong_body_kind() {
        let schema = tlv_schema();
        let mut message = Packer::new(&schema);
        message.at("tag-1").unwrap().set_int(11);
        message.at("tag-3").unwrap().set_text("33");
        let err = message.pack().unwrap_err();
        assert!(matches!(err, Error::WrongKind { expected: "text", .. }));
        assert!(err.to_string().contains("root.tag-1(1)"), "{err}");
    }

    #[test]
    fn test_max_len_enforced_on_pack_and_unpack() {
        let schema = SchemaBuilder::root(FieldKind::Message)
            .name("root")
            .children_tag_codec(Arc::new(HexTag))
            .children_len_codec(Arc::new(BcdLength::new(1)))
            .children_tag_width(1)
            .child(FieldKind::TagLengthValue)
            .name("f")
            .tag(1)
            .max_len(2)
            .body(Arc::new(Ascii))
            .build();

        let mut message = Packer::new(&schema);
        message.at("f").unwrap().set_text("ABCD");
        assert!(matches!(
            message.pack().unwrap_err(),
            Error::LengthExceeded { len: 4, max: 2, .. }
        ));

        let wire = [0x01, 0x04, b'A', b'B', b'C', b'D'];
        assert!(matches!(
            Packer::unpack(&schema, &wire[..]).unwrap_err(),
            Error::LengthExceeded { len: 4, max: 2, .. }
        ));
    }

    #[test]
    fn test_render_lists_paths_and_values() {
        let schema = tlv_schema();
        let wire = [0x01, 0x02, b'1', b'1', 0x02, 0x02, b'2', b'2'];
        let decoded = Packer::unpack(&schema, &wire[..]).unwrap();
        let rendered = decoded.render();
        assert!(rendered.contains("root.tag-1(1) = \"11\""), "{rendered}");
        assert!(
            rendered.contains("root.tag-1-clone-1(2) = \"22\"")
                || rendered.contains("tag-1-clone-1(2)"),
            "{rendered}"
        );
    }
}
