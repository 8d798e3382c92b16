//! The static field-definition tree.
//!
//! A [`Schema`] is an arena of [`SchemaNode`]s referencing each other by
//! [`FieldId`] (vector index), with the root at index 0. Parent links are
//! plain indices, so there are no reference cycles to manage. Once built the
//! tree is immutable and may be shared freely across threads; codecs hang
//! off nodes behind `Arc`s.

use crate::codec::{BitmapCodec, BodyCodec, LengthCodec, Tag, TagCodec};
use std::sync::Arc;

/// Index of a node within a [`Schema`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldId(pub(crate) usize);

/// The wire shape of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A plain container: children concatenated, no header of its own.
    Message,
    /// Body bytes only, length implied by the schema.
    FixedValue,
    /// Length prefix then body.
    LengthValue,
    /// Tag then body, body length fixed by the schema.
    TagValue,
    /// Tag, length, body.
    TagLengthValue,
    /// Length, tag, body.
    LengthTagValue,
    /// Bitmap word marking populated children, then the populated children.
    BitmapContainer,
}

impl FieldKind {
    /// The kind name, used in paths for unnamed, untagged nodes.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "Message",
            Self::FixedValue => "FixedValue",
            Self::LengthValue => "LengthValue",
            Self::TagValue => "TagValue",
            Self::TagLengthValue => "TagLengthValue",
            Self::LengthTagValue => "LengthTagValue",
            Self::BitmapContainer => "BitmapContainer",
        }
    }

    /// Whether this kind carries a header tag.
    pub fn has_tag(&self) -> bool {
        matches!(
            self,
            Self::TagValue | Self::TagLengthValue | Self::LengthTagValue
        )
    }

    /// Whether this kind carries a length prefix.
    pub fn has_length(&self) -> bool {
        matches!(
            self,
            Self::LengthValue | Self::TagLengthValue | Self::LengthTagValue
        )
    }

    /// Whether the length prefix precedes the tag (LTV rather than TLV).
    pub fn length_first(&self) -> bool {
        matches!(self, Self::LengthTagValue)
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One field definition: structure only, no data.
#[derive(Debug, Clone)]
pub struct SchemaNode {
    pub(crate) name: Option<String>,
    pub(crate) tag: Option<Tag>,
    pub(crate) kind: FieldKind,
    pub(crate) fixed_len: Option<usize>,
    pub(crate) max_len: Option<usize>,
    pub(crate) body: Option<Arc<dyn BodyCodec>>,
    pub(crate) tag_codec: Option<Arc<dyn TagCodec>>,
    pub(crate) len_codec: Option<Arc<dyn LengthCodec>>,
    pub(crate) tag_width: Option<usize>,
    pub(crate) child_tag_codec: Option<Arc<dyn TagCodec>>,
    pub(crate) child_len_codec: Option<Arc<dyn LengthCodec>>,
    pub(crate) child_tag_width: Option<usize>,
    pub(crate) bitmap: Option<Arc<dyn BitmapCodec>>,
    pub(crate) children: Vec<FieldId>,
    pub(crate) parent: Option<FieldId>,
}

impl SchemaNode {
    pub(crate) fn new(kind: FieldKind) -> Self {
        Self {
            name: None,
            tag: None,
            kind,
            fixed_len: None,
            max_len: None,
            body: None,
            tag_codec: None,
            len_codec: None,
            tag_width: None,
            child_tag_codec: None,
            child_len_codec: None,
            child_tag_width: None,
            bitmap: None,
            children: Vec::new(),
            parent: None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn tag(&self) -> Option<&Tag> {
        self.tag.as_ref()
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn fixed_len(&self) -> Option<usize> {
        self.fixed_len
    }

    pub fn max_len(&self) -> Option<usize> {
        self.max_len
    }

    pub fn children(&self) -> &[FieldId] {
        &self.children
    }

    pub fn parent(&self) -> Option<FieldId> {
        self.parent
    }

    /// The numeric tag, when one is declared.
    pub fn tag_number(&self) -> Option<u64> {
        self.tag.as_ref().map(Tag::number)
    }
}

/// An immutable field-definition tree.
///
/// Build one with [`crate::builder::SchemaBuilder`], check it once with
/// [`Schema::validate`], then share it read-only across any number of
/// encode/decode operations and threads.
#[derive(Debug, Clone)]
pub struct Schema {
    pub(crate) nodes: Vec<SchemaNode>,
}

impl Schema {
    /// The root of every schema tree.
    pub const ROOT: FieldId = FieldId(0);

    pub(crate) fn new(root: SchemaNode) -> Self {
        Self { nodes: vec![root] }
    }

    pub fn root(&self) -> FieldId {
        Self::ROOT
    }

    pub fn node(&self, id: FieldId) -> &SchemaNode {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: FieldId) -> &mut SchemaNode {
        &mut self.nodes[id.0]
    }

    /// Appends `node` under `parent` and returns its id.
    pub(crate) fn push_child(&mut self, parent: FieldId, mut node: SchemaNode) -> FieldId {
        node.parent = Some(parent);
        let id = FieldId(self.nodes.len());
        self.nodes.push(node);
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Deep-clones the subtree rooted at `src` under `parent` (or as a fresh
    /// root when `parent` is `None` and the arena is empty).
    pub(crate) fn clone_subtree(
        &mut self,
        src: &Schema,
        src_id: FieldId,
        parent: Option<FieldId>,
    ) -> FieldId {
        let mut node = src.node(src_id).clone();
        node.children = Vec::new();
        node.parent = parent;
        let id = FieldId(self.nodes.len());
        self.nodes.push(node);
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(id);
        }
        for &child in src.node(src_id).children.iter() {
            self.clone_subtree(src, child, Some(id));
        }
        id
    }

    /// Deep-clones the subtree at `src_id` within this arena, appending the
    /// clone under `parent`.
    pub(crate) fn clone_within(&mut self, src_id: FieldId, parent: Option<FieldId>) -> FieldId {
        let mut node = self.nodes[src_id.0].clone();
        let src_children = std::mem::take(&mut node.children);
        node.parent = parent;
        let id = FieldId(self.nodes.len());
        self.nodes.push(node);
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(id);
        }
        for child in src_children {
            self.clone_within(child, Some(id));
        }
        id
    }

    /// Checks the structural rules once per schema; see
    /// [`crate::validate::validate_structure`].
    pub fn validate(&self) -> Result<(), crate::error::Error> {
        crate::validate::validate_structure(self)
    }
}
