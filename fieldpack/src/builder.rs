//! Fluent, cursor-based construction of schema trees.
//!
//! The builder threads an explicit cursor (the focused [`FieldId`]) through
//! each call rather than sharing a hidden "current field". Attribute setters
//! return `Self` for chaining; navigation and cloning return `Result` and
//! fail loudly on missing names or paths. No structural validation happens
//! here: partially built trees are legal and can be extended later, and
//! [`Schema::validate`] is the gate before use.

use crate::{
    codec::{BitmapCodec, BodyCodec, LengthCodec, Tag, TagCodec},
    error::Error,
    navigator,
    schema::{FieldId, FieldKind, Schema, SchemaNode},
};
use bytes::Bytes;
use std::sync::Arc;

/// Builds a [`Schema`] tree, one focused node at a time.
#[derive(Debug)]
pub struct SchemaBuilder {
    schema: Schema,
    cursor: FieldId,
}

impl SchemaBuilder {
    /// Starts a new tree with a root of the given kind, focused on the root.
    pub fn root(kind: FieldKind) -> Self {
        Self {
            schema: Schema::new(SchemaNode::new(kind)),
            cursor: Schema::ROOT,
        }
    }

    fn focused(&mut self) -> &mut SchemaNode {
        self.schema.node_mut(self.cursor)
    }

    /// Names the focused node. Names must be unique among siblings; the
    /// validator and lookups rely on it.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.focused().name = Some(name.into());
        self
    }

    /// Sets the focused node's header tag number.
    pub fn tag(mut self, tag: u64) -> Self {
        self.focused().tag = Some(Tag::Num(tag));
        self
    }

    /// Sets the focused node's header tag as literal bytes.
    pub fn tag_literal(mut self, bytes: impl Into<Bytes>) -> Self {
        self.focused().tag = Some(Tag::Literal(bytes.into()));
        self
    }

    /// Declares a fixed body length in bytes.
    pub fn fixed_len(mut self, len: usize) -> Self {
        self.focused().fixed_len = Some(len);
        self
    }

    /// Declares a maximum encoded body length in bytes.
    pub fn max_len(mut self, len: usize) -> Self {
        self.focused().max_len = Some(len);
        self
    }

    /// Sets the focused node's body codec.
    pub fn body(mut self, codec: Arc<dyn BodyCodec>) -> Self {
        self.focused().body = Some(codec);
        self
    }

    /// Sets the focused node's own tag codec.
    pub fn tag_codec(mut self, codec: Arc<dyn TagCodec>) -> Self {
        self.focused().tag_codec = Some(codec);
        self
    }

    /// Sets the focused node's own length codec.
    pub fn len_codec(mut self, codec: Arc<dyn LengthCodec>) -> Self {
        self.focused().len_codec = Some(codec);
        self
    }

    /// Sets the focused node's own tag width in bytes.
    pub fn tag_width(mut self, width: usize) -> Self {
        self.focused().tag_width = Some(width);
        self
    }

    /// Declares the tag codec inherited by all children of the focused node.
    pub fn children_tag_codec(mut self, codec: Arc<dyn TagCodec>) -> Self {
        self.focused().child_tag_codec = Some(codec);
        self
    }

    /// Declares the length codec inherited by all children of the focused
    /// node.
    pub fn children_len_codec(mut self, codec: Arc<dyn LengthCodec>) -> Self {
        self.focused().child_len_codec = Some(codec);
        self
    }

    /// Declares the tag width inherited by all children of the focused node.
    pub fn children_tag_width(mut self, width: usize) -> Self {
        self.focused().child_tag_width = Some(width);
        self
    }

    /// Sets the bitmap codec (bitmap containers only; validated later).
    pub fn bitmap(mut self, codec: Arc<dyn BitmapCodec>) -> Self {
        self.focused().bitmap = Some(codec);
        self
    }

    /// Appends a child of the given kind to the focused node and focuses it.
    pub fn child(mut self, kind: FieldKind) -> Self {
        self.cursor = self.schema.push_child(self.cursor, SchemaNode::new(kind));
        self
    }

    /// Appends a sibling deep-cloned from the named existing sibling
    /// (attributes and subtree) and focuses the clone.
    ///
    /// Used for repeated or variant groups: clone a template sibling, then
    /// override its name, tag, or length.
    pub fn sibling_like(mut self, name: &str) -> Result<Self, Error> {
        let template = navigator::sibling_by_name(&self.schema, self.cursor, name)?;
        let parent = self
            .schema
            .node(self.cursor)
            .parent()
            .expect("sibling lookup succeeded, so a parent exists");
        self.cursor = self.schema.clone_within(template, Some(parent));
        Ok(self)
    }

    /// Detach-clones the subtree at an absolute dotted path as a new
    /// standalone builder, usable as the seed of another branch.
    pub fn extract(&self, path: &str) -> Result<SchemaBuilder, Error> {
        let src_id = navigator::by_path(&self.schema, path)?;
        let mut detached = Schema { nodes: Vec::new() };
        let root = detached.clone_subtree(&self.schema, src_id, None);
        Ok(SchemaBuilder {
            schema: detached,
            cursor: root,
        })
    }

    /// Appends a deep clone of another builder's tree as a child of the
    /// focused node and focuses the grafted root.
    pub fn graft(mut self, other: &SchemaBuilder) -> Self {
        self.cursor = self
            .schema
            .clone_subtree(&other.schema, Schema::ROOT, Some(self.cursor));
        self
    }

    /// Moves focus to the parent of the focused node.
    pub fn up(mut self) -> Result<Self, Error> {
        self.cursor = self
            .schema
            .node(self.cursor)
            .parent()
            .ok_or_else(|| Error::Unresolved {
                field: navigator::path(&self.schema, self.cursor),
                message: "the root has no parent".to_string(),
            })?;
        Ok(self)
    }

    /// Moves focus to the root.
    pub fn focus_root(mut self) -> Self {
        self.cursor = Schema::ROOT;
        self
    }

    /// Moves focus to a named child of the focused node.
    pub fn focus_child(mut self, name: &str) -> Result<Self, Error> {
        self.cursor = navigator::child_by_name(&self.schema, self.cursor, name)?;
        Ok(self)
    }

    /// Moves focus to an absolute dotted path from the root.
    pub fn focus(mut self, path: &str) -> Result<Self, Error> {
        self.cursor = navigator::by_path(&self.schema, path)?;
        Ok(self)
    }

    /// Finishes building. Run [`Schema::validate`] before first use.
    pub fn build(self) -> Schema {
        self.schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Ascii, BcdLength, HexTag};

    fn tlv_root() -> SchemaBuilder {
        SchemaBuilder::root(FieldKind::Message)
            .name("root")
            .children_tag_codec(Arc::new(HexTag))
            .children_len_codec(Arc::new(BcdLength::new(1)))
            .children_tag_width(1)
    }

    #[test]
    fn test_child_and_up() {
        let schema = tlv_root()
            .child(FieldKind::TagLengthValue)
            .name("a")
            .tag(1)
            .body(Arc::new(Ascii))
            .up()
            .unwrap()
            .child(FieldKind::TagLengthValue)
            .name("b")
            .tag(2)
            .body(Arc::new(Ascii))
            .build();

        let root = schema.node(Schema::ROOT);
        assert_eq!(root.children().len(), 2);
        assert_eq!(schema.node(root.children()[0]).name(), Some("a"));
        assert_eq!(schema.node(root.children()[1]).name(), Some("b"));
    }

    #[test]
    fn test_sibling_like_clones_attributes() {
        let schema = tlv_root()
            .child(FieldKind::TagLengthValue)
            .name("a")
            .tag(1)
            .max_len(10)
            .body(Arc::new(Ascii))
            .sibling_like("a")
            .unwrap()
            .name("b")
            .tag(2)
            .build();

        let b = navigator::by_path(&schema, "b").unwrap();
        let node = schema.node(b);
        assert_eq!(node.tag_number(), Some(2));
        assert_eq!(node.max_len(), Some(10));

        let a = navigator::by_path(&schema, "a").unwrap();
        assert_eq!(schema.node(a).tag_number(), Some(1));
    }

    #[test]
    fn test_sibling_like_unknown_name() {
        let builder = tlv_root().child(FieldKind::TagLengthValue).name("a").tag(1);
        assert!(builder.sibling_like("missing").is_err());
    }

    #[test]
    fn test_extract_and_graft() {
        let base = tlv_root()
            .child(FieldKind::TagLengthValue)
            .name("group")
            .tag(1)
            .children_tag_codec(Arc::new(HexTag))
            .children_len_codec(Arc::new(BcdLength::new(1)))
            .children_tag_width(1)
            .child(FieldKind::TagLengthValue)
            .name("inner")
            .tag(7)
            .body(Arc::new(Ascii));

        let seed = base.extract("group").unwrap();
        let schema = base
            .focus_root()
            .graft(&seed)
            .name("group2")
            .tag(2)
            .build();

        let inner = navigator::by_path(&schema, "group2.inner").unwrap();
        assert_eq!(schema.node(inner).tag_number(), Some(7));

        // The original branch is untouched.
        assert!(navigator::by_path(&schema, "group.inner").is_ok());
    }

    #[test]
    fn test_focus_paths() {
        let builder = tlv_root()
            .child(FieldKind::TagLengthValue)
            .name("a")
            .tag(1)
            .body(Arc::new(Ascii))
            .focus_root()
            .focus("a")
            .unwrap();
        assert!(builder.focus("a.b").is_err());
    }

    #[test]
    fn test_up_from_root_fails() {
        assert!(SchemaBuilder::root(FieldKind::Message).up().is_err());
    }
}
