//! The per-message value tree.
//!
//! A [`Values`] arena mirrors a schema tree at runtime: each [`ValueNode`]
//! realizes one schema node (matched by name and tag) and holds the decoded
//! or to-be-encoded body. Repeated tags appear as multiple value nodes under
//! the same schema child; fields decoded for tags the schema does not know
//! live in a side map of [`UndefinedChild`] entries, never in the ordinary
//! children list.

use crate::{
    codec::Body,
    schema::{FieldId, Schema},
};
use std::collections::BTreeMap;

/// Index of a node within a [`Values`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueId(pub(crate) usize);

/// A decoded field whose tag was absent from the schema.
///
/// Preserved for forward compatibility under a deterministic synthetic name,
/// distinguishable from recognized fields.
#[derive(Debug, Clone, PartialEq)]
pub struct UndefinedChild {
    /// The tag number as decoded from the wire.
    pub tag: u64,
    /// The body, decoded with the anchor definition's body codec.
    pub body: Body,
}

/// One field occurrence: data only, mirroring a schema node.
#[derive(Debug, Clone)]
pub struct ValueNode {
    pub(crate) field: FieldId,
    /// Name and tag captured from the schema node at creation, so a detached
    /// node can be re-associated with a schema by matching them.
    pub(crate) name: Option<String>,
    pub(crate) tag: Option<u64>,
    pub(crate) body: Option<Body>,
    pub(crate) children: Vec<ValueId>,
    pub(crate) undefined: BTreeMap<String, UndefinedChild>,
    pub(crate) parent: Option<ValueId>,
}

impl ValueNode {
    fn new(schema: &Schema, field: FieldId, parent: Option<ValueId>) -> Self {
        let node = schema.node(field);
        Self {
            field,
            name: node.name().map(str::to_string),
            tag: node.tag_number(),
            body: None,
            children: Vec::new(),
            undefined: BTreeMap::new(),
            parent,
        }
    }

    pub fn field(&self) -> FieldId {
        self.field
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn tag(&self) -> Option<u64> {
        self.tag
    }

    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    pub fn children(&self) -> &[ValueId] {
        &self.children
    }

    pub fn parent(&self) -> Option<ValueId> {
        self.parent
    }

    /// Fields decoded for tags absent from the schema, keyed by their
    /// synthetic names.
    pub fn undefined(&self) -> &BTreeMap<String, UndefinedChild> {
        &self.undefined
    }
}

/// A value tree for one message occurrence.
///
/// Owned exclusively by the caller; one in-flight encode or decode at a
/// time, never shared across threads mid-operation.
#[derive(Debug, Clone)]
pub struct Values {
    pub(crate) nodes: Vec<ValueNode>,
}

impl Values {
    /// The root of every value tree.
    pub const ROOT: ValueId = ValueId(0);

    /// Creates an empty tree realizing the schema root.
    pub(crate) fn new(schema: &Schema) -> Self {
        Self {
            nodes: vec![ValueNode::new(schema, Schema::ROOT, None)],
        }
    }

    pub fn root(&self) -> ValueId {
        Self::ROOT
    }

    pub fn node(&self, id: ValueId) -> &ValueNode {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: ValueId) -> &mut ValueNode {
        &mut self.nodes[id.0]
    }

    /// Appends a new occurrence of `field` under `parent`, in arrival order.
    pub(crate) fn push_child(
        &mut self,
        schema: &Schema,
        parent: ValueId,
        field: FieldId,
    ) -> ValueId {
        let id = ValueId(self.nodes.len());
        self.nodes.push(ValueNode::new(schema, field, Some(parent)));
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Deep-clones the subtree at `src` as a new sibling occurrence,
    /// appended after its siblings.
    pub(crate) fn clone_occurrence(&mut self, src: ValueId) -> ValueId {
        let parent = self.nodes[src.0].parent;
        self.clone_into(src, parent)
    }

    fn clone_into(&mut self, src: ValueId, parent: Option<ValueId>) -> ValueId {
        let mut node = self.nodes[src.0].clone();
        let src_children = std::mem::take(&mut node.children);
        node.parent = parent;
        let id = ValueId(self.nodes.len());
        self.nodes.push(node);
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(id);
        }
        for child in src_children {
            self.clone_into(child, Some(id));
        }
        id
    }

    /// All occurrences of schema child `field` under `parent`, in arrival
    /// order.
    pub fn occurrences(&self, parent: ValueId, field: FieldId) -> Vec<ValueId> {
        self.nodes[parent.0]
            .children
            .iter()
            .copied()
            .filter(|&c| self.nodes[c.0].field == field)
            .collect()
    }

    /// The last occurrence of schema child `field` under `parent`, if any.
    pub(crate) fn last_occurrence(&self, parent: ValueId, field: FieldId) -> Option<ValueId> {
        self.nodes[parent.0]
            .children
            .iter()
            .copied()
            .rfind(|&c| self.nodes[c.0].field == field)
    }
}
