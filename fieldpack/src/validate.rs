//! Structural validation of schema trees.
//!
//! Intended to run once per schema at startup, before the first encode or
//! decode, so authoring mistakes surface immediately rather than mid-stream.

use crate::{
    error::Error,
    navigator::{self, path},
    schema::{FieldId, FieldKind, Schema},
};
use std::collections::BTreeSet;

/// Walks the schema tree and checks the structural rules for every node.
///
/// Any violation fails immediately with the offending field's full path and
/// the missing or conflicting attribute.
pub fn validate_structure(schema: &Schema) -> Result<(), Error> {
    validate_node(schema, Schema::ROOT)
}

fn rule_violation(schema: &Schema, id: FieldId, message: impl Into<String>) -> Error {
    Error::InvalidSchema {
        field: path(schema, id),
        message: message.into(),
    }
}

fn validate_node(schema: &Schema, id: FieldId) -> Result<(), Error> {
    let node = schema.node(id);
    let kind = node.kind();

    // A leaf carries data, so it needs a body codec; containers and bitmap
    // holders do not.
    let container = !node.children().is_empty()
        || matches!(kind, FieldKind::BitmapContainer | FieldKind::Message);
    if !container && node.body.is_none() {
        return Err(rule_violation(schema, id, "no body codec on a leaf field"));
    }

    // Everything but a FixedValue must be addressable by name or tag.
    if kind != FieldKind::FixedValue && node.name().is_none() && node.tag().is_none() {
        return Err(rule_violation(schema, id, "neither name nor tag set"));
    }

    if kind.has_tag() {
        // Both resolutions enforce the own-XOR-inherited rule themselves.
        navigator::resolve_tag_codec(schema, id)?;
        navigator::resolve_tag_width(schema, id)?;
        if node.tag().is_none() {
            return Err(rule_violation(schema, id, "no tag value on a tagged field"));
        }
    }

    if kind.has_length() {
        navigator::resolve_len_codec(schema, id)?;
    }

    if matches!(kind, FieldKind::FixedValue | FieldKind::TagValue) && node.fixed_len().is_none() {
        return Err(rule_violation(schema, id, "no fixed body length declared"));
    }

    match kind {
        FieldKind::BitmapContainer => {
            if node.bitmap.is_none() {
                return Err(rule_violation(schema, id, "no bitmap codec"));
            }
            if node.children().is_empty() {
                return Err(rule_violation(schema, id, "bitmap container has no children"));
            }
        }
        FieldKind::Message => {
            if node.bitmap.is_some() {
                return Err(rule_violation(schema, id, "bitmap codec on a message"));
            }
            if node.fixed_len().is_some() {
                return Err(rule_violation(schema, id, "declared length on a message"));
            }
        }
        _ => {}
    }

    // Sibling names must be unique or name lookups are ambiguous.
    let mut seen = BTreeSet::new();
    for &child in node.children() {
        if let Some(name) = schema.node(child).name() {
            if !seen.insert(name) {
                return Err(rule_violation(
                    schema,
                    child,
                    format!("duplicate sibling name {name:?}"),
                ));
            }
        }
    }

    // A container whose first child carries a tag decodes its children with
    // one tag-driven loop, so the whole group must share one set of header
    // conventions: every sibling tagged, all in the same tag/length order,
    // and (for groups of more than one) conventions declared once on the
    // parent rather than per child. Bitmap children decode positionally and
    // are exempt.
    let children = node.children();
    if kind != FieldKind::BitmapContainer {
        if let Some((&first, rest)) = children.split_first() {
            if schema.node(first).kind().has_tag() {
                let length_first = schema.node(first).kind().length_first();
                for &child in rest {
                    if !schema.node(child).kind().has_tag() {
                        return Err(rule_violation(
                            schema,
                            child,
                            "untagged field among tagged siblings",
                        ));
                    }
                    if schema.node(child).kind().length_first() != length_first {
                        return Err(rule_violation(
                            schema,
                            child,
                            "tag-first and length-first siblings mixed in one group",
                        ));
                    }
                }
                if children.len() > 1 {
                    if node.child_tag_codec.is_none() || node.child_tag_width.is_none() {
                        return Err(rule_violation(
                            schema,
                            id,
                            "tagged children must share a children-declared tag codec and width",
                        ));
                    }
                    if schema.node(first).kind().has_length() && node.child_len_codec.is_none() {
                        return Err(rule_violation(
                            schema,
                            id,
                            "tagged children must share a children-declared length codec",
                        ));
                    }
                }
            }
        }
    }

    for &child in node.children() {
        validate_node(schema, child)?;
    }
    Ok(())
}
