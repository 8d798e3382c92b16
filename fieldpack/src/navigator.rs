//! Read-only queries over schema and value trees.
//!
//! Nothing here mutates a tree. Lookups fail loudly, naming the offending
//! path; they never fall back to a default. The render functions are the
//! stable introspection seam consumed by external tooling.

use crate::{
    codec::{LengthCodec, TagCodec},
    error::Error,
    schema::{FieldId, Schema, SchemaNode},
    value::{ValueId, Values},
};
use std::{fmt::Write as _, sync::Arc};

/// Renders one path segment: `name(tagNum)`, bare tag, or the kind name.
fn segment(node: &SchemaNode) -> String {
    match (node.name(), node.tag_number()) {
        (Some(name), Some(tag)) => format!("{name}({tag})"),
        (Some(name), None) => name.to_string(),
        (None, Some(tag)) => tag.to_string(),
        (None, None) => node.kind().as_str().to_string(),
    }
}

/// The human-readable path of a schema node, ancestors joined with `.`.
pub fn path(schema: &Schema, id: FieldId) -> String {
    let mut segments = Vec::new();
    let mut cursor = Some(id);
    while let Some(id) = cursor {
        let node = schema.node(id);
        segments.push(segment(node));
        cursor = node.parent();
    }
    segments.reverse();
    segments.join(".")
}

/// Looks up a child of `id` by name.
pub fn child_by_name(schema: &Schema, id: FieldId, name: &str) -> Result<FieldId, Error> {
    schema
        .node(id)
        .children()
        .iter()
        .copied()
        .find(|&c| schema.node(c).name() == Some(name))
        .ok_or_else(|| Error::Unresolved {
            field: path(schema, id),
            message: format!("no child named {name:?}"),
        })
}

/// Looks up a child of `id` by tag number.
pub fn child_by_tag(schema: &Schema, id: FieldId, tag: u64) -> Result<FieldId, Error> {
    find_child_by_tag(schema, id, tag).ok_or_else(|| Error::Unresolved {
        field: path(schema, id),
        message: format!("no child with tag {tag}"),
    })
}

/// Non-failing probe used by the unpack engine's unknown-tag handling.
pub(crate) fn find_child_by_tag(schema: &Schema, id: FieldId, tag: u64) -> Option<FieldId> {
    schema
        .node(id)
        .children()
        .iter()
        .copied()
        .find(|&c| schema.node(c).tag_number() == Some(tag))
}

/// Looks up a sibling of `id` by name, via the parent.
pub fn sibling_by_name(schema: &Schema, id: FieldId, name: &str) -> Result<FieldId, Error> {
    let parent = schema.node(id).parent().ok_or_else(|| Error::Unresolved {
        field: path(schema, id),
        message: "the root has no siblings".to_string(),
    })?;
    child_by_name(schema, parent, name)
}

/// Resolves a dotted path of child names starting at the root.
pub fn by_path(schema: &Schema, dotted: &str) -> Result<FieldId, Error> {
    let mut cursor = Schema::ROOT;
    for name in dotted.split('.') {
        cursor = child_by_name(schema, cursor, name)?;
    }
    Ok(cursor)
}

macro_rules! resolve_inherited {
    ($fn_name:ident, $own:ident, $inherited:ident, $out:ty, $what:literal) => {
        /// Resolves the effective
        #[doc = $what]
        /// for a schema node: its own definition, else the parent's
        /// children-declaration. Defining both, or neither, is an error.
        pub fn $fn_name(schema: &Schema, id: FieldId) -> Result<$out, Error> {
            let node = schema.node(id);
            let own = node.$own.clone();
            let inherited = node
                .parent()
                .and_then(|p| schema.node(p).$inherited.clone());
            match (own, inherited) {
                (Some(_), Some(_)) => Err(Error::InvalidSchema {
                    field: path(schema, id),
                    message: concat!(
                        $what,
                        " defined both on the field and on its parent's children; define exactly one"
                    )
                    .to_string(),
                }),
                (Some(own), None) => Ok(own),
                (None, Some(inherited)) => Ok(inherited),
                (None, None) => Err(Error::InvalidSchema {
                    field: path(schema, id),
                    message: concat!(
                        "no ",
                        $what,
                        "; define one on the field or on its parent's children"
                    )
                    .to_string(),
                }),
            }
        }
    };
}

resolve_inherited!(
    resolve_tag_codec,
    tag_codec,
    child_tag_codec,
    Arc<dyn TagCodec>,
    "tag codec"
);
resolve_inherited!(
    resolve_len_codec,
    len_codec,
    child_len_codec,
    Arc<dyn LengthCodec>,
    "length codec"
);
resolve_inherited!(
    resolve_tag_width,
    tag_width,
    child_tag_width,
    usize,
    "tag width"
);

/// Re-associates a detached value node with its defining schema node by
/// matching name and tag number depth-first, pre-order, from the schema
/// root. The first match wins.
pub fn associate(schema: &Schema, values: &Values, id: ValueId) -> Result<FieldId, Error> {
    let value = values.node(id);
    let mut stack = vec![Schema::ROOT];
    while let Some(fid) = stack.pop() {
        let node = schema.node(fid);
        if node.name() == value.name() && node.tag_number() == value.tag() {
            return Ok(fid);
        }
        // Push in reverse so children are visited in schema order.
        stack.extend(node.children().iter().rev());
    }
    Err(Error::Unresolved {
        field: value.name().unwrap_or("<unnamed>").to_string(),
        message: format!(
            "no schema field matches name {:?} and tag {:?}",
            value.name(),
            value.tag()
        ),
    })
}

/// Verifies that a schema node and a value node presumed to correspond agree
/// on name and tag, naming which of the two mismatched if not.
pub fn verify(
    schema: &Schema,
    fid: FieldId,
    values: &Values,
    vid: ValueId,
) -> Result<(), Error> {
    let node = schema.node(fid);
    let value = values.node(vid);
    let name_ok = node.name() == value.name();
    let tag_ok = node.tag_number() == value.tag();
    let mismatched = match (name_ok, tag_ok) {
        (true, true) => return Ok(()),
        (false, true) => "name",
        (true, false) => "tag",
        (false, false) => "both name and tag",
    };
    Err(Error::Unresolved {
        field: path(schema, fid),
        message: format!(
            "value node does not correspond: {mismatched} mismatched (value has name {:?}, tag {:?})",
            value.name(),
            value.tag()
        ),
    })
}

/// A stable, indented rendering of a schema tree: one line per field with
/// its full path.
pub fn render_schema(schema: &Schema) -> String {
    let mut out = String::new();
    render_schema_node(schema, Schema::ROOT, 0, &mut out);
    out
}

fn render_schema_node(schema: &Schema, id: FieldId, depth: usize, out: &mut String) {
    let _ = writeln!(
        out,
        "{:indent$}{} [{}]",
        "",
        path(schema, id),
        schema.node(id).kind(),
        indent = depth * 2
    );
    for &child in schema.node(id).children() {
        render_schema_node(schema, child, depth + 1, out);
    }
}

/// A stable, indented rendering of a schema and value tree pair: one line
/// per populated field with its full path and decoded value, undefined
/// children included.
pub fn render(schema: &Schema, values: &Values) -> String {
    let mut out = String::new();
    render_value_node(schema, values, Values::ROOT, 0, &mut out);
    out
}

fn render_value_node(
    schema: &Schema,
    values: &Values,
    id: ValueId,
    depth: usize,
    out: &mut String,
) {
    let value = values.node(id);
    let prefix = path(schema, value.field());
    match value.body() {
        Some(body) => {
            let _ = writeln!(out, "{:indent$}{prefix} = {body}", "", indent = depth * 2);
        }
        None => {
            let _ = writeln!(out, "{:indent$}{prefix}", "", indent = depth * 2);
        }
    }
    for &child in value.children() {
        render_value_node(schema, values, child, depth + 1, out);
    }
    for (name, undefined) in value.undefined() {
        let _ = writeln!(
            out,
            "{:indent$}{prefix}.{name}({}) = {}",
            "",
            undefined.tag,
            undefined.body,
            indent = (depth + 1) * 2
        );
    }
}
