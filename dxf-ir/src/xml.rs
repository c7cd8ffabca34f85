// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The XML mirror (§6): "every tree node ↔ one XML element". A node's
//! name becomes its tag (a leading `$` is rewritten to `_`, since `$` is
//! not a valid XML name-start character); attributes become XML
//! attributes, with list-valued attributes space-joined under a
//! `-array`-suffixed name; a node's end-tag (if any) is carried as a
//! nested `EndTag` element so the mirror stays lossless.
//!
//! Grounded on `usvg::writer`'s use of `xmlwriter::XmlWriter` for the
//! write side, and on `rosvgtree`'s `roxmltree`-based walk for the read
//! side (both vendored into the teacher's `usvg` stack).

use std::collections::HashMap;

use roxmltree::Document;
use xmlwriter::{Options, XmlWriter};

use dxf_tree::{Error, EndTag, NodeId, Result, Tree, Value};

const END_TAG_ELEMENT: &str = "EndTag";
const END_TAG_NAME_ATTR: &str = "name";
const ARRAY_SUFFIX: &str = "-array";

fn xml_tag_for(name: &str) -> String {
    if let Some(rest) = name.strip_prefix('$') {
        format!("_{}", rest)
    } else {
        name.to_string()
    }
}

fn node_name_for(tag: &str) -> String {
    if let Some(rest) = tag.strip_prefix('_') {
        format!("${}", rest)
    } else {
        tag.to_string()
    }
}

/// Serializes `tree` to its XML mirror.
pub fn tree_to_xml(tree: &Tree) -> String {
    let opt = Options { use_single_quote: false, ..Options::default() };
    let mut w = XmlWriter::new(opt);
    write_node(tree, tree.root(), &mut w);
    w.end_document()
}

fn write_node(tree: &Tree, id: NodeId, w: &mut XmlWriter) {
    w.start_element(&xml_tag_for(tree.name(id)));

    let mut attrs: Vec<(&str, &Value)> = tree.attrs(id).collect();
    attrs.sort_by_key(|(k, _)| *k);
    for (name, value) in attrs {
        write_attr(w, name, value);
    }

    for &child in tree.children(id) {
        write_node(tree, child, w);
    }

    if let Some(tag) = tree.end_tag(id) {
        w.start_element(END_TAG_ELEMENT);
        w.write_attribute(END_TAG_NAME_ATTR, &tag.name);
        let mut tag_attrs: Vec<(&String, &Value)> = tag.attrs.iter().collect();
        tag_attrs.sort_by_key(|(k, _)| (*k).clone());
        for (name, value) in tag_attrs {
            write_attr(w, name, value);
        }
        w.end_element();
    }

    w.end_element();
}

fn write_attr(w: &mut XmlWriter, name: &str, value: &Value) {
    match value {
        Value::Scalar(s) => w.write_attribute(name, s),
        Value::List(items) => {
            let joined = items.join(" ");
            w.write_attribute(&format!("{}{}", name, ARRAY_SUFFIX), &joined);
        }
    }
}

/// Parses an XML mirror document back into a `Tree`.
pub fn xml_to_tree(xml: &str) -> Result<Tree> {
    let doc = Document::parse(xml).map_err(|e| Error::ParseError(e.to_string()))?;
    let root_el = doc.root_element();

    let mut tree = Tree::new();
    let root = tree.root();
    tree.set_name(root, node_name_for(root_el.tag_name().name()));
    read_attrs(&mut tree, root, &root_el)?;

    let mut children = Vec::new();
    for el in root_el.children().filter(|n| n.is_element()) {
        if el.tag_name().name() == END_TAG_ELEMENT {
            tree.set_end_tag(root, read_end_tag(&el)?);
        } else {
            children.push(read_node(&mut tree, &el)?);
        }
    }
    tree.set_children(root, children);

    Ok(tree)
}

fn read_node(tree: &mut Tree, el: &roxmltree::Node) -> Result<NodeId> {
    let id = tree.alloc(node_name_for(el.tag_name().name()));
    read_attrs(tree, id, el)?;

    let mut children = Vec::new();
    for child_el in el.children().filter(|n| n.is_element()) {
        if child_el.tag_name().name() == END_TAG_ELEMENT {
            tree.set_end_tag(id, read_end_tag(&child_el)?);
        } else {
            children.push(read_node(tree, &child_el)?);
        }
    }
    tree.set_children(id, children);

    Ok(id)
}

fn read_attrs(tree: &mut Tree, id: NodeId, el: &roxmltree::Node) -> Result<()> {
    for attr in el.attributes() {
        let (name, value) = attr_value(attr.name(), attr.value());
        tree.set_attr(id, name, value);
    }
    Ok(())
}

fn read_end_tag(el: &roxmltree::Node) -> Result<EndTag> {
    let mut name = String::new();
    let mut attrs = HashMap::new();
    for attr in el.attributes() {
        if attr.name() == END_TAG_NAME_ATTR {
            name = attr.value().to_string();
            continue;
        }
        let (attr_name, value) = attr_value(attr.name(), attr.value());
        attrs.insert(attr_name, value);
    }
    Ok(EndTag { name, attrs })
}

fn attr_value(xml_name: &str, xml_value: &str) -> (String, Value) {
    match xml_name.strip_suffix(ARRAY_SUFFIX) {
        Some(base) => {
            let items: Vec<String> = xml_value.split_whitespace().map(str::to_string).collect();
            (base.to_string(), Value::List(items))
        }
        None => (xml_name.to_string(), Value::Scalar(xml_value.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_simple_tree() {
        let mut tree = Tree::new();
        let root = tree.root();
        let entities = tree.alloc("ENTITIES");
        let line = tree.alloc("LINE");
        tree.set_attr(line, "layer", "A");
        tree.push_attr(line, "x", "0.0".to_string());
        tree.push_attr(line, "x", "100.0".to_string());
        tree.push_child(entities, line);
        tree.push_child(root, entities);

        let xml = tree_to_xml(&tree);
        let restored = xml_to_tree(&xml).unwrap();

        let restored_entities = restored.children(restored.root())[0];
        let restored_line = restored.children(restored_entities)[0];
        assert_eq!(restored.name(restored_line), "LINE");
        assert_eq!(restored.attr(restored_line, "layer").unwrap().as_str(), "A");
        assert_eq!(
            restored.attr(restored_line, "x").unwrap().as_f64_list().unwrap(),
            vec![0.0, 100.0]
        );
    }

    #[test]
    fn rewrites_dollar_prefixed_header_variable_names() {
        let mut tree = Tree::new();
        let root = tree.root();
        let header = tree.alloc("HEADER");
        let acadver = tree.alloc("$ACADVER");
        tree.set_attr(acadver, "text", "AC1027");
        tree.push_child(header, acadver);
        tree.push_child(root, header);

        let xml = tree_to_xml(&tree);
        assert!(xml.contains("_ACADVER"));
        assert!(!xml.contains("$ACADVER"));

        let restored = xml_to_tree(&xml).unwrap();
        let restored_header = restored.children(restored.root())[0];
        let restored_acadver = restored.children(restored_header)[0];
        assert_eq!(restored.name(restored_acadver), "$ACADVER");
    }

    #[test]
    fn preserves_end_tag_attributes() {
        let mut tree = Tree::new();
        let root = tree.root();
        let section = tree.alloc("SECTION");
        tree.set_end_tag(
            section,
            EndTag { name: "ENDSEC".to_string(), attrs: HashMap::new() },
        );
        tree.push_child(root, section);

        let xml = tree_to_xml(&tree);
        let restored = xml_to_tree(&xml).unwrap();
        let restored_section = restored.children(restored.root())[0];
        assert_eq!(restored.end_tag(restored_section).unwrap().name, "ENDSEC");
    }
}
