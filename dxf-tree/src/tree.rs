// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The attributed node tree (§3).
//!
//! The tree is a single, exclusively-owned, acyclic arena: nodes live in a
//! flat `Vec` and are addressed by [`NodeId`]; children hold the only
//! references to their node, and there are no parent back-pointers.
//! Walkers that need to know "where am I" keep a stack of `NodeId`s as they
//! descend (§5) rather than the tree carrying that information itself.

use std::collections::HashMap;

use crate::value::Value;

/// An opaque handle into a [`Tree`]'s node arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// The attributes captured from an end-node (e.g. `ENDSEC`, `SEQEND`),
/// kept so a lossless round-trip can re-emit it verbatim (§4.1).
#[derive(Clone, Debug, Default)]
pub struct EndTag {
    pub name: String,
    pub attrs: HashMap<String, Value>,
}

struct NodeData {
    name: String,
    attrs: HashMap<String, Value>,
    children: Vec<NodeId>,
    end_tag: Option<EndTag>,
}

/// An attributed node tree (§3).
pub struct Tree {
    nodes: Vec<NodeData>,
    root: NodeId,
}

impl Tree {
    /// Creates a tree containing only an empty root node named `"ROOT"`.
    pub fn new() -> Self {
        let mut tree = Tree { nodes: Vec::new(), root: NodeId(0) };
        let root = tree.alloc("ROOT");
        tree.root = root;
        tree
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Allocates a new, parentless node. The caller is responsible for
    /// attaching it via [`Tree::push_child`] or [`Tree::splice_children`].
    pub fn alloc(&mut self, name: impl Into<String>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData {
            name: name.into(),
            attrs: HashMap::new(),
            children: Vec::new(),
            end_tag: None,
        });
        id
    }

    #[inline]
    fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.index()]
    }

    #[inline]
    fn data_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.index()]
    }

    pub fn name(&self, id: NodeId) -> &str {
        &self.data(id).name
    }

    pub fn set_name(&mut self, id: NodeId, name: impl Into<String>) {
        self.data_mut(id).name = name.into();
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&Value> {
        self.data(id).attrs.get(name)
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.data(id).attrs.contains_key(name)
    }

    pub fn attrs(&self, id: NodeId) -> impl Iterator<Item = (&str, &Value)> {
        self.data(id).attrs.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Sets an attribute, promoting to a list if already present — this is
    /// the one spot group-code repetition (§4.1) and programmatic
    /// construction both go through.
    pub fn push_attr(&mut self, id: NodeId, name: impl Into<String>, value: String) {
        let name = name.into();
        let attrs = &mut self.data_mut(id).attrs;
        match attrs.get_mut(&name) {
            Some(existing) => existing.push(value),
            None => {
                attrs.insert(name, Value::Scalar(value));
            }
        }
    }

    /// Overwrites (rather than promotes) an attribute.
    pub fn set_attr(&mut self, id: NodeId, name: impl Into<String>, value: impl Into<Value>) {
        self.data_mut(id).attrs.insert(name.into(), value.into());
    }

    /// Sets an attribute only if it isn't already present.
    pub fn set_attr_if_absent(&mut self, id: NodeId, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        self.data_mut(id).attrs.entry(name).or_insert_with(|| value.into());
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> Option<Value> {
        self.data_mut(id).attrs.remove(name)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.data(id).children
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        self.data(id).children.len()
    }

    pub fn push_child(&mut self, parent: NodeId, child: NodeId) {
        self.data_mut(parent).children.push(child);
    }

    pub fn end_tag(&self, id: NodeId) -> Option<&EndTag> {
        self.data(id).end_tag.as_ref()
    }

    pub fn set_end_tag(&mut self, id: NodeId, tag: EndTag) {
        self.data_mut(id).end_tag = Some(tag);
    }

    pub fn clear_end_tag(&mut self, id: NodeId) {
        self.data_mut(id).end_tag = None;
    }

    /// Replaces `parent`'s children in `[index, index + remove_count)` with
    /// `new_children`, in place. Returns the number of children inserted,
    /// so callers doing an index-walking pass (§4.2) can skip over the
    /// freshly-spliced-in nodes rather than re-visiting them.
    pub fn splice_children(
        &mut self,
        parent: NodeId,
        index: usize,
        remove_count: usize,
        new_children: Vec<NodeId>,
    ) -> usize {
        let inserted = new_children.len();
        let children = &mut self.data_mut(parent).children;
        children.splice(index..index + remove_count, new_children);
        inserted
    }

    pub fn set_children(&mut self, parent: NodeId, children: Vec<NodeId>) {
        self.data_mut(parent).children = children;
    }

    pub fn retain_children<F: FnMut(NodeId) -> bool>(&mut self, parent: NodeId, mut keep: F) {
        let mut children = std::mem::take(&mut self.data_mut(parent).children);
        children.retain(|&id| keep(id));
        self.data_mut(parent).children = children;
    }

    /// Deep-clones the subtree rooted at `id`, allocating fresh node ids
    /// for every node in the copy. Used by the block flattener (§4.3),
    /// which must instantiate a `BLOCK`'s body once per array cell.
    pub fn clone_subtree(&mut self, id: NodeId) -> NodeId {
        let name = self.data(id).name.clone();
        let attrs = self.data(id).attrs.clone();
        let end_tag = self.data(id).end_tag.clone();
        let children: Vec<NodeId> = self.data(id).children.clone();

        let new_id = self.alloc(name);
        self.data_mut(new_id).attrs = attrs;
        self.data_mut(new_id).end_tag = end_tag;

        let new_children: Vec<NodeId> = children.into_iter().map(|c| self.clone_subtree(c)).collect();
        self.data_mut(new_id).children = new_children;

        new_id
    }

    /// Finds the first child of `parent` with the given name.
    pub fn find_child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.children(parent).iter().copied().find(|&c| self.name(c) == name)
    }

    pub fn total_nodes(&self) -> usize {
        self.nodes.len()
    }
}

impl Default for Tree {
    fn default() -> Self {
        Tree::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_attr_promotes_to_list() {
        let mut tree = Tree::new();
        let line = tree.alloc("LINE");
        tree.push_attr(line, "x", "0.0".to_string());
        assert!(matches!(tree.attr(line, "x"), Some(Value::Scalar(_))));
        tree.push_attr(line, "x", "1.0".to_string());
        assert!(matches!(tree.attr(line, "x"), Some(Value::List(_))));
    }

    #[test]
    fn splice_children_replaces_range_and_reports_count() {
        let mut tree = Tree::new();
        let root = tree.root();
        let a = tree.alloc("A");
        let b = tree.alloc("B");
        let c = tree.alloc("C");
        tree.set_children(root, vec![a, b, c]);

        let x = tree.alloc("X");
        let y = tree.alloc("Y");
        let inserted = tree.splice_children(root, 1, 1, vec![x, y]);
        assert_eq!(inserted, 2);
        assert_eq!(tree.children(root), &[a, x, y, c]);
    }

    #[test]
    fn clone_subtree_is_independent() {
        let mut tree = Tree::new();
        let root = tree.root();
        let line = tree.alloc("LINE");
        tree.set_attr(line, "layer", "A");
        tree.push_child(root, line);

        let clone = tree.clone_subtree(line);
        tree.set_attr(clone, "layer", "B");

        assert_eq!(tree.attr(line, "layer").unwrap().as_str(), "A");
        assert_eq!(tree.attr(clone, "layer").unwrap().as_str(), "B");
        assert_ne!(line, clone);
    }
}
