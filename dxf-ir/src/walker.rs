// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The tree walker & filter substrate (C3, §4.2) and the canonicalise /
//! strip / filter operations built on it.

use dxf_tree::CANONICAL_SECTIONS;
use dxf_tree::{Error, NodeId, Result, Tree};

/// What a filter wants to happen to the child it was just given.
#[derive(Default)]
pub struct FilterOutcome {
    /// `Some(nodes)` splices `nodes` in place of the visited child —
    /// possibly zero nodes (deletion) or several (expansion).
    pub replacement: Option<Vec<NodeId>>,
    /// If set (and `replacement` is `None`), the walker does not descend
    /// into the child's own children.
    pub skip_descend: bool,
}

impl FilterOutcome {
    pub fn keep() -> Self {
        FilterOutcome::default()
    }

    pub fn replace(nodes: Vec<NodeId>) -> Self {
        FilterOutcome { replacement: Some(nodes), skip_descend: true }
    }

    pub fn remove() -> Self {
        FilterOutcome { replacement: Some(Vec::new()), skip_descend: true }
    }
}

/// Walks `parent`'s children in order, running `pre` before descending
/// into each child and `post` after, splicing in place as filters
/// request. Spliced-in nodes are never re-visited within the same pass —
/// the walker's index advances past them immediately (§4.2).
pub fn walk<F, G>(tree: &mut Tree, parent: NodeId, pre: &mut F, post: &mut G)
where
    F: FnMut(&mut Tree, NodeId) -> FilterOutcome,
    G: FnMut(&mut Tree, NodeId) -> FilterOutcome,
{
    let mut i = 0;
    while i < tree.child_count(parent) {
        let child = tree.children(parent)[i];

        let pre_outcome = pre(tree, child);
        if let Some(replacement) = pre_outcome.replacement {
            let inserted = tree.splice_children(parent, i, 1, replacement);
            i += inserted;
            continue;
        }
        if !pre_outcome.skip_descend {
            walk(tree, child, &mut *pre, &mut *post);
        }

        let post_outcome = post(tree, child);
        if let Some(replacement) = post_outcome.replacement {
            let inserted = tree.splice_children(parent, i, 1, replacement);
            i += inserted;
            continue;
        }

        i += 1;
    }
}

/// Runs `pre`/`post` over `parent`'s children only — no recursion. Used by
/// passes that are defined in terms of direct children (canonicalise,
/// strip's per-node comment removal still needs full recursion and uses
/// [`walk`] directly instead).
pub fn walk_shallow<F>(tree: &mut Tree, parent: NodeId, mut visit: F)
where
    F: FnMut(&mut Tree, NodeId) -> FilterOutcome,
{
    walk(tree, parent, &mut visit, &mut |_, _| FilterOutcome::keep());
}

/// Finds a top-level `SECTION` node whose `name` attribute is `section`
/// (a DXF section is tagged `SECTION`; its identity lives in that
/// attribute, e.g. `2 -> ENTITIES`, not in the node's own tag).
pub fn find_section(tree: &Tree, root: NodeId, section: &str) -> Option<NodeId> {
    tree.children(root)
        .iter()
        .copied()
        .find(|&id| tree.name(id) == "SECTION" && tree.attr(id, "name").map(|v| v.as_str()) == Some(section))
}

/// Ensures the root has exactly the six canonical sections, in canonical
/// order, merges duplicates, and drops all stored end-tags (§4.2
/// "Canonicalise").
pub fn canonicalize(tree: &mut Tree) {
    let root = tree.root();
    let existing: Vec<NodeId> = tree.children(root).to_vec();

    let mut by_name: std::collections::HashMap<&'static str, Vec<NodeId>> =
        CANONICAL_SECTIONS.iter().map(|&n| (n, Vec::new())).collect();
    let mut others = Vec::new();

    for id in existing {
        let section_name = if tree.name(id) == "SECTION" {
            tree.attr(id, "name").map(|v| v.as_str().to_string())
        } else {
            None
        };
        match section_name.as_deref().and_then(|n| CANONICAL_SECTIONS.iter().find(|&&c| c == n)) {
            Some(&bucket) => by_name.get_mut(bucket).unwrap().push(id),
            None => others.push(id),
        }
    }

    let mut ordered = Vec::with_capacity(CANONICAL_SECTIONS.len());
    for &section_name in CANONICAL_SECTIONS {
        let matches = by_name.remove(section_name).unwrap_or_default();
        let merged = match matches.split_first() {
            Some((&first, rest)) => {
                for &other in rest {
                    let children = tree.children(other).to_vec();
                    let insert_at = tree.child_count(first);
                    tree.splice_children(first, insert_at, 0, children);
                }
                first
            }
            None => {
                let empty = tree.alloc("SECTION");
                tree.set_attr(empty, "name", section_name);
                empty
            }
        };
        ordered.push(merged);
    }

    // Non-section stragglers (malformed input) are dropped, matching the
    // "insert empties and a minimal HEADER as needed" framing: canonicalise
    // produces exactly the six sections and nothing else at the top level.
    let _ = others;

    tree.set_children(root, ordered);

    drop_end_tags(tree, root);

    warn_on_unknown_acadver(tree, ordered_header(tree, root));
}

fn ordered_header(tree: &Tree, root: NodeId) -> Option<NodeId> {
    tree.children(root)
        .iter()
        .copied()
        .find(|&id| tree.name(id) == "SECTION" && tree.attr(id, "name").map(|v| v.as_str()) == Some("HEADER"))
}

/// Logs a warning (never rejects) if `$ACADVER` is missing or not one of
/// the reserved version strings (§6 supplemented behavior).
fn warn_on_unknown_acadver(tree: &Tree, header: Option<NodeId>) {
    let Some(header) = header else { return };
    let acadver = tree
        .children(header)
        .iter()
        .find(|&&id| tree.name(id) == "$ACADVER")
        .and_then(|&id| tree.attr(id, "text").map(|v| v.as_str().to_string()));

    match acadver {
        Some(version) if dxf_tree::is_known_acadver(&version) => {}
        Some(version) => log::warn!("unrecognized $ACADVER '{}'", version),
        None => log::warn!("document has no $ACADVER header variable"),
    }
}

fn drop_end_tags(tree: &mut Tree, node: NodeId) {
    tree.clear_end_tag(node);
    for child in tree.children(node).to_vec() {
        drop_end_tags(tree, child);
    }
}

/// Deletes `CLASSES`/`TABLES`, empties `BLOCKS`/`OBJECTS`, and removes the
/// `comment` attribute from every node (§4.2 "Strip").
pub fn strip(tree: &mut Tree) {
    let root = tree.root();
    let children = tree.children(root).to_vec();
    let keep: Vec<NodeId> = children
        .into_iter()
        .filter(|&id| {
            let is_classes_or_tables = tree.name(id) == "SECTION"
                && matches!(tree.attr(id, "name").map(|v| v.as_str()), Some("CLASSES") | Some("TABLES"));
            !is_classes_or_tables
        })
        .collect();
    tree.set_children(root, keep);

    if let Some(blocks) = find_section(tree, root, "BLOCKS") {
        tree.set_children(blocks, Vec::new());
    }
    if let Some(objects) = find_section(tree, root, "OBJECTS") {
        tree.set_children(objects, Vec::new());
    }

    remove_comments(tree, root);
}

fn remove_comments(tree: &mut Tree, node: NodeId) {
    tree.remove_attr(node, "comment");
    for child in tree.children(node).to_vec() {
        remove_comments(tree, child);
    }
}

/// Include or exclude polarity for a [`Criterion`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Polarity {
    Include,
    Exclude,
}

/// A filter criterion, in one of the three shapes §4.2 names (the third,
/// an arbitrary predicate, subsumes the `layer`/`color` specialisations).
pub enum Criterion {
    Kinds(Vec<String>, Polarity),
    Predicate(Box<dyn Fn(&Tree, NodeId) -> bool>),
}

/// Parses a criterion string: a bare or `+`/`-`-prefixed comma-separated
/// list of entity-type names. A bare (unprefixed) criterion defaults to
/// `Exclude` (§4.2).
pub fn parse_criterion(spec: &str) -> Result<Criterion> {
    let (polarity, rest) = match spec.strip_prefix('+') {
        Some(rest) => (Polarity::Include, rest),
        None => match spec.strip_prefix('-') {
            Some(rest) => (Polarity::Exclude, rest),
            None => (Polarity::Exclude, spec),
        },
    };

    let kinds: Vec<String> = rest.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect();
    if kinds.is_empty() {
        return Err(Error::InvalidArgument(format!("empty filter criterion: '{}'", spec)));
    }
    Ok(Criterion::Kinds(kinds, polarity))
}

/// A specialised criterion keeping only nodes whose `layer` attribute
/// equals `layer`.
pub fn by_layer(layer: impl Into<String>) -> Criterion {
    let layer = layer.into();
    Criterion::Predicate(Box::new(move |tree, id| {
        tree.attr(id, "layer").map(|v| v.as_str() == layer).unwrap_or(false)
    }))
}

/// A specialised criterion keeping only nodes whose `color` attribute
/// equals `color`.
pub fn by_color(color: impl Into<String>) -> Criterion {
    let color = color.into();
    Criterion::Predicate(Box::new(move |tree, id| {
        tree.attr(id, "color").map(|v| v.as_str() == color).unwrap_or(false)
    }))
}

fn keeps(tree: &Tree, id: NodeId, criterion: &Criterion) -> bool {
    match criterion {
        Criterion::Kinds(kinds, polarity) => {
            let matches = kinds.iter().any(|k| k == tree.name(id));
            match polarity {
                Polarity::Include => matches,
                Polarity::Exclude => !matches,
            }
        }
        Criterion::Predicate(f) => f(tree, id),
    }
}

/// Filters `BLOCKS` children (and each `BLOCK`'s own children),
/// `ENTITIES`, and `OBJECTS` against `criterion`, dropping nodes for which
/// it returns `false` (§4.2 "Filter").
pub fn filter(tree: &mut Tree, criterion: &Criterion) {
    let root = tree.root();

    if let Some(entities) = find_section(tree, root, "ENTITIES") {
        retain(tree, entities, criterion);
    }
    if let Some(objects) = find_section(tree, root, "OBJECTS") {
        retain(tree, objects, criterion);
    }
    if let Some(blocks) = find_section(tree, root, "BLOCKS") {
        for block in tree.children(blocks).to_vec() {
            retain(tree, block, criterion);
        }
    }
}

fn retain(tree: &mut Tree, parent: NodeId, criterion: &Criterion) {
    let children = tree.children(parent).to_vec();
    let keep: Vec<NodeId> = children.into_iter().filter(|&id| keeps(tree, id, criterion)).collect();
    tree.set_children(parent, keep);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(entities: &[&str]) -> Tree {
        let mut tree = Tree::new();
        let root = tree.root();
        let section = tree.alloc("SECTION");
        tree.set_attr(section, "name", "ENTITIES");
        tree.push_child(root, section);
        for &kind in entities {
            let n = tree.alloc(kind);
            tree.push_child(section, n);
        }
        tree
    }

    #[test]
    fn canonicalize_produces_six_sections_in_order() {
        let mut tree = build(&["LINE"]);
        canonicalize(&mut tree);
        let root = tree.root();
        assert_eq!(tree.child_count(root), 6);
        assert!(tree.children(root).iter().all(|&id| tree.name(id) == "SECTION"));
        let names: Vec<String> =
            tree.children(root).iter().map(|&id| tree.attr(id, "name").unwrap().as_str().to_string()).collect();
        assert_eq!(names, CANONICAL_SECTIONS);
    }

    #[test]
    fn canonicalize_merges_duplicate_sections() {
        let mut tree = Tree::new();
        let root = tree.root();
        let a = tree.alloc("SECTION");
        tree.set_attr(a, "name", "ENTITIES");
        let line = tree.alloc("LINE");
        tree.push_child(a, line);
        let b = tree.alloc("SECTION");
        tree.set_attr(b, "name", "ENTITIES");
        let circle = tree.alloc("CIRCLE");
        tree.push_child(b, circle);
        tree.push_child(root, a);
        tree.push_child(root, b);

        canonicalize(&mut tree);
        let entities = find_section(&tree, root, "ENTITIES").unwrap();
        assert_eq!(tree.child_count(entities), 2);
    }

    #[test]
    fn strip_removes_classes_and_tables_and_comments() {
        let mut tree = Tree::new();
        let root = tree.root();
        let classes = tree.alloc("SECTION");
        tree.set_attr(classes, "name", "CLASSES");
        tree.push_child(root, classes);
        let tables = tree.alloc("SECTION");
        tree.set_attr(tables, "name", "TABLES");
        tree.push_child(root, tables);
        let line = tree.alloc("LINE");
        tree.set_attr(line, "comment", "note");
        tree.push_child(root, line);

        strip(&mut tree);
        assert!(find_section(&tree, root, "CLASSES").is_none());
        assert!(find_section(&tree, root, "TABLES").is_none());
        assert!(!tree.has_attr(line, "comment"));
    }

    #[test]
    fn filter_keeps_only_included_kinds() {
        let mut tree = build(&["LINE", "CIRCLE", "ARC"]);
        let criterion = parse_criterion("+LINE,ARC").unwrap();
        filter(&mut tree, &criterion);
        let entities = find_section(&tree, tree.root(), "ENTITIES").unwrap();
        let names: Vec<&str> = tree.children(entities).iter().map(|&id| tree.name(id)).collect();
        assert_eq!(names, vec!["LINE", "ARC"]);
    }

    #[test]
    fn empty_criterion_is_invalid_argument() {
        assert!(parse_criterion("+").is_err());
    }

    #[test]
    fn walker_does_not_revisit_spliced_nodes() {
        let mut tree = build(&["LINE"]);
        let entities = tree.find_child(tree.root(), "SECTION").unwrap();
        let mut visits = 0;
        walk_shallow(&mut tree, entities, |tree, id| {
            visits += 1;
            if tree.name(id) == "LINE" {
                let a = tree.alloc("POINT");
                let b = tree.alloc("POINT");
                FilterOutcome::replace(vec![a, b])
            } else {
                FilterOutcome::keep()
            }
        });
        // LINE visited once; the two spliced-in POINT nodes are not
        // re-visited within this same pass.
        assert_eq!(visits, 1);
        assert_eq!(tree.child_count(entities), 2);
    }

    #[test]
    fn canonicalize_tolerates_unknown_acadver() {
        let mut tree = Tree::new();
        let root = tree.root();
        let header = tree.alloc("SECTION");
        tree.set_attr(header, "name", "HEADER");
        let acadver = tree.alloc("$ACADVER");
        tree.set_attr(acadver, "text", "AC9999");
        tree.push_child(header, acadver);
        tree.push_child(root, header);

        canonicalize(&mut tree);

        // unknown $ACADVER is only warned about, never rejected.
        assert_eq!(tree.child_count(root), 6);
    }
}
